use clap::Parser;
use maze_chase_server::constants::{get_level_tuning, STARTING_LIVES, TICK_MS};
use maze_chase_server::engine::{GameEngine, GameEngineOptions};
use maze_chase_server::types::{Direction, GameStatus, GhostMode, RuntimeEvent, Snapshot, Vec2};
use maze_chase_server::world::LevelWorld;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Run a single custom scenario instead of the default table.
    #[arg(long)]
    single: bool,
    /// Levels the pilot must clear before the scenario counts as done.
    #[arg(long)]
    levels: Option<u32>,
    #[arg(long)]
    minutes: Option<i32>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum RunOutcome {
    LevelsCleared,
    GameOver,
    TimeLimit,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    #[serde(rename = "maxLevels")]
    max_levels: u32,
    minutes: i32,
    seed: u32,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    #[serde(rename = "maxLevels")]
    max_levels: u32,
    minutes: i32,
    outcome: RunOutcome,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    score: i32,
    #[serde(rename = "levelsCleared")]
    levels_cleared: u32,
    #[serde(rename = "pelletsEaten")]
    pellets_eaten: i32,
    #[serde(rename = "ghostsCaptured")]
    ghosts_captured: i32,
    #[serde(rename = "livesLost")]
    lives_lost: i32,
    #[serde(rename = "powerRuns")]
    power_runs: i32,
    #[serde(rename = "fruitTaken")]
    fruit_taken: i32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug)]
struct ScenarioRunResult {
    result: ScenarioResultLine,
    anomaly_records: Vec<AnomalyRecord>,
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "outcomeCounts")]
    outcome_counts: HashMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

fn main() {
    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, run_started_at_ms));

    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut outcome_counts: HashMap<String, usize> = HashMap::new();
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            "info",
            "scenario_started",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({
                "maxLevels": scenario.max_levels,
                "minutes": scenario.minutes,
            }),
        );
        let scenario_run = run_scenario(&scenario);

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &match_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.tick),
                json!({ "message": anomaly.message }),
            );
        }
        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        *outcome_counts
            .entry(outcome_key(scenario_run.result.outcome))
            .or_insert(0) += 1;

        emit_log(
            "info",
            "scenario_finished",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(scenario_run.finished_tick),
            json!({
                "outcome": scenario_run.result.outcome,
                "score": scenario_run.result.score,
                "levelsCleared": scenario_run.result.levels_cleared,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        println!(
            "{}",
            serde_json::to_string(&scenario_run.result).expect("scenario result should serialize")
        );
        scenario_results.push(scenario_run.result);
    }

    let run_finished_at_ms = now_ms();
    let summary = RunSummary {
        match_id: match_id.clone(),
        started_at_ms: run_started_at_ms,
        finished_at_ms: run_finished_at_ms,
        scenario_count: scenario_results.len(),
        anomaly_count: total_anomalies,
        outcome_counts,
        scenarios: scenario_results,
    };

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &match_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
    }

    emit_log(
        "info",
        "run_finished",
        &match_id,
        None,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "outcomeCounts": summary.outcome_counts,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn run_scenario(scenario: &Scenario) -> ScenarioRunResult {
    let world = LevelWorld::standard();
    let mut engine = GameEngine::new(scenario.seed, GameEngineOptions::default());
    let time_limit_ms = (scenario.minutes as u64) * 60_000;

    let mut outcome = RunOutcome::TimeLimit;
    let mut levels_cleared = 0u32;
    let mut pellets_eaten = 0;
    let mut ghosts_captured = 0;
    let mut lives_lost = 0;
    let mut power_runs = 0;
    let mut fruit_taken = 0;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut elapsed_ms = 0u64;
    let mut last_tick = 0u64;
    let mut prev_score = 0i32;
    let mut prev_lives = STARTING_LIVES;
    let mut prev_pellets = usize::MAX;
    let mut prev_level = 1u32;

    while elapsed_ms < time_limit_ms {
        steer_pilot(&world, &mut engine);
        engine.step(TICK_MS);
        elapsed_ms += TICK_MS;
        let snapshot = engine.build_snapshot(true);
        last_tick = snapshot.tick;

        for event in &snapshot.events {
            match event {
                RuntimeEvent::PelletEaten { .. } => pellets_eaten += 1,
                RuntimeEvent::GhostCaptured { .. } => ghosts_captured += 1,
                RuntimeEvent::LifeLost { .. } => lives_lost += 1,
                RuntimeEvent::PowerModeStarted { .. } => power_runs += 1,
                RuntimeEvent::FruitTaken { .. } => fruit_taken += 1,
                RuntimeEvent::LevelCompleted { .. } => levels_cleared += 1,
                _ => {}
            }
        }

        for message in collect_snapshot_anomalies(
            &snapshot,
            prev_score,
            prev_lives,
            prev_pellets,
            prev_level,
        ) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }
        prev_score = snapshot.score;
        prev_lives = snapshot.lives;
        prev_pellets = snapshot.pellets_left;
        prev_level = snapshot.level;

        if levels_cleared >= scenario.max_levels {
            outcome = RunOutcome::LevelsCleared;
            break;
        }
        match snapshot.status {
            GameStatus::LevelComplete => {
                engine.advance_level();
                prev_pellets = usize::MAX;
            }
            GameStatus::GameOver => {
                outcome = RunOutcome::GameOver;
                break;
            }
            _ => {}
        }
    }

    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            max_levels: scenario.max_levels,
            minutes: scenario.minutes,
            outcome,
            duration_ms: elapsed_ms,
            score: engine.score(),
            levels_cleared,
            pellets_eaten,
            ghosts_captured,
            lives_lost,
            power_runs,
            fruit_taken,
            anomalies,
        },
        anomaly_records,
        finished_tick: last_tick,
    }
}

/// Deterministic stand-in for the input collaborator: flee nearby hostile
/// ghosts, hunt frightened ones while powered, otherwise head for the
/// nearest pellet.
fn steer_pilot(world: &LevelWorld, engine: &mut GameEngine) {
    let snapshot = engine.build_snapshot(false);
    if snapshot.status != GameStatus::Playing {
        return;
    }
    let player = Vec2::new(snapshot.player.x as i32, snapshot.player.y as i32);

    let hostile: Vec<Vec2> = snapshot
        .ghosts
        .iter()
        .filter(|ghost| matches!(ghost.mode, GhostMode::Scatter | GhostMode::Chase))
        .map(|ghost| Vec2::new(ghost.x as i32, ghost.y as i32))
        .collect();
    let frightened: BTreeSet<Vec2> = snapshot
        .ghosts
        .iter()
        .filter(|ghost| ghost.mode == GhostMode::Frightened)
        .map(|ghost| Vec2::new(ghost.x as i32, ghost.y as i32))
        .collect();

    let nearest_threat = hostile
        .iter()
        .map(|ghost| manhattan(player, *ghost))
        .min()
        .unwrap_or(i32::MAX);
    if nearest_threat <= 3 {
        if let Some(dir) = escape_direction(world, player, &hostile) {
            engine.set_direction_intent(dir);
        }
        return;
    }

    if snapshot.player.powered && !frightened.is_empty() {
        if let Some(dir) = bfs_direction(world, player, &frightened) {
            engine.set_direction_intent(dir);
        }
        return;
    }

    let mut targets: BTreeSet<Vec2> = snapshot
        .pellets
        .iter()
        .map(|pellet| Vec2::new(pellet.x, pellet.y))
        .collect();
    if let Some(fruit) = &snapshot.fruit {
        let _ = targets.insert(Vec2::new(fruit.x, fruit.y));
    }
    if let Some(dir) = bfs_direction(world, player, &targets) {
        engine.set_direction_intent(dir);
    }
}

fn manhattan(a: Vec2, b: Vec2) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// First step of a shortest walkable route to any target cell.
fn bfs_direction(world: &LevelWorld, start: Vec2, targets: &BTreeSet<Vec2>) -> Option<Direction> {
    if targets.is_empty() || targets.contains(&start) {
        return None;
    }
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    let _ = seen.insert(start);
    for dir in Direction::CARDINAL {
        let next = world.wrapped_step(start, dir);
        if world.player_can_enter(next) && seen.insert(next) {
            queue.push_back((next, dir));
        }
    }
    while let Some((cell, first_dir)) = queue.pop_front() {
        if targets.contains(&cell) {
            return Some(first_dir);
        }
        for dir in Direction::CARDINAL {
            let next = world.wrapped_step(cell, dir);
            if world.player_can_enter(next) && seen.insert(next) {
                queue.push_back((next, first_dir));
            }
        }
    }
    None
}

/// Walkable neighbor that maximizes the distance to the closest hostile
/// ghost.
fn escape_direction(world: &LevelWorld, player: Vec2, hostile: &[Vec2]) -> Option<Direction> {
    let mut best: Option<(i32, Direction)> = None;
    for dir in Direction::CARDINAL {
        let next = world.wrapped_step(player, dir);
        if !world.player_can_enter(next) {
            continue;
        }
        let clearance = hostile
            .iter()
            .map(|ghost| manhattan(next, *ghost))
            .min()
            .unwrap_or(i32::MAX);
        if best.map(|(score, _)| clearance > score).unwrap_or(true) {
            best = Some((clearance, dir));
        }
    }
    best.map(|(_, dir)| dir)
}

fn collect_snapshot_anomalies(
    snapshot: &Snapshot,
    prev_score: i32,
    prev_lives: i32,
    prev_pellets: usize,
    prev_level: u32,
) -> Vec<String> {
    let mut anomalies = Vec::new();
    if snapshot.score < prev_score {
        anomalies.push(format!(
            "score decreased: {} -> {}",
            prev_score, snapshot.score
        ));
    }
    if snapshot.lives > prev_lives {
        anomalies.push(format!(
            "lives increased: {} -> {}",
            prev_lives, snapshot.lives
        ));
    }
    if snapshot.lives < 0 || snapshot.lives > STARTING_LIVES {
        anomalies.push(format!("lives out of range: {}", snapshot.lives));
    }
    if snapshot.level == prev_level && snapshot.pellets_left > prev_pellets {
        anomalies.push(format!(
            "pellet count increased: {} -> {}",
            prev_pellets, snapshot.pellets_left
        ));
    }
    let max_power = get_level_tuning(1).power_duration_ms;
    if snapshot.power_ms_left > max_power {
        anomalies.push(format!(
            "power countdown above maximum: {}",
            snapshot.power_ms_left
        ));
    }
    if snapshot.status == GameStatus::GameOver && snapshot.lives > 0 {
        anomalies.push("game over with lives remaining".to_string());
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }));

    if cli.single || cli.levels.is_some() || cli.minutes.is_some() {
        let max_levels = cli.levels.unwrap_or(1).clamp(1, 20);
        return vec![Scenario {
            name: format!("custom-l{max_levels}"),
            max_levels,
            minutes: cli.minutes.unwrap_or(3).clamp(1, 30),
            seed,
        }];
    }

    vec![
        Scenario {
            name: "quick-check".to_string(),
            max_levels: 1,
            minutes: 3,
            seed,
        },
        Scenario {
            name: "endurance".to_string(),
            max_levels: 3,
            minutes: 10,
            seed: normalize_seed(seed as u64 + 1),
        },
    ]
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn emit_log(
    level: &str,
    event: &str,
    match_id: &str,
    scenario: Option<&str>,
    seed: Option<u32>,
    tick: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        tick,
        details,
    };
    eprintln!(
        "{}",
        serde_json::to_string(&log_line).expect("structured log should serialize")
    );
}

fn outcome_key(outcome: RunOutcome) -> String {
    match outcome {
        RunOutcome::LevelsCleared => "levels_cleared",
        RunOutcome::GameOver => "game_over",
        RunOutcome::TimeLimit => "time_limit",
    }
    .to_string()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).expect("run summary should serialize");
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            10,
            "same anomaly".to_string(),
        );
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            11,
            "same anomaly".to_string(),
        );

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tick, 10);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn bfs_direction_finds_first_step_toward_nearest_target() {
        let world = LevelWorld::standard();
        let start = Vec2::new(1, 3);
        let mut targets = BTreeSet::new();
        let _ = targets.insert(Vec2::new(1, 1));
        assert_eq!(bfs_direction(&world, start, &targets), Some(Direction::Up));

        let _ = targets.insert(start);
        assert_eq!(bfs_direction(&world, start, &targets), None);
    }

    #[test]
    fn escape_direction_moves_away_from_the_threat() {
        let world = LevelWorld::standard();
        let player = Vec2::new(2, 3);
        let hostile = vec![Vec2::new(1, 3)];
        let dir = escape_direction(&world, player, &hostile).expect("an exit exists");
        let next = world.wrapped_step(player, dir);
        assert!(manhattan(next, hostile[0]) > manhattan(player, hostile[0]));
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("maze-chase-missing-{}", now_ms()))
            .join("summary.json");
        let summary = RunSummary {
            match_id: "sim-1-1".to_string(),
            started_at_ms: 1,
            finished_at_ms: 2,
            scenario_count: 0,
            anomaly_count: 0,
            outcome_counts: HashMap::new(),
            scenarios: Vec::new(),
        };
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn short_scenario_runs_clean_without_anomalies() {
        let scenario = Scenario {
            name: "test".to_string(),
            max_levels: 1,
            minutes: 1,
            seed: 20_240_214,
        };
        let run = run_scenario(&scenario);
        assert!(
            run.result.anomalies.is_empty(),
            "anomalies: {:?}",
            run.result.anomalies
        );
        assert!(run.result.pellets_eaten > 0);
        assert!(run.result.score > 0);
    }
}
