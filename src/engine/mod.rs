use std::collections::BTreeMap;

use crate::constants::{
    get_level_tuning, CAPTURED_SPEED_MULTIPLIER, FRIGHTENED_SPEED_MULTIPLIER, FRUIT_ACTIVE_MS,
    FRUIT_PELLET_TRIGGER, GHOST_RADIUS, PLAYER_RADIUS, STARTING_LIVES, TICK_RATE,
};
use crate::pathfinding::PathFinder;
use crate::rng::Rng;
use crate::types::{
    Direction, FruitKind, FruitView, GameConfig, GameStatus, GhostKind, GhostMode, GhostView,
    PelletView, PlayerView, RuntimeEvent, Snapshot, Vec2,
};
use crate::world::LevelWorld;

pub mod behavior;
pub mod scheduler;

mod collision;
mod utils;

use self::behavior::select_target;
use self::scheduler::PhaseScheduler;

#[derive(Clone, Debug)]
struct PlayerInternal {
    cell: Vec2,
    dir: Direction,
    /// Direction intent queued by the input collaborator; applied at the
    /// start of a tick once it points at a walkable tile.
    pending_dir: Direction,
    move_buffer: f32,
    powered: bool,
}

#[derive(Clone, Debug)]
struct GhostInternal {
    id: String,
    kind: GhostKind,
    cell: Vec2,
    dir: Direction,
    mode: GhostMode,
    target: Vec2,
    move_buffer: f32,
}

#[derive(Clone, Debug)]
struct FruitInternal {
    kind: FruitKind,
    cell: Vec2,
    ms_left: u64,
}

#[derive(Clone, Debug)]
pub struct GameEngineOptions {
    pub starting_level: u32,
    pub starting_lives: i32,
}

impl Default for GameEngineOptions {
    fn default() -> Self {
        Self {
            starting_level: 1,
            starting_lives: STARTING_LIVES,
        }
    }
}

/// The whole simulation: one player, four ghosts, the pellet field and the
/// bookkeeping around them. Single writer — all mutation happens inside
/// `step`, which advances one uninterruptible unit of logical time. Readers
/// take `build_snapshot` copies on their own cadence.
#[derive(Clone, Debug)]
pub struct GameEngine {
    pub config: GameConfig,
    world: LevelWorld,
    pathfinder: PathFinder,
    scheduler: PhaseScheduler,
    rng: Rng,

    status: GameStatus,
    score: i32,
    lives: i32,
    level: u32,

    player: PlayerInternal,
    ghosts: Vec<GhostInternal>,
    pellets: BTreeMap<Vec2, bool>,
    fruit: Option<FruitInternal>,
    fruit_spawned_this_level: bool,
    pellets_eaten_this_level: usize,

    power_ms_left: u64,
    power_started_this_tick: bool,
    combo_captures: u32,

    events: Vec<RuntimeEvent>,
    elapsed_ms: u64,
    tick_counter: u64,
}

impl GameEngine {
    pub fn new(seed: u32, options: GameEngineOptions) -> Self {
        let level = options.starting_level.max(1);
        let world = LevelWorld::standard();
        let tuning = get_level_tuning(level);
        let scheduler = PhaseScheduler::new(tuning.phase_segments);

        let player = PlayerInternal {
            cell: world.player_spawn,
            dir: Direction::None,
            pending_dir: Direction::None,
            move_buffer: 0.0,
            powered: false,
        };
        let ghosts = GhostKind::ALL
            .iter()
            .enumerate()
            .map(|(index, &kind)| GhostInternal {
                id: format!("ghost_{}", index + 1),
                kind,
                cell: world.ghost_spawn(kind),
                dir: Direction::Up,
                mode: scheduler.current_mode(),
                target: world.ghost_spawn(kind),
                move_buffer: 0.0,
            })
            .collect();
        let pellets = world.pellet_cells().into_iter().collect();

        Self {
            config: GameConfig {
                tick_rate: TICK_RATE,
                starting_lives: options.starting_lives,
                seed,
            },
            world,
            pathfinder: PathFinder::new(),
            scheduler,
            rng: Rng::new(seed),
            status: GameStatus::Playing,
            score: 0,
            lives: options.starting_lives,
            level,
            player,
            ghosts,
            pellets,
            fruit: None,
            fruit_spawned_this_level: false,
            pellets_eaten_this_level: 0,
            power_ms_left: 0,
            power_started_this_tick: false,
            combo_captures: 0,
            events: Vec::new(),
            elapsed_ms: 0,
            tick_counter: 0,
        }
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn lives(&self) -> i32 {
        self.lives
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn power_ms_left(&self) -> u64 {
        self.power_ms_left
    }

    pub fn pellets_left(&self) -> usize {
        self.pellets.len()
    }

    pub fn is_ended(&self) -> bool {
        self.status == GameStatus::GameOver
    }

    /// Queues a direction intent from the input collaborator. It takes
    /// effect at the start of the next tick, and only once the requested
    /// direction is immediately walkable; until then the previous direction
    /// persists.
    pub fn set_direction_intent(&mut self, dir: Direction) {
        self.player.pending_dir = dir;
    }

    /// Freezes tick advancement entirely. Scheduler timers, power countdown
    /// and movement all stop; `resume` continues from the accumulated state.
    pub fn pause(&mut self) {
        if self.status == GameStatus::Playing {
            self.status = GameStatus::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.status == GameStatus::Paused {
            self.status = GameStatus::Playing;
        }
    }

    /// Loads the next level after a completed one: grid replaced wholesale,
    /// pellet set rebuilt, path cache dropped, phase timeline and positions
    /// reset. Score and lives carry over.
    pub fn advance_level(&mut self) {
        if self.status != GameStatus::LevelComplete {
            return;
        }
        self.level += 1;
        self.load_level();
        self.status = GameStatus::Playing;
    }

    fn load_level(&mut self) {
        let tuning = get_level_tuning(self.level);
        self.world = LevelWorld::standard();
        self.pellets = self.world.pellet_cells().into_iter().collect();
        self.pathfinder.clear();
        self.scheduler = PhaseScheduler::new(tuning.phase_segments);
        self.fruit = None;
        self.fruit_spawned_this_level = false;
        self.pellets_eaten_this_level = 0;
        self.clear_power_mode();
        self.reset_positions();
    }

    fn reset_positions(&mut self) {
        self.player.cell = self.world.player_spawn;
        self.player.dir = Direction::None;
        self.player.pending_dir = Direction::None;
        self.player.move_buffer = 0.0;
        let mode = self.scheduler.current_mode();
        for ghost in &mut self.ghosts {
            ghost.cell = self.world.ghost_spawn(ghost.kind);
            ghost.dir = Direction::Up;
            ghost.mode = mode;
            ghost.target = ghost.cell;
            ghost.move_buffer = 0.0;
        }
    }

    fn clear_power_mode(&mut self) {
        self.player.powered = false;
        self.power_ms_left = 0;
        self.combo_captures = 0;
    }

    /// One simulation tick: phase advance, behavior targets, movement,
    /// collision consequences, then the power-mode countdown.
    pub fn step(&mut self, dt_ms: u64) {
        if self.status != GameStatus::Playing {
            return;
        }
        self.tick_counter += 1;
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);
        self.power_started_this_tick = false;

        for mode in self.scheduler.advance(dt_ms) {
            self.events.push(RuntimeEvent::PhaseChanged { mode });
            for ghost in &mut self.ghosts {
                if matches!(ghost.mode, GhostMode::Scatter | GhostMode::Chase) {
                    ghost.mode = mode;
                }
            }
        }

        self.refresh_ghost_targets();

        let player_before = self.player.cell;
        let ghosts_before: Vec<Vec2> = self.ghosts.iter().map(|ghost| ghost.cell).collect();
        self.update_player(dt_ms);
        self.update_ghosts(dt_ms);

        self.resolve_collisions(player_before, &ghosts_before);

        self.update_power_mode(dt_ms);
        self.update_fruit(dt_ms);
    }

    fn refresh_ghost_targets(&mut self) {
        let lead = self
            .ghosts
            .iter()
            .find(|ghost| ghost.kind == GhostKind::Hunter)
            .map(|ghost| ghost.cell);
        let player_cell = self.player.cell;
        let player_dir = self.player.dir;
        let global_mode = self.scheduler.current_mode();
        for ghost in &mut self.ghosts {
            ghost.target = select_target(
                &self.world,
                ghost.kind,
                ghost.mode,
                ghost.cell,
                player_cell,
                player_dir,
                lead,
                global_mode,
            );
        }
    }

    fn update_player(&mut self, dt_ms: u64) {
        self.try_apply_pending_dir();

        let speed = get_level_tuning(self.level).player_speed;
        self.player.move_buffer += speed * dt_ms as f32 / 1000.0;
        let mut safety = 0;
        while self.player.move_buffer >= 1.0 {
            self.try_apply_pending_dir();
            let next = self.world.wrapped_step(self.player.cell, self.player.dir);
            if self.player.dir == Direction::None || !self.world.player_can_enter(next) {
                self.player.move_buffer = 0.0;
                break;
            }
            self.player.move_buffer -= 1.0;
            self.player.cell = next;
            safety += 1;
            if safety > 6 {
                break;
            }
        }
    }

    fn try_apply_pending_dir(&mut self) {
        if self.player.pending_dir == Direction::None {
            return;
        }
        let requested = self.world.wrapped_step(self.player.cell, self.player.pending_dir);
        if self.world.player_can_enter(requested) {
            self.player.dir = self.player.pending_dir;
            self.player.pending_dir = Direction::None;
        }
    }

    fn update_ghosts(&mut self, dt_ms: u64) {
        let base_speed = get_level_tuning(self.level).ghost_speed;
        for idx in 0..self.ghosts.len() {
            let speed = base_speed
                * match self.ghosts[idx].mode {
                    GhostMode::Frightened => FRIGHTENED_SPEED_MULTIPLIER,
                    GhostMode::Captured => CAPTURED_SPEED_MULTIPLIER,
                    _ => 1.0,
                };
            self.ghosts[idx].move_buffer += speed * dt_ms as f32 / 1000.0;
            let mut safety = 0;
            while self.ghosts[idx].move_buffer >= 1.0 {
                self.ghosts[idx].move_buffer -= 1.0;
                safety += 1;
                if safety > 5 {
                    break;
                }

                let dir = self.choose_ghost_direction(idx);
                if dir == Direction::None {
                    continue;
                }
                let next = self.world.wrapped_step(self.ghosts[idx].cell, dir);
                if self
                    .world
                    .ghost_can_enter(self.ghosts[idx].mode, self.ghosts[idx].cell, next)
                {
                    self.ghosts[idx].cell = next;
                    self.ghosts[idx].dir = dir;
                }

                if self.ghosts[idx].mode == GhostMode::Captured
                    && self.ghosts[idx].cell == self.world.house_center
                {
                    self.ghosts[idx].mode = self.scheduler.current_mode();
                    self.ghosts[idx].dir = Direction::Up;
                    self.events.push(RuntimeEvent::GhostRecovered {
                        ghost: self.ghosts[idx].kind,
                    });
                }
            }
        }
    }

    /// Direction decision at a tile boundary. Frightened ghosts roll a
    /// seeded pseudo-random turn, avoiding a reversal unless it is the only
    /// exit. Everyone else routes toward the behavior target: A* when the
    /// target is an open tile, greedy steering otherwise (scatter corners
    /// and lead-ahead targets may sit on walls or off the grid).
    fn choose_ghost_direction(&mut self, idx: usize) -> Direction {
        let cell = self.ghosts[idx].cell;
        let mode = self.ghosts[idx].mode;
        let current_dir = self.ghosts[idx].dir;
        let target = self.ghosts[idx].target;

        let mut options = Vec::with_capacity(4);
        for dir in Direction::CARDINAL {
            let next = self.world.wrapped_step(cell, dir);
            if self.world.ghost_can_enter(mode, cell, next) {
                options.push(dir);
            }
        }
        if options.is_empty() {
            return Direction::None;
        }

        if mode == GhostMode::Frightened {
            let non_reverse: Vec<Direction> = options
                .iter()
                .copied()
                .filter(|dir| *dir != current_dir.opposite())
                .collect();
            let pool = if non_reverse.is_empty() {
                &options
            } else {
                &non_reverse
            };
            return pool[self.rng.pick_index(pool.len())];
        }

        if self.world.in_bounds(target) && self.world.is_open(target) {
            let path = self.pathfinder.find_path(&self.world, cell, target);
            if path.len() >= 2 {
                let step = path[1];
                for dir in Direction::CARDINAL {
                    let next = self.world.wrapped_step(cell, dir);
                    if next == step && self.world.ghost_can_enter(mode, cell, next) {
                        return dir;
                    }
                }
            }
        }

        let mut best = options[0];
        let mut best_dist = f32::MAX;
        for &dir in &options {
            if dir == current_dir.opposite() && options.len() > 1 {
                continue;
            }
            let next = self.world.wrapped_step(cell, dir);
            let dx = (next.x - target.x) as f32;
            let dy = (next.y - target.y) as f32;
            let dist = dx * dx + dy * dy;
            if dist < best_dist {
                best_dist = dist;
                best = dir;
            }
        }
        best
    }

    fn update_power_mode(&mut self, dt_ms: u64) {
        if self.power_ms_left == 0 || self.power_started_this_tick {
            return;
        }
        self.power_ms_left = self.power_ms_left.saturating_sub(dt_ms);
        if self.power_ms_left > 0 {
            return;
        }
        self.player.powered = false;
        self.combo_captures = 0;
        // Frightened ghosts rejoin whatever phase the scheduler currently
        // reports, not a hardcoded mode.
        let mode = self.scheduler.current_mode();
        for ghost in &mut self.ghosts {
            if ghost.mode == GhostMode::Frightened {
                ghost.mode = mode;
            }
        }
        self.events.push(RuntimeEvent::PowerModeEnded);
    }

    fn update_fruit(&mut self, dt_ms: u64) {
        if let Some(fruit) = &mut self.fruit {
            fruit.ms_left = fruit.ms_left.saturating_sub(dt_ms);
            if fruit.ms_left == 0 {
                self.fruit = None;
                self.events.push(RuntimeEvent::FruitExpired);
            }
        }
    }

    fn maybe_spawn_fruit(&mut self) {
        if self.fruit_spawned_this_level
            || self.pellets_eaten_this_level < FRUIT_PELLET_TRIGGER
            || self.fruit.is_some()
        {
            return;
        }
        let kind = get_level_tuning(self.level).fruit;
        let cell = self.world.fruit_cell;
        self.fruit = Some(FruitInternal {
            kind,
            cell,
            ms_left: FRUIT_ACTIVE_MS,
        });
        self.fruit_spawned_this_level = true;
        self.events.push(RuntimeEvent::FruitSpawned {
            kind,
            x: cell.x,
            y: cell.y,
        });
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let snapshot = Snapshot {
            tick: self.tick_counter,
            elapsed_ms: self.elapsed_ms,
            status: self.status,
            score: self.score,
            lives: self.lives,
            level: self.level,
            phase_mode: self.scheduler.current_mode(),
            power_ms_left: self.power_ms_left,
            combo_multiplier: 1 << self.combo_captures.min(30),
            pellets_left: self.pellets.len(),
            player: PlayerView {
                x: self.player.cell.x as f32,
                y: self.player.cell.y as f32,
                dir: self.player.dir,
                powered: self.player.powered,
                radius: PLAYER_RADIUS,
            },
            ghosts: self
                .ghosts
                .iter()
                .map(|ghost| GhostView {
                    id: ghost.id.clone(),
                    kind: ghost.kind,
                    x: ghost.cell.x as f32,
                    y: ghost.cell.y as f32,
                    dir: ghost.dir,
                    mode: ghost.mode,
                    frightened_ms_left: if ghost.mode == GhostMode::Frightened {
                        self.power_ms_left
                    } else {
                        0
                    },
                    target: ghost.target,
                    radius: GHOST_RADIUS,
                })
                .collect(),
            pellets: self
                .pellets
                .iter()
                .map(|(cell, power)| PelletView {
                    x: cell.x,
                    y: cell.y,
                    power: *power,
                })
                .collect(),
            fruit: self.fruit.as_ref().map(|fruit| FruitView {
                kind: fruit.kind,
                x: fruit.cell.x,
                y: fruit.cell.y,
                ms_left: fruit.ms_left,
            }),
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TICK_MS;

    fn make_engine(seed: u32) -> GameEngine {
        GameEngine::new(seed, GameEngineOptions::default())
    }

    fn scripted_dir(tick: u64) -> Direction {
        match (tick / 40) % 4 {
            0 => Direction::Left,
            1 => Direction::Up,
            2 => Direction::Right,
            _ => Direction::Down,
        }
    }

    #[test]
    fn same_seed_produces_same_progression() {
        let mut a = make_engine(424_242);
        let mut b = make_engine(424_242);

        for tick in 0..400u64 {
            a.set_direction_intent(scripted_dir(tick));
            b.set_direction_intent(scripted_dir(tick));
            a.step(TICK_MS);
            b.step(TICK_MS);

            let sa = a.build_snapshot(false);
            let sb = b.build_snapshot(false);
            assert_eq!(sa.score, sb.score);
            assert_eq!(sa.lives, sb.lives);
            assert_eq!(sa.status, sb.status);
            assert_eq!(sa.pellets_left, sb.pellets_left);
            assert_eq!(sa.player.x.to_bits(), sb.player.x.to_bits());
            assert_eq!(sa.player.y.to_bits(), sb.player.y.to_bits());
            for (ga, gb) in sa.ghosts.iter().zip(sb.ghosts.iter()) {
                assert_eq!(ga.x.to_bits(), gb.x.to_bits());
                assert_eq!(ga.y.to_bits(), gb.y.to_bits());
                assert_eq!(ga.mode, gb.mode);
            }
        }
    }

    #[test]
    fn intent_into_a_wall_keeps_the_previous_direction() {
        let mut engine = make_engine(1);
        // Spawn row: up is a wall, left is open.
        engine.set_direction_intent(Direction::Up);
        engine.step(TICK_MS);
        assert_eq!(engine.player.dir, Direction::None);
        assert_eq!(engine.player.pending_dir, Direction::Up);

        engine.set_direction_intent(Direction::Left);
        engine.step(TICK_MS);
        assert_eq!(engine.player.dir, Direction::Left);
        assert_eq!(engine.player.pending_dir, Direction::None);
    }

    #[test]
    fn pause_freezes_everything_and_resume_continues() {
        let mut engine = make_engine(7);
        engine.set_direction_intent(Direction::Left);
        for _ in 0..20 {
            engine.step(TICK_MS);
        }
        let before = engine.build_snapshot(false);

        engine.pause();
        assert_eq!(engine.status(), GameStatus::Paused);
        for _ in 0..100 {
            engine.step(TICK_MS);
        }
        let frozen = engine.build_snapshot(false);
        assert_eq!(frozen.tick, before.tick);
        assert_eq!(frozen.elapsed_ms, before.elapsed_ms);
        assert_eq!(frozen.player.x.to_bits(), before.player.x.to_bits());
        assert_eq!(frozen.phase_mode, before.phase_mode);

        engine.resume();
        engine.step(TICK_MS);
        assert_eq!(engine.build_snapshot(false).tick, before.tick + 1);
    }

    #[test]
    fn phase_transition_flips_ghost_modes_but_not_frightened_or_captured() {
        let mut engine = make_engine(9);
        engine.ghosts[0].mode = GhostMode::Frightened;
        engine.power_ms_left = 60_000;
        engine.ghosts[1].mode = GhostMode::Captured;
        // Freeze both so the captured one cannot reach home and recover
        // during the movement phase.
        engine.ghosts[0].move_buffer = -1_000_000.0;
        engine.ghosts[1].move_buffer = -1_000_000.0;

        // First tier one segment is 7s of scatter; push past it.
        engine.step(7_050);
        assert_eq!(engine.scheduler.current_mode(), GhostMode::Chase);
        assert_eq!(engine.ghosts[0].mode, GhostMode::Frightened);
        assert_eq!(engine.ghosts[1].mode, GhostMode::Captured);
        assert_eq!(engine.ghosts[2].mode, GhostMode::Chase);
        assert_eq!(engine.ghosts[3].mode, GhostMode::Chase);
    }

    #[test]
    fn power_expiry_reverts_frightened_ghosts_to_scheduler_mode() {
        let mut engine = make_engine(11);
        engine.activate_power_mode();
        assert!(engine.player.powered);
        assert!(engine
            .ghosts
            .iter()
            .all(|ghost| ghost.mode == GhostMode::Frightened));

        // Ticks after the activation tick drain the countdown.
        let duration = engine.power_ms_left;
        engine.step(duration + TICK_MS);
        assert_eq!(engine.power_ms_left, 0);
        assert!(!engine.player.powered);
        let expected = engine.scheduler.current_mode();
        assert!(engine.ghosts.iter().all(|ghost| ghost.mode == expected));
    }

    #[test]
    fn advance_level_reloads_pellets_and_keeps_score() {
        let mut engine = make_engine(13);
        engine.score = 1_234;
        engine.lives = 2;
        engine.status = GameStatus::LevelComplete;
        engine.pellets.clear();

        engine.advance_level();
        assert_eq!(engine.level(), 2);
        assert_eq!(engine.status(), GameStatus::Playing);
        assert_eq!(engine.score(), 1_234);
        assert_eq!(engine.lives(), 2);
        assert!(engine.pellets_left() > 0);
        assert_eq!(engine.player.cell, engine.world.player_spawn);
    }

    #[test]
    fn advance_level_is_a_no_op_while_playing() {
        let mut engine = make_engine(13);
        engine.advance_level();
        assert_eq!(engine.level(), 1);
    }

    #[test]
    fn captured_ghost_is_routed_home_and_recovers_there() {
        let mut engine = make_engine(17);
        for ghost in &mut engine.ghosts {
            ghost.mode = GhostMode::Captured;
            ghost.cell = engine.world.house_center;
            ghost.move_buffer = -1_000_000.0;
        }
        // Two cells from home, just above the gate.
        engine.ghosts[0].cell = Vec2::new(engine.world.gate.x, engine.world.gate.y - 1);
        engine.ghosts[0].move_buffer = 0.0;

        let mut recovered = false;
        for _ in 0..200 {
            engine.step(TICK_MS);
            if engine
                .build_snapshot(true)
                .events
                .iter()
                .any(|event| matches!(event, RuntimeEvent::GhostRecovered { ghost } if *ghost == GhostKind::Hunter))
            {
                recovered = true;
                break;
            }
        }
        assert!(recovered, "captured ghost never reached the house");
        assert_ne!(engine.ghosts[0].mode, GhostMode::Captured);
    }

    #[test]
    fn fruit_spawns_after_threshold_and_expires() {
        let mut engine = make_engine(19);
        engine.pellets_eaten_this_level = FRUIT_PELLET_TRIGGER;
        engine.maybe_spawn_fruit();
        assert!(engine.fruit.is_some());

        engine.step(FRUIT_ACTIVE_MS + TICK_MS);
        assert!(engine.fruit.is_none());
        let events = engine.build_snapshot(true).events;
        assert!(events
            .iter()
            .any(|event| matches!(event, RuntimeEvent::FruitExpired)));
    }

    #[test]
    fn snapshot_drains_events_only_when_requested() {
        let mut engine = make_engine(23);
        engine.events.push(RuntimeEvent::PowerModeEnded);

        let kept = engine.build_snapshot(false);
        assert!(kept.events.is_empty());
        let drained = engine.build_snapshot(true);
        assert_eq!(drained.events.len(), 1);
        let after = engine.build_snapshot(true);
        assert!(after.events.is_empty());
    }
}
