use crate::types::{FruitKind, GhostMode, PhaseSegment};

pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const STARTING_LIVES: i32 = 3;

pub const PELLET_SCORE: i32 = 10;
pub const POWER_PELLET_SCORE: i32 = 50;
pub const GHOST_CAPTURE_BASE_SCORE: i32 = 200;

pub const PLAYER_RADIUS: f32 = 0.45;
pub const GHOST_RADIUS: f32 = 0.45;
pub const PELLET_RADIUS: f32 = 0.3;
pub const FRUIT_RADIUS: f32 = 0.4;

pub const FRIGHTENED_SPEED_MULTIPLIER: f32 = 0.6;
pub const CAPTURED_SPEED_MULTIPLIER: f32 = 1.5;

pub const FRUIT_PELLET_TRIGGER: usize = 40;
pub const FRUIT_ACTIVE_MS: u64 = 10_000;

/// Euclidean distance (in tiles) below which the Lurker retreats to its corner.
pub const LURKER_RETREAT_DISTANCE: f32 = 8.0;

const PHASES_EASY: &[PhaseSegment] = &[
    PhaseSegment {
        mode: GhostMode::Scatter,
        duration_ms: Some(7_000),
    },
    PhaseSegment {
        mode: GhostMode::Chase,
        duration_ms: Some(20_000),
    },
    PhaseSegment {
        mode: GhostMode::Scatter,
        duration_ms: Some(7_000),
    },
    PhaseSegment {
        mode: GhostMode::Chase,
        duration_ms: Some(20_000),
    },
    PhaseSegment {
        mode: GhostMode::Scatter,
        duration_ms: Some(5_000),
    },
    PhaseSegment {
        mode: GhostMode::Chase,
        duration_ms: Some(20_000),
    },
    PhaseSegment {
        mode: GhostMode::Scatter,
        duration_ms: Some(5_000),
    },
    PhaseSegment {
        mode: GhostMode::Chase,
        duration_ms: None,
    },
];

const PHASES_MEDIUM: &[PhaseSegment] = &[
    PhaseSegment {
        mode: GhostMode::Scatter,
        duration_ms: Some(7_000),
    },
    PhaseSegment {
        mode: GhostMode::Chase,
        duration_ms: Some(20_000),
    },
    PhaseSegment {
        mode: GhostMode::Scatter,
        duration_ms: Some(5_000),
    },
    PhaseSegment {
        mode: GhostMode::Chase,
        duration_ms: Some(20_000),
    },
    PhaseSegment {
        mode: GhostMode::Scatter,
        duration_ms: Some(3_000),
    },
    PhaseSegment {
        mode: GhostMode::Chase,
        duration_ms: None,
    },
];

const PHASES_HARD: &[PhaseSegment] = &[
    PhaseSegment {
        mode: GhostMode::Scatter,
        duration_ms: Some(5_000),
    },
    PhaseSegment {
        mode: GhostMode::Chase,
        duration_ms: Some(20_000),
    },
    PhaseSegment {
        mode: GhostMode::Scatter,
        duration_ms: Some(3_000),
    },
    PhaseSegment {
        mode: GhostMode::Chase,
        duration_ms: None,
    },
];

#[derive(Clone, Copy, Debug)]
pub struct LevelTuning {
    /// Player speed in tiles per second.
    pub player_speed: f32,
    /// Ghost speed in tiles per second, before mode multipliers.
    pub ghost_speed: f32,
    pub power_duration_ms: u64,
    pub fruit: FruitKind,
    pub phase_segments: &'static [PhaseSegment],
}

static LEVEL_TIERS: [LevelTuning; 3] = [
    LevelTuning {
        player_speed: 5.0,
        ghost_speed: 3.75,
        power_duration_ms: 6_000,
        fruit: FruitKind::Cherry,
        phase_segments: PHASES_EASY,
    },
    LevelTuning {
        player_speed: 5.25,
        ghost_speed: 4.25,
        power_duration_ms: 5_000,
        fruit: FruitKind::Strawberry,
        phase_segments: PHASES_MEDIUM,
    },
    LevelTuning {
        player_speed: 5.5,
        ghost_speed: 4.75,
        power_duration_ms: 4_000,
        fruit: FruitKind::Orange,
        phase_segments: PHASES_HARD,
    },
];

/// Levels beyond the defined tiers fall back to the hardest tier so the
/// simulation never halts on missing level data.
pub fn get_level_tuning(level: u32) -> &'static LevelTuning {
    let index = (level.max(1) as usize - 1).min(LEVEL_TIERS.len() - 1);
    &LEVEL_TIERS[index]
}

pub fn fruit_points(kind: FruitKind) -> i32 {
    match kind {
        FruitKind::Cherry => 100,
        FruitKind::Strawberry => 300,
        FruitKind::Orange => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_levels_fall_back_to_hardest_tier() {
        assert_eq!(get_level_tuning(3).power_duration_ms, 4_000);
        assert_eq!(get_level_tuning(4).power_duration_ms, 4_000);
        assert_eq!(get_level_tuning(99).power_duration_ms, 4_000);
        assert_eq!(get_level_tuning(0).power_duration_ms, 6_000);
    }

    #[test]
    fn power_duration_decreases_with_level() {
        assert!(
            get_level_tuning(1).power_duration_ms > get_level_tuning(2).power_duration_ms
                && get_level_tuning(2).power_duration_ms > get_level_tuning(3).power_duration_ms
        );
    }

    #[test]
    fn every_phase_table_ends_with_unbounded_chase() {
        for tuning in [get_level_tuning(1), get_level_tuning(2), get_level_tuning(3)] {
            let last = tuning.phase_segments.last().expect("non-empty table");
            assert_eq!(last.mode, GhostMode::Chase);
            assert!(last.duration_ms.is_none());
            for segment in &tuning.phase_segments[..tuning.phase_segments.len() - 1] {
                assert!(segment.duration_ms.is_some());
            }
        }
    }
}
