use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::None => Self::None,
        }
    }

    pub const CARDINAL: [Direction; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Empty,
    Wall,
    Pellet,
    PowerPellet,
    Gate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostKind {
    Hunter,
    Ambusher,
    Flanker,
    Lurker,
}

impl GhostKind {
    pub const ALL: [GhostKind; 4] = [Self::Hunter, Self::Ambusher, Self::Flanker, Self::Lurker];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostMode {
    Scatter,
    Chase,
    Frightened,
    Captured,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Playing,
    Paused,
    LevelComplete,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FruitKind {
    Cherry,
    Strawberry,
    Orange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseSegment {
    pub mode: GhostMode,
    /// `None` marks the terminal segment with unbounded duration.
    pub duration_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameConfig {
    #[serde(rename = "tickRate")]
    pub tick_rate: u32,
    #[serde(rename = "startingLives")]
    pub starting_lives: i32,
    pub seed: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub x: f32,
    pub y: f32,
    pub dir: Direction,
    pub powered: bool,
    pub radius: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct GhostView {
    pub id: String,
    pub kind: GhostKind,
    pub x: f32,
    pub y: f32,
    pub dir: Direction,
    pub mode: GhostMode,
    #[serde(rename = "frightenedMsLeft")]
    pub frightened_ms_left: u64,
    pub target: Vec2,
    pub radius: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PelletView {
    pub x: i32,
    pub y: i32,
    pub power: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct FruitView {
    pub kind: FruitKind,
    pub x: i32,
    pub y: i32,
    #[serde(rename = "msLeft")]
    pub ms_left: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    PelletEaten {
        x: i32,
        y: i32,
        power: bool,
        points: i32,
    },
    PowerModeStarted {
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    },
    PowerModeEnded,
    PhaseChanged {
        mode: GhostMode,
    },
    GhostCaptured {
        ghost: GhostKind,
        points: i32,
        combo: u32,
    },
    GhostRecovered {
        ghost: GhostKind,
    },
    FruitSpawned {
        kind: FruitKind,
        x: i32,
        y: i32,
    },
    FruitTaken {
        kind: FruitKind,
        points: i32,
    },
    FruitExpired,
    LifeLost {
        #[serde(rename = "livesLeft")]
        lives_left: i32,
    },
    LevelCompleted {
        level: u32,
    },
    GameOver {
        #[serde(rename = "finalScore")]
        final_score: i32,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "elapsedMs")]
    pub elapsed_ms: u64,
    pub status: GameStatus,
    pub score: i32,
    pub lives: i32,
    pub level: u32,
    #[serde(rename = "phaseMode")]
    pub phase_mode: GhostMode,
    #[serde(rename = "powerMsLeft")]
    pub power_ms_left: u64,
    #[serde(rename = "comboMultiplier")]
    pub combo_multiplier: i32,
    #[serde(rename = "pelletsLeft")]
    pub pellets_left: usize,
    pub player: PlayerView,
    pub ghosts: Vec<GhostView>,
    pub pellets: Vec<PelletView>,
    pub fruit: Option<FruitView>,
    pub events: Vec<RuntimeEvent>,
}
