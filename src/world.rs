use crate::types::{Direction, GhostKind, GhostMode, TileKind, Vec2};

/// Fixed maze shared by every difficulty tier. `#` wall, `.` pellet,
/// `o` power pellet, `-` ghost-house gate, space = open floor.
/// Row 7 is the tunnel row: its left/right edges wrap horizontally.
pub const LEVEL_LAYOUT: [&str; 15] = [
    "###################",
    "#........#........#",
    "#o##.###.#.###.##o#",
    "#.................#",
    "#.###.##.#.##.###.#",
    "#.#...#.....#...#.#",
    "#.#.#.###-###.#.#.#",
    "       #   #       ",
    "#.#.#.#######.#.#.#",
    "#...#....#....#...#",
    "#.###.##.#.##.###.#",
    "#o.#.....#.....#.o#",
    "#.##.###.#.###.##.#",
    "#........ ........#",
    "###################",
];

#[derive(Clone, Debug)]
pub struct LevelWorld {
    pub width: i32,
    pub height: i32,
    tiles: Vec<TileKind>,
    pub player_spawn: Vec2,
    /// Recovery point captured ghosts are routed to.
    pub house_center: Vec2,
    pub gate: Vec2,
    pub fruit_cell: Vec2,
    house_cells: Vec<Vec2>,
}

impl LevelWorld {
    pub fn standard() -> Self {
        Self::parse(&LEVEL_LAYOUT)
    }

    pub fn parse(layout: &[&str]) -> Self {
        let height = layout.len() as i32;
        let width = layout.first().map(|row| row.len()).unwrap_or(0) as i32;
        let mut tiles = Vec::with_capacity((width * height) as usize);
        let mut gate = Vec2::new(0, 0);

        for row in layout {
            for glyph in row.bytes() {
                let kind = match glyph {
                    b'#' => TileKind::Wall,
                    b'.' => TileKind::Pellet,
                    b'o' => TileKind::PowerPellet,
                    b'-' => TileKind::Gate,
                    _ => TileKind::Empty,
                };
                tiles.push(kind);
            }
        }

        for y in 0..height {
            for x in 0..width {
                if tiles[(y * width + x) as usize] == TileKind::Gate {
                    gate = Vec2::new(x, y);
                }
            }
        }

        // The house interior sits directly below the gate, bounded by walls.
        let mut house_cells = Vec::new();
        let interior_y = gate.y + 1;
        let mut x = gate.x;
        while x > 0 && tiles[(interior_y * width + x - 1) as usize] == TileKind::Empty {
            x -= 1;
        }
        while x < width && tiles[(interior_y * width + x) as usize] == TileKind::Empty {
            house_cells.push(Vec2::new(x, interior_y));
            x += 1;
        }
        let house_center = house_cells
            .get(house_cells.len() / 2)
            .copied()
            .unwrap_or(gate);

        Self {
            width,
            height,
            tiles,
            player_spawn: Vec2::new(width / 2, height - 2),
            house_center,
            gate,
            fruit_cell: Vec2::new(width / 2, 3),
            house_cells,
        }
    }

    pub fn in_bounds(&self, pos: Vec2) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn tile(&self, pos: Vec2) -> TileKind {
        if !self.in_bounds(pos) {
            return TileKind::Wall;
        }
        self.tiles[(pos.y * self.width + pos.x) as usize]
    }

    /// Any non-wall tile; the expansion rule used by pathfinding.
    pub fn is_open(&self, pos: Vec2) -> bool {
        self.tile(pos) != TileKind::Wall
    }

    pub fn is_house_cell(&self, pos: Vec2) -> bool {
        self.house_cells.contains(&pos)
    }

    /// The gate is ghost-only, so the player can never enter the house.
    pub fn player_can_enter(&self, pos: Vec2) -> bool {
        self.is_open(pos) && self.tile(pos) != TileKind::Gate
    }

    /// Ghosts pass the gate only on the way home (Captured) or when leaving
    /// the house interior.
    pub fn ghost_can_enter(&self, mode: GhostMode, from: Vec2, to: Vec2) -> bool {
        if !self.is_open(to) {
            return false;
        }
        if self.tile(to) == TileKind::Gate {
            return mode == GhostMode::Captured || self.is_house_cell(from);
        }
        true
    }

    /// One cell in `dir`, wrapping across the horizontal bounds when the
    /// wrapped cell is open (tunnel rows). Vertical bounds never wrap.
    pub fn wrapped_step(&self, pos: Vec2, dir: Direction) -> Vec2 {
        let stepped = match dir {
            Direction::Up => Vec2::new(pos.x, pos.y - 1),
            Direction::Down => Vec2::new(pos.x, pos.y + 1),
            Direction::Left => Vec2::new(pos.x - 1, pos.y),
            Direction::Right => Vec2::new(pos.x + 1, pos.y),
            Direction::None => pos,
        };
        if stepped.x < 0 {
            let wrapped = Vec2::new(self.width - 1, stepped.y);
            if self.is_open(wrapped) {
                return wrapped;
            }
        } else if stepped.x >= self.width {
            let wrapped = Vec2::new(0, stepped.y);
            if self.is_open(wrapped) {
                return wrapped;
            }
        }
        stepped
    }

    pub fn scatter_corner(&self, kind: GhostKind) -> Vec2 {
        match kind {
            GhostKind::Hunter => Vec2::new(self.width - 2, 1),
            GhostKind::Ambusher => Vec2::new(1, 1),
            GhostKind::Flanker => Vec2::new(self.width - 2, self.height - 2),
            GhostKind::Lurker => Vec2::new(1, self.height - 2),
        }
    }

    /// Per-archetype start cells: the Hunter begins outside the gate, the
    /// rest inside the house.
    pub fn ghost_spawn(&self, kind: GhostKind) -> Vec2 {
        match kind {
            GhostKind::Hunter => Vec2::new(self.gate.x, self.gate.y - 1),
            GhostKind::Ambusher => self.house_center,
            GhostKind::Flanker => Vec2::new(self.house_center.x - 1, self.house_center.y),
            GhostKind::Lurker => Vec2::new(self.house_center.x + 1, self.house_center.y),
        }
    }

    /// Active pellet cells of the freshly loaded level, with power flags.
    pub fn pellet_cells(&self) -> Vec<(Vec2, bool)> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let pos = Vec2::new(x, y);
                match self.tile(pos) {
                    TileKind::Pellet => out.push((pos, false)),
                    TileKind::PowerPellet => out.push((pos, true)),
                    _ => {}
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};

    use super::*;

    fn player_reachable(world: &LevelWorld) -> HashSet<Vec2> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(world.player_spawn);
        queue.push_back(world.player_spawn);
        while let Some(pos) = queue.pop_front() {
            for dir in Direction::CARDINAL {
                let next = world.wrapped_step(pos, dir);
                if world.player_can_enter(next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    #[test]
    fn layout_rows_are_uniform_width() {
        let world = LevelWorld::standard();
        assert_eq!(world.width, 19);
        assert_eq!(world.height, 15);
        for row in &LEVEL_LAYOUT {
            assert_eq!(row.len(), 19);
        }
    }

    #[test]
    fn spawn_anchors_are_valid() {
        let world = LevelWorld::standard();
        assert!(world.player_can_enter(world.player_spawn));
        assert_eq!(world.tile(world.gate), TileKind::Gate);
        assert!(world.is_house_cell(world.house_center));
        assert!(world.player_can_enter(world.fruit_cell));
        for kind in GhostKind::ALL {
            assert!(world.is_open(world.ghost_spawn(kind)));
            assert!(world.player_can_enter(world.scatter_corner(kind)));
        }
    }

    #[test]
    fn every_pellet_is_reachable_by_the_player() {
        let world = LevelWorld::standard();
        let reachable = player_reachable(&world);
        for (pos, _) in world.pellet_cells() {
            assert!(reachable.contains(&pos), "unreachable pellet at {pos:?}");
        }
    }

    #[test]
    fn level_has_four_power_pellets() {
        let world = LevelWorld::standard();
        let power = world
            .pellet_cells()
            .iter()
            .filter(|(_, power)| *power)
            .count();
        assert_eq!(power, 4);
    }

    #[test]
    fn tunnel_wraps_horizontally_but_not_vertically() {
        let world = LevelWorld::standard();
        let tunnel_y = 7;
        let left_mouth = Vec2::new(0, tunnel_y);
        let right_mouth = Vec2::new(world.width - 1, tunnel_y);
        assert!(world.is_open(left_mouth));
        assert!(world.is_open(right_mouth));
        assert_eq!(world.wrapped_step(left_mouth, Direction::Left), right_mouth);
        assert_eq!(world.wrapped_step(right_mouth, Direction::Right), left_mouth);

        let top = Vec2::new(1, 0);
        assert_eq!(world.wrapped_step(top, Direction::Up), Vec2::new(1, -1));
        assert!(!world.is_open(world.wrapped_step(top, Direction::Up)));
    }

    #[test]
    fn gate_admits_only_homebound_or_exiting_ghosts() {
        let world = LevelWorld::standard();
        let above_gate = Vec2::new(world.gate.x, world.gate.y - 1);

        assert!(!world.player_can_enter(world.gate));
        assert!(world.ghost_can_enter(GhostMode::Captured, above_gate, world.gate));
        assert!(!world.ghost_can_enter(GhostMode::Chase, above_gate, world.gate));
        assert!(world.ghost_can_enter(GhostMode::Chase, world.house_center, world.gate));
    }

    #[test]
    fn player_cannot_reach_the_house_interior() {
        let world = LevelWorld::standard();
        let reachable = player_reachable(&world);
        assert!(!reachable.contains(&world.house_center));
    }
}
