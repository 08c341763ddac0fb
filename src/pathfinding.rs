use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::types::{Direction, Vec2};
use crate::world::LevelWorld;

/// A* node. Ordering is reversed for the min-heap and breaks f-score ties by
/// lower heuristic first, then earliest insertion, so paths are reproducible
/// across runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Node {
    f: i32,
    h: i32,
    seq: u64,
    pos: Vec2,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn manhattan(a: Vec2, b: Vec2) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// Grid pathfinding service with per-(start, goal) memoization. The cache is
/// sound only because the maze never changes mid-level; `clear` must be
/// called whenever the level grid is replaced.
#[derive(Clone, Debug, Default)]
pub struct PathFinder {
    cache: HashMap<(Vec2, Vec2), Vec<Vec2>>,
}

impl PathFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    #[cfg(test)]
    fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Ordered tile sequence from `start` to `goal` inclusive, or empty when
    /// no path exists. Never fails: unreachable or out-of-bounds goals are a
    /// valid steady state for callers.
    pub fn find_path(&mut self, world: &LevelWorld, start: Vec2, goal: Vec2) -> Vec<Vec2> {
        if let Some(path) = self.cache.get(&(start, goal)) {
            return path.clone();
        }
        let path = search(world, start, goal);
        if !path.is_empty() {
            self.cache.insert((start, goal), path.clone());
        }
        path
    }
}

fn search(world: &LevelWorld, start: Vec2, goal: Vec2) -> Vec<Vec2> {
    if !world.is_open(start) || !world.is_open(goal) {
        return Vec::new();
    }
    if start == goal {
        return vec![start];
    }

    let mut open = BinaryHeap::new();
    let mut came_from: HashMap<Vec2, Vec2> = HashMap::new();
    let mut g_score: HashMap<Vec2, i32> = HashMap::new();
    let mut seq = 0u64;

    g_score.insert(start, 0);
    open.push(Node {
        f: manhattan(start, goal),
        h: manhattan(start, goal),
        seq,
        pos: start,
    });

    while let Some(current) = open.pop() {
        if current.pos == goal {
            let mut path = vec![goal];
            let mut cursor = goal;
            while let Some(&prev) = came_from.get(&cursor) {
                path.push(prev);
                cursor = prev;
            }
            path.reverse();
            return path;
        }

        let current_g = g_score.get(&current.pos).copied().unwrap_or(i32::MAX);
        for dir in Direction::CARDINAL {
            let next = Vec2::new(
                current.pos.x
                    + match dir {
                        Direction::Left => -1,
                        Direction::Right => 1,
                        _ => 0,
                    },
                current.pos.y
                    + match dir {
                        Direction::Up => -1,
                        Direction::Down => 1,
                        _ => 0,
                    },
            );
            if !world.is_open(next) {
                continue;
            }
            let tentative = current_g + 1;
            if tentative < g_score.get(&next).copied().unwrap_or(i32::MAX) {
                came_from.insert(next, current.pos);
                g_score.insert(next, tentative);
                let h = manhattan(next, goal);
                seq += 1;
                open.push(Node {
                    f: tentative + h,
                    h,
                    seq,
                    pos: next,
                });
            }
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};

    use super::*;
    use crate::world::LevelWorld;

    fn assert_valid_path(world: &LevelWorld, path: &[Vec2], start: Vec2, goal: Vec2) {
        assert_eq!(path.first().copied(), Some(start));
        assert_eq!(path.last().copied(), Some(goal));
        for window in path.windows(2) {
            let dist = (window[0].x - window[1].x).abs() + (window[0].y - window[1].y).abs();
            assert_eq!(dist, 1, "non-adjacent step {window:?}");
        }
        for pos in path {
            assert!(world.is_open(*pos), "path crosses wall at {pos:?}");
        }
    }

    fn bfs_distance(world: &LevelWorld, start: Vec2, goal: Vec2) -> Option<usize> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start);
        queue.push_back((start, 0usize));
        while let Some((pos, dist)) = queue.pop_front() {
            if pos == goal {
                return Some(dist);
            }
            for (dx, dy) in [(0, -1), (0, 1), (-1, 0), (1, 0)] {
                let next = Vec2::new(pos.x + dx, pos.y + dy);
                if world.is_open(next) && seen.insert(next) {
                    queue.push_back((next, dist + 1));
                }
            }
        }
        None
    }

    #[test]
    fn path_endpoints_adjacency_and_walls_hold() {
        let world = LevelWorld::standard();
        let mut finder = PathFinder::new();
        let start = world.player_spawn;
        let goal = world.scatter_corner(crate::types::GhostKind::Ambusher);
        let path = finder.find_path(&world, start, goal);
        assert!(!path.is_empty());
        assert_valid_path(&world, &path, start, goal);
    }

    #[test]
    fn path_length_matches_bfs_shortest_distance() {
        let world = LevelWorld::standard();
        let mut finder = PathFinder::new();
        let pairs = [
            (Vec2::new(1, 1), Vec2::new(17, 13)),
            (Vec2::new(9, 13), Vec2::new(1, 1)),
            (Vec2::new(17, 1), Vec2::new(1, 13)),
        ];
        for (start, goal) in pairs {
            let path = finder.find_path(&world, start, goal);
            let expected = bfs_distance(&world, start, goal).expect("reachable pair");
            assert_eq!(path.len(), expected + 1);
        }
    }

    #[test]
    fn start_equals_goal_returns_single_tile() {
        let world = LevelWorld::standard();
        let mut finder = PathFinder::new();
        let start = Vec2::new(1, 1);
        assert_eq!(finder.find_path(&world, start, start), vec![start]);
    }

    #[test]
    fn walls_and_out_of_bounds_yield_empty() {
        let world = LevelWorld::standard();
        let mut finder = PathFinder::new();
        assert!(finder
            .find_path(&world, Vec2::new(0, 0), Vec2::new(1, 1))
            .is_empty());
        assert!(finder
            .find_path(&world, Vec2::new(1, 1), Vec2::new(-3, 2))
            .is_empty());
        assert!(finder
            .find_path(&world, Vec2::new(1, 1), Vec2::new(999, 999))
            .is_empty());
    }

    #[test]
    fn unreachable_goal_yields_empty_not_panic() {
        let world = LevelWorld::parse(&["#####", "#.#.#", "#####"]);
        let mut finder = PathFinder::new();
        assert!(finder
            .find_path(&world, Vec2::new(1, 1), Vec2::new(3, 1))
            .is_empty());
    }

    #[test]
    fn cache_is_transparent_for_repeated_and_recomputed_queries() {
        let world = LevelWorld::standard();
        let mut finder = PathFinder::new();
        let start = Vec2::new(1, 13);
        let goal = Vec2::new(17, 1);

        let first = finder.find_path(&world, start, goal);
        assert_eq!(finder.cached_entries(), 1);
        let second = finder.find_path(&world, start, goal);
        assert_eq!(first, second);

        finder.clear();
        assert_eq!(finder.cached_entries(), 0);
        let third = finder.find_path(&world, start, goal);
        assert_eq!(first, third);
    }

    #[test]
    fn tie_breaking_is_deterministic_across_instances() {
        let world = LevelWorld::standard();
        let start = Vec2::new(1, 3);
        let goal = Vec2::new(17, 3);
        let a = PathFinder::new().find_path(&world, start, goal);
        let b = PathFinder::new().find_path(&world, start, goal);
        assert_eq!(a, b);
    }

    #[test]
    fn failed_lookups_are_not_cached() {
        let world = LevelWorld::standard();
        let mut finder = PathFinder::new();
        let _ = finder.find_path(&world, Vec2::new(0, 0), Vec2::new(1, 1));
        assert_eq!(finder.cached_entries(), 0);
    }
}
