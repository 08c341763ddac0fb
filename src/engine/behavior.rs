use crate::constants::LURKER_RETREAT_DISTANCE;
use crate::types::{Direction, GhostKind, GhostMode, Vec2};
use crate::world::LevelWorld;

use super::utils::{dir_delta, euclidean};

/// Target-selection for one ghost. Pure: called once per ghost per tick, the
/// result feeds the movement step, which may route toward it with A* or fall
/// back to greedy steering. Targets may sit on walls or off the grid; the
/// movement layer treats those as steering hints.
///
/// Priority order: Captured overrides everything and heads home; Frightened
/// has no deterministic target (the ghost's own tile is the "no target"
/// sentinel — movement rolls pseudo-random turns instead); otherwise the
/// global phase picks between scatter corners and the archetype chase rule.
pub fn select_target(
    world: &LevelWorld,
    kind: GhostKind,
    mode: GhostMode,
    ghost_cell: Vec2,
    player_cell: Vec2,
    player_dir: Direction,
    lead_cell: Option<Vec2>,
    global_mode: GhostMode,
) -> Vec2 {
    if mode == GhostMode::Captured {
        return world.house_center;
    }
    if mode == GhostMode::Frightened {
        return ghost_cell;
    }
    if global_mode == GhostMode::Scatter {
        return world.scatter_corner(kind);
    }

    match kind {
        GhostKind::Hunter => player_cell,
        GhostKind::Ambusher => {
            let (dx, dy) = dir_delta(player_dir);
            Vec2::new(player_cell.x + dx * 4, player_cell.y + dy * 4)
        }
        GhostKind::Flanker => {
            let Some(lead) = lead_cell else {
                return player_cell;
            };
            let (dx, dy) = dir_delta(player_dir);
            let pivot = Vec2::new(player_cell.x + dx * 2, player_cell.y + dy * 2);
            Vec2::new(
                lead.x + (pivot.x - lead.x) * 2,
                lead.y + (pivot.y - lead.y) * 2,
            )
        }
        GhostKind::Lurker => {
            if euclidean(ghost_cell, player_cell) > LURKER_RETREAT_DISTANCE {
                player_cell
            } else {
                world.scatter_corner(kind)
            }
        }
    }
}
