use crate::constants::{
    fruit_points, get_level_tuning, FRUIT_RADIUS, GHOST_CAPTURE_BASE_SCORE, GHOST_RADIUS,
    PELLET_RADIUS, PELLET_SCORE, PLAYER_RADIUS, POWER_PELLET_SCORE,
};
use crate::types::{GameStatus, GhostMode, RuntimeEvent, Vec2};

use super::GameEngine;

/// Proximity test shared by every collision check: tolerant of sub-tile
/// overlap by design, not tile-exact.
fn circles_overlap(ax: f32, ay: f32, ar: f32, bx: f32, by: f32, br: f32) -> bool {
    let dx = ax - bx;
    let dy = ay - by;
    (dx * dx + dy * dy).sqrt() < ar + br
}

impl GameEngine {
    /// Consequence resolution, run once per tick after positions update.
    /// Check order is fixed: pellets, then ghosts, then fruit, then the
    /// horizontal wrap, so simultaneous outcomes resolve deterministically.
    pub(super) fn resolve_collisions(&mut self, player_before: Vec2, ghosts_before: &[Vec2]) {
        self.resolve_pellets();
        let player_died = self.resolve_ghosts(player_before, ghosts_before);
        if player_died {
            return;
        }
        self.resolve_fruit();
        self.apply_wrap_bounds();
    }

    /// At most one pellet leaves the active set per tick, so overlapping
    /// pickups can never double-count. The active count reaching zero is the
    /// level-completion signal.
    fn resolve_pellets(&mut self) {
        let (px, py) = self.player_position();
        let eaten = self.pellets.iter().find_map(|(&cell, &power)| {
            circles_overlap(
                px,
                py,
                PLAYER_RADIUS,
                cell.x as f32,
                cell.y as f32,
                PELLET_RADIUS,
            )
            .then_some((cell, power))
        });
        let Some((cell, power)) = eaten else {
            return;
        };

        self.pellets.remove(&cell);
        self.pellets_eaten_this_level += 1;
        let points = if power {
            POWER_PELLET_SCORE
        } else {
            PELLET_SCORE
        };
        self.score += points;
        self.events.push(RuntimeEvent::PelletEaten {
            x: cell.x,
            y: cell.y,
            power,
            points,
        });
        if power {
            self.activate_power_mode();
        }
        self.maybe_spawn_fruit();
        if self.pellets.is_empty() {
            self.status = GameStatus::LevelComplete;
            self.events.push(RuntimeEvent::LevelCompleted { level: self.level });
        }
    }

    /// Returns true when the player lost a life this tick (positions were
    /// reset, so later checks against stale cells must be skipped).
    fn resolve_ghosts(&mut self, player_before: Vec2, ghosts_before: &[Vec2]) -> bool {
        let (px, py) = self.player_position();
        for idx in 0..self.ghosts.len() {
            let ghost_cell = self.ghosts[idx].cell;
            let overlap = circles_overlap(
                px,
                py,
                PLAYER_RADIUS,
                ghost_cell.x as f32,
                ghost_cell.y as f32,
                GHOST_RADIUS,
            );
            // Cell-stepped movement can swap the player and a ghost within
            // one tick without ever overlapping; treat that as a hit too.
            let swapped = ghosts_before
                .get(idx)
                .map(|&before| before == self.player.cell && ghost_cell == player_before)
                .unwrap_or(false);
            if !overlap && !swapped {
                continue;
            }

            match self.ghosts[idx].mode {
                GhostMode::Frightened => self.capture_ghost(idx),
                GhostMode::Captured => {}
                GhostMode::Scatter | GhostMode::Chase => {
                    self.lose_life();
                    return true;
                }
            }
        }
        false
    }

    /// First capture in a power window scores the base value; each
    /// consecutive capture in the same uninterrupted window doubles it.
    fn capture_ghost(&mut self, idx: usize) {
        let points = GHOST_CAPTURE_BASE_SCORE << self.combo_captures.min(30);
        self.score += points;
        self.combo_captures += 1;
        self.ghosts[idx].mode = GhostMode::Captured;
        self.ghosts[idx].target = self.world.house_center;
        self.events.push(RuntimeEvent::GhostCaptured {
            ghost: self.ghosts[idx].kind,
            points,
            combo: self.combo_captures,
        });
    }

    fn lose_life(&mut self) {
        self.lives -= 1;
        self.events.push(RuntimeEvent::LifeLost {
            lives_left: self.lives,
        });
        if self.lives <= 0 {
            self.status = GameStatus::GameOver;
            self.events.push(RuntimeEvent::GameOver {
                final_score: self.score,
            });
            return;
        }
        self.clear_power_mode();
        self.reset_positions();
    }

    fn resolve_fruit(&mut self) {
        let Some(fruit) = &self.fruit else {
            return;
        };
        let (px, py) = self.player_position();
        if !circles_overlap(
            px,
            py,
            PLAYER_RADIUS,
            fruit.cell.x as f32,
            fruit.cell.y as f32,
            FRUIT_RADIUS,
        ) {
            return;
        }
        let kind = fruit.kind;
        let points = fruit_points(kind);
        self.score += points;
        self.fruit = None;
        self.events.push(RuntimeEvent::FruitTaken { kind, points });
    }

    /// Tunnel effect: agents leaving a horizontal bound re-enter from the
    /// opposite one. Vertical bounds never wrap.
    fn apply_wrap_bounds(&mut self) {
        let width = self.world.width;
        let wrap = |cell: &mut Vec2| {
            if cell.x < 0 {
                cell.x += width;
            } else if cell.x >= width {
                cell.x -= width;
            }
        };
        wrap(&mut self.player.cell);
        for ghost in &mut self.ghosts {
            wrap(&mut ghost.cell);
        }
    }

    pub(super) fn activate_power_mode(&mut self) {
        let duration = get_level_tuning(self.level).power_duration_ms;
        self.player.powered = true;
        self.power_ms_left = duration;
        self.power_started_this_tick = true;
        self.combo_captures = 0;
        for ghost in &mut self.ghosts {
            if ghost.mode != GhostMode::Captured {
                ghost.mode = GhostMode::Frightened;
            }
        }
        self.events.push(RuntimeEvent::PowerModeStarted {
            duration_ms: duration,
        });
    }

    pub(super) fn player_position(&self) -> (f32, f32) {
        (self.player.cell.x as f32, self.player.cell.y as f32)
    }
}
