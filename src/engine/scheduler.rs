use crate::types::{GhostMode, PhaseSegment};

/// Global pursuit-mode timeline shared by every ghost. Walks an ordered list
/// of (mode, duration) segments whose terminal entry is unbounded Chase;
/// once the cursor reaches it the mode is locked until `reset`.
#[derive(Clone, Debug)]
pub struct PhaseScheduler {
    segments: Vec<PhaseSegment>,
    cursor: usize,
    elapsed_in_phase_ms: u64,
    locked: bool,
}

impl PhaseScheduler {
    pub fn new(segments: &[PhaseSegment]) -> Self {
        let segments = if segments.is_empty() {
            vec![PhaseSegment {
                mode: GhostMode::Chase,
                duration_ms: None,
            }]
        } else {
            segments.to_vec()
        };
        Self {
            segments,
            cursor: 0,
            elapsed_in_phase_ms: 0,
            locked: false,
        }
    }

    pub fn current_mode(&self) -> GhostMode {
        self.segments[self.cursor].mode
    }

    /// Advances the accumulated phase time and reports every newly entered
    /// mode, in order. An unchanged phase reports nothing, so callers see
    /// transitions only. Carrying the remainder across segment boundaries
    /// keeps the emitted sequence independent of tick granularity.
    pub fn advance(&mut self, dt_ms: u64) -> Vec<GhostMode> {
        let mut transitions = Vec::new();
        if self.locked {
            return transitions;
        }
        self.elapsed_in_phase_ms += dt_ms;
        while let Some(duration) = self.segments[self.cursor].duration_ms {
            if self.elapsed_in_phase_ms < duration {
                break;
            }
            self.elapsed_in_phase_ms -= duration;
            self.cursor += 1;
            transitions.push(self.segments[self.cursor].mode);
            if self.segments[self.cursor].duration_ms.is_none() {
                self.locked = true;
                break;
            }
        }
        transitions
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.elapsed_in_phase_ms = 0;
        self.locked = false;
    }
}
