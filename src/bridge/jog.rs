// src/bridge/jog.rs - Continuous manual motion driven by a held direction
use crate::machine::AxisId;

use super::Bridge;

/// Components at or below this magnitude count as "stopped".
const NEAR_ZERO: f32 = 0.000_1;

/// Held directional intent, each component in `[-1, 1]`.
///
/// A component found outside that range on poll means the UI forgot to stop
/// jogging and something else scribbled over the shared state; jogging then
/// force-clears itself rather than run away.
#[derive(Debug, Default)]
pub struct JogIntent {
    dir: [f32; 3],
    active: bool,
    /// Target of the jog segment issued this cycle, per axis.
    segment_target: Option<[f32; 3]>,
}

impl JogIntent {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Jog-segment target for `axis`, when jogging is active.
    pub fn target(&self, axis: AxisId) -> Option<f32> {
        if !self.active {
            return None;
        }
        self.segment_target.map(|t| t[axis.index()])
    }

    fn out_of_range(&self) -> bool {
        self.dir.iter().any(|c| *c < -1.0 || *c > 1.0)
    }
}

impl Bridge {
    /// Store a jog direction. Components map `[-1, 1]` onto the maximum manual
    /// feedrate per axis. Jogging continues until called with all (near-)zero
    /// components.
    pub fn jog(&mut self, direction: [f32; 3]) {
        self.jog.dir = direction;
        self.jog.active = direction.iter().any(|c| c.abs() > NEAR_ZERO);
        if !self.jog.active {
            self.jog.segment_target = None;
        }
    }

    /// Sample the jog vector for this control cycle.
    ///
    /// Returns the zero vector when jogging is off, or when a poison component
    /// trips the fail-safe, which also switches jogging off.
    pub fn poll_jog(&mut self) -> [f32; 3] {
        if !self.jog.active {
            return [0.0; 3];
        }
        if self.jog.out_of_range() {
            tracing::warn!(
                "Jog vector {:?} out of range; disabling jogging",
                self.jog.dir
            );
            self.jog.active = false;
            self.jog.segment_target = None;
            return [0.0; 3];
        }
        self.jog.dir
    }

    /// Advance jogging by one control cycle of `dt_s` seconds: validate the
    /// vector, compute the next segment target at manual feedrate, clamp it
    /// into the admissible window and enqueue the move.
    pub(crate) fn update_jog(&mut self, dt_s: f32) {
        let dir = self.poll_jog();
        if dir == [0.0; 3] {
            return;
        }
        let mut target = self.motion.position();
        let mut segment = [0.0f32; 3];
        for axis in AxisId::ALL {
            let i = axis.index();
            let step = dir[i] * self.config.printer.manual_feedrate_mm_s[i] * dt_s;
            let (min, max) = self.axis_move_window(axis);
            target[i] = if min <= max {
                (target[i] + step).clamp(min, max)
            } else {
                target[i]
            };
            segment[i] = target[i];
        }
        self.jog.segment_target = Some(segment);
        // Segment feedrate follows the strongest component.
        let strongest = dir
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, c)| c.abs() * self.config.printer.manual_feedrate_mm_s[i])
            .unwrap_or(0.0);
        self.motion.enqueue_move(target, strongest);
    }
}
