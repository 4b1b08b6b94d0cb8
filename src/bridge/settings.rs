// src/bridge/settings.rs - Planner settings accessors
//
// Every mutation copies the current settings record, edits one field and
// applies the whole record back, so the motion subsystem only ever sees
// complete snapshots.
use crate::machine::AxisId;

use super::Bridge;

/// Axis index into the planner settings arrays (X, Y, Z, E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperAxis {
    X,
    Y,
    Z,
    E,
}

impl StepperAxis {
    pub fn index(self) -> usize {
        match self {
            StepperAxis::X => 0,
            StepperAxis::Y => 1,
            StepperAxis::Z => 2,
            StepperAxis::E => 3,
        }
    }
}

impl From<AxisId> for StepperAxis {
    fn from(axis: AxisId) -> Self {
        match axis {
            AxisId::X => StepperAxis::X,
            AxisId::Y => StepperAxis::Y,
            AxisId::Z => StepperAxis::Z,
        }
    }
}

impl Bridge {
    pub fn get_axis_steps_per_mm(&self, axis: StepperAxis) -> f32 {
        self.motion.settings().axis_steps_per_mm[axis.index()]
    }

    pub fn set_axis_steps_per_mm(&mut self, value: f32, axis: StepperAxis) {
        let mut s = self.motion.settings();
        s.axis_steps_per_mm[axis.index()] = value;
        self.motion.apply_settings(s);
    }

    pub fn get_axis_max_feedrate_mm_s(&self, axis: StepperAxis) -> f32 {
        self.motion.settings().max_feedrate_mm_s[axis.index()]
    }

    pub fn set_axis_max_feedrate_mm_s(&mut self, value: f32, axis: StepperAxis) {
        let mut s = self.motion.settings();
        s.max_feedrate_mm_s[axis.index()] = value;
        self.motion.apply_settings(s);
    }

    pub fn get_axis_max_acceleration_mm_s2(&self, axis: StepperAxis) -> f32 {
        self.motion.settings().max_acceleration_mm_s2[axis.index()]
    }

    pub fn set_axis_max_acceleration_mm_s2(&mut self, value: f32, axis: StepperAxis) {
        let mut s = self.motion.settings();
        s.max_acceleration_mm_s2[axis.index()] = value;
        self.motion.apply_settings(s);
    }

    pub fn get_axis_max_jerk_mm_s(&self, axis: StepperAxis) -> f32 {
        self.motion.settings().max_jerk_mm_s[axis.index()]
    }

    pub fn set_axis_max_jerk_mm_s(&mut self, value: f32, axis: StepperAxis) {
        let mut s = self.motion.settings();
        s.max_jerk_mm_s[axis.index()] = value;
        self.motion.apply_settings(s);
    }

    pub fn get_junction_deviation_mm(&self) -> f32 {
        self.motion.settings().junction_deviation_mm
    }

    pub fn set_junction_deviation_mm(&mut self, value: f32) {
        let mut s = self.motion.settings();
        s.junction_deviation_mm = value.clamp(0.01, 0.3);
        self.motion.apply_settings(s);
    }

    pub fn get_min_feedrate_mm_s(&self) -> f32 {
        self.motion.settings().min_feedrate_mm_s
    }

    pub fn set_min_feedrate_mm_s(&mut self, value: f32) {
        let mut s = self.motion.settings();
        s.min_feedrate_mm_s = value;
        self.motion.apply_settings(s);
    }

    pub fn get_min_travel_feedrate_mm_s(&self) -> f32 {
        self.motion.settings().min_travel_feedrate_mm_s
    }

    pub fn set_min_travel_feedrate_mm_s(&mut self, value: f32) {
        let mut s = self.motion.settings();
        s.min_travel_feedrate_mm_s = value;
        self.motion.apply_settings(s);
    }

    pub fn get_printing_acceleration_mm_s2(&self) -> f32 {
        self.motion.settings().acceleration
    }

    pub fn set_printing_acceleration_mm_s2(&mut self, value: f32) {
        let mut s = self.motion.settings();
        s.acceleration = value;
        self.motion.apply_settings(s);
    }

    pub fn get_retract_acceleration_mm_s2(&self) -> f32 {
        self.motion.settings().retract_acceleration
    }

    pub fn set_retract_acceleration_mm_s2(&mut self, value: f32) {
        let mut s = self.motion.settings();
        s.retract_acceleration = value;
        self.motion.apply_settings(s);
    }

    pub fn get_travel_acceleration_mm_s2(&self) -> f32 {
        self.motion.settings().travel_acceleration
    }

    pub fn set_travel_acceleration_mm_s2(&mut self, value: f32) {
        let mut s = self.motion.settings();
        s.travel_acceleration = value;
        self.motion.apply_settings(s);
    }
}
