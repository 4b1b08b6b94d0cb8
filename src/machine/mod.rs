// src/machine/mod.rs - Collaborator interfaces for the control core
//
// The bridge never talks to hardware directly. Motion, thermal, tool-change,
// leveling and filament-runout subsystems sit behind these traits; optional
// hardware is an absent provider rather than a compile-time switch.
pub mod sim;

/// Addressable motion axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisId {
    X,
    Y,
    Z,
}

impl AxisId {
    pub const ALL: [AxisId; 3] = [AxisId::X, AxisId::Y, AxisId::Z];

    pub fn index(self) -> usize {
        match self {
            AxisId::X => 0,
            AxisId::Y => 1,
            AxisId::Z => 2,
        }
    }

    /// The other horizontal axis, used by the delta radial bound.
    pub fn other_horizontal(self) -> Option<AxisId> {
        match self {
            AxisId::X => Some(AxisId::Y),
            AxisId::Y => Some(AxisId::X),
            AxisId::Z => None,
        }
    }
}

/// Addressable extruder (tool) index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtruderId(pub u8);

/// Addressable fan index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FanId(pub u8);

/// Addressable heater endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaterId {
    Bed,
    Chamber,
    Hotend(u8),
}

/// One logical unit of planner settings.
///
/// Mutations go through a copy of the whole record and are applied as one
/// unit, so the motion subsystem never observes a partially-updated snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerSettings {
    /// Steps per mm, per axis (X, Y, Z, E).
    pub axis_steps_per_mm: [f32; 4],
    pub max_feedrate_mm_s: [f32; 4],
    pub max_acceleration_mm_s2: [f32; 4],
    pub max_jerk_mm_s: [f32; 4],
    pub junction_deviation_mm: f32,
    pub min_feedrate_mm_s: f32,
    pub min_travel_feedrate_mm_s: f32,
    pub acceleration: f32,
    pub retract_acceleration: f32,
    pub travel_acceleration: f32,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            axis_steps_per_mm: [80.0, 80.0, 400.0, 380.0],
            max_feedrate_mm_s: [180.0, 180.0, 12.0, 80.0],
            max_acceleration_mm_s2: [1000.0, 1000.0, 200.0, 5000.0],
            max_jerk_mm_s: [8.0, 8.0, 2.0, 10.0],
            junction_deviation_mm: 0.05,
            min_feedrate_mm_s: 0.0,
            min_travel_feedrate_mm_s: 0.0,
            acceleration: 1250.0,
            retract_acceleration: 1250.0,
            travel_acceleration: 1250.0,
        }
    }
}

/// Motion planner and stepper chain, as the bridge consumes it.
pub trait MotionControl {
    /// Snapshot of the current planner settings.
    fn settings(&self) -> PlannerSettings;
    /// Apply a whole settings record atomically.
    fn apply_settings(&mut self, settings: PlannerSettings);

    /// Authoritative position (X, Y, Z, E) in mm.
    fn position(&self) -> [f32; 4];
    /// Enqueue a linear move and return immediately.
    fn enqueue_move(&mut self, target: [f32; 4], feedrate_mm_s: f32);

    fn has_blocks_queued(&self) -> bool;
    /// True while the planner is executing queued motion.
    fn is_processing(&self) -> bool;
    /// Advance queued motion by one control cycle.
    fn update(&mut self);

    fn axis_homed(&self, axis: AxisId) -> bool;
    fn axis_position_known(&self, axis: AxisId) -> bool;

    fn feedrate_percent(&self) -> f32;
    fn set_feedrate_percent(&mut self, value: f32);
}

/// Thermal manager: heaters, sensors and fans.
pub trait ThermalControl {
    fn temperature(&self, heater: HeaterId) -> f32;
    fn target_temperature(&self, heater: HeaterId) -> f32;
    /// Set a target. The subsystem enforces its own hard max on top of the
    /// bridge's clamp.
    fn set_target_temperature(&mut self, heater: HeaterId, deg_c: f32);

    /// Restart the idle timeout for a heater. No-op for the chamber, which has
    /// no idle timer.
    fn reset_idle_timer(&mut self, heater: HeaterId);
    fn is_idle(&self, heater: HeaterId) -> bool;
    /// True while the heater is still driving toward a higher target.
    fn is_heating(&self, heater: HeaterId) -> bool;

    /// Fan duty in `[0, 255]`.
    fn fan_speed(&self, fan: FanId) -> u8;
    fn set_fan_speed(&mut self, fan: FanId, speed: u8);
    fn fan_count(&self) -> u8;

    fn too_cold_to_extrude(&self, extruder: ExtruderId) -> bool;

    /// Cooperative thermal management tick; must stay alive during blocking
    /// waits.
    fn manage_heaters(&mut self);
}

/// Tool change subsystem.
pub trait ToolChanger {
    fn active_tool(&self) -> u8;
    fn tool_change(&mut self, tool: u8);
}

/// Bed leveling, when the machine has a probe. Optional provider.
pub trait LevelingProvider {
    fn leveling_active(&self) -> bool;
    fn set_leveling_active(&mut self, active: bool);
    fn mesh_valid(&self) -> bool;
    fn mesh_point(&self, x: u8, y: u8) -> f32;
    fn set_mesh_point(&mut self, x: u8, y: u8, z_offset: f32);
    fn z_offset(&self) -> f32;
    fn set_z_offset(&mut self, value: f32);
}

/// Filament runout sensor. Optional provider.
pub trait FilamentSensor {
    fn enabled(&self) -> bool;
    fn set_enabled(&mut self, value: bool);
    fn runout_distance_mm(&self) -> f32;
    fn set_runout_distance_mm(&mut self, value: f32);
    fn runout_detected(&self) -> bool;
}

// Shared-handle forwarding. The control loop is single-threaded, so a
// subsystem may be held both by the bridge and by whoever needs to observe it
// (tests, the host binary) through Rc<RefCell<_>>.
use std::cell::RefCell;
use std::rc::Rc;

impl<T: MotionControl> MotionControl for Rc<RefCell<T>> {
    fn settings(&self) -> PlannerSettings {
        self.borrow().settings()
    }
    fn apply_settings(&mut self, settings: PlannerSettings) {
        self.borrow_mut().apply_settings(settings)
    }
    fn position(&self) -> [f32; 4] {
        self.borrow().position()
    }
    fn enqueue_move(&mut self, target: [f32; 4], feedrate_mm_s: f32) {
        self.borrow_mut().enqueue_move(target, feedrate_mm_s)
    }
    fn has_blocks_queued(&self) -> bool {
        self.borrow().has_blocks_queued()
    }
    fn is_processing(&self) -> bool {
        self.borrow().is_processing()
    }
    fn update(&mut self) {
        self.borrow_mut().update()
    }
    fn axis_homed(&self, axis: AxisId) -> bool {
        self.borrow().axis_homed(axis)
    }
    fn axis_position_known(&self, axis: AxisId) -> bool {
        self.borrow().axis_position_known(axis)
    }
    fn feedrate_percent(&self) -> f32 {
        self.borrow().feedrate_percent()
    }
    fn set_feedrate_percent(&mut self, value: f32) {
        self.borrow_mut().set_feedrate_percent(value)
    }
}

impl<T: ThermalControl> ThermalControl for Rc<RefCell<T>> {
    fn temperature(&self, heater: HeaterId) -> f32 {
        self.borrow().temperature(heater)
    }
    fn target_temperature(&self, heater: HeaterId) -> f32 {
        self.borrow().target_temperature(heater)
    }
    fn set_target_temperature(&mut self, heater: HeaterId, deg_c: f32) {
        self.borrow_mut().set_target_temperature(heater, deg_c)
    }
    fn reset_idle_timer(&mut self, heater: HeaterId) {
        self.borrow_mut().reset_idle_timer(heater)
    }
    fn is_idle(&self, heater: HeaterId) -> bool {
        self.borrow().is_idle(heater)
    }
    fn is_heating(&self, heater: HeaterId) -> bool {
        self.borrow().is_heating(heater)
    }
    fn fan_speed(&self, fan: FanId) -> u8 {
        self.borrow().fan_speed(fan)
    }
    fn set_fan_speed(&mut self, fan: FanId, speed: u8) {
        self.borrow_mut().set_fan_speed(fan, speed)
    }
    fn fan_count(&self) -> u8 {
        self.borrow().fan_count()
    }
    fn too_cold_to_extrude(&self, extruder: ExtruderId) -> bool {
        self.borrow().too_cold_to_extrude(extruder)
    }
    fn manage_heaters(&mut self) {
        self.borrow_mut().manage_heaters()
    }
}

impl<T: ToolChanger> ToolChanger for Rc<RefCell<T>> {
    fn active_tool(&self) -> u8 {
        self.borrow().active_tool()
    }
    fn tool_change(&mut self, tool: u8) {
        self.borrow_mut().tool_change(tool)
    }
}

impl<T: LevelingProvider> LevelingProvider for Rc<RefCell<T>> {
    fn leveling_active(&self) -> bool {
        self.borrow().leveling_active()
    }
    fn set_leveling_active(&mut self, active: bool) {
        self.borrow_mut().set_leveling_active(active)
    }
    fn mesh_valid(&self) -> bool {
        self.borrow().mesh_valid()
    }
    fn mesh_point(&self, x: u8, y: u8) -> f32 {
        self.borrow().mesh_point(x, y)
    }
    fn set_mesh_point(&mut self, x: u8, y: u8, z_offset: f32) {
        self.borrow_mut().set_mesh_point(x, y, z_offset)
    }
    fn z_offset(&self) -> f32 {
        self.borrow().z_offset()
    }
    fn set_z_offset(&mut self, value: f32) {
        self.borrow_mut().set_z_offset(value)
    }
}

impl<T: FilamentSensor> FilamentSensor for Rc<RefCell<T>> {
    fn enabled(&self) -> bool {
        self.borrow().enabled()
    }
    fn set_enabled(&mut self, value: bool) {
        self.borrow_mut().set_enabled(value)
    }
    fn runout_distance_mm(&self) -> f32 {
        self.borrow().runout_distance_mm()
    }
    fn set_runout_distance_mm(&mut self, value: f32) {
        self.borrow_mut().set_runout_distance_mm(value)
    }
    fn runout_detected(&self) -> bool {
        self.borrow().runout_detected()
    }
}
