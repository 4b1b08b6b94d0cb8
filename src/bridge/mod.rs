// src/bridge/mod.rs - State bridge between the control core and the UI/host
//
// Single point of truth translating UI intent into subsystem calls and
// subsystem state into UI-consumable values. The UI is untrusted: every
// operation clamps or ignores invalid input, or answers a not-applicable
// query with a sentinel (NaN, false, 0). Nothing here returns an error and
// nothing here panics on bad input.
pub mod jog;
pub mod pump;
pub mod settings;

use crate::clock::{HardwareTimer, SafeClock};
use crate::config::{Config, Kinematics};
use crate::events::EventHandler;
use crate::machine::{
    AxisId, ExtruderId, FanId, FilamentSensor, HeaterId, LevelingProvider, MotionControl,
    ThermalControl, ToolChanger,
};
use crate::media::SharedMedia;

use jog::JogIntent;
use pump::PumpState;

/// Addressable thermal endpoint: a named heater or the heater behind a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Heater(HeaterId),
    Extruder(ExtruderId),
}

/// The state bridge. Owns the transient UI-facing flags (killed, jogging,
/// pending confirmation) and holds every subsystem as a collaborator; absent
/// hardware is an absent provider.
pub struct Bridge {
    pub(crate) config: Config,
    pub(crate) motion: Box<dyn MotionControl>,
    pub(crate) thermal: Box<dyn ThermalControl>,
    pub(crate) tools: Box<dyn ToolChanger>,
    pub(crate) leveling: Option<Box<dyn LevelingProvider>>,
    pub(crate) filament: Option<Box<dyn FilamentSensor>>,
    pub(crate) media: Option<SharedMedia>,
    pub(crate) events: Box<dyn EventHandler>,
    pub(crate) clock: SafeClock<Box<dyn HardwareTimer>>,
    pub(crate) killed: bool,
    pub(crate) jog: JogIntent,
    pub(crate) pump: PumpState,
    wait_for_user: bool,
}

impl Bridge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        motion: Box<dyn MotionControl>,
        thermal: Box<dyn ThermalControl>,
        tools: Box<dyn ToolChanger>,
        leveling: Option<Box<dyn LevelingProvider>>,
        filament: Option<Box<dyn FilamentSensor>>,
        media: Option<SharedMedia>,
        events: Box<dyn EventHandler>,
        timer: Box<dyn HardwareTimer>,
    ) -> Self {
        let mut bridge = Self {
            config,
            motion,
            thermal,
            tools,
            leveling,
            filament,
            media,
            events,
            clock: SafeClock::new(timer),
            killed: false,
            jog: JogIntent::default(),
            pump: PumpState::default(),
            wait_for_user: false,
        };
        bridge.events.on_startup();
        bridge
    }

    /// Resolve an endpoint to a concrete heater, or None when the endpoint is
    /// not present on this machine (wrong hotend index, missing chamber).
    fn heater_of(&self, endpoint: Endpoint) -> Option<HeaterId> {
        match endpoint {
            Endpoint::Heater(HeaterId::Bed) => Some(HeaterId::Bed),
            Endpoint::Heater(HeaterId::Chamber) => {
                self.config.chamber.as_ref().map(|_| HeaterId::Chamber)
            }
            Endpoint::Heater(HeaterId::Hotend(n)) | Endpoint::Extruder(ExtruderId(n)) => {
                (n < self.config.hotend.count).then_some(HeaterId::Hotend(n))
            }
        }
    }

    /// Per-endpoint (max temp, safety margin) constants.
    fn heater_limits(&self, heater: HeaterId) -> (f32, f32) {
        match heater {
            HeaterId::Bed => (
                self.config.heater_bed.max_temp,
                self.config.heater_bed.safety_margin,
            ),
            HeaterId::Chamber => self
                .config
                .chamber
                .as_ref()
                .map_or((0.0, 0.0), |c| (c.max_temp, c.safety_margin)),
            HeaterId::Hotend(_) => (
                self.config.hotend.max_temp,
                self.config.hotend.safety_margin,
            ),
        }
    }

    // ----- temperature -----

    pub fn get_temperature(&self, endpoint: Endpoint) -> f32 {
        self.heater_of(endpoint)
            .map_or(f32::NAN, |h| self.thermal.temperature(h))
    }

    pub fn get_target_temperature(&self, endpoint: Endpoint) -> f32 {
        self.heater_of(endpoint)
            .map_or(f32::NAN, |h| self.thermal.target_temperature(h))
    }

    /// Set a target temperature, clamped to `[0, max - safety_margin]` for the
    /// endpoint. Also restarts the endpoint's idle timeout.
    pub fn set_target_temperature(&mut self, value: f32, endpoint: Endpoint) {
        let Some(heater) = self.heater_of(endpoint) else {
            return;
        };
        self.enable_heater(endpoint);
        let (max, margin) = self.heater_limits(heater);
        self.thermal
            .set_target_temperature(heater, value.clamp(0.0, max - margin));
    }

    /// Restart the idle timeout so the heater does not time out under the
    /// user's hands. The chamber has no idle timer; for it this is a no-op.
    pub fn enable_heater(&mut self, endpoint: Endpoint) {
        if let Some(heater) = self.heater_of(endpoint) {
            self.thermal.reset_idle_timer(heater);
        }
    }

    pub fn is_heater_idle(&self, endpoint: Endpoint) -> bool {
        self.heater_of(endpoint)
            .is_some_and(|h| self.thermal.is_idle(h))
    }

    // ----- fans -----

    pub fn get_target_fan_percent(&self, fan: FanId) -> f32 {
        if fan.0 >= self.thermal.fan_count() {
            return 0.0;
        }
        self.thermal.fan_speed(fan) as f32 * 100.0 / 255.0
    }

    pub fn set_target_fan_percent(&mut self, value: f32, fan: FanId) {
        if fan.0 >= self.thermal.fan_count() {
            return;
        }
        let duty = (value.clamp(0.0, 100.0) * 255.0 / 100.0).round() as u8;
        self.thermal.set_fan_speed(fan, duty);
    }

    // ----- axes and tools -----

    /// Position in mm: the jog target while jogging, otherwise the planner's
    /// authoritative position.
    pub fn get_axis_position_mm(&self, axis: AxisId) -> f32 {
        if let Some(target) = self.jog.target(axis) {
            return target;
        }
        self.motion.position()[axis.index()]
    }

    /// Admissible window for a UI-requested move on `axis`, centered on the
    /// current position.
    fn axis_move_window(&self, axis: AxisId) -> (f32, f32) {
        let current = self.motion.position();
        // Wide fallback window, tightened below.
        let mut min = current[axis.index()] - 1000.0;
        let mut max = current[axis.index()] + 1000.0;

        if self.config.endstops.soft_endstops_enabled {
            min = self.config.endstops.soft_min[axis.index()];
            max = self.config.endstops.soft_max[axis.index()];
        }

        // Delta bounds XY by the distance left inside the printable circle.
        // Assumes the build center is at the origin.
        if self.config.printer.kinematics == Kinematics::Delta {
            if let Some(other) = axis.other_horizontal() {
                let r = self.config.printer.printable_radius;
                let off = current[other.index()];
                let reach = (r * r - off * off).max(0.0).sqrt();
                max = max.min(reach);
                min = min.max(-reach);
            }
        }
        (min, max)
    }

    /// Clamp `position` into the admissible window and issue a move at the
    /// manual feedrate for the axis. Never exceeds configured soft limits.
    pub fn set_axis_position_mm(&mut self, position: f32, axis: AxisId) {
        let (min, max) = self.axis_move_window(axis);
        if min > max {
            return; // window collapsed (outside the printable circle)
        }
        let mut target = self.motion.position();
        target[axis.index()] = position.clamp(min, max);
        self.motion
            .enqueue_move(target, self.config.printer.manual_feedrate_mm_s[axis.index()]);
    }

    pub fn get_extruder_position_mm(&self, extruder: ExtruderId) -> f32 {
        if extruder.0 >= self.config.hotend.count {
            return f32::NAN;
        }
        self.motion.position()[3]
    }

    pub fn set_extruder_position_mm(&mut self, position: f32, extruder: ExtruderId) {
        if extruder.0 >= self.config.hotend.count {
            return;
        }
        self.set_active_tool(extruder);
        let mut target = self.motion.position();
        target[3] = position;
        self.motion
            .enqueue_move(target, self.config.printer.manual_feedrate_mm_s[3]);
    }

    /// Switch the active tool. A request for the already-active tool issues no
    /// tool change.
    pub fn set_active_tool(&mut self, extruder: ExtruderId) {
        if extruder.0 >= self.config.hotend.count {
            return;
        }
        if extruder.0 != self.tools.active_tool() {
            self.tools.tool_change(extruder.0);
        }
    }

    pub fn get_active_tool(&self) -> ExtruderId {
        ExtruderId(self.tools.active_tool())
    }

    pub fn is_moving(&self) -> bool {
        self.motion.has_blocks_queued()
    }

    pub fn is_busy(&self) -> bool {
        self.motion.has_blocks_queued() || self.motion.is_processing()
    }

    pub fn can_move_axis(&self, axis: AxisId) -> bool {
        match self.config.printer.kinematics {
            // Kinematic machines must not move before homing.
            Kinematics::Delta => self.motion.axis_homed(axis),
            Kinematics::Cartesian => true,
        }
    }

    pub fn can_move_extruder(&self, extruder: ExtruderId) -> bool {
        !self.thermal.too_cold_to_extrude(extruder)
    }

    pub fn is_axis_position_known(&self, axis: AxisId) -> bool {
        self.motion.axis_position_known(axis)
    }

    pub fn is_machine_homed(&self) -> bool {
        AxisId::ALL.iter().all(|&a| self.motion.axis_homed(a))
    }

    pub fn get_feedrate_percent(&self) -> f32 {
        self.motion.feedrate_percent()
    }

    pub fn set_feedrate_percent(&mut self, value: f32) {
        self.motion.set_feedrate_percent(value.clamp(10.0, 500.0));
    }

    /// Enqueue a move and poll until the planner drains, keeping thermal
    /// management alive while waiting. Calibration flows use this.
    pub fn move_blocking(&mut self, target: [f32; 4], feedrate_mm_s: f32) {
        self.motion.enqueue_move(target, feedrate_mm_s);
        while self.motion.is_processing() {
            self.motion.update();
            self.thermal.manage_heaters();
        }
    }

    pub fn move_blocking_to_z(&mut self, z: f32, feedrate_mm_s: f32) {
        let mut target = self.motion.position();
        target[2] = z;
        self.move_blocking(target, feedrate_mm_s);
    }

    // ----- leveling -----

    pub fn get_leveling_active(&self) -> bool {
        self.leveling.as_ref().is_some_and(|l| l.leveling_active())
    }

    pub fn set_leveling_active(&mut self, active: bool) {
        if let Some(l) = &mut self.leveling {
            l.set_leveling_active(active);
        }
    }

    pub fn get_mesh_valid(&self) -> bool {
        self.leveling.as_ref().is_some_and(|l| l.mesh_valid())
    }

    pub fn get_mesh_point(&self, x: u8, y: u8) -> f32 {
        if x >= self.config.leveling.grid_points_x || y >= self.config.leveling.grid_points_y {
            return f32::NAN;
        }
        self.leveling
            .as_ref()
            .map_or(f32::NAN, |l| l.mesh_point(x, y))
    }

    /// Writes outside the configured grid are silently ignored.
    pub fn set_mesh_point(&mut self, x: u8, y: u8, z_offset: f32) {
        if x >= self.config.leveling.grid_points_x || y >= self.config.leveling.grid_points_y {
            return;
        }
        if let Some(l) = &mut self.leveling {
            l.set_mesh_point(x, y, z_offset);
        }
    }

    pub fn get_z_offset_mm(&self) -> f32 {
        self.leveling.as_ref().map_or(0.0, |l| l.z_offset())
    }

    /// Accepted only within the configured probe offset range; out-of-range
    /// values are ignored.
    pub fn set_z_offset_mm(&mut self, value: f32) {
        let cfg = &self.config.leveling;
        if value < cfg.z_offset_min || value > cfg.z_offset_max {
            return;
        }
        if let Some(l) = &mut self.leveling {
            l.set_z_offset(value);
        }
    }

    // ----- filament sensor -----

    pub fn get_filament_runout_enabled(&self) -> bool {
        self.filament.as_ref().is_some_and(|f| f.enabled())
    }

    pub fn set_filament_runout_enabled(&mut self, value: bool) {
        if let Some(f) = &mut self.filament {
            f.set_enabled(value);
        }
    }

    pub fn get_filament_runout_distance_mm(&self) -> f32 {
        self.filament.as_ref().map_or(0.0, |f| f.runout_distance_mm())
    }

    pub fn set_filament_runout_distance_mm(&mut self, value: f32) {
        if let Some(f) = &mut self.filament {
            f.set_runout_distance_mm(value.clamp(0.0, 999.0));
        }
    }

    // ----- media and print control -----

    pub fn is_media_inserted(&self) -> bool {
        self.media
            .as_ref()
            .is_some_and(|m| m.borrow().is_inserted() && m.borrow().is_mounted())
    }

    pub fn print_file(&mut self, filename: &str) {
        let started = self
            .media
            .as_ref()
            .is_some_and(|m| m.borrow_mut().open_and_print(filename));
        if started {
            tracing::info!("Printing '{}'", filename);
            self.events.on_print_started();
        }
    }

    pub fn is_printing_from_media(&self) -> bool {
        self.media.as_ref().is_some_and(|m| m.borrow().is_file_open())
    }

    pub fn is_printing_from_media_paused(&self) -> bool {
        self.media
            .as_ref()
            .is_some_and(|m| m.borrow().is_file_open() && !m.borrow().is_playing())
    }

    pub fn is_printing(&self) -> bool {
        self.motion.is_processing() || self.is_printing_from_media()
    }

    pub fn pause_print(&mut self) {
        if let Some(m) = &self.media {
            m.borrow_mut().pause();
        }
        self.events.on_print_paused();
    }

    pub fn resume_print(&mut self) {
        if let Some(m) = &self.media {
            m.borrow_mut().resume();
        }
        self.events.on_print_resumed();
    }

    pub fn stop_print(&mut self) {
        if let Some(m) = &self.media {
            m.borrow_mut().stop();
        }
        self.events.on_print_stopped();
    }

    // ----- user confirmation -----

    /// Raise a confirmation request toward the host. The wait stays pending
    /// until `set_user_confirmed` is called.
    pub fn request_user_confirm(&mut self, message: &str) {
        self.wait_for_user = true;
        self.events.on_user_confirm_required(message);
    }

    pub fn is_awaiting_user(&self) -> bool {
        self.wait_for_user
    }

    pub fn set_user_confirmed(&mut self) {
        self.wait_for_user = false;
    }

    // ----- lifecycle -----

    pub fn factory_reset(&mut self) {
        tracing::warn!("Factory reset requested");
        self.events.on_factory_reset();
    }

    /// One-way kill latch. Switches timekeeping to the kill-safe path and
    /// notifies the host exactly once; repeat calls are absorbed.
    pub fn kill(&mut self, error: &str, component: &str) {
        if self.killed {
            return;
        }
        self.killed = true;
        self.clock.kill();
        tracing::error!("Printer killed: {} ({})", error, component);
        self.events.on_printer_killed(error, component);
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }

    pub fn now_ms(&mut self) -> u64 {
        self.clock.now_ms()
    }

    /// Delay that stays safe after a kill: busy-waits on the kill-safe clock
    /// instead of yielding to a scheduler that may no longer run.
    pub fn delay_ms(&mut self, ms: u64) {
        let thermal = &mut self.thermal;
        self.clock.delay_ms(ms, || thermal.manage_heaters());
    }
}
