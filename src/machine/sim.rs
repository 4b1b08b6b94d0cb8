// src/machine/sim.rs - Simulated subsystems for the host binary and tests
use std::collections::VecDeque;

use rand::Rng;

use super::{
    AxisId, ExtruderId, FanId, FilamentSensor, HeaterId, LevelingProvider, MotionControl,
    PlannerSettings, ThermalControl, ToolChanger,
};

/// Simulated motion planner. Moves are queued and retired one per control
/// cycle; position jumps to the retired move's target.
pub struct SimMotion {
    settings: PlannerSettings,
    position: [f32; 4],
    queue: VecDeque<([f32; 4], f32)>,
    homed: [bool; 3],
    feedrate_percent: f32,
    pub moves_enqueued: usize,
}

impl SimMotion {
    pub fn new() -> Self {
        Self {
            settings: PlannerSettings::default(),
            position: [0.0; 4],
            queue: VecDeque::new(),
            homed: [true, true, true],
            feedrate_percent: 100.0,
            moves_enqueued: 0,
        }
    }

    pub fn set_homed(&mut self, axis: AxisId, homed: bool) {
        self.homed[axis.index()] = homed;
    }

    /// Retire every queued move at once.
    pub fn drain(&mut self) {
        while self.is_processing() {
            self.update();
        }
    }
}

impl Default for SimMotion {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionControl for SimMotion {
    fn settings(&self) -> PlannerSettings {
        self.settings.clone()
    }

    fn apply_settings(&mut self, settings: PlannerSettings) {
        self.settings = settings;
    }

    fn position(&self) -> [f32; 4] {
        self.position
    }

    fn enqueue_move(&mut self, target: [f32; 4], feedrate_mm_s: f32) {
        self.moves_enqueued += 1;
        self.queue.push_back((target, feedrate_mm_s));
    }

    fn has_blocks_queued(&self) -> bool {
        !self.queue.is_empty()
    }

    fn is_processing(&self) -> bool {
        !self.queue.is_empty()
    }

    fn update(&mut self) {
        if let Some((target, _feedrate)) = self.queue.pop_front() {
            self.position = target;
        }
    }

    fn axis_homed(&self, axis: AxisId) -> bool {
        self.homed[axis.index()]
    }

    fn axis_position_known(&self, axis: AxisId) -> bool {
        self.homed[axis.index()]
    }

    fn feedrate_percent(&self) -> f32 {
        self.feedrate_percent
    }

    fn set_feedrate_percent(&mut self, value: f32) {
        self.feedrate_percent = value;
    }
}

struct SimHeater {
    current: f32,
    target: f32,
    idle_deadline_ms: u64,
    idle: bool,
}

/// Simulated thermal manager: first-order approach toward target with
/// thermistor noise, plus per-heater idle timeouts.
pub struct SimThermal {
    hotends: Vec<SimHeater>,
    bed: SimHeater,
    chamber: Option<SimHeater>,
    fans: Vec<u8>,
    min_extrude_temp: f32,
    idle_timeout_ms: u64,
    now_ms: u64,
    noise: f32,
}

const AMBIENT_C: f32 = 25.0;

impl SimThermal {
    pub fn new(hotend_count: u8, fan_count: u8, has_chamber: bool) -> Self {
        let heater = || SimHeater {
            current: AMBIENT_C,
            target: 0.0,
            idle_deadline_ms: 0,
            idle: false,
        };
        Self {
            hotends: (0..hotend_count).map(|_| heater()).collect(),
            bed: heater(),
            chamber: has_chamber.then(heater),
            fans: vec![0; fan_count as usize],
            min_extrude_temp: 170.0,
            idle_timeout_ms: 1_800_000,
            now_ms: 0,
            noise: 0.3,
        }
    }

    fn heater(&self, id: HeaterId) -> Option<&SimHeater> {
        match id {
            HeaterId::Bed => Some(&self.bed),
            HeaterId::Chamber => self.chamber.as_ref(),
            HeaterId::Hotend(n) => self.hotends.get(n as usize),
        }
    }

    fn heater_mut(&mut self, id: HeaterId) -> Option<&mut SimHeater> {
        match id {
            HeaterId::Bed => Some(&mut self.bed),
            HeaterId::Chamber => self.chamber.as_mut(),
            HeaterId::Hotend(n) => self.hotends.get_mut(n as usize),
        }
    }

    /// Snap every heater straight to its target. Test convenience.
    pub fn settle(&mut self) {
        for h in self.hotends.iter_mut().chain(std::iter::once(&mut self.bed)) {
            h.current = h.target.max(AMBIENT_C);
        }
        if let Some(ch) = &mut self.chamber {
            ch.current = ch.target.max(AMBIENT_C);
        }
    }
}

impl ThermalControl for SimThermal {
    fn temperature(&self, heater: HeaterId) -> f32 {
        self.heater(heater).map_or(f32::NAN, |h| h.current)
    }

    fn target_temperature(&self, heater: HeaterId) -> f32 {
        self.heater(heater).map_or(f32::NAN, |h| h.target)
    }

    fn set_target_temperature(&mut self, heater: HeaterId, deg_c: f32) {
        if let Some(h) = self.heater_mut(heater) {
            h.target = deg_c.max(0.0);
        }
    }

    fn reset_idle_timer(&mut self, heater: HeaterId) {
        // Chamber has no idle timer.
        if matches!(heater, HeaterId::Chamber) {
            return;
        }
        let deadline = self.now_ms + self.idle_timeout_ms;
        if let Some(h) = self.heater_mut(heater) {
            h.idle_deadline_ms = deadline;
            h.idle = false;
        }
    }

    fn is_idle(&self, heater: HeaterId) -> bool {
        if matches!(heater, HeaterId::Chamber) {
            return false;
        }
        self.heater(heater).is_some_and(|h| h.idle)
    }

    fn is_heating(&self, heater: HeaterId) -> bool {
        self.heater(heater)
            .is_some_and(|h| h.target > 0.0 && h.current < h.target - 2.0)
    }

    fn fan_speed(&self, fan: FanId) -> u8 {
        self.fans.get(fan.0 as usize).copied().unwrap_or(0)
    }

    fn set_fan_speed(&mut self, fan: FanId, speed: u8) {
        if let Some(f) = self.fans.get_mut(fan.0 as usize) {
            *f = speed;
        }
    }

    fn fan_count(&self) -> u8 {
        self.fans.len() as u8
    }

    fn too_cold_to_extrude(&self, extruder: ExtruderId) -> bool {
        self.hotends
            .get(extruder.0 as usize)
            .is_none_or(|h| h.current < self.min_extrude_temp)
    }

    fn manage_heaters(&mut self) {
        self.now_ms += 100;
        let now = self.now_ms;
        let noise = self.noise;
        let mut rng = rand::rng();
        for h in self.hotends.iter_mut().chain(std::iter::once(&mut self.bed)) {
            let goal = if h.target > 0.0 { h.target } else { AMBIENT_C };
            h.current += (goal - h.current) * 0.2 + rng.random_range(-noise..noise);
            if h.idle_deadline_ms != 0 && now >= h.idle_deadline_ms {
                h.idle = true;
                h.target = 0.0;
            }
        }
        if let Some(ch) = &mut self.chamber {
            let goal = if ch.target > 0.0 { ch.target } else { AMBIENT_C };
            ch.current += (goal - ch.current) * 0.05;
        }
    }
}

/// Tool changer that records every change request.
pub struct SimToolChanger {
    active: u8,
    pub change_calls: usize,
}

impl SimToolChanger {
    pub fn new() -> Self {
        Self {
            active: 0,
            change_calls: 0,
        }
    }
}

impl Default for SimToolChanger {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolChanger for SimToolChanger {
    fn active_tool(&self) -> u8 {
        self.active
    }

    fn tool_change(&mut self, tool: u8) {
        self.change_calls += 1;
        self.active = tool;
        tracing::debug!("Tool change to T{}", tool);
    }
}

/// In-memory leveling mesh.
pub struct SimLeveling {
    grid_x: u8,
    grid_y: u8,
    mesh: Vec<f32>,
    active: bool,
    valid: bool,
    z_offset: f32,
}

impl SimLeveling {
    pub fn new(grid_x: u8, grid_y: u8) -> Self {
        Self {
            grid_x,
            grid_y,
            mesh: vec![0.0; grid_x as usize * grid_y as usize],
            active: false,
            valid: false,
            z_offset: 0.0,
        }
    }

    pub fn mark_valid(&mut self) {
        self.valid = true;
    }

    fn idx(&self, x: u8, y: u8) -> Option<usize> {
        (x < self.grid_x && y < self.grid_y)
            .then(|| y as usize * self.grid_x as usize + x as usize)
    }
}

impl LevelingProvider for SimLeveling {
    fn leveling_active(&self) -> bool {
        self.active
    }

    fn set_leveling_active(&mut self, active: bool) {
        self.active = active;
    }

    fn mesh_valid(&self) -> bool {
        self.valid
    }

    fn mesh_point(&self, x: u8, y: u8) -> f32 {
        self.idx(x, y).map_or(f32::NAN, |i| self.mesh[i])
    }

    fn set_mesh_point(&mut self, x: u8, y: u8, z_offset: f32) {
        if let Some(i) = self.idx(x, y) {
            self.mesh[i] = z_offset;
        }
    }

    fn z_offset(&self) -> f32 {
        self.z_offset
    }

    fn set_z_offset(&mut self, value: f32) {
        self.z_offset = value;
    }
}

/// Filament sensor with a scriptable runout flag.
pub struct SimFilamentSensor {
    enabled: bool,
    runout_distance: f32,
    pub runout: bool,
}

impl SimFilamentSensor {
    pub fn new() -> Self {
        Self {
            enabled: true,
            runout_distance: 7.0,
            runout: false,
        }
    }
}

impl Default for SimFilamentSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl FilamentSensor for SimFilamentSensor {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, value: bool) {
        self.enabled = value;
    }

    fn runout_distance_mm(&self) -> f32 {
        self.runout_distance
    }

    fn set_runout_distance_mm(&mut self, value: f32) {
        self.runout_distance = value;
    }

    fn runout_detected(&self) -> bool {
        self.enabled && self.runout
    }
}
