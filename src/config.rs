// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration struct for the printer, heaters, endstops, leveling and media.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub printer: PrinterConfig,
    #[serde(default)]
    pub hotend: HotendConfig,
    #[serde(default)]
    pub heater_bed: HeaterBedConfig,
    #[serde(default)]
    pub chamber: Option<ChamberConfig>,
    #[serde(default)]
    pub endstops: EndstopConfig,
    #[serde(default)]
    pub leveling: LevelingConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            printer: PrinterConfig::default(),
            hotend: HotendConfig::default(),
            heater_bed: HeaterBedConfig::default(),
            chamber: None,
            endstops: EndstopConfig::default(),
            leveling: LevelingConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

/// Printer-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrinterConfig {
    #[serde(default = "default_kinematics")]
    pub kinematics: Kinematics,
    /// Build radius used to bound XY moves on delta machines.
    #[serde(default = "default_printable_radius")]
    pub printable_radius: f32,
    /// Feedrate used for UI-driven moves, per axis (X, Y, Z, E) in mm/s.
    #[serde(default = "default_manual_feedrate")]
    pub manual_feedrate_mm_s: [f32; 4],
    #[serde(default)]
    pub printer_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kinematics {
    Cartesian,
    Delta,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            kinematics: default_kinematics(),
            printable_radius: default_printable_radius(),
            manual_feedrate_mm_s: default_manual_feedrate(),
            printer_name: None,
        }
    }
}

/// Hotend heater limits, shared by all configured hotends.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotendConfig {
    #[serde(default = "default_hotend_count")]
    pub count: u8,
    #[serde(default = "default_hotend_max_temp")]
    pub max_temp: f32,
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f32,
    /// Minimum temperature at which extrusion is allowed.
    #[serde(default = "default_min_extrude_temp")]
    pub min_extrude_temp: f32,
}

impl Default for HotendConfig {
    fn default() -> Self {
        Self {
            count: default_hotend_count(),
            max_temp: default_hotend_max_temp(),
            safety_margin: default_safety_margin(),
            min_extrude_temp: default_min_extrude_temp(),
        }
    }
}

/// Heated bed limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeaterBedConfig {
    #[serde(default = "default_bed_max_temp")]
    pub max_temp: f32,
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f32,
}

impl Default for HeaterBedConfig {
    fn default() -> Self {
        Self {
            max_temp: default_bed_max_temp(),
            safety_margin: default_safety_margin(),
        }
    }
}

/// Heated chamber limits. Absent on most machines.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChamberConfig {
    #[serde(default = "default_chamber_max_temp")]
    pub max_temp: f32,
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f32,
}

/// Software endstop limits, per axis (X, Y, Z) in mm.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndstopConfig {
    #[serde(default = "default_true")]
    pub soft_endstops_enabled: bool,
    #[serde(default = "default_soft_min")]
    pub soft_min: [f32; 3],
    #[serde(default = "default_soft_max")]
    pub soft_max: [f32; 3],
}

impl Default for EndstopConfig {
    fn default() -> Self {
        Self {
            soft_endstops_enabled: true,
            soft_min: default_soft_min(),
            soft_max: default_soft_max(),
        }
    }
}

/// Bed leveling mesh dimensions and probe offset limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LevelingConfig {
    #[serde(default = "default_grid_points")]
    pub grid_points_x: u8,
    #[serde(default = "default_grid_points")]
    pub grid_points_y: u8,
    #[serde(default = "default_z_offset_min")]
    pub z_offset_min: f32,
    #[serde(default = "default_z_offset_max")]
    pub z_offset_max: f32,
}

impl Default for LevelingConfig {
    fn default() -> Self {
        Self {
            grid_points_x: default_grid_points(),
            grid_points_y: default_grid_points(),
            z_offset_min: default_z_offset_min(),
            z_offset_max: default_z_offset_max(),
        }
    }
}

/// Removable media configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(default = "default_media_root")]
    pub root: String,
    /// List most recent entries first instead of alphabetically.
    #[serde(default)]
    pub recent_first: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_media_root(),
            recent_first: false,
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_kinematics() -> Kinematics { Kinematics::Cartesian }
fn default_printable_radius() -> f32 { 125.0 }
fn default_manual_feedrate() -> [f32; 4] { [50.0, 50.0, 4.0, 2.0] }
fn default_hotend_count() -> u8 { 1 }
fn default_hotend_max_temp() -> f32 { 305.0 }
fn default_bed_max_temp() -> f32 { 125.0 }
fn default_chamber_max_temp() -> f32 { 60.0 }
fn default_safety_margin() -> f32 { 15.0 }
fn default_min_extrude_temp() -> f32 { 170.0 }
fn default_soft_min() -> [f32; 3] { [0.0, 0.0, 0.0] }
fn default_soft_max() -> [f32; 3] { [250.0, 210.0, 210.0] }
fn default_grid_points() -> u8 { 4 }
fn default_z_offset_min() -> f32 { -2.0 }
fn default_z_offset_max() -> f32 { 2.0 }
fn default_media_root() -> String { "gcodes".to_string() }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}
