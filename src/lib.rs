// src/lib.rs - UI state bridge for a 3D printer control core
//
// The crate sits between an untrusted display/host layer and the machine
// subsystems: every UI intent is clamped or ignored rather than rejected with
// an error, and every machine state change the UI cares about surfaces as an
// event callback.

pub mod bridge;
pub mod clock;
pub mod config;
pub mod events;
pub mod machine;
pub mod media;
pub mod wizard;

pub use bridge::{Bridge, Endpoint, settings::StepperAxis};
pub use clock::{HardwareTimer, SafeClock, SystemTimer};
pub use config::{Config, ConfigError, Kinematics, load_config};
pub use events::{Event, EventHandler, NullHandler, RecordingHandler};
pub use machine::{
    AxisId, ExtruderId, FanId, FilamentSensor, HeaterId, LevelingProvider, MotionControl,
    PlannerSettings, ThermalControl, ToolChanger,
};
pub use media::{DirMedia, FileList, MediaBackend, MediaEntry, MediaError, SharedMedia};
pub use wizard::{
    MASK_FIRSTLAY, MASK_SELFTEST, MASK_WIZARD, MASK_WIZARD_START, MASK_XYZCALIB, TestState,
    WizardState, mask_contains, state_mask,
    selftest::{ProgressPublisher, SelftestReport, SelftestRunner, SelftestSelection},
};
