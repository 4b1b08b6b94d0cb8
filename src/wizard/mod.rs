// src/wizard/mod.rs - Guided calibration sequence state space
//
// The wizard walks a linear-ish enumeration of states grouped into phases.
// Phase membership is a bitmask test; the terminal `Last` state belongs to
// every phase mask so one "is this phase over" test also catches an aborted
// run.
pub mod selftest;

/// One state of the guided sequence. At most one is active at a time;
/// transitions are driven by the sequencer, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WizardState {
    Start,
    Init,
    Info,
    First,

    SelftestInit,
    SelftestFan0,
    SelftestFan1,
    SelftestX,
    SelftestY,
    SelftestZ,
    SelftestCool,
    SelftestInitTemp,
    SelftestTemp,
    SelftestPass,
    SelftestFail,

    XyzCalibInit,
    XyzCalibHome,
    XyzCalibZ,
    XyzCalibCleanNozzle,
    XyzCalibIsSheet,
    XyzCalibRemoveSheet,
    XyzCalibPlacePaper,
    XyzCalibXySearch,
    XyzCalibPlaceSheet,
    XyzCalibXyMeasure,
    XyzCalibPass,
    XyzCalibFail,

    FirstLayInit,
    FirstLayLoad,
    FirstLayCalibPrompt,
    FirstLayStartPrompt,
    FirstLayPrint,
    FirstLayRepeatPrompt,
    FirstLayFail,

    Finish,
    /// Terminal sentinel, member of every phase mask. Doubles as the
    /// error/abort marker.
    Last,
}

// The phase masks are 64-bit; the state space must fit.
const _: () = assert!((WizardState::Last as u32) < 64);

pub const fn state_mask(state: WizardState) -> u64 {
    1u64 << (state as u64)
}

pub const MASK_WIZARD_START: u64 = state_mask(WizardState::Start)
    | state_mask(WizardState::Init)
    | state_mask(WizardState::Info)
    | state_mask(WizardState::First);

pub const MASK_SELFTEST: u64 = state_mask(WizardState::SelftestInit)
    | state_mask(WizardState::SelftestFan0)
    | state_mask(WizardState::SelftestFan1)
    | state_mask(WizardState::SelftestX)
    | state_mask(WizardState::SelftestY)
    | state_mask(WizardState::SelftestZ)
    | state_mask(WizardState::SelftestCool)
    | state_mask(WizardState::SelftestInitTemp)
    | state_mask(WizardState::SelftestTemp)
    | state_mask(WizardState::SelftestPass)
    | state_mask(WizardState::SelftestFail)
    | state_mask(WizardState::Last);

pub const MASK_XYZCALIB: u64 = state_mask(WizardState::XyzCalibInit)
    | state_mask(WizardState::XyzCalibHome)
    | state_mask(WizardState::XyzCalibZ)
    | state_mask(WizardState::XyzCalibCleanNozzle)
    | state_mask(WizardState::XyzCalibIsSheet)
    | state_mask(WizardState::XyzCalibRemoveSheet)
    | state_mask(WizardState::XyzCalibPlacePaper)
    | state_mask(WizardState::XyzCalibXySearch)
    | state_mask(WizardState::XyzCalibPlaceSheet)
    | state_mask(WizardState::XyzCalibXyMeasure)
    | state_mask(WizardState::XyzCalibPass)
    | state_mask(WizardState::XyzCalibFail)
    | state_mask(WizardState::Last);

pub const MASK_FIRSTLAY: u64 = state_mask(WizardState::FirstLayInit)
    | state_mask(WizardState::FirstLayLoad)
    | state_mask(WizardState::FirstLayCalibPrompt)
    | state_mask(WizardState::FirstLayStartPrompt)
    | state_mask(WizardState::FirstLayPrint)
    | state_mask(WizardState::FirstLayRepeatPrompt)
    | state_mask(WizardState::FirstLayFail)
    | state_mask(WizardState::Last);

/// States the full wizard run visits. XYZ calibration is currently disabled.
pub const MASK_WIZARD: u64 = MASK_WIZARD_START
    | MASK_SELFTEST
    | MASK_FIRSTLAY
    | state_mask(WizardState::Finish)
    | state_mask(WizardState::Last);

pub const fn mask_contains(mask: u64, state: WizardState) -> bool {
    mask & state_mask(state) != 0
}

/// Progress of a single selftest item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestState {
    Start,
    Running,
    Passed,
    Failed,
}

impl TestState {
    /// True once the item reached a verdict, either way. Terminality is
    /// derived from the verdict rather than stored beside it.
    pub fn is_done(self) -> bool {
        matches!(self, TestState::Passed | TestState::Failed)
    }
}
