// src/wizard/selftest.rs - Selftest driver and progress reporting
use uuid::Uuid;

use crate::bridge::{Bridge, Endpoint};
use crate::machine::{AxisId, FanId, HeaterId};

use super::{TestState, WizardState};

/// Receiver for wizard progress. Implemented by the progress dialog; the
/// driver publishes a state, a percentage and the current item verdict.
pub trait ProgressPublisher {
    fn dialog_opened(&mut self) {}
    fn dialog_closed(&mut self) {}
    fn publish(&mut self, state: WizardState, percent: u8, test: TestState);
}

/// Opens a progress dialog for the duration of a scope and guarantees it is
/// closed again on every exit path.
pub struct ProgressScope<'a, P: ProgressPublisher + ?Sized> {
    publisher: &'a mut P,
}

impl<'a, P: ProgressPublisher + ?Sized> ProgressScope<'a, P> {
    pub fn new(publisher: &'a mut P) -> Self {
        publisher.dialog_opened();
        Self { publisher }
    }

    pub fn publish(&mut self, state: WizardState, percent: u8, test: TestState) {
        self.publisher.publish(state, percent, test);
    }
}

impl<P: ProgressPublisher + ?Sized> Drop for ProgressScope<'_, P> {
    fn drop(&mut self) {
        self.publisher.dialog_closed();
    }
}

/// Maps a Z travel range onto a progress percentage range, so a blocking
/// Z move reports smooth progress.
#[derive(Debug, Clone, Copy)]
pub struct ZMoveProgress {
    z_from: f32,
    z_to: f32,
    pct_from: u8,
    pct_to: u8,
}

impl ZMoveProgress {
    pub fn new(z_from: f32, z_to: f32, pct_from: u8, pct_to: u8) -> Self {
        Self {
            z_from,
            z_to,
            pct_from,
            pct_to,
        }
    }

    pub fn percent_at(&self, z: f32) -> u8 {
        let span = self.z_to - self.z_from;
        if span.abs() < f32::EPSILON {
            return self.pct_to;
        }
        let t = ((z - self.z_from) / span).clamp(0.0, 1.0);
        (self.pct_from as f32 + t * (self.pct_to - self.pct_from) as f32).round() as u8
    }
}

/// Which selftest items to run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelftestSelection {
    pub x: bool,
    pub y: bool,
    pub z: bool,
    pub fans: bool,
    pub heaters: bool,
}

impl SelftestSelection {
    pub fn all() -> Self {
        Self {
            x: true,
            y: true,
            z: true,
            fans: true,
            heaters: true,
        }
    }

    /// Normalize a raw request: a heater-only request means "run everything".
    pub fn normalized(mut self) -> Self {
        let fan_axis = self.x || self.y || self.z || self.fans;
        if !fan_axis && self.heaters {
            self = Self::all();
        }
        self
    }
}

/// Outcome of one selftest run.
#[derive(Debug, Clone)]
pub struct SelftestReport {
    pub run_id: Uuid,
    pub results: Vec<(WizardState, TestState)>,
}

impl SelftestReport {
    pub fn passed(&self) -> bool {
        !self.results.is_empty()
            && self.results.iter().all(|(_, t)| *t == TestState::Passed)
    }
}

const PARK_Z_MM: f32 = 20.0;
const PARK_Z_FEEDRATE: f32 = 4.0;
const AXIS_TEST_TRAVEL_MM: f32 = 10.0;
const HEATER_TEST_TARGET_C: f32 = 40.0;
const HEATER_TEST_RISE_C: f32 = 5.0;
const HEATER_TEST_POLL_MS: u64 = 10;
const HEATER_TEST_MAX_POLLS: u32 = 200;

/// Drives the selftest phase of the wizard: enters each selected item's
/// state, exercises the hardware through the bridge, and publishes the item
/// verdict. Items stop polling once their state is done.
pub struct SelftestRunner<'a> {
    bridge: &'a mut Bridge,
    run_id: Uuid,
}

impl<'a> SelftestRunner<'a> {
    pub fn new(bridge: &'a mut Bridge) -> Self {
        Self {
            bridge,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run(
        mut self,
        selection: SelftestSelection,
        publisher: &mut dyn ProgressPublisher,
    ) -> SelftestReport {
        let selection = selection.normalized();
        tracing::info!("Selftest {} starting: {:?}", self.run_id, selection);
        let mut results = Vec::new();
        {
            let mut scope = ProgressScope::new(publisher);
            scope.publish(WizardState::SelftestInit, 0, TestState::Start);

            if selection.fans {
                for (state, fan) in [
                    (WizardState::SelftestFan0, FanId(0)),
                    (WizardState::SelftestFan1, FanId(1)),
                ] {
                    let verdict = self.test_fan(state, fan, &mut scope);
                    results.push((state, verdict));
                }
            }
            for (wanted, state, axis) in [
                (selection.x, WizardState::SelftestX, AxisId::X),
                (selection.y, WizardState::SelftestY, AxisId::Y),
                (selection.z, WizardState::SelftestZ, AxisId::Z),
            ] {
                if wanted {
                    let verdict = self.test_axis(state, axis, &mut scope);
                    results.push((state, verdict));
                }
            }
            if selection.heaters {
                let verdict = self.test_heater(&mut scope);
                results.push((WizardState::SelftestTemp, verdict));
            }

            let all_passed =
                !results.is_empty() && results.iter().all(|(_, t)| *t == TestState::Passed);
            let final_state = if all_passed {
                WizardState::SelftestPass
            } else {
                WizardState::SelftestFail
            };
            scope.publish(
                final_state,
                100,
                if all_passed {
                    TestState::Passed
                } else {
                    TestState::Failed
                },
            );
        }
        let report = SelftestReport {
            run_id: self.run_id,
            results,
        };
        tracing::info!(
            "Selftest {} finished: {}",
            report.run_id,
            if report.passed() { "pass" } else { "fail" }
        );
        report
    }

    fn test_fan(
        &mut self,
        state: WizardState,
        fan: FanId,
        scope: &mut ProgressScope<'_, dyn ProgressPublisher + '_>,
    ) -> TestState {
        scope.publish(state, 0, TestState::Running);
        self.bridge.set_target_fan_percent(100.0, fan);
        let verdict = if self.bridge.get_target_fan_percent(fan) > 99.0 {
            TestState::Passed
        } else {
            TestState::Failed
        };
        self.bridge.set_target_fan_percent(0.0, fan);
        scope.publish(state, 100, verdict);
        verdict
    }

    fn test_axis(
        &mut self,
        state: WizardState,
        axis: AxisId,
        scope: &mut ProgressScope<'_, dyn ProgressPublisher + '_>,
    ) -> TestState {
        scope.publish(state, 0, TestState::Running);
        let start = self.bridge.get_axis_position_mm(axis);
        let mut target = [
            self.bridge.get_axis_position_mm(AxisId::X),
            self.bridge.get_axis_position_mm(AxisId::Y),
            self.bridge.get_axis_position_mm(AxisId::Z),
            0.0,
        ];

        if axis == AxisId::Z {
            // Z test parks the head, reporting progress over the lift.
            let progress = ZMoveProgress::new(start, PARK_Z_MM, 0, 100);
            self.bridge.move_blocking_to_z(PARK_Z_MM, PARK_Z_FEEDRATE);
            let z = self.bridge.get_axis_position_mm(AxisId::Z);
            scope.publish(state, progress.percent_at(z), TestState::Running);
            self.bridge.move_blocking_to_z(start, PARK_Z_FEEDRATE);
        } else {
            target[axis.index()] = start + AXIS_TEST_TRAVEL_MM;
            self.bridge.move_blocking(target, PARK_Z_FEEDRATE);
            scope.publish(state, 50, TestState::Running);
            target[axis.index()] = start;
            self.bridge.move_blocking(target, PARK_Z_FEEDRATE);
        }

        let returned = (self.bridge.get_axis_position_mm(axis) - start).abs() < 0.01;
        let verdict = if returned {
            TestState::Passed
        } else {
            TestState::Failed
        };
        scope.publish(state, 100, verdict);
        verdict
    }

    fn test_heater(&mut self, scope: &mut ProgressScope<'_, dyn ProgressPublisher + '_>) -> TestState {
        scope.publish(WizardState::SelftestInitTemp, 0, TestState::Start);
        let endpoint = Endpoint::Heater(HeaterId::Bed);
        let start_temp = self.bridge.get_temperature(endpoint);
        self.bridge
            .set_target_temperature(HEATER_TEST_TARGET_C, endpoint);

        let mut verdict = TestState::Running;
        let mut polls = 0;
        while !verdict.is_done() {
            self.bridge.delay_ms(HEATER_TEST_POLL_MS);
            let temp = self.bridge.get_temperature(endpoint);
            let pct = (polls * 100 / HEATER_TEST_MAX_POLLS).min(99) as u8;
            scope.publish(WizardState::SelftestTemp, pct, TestState::Running);
            if temp - start_temp >= HEATER_TEST_RISE_C {
                verdict = TestState::Passed;
            } else if polls >= HEATER_TEST_MAX_POLLS {
                verdict = TestState::Failed;
            }
            polls += 1;
        }

        self.bridge.set_target_temperature(0.0, endpoint);
        scope.publish(WizardState::SelftestTemp, 100, verdict);
        verdict
    }
}

/// Publisher that keeps every report, for tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    pub opened: usize,
    pub closed: usize,
    pub reports: Vec<(WizardState, u8, TestState)>,
}

impl ProgressPublisher for RecordingPublisher {
    fn dialog_opened(&mut self) {
        self.opened += 1;
    }
    fn dialog_closed(&mut self) {
        self.closed += 1;
    }
    fn publish(&mut self, state: WizardState, percent: u8, test: TestState) {
        self.reports.push((state, percent, test));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_move_progress_mapping() {
        let p = ZMoveProgress::new(0.0, 20.0, 0, 100);
        assert_eq!(p.percent_at(0.0), 0);
        assert_eq!(p.percent_at(10.0), 50);
        assert_eq!(p.percent_at(20.0), 100);
        assert_eq!(p.percent_at(25.0), 100); // clamped
    }

    #[test]
    fn test_z_move_progress_zero_span() {
        let p = ZMoveProgress::new(5.0, 5.0, 10, 90);
        assert_eq!(p.percent_at(5.0), 90);
    }

    #[test]
    fn test_selection_heater_only_selects_all() {
        let s = SelftestSelection {
            heaters: true,
            ..Default::default()
        }
        .normalized();
        assert!(s.x && s.y && s.z && s.fans && s.heaters);
    }

    #[test]
    fn test_selection_axis_only_stays_narrow() {
        let s = SelftestSelection {
            z: true,
            ..Default::default()
        }
        .normalized();
        assert!(s.z);
        assert!(!s.x && !s.y && !s.fans && !s.heaters);
    }

    #[test]
    fn test_progress_scope_closes_dialog() {
        let mut publisher = RecordingPublisher::default();
        {
            let mut scope = ProgressScope::new(&mut publisher);
            scope.publish(WizardState::SelftestInit, 0, TestState::Start);
        }
        assert_eq!(publisher.opened, 1);
        assert_eq!(publisher.closed, 1);
        assert_eq!(publisher.reports.len(), 1);
    }

    #[test]
    fn test_empty_report_does_not_pass() {
        let report = SelftestReport {
            run_id: Uuid::new_v4(),
            results: Vec::new(),
        };
        assert!(!report.passed());
    }
}
