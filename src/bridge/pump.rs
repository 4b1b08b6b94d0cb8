// src/bridge/pump.rs - Periodic update: edge detection and event dispatch
use crate::machine::HeaterId;

use super::Bridge;

/// Control cycle length assumed by the pump, in seconds.
const CYCLE_S: f32 = 0.1;

/// Edge-detection state carried between pump cycles.
#[derive(Debug, Default)]
pub struct PumpState {
    media_was_inserted: bool,
    heating: Vec<(HeaterId, bool)>,
    runout_latched: bool,
}

impl Bridge {
    fn tracked_heaters(&self) -> Vec<HeaterId> {
        let mut heaters = vec![HeaterId::Bed];
        if self.config.chamber.is_some() {
            heaters.push(HeaterId::Chamber);
        }
        for n in 0..self.config.hotend.count {
            heaters.push(HeaterId::Hotend(n));
        }
        heaters
    }

    /// One pump cycle. Call this from the host loop at the control cadence.
    ///
    /// Detects media insertion/removal, playback completion, heating
    /// start/done edges and filament runout, advances jogging and queued
    /// motion, keeps heaters managed and ends with the idle tick.
    pub fn update(&mut self) {
        self.update_media();
        self.update_jog(CYCLE_S);
        self.motion.update();
        self.thermal.manage_heaters();
        self.update_heating_edges();
        self.update_runout();
        self.events.on_idle();
    }

    fn update_media(&mut self) {
        let Some(media) = self.media.clone() else {
            return;
        };
        let inserted = media.borrow().is_inserted();
        if inserted != self.pump.media_was_inserted {
            self.pump.media_was_inserted = inserted;
            if inserted {
                let mounted = media.borrow_mut().mount();
                match mounted {
                    Ok(()) => self.events.on_media_inserted(),
                    Err(e) => {
                        tracing::warn!("Media mount failed: {}", e);
                        self.events.on_media_error();
                    }
                }
            } else {
                let was_mounted = media.borrow().is_mounted();
                media.borrow_mut().release();
                if was_mounted {
                    self.events.on_media_removed();
                }
            }
        }
        let finished = media.borrow_mut().advance_playback();
        if finished {
            tracing::info!("Media playback finished");
            self.events.on_print_finished();
        }
    }

    fn update_heating_edges(&mut self) {
        if self.pump.heating.is_empty() {
            self.pump.heating = self
                .tracked_heaters()
                .into_iter()
                .map(|h| (h, false))
                .collect();
        }
        for i in 0..self.pump.heating.len() {
            let (heater, was_heating) = self.pump.heating[i];
            let heating = self.thermal.is_heating(heater);
            if heating == was_heating {
                continue;
            }
            self.pump.heating[i].1 = heating;
            if heating {
                self.events.on_heating_started(heater);
            } else if self.thermal.target_temperature(heater) > 0.0 {
                // Reached target, not cancelled.
                self.events.on_heating_done(heater);
            }
        }
    }

    fn update_runout(&mut self) {
        let detected = self
            .filament
            .as_ref()
            .is_some_and(|f| f.runout_detected());
        if detected && !self.pump.runout_latched {
            tracing::warn!("Filament runout detected");
            self.events.on_filament_runout();
        }
        self.pump.runout_latched = detected;
    }
}
