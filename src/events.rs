// src/events.rs - Lifecycle notification contract between the bridge and the UI/host
use std::cell::RefCell;
use std::rc::Rc;

use crate::machine::HeaterId;

/// Notifications the bridge raises at phase transitions.
///
/// Callbacks run synchronously on the caller's context, which may be the
/// control loop itself. They must not block or do unbounded work; enqueue a UI
/// update and return. Every method defaults to a no-op so a host implements
/// only what it shows.
pub trait EventHandler {
    fn on_startup(&mut self) {}
    fn on_idle(&mut self) {}
    fn on_media_inserted(&mut self) {}
    fn on_media_removed(&mut self) {}
    /// Media was detected but failed to mount. Distinct from removal.
    fn on_media_error(&mut self) {}
    fn on_print_started(&mut self) {}
    fn on_print_paused(&mut self) {}
    fn on_print_resumed(&mut self) {}
    fn on_print_stopped(&mut self) {}
    fn on_print_finished(&mut self) {}
    fn on_heating_started(&mut self, _heater: HeaterId) {}
    fn on_heating_done(&mut self, _heater: HeaterId) {}
    fn on_filament_runout(&mut self) {}
    /// A message needs acknowledgment; the host must eventually call
    /// `Bridge::set_user_confirmed` to release the wait.
    fn on_user_confirm_required(&mut self, _message: &str) {}
    fn on_factory_reset(&mut self) {}
    /// Delivered at most once, gated by the killed latch.
    fn on_printer_killed(&mut self, _error: &str, _component: &str) {}
}

/// Host that displays nothing.
pub struct NullHandler;

impl EventHandler for NullHandler {}

/// Every event the bridge can emit, as a recordable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Startup,
    Idle,
    MediaInserted,
    MediaRemoved,
    MediaError,
    PrintStarted,
    PrintPaused,
    PrintResumed,
    PrintStopped,
    PrintFinished,
    HeatingStarted(HeaterId),
    HeatingDone(HeaterId),
    FilamentRunout,
    UserConfirmRequired(String),
    FactoryReset,
    PrinterKilled { error: String, component: String },
}

/// Test double that records every invocation in order.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    events: Rc<RefCell<Vec<Event>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn count_of(&self, wanted: &Event) -> usize {
        self.events.borrow().iter().filter(|e| *e == wanted).count()
    }

    fn push(&mut self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl EventHandler for RecordingHandler {
    fn on_startup(&mut self) {
        self.push(Event::Startup);
    }
    fn on_idle(&mut self) {
        self.push(Event::Idle);
    }
    fn on_media_inserted(&mut self) {
        self.push(Event::MediaInserted);
    }
    fn on_media_removed(&mut self) {
        self.push(Event::MediaRemoved);
    }
    fn on_media_error(&mut self) {
        self.push(Event::MediaError);
    }
    fn on_print_started(&mut self) {
        self.push(Event::PrintStarted);
    }
    fn on_print_paused(&mut self) {
        self.push(Event::PrintPaused);
    }
    fn on_print_resumed(&mut self) {
        self.push(Event::PrintResumed);
    }
    fn on_print_stopped(&mut self) {
        self.push(Event::PrintStopped);
    }
    fn on_print_finished(&mut self) {
        self.push(Event::PrintFinished);
    }
    fn on_heating_started(&mut self, heater: HeaterId) {
        self.push(Event::HeatingStarted(heater));
    }
    fn on_heating_done(&mut self, heater: HeaterId) {
        self.push(Event::HeatingDone(heater));
    }
    fn on_filament_runout(&mut self) {
        self.push(Event::FilamentRunout);
    }
    fn on_user_confirm_required(&mut self, message: &str) {
        self.push(Event::UserConfirmRequired(message.to_string()));
    }
    fn on_factory_reset(&mut self) {
        self.push(Event::FactoryReset);
    }
    fn on_printer_killed(&mut self, error: &str, component: &str) {
        self.push(Event::PrinterKilled {
            error: error.to_string(),
            component: component.to_string(),
        });
    }
}
