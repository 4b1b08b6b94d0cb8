// src/main.rs - Host binary: simulated machine behind the bridge
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;

use extui_bridge::machine::sim::{
    SimFilamentSensor, SimLeveling, SimMotion, SimThermal, SimToolChanger,
};
use extui_bridge::{
    Bridge, DirMedia, EventHandler, FileList, HeaterId, SharedMedia, SystemTimer, config,
};

#[derive(Parser, Debug)]
#[command(name = "extui-host", about = "Run the UI state bridge against a simulated machine")]
struct Args {
    /// Path to the printer configuration file
    #[arg(short, long, default_value = "printer.toml")]
    config: String,

    /// Pump cycle period in milliseconds
    #[arg(long, default_value_t = 100)]
    cycle_ms: u64,
}

/// Host event handler that mirrors every notification into the log.
struct LogHandler;

impl EventHandler for LogHandler {
    fn on_startup(&mut self) {
        tracing::info!("Bridge started");
    }
    fn on_media_inserted(&mut self) {
        tracing::info!("Media inserted");
    }
    fn on_media_removed(&mut self) {
        tracing::info!("Media removed");
    }
    fn on_media_error(&mut self) {
        tracing::warn!("Media mount error");
    }
    fn on_print_started(&mut self) {
        tracing::info!("Print started");
    }
    fn on_print_paused(&mut self) {
        tracing::info!("Print paused");
    }
    fn on_print_resumed(&mut self) {
        tracing::info!("Print resumed");
    }
    fn on_print_stopped(&mut self) {
        tracing::info!("Print stopped");
    }
    fn on_heating_started(&mut self, heater: HeaterId) {
        tracing::info!("Heating started: {:?}", heater);
    }
    fn on_heating_done(&mut self, heater: HeaterId) {
        tracing::info!("Heating done: {:?}", heater);
    }
    fn on_filament_runout(&mut self) {
        tracing::warn!("Filament runout");
    }
    fn on_user_confirm_required(&mut self, message: &str) {
        tracing::info!("User confirmation required: {}", message);
    }
    fn on_printer_killed(&mut self, error: &str, component: &str) {
        tracing::error!("Printer killed: {} ({})", error, component);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    tracing::info!("Loading configuration from: {}", args.config);
    let config = config::load_config(&args.config).unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {}", e);
        config::Config::default()
    });

    if let Some(name) = &config.printer.printer_name {
        tracing::info!("Printer: {}", name);
    }
    tracing::info!(
        "Kinematics: {:?}, hotends: {}",
        config.printer.kinematics,
        config.hotend.count
    );

    let motion = SimMotion::new();
    let thermal = SimThermal::new(config.hotend.count, 2, config.chamber.is_some());
    let tools = SimToolChanger::new();
    let leveling = SimLeveling::new(config.leveling.grid_points_x, config.leveling.grid_points_y);
    let filament = SimFilamentSensor::new();
    let media: SharedMedia = Rc::new(RefCell::new(DirMedia::new(&config.media)));
    let recent_first = config.media.recent_first;

    let mut bridge = Bridge::new(
        config,
        Box::new(motion),
        Box::new(thermal),
        Box::new(tools),
        Some(Box::new(leveling)),
        Some(Box::new(filament)),
        Some(media.clone()),
        Box::new(LogHandler),
        Box::new(SystemTimer::new()),
    );
    let mut files = FileList::new(Some(media), recent_first);

    let mut interval = tokio::time::interval(Duration::from_millis(args.cycle_ms));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                bridge.update();
                if bridge.is_media_inserted() {
                    // Keep the listing fresh while media is present.
                    let _ = files.count();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    Ok(())
}
