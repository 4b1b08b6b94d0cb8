// Integration tests for the state bridge against the simulated machine

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs::File;
    use std::rc::Rc;

    use tempfile::tempdir;

    use extui_bridge::config::{ChamberConfig, MediaConfig};
    use extui_bridge::machine::sim::{
        SimFilamentSensor, SimLeveling, SimMotion, SimThermal, SimToolChanger,
    };
    use extui_bridge::*;

    struct Rig {
        motion: Rc<RefCell<SimMotion>>,
        thermal: Rc<RefCell<SimThermal>>,
        tools: Rc<RefCell<SimToolChanger>>,
        filament: Rc<RefCell<SimFilamentSensor>>,
        handler: RecordingHandler,
        bridge: Bridge,
    }

    fn rig_with_media(config: Config, media: Option<SharedMedia>) -> Rig {
        let motion = Rc::new(RefCell::new(SimMotion::new()));
        let thermal = Rc::new(RefCell::new(SimThermal::new(
            config.hotend.count,
            2,
            config.chamber.is_some(),
        )));
        let tools = Rc::new(RefCell::new(SimToolChanger::new()));
        let filament = Rc::new(RefCell::new(SimFilamentSensor::new()));
        let handler = RecordingHandler::new();
        let bridge = Bridge::new(
            config,
            Box::new(motion.clone()),
            Box::new(thermal.clone()),
            Box::new(tools.clone()),
            Some(Box::new(SimLeveling::new(4, 4))),
            Some(Box::new(filament.clone())),
            media,
            Box::new(handler.clone()),
            Box::new(SystemTimer::new()),
        );
        Rig {
            motion,
            thermal,
            tools,
            filament,
            handler,
            bridge,
        }
    }

    fn rig(config: Config) -> Rig {
        rig_with_media(config, None)
    }

    fn dir_media(root: &std::path::Path) -> (Rc<RefCell<DirMedia>>, SharedMedia) {
        let cfg = MediaConfig {
            root: root.to_str().unwrap().to_string(),
            recent_first: false,
        };
        let media = Rc::new(RefCell::new(DirMedia::new(&cfg)));
        let shared: SharedMedia = media.clone();
        (media, shared)
    }

    // ----- temperature -----

    #[test]
    fn test_bed_target_clamped_to_max_minus_margin() {
        // Defaults: bed max 125, margin 15.
        let mut r = rig(Config::default());
        let bed = Endpoint::Heater(HeaterId::Bed);
        r.bridge.set_target_temperature(150.0, bed);
        assert_eq!(r.bridge.get_target_temperature(bed), 110.0);
    }

    #[test]
    fn test_hotend_target_clamp_both_ends() {
        let mut r = rig(Config::default());
        let h0 = Endpoint::Extruder(ExtruderId(0));
        r.bridge.set_target_temperature(400.0, h0);
        assert_eq!(r.bridge.get_target_temperature(h0), 290.0);
        r.bridge.set_target_temperature(-20.0, h0);
        assert_eq!(r.bridge.get_target_temperature(h0), 0.0);
    }

    #[test]
    fn test_absent_chamber_reads_nan_and_ignores_writes() {
        let mut r = rig(Config::default());
        let chamber = Endpoint::Heater(HeaterId::Chamber);
        assert!(r.bridge.get_temperature(chamber).is_nan());
        assert!(r.bridge.get_target_temperature(chamber).is_nan());
        r.bridge.set_target_temperature(40.0, chamber);
        assert!(r.bridge.get_target_temperature(chamber).is_nan());
    }

    #[test]
    fn test_present_chamber_is_addressable() {
        let mut config = Config::default();
        config.chamber = Some(ChamberConfig {
            max_temp: 60.0,
            safety_margin: 5.0,
        });
        let mut r = rig(config);
        let chamber = Endpoint::Heater(HeaterId::Chamber);
        r.bridge.set_target_temperature(200.0, chamber);
        assert_eq!(r.bridge.get_target_temperature(chamber), 55.0);
    }

    #[test]
    fn test_out_of_range_hotend_reads_nan() {
        let r = rig(Config::default());
        assert!(r
            .bridge
            .get_temperature(Endpoint::Extruder(ExtruderId(3)))
            .is_nan());
        assert!(r
            .bridge
            .get_temperature(Endpoint::Heater(HeaterId::Hotend(7)))
            .is_nan());
    }

    // ----- fans -----

    #[test]
    fn test_fan_percent_duty_conversion() {
        let mut r = rig(Config::default());
        r.bridge.set_target_fan_percent(100.0, FanId(0));
        assert_eq!(r.thermal.borrow().fan_speed(FanId(0)), 255);
        assert!(r.bridge.get_target_fan_percent(FanId(0)) > 99.0);
        r.bridge.set_target_fan_percent(150.0, FanId(0));
        assert_eq!(r.thermal.borrow().fan_speed(FanId(0)), 255);
        r.bridge.set_target_fan_percent(-5.0, FanId(0));
        assert_eq!(r.thermal.borrow().fan_speed(FanId(0)), 0);
    }

    #[test]
    fn test_missing_fan_is_inert() {
        let mut r = rig(Config::default());
        r.bridge.set_target_fan_percent(100.0, FanId(9));
        assert_eq!(r.bridge.get_target_fan_percent(FanId(9)), 0.0);
    }

    // ----- axis moves -----

    #[test]
    fn test_axis_move_clamped_to_soft_endstops() {
        // Defaults: X in [0, 250].
        let mut r = rig(Config::default());
        r.bridge.set_axis_position_mm(9999.0, AxisId::X);
        r.motion.borrow_mut().drain();
        assert_eq!(r.bridge.get_axis_position_mm(AxisId::X), 250.0);
        r.bridge.set_axis_position_mm(-9999.0, AxisId::X);
        r.motion.borrow_mut().drain();
        assert_eq!(r.bridge.get_axis_position_mm(AxisId::X), 0.0);
    }

    #[test]
    fn test_delta_radial_bound_shrinks_with_cross_axis() {
        let mut config = Config::default();
        config.printer.kinematics = Kinematics::Delta;
        config.printer.printable_radius = 100.0;
        config.endstops.soft_endstops_enabled = false;
        let mut r = rig(config);
        // Park Y at 60; X may reach sqrt(100^2 - 60^2) = 80.
        r.motion.borrow_mut().enqueue_move([0.0, 60.0, 0.0, 0.0], 50.0);
        r.motion.borrow_mut().drain();
        r.bridge.set_axis_position_mm(999.0, AxisId::X);
        r.motion.borrow_mut().drain();
        let x = r.bridge.get_axis_position_mm(AxisId::X);
        assert!((x - 80.0).abs() < 0.001, "x = {}", x);
    }

    #[test]
    fn test_collapsed_window_ignores_move() {
        let mut config = Config::default();
        config.printer.kinematics = Kinematics::Delta;
        config.printer.printable_radius = 100.0;
        config.endstops.soft_min = [10.0, 10.0, 0.0];
        let mut r = rig(config);
        // Y outside the printable circle: radial reach for X is zero, below
        // the soft minimum. The window is empty and the move must be dropped.
        r.motion
            .borrow_mut()
            .enqueue_move([0.0, 150.0, 0.0, 0.0], 50.0);
        r.motion.borrow_mut().drain();
        let before = r.motion.borrow().moves_enqueued;
        r.bridge.set_axis_position_mm(50.0, AxisId::X);
        assert_eq!(r.motion.borrow().moves_enqueued, before);
    }

    #[test]
    fn test_extruder_position_out_of_range_is_nan() {
        let r = rig(Config::default());
        assert!(r.bridge.get_extruder_position_mm(ExtruderId(4)).is_nan());
    }

    #[test]
    fn test_feedrate_percent_clamped() {
        let mut r = rig(Config::default());
        r.bridge.set_feedrate_percent(700.0);
        assert_eq!(r.bridge.get_feedrate_percent(), 500.0);
        r.bridge.set_feedrate_percent(1.0);
        assert_eq!(r.bridge.get_feedrate_percent(), 10.0);
    }

    // ----- tools -----

    #[test]
    fn test_tool_change_skipped_when_already_active() {
        let mut config = Config::default();
        config.hotend.count = 2;
        let mut r = rig(config);
        r.bridge.set_active_tool(ExtruderId(0));
        assert_eq!(r.tools.borrow().change_calls, 0);
        r.bridge.set_active_tool(ExtruderId(1));
        assert_eq!(r.tools.borrow().change_calls, 1);
        r.bridge.set_active_tool(ExtruderId(1));
        assert_eq!(r.tools.borrow().change_calls, 1);
        assert_eq!(r.bridge.get_active_tool(), ExtruderId(1));
    }

    #[test]
    fn test_tool_change_out_of_range_ignored() {
        let mut r = rig(Config::default());
        r.bridge.set_active_tool(ExtruderId(5));
        assert_eq!(r.tools.borrow().change_calls, 0);
        assert_eq!(r.bridge.get_active_tool(), ExtruderId(0));
    }

    // ----- jogging -----

    #[test]
    fn test_jog_issues_segment_at_manual_feedrate() {
        let mut r = rig(Config::default());
        r.bridge.jog([1.0, 0.0, 0.0]);
        r.bridge.update();
        // One cycle is 0.1 s at 50 mm/s manual feedrate.
        assert_eq!(r.bridge.get_axis_position_mm(AxisId::X), 5.0);
        assert!(r.motion.borrow().moves_enqueued >= 1);
    }

    #[test]
    fn test_jog_poison_vector_forces_stop() {
        let mut r = rig(Config::default());
        r.bridge.jog([-1.5, 2.0, 0.0]);
        assert_eq!(r.bridge.poll_jog(), [0.0; 3]);
        let before = r.motion.borrow().moves_enqueued;
        r.bridge.update();
        // Jogging disabled itself; nothing may be enqueued.
        assert_eq!(r.motion.borrow().moves_enqueued, before);
    }

    #[test]
    fn test_jog_stops_on_zero_vector() {
        let mut r = rig(Config::default());
        r.bridge.jog([0.0, 1.0, 0.0]);
        r.bridge.update();
        r.bridge.jog([0.0, 0.0, 0.0]);
        r.motion.borrow_mut().drain();
        let parked = r.bridge.get_axis_position_mm(AxisId::Y);
        r.bridge.update();
        r.motion.borrow_mut().drain();
        assert_eq!(r.bridge.get_axis_position_mm(AxisId::Y), parked);
    }

    // ----- leveling and filament -----

    #[test]
    fn test_mesh_point_out_of_grid_is_ignored() {
        let mut r = rig(Config::default());
        r.bridge.set_mesh_point(9, 9, 0.5);
        assert!(r.bridge.get_mesh_point(9, 9).is_nan());
        r.bridge.set_mesh_point(1, 1, 0.25);
        assert_eq!(r.bridge.get_mesh_point(1, 1), 0.25);
    }

    #[test]
    fn test_z_offset_out_of_range_is_ignored() {
        let mut r = rig(Config::default());
        r.bridge.set_z_offset_mm(1.5);
        assert_eq!(r.bridge.get_z_offset_mm(), 1.5);
        r.bridge.set_z_offset_mm(5.0);
        assert_eq!(r.bridge.get_z_offset_mm(), 1.5);
        r.bridge.set_z_offset_mm(-5.0);
        assert_eq!(r.bridge.get_z_offset_mm(), 1.5);
    }

    #[test]
    fn test_runout_distance_clamped() {
        let mut r = rig(Config::default());
        r.bridge.set_filament_runout_distance_mm(5000.0);
        assert_eq!(r.bridge.get_filament_runout_distance_mm(), 999.0);
        r.bridge.set_filament_runout_distance_mm(-3.0);
        assert_eq!(r.bridge.get_filament_runout_distance_mm(), 0.0);
    }

    #[test]
    fn test_filament_runout_event_is_edge_latched() {
        let mut r = rig(Config::default());
        r.filament.borrow_mut().runout = true;
        r.bridge.update();
        r.bridge.update();
        assert_eq!(r.handler.count_of(&Event::FilamentRunout), 1);
        r.filament.borrow_mut().runout = false;
        r.bridge.update();
        r.filament.borrow_mut().runout = true;
        r.bridge.update();
        assert_eq!(r.handler.count_of(&Event::FilamentRunout), 2);
    }

    // ----- heating edges -----

    #[test]
    fn test_heating_started_and_done_events() {
        let mut r = rig(Config::default());
        r.bridge
            .set_target_temperature(50.0, Endpoint::Heater(HeaterId::Bed));
        r.bridge.update();
        assert_eq!(r.handler.count_of(&Event::HeatingStarted(HeaterId::Bed)), 1);
        assert_eq!(r.handler.count_of(&Event::HeatingDone(HeaterId::Bed)), 0);
        r.thermal.borrow_mut().settle();
        r.bridge.update();
        assert_eq!(r.handler.count_of(&Event::HeatingDone(HeaterId::Bed)), 1);
    }

    // ----- media pump -----

    #[test]
    fn test_media_insert_and_remove_events() {
        let dir = tempdir().unwrap();
        let (media, shared) = dir_media(dir.path());
        let mut r = rig_with_media(Config::default(), Some(shared));

        r.bridge.update();
        assert_eq!(r.handler.count_of(&Event::MediaInserted), 1);
        assert!(r.bridge.is_media_inserted());

        media.borrow_mut().set_inserted(false);
        r.bridge.update();
        assert_eq!(r.handler.count_of(&Event::MediaRemoved), 1);
        assert!(!r.bridge.is_media_inserted());

        // No further edges without a state change.
        r.bridge.update();
        assert_eq!(r.handler.count_of(&Event::MediaInserted), 1);
        assert_eq!(r.handler.count_of(&Event::MediaRemoved), 1);
    }

    #[test]
    fn test_media_mount_failure_raises_error_event() {
        let (_, shared) = dir_media(std::path::Path::new("/definitely/not/here"));
        let mut r = rig_with_media(Config::default(), Some(shared));
        r.bridge.update();
        assert_eq!(r.handler.count_of(&Event::MediaError), 1);
        assert_eq!(r.handler.count_of(&Event::MediaInserted), 0);
    }

    #[test]
    fn test_print_lifecycle_events() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("part.gcode")).unwrap();
        let (_media, shared) = dir_media(dir.path());
        let mut r = rig_with_media(Config::default(), Some(shared));
        r.bridge.update(); // mounts

        r.bridge.print_file("part.gcode");
        assert_eq!(r.handler.count_of(&Event::PrintStarted), 1);
        assert!(r.bridge.is_printing_from_media());
        assert!(!r.bridge.is_printing_from_media_paused());

        r.bridge.pause_print();
        assert!(r.bridge.is_printing_from_media_paused());
        r.bridge.resume_print();
        assert!(!r.bridge.is_printing_from_media_paused());
        r.bridge.stop_print();
        assert!(!r.bridge.is_printing_from_media());
        assert_eq!(r.handler.count_of(&Event::PrintStopped), 1);
    }

    #[test]
    fn test_print_finished_event_after_playback() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("part.gcode"), "G28\nG1 X10\n").unwrap();
        let (_media, shared) = dir_media(dir.path());
        let mut r = rig_with_media(Config::default(), Some(shared));
        r.bridge.update(); // mounts

        r.bridge.print_file("part.gcode");
        r.bridge.update(); // first line
        assert_eq!(r.handler.count_of(&Event::PrintFinished), 0);
        assert!(r.bridge.is_printing_from_media());
        r.bridge.update(); // last line
        assert_eq!(r.handler.count_of(&Event::PrintFinished), 1);
        assert!(!r.bridge.is_printing_from_media());

        // A stopped print never finishes.
        r.bridge.print_file("part.gcode");
        r.bridge.stop_print();
        r.bridge.update();
        assert_eq!(r.handler.count_of(&Event::PrintFinished), 1);
    }

    #[test]
    fn test_paused_print_does_not_finish() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("part.gcode"), "G28\n").unwrap();
        let (_media, shared) = dir_media(dir.path());
        let mut r = rig_with_media(Config::default(), Some(shared));
        r.bridge.update();

        r.bridge.print_file("part.gcode");
        r.bridge.pause_print();
        r.bridge.update();
        r.bridge.update();
        assert_eq!(r.handler.count_of(&Event::PrintFinished), 0);
        r.bridge.resume_print();
        r.bridge.update();
        assert_eq!(r.handler.count_of(&Event::PrintFinished), 1);
    }

    #[test]
    fn test_print_file_missing_raises_nothing() {
        let dir = tempdir().unwrap();
        let (_media, shared) = dir_media(dir.path());
        let mut r = rig_with_media(Config::default(), Some(shared));
        r.bridge.update();
        r.bridge.print_file("missing.gcode");
        assert_eq!(r.handler.count_of(&Event::PrintStarted), 0);
        assert!(!r.bridge.is_printing_from_media());
    }

    // ----- host pump loop -----

    #[test]
    fn test_pump_runs_on_interval_ticks() {
        tokio_test::block_on(async {
            let mut r = rig(Config::default());
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(1));
            for _ in 0..3 {
                interval.tick().await;
                r.bridge.update();
            }
            assert_eq!(r.handler.count_of(&Event::Idle), 3);
        });
    }

    // ----- confirmation and lifecycle -----

    #[test]
    fn test_user_confirm_wait_and_release() {
        let mut r = rig(Config::default());
        assert!(!r.bridge.is_awaiting_user());
        r.bridge.request_user_confirm("remove the sheet");
        assert!(r.bridge.is_awaiting_user());
        assert_eq!(
            r.handler
                .count_of(&Event::UserConfirmRequired("remove the sheet".to_string())),
            1
        );
        r.bridge.set_user_confirmed();
        assert!(!r.bridge.is_awaiting_user());
    }

    #[test]
    fn test_kill_event_delivered_at_most_once() {
        let mut r = rig(Config::default());
        r.bridge.kill("MAXTEMP", "hotend 0");
        r.bridge.kill("MAXTEMP", "hotend 0");
        r.bridge.kill("other", "bed");
        assert!(r.bridge.is_killed());
        let killed = r
            .handler
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::PrinterKilled { .. }))
            .count();
        assert_eq!(killed, 1);
    }

    #[test]
    fn test_killed_delay_does_not_run_thermal_management() {
        let mut r = rig(Config::default());
        r.thermal.borrow_mut().settle();
        r.bridge.kill("MAXTEMP", "bed");
        let before = r.bridge.get_temperature(Endpoint::Heater(HeaterId::Bed));
        r.bridge.delay_ms(3);
        let after = r.bridge.get_temperature(Endpoint::Heater(HeaterId::Bed));
        // The killed path busy-waits; no thermal tick means a bit-identical
        // reading.
        assert_eq!(before.to_bits(), after.to_bits());
    }

    #[test]
    fn test_time_advances_after_kill() {
        let mut r = rig(Config::default());
        let t0 = r.bridge.now_ms();
        r.bridge.kill("MAXTEMP", "bed");
        r.bridge.delay_ms(5);
        assert!(r.bridge.now_ms() >= t0 + 5);
    }
}
