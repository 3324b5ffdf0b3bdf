//! Integration tests for the game runner: lifecycle, per-frame events,
//! rendering and replay recording/playback.

mod common;

use bwbridge::prelude::*;
use bwbridge_sim::catalog::{COMMAND_CENTER, GHOST, MARINE, MEDIC};

use common::*;

fn tick_n(runner: &mut GameRunner, frames: u32) -> Vec<GameEvent> {
    let mut events = Vec::new();
    for _ in 0..frames {
        runner.tick();
        events.extend(runner.drain_events());
    }
    events
}

/// Tick until the runner leaves `Running`, collecting every event.
fn run_to_pause(runner: &mut GameRunner) -> Vec<GameEvent> {
    let mut events = Vec::new();
    for _ in 0..1_000 {
        if runner.state() != RunnerState::Running {
            break;
        }
        runner.tick();
        events.extend(runner.drain_events());
    }
    events
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn lifecycle_follows_the_state_machine() {
    let path = scenario_file("lifecycle");
    let mut runner = GameRunner::with_sandbox(RunnerConfig::default());
    assert_eq!(runner.state(), RunnerState::NoGame);

    runner.start_game(&path, Race::Terran, 0).unwrap();
    assert_eq!(runner.state(), RunnerState::Running);
    assert!(matches!(
        runner.start_game(&path, Race::Terran, 0),
        Err(BridgeError::SessionActive(RunnerState::Running))
    ));
    assert_eq!(runner.state(), RunnerState::Running);

    runner.pause();
    assert!(matches!(
        runner.load_replay(path.with_extension("replay")),
        Err(BridgeError::SessionActive(RunnerState::Paused))
    ));

    runner.stop();
    assert_eq!(runner.state(), RunnerState::Stopped);
    assert!(runner.simulation().is_none());
    runner.tick();
    assert_eq!(runner.current_frame(), 0);

    runner.start_game(&path, Race::Terran, 0).unwrap();
    assert_eq!(runner.state(), RunnerState::Running);
}

#[test]
fn failed_start_returns_to_no_game() {
    let mut runner = GameRunner::with_sandbox(RunnerConfig::default());
    let missing = temp_dir("missing").join("nope.json");
    assert!(matches!(
        runner.start_game(&missing, Race::Terran, 0),
        Err(BridgeError::Sim(SimError::MapRead { .. }))
    ));
    assert_eq!(runner.state(), RunnerState::NoGame);

    let path = scenario_file("zerg");
    assert!(matches!(
        runner.start_game(&path, Race::Zerg, 0),
        Err(BridgeError::Sim(SimError::UnsupportedRace(Race::Zerg)))
    ));
    assert_eq!(runner.state(), RunnerState::NoGame);
    assert!(runner.drain_events().is_empty());
}

#[test]
fn commands_without_a_session_are_ignored() {
    let mut runner = GameRunner::with_sandbox(RunnerConfig::default());
    runner.select_at(ScreenPoint::new(10.0, 10.0));
    runner.move_selected_to(ScreenPoint::new(50.0, 50.0));
    runner.train(MARINE);
    assert_eq!(runner.control_group_size(1), 0);
    assert!(!runner.has_selection());
    assert!(runner.drain_events().is_empty());
    assert!(runner.selected_units_info().is_empty());
    assert!(runner.available_abilities().is_empty());
}

// ---------------------------------------------------------------------------
// Snapshot and events
// ---------------------------------------------------------------------------

#[test]
fn snapshot_hides_fogged_units() {
    let runner = session();
    let snapshot = runner.snapshot();
    let medic = unit_of(&runner, PlayerId(1), MEDIC);
    let enemy_marine = unit_of(&runner, PlayerId(1), MARINE);
    assert!(snapshot.contains(medic));
    assert!(!snapshot.contains(enemy_marine));
    // Six own units, the mineral field and the scouting medic.
    assert_eq!(snapshot.units.len(), 8);
}

#[test]
fn every_tick_reports_the_frame_and_bank() {
    let mut runner = session();
    let events = tick_n(&mut runner, 3);
    let frames: Vec<FrameUpdate> = events
        .iter()
        .filter_map(|e| match e {
            GameEvent::FrameUpdated(update) => Some(*update),
            _ => None,
        })
        .collect();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2].frame, 3);
    assert_eq!(frames[2].minerals, 1000);
    assert_eq!(frames[2].gas, 500);
}

#[test]
fn deaths_are_reported_and_pruned() {
    let mut runner = session();
    select_all_own(&mut runner);
    assert_eq!(runner.selection_count(), 6);
    runner.assign_control_group(1);
    assert_eq!(runner.control_group_size(1), 6);

    let marine = unit_of(&runner, PlayerId(0), MARINE);
    assert!(runner.sandbox_mut().unwrap().kill_unit(marine));
    let events = tick_n(&mut runner, 1);

    assert!(events.contains(&GameEvent::UnitDied { id: marine }));
    assert_eq!(runner.selection_count(), 5);
    assert!(!runner.selection().contains(&marine));
    assert_eq!(runner.control_group_size(1), 5);
    assert!(!runner.snapshot().contains(marine));
}

#[test]
fn spawns_are_reported_on_first_sight() {
    let mut runner = session();
    let sandbox = runner.sandbox_mut().unwrap();
    let own = sandbox
        .spawn_unit(MARINE, PlayerId(0), WorldPoint::new(300.0, 350.0))
        .unwrap();
    let hidden = sandbox
        .spawn_unit(MARINE, PlayerId(1), WorldPoint::new(700.0, 700.0))
        .unwrap();

    let events = tick_n(&mut runner, 1);
    assert!(events.contains(&GameEvent::UnitSpawned {
        id: own,
        unit_type: MARINE,
        owner: PlayerId(0),
    }));
    assert!(!events
        .iter()
        .any(|e| matches!(e, GameEvent::UnitSpawned { id, .. } if *id == hidden)));
}

#[test]
fn game_end_is_reported_once() {
    let mut runner = session();
    let enemies: Vec<UnitId> = runner
        .simulation()
        .unwrap()
        .query_units(PlayerId(0))
        .into_iter()
        .filter(|u| u.owner == PlayerId(1))
        .map(|u| u.id)
        .collect();
    assert_eq!(enemies.len(), 3);
    let sandbox = runner.sandbox_mut().unwrap();
    for id in &enemies {
        sandbox.kill_unit(*id);
    }

    let events = tick_n(&mut runner, 3);
    let ended: Vec<&GameEvent> = events
        .iter()
        .filter(|e| matches!(e, GameEvent::GameEnded { .. }))
        .collect();
    assert_eq!(ended, vec![&GameEvent::GameEnded { victory: true }]);

    // Only the medic was ever seen, so only its death is reported.
    let deaths = events
        .iter()
        .filter(|e| matches!(e, GameEvent::UnitDied { .. }))
        .count();
    assert_eq!(deaths, 1);
}

#[test]
fn training_fills_the_queue_then_advises() {
    let mut runner = session();
    click(&mut runner, BARRACKS_POS);
    let barracks = runner.selection()[0];

    for _ in 0..5 {
        runner.train(MARINE);
    }
    assert!(advisories(&mut runner).is_empty());
    runner.train(MARINE);
    assert_eq!(
        advisories(&mut runner),
        vec![Advisory::ProductionUnavailable(MARINE)]
    );

    runner.tick();
    let queue = runner.sandbox_mut().unwrap().production_queue(barracks);
    assert_eq!(queue, vec![MARINE; 5]);
    assert_eq!(runner.snapshot().resources.minerals, 1000 - 5 * 50);
}

#[test]
fn selected_unit_info_and_abilities() {
    let mut runner = session();
    select_all_own(&mut runner);
    let info = runner.selected_units_info();
    assert_eq!(info.len(), 6);
    assert!(info.iter().any(|u| u.type_id == COMMAND_CENTER));

    let names: Vec<String> = runner
        .available_abilities()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(
        names,
        ["Scanner Sweep", "Stim Packs", "Lockdown", "Personnel Cloaking"]
    );
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

#[test]
fn camera_starts_on_the_first_own_unit() {
    let runner = session();
    assert_eq!(runner.camera().position, CC_POS);
    let centre = runner.world_to_screen(CC_POS);
    assert_eq!(centre, ScreenPoint::new(320.0, 240.0));
    assert_eq!(runner.screen_to_world(centre), CC_POS);
}

#[test]
fn zoom_changes_point_select_reach() {
    let mut runner = session();
    // 22 pixels right of the SCV's edge: out of reach of the 16 pixel
    // tolerance at zoom 1...
    let spot = WorldPoint::new(SCV_POS.x + 33.0, SCV_POS.y - 5.0);
    click(&mut runner, spot);
    assert!(!runner.has_selection());

    // ...but inside it at zoom 0.5, where the tolerance doubles in world
    // space.
    runner.set_zoom(0.5);
    click(&mut runner, spot);
    assert_eq!(runner.selection_count(), 1);
    assert_eq!(runner.selected_units_info()[0].position, SCV_POS);
}

#[test]
fn zoom_is_clamped_to_the_config() {
    let mut runner = session();
    runner.set_zoom(100.0);
    assert_eq!(runner.zoom(), 10.0);
    runner.set_zoom(f32::INFINITY);
    assert_eq!(runner.zoom(), 1.0);
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[test]
fn render_tracks_the_snapshot_and_presents() {
    let mut runner = session();
    assert_eq!(runner.load_image_data(&assets()).unwrap(), 1);
    assert!(runner.compositor().is_ready());

    runner.render();
    let before = runner.compositor().framebuffer().digest();

    let cc = unit_of(&runner, PlayerId(0), COMMAND_CENTER);
    runner.sandbox_mut().unwrap().kill_unit(cc);
    runner.tick();
    runner.render();
    assert_ne!(runner.compositor().framebuffer().digest(), before);

    let mut sink = RgbaSink::new();
    runner.present(&mut sink).unwrap();
    assert_eq!(sink.dimensions(), (640, 480));
    assert_eq!(sink.frames_presented(), 1);
}

#[test]
fn render_before_image_data_leaves_a_cleared_framebuffer() {
    let mut runner = session();
    select_all_own(&mut runner);
    runner.render();
    assert!(!runner.compositor().is_ready());
    assert!(runner
        .compositor()
        .framebuffer()
        .pixels()
        .iter()
        .all(|&p| p == 0));
}

#[test]
fn registered_art_replaces_the_placeholder() {
    let mut runner = session();
    runner.load_image_data(&assets()).unwrap();
    let body = runner.compositor_mut().add_frame(Frame::solid(6, 6, 3));
    let entry = ArtEntry {
        body,
        width: 6,
        height: 6,
        shadow: None,
        circle_size: 0,
        circle_offset: 2,
        bar_width: 16,
    };
    runner.art_mut().insert(GHOST, entry);

    runner.render();
    assert_eq!(runner.art_mut().get(GHOST), Some(&entry));

    let fb = runner.compositor().framebuffer();
    let (ox, oy) = runner
        .camera()
        .framebuffer_view(fb.width(), fb.height())
        .origin();
    let (gx, gy) = (GHOST_POS.x as i32 - ox, GHOST_POS.y as i32 - oy);
    assert_eq!(fb.get(gx, gy), Some(3));
    assert_eq!(fb.get(gx - 2, gy + 2), Some(3));
}

#[test]
fn far_off_map_camera_renders_an_empty_frame() {
    let mut runner = session();
    runner.load_image_data(&assets()).unwrap();
    select_all_own(&mut runner);
    for position in [
        WorldPoint::new(100.0, 3.0e9),
        WorldPoint::new(-3.0e9, 100.0),
        WorldPoint::new(f32::MAX, f32::MIN),
    ] {
        runner.set_camera_position(position);
        runner.render();
        assert!(runner
            .compositor()
            .framebuffer()
            .pixels()
            .iter()
            .all(|&p| p == 0));
        runner.render_test_pattern();
        runner.set_render_strategy(RenderStrategy::Legacy);
        runner.render();
        runner.set_render_strategy(RenderStrategy::Sprites);
    }
}

#[test]
fn legacy_strategy_renders_without_art() {
    let mut runner = session();
    runner.load_image_data(&assets()).unwrap();
    runner.set_render_strategy(RenderStrategy::Legacy);
    runner.render();
    assert_eq!(runner.compositor().strategy(), RenderStrategy::Legacy);
    assert!(runner.compositor().frames().is_empty());
}

#[test]
fn minimap_needs_a_session() {
    let runner = GameRunner::with_sandbox(RunnerConfig::default());
    assert_eq!(runner.minimap_rgba().width, 0);

    let mut runner = session();
    runner.load_image_data(&assets()).unwrap();
    let minimap = runner.minimap_rgba();
    assert_eq!((minimap.width, minimap.height), (128, 128));
    assert_eq!(minimap.rgba.len(), 128 * 128 * 4);
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Play a short recorded game: marines walk off, the barracks trains one.
fn record_session(tag: &str) -> (GameRunner, String) {
    let path = scenario_file(tag);
    let mut runner = GameRunner::with_sandbox(RunnerConfig::default());
    runner.start_game(&path, Race::Terran, 0).unwrap();

    select_marines(&mut runner);
    let target = screen(&runner, 400.0, 420.0);
    runner.move_selected_to(target);
    tick_n(&mut runner, 30);
    click(&mut runner, BARRACKS_POS);
    runner.train(MARINE);
    tick_n(&mut runner, 20);

    let final_hash = runner.snapshot().state_hash();
    runner.stop();
    (runner, final_hash)
}

#[test]
fn repeated_orders_are_recorded_once() {
    let path = scenario_file("idempotent");
    let mut runner = GameRunner::with_sandbox(RunnerConfig::default());
    runner.start_game(&path, Race::Terran, 0).unwrap();
    select_marines(&mut runner);

    let target = screen(&runner, 400.0, 420.0);
    runner.move_selected_to(target);
    runner.move_selected_to(target);
    assert_eq!(runner.replay_log().unwrap().order_count(), 2);

    runner.tick();
    runner.move_selected_to(target);
    assert_eq!(runner.replay_log().unwrap().order_count(), 2);

    runner.hold_position();
    assert_eq!(runner.replay_log().unwrap().order_count(), 4);
}

#[test]
fn replay_reproduces_the_recorded_game() {
    let (mut runner, final_hash) = record_session("replay");
    let log = runner.replay_log().unwrap().clone();
    assert_eq!(log.total_frames, 50);
    assert_eq!(log.order_count(), 3);
    assert_eq!(log.checkpoint_count(), 2);

    let replay_path = temp_dir("replay").join("game.replay.json");
    runner.save_replay(&replay_path).unwrap();
    runner.load_replay(&replay_path).unwrap();
    assert_eq!(runner.state(), RunnerState::Running);
    runner.drain_events();

    // Host orders are ignored while the replay drives the session.
    select_all_own(&mut runner);
    assert_eq!(runner.selection_count(), 6);
    let p = screen(&runner, 500.0, 500.0);
    runner.move_selected_to(p);
    assert_eq!(pending_orders(&mut runner), 0);

    let events = run_to_pause(&mut runner);
    assert_eq!(runner.state(), RunnerState::Paused);
    assert_eq!(runner.current_frame(), 50);
    assert!(events.contains(&GameEvent::ReplayFinished { frames: 50 }));
    assert!(!events
        .iter()
        .any(|e| matches!(e, GameEvent::ReplayDiverged { .. })));
    assert_eq!(runner.snapshot().state_hash(), final_hash);
}

#[test]
fn tampered_checkpoint_reports_divergence_once() {
    let (runner, _) = record_session("tamper");
    let mut log = runner.replay_log().unwrap().clone();
    for entry in &mut log.entries {
        if let ReplayEntry::Checkpoint { state_hash, .. } = entry {
            *state_hash = "bogus".to_owned();
        }
    }
    let path = temp_dir("tamper").join("tampered.json");
    log.save(&path).unwrap();

    let mut runner = GameRunner::with_sandbox(RunnerConfig::default());
    runner.load_replay(&path).unwrap();
    let events = run_to_pause(&mut runner);
    let diverged: Vec<&GameEvent> = events
        .iter()
        .filter(|e| matches!(e, GameEvent::ReplayDiverged { .. }))
        .collect();
    assert_eq!(diverged.len(), 1);
    assert!(matches!(
        diverged[0],
        GameEvent::ReplayDiverged { frame: 24, expected_hash, .. } if expected_hash == "bogus"
    ));
    assert!(events.contains(&GameEvent::ReplayFinished { frames: 50 }));
}

#[test]
fn order_issued_just_before_stop_still_replays() {
    let path = scenario_file("late-order");
    let mut runner = GameRunner::with_sandbox(RunnerConfig::default());
    runner.start_game(&path, Race::Terran, 0).unwrap();
    tick_n(&mut runner, 5);
    select_marines(&mut runner);
    let target = screen(&runner, 400.0, 420.0);
    runner.move_selected_to(target);
    runner.stop();

    assert_eq!(runner.replay_log().unwrap().order_count(), 0);
    let replay_path = temp_dir("late-order").join("game.replay.json");
    runner.save_replay(&replay_path).unwrap();

    let mut fresh = GameRunner::with_sandbox(RunnerConfig::default());
    fresh.load_replay(&replay_path).unwrap();
    let events = run_to_pause(&mut fresh);
    assert_eq!(fresh.state(), RunnerState::Paused);
    assert_eq!(fresh.current_frame(), 5);
    assert!(events.contains(&GameEvent::ReplayFinished { frames: 5 }));
}

#[test]
fn empty_replay_finishes_on_load() {
    let path = scenario_file("empty-replay");
    let mut runner = GameRunner::with_sandbox(RunnerConfig::default());
    runner.start_game(&path, Race::Terran, 0).unwrap();
    runner.stop();
    let replay_path = temp_dir("empty-replay").join("game.replay.json");
    runner.save_replay(&replay_path).unwrap();

    runner.load_replay(&replay_path).unwrap();
    assert_eq!(runner.state(), RunnerState::Paused);
    assert!(runner
        .drain_events()
        .contains(&GameEvent::ReplayFinished { frames: 0 }));

    tick_n(&mut runner, 100);
    assert_eq!(runner.current_frame(), 0);

    // Resuming past the end does not report the end again.
    runner.resume();
    let events = tick_n(&mut runner, 3);
    assert_eq!(runner.current_frame(), 3);
    assert!(!events
        .iter()
        .any(|e| matches!(e, GameEvent::ReplayFinished { .. })));
}

#[test]
fn malformed_replay_is_refused() {
    let dir = temp_dir("malformed");
    let mut log = ReplayLog::new(&setup(dir.join("two_bases.json")));
    log.entries.push(ReplayEntry::Order {
        frame: 0,
        order: Order::new(UnitId::new(0, 0), OrderKind::Stop, PlayerId(0)),
    });
    let path = dir.join("bad.json");
    log.save(&path).unwrap();

    let mut runner = GameRunner::with_sandbox(RunnerConfig::default());
    assert!(matches!(
        runner.load_replay(&path),
        Err(BridgeError::InvalidReplay(_))
    ));
    assert_eq!(runner.state(), RunnerState::NoGame);

    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(runner.load_replay(&path), Err(BridgeError::Json(_))));
}

#[test]
fn unrecorded_sessions_have_no_replay() {
    let mut runner = session();
    assert!(runner.replay_log().is_none());
    let path = temp_dir("unrecorded").join("none.json");
    assert!(matches!(
        runner.save_replay(&path),
        Err(BridgeError::InvalidReplay(_))
    ));
    runner.stop();
    assert!(runner.replay_log().is_none());
}
