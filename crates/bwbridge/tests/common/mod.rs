//! Shared fixtures for the bridge integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use bwbridge::prelude::*;
use bwbridge_render::palette::WPE_SIZE;
use bwbridge_render::tileset::MEGATILE_BYTES;

/// Player 0 holds the north-west corner; player 1's base sits in the fog in
/// the south-east, with a medic scouting inside player 0's sight range.
pub const TWO_BASES: &str = r#"{
    "name": "Two Bases",
    "width": 32, "height": 32,
    "players": [
        { "id": 0, "minerals": 1000, "gas": 500 },
        { "id": 1, "minerals": 1000, "gas": 500 }
    ],
    "units": [
        { "type": "Command Center", "owner": 0,  "x": 128.0, "y": 128.0 },
        { "type": "Barracks",       "owner": 0,  "x": 320.0, "y": 128.0 },
        { "type": "SCV",            "owner": 0,  "x": 200.0, "y": 260.0 },
        { "type": "Marine",         "owner": 0,  "x": 240.0, "y": 300.0 },
        { "type": "Marine",         "owner": 0,  "x": 270.0, "y": 300.0 },
        { "type": "Ghost",          "owner": 0,  "x": 150.0, "y": 330.0 },
        { "type": "Mineral Field",  "owner": 11, "x": 60.0,  "y": 60.0 },
        { "type": "Medic",          "owner": 1,  "x": 560.0, "y": 130.0 },
        { "type": "Command Center", "owner": 1,  "x": 900.0, "y": 900.0 },
        { "type": "Marine",         "owner": 1,  "x": 800.0, "y": 800.0 }
    ]
}"#;

pub const CC_POS: WorldPoint = WorldPoint { x: 128.0, y: 128.0 };
pub const BARRACKS_POS: WorldPoint = WorldPoint { x: 320.0, y: 128.0 };
pub const SCV_POS: WorldPoint = WorldPoint { x: 200.0, y: 260.0 };
pub const GHOST_POS: WorldPoint = WorldPoint { x: 150.0, y: 330.0 };
pub const MEDIC_POS: WorldPoint = WorldPoint { x: 560.0, y: 130.0 };

pub fn setup(map_path: PathBuf) -> GameSetup {
    GameSetup {
        map_path,
        local_player: PlayerId(0),
        race: Race::Terran,
        ai_difficulty: 0,
    }
}

/// A fresh temp directory for one test.
pub fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bwbridge-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write the scenario to disk and return its path.
pub fn scenario_file(tag: &str) -> PathBuf {
    let path = temp_dir(tag).join("two_bases.json");
    std::fs::write(&path, TWO_BASES).unwrap();
    path
}

/// A runner with an unrecorded session on the two-bases scenario.
pub fn session() -> GameRunner {
    session_with(RunnerConfig::default())
}

pub fn session_with(config: RunnerConfig) -> GameRunner {
    let scenario = Scenario::from_json_str(TWO_BASES).unwrap();
    let sim = SandboxSim::from_scenario(
        &scenario,
        &setup("two_bases.json".into()),
        SandboxConfig::default(),
    )
    .unwrap();
    let mut runner = GameRunner::with_sandbox(config);
    runner.start_session(Box::new(sim)).unwrap();
    runner.drain_events();
    runner
}

/// Every unit of `owner` with type `type_id`, fogged or not.
pub fn units_of(runner: &GameRunner, owner: PlayerId, type_id: UnitTypeId) -> Vec<UnitId> {
    runner
        .simulation()
        .unwrap()
        .query_units(PlayerId(0))
        .into_iter()
        .filter(|u| u.owner == owner && u.type_id == type_id)
        .map(|u| u.id)
        .collect()
}

pub fn unit_of(runner: &GameRunner, owner: PlayerId, type_id: UnitTypeId) -> UnitId {
    units_of(runner, owner, type_id)[0]
}

pub fn screen(runner: &GameRunner, x: f32, y: f32) -> ScreenPoint {
    runner.world_to_screen(WorldPoint::new(x, y))
}

pub fn click(runner: &mut GameRunner, at: WorldPoint) {
    let p = runner.world_to_screen(at);
    runner.select_at(p);
}

/// Box-select the two marines.
pub fn select_marines(runner: &mut GameRunner) {
    let (a, b) = (screen(runner, 200.0, 280.0), screen(runner, 300.0, 320.0));
    runner.select_box(a, b);
    assert_eq!(runner.selection_count(), 2);
}

/// Box-select everything player 0 owns.
pub fn select_all_own(runner: &mut GameRunner) {
    let (a, b) = (screen(runner, 0.0, 0.0), screen(runner, 600.0, 400.0));
    runner.select_box(a, b);
}

pub fn advisories(runner: &mut GameRunner) -> Vec<Advisory> {
    runner
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            GameEvent::Advisory(a) => Some(a),
            _ => None,
        })
        .collect()
}

pub fn pending_orders(runner: &mut GameRunner) -> usize {
    runner.sandbox_mut().unwrap().pending_order_count()
}

pub fn current_order(runner: &GameRunner, id: UnitId) -> Option<OrderKind> {
    runner.simulation().unwrap().current_order(id)
}

/// One complete tileset (badlands) with a patterned megatile table.
pub fn assets() -> MemoryAssets {
    let wpe: Vec<u8> = (0..WPE_SIZE).map(|i| (i / 4) as u8).collect();
    let mega: Vec<u8> = (0..MEGATILE_BYTES * 4).map(|i| (i % 251) as u8).collect();
    MemoryAssets::new()
        .with("tileset/badlands.wpe", wpe)
        .with("tileset/badlands.mega", mega)
}
