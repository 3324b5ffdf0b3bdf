//! bwbridge-sim -- the stepped-simulation boundary and a sandbox engine.
//!
//! The bridge never reaches into game state directly. Everything it needs
//! (unit queries, resources, order validation) goes through the
//! [`Simulation`](simulation::Simulation) trait defined here. The crate also
//! ships [`SandboxSim`](sandbox::SandboxSim), a compact Terran rule set that
//! implements the trait so sessions can run without the original engine.
//!
//! # Quick Start
//!
//! ```
//! use bwbridge_sim::prelude::*;
//!
//! let scenario = Scenario::from_json_str(r#"{
//!     "name": "duel", "width": 16, "height": 16,
//!     "players": [ { "id": 0, "minerals": 50 } ],
//!     "units": [ { "type": "Marine", "owner": 0, "x": 64.0, "y": 64.0 } ]
//! }"#).unwrap();
//! let setup = GameSetup {
//!     map_path: "duel.json".into(),
//!     local_player: PlayerId(0),
//!     race: Race::Terran,
//!     ai_difficulty: 0,
//! };
//! let mut sim = SandboxSim::from_scenario(&scenario, &setup, SandboxConfig::default()).unwrap();
//! sim.step_one_frame();
//! assert_eq!(sim.current_frame(), 1);
//! assert_eq!(sim.query_units(PlayerId(0)).len(), 1);
//! ```

#![deny(unsafe_code)]

pub mod catalog;
pub mod command;
pub mod sandbox;
pub mod scenario;
pub mod simulation;
pub mod types;
pub mod unit;

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while creating a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The map file could not be read.
    #[error("failed to read map '{}': {source}", path.display())]
    MapRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The map file is not valid scenario JSON.
    #[error("failed to parse map: {0}")]
    MapParse(#[from] serde_json::Error),

    /// The map parsed but is inconsistent.
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// The engine has no rules for the requested race.
    #[error("race {0:?} is not supported by this simulation")]
    UnsupportedRace(types::Race),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::command::{
        AbilityTarget, ApplyReport, Order, OrderBuffer, OrderKind, OrderRejection,
    };
    pub use crate::sandbox::{SandboxConfig, SandboxLoader, SandboxSim};
    pub use crate::scenario::{PlayerSetup, Scenario, UnitPlacement};
    pub use crate::simulation::{GameSetup, Simulation, SimulationLoader};
    pub use crate::types::{
        AbilityId, AbilityInfo, GameOutcome, MapInfo, PlayerId, Race, Resources, TargetKind,
        UnitFlags, UnitRecord, UnitTypeId, WorldPoint, WorldRect, TILE_SIZE,
    };
    pub use crate::unit::{UnitAllocator, UnitId};
    pub use crate::SimError;
}
