//! bwbridge -- the per-frame bridge between a stepped RTS simulation and a
//! paletted renderer.
//!
//! The [`GameRunner`](runner::GameRunner) owns one simulation session. Each
//! host frame it steps the simulation, extracts a snapshot of what the local
//! player can see, diffs it into events, and turns it into sprite descriptors
//! for the [`Compositor`](bwbridge_render::compositor::Compositor). Host input
//! arrives in screen coordinates and is validated by the
//! [`Dispatcher`](dispatch::Dispatcher) before it reaches the simulation.
//!
//! # Quick Start
//!
//! ```
//! use bwbridge::prelude::*;
//!
//! let scenario = Scenario::from_json_str(r#"{
//!     "name": "duel", "width": 32, "height": 32,
//!     "players": [ { "id": 0 }, { "id": 1 } ],
//!     "units": [
//!         { "type": "Marine", "owner": 0, "x": 200.0, "y": 200.0 },
//!         { "type": "Marine", "owner": 1, "x": 900.0, "y": 900.0 }
//!     ]
//! }"#).unwrap();
//! let setup = GameSetup {
//!     map_path: "duel.json".into(),
//!     local_player: PlayerId(0),
//!     race: Race::Terran,
//!     ai_difficulty: 0,
//! };
//! let sim = SandboxSim::from_scenario(&scenario, &setup, SandboxConfig::default()).unwrap();
//!
//! let mut runner = GameRunner::with_sandbox(RunnerConfig::default());
//! runner.start_session(Box::new(sim)).unwrap();
//!
//! // The camera starts on the local player's first unit.
//! let centre = runner.world_to_screen(runner.camera().position);
//! runner.select_at(centre);
//! assert_eq!(runner.selection_count(), 1);
//!
//! runner.tick();
//! runner.render();
//! assert_eq!(runner.current_frame(), 1);
//! assert!(runner
//!     .drain_events()
//!     .iter()
//!     .any(|e| matches!(e, GameEvent::FrameUpdated(_))));
//! ```

#![deny(unsafe_code)]

#[cfg(feature = "present")]
pub mod app;
pub mod camera;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod replay;
pub mod runner;
pub mod selection;
pub mod snapshot;
pub mod sprites;

use std::path::PathBuf;

/// Re-export the simulation crate for convenience.
pub use bwbridge_sim;

/// Re-export the render crate for convenience.
pub use bwbridge_render;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors returned by session setup, asset loading and replay I/O.
///
/// Invalid player commands are not errors; they surface as
/// [`Advisory`](events::Advisory) events.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Sim(#[from] bwbridge_sim::SimError),

    #[error(transparent)]
    Render(#[from] bwbridge_render::RenderError),

    /// A session is already loaded or running.
    #[error("a session is already active ({0:?}); stop it first")]
    SessionActive(runner::RunnerState),

    #[error("failed to access replay '{}': {source}", path.display())]
    ReplayIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Replay or config JSON could not be (de)serialized.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid replay: {0}")]
    InvalidReplay(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use bwbridge_render::prelude::*;
    pub use bwbridge_sim::prelude::*;

    #[cfg(feature = "present")]
    pub use crate::app::run_windowed;
    pub use crate::camera::{Camera, ScreenPoint};
    pub use crate::config::RunnerConfig;
    pub use crate::dispatch::Dispatcher;
    pub use crate::events::{Advisory, EventQueue, FrameUpdate, GameEvent};
    pub use crate::replay::{
        ReplayDivergence, ReplayEntry, ReplayLog, ReplayPlayback, ReplayRecorder,
    };
    pub use crate::runner::{GameRunner, RunnerState};
    pub use crate::selection::{ControlGroups, SelectionSet, CONTROL_GROUP_COUNT};
    pub use crate::snapshot::{extract, FrameSnapshot, UnitDescriptor};
    pub use crate::sprites::{ArtEntry, SpriteArt};
    pub use crate::BridgeError;
}
