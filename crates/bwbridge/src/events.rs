//! Game events delivered to the host.
//!
//! The runner appends events while it ticks and while commands are
//! dispatched; the host drains the queue after each `tick()`. Every distinct
//! transition produces at most one event per tick.

use serde::{Deserialize, Serialize};

use bwbridge_sim::command::OrderRejection;
use bwbridge_sim::types::{AbilityId, PlayerId, Resources, UnitTypeId};
use bwbridge_sim::unit::UnitId;

/// Per-frame economy summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameUpdate {
    pub frame: u32,
    pub minerals: i32,
    pub gas: i32,
    pub supply_used: i32,
    pub supply_max: i32,
}

impl FrameUpdate {
    pub fn new(frame: u32, resources: Resources) -> Self {
        Self {
            frame,
            minerals: resources.minerals,
            gas: resources.gas,
            supply_used: resources.supply_used,
            supply_max: resources.supply_max,
        }
    }
}

/// Why a host command was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum Advisory {
    #[error("select exactly one builder")]
    NeedsSingleBuilder,

    #[error("the selected unit cannot construct {0:?}")]
    CannotConstruct(UnitTypeId),

    #[error("the build site is obstructed")]
    PlacementObstructed,

    #[error("no selected building can train {0:?} right now")]
    ProductionUnavailable(UnitTypeId),

    #[error("ability {0:?} was given the wrong kind of target")]
    AbilityTargetMismatch(AbilityId),

    #[error("no selected unit has ability {0:?}")]
    AbilityUnavailable(AbilityId),

    #[error("not enough energy: need {needed}, have {available}")]
    InsufficientEnergy { needed: i32, available: i32 },

    #[error("the target unit no longer exists")]
    TargetGone(UnitId),

    #[error("control group {0} does not exist")]
    InvalidControlGroup(i32),

    #[error("no production building selected")]
    NoProductionBuilding,

    #[error("{order} refused: {reason}")]
    Rejected {
        order: String,
        reason: OrderRejection,
    },
}

/// Something the host may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    GameStarted {
        map: String,
        local_player: PlayerId,
    },
    /// Emitted once per tick after the snapshot is refreshed.
    FrameUpdated(FrameUpdate),
    UnitSpawned {
        id: UnitId,
        unit_type: UnitTypeId,
        owner: PlayerId,
    },
    UnitDied {
        id: UnitId,
    },
    GameEnded {
        victory: bool,
    },
    /// A command was dropped.
    Advisory(Advisory),
    /// A replayed session no longer matches its recording.
    ReplayDiverged {
        frame: u32,
        expected_hash: String,
        actual_hash: String,
    },
    ReplayFinished {
        frames: u32,
    },
}

/// FIFO of pending events.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<GameEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Queue an advisory, logging it at debug level.
    pub fn advise(&mut self, advisory: Advisory) {
        tracing::debug!(%advisory, "command dropped");
        self.events.push(GameEvent::Advisory(advisory));
    }

    /// Take every pending event, oldest first.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
