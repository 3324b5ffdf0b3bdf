//! Orders and the per-frame order buffer.
//!
//! An [`Order`] is one instruction for one unit, already validated by the
//! bridge's dispatcher. Simulations that advance in discrete frames collect
//! accepted orders in an [`OrderBuffer`] and apply them in strict FIFO order
//! at the start of the next frame, so two orders issued between the same pair
//! of ticks always resolve in the order the player gave them.
//!
//! # Example
//!
//! ```
//! use bwbridge_sim::command::{OrderBuffer, OrderKind};
//! use bwbridge_sim::types::{PlayerId, WorldPoint};
//! use bwbridge_sim::unit::UnitId;
//!
//! let mut buffer = OrderBuffer::new();
//! let unit = UnitId::new(0, 0);
//! buffer.push(unit, OrderKind::Move(WorldPoint::new(64.0, 64.0)), PlayerId(0));
//! buffer.push(unit, OrderKind::Hold, PlayerId(0));
//!
//! assert_eq!(buffer.pending_for(unit), Some(&OrderKind::Hold));
//! let drained = buffer.drain();
//! assert_eq!(drained.len(), 2);
//! assert!(buffer.is_empty());
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{AbilityId, PlayerId, UnitTypeId, WorldPoint};
use crate::unit::UnitId;

// ---------------------------------------------------------------------------
// OrderKind
// ---------------------------------------------------------------------------

/// What an ability use is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AbilityTarget {
    None,
    Ground(WorldPoint),
    Unit(UnitId),
}

/// The full order vocabulary of the simulation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    Move(WorldPoint),
    AttackMove(WorldPoint),
    Patrol(WorldPoint),
    Hold,
    Stop,
    Build {
        unit_type: UnitTypeId,
        at: WorldPoint,
    },
    Train(UnitTypeId),
    UseAbility {
        ability: AbilityId,
        target: AbilityTarget,
    },
    RallyToPosition(WorldPoint),
    RallyToUnit(UnitId),
}

impl OrderKind {
    /// Short lowercase label used in logs and advisories.
    pub fn label(&self) -> &'static str {
        match self {
            OrderKind::Move(_) => "move",
            OrderKind::AttackMove(_) => "attack_move",
            OrderKind::Patrol(_) => "patrol",
            OrderKind::Hold => "hold",
            OrderKind::Stop => "stop",
            OrderKind::Build { .. } => "build",
            OrderKind::Train(_) => "train",
            OrderKind::UseAbility { .. } => "ability",
            OrderKind::RallyToPosition(_) => "rally_position",
            OrderKind::RallyToUnit(_) => "rally_unit",
        }
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// One order addressed to one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// The unit that executes the order.
    pub unit: UnitId,
    pub kind: OrderKind,
    /// The player on whose behalf the order is issued.
    pub issued_by: PlayerId,
    /// Sequential index within the buffer (set on insertion).
    #[serde(default)]
    pub order_index: u32,
}

impl Order {
    pub fn new(unit: UnitId, kind: OrderKind, issued_by: PlayerId) -> Self {
        Self {
            unit,
            kind,
            issued_by,
            order_index: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// OrderRejection
// ---------------------------------------------------------------------------

/// Why the simulation refused an order.
///
/// These are expected steady-state occurrences (not enough minerals, queue
/// full, ...). The bridge turns them into advisory events rather than errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum OrderRejection {
    #[error("unit {0} does not exist")]
    UnknownUnit(UnitId),

    #[error("unit {unit} is not owned by player {player:?}")]
    NotOwner { unit: UnitId, player: PlayerId },

    #[error("unit {0} cannot execute this order")]
    Incapable(UnitId),

    #[error("unit type {0:?} is unknown")]
    UnknownUnitType(UnitTypeId),

    #[error("build site is obstructed")]
    PlacementObstructed,

    #[error("production queue is full")]
    QueueFull,

    #[error("not enough minerals: need {needed}, have {available}")]
    InsufficientMinerals { needed: i32, available: i32 },

    #[error("not enough gas: need {needed}, have {available}")]
    InsufficientGas { needed: i32, available: i32 },

    #[error("not enough supply: need {needed}, have {available}")]
    SupplyBlocked { needed: i32, available: i32 },

    #[error("ability {0:?} is not available to this unit")]
    AbilityUnavailable(AbilityId),

    #[error("not enough energy: need {needed}, have {available}")]
    InsufficientEnergy { needed: i32, available: i32 },

    #[error("invalid order target")]
    InvalidTarget,
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

/// Summary of the last time a buffer's orders were applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Orders that took effect.
    pub success_count: usize,
    /// Orders that were accepted at issue time but no longer applied (the unit
    /// died, resources were spent by an earlier order, ...).
    pub failed_count: usize,
}

// ---------------------------------------------------------------------------
// OrderBuffer
// ---------------------------------------------------------------------------

/// FIFO buffer of accepted orders waiting for the next frame.
#[derive(Debug, Default)]
pub struct OrderBuffer {
    orders: Vec<Order>,
    next_index: u32,
    last_apply_report: ApplyReport,
}

impl OrderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an order. Returns its sequential index.
    pub fn push(&mut self, unit: UnitId, kind: OrderKind, issued_by: PlayerId) -> u32 {
        let order_index = self.next_index;
        self.next_index += 1;
        self.orders.push(Order {
            unit,
            kind,
            issued_by,
            order_index,
        });
        order_index
    }

    /// The most recently queued order for `unit`, if any.
    pub fn pending_for(&self, unit: UnitId) -> Option<&OrderKind> {
        self.orders
            .iter()
            .rev()
            .find(|o| o.unit == unit)
            .map(|o| &o.kind)
    }

    /// Queued orders of the given unit that match `pred`.
    pub fn count_pending(&self, unit: UnitId, pred: impl Fn(&OrderKind) -> bool) -> usize {
        self.orders
            .iter()
            .filter(|o| o.unit == unit && pred(&o.kind))
            .count()
    }

    /// Take every queued order in insertion order and reset the index counter.
    pub fn drain(&mut self) -> Vec<Order> {
        self.next_index = 0;
        std::mem::take(&mut self.orders)
    }

    /// Store the outcome of applying the last drained batch.
    pub fn record_report(&mut self, report: ApplyReport) {
        if report.failed_count > 0 {
            tracing::debug!(
                applied = report.success_count,
                failed = report.failed_count,
                "some buffered orders no longer applied"
            );
        }
        self.last_apply_report = report;
    }

    pub fn last_apply_report(&self) -> ApplyReport {
        self.last_apply_report
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(i: u32) -> UnitId {
        UnitId::new(i, 0)
    }

    #[test]
    fn push_assigns_sequential_indices() {
        let mut buffer = OrderBuffer::new();
        assert_eq!(buffer.push(unit(0), OrderKind::Stop, PlayerId(0)), 0);
        assert_eq!(buffer.push(unit(1), OrderKind::Hold, PlayerId(0)), 1);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn drain_preserves_fifo_order_and_resets() {
        let mut buffer = OrderBuffer::new();
        buffer.push(unit(2), OrderKind::Stop, PlayerId(0));
        buffer.push(unit(1), OrderKind::Hold, PlayerId(0));
        let drained = buffer.drain();
        assert_eq!(drained[0].unit, unit(2));
        assert_eq!(drained[1].unit, unit(1));
        assert!(buffer.is_empty());
        assert_eq!(buffer.push(unit(3), OrderKind::Stop, PlayerId(0)), 0);
    }

    #[test]
    fn pending_for_returns_latest_order_of_unit() {
        let mut buffer = OrderBuffer::new();
        let target = WorldPoint::new(1.0, 2.0);
        buffer.push(unit(0), OrderKind::Move(target), PlayerId(0));
        buffer.push(unit(1), OrderKind::Hold, PlayerId(0));
        assert_eq!(buffer.pending_for(unit(0)), Some(&OrderKind::Move(target)));
        assert_eq!(buffer.pending_for(unit(5)), None);
    }

    #[test]
    fn count_pending_filters_by_kind() {
        let mut buffer = OrderBuffer::new();
        buffer.push(unit(0), OrderKind::Train(UnitTypeId(0)), PlayerId(0));
        buffer.push(unit(0), OrderKind::Train(UnitTypeId(0)), PlayerId(0));
        buffer.push(unit(0), OrderKind::Stop, PlayerId(0));
        let trains = buffer.count_pending(unit(0), |k| matches!(k, OrderKind::Train(_)));
        assert_eq!(trains, 2);
    }

    #[test]
    fn order_kind_serde_roundtrip() {
        let kind = OrderKind::UseAbility {
            ability: AbilityId(1),
            target: AbilityTarget::Unit(unit(9)),
        };
        let json = serde_json::to_string(&kind).unwrap();
        let back: OrderKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }

    #[test]
    fn rejection_messages_are_readable() {
        let r = OrderRejection::InsufficientMinerals {
            needed: 50,
            available: 20,
        };
        assert_eq!(r.to_string(), "not enough minerals: need 50, have 20");
    }
}
