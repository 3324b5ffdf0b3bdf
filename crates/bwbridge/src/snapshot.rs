//! Per-frame entity snapshots.
//!
//! [`extract`] walks the simulation's unit list once and copies every unit
//! the viewer can see into a freshly allocated [`FrameSnapshot`]. Nothing in
//! a snapshot points back into the simulation, so hosts may keep one as long
//! as they like; it simply stops being current after the next tick.
//!
//! Extraction also prunes dead ids from the selection and every control
//! group, so commands dispatched afterwards never name a destroyed unit.

use serde::{Deserialize, Serialize};

use bwbridge_sim::simulation::Simulation;
use bwbridge_sim::types::{PlayerId, Resources, UnitFlags, UnitRecord, UnitTypeId, WorldPoint};
use bwbridge_sim::unit::UnitId;

use crate::selection::{ControlGroups, SelectionSet};

// ---------------------------------------------------------------------------
// UnitDescriptor
// ---------------------------------------------------------------------------

/// One visible unit as the host sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub id: UnitId,
    pub type_id: UnitTypeId,
    pub type_name: String,
    pub owner: PlayerId,
    pub position: WorldPoint,
    pub radius: f32,
    pub health: i32,
    pub max_health: i32,
    pub shields: i32,
    pub max_shields: i32,
    pub energy: i32,
    pub max_energy: i32,
    pub flags: UnitFlags,
}

impl From<UnitRecord> for UnitDescriptor {
    fn from(r: UnitRecord) -> Self {
        Self {
            id: r.id,
            type_id: r.type_id,
            type_name: r.type_name,
            owner: r.owner,
            position: r.position,
            radius: r.radius,
            health: r.health,
            max_health: r.max_health,
            shields: r.shields,
            max_shields: r.max_shields,
            energy: r.energy,
            max_energy: r.max_energy,
            flags: r.flags,
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSnapshot
// ---------------------------------------------------------------------------

/// Everything the host needs to draw and inspect one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub frame: u32,
    /// Units visible to the viewer, in simulation order.
    pub units: Vec<UnitDescriptor>,
    pub resources: Resources,
    /// The selection after pruning.
    pub selection: Vec<UnitId>,
}

impl FrameSnapshot {
    /// The snapshot returned when no game is loaded.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn unit(&self, id: UnitId) -> Option<&UnitDescriptor> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.unit(id).is_some()
    }

    /// BLAKE3 hex digest of the frame, units and resources.
    ///
    /// The selection is excluded: it is local UI state, not game state.
    pub fn state_hash(&self) -> String {
        #[derive(Serialize)]
        struct Hashable<'a> {
            frame: u32,
            units: &'a [UnitDescriptor],
            resources: &'a Resources,
        }
        let hashable = Hashable {
            frame: self.frame,
            units: &self.units,
            resources: &self.resources,
        };
        let mut hasher = blake3::Hasher::new();
        if let Err(e) = serde_json::to_writer(&mut hasher, &hashable) {
            tracing::warn!(error = %e, "snapshot hashing failed");
        }
        hasher.finalize().to_hex().to_string()
    }
}

// ---------------------------------------------------------------------------
// extract()
// ---------------------------------------------------------------------------

/// Build the snapshot for `viewer`, pruning `selection` and `groups`.
///
/// With no simulation the selection and groups are cleared and an empty
/// snapshot is returned.
pub fn extract(
    sim: Option<&dyn Simulation>,
    viewer: PlayerId,
    selection: &mut SelectionSet,
    groups: &mut ControlGroups,
) -> FrameSnapshot {
    let Some(sim) = sim else {
        selection.clear();
        groups.clear();
        return FrameSnapshot::empty();
    };

    let records = sim.query_units(viewer);
    let mut units = Vec::with_capacity(records.len());
    units.extend(
        records
            .into_iter()
            .filter(|r| r.visible)
            .map(UnitDescriptor::from),
    );

    let pruned = selection.prune(|id| sim.is_alive(id)) + groups.prune(|id| sim.is_alive(id));
    if pruned > 0 {
        tracing::trace!(pruned, "dead units pruned from selection and groups");
    }

    FrameSnapshot {
        frame: sim.current_frame(),
        units,
        resources: sim.resources(viewer),
        selection: selection.ids().to_vec(),
    }
}
