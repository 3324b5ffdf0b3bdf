//! The local player's selection and control groups.
//!
//! Both hold ordered, duplicate-free lists of [`UnitId`]s. Neither talks to
//! the simulation: liveness pruning is driven from outside with a predicate
//! (the snapshot extractor prunes everything every tick, control-group
//! queries prune the queried group).

use serde::{Deserialize, Serialize};

use bwbridge_sim::unit::UnitId;

/// Number of control groups (indices 0..=9).
pub const CONTROL_GROUP_COUNT: usize = 10;

/// Push `id` unless it is already present.
fn push_unique(list: &mut Vec<UnitId>, id: UnitId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

// ---------------------------------------------------------------------------
// SelectionSet
// ---------------------------------------------------------------------------

/// Ordered set of selected unit ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    ids: Vec<UnitId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[UnitId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.ids.contains(&id)
    }

    /// Replace the selection, dropping duplicates while keeping first
    /// occurrences in order.
    pub fn replace(&mut self, ids: impl IntoIterator<Item = UnitId>) {
        self.ids.clear();
        for id in ids {
            push_unique(&mut self.ids, id);
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Keep only the first `max` ids.
    pub fn truncate(&mut self, max: usize) {
        self.ids.truncate(max);
    }

    /// Drop ids for which `alive` returns `false`. Returns how many went.
    pub fn prune(&mut self, mut alive: impl FnMut(UnitId) -> bool) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| alive(*id));
        before - self.ids.len()
    }
}

// ---------------------------------------------------------------------------
// ControlGroups
// ---------------------------------------------------------------------------

/// Ten independent unit groups. A unit may belong to several at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlGroups {
    groups: [Vec<UnitId>; CONTROL_GROUP_COUNT],
}

impl ControlGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a host-supplied index to a group slot.
    pub fn slot(index: i32) -> Option<usize> {
        usize::try_from(index)
            .ok()
            .filter(|i| *i < CONTROL_GROUP_COUNT)
    }

    /// Replace group `slot` with `ids`.
    pub fn assign(&mut self, slot: usize, ids: &[UnitId]) {
        if let Some(group) = self.groups.get_mut(slot) {
            group.clear();
            for id in ids {
                push_unique(group, *id);
            }
        }
    }

    /// Append `ids` not already in group `slot`.
    pub fn add(&mut self, slot: usize, ids: &[UnitId]) {
        if let Some(group) = self.groups.get_mut(slot) {
            for id in ids {
                push_unique(group, *id);
            }
        }
    }

    /// Members of group `slot` as stored (not pruned).
    pub fn members(&self, slot: usize) -> &[UnitId] {
        self.groups.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Prune group `slot` and return its remaining members.
    pub fn pruned_members(
        &mut self,
        slot: usize,
        mut alive: impl FnMut(UnitId) -> bool,
    ) -> &[UnitId] {
        match self.groups.get_mut(slot) {
            Some(group) => {
                group.retain(|id| alive(*id));
                group.as_slice()
            }
            None => &[],
        }
    }

    /// Prune every group. Returns how many memberships were dropped.
    pub fn prune(&mut self, mut alive: impl FnMut(UnitId) -> bool) -> usize {
        let mut removed = 0;
        for group in &mut self.groups {
            let before = group.len();
            group.retain(|id| alive(*id));
            removed += before - group.len();
        }
        removed
    }

    pub fn clear(&mut self) {
        for group in &mut self.groups {
            group.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(i: u32) -> UnitId {
        UnitId::new(i, 0)
    }

    #[test]
    fn replace_dedups_and_keeps_order() {
        let mut sel = SelectionSet::new();
        sel.replace([id(3), id(1), id(3), id(2)]);
        assert_eq!(sel.ids(), &[id(3), id(1), id(2)]);
    }

    #[test]
    fn prune_reports_removed_count() {
        let mut sel = SelectionSet::new();
        sel.replace([id(0), id(1), id(2)]);
        assert_eq!(sel.prune(|u| u != id(1)), 1);
        assert_eq!(sel.ids(), &[id(0), id(2)]);
    }

    #[test]
    fn slot_rejects_out_of_range() {
        assert_eq!(ControlGroups::slot(0), Some(0));
        assert_eq!(ControlGroups::slot(9), Some(9));
        assert_eq!(ControlGroups::slot(10), None);
        assert_eq!(ControlGroups::slot(-1), None);
    }

    #[test]
    fn add_is_an_ordered_union() {
        let mut groups = ControlGroups::new();
        groups.assign(2, &[id(1), id(2)]);
        groups.add(2, &[id(2), id(5), id(1), id(6)]);
        assert_eq!(groups.members(2), &[id(1), id(2), id(5), id(6)]);
    }

    #[test]
    fn unit_can_be_in_several_groups() {
        let mut groups = ControlGroups::new();
        groups.assign(0, &[id(1)]);
        groups.assign(1, &[id(1), id(2)]);
        assert_eq!(groups.prune(|u| u != id(1)), 2);
        assert!(groups.members(0).is_empty());
        assert_eq!(groups.members(1), &[id(2)]);
    }

    #[test]
    fn pruned_members_only_touches_one_group() {
        let mut groups = ControlGroups::new();
        groups.assign(0, &[id(1), id(2)]);
        groups.assign(1, &[id(1)]);
        assert_eq!(groups.pruned_members(0, |u| u == id(2)), &[id(2)]);
        assert_eq!(groups.members(1), &[id(1)]);
    }

    proptest! {
        #[test]
        fn groups_never_hold_duplicates(ops in prop::collection::vec((0usize..10, prop::collection::vec(0u32..8, 0..6), any::<bool>()), 0..40)) {
            let mut groups = ControlGroups::new();
            for (slot, raw, assign) in ops {
                let ids: Vec<UnitId> = raw.into_iter().map(id).collect();
                if assign {
                    groups.assign(slot, &ids);
                } else {
                    groups.add(slot, &ids);
                }
            }
            for slot in 0..CONTROL_GROUP_COUNT {
                let members = groups.members(slot);
                let mut sorted = members.to_vec();
                sorted.sort();
                sorted.dedup();
                prop_assert_eq!(sorted.len(), members.len());
            }
        }
    }
}
