//! Command dispatch: host intents to validated simulation orders.
//!
//! A [`Dispatcher`] borrows the pieces of runner state a command touches for
//! the duration of one call. Every input is in world coordinates; the runner
//! resolves screen positions through the camera first.
//!
//! Invalid commands never fail. They are dropped, and when the reason is
//! worth telling the player an [`Advisory`] is queued. Order-issuing commands
//! with no qualifying unit are silent no-ops.

use bwbridge_sim::command::{AbilityTarget, Order, OrderKind};
use bwbridge_sim::simulation::Simulation;
use bwbridge_sim::types::{
    AbilityId, PlayerId, TargetKind, UnitFlags, UnitRecord, UnitTypeId, WorldPoint, WorldRect,
};
use bwbridge_sim::unit::UnitId;

use crate::events::{Advisory, EventQueue};
use crate::selection::{ControlGroups, SelectionSet};

/// Runner state a single command may read or mutate.
pub struct Dispatcher<'a> {
    pub sim: &'a mut dyn Simulation,
    pub player: PlayerId,
    pub selection: &'a mut SelectionSet,
    pub groups: &'a mut ControlGroups,
    pub events: &'a mut EventQueue,
    /// Box selections keep at most this many units.
    pub max_selection: Option<usize>,
    /// Set while a replay drives the session; order-issuing commands are
    /// ignored.
    pub read_only: bool,
    /// Orders the simulation accepted during this call, in issue order.
    pub issued: &'a mut Vec<Order>,
}

/// Whether a unit with `flags` takes a unit-level order of this kind.
fn accepts(kind: &OrderKind, flags: &UnitFlags) -> bool {
    match kind {
        OrderKind::Hold | OrderKind::Stop => flags.can_move || flags.can_attack,
        _ => flags.can_move,
    }
}

fn target_matches(kind: TargetKind, target: &AbilityTarget) -> bool {
    matches!(
        (kind, target),
        (TargetKind::None, AbilityTarget::None)
            | (TargetKind::Ground, AbilityTarget::Ground(_))
            | (TargetKind::Unit, AbilityTarget::Unit(_))
    )
}

/// The record closest to `to`, first one on ties.
fn nearest(records: Vec<UnitRecord>, to: WorldPoint) -> Option<UnitRecord> {
    let mut best: Option<(f32, UnitRecord)> = None;
    for record in records {
        let d = record.position.distance(to);
        if best.as_ref().map_or(true, |(bd, _)| d < *bd) {
            best = Some((d, record));
        }
    }
    best.map(|(_, r)| r)
}

impl<'a> Dispatcher<'a> {
    // -- selection ----------------------------------------------------------

    /// Select the unit nearest to `at` within `slop` world pixels, of any
    /// owner. Nothing there clears the selection.
    pub fn select_at(&mut self, at: WorldPoint, slop: f32) {
        let found = self
            .sim
            .units_in_rect(WorldRect::around(at, slop), self.player);
        match nearest(found, at) {
            Some(unit) => {
                tracing::trace!(unit = %unit.id, owner = unit.owner.0, "point select");
                self.selection.replace([unit.id]);
            }
            None => self.selection.clear(),
        }
    }

    /// Select own units inside the rectangle spanned by `a` and `b`.
    ///
    /// With no own unit inside, the enemy unit nearest the rectangle centre
    /// is selected alone for inspection.
    pub fn select_box(&mut self, a: WorldPoint, b: WorldPoint) {
        let rect = WorldRect::from_corners(a, b);
        let found = self.sim.units_in_rect(rect, self.player);
        let own: Vec<UnitId> = found
            .iter()
            .filter(|u| u.owner == self.player)
            .map(|u| u.id)
            .collect();

        if !own.is_empty() {
            self.selection.replace(own);
            if let Some(max) = self.max_selection {
                self.selection.truncate(max);
            }
            tracing::trace!(count = self.selection.len(), "box select");
            return;
        }

        let centre = WorldPoint::new(
            (rect.min.x + rect.max.x) / 2.0,
            (rect.min.y + rect.max.y) / 2.0,
        );
        match nearest(found, centre) {
            Some(unit) => self.selection.replace([unit.id]),
            None => self.selection.clear(),
        }
    }

    /// Selected units the local player owns, skipping dead ids.
    pub fn own_selected(&self) -> Vec<UnitRecord> {
        self.selection
            .ids()
            .iter()
            .filter_map(|id| self.sim.unit(*id))
            .filter(|u| u.owner == self.player)
            .collect()
    }

    // -- orders -------------------------------------------------------------

    fn blocked(&self, what: &str) -> bool {
        if self.read_only {
            tracing::debug!(command = what, "ignored during replay playback");
        }
        self.read_only
    }

    /// Hand one order to the simulation. A refusal becomes an advisory when
    /// `advise` is set.
    fn issue(&mut self, unit: UnitId, kind: OrderKind, advise: bool) -> bool {
        let order = Order::new(unit, kind, self.player);
        match self.sim.issue(order.clone()) {
            Ok(()) => {
                self.issued.push(order);
                true
            }
            Err(reason) => {
                tracing::trace!(unit = %unit, order = order.kind.label(), %reason, "order refused");
                if advise {
                    self.events.advise(Advisory::Rejected {
                        order: order.kind.label().to_owned(),
                        reason,
                    });
                }
                false
            }
        }
    }

    /// Issue `kind` to every unit in `units`, skipping those already carrying
    /// it out. Only the first refusal is reported. Returns the number issued.
    fn issue_to_all(&mut self, units: &[UnitId], kind: &OrderKind) -> usize {
        let mut issued = 0;
        let mut advised = false;
        for id in units {
            if self.carrying_out(*id, kind) {
                continue;
            }
            if self.issue(*id, kind.clone(), !advised) {
                issued += 1;
            } else {
                advised = true;
            }
        }
        issued
    }

    /// True when `unit` is already doing `kind`. An idle unit counts as
    /// stopped.
    fn carrying_out(&self, unit: UnitId, kind: &OrderKind) -> bool {
        match self.sim.current_order(unit) {
            Some(current) => current == *kind,
            None => *kind == OrderKind::Stop,
        }
    }

    /// Move, attack-move, patrol, hold or stop for the whole selection.
    fn unit_order(&mut self, kind: OrderKind) {
        if self.blocked(kind.label()) {
            return;
        }
        let units: Vec<UnitId> = self
            .own_selected()
            .into_iter()
            .filter(|u| accepts(&kind, &u.flags))
            .map(|u| u.id)
            .collect();
        if units.is_empty() {
            tracing::trace!(order = kind.label(), "no selected unit takes this order");
            return;
        }
        let issued = self.issue_to_all(&units, &kind);
        tracing::debug!(order = kind.label(), issued, selected = units.len(), "unit order");
    }

    pub fn move_to(&mut self, to: WorldPoint) {
        self.unit_order(OrderKind::Move(to));
    }

    pub fn attack_move(&mut self, to: WorldPoint) {
        self.unit_order(OrderKind::AttackMove(to));
    }

    pub fn patrol(&mut self, to: WorldPoint) {
        self.unit_order(OrderKind::Patrol(to));
    }

    pub fn hold(&mut self) {
        self.unit_order(OrderKind::Hold);
    }

    pub fn stop(&mut self) {
        self.unit_order(OrderKind::Stop);
    }

    /// Construct `unit_type` centred on `at` with the single selected worker.
    pub fn build(&mut self, unit_type: UnitTypeId, at: WorldPoint) {
        if self.blocked("build") {
            return;
        }
        let own = self.own_selected();
        let [builder] = own.as_slice() else {
            self.events.advise(Advisory::NeedsSingleBuilder);
            return;
        };
        let builder = builder.id;
        if !self.sim.can_construct(builder, unit_type) {
            self.events.advise(Advisory::CannotConstruct(unit_type));
            return;
        }
        if !self.sim.is_placement_clear(unit_type, at) {
            self.events.advise(Advisory::PlacementObstructed);
            return;
        }
        self.issue_to_all(&[builder], &OrderKind::Build { unit_type, at });
    }

    /// Queue `unit_type` at the selected building with the most free slots.
    pub fn train(&mut self, unit_type: UnitTypeId) {
        if self.blocked("train") {
            return;
        }
        let mut best: Option<(UnitId, usize)> = None;
        for unit in self.own_selected() {
            if !self.sim.can_produce(unit.id, unit_type) {
                continue;
            }
            let free = self.sim.free_production_slots(unit.id);
            if best.map_or(true, |(_, f)| free > f) {
                best = Some((unit.id, free));
            }
        }
        match best {
            Some((building, free)) if free > 0 => {
                self.issue(building, OrderKind::Train(unit_type), true);
            }
            _ => self
                .events
                .advise(Advisory::ProductionUnavailable(unit_type)),
        }
    }

    /// Use `ability` with the selected units that have it.
    ///
    /// No-target abilities go to every capable unit with enough energy;
    /// targeted ones to the single such unit with the most energy.
    pub fn use_ability(&mut self, ability: AbilityId, target: AbilityTarget) {
        if self.blocked("ability") {
            return;
        }
        let mut casters: Vec<(UnitRecord, i32)> = Vec::new();
        let mut target_kind = None;
        for unit in self.own_selected() {
            let Some(info) = self
                .sim
                .abilities(unit.id)
                .into_iter()
                .find(|a| a.id == ability)
            else {
                continue;
            };
            target_kind = Some(info.target);
            casters.push((unit, info.energy_cost));
        }
        let Some(target_kind) = target_kind else {
            self.events.advise(Advisory::AbilityUnavailable(ability));
            return;
        };
        if !target_matches(target_kind, &target) {
            self.events.advise(Advisory::AbilityTargetMismatch(ability));
            return;
        }
        if let AbilityTarget::Unit(t) = target {
            if !self.sim.is_alive(t) {
                self.events.advise(Advisory::TargetGone(t));
                return;
            }
        }

        let available = casters.iter().map(|(u, _)| u.energy).max().unwrap_or(0);
        let ready: Vec<&(UnitRecord, i32)> =
            casters.iter().filter(|(u, cost)| u.energy >= *cost).collect();
        if ready.is_empty() {
            let needed = casters.first().map_or(0, |(_, cost)| *cost);
            self.events
                .advise(Advisory::InsufficientEnergy { needed, available });
            return;
        }

        let kind = OrderKind::UseAbility { ability, target };
        let units: Vec<UnitId> = if target_kind.needs_target() {
            let mut best = ready[0];
            for candidate in ready.iter().skip(1) {
                if candidate.0.energy > best.0.energy {
                    best = *candidate;
                }
            }
            vec![best.0.id]
        } else {
            ready.iter().map(|(u, _)| u.id).collect()
        };
        for id in units {
            self.issue(id, kind.clone(), true);
        }
    }

    fn production_buildings(&self) -> Vec<UnitId> {
        self.own_selected()
            .into_iter()
            .filter(|u| self.sim.is_production_building(u.id))
            .map(|u| u.id)
            .collect()
    }

    fn rally(&mut self, kind: OrderKind) {
        if self.blocked(kind.label()) {
            return;
        }
        let buildings = self.production_buildings();
        if buildings.is_empty() {
            self.events.advise(Advisory::NoProductionBuilding);
            return;
        }
        if let OrderKind::RallyToUnit(target) = kind {
            if !self.sim.is_alive(target) {
                self.events.advise(Advisory::TargetGone(target));
                return;
            }
        }
        let mut advised = false;
        for building in buildings {
            if !self.issue(building, kind.clone(), !advised) {
                advised = true;
            }
        }
    }

    pub fn rally_to_position(&mut self, at: WorldPoint) {
        self.rally(OrderKind::RallyToPosition(at));
    }

    pub fn rally_to_unit(&mut self, target: UnitId) {
        self.rally(OrderKind::RallyToUnit(target));
    }

    /// Smart command at `at`.
    ///
    /// Left click moves. Right click attack-moves onto a visible enemy within
    /// `slop`, sets the rally point when only production buildings are
    /// selected, and moves otherwise.
    pub fn command_to(&mut self, at: WorldPoint, right_click: bool, slop: f32) {
        if !right_click {
            self.move_to(at);
            return;
        }
        let enemy_there = self
            .sim
            .units_in_rect(WorldRect::around(at, slop), self.player)
            .iter()
            .any(|u| u.owner != self.player && !u.owner.is_neutral());
        if enemy_there {
            self.attack_move(at);
            return;
        }
        let own = self.own_selected();
        let only_producers = !own.is_empty()
            && own
                .iter()
                .all(|u| self.sim.is_production_building(u.id));
        if only_producers {
            self.rally_to_position(at);
        } else {
            self.move_to(at);
        }
    }

    /// Route a fully specified order to the matching command.
    pub fn issue_command(&mut self, kind: OrderKind) {
        match kind {
            OrderKind::Move(_)
            | OrderKind::AttackMove(_)
            | OrderKind::Patrol(_)
            | OrderKind::Hold
            | OrderKind::Stop => self.unit_order(kind),
            OrderKind::Build { unit_type, at } => self.build(unit_type, at),
            OrderKind::Train(unit_type) => self.train(unit_type),
            OrderKind::UseAbility { ability, target } => self.use_ability(ability, target),
            OrderKind::RallyToPosition(_) | OrderKind::RallyToUnit(_) => self.rally(kind),
        }
    }

    // -- control groups -----------------------------------------------------

    fn group_slot(&mut self, index: i32) -> Option<usize> {
        let slot = ControlGroups::slot(index);
        if slot.is_none() {
            self.events.advise(Advisory::InvalidControlGroup(index));
        }
        slot
    }

    fn own_selected_ids(&self) -> Vec<UnitId> {
        self.own_selected().into_iter().map(|u| u.id).collect()
    }

    /// Replace group `index` with the own units in the selection.
    pub fn assign_group(&mut self, index: i32) {
        let Some(slot) = self.group_slot(index) else {
            return;
        };
        let ids = self.own_selected_ids();
        self.groups.assign(slot, &ids);
    }

    /// Add the own units in the selection to group `index`.
    pub fn add_to_group(&mut self, index: i32) {
        let Some(slot) = self.group_slot(index) else {
            return;
        };
        let ids = self.own_selected_ids();
        self.groups.add(slot, &ids);
    }

    /// Replace the selection with the live members of group `index`.
    pub fn select_group(&mut self, index: i32) {
        let Some(slot) = self.group_slot(index) else {
            return;
        };
        let sim: &dyn Simulation = &*self.sim;
        let members = self.groups.pruned_members(slot, |id| sim.is_alive(id));
        self.selection.replace(members.iter().copied());
    }

    /// Live member count of group `index`; 0 for an invalid index.
    pub fn group_size(&mut self, index: i32) -> usize {
        let Some(slot) = self.group_slot(index) else {
            return 0;
        };
        let sim: &dyn Simulation = &*self.sim;
        self.groups.pruned_members(slot, |id| sim.is_alive(id)).len()
    }
}
