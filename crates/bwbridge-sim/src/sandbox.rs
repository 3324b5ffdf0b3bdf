//! Sandbox simulation: a small Terran rule set implementing [`Simulation`].
//!
//! The sandbox exists so the bridge can be driven end to end without the real
//! engine. It models movement, patrol, hold, attack-move with simple
//! auto-targeting, worker construction, production queues with rally points,
//! energy abilities, supply, fog of war by sight radius and a difficulty-scaled
//! attack AI for computer players.
//!
//! Each frame runs these phases in a fixed order:
//!
//! 1. Apply buffered orders (FIFO).
//! 2. Timers: construction, production, energy, status effects.
//! 3. Movement and construction-site arrival.
//! 4. Combat.
//! 5. Removal of dead units.
//! 6. Computer players.

use std::any::Any;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::catalog::{self, UnitType, PRODUCTION_SLOTS, SUPPLY_CAP};
use crate::command::{AbilityTarget, ApplyReport, Order, OrderBuffer, OrderKind, OrderRejection};
use crate::scenario::{PlayerSetup, Scenario};
use crate::simulation::{GameSetup, Simulation, SimulationLoader};
use crate::types::{
    AbilityId, AbilityInfo, GameOutcome, MapInfo, PlayerId, Race, Resources, TargetKind,
    UnitFlags, UnitRecord, UnitTypeId, WorldPoint, WorldRect,
};
use crate::unit::{UnitAllocator, UnitId};
use crate::SimError;

// ---------------------------------------------------------------------------
// SandboxConfig
// ---------------------------------------------------------------------------

/// Tunables of the sandbox rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Energy regained per frame by units with an energy pool.
    pub energy_regen_per_frame: f32,
    /// Frames between AI attack waves at difficulty 1 (divided by difficulty).
    pub ai_interval_frames: u32,
    /// Duration of the stim speed boost.
    pub stim_frames: u32,
    /// Health spent per stim.
    pub stim_health_cost: f32,
    /// Duration of lockdown on its target.
    pub lockdown_frames: u32,
    /// Extra distance from which a worker can start a structure.
    pub build_range: f32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            energy_regen_per_frame: 0.03125,
            ai_interval_frames: 720,
            stim_frames: 240,
            stim_health_cost: 10.0,
            lockdown_frames: 1000,
            build_range: 8.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SandboxLoader
// ---------------------------------------------------------------------------

/// Loads scenario files from disk into [`SandboxSim`]s.
#[derive(Debug, Clone, Default)]
pub struct SandboxLoader {
    pub config: SandboxConfig,
}

impl SandboxLoader {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }
}

impl SimulationLoader for SandboxLoader {
    fn load(&self, setup: &GameSetup) -> Result<Box<dyn Simulation>, SimError> {
        let scenario = Scenario::load(&setup.map_path)?;
        let sim = SandboxSim::from_scenario(&scenario, setup, self.config.clone())?;
        Ok(Box::new(sim))
    }
}

// ---------------------------------------------------------------------------
// Internal unit state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Activity {
    Idle,
    Moving { to: WorldPoint, attack: bool },
    Patrolling { origin: WorldPoint, target: WorldPoint, returning: bool },
    Holding,
    Constructing { unit_type: UnitTypeId, at: WorldPoint },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Rally {
    Position(WorldPoint),
    Unit(UnitId),
}

#[derive(Debug, Clone)]
struct Production {
    kind: &'static UnitType,
    frames_left: u32,
}

#[derive(Debug, Clone)]
struct SimUnit {
    id: UnitId,
    kind: &'static UnitType,
    owner: PlayerId,
    pos: WorldPoint,
    health: f32,
    shields: f32,
    energy: f32,
    activity: Activity,
    queue: VecDeque<Production>,
    rally: Option<Rally>,
    cooldown: u32,
    construction_left: u32,
    locked_frames: u32,
    stim_frames: u32,
    /// Set by combat when an enemy was in range last frame.
    engaged: bool,
}

impl SimUnit {
    fn is_complete(&self) -> bool {
        self.construction_left == 0
    }

    fn can_move(&self) -> bool {
        self.kind.speed > 0.0
    }

    fn speed(&self) -> f32 {
        if self.stim_frames > 0 {
            self.kind.speed * 1.5
        } else {
            self.kind.speed
        }
    }
}

#[derive(Debug, Clone)]
struct PlayerState {
    id: PlayerId,
    minerals: i32,
    gas: i32,
}

// ---------------------------------------------------------------------------
// SandboxSim
// ---------------------------------------------------------------------------

/// The sandbox simulation engine.
pub struct SandboxSim {
    config: SandboxConfig,
    map: MapInfo,
    frame: u32,
    allocator: UnitAllocator,
    /// Unit storage indexed by `UnitId::index()`.
    slots: Vec<Option<SimUnit>>,
    players: Vec<PlayerState>,
    /// Players that started with at least one unit; only they can win or lose.
    contenders: Vec<PlayerId>,
    orders: OrderBuffer,
    local_player: PlayerId,
    ai_difficulty: u8,
}

impl SandboxSim {
    /// Build a simulation from a validated scenario.
    ///
    /// # Errors
    ///
    /// [`SimError::UnsupportedRace`] for races other than Terran, and
    /// [`SimError::InvalidMap`] when the local player has no slot.
    pub fn from_scenario(
        scenario: &Scenario,
        setup: &GameSetup,
        config: SandboxConfig,
    ) -> Result<Self, SimError> {
        if setup.race != Race::Terran {
            return Err(SimError::UnsupportedRace(setup.race));
        }
        scenario.validate()?;
        if scenario.player(setup.local_player).is_none() {
            return Err(SimError::InvalidMap(format!(
                "local player {:?} has no slot in '{}'",
                setup.local_player, scenario.name
            )));
        }

        let mut sim = Self {
            config,
            map: scenario.map_info(),
            frame: 0,
            allocator: UnitAllocator::new(),
            slots: Vec::new(),
            players: scenario.players.iter().map(PlayerState::from).collect(),
            contenders: Vec::new(),
            orders: OrderBuffer::new(),
            local_player: setup.local_player,
            ai_difficulty: setup.ai_difficulty,
        };
        for (unit_type, owner, pos) in scenario.resolved_units() {
            sim.spawn_unit(unit_type, owner, pos);
            if !owner.is_neutral() && !sim.contenders.contains(&owner) {
                sim.contenders.push(owner);
            }
        }

        tracing::info!(
            map = %sim.map.name,
            units = sim.allocator.alive_count(),
            players = sim.players.len(),
            ai_difficulty = sim.ai_difficulty,
            "sandbox simulation loaded"
        );
        Ok(sim)
    }

    // -- direct manipulation (setup, tests, tools) --------------------------

    /// Place a completed unit. Returns `None` for unknown types.
    pub fn spawn_unit(
        &mut self,
        unit_type: UnitTypeId,
        owner: PlayerId,
        pos: WorldPoint,
    ) -> Option<UnitId> {
        let kind = catalog::unit_type(unit_type)?;
        Some(self.spawn(kind, owner, pos, 0))
    }

    /// Remove a unit immediately. Returns `false` if it was already dead.
    pub fn kill_unit(&mut self, id: UnitId) -> bool {
        if !self.allocator.release(id) {
            return false;
        }
        if let Some(slot) = self.slots.get_mut(id.index() as usize) {
            *slot = None;
        }
        tracing::debug!(unit = %id, frame = self.frame, "unit removed");
        true
    }

    /// Overwrite a player's bank.
    pub fn set_resources(&mut self, player: PlayerId, minerals: i32, gas: i32) {
        if let Some(p) = self.player_mut(player) {
            p.minerals = minerals;
            p.gas = gas;
        }
    }

    /// Unit types queued in a building, front first.
    pub fn production_queue(&self, building: UnitId) -> Vec<UnitTypeId> {
        self.get(building)
            .map(|u| u.queue.iter().map(|p| p.kind.id).collect())
            .unwrap_or_default()
    }

    /// Set a unit's current energy (clamped to its maximum).
    pub fn set_energy(&mut self, id: UnitId, energy: f32) {
        if let Some(u) = self.get_mut(id) {
            u.energy = energy.clamp(0.0, u.kind.max_energy as f32);
        }
    }

    /// Frames of lockdown remaining on a unit.
    pub fn lockdown_remaining(&self, id: UnitId) -> u32 {
        self.get(id).map(|u| u.locked_frames).unwrap_or(0)
    }

    /// Rally point of a production building resolved to a position.
    pub fn rally_point(&self, building: UnitId) -> Option<WorldPoint> {
        let unit = self.get(building)?;
        match unit.rally? {
            Rally::Position(p) => Some(p),
            Rally::Unit(target) => self.get(target).map(|t| t.pos),
        }
    }

    /// Number of orders waiting for the next frame.
    pub fn pending_order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn last_apply_report(&self) -> ApplyReport {
        self.orders.last_apply_report()
    }

    pub fn unit_count(&self) -> usize {
        self.allocator.alive_count()
    }

    // -- internal helpers ---------------------------------------------------

    fn spawn(
        &mut self,
        kind: &'static UnitType,
        owner: PlayerId,
        pos: WorldPoint,
        construction_left: u32,
    ) -> UnitId {
        let id = self.allocator.allocate();
        let idx = id.index() as usize;
        if self.slots.len() <= idx {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(SimUnit {
            id,
            kind,
            owner,
            pos,
            health: kind.max_health as f32,
            shields: kind.max_shields as f32,
            energy: if kind.max_energy > 0 { 50.0 } else { 0.0 },
            activity: Activity::Idle,
            queue: VecDeque::new(),
            rally: None,
            cooldown: 0,
            construction_left,
            locked_frames: 0,
            stim_frames: 0,
            engaged: false,
        });
        id
    }

    fn get(&self, id: UnitId) -> Option<&SimUnit> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get(id.index() as usize)?.as_ref()
    }

    fn get_mut(&mut self, id: UnitId) -> Option<&mut SimUnit> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get_mut(id.index() as usize)?.as_mut()
    }

    fn live_units(&self) -> impl Iterator<Item = &SimUnit> {
        self.slots.iter().flatten()
    }

    fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    fn clamp_to_map(&self, p: WorldPoint) -> WorldPoint {
        WorldPoint::new(
            p.x.clamp(0.0, self.map.width_px() as f32 - 1.0),
            p.y.clamp(0.0, self.map.height_px() as f32 - 1.0),
        )
    }

    fn record(&self, unit: &SimUnit, visible: bool) -> UnitRecord {
        UnitRecord {
            id: unit.id,
            type_id: unit.kind.id,
            type_name: unit.kind.name.to_owned(),
            owner: unit.owner,
            position: unit.pos,
            radius: unit.kind.radius,
            health: unit.health.ceil() as i32,
            max_health: unit.kind.max_health,
            shields: unit.shields.ceil() as i32,
            max_shields: unit.kind.max_shields,
            energy: unit.energy.floor() as i32,
            max_energy: unit.kind.max_energy,
            flags: UnitFlags {
                is_building: unit.kind.is_building,
                is_worker: unit.kind.is_worker,
                can_attack: unit.kind.weapon.is_some(),
                can_move: unit.can_move(),
                invincible: unit.kind.invincible,
            },
            visible,
        }
    }

    /// Positions and sight radii of everything `viewer` can see with.
    fn sight_sources(&self, viewer: PlayerId) -> Vec<(WorldPoint, f32)> {
        self.live_units()
            .filter(|u| u.owner == viewer && u.kind.sight > 0.0)
            .map(|u| (u.pos, u.kind.sight))
            .collect()
    }

    fn is_visible(unit: &SimUnit, viewer: PlayerId, sources: &[(WorldPoint, f32)]) -> bool {
        unit.owner == viewer
            || unit.owner.is_neutral()
            || sources
                .iter()
                .any(|(p, sight)| p.distance(unit.pos) <= sight + unit.kind.radius)
    }

    fn placement_clear(&self, unit_type: UnitTypeId, at: WorldPoint, ignore: Option<UnitId>) -> bool {
        let Some(kind) = catalog::unit_type(unit_type) else {
            return false;
        };
        let r = kind.radius;
        let inside = at.x - r >= 0.0
            && at.y - r >= 0.0
            && at.x + r <= self.map.width_px() as f32
            && at.y + r <= self.map.height_px() as f32;
        inside
            && self
                .live_units()
                .filter(|u| Some(u.id) != ignore)
                .all(|u| u.pos.distance(at) >= r + u.kind.radius)
    }

    fn check_cost(&self, player: PlayerId, kind: &UnitType) -> Result<(), OrderRejection> {
        let (minerals, gas) = self
            .player(player)
            .map(|p| (p.minerals, p.gas))
            .unwrap_or((0, 0));
        if minerals < kind.mineral_cost {
            return Err(OrderRejection::InsufficientMinerals {
                needed: kind.mineral_cost,
                available: minerals,
            });
        }
        if gas < kind.gas_cost {
            return Err(OrderRejection::InsufficientGas {
                needed: kind.gas_cost,
                available: gas,
            });
        }
        Ok(())
    }

    fn spend(&mut self, player: PlayerId, kind: &UnitType) {
        if let Some(p) = self.player_mut(player) {
            p.minerals -= kind.mineral_cost;
            p.gas -= kind.gas_cost;
        }
    }

    fn pending_trains(&self, building: UnitId) -> usize {
        self.orders
            .count_pending(building, |k| matches!(k, OrderKind::Train(_)))
    }

    fn validate(&self, order: &Order) -> Result<(), OrderRejection> {
        let unit = self
            .get(order.unit)
            .ok_or(OrderRejection::UnknownUnit(order.unit))?;
        if unit.owner != order.issued_by {
            return Err(OrderRejection::NotOwner {
                unit: order.unit,
                player: order.issued_by,
            });
        }
        if !unit.is_complete() {
            return Err(OrderRejection::Incapable(order.unit));
        }

        match &order.kind {
            OrderKind::Move(_) | OrderKind::AttackMove(_) | OrderKind::Patrol(_) => {
                if !unit.can_move() {
                    return Err(OrderRejection::Incapable(order.unit));
                }
                if matches!(order.kind, OrderKind::AttackMove(_)) && unit.kind.weapon.is_none() {
                    // Unarmed units treat attack-move as a plain move.
                    return Ok(());
                }
            }
            OrderKind::Hold | OrderKind::Stop => {
                if !unit.can_move() && unit.kind.weapon.is_none() {
                    return Err(OrderRejection::Incapable(order.unit));
                }
            }
            OrderKind::Build { unit_type, at } => {
                let kind = catalog::unit_type(*unit_type)
                    .ok_or(OrderRejection::UnknownUnitType(*unit_type))?;
                if !unit.kind.builds.contains(unit_type) {
                    return Err(OrderRejection::Incapable(order.unit));
                }
                if !self.placement_clear(*unit_type, *at, Some(order.unit)) {
                    return Err(OrderRejection::PlacementObstructed);
                }
                self.check_cost(unit.owner, kind)?;
            }
            OrderKind::Train(unit_type) => {
                let kind = catalog::unit_type(*unit_type)
                    .ok_or(OrderRejection::UnknownUnitType(*unit_type))?;
                if !unit.kind.trains.contains(unit_type) {
                    return Err(OrderRejection::Incapable(order.unit));
                }
                if unit.queue.len() + self.pending_trains(order.unit) >= PRODUCTION_SLOTS {
                    return Err(OrderRejection::QueueFull);
                }
                self.check_cost(unit.owner, kind)?;
                let supply = self.resources(unit.owner);
                if supply.supply_used + kind.supply_cost > supply.supply_max {
                    return Err(OrderRejection::SupplyBlocked {
                        needed: kind.supply_cost,
                        available: supply.supply_max - supply.supply_used,
                    });
                }
            }
            OrderKind::UseAbility { ability, target } => {
                if !unit.kind.abilities.contains(ability) {
                    return Err(OrderRejection::AbilityUnavailable(*ability));
                }
                let info = catalog::ability(*ability)
                    .ok_or(OrderRejection::AbilityUnavailable(*ability))?;
                let target_ok = match (info.target, target) {
                    (TargetKind::None, AbilityTarget::None) => true,
                    (TargetKind::Ground, AbilityTarget::Ground(_)) => true,
                    (TargetKind::Unit, AbilityTarget::Unit(t)) => {
                        self.allocator.is_alive(*t)
                    }
                    _ => false,
                };
                if !target_ok {
                    return Err(OrderRejection::InvalidTarget);
                }
                if (unit.energy as i32) < info.energy_cost {
                    return Err(OrderRejection::InsufficientEnergy {
                        needed: info.energy_cost,
                        available: unit.energy as i32,
                    });
                }
                if *ability == catalog::STIM_PACKS && unit.health <= self.config.stim_health_cost {
                    return Err(OrderRejection::Incapable(order.unit));
                }
            }
            OrderKind::RallyToPosition(_) => {
                if unit.kind.trains.is_empty() {
                    return Err(OrderRejection::Incapable(order.unit));
                }
            }
            OrderKind::RallyToUnit(target) => {
                if unit.kind.trains.is_empty() {
                    return Err(OrderRejection::Incapable(order.unit));
                }
                if !self.allocator.is_alive(*target) {
                    return Err(OrderRejection::InvalidTarget);
                }
            }
        }
        Ok(())
    }

    /// Execute a buffered order. Returns `false` if it no longer applies.
    fn apply_order(&mut self, order: &Order) -> bool {
        if let Err(reason) = self.validate(order) {
            tracing::debug!(
                unit = %order.unit,
                order = order.kind.label(),
                %reason,
                "buffered order dropped at apply"
            );
            return false;
        }

        match order.kind.clone() {
            OrderKind::Build { unit_type, at } => {
                if let Some(u) = self.get_mut(order.unit) {
                    u.activity = Activity::Constructing { unit_type, at };
                }
            }
            OrderKind::Train(unit_type) => {
                let Some(kind) = catalog::unit_type(unit_type) else {
                    return false;
                };
                let Some(owner) = self.get(order.unit).map(|u| u.owner) else {
                    return false;
                };
                self.spend(owner, kind);
                if let Some(u) = self.get_mut(order.unit) {
                    u.queue.push_back(Production {
                        kind,
                        frames_left: kind.build_frames.max(1),
                    });
                }
            }
            OrderKind::UseAbility { ability, target } => self.apply_ability(order.unit, ability, target),
            kind => {
                let Some(u) = self.get_mut(order.unit) else {
                    return false;
                };
                match kind {
                    OrderKind::Move(to) => u.activity = Activity::Moving { to, attack: false },
                    OrderKind::AttackMove(to) => {
                        let attack = u.kind.weapon.is_some();
                        u.activity = Activity::Moving { to, attack };
                    }
                    OrderKind::Patrol(target) => {
                        u.activity = Activity::Patrolling {
                            origin: u.pos,
                            target,
                            returning: false,
                        }
                    }
                    OrderKind::Hold => u.activity = Activity::Holding,
                    OrderKind::Stop => u.activity = Activity::Idle,
                    OrderKind::RallyToPosition(p) => u.rally = Some(Rally::Position(p)),
                    OrderKind::RallyToUnit(t) => u.rally = Some(Rally::Unit(t)),
                    OrderKind::Build { .. } | OrderKind::Train(_) | OrderKind::UseAbility { .. } => {}
                }
            }
        }
        true
    }

    fn apply_ability(&mut self, caster: UnitId, ability: AbilityId, target: AbilityTarget) {
        let Some(info) = catalog::ability(ability) else {
            return;
        };
        let stim_frames = self.config.stim_frames;
        let stim_cost = self.config.stim_health_cost;
        let lockdown_frames = self.config.lockdown_frames;
        if let Some(u) = self.get_mut(caster) {
            u.energy -= info.energy_cost as f32;
            if ability == catalog::STIM_PACKS {
                u.health -= stim_cost;
                u.stim_frames = stim_frames;
            }
        }
        if let AbilityTarget::Unit(t) = target {
            if let Some(target_unit) = self.get_mut(t) {
                match ability {
                    catalog::LOCKDOWN => target_unit.locked_frames = lockdown_frames,
                    catalog::RESTORATION => {
                        target_unit.locked_frames = 0;
                        target_unit.stim_frames = 0;
                    }
                    _ => {}
                }
            }
        }
        tracing::debug!(unit = %caster, ability = info.name, "ability used");
    }

    fn advance_timers(&mut self) {
        let regen = self.config.energy_regen_per_frame;
        let mut completed = Vec::new();
        for unit in self.slots.iter_mut().flatten() {
            if unit.construction_left > 0 {
                unit.construction_left -= 1;
                continue;
            }
            unit.locked_frames = unit.locked_frames.saturating_sub(1);
            unit.stim_frames = unit.stim_frames.saturating_sub(1);
            if unit.kind.max_energy > 0 {
                unit.energy = (unit.energy + regen).min(unit.kind.max_energy as f32);
            }
            if let Some(front) = unit.queue.front_mut() {
                front.frames_left = front.frames_left.saturating_sub(1);
                if front.frames_left == 0 {
                    if let Some(done) = unit.queue.pop_front() {
                        completed.push((unit.owner, done.kind, unit.pos, unit.kind.radius, unit.rally));
                    }
                }
            }
        }

        for (owner, kind, pos, radius, rally) in completed {
            let spawn_at = self.clamp_to_map(WorldPoint::new(pos.x, pos.y + radius + kind.radius + 4.0));
            let id = self.spawn(kind, owner, spawn_at, 0);
            let destination = match rally {
                Some(Rally::Position(p)) => Some(p),
                Some(Rally::Unit(t)) => self.get(t).map(|u| u.pos),
                None => None,
            };
            if let (Some(to), Some(unit)) = (destination, self.get_mut(id)) {
                if unit.can_move() {
                    unit.activity = Activity::Moving { to, attack: false };
                }
            }
            tracing::debug!(unit = %id, kind = kind.name, owner = owner.0, "unit trained");
        }
    }

    fn advance_movement(&mut self) {
        let bounds = WorldPoint::new(
            self.map.width_px() as f32 - 1.0,
            self.map.height_px() as f32 - 1.0,
        );
        let build_range = self.config.build_range;
        let mut arrivals = Vec::new();

        for unit in self.slots.iter_mut().flatten() {
            if unit.locked_frames > 0 || !unit.is_complete() {
                continue;
            }
            let speed = unit.speed();
            match unit.activity {
                Activity::Moving { to, attack } => {
                    if attack && unit.engaged {
                        continue;
                    }
                    if step_towards(&mut unit.pos, clamp(to, bounds), speed) {
                        unit.activity = Activity::Idle;
                    }
                }
                Activity::Patrolling {
                    origin,
                    target,
                    returning,
                } => {
                    if unit.engaged {
                        continue;
                    }
                    let goal = if returning { origin } else { target };
                    if step_towards(&mut unit.pos, clamp(goal, bounds), speed) {
                        unit.activity = Activity::Patrolling {
                            origin,
                            target,
                            returning: !returning,
                        };
                    }
                }
                Activity::Constructing { unit_type, at } => {
                    let site_radius = catalog::unit_type(unit_type).map(|k| k.radius).unwrap_or(0.0);
                    let reach = unit.kind.radius + site_radius + build_range;
                    if unit.pos.distance(at) <= reach {
                        arrivals.push((unit.id, unit.owner, unit_type, at));
                    } else {
                        step_towards(&mut unit.pos, clamp(at, bounds), speed);
                    }
                }
                Activity::Idle | Activity::Holding => {}
            }
        }

        for (builder, owner, unit_type, at) in arrivals {
            if let Some(u) = self.get_mut(builder) {
                u.activity = Activity::Idle;
            }
            let Some(kind) = catalog::unit_type(unit_type) else {
                continue;
            };
            if !self.placement_clear(unit_type, at, Some(builder)) {
                tracing::debug!(unit = %builder, kind = kind.name, "build site became obstructed");
                continue;
            }
            if self.check_cost(owner, kind).is_err() {
                tracing::debug!(unit = %builder, kind = kind.name, "cannot afford structure on arrival");
                continue;
            }
            self.spend(owner, kind);
            let id = self.spawn(kind, owner, at, kind.build_frames);
            tracing::debug!(structure = %id, kind = kind.name, "construction started");
        }
    }

    fn resolve_combat(&mut self) {
        let targets: Vec<(UnitId, PlayerId, WorldPoint, f32)> = self
            .live_units()
            .filter(|u| !u.kind.invincible && !u.owner.is_neutral())
            .map(|u| (u.id, u.owner, u.pos, u.kind.radius))
            .collect();

        let mut hits = Vec::new();
        for unit in self.slots.iter_mut().flatten() {
            unit.engaged = false;
            unit.cooldown = unit.cooldown.saturating_sub(1);
            let Some(weapon) = unit.kind.weapon else {
                continue;
            };
            if unit.locked_frames > 0 || !unit.is_complete() {
                continue;
            }
            if matches!(
                unit.activity,
                Activity::Moving { attack: false, .. } | Activity::Constructing { .. }
            ) {
                continue;
            }
            let nearest = targets
                .iter()
                .filter(|(_, owner, _, _)| *owner != unit.owner)
                .map(|(id, _, pos, radius)| (*id, unit.pos.distance(*pos) - unit.kind.radius - radius))
                .filter(|(_, gap)| *gap <= weapon.range)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((target, _)) = nearest {
                unit.engaged = true;
                if unit.cooldown == 0 {
                    hits.push((target, weapon.damage));
                    unit.cooldown = weapon.cooldown;
                }
            }
        }

        for (target, damage) in hits {
            if let Some(u) = self.get_mut(target) {
                let absorbed = damage.min(u.shields);
                u.shields -= absorbed;
                u.health -= damage - absorbed;
            }
        }
    }

    fn remove_dead(&mut self) {
        let dead: Vec<UnitId> = self
            .live_units()
            .filter(|u| !u.kind.invincible && u.health <= 0.0)
            .map(|u| u.id)
            .collect();
        for id in dead {
            self.kill_unit(id);
        }
    }

    fn run_ai(&mut self) {
        if self.ai_difficulty == 0 || self.frame == 0 {
            return;
        }
        let interval = (self.config.ai_interval_frames / self.ai_difficulty as u32).max(24);
        if self.frame % interval != 0 {
            return;
        }
        let computer_players: Vec<PlayerId> = self
            .contenders
            .iter()
            .copied()
            .filter(|p| *p != self.local_player)
            .collect();

        for player in computer_players {
            let target = self
                .live_units()
                .filter(|u| u.owner != player && !u.owner.is_neutral())
                .min_by_key(|u| (!u.kind.is_building, u.id))
                .map(|u| u.pos);
            let Some(target) = target else {
                continue;
            };
            let mut sent = 0;
            for unit in self.slots.iter_mut().flatten() {
                if unit.owner == player
                    && unit.activity == Activity::Idle
                    && unit.kind.weapon.is_some()
                    && unit.can_move()
                    && !unit.kind.is_worker
                {
                    unit.activity = Activity::Moving {
                        to: target,
                        attack: true,
                    };
                    sent += 1;
                }
            }
            if sent > 0 {
                tracing::debug!(player = player.0, units = sent, frame = self.frame, "ai attack wave");
            }
        }
    }

    fn has_units(&self, player: PlayerId) -> bool {
        self.live_units().any(|u| u.owner == player)
    }
}

impl From<&PlayerSetup> for PlayerState {
    fn from(p: &PlayerSetup) -> Self {
        Self {
            id: p.id,
            minerals: p.minerals,
            gas: p.gas,
        }
    }
}

/// Move `pos` towards `to` by at most `speed`. Returns `true` on arrival.
fn step_towards(pos: &mut WorldPoint, to: WorldPoint, speed: f32) -> bool {
    let dist = pos.distance(to);
    if dist <= speed || dist == 0.0 {
        *pos = to;
        return true;
    }
    let t = speed / dist;
    pos.x += (to.x - pos.x) * t;
    pos.y += (to.y - pos.y) * t;
    false
}

fn clamp(p: WorldPoint, max: WorldPoint) -> WorldPoint {
    WorldPoint::new(p.x.clamp(0.0, max.x), p.y.clamp(0.0, max.y))
}

// ---------------------------------------------------------------------------
// Simulation impl
// ---------------------------------------------------------------------------

impl Simulation for SandboxSim {
    fn step_one_frame(&mut self) {
        let mut report = ApplyReport::default();
        for order in self.orders.drain() {
            if self.apply_order(&order) {
                report.success_count += 1;
            } else {
                report.failed_count += 1;
            }
        }
        self.orders.record_report(report);

        self.advance_timers();
        self.advance_movement();
        self.resolve_combat();
        self.remove_dead();
        self.run_ai();
        self.frame += 1;
    }

    fn current_frame(&self) -> u32 {
        self.frame
    }

    fn map(&self) -> &MapInfo {
        &self.map
    }

    fn query_units(&self, viewer: PlayerId) -> Vec<UnitRecord> {
        let sources = self.sight_sources(viewer);
        self.live_units()
            .map(|u| self.record(u, Self::is_visible(u, viewer, &sources)))
            .collect()
    }

    fn unit(&self, id: UnitId) -> Option<UnitRecord> {
        self.get(id).map(|u| self.record(u, true))
    }

    fn is_alive(&self, id: UnitId) -> bool {
        self.allocator.is_alive(id)
    }

    fn units_in_rect(&self, rect: WorldRect, viewer: PlayerId) -> Vec<UnitRecord> {
        let sources = self.sight_sources(viewer);
        self.live_units()
            .filter(|u| rect.intersects_circle(u.pos, u.kind.radius))
            .filter(|u| Self::is_visible(u, viewer, &sources))
            .map(|u| self.record(u, true))
            .collect()
    }

    fn issue(&mut self, order: Order) -> Result<(), OrderRejection> {
        self.validate(&order)?;
        self.orders.push(order.unit, order.kind, order.issued_by);
        Ok(())
    }

    fn current_order(&self, id: UnitId) -> Option<OrderKind> {
        if let Some(pending) = self.orders.pending_for(id) {
            return Some(pending.clone());
        }
        match self.get(id)?.activity {
            Activity::Idle => None,
            Activity::Moving { to, attack: false } => Some(OrderKind::Move(to)),
            Activity::Moving { to, attack: true } => Some(OrderKind::AttackMove(to)),
            Activity::Patrolling { target, .. } => Some(OrderKind::Patrol(target)),
            Activity::Holding => Some(OrderKind::Hold),
            Activity::Constructing { unit_type, at } => Some(OrderKind::Build { unit_type, at }),
        }
    }

    fn abilities(&self, id: UnitId) -> Vec<AbilityInfo> {
        let Some(unit) = self.get(id) else {
            return Vec::new();
        };
        if !unit.is_complete() {
            return Vec::new();
        }
        unit.kind
            .abilities
            .iter()
            .filter_map(|a| catalog::ability(*a))
            .map(|a| AbilityInfo {
                id: a.id,
                name: a.name.to_owned(),
                energy_cost: a.energy_cost,
                target: a.target,
            })
            .collect()
    }

    fn resources(&self, player: PlayerId) -> Resources {
        let (minerals, gas) = self
            .player(player)
            .map(|p| (p.minerals, p.gas))
            .unwrap_or((0, 0));
        let mut supply_used = 0;
        let mut supply_provided = 0;
        for unit in self.live_units().filter(|u| u.owner == player) {
            supply_used += unit.kind.supply_cost;
            supply_used += unit.queue.iter().map(|p| p.kind.supply_cost).sum::<i32>();
            if unit.is_complete() {
                supply_provided += unit.kind.supply_provided;
            }
        }
        Resources {
            minerals,
            gas,
            supply_used,
            supply_max: supply_provided.min(SUPPLY_CAP),
        }
    }

    fn can_construct(&self, builder: UnitId, unit_type: UnitTypeId) -> bool {
        self.get(builder)
            .is_some_and(|u| u.is_complete() && u.kind.builds.contains(&unit_type))
    }

    fn is_placement_clear(&self, unit_type: UnitTypeId, at: WorldPoint) -> bool {
        self.placement_clear(unit_type, at, None)
    }

    fn can_produce(&self, building: UnitId, unit_type: UnitTypeId) -> bool {
        self.get(building)
            .is_some_and(|u| u.is_complete() && u.kind.trains.contains(&unit_type))
    }

    fn free_production_slots(&self, building: UnitId) -> usize {
        if !self.is_production_building(building) {
            return 0;
        }
        let used = self.get(building).map(|u| u.queue.len()).unwrap_or(0)
            + self.pending_trains(building);
        PRODUCTION_SLOTS.saturating_sub(used)
    }

    fn is_production_building(&self, id: UnitId) -> bool {
        self.get(id)
            .is_some_and(|u| u.is_complete() && !u.kind.trains.is_empty())
    }

    fn outcome(&self, player: PlayerId) -> Option<GameOutcome> {
        if self.contenders.len() < 2 || !self.contenders.contains(&player) {
            return None;
        }
        if !self.has_units(player) {
            return Some(GameOutcome::Defeat);
        }
        let rivals_alive = self
            .contenders
            .iter()
            .any(|p| *p != player && self.has_units(*p));
        if rivals_alive {
            None
        } else {
            Some(GameOutcome::Victory)
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
