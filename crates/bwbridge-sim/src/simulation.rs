//! The stepped-simulation boundary.
//!
//! The bridge treats the simulation engine as a black box behind the
//! [`Simulation`] trait: it can be stepped one frame, queried for units,
//! resources and abilities, and handed validated [`Order`]s. Engines are
//! created by a [`SimulationLoader`] from a [`GameSetup`].

use std::any::Any;
use std::path::PathBuf;

use crate::command::{Order, OrderKind, OrderRejection};
use crate::types::{
    AbilityInfo, GameOutcome, MapInfo, PlayerId, Race, Resources, UnitRecord, UnitTypeId,
    WorldPoint, WorldRect,
};
use crate::unit::UnitId;
use crate::SimError;

/// Parameters for creating a new game session.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSetup {
    pub map_path: PathBuf,
    /// The player the host controls and views the game as.
    pub local_player: PlayerId,
    pub race: Race,
    /// 0 disables computer opponents; higher values make them more aggressive.
    pub ai_difficulty: u8,
}

/// A stepped simulation engine.
///
/// Implementations own all game state. Every query returns owned values so
/// callers never hold references into the engine across a step.
pub trait Simulation: Any {
    /// Advance the simulation by exactly one frame.
    fn step_one_frame(&mut self);

    /// Number of frames stepped since the game started.
    fn current_frame(&self) -> u32;

    /// The loaded map.
    fn map(&self) -> &MapInfo;

    /// Every live unit, with its visibility to `viewer` filled in.
    fn query_units(&self, viewer: PlayerId) -> Vec<UnitRecord>;

    /// A single live unit regardless of visibility.
    fn unit(&self, id: UnitId) -> Option<UnitRecord>;

    fn is_alive(&self, id: UnitId) -> bool;

    /// Units visible to `viewer` whose bounding circle intersects `rect`.
    fn units_in_rect(&self, rect: WorldRect, viewer: PlayerId) -> Vec<UnitRecord>;

    /// Accept an order, or explain why it cannot be carried out.
    fn issue(&mut self, order: Order) -> Result<(), OrderRejection>;

    /// The order the unit is executing, or the pending one if a newer order
    /// is buffered for the next frame.
    fn current_order(&self, id: UnitId) -> Option<OrderKind>;

    /// Abilities the unit possesses right now.
    fn abilities(&self, id: UnitId) -> Vec<AbilityInfo>;

    fn resources(&self, player: PlayerId) -> Resources;

    /// Whether `builder` is able to construct structures of `unit_type`.
    fn can_construct(&self, builder: UnitId, unit_type: UnitTypeId) -> bool;

    /// Whether a structure of `unit_type` centred on `at` fits without overlap.
    fn is_placement_clear(&self, unit_type: UnitTypeId, at: WorldPoint) -> bool;

    /// Whether `building` is able to train `unit_type`.
    fn can_produce(&self, building: UnitId, unit_type: UnitTypeId) -> bool;

    /// Free production queue slots of `building` (0 for non-producers).
    fn free_production_slots(&self, building: UnitId) -> usize;

    /// Whether the unit is a completed structure that trains units.
    fn is_production_building(&self, id: UnitId) -> bool;

    /// The result of the game for `player`, once decided.
    fn outcome(&self, player: PlayerId) -> Option<GameOutcome>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Creates simulations for new sessions.
pub trait SimulationLoader {
    fn load(&self, setup: &GameSetup) -> Result<Box<dyn Simulation>, SimError>;
}
