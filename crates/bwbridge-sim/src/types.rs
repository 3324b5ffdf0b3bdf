//! Plain data exchanged across the simulation boundary.
//!
//! Everything here is a value type: the bridge copies these out of the
//! simulation each frame and never holds references back into it.

use serde::{Deserialize, Serialize};

use crate::unit::UnitId;

/// Size in pixels of one map megatile.
pub const TILE_SIZE: u32 = 32;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A player slot (0..=7 for real players, [`PlayerId::NEUTRAL`] for map
/// features such as mineral fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// The neutral player that owns resources and critters.
    pub const NEUTRAL: PlayerId = PlayerId(11);

    /// Whether this is the neutral player.
    pub fn is_neutral(self) -> bool {
        self == Self::NEUTRAL
    }
}

/// Unit type identifier (catalog key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTypeId(pub u16);

/// Ability (tech) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbilityId(pub u16);

/// Playable races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Race {
    #[default]
    Terran,
    Protoss,
    Zerg,
}

impl Race {
    /// Map the host's integer race code (0 = Terran, 1 = Protoss, 2 = Zerg).
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Race::Terran),
            1 => Some(Race::Protoss),
            2 => Some(Race::Zerg),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point in world (map pixel) space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f32,
    pub y: f32,
}

impl WorldPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: WorldPoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned rectangle in world space. `min` is always the top-left corner
/// after construction through [`WorldRect::from_corners`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldRect {
    pub min: WorldPoint,
    pub max: WorldPoint,
}

impl WorldRect {
    /// Build a normalized rectangle from two arbitrary corners.
    pub fn from_corners(a: WorldPoint, b: WorldPoint) -> Self {
        Self {
            min: WorldPoint::new(a.x.min(b.x), a.y.min(b.y)),
            max: WorldPoint::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Square of half-size `radius` centred on `center`.
    pub fn around(center: WorldPoint, radius: f32) -> Self {
        Self {
            min: WorldPoint::new(center.x - radius, center.y - radius),
            max: WorldPoint::new(center.x + radius, center.y + radius),
        }
    }

    /// Whether a circle at `center` with `radius` overlaps this rectangle.
    pub fn intersects_circle(&self, center: WorldPoint, radius: f32) -> bool {
        let nearest_x = center.x.clamp(self.min.x, self.max.x);
        let nearest_y = center.y.clamp(self.min.y, self.max.y);
        let dx = center.x - nearest_x;
        let dy = center.y - nearest_y;
        dx * dx + dy * dy <= radius * radius
    }

    pub fn contains(&self, p: WorldPoint) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

// ---------------------------------------------------------------------------
// Unit records
// ---------------------------------------------------------------------------

/// Capability flags reported for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitFlags {
    pub is_building: bool,
    pub is_worker: bool,
    pub can_attack: bool,
    pub can_move: bool,
    /// Invincible units (resources, map doodads) never show status bars.
    pub invincible: bool,
}

/// One unit as the simulation reports it to a viewing player.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    pub id: UnitId,
    pub type_id: UnitTypeId,
    pub type_name: String,
    pub owner: PlayerId,
    pub position: WorldPoint,
    /// Radius of the unit's bounding circle in world pixels.
    pub radius: f32,
    pub health: i32,
    pub max_health: i32,
    pub shields: i32,
    pub max_shields: i32,
    pub energy: i32,
    pub max_energy: i32,
    pub flags: UnitFlags,
    /// Whether the viewing player can currently see the unit (fog of war).
    pub visible: bool,
}

/// Economy totals for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resources {
    pub minerals: i32,
    pub gas: i32,
    pub supply_used: i32,
    pub supply_max: i32,
}

// ---------------------------------------------------------------------------
// Abilities
// ---------------------------------------------------------------------------

/// What an ability must be aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    None,
    Ground,
    Unit,
}

impl TargetKind {
    /// Host-facing integer code (0 = none, 1 = ground, 2 = unit).
    pub fn code(self) -> i32 {
        match self {
            TargetKind::None => 0,
            TargetKind::Ground => 1,
            TargetKind::Unit => 2,
        }
    }

    pub fn needs_target(self) -> bool {
        self != TargetKind::None
    }
}

/// An ability a unit currently possesses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityInfo {
    pub id: AbilityId,
    pub name: String,
    pub energy_cost: i32,
    pub target: TargetKind,
}

// ---------------------------------------------------------------------------
// Map / outcome
// ---------------------------------------------------------------------------

/// Static description of the loaded map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapInfo {
    pub name: String,
    pub width_tiles: u16,
    pub height_tiles: u16,
    /// Tileset selector (0..=7).
    pub tileset: u8,
    /// Megatile indices, row-major, `width_tiles * height_tiles` entries.
    pub tiles: Vec<u16>,
}

impl MapInfo {
    pub fn width_px(&self) -> u32 {
        self.width_tiles as u32 * TILE_SIZE
    }

    pub fn height_px(&self) -> u32 {
        self.height_tiles as u32 * TILE_SIZE
    }
}

/// End-of-game result for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOutcome {
    Victory,
    Defeat,
}
