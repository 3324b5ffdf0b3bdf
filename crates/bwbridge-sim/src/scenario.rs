//! Scenario (map) files.
//!
//! A scenario is a JSON document describing the map grid, the players and
//! their starting units:
//!
//! ```json
//! {
//!   "name": "Two Bases",
//!   "width": 64, "height": 64, "tileset": 0,
//!   "players": [ { "id": 0, "minerals": 50 }, { "id": 1, "minerals": 50 } ],
//!   "units": [ { "type": "SCV", "owner": 0, "x": 200.0, "y": 240.0 } ]
//! }
//! ```
//!
//! `tiles` is optional; when absent every megatile is index 0.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::types::{MapInfo, PlayerId, Race, UnitTypeId, WorldPoint, TILE_SIZE};
use crate::SimError;

/// Largest accepted map edge, in megatiles.
pub const MAX_MAP_TILES: u16 = 256;

/// Number of tilesets a map may select.
pub const TILESET_COUNT: u8 = 8;

/// A player slot in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSetup {
    pub id: PlayerId,
    #[serde(default)]
    pub race: Race,
    #[serde(default)]
    pub minerals: i32,
    #[serde(default)]
    pub gas: i32,
}

/// A unit placed on the map at game start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Catalog name, e.g. `"Marine"`.
    #[serde(rename = "type")]
    pub unit_type: String,
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
}

/// A complete scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub tileset: u8,
    #[serde(default)]
    pub tiles: Vec<u16>,
    pub players: Vec<PlayerSetup>,
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
}

impl Scenario {
    /// Read and validate a scenario from disk.
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::MapRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a scenario from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, SimError> {
        let scenario: Scenario = serde_json::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check structural consistency.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.width == 0 || self.height == 0 {
            return Err(SimError::InvalidMap("map has zero area".to_owned()));
        }
        if self.width > MAX_MAP_TILES || self.height > MAX_MAP_TILES {
            return Err(SimError::InvalidMap(format!(
                "map {}x{} exceeds {MAX_MAP_TILES}x{MAX_MAP_TILES} tiles",
                self.width, self.height
            )));
        }
        if self.tileset >= TILESET_COUNT {
            return Err(SimError::InvalidMap(format!(
                "tileset {} out of range 0..{TILESET_COUNT}",
                self.tileset
            )));
        }
        let expected_tiles = self.width as usize * self.height as usize;
        if !self.tiles.is_empty() && self.tiles.len() != expected_tiles {
            return Err(SimError::InvalidMap(format!(
                "expected {expected_tiles} tiles, found {}",
                self.tiles.len()
            )));
        }
        if self.players.is_empty() {
            return Err(SimError::InvalidMap("scenario has no players".to_owned()));
        }
        let width_px = self.width as f32 * TILE_SIZE as f32;
        let height_px = self.height as f32 * TILE_SIZE as f32;
        for placement in &self.units {
            if catalog::unit_type_by_name(&placement.unit_type).is_none() {
                return Err(SimError::InvalidMap(format!(
                    "unknown unit type '{}'",
                    placement.unit_type
                )));
            }
            if !placement.owner.is_neutral() && self.player(placement.owner).is_none() {
                return Err(SimError::InvalidMap(format!(
                    "unit '{}' owned by undeclared player {:?}",
                    placement.unit_type, placement.owner
                )));
            }
            if placement.x < 0.0
                || placement.y < 0.0
                || placement.x >= width_px
                || placement.y >= height_px
            {
                return Err(SimError::InvalidMap(format!(
                    "unit '{}' at ({}, {}) lies outside the map",
                    placement.unit_type, placement.x, placement.y
                )));
            }
        }
        Ok(())
    }

    /// The declared player slot with the given id.
    pub fn player(&self, id: PlayerId) -> Option<&PlayerSetup> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Map description handed to the bridge (tiles filled in when omitted).
    pub fn map_info(&self) -> MapInfo {
        let tiles = if self.tiles.is_empty() {
            vec![0; self.width as usize * self.height as usize]
        } else {
            self.tiles.clone()
        };
        MapInfo {
            name: self.name.clone(),
            width_tiles: self.width,
            height_tiles: self.height,
            tileset: self.tileset,
            tiles,
        }
    }

    /// Placements resolved against the catalog.
    pub fn resolved_units(&self) -> impl Iterator<Item = (UnitTypeId, PlayerId, WorldPoint)> + '_ {
        self.units.iter().filter_map(|p| {
            catalog::unit_type_by_name(&p.unit_type)
                .map(|t| (t.id, p.owner, WorldPoint::new(p.x, p.y)))
        })
    }
}
