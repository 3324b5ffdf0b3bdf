//! Tileset data: one palette and one megatile set per terrain type.

use crate::palette::Palette;
use crate::RenderError;

/// Edge length of a megatile in pixels.
pub const MEGATILE_SIZE: usize = 32;

/// Bytes per megatile (32 x 32 palette indices).
pub const MEGATILE_BYTES: usize = MEGATILE_SIZE * MEGATILE_SIZE;

/// Terrain names in tileset-index order.
pub const TILESET_NAMES: [&str; 8] = [
    "badlands", "platform", "install", "ashworld", "jungle", "desert", "ice", "twilight",
];

/// Canonical asset path of a tileset's palette.
pub fn palette_path(index: usize) -> String {
    format!("tileset/{}.wpe", TILESET_NAMES[index])
}

/// Canonical asset path of a tileset's megatile set.
pub fn megatile_path(index: usize) -> String {
    format!("tileset/{}.mega", TILESET_NAMES[index])
}

/// Pre-composed 32 x 32 megatiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Megatiles {
    data: Vec<u8>,
}

impl Megatiles {
    pub fn from_bytes(name: &str, data: Vec<u8>) -> Result<Self, RenderError> {
        if data.is_empty() || data.len() % MEGATILE_BYTES != 0 {
            return Err(RenderError::MalformedAsset {
                name: name.to_owned(),
                reason: format!(
                    "size {} is not a positive multiple of {MEGATILE_BYTES}",
                    data.len()
                ),
            });
        }
        Ok(Self { data })
    }

    pub fn count(&self) -> usize {
        self.data.len() / MEGATILE_BYTES
    }

    /// Pixels of megatile `index`, row-major, or `None` if out of range.
    pub fn tile(&self, index: u16) -> Option<&[u8]> {
        let start = index as usize * MEGATILE_BYTES;
        self.data.get(start..start + MEGATILE_BYTES)
    }
}

/// Everything the compositor needs for one terrain type.
#[derive(Debug, Clone)]
pub struct Tileset {
    pub palette: Palette,
    pub megatiles: Megatiles,
}
