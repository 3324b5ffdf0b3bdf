//! Palettes, player colour tables and the shadow lookup table.

use crate::RenderError;

/// Number of entries in a palette.
pub const PALETTE_SIZE: usize = 256;

/// Size in bytes of a `.wpe` palette file (RGB plus one unused byte per entry).
pub const WPE_SIZE: usize = PALETTE_SIZE * 4;

/// First and last palette index remapped to the owning player's colours.
pub const PLAYER_COLOR_FIRST: u8 = 8;
pub const PLAYER_COLOR_LAST: u8 = 15;

/// Number of player colour rows in a player-colour table.
pub const PLAYER_COLOR_ROWS: usize = 16;

/// Size in bytes of a `tunit.dat` player-colour table.
pub const TUNIT_SIZE: usize = PLAYER_COLOR_ROWS * 8;

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

/// 256 RGBA colours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [[u8; 4]; PALETTE_SIZE],
}

impl Palette {
    /// Parse a `.wpe` palette. Alpha is forced to opaque.
    pub fn from_wpe(name: &str, bytes: &[u8]) -> Result<Self, RenderError> {
        if bytes.len() != WPE_SIZE {
            return Err(RenderError::MalformedAsset {
                name: name.to_owned(),
                reason: format!("expected {WPE_SIZE} bytes, found {}", bytes.len()),
            });
        }
        let mut entries = [[0u8; 4]; PALETTE_SIZE];
        for (entry, chunk) in entries.iter_mut().zip(bytes.chunks_exact(4)) {
            *entry = [chunk[0], chunk[1], chunk[2], 255];
        }
        Ok(Self { entries })
    }

    /// A ramp from black to white, used before any palette is loaded.
    pub fn grayscale() -> Self {
        let mut entries = [[0u8; 4]; PALETTE_SIZE];
        for (i, entry) in entries.iter_mut().enumerate() {
            let v = i as u8;
            *entry = [v, v, v, 255];
        }
        Self { entries }
    }

    pub fn rgba(&self, index: u8) -> [u8; 4] {
        self.entries[index as usize]
    }

    pub fn entries(&self) -> &[[u8; 4]; PALETTE_SIZE] {
        &self.entries
    }

    /// Entries flattened to `RGBARGBA...` bytes.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.entries.iter().flatten().copied().collect()
    }

    /// Index of the entry closest to `rgb` (squared distance), skipping 0.
    pub fn nearest(&self, rgb: [u8; 3]) -> u8 {
        let mut best = 1u8;
        let mut best_dist = u32::MAX;
        for (i, e) in self.entries.iter().enumerate().skip(1) {
            let d = (0..3)
                .map(|c| {
                    let diff = e[c] as i32 - rgb[c] as i32;
                    (diff * diff) as u32
                })
                .sum::<u32>();
            if d < best_dist {
                best_dist = d;
                best = i as u8;
            }
        }
        best
    }

    /// Expand indexed pixels to RGBA into `out` (resized as needed).
    pub fn expand(&self, indices: &[u8], out: &mut Vec<u8>) {
        out.clear();
        out.reserve(indices.len() * 4);
        for &i in indices {
            out.extend_from_slice(&self.entries[i as usize]);
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::grayscale()
    }
}

// ---------------------------------------------------------------------------
// ShadowTable
// ---------------------------------------------------------------------------

/// Maps every palette index to the index that looks like it at half brightness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowTable([u8; PALETTE_SIZE]);

impl ShadowTable {
    pub fn from_palette(palette: &Palette) -> Self {
        let mut table = [0u8; PALETTE_SIZE];
        for (i, slot) in table.iter_mut().enumerate().skip(1) {
            let [r, g, b, _] = palette.rgba(i as u8);
            *slot = palette.nearest([r / 2, g / 2, b / 2]);
        }
        Self(table)
    }

    pub fn darken(&self, index: u8) -> u8 {
        self.0[index as usize]
    }
}

impl Default for ShadowTable {
    fn default() -> Self {
        Self::from_palette(&Palette::grayscale())
    }
}

// ---------------------------------------------------------------------------
// PlayerColors
// ---------------------------------------------------------------------------

/// Built-in player colour rows used when no `tunit.dat` is available.
const DEFAULT_PLAYER_COLORS: [[u8; 8]; PLAYER_COLOR_ROWS] = [
    [111, 168, 167, 166, 165, 164, 163, 162], // red
    [165, 161, 160, 159, 158, 157, 156, 155], // blue
    [159, 135, 134, 133, 132, 131, 130, 129], // teal
    [164, 180, 179, 178, 177, 176, 175, 174], // purple
    [179, 150, 149, 148, 147, 146, 145, 144], // orange
    [19, 110, 109, 108, 107, 106, 105, 104],  // brown
    [84, 250, 249, 248, 247, 246, 245, 244],  // white
    [135, 200, 199, 198, 197, 196, 195, 194], // yellow
    [185, 117, 116, 115, 114, 113, 112, 111], // green
    [136, 91, 90, 89, 88, 87, 86, 85],        // pale yellow
    [134, 62, 61, 60, 59, 58, 57, 56],        // tan
    [51, 42, 41, 40, 39, 38, 37, 36],         // neutral
    [94, 33, 32, 31, 30, 29, 28, 27],
    [122, 126, 125, 124, 123, 122, 121, 120],
    [68, 73, 72, 71, 70, 69, 68, 67],
    [233, 238, 237, 236, 235, 234, 233, 232],
];

/// Per-player remap rows for palette indices 8..=15.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerColors {
    rows: [[u8; 8]; PLAYER_COLOR_ROWS],
}

impl PlayerColors {
    /// Parse a `tunit.dat` table: 16 rows of 8 palette indices.
    pub fn from_tunit(bytes: &[u8]) -> Result<Self, RenderError> {
        if bytes.len() != TUNIT_SIZE {
            return Err(RenderError::MalformedAsset {
                name: "tunit.dat".to_owned(),
                reason: format!("expected {TUNIT_SIZE} bytes, found {}", bytes.len()),
            });
        }
        let mut rows = [[0u8; 8]; PLAYER_COLOR_ROWS];
        for (row, chunk) in rows.iter_mut().zip(bytes.chunks_exact(8)) {
            row.copy_from_slice(chunk);
        }
        Ok(Self { rows })
    }

    /// Remap a source pixel for the given player colour row.
    ///
    /// Indices outside 8..=15 pass through unchanged, as do unknown rows.
    pub fn remap(&self, player: u8, index: u8) -> u8 {
        if !(PLAYER_COLOR_FIRST..=PLAYER_COLOR_LAST).contains(&index) {
            return index;
        }
        match self.rows.get(player as usize) {
            Some(row) => row[(index - PLAYER_COLOR_FIRST) as usize],
            None => index,
        }
    }

    /// The representative colour of a player (minimap dots, legacy boxes).
    pub fn primary(&self, player: u8) -> u8 {
        self.rows
            .get(player as usize % PLAYER_COLOR_ROWS)
            .map(|row| row[0])
            .unwrap_or(PLAYER_COLOR_FIRST)
    }
}

impl Default for PlayerColors {
    fn default() -> Self {
        Self {
            rows: DEFAULT_PLAYER_COLORS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wpe_with(entries: &[(usize, [u8; 3])]) -> Vec<u8> {
        let mut bytes = vec![0u8; WPE_SIZE];
        for (i, rgb) in entries {
            bytes[i * 4..i * 4 + 3].copy_from_slice(rgb);
        }
        bytes
    }

    #[test]
    fn wpe_must_be_exactly_1024_bytes() {
        assert!(Palette::from_wpe("x.wpe", &[0; 10]).is_err());
        assert!(Palette::from_wpe("x.wpe", &[0; WPE_SIZE]).is_ok());
    }

    #[test]
    fn wpe_alpha_is_opaque() {
        let p = Palette::from_wpe("x.wpe", &wpe_with(&[(3, [10, 20, 30])])).unwrap();
        assert_eq!(p.rgba(3), [10, 20, 30, 255]);
    }

    #[test]
    fn shadow_maps_to_half_brightness() {
        let p = Palette::from_wpe(
            "x.wpe",
            &wpe_with(&[(1, [200, 200, 200]), (2, [100, 100, 100]), (3, [250, 0, 0])]),
        )
        .unwrap();
        let shadow = ShadowTable::from_palette(&p);
        assert_eq!(shadow.darken(1), 2);
        assert_eq!(shadow.darken(0), 0);
    }

    #[test]
    fn remap_only_touches_player_range() {
        let colors = PlayerColors::default();
        assert_eq!(colors.remap(0, 7), 7);
        assert_eq!(colors.remap(0, 16), 16);
        assert_eq!(colors.remap(0, 8), DEFAULT_PLAYER_COLORS[0][0]);
        assert_eq!(colors.remap(1, 15), DEFAULT_PLAYER_COLORS[1][7]);
        assert_eq!(colors.remap(200, 9), 9);
    }

    #[test]
    fn tunit_rows_are_read_in_order() {
        let bytes: Vec<u8> = (0..TUNIT_SIZE as u8).collect();
        let colors = PlayerColors::from_tunit(&bytes).unwrap();
        assert_eq!(colors.remap(2, 8), 16);
        assert_eq!(colors.remap(2, 15), 23);
        assert!(PlayerColors::from_tunit(&bytes[..100]).is_err());
    }

    #[test]
    fn expand_writes_four_bytes_per_pixel() {
        let p = Palette::grayscale();
        let mut out = Vec::new();
        p.expand(&[0, 128, 255], &mut out);
        assert_eq!(out, vec![0, 0, 0, 255, 128, 128, 128, 255, 255, 255, 255, 255]);
    }
}
