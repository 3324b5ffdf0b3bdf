//! Minimap generation.

use serde::{Deserialize, Serialize};

use crate::palette::{Palette, PlayerColors};
use crate::tileset::{Megatiles, MEGATILE_SIZE};

/// One unit marker on the minimap, in world pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinimapDot {
    pub x: f32,
    pub y: f32,
    pub owner: u8,
}

/// An owned RGBA minimap image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimapImage {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, row-major.
    pub rgba: Vec<u8>,
}

impl MinimapImage {
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            rgba: Vec::new(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]])
    }

    fn put(&mut self, x: i64, y: i64, rgba: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba[i..i + 4].copy_from_slice(&rgba);
    }
}

/// Render a minimap whose longer edge is `size` pixels.
///
/// Each minimap pixel takes the colour of the centre pixel of the megatile
/// under it; unit dots are 2 x 2 pixels in the owner's primary colour.
#[allow(clippy::too_many_arguments)]
pub fn render(
    tiles: &[u16],
    width_tiles: u16,
    height_tiles: u16,
    megatiles: Option<&Megatiles>,
    palette: &Palette,
    colors: &PlayerColors,
    dots: &[MinimapDot],
    size: u32,
) -> MinimapImage {
    if width_tiles == 0 || height_tiles == 0 || size == 0 {
        return MinimapImage::empty();
    }
    let longest = width_tiles.max(height_tiles) as u32;
    let width = (size * width_tiles as u32 / longest).max(1);
    let height = (size * height_tiles as u32 / longest).max(1);
    let mut image = MinimapImage {
        width,
        height,
        rgba: vec![0; width as usize * height as usize * 4],
    };

    let centre = (MEGATILE_SIZE / 2) * MEGATILE_SIZE + MEGATILE_SIZE / 2;
    for my in 0..height {
        let ty = (my * height_tiles as u32 / height) as usize;
        for mx in 0..width {
            let tx = (mx * width_tiles as u32 / width) as usize;
            let tile = tiles
                .get(ty * width_tiles as usize + tx)
                .copied()
                .unwrap_or(0);
            let index = megatiles
                .and_then(|m| m.tile(tile))
                .map(|pixels| pixels[centre])
                .unwrap_or(0);
            image.put(mx as i64, my as i64, palette.rgba(index));
        }
    }

    let world_w = width_tiles as f32 * MEGATILE_SIZE as f32;
    let world_h = height_tiles as f32 * MEGATILE_SIZE as f32;
    for dot in dots {
        let x = (dot.x / world_w * width as f32) as i64;
        let y = (dot.y / world_h * height as f32) as i64;
        let rgba = palette.rgba(colors.primary(dot.owner));
        for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            image.put(x + dx, y + dy, rgba);
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tileset::MEGATILE_BYTES;

    #[test]
    fn keeps_aspect_ratio() {
        let img = render(
            &[0; 8],
            4,
            2,
            None,
            &Palette::grayscale(),
            &PlayerColors::default(),
            &[],
            128,
        );
        assert_eq!((img.width, img.height), (128, 64));
        assert_eq!(img.rgba.len(), 128 * 64 * 4);
    }

    #[test]
    fn tiles_and_dots_are_coloured() {
        let mega = Megatiles::from_bytes("m", vec![200; MEGATILE_BYTES]).unwrap();
        let palette = Palette::grayscale();
        let colors = PlayerColors::default();
        let dots = [MinimapDot {
            x: 0.0,
            y: 0.0,
            owner: 0,
        }];
        let img = render(&[0; 4], 2, 2, Some(&mega), &palette, &colors, &dots, 16);
        assert_eq!(img.pixel(10, 10), Some([200, 200, 200, 255]));
        assert_eq!(img.pixel(0, 0), Some(palette.rgba(colors.primary(0))));
    }

    #[test]
    fn empty_map_gives_empty_image() {
        let img = render(
            &[],
            0,
            0,
            None,
            &Palette::grayscale(),
            &PlayerColors::default(),
            &[],
            64,
        );
        assert_eq!(img, MinimapImage::empty());
    }
}
