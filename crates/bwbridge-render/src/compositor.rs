//! The frame compositor.
//!
//! Turns tiles, sprites and overlays into the indexed [`Framebuffer`]. The
//! compositor is a small state machine:
//!
//! ```text
//! Uninitialized --load_image_data--> Ready --render--> Rendering --> Ready
//! ```
//!
//! Rendering while uninitialized clears the framebuffer to index 0 and does
//! nothing else. [`Compositor::render_test_pattern`] works in every state.
//!
//! Paint order within a frame:
//!
//! 1. Clear to 0.
//! 2. Megatiles, row-major, clipped to the map and the framebuffer.
//! 3. Sprites in the order supplied, images in listed order (or legacy boxes).
//! 4. Selection circles, then status bars, for selected sprites.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assets::{AssetSource, DirectoryAssets, PLAYER_COLORS_PATH};
use crate::frames::{Frame, FrameHandle, FrameTable};
use crate::framebuffer::Framebuffer;
use crate::minimap::{self, MinimapDot, MinimapImage};
use crate::palette::{Palette, PlayerColors, ShadowTable};
use crate::sprite::{
    ImageDescriptor, ImageModifier, LegacyUnit, Relation, SelectionCircle, SpriteDescriptor,
    StatusBars, SELECTION_CIRCLE_SIZES,
};
use crate::tileset::{
    megatile_path, palette_path, Megatiles, Tileset, MEGATILE_SIZE, TILESET_NAMES,
};
use crate::RenderError;

/// Widths in pixels of the ten selection-circle sizes.
pub const CIRCLE_WIDTHS: [i32; SELECTION_CIRCLE_SIZES] =
    [22, 32, 48, 62, 72, 94, 110, 122, 146, 224];

pub const COLOR_OWN: u8 = 117;
pub const COLOR_ENEMY: u8 = 111;
pub const COLOR_NEUTRAL: u8 = 135;
pub const COLOR_HP: u8 = 117;
pub const COLOR_SHIELDS: u8 = 165;
pub const COLOR_ENERGY: u8 = 164;
pub const COLOR_BAR_EMPTY: u8 = 1;
pub const COLOR_MAP_EDGE: u8 = 255;

/// Height of one status bar row in pixels.
pub const BAR_HEIGHT: i32 = 2;

fn relation_color(relation: Relation) -> u8 {
    match relation {
        Relation::Own => COLOR_OWN,
        Relation::Enemy => COLOR_ENEMY,
        Relation::Neutral => COLOR_NEUTRAL,
    }
}

/// Lifecycle of the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorState {
    Uninitialized,
    Ready,
    Rendering,
}

/// Which description of the units is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStrategy {
    /// Full sprites with images, circles and status bars.
    #[default]
    Sprites,
    /// One coloured box per unit.
    Legacy,
}

/// Composes frames into an indexed framebuffer.
pub struct Compositor {
    framebuffer: Framebuffer,
    state: CompositorState,
    tilesets: Vec<Option<Tileset>>,
    active_tileset: usize,
    palette: Palette,
    shadow: ShadowTable,
    player_colors: PlayerColors,
    tiles: Vec<u16>,
    map_width_tiles: u16,
    map_height_tiles: u16,
    frames: FrameTable,
    sprites: Vec<SpriteDescriptor>,
    selected: Vec<bool>,
    legacy: Vec<LegacyUnit>,
    selection_circles: [Option<FrameHandle>; SELECTION_CIRCLE_SIZES],
    strategy: RenderStrategy,
}

impl Compositor {
    /// A compositor with a `width` x `height` framebuffer and no assets.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            framebuffer: Framebuffer::new(width, height),
            state: CompositorState::Uninitialized,
            tilesets: vec![None; TILESET_NAMES.len()],
            active_tileset: 0,
            palette: Palette::grayscale(),
            shadow: ShadowTable::default(),
            player_colors: PlayerColors::default(),
            tiles: Vec::new(),
            map_width_tiles: 0,
            map_height_tiles: 0,
            frames: FrameTable::new(),
            sprites: Vec::new(),
            selected: Vec::new(),
            legacy: Vec::new(),
            selection_circles: [None; SELECTION_CIRCLE_SIZES],
            strategy: RenderStrategy::default(),
        }
    }

    pub fn state(&self) -> CompositorState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state != CompositorState::Uninitialized
    }

    // -- asset loading ------------------------------------------------------

    /// Load image data from a directory of loose asset files.
    pub fn load_image_data_from_path(&mut self, path: &Path) -> Result<usize, RenderError> {
        let source = DirectoryAssets::new(path)?;
        self.load_image_data(&source)
    }

    /// Load every tileset `source` provides plus the player-colour table.
    ///
    /// Returns the number of tilesets loaded. On error the compositor keeps
    /// its previous state.
    ///
    /// # Errors
    ///
    /// [`RenderError::NoTileset`] when no complete tileset exists, and
    /// [`RenderError::MalformedAsset`] when a present file has the wrong size.
    pub fn load_image_data(&mut self, source: &dyn AssetSource) -> Result<usize, RenderError> {
        let mut tilesets: Vec<Option<Tileset>> = vec![None; TILESET_NAMES.len()];
        let mut loaded = 0;
        for (index, slot) in tilesets.iter_mut().enumerate() {
            let wpe_path = palette_path(index);
            let mega_path = megatile_path(index);
            let (Some(wpe), Some(mega)) = (source.resolve(&wpe_path), source.resolve(&mega_path))
            else {
                continue;
            };
            *slot = Some(Tileset {
                palette: Palette::from_wpe(&wpe_path, &wpe)?,
                megatiles: Megatiles::from_bytes(&mega_path, mega)?,
            });
            loaded += 1;
        }
        if loaded == 0 {
            return Err(RenderError::NoTileset);
        }

        let player_colors = match source.resolve(PLAYER_COLORS_PATH) {
            Some(bytes) => PlayerColors::from_tunit(&bytes)?,
            None => {
                tracing::debug!("no player colour table found, using built-in colours");
                PlayerColors::default()
            }
        };

        if tilesets[self.active_tileset].is_none() {
            self.active_tileset = tilesets.iter().position(Option::is_some).unwrap_or(0);
        }
        self.tilesets = tilesets;
        self.player_colors = player_colors;
        self.apply_active_palette();
        self.state = CompositorState::Ready;

        tracing::info!(
            tilesets = loaded,
            active = TILESET_NAMES[self.active_tileset],
            "image data loaded"
        );
        Ok(loaded)
    }

    fn apply_active_palette(&mut self) {
        if let Some(ts) = self.tilesets.get(self.active_tileset).and_then(Option::as_ref) {
            self.palette = ts.palette.clone();
            self.shadow = ShadowTable::from_palette(&self.palette);
        }
    }

    /// Switch the active tileset (palette and megatiles).
    ///
    /// Before image data is loaded the index is remembered and applied by the
    /// next load.
    pub fn set_tileset_index(&mut self, index: u8) -> Result<(), RenderError> {
        let i = index as usize;
        if i >= TILESET_NAMES.len() {
            return Err(RenderError::InvalidTileset(index));
        }
        if self.is_ready() && self.tilesets[i].is_none() {
            return Err(RenderError::InvalidTileset(index));
        }
        self.active_tileset = i;
        self.apply_active_palette();
        Ok(())
    }

    pub fn tileset_index(&self) -> u8 {
        self.active_tileset as u8
    }

    // -- per-map and per-frame inputs ----------------------------------------

    /// Set the megatile grid of the current map.
    ///
    /// A tile slice of the wrong length is padded or truncated to
    /// `width * height`.
    pub fn set_map_tiles(&mut self, tiles: &[u16], width: u16, height: u16) {
        let count = width as usize * height as usize;
        if tiles.len() != count {
            tracing::warn!(
                expected = count,
                found = tiles.len(),
                "map tile count mismatch, padding"
            );
        }
        self.tiles = tiles.iter().copied().take(count).collect();
        self.tiles.resize(count, 0);
        self.map_width_tiles = width;
        self.map_height_tiles = height;
    }

    /// Replace the sprite list. `selected[i]` marks sprite `i` as selected;
    /// missing entries count as unselected.
    pub fn set_sprites(&mut self, sprites: Vec<SpriteDescriptor>, selected: Vec<bool>) {
        self.sprites = sprites;
        self.selected = selected;
    }

    /// Replace the legacy unit list.
    pub fn set_units(&mut self, units: Vec<LegacyUnit>) {
        self.legacy = units;
    }

    /// Frames used for the ten selection-circle sizes. Sizes without a frame
    /// are drawn as plain ellipses.
    pub fn set_selection_circles(&mut self, frames: [Option<FrameHandle>; SELECTION_CIRCLE_SIZES]) {
        self.selection_circles = frames;
    }

    /// Switch strategy, discarding the inputs of the one being left.
    pub fn set_strategy(&mut self, strategy: RenderStrategy) {
        if strategy == self.strategy {
            return;
        }
        match strategy {
            RenderStrategy::Sprites => self.legacy.clear(),
            RenderStrategy::Legacy => {
                self.sprites.clear();
                self.selected.clear();
            }
        }
        tracing::debug!(?strategy, "render strategy changed");
        self.strategy = strategy;
    }

    pub fn strategy(&self) -> RenderStrategy {
        self.strategy
    }

    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut FrameTable {
        &mut self.frames
    }

    /// Register a decoded frame.
    pub fn add_frame(&mut self, frame: Frame) -> FrameHandle {
        self.frames.insert(frame)
    }

    /// Drop per-map and per-frame inputs and blank the framebuffer. Loaded
    /// assets and frames stay.
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.map_width_tiles = 0;
        self.map_height_tiles = 0;
        self.sprites.clear();
        self.selected.clear();
        self.legacy.clear();
        self.framebuffer.clear(0);
    }

    // -- outputs ------------------------------------------------------------

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// The active palette (grayscale before any load).
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn player_colors(&self) -> &PlayerColors {
        &self.player_colors
    }

    pub fn shadow_table(&self) -> &ShadowTable {
        &self.shadow
    }

    /// Minimap of the current map with one dot per entry of `dots`.
    pub fn minimap(&self, dots: &[MinimapDot], size: u32) -> MinimapImage {
        minimap::render(
            &self.tiles,
            self.map_width_tiles,
            self.map_height_tiles,
            self.active_megatiles(),
            &self.palette,
            &self.player_colors,
            dots,
            size,
        )
    }

    fn active_megatiles(&self) -> Option<&Megatiles> {
        self.tilesets
            .get(self.active_tileset)
            .and_then(Option::as_ref)
            .map(|ts| &ts.megatiles)
    }

    // -- rendering ----------------------------------------------------------

    /// Compose one frame.
    ///
    /// `camera_x`/`camera_y` is the world position of the framebuffer's
    /// top-left pixel; `map_width`/`map_height` are the map size in pixels.
    pub fn render(&mut self, camera_x: i32, camera_y: i32, map_width: u32, map_height: u32) {
        self.framebuffer.clear(0);
        if self.state == CompositorState::Uninitialized {
            return;
        }
        self.state = CompositorState::Rendering;

        self.paint_tiles(camera_x, camera_y, map_width, map_height);
        match self.strategy {
            RenderStrategy::Sprites => {
                for sprite in &self.sprites {
                    for image in &sprite.images {
                        blit(
                            &mut self.framebuffer,
                            &self.frames,
                            image,
                            &self.player_colors,
                            &self.shadow,
                        );
                    }
                }
                for (sprite, _) in self
                    .sprites
                    .iter()
                    .zip(self.selected.iter())
                    .filter(|(_, selected)| **selected)
                {
                    if let Some(circle) = sprite.selection_circle {
                        draw_selection_circle(
                            &mut self.framebuffer,
                            &self.frames,
                            &self.selection_circles,
                            sprite,
                            circle,
                        );
                    }
                    if let Some(bars) = sprite.status_bars {
                        draw_status_bars(&mut self.framebuffer, sprite, &bars);
                    }
                }
            }
            RenderStrategy::Legacy => {
                for unit in &self.legacy {
                    let color = self.player_colors.primary(unit.owner);
                    let left = unit.x.saturating_sub(unit.width / 2);
                    let top = unit.y.saturating_sub(unit.height / 2);
                    self.framebuffer
                        .fill_rect(left, top, unit.width, unit.height, color);
                    if unit.selected {
                        self.framebuffer.stroke_rect(
                            left.saturating_sub(1),
                            top.saturating_sub(1),
                            unit.width.saturating_add(2),
                            unit.height.saturating_add(2),
                            relation_color(unit.relation),
                        );
                    }
                }
            }
        }

        self.state = CompositorState::Ready;
    }

    fn paint_tiles(&mut self, camera_x: i32, camera_y: i32, map_width: u32, map_height: u32) {
        let Some(megatiles) = self
            .tilesets
            .get(self.active_tileset)
            .and_then(Option::as_ref)
            .map(|ts| &ts.megatiles)
        else {
            return;
        };
        // World coordinates are i64 so far-away cameras cannot overflow.
        let tile = MEGATILE_SIZE as i64;
        let (camera_x, camera_y) = (i64::from(camera_x), i64::from(camera_y));
        let map_w = i64::from(map_width).min(i64::from(self.map_width_tiles) * tile);
        let map_h = i64::from(map_height).min(i64::from(self.map_height_tiles) * tile);
        let fb_w = i64::from(self.framebuffer.width());
        let fb_h = self.framebuffer.height() as i32;

        // Visible screen columns that land inside the map.
        let start_x = (-camera_x).max(0);
        let end_x = (map_w - camera_x).min(fb_w);
        if start_x >= end_x {
            return;
        }

        for sy in 0..fb_h {
            let wy = i64::from(sy) + camera_y;
            if wy < 0 || wy >= map_h {
                continue;
            }
            let ty = (wy / tile) as usize;
            let py = (wy % tile) as usize;
            let tile_row = ty * self.map_width_tiles as usize;
            let Some(row) = self.framebuffer.row_mut(sy) else {
                continue;
            };

            let mut sx = start_x;
            while sx < end_x {
                let wx = sx + camera_x;
                let tx = (wx / tile) as usize;
                let px = (wx % tile) as usize;
                let run = ((tile - px as i64).min(end_x - sx)) as usize;
                let index = self.tiles.get(tile_row + tx).copied().unwrap_or(0);
                if let Some(pixels) = megatiles.tile(index) {
                    let src = py * MEGATILE_SIZE + px;
                    row[sx as usize..sx as usize + run].copy_from_slice(&pixels[src..src + run]);
                }
                sx += run as i64;
            }
        }
    }

    /// Diagonal palette stripes inside the map, index 255 on its edges, 0
    /// outside. Works before any asset is loaded.
    pub fn render_test_pattern(
        &mut self,
        camera_x: i32,
        camera_y: i32,
        map_width: u32,
        map_height: u32,
    ) {
        let map_w = i64::from(map_width);
        let map_h = i64::from(map_height);
        let fb_w = self.framebuffer.width() as usize;
        let fb_h = self.framebuffer.height() as i32;
        for sy in 0..fb_h {
            let wy = i64::from(sy) + i64::from(camera_y);
            let Some(row) = self.framebuffer.row_mut(sy) else {
                continue;
            };
            for (sx, px) in row.iter_mut().enumerate().take(fb_w) {
                let wx = sx as i64 + i64::from(camera_x);
                *px = if wx < 0 || wy < 0 || wx >= map_w || wy >= map_h {
                    0
                } else if wx == 0 || wy == 0 || wx == map_w - 1 || wy == map_h - 1 {
                    COLOR_MAP_EDGE
                } else {
                    1 + ((wx + wy) / 16 % 254) as u8
                };
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Painting helpers
// ---------------------------------------------------------------------------

fn blit(
    fb: &mut Framebuffer,
    frames: &FrameTable,
    image: &ImageDescriptor,
    colors: &PlayerColors,
    shadow: &ShadowTable,
) {
    let Some(frame) = frames.get(image.frame) else {
        return;
    };
    let w = image.width.min(frame.width) as i32;
    let h = image.height.min(frame.height) as i32;
    let fb_w = fb.width() as i32;

    for fy in 0..h {
        let Some(row) = fb.row_mut(image.y.saturating_add(fy)) else {
            continue;
        };
        for fx in 0..w {
            let sx = image.x.saturating_add(fx);
            if sx < 0 || sx >= fb_w {
                continue;
            }
            let src_x = if image.flipped {
                frame.width as i32 - 1 - fx
            } else {
                fx
            };
            let p = frame.pixel(src_x as u16, fy as u16);
            if p == 0 {
                continue;
            }
            let dst = &mut row[sx as usize];
            *dst = match image.modifier {
                ImageModifier::Normal => colors.remap(image.player_color, p),
                ImageModifier::Shadow => shadow.darken(*dst),
            };
        }
    }
}

/// Half-extents of the procedural ellipse for a circle size.
fn ellipse_radii(size: u8) -> (i32, i32) {
    let rx = CIRCLE_WIDTHS[size as usize % SELECTION_CIRCLE_SIZES] / 2;
    (rx, (rx * 5 / 8).max(1))
}

fn draw_selection_circle(
    fb: &mut Framebuffer,
    frames: &FrameTable,
    circle_frames: &[Option<FrameHandle>; SELECTION_CIRCLE_SIZES],
    sprite: &SpriteDescriptor,
    circle: SelectionCircle,
) {
    let color = relation_color(circle.relation);
    let cx = sprite.x;
    let cy = sprite.y.saturating_add(circle.offset_y);

    let frame = circle_frames
        .get(circle.size as usize)
        .copied()
        .flatten()
        .and_then(|h| frames.get(h));
    if let Some(frame) = frame {
        let left = cx.saturating_sub(frame.width as i32 / 2);
        let top = cy.saturating_sub(frame.height as i32 / 2);
        for fy in 0..frame.height {
            for fx in 0..frame.width {
                if frame.pixel(fx, fy) != 0 {
                    fb.set(left.saturating_add(fx as i32), top.saturating_add(fy as i32), color);
                }
            }
        }
        return;
    }

    let (rx, ry) = ellipse_radii(circle.size);
    for dx in -rx..=rx {
        let t = 1.0 - (dx as f32 / rx as f32).powi(2);
        let dy = (ry as f32 * t.max(0.0).sqrt()).round() as i32;
        fb.set(cx.saturating_add(dx), cy.saturating_add(dy), color);
        fb.set(cx.saturating_add(dx), cy.saturating_sub(dy), color);
    }
    for dy in -ry..=ry {
        let t = 1.0 - (dy as f32 / ry as f32).powi(2);
        let dx = (rx as f32 * t.max(0.0).sqrt()).round() as i32;
        fb.set(cx.saturating_add(dx), cy.saturating_add(dy), color);
        fb.set(cx.saturating_sub(dx), cy.saturating_add(dy), color);
    }
}

/// Top row of the status bars of `sprite`.
pub fn status_bar_top(sprite: &SpriteDescriptor) -> i32 {
    match sprite.selection_circle {
        Some(circle) => {
            let (_, ry) = ellipse_radii(circle.size);
            sprite.y.saturating_add(circle.offset_y).saturating_add(ry + 2)
        }
        None => sprite.y.saturating_add(8),
    }
}

fn draw_status_bars(fb: &mut Framebuffer, sprite: &SpriteDescriptor, bars: &StatusBars) {
    if !bars.visible() || bars.width <= 0 {
        return;
    }
    let left = sprite.x.saturating_sub(bars.width / 2);
    let mut top = status_bar_top(sprite);

    let mut rows = vec![(bars.hp, bars.max_hp, COLOR_HP)];
    if bars.max_shields > 0 {
        rows.push((bars.shields, bars.max_shields, COLOR_SHIELDS));
    }
    if bars.max_energy > 0 {
        rows.push((bars.energy, bars.max_energy, COLOR_ENERGY));
    }

    for (current, max, color) in rows {
        let filled = bars.fill_width(current, max);
        fb.fill_rect(left, top, bars.width, BAR_HEIGHT, COLOR_BAR_EMPTY);
        fb.fill_rect(left, top, filled, BAR_HEIGHT, color);
        top = top.saturating_add(BAR_HEIGHT);
    }
}
