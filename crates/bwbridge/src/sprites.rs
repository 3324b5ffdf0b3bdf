//! Snapshot to draw-descriptor conversion.
//!
//! Real unit art comes from an asset service outside this workspace. Hosts
//! register decoded frames per unit type with [`SpriteArt::insert`]; types
//! with no registered art get a procedural placeholder (a player-coloured
//! disc for units, a box for buildings, plus an elliptical shadow) created
//! the first time the type is drawn.
//!
//! Sprites are placed with a zoom-1 framebuffer camera; the presentation
//! sink scales the finished framebuffer by the real zoom.

use std::collections::HashMap;

use bwbridge_render::compositor::CIRCLE_WIDTHS;
use bwbridge_render::frames::{Frame, FrameHandle, FrameTable};
use bwbridge_render::minimap::MinimapDot;
use bwbridge_render::sprite::{
    ImageDescriptor, ImageModifier, LegacyUnit, Relation, SelectionCircle, SpriteDescriptor,
    StatusBars, SELECTION_CIRCLE_SIZES,
};
use bwbridge_sim::types::{PlayerId, UnitTypeId};

use crate::camera::Camera;
use crate::snapshot::{FrameSnapshot, UnitDescriptor};

/// Palette index of placeholder outlines.
const OUTLINE_INDEX: u8 = 1;

// ---------------------------------------------------------------------------
// SpriteArt
// ---------------------------------------------------------------------------

/// Frames and overlay geometry of one unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtEntry {
    pub body: FrameHandle,
    pub width: u16,
    pub height: u16,
    pub shadow: Option<FrameHandle>,
    /// Selection circle size index (0..=9).
    pub circle_size: u8,
    /// Circle offset below the sprite centre.
    pub circle_offset: i32,
    pub bar_width: i32,
}

/// Per-type art lookup with on-demand placeholders.
#[derive(Debug, Clone, Default)]
pub struct SpriteArt {
    entries: HashMap<UnitTypeId, ArtEntry>,
}

/// Smallest circle size at least as wide as `diameter`.
pub fn circle_size_for(diameter: i32) -> u8 {
    CIRCLE_WIDTHS
        .iter()
        .position(|w| *w >= diameter)
        .unwrap_or(SELECTION_CIRCLE_SIZES - 1) as u8
}

/// Player-coloured body: a disc, or a filled box for buildings.
fn placeholder_body(size: u16, building: bool) -> Frame {
    let n = size as i32;
    let r = n as f32 / 2.0;
    let mut pixels = Vec::with_capacity(size as usize * size as usize);
    for y in 0..n {
        for x in 0..n {
            let edge = x == 0 || y == 0 || x == n - 1 || y == n - 1;
            let px = if building {
                if edge {
                    OUTLINE_INDEX
                } else {
                    8 + ((x / 4 + y / 4) % 8) as u8
                }
            } else {
                let dx = x as f32 + 0.5 - r;
                let dy = y as f32 + 0.5 - r;
                let d = (dx * dx + dy * dy).sqrt();
                if d > r {
                    0
                } else if d > r - 1.5 {
                    OUTLINE_INDEX
                } else {
                    // Darker player shades towards the rim.
                    8 + ((d / r) * 7.0) as u8
                }
            };
            pixels.push(px);
        }
    }
    Frame::new(size, size, pixels).unwrap_or_else(|| Frame::solid(size, size, 8))
}

/// Flat ellipse under the body, drawn with the shadow modifier.
fn placeholder_shadow(width: u16) -> Frame {
    let height = (width / 2).max(1);
    let (rx, ry) = (width as f32 / 2.0, height as f32 / 2.0);
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let dx = (x as f32 + 0.5 - rx) / rx;
            let dy = (y as f32 + 0.5 - ry) / ry;
            pixels.push(u8::from(dx * dx + dy * dy <= 1.0));
        }
    }
    Frame::new(width, height, pixels).unwrap_or_else(|| Frame::solid(width, height, 1))
}

impl SpriteArt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register host-supplied art for a unit type.
    pub fn insert(&mut self, unit_type: UnitTypeId, entry: ArtEntry) {
        self.entries.insert(unit_type, entry);
    }

    pub fn get(&self, unit_type: UnitTypeId) -> Option<&ArtEntry> {
        self.entries.get(&unit_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry. Call when the frame table is cleared.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Art for `unit`, generating and registering a placeholder if needed.
    pub fn entry_for(&mut self, unit: &UnitDescriptor, frames: &mut FrameTable) -> ArtEntry {
        if let Some(entry) = self.entries.get(&unit.type_id) {
            return *entry;
        }
        let diameter = (unit.radius * 2.0).round().clamp(4.0, 255.0) as u16;
        let body = frames.insert(placeholder_body(diameter, unit.flags.is_building));
        let shadow = frames.insert(placeholder_shadow(diameter));
        let entry = ArtEntry {
            body,
            width: diameter,
            height: diameter,
            shadow: Some(shadow),
            circle_size: circle_size_for(diameter as i32),
            circle_offset: diameter as i32 / 4,
            bar_width: (diameter as i32).max(16),
        };
        tracing::trace!(unit_type = unit.type_id.0, diameter, "placeholder art generated");
        self.entries.insert(unit.type_id, entry);
        entry
    }
}

// ---------------------------------------------------------------------------
// Descriptor builders
// ---------------------------------------------------------------------------

pub fn relation(owner: PlayerId, viewer: PlayerId) -> Relation {
    if owner == viewer {
        Relation::Own
    } else if owner.is_neutral() {
        Relation::Neutral
    } else {
        Relation::Enemy
    }
}

/// Units in paint order: top to bottom, id breaking ties.
fn paint_order(snapshot: &FrameSnapshot) -> Vec<&UnitDescriptor> {
    let mut units: Vec<&UnitDescriptor> = snapshot.units.iter().collect();
    units.sort_by(|a, b| {
        a.position
            .y
            .total_cmp(&b.position.y)
            .then_with(|| a.id.cmp(&b.id))
    });
    units
}

/// Framebuffer position of a world point for the zoom-1 `view`, saturated
/// to the `i32` range.
fn to_framebuffer(view: &Camera, unit: &UnitDescriptor) -> (i32, i32) {
    let (ox, oy) = view.origin();
    let offset = |world: f32, origin: i32| {
        (world.floor() as i64 - i64::from(origin)).clamp(i64::from(i32::MIN), i64::from(i32::MAX))
            as i32
    };
    (offset(unit.position.x, ox), offset(unit.position.y, oy))
}

fn overlaps_view(view: &Camera, x: i32, y: i32, half_w: i32, half_h: i32) -> bool {
    x.saturating_add(half_w) >= 0
        && y.saturating_add(half_h) >= 0
        && x.saturating_sub(half_w) < view.viewport_width as i32
        && y.saturating_sub(half_h) < view.viewport_height as i32
}

/// Sprite descriptors and selection mask for every on-screen unit.
pub fn build_sprites(
    snapshot: &FrameSnapshot,
    view: &Camera,
    viewer: PlayerId,
    art: &mut SpriteArt,
    frames: &mut FrameTable,
) -> (Vec<SpriteDescriptor>, Vec<bool>) {
    let mut sprites = Vec::new();
    let mut selected = Vec::new();
    for unit in paint_order(snapshot) {
        let entry = art.entry_for(unit, frames);
        let (x, y) = to_framebuffer(view, unit);
        // Status bars may hang below the body.
        let reach = entry.width.max(entry.height) as i32;
        if !overlaps_view(view, x, y, reach, reach) {
            continue;
        }

        let owner = unit.owner.0;
        let left = x - entry.width as i32 / 2;
        let top = y - entry.height as i32 / 2;
        let mut images = Vec::with_capacity(2);
        if let Some(shadow) = entry.shadow {
            images.push(ImageDescriptor {
                frame: shadow,
                x: left + 3,
                y: y + entry.height as i32 / 4,
                width: entry.width,
                height: (entry.width / 2).max(1),
                flipped: false,
                modifier: ImageModifier::Shadow,
                player_color: owner,
            });
        }
        images.push(ImageDescriptor {
            frame: entry.body,
            x: left,
            y: top,
            width: entry.width,
            height: entry.height,
            flipped: false,
            modifier: ImageModifier::Normal,
            player_color: owner,
        });

        sprites.push(SpriteDescriptor {
            owner,
            x,
            y,
            images,
            selection_circle: SelectionCircle::from_raw(
                entry.circle_size as i32,
                entry.circle_offset,
                relation(unit.owner, viewer),
            ),
            status_bars: Some(StatusBars {
                hp: unit.health,
                max_hp: unit.max_health,
                shields: unit.shields,
                max_shields: unit.max_shields,
                energy: unit.energy,
                max_energy: unit.max_energy,
                width: entry.bar_width,
                invincible: unit.flags.invincible,
            }),
        });
        selected.push(snapshot.selection.contains(&unit.id));
    }
    (sprites, selected)
}

/// One box per on-screen unit for the legacy strategy.
pub fn build_legacy_units(
    snapshot: &FrameSnapshot,
    view: &Camera,
    viewer: PlayerId,
) -> Vec<LegacyUnit> {
    paint_order(snapshot)
        .into_iter()
        .filter_map(|unit| {
            let (x, y) = to_framebuffer(view, unit);
            let size = ((unit.radius * 2.0).round() as i32).max(2);
            overlaps_view(view, x, y, size, size).then(|| LegacyUnit {
                x,
                y,
                width: size,
                height: size,
                owner: unit.owner.0,
                relation: relation(unit.owner, viewer),
                selected: snapshot.selection.contains(&unit.id),
            })
        })
        .collect()
}

pub fn minimap_dots(snapshot: &FrameSnapshot) -> Vec<MinimapDot> {
    snapshot
        .units
        .iter()
        .map(|u| MinimapDot {
            x: u.position.x,
            y: u.position.y,
            owner: u.owner.0,
        })
        .collect()
}
