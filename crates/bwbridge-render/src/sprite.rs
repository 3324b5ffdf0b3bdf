//! Draw descriptors handed to the compositor each frame.
//!
//! Descriptors are plain values in screen space. The bridge builds them from
//! the unit snapshot; the compositor only paints them.

use serde::{Deserialize, Serialize};

use crate::frames::FrameHandle;

/// Number of selection-circle sizes.
pub const SELECTION_CIRCLE_SIZES: usize = 10;

/// Raw modifier code of the shadow draw mode.
pub const MODIFIER_SHADOW: u8 = 10;

/// How an image is combined with the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageModifier {
    /// Copy non-transparent pixels, remapping player-colour indices.
    #[default]
    Normal,
    /// Darken the destination wherever the image is non-transparent.
    Shadow,
}

impl ImageModifier {
    /// Decode a raw modifier code. Unknown codes draw normally.
    pub fn from_code(code: u8) -> Self {
        if code == MODIFIER_SHADOW {
            ImageModifier::Shadow
        } else {
            ImageModifier::Normal
        }
    }
}

/// One image layer of a sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub frame: FrameHandle,
    /// Screen position of the top-left corner.
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
    pub flipped: bool,
    pub modifier: ImageModifier,
    /// Player-colour row used for indices 8..=15.
    pub player_color: u8,
}

/// Relation of a unit's owner to the viewer; decides selection colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Own,
    Enemy,
    Neutral,
}

/// Selection circle under a sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCircle {
    /// Size index, 0..=9.
    pub size: u8,
    /// Vertical offset from the sprite centre.
    pub offset_y: i32,
    pub relation: Relation,
}

impl SelectionCircle {
    /// Host-facing constructor: a negative or out-of-range size means "none".
    pub fn from_raw(size: i32, offset_y: i32, relation: Relation) -> Option<Self> {
        if size < 0 || size as usize >= SELECTION_CIRCLE_SIZES {
            return None;
        }
        Some(Self {
            size: size as u8,
            offset_y,
            relation,
        })
    }
}

/// Health, shield and energy bars under a selected sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusBars {
    pub hp: i32,
    pub max_hp: i32,
    pub shields: i32,
    pub max_shields: i32,
    pub energy: i32,
    pub max_energy: i32,
    /// Full bar width in pixels.
    pub width: i32,
    pub invincible: bool,
}

impl StatusBars {
    /// Whether the bars are drawn at all.
    pub fn visible(&self) -> bool {
        !self.invincible && self.max_hp > 0
    }

    /// Filled pixels of a bar showing `current` out of `max`.
    pub fn fill_width(&self, current: i32, max: i32) -> i32 {
        if max <= 0 {
            return 0;
        }
        let filled = (self.width as i64 * current.max(0) as i64) / max as i64;
        (filled as i32).clamp(0, self.width.max(0))
    }
}

/// A complete sprite: images in paint order plus overlays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteDescriptor {
    pub owner: u8,
    /// Screen position of the sprite centre.
    pub x: i32,
    pub y: i32,
    pub images: Vec<ImageDescriptor>,
    pub selection_circle: Option<SelectionCircle>,
    pub status_bars: Option<StatusBars>,
}

/// The simpler per-unit box used by the legacy strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyUnit {
    /// Screen position of the unit centre.
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub owner: u8,
    pub relation: Relation,
    pub selected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_circle_size_means_none() {
        assert!(SelectionCircle::from_raw(-1, 0, Relation::Own).is_none());
        assert!(SelectionCircle::from_raw(10, 0, Relation::Own).is_none());
        assert_eq!(
            SelectionCircle::from_raw(3, 5, Relation::Enemy).map(|c| c.size),
            Some(3)
        );
    }

    #[test]
    fn fill_width_floors_and_clamps() {
        let bars = StatusBars {
            width: 30,
            ..Default::default()
        };
        assert_eq!(bars.fill_width(20, 40), 15);
        assert_eq!(bars.fill_width(1, 3), 10);
        assert_eq!(bars.fill_width(2, 3), 20);
        assert_eq!(bars.fill_width(50, 40), 30);
        assert_eq!(bars.fill_width(-5, 40), 0);
        assert_eq!(bars.fill_width(5, 0), 0);
    }

    #[test]
    fn bars_hidden_for_invincible_or_hpless_units() {
        let mut bars = StatusBars {
            hp: 10,
            max_hp: 10,
            width: 20,
            ..Default::default()
        };
        assert!(bars.visible());
        bars.invincible = true;
        assert!(!bars.visible());
        bars.invincible = false;
        bars.max_hp = 0;
        assert!(!bars.visible());
    }

    #[test]
    fn modifier_code_ten_is_shadow() {
        assert_eq!(ImageModifier::from_code(10), ImageModifier::Shadow);
        assert_eq!(ImageModifier::from_code(0), ImageModifier::Normal);
        assert_eq!(ImageModifier::from_code(9), ImageModifier::Normal);
    }
}
