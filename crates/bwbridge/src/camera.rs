//! Screen/world coordinate transform.
//!
//! World space is map pixels with the origin at the map's top-left corner.
//! Screen space is host pixels with the origin at the viewport's top-left
//! corner. The camera position is the world point shown at the viewport
//! centre:
//!
//! ```text
//! screen = (world - camera.position) * zoom + viewport / 2
//! world  = (screen - viewport / 2) / zoom + camera.position
//! ```
//!
//! The transform never clamps; [`GameRunner`](crate::runner::GameRunner)
//! clamps zoom before storing it.

use serde::{Deserialize, Serialize};

use bwbridge_sim::types::WorldPoint;

/// A point in host screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: ScreenPoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Camera position, zoom and viewport size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// World point at the viewport centre.
    pub position: WorldPoint,
    /// Screen pixels per world pixel. Always > 0.
    pub zoom: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl Camera {
    /// A zoom-1 camera looking at the world origin.
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        Self {
            position: WorldPoint::default(),
            zoom: 1.0,
            viewport_width,
            viewport_height,
        }
    }

    pub fn world_to_screen(&self, p: WorldPoint) -> ScreenPoint {
        ScreenPoint {
            x: (p.x - self.position.x) * self.zoom + self.viewport_width / 2.0,
            y: (p.y - self.position.y) * self.zoom + self.viewport_height / 2.0,
        }
    }

    pub fn screen_to_world(&self, s: ScreenPoint) -> WorldPoint {
        WorldPoint {
            x: (s.x - self.viewport_width / 2.0) / self.zoom + self.position.x,
            y: (s.y - self.viewport_height / 2.0) / self.zoom + self.position.y,
        }
    }

    /// The zoom-1 camera that places sprites into a `width` x `height`
    /// framebuffer centred on the same world point. The presentation sink
    /// scales that framebuffer by [`zoom`](Self::zoom).
    pub fn framebuffer_view(&self, width: u32, height: u32) -> Camera {
        Camera {
            position: self.position,
            zoom: 1.0,
            viewport_width: width as f32,
            viewport_height: height as f32,
        }
    }

    /// Whole-pixel world position of the viewport's top-left corner.
    pub fn origin(&self) -> (i32, i32) {
        let top_left = self.screen_to_world(ScreenPoint::new(0.0, 0.0));
        (top_left.x.floor() as i32, top_left.y.floor() as i32)
    }
}
