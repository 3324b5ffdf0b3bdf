//! Runner configuration.

use serde::{Deserialize, Serialize};

use bwbridge_render::compositor::RenderStrategy;
use bwbridge_sim::types::PlayerId;

use crate::BridgeError;

/// Tunables of a [`GameRunner`](crate::runner::GameRunner).
///
/// Every field has a default, so a JSON config only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// The player the host controls and sees the game as.
    pub local_player: PlayerId,
    pub framebuffer_width: u32,
    pub framebuffer_height: u32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Point-select tolerance in screen pixels.
    pub point_select_radius: f32,
    /// Cap on box selections. `None` is unlimited.
    pub max_selection: Option<usize>,
    /// Frames between replay checkpoints; 0 checkpoints every frame.
    pub checkpoint_interval: u32,
    /// Longer edge of the minimap in pixels.
    pub minimap_size: u32,
    pub render_strategy: RenderStrategy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            local_player: PlayerId(0),
            framebuffer_width: 640,
            framebuffer_height: 480,
            min_zoom: 0.1,
            max_zoom: 10.0,
            point_select_radius: 16.0,
            max_selection: None,
            checkpoint_interval: 24,
            minimap_size: 128,
            render_strategy: RenderStrategy::Sprites,
        }
    }
}

impl RunnerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Clamp `zoom` into the configured bounds. Non-finite values become 1.
    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        if !zoom.is_finite() {
            return 1.0_f32.clamp(self.min_zoom, self.max_zoom);
        }
        zoom.clamp(self.min_zoom, self.max_zoom)
    }
}
