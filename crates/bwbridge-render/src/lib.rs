//! bwbridge-render -- the indexed-framebuffer compositor.
//!
//! The compositor paints megatiles, sprite images, selection circles and
//! status bars into an 8-bit paletted [`Framebuffer`](framebuffer::Framebuffer).
//! It knows nothing about the simulation: callers hand it screen-space
//! [`SpriteDescriptor`](sprite::SpriteDescriptor)s each frame and present the
//! result through a [`PresentationSink`](present::PresentationSink).
//!
//! # Quick Start
//!
//! ```
//! use bwbridge_render::prelude::*;
//!
//! let assets = MemoryAssets::new()
//!     .with("tileset/jungle.wpe", vec![0; 1024])
//!     .with("tileset/jungle.mega", vec![5; 1024]);
//!
//! let mut compositor = Compositor::new(64, 64);
//! compositor.load_image_data(&assets).unwrap();
//! compositor.set_tileset_index(4).unwrap();
//! compositor.set_map_tiles(&[0, 0, 0, 0], 2, 2);
//! compositor.render(0, 0, 64, 64);
//!
//! assert!(compositor.framebuffer().pixels().iter().all(|&p| p == 5));
//! ```

#![deny(unsafe_code)]

pub mod assets;
pub mod compositor;
pub mod framebuffer;
pub mod frames;
pub mod minimap;
pub mod palette;
pub mod present;
pub mod sprite;
pub mod tileset;

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while loading or presenting image data.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The asset directory could not be read.
    #[error("cannot read asset directory '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An asset exists but has the wrong shape.
    #[error("malformed asset '{name}': {reason}")]
    MalformedAsset { name: String, reason: String },

    /// Not a single complete tileset was found.
    #[error("no tileset could be loaded")]
    NoTileset,

    /// The tileset index is out of range or its data is not loaded.
    #[error("tileset {0} is not available")]
    InvalidTileset(u8),

    /// The presentation backend failed.
    #[error("presentation failed: {0}")]
    Present(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::assets::{validate, AssetReport, AssetSource, DirectoryAssets, MemoryAssets};
    pub use crate::compositor::{Compositor, CompositorState, RenderStrategy};
    pub use crate::framebuffer::Framebuffer;
    pub use crate::frames::{Frame, FrameHandle, FrameTable};
    pub use crate::minimap::{MinimapDot, MinimapImage};
    pub use crate::palette::{Palette, PlayerColors, ShadowTable};
    pub use crate::present::{PresentationSink, RgbaSink};
    pub use crate::sprite::{
        ImageDescriptor, ImageModifier, LegacyUnit, Relation, SelectionCircle, SpriteDescriptor,
        StatusBars,
    };
    pub use crate::tileset::{Megatiles, Tileset, MEGATILE_SIZE, TILESET_NAMES};
    pub use crate::RenderError;
}
