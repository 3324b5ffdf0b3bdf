//! Presentation sinks: where a finished framebuffer goes.
//!
//! The compositor only produces palette indices. A [`PresentationSink`] turns
//! a framebuffer plus the active palette into something visible. The headless
//! [`RgbaSink`] expands to RGBA in memory (tests, screenshots, software
//! hosts). With the `present` feature enabled, `WindowSink` uploads the
//! indices and palette to the GPU with wgpu and scales them to a winit window.

use crate::framebuffer::Framebuffer;
use crate::palette::Palette;
use crate::RenderError;

#[cfg(feature = "present")]
pub mod window;

#[cfg(feature = "present")]
pub use window::WindowSink;

/// Consumer of composed frames.
pub trait PresentationSink {
    /// Show one frame. The framebuffer is not touched again until this returns.
    fn present(&mut self, framebuffer: &Framebuffer, palette: &Palette) -> Result<(), RenderError>;
}

/// Expands each presented frame to RGBA and keeps the latest one.
#[derive(Debug, Default)]
pub struct RgbaSink {
    rgba: Vec<u8>,
    width: u32,
    height: u32,
    frames_presented: u64,
}

impl RgbaSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// RGBA bytes of the last presented frame.
    pub fn last_frame(&self) -> &[u8] {
        &self.rgba
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]])
    }
}

impl PresentationSink for RgbaSink {
    fn present(&mut self, framebuffer: &Framebuffer, palette: &Palette) -> Result<(), RenderError> {
        palette.expand(framebuffer.pixels(), &mut self.rgba);
        self.width = framebuffer.width();
        self.height = framebuffer.height();
        self.frames_presented += 1;
        Ok(())
    }
}
