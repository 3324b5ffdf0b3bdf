//! Decoded image frames and the handle table that owns them.
//!
//! Sprite frames arrive already decoded as palette-indexed pixels. The
//! compositor owns them in a [`FrameTable`]; descriptors refer to them by
//! [`FrameHandle`].

use serde::{Deserialize, Serialize};

/// Index into a [`FrameTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameHandle(pub u32);

/// One decoded image frame. Index 0 is transparent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Build a frame, returning `None` if the pixel count does not match.
    pub fn new(width: u16, height: u16, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// A frame of one colour.
    pub fn solid(width: u16, height: u16, index: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![index; width as usize * height as usize],
        }
    }

    pub fn pixel(&self, x: u16, y: u16) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}

/// Owner of every registered frame.
#[derive(Debug, Default)]
pub struct FrameTable {
    frames: Vec<Frame>,
}

impl FrameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, frame: Frame) -> FrameHandle {
        self.frames.push(frame);
        FrameHandle(self.frames.len() as u32 - 1)
    }

    pub fn get(&self, handle: FrameHandle) -> Option<&Frame> {
        self.frames.get(handle.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop every frame. Outstanding handles become dangling and resolve to
    /// nothing.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_wrong_pixel_count() {
        assert!(Frame::new(2, 2, vec![0; 3]).is_none());
        assert!(Frame::new(2, 2, vec![0; 4]).is_some());
    }

    #[test]
    fn handles_are_sequential_and_cleared() {
        let mut table = FrameTable::new();
        let a = table.insert(Frame::solid(1, 1, 1));
        let b = table.insert(Frame::solid(1, 1, 2));
        assert_eq!(a, FrameHandle(0));
        assert_eq!(b, FrameHandle(1));
        assert_eq!(table.get(b).unwrap().pixel(0, 0), 2);
        table.clear();
        assert!(table.get(a).is_none());
    }
}
