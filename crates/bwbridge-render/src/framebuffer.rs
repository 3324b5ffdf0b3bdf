//! The indexed 8-bit framebuffer.
//!
//! Every pixel is a palette index. The buffer is allocated once and
//! overwritten on every render; writes outside the bounds are clipped
//! silently.

/// A width x height grid of palette indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Framebuffer {
    /// Allocate a framebuffer filled with index 0.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel data.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn clear(&mut self, index: u8) {
        self.pixels.fill(index);
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn get(&self, x: i32, y: i32) -> Option<u8> {
        self.offset(x, y).map(|i| self.pixels[i])
    }

    pub fn set(&mut self, x: i32, y: i32, index: u8) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i] = index;
        }
    }

    /// Mutable access to one full row, or `None` when `y` is outside.
    pub fn row_mut(&mut self, y: i32) -> Option<&mut [u8]> {
        if y < 0 || y >= self.height as i32 {
            return None;
        }
        let w = self.width as usize;
        let start = y as usize * w;
        Some(&mut self.pixels[start..start + w])
    }

    /// Fill a horizontal run of `len` pixels starting at `(x, y)`.
    pub fn hline(&mut self, x: i32, y: i32, len: i32, index: u8) {
        let w = self.width as i32;
        let Some(row) = self.row_mut(y) else {
            return;
        };
        let start = x.max(0);
        let end = x.saturating_add(len).min(w);
        if start < end {
            row[start as usize..end as usize].fill(index);
        }
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, index: u8) {
        let (top, bottom) = self.clip_rows(y, h);
        for row in top..bottom {
            self.hline(x, row, w, index);
        }
    }

    /// One-pixel rectangle outline.
    pub fn stroke_rect(&mut self, x: i32, y: i32, w: i32, h: i32, index: u8) {
        if w <= 0 || h <= 0 {
            return;
        }
        let right = x.saturating_add(w - 1);
        self.hline(x, y, w, index);
        self.hline(x, y.saturating_add(h - 1), w, index);
        let (top, bottom) = self.clip_rows(y, h);
        for row in top..bottom {
            self.set(x, row, index);
            self.set(right, row, index);
        }
    }

    /// Rows of `y..y + h` that lie inside the buffer.
    fn clip_rows(&self, y: i32, h: i32) -> (i32, i32) {
        (y.max(0), y.saturating_add(h).min(self.height as i32))
    }

    /// BLAKE3 digest of the pixel data, for comparing frames.
    pub fn digest(&self) -> [u8; 32] {
        *blake3::hash(&self.pixels).as_bytes()
    }
}
