use std::path::Path;

use rayon::prelude::*;

use crate::core::Color;
use crate::error::{Error, Result};

/// Colour + depth target of the main pass. Colours are packed `0x00RRGGBB`,
/// the layout minifb presents directly.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u32>,
    pub depth: Vec<f32>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let buf_size = width * height;
        FrameBuffer {
            width,
            height,
            data: vec![0; buf_size],
            depth: vec![f32::INFINITY; buf_size],
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if (width, height) != (self.width, self.height) {
            *self = FrameBuffer::new(width, height);
        }
    }

    pub fn clear(&mut self, color: Color) {
        let packed = color.to_u32();
        self.data.par_chunks_mut(1024).for_each(|chunk| {
            for point in chunk {
                *point = packed;
            }
        });
        self.depth.par_chunks_mut(1024).for_each(|chunk| {
            for d in chunk {
                *d = f32::INFINITY;
            }
        });
    }

    /// Would a fragment at this depth survive the depth test?
    #[inline]
    pub fn passes_depth(&self, x: usize, y: usize, depth: f32) -> bool {
        x < self.width && y < self.height && depth < self.depth[x + y * self.width]
    }

    /// Depth-tested write. Returns whether the pixel was written.
    pub fn set_pixel(&mut self, pos: (usize, usize), depth: f32, color: Color) -> bool {
        if pos.0 < self.width && pos.1 < self.height {
            let index = pos.0 + pos.1 * self.width;
            if depth < self.depth[index] {
                self.data[index] = color.to_u32();
                self.depth[index] = depth;
                return true;
            }
        }
        false
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x < self.width && y < self.height {
            Some(Color::from_u32(self.data[x + y * self.width]))
        } else {
            None
        }
    }

    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.depth[x + y * self.width])
        } else {
            None
        }
    }

    /// Write the colour target as an RGB PNG (or whatever `path`'s extension names).
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let image = image::RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let c = self.data[x as usize + y as usize * self.width];
            image::Rgb([(c >> 16) as u8, (c >> 8) as u8, c as u8])
        });
        image
            .save(path.as_ref())
            .map_err(|e| Error::Device(format!("{}: {}", path.as_ref().display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearer_fragment_wins() {
        let mut buffer = FrameBuffer::new(4, 4);
        buffer.clear(Color::BLACK);
        assert!(buffer.set_pixel((1, 1), 0.6, Color::RED));
        assert!(!buffer.set_pixel((1, 1), 0.8, Color::GREEN));
        assert!(buffer.set_pixel((1, 1), 0.2, Color::BLUE));
        assert_eq!(buffer.pixel(1, 1), Some(Color::BLUE));
        assert!(!buffer.set_pixel((9, 1), 0.0, Color::RED));
    }

    #[test]
    fn clear_resets_colour_and_depth() {
        let mut buffer = FrameBuffer::new(3, 2);
        buffer.set_pixel((0, 0), 0.1, Color::RED);
        buffer.clear(Color::WHITE);
        assert_eq!(buffer.pixel(0, 0), Some(Color::WHITE));
        assert_eq!(buffer.depth_at(0, 0), Some(f32::INFINITY));
    }

    #[test]
    fn resize_reallocates() {
        let mut buffer = FrameBuffer::new(800, 600);
        buffer.resize(1920, 1080);
        assert_eq!(buffer.data.len(), 1920 * 1080);
    }
}
