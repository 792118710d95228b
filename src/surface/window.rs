use log::info;
use minifb::{Key, Scale, ScaleMode, Window, WindowOptions};

use super::{Surface, SurfaceEvent};
use crate::clock::Metrics;
use crate::error::{Error, Result};
use crate::pipeline::FrameBuffer;

const TITLE: &str = "Shadow Renderer";

/// A resizable minifb window. Escape or Q closes it.
pub struct WindowSurface {
    window: Window,
    size: (usize, usize),
}

impl WindowSurface {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            TITLE,
            width,
            height,
            WindowOptions {
                resize: true,
                scale: Scale::X1,
                scale_mode: ScaleMode::Stretch,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| Error::Device(format!("unable to open window: {}", e)))?;
        info!("opened {}x{} window", width, height);
        Ok(Self {
            window,
            size: (width, height),
        })
    }
}

impl Surface for WindowSurface {
    fn size(&self) -> (usize, usize) {
        self.size
    }

    fn poll_events(&mut self) -> Result<Vec<SurfaceEvent>> {
        let mut events = Vec::new();
        if !self.window.is_open()
            || self.window.is_key_down(Key::Escape)
            || self.window.is_key_down(Key::Q)
        {
            events.push(SurfaceEvent::CloseRequested);
        }
        let size = self.window.get_size();
        if size != self.size && size.0 > 0 && size.1 > 0 {
            self.size = size;
            events.push(SurfaceEvent::Resized(size.0, size.1));
        }
        Ok(events)
    }

    fn present(&mut self, frame: &FrameBuffer, metrics: &Metrics) -> Result<()> {
        self.window.set_title(&format!("{} | {}", TITLE, metrics));
        self.window
            .update_with_buffer(&frame.data, frame.width, frame.height)
            .map_err(|e| Error::Device(format!("window present failed: {}", e)))
    }
}
