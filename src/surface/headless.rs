use std::collections::VecDeque;

use super::{Surface, SurfaceEvent};
use crate::clock::Metrics;
use crate::error::{Error, Result};
use crate::pipeline::FrameBuffer;

/// Keeps the last presented frame in memory. Resizes, close requests and
/// presentation failures can be injected.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    width: usize,
    height: usize,
    events: VecDeque<SurfaceEvent>,
    fail_present: Option<String>,
    presented: usize,
    last_frame: Option<FrameBuffer>,
}

impl HeadlessSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn queue_resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.events.push_back(SurfaceEvent::Resized(width, height));
    }

    pub fn request_close(&mut self) {
        self.events.push_back(SurfaceEvent::CloseRequested);
    }

    /// Make the next `present` fail with `reason`.
    pub fn fail_next_present(&mut self, reason: &str) {
        self.fail_present = Some(reason.to_string());
    }

    pub fn presented(&self) -> usize {
        self.presented
    }

    pub fn last_frame(&self) -> Option<&FrameBuffer> {
        self.last_frame.as_ref()
    }
}

impl Surface for HeadlessSurface {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn poll_events(&mut self) -> Result<Vec<SurfaceEvent>> {
        Ok(self.events.drain(..).collect())
    }

    fn present(&mut self, frame: &FrameBuffer, _metrics: &Metrics) -> Result<()> {
        if let Some(reason) = self.fail_present.take() {
            return Err(Error::Device(reason));
        }
        self.presented += 1;
        match &mut self.last_frame {
            Some(last) if last.width == frame.width && last.height == frame.height => {
                last.data.copy_from_slice(&frame.data);
                last.depth.copy_from_slice(&frame.depth);
            }
            last => *last = Some(frame.clone()),
        }
        Ok(())
    }
}
