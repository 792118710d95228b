//! Where finished frames go: a window, the terminal, or nowhere (tests and
//! snapshots).

use crate::clock::Metrics;
use crate::error::Result;
use crate::pipeline::FrameBuffer;

pub mod headless;
pub mod terminal;
pub mod window;

pub use headless::HeadlessSurface;
pub use terminal::TerminalSurface;
pub use window::WindowSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// New drawable size in pixels.
    Resized(usize, usize),
    CloseRequested,
}

pub trait Surface {
    /// Drawable size in pixels.
    fn size(&self) -> (usize, usize);

    /// Events since the last call, oldest first.
    fn poll_events(&mut self) -> Result<Vec<SurfaceEvent>>;

    /// Show `frame`. Failures are device errors.
    fn present(&mut self, frame: &FrameBuffer, metrics: &Metrics) -> Result<()>;
}
