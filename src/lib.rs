pub mod clock;
pub mod config;
pub mod core;
pub mod demo;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod render_loop;
pub mod surface;
pub mod util;

pub use config::{create_clap_command, DisplayTarget, RendererConfig, ShadowSettings};
pub use crate::core::{Camera, Color, Light, LightKind, Scene};
pub use error::{Error, Result};
pub use pipeline::{FrameReport, Renderer, ShadowFilter};
pub use render_loop::{FrameErrorPolicy, LoopState, RenderLoop};
pub use util::format_mat4;
