//! Software execution of draw work: vertex stage, clipping, rasterization,
//! and the shadow and colour passes built on top of them.

use glam::{Mat3, Mat4};
use log::{log_enabled, trace, Level};
use rayon::prelude::*;

use crate::config::RendererConfig;
use crate::core::geometry::Mesh;
use crate::core::light::LightId;
use crate::core::Scene;
use crate::error::{ConfigError, Result};
use crate::util::format_mat4;

pub mod buffer;
pub mod clipper;
pub mod filter;
pub mod main_pass;
pub mod rasterizer;
pub mod shadow_pass;

pub use buffer::FrameBuffer;
pub use clipper::{ClipTriangle, ClipVertex, Clipper, CullMode};
pub use filter::ShadowFilter;
pub use main_pass::MainPass;
pub use rasterizer::{Fragment, Rasterizer};
pub use shadow_pass::ShadowPass;

/// Transform a mesh into clip space and clip it. Triangles are processed in
/// parallel.
pub fn vertex_stage(mesh: &Mesh, model: Mat4, view_proj: Mat4, clipper: &Clipper) -> Vec<ClipTriangle> {
    let normal_matrix = Mat3::from_mat4(model.inverse().transpose());
    let mvp = view_proj * model;
    mesh.tris
        .par_iter()
        .flat_map(|tri| {
            let vertices = tri.map(|i| {
                let v = &mesh.vertices[i as usize];
                ClipVertex {
                    position: mvp * v.pos.extend(1.0),
                    world: model.transform_point3(v.pos),
                    normal: normal_matrix * v.normal,
                }
            });
            clipper.clip_triangle(&ClipTriangle { vertices })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Shadow { light: LightId, face: usize },
    Main,
}

/// What one pass drew, for diagnostics and ordering checks.
#[derive(Debug, Clone)]
pub struct PassRecord {
    pub kind: PassKind,
    pub target: (usize, usize),
    pub view_projection: Mat4,
    /// Mesh instances submitted.
    pub draws: usize,
    pub fragments: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub passes: Vec<PassRecord>,
}

impl FrameReport {
    pub fn shadow_passes(&self) -> impl Iterator<Item = &PassRecord> {
        self.passes
            .iter()
            .filter(|p| matches!(p.kind, PassKind::Shadow { .. }))
    }

    pub fn main_pass(&self) -> Option<&PassRecord> {
        self.passes.iter().find(|p| p.kind == PassKind::Main)
    }
}

/// Owns the colour target and runs the passes of one frame in order.
pub struct Renderer {
    pub config: RendererConfig,
    frame: FrameBuffer,
    shadow_pass: ShadowPass,
    main_pass: MainPass,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(ConfigError::ZeroSurfaceSize {
                width: config.width,
                height: config.height,
            }
            .into());
        }
        Ok(Self {
            frame: FrameBuffer::new(config.width, config.height),
            shadow_pass: ShadowPass::default(),
            main_pass: MainPass::new(config.shadows.filter),
            config,
        })
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn filter(&self) -> ShadowFilter {
        self.main_pass.filter
    }

    pub fn set_filter(&mut self, filter: ShadowFilter) {
        self.config.shadows.filter = filter;
        self.main_pass.filter = filter;
    }

    pub fn set_shadows_enabled(&mut self, enabled: bool) {
        self.config.shadows.enabled = enabled;
    }

    pub fn resize(&mut self, width: usize, height: usize) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroSurfaceSize { width, height }.into());
        }
        self.config.width = width;
        self.config.height = height;
        self.frame.resize(width, height);
        Ok(())
    }

    /// Shadow passes for every shadow-casting light, then the colour pass.
    /// World matrices must be current.
    pub fn render(&mut self, scene: &mut Scene) -> Result<FrameReport> {
        let mut report = FrameReport::default();
        if self.config.shadows.enabled {
            self.shadow_pass.render(scene, &mut report)?;
        }
        if log_enabled!(Level::Trace) {
            let view_proj = scene.camera.view_projection(&scene.graph)?;
            trace!("{}", format_mat4("camera view-projection", &view_proj));
        }
        let record = self.main_pass.render(
            scene,
            &mut self.frame,
            self.config.clear_color,
            self.config.shadows.enabled,
        )?;
        report.passes.push(record);
        Ok(report)
    }
}
