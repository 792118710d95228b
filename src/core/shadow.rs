//! Shadow configuration, depth textures and precision diagnostics.

use std::fmt::{self, Display, Formatter};

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use super::camera::Projection;
use crate::error::{ConfigError, Result};

pub const DEFAULT_SHADOW_MAP_SIZE: u32 = 1024;
pub const DEFAULT_SHADOW_BIAS: f32 = 0.005;

/// World units per shadow texel above which a directional shadow is likely blocky.
pub const COARSE_TEXEL_THRESHOLD: f32 = 0.02;
/// far / near above which a perspective shadow loses most of its depth precision.
pub const DEPTH_RATIO_THRESHOLD: f32 = 10_000.0;

/// Single-channel depth target. Values are in [0, 1], 1 meaning "nothing".
#[derive(Debug, Clone)]
pub struct DepthTexture {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl DepthTexture {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![1.0; width * height],
        }
    }

    pub fn clear(&mut self) {
        self.data.par_chunks_mut(1024).for_each(|chunk| {
            for d in chunk {
                *d = 1.0;
            }
        });
    }

    /// Keep the nearer of the stored and incoming depth.
    #[inline]
    pub fn write(&mut self, x: usize, y: usize, depth: f32) {
        if x < self.width && y < self.height {
            let index = x + y * self.width;
            if depth < self.data[index] {
                self.data[index] = depth;
            }
        }
    }

    /// Fetch a texel, clamping coordinates to the edge.
    #[inline]
    pub fn texel(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[x + y * self.width]
    }
}

/// Faces of a point light's cube shadow map, in the conventional cube-map
/// order and with the conventional up vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeFace {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn direction(self) -> Vec3 {
        match self {
            CubeFace::PositiveX => Vec3::X,
            CubeFace::NegativeX => Vec3::NEG_X,
            CubeFace::PositiveY => Vec3::Y,
            CubeFace::NegativeY => Vec3::NEG_Y,
            CubeFace::PositiveZ => Vec3::Z,
            CubeFace::NegativeZ => Vec3::NEG_Z,
        }
    }

    pub fn up(self) -> Vec3 {
        match self {
            CubeFace::PositiveY => Vec3::Z,
            CubeFace::NegativeY => Vec3::NEG_Z,
            _ => Vec3::NEG_Y,
        }
    }

    /// The face whose frustum contains `dir` (dominant axis).
    pub fn containing(dir: Vec3) -> CubeFace {
        let a = dir.abs();
        if a.x >= a.y && a.x >= a.z {
            if dir.x >= 0.0 {
                CubeFace::PositiveX
            } else {
                CubeFace::NegativeX
            }
        } else if a.y >= a.z {
            if dir.y >= 0.0 {
                CubeFace::PositiveY
            } else {
                CubeFace::NegativeY
            }
        } else if dir.z >= 0.0 {
            CubeFace::PositiveZ
        } else {
            CubeFace::NegativeZ
        }
    }
}

/// The projection a light renders its depth pass with. FOV in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadowCamera {
    /// Directional lights: parallel rays. Bounds are manual and should tightly
    /// enclose the shadow casters and receivers.
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
    /// Spot lights: one frustum that must cover the cone.
    Perspective { fov: f32, near: f32, far: f32 },
    /// Point lights: six 90° faces. The FOV is not configurable.
    Cube { near: f32, far: f32 },
}

impl ShadowCamera {
    pub const CUBE_FACE_FOV: f32 = 90.0;

    pub fn face_count(&self) -> usize {
        match self {
            ShadowCamera::Cube { .. } => 6,
            _ => 1,
        }
    }

    pub fn clip_range(&self) -> (f32, f32) {
        match *self {
            ShadowCamera::Orthographic { near, far, .. }
            | ShadowCamera::Perspective { near, far, .. }
            | ShadowCamera::Cube { near, far } => (near, far),
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            ShadowCamera::Orthographic { .. } => "orthographic",
            ShadowCamera::Perspective { .. } => "perspective",
            ShadowCamera::Cube { .. } => "cube",
        }
    }

    /// Projection used for every face; `aspect` is the map's width / height.
    pub fn projection(&self, aspect: f32) -> Result<Projection> {
        match *self {
            ShadowCamera::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => Projection::orthographic(left, right, top, bottom, near, far),
            ShadowCamera::Perspective { fov, near, far } => {
                Projection::perspective(fov, aspect, near, far)
            }
            ShadowCamera::Cube { near, far } => {
                Projection::perspective(Self::CUBE_FACE_FOV, 1.0, near, far)
            }
        }
    }
}

/// Depth textures of one light, plus the view-projection each face was
/// rendered with during the current frame.
#[derive(Debug, Clone, Default)]
pub struct ShadowMap {
    faces: Vec<DepthTexture>,
    view_projections: Vec<Mat4>,
}

impl ShadowMap {
    /// (Re)allocate when the face count or resolution changed.
    pub fn ensure(&mut self, faces: usize, width: usize, height: usize) {
        let matches = self.faces.len() == faces
            && self
                .faces
                .first()
                .map_or(true, |f| f.width == width && f.height == height);
        if !matches {
            self.faces = (0..faces).map(|_| DepthTexture::new(width, height)).collect();
            self.view_projections = vec![Mat4::IDENTITY; faces];
        }
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn face(&self, face: usize) -> Option<&DepthTexture> {
        self.faces.get(face)
    }

    pub fn view_projection(&self, face: usize) -> Option<Mat4> {
        self.view_projections.get(face).copied()
    }

    /// Bind a face as a render target: record its matrix and hand it out.
    pub fn bind_face(&mut self, face: usize, view_projection: Mat4) -> Option<&mut DepthTexture> {
        let slot = self.view_projections.get_mut(face)?;
        *slot = view_projection;
        self.faces.get_mut(face)
    }
}

/// Shadow settings of a shadow-capable light.
#[derive(Debug, Clone)]
pub struct LightShadow {
    map_width: u32,
    map_height: u32,
    camera: ShadowCamera,
    /// Subtracted from the receiver depth before comparing, against shadow acne.
    pub bias: f32,
    /// Kernel scale for the soft PCF filter.
    pub radius: f32,
    pub(crate) map: ShadowMap,
}

impl LightShadow {
    pub fn new(camera: ShadowCamera) -> Result<Self> {
        camera.projection(1.0)?;
        Ok(Self {
            map_width: DEFAULT_SHADOW_MAP_SIZE,
            map_height: DEFAULT_SHADOW_MAP_SIZE,
            camera,
            bias: DEFAULT_SHADOW_BIAS,
            radius: 1.0,
            map: ShadowMap::default(),
        })
    }

    pub fn map_size(&self) -> (u32, u32) {
        (self.map_width, self.map_height)
    }

    /// Lower resolutions render faster but give blockier shadow edges.
    pub fn set_map_size(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroShadowMapSize { width, height }.into());
        }
        self.map_width = width;
        self.map_height = height;
        Ok(())
    }

    pub fn camera(&self) -> &ShadowCamera {
        &self.camera
    }

    /// Replace the shadow camera. The variant is fixed by the light kind.
    pub(crate) fn set_camera(&mut self, camera: ShadowCamera, kind: &'static str) -> Result<()> {
        if std::mem::discriminant(&camera) != std::mem::discriminant(&self.camera) {
            return Err(ConfigError::ShadowCameraMismatch {
                kind,
                expected: self.camera.variant_name(),
            }
            .into());
        }
        camera.projection(self.aspect())?;
        self.camera = camera;
        Ok(())
    }

    pub fn set_clip_range(&mut self, near: f32, far: f32) -> Result<()> {
        let mut camera = self.camera;
        match &mut camera {
            ShadowCamera::Orthographic { near: n, far: f, .. }
            | ShadowCamera::Perspective { near: n, far: f, .. }
            | ShadowCamera::Cube { near: n, far: f } => {
                *n = near;
                *f = far;
            }
        }
        camera.projection(self.aspect())?;
        self.camera = camera;
        Ok(())
    }

    pub fn aspect(&self) -> f32 {
        self.map_width as f32 / self.map_height as f32
    }

    pub fn face_count(&self) -> usize {
        self.camera.face_count()
    }

    pub fn projection(&self) -> Result<Projection> {
        self.camera.projection(self.aspect())
    }

    /// Depth textures as written by the last shadow pass.
    pub fn map(&self) -> &ShadowMap {
        &self.map
    }

    pub(crate) fn prepare_map(&mut self) -> &mut ShadowMap {
        let faces = self.face_count();
        self.map
            .ensure(faces, self.map_width as usize, self.map_height as usize);
        &mut self.map
    }
}

/// Non-fatal hints that a shadow configuration will look wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum ShadowDiagnostic {
    /// Orthographic bounds too wide for the map resolution.
    CoarseTexels { light: String, texel_size: f32 },
    /// A caster's bounds reach outside the shadow frustum and will be cropped.
    CasterOutsideFrustum { light: String, caster: String },
    /// Spot shadow FOV is narrower than the light's cone.
    FovNarrowerThanCone { light: String, fov: f32, cone: f32 },
    /// far / near so large that depth precision collapses.
    DepthRangeRatio { light: String, ratio: f32 },
}

impl Display for ShadowDiagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ShadowDiagnostic::CoarseTexels { light, texel_size } => write!(
                f,
                "{}: shadow frustum too large for its map ({:.4} world units per texel), edges will look blocky",
                light, texel_size
            ),
            ShadowDiagnostic::CasterOutsideFrustum { light, caster } => write!(
                f,
                "{}: caster '{}' extends past the shadow frustum, its shadow will be cropped",
                light, caster
            ),
            ShadowDiagnostic::FovNarrowerThanCone { light, fov, cone } => write!(
                f,
                "{}: shadow fov {:.1}° is narrower than the {:.1}° cone",
                light, fov, cone
            ),
            ShadowDiagnostic::DepthRangeRatio { light, ratio } => write!(
                f,
                "{}: far/near ratio {:.0} wastes depth precision",
                light, ratio
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_map_size_is_rejected() {
        let mut shadow = LightShadow::new(ShadowCamera::Cube { near: 0.1, far: 5.0 }).unwrap();
        assert!(shadow.set_map_size(0, 1024).is_err());
        assert_eq!(shadow.map_size(), (1024, 1024));
        shadow.set_map_size(256, 128).unwrap();
        assert_eq!(shadow.aspect(), 2.0);
    }

    #[test]
    fn camera_variant_cannot_change() {
        let mut shadow = LightShadow::new(ShadowCamera::Perspective {
            fov: 30.0,
            near: 1.0,
            far: 6.0,
        })
        .unwrap();
        assert!(shadow
            .set_camera(ShadowCamera::Cube { near: 1.0, far: 6.0 }, "spot")
            .is_err());
        shadow
            .set_camera(
                ShadowCamera::Perspective {
                    fov: 60.0,
                    near: 1.0,
                    far: 6.0,
                },
                "spot",
            )
            .unwrap();
    }

    #[test]
    fn invalid_clip_range_keeps_previous_camera() {
        let mut shadow = LightShadow::new(ShadowCamera::Cube { near: 0.1, far: 5.0 }).unwrap();
        assert!(shadow.set_clip_range(2.0, 1.0).is_err());
        assert_eq!(shadow.camera().clip_range(), (0.1, 5.0));
    }

    #[test]
    fn map_is_reallocated_on_resize() {
        let mut shadow = LightShadow::new(ShadowCamera::Cube { near: 0.1, far: 5.0 }).unwrap();
        shadow.set_map_size(64, 64).unwrap();
        assert_eq!(shadow.prepare_map().face_count(), 6);
        shadow.set_map_size(32, 16).unwrap();
        let map = shadow.prepare_map();
        let face = map.face(5).unwrap();
        assert_eq!((face.width, face.height), (32, 16));
    }

    #[test]
    fn depth_texture_keeps_nearest() {
        let mut tex = DepthTexture::new(4, 4);
        tex.write(1, 2, 0.7);
        tex.write(1, 2, 0.9);
        assert_eq!(tex.texel(1, 2), 0.7);
        assert_eq!(tex.texel(-5, 99), tex.texel(0, 3));
        tex.clear();
        assert_eq!(tex.texel(1, 2), 1.0);
    }

    #[test]
    fn dominant_axis_picks_face() {
        assert_eq!(CubeFace::containing(Vec3::new(0.2, -3.0, 1.0)), CubeFace::NegativeY);
        assert_eq!(CubeFace::containing(Vec3::new(2.0, 1.0, -1.0)), CubeFace::PositiveX);
        assert_eq!(CubeFace::containing(Vec3::new(0.0, 0.1, -1.0)), CubeFace::NegativeZ);
    }
}
