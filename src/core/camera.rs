use std::cell::Cell;

use glam::Mat4;

use super::graph::{NodeId, SceneGraph};
use crate::error::{ConfigError, Result};

/// Projection parameters. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in degrees.
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Result<Self> {
        let p = Projection::Perspective {
            fov_y,
            aspect,
            near,
            far,
        };
        p.validate()?;
        Ok(p)
    }

    pub fn orthographic(
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) -> Result<Self> {
        let p = Projection::Orthographic {
            left,
            right,
            top,
            bottom,
            near,
            far,
        };
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<()> {
        let (near, far) = self.clip_range();
        if !(near > 0.0 && far > near) {
            return Err(ConfigError::InvalidClipRange { near, far }.into());
        }
        match *self {
            Projection::Perspective { fov_y, aspect, .. } => {
                if !(aspect > 0.0 && aspect.is_finite()) {
                    return Err(ConfigError::InvalidAspect(aspect).into());
                }
                if !(fov_y > 0.0 && fov_y < 180.0) {
                    return Err(ConfigError::InvalidFov(fov_y).into());
                }
            }
            Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                ..
            } => {
                if left == right || top == bottom {
                    return Err(ConfigError::DegenerateFrustum {
                        left,
                        right,
                        top,
                        bottom,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    pub fn clip_range(&self) -> (f32, f32) {
        match *self {
            Projection::Perspective { near, far, .. } => (near, far),
            Projection::Orthographic { near, far, .. } => (near, far),
        }
    }

    /// OpenGL-style clip space (z in [-1, 1]), right handed.
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh_gl(fov_y.to_radians(), aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => Mat4::orthographic_rh_gl(left, right, bottom, top, near, far),
        }
    }
}

/// A camera attached to a scene node. The view matrix is the inverse of the
/// node's world matrix; the projection matrix is cached until a parameter
/// changes.
#[derive(Debug, Clone)]
pub struct Camera {
    pub node: NodeId,
    projection: Projection,
    proj_dirty: Cell<bool>,
    projection_matrix: Cell<Mat4>,
}

impl Camera {
    pub fn new(node: NodeId, projection: Projection) -> Result<Self> {
        projection.validate()?;
        Ok(Self {
            node,
            projection,
            proj_dirty: Cell::new(true),
            projection_matrix: Cell::new(Mat4::IDENTITY),
        })
    }

    /// Perspective camera; `fov_y` in degrees.
    pub fn perspective(node: NodeId, fov_y: f32, aspect: f32, near: f32, far: f32) -> Result<Self> {
        Self::new(node, Projection::perspective(fov_y, aspect, near, far)?)
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Replace the projection wholesale. Invalid parameters leave the camera untouched.
    pub fn set_projection(&mut self, projection: Projection) -> Result<()> {
        projection.validate()?;
        self.projection = projection;
        self.proj_dirty.set(true);
        Ok(())
    }

    /// Edit the projection in place, validating the result.
    pub fn update_projection<F: FnOnce(&mut Projection)>(&mut self, f: F) -> Result<()> {
        let mut projection = self.projection;
        f(&mut projection);
        self.set_projection(projection)
    }

    pub fn set_clip_range(&mut self, near: f32, far: f32) -> Result<()> {
        self.update_projection(|p| match p {
            Projection::Perspective {
                near: n, far: f, ..
            }
            | Projection::Orthographic {
                near: n, far: f, ..
            } => {
                *n = near;
                *f = far;
            }
        })
    }

    /// Only meaningful for perspective cameras; orthographic bounds are left alone.
    pub fn set_aspect(&mut self, aspect: f32) -> Result<()> {
        if !(aspect > 0.0 && aspect.is_finite()) {
            return Err(ConfigError::InvalidAspect(aspect).into());
        }
        self.update_projection(|p| {
            if let Projection::Perspective { aspect: a, .. } = p {
                *a = aspect;
            }
        })
    }

    /// React to an output surface resize.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroSurfaceSize { width, height }.into());
        }
        self.set_aspect(width as f32 / height as f32)
    }

    pub fn aspect(&self) -> Option<f32> {
        match self.projection {
            Projection::Perspective { aspect, .. } => Some(aspect),
            Projection::Orthographic { .. } => None,
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        if self.proj_dirty.get() {
            self.projection_matrix.set(self.projection.matrix());
            self.proj_dirty.set(false);
        }
        self.projection_matrix.get()
    }

    pub fn view_matrix(&self, graph: &SceneGraph) -> Result<Mat4> {
        Ok(graph.world_matrix(self.node)?.inverse())
    }

    pub fn view_projection(&self, graph: &SceneGraph) -> Result<Mat4> {
        Ok(self.projection_matrix() * self.view_matrix(graph)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transform::Transform;
    use glam::{Vec3, Vec4};

    fn camera() -> (SceneGraph, Camera) {
        let mut graph = SceneGraph::new();
        let node = graph
            .add_node(graph.root(), "camera", Transform::looking_at(Vec3::new(1.0, 1.0, 2.0), Vec3::ZERO))
            .unwrap();
        let cam = Camera::perspective(node, 75.0, 800.0 / 600.0, 0.1, 100.0).unwrap();
        (graph, cam)
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(Projection::perspective(75.0, 1.0, 0.0, 10.0).is_err());
        assert!(Projection::perspective(75.0, 1.0, 5.0, 1.0).is_err());
        assert!(Projection::perspective(75.0, 0.0, 0.1, 10.0).is_err());
        assert!(Projection::perspective(190.0, 1.0, 0.1, 10.0).is_err());
        assert!(Projection::orthographic(1.0, 1.0, 1.0, -1.0, 0.1, 10.0).is_err());
    }

    #[test]
    fn projection_reflects_changes_on_next_read() {
        let (_, mut cam) = camera();
        let before = cam.projection_matrix();
        cam.set_clip_range(0.5, 50.0).unwrap();
        let after = cam.projection_matrix();
        assert_ne!(before, after);
        assert_eq!(after, Mat4::perspective_rh_gl(75f32.to_radians(), 800.0 / 600.0, 0.5, 50.0));

        cam.set_aspect(2.0).unwrap();
        assert_eq!(cam.projection_matrix().x_axis.x, after.y_axis.y / 2.0);
    }

    #[test]
    fn failed_update_leaves_camera_untouched() {
        let (_, mut cam) = camera();
        let before = *cam.projection();
        assert!(cam.set_clip_range(-1.0, 10.0).is_err());
        assert_eq!(*cam.projection(), before);
    }

    #[test]
    fn resize_recomputes_aspect() {
        let (_, mut cam) = camera();
        cam.resize(1920, 1080).unwrap();
        assert_eq!(cam.aspect(), Some(1920.0 / 1080.0));
        assert!(cam.resize(0, 1080).is_err());
    }

    #[test]
    fn view_matrix_is_inverse_world() {
        let (mut graph, cam) = camera();
        graph.update_world_matrices();
        let view = cam.view_matrix(&graph).unwrap();
        // The camera position maps to the view-space origin.
        let origin = view * Vec4::new(1.0, 1.0, 2.0, 1.0);
        assert!(origin.truncate().abs_diff_eq(Vec3::ZERO, 1e-5));
        // The look-at target sits straight ahead on -Z.
        let target = view.transform_point3(Vec3::ZERO);
        assert!(target.x.abs() < 1e-5 && target.y.abs() < 1e-5 && target.z < 0.0);
    }
}
