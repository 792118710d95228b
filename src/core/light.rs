//! Light sources and the projection each one renders its shadow pass with.

use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};

use super::color::Color;
use super::graph::{NodeId, SceneGraph};
use super::shadow::{
    CubeFace, LightShadow, ShadowCamera, ShadowDiagnostic, COARSE_TEXEL_THRESHOLD,
    DEPTH_RATIO_THRESHOLD,
};
use super::transform::stable_up;
use crate::error::{ConfigError, Result};

/// Widest default spot shadow frustum, in degrees.
const MAX_SPOT_SHADOW_FOV: f32 = 179.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub(crate) usize);

impl LightId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a light is. Positions come from the light's scene node; targets are
/// world-space points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Uniform light from everywhere.
    Ambient,
    /// Parallel rays travelling from the node position towards `target`.
    Directional { target: Vec3 },
    /// Light in every direction. `distance` 0 means no cutoff.
    Point { distance: f32, decay: f32 },
    /// A cone from the node towards `target`. `angle` is the half-angle in
    /// radians (at most π/2), `penumbra` the fraction of it that fades out.
    Spot {
        target: Vec3,
        distance: f32,
        angle: f32,
        penumbra: f32,
        decay: f32,
    },
    /// Sky colour from above blended to `ground_color` from below.
    Hemisphere { ground_color: Color },
    /// Rectangular emitter facing the node's -Z. Lights Standard materials only.
    RectArea { width: f32, height: f32 },
}

impl LightKind {
    pub fn name(&self) -> &'static str {
        match self {
            LightKind::Ambient => "ambient",
            LightKind::Directional { .. } => "directional",
            LightKind::Point { .. } => "point",
            LightKind::Spot { .. } => "spot",
            LightKind::Hemisphere { .. } => "hemisphere",
            LightKind::RectArea { .. } => "rect area",
        }
    }

    pub fn supports_shadow(&self) -> bool {
        matches!(
            self,
            LightKind::Directional { .. } | LightKind::Point { .. } | LightKind::Spot { .. }
        )
    }

    /// Shadow camera a light of this kind starts out with. A spot cone of
    /// pi/2 would need a 180° frustum, so the fov is capped just below it.
    fn default_shadow_camera(&self) -> Option<ShadowCamera> {
        match *self {
            LightKind::Directional { .. } => Some(ShadowCamera::Orthographic {
                left: -5.0,
                right: 5.0,
                top: 5.0,
                bottom: -5.0,
                near: 0.5,
                far: 500.0,
            }),
            LightKind::Spot { angle, .. } => Some(ShadowCamera::Perspective {
                fov: (2.0 * angle).to_degrees().min(MAX_SPOT_SHADOW_FOV),
                near: 0.5,
                far: 500.0,
            }),
            LightKind::Point { .. } => Some(ShadowCamera::Cube {
                near: 0.5,
                far: 500.0,
            }),
            LightKind::Ambient | LightKind::Hemisphere { .. } | LightKind::RectArea { .. } => None,
        }
    }

    /// Inverse-power falloff with an optional smooth cutoff at `distance`.
    pub fn distance_attenuation(&self, dist: f32) -> f32 {
        match *self {
            LightKind::Point { distance, decay } | LightKind::Spot { distance, decay, .. } => {
                let mut falloff = 1.0 / dist.powf(decay).max(0.01);
                if distance > 0.0 {
                    let r = (dist / distance).powi(4);
                    falloff *= (1.0 - r).clamp(0.0, 1.0).powi(2);
                }
                falloff
            }
            _ => 1.0,
        }
    }

    /// Cone falloff for spot lights given the cosine between the spot axis and
    /// the direction to the fragment. 1 for every other kind.
    pub fn cone_attenuation(&self, cos_angle: f32) -> f32 {
        match *self {
            LightKind::Spot {
                angle, penumbra, ..
            } => {
                let cone_cos = angle.cos();
                let penumbra_cos = (angle * (1.0 - penumbra)).cos();
                smoothstep(cone_cos, penumbra_cos, cos_angle)
            }
            _ => 1.0,
        }
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge0 >= edge1 {
        return if x >= edge0 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[derive(Debug, Clone)]
pub struct Light {
    pub name: String,
    pub color: Color,
    intensity: f32,
    kind: LightKind,
    pub node: NodeId,
    cast_shadow: bool,
    shadow: Option<LightShadow>,
}

impl Light {
    pub fn new(name: &str, kind: LightKind, color: Color, intensity: f32, node: NodeId) -> Result<Self> {
        if let LightKind::Spot { angle, penumbra, .. } = kind {
            validate_cone(angle, penumbra)?;
        }
        let mut light = Self {
            name: name.to_string(),
            color,
            intensity: 0.0,
            kind,
            node,
            cast_shadow: false,
            shadow: None,
        };
        light.set_intensity(intensity)?;
        Ok(light)
    }

    pub fn kind(&self) -> &LightKind {
        &self.kind
    }

    /// Edit kind-specific parameters. The kind itself cannot change.
    pub fn update_kind<F: FnOnce(&mut LightKind)>(&mut self, f: F) -> Result<()> {
        let mut kind = self.kind;
        f(&mut kind);
        if std::mem::discriminant(&kind) != std::mem::discriminant(&self.kind) {
            return Err(ConfigError::KindChange {
                kind: self.kind.name(),
            }
            .into());
        }
        if let LightKind::Spot { angle, penumbra, .. } = kind {
            validate_cone(angle, penumbra)?;
        }
        self.kind = kind;
        Ok(())
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn set_intensity(&mut self, intensity: f32) -> Result<()> {
        if !(intensity >= 0.0 && intensity.is_finite()) {
            return Err(ConfigError::NegativeIntensity(intensity).into());
        }
        self.intensity = intensity;
        Ok(())
    }

    pub fn casts_shadow(&self) -> bool {
        self.cast_shadow
    }

    /// Turning shadows on for a kind that cannot cast them is an error. The
    /// shadow settings survive turning shadows off again.
    pub fn set_cast_shadow(&mut self, enabled: bool) -> Result<()> {
        if !enabled {
            self.cast_shadow = false;
            return Ok(());
        }
        let camera = self
            .kind
            .default_shadow_camera()
            .ok_or(ConfigError::ShadowUnsupported {
                kind: self.kind.name(),
            })?;
        if self.shadow.is_none() {
            self.shadow = Some(LightShadow::new(camera)?);
        }
        self.cast_shadow = true;
        Ok(())
    }

    pub fn shadow(&self) -> Option<&LightShadow> {
        self.shadow.as_ref()
    }

    pub fn shadow_mut(&mut self) -> Option<&mut LightShadow> {
        self.shadow.as_mut()
    }

    /// Shadow settings of a light that currently casts shadows.
    pub(crate) fn active_shadow_mut(&mut self) -> Option<&mut LightShadow> {
        if self.cast_shadow {
            self.shadow.as_mut()
        } else {
            None
        }
    }

    /// Replace the shadow camera; its variant must match the light kind.
    pub fn set_shadow_camera(&mut self, camera: ShadowCamera) -> Result<()> {
        let kind = self.kind.name();
        match self.shadow.as_mut() {
            Some(shadow) => shadow.set_camera(camera, kind),
            None => Err(ConfigError::ShadowUnsupported { kind }.into()),
        }
    }

    pub fn face_count(&self) -> usize {
        self.shadow.as_ref().map_or(0, LightShadow::face_count)
    }

    pub fn position(&self, graph: &SceneGraph) -> Result<Vec3> {
        Ok(graph.world_matrix(self.node)?.w_axis.truncate())
    }

    /// Unit vector the light travels along, for lights that have one.
    pub fn direction(&self, graph: &SceneGraph) -> Result<Option<Vec3>> {
        let dir = match self.kind {
            LightKind::Directional { target } | LightKind::Spot { target, .. } => {
                Some((target - self.position(graph)?).normalize_or_zero())
            }
            LightKind::RectArea { .. } => Some(
                graph
                    .world_matrix(self.node)?
                    .transform_vector3(Vec3::NEG_Z)
                    .normalize_or_zero(),
            ),
            _ => None,
        };
        Ok(dir)
    }

    /// View matrix the shadow pass renders face `face` from.
    pub fn shadow_view(&self, face: usize, graph: &SceneGraph) -> Result<Mat4> {
        let faces = self.face_count();
        if face >= faces {
            return Err(ConfigError::InvalidShadowFace { face, faces }.into());
        }
        let eye = self.position(graph)?;
        match self.kind {
            LightKind::Directional { target } | LightKind::Spot { target, .. } => {
                let forward = target - eye;
                if forward.length_squared() <= f32::EPSILON * f32::EPSILON {
                    return Err(ConfigError::LightAtTarget {
                        light: self.name.clone(),
                    }
                    .into());
                }
                Ok(Mat4::look_at_rh(eye, target, stable_up(forward)))
            }
            LightKind::Point { .. } => {
                let face = CubeFace::ALL[face];
                Ok(Mat4::look_at_rh(eye, eye + face.direction(), face.up()))
            }
            LightKind::Ambient | LightKind::Hemisphere { .. } | LightKind::RectArea { .. } => {
                Err(ConfigError::ShadowUnsupported {
                    kind: self.kind.name(),
                }
                .into())
            }
        }
    }

    /// World to light clip space for one face of the shadow map.
    pub fn shadow_view_projection(&self, face: usize, graph: &SceneGraph) -> Result<Mat4> {
        let view = self.shadow_view(face, graph)?;
        let projection = match self.shadow.as_ref() {
            Some(shadow) => shadow.projection()?,
            None => {
                return Err(ConfigError::ShadowUnsupported {
                    kind: self.kind.name(),
                }
                .into())
            }
        };
        Ok(projection.matrix() * view)
    }

    /// Shadow face a world-space point falls in.
    pub fn face_for(&self, world: Vec3, light_pos: Vec3) -> usize {
        match self.kind {
            LightKind::Point { .. } => CubeFace::containing(world - light_pos) as usize,
            _ => 0,
        }
    }

    /// Precision hints for the current shadow setup. `casters` are world-space
    /// bounding spheres as (name, center, radius).
    pub fn shadow_diagnostics(
        &self,
        graph: &SceneGraph,
        casters: &[(String, Vec3, f32)],
    ) -> Result<Vec<ShadowDiagnostic>> {
        let mut out = Vec::new();
        let shadow = match (&self.shadow, self.cast_shadow) {
            (Some(shadow), true) => shadow,
            _ => return Ok(out),
        };
        let (map_w, map_h) = shadow.map_size();
        let eye = self.position(graph)?;

        match (*shadow.camera(), self.kind) {
            (
                ShadowCamera::Orthographic {
                    left,
                    right,
                    top,
                    bottom,
                    near,
                    far,
                },
                _,
            ) => {
                let texel_size = ((right - left) / map_w as f32)
                    .abs()
                    .max(((top - bottom) / map_h as f32).abs());
                if texel_size > COARSE_TEXEL_THRESHOLD {
                    out.push(ShadowDiagnostic::CoarseTexels {
                        light: self.name.clone(),
                        texel_size,
                    });
                }
                let view = self.shadow_view(0, graph)?;
                for (name, center, radius) in casters {
                    let c = view.transform_point3(*center);
                    let depth = -c.z;
                    let outside = c.x - radius < left.min(right)
                        || c.x + radius > left.max(right)
                        || c.y - radius < bottom.min(top)
                        || c.y + radius > bottom.max(top)
                        || depth - radius < near
                        || depth + radius > far;
                    if outside {
                        out.push(ShadowDiagnostic::CasterOutsideFrustum {
                            light: self.name.clone(),
                            caster: name.clone(),
                        });
                    }
                }
            }
            (ShadowCamera::Perspective { fov, near, far }, kind) => {
                if let LightKind::Spot { angle, .. } = kind {
                    let cone = (2.0 * angle).to_degrees();
                    if fov + 1e-3 < cone {
                        out.push(ShadowDiagnostic::FovNarrowerThanCone {
                            light: self.name.clone(),
                            fov,
                            cone,
                        });
                    }
                }
                self.check_depth_ratio(near, far, &mut out);
                let view = self.shadow_view(0, graph)?;
                let half_fov = (fov * 0.5).to_radians();
                for (name, center, radius) in casters {
                    let c = view.transform_point3(*center);
                    let dist = c.length();
                    let off_axis = if dist > 0.0 {
                        (-c.z / dist).clamp(-1.0, 1.0).acos()
                    } else {
                        0.0
                    };
                    let spread = if dist > *radius {
                        (radius / dist).asin()
                    } else {
                        FRAC_PI_2
                    };
                    let outside = -c.z - radius < near
                        || -c.z + radius > far
                        || off_axis + spread > half_fov;
                    if outside {
                        out.push(ShadowDiagnostic::CasterOutsideFrustum {
                            light: self.name.clone(),
                            caster: name.clone(),
                        });
                    }
                }
            }
            (ShadowCamera::Cube { near, far }, _) => {
                self.check_depth_ratio(near, far, &mut out);
                for (name, center, radius) in casters {
                    let dist = center.distance(eye);
                    if dist - radius < near || dist + radius > far {
                        out.push(ShadowDiagnostic::CasterOutsideFrustum {
                            light: self.name.clone(),
                            caster: name.clone(),
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    fn check_depth_ratio(&self, near: f32, far: f32, out: &mut Vec<ShadowDiagnostic>) {
        let ratio = far / near;
        if ratio > DEPTH_RATIO_THRESHOLD {
            out.push(ShadowDiagnostic::DepthRangeRatio {
                light: self.name.clone(),
                ratio,
            });
        }
    }
}

fn validate_cone(angle: f32, penumbra: f32) -> Result<()> {
    if !(angle > 0.0 && angle <= FRAC_PI_2 && (0.0..=1.0).contains(&penumbra)) {
        return Err(ConfigError::InvalidCone { angle, penumbra }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transform::Transform;
    use crate::error::Error;
    use glam::Vec4;
    use std::f32::consts::PI;

    fn light_at(pos: Vec3, kind: LightKind) -> (SceneGraph, Light) {
        let mut graph = SceneGraph::new();
        let node = graph
            .add_node(graph.root(), "light", Transform::from_position(pos))
            .unwrap();
        graph.update_world_matrices();
        let light = Light::new("light", kind, Color::WHITE, 0.3, node).unwrap();
        (graph, light)
    }

    #[test]
    fn ambient_light_cannot_cast_shadows() {
        let (_, mut light) = light_at(Vec3::ZERO, LightKind::Ambient);
        let err = light.set_cast_shadow(true).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::ShadowUnsupported { kind: "ambient" })
        ));
        assert!(!light.casts_shadow());

        let (_, mut area) = light_at(Vec3::ZERO, LightKind::RectArea { width: 1.0, height: 1.0 });
        assert!(area.set_cast_shadow(true).is_err());
        // Disabling is always fine.
        area.set_cast_shadow(false).unwrap();
    }

    #[test]
    fn negative_intensity_is_rejected() {
        let (_, mut light) = light_at(Vec3::ZERO, LightKind::Ambient);
        assert!(light.set_intensity(-1.0).is_err());
        assert_eq!(light.intensity(), 0.3);
    }

    #[test]
    fn directional_frustum_matches_orthographic_formula() {
        let (graph, mut light) = light_at(
            Vec3::new(2.0, 2.0, -1.0),
            LightKind::Directional { target: Vec3::ZERO },
        );
        light.set_cast_shadow(true).unwrap();
        light
            .set_shadow_camera(ShadowCamera::Orthographic {
                left: -2.0,
                right: 2.0,
                top: 2.0,
                bottom: -2.0,
                near: 1.0,
                far: 6.0,
            })
            .unwrap();

        let projection = light.shadow().unwrap().projection().unwrap().matrix();
        let (l, r, t, b, n, f) = (-2.0f32, 2.0f32, 2.0f32, -2.0f32, 1.0f32, 6.0f32);
        let expected = Mat4::from_cols(
            Vec4::new(2.0 / (r - l), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / (t - b), 0.0, 0.0),
            Vec4::new(0.0, 0.0, -2.0 / (f - n), 0.0),
            Vec4::new(-(r + l) / (r - l), -(t + b) / (t - b), -(f + n) / (f - n), 1.0),
        );
        assert!(projection.abs_diff_eq(expected, 1e-6));
        assert!((projection.z_axis.z + 0.4).abs() < 1e-6);
        assert!((projection.w_axis.z + 1.4).abs() < 1e-6);

        // The target projects to the centre of the map.
        let vp = light.shadow_view_projection(0, &graph).unwrap();
        let ndc = vp.project_point3(Vec3::ZERO);
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(light.shadow_view_projection(1, &graph).is_err());
    }

    #[test]
    fn point_light_has_six_ninety_degree_faces() {
        for (near, far) in [(0.1, 5.0), (1.0, 100.0)] {
            let (graph, mut light) = light_at(
                Vec3::new(-1.0, 1.0, 0.0),
                LightKind::Point {
                    distance: 0.0,
                    decay: 2.0,
                },
            );
            light.set_cast_shadow(true).unwrap();
            light.shadow_mut().unwrap().set_clip_range(near, far).unwrap();
            assert_eq!(light.face_count(), 6);

            let expected = Mat4::perspective_rh_gl(FRAC_PI_2, 1.0, near, far);
            for face in 0..6 {
                let vp = light.shadow_view_projection(face, &graph).unwrap();
                let view = light.shadow_view(face, &graph).unwrap();
                assert!((vp * view.inverse()).abs_diff_eq(expected, 1e-4));
            }
            assert!(light.shadow_view_projection(6, &graph).is_err());
        }
    }

    #[test]
    fn point_faces_cover_their_axis() {
        let pos = Vec3::new(-1.0, 1.0, 0.0);
        let (graph, mut light) = light_at(pos, LightKind::Point { distance: 0.0, decay: 2.0 });
        light.set_cast_shadow(true).unwrap();
        for face in CubeFace::ALL {
            let vp = light.shadow_view_projection(face as usize, &graph).unwrap();
            let ndc = vp.project_point3(pos + face.direction());
            assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4, "{:?}", face);
            assert_eq!(light.face_for(pos + face.direction() * 2.0, pos), face as usize);
        }
    }

    #[test]
    fn spot_shadow_defaults_to_the_cone() {
        let (graph, mut light) = light_at(
            Vec3::new(0.0, 2.0, 2.0),
            LightKind::Spot {
                target: Vec3::ZERO,
                distance: 10.0,
                angle: PI * 0.3,
                penumbra: 0.0,
                decay: 2.0,
            },
        );
        light.set_cast_shadow(true).unwrap();
        match light.shadow().unwrap().camera() {
            ShadowCamera::Perspective { fov, .. } => assert!((fov - 108.0).abs() < 1e-3),
            other => panic!("unexpected camera {:?}", other),
        }
        assert!(light.shadow_diagnostics(&graph, &[]).unwrap().is_empty());

        light
            .set_shadow_camera(ShadowCamera::Perspective {
                fov: 30.0,
                near: 1.0,
                far: 6.0,
            })
            .unwrap();
        let diagnostics = light.shadow_diagnostics(&graph, &[]).unwrap();
        assert!(matches!(
            diagnostics.as_slice(),
            [ShadowDiagnostic::FovNarrowerThanCone { .. }]
        ));
    }

    #[test]
    fn widest_spot_cone_still_casts() {
        let (graph, mut light) = light_at(
            Vec3::new(0.0, 2.0, 2.0),
            LightKind::Spot {
                target: Vec3::ZERO,
                distance: 10.0,
                angle: FRAC_PI_2,
                penumbra: 0.0,
                decay: 2.0,
            },
        );
        light.set_cast_shadow(true).unwrap();
        match light.shadow().unwrap().camera() {
            ShadowCamera::Perspective { fov, .. } => assert_eq!(*fov, MAX_SPOT_SHADOW_FOV),
            other => panic!("unexpected camera {:?}", other),
        }
        assert!(light.shadow_view_projection(0, &graph).unwrap().is_finite());
        let diagnostics = light.shadow_diagnostics(&graph, &[]).unwrap();
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, ShadowDiagnostic::FovNarrowerThanCone { .. })));
    }

    #[test]
    fn light_on_its_target_has_no_shadow_view() {
        for kind in [
            LightKind::Directional { target: Vec3::ONE },
            LightKind::Spot {
                target: Vec3::ONE,
                distance: 0.0,
                angle: PI / 4.0,
                penumbra: 0.0,
                decay: 2.0,
            },
        ] {
            let (graph, mut light) = light_at(Vec3::ONE, kind);
            light.set_cast_shadow(true).unwrap();
            let err = light.shadow_view(0, &graph).unwrap_err();
            assert!(
                matches!(&err, Error::Config(ConfigError::LightAtTarget { light }) if light == "light"),
                "{:?}",
                err
            );
            assert!(light.shadow_view_projection(0, &graph).is_err());
            assert!(light.shadow_diagnostics(&graph, &[]).is_err());
        }
    }

    #[test]
    fn oversized_frustum_and_cropped_casters_are_diagnosed() {
        let (graph, mut light) = light_at(
            Vec3::new(2.0, 2.0, -1.0),
            LightKind::Directional { target: Vec3::ZERO },
        );
        light.set_cast_shadow(true).unwrap();
        light
            .set_shadow_camera(ShadowCamera::Orthographic {
                left: -50.0,
                right: 50.0,
                top: 50.0,
                bottom: -50.0,
                near: 1.0,
                far: 6.0,
            })
            .unwrap();
        light.shadow_mut().unwrap().set_map_size(512, 512).unwrap();
        let casters = vec![
            ("sphere".to_string(), Vec3::ZERO, 0.5),
            ("far away".to_string(), Vec3::new(-20.0, -20.0, 10.0), 0.5),
        ];
        let diagnostics = light.shadow_diagnostics(&graph, &casters).unwrap();
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, ShadowDiagnostic::CoarseTexels { .. })));
        let cropped: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| match d {
                ShadowDiagnostic::CasterOutsideFrustum { caster, .. } => Some(caster.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(cropped, vec!["far away"]);
    }

    #[test]
    fn spot_cone_fades_across_penumbra() {
        let kind = LightKind::Spot {
            target: Vec3::ZERO,
            distance: 0.0,
            angle: PI / 4.0,
            penumbra: 0.5,
            decay: 2.0,
        };
        assert_eq!(kind.cone_attenuation(1.0), 1.0);
        assert_eq!(kind.cone_attenuation((PI / 3.0).cos()), 0.0);
        let mid = kind.cone_attenuation((PI * 0.1875).cos());
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn point_light_cutoff_distance() {
        let kind = LightKind::Point {
            distance: 5.0,
            decay: 2.0,
        };
        assert_eq!(kind.distance_attenuation(6.0), 0.0);
        assert!((kind.distance_attenuation(1.0) - (1.0 - 1.0 / 625.0f32).powi(2)).abs() < 1e-5);
    }
}
