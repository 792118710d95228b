//! The colour pass: shades every visible mesh instance with its material and
//! the scene's lights, attenuating shadowed light through the depth textures
//! the shadow passes just wrote.

use std::f32::consts::PI;

use glam::{Mat4, Vec3};
use log::debug;
use rayon::prelude::*;

use super::buffer::FrameBuffer;
use super::clipper::{Clipper, CullMode};
use super::filter::ShadowFilter;
use super::rasterizer::{Fragment, Rasterizer};
use super::{vertex_stage, PassKind, PassRecord};
use crate::core::light::{Light, LightKind};
use crate::core::material::{Material, MaterialKind, Side};
use crate::core::shadow::ShadowMap;
use crate::core::{Color, Scene};
use crate::error::Result;

/// Per-frame view of a light, resolved to world space once.
struct LightSample<'a> {
    kind: LightKind,
    color: Color,
    intensity: f32,
    position: Vec3,
    direction: Vec3,
    shadow: Option<ShadowLookup<'a>>,
}

struct ShadowLookup<'a> {
    light: &'a Light,
    map: &'a ShadowMap,
    bias: f32,
    radius: f32,
}

impl ShadowLookup<'_> {
    fn lit_fraction(&self, filter: ShadowFilter, world: Vec3, light_pos: Vec3) -> f32 {
        let face = self.light.face_for(world, light_pos);
        let (Some(map), Some(view_projection)) = (self.map.face(face), self.map.view_projection(face))
        else {
            return 1.0;
        };
        let clip = view_projection * world.extend(1.0);
        // Behind a perspective light: outside its frustum.
        if clip.w <= 0.0 {
            return 1.0;
        }
        filter.lit_fraction(map, clip.truncate() / clip.w, self.bias, self.radius)
    }
}

pub struct MainPass {
    pub filter: ShadowFilter,
}

impl MainPass {
    pub fn new(filter: ShadowFilter) -> Self {
        Self { filter }
    }

    pub fn render(
        &self,
        scene: &Scene,
        frame: &mut FrameBuffer,
        clear_color: Color,
        shadows_enabled: bool,
    ) -> Result<PassRecord> {
        frame.clear(clear_color);
        let view_projection = scene.camera.view_projection(&scene.graph)?;
        let eye = scene.graph.world_matrix(scene.camera.node)?.w_axis.truncate();
        let lights = self.collect_lights(scene, shadows_enabled)?;
        let rasterizer = Rasterizer::new(frame.width, frame.height);

        let mut draws = 0;
        let mut written = 0;
        for instance in scene.instances().iter().filter(|i| i.visible) {
            let mesh = scene.mesh(instance.mesh)?;
            let material = scene.material(instance.material)?;
            let model: Mat4 = scene.graph.world_matrix(instance.node)?;

            let clipper = Clipper::with_cull_mode(match material.side {
                Side::Front => CullMode::Back,
                Side::Back => CullMode::Front,
                Side::Double => CullMode::None,
            });
            let tris = vertex_stage(mesh, model, view_projection, &clipper);
            let fragments = rasterizer.rasterize(&tris);

            // Early depth test against what is already in the frame, then
            // shade the survivors in parallel.
            let frame_ref = &*frame;
            let shaded: Vec<(usize, usize, f32, Color)> = fragments
                .par_iter()
                .filter(|f| frame_ref.passes_depth(f.x, f.y, f.depth))
                .map(|f| {
                    let color = self.shade(material, f, eye, &lights, instance.receive_shadow);
                    (f.x, f.y, f.depth, color)
                })
                .collect();

            for (x, y, depth, color) in shaded {
                if frame.set_pixel((x, y), depth, color) {
                    written += 1;
                }
            }
            draws += 1;
        }
        debug!(
            "main pass: {} draw(s), {} pixel write(s), filter {}",
            draws, written, self.filter
        );

        Ok(PassRecord {
            kind: PassKind::Main,
            target: (frame.width, frame.height),
            view_projection,
            draws,
            fragments: written,
        })
    }

    fn collect_lights<'a>(&self, scene: &'a Scene, shadows_enabled: bool) -> Result<Vec<LightSample<'a>>> {
        let mut out = Vec::with_capacity(scene.lights().len());
        for light in scene.lights() {
            let shadow = match light.shadow() {
                Some(shadow)
                    if shadows_enabled
                        && light.casts_shadow()
                        && shadow.map().face_count() == light.face_count() =>
                {
                    Some(ShadowLookup {
                        light,
                        map: shadow.map(),
                        bias: shadow.bias,
                        radius: shadow.radius,
                    })
                }
                _ => None,
            };
            out.push(LightSample {
                kind: *light.kind(),
                color: light.color,
                intensity: light.intensity(),
                position: light.position(&scene.graph)?,
                direction: light.direction(&scene.graph)?.unwrap_or(Vec3::NEG_Y),
                shadow,
            });
        }
        Ok(out)
    }

    fn shade(
        &self,
        material: &Material,
        frag: &Fragment,
        eye: Vec3,
        lights: &[LightSample],
        receive_shadow: bool,
    ) -> Color {
        let (diffuse, specular) = match material.kind {
            MaterialKind::Basic => return material.color,
            MaterialKind::Lambert => (material.color, None),
            MaterialKind::Standard {
                roughness,
                metalness,
            } => (
                material.color * (1.0 - metalness),
                Some((roughness, Color::new(0.04, 0.04, 0.04).lerp(&material.color, metalness))),
            ),
        };

        let mut n = frag.normal.normalize_or_zero();
        if !frag.front_facing {
            n = -n;
        }
        let v = (eye - frag.world).normalize_or_zero();
        let mut out = Color::BLACK;

        for light in lights {
            let radiance = light.color * light.intensity;
            let (l, attenuation) = match light.kind {
                LightKind::Ambient => {
                    out += diffuse.modulate(&radiance);
                    continue;
                }
                LightKind::Hemisphere { ground_color } => {
                    let sky_weight = n.y * 0.5 + 0.5;
                    let irradiance = ground_color.lerp(&light.color, sky_weight) * light.intensity;
                    out += diffuse.modulate(&irradiance);
                    continue;
                }
                LightKind::Directional { .. } => (-light.direction, 1.0),
                LightKind::Point { .. } => {
                    let to_light = light.position - frag.world;
                    let d = to_light.length();
                    (to_light / d.max(1e-6), light.kind.distance_attenuation(d))
                }
                LightKind::Spot { .. } => {
                    let to_light = light.position - frag.world;
                    let d = to_light.length();
                    let l = to_light / d.max(1e-6);
                    let cone = light.kind.cone_attenuation(light.direction.dot(-l));
                    (l, light.kind.distance_attenuation(d) * cone)
                }
                LightKind::RectArea { width, height } => {
                    // Only physically based materials respond to area lights.
                    if specular.is_none() {
                        continue;
                    }
                    let to_light = light.position - frag.world;
                    let d2 = to_light.length_squared().max(0.01);
                    let l = to_light.normalize_or_zero();
                    let facing = light.direction.dot(-l).max(0.0);
                    (l, facing * width * height / d2)
                }
            };

            let n_dot_l = n.dot(l);
            if n_dot_l <= 0.0 || attenuation <= 0.0 {
                continue;
            }

            let lit = match (&light.shadow, receive_shadow) {
                (Some(lookup), true) => lookup.lit_fraction(self.filter, frag.world, light.position),
                _ => 1.0,
            };
            if lit <= 0.0 {
                continue;
            }

            let incoming = radiance * (attenuation * n_dot_l * lit);
            out += diffuse.modulate(&incoming);

            if let Some((roughness, spec_color)) = specular {
                let h = (l + v).normalize_or_zero();
                let shininess = (2.0 / roughness.powi(4).max(1e-4) - 2.0).clamp(1.0, 2048.0);
                let lobe = n.dot(h).max(0.0).powf(shininess) * (shininess + 8.0) / (8.0 * PI);
                out += spec_color.modulate(&incoming) * lobe;
            }
        }
        out.clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transform::{EulerOrder, Transform};
    use crate::core::{LightKind, Mesh, Projection};
    use crate::pipeline::{FrameReport, ShadowPass};

    fn facing_plane_scene(material: Material) -> Scene {
        let mut scene = Scene::new(Projection::perspective(60.0, 1.0, 0.1, 10.0).unwrap()).unwrap();
        scene.look_from(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO).unwrap();
        let plane = scene.add_mesh(Mesh::plane(2.0, 2.0)).unwrap();
        let material = scene.add_material(material);
        scene
            .spawn(None, "plane", Transform::IDENTITY, plane, material)
            .unwrap();
        scene.update_world_matrices();
        scene
    }

    fn centre(scene: &mut Scene) -> Color {
        let mut frame = FrameBuffer::new(16, 16);
        MainPass::new(ShadowFilter::Pcf)
            .render(scene, &mut frame, Color::BLACK, true)
            .unwrap();
        frame.pixel(8, 8).unwrap()
    }

    #[test]
    fn basic_material_ignores_lights() {
        let mut scene = facing_plane_scene(Material::basic(Color::from_u32(0xff9000)));
        assert_eq!(centre(&mut scene).to_u32(), 0xff9000);
    }

    #[test]
    fn ambient_scales_the_albedo() {
        let mut scene = facing_plane_scene(Material::lambert(Color::WHITE));
        assert_eq!(centre(&mut scene), Color::BLACK);
        scene
            .add_light_at("fill", LightKind::Ambient, Color::WHITE, 0.5, Vec3::ZERO)
            .unwrap();
        let c = centre(&mut scene);
        assert!((c.r - 0.5).abs() < 0.01);
    }

    #[test]
    fn back_side_material_draws_the_far_face() {
        // The camera looks at the plane's front, so a back-only material hides it.
        let mut scene = facing_plane_scene(Material::basic(Color::WHITE).with_side(Side::Back));
        assert_eq!(centre(&mut scene), Color::BLACK);
        let mut scene = facing_plane_scene(Material::basic(Color::WHITE).with_side(Side::Double));
        assert_eq!(centre(&mut scene), Color::WHITE);
    }

    #[test]
    fn spot_cone_limits_the_lit_area() {
        let mut scene = facing_plane_scene(Material::lambert(Color::WHITE));
        scene
            .add_light_at(
                "spot",
                LightKind::Spot {
                    target: Vec3::ZERO,
                    distance: 0.0,
                    angle: 0.1,
                    penumbra: 0.0,
                    decay: 0.0,
                },
                Color::WHITE,
                1.0,
                Vec3::new(0.0, 0.0, 2.0),
            )
            .unwrap();
        scene.update_world_matrices();
        let mut frame = FrameBuffer::new(16, 16);
        MainPass::new(ShadowFilter::Basic)
            .render(&scene, &mut frame, Color::BLACK, true)
            .unwrap();
        assert!(frame.pixel(8, 8).unwrap().r > 0.9);
        // Half a unit off-centre is well outside the 0.1 rad cone.
        assert_eq!(frame.pixel(5, 8), Some(Color::BLACK));
    }

    #[test]
    fn receivers_darken_behind_an_occluder() {
        let mut scene = facing_plane_scene(Material::lambert(Color::WHITE));
        let material = scene.instances()[0].material;
        scene
            .instance_mut(crate::core::scene::InstanceId(0))
            .unwrap()
            .receive_shadow = true;
        // A small occluder between the light and the plane.
        let small = scene.add_mesh(Mesh::plane(0.5, 0.5)).unwrap();
        let occluder = scene
            .spawn(
                None,
                "occluder",
                Transform::from_euler(Vec3::new(0.0, 0.0, 1.0), EulerOrder::XYZ, Vec3::ZERO),
                small,
                material,
            )
            .unwrap();
        scene.instance_mut(occluder).unwrap().cast_shadow = true;
        let sun = scene
            .add_light_at(
                "sun",
                LightKind::Directional { target: Vec3::ZERO },
                Color::WHITE,
                1.0,
                Vec3::new(0.0, 0.0, 3.0),
            )
            .unwrap();
        let light = scene.light_mut(sun).unwrap();
        light.set_cast_shadow(true).unwrap();
        let shadow = light.shadow_mut().unwrap();
        shadow.set_map_size(64, 64).unwrap();
        shadow.set_clip_range(1.0, 6.0).unwrap();
        scene.update_world_matrices();

        ShadowPass::default()
            .render(&mut scene, &mut FrameReport::default())
            .unwrap();
        // Hide the occluder from the camera; its shadow stays in the map.
        scene.instance_mut(occluder).unwrap().visible = false;

        let mut frame = FrameBuffer::new(32, 32);
        let pass = MainPass::new(ShadowFilter::Basic);
        pass.render(&scene, &mut frame, Color::BLACK, true).unwrap();
        let shadowed = frame.pixel(16, 16).unwrap();
        let lit = frame.pixel(16, 10).unwrap();
        assert!(shadowed.r < 0.05, "{:?}", shadowed);
        assert!(lit.r > 0.5, "{:?}", lit);

        // With shadows off the same pixel is lit.
        pass.render(&scene, &mut frame, Color::BLACK, false).unwrap();
        assert!(frame.pixel(16, 16).unwrap().r > 0.5);
    }
}
