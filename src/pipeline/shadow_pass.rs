//! Depth-only passes rendering every shadow caster from each shadow-casting
//! light into that light's depth texture(s).

use glam::Mat4;
use log::{debug, trace};

use super::clipper::{Clipper, CullMode};
use super::rasterizer::Rasterizer;
use super::{vertex_stage, FrameReport, PassKind, PassRecord};
use crate::core::light::LightId;
use crate::core::material::DepthMaterial;
use crate::core::scene::MeshHandle;
use crate::core::shadow::ShadowMap;
use crate::core::Scene;
use crate::error::Result;

/// One light's worth of depth rendering: its map, taken out of the light for
/// the duration of the pass, and the matrix of every face.
struct ShadowJob {
    light: LightId,
    map: ShadowMap,
    view_projections: Vec<Mat4>,
}

pub struct ShadowPass {
    material: DepthMaterial,
    clipper: Clipper,
}

impl Default for ShadowPass {
    fn default() -> Self {
        Self {
            material: DepthMaterial,
            // Single-sided casters must still occlude from behind.
            clipper: Clipper::with_cull_mode(CullMode::None),
        }
    }
}

impl ShadowPass {
    /// Render all faces of all shadow-casting lights, appending one record per
    /// face to `report`. Every map is cleared and redrawn; nothing is cached
    /// across frames.
    pub fn render(&self, scene: &mut Scene, report: &mut FrameReport) -> Result<()> {
        let mut jobs = self.prepare(scene)?;
        let drawn = self.draw(scene, &mut jobs, report);

        // Hand the maps back even when drawing failed.
        for job in jobs {
            if let Some(shadow) = scene.light_mut(job.light)?.shadow_mut() {
                shadow.map = job.map;
            }
        }
        drawn
    }

    fn prepare(&self, scene: &mut Scene) -> Result<Vec<ShadowJob>> {
        let mut plans = Vec::new();
        for (index, light) in scene.lights().iter().enumerate() {
            if !light.casts_shadow() {
                continue;
            }
            let view_projections = (0..light.face_count())
                .map(|face| light.shadow_view_projection(face, &scene.graph))
                .collect::<Result<Vec<_>>>()?;
            plans.push((LightId(index), view_projections));
        }

        let mut jobs = Vec::with_capacity(plans.len());
        for (light, view_projections) in plans {
            if let Some(shadow) = scene.light_mut(light)?.active_shadow_mut() {
                let map = std::mem::take(shadow.prepare_map());
                jobs.push(ShadowJob {
                    light,
                    map,
                    view_projections,
                });
            }
        }
        Ok(jobs)
    }

    fn draw(&self, scene: &Scene, jobs: &mut [ShadowJob], report: &mut FrameReport) -> Result<()> {
        let mut casters: Vec<(MeshHandle, Mat4)> = Vec::new();
        for instance in scene.instances().iter().filter(|i| i.visible && i.cast_shadow) {
            casters.push((instance.mesh, scene.graph.world_matrix(instance.node)?));
        }

        for job in jobs.iter_mut() {
            for (face, view_projection) in job.view_projections.iter().enumerate() {
                let Some(target) = job.map.bind_face(face, *view_projection) else {
                    continue;
                };
                target.clear();
                let rasterizer = Rasterizer::new(target.width, target.height);

                let mut fragments = 0;
                for (mesh, model) in &casters {
                    let mesh = scene.mesh(*mesh)?;
                    let tris = vertex_stage(mesh, *model, *view_projection, &self.clipper);
                    for frag in rasterizer.rasterize(&tris) {
                        self.material.write(target, frag.x, frag.y, frag.depth);
                        fragments += 1;
                    }
                }
                trace!(
                    "shadow face {} of light {} : {} fragments",
                    face,
                    job.light.index(),
                    fragments
                );
                report.passes.push(PassRecord {
                    kind: PassKind::Shadow {
                        light: job.light,
                        face,
                    },
                    target: (target.width, target.height),
                    view_projection: *view_projection,
                    draws: casters.len(),
                    fragments,
                });
            }
        }
        debug!(
            "shadow pass: {} light(s), {} caster(s)",
            jobs.len(),
            casters.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transform::{EulerOrder, Transform};
    use crate::core::{Color, LightKind, Material, Mesh, Projection, ShadowCamera};
    use crate::pipeline::ShadowFilter;
    use glam::Vec3;
    use std::f32::consts::FRAC_PI_2;

    /// Light straight above a 1×1 occluder at y = 0.
    fn occluder_scene() -> (Scene, LightId) {
        let mut scene = Scene::new(Projection::perspective(75.0, 1.0, 0.1, 100.0).unwrap()).unwrap();
        let plane = scene.add_mesh(Mesh::plane(1.0, 1.0)).unwrap();
        let material = scene.add_material(Material::default());
        let floor = Transform::from_euler(Vec3::ZERO, EulerOrder::XYZ, Vec3::new(-FRAC_PI_2, 0.0, 0.0));
        let occluder = scene.spawn(None, "occluder", floor, plane, material).unwrap();
        scene.instance_mut(occluder).unwrap().cast_shadow = true;

        let light = scene
            .add_light_at(
                "sun",
                LightKind::Directional { target: Vec3::ZERO },
                Color::WHITE,
                1.0,
                Vec3::new(0.0, 5.0, 0.0),
            )
            .unwrap();
        let sun = scene.light_mut(light).unwrap();
        sun.set_cast_shadow(true).unwrap();
        sun.set_shadow_camera(ShadowCamera::Orthographic {
            left: -2.0,
            right: 2.0,
            top: 2.0,
            bottom: -2.0,
            near: 1.0,
            far: 10.0,
        })
        .unwrap();
        sun.shadow_mut().unwrap().set_map_size(64, 64).unwrap();
        scene.update_world_matrices();
        (scene, light)
    }

    fn receiver_sweep(scene: &Scene, light: LightId, filter: ShadowFilter) -> Vec<f32> {
        let light = scene.light(light).unwrap();
        let shadow = light.shadow().unwrap();
        let map = shadow.map().face(0).unwrap();
        let vp = shadow.map().view_projection(0).unwrap();
        (0..=200)
            .map(|i| {
                let world = Vec3::new(-1.0 + i as f32 * 0.01, -1.0, 0.013);
                filter.lit_fraction(map, vp.project_point3(world), shadow.bias, shadow.radius)
            })
            .collect()
    }

    #[test]
    fn depth_written_only_where_casters_are() {
        let (mut scene, light) = occluder_scene();
        let mut report = FrameReport::default();
        ShadowPass::default().render(&mut scene, &mut report).unwrap();

        assert_eq!(report.passes.len(), 1);
        assert!(report.passes[0].fragments > 0);
        let map = scene.light(light).unwrap().shadow().unwrap().map().face(0).unwrap();
        let covered = map.data.iter().filter(|&&d| d < 1.0).count();
        // 1×1 plane in a 4×4 frustum covers about 1/16 of the texels.
        assert!(covered > 64 * 64 / 20 && covered < 64 * 64 / 12, "{}", covered);
        // Occluder sits 5 units from the light: (5 - 1) / (10 - 1).
        let min = map.data.iter().copied().fold(1.0, f32::min);
        assert!((min - 4.0 / 9.0).abs() < 1e-3);
    }

    #[test]
    fn basic_filter_gives_a_binary_edge_and_pcf_softens_it() {
        let (mut scene, light) = occluder_scene();
        ShadowPass::default()
            .render(&mut scene, &mut FrameReport::default())
            .unwrap();

        let basic = receiver_sweep(&scene, light, ShadowFilter::Basic);
        assert!(basic.iter().all(|&s| s == 0.0 || s == 1.0));
        assert!(basic.contains(&0.0) && basic.contains(&1.0));
        // Directly below the occluder is dark, far to the side is lit.
        assert_eq!(basic[100], 0.0);
        assert_eq!(basic[0], 1.0);

        let pcf = receiver_sweep(&scene, light, ShadowFilter::Pcf);
        assert!(pcf.iter().any(|&s| s > 0.0 && s < 1.0));
    }

    #[test]
    fn hidden_casters_do_not_occlude() {
        let (mut scene, light) = occluder_scene();
        for i in 0..scene.instances().len() {
            scene
                .instance_mut(crate::core::scene::InstanceId(i))
                .unwrap()
                .visible = false;
        }
        ShadowPass::default()
            .render(&mut scene, &mut FrameReport::default())
            .unwrap();
        let map = scene.light(light).unwrap().shadow().unwrap().map().face(0).unwrap();
        assert!(map.data.iter().all(|&d| d == 1.0));
    }

    #[test]
    fn bad_mesh_handle_fails_the_pass_but_keeps_the_map() {
        let (mut scene, light) = occluder_scene();
        let node = scene.instances()[0].node;
        let material = scene.instances()[0].material;
        let mut broken = crate::core::MeshInstance::new(MeshHandle(99), material, node);
        broken.cast_shadow = true;
        scene.add_instance(broken).unwrap();

        let err = ShadowPass::default()
            .render(&mut scene, &mut FrameReport::default())
            .unwrap_err();
        assert!(err.is_frame_local());
        assert_eq!(
            scene.light(light).unwrap().shadow().unwrap().map().face_count(),
            1
        );
    }
}
