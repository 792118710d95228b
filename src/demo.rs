//! The shadows demo scene: a sphere bouncing around a floor, lit by an
//! ambient light and three shadow-casting lights.

use std::f32::consts::PI;

use glam::Vec3;
use log::info;

use crate::clock::FrameTime;
use crate::core::{
    Color, EulerOrder, LightId, LightKind, Material, Mesh, NodeId, Projection, Scene,
    ShadowCamera, Transform,
};
use crate::error::Result;

pub struct DemoScene {
    pub scene: Scene,
    pub sphere: NodeId,
    pub floor: NodeId,
    pub directional: LightId,
    pub spot: LightId,
    pub point: LightId,
}

/// Build the scene for a `width`×`height` target with `map_size` shadow maps.
pub fn build(width: usize, height: usize, map_size: u32) -> Result<DemoScene> {
    let aspect = width as f32 / height.max(1) as f32;
    let mut scene = Scene::new(Projection::perspective(75.0, aspect, 0.1, 100.0)?)?;
    scene.look_from(Vec3::new(1.0, 1.0, 2.0), Vec3::ZERO)?;

    scene.add_light_at("ambient", LightKind::Ambient, Color::WHITE, 0.3, Vec3::ZERO)?;

    let directional = scene.add_light_at(
        "directional",
        LightKind::Directional { target: Vec3::ZERO },
        Color::WHITE,
        0.3,
        Vec3::new(2.0, 2.0, -1.0),
    )?;
    {
        let light = scene.light_mut(directional)?;
        light.set_cast_shadow(true)?;
        light.set_shadow_camera(ShadowCamera::Orthographic {
            left: -2.0,
            right: 2.0,
            top: 2.0,
            bottom: -2.0,
            near: 1.0,
            far: 6.0,
        })?;
    }

    let spot = scene.add_light_at(
        "spot",
        LightKind::Spot {
            target: Vec3::ZERO,
            distance: 10.0,
            angle: PI * 0.3,
            penumbra: 0.0,
            decay: 2.0,
        },
        Color::WHITE,
        0.3,
        Vec3::new(0.0, 2.0, 2.0),
    )?;
    {
        let light = scene.light_mut(spot)?;
        light.set_cast_shadow(true)?;
        light.set_shadow_camera(ShadowCamera::Perspective {
            fov: 30.0,
            near: 1.0,
            far: 6.0,
        })?;
    }

    let point = scene.add_light_at(
        "point",
        LightKind::Point {
            distance: 0.0,
            decay: 2.0,
        },
        Color::WHITE,
        0.3,
        Vec3::new(-1.0, 1.0, 0.0),
    )?;
    {
        let light = scene.light_mut(point)?;
        light.set_cast_shadow(true)?;
        light.set_shadow_camera(ShadowCamera::Cube {
            near: 0.1,
            far: 5.0,
        })?;
    }

    for id in [directional, spot, point] {
        if let Some(shadow) = scene.light_mut(id)?.shadow_mut() {
            shadow.set_map_size(map_size, map_size)?;
        }
    }

    let material = scene.add_material(Material::standard(Color::WHITE, 0.7, 0.0));
    let sphere_mesh = scene.add_mesh(Mesh::sphere(0.5, 32, 32))?;
    let plane_mesh = scene.add_mesh(Mesh::plane(5.0, 5.0))?;

    let sphere = scene.spawn(None, "sphere", Transform::IDENTITY, sphere_mesh, material)?;
    scene.instance_mut(sphere)?.cast_shadow = true;

    let floor = scene.spawn(
        None,
        "floor",
        Transform::from_euler(
            Vec3::new(0.0, -0.5, 0.0),
            EulerOrder::XYZ,
            Vec3::new(-PI * 0.5, 0.0, 0.0),
        ),
        plane_mesh,
        material,
    )?;
    scene.instance_mut(floor)?.receive_shadow = true;

    let sphere = scene.instance(sphere)?.node;
    let floor = scene.instance(floor)?.node;
    scene.update_world_matrices();
    info!(
        "demo scene: {} lights, {} instances",
        scene.lights().len(),
        scene.instances().len()
    );

    Ok(DemoScene {
        scene,
        sphere,
        floor,
        directional,
        spot,
        point,
    })
}

/// Where the sphere is `elapsed` seconds in: circling the origin at radius
/// 1.5 while bouncing.
pub fn sphere_position(elapsed: f32) -> Vec3 {
    Vec3::new(
        elapsed.cos() * 1.5,
        (elapsed * 3.0).sin().abs(),
        elapsed.sin() * 1.5,
    )
}

/// Per-frame update moving `sphere` along [`sphere_position`].
pub fn animate(sphere: NodeId) -> impl FnMut(&mut Scene, &FrameTime) -> Result<()> {
    move |scene: &mut Scene, time: &FrameTime| {
        scene
            .graph
            .update_local(sphere, |t| t.pos = sphere_position(time.elapsed))
    }
}
