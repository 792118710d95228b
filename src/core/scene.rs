//! Scene: the transform graph, the assets it references, mesh instances,
//! lights and the active camera.

use glam::Vec3;
use log::{debug, warn};

use super::camera::{Camera, Projection};
use super::geometry::Mesh;
use super::graph::{NodeId, SceneGraph};
use super::light::{Light, LightId, LightKind};
use super::material::Material;
use super::shadow::ShadowDiagnostic;
use super::color::Color;
use super::transform::Transform;
use crate::error::{ResourceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub(crate) usize);

/// A mesh drawn with a material at a scene node. Handles are not owned and
/// are checked when the instance is drawn.
#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub node: NodeId,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub visible: bool,
}

impl MeshInstance {
    pub fn new(mesh: MeshHandle, material: MaterialHandle, node: NodeId) -> Self {
        Self {
            mesh,
            material,
            node,
            cast_shadow: false,
            receive_shadow: false,
            visible: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub graph: SceneGraph,
    pub camera: Camera,
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    instances: Vec<MeshInstance>,
    lights: Vec<Light>,
}

impl Scene {
    /// Empty scene with a camera node under the root.
    pub fn new(projection: Projection) -> Result<Self> {
        let mut graph = SceneGraph::new();
        let node = graph.add_node(graph.root(), "camera", Transform::IDENTITY)?;
        let camera = Camera::new(node, projection)?;
        Ok(Self {
            graph,
            camera,
            meshes: Vec::new(),
            materials: Vec::new(),
            instances: Vec::new(),
            lights: Vec::new(),
        })
    }

    /// Move the camera node to `eye`, looking at `target`.
    pub fn look_from(&mut self, eye: Vec3, target: Vec3) -> Result<()> {
        self.graph
            .set_local_transform(self.camera.node, Transform::looking_at(eye, target))
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> Result<MeshHandle> {
        mesh.validate()?;
        debug!(
            "registered mesh '{}' ({} vertices, {} triangles)",
            mesh.name,
            mesh.vertices.len(),
            mesh.tris.len()
        );
        self.meshes.push(mesh);
        Ok(MeshHandle(self.meshes.len() - 1))
    }

    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        debug!("registered {}", material);
        self.materials.push(material);
        MaterialHandle(self.materials.len() - 1)
    }

    pub fn mesh(&self, handle: MeshHandle) -> Result<&Mesh> {
        self.meshes
            .get(handle.0)
            .ok_or_else(|| ResourceError::InvalidMesh(handle.0).into())
    }

    pub fn material(&self, handle: MaterialHandle) -> Result<&Material> {
        self.materials
            .get(handle.0)
            .ok_or_else(|| ResourceError::InvalidMaterial(handle.0).into())
    }

    pub fn material_mut(&mut self, handle: MaterialHandle) -> Result<&mut Material> {
        self.materials
            .get_mut(handle.0)
            .ok_or_else(|| ResourceError::InvalidMaterial(handle.0).into())
    }

    /// Add an instance at an existing node without checking its handles.
    pub fn add_instance(&mut self, instance: MeshInstance) -> Result<InstanceId> {
        if !self.graph.contains(instance.node) {
            return Err(ResourceError::InvalidNode(instance.node.index()).into());
        }
        self.instances.push(instance);
        Ok(InstanceId(self.instances.len() - 1))
    }

    /// Create a node under `parent` (the root when `None`) and draw `mesh` there.
    pub fn spawn(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        transform: Transform,
        mesh: MeshHandle,
        material: MaterialHandle,
    ) -> Result<InstanceId> {
        self.mesh(mesh)?;
        self.material(material)?;
        let parent = parent.unwrap_or_else(|| self.graph.root());
        let node = self.graph.add_node(parent, name, transform)?;
        self.add_instance(MeshInstance::new(mesh, material, node))
    }

    pub fn instance(&self, id: InstanceId) -> Result<&MeshInstance> {
        self.instances
            .get(id.0)
            .ok_or_else(|| ResourceError::InvalidInstance(id.0).into())
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Result<&mut MeshInstance> {
        self.instances
            .get_mut(id.0)
            .ok_or_else(|| ResourceError::InvalidInstance(id.0).into())
    }

    pub fn instances(&self) -> &[MeshInstance] {
        &self.instances
    }

    pub fn add_light(&mut self, light: Light) -> Result<LightId> {
        if !self.graph.contains(light.node) {
            return Err(ResourceError::InvalidNode(light.node.index()).into());
        }
        debug!("added {} light '{}'", light.kind().name(), light.name);
        self.lights.push(light);
        Ok(LightId(self.lights.len() - 1))
    }

    /// Create a light on a fresh node under the root at `position`.
    pub fn add_light_at(
        &mut self,
        name: &str,
        kind: LightKind,
        color: Color,
        intensity: f32,
        position: Vec3,
    ) -> Result<LightId> {
        let node = self
            .graph
            .add_node(self.graph.root(), name, Transform::from_position(position))?;
        let light = Light::new(name, kind, color, intensity, node)?;
        self.add_light(light)
    }

    pub fn light(&self, id: LightId) -> Result<&Light> {
        self.lights
            .get(id.0)
            .ok_or_else(|| ResourceError::InvalidLight(id.0).into())
    }

    pub fn light_mut(&mut self, id: LightId) -> Result<&mut Light> {
        self.lights
            .get_mut(id.0)
            .ok_or_else(|| ResourceError::InvalidLight(id.0).into())
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Recompute world matrices top-down from the root.
    pub fn update_world_matrices(&mut self) {
        self.graph.update_world_matrices();
    }

    /// React to an output surface resize. Lights and shadows are not touched.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<()> {
        self.camera.resize(width, height)
    }

    /// World-space bounding spheres of visible shadow casters.
    pub fn caster_bounds(&self) -> Result<Vec<(String, Vec3, f32)>> {
        let mut out = Vec::new();
        for instance in self.instances.iter().filter(|i| i.visible && i.cast_shadow) {
            let mesh = self.mesh(instance.mesh)?;
            let world = self.graph.world_matrix(instance.node)?;
            let (center, radius) = mesh.bounding_sphere();
            let (scale, _, _) = world.to_scale_rotation_translation();
            out.push((
                self.graph.name(instance.node)?.to_string(),
                world.transform_point3(center),
                radius * scale.abs().max_element(),
            ));
        }
        Ok(out)
    }

    /// Precision hints for every shadow-casting light.
    pub fn shadow_diagnostics(&self) -> Result<Vec<ShadowDiagnostic>> {
        let casters = self.caster_bounds()?;
        let mut out = Vec::new();
        for light in &self.lights {
            out.extend(light.shadow_diagnostics(&self.graph, &casters)?);
        }
        Ok(out)
    }

    /// Log every shadow diagnostic with `warn!`.
    pub fn log_shadow_diagnostics(&self) -> Result<usize> {
        let diagnostics = self.shadow_diagnostics()?;
        for diagnostic in &diagnostics {
            warn!("{}", diagnostic);
        }
        Ok(diagnostics.len())
    }
}
