pub mod camera;
pub mod color;
pub mod geometry;
pub mod graph;
pub mod light;
pub mod material;
pub mod scene;
pub mod shadow;
pub mod transform;

pub use camera::{Camera, Projection};
pub use color::Color;
pub use geometry::{Mesh, Vertex};
pub use graph::{NodeId, SceneGraph};
pub use light::{Light, LightId, LightKind};
pub use material::{DepthMaterial, Material, MaterialKind, Side};
pub use scene::{InstanceId, MaterialHandle, MeshHandle, MeshInstance, Scene};
pub use shadow::{CubeFace, DepthTexture, LightShadow, ShadowCamera, ShadowDiagnostic};
pub use transform::{EulerOrder, Transform};
