use std::f32::consts::{PI, TAU};
use std::path::Path;

use glam::Vec3;

use crate::error::{ResourceError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: Vec3,    // Position in model space
    pub normal: Vec3, // Unit normal in model space
}

/// Indexed triangle mesh. Front faces wind counter-clockwise.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,   // Vertex buffer
    pub tris: Vec<[u32; 3]>,     // Indices into the vertex buffer
}

impl Mesh {
    pub fn new(name: &str, vertices: Vec<Vertex>, tris: Vec<[u32; 3]>) -> Result<Self> {
        let mesh = Self {
            name: name.to_string(),
            vertices,
            tris,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Every index must point into the vertex buffer.
    pub fn validate(&self) -> Result<()> {
        let len = self.vertices.len();
        for tri in &self.tris {
            if let Some(&index) = tri.iter().find(|&&i| i as usize >= len) {
                return Err(ResourceError::MalformedMesh {
                    name: self.name.clone(),
                    index,
                    len,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Model-space bounding sphere as (center, radius).
    pub fn bounding_sphere(&self) -> (Vec3, f32) {
        if self.vertices.is_empty() {
            return (Vec3::ZERO, 0.0);
        }
        let (min, max) = self
            .vertices
            .iter()
            .fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(lo, hi), v| {
                (lo.min(v.pos), hi.max(v.pos))
            });
        let center = (min + max) * 0.5;
        let radius = self
            .vertices
            .iter()
            .map(|v| v.pos.distance(center))
            .fold(0.0, f32::max);
        (center, radius)
    }

    /// UV sphere centred on the origin.
    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let ws = width_segments.max(3);
        let hs = height_segments.max(2);
        let mut vertices = Vec::with_capacity(((ws + 1) * (hs + 1)) as usize);
        for iy in 0..=hs {
            let v = iy as f32 / hs as f32;
            let theta = v * PI;
            for ix in 0..=ws {
                let u = ix as f32 / ws as f32;
                let phi = u * TAU;
                let normal = Vec3::new(
                    -phi.cos() * theta.sin(),
                    theta.cos(),
                    phi.sin() * theta.sin(),
                );
                vertices.push(Vertex {
                    pos: normal * radius,
                    normal,
                });
            }
        }

        let row = ws + 1;
        let mut tris = Vec::with_capacity((ws * hs * 2) as usize);
        for iy in 0..hs {
            for ix in 0..ws {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                if iy != 0 {
                    tris.push([a, b, d]);
                }
                if iy != hs - 1 {
                    tris.push([b, c, d]);
                }
            }
        }
        Self {
            name: "sphere".to_string(),
            vertices,
            tris,
        }
    }

    /// Plane in the XY plane facing +Z.
    pub fn plane(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        let vertices = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
            .into_iter()
            .map(|(x, y)| Vertex {
                pos: Vec3::new(x, y, 0.0),
                normal: Vec3::Z,
            })
            .collect();
        Self {
            name: "plane".to_string(),
            vertices,
            tris: vec![[0, 1, 2], [0, 2, 3]],
        }
    }

    /// Axis-aligned box centred on the origin with flat-shaded faces.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let h = Vec3::new(width, height, depth) * 0.5;
        // (normal, u axis, v axis) with u × v = normal
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut tris = Vec::with_capacity(12);
        for (normal, u, v) in faces {
            let base = vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let pos = (normal + u * su + v * sv) * h;
                vertices.push(Vertex { pos, normal });
            }
            tris.push([base, base + 1, base + 2]);
            tris.push([base, base + 2, base + 3]);
        }
        Self {
            name: "box".to_string(),
            vertices,
            tris,
        }
    }

    /// Torus around the Z axis.
    pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> Self {
        let rs = radial_segments.max(3);
        let ts = tubular_segments.max(3);
        let mut vertices = Vec::with_capacity(((rs + 1) * (ts + 1)) as usize);
        for j in 0..=rs {
            let v = j as f32 / rs as f32 * TAU;
            for i in 0..=ts {
                let u = i as f32 / ts as f32 * TAU;
                let pos = Vec3::new(
                    (radius + tube * v.cos()) * u.cos(),
                    (radius + tube * v.cos()) * u.sin(),
                    tube * v.sin(),
                );
                let center = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
                vertices.push(Vertex {
                    pos,
                    normal: (pos - center).normalize(),
                });
            }
        }
        let mut tris = Vec::with_capacity((rs * ts * 2) as usize);
        for j in 1..=rs {
            for i in 1..=ts {
                let a = (ts + 1) * j + i - 1;
                let b = (ts + 1) * (j - 1) + i - 1;
                let c = (ts + 1) * (j - 1) + i;
                let d = (ts + 1) * j + i;
                tris.push([a, b, d]);
                tris.push([b, c, d]);
            }
        }
        Self {
            name: "torus".to_string(),
            vertices,
            tris,
        }
    }

    /// Load a Wavefront OBJ, triangulated. Normals are computed when the file has none.
    pub fn from_obj<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .map_err(|e| ResourceError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut vertices = Vec::new();
        let mut tris = Vec::new();
        let mut needs_normals = false;
        for model in models {
            let data = model.mesh;
            let base = vertices.len() as u32;
            let has_normals = data.normals.len() == data.positions.len();
            needs_normals |= !has_normals;
            for (i, pos) in data.positions.chunks(3).enumerate() {
                let normal = if has_normals {
                    Vec3::from_slice(&data.normals[i * 3..i * 3 + 3]).normalize_or_zero()
                } else {
                    Vec3::ZERO
                };
                vertices.push(Vertex {
                    pos: Vec3::new(pos[0], pos[1], pos[2]),
                    normal,
                });
            }
            for face in data.indices.chunks(3) {
                tris.push([base + face[0], base + face[1], base + face[2]]);
            }
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "obj".to_string());
        let mut mesh = Mesh::new(&name, vertices, tris)?;
        if needs_normals {
            mesh.compute_normals();
        }
        Ok(mesh)
    }

    /// Area-weighted smooth normals from the triangle list.
    pub fn compute_normals(&mut self) {
        for v in &mut self.vertices {
            v.normal = Vec3::ZERO;
        }
        for tri in &self.tris {
            let [a, b, c] = tri.map(|i| self.vertices[i as usize].pos);
            let n = (b - a).cross(c - a);
            for &i in tri {
                self.vertices[i as usize].normal += n;
            }
        }
        for v in &mut self.vertices {
            v.normal = v.normal.normalize_or_zero();
        }
    }
}
