use glam::{Vec3, Vec4};

/// Vertex after the vertex stage: clip-space position plus the varyings the
/// fragment stage needs.
#[derive(Clone, Copy, Debug)]
pub struct ClipVertex {
    pub position: Vec4,
    pub world: Vec3,
    pub normal: Vec3,
}

impl ClipVertex {
    pub fn lerp(&self, other: &ClipVertex, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            world: self.world.lerp(other.world, t),
            normal: self.normal.lerp(other.normal, t),
        }
    }

    fn ndc(&self) -> Vec3 {
        self.position.truncate() / self.position.w
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ClipTriangle {
    pub vertices: [ClipVertex; 3],
}

impl ClipTriangle {
    /// Counter-clockwise in NDC.
    pub fn is_front_facing(&self) -> bool {
        let [v0, v1, v2] = self.vertices.map(|v| v.ndc());
        (v1 - v0).cross(v2 - v0).z > 0.0
    }
}

/// Which faces to drop before rasterization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CullMode {
    None,
    #[default]
    Back,
    Front,
}

/// The six planes of the OpenGL clip volume as `dot(plane, v) >= 0`.
pub const CLIP_SPACE_PLANES: [Vec4; 6] = [
    Vec4::new(1.0, 0.0, 0.0, 1.0),  // left:   x >= -w
    Vec4::new(-1.0, 0.0, 0.0, 1.0), // right:  x <= w
    Vec4::new(0.0, 1.0, 0.0, 1.0),  // bottom: y >= -w
    Vec4::new(0.0, -1.0, 0.0, 1.0), // top:    y <= w
    Vec4::new(0.0, 0.0, 1.0, 1.0),  // near:   z >= -w
    Vec4::new(0.0, 0.0, -1.0, 1.0), // far:    z <= w
];

pub struct Clipper {
    cull: CullMode,
    frustum_planes: [Vec4; 6],
}

impl Default for Clipper {
    fn default() -> Self {
        Self::new()
    }
}

impl Clipper {
    pub fn new() -> Self {
        Self {
            cull: CullMode::Back,
            frustum_planes: CLIP_SPACE_PLANES,
        }
    }

    pub fn with_cull_mode(cull: CullMode) -> Self {
        Self {
            cull,
            ..Self::new()
        }
    }

    /// Clip against the view volume, then cull by facing. Clipping first keeps
    /// the facing test away from vertices behind the eye.
    pub fn clip_triangle(&self, triangle: &ClipTriangle) -> Vec<ClipTriangle> {
        if self.is_degenerate(triangle) {
            return Vec::new();
        }

        let mut triangles = vec![*triangle];
        for plane in &self.frustum_planes {
            triangles = self.clip_against_plane(triangles, *plane);
            if triangles.is_empty() {
                return triangles;
            }
        }

        // Every piece of a clipped triangle keeps the original's facing.
        let keep = match self.cull {
            CullMode::None => true,
            CullMode::Back => triangles[0].is_front_facing(),
            CullMode::Front => !triangles[0].is_front_facing(),
        };
        if keep {
            triangles
        } else {
            Vec::new()
        }
    }

    fn is_degenerate(&self, triangle: &ClipTriangle) -> bool {
        let epsilon = 1e-12;
        for i in 0..3 {
            let j = (i + 1) % 3;
            let diff = triangle.vertices[i].position - triangle.vertices[j].position;
            if diff.length_squared() < epsilon {
                return true;
            }
        }
        false
    }

    fn clip_against_plane(&self, triangles: Vec<ClipTriangle>, plane: Vec4) -> Vec<ClipTriangle> {
        let mut result = Vec::with_capacity(triangles.len());

        for triangle in triangles {
            let distances = triangle.vertices.map(|v| plane.dot(v.position));
            let inside_count = distances.iter().filter(|&&d| d >= 0.0).count();

            match inside_count {
                0 => continue,
                3 => result.push(triangle),
                _ => result.extend(self.clip_triangle_against_plane(&triangle, distances)),
            }
        }

        result
    }

    /// Sutherland-Hodgman on a single triangle, fanned back into triangles.
    fn clip_triangle_against_plane(
        &self,
        triangle: &ClipTriangle,
        distances: [f32; 3],
    ) -> Vec<ClipTriangle> {
        let mut new_verts: Vec<ClipVertex> = Vec::with_capacity(4);
        for i in 0..3 {
            let j = (i + 1) % 3;

            let v0 = &triangle.vertices[i];
            let v1 = &triangle.vertices[j];
            let d0 = distances[i];
            let d1 = distances[j];

            if d0 >= 0.0 {
                new_verts.push(*v0);
            }

            // Edge crosses the plane
            if (d0 < 0.0) != (d1 < 0.0) {
                let t = d0 / (d0 - d1);
                new_verts.push(v0.lerp(v1, t));
            }
        }

        if new_verts.len() < 3 {
            return Vec::new();
        }
        (1..new_verts.len() - 1)
            .map(|i| ClipTriangle {
                vertices: [new_verts[0], new_verts[i], new_verts[i + 1]],
            })
            .collect()
    }
}
