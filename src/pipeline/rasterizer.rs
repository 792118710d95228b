use glam::{Vec2, Vec3};
use log::trace;
use rayon::prelude::*;

use super::clipper::ClipTriangle;

/// A covered pixel with its interpolated varyings.
#[derive(Clone, Copy, Debug)]
pub struct Fragment {
    pub x: usize,
    pub y: usize,
    /// Window depth in [0, 1].
    pub depth: f32,
    pub world: Vec3,
    pub normal: Vec3,
    pub front_facing: bool,
}

/// NDC x/y in [-1, 1] to continuous pixel coordinates, +Y up in NDC and
/// down on screen. Shared by rasterization and shadow-map lookups so both
/// agree on which texel a point lands in.
#[inline]
pub fn ndc_to_screen(ndc: Vec2, width: usize, height: usize) -> Vec2 {
    Vec2::new(
        (ndc.x + 1.0) * 0.5 * width as f32,
        (1.0 - ndc.y) * 0.5 * height as f32,
    )
}

/// NDC depth in [-1, 1] to the stored range [0, 1].
#[inline]
pub fn window_depth(ndc_z: f32) -> f32 {
    ndc_z * 0.5 + 0.5
}

pub struct Rasterizer {
    width: usize,
    height: usize,
}

impl Rasterizer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Scan-convert already clipped triangles. Triangles are processed in
    /// parallel; the fragment order is the triangle order.
    pub fn rasterize(&self, triangles: &[ClipTriangle]) -> Vec<Fragment> {
        if self.width == 0 || self.height == 0 {
            return Vec::new();
        }
        let frags: Vec<Fragment> = triangles
            .par_iter()
            .flat_map(|tri| self.rasterize_triangle_barycentric(tri))
            .collect();
        trace!(
            "rasterized {} triangles into {} fragments",
            triangles.len(),
            frags.len()
        );
        frags
    }

    fn rasterize_triangle_barycentric(&self, tri: &ClipTriangle) -> Vec<Fragment> {
        let mut fragments = Vec::new();

        let inv_w = tri.vertices.map(|v| 1.0 / v.position.w);
        let ndc = [0, 1, 2].map(|i| tri.vertices[i].position.truncate() * inv_w[i]);
        let screen_verts = ndc.map(|n| ndc_to_screen(n.truncate(), self.width, self.height));
        let depths = ndc.map(|n| window_depth(n.z));
        let front_facing = (ndc[1] - ndc[0]).cross(ndc[2] - ndc[0]).z > 0.0;

        // Bounding box of pixel centres, clamped to the target
        let mut bbox_min = Vec2::splat(f32::MAX);
        let mut bbox_max = Vec2::splat(f32::MIN);
        for v in &screen_verts {
            bbox_min = bbox_min.min(*v);
            bbox_max = bbox_max.max(*v);
        }
        let x0 = (bbox_min.x - 0.5).floor().max(0.0) as usize;
        let y0 = (bbox_min.y - 0.5).floor().max(0.0) as usize;
        let x1 = ((bbox_max.x - 0.5).ceil().max(0.0) as usize).min(self.width - 1);
        let y1 = ((bbox_max.y - 0.5).ceil().max(0.0) as usize).min(self.height - 1);
        if bbox_max.x < 0.0 || bbox_max.y < 0.0 {
            return fragments;
        }

        let (v0, v1, v2) = (screen_verts[0], screen_verts[1], screen_verts[2]);
        if barycentric(v0, v0, v1, v2).is_none() {
            return fragments;
        }
        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let Some((w0, w1, w2)) = barycentric(p, v0, v1, v2) else {
                    continue;
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                // Depth is affine in screen space, varyings are not.
                let depth = w0 * depths[0] + w1 * depths[1] + w2 * depths[2];
                let pw = Vec3::new(w0 * inv_w[0], w1 * inv_w[1], w2 * inv_w[2]);
                let pw = pw / (pw.x + pw.y + pw.z);
                let [a, b, c] = tri.vertices;

                fragments.push(Fragment {
                    x,
                    y,
                    depth,
                    world: a.world * pw.x + b.world * pw.y + c.world * pw.z,
                    normal: a.normal * pw.x + b.normal * pw.y + c.normal * pw.z,
                    front_facing,
                });
            }
        }

        fragments
    }
}

fn barycentric(p: Vec2, v0: Vec2, v1: Vec2, v2: Vec2) -> Option<(f32, f32, f32)> {
    let denom = (v1.y - v2.y) * (v0.x - v2.x) + (v2.x - v1.x) * (v0.y - v2.y);
    if denom.abs() < 1e-10 {
        // Degenerate triangle
        return None;
    }
    let w0 = ((v1.y - v2.y) * (p.x - v2.x) + (v2.x - v1.x) * (p.y - v2.y)) / denom;
    let w1 = ((v2.y - v0.y) * (p.x - v2.x) + (v0.x - v2.x) * (p.y - v2.y)) / denom;
    let w2 = 1.0 - w0 - w1;
    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::clipper::ClipVertex;
    use glam::Vec4;

    fn vertex(x: f32, y: f32, z: f32, w: f32) -> ClipVertex {
        ClipVertex {
            position: Vec4::new(x * w, y * w, z * w, w),
            world: Vec3::new(x, y, w),
            normal: Vec3::Z,
        }
    }

    #[test]
    fn screen_mapping_flips_y() {
        assert_eq!(ndc_to_screen(Vec2::new(-1.0, 1.0), 100, 50), Vec2::ZERO);
        assert_eq!(ndc_to_screen(Vec2::new(1.0, -1.0), 100, 50), Vec2::new(100.0, 50.0));
    }

    #[test]
    fn full_screen_quad_covers_every_pixel() {
        let r = Rasterizer::new(8, 4);
        let a = vertex(-1.0, -1.0, 0.0, 1.0);
        let b = vertex(1.0, -1.0, 0.0, 1.0);
        let c = vertex(1.0, 1.0, 0.0, 1.0);
        let d = vertex(-1.0, 1.0, 0.0, 1.0);
        let tris = [
            ClipTriangle { vertices: [a, b, c] },
            ClipTriangle { vertices: [a, c, d] },
        ];
        let frags = r.rasterize(&tris);
        let mut hits = vec![0; 32];
        for f in &frags {
            hits[f.x + f.y * 8] += 1;
            assert!((f.depth - 0.5).abs() < 1e-6);
            assert!(f.front_facing);
        }
        // Pixels on the shared diagonal may be hit twice, none are missed.
        assert!(hits.iter().all(|&h| h >= 1));
    }

    #[test]
    fn varyings_are_perspective_correct() {
        // Same screen triangle, one vertex much further away.
        let r = Rasterizer::new(16, 16);
        let near = vertex(-1.0, -1.0, 0.0, 1.0);
        let far = vertex(1.0, -1.0, 0.0, 10.0);
        let top = vertex(-1.0, 1.0, 0.0, 1.0);
        let frags = r.rasterize(&[ClipTriangle {
            vertices: [near, far, top],
        }]);
        // Halfway across the screen is much closer to the near vertex in w.
        let mid = frags
            .iter()
            .find(|f| f.x == 8 && f.y == 15)
            .expect("bottom row is covered");
        assert!(mid.world.z < 5.5);
    }
}
