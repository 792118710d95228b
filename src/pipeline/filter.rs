//! Shadow-map lookups: how many depth comparisons a fragment makes and how
//! they are combined.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use glam::{Vec2, Vec3};

use super::rasterizer::{ndc_to_screen, window_depth};
use crate::core::shadow::DepthTexture;

/// Renderer-wide shadow filtering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowFilter {
    /// One comparison. Hard, aliased edges.
    Basic,
    /// 3×3 comparisons averaged.
    #[default]
    Pcf,
    /// 5×5 bilinearly weighted comparisons spread by the light's shadow
    /// radius. Edges near where an occluder meets its receiver can come out
    /// filtered more than expected.
    PcfSoft,
}

impl ShadowFilter {
    /// Fraction of light reaching a point, in [0, 1].
    ///
    /// `ndc` is the point in the light's normalized device coordinates for
    /// the face `map` was rendered with. Points outside that frustum are lit.
    pub fn lit_fraction(&self, map: &DepthTexture, ndc: Vec3, bias: f32, radius: f32) -> f32 {
        if !ndc.is_finite()
            || ndc.x.abs() > 1.0
            || ndc.y.abs() > 1.0
            || ndc.z.abs() > 1.0
            || map.width == 0
            || map.height == 0
        {
            return 1.0;
        }
        let depth = window_depth(ndc.z) - bias;
        let s = ndc_to_screen(Vec2::new(ndc.x, ndc.y), map.width, map.height);

        match self {
            ShadowFilter::Basic => compare(map, s.x.floor() as i64, s.y.floor() as i64, depth),
            ShadowFilter::Pcf => {
                let (cx, cy) = (s.x.floor() as i64, s.y.floor() as i64);
                let mut lit = 0.0;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        lit += compare(map, cx + dx, cy + dy, depth);
                    }
                }
                lit / 9.0
            }
            ShadowFilter::PcfSoft => {
                let radius = radius.max(0.0);
                let mut lit = 0.0;
                for dy in -2..=2 {
                    for dx in -2..=2 {
                        let p = s + Vec2::new(dx as f32, dy as f32) * radius;
                        lit += bilinear_compare(map, p, depth);
                    }
                }
                lit / 25.0
            }
        }
    }
}

/// 1 when `depth` is not behind the stored occluder depth.
#[inline]
fn compare(map: &DepthTexture, x: i64, y: i64, depth: f32) -> f32 {
    if depth <= map.texel(x, y) {
        1.0
    } else {
        0.0
    }
}

/// Comparison results of the four texels around `p`, weighted by distance.
fn bilinear_compare(map: &DepthTexture, p: Vec2, depth: f32) -> f32 {
    let p = p - Vec2::splat(0.5);
    let base = p.floor();
    let f = p - base;
    let (x, y) = (base.x as i64, base.y as i64);
    let top = compare(map, x, y, depth) * (1.0 - f.x) + compare(map, x + 1, y, depth) * f.x;
    let bottom =
        compare(map, x, y + 1, depth) * (1.0 - f.x) + compare(map, x + 1, y + 1, depth) * f.x;
    top * (1.0 - f.y) + bottom * f.y
}

impl FromStr for ShadowFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(ShadowFilter::Basic),
            "pcf" => Ok(ShadowFilter::Pcf),
            "pcf-soft" | "pcfsoft" | "soft" => Ok(ShadowFilter::PcfSoft),
            other => Err(format!("unknown shadow filter '{}'", other)),
        }
    }
}

impl Display for ShadowFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShadowFilter::Basic => "basic",
            ShadowFilter::Pcf => "pcf",
            ShadowFilter::PcfSoft => "pcf-soft",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Left half occluded at depth 0.25, right half empty.
    fn half_shadowed(size: usize) -> DepthTexture {
        let mut map = DepthTexture::new(size, size);
        for y in 0..size {
            for x in 0..size / 2 {
                map.write(x, y, 0.25);
            }
        }
        map
    }

    fn sweep(filter: ShadowFilter, map: &DepthTexture) -> Vec<f32> {
        (0..=200)
            .map(|i| {
                let x = -1.0 + i as f32 * 0.01;
                filter.lit_fraction(map, Vec3::new(x * 0.999, 0.1, 0.2), 0.005, 1.0)
            })
            .collect()
    }

    #[test]
    fn basic_is_binary() {
        let map = half_shadowed(16);
        let samples = sweep(ShadowFilter::Basic, &map);
        assert!(samples.iter().all(|&s| s == 0.0 || s == 1.0));
        assert!(samples.contains(&0.0) && samples.contains(&1.0));
    }

    #[test]
    fn pcf_has_intermediate_samples_at_the_edge() {
        let map = half_shadowed(16);
        for filter in [ShadowFilter::Pcf, ShadowFilter::PcfSoft] {
            let samples = sweep(filter, &map);
            assert!(samples.iter().any(|&s| s > 0.0 && s < 1.0), "{}", filter);
            assert_eq!(samples[0], 0.0);
            assert!((samples[200] - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn outside_the_frustum_is_lit() {
        let map = half_shadowed(16);
        let f = ShadowFilter::Basic;
        assert_eq!(f.lit_fraction(&map, Vec3::new(-0.9, 0.0, 0.2), 0.0, 1.0), 0.0);
        assert_eq!(f.lit_fraction(&map, Vec3::new(-1.5, 0.0, 0.2), 0.0, 1.0), 1.0);
        assert_eq!(f.lit_fraction(&map, Vec3::new(-0.9, 0.0, 1.2), 0.0, 1.0), 1.0);
    }

    #[test]
    fn bias_removes_self_shadowing() {
        let mut map = DepthTexture::new(4, 4);
        map.clear();
        map.write(1, 1, 0.6);
        // A receiver that is its own occluder, reconstructed slightly deeper.
        let ndc = Vec3::new(-0.375, 0.375, 0.2004);
        assert_eq!(ShadowFilter::Basic.lit_fraction(&map, ndc, 0.0, 1.0), 0.0);
        assert_eq!(ShadowFilter::Basic.lit_fraction(&map, ndc, 0.005, 1.0), 1.0);
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!("PCF-soft".parse::<ShadowFilter>(), Ok(ShadowFilter::PcfSoft));
        assert_eq!(ShadowFilter::default().to_string(), "pcf");
        assert!("vsm".parse::<ShadowFilter>().is_err());
    }
}
