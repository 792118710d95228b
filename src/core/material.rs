use std::fmt::{Display, Formatter};

use crate::core::color::Color;
use crate::core::shadow::DepthTexture;

/// Which faces of a mesh are rasterized in the colour pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialKind {
    /// Unlit: the colour is written as-is and lights are ignored.
    Basic,
    /// Diffuse only.
    Lambert,
    /// Diffuse plus a roughness-driven specular lobe. Metalness tints the
    /// specular with the base colour and removes diffuse.
    Standard { roughness: f32, metalness: f32 },
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub color: Color,
    pub kind: MaterialKind,
    pub side: Side,
}

impl Material {
    pub fn basic(color: Color) -> Self {
        Self {
            name: "basic".to_string(),
            color,
            kind: MaterialKind::Basic,
            side: Side::Front,
        }
    }

    pub fn lambert(color: Color) -> Self {
        Self {
            name: "lambert".to_string(),
            color,
            kind: MaterialKind::Lambert,
            side: Side::Front,
        }
    }

    pub fn standard(color: Color, roughness: f32, metalness: f32) -> Self {
        Self {
            name: "standard".to_string(),
            color,
            kind: MaterialKind::Standard {
                roughness: roughness.clamp(0.0, 1.0),
                metalness: metalness.clamp(0.0, 1.0),
            },
            side: Side::Front,
        }
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::standard(Color::WHITE, 1.0, 0.0)
    }
}

impl Display for Material {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Material '{}' {:?}, color {:?}", self.name, self.kind, self.color)
    }
}

/// The single material every mesh is drawn with during shadow passes.
///
/// It carries no state and evaluates no lighting: a covered texel keeps the
/// nearest light-space depth and nothing else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepthMaterial;

impl DepthMaterial {
    #[inline]
    pub fn write(&self, target: &mut DepthTexture, x: usize, y: usize, depth: f32) {
        target.write(x, y, depth);
    }
}
