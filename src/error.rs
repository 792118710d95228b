//! Error types shared by the scene, the passes and the render loop.

use thiserror::Error;

/// Rejected configuration. Raised when the value is set, never downgraded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{kind} lights cannot cast shadows (only directional, point and spot can)")]
    ShadowUnsupported { kind: &'static str },

    #[error("invalid clip range: near = {near}, far = {far} (need 0 < near < far)")]
    InvalidClipRange { near: f32, far: f32 },

    #[error("invalid aspect ratio {0} (must be > 0)")]
    InvalidAspect(f32),

    #[error("invalid field of view {0}° (must be in (0, 180))")]
    InvalidFov(f32),

    #[error("degenerate orthographic bounds: left = {left}, right = {right}, top = {top}, bottom = {bottom}")]
    DegenerateFrustum {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
    },

    #[error("shadow map size must be non-zero, got {width}x{height}")]
    ZeroShadowMapSize { width: u32, height: u32 },

    #[error("{kind} lights need a {expected} shadow camera")]
    ShadowCameraMismatch {
        kind: &'static str,
        expected: &'static str,
    },

    #[error("the kind of a {kind} light cannot change")]
    KindChange { kind: &'static str },

    #[error("invalid spot cone: angle = {angle} rad, penumbra = {penumbra} (need 0 < angle <= pi/2, penumbra in [0, 1])")]
    InvalidCone { angle: f32, penumbra: f32 },

    #[error("shadow face {face} out of range, light has {faces} face(s)")]
    InvalidShadowFace { face: usize, faces: usize },

    #[error("light '{light}' sits on its own target, so it has no direction")]
    LightAtTarget { light: String },

    #[error("light intensity must be non-negative, got {0}")]
    NegativeIntensity(f32),

    #[error("node {node} cannot be parented under its own descendant {parent}")]
    CyclicParent { node: usize, parent: usize },

    #[error("the root node cannot be reparented")]
    RootReparent,

    #[error("surface size must be non-zero, got {width}x{height}")]
    ZeroSurfaceSize { width: usize, height: usize },

    #[error("render loop cannot {action} while {state}")]
    InvalidLoopState {
        action: &'static str,
        state: &'static str,
    },
}

/// A handle or resource the renderer was asked to use is unusable.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("unknown mesh handle {0}")]
    InvalidMesh(usize),

    #[error("unknown material handle {0}")]
    InvalidMaterial(usize),

    #[error("unknown scene node {0}")]
    InvalidNode(usize),

    #[error("unknown mesh instance {0}")]
    InvalidInstance(usize),

    #[error("unknown light {0}")]
    InvalidLight(usize),

    #[error("mesh '{name}' references vertex {index} but only has {len} vertices")]
    MalformedMesh {
        name: String,
        index: u32,
        len: usize,
    },

    #[error("failed to load '{path}': {reason}")]
    Load { path: String, reason: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    /// The presentation surface failed. Unrecoverable for the render loop.
    #[error("device error: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("logger already initialized: {0}")]
    Logger(#[from] log::SetLoggerError),
}

impl Error {
    /// Resource errors fail a single frame; everything else is fatal to the loop.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Error::Resource(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_errors_are_frame_local() {
        let err: Error = ResourceError::InvalidMesh(3).into();
        assert!(err.is_frame_local());

        let err: Error = ConfigError::InvalidAspect(0.0).into();
        assert!(!err.is_frame_local());
        assert!(!Error::Device("lost".into()).is_frame_local());
    }

    #[test]
    fn messages_name_the_problem() {
        let err = ConfigError::ShadowUnsupported { kind: "ambient" };
        assert!(err.to_string().contains("ambient"));
    }
}
