use glam::{Mat3, Mat4, Quat, Vec3};

/// Order in which the three axis rotations of an Euler triple are applied.
///
/// Orders are intrinsic: `XYZ` rotates about X, then about the rotated Y, then
/// about the twice-rotated Z, which as a matrix product is `Rx · Ry · Rz`.
/// Changing the order changes the resulting orientation, so callers must pick
/// one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EulerOrder {
    #[default]
    XYZ,
    XZY,
    YXZ,
    YZX,
    ZXY,
    ZYX,
}

impl EulerOrder {
    /// Compose `angles` (radians about X, Y, Z) into a quaternion.
    pub fn to_quat(self, angles: Vec3) -> Quat {
        let x = Quat::from_rotation_x(angles.x);
        let y = Quat::from_rotation_y(angles.y);
        let z = Quat::from_rotation_z(angles.z);
        match self {
            EulerOrder::XYZ => x * y * z,
            EulerOrder::XZY => x * z * y,
            EulerOrder::YXZ => y * x * z,
            EulerOrder::YZX => y * z * x,
            EulerOrder::ZXY => z * x * y,
            EulerOrder::ZYX => z * y * x,
        }
    }
}

/// Local position, rotation and scale of a scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub pos: Vec3,
    pub rot: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        pos: Vec3::ZERO,
        rot: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(pos: Vec3, rot: Quat, scale: Vec3) -> Self {
        Self { pos, rot, scale }
    }

    pub fn from_position(pos: Vec3) -> Self {
        Self {
            pos,
            ..Self::IDENTITY
        }
    }

    pub fn from_euler(pos: Vec3, order: EulerOrder, angles: Vec3) -> Self {
        Self {
            pos,
            rot: order.to_quat(angles),
            scale: Vec3::ONE,
        }
    }

    /// Place something at `eye` with its -Z axis pointing at `target`.
    ///
    /// Falls back to +Z as the up reference when looking straight up or down.
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        Self {
            pos: eye,
            rot: look_rotation(target - eye),
            scale: Vec3::ONE,
        }
    }

    /// Scale, then rotate, then translate.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rot, self.pos)
    }

    /// Translate by a given offset
    pub fn translate(&mut self, offset: Vec3) {
        self.pos += offset;
    }

    /// Uniformly scale by a given factor
    pub fn scale_uniform(&mut self, factor: f32) {
        self.scale *= factor;
    }

    /// Rotate by a quaternion, applied after the current rotation
    pub fn rotate_quat(&mut self, rotation: Quat) {
        self.rot = rotation * self.rot;
    }

    /// Rotate using Euler angles (in radians) composed in `order`
    pub fn rotate_euler(&mut self, order: EulerOrder, angles: Vec3) {
        self.rotate_quat(order.to_quat(angles));
    }
}

/// Rotation taking the local -Z axis onto `forward`.
pub fn look_rotation(forward: Vec3) -> Quat {
    let forward = forward.normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let up = stable_up(forward);
    let right = forward.cross(up).normalize();
    let up = right.cross(forward);
    Quat::from_mat3(&Mat3::from_cols(right, up, -forward))
}

/// World up, or +Z when `dir` is (nearly) parallel to it.
pub fn stable_up(dir: Vec3) -> Vec3 {
    if dir.normalize_or_zero().dot(Vec3::Y).abs() > 0.999 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn local_matrix_scales_then_rotates_then_translates() {
        let t = Transform::new(
            Vec3::new(1.0, 0.0, 0.0),
            Quat::from_rotation_z(FRAC_PI_2),
            Vec3::new(2.0, 1.0, 1.0),
        );
        // (1,0,0) -> scale (2,0,0) -> rotate (0,2,0) -> translate (1,2,0)
        let p = t.local_matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn euler_order_changes_orientation() {
        let angles = Vec3::new(FRAC_PI_2, FRAC_PI_2, 0.0);
        let xyz = EulerOrder::XYZ.to_quat(angles);
        let yxz = EulerOrder::YXZ.to_quat(angles);
        assert!(!(xyz * Vec3::Z).abs_diff_eq(yxz * Vec3::Z, 1e-3));

        let explicit = Mat4::from_rotation_x(FRAC_PI_2) * Mat4::from_rotation_y(FRAC_PI_2);
        assert!(Mat4::from_quat(xyz).abs_diff_eq(explicit, 1e-5));
    }

    #[test]
    fn looking_at_points_minus_z_at_target() {
        let t = Transform::looking_at(Vec3::new(1.0, 1.0, 2.0), Vec3::ZERO);
        let forward = t.rot * Vec3::NEG_Z;
        let expected = (Vec3::ZERO - t.pos).normalize();
        assert!(forward.abs_diff_eq(expected, 1e-5));

        let down = Transform::looking_at(Vec3::new(0.0, 5.0, 0.0), Vec3::ZERO);
        assert!((down.rot * Vec3::NEG_Z).abs_diff_eq(Vec3::NEG_Y, 1e-5));
    }
}
