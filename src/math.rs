//! Math types for Resona

pub use glam::{Mat4, Quat, Vec3};

/// Snapshot of an emitter's world transform, reduced to what a panner needs:
/// a position and a forward orientation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPose {
    pub position: Vec3,
    pub forward: Vec3,
}

impl WorldPose {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self { position, forward }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::Z,
        }
    }

    /// Decompose an accumulated world matrix into a pose. The forward vector
    /// is the rotated +Z axis, matching the panner orientation convention.
    pub fn from_world_matrix(matrix: Mat4) -> Self {
        let (_scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            forward: rotation * Vec3::Z,
        }
    }
}

impl Default for WorldPose {
    fn default() -> Self {
        Self::identity()
    }
}
