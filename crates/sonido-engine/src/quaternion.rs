//! Minimal orientation type: just enough quaternion math to turn a
//! source's facing direction into a directivity gain. Full matrix/vector
//! primitives are an external collaborator's concern; this crate only
//! needs "rotate the forward axis".

use sonido_geometry::Vec3;

/// Orientation as a unit quaternion `(x, y, z, w)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotate a vector by this quaternion: `q v q*`, expanded to avoid
    /// building the conjugate explicitly.
    #[must_use]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let qv = Vec3::new(self.x, self.y, self.z);
        let uv = qv.cross(v);
        let uuv = qv.cross(uv);
        v + (uv * self.w + uuv) * 2.0
    }

    /// This orientation's forward axis (`+z` in the source's local frame,
    /// rotated into world space).
    #[must_use]
    pub fn forward(self) -> Vec3 {
        self.rotate(Vec3::new(0.0, 0.0, 1.0))
    }

    /// The inverse rotation, for a unit quaternion just its conjugate.
    #[must_use]
    pub fn conjugate(self) -> Self {
        Self { x: -self.x, y: -self.y, z: -self.z, w: self.w }
    }

    /// Rotate `v` from world space into this orientation's local frame.
    #[must_use]
    pub fn inverse_rotate(self, v: Vec3) -> Vec3 {
        self.conjugate().rotate(v)
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_forward_is_plus_z() {
        let fwd = Quat::IDENTITY.forward();
        assert!((fwd.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn identity_leaves_vectors_unchanged() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let rotated = Quat::IDENTITY.rotate(v);
        assert!((rotated - v).length() < 1e-6);
    }

    #[test]
    fn inverse_rotate_undoes_rotate() {
        let q = Quat::new(0.0, 0.0, 0.0, 1.0);
        let v = Vec3::new(1.0, 2.0, 3.0);
        let round_tripped = q.inverse_rotate(q.rotate(v));
        assert!((round_tripped - v).length() < 1e-6);
    }
}
