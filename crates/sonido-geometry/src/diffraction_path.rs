//! Diffraction path geometry: the apex on an edge, the angles and
//! distances the eight diffraction filter models are driven by.
//!
//! This geometry is model-agnostic — every diffraction DSP variant
//! consumes the same `DiffractionPath`, they just read different fields.

use crate::room::Edge;
use crate::vector::Vec3;

/// Cylindrical coordinates of a point relative to an edge: `z` along the
/// edge axis, `r` the perpendicular distance, `theta` the angle around the
/// wedge measured from one of its faces.
struct EdgeLocal {
    z: f32,
    r: f32,
    theta: f32,
}

fn to_edge_local(point: Vec3, edge: &Edge, face_reference: Vec3) -> EdgeLocal {
    let rel = point - edge.origin;
    let z = rel.dot(edge.direction);
    let radial = rel - edge.direction * z;
    let r = radial.length();

    if r < 1e-9 {
        return EdgeLocal { z, r: 0.0, theta: 0.0 };
    }
    let radial_unit = radial / r;
    let face_unit = (face_reference - edge.direction * face_reference.dot(edge.direction)).normalized();
    let cos_t = radial_unit.dot(face_unit).clamp(-1.0, 1.0);
    let cross = face_unit.cross(radial_unit).dot(edge.direction);
    let theta = if cross >= 0.0 { libm::acosf(cos_t) } else { 2.0 * core::f32::consts::PI - libm::acosf(cos_t) };
    EdgeLocal { z, r, theta }
}

/// Full geometric description of a diffraction path around one edge,
/// between a source and a listener.
#[derive(Debug, Clone, Copy)]
pub struct DiffractionPath {
    /// Wedge exterior angle `theta_w`.
    pub theta_w: f32,
    /// Edge length `z_w`.
    pub z_w: f32,
    /// Position of the apex along the edge (0..=z_w).
    pub z_a: f32,
    /// World-space apex position.
    pub apex: Vec3,
    /// Source angle around the wedge.
    pub theta_s: f32,
    /// Listener angle around the wedge.
    pub theta_l: f32,
    /// Source axial position along the edge.
    pub z_s: f32,
    /// Listener axial position along the edge.
    pub z_l: f32,
    /// Perpendicular distance from source to the edge line.
    pub r_s: f32,
    /// Perpendicular distance from listener to the edge line.
    pub r_l: f32,
    /// Source-to-apex distance.
    pub d_s: f32,
    /// Apex-to-listener distance.
    pub d_l: f32,
    /// Bisector angle `mA` (midpoint of source/listener angles around the
    /// wedge, i.e. where the shadow boundary sits).
    pub m_a: f32,
    /// Angular deviation `bA` of the receiver from the shadow boundary.
    pub b_a: f32,
    /// Grazing angle `phi` at the edge.
    pub phi: f32,
    /// Whether the listener is in the edge's shadow zone.
    pub shadow_zone: bool,
}

impl DiffractionPath {
    /// Build the diffraction geometry for `source` -> `edge` -> `listener`,
    /// or `None` if the apex falls outside the edge's span, or either
    /// endpoint angle falls outside `[0, theta_w]` (not a valid wedge
    /// diffraction path), per this module's validity invariant.
    #[must_use]
    pub fn compute(source: Vec3, listener: Vec3, edge: &Edge, face_reference: Vec3) -> Option<Self> {
        let s = to_edge_local(source, edge, face_reference);
        let l = to_edge_local(listener, edge, face_reference);

        if s.r < 1e-9 || l.r < 1e-9 {
            return None;
        }

        // Straight-line approximation to the Fermat apex: z_A divides the
        // edge in the ratio of the two radial distances.
        let z_a = s.z + (l.z - s.z) * (s.r / (s.r + l.r));
        if !(0.0..=edge.length).contains(&z_a) {
            return None;
        }
        if !(0.0..=edge.exterior_angle).contains(&s.theta) || !(0.0..=edge.exterior_angle).contains(&l.theta) {
            return None;
        }

        let apex = edge.origin + edge.direction * z_a;
        let d_s = (source - apex).length();
        let d_l = (listener - apex).length();

        let theta_w = edge.exterior_angle;
        let b_a = (l.theta - s.theta).abs();
        let m_a = s.theta.min(theta_w - l.theta);
        let shadow_zone = b_a > core::f32::consts::PI;

        let phi = libm::atanf((s.r + l.r) / (z_a - s.z).abs().max(1e-6));

        Some(Self {
            theta_w,
            z_w: edge.length,
            z_a,
            apex,
            theta_s: s.theta,
            theta_l: l.theta,
            z_s: s.z,
            z_l: l.z,
            r_s: s.r,
            r_l: l.r,
            d_s,
            d_l,
            m_a,
            b_a,
            phi,
            shadow_zone,
        })
    }

    /// Total propagation distance source -> apex -> listener.
    #[must_use]
    pub fn total_distance(&self) -> f32 {
        self.d_s + self.d_l
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;

    fn test_edge() -> Edge {
        Edge {
            wall_a: Id::from_raw(0),
            wall_b: Id::from_raw(1),
            origin: Vec3::new(0.0, 0.0, 0.0),
            direction: Vec3::new(0.0, 0.0, 1.0),
            length: 4.0,
            exterior_angle: core::f32::consts::PI * 1.5,
        }
    }

    #[test]
    fn apex_falls_within_edge_span_for_symmetric_geometry() {
        let edge = test_edge();
        let source = Vec3::new(2.0, 0.0, 1.0);
        let listener = Vec3::new(2.0, 0.0, 3.0);
        let face_ref = Vec3::new(1.0, 0.0, 0.0);

        let path = DiffractionPath::compute(source, listener, &edge, face_ref);
        assert!(path.is_some());
        let path = path.unwrap();
        assert!((0.0..=edge.length).contains(&path.z_a));
        assert!(path.d_s > 0.0 && path.d_l > 0.0);
    }

    #[test]
    fn degenerate_source_on_edge_line_rejected() {
        let edge = test_edge();
        let source = Vec3::new(0.0, 0.0, 1.0); // r_s == 0
        let listener = Vec3::new(2.0, 0.0, 3.0);
        let face_ref = Vec3::new(1.0, 0.0, 0.0);
        assert!(DiffractionPath::compute(source, listener, &edge, face_ref).is_none());
    }
}
