//! Source directivity patterns: the cardioid family parameterised
//! by a single shape value, a figure-eight, and two fixed measured
//! patterns, each with a derived *reverb-energy* scalar.

use sonido_geometry::Vec3;

/// How a source radiates with respect to its own forward axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Directivity {
    Omni,
    /// `p` in `[0, 1]`: 0 is omni, 0.5 is a cardioid, 1 is hypercardioid.
    Cardioid { shape: f32 },
    Bidirectional,
    /// One of two fixed measured patterns (indices 0 and 1); the
    /// underlying response table is an external collaborator's concern
    /// here, so this only carries the selector and the energy constant.
    Measured { pattern: u8 },
}

impl Directivity {
    /// Gain towards `listener_direction` (unit vector, world space) given
    /// the source's forward axis (unit vector, world space).
    ///
    /// `g(theta) = (1 - p) + p * cos(theta)` for the cardioid family;
    /// `cos(theta)` for bidirectional; a fixed on/off-axis ratio for the
    /// measured patterns (an approximation standing in for the real
    /// measured response table).
    #[must_use]
    pub fn gain(self, forward: Vec3, listener_direction: Vec3) -> f32 {
        let cos_theta = forward.dot(listener_direction).clamp(-1.0, 1.0);
        match self {
            Directivity::Omni => 1.0,
            Directivity::Cardioid { shape } => {
                let p = shape.clamp(0.0, 1.0);
                ((1.0 - p) + p * cos_theta).max(0.0)
            }
            Directivity::Bidirectional => cos_theta.abs(),
            Directivity::Measured { .. } => 0.3 + 0.7 * ((cos_theta + 1.0) * 0.5),
        }
    }

    /// The fraction of radiated energy that should feed the FDN's diffuse
    /// field, independent of listener direction: an omni source radiates
    /// equally in all directions, a tight pattern concentrates energy
    /// on-axis and contributes less to the diffuse tail.
    #[must_use]
    pub fn reverb_energy(self) -> f32 {
        match self {
            Directivity::Omni => 1.0,
            Directivity::Cardioid { shape } => 1.0 - 0.5 * shape.clamp(0.0, 1.0),
            Directivity::Bidirectional => 1.0 / 3.0,
            Directivity::Measured { .. } => 0.5,
        }
    }
}

impl Default for Directivity {
    fn default() -> Self {
        Directivity::Omni
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omni_gain_is_direction_independent() {
        let fwd = Vec3::new(0.0, 0.0, 1.0);
        assert_eq!(Directivity::Omni.gain(fwd, Vec3::new(1.0, 0.0, 0.0)), 1.0);
        assert_eq!(Directivity::Omni.gain(fwd, Vec3::new(0.0, 0.0, -1.0)), 1.0);
    }

    #[test]
    fn cardioid_attenuates_off_axis_more_than_on_axis() {
        let fwd = Vec3::new(0.0, 0.0, 1.0);
        let on_axis = Directivity::Cardioid { shape: 0.5 }.gain(fwd, fwd);
        let off_axis = Directivity::Cardioid { shape: 0.5 }.gain(fwd, -fwd);
        assert!(on_axis > off_axis);
    }

    #[test]
    fn bidirectional_reverb_energy_is_smaller_than_omni() {
        assert!(Directivity::Bidirectional.reverb_energy() < Directivity::Omni.reverb_energy());
    }
}
