//! Air absorption: a single one-pole lowpass whose coefficient tracks the
//! propagation distance, modelling the high-frequency rolloff sound picks
//! up travelling through air.

use libm::expf;
use sonido_core::Effect;

/// Speed of sound in m/s, matched to the distance/delay conversions used
/// throughout the engine.
const SPEED_OF_SOUND: f32 = 343.0;
/// Empirical air-absorption time constant (seconds·Hz), per spec.
const AIR_ABSORPTION_CONSTANT: f32 = 7782.0;

/// Distance-dependent air absorption filter.
///
/// `y[n] = y[n-1]*a + x[n]`, output scaled by `b`, where
/// `b = exp(-distance * fs / (c * 7782))` and `a = 1 - b`. Distance is
/// interpolated linearly per sample toward its target so moving sources
/// don't click.
#[derive(Debug, Clone)]
pub struct AirAbsorption {
    sample_rate: f32,
    state: f32,
    distance: f32,
    target_distance: f32,
    a: f32,
    b: f32,
}

impl AirAbsorption {
    /// Create a new air absorption filter at zero distance (no attenuation).
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            sample_rate,
            state: 0.0,
            distance: 0.0,
            target_distance: 0.0,
            a: 0.0,
            b: 1.0,
        };
        filter.update_coefficients();
        filter
    }

    /// Set the propagation distance in metres; interpolated per sample.
    pub fn set_distance(&mut self, distance_m: f32) {
        self.target_distance = distance_m.max(0.0);
    }

    /// Current (interpolated) distance in metres.
    pub fn distance(&self) -> f32 {
        self.distance
    }

    fn update_coefficients(&mut self) {
        self.b = expf(-self.distance * self.sample_rate / (SPEED_OF_SOUND * AIR_ABSORPTION_CONSTANT));
        self.a = 1.0 - self.b;
    }
}

impl Effect for AirAbsorption {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        if (self.distance - self.target_distance).abs() > 1e-6 {
            let rate = (100.0 / self.sample_rate).min(1.0);
            self.distance += (self.target_distance - self.distance) * rate;
            self.update_coefficients();
        }

        self.state = self.state * self.a + input;
        self.state * self.b
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    fn reset(&mut self) {
        self.state = 0.0;
        self.distance = self.target_distance;
        self.update_coefficients();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_is_near_unity_gain() {
        let mut air = AirAbsorption::new(48000.0);
        let mut out = 0.0;
        for _ in 0..100 {
            out = air.process(1.0);
        }
        assert!((out - 1.0).abs() < 0.05, "zero distance should pass DC near unchanged, got {out}");
    }

    #[test]
    fn longer_distance_attenuates_more_at_settle() {
        let mut near = AirAbsorption::new(48000.0);
        near.set_distance(1.0);
        let mut far = AirAbsorption::new(48000.0);
        far.set_distance(500.0);

        let mut near_out = 0.0;
        let mut far_out = 0.0;
        for _ in 0..48000 {
            near_out = near.process(1.0);
            far_out = far.process(1.0);
        }
        assert!(far_out < near_out, "more distant source should attenuate more: {far_out} vs {near_out}");
    }

    #[test]
    fn output_stays_finite_under_distance_changes() {
        let mut air = AirAbsorption::new(48000.0);
        for i in 0..10_000 {
            if i % 500 == 0 {
                air.set_distance((i as f32) * 0.1);
            }
            assert!(air.process(0.3).is_finite());
        }
    }
}
