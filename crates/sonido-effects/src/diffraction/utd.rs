//! UTD: a Linkwitz-Riley 4-band crossover whose per-band gains come from
//! Kouyoumjian-Pathak diffraction coefficients.

use libm::{cosf, sinf, sqrtf};
use sonido_core::{Biquad, Effect, LinearSmoothedParam, bandpass_coefficients};
use sonido_geometry::{DiffractionPath, speed_of_sound};

use super::DiffractionFilter;

/// Representative centre frequencies of the four Linkwitz-Riley bands.
const BAND_FREQS: [f32; 4] = [125.0, 500.0, 2000.0, 8000.0];
const BAND_Q: f32 = 0.707;
const GAIN_SMOOTH_MS: f32 = 8.0;

/// The `E_quarter(theta, sign)` transition term: a cotangent singular at
/// the shadow/reflection boundaries, regularised by `F(kL*alpha)` (the
/// Fresnel-type transition function). We use the standard small-argument
/// series when the cotangent argument is near zero, as specified.
fn e_quarter(theta: f32, sign: f32, k: f32, l: f32, beta0: f32) -> f32 {
    let cot_arg = (core::f32::consts::PI + sign * beta0) / 2.0;
    let cot = if cot_arg.abs() < 1e-3 {
        // Series expansion of cot(x) ~ 1/x - x/3 for small x.
        1.0 / cot_arg.max(1e-6) - cot_arg / 3.0
    } else {
        cosf(cot_arg) / sinf(cot_arg)
    };

    let transition_arg = k * l * (1.0 - cosf(theta)).max(0.0);
    let fresnel = transition_fn(transition_arg);
    cot * fresnel
}

/// `F(X)`: Fresnel transition function, real-valued magnitude
/// approximation (the classic UTD transition integral).
fn transition_fn(x: f32) -> f32 {
    if x < 0.001 {
        return 2.0 * sqrtf(x);
    }
    // Large-argument asymptotic: F(X) -> 1 as X grows.
    let sqrt_x = sqrtf(x);
    (2.0 * sqrt_x) / (1.0 + 2.0 * sqrt_x)
}

fn band_gain(path: &DiffractionPath, freq: f32) -> f32 {
    let k = 2.0 * core::f32::consts::PI * freq / speed_of_sound();
    let l = (path.d_s * path.d_l) / path.total_distance().max(1e-6);
    let nu = core::f32::consts::PI / path.theta_w;

    let e_half = |theta: f32| e_quarter(theta, 1.0, k, l, theta) + e_quarter(theta, -1.0, k, l, theta);
    let g_minus = e_half(path.theta_l - path.theta_s);
    let g_plus = e_half(path.theta_l + path.theta_s);

    let amplitude_term = 1.0
        / (sqrtf(path.d_s * path.d_l * path.total_distance().max(1e-6)) * nu * sinf(path.phi).max(1e-3));
    let g = (amplitude_term * (g_minus + g_plus)).abs();

    // Shadow-boundary reference gain, evaluated at theta_l == pi + theta_s
    // (grazing incidence), used to normalise g into a relative band gain.
    let shadow_boundary = core::f32::consts::PI + path.theta_s;
    let g_sb_half = e_half(shadow_boundary - path.theta_s) + e_half(shadow_boundary + path.theta_s);
    let g_sb = (amplitude_term * g_sb_half).abs().max(1e-9);

    let idx = ((path.b_a - core::f32::consts::PI) / (path.theta_w - path.theta_s - core::f32::consts::PI).max(1e-6))
        .clamp(0.0, 1.0);
    let direct_scaled = g * path.total_distance();
    let normalised = g / g_sb;
    normalised * (1.0 - idx) + direct_scaled * idx
}

/// UTD diffraction filter: a 4-band bandpass bank recombined with
/// per-band gains derived from the diffraction coefficients above.
#[derive(Debug, Clone)]
pub struct UtdFilter {
    bands: [Biquad; 4],
    gains: [LinearSmoothedParam; 4],
    sample_rate: f32,
}

impl UtdFilter {
    #[must_use]
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            bands: core::array::from_fn(|_| Biquad::new()),
            gains: core::array::from_fn(|_| LinearSmoothedParam::with_config(0.0, sample_rate, GAIN_SMOOTH_MS)),
            sample_rate,
        };
        filter.update_band_coefficients();
        filter
    }

    fn update_band_coefficients(&mut self) {
        for (filter, &freq) in self.bands.iter_mut().zip(BAND_FREQS.iter()) {
            let (b0, b1, b2, a0, a1, a2) = bandpass_coefficients(freq, BAND_Q, self.sample_rate);
            filter.set_coefficients(b0, b1, b2, a0, a1, a2);
        }
    }
}

impl DiffractionFilter for UtdFilter {
    fn update_geometry(&mut self, path: &DiffractionPath, _sample_rate: f32) {
        for (gain, &freq) in self.gains.iter_mut().zip(BAND_FREQS.iter()) {
            gain.set_target(band_gain(path, freq).clamp(0.0, 4.0));
        }
    }
}

impl Effect for UtdFilter {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let mut acc = 0.0;
        for (band, gain) in self.bands.iter_mut().zip(self.gains.iter_mut()) {
            acc += band.process(input) * gain.advance();
        }
        acc
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for gain in &mut self.gains {
            gain.set_sample_rate(sample_rate);
        }
        self.update_band_coefficients();
    }

    fn reset(&mut self) {
        for band in &mut self.bands {
            band.clear();
        }
        for gain in &mut self.gains {
            gain.snap_to_target();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonido_geometry::{id::Id, room::Edge, Vec3};

    fn test_path() -> DiffractionPath {
        let edge = Edge {
            wall_a: Id::from_raw(0),
            wall_b: Id::from_raw(1),
            origin: Vec3::new(0.0, 0.0, 0.0),
            direction: Vec3::new(0.0, 0.0, 1.0),
            length: 4.0,
            exterior_angle: core::f32::consts::PI * 1.5,
        };
        DiffractionPath::compute(
            Vec3::new(2.0, 0.0, 1.0),
            Vec3::new(2.0, 0.0, 3.0),
            &edge,
            Vec3::new(1.0, 0.0, 0.0),
        )
        .unwrap()
    }

    #[test]
    fn utd_output_stays_finite() {
        let mut f = UtdFilter::new(48000.0);
        f.update_geometry(&test_path(), 48000.0);
        for _ in 0..2000 {
            assert!(f.process(0.3).is_finite());
        }
    }
}
