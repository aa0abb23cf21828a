//! UDFA / UDFA-I: a cascade of high-shelf filters whose per-band gains and
//! breakpoint frequencies are derived from the wedge geometry.

use libm::{atanf, cosf, log10f, powf, sinf, sqrtf};
use sonido_core::{Biquad, Effect, LinearSmoothedParam, high_shelf_coefficients};
use sonido_geometry::{DiffractionPath, speed_of_sound};

use super::DiffractionFilter;

/// Breakpoints the response curve is sampled at (log-spaced, 10Hz..Nyquist);
/// consecutive pairs become the four cascaded shelf bands.
const NUM_BREAKPOINTS: usize = 5;
const NUM_BANDS: usize = NUM_BREAKPOINTS - 1;
const SHELF_SLOPE: f32 = 1.0;
const GAIN_SMOOTH_MS: f32 = 8.0;

fn log_spaced_breakpoints(sample_rate: f32) -> [f32; NUM_BREAKPOINTS] {
    let lo = 10.0f32;
    let hi = sample_rate * 0.45;
    let ratio = powf(hi / lo, 1.0 / (NUM_BREAKPOINTS as f32 - 1.0));
    let mut freqs = [0.0f32; NUM_BREAKPOINTS];
    let mut f = lo;
    for slot in &mut freqs {
        *slot = f;
        f *= ratio;
    }
    freqs
}

/// `n_v(theta)` term shared by every UDFA apex contribution.
fn n_v(nu: f32, theta: f32) -> f32 {
    let cos_nu_pi = cosf(nu * core::f32::consts::PI);
    let cos_nu_theta = cosf(nu * theta);
    let denom = cos_nu_pi - cos_nu_theta;
    if denom.abs() < 1e-9 {
        return 0.0;
    }
    nu * sqrtf((1.0 - cos_nu_pi * cos_nu_theta).max(0.0)) / denom
}

/// `H(z, theta, f)` apex contribution at one of the four sign-combined
/// `(z, theta)` pairs.
#[allow(clippy::too_many_arguments)]
fn apex_contribution(
    nu: f32,
    theta: f32,
    z: f32,
    path: &DiffractionPath,
    front_factor: f32,
    t0: f32,
    freq: f32,
) -> f32 {
    let n_v_val = n_v(nu, theta);
    let f_c = front_factor * n_v_val * n_v_val;
    // Extra path length introduced by evaluating at apex offset `z` along
    // the wedge rather than the Fermat apex itself.
    let extra_path = (z - path.z_a).abs();
    let t1 = t0 + extra_path / speed_of_sound();
    let g = (2.0 / core::f32::consts::PI) * atanf(core::f32::consts::PI * sqrtf((2.0 * f_c * (t1 - t0)).max(0.0)));
    g * udfa_shelf_response(freq, f_c, g)
}

/// `H_UDFA(f, f_c, g)`: a simple one-pole highpass-style transfer shaping
/// the high-frequency loss introduced by diffraction, parameterised by the
/// breakpoint frequency `f_c` and overall gain `g`.
fn udfa_shelf_response(freq: f32, f_c: f32, g: f32) -> f32 {
    if f_c < 1e-6 {
        return g;
    }
    let ratio = freq / f_c;
    g / sqrtf(1.0 + ratio * ratio)
}

/// Evaluate the combined UDFA magnitude response at one frequency.
fn udfa_magnitude(path: &DiffractionPath, freq: f32, front_factor_scale: f32) -> f32 {
    let nu = core::f32::consts::PI / path.theta_w;
    let t0 = path.total_distance() / speed_of_sound();
    let d = 2.0 * path.d_s * path.d_l / path.total_distance().max(1e-6);
    let sin_phi = sinf(path.phi);
    let front_factor =
        front_factor_scale * 2.0 * speed_of_sound()
            / ((core::f32::consts::PI * core::f32::consts::PI) * d.max(1e-6) * (sin_phi * sin_phi).max(1e-6));

    let zs = [0.0f32, path.z_w];
    let thetas = [path.theta_s - path.theta_l, path.theta_s + path.theta_l];

    let mut sum = 0.0f32;
    for &z in &zs {
        for &theta in &thetas {
            sum += apex_contribution(nu, theta, z, path, front_factor, t0, freq);
        }
    }
    sum.abs()
}

fn derive_band_targets(path: &DiffractionPath, sample_rate: f32, front_factor_scale: f32) -> ([f32; NUM_BANDS], [f32; NUM_BANDS]) {
    let breakpoints = log_spaced_breakpoints(sample_rate);
    let mut magnitudes = [0.0f32; NUM_BREAKPOINTS];
    for (m, &f) in magnitudes.iter_mut().zip(breakpoints.iter()) {
        *m = udfa_magnitude(path, f, front_factor_scale).max(1e-6);
    }

    let mut gains_db = [0.0f32; NUM_BANDS];
    let mut center_freqs = [0.0f32; NUM_BANDS];
    for i in 0..NUM_BANDS {
        let ratio = magnitudes[i + 1] / magnitudes[i];
        gains_db[i] = (20.0 * log10f(ratio)).clamp(-24.0, 24.0);
        center_freqs[i] = sqrtf(breakpoints[i] * breakpoints[i + 1]);
    }
    (gains_db, center_freqs)
}

/// Shared implementation for UDFA and UDFA-I (which only differs by a
/// scaled front factor and by only applying in the shadow zone).
#[derive(Debug, Clone)]
struct UdfaCore {
    filters: [Biquad; NUM_BANDS],
    gains_db: [LinearSmoothedParam; NUM_BANDS],
    center_freqs: [f32; NUM_BANDS],
    sample_rate: f32,
    front_factor_scale: f32,
}

impl UdfaCore {
    fn new(sample_rate: f32, front_factor_scale: f32) -> Self {
        Self {
            filters: core::array::from_fn(|_| Biquad::new()),
            gains_db: core::array::from_fn(|_| LinearSmoothedParam::with_config(0.0, sample_rate, GAIN_SMOOTH_MS)),
            center_freqs: log_spaced_breakpoints(sample_rate)[..NUM_BANDS].try_into().unwrap(),
            sample_rate,
            front_factor_scale,
        }
    }

    fn update_geometry(&mut self, path: &DiffractionPath) {
        let (gains, freqs) = derive_band_targets(path, self.sample_rate, self.front_factor_scale);
        self.center_freqs = freqs;
        for (param, &gain) in self.gains_db.iter_mut().zip(gains.iter()) {
            param.set_target(gain);
        }
    }

    fn update_coefficients(&mut self) {
        for ((filter, gain), &freq) in self.filters.iter_mut().zip(self.gains_db.iter_mut()).zip(self.center_freqs.iter()) {
            let (b0, b1, b2, a0, a1, a2) = high_shelf_coefficients(freq.max(20.0), SHELF_SLOPE, gain.advance(), self.sample_rate);
            filter.set_coefficients(b0, b1, b2, a0, a1, a2);
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        self.update_coefficients();
        let mut x = input;
        for filter in &mut self.filters {
            x = filter.process(x);
        }
        x
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for gain in &mut self.gains_db {
            gain.set_sample_rate(sample_rate);
        }
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.clear();
        }
        for gain in &mut self.gains_db {
            gain.snap_to_target();
        }
    }
}

/// UDFA: supports all diffraction zones.
#[derive(Debug, Clone)]
pub struct UdfaFilter(UdfaCore);

impl UdfaFilter {
    #[must_use]
    pub fn new(sample_rate: f32) -> Self {
        Self(UdfaCore::new(sample_rate, 1.0))
    }
}

impl DiffractionFilter for UdfaFilter {
    fn update_geometry(&mut self, path: &DiffractionPath, _sample_rate: f32) {
        self.0.update_geometry(path);
    }

    fn applies_outside_shadow(&self) -> bool {
        true
    }
}

impl Effect for UdfaFilter {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.0.process(input)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.0.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.0.reset();
    }
}

/// UDFA-I: scaled front factor, shadow-zone only.
const UDFA_I_FRONT_FACTOR_SCALE: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct UdfaIFilter(UdfaCore);

impl UdfaIFilter {
    #[must_use]
    pub fn new(sample_rate: f32) -> Self {
        Self(UdfaCore::new(sample_rate, UDFA_I_FRONT_FACTOR_SCALE))
    }
}

impl DiffractionFilter for UdfaIFilter {
    fn update_geometry(&mut self, path: &DiffractionPath, _sample_rate: f32) {
        self.0.update_geometry(path);
    }
}

impl Effect for UdfaIFilter {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.0.process(input)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.0.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.0.reset();
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
    fn udfa_output_stays_finite() {
        let mut f = UdfaFilter::new(48000.0);
        f.update_geometry(&test_path(), 48000.0);
        for _ in 0..2000 {
            assert!(f.process(0.3).is_finite());
        }
    }

    #[test]
    fn udfa_i_output_stays_finite() {
        let mut f = UdfaIFilter::new(48000.0);
        f.update_geometry(&test_path(), 48000.0);
        for _ in 0..2000 {
            assert!(f.process(0.3).is_finite());
        }
    }
}
