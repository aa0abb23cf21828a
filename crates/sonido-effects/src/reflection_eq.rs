//! Graphic/parametric EQ used to colour reflection paths (low shelf + B
//! peaking bands + high shelf), driven by a fixed response-matrix solve so
//! that per-band target gains land where requested rather than bleeding
//! into neighbouring bands.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec;
use alloc::vec::Vec;
use core::f32::consts::PI;

use libm::{cosf, log10f, sinf, sqrtf};
use sonido_core::{
    Biquad, Effect, SmoothedParam, high_shelf_coefficients, low_shelf_coefficients,
    peaking_eq_coefficients,
};

/// Q used for the B peaking bands and the shelf corner sharpness.
const BAND_Q: f32 = 1.0;
const SHELF_SLOPE: f32 = 1.0;
/// Gain at which the response matrix is sampled (any nonzero value works,
/// since the matrix is linear in dB gain and gets inverted).
const PROBE_GAIN_DB: f32 = 6.0;
const GAIN_SMOOTH_MS: f32 = 5.0;

fn biquad_mag_db(b0: f32, b1: f32, b2: f32, a1: f32, a2: f32, freq: f32, sample_rate: f32) -> f32 {
    let w = 2.0 * PI * freq / sample_rate;
    let (cw, sw) = (cosf(w), sinf(w));
    let (c2w, s2w) = (cosf(2.0 * w), sinf(2.0 * w));

    let num_re = b0 + b1 * cw + b2 * c2w;
    let num_im = -(b1 * sw + b2 * s2w);
    let den_re = 1.0 + a1 * cw + a2 * c2w;
    let den_im = -(a1 * sw + a2 * s2w);

    let num_mag_sq = num_re * num_re + num_im * num_im;
    let den_mag_sq = den_re * den_re + den_im * den_im;
    20.0 * log10f(sqrtf(num_mag_sq / den_mag_sq.max(1e-20)))
}

/// Solve `a · x = b` for `x` by Gauss-Jordan elimination with partial
/// pivoting. `a` is consumed (used as scratch). Panics if singular, which
/// cannot happen for the response matrix built from distinct design
/// frequencies.
fn solve(mut a: Vec<Vec<f32>>, mut b: Vec<f32>) -> Vec<f32> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
            .expect("non-empty column");
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot = a[col][col];
        for v in &mut a[col] {
            *v /= pivot;
        }
        b[col] /= pivot;

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    b
}

/// Which filter in the cascade a design frequency/response-matrix row
/// corresponds to.
#[derive(Clone, Copy)]
enum Stage {
    LowShelf,
    Peak(f32),
    HighShelf,
}

/// Reflection-colouring EQ: a low shelf, `bands` peaking filters (one per
/// frequency band), and a high shelf, cascaded in series.
///
/// Target gains are per-band dB values; the filter gains actually applied
/// are solved so the cascade's response matches those targets at the
/// design frequencies, compensating for the overlap between adjacent
/// filters.
#[derive(Clone)]
pub struct ReflectionEq {
    sample_rate: f32,
    stages: Vec<Stage>,
    filters: Vec<Biquad>,
    gains: Vec<SmoothedParam>,
    /// Inverse response matrix, row-major, (stages.len())^2 entries.
    response_inv: Vec<Vec<f32>>,
    fast_path: bool,
}

impl ReflectionEq {
    /// Build a reflection EQ for the given ordered frequency band centres.
    ///
    /// `band_freqs` must be non-empty and strictly increasing.
    pub fn new(sample_rate: f32, band_freqs: &[f32]) -> Self {
        assert!(!band_freqs.is_empty(), "reflection EQ needs at least one band");
        let b = band_freqs.len();

        let mut stages = Vec::with_capacity(b + 2);
        stages.push(Stage::LowShelf);
        for &f in band_freqs {
            stages.push(Stage::Peak(f));
        }
        stages.push(Stage::HighShelf);

        let low_shelf_freq = band_freqs[0] / core::f32::consts::SQRT_2;
        let high_shelf_freq = band_freqs[b - 1] * core::f32::consts::SQRT_2;

        let design_freqs: Vec<f32> = core::iter::once(low_shelf_freq)
            .chain(band_freqs.iter().copied())
            .chain(core::iter::once(high_shelf_freq))
            .collect();

        let n = stages.len();
        let mut response = vec![vec![0.0f32; n]; n];
        for (row, stage) in stages.iter().enumerate() {
            let (b0, b1, b2, a0, a1, a2) = match *stage {
                Stage::LowShelf => low_shelf_coefficients(
                    low_shelf_freq,
                    SHELF_SLOPE,
                    PROBE_GAIN_DB,
                    sample_rate,
                ),
                Stage::Peak(f) => peaking_eq_coefficients(f, BAND_Q, PROBE_GAIN_DB, sample_rate),
                Stage::HighShelf => high_shelf_coefficients(
                    high_shelf_freq,
                    SHELF_SLOPE,
                    PROBE_GAIN_DB,
                    sample_rate,
                ),
            };
            for (col, &freq) in design_freqs.iter().enumerate() {
                response[row][col] =
                    biquad_mag_db(b0 / a0, b1 / a0, b2 / a0, a1 / a0, a2 / a0, freq, sample_rate)
                        / PROBE_GAIN_DB;
            }
        }

        // Invert by solving response_inv columns one unit vector at a time.
        let mut response_inv = vec![vec![0.0f32; n]; n];
        for col in 0..n {
            let mut unit = vec![0.0f32; n];
            unit[col] = 1.0;
            let solved = solve(response.clone(), unit);
            for row in 0..n {
                response_inv[row][col] = solved[row];
            }
        }

        let filters = vec![Biquad::new(); n];
        let gains = (0..n)
            .map(|_| SmoothedParam::with_config(0.0, sample_rate, GAIN_SMOOTH_MS))
            .collect();

        let mut eq = Self {
            sample_rate,
            stages,
            filters,
            gains,
            response_inv,
            fast_path: true,
        };
        eq.update_all_coefficients();
        eq
    }

    /// Number of frequency bands (excludes the two shelves).
    pub fn bands(&self) -> usize {
        self.stages.len() - 2
    }

    /// Set target per-band gains in dB; solved into filter gains so the
    /// cascade's response matches these targets at the design points.
    pub fn set_target_gains_db(&mut self, band_gains_db: &[f32]) {
        assert_eq!(band_gains_db.len(), self.bands(), "band gain count mismatch");
        let n = self.stages.len();
        let mut target = vec![0.0f32; n];
        target[0] = 0.0;
        target[n - 1] = 0.0;
        target[1..n - 1].copy_from_slice(band_gains_db);

        for row in 0..n {
            let mut filter_gain = 0.0;
            for col in 0..n {
                filter_gain += self.response_inv[row][col] * target[col];
            }
            self.gains[row].set_target(filter_gain);
        }
        self.fast_path = false;
    }

    fn update_all_coefficients(&mut self) {
        for (filter, (stage, gain)) in
            self.filters.iter_mut().zip(self.stages.iter().zip(self.gains.iter()))
        {
            let gain_db = gain.get();
            let (b0, b1, b2, a0, a1, a2) = match *stage {
                Stage::LowShelf => low_shelf_coefficients(
                    design_low_shelf_freq(&self.stages),
                    SHELF_SLOPE,
                    gain_db,
                    self.sample_rate,
                ),
                Stage::Peak(f) => peaking_eq_coefficients(f, BAND_Q, gain_db, self.sample_rate),
                Stage::HighShelf => high_shelf_coefficients(
                    design_high_shelf_freq(&self.stages),
                    SHELF_SLOPE,
                    gain_db,
                    self.sample_rate,
                ),
            };
            filter.set_coefficients(b0, b1, b2, a0, a1, a2);
        }
    }
}

fn design_low_shelf_freq(stages: &[Stage]) -> f32 {
    match stages[1] {
        Stage::Peak(f) => f / core::f32::consts::SQRT_2,
        _ => unreachable!("first band stage is always a peak"),
    }
}

fn design_high_shelf_freq(stages: &[Stage]) -> f32 {
    match stages[stages.len() - 2] {
        Stage::Peak(f) => f * core::f32::consts::SQRT_2,
        _ => unreachable!("last band stage is always a peak"),
    }
}

impl Effect for ReflectionEq {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        if !self.fast_path {
            let mut all_settled = true;
            for gain in &mut self.gains {
                gain.advance();
                all_settled &= gain.is_settled();
            }
            self.update_all_coefficients();
            self.fast_path = all_settled;
        }

        let mut x = input;
        for filter in &mut self.filters {
            x = filter.process(x);
        }
        x
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for gain in &mut self.gains {
            gain.set_sample_rate(sample_rate);
        }
        self.fast_path = false;
        self.update_all_coefficients();
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.clear();
        }
        for gain in &mut self.gains {
            gain.snap_to_target();
        }
        self.fast_path = true;
        self.update_all_coefficients();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(eq: &mut ReflectionEq, samples: usize) {
        for _ in 0..samples {
            eq.process(0.0);
        }
    }

    #[test]
    fn flat_target_leaves_dc_near_unity() {
        let bands = [125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0];
        let mut eq = ReflectionEq::new(48000.0, &bands);
        eq.set_target_gains_db(&[0.0; 6]);
        settle(&mut eq, 2000);

        let mut out = 0.0;
        for _ in 0..500 {
            out = eq.process(1.0);
        }
        assert!((out - 1.0).abs() < 0.1, "flat EQ should pass DC near unity, got {out}");
    }

    #[test]
    fn boosting_one_band_raises_energy_near_it() {
        let bands = [125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0];
        let mut eq_flat = ReflectionEq::new(48000.0, &bands);
        eq_flat.set_target_gains_db(&[0.0; 6]);

        let mut eq_boost = ReflectionEq::new(48000.0, &bands);
        eq_boost.set_target_gains_db(&[0.0, 0.0, 12.0, 0.0, 0.0, 0.0]);
        settle(&mut eq_boost, 4000);
        settle(&mut eq_flat, 4000);

        let tone: Vec<f32> = (0..2000)
            .map(|i| (2.0 * PI * 500.0 * i as f32 / 48000.0).sin())
            .collect();
        let flat_rms: f32 = {
            let out: Vec<f32> = tone.iter().map(|&x| eq_flat.process(x)).collect();
            (out.iter().map(|s| s * s).sum::<f32>() / out.len() as f32).sqrt()
        };
        let boost_rms: f32 = {
            let out: Vec<f32> = tone.iter().map(|&x| eq_boost.process(x)).collect();
            (out.iter().map(|s| s * s).sum::<f32>() / out.len() as f32).sqrt()
        };
        assert!(boost_rms > flat_rms, "boosted band should have more energy: {boost_rms} vs {flat_rms}");
    }

    #[test]
    fn settles_into_fast_path() {
        let bands = [250.0, 1000.0, 4000.0];
        let mut eq = ReflectionEq::new(48000.0, &bands);
        eq.set_target_gains_db(&[3.0, -3.0, 3.0]);
        assert!(!eq.fast_path);
        settle(&mut eq, 10_000);
        assert!(eq.fast_path, "gains should settle and switch to the fast path");
    }

    #[test]
    fn output_always_finite() {
        let bands = [125.0, 500.0, 2000.0, 8000.0];
        let mut eq = ReflectionEq::new(48000.0, &bands);
        eq.set_target_gains_db(&[-12.0, 6.0, -6.0, 12.0]);
        for i in 0..5000 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            assert!(eq.process(x).is_finite());
        }
    }
}
