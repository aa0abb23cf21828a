//! Per-channel decay filter: shapes one FDN delay line's
//! recirculating signal so that energy in each band decays to match a
//! target `T60`, via `g_{k,b} = 10^(-3 M_k / (fs T60_b))` applied as a
//! per-band gain in dB (`-60 M_k / (fs T60_b)`).
//!
//! Unlike [`sonido_effects::ReflectionEq`], this doesn't solve a response
//! matrix to compensate for inter-band overlap: the FDN only needs each
//! band's decay rate in the right ballpark, not an exact per-band gain at
//! a handful of reflection breakpoints, so a plain cascade of peaking
//! filters plus a trailing high shelf is enough.

use sonido_core::{Biquad, SmoothedParam, high_shelf_coefficients, peaking_eq_coefficients};

const BAND_Q: f32 = 1.0;
const SHELF_SLOPE: f32 = 1.0;
const GAIN_SMOOTH_MS: f32 = 10.0;

#[derive(Clone, Copy)]
enum Stage {
    Peak(f32),
    HighShelf(f32),
}

/// One delay line's per-band decay shaping: `bands.len() - 1` peaking
/// filters plus a trailing high shelf for the top band.
#[derive(Clone)]
pub struct BandDecayFilter {
    sample_rate: f32,
    stages: Vec<Stage>,
    filters: Vec<Biquad>,
    gains_db: Vec<SmoothedParam>,
}

impl BandDecayFilter {
    /// `band_freqs` must be non-empty and strictly increasing; the last
    /// entry becomes the high-shelf corner, the rest become peaking bands.
    #[must_use]
    pub fn new(sample_rate: f32, band_freqs: &[f32]) -> Self {
        assert!(!band_freqs.is_empty(), "decay filter needs at least one band");
        let n = band_freqs.len();
        let mut stages = Vec::with_capacity(n);
        for &f in &band_freqs[..n - 1] {
            stages.push(Stage::Peak(f));
        }
        stages.push(Stage::HighShelf(band_freqs[n - 1]));

        let filters = vec![Biquad::new(); n];
        let gains_db = (0..n).map(|_| SmoothedParam::with_config(0.0, sample_rate, GAIN_SMOOTH_MS)).collect();

        let mut filter = Self { sample_rate, stages, filters, gains_db };
        filter.update_coefficients();
        filter
    }

    #[must_use]
    pub fn bands(&self) -> usize {
        self.stages.len()
    }

    /// Set target per-band gains directly, in dB.
    pub fn set_target_gains_db(&mut self, band_gains_db: &[f32]) {
        assert_eq!(band_gains_db.len(), self.bands(), "band gain count mismatch");
        for (gain, &target) in self.gains_db.iter_mut().zip(band_gains_db.iter()) {
            gain.set_target(target);
        }
    }

    /// Derive and set target gains from a per-band `T60` and this
    /// channel's delay length, per `g_{k,b} = 10^(-3 M_k/(fs T60_b))`.
    pub fn set_target_t60(&mut self, delay_samples: usize, t60s: &[f32]) {
        assert_eq!(t60s.len(), self.bands(), "t60 count mismatch");
        let m = delay_samples as f32;
        let gains_db: Vec<f32> = t60s
            .iter()
            .map(|&t60| if t60 > 1e-6 { -60.0 * m / (self.sample_rate * t60) } else { -120.0 })
            .collect();
        self.set_target_gains_db(&gains_db);
    }

    fn update_coefficients(&mut self) {
        for (filter, (stage, gain)) in self.filters.iter_mut().zip(self.stages.iter().zip(self.gains_db.iter_mut())) {
            let gain_db = gain.advance();
            let (b0, b1, b2, a0, a1, a2) = match *stage {
                Stage::Peak(f) => peaking_eq_coefficients(f, BAND_Q, gain_db, self.sample_rate),
                Stage::HighShelf(f) => high_shelf_coefficients(f, SHELF_SLOPE, gain_db, self.sample_rate),
            };
            filter.set_coefficients(b0, b1, b2, a0, a1, a2);
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.update_coefficients();
        let mut x = input;
        for filter in &mut self.filters {
            x = filter.process(x);
        }
        x
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for gain in &mut self.gains_db {
            gain.set_sample_rate(sample_rate);
        }
    }

    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.clear();
        }
        for gain in &mut self.gains_db {
            gain.snap_to_target();
        }
        self.update_coefficients();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(filter: &mut BandDecayFilter, samples: usize) {
        for _ in 0..samples {
            filter.process(0.0);
        }
    }

    #[test]
    fn longer_t60_keeps_more_energy_per_pass() {
        let bands = [250.0, 1000.0, 4000.0];
        let mut short = BandDecayFilter::new(48000.0, &bands);
        short.set_target_t60(2400, &[0.3, 0.3, 0.3]);
        settle(&mut short, 4000);

        let mut long = BandDecayFilter::new(48000.0, &bands);
        long.set_target_t60(2400, &[3.0, 3.0, 3.0]);
        settle(&mut long, 4000);

        let short_out = short.process(1.0).abs();
        let long_out = long.process(1.0).abs();
        assert!(long_out > short_out, "long T60 should pass more energy: {long_out} vs {short_out}");
    }

    #[test]
    fn output_stays_finite() {
        let bands = [125.0, 500.0, 2000.0, 8000.0];
        let mut filter = BandDecayFilter::new(48000.0, &bands);
        filter.set_target_t60(1200, &[0.5, 1.0, 1.5, 0.8]);
        for i in 0..5000 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            assert!(filter.process(x).is_finite());
        }
    }
}
