//! The FDN itself: N recirculating delay lines, each with a
//! per-band decay filter matched to the room's target `T60`, mixed through
//! a fixed orthogonal matrix, feeding N spatialised reverb-source taps.

use sonido_core::Effect;
use sonido_effects::ReflectionEq;
use sonido_geometry::Vec3;

use crate::decay_filter::BandDecayFilter;
use crate::delay_line::DelayLine;
use crate::delay_lengths::compute_delay_lengths;
use crate::matrix::MixMatrix;
use crate::reverb_source::directions;

/// Attenuation applied to a reverb-source tap's EQ per unit of the
/// direction's average absorption coefficient, converted to dB via the
/// usual energy-reflection relation `20*log10(1 - absorption)`.
fn absorption_to_gain_db(absorption: f32) -> f32 {
    let reflectance = (1.0 - absorption).clamp(0.01, 1.0);
    20.0 * libm::log10f(reflectance)
}

/// The full feedback delay network: one call per audio sample.
pub struct Fdn {
    delay_lines: Vec<DelayLine>,
    decay_filters: Vec<BandDecayFilter>,
    matrix: MixMatrix,
    direction_eqs: Vec<ReflectionEq>,
    directions: Vec<Vec3>,
    mix_buffer: Vec<f32>,
    recirculate: Vec<f32>,
    enabled: bool,
}

impl Fdn {
    /// `num_channels` must be one of the supported reverb-source counts
    /// (see [`crate::reverb_source::snap_reverb_source_count`]).
    #[must_use]
    pub fn new(
        sample_rate: f32,
        num_channels: usize,
        room_dimensions: &[f32],
        band_freqs: &[f32],
        matrix_kind: crate::matrix::MixMatrixKind,
        seed: u64,
        rng: &mut impl rand::Rng,
    ) -> Self {
        let lengths = compute_delay_lengths(room_dimensions, num_channels, sample_rate, rng);
        let delay_lines = lengths.iter().map(|&len| DelayLine::new(len)).collect();
        let decay_filters = (0..num_channels).map(|_| BandDecayFilter::new(sample_rate, band_freqs)).collect();
        let matrix = match matrix_kind {
            crate::matrix::MixMatrixKind::Householder => MixMatrix::householder(num_channels),
            crate::matrix::MixMatrixKind::RandomOrthogonal => MixMatrix::random_orthogonal(num_channels, seed),
        };
        let direction_eqs = (0..num_channels).map(|_| ReflectionEq::new(sample_rate, band_freqs)).collect();

        Self {
            delay_lines,
            decay_filters,
            matrix,
            direction_eqs,
            directions: directions(num_channels),
            mix_buffer: vec![0.0; num_channels],
            recirculate: vec![0.0; num_channels],
            enabled: true,
        }
    }

    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.delay_lines.len()
    }

    #[must_use]
    pub fn directions(&self) -> &[Vec3] {
        &self.directions
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Apply a per-band `T60` target to every channel. Disables the FDN
    /// if any band comes back
    /// non-finite or non-positive.
    pub fn set_target_t60(&mut self, t60s: &[f32]) {
        self.enabled = t60s.iter().all(|t| t.is_finite() && *t > 0.0);
        if !self.enabled {
            return;
        }
        for (filter, &len) in self.decay_filters.iter_mut().zip(self.delay_lines.iter().map(DelayLine::len)) {
            filter.set_target_t60(len, t60s);
        }
    }

    /// Per-direction average absorption from the IEM's reverb ray-casts,
    /// reshaping each reverb-source tap's EQ.
    pub fn set_direction_absorption(&mut self, absorptions: &[[f32; 4]]) {
        assert_eq!(absorptions.len(), self.direction_eqs.len(), "direction count mismatch");
        for (eq, bands) in self.direction_eqs.iter_mut().zip(absorptions.iter()) {
            let gains_db: Vec<f32> = bands.iter().map(|&a| absorption_to_gain_db(a)).collect();
            let n = eq.bands();
            if gains_db.len() == n {
                eq.set_target_gains_db(&gains_db);
            } else {
                // Band count mismatch (e.g. fewer absorption bands than EQ
                // bands): repeat the last known value to fill the rest.
                let mut padded = gains_db.clone();
                padded.resize(n, *gains_db.last().unwrap_or(&0.0));
                eq.set_target_gains_db(&padded);
            }
        }
    }

    /// Advance the network by one sample. `channel_inputs` feeds each
    /// delay line directly (already routed by the caller's FDN channel
    /// allocator); `out_taps` receives this sample's per-direction
    /// reverb-source signal, pre-spatialisation.
    pub fn process(&mut self, channel_inputs: &[f32], out_taps: &mut [f32]) {
        let n = self.num_channels();
        assert_eq!(channel_inputs.len(), n);
        assert_eq!(out_taps.len(), n);

        if !self.enabled {
            out_taps.fill(0.0);
            return;
        }

        for (i, line) in self.delay_lines.iter().enumerate() {
            self.mix_buffer[i] = self.decay_filters[i].process(line.read());
        }

        self.matrix.apply(&self.mix_buffer, &mut self.recirculate);

        for i in 0..n {
            self.delay_lines[i].write(channel_inputs[i] + self.recirculate[i]);
            out_taps[i] = self.direction_eqs[i].process(self.mix_buffer[i]);
        }
    }

    pub fn reset(&mut self) {
        for line in &mut self.delay_lines {
            line.clear();
        }
        for filter in &mut self.decay_filters {
            filter.reset();
        }
        for eq in &mut self.direction_eqs {
            eq.reset();
        }
        self.mix_buffer.iter_mut().for_each(|s| *s = 0.0);
        self.recirculate.iter_mut().for_each(|s| *s = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn make_fdn() -> Fdn {
        let mut rng = StdRng::seed_from_u64(3);
        Fdn::new(48000.0, 6, &[4.0, 5.0, 3.0], &[250.0, 1000.0, 4000.0], crate::matrix::MixMatrixKind::Householder, 1, &mut rng)
    }

    #[test]
    fn impulse_produces_finite_recirculating_tail() {
        let mut fdn = make_fdn();
        fdn.set_target_t60(&[0.8, 0.8, 0.8]);
        fdn.set_direction_absorption(&[[0.2; 4]; 6]);

        let n = fdn.num_channels();
        let mut taps = vec![0.0; n];
        let mut inputs = vec![0.0; n];
        inputs[0] = 1.0;

        let mut any_nonzero_later = false;
        for i in 0..20_000 {
            fdn.process(&inputs, &mut taps);
            inputs.iter_mut().for_each(|s| *s = 0.0);
            assert!(taps.iter().all(|t| t.is_finite()));
            if i > 5000 && taps.iter().any(|&t| t.abs() > 1e-6) {
                any_nonzero_later = true;
            }
        }
        assert!(any_nonzero_later, "FDN should still be ringing well after the impulse");
    }

    #[test]
    fn invalid_t60_disables_the_network() {
        let mut fdn = make_fdn();
        fdn.set_target_t60(&[0.0, 0.8, 0.8]);
        assert!(!fdn.is_enabled());

        let n = fdn.num_channels();
        let inputs = vec![1.0; n];
        let mut taps = vec![1.0; n];
        fdn.process(&inputs, &mut taps);
        assert!(taps.iter().all(|&t| t == 0.0));
    }
}
