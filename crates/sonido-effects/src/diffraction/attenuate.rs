//! Baseline sanity model: unit gain in the shadow zone, silence outside.

use sonido_core::{Effect, SmoothedParam};
use sonido_geometry::DiffractionPath;

use super::DiffractionFilter;

#[derive(Debug, Clone)]
pub struct AttenuateFilter {
    gain: SmoothedParam,
}

impl AttenuateFilter {
    #[must_use]
    pub fn new(sample_rate: f32) -> Self {
        Self { gain: SmoothedParam::with_config(0.0, sample_rate, 5.0) }
    }
}

impl DiffractionFilter for AttenuateFilter {
    fn update_geometry(&mut self, path: &DiffractionPath, _sample_rate: f32) {
        self.gain.set_target(if path.shadow_zone { 1.0 } else { 0.0 });
    }
}

impl Effect for AttenuateFilter {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        input * self.gain.advance()
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.gain.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.gain.snap_to_target();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_in_shadow_silent_outside() {
        let mut f = AttenuateFilter::new(48000.0);
        f.gain.set_immediate(1.0);
        assert!((f.process(1.0) - 1.0).abs() < 1e-6);

        f.gain.set_immediate(0.0);
        assert!(f.process(1.0).abs() < 1e-6);
    }
}
