//! Scalar shadow-zone gain followed by a single fixed low-pass.

use sonido_core::{Effect, OnePole, SmoothedParam};
use sonido_geometry::DiffractionPath;

use super::DiffractionFilter;

const CUTOFF_HZ: f32 = 1000.0;

#[derive(Debug, Clone)]
pub struct LpfFilter {
    gain: SmoothedParam,
    lowpass: OnePole,
}

impl LpfFilter {
    #[must_use]
    pub fn new(sample_rate: f32) -> Self {
        Self {
            gain: SmoothedParam::with_config(0.0, sample_rate, 5.0),
            lowpass: OnePole::new(sample_rate, CUTOFF_HZ),
        }
    }
}

impl DiffractionFilter for LpfFilter {
    fn update_geometry(&mut self, path: &DiffractionPath, _sample_rate: f32) {
        self.gain.set_target(if path.shadow_zone { 1.0 } else { 0.0 });
    }
}

impl Effect for LpfFilter {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let gain = self.gain.advance();
        self.lowpass.process(input * gain)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.gain.set_sample_rate(sample_rate);
        self.lowpass.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.gain.snap_to_target();
        self.lowpass.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_finite_and_bounded() {
        let mut f = LpfFilter::new(48000.0);
        f.gain.set_immediate(1.0);
        for i in 0..1000 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let y = f.process(x);
            assert!(y.is_finite());
            assert!(y.abs() <= 1.01);
        }
    }
}
