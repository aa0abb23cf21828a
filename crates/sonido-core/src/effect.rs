//! Core Effect trait and related types.
//!
//! The [`Effect`] trait is the foundation of the DSP framework: every
//! diffraction filter model, the air absorption filter, the reflection EQ
//! and each FDN channel implement it, giving the per-path VS chain a
//! uniform way to process, reset and report latency regardless of what's
//! behind the trait object.
//!
//! ## Design Decisions
//!
//! - **Mono processing**: single `f32` input/output per stage. A VS chain
//!   is built by running several mono `Effect`s in series over one path's
//!   signal; the binaural spread happens afterwards, in the spatializer.
//!
//! - **Object-safe**: the trait is designed to be object-safe, since a VS
//!   chain's diffraction stage is chosen at runtime (`dyn Effect`) based on
//!   the active diffraction model.
//!
//! - **No allocations**: all methods are designed to be called in real-time
//!   audio contexts with zero heap allocations.

/// Core trait for all audio effects.
///
/// Effects process audio samples, either one at a time or in blocks.
/// The trait is designed to be object-safe while supporting efficient
/// static dispatch when used with generics.
///
/// # Example
///
/// ```rust
/// use sonido_core::Effect;
///
/// struct Gain {
///     gain: f32,
/// }
///
/// impl Effect for Gain {
///     fn process(&mut self, input: f32) -> f32 {
///         input * self.gain
///     }
///
///     fn set_sample_rate(&mut self, _sample_rate: f32) {
///         // Gain doesn't depend on sample rate
///     }
///
///     fn reset(&mut self) {
///         // Gain has no internal state to reset
///     }
/// }
/// ```
pub trait Effect {
    /// Process a single sample.
    ///
    /// This is the core processing function. For effects with internal state
    /// (filters, delays, etc.), this advances the state by one sample.
    ///
    /// # Arguments
    /// * `input` - Input sample, typically in range [-1.0, 1.0]
    ///
    /// # Returns
    /// Processed output sample
    fn process(&mut self, input: f32) -> f32;

    /// Process a block of samples.
    ///
    /// Default implementation calls `process()` for each sample. Effects
    /// may override this for SIMD optimization or more efficient block
    /// processing.
    ///
    /// # Arguments
    /// * `input` - Input sample buffer
    /// * `output` - Output sample buffer (must be same length as input)
    ///
    /// # Panics
    /// Default implementation panics if `input.len() != output.len()`
    fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert_eq!(
            input.len(),
            output.len(),
            "Input and output buffers must have same length"
        );
        for (inp, out) in input.iter().zip(output.iter_mut()) {
            *out = self.process(*inp);
        }
    }

    /// Process a block of samples in-place.
    ///
    /// Convenience method for when input and output are the same buffer.
    /// Default implementation processes each sample in place.
    ///
    /// # Arguments
    /// * `buffer` - Buffer to process in-place
    fn process_block_inplace(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Update the sample rate.
    ///
    /// Called when the sample rate changes. Effects should recalculate
    /// any sample-rate-dependent coefficients (filter coefficients,
    /// delay times in samples, LFO increments, etc.).
    ///
    /// # Arguments
    /// * `sample_rate` - New sample rate in Hz (e.g., 44100.0, 48000.0)
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Reset internal state.
    ///
    /// Clears all internal state (delay lines, filter history, etc.)
    /// without changing parameters. Called when playback stops/starts
    /// or when the effect is bypassed to prevent artifacts.
    fn reset(&mut self);

    /// Report processing latency in samples.
    ///
    /// Returns the number of samples of latency introduced by this effect.
    /// Used for latency compensation in DAWs. Most effects have zero latency;
    /// lookahead limiters and linear-phase filters are exceptions.
    ///
    /// Default returns 0 (no latency).
    fn latency_samples(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gain(f32);

    impl Effect for Gain {
        fn process(&mut self, input: f32) -> f32 {
            input * self.0
        }
        fn set_sample_rate(&mut self, _: f32) {}
        fn reset(&mut self) {}
    }

    #[test]
    fn process_block_matches_per_sample() {
        let mut gain = Gain(2.0);
        let input = [1.0, 2.0, 3.0];
        let mut output = [0.0; 3];
        gain.process_block(&input, &mut output);
        assert_eq!(output, [2.0, 4.0, 6.0]);
    }

    #[test]
    fn process_block_inplace_matches_process_block() {
        let mut a = Gain(0.5);
        let mut b = Gain(0.5);
        let mut inplace = [1.0, 2.0, 3.0];
        let separate_in = [1.0, 2.0, 3.0];
        let mut separate_out = [0.0; 3];
        a.process_block_inplace(&mut inplace);
        b.process_block(&separate_in, &mut separate_out);
        assert_eq!(inplace, separate_out);
    }

    #[test]
    fn default_latency_is_zero() {
        let gain = Gain(1.0);
        assert_eq!(gain.latency_samples(), 0);
    }
}
