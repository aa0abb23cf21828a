//! Cross-faded FIR runtime for the BTM diffraction model.
//!
//! Holds a `current_ir` actually used for convolution and a `target_ir`
//! produced by the latest BTM solve. When they differ, one tap per sample
//! is nudged from current toward target so updates never click, even
//! though the impulse response itself can change length between solves.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec;
use alloc::vec::Vec;

use sonido_core::Effect;

/// Taps below this magnitude at the tail are trimmed when an IR decays to
/// effectively nothing, so degenerate solves don't carry dead length
/// forever.
const TAIL_TRIM_THRESHOLD: f32 = 1e-6;
/// How many taps are nudged toward their target per sample.
const TAPS_PER_SAMPLE: usize = 1;

/// A FIR filter whose impulse response can be swapped at runtime without
/// discontinuities, used to realise BTM diffraction filters whose taps are
/// recomputed by the background geometry engine.
#[derive(Debug, Clone, Default)]
pub struct CrossfadedFir {
    current_ir: Vec<f32>,
    target_ir: Vec<f32>,
    /// Circular history of input samples, length >= max(current, target).
    line: Vec<f32>,
    write_pos: usize,
    /// Index of the next tap to nudge toward its target.
    crossfade_tap: usize,
}

impl CrossfadedFir {
    /// Create an empty FIR (identity: zero taps, pass nothing through).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a FIR with an initial impulse response (no crossfade needed).
    pub fn with_ir(ir: Vec<f32>) -> Self {
        let len = ir.len();
        Self {
            current_ir: ir.clone(),
            target_ir: ir,
            line: vec![0.0; len.max(1)],
            write_pos: 0,
            crossfade_tap: len,
        }
    }

    /// Current impulse response length actually being convolved against.
    pub fn current_len(&self) -> usize {
        self.current_ir.len()
    }

    /// Whether a crossfade toward a new target is still in progress.
    pub fn is_crossfading(&self) -> bool {
        self.crossfade_tap < self.current_ir.len().max(self.target_ir.len())
            || self.current_ir.len() != self.target_ir.len()
    }

    /// Replace the target impulse response. The current response crossfades
    /// toward it tap-by-tap as `process` is called.
    pub fn set_target_ir(&mut self, ir: Vec<f32>) {
        let new_len = ir.len();
        let old_len = self.current_ir.len();

        if new_len < old_len {
            // Shrink: keep the most recent `new_len` history samples, and
            // realign the circular index to 0 so future reads stay simple.
            self.realign_history(new_len.max(1));
            self.current_ir.truncate(new_len);
        } else if new_len > old_len {
            // Grow: new taps start at zero and fade in.
            self.realign_history(new_len);
            self.current_ir.resize(new_len, 0.0);
        }

        self.target_ir = ir;
        self.crossfade_tap = 0;
    }

    /// Re-lay the circular history into a fresh buffer of `new_capacity`,
    /// with the most recent sample at the end and `write_pos` reset to 0.
    fn realign_history(&mut self, new_capacity: usize) {
        let old_capacity = self.line.len();
        let mut realigned = vec![0.0f32; new_capacity];
        if old_capacity > 0 {
            let n = old_capacity.min(new_capacity);
            for i in 0..n {
                // i=0 is the most recently written sample.
                let src = (self.write_pos + old_capacity - 1 - i) % old_capacity;
                realigned[new_capacity - 1 - i] = self.line[src];
            }
        }
        self.line = realigned;
        self.write_pos = 0;
    }

    /// Trim trailing taps below the magnitude threshold from the target
    /// response, for pathologically long BTM solves that decay to nothing.
    pub fn trim_decayed_tail(&mut self) {
        while let Some(&last) = self.target_ir.last() {
            if last.abs() < TAIL_TRIM_THRESHOLD && self.target_ir.len() > 1 {
                self.target_ir.pop();
            } else {
                break;
            }
        }
    }

    fn advance_crossfade(&mut self) {
        if self.current_ir.len() != self.target_ir.len() {
            return;
        }
        let len = self.current_ir.len();
        for _ in 0..TAPS_PER_SAMPLE {
            if self.crossfade_tap >= len {
                break;
            }
            self.current_ir[self.crossfade_tap] = self.target_ir[self.crossfade_tap];
            self.crossfade_tap += 1;
        }
    }

    fn convolve(&self) -> f32 {
        let len = self.current_ir.len();
        if len == 0 || self.line.is_empty() {
            return 0.0;
        }
        let capacity = self.line.len();
        let mut acc = 0.0;

        // Vectorisable 8-tap chunks when possible; falls back to scalar.
        let chunks = len / 8;
        let mut tap = 0;
        for _ in 0..chunks {
            let mut chunk_acc = [0.0f32; 8];
            for (k, slot) in chunk_acc.iter_mut().enumerate() {
                let idx = (self.write_pos + capacity - 1 - (tap + k)) % capacity;
                *slot = self.current_ir[tap + k] * self.line[idx];
            }
            acc += chunk_acc.iter().sum::<f32>();
            tap += 8;
        }
        while tap < len {
            let idx = (self.write_pos + capacity - 1 - tap) % capacity;
            acc += self.current_ir[tap] * self.line[idx];
            tap += 1;
        }
        acc
    }
}

impl Effect for CrossfadedFir {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        if self.line.is_empty() {
            return 0.0;
        }
        self.line[self.write_pos] = input;
        self.write_pos = (self.write_pos + 1) % self.line.len();

        if self.current_ir.len() != self.target_ir.len() || self.crossfade_tap < self.current_ir.len() {
            self.advance_crossfade();
        }

        self.convolve()
    }

    fn reset(&mut self) {
        self.line.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
        self.current_ir.clone_from(&self.target_ir);
        self.crossfade_tap = self.current_ir.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_response_appears_after_n_samples() {
        let mut fir = CrossfadedFir::with_ir(vec![0.0, 0.0, 1.0, 0.5]);
        let mut outputs = Vec::new();
        outputs.push(fir.process(1.0));
        outputs.push(fir.process(0.0));
        outputs.push(fir.process(0.0));
        outputs.push(fir.process(0.0));
        assert!((outputs[2] - 1.0).abs() < 1e-6, "tap at index 2 should hit on sample 2: {outputs:?}");
        assert!((outputs[3] - 0.5).abs() < 1e-6, "tap at index 3 should hit on sample 3: {outputs:?}");
    }

    #[test]
    fn crossfade_eventually_reaches_target() {
        let mut fir = CrossfadedFir::with_ir(vec![1.0, 0.0, 0.0]);
        fir.set_target_ir(vec![0.0, 1.0, 0.0]);
        assert!(fir.is_crossfading());
        for _ in 0..10 {
            fir.process(0.0);
        }
        assert!(!fir.is_crossfading());
        assert_eq!(fir.current_ir, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn shrink_and_grow_keep_output_finite() {
        let mut fir = CrossfadedFir::with_ir(vec![0.2; 16]);
        fir.set_target_ir(vec![0.1; 4]);
        for i in 0..200 {
            assert!(fir.process((i as f32 * 0.01).sin()).is_finite());
        }
        fir.set_target_ir(vec![0.05; 40]);
        for i in 0..200 {
            assert!(fir.process((i as f32 * 0.01).cos()).is_finite());
        }
    }

    #[test]
    fn trims_decayed_tail() {
        let mut fir = CrossfadedFir::with_ir(vec![1.0, 0.5]);
        let mut tail = vec![0.3, 0.0000001, 0.0];
        let mut target = vec![1.0, 0.5];
        target.append(&mut tail);
        fir.set_target_ir(target);
        fir.trim_decayed_tail();
        assert!(fir.target_ir.len() < 5);
    }
}
