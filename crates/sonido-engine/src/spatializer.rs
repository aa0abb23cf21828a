//! The binaural spatialiser boundary: "spatialise one mono buffer at a pose -> stereo",
//! consumed through a trait so the real HRTF convolution/ITD engine plugs
//! in without this crate knowing its internals.

use sonido_geometry::Vec3;

/// Spatialisation quality/cost tradeoff, switched atomically at block
/// boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialisationMode {
    Quality,
    Performance,
    /// Bypasses spatialisation entirely; callers get silence on both
    /// channels (used for A/B testing the DSP chain without HRTF cost).
    None,
}

/// One spatialised voice's position relative to the listener, in the
/// listener's local frame (forward = +z), which is all a spatialiser
/// needs to pick an HRIR or compute an ITD/ILD pan.
#[derive(Debug, Clone, Copy)]
pub struct SpatialPose {
    pub relative_position: Vec3,
}

/// "Spatialise one mono buffer at a pose -> stereo." Implementations may
/// hold internal state (e.g. convolution history) keyed by a caller-chosen
/// voice id so per-voice filter state persists across blocks.
pub trait Spatializer: Send {
    /// Load HRTF/resampling data from caller-opaque paths. Leaves the
    /// previous data active on failure.
    fn load_files(&mut self, resampling_step: u32, file_paths: &[String]) -> bool;

    fn set_mode(&mut self, mode: SpatialisationMode);

    /// Spatialise `mono_in` for voice `voice_id` at `pose`, accumulating
    /// into `stereo_out` (not overwriting, so multiple voices can mix into
    /// one block-sized accumulator).
    fn spatialize(&mut self, voice_id: u64, mono_in: &[f32], pose: SpatialPose, stereo_out: &mut [(f32, f32)]);

    /// Drop any per-voice state, e.g. once a VS has fully faded out.
    fn release_voice(&mut self, voice_id: u64);
}

/// A cheap stand-in used by tests and the `none` spatialisation mode:
/// equal-power pan by azimuth, no distance or elevation filtering. Never
/// fails to load (there's nothing to load).
#[derive(Debug, Default)]
pub struct PanningSpatializer {
    mode: SpatialisationMode,
}

impl PanningSpatializer {
    #[must_use]
    pub fn new() -> Self {
        Self { mode: SpatialisationMode::Performance }
    }
}

impl Spatializer for PanningSpatializer {
    fn load_files(&mut self, _resampling_step: u32, _file_paths: &[String]) -> bool {
        true
    }

    fn set_mode(&mut self, mode: SpatialisationMode) {
        self.mode = mode;
    }

    fn spatialize(&mut self, _voice_id: u64, mono_in: &[f32], pose: SpatialPose, stereo_out: &mut [(f32, f32)]) {
        if self.mode == SpatialisationMode::None {
            return;
        }
        let p = pose.relative_position;
        let horizontal = (p.x * p.x + p.z * p.z).sqrt().max(1e-6);
        // -1 (hard left) .. +1 (hard right), equal-power law.
        let pan = (p.x / horizontal).clamp(-1.0, 1.0);
        let angle = (pan + 1.0) * core::f32::consts::FRAC_PI_4;
        let (left_gain, right_gain) = (angle.cos(), angle.sin());

        for (sample, out) in mono_in.iter().zip(stereo_out.iter_mut()) {
            out.0 += sample * left_gain;
            out.1 += sample * right_gain;
        }
    }

    fn release_voice(&mut self, _voice_id: u64) {}
}

impl Default for SpatialisationMode {
    fn default() -> Self {
        SpatialisationMode::Performance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_mode_produces_silence() {
        let mut sp = PanningSpatializer::new();
        sp.set_mode(SpatialisationMode::None);
        let mut out = vec![(0.0, 0.0); 4];
        sp.spatialize(0, &[1.0; 4], SpatialPose { relative_position: Vec3::new(1.0, 0.0, 0.0) }, &mut out);
        assert!(out.iter().all(|&(l, r)| l == 0.0 && r == 0.0));
    }

    #[test]
    fn hard_right_favours_right_channel() {
        let mut sp = PanningSpatializer::new();
        let mut out = vec![(0.0, 0.0); 1];
        sp.spatialize(0, &[1.0], SpatialPose { relative_position: Vec3::new(10.0, 0.0, 0.01) }, &mut out);
        assert!(out[0].1 > out[0].0);
    }
}
