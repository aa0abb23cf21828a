//! Reverberation time (T60) estimation from room volume and absorption.

use libm::logf;

const SPEED_OF_SOUND: f32 = 343.0;

/// Sabine's equation: `T60 = 0.161 * V / A`, `A = sum(area_i * absorption_i)`.
/// Returns `None` if the volume or total absorption is non-positive
/// (degenerate room), matching this crate's "excessive T60 disables the FDN"
/// failure mode.
#[must_use]
pub fn sabine_t60(volume_m3: f32, total_absorption: f32) -> Option<f32> {
    if volume_m3 <= 0.0 || total_absorption <= 0.0 {
        return None;
    }
    let t60 = 0.161 * volume_m3 / total_absorption;
    (t60.is_finite() && t60 > 0.0).then_some(t60)
}

/// Eyring's equation, more accurate than Sabine for highly absorptive
/// rooms: `T60 = 0.161 * V / (-S * ln(1 - mean_absorption))`.
#[must_use]
pub fn eyring_t60(volume_m3: f32, total_surface_area: f32, mean_absorption: f32) -> Option<f32> {
    if volume_m3 <= 0.0 || total_surface_area <= 0.0 {
        return None;
    }
    let mean_absorption = mean_absorption.clamp(0.0, 0.999_99);
    let denom = -total_surface_area * logf(1.0 - mean_absorption);
    if denom <= 0.0 {
        return None;
    }
    let t60 = 0.161 * volume_m3 / denom;
    (t60.is_finite() && t60 > 0.0).then_some(t60)
}

/// Mean free path of the enclosure, used to pick FDN delay line lengths:
/// `4V/S`.
#[must_use]
pub fn mean_free_path(volume_m3: f32, total_surface_area: f32) -> f32 {
    if total_surface_area <= 0.0 { 0.0 } else { 4.0 * volume_m3 / total_surface_area }
}

/// Convert a T60 (seconds) into the per-sample decay gain for a delay line
/// of `delay_samples` at `sample_rate`, so energy decays by -60dB every
/// T60 seconds: `g = 10^(-3 * delay_samples / (sample_rate * t60))`.
#[must_use]
pub fn per_loop_decay_gain(delay_samples: f32, sample_rate: f32, t60: f32) -> f32 {
    if t60 <= 0.0 {
        return 0.0;
    }
    10f32.powf(-3.0 * delay_samples / (sample_rate * t60))
}

/// Speed of sound used throughout the engine for distance/delay conversion.
#[must_use]
pub const fn speed_of_sound() -> f32 {
    SPEED_OF_SOUND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sabine_matches_hand_computed_value() {
        // 10x10x3 room, absorption A=20 m^2 sabins.
        let t60 = sabine_t60(300.0, 20.0).unwrap();
        assert!((t60 - (0.161 * 300.0 / 20.0)).abs() < 1e-4);
    }

    #[test]
    fn degenerate_volume_returns_none() {
        assert!(sabine_t60(0.0, 20.0).is_none());
        assert!(sabine_t60(-1.0, 20.0).is_none());
        assert!(sabine_t60(300.0, 0.0).is_none());
    }

    #[test]
    fn decay_gain_reaches_minus_60db_after_one_t60() {
        let sr = 48000.0;
        let t60 = 1.0;
        let delay_samples = 100.0;
        let gain = per_loop_decay_gain(delay_samples, sr, t60);
        // After t60 seconds, the energy accumulated over (sr*t60/delay_samples)
        // loop iterations should be down 60dB, i.e. gain^loops ≈ 1e-3.
        let loops = sr * t60 / delay_samples;
        let total = gain.powf(loops);
        assert!((total - 1e-3).abs() / 1e-3 < 0.05, "got {total}");
    }
}
