//! Delay-line lengths drawn from room dimensions plus bounded jitter:
//! `round(fs * (d_dim + U(-0.1,0.1)*mean(dims)) / c)`, cycled over the
//! room's dimension list to fill `num_channels` lines.

use rand::Rng;
use sonido_geometry::speed_of_sound;

const JITTER_FRACTION: f32 = 0.1;

#[must_use]
pub fn compute_delay_lengths(room_dimensions: &[f32], num_channels: usize, sample_rate: f32, rng: &mut impl Rng) -> Vec<usize> {
    assert!(!room_dimensions.is_empty(), "room dimensions must be non-empty");
    let mean = room_dimensions.iter().sum::<f32>() / room_dimensions.len() as f32;

    (0..num_channels)
        .map(|k| {
            let dim = room_dimensions[k % room_dimensions.len()];
            let jitter = rng.gen_range(-JITTER_FRACTION..JITTER_FRACTION) * mean;
            let length = ((dim + jitter) * sample_rate / speed_of_sound()).round();
            (length.max(1.0)) as usize
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn cycles_dimensions_and_stays_positive() {
        let mut rng = StdRng::seed_from_u64(7);
        let lengths = compute_delay_lengths(&[4.0, 5.0, 6.0], 8, 48000.0, &mut rng);
        assert_eq!(lengths.len(), 8);
        assert!(lengths.iter().all(|&l| l > 0));
    }
}
