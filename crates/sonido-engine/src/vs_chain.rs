//! Per-virtual-source audio chain: diffraction filter ->
//! reflection EQ -> air absorption -> propagation delay -> gain, run once
//! per sample on the audio thread.

use sonido_core::{Effect, InterpolatedDelay, LinearSmoothedParam};
use sonido_effects::diffraction::{
    AttenuateFilter, BtmFilter, DiffractionFilter, DiffractionModelKind, LpfFilter, NnBestFilter, NnSmallFilter, UdfaFilter, UdfaIFilter,
    UtdFilter,
};
use sonido_effects::ReflectionEq;
use sonido_geometry::{speed_of_sound, DiffractionPath};
use sonido_iem::VsDescriptor;

const GAIN_SMOOTH_MS: f32 = 10.0;

/// Boxed diffraction filter dispatch: one field per model, matching the
/// "tagged variant of eight cases... a single (block_in, lerp,
/// block_out) operation" design note (§9) rather than a trait object,
/// since the source side only ever calls through the active variant.
enum DiffractionSlot {
    Attenuate(AttenuateFilter),
    Lpf(LpfFilter),
    Udfa(UdfaFilter),
    UdfaI(UdfaIFilter),
    NnBest(NnBestFilter),
    NnSmall(NnSmallFilter),
    Utd(UtdFilter),
    Btm(BtmFilter),
}

impl DiffractionSlot {
    fn new(kind: DiffractionModelKind, sample_rate: f32) -> Self {
        match kind {
            DiffractionModelKind::Attenuate => Self::Attenuate(AttenuateFilter::new(sample_rate)),
            DiffractionModelKind::Lpf => Self::Lpf(LpfFilter::new(sample_rate)),
            DiffractionModelKind::Udfa => Self::Udfa(UdfaFilter::new(sample_rate)),
            DiffractionModelKind::UdfaI => Self::UdfaI(UdfaIFilter::new(sample_rate)),
            DiffractionModelKind::NnBest => Self::NnBest(NnBestFilter::new(sample_rate)),
            DiffractionModelKind::NnSmall => Self::NnSmall(NnSmallFilter::new(sample_rate)),
            DiffractionModelKind::Utd => Self::Utd(UtdFilter::new(sample_rate)),
            DiffractionModelKind::Btm => Self::Btm(BtmFilter::new(sample_rate)),
        }
    }

    fn kind(&self) -> DiffractionModelKind {
        match self {
            Self::Attenuate(_) => DiffractionModelKind::Attenuate,
            Self::Lpf(_) => DiffractionModelKind::Lpf,
            Self::Udfa(_) => DiffractionModelKind::Udfa,
            Self::UdfaI(_) => DiffractionModelKind::UdfaI,
            Self::NnBest(_) => DiffractionModelKind::NnBest,
            Self::NnSmall(_) => DiffractionModelKind::NnSmall,
            Self::Utd(_) => DiffractionModelKind::Utd,
            Self::Btm(_) => DiffractionModelKind::Btm,
        }
    }

    fn applies_outside_shadow(&self) -> bool {
        match self {
            Self::Attenuate(f) => f.applies_outside_shadow(),
            Self::Lpf(f) => f.applies_outside_shadow(),
            Self::Udfa(f) => f.applies_outside_shadow(),
            Self::UdfaI(f) => f.applies_outside_shadow(),
            Self::NnBest(f) => f.applies_outside_shadow(),
            Self::NnSmall(f) => f.applies_outside_shadow(),
            Self::Utd(f) => f.applies_outside_shadow(),
            Self::Btm(f) => f.applies_outside_shadow(),
        }
    }

    fn update_geometry(&mut self, path: &DiffractionPath, sample_rate: f32) {
        match self {
            Self::Attenuate(f) => f.update_geometry(path, sample_rate),
            Self::Lpf(f) => f.update_geometry(path, sample_rate),
            Self::Udfa(f) => f.update_geometry(path, sample_rate),
            Self::UdfaI(f) => f.update_geometry(path, sample_rate),
            Self::NnBest(f) => f.update_geometry(path, sample_rate),
            Self::NnSmall(f) => f.update_geometry(path, sample_rate),
            Self::Utd(f) => f.update_geometry(path, sample_rate),
            Self::Btm(f) => f.update_geometry(path, sample_rate),
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        match self {
            Self::Attenuate(f) => f.process(input),
            Self::Lpf(f) => f.process(input),
            Self::Udfa(f) => f.process(input),
            Self::UdfaI(f) => f.process(input),
            Self::NnBest(f) => f.process(input),
            Self::NnSmall(f) => f.process(input),
            Self::Utd(f) => f.process(input),
            Self::Btm(f) => f.process(input),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Attenuate(f) => f.reset(),
            Self::Lpf(f) => f.reset(),
            Self::Udfa(f) => f.reset(),
            Self::UdfaI(f) => f.reset(),
            Self::NnBest(f) => f.reset(),
            Self::NnSmall(f) => f.reset(),
            Self::Utd(f) => f.reset(),
            Self::Btm(f) => f.reset(),
        }
    }
}

/// One virtual source's full per-sample DSP chain, plus the state the
/// IEM-diff/fade lifecycle needs: current/target gain and whether this VS
/// currently has a diffraction leg and/or a reflection leg.
pub struct VsChain {
    diffraction: Option<DiffractionSlot>,
    shadow_zone: bool,
    reflection_eq: Option<ReflectionEq>,
    air_absorption: sonido_effects::AirAbsorption,
    delay: InterpolatedDelay,
    delay_samples: f32,
    gain: LinearSmoothedParam,
    sample_rate: f32,
}

impl VsChain {
    #[must_use]
    pub fn new(sample_rate: f32, band_freqs: &[f32], max_delay_seconds: f32) -> Self {
        Self {
            diffraction: None,
            shadow_zone: false,
            reflection_eq: None,
            air_absorption: sonido_effects::AirAbsorption::new(sample_rate),
            delay: InterpolatedDelay::from_time(sample_rate, max_delay_seconds),
            delay_samples: 0.0,
            gain: LinearSmoothedParam::with_config(0.0, sample_rate, GAIN_SMOOTH_MS),
            sample_rate,
        }
    }

    /// Swap the active diffraction model, resetting per-VS filter state
    /// safely.
    pub fn set_diffraction_model(&mut self, kind: DiffractionModelKind) {
        if self.diffraction.as_ref().is_some_and(|d| d.kind() == kind) {
            return;
        }
        self.diffraction = Some(DiffractionSlot::new(kind, self.sample_rate));
    }

    /// Apply a fresh geometry snapshot from the IEM: reflection-colouring gains from accumulated reflectance,
    /// diffraction path geometry if present, and propagation distance.
    pub fn apply_update(&mut self, vs: &VsDescriptor, band_freqs: &[f32]) {
        self.shadow_zone = vs.diffraction_path.map(|p| p.shadow_zone).unwrap_or(false);

        if let Some(path) = vs.diffraction_path {
            if let Some(slot) = &mut self.diffraction {
                slot.update_geometry(&path, self.sample_rate);
            }
        }

        if vs.accumulated_reflectance.iter().any(|&r| r < 0.999) {
            let eq = self.reflection_eq.get_or_insert_with(|| ReflectionEq::new(self.sample_rate, band_freqs));
            let gains_db: Vec<f32> = vs
                .accumulated_reflectance
                .iter()
                .take(eq.bands())
                .map(|&r| 20.0 * libm::log10f(r.max(1e-4)))
                .collect();
            if gains_db.len() == eq.bands() {
                eq.set_target_gains_db(&gains_db);
            }
        } else {
            self.reflection_eq = None;
        }

        self.air_absorption.set_distance(vs.total_distance);
        self.delay_samples = (vs.total_distance * self.sample_rate / speed_of_sound()).min(self.delay.capacity() as f32 - 1.0).max(0.0);
    }

    /// This VS's contribution to the FDN input row:
    /// `1.1 * distance * reverb_energy / gain / num_channels`, or `None`
    /// when this VS doesn't feed the diffuse field or has faded silent.
    #[must_use]
    pub fn fdn_feed_scale(&self, total_distance: f32, reverb_energy: f32, num_fdn_channels: usize) -> Option<f32> {
        let gain = self.gain.get();
        if gain < 1e-4 || num_fdn_channels == 0 {
            return None;
        }
        Some(1.1 * total_distance * reverb_energy / gain / num_fdn_channels as f32)
    }

    pub fn set_target_gain(&mut self, gain: f32) {
        self.gain.set_target(gain);
    }

    #[must_use]
    pub fn current_gain(&self) -> f32 {
        self.gain.get()
    }

    #[must_use]
    pub fn is_settled_at_zero(&self) -> bool {
        self.gain.is_settled() && self.gain.get() < 1e-4
    }

    /// Run the full chain for one sample.
    pub fn process(&mut self, input: f32) -> f32 {
        let mut x = input;

        if let Some(slot) = &mut self.diffraction {
            if self.shadow_zone || slot.applies_outside_shadow() {
                x = slot.process(x);
            }
        }
        if let Some(eq) = &mut self.reflection_eq {
            x = eq.process(x);
        }
        x = self.air_absorption.process(x);
        x = self.delay.read_write(x, self.delay_samples);
        x * self.gain.advance()
    }

    pub fn reset(&mut self) {
        if let Some(slot) = &mut self.diffraction {
            slot.reset();
        }
        if let Some(eq) = &mut self.reflection_eq {
            eq.reset();
        }
        self.delay.clear();
        self.gain.snap_to_target();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_vs_with_no_legs_passes_signal_through_delay_and_gain() {
        let mut chain = VsChain::new(48000.0, &[250.0, 1000.0, 4000.0], 1.0);
        let vs = VsDescriptor::direct(sonido_geometry::Vec3::ZERO, 1.0);
        chain.apply_update(&vs, &[250.0, 1000.0, 4000.0]);
        chain.set_target_gain(1.0);
        chain.gain.snap_to_target();

        let mut last = 0.0;
        for _ in 0..400 {
            last = chain.process(1.0);
        }
        assert!(last > 0.9, "settled gain should pass a sustained input near unity, got {last}");
    }

    #[test]
    fn fading_to_zero_settles_silent() {
        let mut chain = VsChain::new(48000.0, &[250.0, 1000.0, 4000.0], 1.0);
        chain.set_target_gain(1.0);
        chain.gain.snap_to_target();
        chain.set_target_gain(0.0);
        for _ in 0..2000 {
            chain.process(1.0);
        }
        assert!(chain.is_settled_at_zero());
    }
}
