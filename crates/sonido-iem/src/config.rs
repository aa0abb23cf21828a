//! IEM configuration: search bounds and mode switches that shape which
//! paths get enumerated each tick.

use sonido_effects::diffraction::DiffractionModelKind;

/// How direct sound is tested/emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectSoundMode {
    /// Obstruction-test the direct line; emit a VS only if clear.
    Test,
    /// Always emit the direct VS regardless of obstruction.
    Force,
    /// Never emit a direct-sound VS.
    Disabled,
}

/// Search bounds and behaviour switches for one IEM tick.
///
/// `specular_diffraction_order` is coerced to zero whenever the active
/// diffraction model doesn't support full-zone diffraction (only BTM and
/// UDFA do); the pre-coercion value is preserved so a later switch back
/// restores it.
#[derive(Debug, Clone, Copy)]
pub struct IemConfig {
    pub direct_sound_mode: DirectSoundMode,
    pub reflection_order: u32,
    pub shadow_diffraction_order: u32,
    specular_diffraction_order: u32,
    shadow_specular_diffraction_order: u32,
    pub late_reverb: bool,
    pub min_edge_length: f32,
    /// Active diffraction filter model, mirrored from
    /// `Context::set_diffraction_model` so the search can resolve
    /// [`Self::effective_specular_diffraction_order`] without a second
    /// channel back to the engine.
    pub diffraction_model: DiffractionModelKind,
}

impl Default for IemConfig {
    fn default() -> Self {
        Self {
            direct_sound_mode: DirectSoundMode::Test,
            reflection_order: 2,
            shadow_diffraction_order: 1,
            specular_diffraction_order: 0,
            shadow_specular_diffraction_order: 0,
            late_reverb: true,
            min_edge_length: 0.05,
            diffraction_model: DiffractionModelKind::Attenuate,
        }
    }
}

impl IemConfig {
    /// The specular-diffraction order in effect for `model`: the
    /// configured value if `model` supports full-zone diffraction,
    /// otherwise zero (with the real value shadowed for restoration).
    #[must_use]
    pub fn effective_specular_diffraction_order(&self, model: DiffractionModelKind) -> u32 {
        if model.supports_all_zones() { self.specular_diffraction_order } else { 0 }
    }

    /// Set the desired specular-diffraction order. Stored verbatim; use
    /// [`Self::effective_specular_diffraction_order`] to read the
    /// model-coerced value actually used by the search.
    pub fn set_specular_diffraction_order(&mut self, order: u32) {
        self.specular_diffraction_order = order;
        self.shadow_specular_diffraction_order = order;
    }

    /// The value preserved across a model switch that coerced it to zero.
    #[must_use]
    pub fn shadowed_specular_diffraction_order(&self) -> u32 {
        self.shadow_specular_diffraction_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_supporting_model_coerces_order_to_zero_but_preserves_it() {
        let mut cfg = IemConfig::default();
        cfg.set_specular_diffraction_order(3);
        assert_eq!(cfg.effective_specular_diffraction_order(DiffractionModelKind::Utd), 0);
        assert_eq!(cfg.effective_specular_diffraction_order(DiffractionModelKind::Btm), 3);
        assert_eq!(cfg.shadowed_specular_diffraction_order(), 3);
    }
}
