//! The eight diffraction filter models. Path geometry (apex, wedge angle,
//! source/listener angles and distances) is identical across all of them;
//! they differ only in the DSP they emit from it.

mod attenuate;
mod lpf;
mod nn;
mod udfa;
mod utd;

pub mod btm;

pub use attenuate::AttenuateFilter;
pub use btm::BtmFilter;
pub use lpf::LpfFilter;
pub use nn::{NnBestFilter, NnSmallFilter};
pub use udfa::{UdfaFilter, UdfaIFilter};
pub use utd::UtdFilter;

use sonido_core::Effect;
use sonido_geometry::DiffractionPath;

/// A diffraction filter: configured from path geometry once per IEM tick,
/// then runs as an ordinary per-sample `Effect` in the audio thread.
pub trait DiffractionFilter: Effect {
    /// Recompute internal filter targets from new path geometry. Called on
    /// the audio thread at block boundaries, never allocates.
    fn update_geometry(&mut self, path: &DiffractionPath, sample_rate: f32);

    /// Whether this model's DSP should run outside the shadow zone; models
    /// other than BTM/UDFA only apply inside it.
    fn applies_outside_shadow(&self) -> bool {
        false
    }
}

/// Which of the eight diffraction filter models a virtual source uses.
/// Selected at the context level and applied to every diffracting VS; an
/// atomic switch takes effect at the next block boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffractionModelKind {
    Attenuate,
    Lpf,
    Udfa,
    UdfaI,
    NnBest,
    NnSmall,
    Utd,
    Btm,
}

impl DiffractionModelKind {
    /// Whether this model supports non-shadow-zone diffraction and
    /// combined specular-diffraction chains.
    #[must_use]
    pub fn supports_all_zones(self) -> bool {
        matches!(self, Self::Udfa | Self::Btm)
    }
}
