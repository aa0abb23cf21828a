//! Sonido Reverb - the FDN late-reverberation engine.
//!
//! Owns the feedback delay network fed by the source-side audio chain's
//! FDN channels: per-channel delay lines sized from room dimensions, a
//! per-band decay filter matched to the target `T60`, an orthogonal mixing
//! matrix, and N spatialised reverb-source taps around the listener. See
//! [`fdn::Fdn`] for the entry point.

pub mod decay_filter;
pub mod delay_line;
pub mod delay_lengths;
pub mod fdn;
pub mod matrix;
pub mod reverb_source;

pub use decay_filter::BandDecayFilter;
pub use delay_line::DelayLine;
pub use delay_lengths::compute_delay_lengths;
pub use fdn::Fdn;
pub use matrix::{MixMatrix, MixMatrixKind};
pub use reverb_source::{directions, snap_reverb_source_count};
