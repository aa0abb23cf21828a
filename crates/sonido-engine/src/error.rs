//! Context-facing error kinds. Configuration errors fail
//! construction; everything else is handled locally and never reaches the
//! audio callback, which always emits silence instead of erroring.

use thiserror::Error;

/// Failures that can be reported to the caller through `init`/scene-API
/// return values. Acoustic degenerate cases and resource contention are
/// deliberately not represented here: they're handled silently in place,
/// per this module's "all failures are local" policy.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("block size must be nonzero")]
    InvalidBlockSize,

    #[error("frequency_bands must be non-empty")]
    EmptyFrequencyBands,

    #[error("frequency_bands must have exactly {expected} bands, got {got}")]
    UnsupportedFrequencyBandCount { expected: usize, got: usize },

    #[error("interpolation factor {0} out of range")]
    InvalidInterpolationFactor(f32),
}
