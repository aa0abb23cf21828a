//! Sonido Core - DSP primitives for the real-time acoustics engine.
//!
//! This crate provides the foundational building blocks shared by the
//! geometry, diffraction, EQ and FDN layers: biquad filters, one-pole
//! filters, delay lines, parameter smoothing and small math helpers.
//! Designed for real-time audio processing with zero allocation in the
//! audio path once constructed.
//!
//! # Core Abstractions
//!
//! ## Effect System
//!
//! - [`Effect`] - Object-safe trait for single-sample/block DSP stages,
//!   implemented by every diffraction model, the air absorption filter,
//!   the reflection EQ and each FDN channel
//!
//! ## Parameter Smoothing
//!
//! Zipper-free parameter changes for click-free interpolation when VS
//! filter targets change between IEM ticks:
//!
//! - [`SmoothedParam`] - Exponential smoothing (RC-like response)
//! - [`LinearSmoothedParam`] - Linear ramps (constant rate per sample)
//!
//! ## Filters
//!
//! - [`Biquad`] - Second-order IIR filter with RBJ cookbook coefficients
//!   (peaking, shelving) used by the reflection EQ and UDFA/NN/UTD models.
//! - [`OnePole`] - Single-pole lowpass, the basis of air absorption.
//!
//! ## Delay Lines
//!
//! - [`InterpolatedDelay`] - Variable-length delay with interpolation
//! - [`FixedDelayLine`] - Fixed-length delay (compile-time size), used by FDN channels.
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible for embedded targets. Disable the
//! default `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sonido-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Design Principles
//!
//! - **Real-time safe**: No allocations in audio processing paths
//! - **No dependencies on std**: Pure `no_std` with `libm` for math
//! - **Object-safe traits**: Dynamic dispatch when needed

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod biquad;
pub mod delay;
pub mod effect;
pub mod math;
pub mod one_pole;
pub mod param;

// Re-export main types at crate root
pub use biquad::{
    Biquad, bandpass_coefficients, highpass_coefficients, high_shelf_coefficients,
    low_shelf_coefficients, lowpass_coefficients, notch_coefficients, peaking_eq_coefficients,
};
pub use delay::{FixedDelayLine, InterpolatedDelay, Interpolation};
pub use effect::Effect;
pub use math::{clamp, db_to_linear, flush_denormal, hz_to_omega, lerp, linear_to_db, ms_to_samples, samples_to_ms};
pub use one_pole::OnePole;
pub use param::{LinearSmoothedParam, SmoothedParam};
