//! Sonido Effects - per-virtual-source DSP stages for the acoustics engine.
//!
//! Everything a virtual source's audio chain runs before it reaches the
//! spatialiser or the FDN input row:
//!
//! - [`ReflectionEq`] - graphic/parametric EQ colouring specular reflections
//! - [`AirAbsorption`] - single-pole high-frequency rolloff over distance
//! - `diffraction` - the eight diffraction filter models (Attenuate, LPF,
//!   UDFA, UDFA-I, NN, UTD, BTM)
//! - [`CrossfadedFir`] - the BTM model's cross-faded FIR runtime
//!
//! ## Example
//!
//! ```rust,ignore
//! use sonido_core::Effect;
//! use sonido_effects::{AirAbsorption, ReflectionEq};
//!
//! let mut eq = ReflectionEq::new(48000.0, &[125.0, 500.0, 2000.0, 8000.0]);
//! eq.set_target_gains_db(&[0.0, -3.0, 0.0, -6.0]);
//!
//! let mut air = AirAbsorption::new(48000.0);
//! air.set_distance(12.0);
//!
//! let eq_out = eq.process(input);
//! let output = air.process(eq_out);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod air_absorption;
pub mod diffraction;
pub mod fir_ir;
pub mod reflection_eq;

pub use air_absorption::AirAbsorption;
pub use fir_ir::CrossfadedFir;
pub use reflection_eq::ReflectionEq;
