//! Sonido Engine - the scene API, per-source audio graph, and background
//! thread lifecycle tying the geometry, effects, IEM, and reverb crates
//! into one running room-acoustics engine.
//!
//! [`Context`] is the single entry point: construct it from an
//! [`EngineConfig`], drive the scene through its `init_*`/`update_*`
//! methods, and pull audio through `submit_audio`/`get_output`.

pub mod config;
pub mod context;
pub mod directivity;
pub mod error;
pub mod quaternion;
pub mod source;
pub mod spatializer;
pub mod vs_chain;

pub use config::EngineConfig;
pub use context::{Context, ReverbFormula};
pub use directivity::Directivity;
pub use error::ConfigError;
pub use quaternion::Quat;
pub use source::{Source, SourceManager};
pub use spatializer::{PanningSpatializer, SpatialPose, SpatialisationMode, Spatializer};
