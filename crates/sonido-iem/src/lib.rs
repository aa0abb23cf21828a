//! Sonido IEM - the background Image-Edge Model.
//!
//! Enumerates source -> (reflection|diffraction)* -> listener paths each
//! time the room or scene changes, and publishes a per-source virtual-source
//! map the audio thread reads atomically. See [`thread::IemThread`] for the
//! background-thread entry point and [`search`] for the path enumeration
//! itself.

pub mod channel;
pub mod config;
pub mod path;
pub mod search;
pub mod thread;

pub use channel::FdnChannelAllocator;
pub use config::{DirectSoundMode, IemConfig};
pub use path::{PathPart, VsDescriptor, VsMap, VsMapDiff, path_key};
pub use search::RoomSnapshot;
pub use thread::{IemThread, SceneSnapshotProvider, SourceQuery};
