//! Room geometry for the acoustics engine: vectors, the wall/plane/edge
//! data model, typed ids with cooldown recycling, T60 estimation, and
//! diffraction path geometry shared by every diffraction filter model.

pub mod diffraction_path;
pub mod id;
pub mod room;
pub mod t60;
pub mod vector;

pub use diffraction_path::DiffractionPath;
pub use id::{Id, IdAllocator};
pub use room::{Edge, Plane, RoomStore, Wall, PLANE_EPSILON};
pub use t60::{eyring_t60, mean_free_path, per_loop_decay_gain, sabine_t60, speed_of_sound};
pub use vector::Vec3;
