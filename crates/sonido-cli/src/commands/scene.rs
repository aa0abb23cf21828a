//! A fixed shoebox-room scene used by the `render` and `room` commands:
//! six walls forming a box, one source, one listener at the origin.

use sonido_engine::{Context, Directivity, Quat};
use sonido_geometry::Vec3;

/// Build a closed box of the given dimensions (metres) with uniform
/// per-band absorption, and one source in front of the listener.
///
/// Returns the source id so the caller can drive it with audio.
pub fn build_shoebox(ctx: &mut Context, dimensions: [f32; 3], absorption: [f32; 4]) -> u64 {
    let [w, h, d] = dimensions;
    let (hw, hh, hd) = (w / 2.0, h / 2.0, d / 2.0);

    let corners = [
        Vec3::new(-hw, -hh, -hd),
        Vec3::new(hw, -hh, -hd),
        Vec3::new(hw, hh, -hd),
        Vec3::new(-hw, hh, -hd),
        Vec3::new(-hw, -hh, hd),
        Vec3::new(hw, -hh, hd),
        Vec3::new(hw, hh, hd),
        Vec3::new(-hw, hh, hd),
    ];

    // Two triangles per face, wound so the normal points into the room.
    let faces: [[usize; 3]; 12] = [
        [0, 2, 1],
        [0, 3, 2], // front (-z)
        [4, 5, 6],
        [4, 6, 7], // back (+z)
        [0, 1, 5],
        [0, 5, 4], // bottom (-y)
        [3, 7, 6],
        [3, 6, 2], // top (+y)
        [0, 4, 7],
        [0, 7, 3], // left (-x)
        [1, 2, 6],
        [1, 6, 5], // right (+x)
    ];

    for face in faces {
        let vertices = [corners[face[0]], corners[face[1]], corners[face[2]]];
        ctx.init_wall(vertices, absorption);
    }
    ctx.update_planes_and_edges();

    ctx.update_listener(Vec3::new(0.0, 0.0, -hd * 0.5), Quat::IDENTITY);
    ctx.init_source(Vec3::new(0.0, 0.0, hd * 0.5), Quat::IDENTITY, Directivity::Omni)
}
