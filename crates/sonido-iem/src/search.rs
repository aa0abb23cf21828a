//! Path enumeration: direct sound, specular reflections up to a
//! configured order, first-order diffraction, and the late-reverb
//! per-direction absorption feed.

use std::collections::HashMap;

use sonido_geometry::{DiffractionPath, Edge, Id, Plane, RoomStore, Vec3, Wall};

use crate::config::{DirectSoundMode, IemConfig};
use crate::path::{PathPart, VsDescriptor};

const NUM_BANDS: usize = 4;

/// A point-in-time copy of the room topology, taken once per tick under
/// the wall -> plane -> edge lock hierarchy and then released before the
/// (potentially expensive) search runs.
pub struct RoomSnapshot {
    pub walls: HashMap<Id<Wall>, Wall>,
    pub planes: HashMap<Id<Plane>, Plane>,
    pub edges: HashMap<Id<Edge>, Edge>,
}

impl RoomSnapshot {
    #[must_use]
    pub fn capture(room: &RoomStore) -> Self {
        let walls = room.with_walls(Clone::clone);
        let planes = room.with_planes(Clone::clone);
        let edges = room.with_edges(Clone::clone);
        Self { walls, planes, edges }
    }
}

/// Intersection of segment `a -> b` with the infinite plane `(normal, d)`,
/// or `None` if parallel or the hit falls outside the segment. Points
/// within `PLANE_EPSILON` of the plane are never reported as obstructing
/// by virtue of `contains_point`'s own
/// epsilon on the wall edge test; here we only gate `t` to `[0, 1]`.
fn line_plane_intersection(a: Vec3, b: Vec3, normal: Vec3, d: f32) -> Option<(Vec3, f32)> {
    let denom = normal.dot(b - a);
    if denom.abs() < 1e-9 {
        return None;
    }
    let t = (d - normal.dot(a)) / denom;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    Some((a + (b - a) * t, t))
}

/// "Line-room obstruction": does segment `a -> b` cross any wall on a
/// plane not in `exclude`? Returns at the first hit.
#[must_use]
pub fn segment_obstructed(snapshot: &RoomSnapshot, a: Vec3, b: Vec3, exclude: &[Id<Plane>]) -> bool {
    for (plane_id, plane) in &snapshot.planes {
        if exclude.contains(plane_id) {
            continue;
        }
        let Some((hit, _)) = line_plane_intersection(a, b, plane.normal, plane.d) else { continue };
        for wall_id in &plane.walls {
            if let Some(wall) = snapshot.walls.get(wall_id) {
                if wall.contains_point(hit) {
                    return true;
                }
            }
        }
    }
    false
}

/// Test the straight line source -> listener. Emits a VS with empty path
/// parts iff unobstructed (or the mode forces emission).
#[must_use]
pub fn direct_sound(snapshot: &RoomSnapshot, config: &IemConfig, source: Vec3, listener: Vec3) -> Option<VsDescriptor> {
    let visible = match config.direct_sound_mode {
        DirectSoundMode::Disabled => return None,
        DirectSoundMode::Force => true,
        DirectSoundMode::Test => !segment_obstructed(snapshot, source, listener, &[]),
    };
    if !visible {
        return None;
    }
    Some(VsDescriptor::direct(source, source.distance(listener)))
}

/// An in-progress reflection chain: the image position of the source
/// after reflecting across every plane in `parts`, and whether the chain
/// has been confirmed unobstructed all the way to the listener.
#[derive(Debug, Clone)]
struct ReflectionSeed {
    parts: Vec<PathPart>,
    last_plane: Id<Plane>,
    image_position: Vec3,
    accumulated_reflectance: [f32; NUM_BANDS],
    visible: bool,
}

fn listener_in_positive_half_space(plane: &Plane, listener: Vec3) -> bool {
    plane.normal.dot(listener) - plane.d > 0.0
}

/// Reflectance of the wall a reflection seed's final hop passed through,
/// looked up by scanning the plane's member walls for the one containing
/// the projected intersection point.
fn wall_reflectance_at(snapshot: &RoomSnapshot, plane: &Plane, point: Vec3) -> Option<[f32; NUM_BANDS]> {
    for wall_id in &plane.walls {
        if let Some(wall) = snapshot.walls.get(wall_id) {
            if wall.contains_point(point) {
                return Some(wall.reflectance);
            }
        }
    }
    None
}

fn multiply_bands(a: [f32; NUM_BANDS], b: [f32; NUM_BANDS]) -> [f32; NUM_BANDS] {
    core::array::from_fn(|i| a[i] * b[i])
}

/// Enumerate first-order reflections: one candidate per plane facing the
/// listener, confirmed visible if the projected reflection point lies on
/// a member wall and both half-segments are unobstructed by every other
/// plane.
fn first_order(snapshot: &RoomSnapshot, source: Vec3, listener: Vec3) -> Vec<ReflectionSeed> {
    let mut seeds = Vec::new();
    for (&plane_id, plane) in &snapshot.planes {
        if !listener_in_positive_half_space(plane, listener) {
            continue;
        }
        let image = source.reflect_across_plane(plane.normal, plane.d);
        if plane.normal.dot(image) - plane.d <= 0.0 {
            continue;
        }

        let Some((hit, _)) = line_plane_intersection(listener, image, plane.normal, plane.d) else { continue };
        let Some(reflectance) = wall_reflectance_at(snapshot, plane, hit) else { continue };

        let exclude = [plane_id];
        let visible = !segment_obstructed(snapshot, listener, hit, &exclude) && !segment_obstructed(snapshot, hit, source, &exclude);

        seeds.push(ReflectionSeed {
            parts: vec![PathPart::Reflection(wall_id_containing(snapshot, plane, hit).unwrap())],
            last_plane: plane_id,
            image_position: image,
            accumulated_reflectance: reflectance,
            visible,
        });
    }
    seeds
}

fn wall_id_containing(snapshot: &RoomSnapshot, plane: &Plane, point: Vec3) -> Option<Id<Wall>> {
    plane.walls.iter().copied().find(|w| snapshot.walls.get(w).is_some_and(|wall| wall.contains_point(point)))
}

/// Extend every order-`k` seed across every plane that wasn't its last
/// hop, re-testing visibility via the full reversed intersection chain.
fn extend(snapshot: &RoomSnapshot, source: Vec3, listener: Vec3, seeds: &[ReflectionSeed]) -> Vec<ReflectionSeed> {
    let mut extended = Vec::new();
    for seed in seeds {
        for (&plane_id, plane) in &snapshot.planes {
            if plane_id == seed.last_plane {
                continue;
            }
            let image = seed.image_position.reflect_across_plane(plane.normal, plane.d);
            if plane.normal.dot(image) - plane.d <= 0.0 {
                continue;
            }
            if plane.normal.dot(listener) - plane.d <= 0.0 {
                continue;
            }

            let Some((hit, _)) = line_plane_intersection(listener, image, plane.normal, plane.d) else { continue };
            let Some(reflectance) = wall_reflectance_at(snapshot, plane, hit) else { continue };
            let Some(wall_id) = wall_id_containing(snapshot, plane, hit) else { continue };

            let mut parts = seed.parts.clone();
            parts.push(PathPart::Reflection(wall_id));

            // Re-derive intersection points by projecting back from the
            // listener through all planes in the chain, in reverse order,
            // then test each segment against the rest of the room.
            let points = reconstruct_chain(snapshot, source, listener, &parts);
            let visible = match points {
                Some(points) => !chain_obstructed(snapshot, source, listener, &points, &parts),
                None => false,
            };

            extended.push(ReflectionSeed {
                parts,
                last_plane: plane_id,
                image_position: image,
                accumulated_reflectance: multiply_bands(seed.accumulated_reflectance, reflectance),
                visible,
            });
        }
    }
    extended
}

/// Reconstruct the `k` intersection points of a reflection chain by
/// successively reflecting the source across each plane in order, then
/// intersecting from the listener back through the images in reverse.
fn reconstruct_chain(snapshot: &RoomSnapshot, source: Vec3, listener: Vec3, parts: &[PathPart]) -> Option<Vec<Vec3>> {
    let plane_ids: Vec<Id<Plane>> = parts
        .iter()
        .map(|p| match p {
            PathPart::Reflection(wall_id) => snapshot.walls.get(wall_id).map(|w| w.plane),
            PathPart::Diffraction(_) => None,
        })
        .collect::<Option<Vec<_>>>()?;

    // Forward images: image[i] = source reflected across planes[0..=i].
    let mut images = Vec::with_capacity(plane_ids.len());
    let mut current = source;
    for &plane_id in &plane_ids {
        let plane = snapshot.planes.get(&plane_id)?;
        current = current.reflect_across_plane(plane.normal, plane.d);
        images.push(current);
    }

    // Walk back from the listener through the images in reverse to find
    // each real intersection point.
    let mut points = vec![Vec3::ZERO; plane_ids.len()];
    let mut ray_origin = listener;
    for i in (0..plane_ids.len()).rev() {
        let plane = snapshot.planes.get(&plane_ids[i])?;
        let (hit, _) = line_plane_intersection(ray_origin, images[i], plane.normal, plane.d)?;
        points[i] = hit;
        ray_origin = hit;
    }
    Some(points)
}

/// `points[0]` is the hit nearest the source, `points.last()` nearest the
/// listener (the order [`reconstruct_chain`] produces them in); build the
/// full listener..source segment chain and test each hop.
fn chain_obstructed(snapshot: &RoomSnapshot, source: Vec3, listener: Vec3, points: &[Vec3], parts: &[PathPart]) -> bool {
    let plane_ids: Vec<Id<Plane>> = parts
        .iter()
        .filter_map(|p| match p {
            PathPart::Reflection(wall_id) => snapshot.walls.get(wall_id).map(|w| w.plane),
            PathPart::Diffraction(_) => None,
        })
        .collect();

    let mut chain = Vec::with_capacity(points.len() + 2);
    chain.push(listener);
    chain.extend(points.iter().rev().copied());
    chain.push(source);

    for window in chain.windows(2) {
        if segment_obstructed(snapshot, window[0], window[1], &plane_ids) {
            return true;
        }
    }
    false
}

/// Full reflection search up to `max_order`, returning only visible VS.
#[must_use]
pub fn reflections(snapshot: &RoomSnapshot, source: Vec3, listener: Vec3, max_order: u32) -> Vec<VsDescriptor> {
    if max_order == 0 {
        return Vec::new();
    }
    let mut frontier = first_order(snapshot, source, listener);
    let mut visible: Vec<ReflectionSeed> = frontier.iter().filter(|s| s.visible).cloned().collect();

    for _ in 1..max_order {
        if frontier.is_empty() {
            break;
        }
        frontier = extend(snapshot, source, listener, &frontier);
        visible.extend(frontier.iter().filter(|s| s.visible).cloned());
    }

    visible
        .into_iter()
        .map(|seed| VsDescriptor {
            parts: seed.parts,
            key: String::new(),
            image_position: seed.image_position,
            accumulated_reflectance: seed.accumulated_reflectance,
            diffraction_path: None,
            total_distance: listener.distance(seed.image_position),
            feeds_fdn: false,
            fdn_channel: None,
        })
        .collect()
}

fn edge_exclude_planes(snapshot: &RoomSnapshot, edge: &Edge) -> Vec<Id<Plane>> {
    [snapshot.walls.get(&edge.wall_a).map(|w| w.plane), snapshot.walls.get(&edge.wall_b).map(|w| w.plane)]
        .into_iter()
        .flatten()
        .collect()
}

/// An in-progress diffraction-only chain: apex of the last edge hit, the
/// parts accumulated to reach it, and the real (folded) path length
/// travelled from the source so far.
#[derive(Debug, Clone)]
struct DiffractionSeed {
    parts: Vec<PathPart>,
    last_edge: Id<Edge>,
    apex: Vec3,
    distance_from_source: f32,
}

/// Diffraction search up to `max_order`: order 1 is edge(s) visible
/// directly from both source and listener; each further order extends a
/// frontier seed's apex across a different edge, mirroring
/// [`reflections`]'s plane-frontier recursion but chaining edges instead.
#[must_use]
pub fn diffraction(snapshot: &RoomSnapshot, source: Vec3, listener: Vec3, min_edge_length: f32, max_order: u32) -> Vec<VsDescriptor> {
    if max_order == 0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut frontier = Vec::new();

    for (&edge_id, edge) in &snapshot.edges {
        if edge.length < min_edge_length {
            continue;
        }
        let Some(face_reference) = snapshot.walls.get(&edge.wall_a).map(|w| w.normal) else { continue };
        let Some(path) = DiffractionPath::compute(source, listener, edge, face_reference) else { continue };

        let exclude = edge_exclude_planes(snapshot, edge);
        let visible =
            !segment_obstructed(snapshot, source, path.apex, &exclude) && !segment_obstructed(snapshot, path.apex, listener, &exclude);

        frontier.push(DiffractionSeed {
            parts: vec![PathPart::Diffraction(edge_id)],
            last_edge: edge_id,
            apex: path.apex,
            distance_from_source: path.d_s,
        });

        if visible {
            out.push(VsDescriptor {
                parts: vec![PathPart::Diffraction(edge_id)],
                key: String::new(),
                image_position: path.apex,
                accumulated_reflectance: [1.0; NUM_BANDS],
                diffraction_path: Some(path),
                total_distance: path.total_distance(),
                feeds_fdn: false,
                fdn_channel: None,
            });
        }
    }

    for _ in 1..max_order {
        if frontier.is_empty() {
            break;
        }
        let mut next_frontier = Vec::new();
        for seed in &frontier {
            for (&edge_id, edge) in &snapshot.edges {
                if edge_id == seed.last_edge || edge.length < min_edge_length {
                    continue;
                }
                let Some(face_reference) = snapshot.walls.get(&edge.wall_a).map(|w| w.normal) else { continue };
                let Some(path) = DiffractionPath::compute(seed.apex, listener, edge, face_reference) else { continue };

                let exclude = edge_exclude_planes(snapshot, edge);
                let visible = !segment_obstructed(snapshot, seed.apex, path.apex, &exclude)
                    && !segment_obstructed(snapshot, path.apex, listener, &exclude);

                let mut parts = seed.parts.clone();
                parts.push(PathPart::Diffraction(edge_id));
                let distance_from_source = seed.distance_from_source + path.d_s;

                if visible {
                    out.push(VsDescriptor {
                        parts: parts.clone(),
                        key: String::new(),
                        image_position: path.apex,
                        accumulated_reflectance: [1.0; NUM_BANDS],
                        diffraction_path: Some(path),
                        total_distance: distance_from_source + path.d_l,
                        feeds_fdn: false,
                        fdn_channel: None,
                    });
                }

                next_frontier.push(DiffractionSeed { parts, last_edge: edge_id, apex: path.apex, distance_from_source });
            }
        }
        frontier = next_frontier;
    }

    out
}

/// Combined specular-diffraction chains up to `order` reflections followed
/// by one diffraction hop: reuses the reflection search's image-source
/// seeds (`first_order`/`extend`) against the edge's apex as destination
/// instead of the listener, exploiting that the straight-line distance
/// from an image to any destination equals the real folded path length to
/// it regardless of which destination originally built the image chain.
/// Only reached when the active diffraction model supports full-zone
/// diffraction, via [`IemConfig::effective_specular_diffraction_order`].
#[must_use]
pub fn combined_specular_diffraction(snapshot: &RoomSnapshot, source: Vec3, listener: Vec3, order: u32, min_edge_length: f32) -> Vec<VsDescriptor> {
    if order == 0 {
        return Vec::new();
    }

    let mut seeds = first_order(snapshot, source, listener);
    let mut all_seeds: Vec<ReflectionSeed> = seeds.clone();
    for _ in 1..order {
        if seeds.is_empty() {
            break;
        }
        seeds = extend(snapshot, source, listener, &seeds);
        all_seeds.extend(seeds.iter().cloned());
    }

    let mut out = Vec::new();
    for seed in &all_seeds {
        let Some(reflection_points) = reconstruct_chain(snapshot, source, seed.image_position, &seed.parts) else { continue };
        if chain_obstructed(snapshot, source, seed.image_position, &reflection_points, &seed.parts) {
            continue;
        }

        for (&edge_id, edge) in &snapshot.edges {
            if edge.length < min_edge_length {
                continue;
            }
            let Some(face_reference) = snapshot.walls.get(&edge.wall_a).map(|w| w.normal) else { continue };
            let Some(path) = DiffractionPath::compute(seed.image_position, listener, edge, face_reference) else { continue };

            let exclude = edge_exclude_planes(snapshot, edge);
            let visible = !segment_obstructed(snapshot, seed.image_position, path.apex, &exclude)
                && !segment_obstructed(snapshot, path.apex, listener, &exclude);
            if !visible {
                continue;
            }

            let mut parts = seed.parts.clone();
            parts.push(PathPart::Diffraction(edge_id));

            out.push(VsDescriptor {
                parts,
                key: String::new(),
                image_position: path.apex,
                accumulated_reflectance: seed.accumulated_reflectance,
                diffraction_path: Some(path),
                total_distance: seed.image_position.distance(path.apex) + path.d_l,
                feeds_fdn: false,
                fdn_channel: None,
            });
        }
    }
    out
}

/// Per-reverb-direction average absorption, used by the FDN's reverb
/// source reflection filters: ray-cast outward from the listener along
/// each direction, take the nearest facing wall's absorption.
#[must_use]
pub fn reverb_direction_absorption(snapshot: &RoomSnapshot, listener: Vec3, directions: &[Vec3], far_distance: f32) -> Vec<[f32; NUM_BANDS]> {
    directions
        .iter()
        .map(|&dir| {
            let far_point = listener + dir.normalized() * far_distance;
            let mut nearest: Option<(f32, [f32; NUM_BANDS])> = None;
            for plane in snapshot.planes.values() {
                let Some((hit, t)) = line_plane_intersection(listener, far_point, plane.normal, plane.d) else { continue };
                for wall_id in &plane.walls {
                    let Some(wall) = snapshot.walls.get(wall_id) else { continue };
                    if wall.contains_point(hit) && nearest.is_none_or(|(best_t, _)| t < best_t) {
                        let absorption = core::array::from_fn(|i| 1.0 - wall.reflectance[i] * wall.reflectance[i]);
                        nearest = Some((t, absorption));
                    }
                }
            }
            nearest.map(|(_, a)| a).unwrap_or([0.0; NUM_BANDS])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonido_geometry::Wall;

    /// A single floor wall at `y=0` spanning `[-5,5]x[-5,5]`, normal
    /// pointing up, facing a source and listener both above it.
    fn floor_snapshot() -> RoomSnapshot {
        let plane_id = Id::from_raw(0);
        let wall_id = Id::from_raw(0);
        let wall = Wall::new(
            [Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 0.0, -5.0), Vec3::new(5.0, 0.0, 5.0)],
            [0.1, 0.1, 0.1, 0.1],
            plane_id,
        )
        .unwrap();
        let mut walls = HashMap::new();
        walls.insert(wall_id, wall);
        let mut planes = HashMap::new();
        planes.insert(plane_id, Plane { normal: Vec3::new(0.0, 1.0, 0.0), d: 0.0, walls: vec![wall_id] });
        RoomSnapshot { walls, planes, edges: HashMap::new() }
    }

    #[test]
    fn direct_sound_unobstructed_by_empty_room() {
        let snapshot = RoomSnapshot { walls: HashMap::new(), planes: HashMap::new(), edges: HashMap::new() };
        let config = IemConfig::default();
        let vs = direct_sound(&snapshot, &config, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 3.0));
        assert!(vs.is_some());
    }

    #[test]
    fn first_order_reflection_found_off_a_floor() {
        let snapshot = floor_snapshot();
        let source = Vec3::new(-1.0, 1.0, 0.0);
        let listener = Vec3::new(1.0, 1.0, 0.0);
        let vs = reflections(&snapshot, source, listener, 1);
        assert_eq!(vs.len(), 1, "expected exactly one first-order floor reflection");
        assert_eq!(vs[0].parts.len(), 1);
    }

    #[test]
    fn reflection_order_zero_yields_nothing() {
        let snapshot = floor_snapshot();
        let vs = reflections(&snapshot, Vec3::new(-1.0, 1.0, 0.0), Vec3::new(1.0, 1.0, 0.0), 0);
        assert!(vs.is_empty());
    }

    #[test]
    fn diffraction_skips_edges_shorter_than_minimum() {
        let snapshot = RoomSnapshot { walls: HashMap::new(), planes: HashMap::new(), edges: HashMap::new() };
        let vs = diffraction(&snapshot, Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), 0.05, 1);
        assert!(vs.is_empty());
    }

    #[test]
    fn reverb_absorption_defaults_to_zero_with_no_walls() {
        let snapshot = RoomSnapshot { walls: HashMap::new(), planes: HashMap::new(), edges: HashMap::new() };
        let dirs = [Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let absorption = reverb_direction_absorption(&snapshot, Vec3::ZERO, &dirs, 50.0);
        assert_eq!(absorption, vec![[0.0; NUM_BANDS]; 2]);
    }
}
