//! Room data model: walls, planes and edges, plus the store that holds
//! them behind the wall → plane → edge lock hierarchy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::id::{Id, IdAllocator};
use crate::vector::Vec3;

const NUM_BANDS: usize = 4;
/// Points within this distance of a plane are treated as lying on it.
pub const PLANE_EPSILON: f32 = 1e-4;

/// An oriented triangular wall.
#[derive(Debug, Clone)]
pub struct Wall {
    pub vertices: [Vec3; 3],
    pub normal: Vec3,
    /// Plane offset: `d = normal . vertices[0]`.
    pub d: f32,
    pub area: f32,
    /// Per-band reflectance `r_b = sqrt(1 - a_b)`, element-wise in [0, 1].
    pub reflectance: [f32; NUM_BANDS],
    pub plane: Id<Plane>,
    pub edges: Vec<Id<Edge>>,
}

impl Wall {
    /// Build a wall from three vertices and a per-band absorption vector.
    /// Returns `None` for degenerate triangles (zero-area / collinear
    /// vertices), per the "invalid geometry rejected" failure semantics.
    #[must_use]
    pub fn new(vertices: [Vec3; 3], absorption: [f32; NUM_BANDS], plane: Id<Plane>) -> Option<Self> {
        let e1 = vertices[1] - vertices[0];
        let e2 = vertices[2] - vertices[0];
        let cross = e1.cross(e2);
        let double_area = cross.length();
        if double_area < 1e-9 {
            return None;
        }
        let normal = cross / double_area;
        let d = normal.dot(vertices[0]);
        let mut reflectance = [0.0f32; NUM_BANDS];
        for (r, &a) in reflectance.iter_mut().zip(absorption.iter()) {
            *r = libm::sqrtf((1.0 - a.clamp(0.0, 1.0)).max(0.0));
        }
        Some(Self { vertices, normal, d, area: double_area * 0.5, reflectance, plane, edges: Vec::new() })
    }

    /// Signed distance from `point` to this wall's plane.
    #[must_use]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.d
    }

    /// Barycentric-style containment test for a point already known to lie
    /// on the wall's plane.
    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        let [a, b, c] = self.vertices;
        let n = self.normal;
        let edge_test = |p0: Vec3, p1: Vec3| (p1 - p0).cross(point - p0).dot(n) >= -1e-6;
        edge_test(a, b) && edge_test(b, c) && edge_test(c, a)
    }

    /// Whether the segment `p0`-`p1` crosses this wall's triangle. Used to
    /// probe a third wall sitting flush across a wedge and hiding its edge.
    #[must_use]
    pub fn segment_obstructs(&self, p0: Vec3, p1: Vec3) -> bool {
        let d0 = self.signed_distance(p0);
        let d1 = self.signed_distance(p1);
        if d0.signum() == d1.signum() {
            return false;
        }
        let denom = d0 - d1;
        if denom.abs() < 1e-9 {
            return false;
        }
        let hit = p0 + (p1 - p0) * (d0 / denom);
        self.contains_point(hit)
    }
}

/// A group of coplanar walls sharing one outward normal and offset.
#[derive(Debug, Clone)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
    pub walls: Vec<Id<Wall>>,
}

/// Wedge geometry between two walls that share an edge.
#[derive(Debug, Clone)]
pub struct Edge {
    pub wall_a: Id<Wall>,
    pub wall_b: Id<Wall>,
    /// A point on the edge line.
    pub origin: Vec3,
    /// Unit direction along the edge.
    pub direction: Vec3,
    pub length: f32,
    /// Exterior wedge angle in radians, in `(0, 2*pi)`.
    pub exterior_angle: f32,
}

impl Edge {
    /// Point midway along the edge, in world space.
    #[must_use]
    pub fn midpoint(&self) -> Vec3 {
        self.origin + self.direction * (self.length * 0.5)
    }
}

/// Holds walls, planes and edges behind the wall → plane → edge lock
/// hierarchy: wall is always acquired first; plane and edge are never held
/// simultaneously.
pub struct RoomStore {
    walls: RwLock<HashMap<Id<Wall>, Wall>>,
    planes: RwLock<HashMap<Id<Plane>, Plane>>,
    edges: RwLock<HashMap<Id<Edge>, Edge>>,
    wall_ids: RwLock<IdAllocator<Wall>>,
    plane_ids: RwLock<IdAllocator<Plane>>,
    edge_ids: RwLock<IdAllocator<Edge>>,
    has_changed: AtomicBool,
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            walls: RwLock::new(HashMap::new()),
            planes: RwLock::new(HashMap::new()),
            edges: RwLock::new(HashMap::new()),
            wall_ids: RwLock::new(IdAllocator::new()),
            plane_ids: RwLock::new(IdAllocator::new()),
            edge_ids: RwLock::new(IdAllocator::new()),
            has_changed: AtomicBool::new(false),
        }
    }

    /// Add a wall to an existing plane (or a new one if `plane` is `None`),
    /// re-running edge discovery against every wall already on adjoining
    /// planes. Returns `None` if the triangle is degenerate.
    pub fn add_wall(&self, vertices: [Vec3; 3], absorption: [f32; 4], plane: Option<Id<Plane>>) -> Option<Id<Wall>> {
        let mut walls = self.walls.write();
        let mut planes = self.planes.write();

        let plane_id = plane.unwrap_or_else(|| {
            let e1 = vertices[1] - vertices[0];
            let e2 = vertices[2] - vertices[0];
            let normal = e1.cross(e2).normalized();
            let d = normal.dot(vertices[0]);
            let id = self.plane_ids.write().allocate();
            planes.insert(id, Plane { normal, d, walls: Vec::new() });
            id
        });

        let wall = Wall::new(vertices, absorption, plane_id)?;
        let wall_id = self.wall_ids.write().allocate();
        walls.insert(wall_id, wall);
        if let Some(p) = planes.get_mut(&plane_id) {
            p.walls.push(wall_id);
        }
        drop(planes);
        drop(walls);

        self.discover_edges_for(wall_id);
        self.has_changed.store(true, Ordering::Release);
        Some(wall_id)
    }

    pub fn remove_wall(&self, id: Id<Wall>) {
        let mut walls = self.walls.write();
        let Some(wall) = walls.remove(&id) else { return };
        let mut planes = self.planes.write();
        if let Some(p) = planes.get_mut(&wall.plane) {
            p.walls.retain(|&w| w != id);
        }
        drop(planes);
        drop(walls);

        let mut edges = self.edges.write();
        edges.retain(|_, e| e.wall_a != id && e.wall_b != id);
        drop(edges);

        self.wall_ids.write().free(id);
        self.has_changed.store(true, Ordering::Release);
    }

    /// Find every edge shared between the new wall and other walls on a
    /// different, non-coplanar plane, reject coplanar-occluded ones, then
    /// install the survivors atomically (a malformed edge is silently
    /// discarded, never partially installed). Reads walls and planes
    /// together, then drops both before taking the edge/wall write locks,
    /// so plane and edge are never held simultaneously.
    fn discover_edges_for(&self, new_wall_id: Id<Wall>) {
        let walls = self.walls.read();
        let planes = self.planes.read();
        let Some(new_wall) = walls.get(&new_wall_id) else { return };
        let new_wall = new_wall.clone();

        let mut discovered = Vec::new();
        for (&other_id, other_wall) in walls.iter() {
            if other_id == new_wall_id || other_wall.plane == new_wall.plane {
                continue;
            }
            for edge in find_edges(&new_wall, new_wall_id, other_wall, other_id) {
                if !self.edge_is_coplanar_occluded(&edge, &planes, &walls) {
                    discovered.push((other_id, edge));
                }
            }
        }
        drop(planes);
        drop(walls);

        if discovered.is_empty() {
            return;
        }
        let mut edges = self.edges.write();
        let mut walls = self.walls.write();
        for (other_id, edge) in discovered {
            let edge_id = self.edge_ids.write().allocate();
            edges.insert(edge_id, edge);
            if let Some(w) = walls.get_mut(&new_wall_id) {
                w.edges.push(edge_id);
            }
            if let Some(w) = walls.get_mut(&other_id) {
                w.edges.push(edge_id);
            }
        }
    }

    /// Whether `edge`'s own plane coincides with some other wall's plane
    /// (both endpoints lying exactly on it) and a line through the edge's
    /// midpoint, offset to each side along that plane's normal, is blocked
    /// by one of that plane's walls — a third wall sitting flush across
    /// the wedge and hiding it. Checked against every plane except the two
    /// the edge's own walls belong to.
    fn edge_is_coplanar_occluded(&self, edge: &Edge, planes: &HashMap<Id<Plane>, Plane>, walls: &HashMap<Id<Wall>, Wall>) -> bool {
        let top = edge.origin + edge.direction * edge.length;
        let midpoint = edge.midpoint();
        for plane in planes.values() {
            let on_plane = |p: Vec3| (plane.normal.dot(p) - plane.d).abs() < PLANE_EPSILON;
            if !on_plane(edge.origin) || !on_plane(top) {
                continue;
            }
            let probe_a = midpoint + plane.normal;
            let probe_b = midpoint - plane.normal;
            for &wall_id in &plane.walls {
                if wall_id == edge.wall_a || wall_id == edge.wall_b {
                    continue;
                }
                if walls.get(&wall_id).is_some_and(|w| w.segment_obstructs(probe_a, probe_b)) {
                    return true;
                }
            }
        }
        false
    }

    /// Replace a wall's absorption in place, leaving its geometry (and
    /// therefore its edges) untouched. A missing id is ignored, per the
    /// "validation failures ignored silently" policy.
    pub fn update_wall_absorption(&self, id: Id<Wall>, absorption: [f32; 4]) {
        let mut walls = self.walls.write();
        let Some(wall) = walls.get_mut(&id) else { return };
        for (r, &a) in wall.reflectance.iter_mut().zip(absorption.iter()) {
            *r = libm::sqrtf((1.0 - a.clamp(0.0, 1.0)).max(0.0));
        }
        drop(walls);
        self.has_changed.store(true, Ordering::Release);
    }

    /// Replace a wall's vertices, keeping its id and absorption but
    /// re-running edge discovery from scratch (its old edges no longer
    /// apply to the new geometry). A degenerate replacement triangle
    /// leaves the wall unchanged.
    pub fn update_wall(&self, id: Id<Wall>, vertices: [Vec3; 3]) {
        let absorption = {
            let walls = self.walls.read();
            let Some(wall) = walls.get(&id) else { return };
            let mut absorption = [0.0f32; 4];
            for (a, &r) in absorption.iter_mut().zip(wall.reflectance.iter()) {
                *a = 1.0 - r * r;
            }
            absorption
        };

        let mut edges = self.edges.write();
        edges.retain(|_, e| e.wall_a != id && e.wall_b != id);
        drop(edges);

        let mut walls = self.walls.write();
        let Some(wall) = walls.get(&id) else { return };
        let plane_id = wall.plane;
        let Some(rebuilt) = Wall::new(vertices, absorption, plane_id) else { return };
        walls.insert(id, rebuilt);
        drop(walls);

        self.discover_edges_for(id);
        self.has_changed.store(true, Ordering::Release);
    }

    pub fn has_changed(&self) -> bool {
        self.has_changed.swap(false, Ordering::AcqRel)
    }

    pub fn with_walls<R>(&self, f: impl FnOnce(&HashMap<Id<Wall>, Wall>) -> R) -> R {
        f(&self.walls.read())
    }

    pub fn with_planes<R>(&self, f: impl FnOnce(&HashMap<Id<Plane>, Plane>) -> R) -> R {
        f(&self.planes.read())
    }

    pub fn with_edges<R>(&self, f: impl FnOnce(&HashMap<Id<Edge>, Edge>) -> R) -> R {
        f(&self.edges.read())
    }
}

/// Discover every edge shared between two walls on different planes.
/// Near-antiparallel walls (two triangles seen from opposite sides, e.g. a
/// thin partition) can share more than one edge, so every shared-vertex
/// pair is tried; otherwise a wedge has at most one valid edge.
fn find_edges(a: &Wall, a_id: Id<Wall>, b: &Wall, b_id: Id<Wall>) -> Vec<Edge> {
    if a.normal.dot(b.normal) < -1.0 + 1e-4 {
        antiparallel_edges(a, a_id, b, b_id)
    } else {
        single_edge(a, a_id, b, b_id).into_iter().collect()
    }
}

/// Vertices (up to two) shared between two triangles within epsilon.
fn shared_vertices(a: &Wall, b: &Wall) -> Vec<Vec3> {
    let mut shared = Vec::new();
    for &va in &a.vertices {
        for &vb in &b.vertices {
            if va.distance(vb) < 1e-5 && !shared.iter().any(|&s: &Vec3| s.distance(va) < 1e-5) {
                shared.push(va);
            }
        }
    }
    shared
}

/// Non-antiparallel case: the two triangles share exactly one edge (two
/// vertices). The vertex left over on `a` must lie behind `b`'s plane for
/// the wedge to be reflex (a room interior corner, not a convex fold);
/// `cross(n_a, n_b)` against the edge direction then decides whether
/// `wall_a`/`wall_b` need swapping so the exterior-angle sign comes out
/// consistent.
fn single_edge(a: &Wall, a_id: Id<Wall>, b: &Wall, b_id: Id<Wall>) -> Option<Edge> {
    let shared = shared_vertices(a, b);
    if shared.len() != 2 {
        return None;
    }
    let base = shared[0];
    let top = shared[1];
    if base.distance(top) < 1e-6 {
        return None;
    }

    let third = a.vertices.into_iter().find(|&v| v.distance(base) >= 1e-5 && v.distance(top) >= 1e-5)?;
    if b.signed_distance(third) >= 0.0 {
        return None;
    }

    let direction = (top - base).normalized();
    let test = a.normal.cross(b.normal).normalized();
    let (wall_a, wall_b, na, nb) =
        if test.dot(direction) >= 0.0 { (a_id, b_id, a.normal, b.normal) } else { (b_id, a_id, b.normal, a.normal) };

    Some(build_edge(wall_a, wall_b, na, nb, base, top))
}

/// Antiparallel case: two triangles facing opposite ways can share an edge
/// on each side, so every shared-vertex pair is tried rather than stopping
/// at the first match.
fn antiparallel_edges(a: &Wall, a_id: Id<Wall>, b: &Wall, b_id: Id<Wall>) -> Vec<Edge> {
    if (a.d + b.d).abs() >= 0.01 {
        return Vec::new();
    }
    let shared = shared_vertices(a, b);
    if shared.len() != 2 || shared[0].distance(shared[1]) < 1e-6 {
        return Vec::new();
    }
    vec![build_edge(a_id, b_id, a.normal, b.normal, shared[0], shared[1])]
}

/// Shared wedge geometry given resolved (possibly swapped) wall order and
/// face normals: the exterior angle's +/- branch is chosen by the sign of
/// `cross(n_a, n_b)` against the edge tangent, matching the right-hand
/// curl from plane A to plane B through the exterior of the wedge.
fn build_edge(wall_a: Id<Wall>, wall_b: Id<Wall>, na: Vec3, nb: Vec3, base: Vec3, top: Vec3) -> Edge {
    let direction = (top - base).normalized();
    let length = (top - base).length();
    let cos_angle = na.dot(nb).clamp(-1.0, 1.0);
    let exterior_angle = if na.cross(nb).dot(direction) >= 0.0 {
        core::f32::consts::PI + libm::acosf(cos_angle)
    } else {
        core::f32::consts::PI - libm::acosf(cos_angle)
    };
    Edge { wall_a, wall_b, origin: base, direction, length, exterior_angle }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_wall() {
        let v = [Vec3::ZERO, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)];
        assert!(Wall::new(v, [0.1; 4], Id::from_raw(0)).is_none());
    }

    #[test]
    fn reflectance_is_sqrt_one_minus_absorption() {
        let v = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let wall = Wall::new(v, [0.5, 0.5, 0.5, 0.5], Id::from_raw(0)).unwrap();
        for r in wall.reflectance {
            assert!((r - core::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
        }
    }

    #[test]
    fn add_and_remove_wall_updates_store() {
        let store = RoomStore::new();
        let v = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let id = store.add_wall(v, [0.1; 4], None).expect("valid triangle");
        assert!(store.with_walls(|w| w.contains_key(&id)));
        assert!(store.has_changed());

        store.remove_wall(id);
        assert!(!store.with_walls(|w| w.contains_key(&id)));
    }

    #[test]
    fn adjacent_walls_on_different_planes_get_an_edge() {
        let store = RoomStore::new();
        // Floor
        let floor = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 1.0)];
        let floor_id = store.add_wall(floor, [0.1; 4], None).unwrap();
        // Wall sharing the edge (0,0,0)-(1,0,0), rising in +y; wound so its
        // outward normal faces -z, matching the floor's outward -y face
        // for a genuine (reflex) room interior corner.
        let wall = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0)];
        let _wall_id = store.add_wall(wall, [0.1; 4], None).unwrap();

        let edges_on_floor = store.with_walls(|w| w.get(&floor_id).unwrap().edges.len());
        assert_eq!(edges_on_floor, 1);
    }
}
