//! Outward reverb-source directions around the listener, picked from a
//! regular polyhedron matching the configured channel count:
//! `{1,2,4,6,8,12,16,20,24,32}` map to a point, a pole pair, a tetrahedron,
//! an octahedron, a cube, an icosahedron, a dodecahedron, or a
//! concatenation of these when no single platonic solid has that vertex
//! count.

use sonido_geometry::Vec3;

/// Snap an arbitrary requested count down to the nearest supported size,
/// `num_reverb_sources` config field.
#[must_use]
pub fn snap_reverb_source_count(requested: usize) -> usize {
    const SUPPORTED: [usize; 10] = [1, 2, 4, 6, 8, 12, 16, 20, 24, 32];
    SUPPORTED.iter().copied().filter(|&n| n <= requested.max(1)).max().unwrap_or(1)
}

fn normalize_all(points: Vec<Vec3>) -> Vec<Vec3> {
    points.into_iter().map(|p| p.normalized()).collect()
}

fn tetrahedron() -> Vec<Vec3> {
    normalize_all(vec![
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0),
    ])
}

fn octahedron() -> Vec<Vec3> {
    vec![
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, -1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(0.0, 0.0, -1.0),
    ]
}

fn cube() -> Vec<Vec3> {
    let mut points = Vec::with_capacity(8);
    for &x in &[-1.0f32, 1.0] {
        for &y in &[-1.0f32, 1.0] {
            for &z in &[-1.0f32, 1.0] {
                points.push(Vec3::new(x, y, z));
            }
        }
    }
    normalize_all(points)
}

fn icosahedron() -> Vec<Vec3> {
    let phi = (1.0 + 5.0f32.sqrt()) / 2.0;
    let mut points = Vec::with_capacity(12);
    for &s1 in &[-1.0f32, 1.0] {
        for &s2 in &[-1.0f32, 1.0] {
            points.push(Vec3::new(0.0, s1, s2 * phi));
            points.push(Vec3::new(s1, s2 * phi, 0.0));
            points.push(Vec3::new(s1 * phi, 0.0, s2));
        }
    }
    normalize_all(points)
}

fn dodecahedron() -> Vec<Vec3> {
    let phi = (1.0 + 5.0f32.sqrt()) / 2.0;
    let inv_phi = 1.0 / phi;
    let mut points = Vec::with_capacity(20);
    for &x in &[-1.0f32, 1.0] {
        for &y in &[-1.0f32, 1.0] {
            for &z in &[-1.0f32, 1.0] {
                points.push(Vec3::new(x, y, z));
            }
        }
    }
    for &s1 in &[-1.0f32, 1.0] {
        for &s2 in &[-1.0f32, 1.0] {
            points.push(Vec3::new(0.0, s1 * inv_phi, s2 * phi));
            points.push(Vec3::new(s1 * inv_phi, s2 * phi, 0.0));
            points.push(Vec3::new(s1 * phi, 0.0, s2 * inv_phi));
        }
    }
    normalize_all(points)
}

/// Direction set for a supported reverb-source count. Panics if `n` isn't
/// one of the supported sizes — callers should route requests through
/// [`snap_reverb_source_count`] first.
#[must_use]
pub fn directions(n: usize) -> Vec<Vec3> {
    match n {
        1 => vec![Vec3::new(0.0, 1.0, 0.0)],
        2 => vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)],
        4 => tetrahedron(),
        6 => octahedron(),
        8 => cube(),
        12 => icosahedron(),
        16 => [cube(), octahedron(), vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0)]].concat(),
        20 => dodecahedron(),
        24 => [cube(), icosahedron(), tetrahedron()].concat(),
        32 => [dodecahedron(), icosahedron()].concat(),
        other => panic!("unsupported reverb source count {other}; snap it first"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snaps_down_to_nearest_supported_size() {
        assert_eq!(snap_reverb_source_count(0), 1);
        assert_eq!(snap_reverb_source_count(5), 4);
        assert_eq!(snap_reverb_source_count(10), 8);
        assert_eq!(snap_reverb_source_count(1000), 32);
    }

    #[test]
    fn every_supported_size_yields_that_many_unit_directions() {
        for &n in &[1, 2, 4, 6, 8, 12, 16, 20, 24, 32] {
            let dirs = directions(n);
            assert_eq!(dirs.len(), n, "size mismatch for n={n}");
            for d in &dirs {
                assert!((d.length() - 1.0).abs() < 1e-3, "direction not unit length for n={n}: {d:?}");
            }
        }
    }
}
