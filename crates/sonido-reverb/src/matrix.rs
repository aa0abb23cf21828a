//! The FDN's orthogonal mixing matrix: either a Householder reflection
//! or a randomly sampled orthogonal matrix, fixed at construction. The
//! random variant's seed is taken explicitly rather than reseeded
//! per-init, so a caller that wants reproducible tails can pin it.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Which orthogonal matrix feeds the FDN's recirculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixMatrixKind {
    Householder,
    RandomOrthogonal,
}

/// A fixed `N x N` orthogonal matrix applied to one sample's worth of
/// per-channel decay-filter outputs before they're written back into the
/// delay lines.
#[derive(Debug, Clone)]
pub struct MixMatrix {
    rows: Vec<Vec<f32>>,
}

impl MixMatrix {
    /// `I - 2 v v^T` for a unit vector `v` — a reflection, hence
    /// orthogonal, and the cheapest matrix-vector product available (one
    /// dot product plus a scaled subtract per output).
    #[must_use]
    pub fn householder(n: usize) -> Self {
        let v: Vec<f32> = (0..n).map(|_| 1.0).collect();
        let norm = (n as f32).sqrt();
        let v: Vec<f32> = v.iter().map(|x| x / norm).collect();

        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 } - 2.0 * v[i] * v[j]).collect())
            .collect();
        Self { rows }
    }

    /// A random orthogonal matrix via Gram-Schmidt on a seeded random
    /// basis. Deterministic for a given `seed`, per the exposed-seed
    /// design decision recorded in DESIGN.md.
    #[must_use]
    pub fn random_orthogonal(n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut basis: Vec<Vec<f32>> = Vec::with_capacity(n);

        for _ in 0..n {
            let mut v: Vec<f32> = (0..n).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            for existing in &basis {
                let proj = dot(&v, existing);
                for (x, &e) in v.iter_mut().zip(existing.iter()) {
                    *x -= proj * e;
                }
            }
            normalize(&mut v);
            basis.push(v);
        }
        Self { rows: basis }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.rows.len()
    }

    /// `y = M x`, written into `out` (must be the same length as `x`).
    pub fn apply(&self, x: &[f32], out: &mut [f32]) {
        for (row, slot) in self.rows.iter().zip(out.iter_mut()) {
            *slot = dot(row, x);
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn normalize(v: &mut [f32]) {
    let len = libm::sqrtf(v.iter().map(|x| x * x).sum());
    if len > 1e-9 {
        for x in v.iter_mut() {
            *x /= len;
        }
    }
}
