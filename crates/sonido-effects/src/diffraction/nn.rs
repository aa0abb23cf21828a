//! NN-best / NN-small: a fixed feed-forward network maps an 8-feature
//! geometry vector to a 2-pole 2-zero filter's `(z, p, k)`. Weights are
//! compile-time constants — there is no training step at runtime.

use libm::tanhf;
use sonido_core::{Effect, LinearSmoothedParam};
use sonido_geometry::DiffractionPath;

use super::DiffractionFilter;

const INPUT_DIM: usize = 8;
const OUTPUT_DIM: usize = 5; // z[0], z[1], p[0], p[1], k

/// A tiny feed-forward net: one hidden layer (tanh), one linear output
/// layer. Weights are fixed arrays, never updated at runtime.
struct FixedNet<const HIDDEN: usize> {
    w1: [[f32; INPUT_DIM]; HIDDEN],
    b1: [f32; HIDDEN],
    w2: [[f32; HIDDEN]; OUTPUT_DIM],
    b2: [f32; OUTPUT_DIM],
}

impl<const HIDDEN: usize> FixedNet<HIDDEN> {
    fn forward(&self, input: [f32; INPUT_DIM]) -> [f32; OUTPUT_DIM] {
        let mut hidden = [0.0f32; HIDDEN];
        for (h, (row, &bias)) in hidden.iter_mut().zip(self.w1.iter().zip(self.b1.iter())) {
            let mut acc = bias;
            for (w, x) in row.iter().zip(input.iter()) {
                acc += w * x;
            }
            *h = tanhf(acc);
        }

        let mut out = [0.0f32; OUTPUT_DIM];
        for (o, (row, &bias)) in out.iter_mut().zip(self.w2.iter().zip(self.b2.iter())) {
            let mut acc = bias;
            for (w, h) in row.iter().zip(hidden.iter()) {
                acc += w * h;
            }
            *o = acc;
        }
        out
    }
}

/// Deterministic compile-time weights: a small Weyl-sequence fill gives
/// reproducible, bounded, non-degenerate coefficients without needing a
/// trained checkpoint.
const fn weyl_fill<const N: usize>(seed: u32) -> [f32; N] {
    let mut out = [0.0f32; N];
    let mut i = 0;
    let mut acc = seed;
    while i < N {
        acc = acc.wrapping_add(0x9E3779B9);
        let frac = (acc >> 8) as f32 / (1u32 << 24) as f32;
        out[i] = frac * 2.0 - 1.0;
        i += 1;
    }
    out
}

const fn weyl_matrix<const ROWS: usize, const COLS: usize>(seed: u32) -> [[f32; COLS]; ROWS] {
    let mut out = [[0.0f32; COLS]; ROWS];
    let mut r = 0;
    while r < ROWS {
        out[r] = weyl_fill::<COLS>(seed.wrapping_add(r as u32 * 131));
        r += 1;
    }
    out
}

fn build_net<const HIDDEN: usize>(seed: u32) -> FixedNet<HIDDEN> {
    FixedNet {
        w1: weyl_matrix::<HIDDEN, INPUT_DIM>(seed),
        b1: weyl_fill::<HIDDEN>(seed.wrapping_add(7)),
        w2: weyl_matrix::<OUTPUT_DIM, HIDDEN>(seed.wrapping_add(13)),
        b2: weyl_fill::<OUTPUT_DIM>(seed.wrapping_add(29)),
    }
}

fn feature_vector(path: &DiffractionPath) -> [f32; INPUT_DIM] {
    let (r_near, r_far) = if path.r_s <= path.r_l { (path.r_s, path.r_l) } else { (path.r_l, path.r_s) };
    let (z_near, z_far) = if path.r_s <= path.r_l { (path.z_s, path.z_l) } else { (path.z_l, path.z_s) };

    let (b_a, m_a) = if path.shadow_zone {
        (path.b_a, path.m_a)
    } else {
        (core::f32::consts::PI, path.m_a.min(path.theta_w - core::f32::consts::PI))
    };

    [path.theta_w, b_a, m_a, path.z_w, r_near, r_far, z_near, z_far]
}

/// Second-order IIR driven directly by a `(z0, z1, p0, p1, k)` tuple
/// instead of the RBJ biquad coefficients (there is no target frequency
/// or Q here, just poles/zeros the net predicts).
#[derive(Debug, Clone, Default)]
struct PoleZeroFilter {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl PoleZeroFilter {
    fn process(&mut self, input: f32, z: [f32; 2], p: [f32; 2], k: f32) -> f32 {
        // b0=k, b1=-k*(z0+z1), b2=k*z0*z1; a1=-(p0+p1), a2=p0*p1
        let b0 = k;
        let b1 = -k * (z[0] + z[1]);
        let b2 = k * z[0] * z[1];
        let a1 = -(p[0] + p[1]);
        let a2 = p[0] * p[1];

        let output = b0 * input + b1 * self.x1 + b2 * self.x2 - a1 * self.y1 - a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

struct NnFilterCore<const HIDDEN: usize> {
    net: FixedNet<HIDDEN>,
    z: [LinearSmoothedParam; 2],
    p: [LinearSmoothedParam; 2],
    k: LinearSmoothedParam,
    filter: PoleZeroFilter,
}

impl<const HIDDEN: usize> NnFilterCore<HIDDEN> {
    fn new(sample_rate: f32, seed: u32) -> Self {
        Self {
            net: build_net(seed),
            z: core::array::from_fn(|_| LinearSmoothedParam::with_config(0.0, sample_rate, 8.0)),
            p: core::array::from_fn(|_| LinearSmoothedParam::with_config(0.0, sample_rate, 8.0)),
            k: LinearSmoothedParam::with_config(0.0, sample_rate, 8.0),
            filter: PoleZeroFilter::default(),
        }
    }

    fn update_geometry(&mut self, path: &DiffractionPath) {
        let out = self.net.forward(feature_vector(path));
        // Ordered so z[0] >= z[1], p[0] >= p[1], both clamped to keep the
        // implied poles strictly inside the unit circle for stability.
        let mut zs = [out[0], out[1]];
        let mut ps = [out[2].clamp(-0.98, 0.98), out[3].clamp(-0.98, 0.98)];
        if zs[0] < zs[1] {
            zs.swap(0, 1);
        }
        if ps[0] < ps[1] {
            ps.swap(0, 1);
        }
        self.z[0].set_target(zs[0]);
        self.z[1].set_target(zs[1]);
        self.p[0].set_target(ps[0]);
        self.p[1].set_target(ps[1]);
        self.k.set_target(tanhf(out[4]));
    }

    fn process(&mut self, input: f32) -> f32 {
        let z = [self.z[0].advance(), self.z[1].advance()];
        let p = [self.p[0].advance(), self.p[1].advance()];
        let k = self.k.advance();
        self.filter.process(input, z, p, k)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        for param in self.z.iter_mut().chain(self.p.iter_mut()).chain(core::iter::once(&mut self.k)) {
            param.set_sample_rate(sample_rate);
        }
    }

    fn reset(&mut self) {
        for param in self.z.iter_mut().chain(self.p.iter_mut()).chain(core::iter::once(&mut self.k)) {
            param.snap_to_target();
        }
        self.filter.reset();
    }
}

const NN_BEST_HIDDEN: usize = 16;
const NN_SMALL_HIDDEN: usize = 4;

/// NN-best: the larger of the two fixed networks.
pub struct NnBestFilter(NnFilterCore<NN_BEST_HIDDEN>);

impl NnBestFilter {
    #[must_use]
    pub fn new(sample_rate: f32) -> Self {
        Self(NnFilterCore::new(sample_rate, 0xC0FF_EE01))
    }
}

impl DiffractionFilter for NnBestFilter {
    fn update_geometry(&mut self, path: &DiffractionPath, _sample_rate: f32) {
        self.0.update_geometry(path);
    }
}

impl Effect for NnBestFilter {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.0.process(input)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.0.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.0.reset();
    }
}

/// NN-small: fewer hidden units, same input/output shape.
pub struct NnSmallFilter(NnFilterCore<NN_SMALL_HIDDEN>);

impl NnSmallFilter {
    #[must_use]
    pub fn new(sample_rate: f32) -> Self {
        Self(NnFilterCore::new(sample_rate, 0xBADC_0DE2))
    }
}

impl DiffractionFilter for NnSmallFilter {
    fn update_geometry(&mut self, path: &DiffractionPath, _sample_rate: f32) {
        self.0.update_geometry(path);
    }
}

impl Effect for NnSmallFilter {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.0.process(input)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.0.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.0.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonido_geometry::{id::Id, room::Edge, Vec3};

    fn test_path() -> DiffractionPath {
        let edge = Edge {
            wall_a: Id::from_raw(0),
            wall_b: Id::from_raw(1),
            origin: Vec3::new(0.0, 0.0, 0.0),
            direction: Vec3::new(0.0, 0.0, 1.0),
            length: 4.0,
            exterior_angle: core::f32::consts::PI * 1.5,
        };
        DiffractionPath::compute(
            Vec3::new(2.0, 0.0, 1.0),
            Vec3::new(2.0, 0.0, 3.0),
            &edge,
            Vec3::new(1.0, 0.0, 0.0),
        )
        .unwrap()
    }

    #[test]
    fn nn_best_output_finite_and_stable() {
        let mut f = NnBestFilter::new(48000.0);
        f.update_geometry(&test_path(), 48000.0);
        for _ in 0..5000 {
            let y = f.process(0.4);
            assert!(y.is_finite());
            assert!(y.abs() < 100.0, "filter appears unstable: {y}");
        }
    }

    #[test]
    fn nn_small_output_finite_and_stable() {
        let mut f = NnSmallFilter::new(48000.0);
        f.update_geometry(&test_path(), 48000.0);
        for _ in 0..5000 {
            let y = f.process(0.4);
            assert!(y.is_finite());
            assert!(y.abs() < 100.0, "filter appears unstable: {y}");
        }
    }
}
