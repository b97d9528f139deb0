//! Conformal cube map after Rančić, Purser & Mesinger (1996).
//!
//! The panel is split into eight symmetric triangles. Each is sent from its cube corner by
//! `Z = z⁴`, a power series `W(Z)`, a cube root that opens the right angle to 120°, and a Möbius
//! map onto the stereographic plane of the panel. Coordinates outside `[-1, 1]` continue the map by
//! reflection across the panel edges, so ghost points land on the neighbouring panel's own points.

use std::f64::consts::{FRAC_PI_6, FRAC_PI_8};

use num_complex::Complex64;

use crate::projection::LocalMap;

/// Taylor coefficients of `W(Z) = Σ A_k Z^k`.
#[allow(clippy::unreadable_literal)]
const A: [f64; 30] = [
    1.47713062600964, -0.38183510510174, -0.05573058001191, -0.00895883606818, -0.00791315785221,
    -0.00486625437708, -0.00329251751279, -0.00235481488325, -0.00175870527475, -0.00135681133278,
    -0.00107459847699, -0.00086944475948, -0.00071607115121, -0.00059867100093, -0.00050699063239,
    -0.00043415191279, -0.00037541003286, -0.00032741060100, -0.00028773091482, -0.00025458777519,
    -0.00022664642371, -0.00020289261022, -0.00018254510830, -0.00016499474461, -0.00014976117168,
    -0.00013646173946, -0.00012478875823, -0.00011449267279, -0.00010536946150, -0.00009725109376,
];

/// Taylor coefficients of the inverse series `Z(W) = Σ B_k W^k`.
#[allow(clippy::unreadable_literal)]
const B: [f64; 30] = [
    0.67698819751739, 0.11847293456554, 0.05317178134668, 0.02965810434052, 0.01912447304028,
    0.01342565621117, 0.00998873323180, 0.00774868996406, 0.00620346979888, 0.00509010874883,
    0.00425981853215, 0.00362308487388, 0.00312341408570, 0.00272360510370, 0.00239804009359,
    0.00212846863240, 0.00190157368461, 0.00170854998016, 0.00154352386825, 0.00140095908620,
    0.00127652543669, 0.00116718346463, 0.00107064010883, 0.00098482848063, 0.00090812733848,
    0.00083933224713, 0.00077731811938, 0.00072123924150, 0.00067046624218, 0.00062430866613,
];

/// Newton steps polishing the inverse series against `A`.
const NEWTON_STEPS: usize = 2;

/// Edge reflections applied per axis before giving up on a coordinate.
const MAX_FOLDS: usize = 8;

const CB: Complex64 = Complex64::new(-1.0, 1.0);

/// Möbius constants: `ra = √3 − 1` puts the panel centre at the origin, `cc = ra·cb/2`.
fn mobius() -> (f64, Complex64) {
    let ra = 3f64.sqrt() - 1.0;
    (ra, CB * (0.5 * ra))
}

/// `Σ c_k Z^(k-1)`, the series divided by `Z`.
fn series_over_z(c: &[f64; 30], z: Complex64) -> Complex64 {
    c.iter().rev().fold(Complex64::new(0.0, 0.0), |acc, &a| acc * z + a)
}

/// `Σ k c_k Z^(k-1)`.
#[allow(clippy::cast_precision_loss)]
fn series_derivative(c: &[f64; 30], z: Complex64) -> Complex64 {
    c.iter().enumerate().rev().fold(Complex64::new(0.0, 0.0), |acc, (k, &a)| acc * z + a * (k + 1) as f64)
}

/// Map of the reduced triangle `0 ≤ b ≤ a ≤ 1` with derivatives along `a` and `b`.
fn sector(a: f64, b: f64) -> LocalMap {
    let (ra, cc) = mobius();
    let z = Complex64::new(1.0 - a, 1.0 - b) * 0.5;
    let z2 = z * z;
    let zz = z2 * z2;
    let s = series_over_z(&A, zz);
    let w1 = zz * s;
    let w2 = Complex64::from_polar(1.0, FRAC_PI_6) * (Complex64::i() * w1).powf(1.0 / 3.0);
    let den = CB + cc * w2;
    let w = (w2 - ra) / den;

    // dw/dz vanishes at the cube corner.
    let dw = if z.norm_sqr() > 0.0 {
        (CB + cc * ra) / (den * den) * (4.0 / 3.0) * (w2 / z) * (series_derivative(&A, zz) / s)
    } else {
        Complex64::new(0.0, 0.0)
    };

    // Inverse stereographic projection and its Jacobian.
    let (u, v) = (w.re, w.im);
    let h = 2.0 / (1.0 + u * u + v * v);
    let h2 = h * h;
    let push = |du: f64, dv: f64| {
        [
            (h - u * u * h2) * du - u * v * h2 * dv,
            -u * v * h2 * du + (h - v * v * h2) * dv,
            -u * h2 * du - v * h2 * dv,
        ]
    };
    LocalMap {
        r: [u * h, v * h, h - 1.0],
        dx: push(-0.5 * dw.re, -0.5 * dw.im),
        dy: push(0.5 * dw.im, -0.5 * dw.re),
    }
}

/// Map of the whole panel `|x|, |y| ≤ 1` from the reduced triangle by symmetry.
fn face(x: f64, y: f64) -> LocalMap {
    let (ax, ay) = (x.abs(), y.abs());
    let m = if ay > ax {
        let s = sector(ay, ax);
        LocalMap { r: swap_xy(s.r), dx: swap_xy(s.dy), dy: swap_xy(s.dx) }
    } else {
        sector(ax, ay)
    };
    let sx = if x < 0.0 { -1.0 } else { 1.0 };
    let sy = if y < 0.0 { -1.0 } else { 1.0 };
    let flip = |v: [f64; 3], k: f64| [v[0] * sx * k, v[1] * sy * k, v[2] * k];
    LocalMap { r: flip(m.r, 1.0), dx: flip(m.dx, sx), dy: flip(m.dy, sy) }
}

fn swap_xy(v: [f64; 3]) -> [f64; 3] {
    [v[1], v[0], v[2]]
}

/// Coordinate folded back into `[-1, 1]`, with the edge sides crossed in order.
struct Fold {
    t: f64,
    sides: [f64; MAX_FOLDS],
    len: usize,
}

impl Fold {
    fn new(mut t: f64) -> Self {
        let mut sides = [0.0; MAX_FOLDS];
        let mut len = 0;
        while t.abs() > 1.0 && len < MAX_FOLDS {
            let s = t.signum();
            t = 2.0 * s - t;
            sides[len] = s;
            len += 1;
        }
        Self { t, sides, len }
    }

    /// Sign picked up by `d/dt` through the folds.
    fn parity(&self) -> f64 {
        if self.len % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }
}

/// Mirror across the edge plane `v[axis] = side · v[2]`.
fn reflect(v: [f64; 3], axis: usize, side: f64) -> [f64; 3] {
    let mut out = v;
    out[axis] = side * v[2];
    out[2] = side * v[axis];
    out
}

/// Unit position and its x/y derivatives in the panel frame.
pub(crate) fn local_map(x: f64, y: f64) -> LocalMap {
    let fx = Fold::new(x);
    let fy = Fold::new(y);
    let mut m = face(fx.t, fy.t);
    m.dx = m.dx.map(|c| c * fx.parity());
    m.dy = m.dy.map(|c| c * fy.parity());
    for (axis, fold) in [(0, &fx), (1, &fy)] {
        for &side in fold.sides[..fold.len].iter().rev() {
            m = LocalMap {
                r: reflect(m.r, axis, side),
                dx: reflect(m.dx, axis, side),
                dy: reflect(m.dy, axis, side),
            };
        }
    }
    m
}

/// Inverse of [`local_map`] for points on the panel's hemisphere.
pub(crate) fn local_coords(l: [f64; 3]) -> Option<(f64, f64)> {
    let [xi, eta, zeta] = l;
    if zeta <= 0.0 {
        return None;
    }
    let (ra, cc) = mobius();
    let (a, b) = (xi.abs(), eta.abs());
    let swapped = b > a;
    let (a, b) = if swapped { (b, a) } else { (a, b) };

    let w = Complex64::new(a, b) / (1.0 + zeta);
    let w2 = (w * CB + ra) / (1.0 - cc * w);
    let w1 = -(w2 * w2 * w2);
    let mut zz = w1 * series_over_z(&B, w1);
    for _ in 0..NEWTON_STEPS {
        zz -= (zz * series_over_z(&A, zz) - w1) / series_derivative(&A, zz);
    }
    let z = sector_root(zz);

    let (mut x, mut y) = (1.0 - 2.0 * z.re, 1.0 - 2.0 * z.im);
    if swapped {
        std::mem::swap(&mut x, &mut y);
    }
    Some((x.copysign(xi), y.copysign(eta)))
}

/// Fourth root of `zz` whose argument lies in `[π/4, π/2]`, the image of the reduced triangle.
fn sector_root(zz: Complex64) -> Complex64 {
    let aim = Complex64::from_polar(1.0, -3.0 * FRAC_PI_8);
    let mut c = zz.powf(0.25);
    let mut best = c;
    let mut score = f64::NEG_INFINITY;
    for _ in 0..4 {
        let s = (c * aim).re;
        if s > score {
            score = s;
            best = c;
        }
        c *= Complex64::i();
    }
    best
}
