//! Fixed-end reactions of frame elements
//!
//! A fixed-end reaction vector holds the end forces that a fully fixed
//! element would exert under its span loads, in local coordinates. The
//! equivalent nodal load is its negative.

use super::{Mat3, Vec12, Vec3};

/// 3-point Gauss-Legendre abscissae and weights on [-1, 1]
const GAUSS3: [(f64, f64); 3] = [
    (-0.774_596_669_241_483_4, 5.0 / 9.0),
    (0.0, 8.0 / 9.0),
    (0.774_596_669_241_483_4, 5.0 / 9.0),
];

/// Transverse displacement of a fixed-fixed beam for a unit motion of each
/// end DOF, (v_i, theta_i, v_j, theta_j), at `x` on a member of length `l`
///
/// `phi` is the shear flexibility ratio 12EI/(GAs L²). With `phi = 0` these
/// are the cubic Hermite polynomials; otherwise they are the exact Timoshenko
/// deflections, so the equivalent loads agree with the Timoshenko stiffness.
fn bending_shapes(x: f64, l: f64, phi: f64) -> [f64; 4] {
    let s = x / l;
    let r = 1.0 - s;
    let mu = 1.0 / (1.0 + phi);
    [
        mu * r * (1.0 + s + phi - 2.0 * s * s),
        mu * l * s * r * (r + phi / 2.0),
        mu * s * (3.0 * s - 2.0 * s * s + phi),
        -mu * l * s * r * (s + phi / 2.0),
    ]
}

/// Integrate `f(x) * w(x)` over [x1, x2] for a linearly varying `w`
fn integrate_linear<F, const N: usize>(w1: f64, w2: f64, x1: f64, x2: f64, f: F) -> [f64; N]
where
    F: Fn(f64) -> [f64; N],
{
    let mut out = [0.0; N];
    let half = (x2 - x1) / 2.0;
    if half <= 0.0 {
        return out;
    }
    for (xi, weight) in GAUSS3 {
        let x = x1 + half * (xi + 1.0);
        let w = w1 + (w2 - w1) * (xi + 1.0) / 2.0;
        for (o, n) in out.iter_mut().zip(f(x)) {
            *o += weight * half * w * n;
        }
    }
    out
}

/// Fixed-end reactions of a beam-column for a linearly varying line load
/// from `x1` to `x2` along local axis `direction` (0 = x, 1 = y, 2 = z)
///
/// `phi` is the shear flexibility ratio of the loaded bending plane.
pub fn fer_line_load(w1: f64, w2: f64, x1: f64, x2: f64, length: f64, direction: usize, phi: f64) -> Vec12 {
    let mut fer = Vec12::zeros();
    match direction {
        0 => {
            let [ni, nj] = integrate_linear(w1, w2, x1, x2, |x| [1.0 - x / length, x / length]);
            fer[0] = -ni;
            fer[6] = -nj;
        }
        1 => {
            let [vi, ti, vj, tj] = integrate_linear(w1, w2, x1, x2, |x| bending_shapes(x, length, phi));
            fer[1] = -vi;
            fer[5] = -ti;
            fer[7] = -vj;
            fer[11] = -tj;
        }
        2 => {
            // Rotation about local y is -dw/dx
            let [vi, ti, vj, tj] = integrate_linear(w1, w2, x1, x2, |x| bending_shapes(x, length, phi));
            fer[2] = -vi;
            fer[4] = ti;
            fer[8] = -vj;
            fer[10] = tj;
        }
        _ => {}
    }
    fer
}

/// Fixed-end reactions of a beam-column for a point load `p` at distance `a`
pub fn fer_point_load(p: f64, a: f64, length: f64, direction: usize, phi: f64) -> Vec12 {
    let mut fer = Vec12::zeros();
    match direction {
        0 => {
            fer[0] = -p * (length - a) / length;
            fer[6] = -p * a / length;
        }
        1 => {
            let [vi, ti, vj, tj] = bending_shapes(a, length, phi);
            fer[1] = -p * vi;
            fer[5] = -p * ti;
            fer[7] = -p * vj;
            fer[11] = -p * tj;
        }
        2 => {
            let [vi, ti, vj, tj] = bending_shapes(a, length, phi);
            fer[2] = -p * vi;
            fer[4] = p * ti;
            fer[8] = -p * vj;
            fer[10] = p * tj;
        }
        _ => {}
    }
    fer
}

/// Truss span loads are carried to the end nodes as simple-span reactions
pub fn fer_truss_line_load(w1: f64, w2: f64, x1: f64, x2: f64, length: f64, direction: usize) -> Vec12 {
    let mut fer = Vec12::zeros();
    if direction < 3 {
        let [ni, nj] = integrate_linear(w1, w2, x1, x2, |x| [1.0 - x / length, x / length]);
        fer[direction] = -ni;
        fer[direction + 6] = -nj;
    }
    fer
}

pub fn fer_truss_point_load(p: f64, a: f64, length: f64, direction: usize) -> Vec12 {
    let mut fer = Vec12::zeros();
    if direction < 3 {
        fer[direction] = -p * (length - a) / length;
        fer[direction + 6] = -p * a / length;
    }
    fer
}

/// Split a load direction into local components
///
/// `unit` is either already local, or global and rotated into the member
/// axes through the direction cosines `r` (rows are local axes).
pub fn local_components(unit: [f64; 3], is_local: bool, r: &Mat3) -> [f64; 3] {
    let v = Vec3::from(unit);
    let local = if is_local { v } else { r * v };
    [local.x, local.y, local.z]
}
