//! Four-node flat shell kernel
//!
//! The shell is the superposition of a bilinear plane-stress membrane and a
//! Mindlin plate whose transverse shear is interpolated from the MITC4 tying
//! points, which keeps thin plates free of shear locking. Both parts use 2x2
//! Gauss integration. The drilling rotation (local RZ) has no stiffness of its
//! own and receives a weak spring.
//!
//! Local DOFs per node are ordered DX, DY, DZ, RX, RY, RZ, so the 24-vector of
//! a shell follows the same layout as the global DOF vector.
//!
//! References:
//! - "Finite Element Procedures, 2nd Edition", Klaus-Jurgen Bathe, section 5.4
//! - Dvorkin & Bathe, "A continuum mechanics based four-node shell element" (1984)

use nalgebra::{Matrix2, SMatrix, Vector2};

use super::{block_transformation, Mat24, Mat3, Vec24, Vec3};
use crate::error::{SolverError, SolverResult};

/// Natural coordinates of the corner nodes, counter-clockwise from the i-node
const CORNERS: [(f64, f64); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

/// 2x2 Gauss points (unit weights)
const GAUSS2: [(f64, f64); 4] = [
    (-0.577_350_269_189_625_8, -0.577_350_269_189_625_8),
    (0.577_350_269_189_625_8, -0.577_350_269_189_625_8),
    (0.577_350_269_189_625_8, 0.577_350_269_189_625_8),
    (-0.577_350_269_189_625_8, 0.577_350_269_189_625_8),
];

/// Shear correction factor for a homogeneous plate
const SHEAR_CORRECTION: f64 = 5.0 / 6.0;

/// Drilling spring as a fraction of the softest bending rotation stiffness
const DRILLING_RATIO: f64 = 1.0e-3;

type Mat3x8 = SMatrix<f64, 3, 8>;
type Mat3x12 = SMatrix<f64, 3, 12>;
type Mat2x12 = SMatrix<f64, 2, 12>;
type Mat8 = SMatrix<f64, 8, 8>;
type Mat12 = SMatrix<f64, 12, 12>;

/// Positions of the membrane DOFs (u, v) of each node in the 24-vector
const MEMBRANE_DOFS: [usize; 8] = [0, 1, 6, 7, 12, 13, 18, 19];
/// Positions of the plate DOFs (w, RX, RY) of each node in the 24-vector
const PLATE_DOFS: [usize; 12] = [2, 3, 4, 8, 9, 10, 14, 15, 16, 20, 21, 22];

/// Local frame of a shell and its corners projected onto the mid-plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShellGeometry {
    /// Direction cosines, rows are the local x, y, z axes
    pub rotation: Mat3,
    /// In-plane coordinates of the four corners, i-node at the origin
    pub xy: [[f64; 2]; 4],
}

/// Stress resultants at the shell centroid in local axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShellResultants {
    /// Membrane stresses [σx, σy, τxy]
    pub membrane: [f64; 3],
    /// Bending moments per unit width [Mx, My, Mxy]
    pub moments: [f64; 3],
    /// Transverse shear forces per unit width [Qx, Qy]
    pub shear: [f64; 2],
}

impl ShellGeometry {
    /// Build the local frame: x from i to j, z normal to the plane spanned by
    /// i-j and i-n, y completing the right-handed set.
    pub fn new(coords: &[[f64; 3]; 4]) -> SolverResult<Self> {
        let p: Vec<Vec3> = coords.iter().map(|c| Vec3::new(c[0], c[1], c[2])).collect();
        let ij = p[1] - p[0];
        let in_ = p[3] - p[0];

        let scale = ij.norm().max(in_.norm());
        if ij.norm() < 1e-10 || scale < 1e-10 {
            return Err(SolverError::InvalidGeometry("shell has coincident corners".to_string()));
        }

        let x = ij.normalize();
        let z_raw = x.cross(&in_);
        if z_raw.norm() < 1e-8 * scale {
            return Err(SolverError::InvalidGeometry("shell corners are collinear".to_string()));
        }
        let z = z_raw.normalize();
        let y = z.cross(&x);
        let rotation = Mat3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]);

        let mut xy = [[0.0; 2]; 4];
        for (k, point) in p.iter().enumerate() {
            let local = rotation * (point - p[0]);
            xy[k] = [local.x, local.y];
        }

        let geometry = Self { rotation, xy };
        // A fold-over or a concave corner turns the Jacobian negative somewhere
        for (r, s) in GAUSS2.iter().copied().chain(CORNERS.iter().map(|&(r, s)| (0.9 * r, 0.9 * s))) {
            if geometry.jacobian(r, s).determinant() <= 1e-12 * scale * scale {
                return Err(SolverError::InvalidGeometry("shell is distorted or has zero area".to_string()));
            }
        }

        Ok(geometry)
    }

    /// 24x24 transformation from global to local DOFs
    pub fn transformation(&self) -> Mat24 {
        block_transformation::<24>(&self.rotation)
    }

    /// J = [[x_r, y_r], [x_s, y_s]] at natural coordinates (r, s)
    fn jacobian(&self, r: f64, s: f64) -> Matrix2<f64> {
        let (_, dn_dr, dn_ds) = shape_functions(r, s);
        let mut j = Matrix2::zeros();
        for k in 0..4 {
            j[(0, 0)] += dn_dr[k] * self.xy[k][0];
            j[(0, 1)] += dn_dr[k] * self.xy[k][1];
            j[(1, 0)] += dn_ds[k] * self.xy[k][0];
            j[(1, 1)] += dn_ds[k] * self.xy[k][1];
        }
        j
    }

    /// Shape functions, their Cartesian derivatives and det J at (r, s)
    fn cartesian(&self, r: f64, s: f64) -> ([f64; 4], [f64; 4], [f64; 4], f64) {
        let (n, dn_dr, dn_ds) = shape_functions(r, s);
        let j = self.jacobian(r, s);
        let det = j.determinant();
        let j_inv = j.try_inverse().unwrap_or_else(Matrix2::zeros);

        let mut dn_dx = [0.0; 4];
        let mut dn_dy = [0.0; 4];
        for k in 0..4 {
            let d = j_inv * Vector2::new(dn_dr[k], dn_ds[k]);
            dn_dx[k] = d.x;
            dn_dy[k] = d.y;
        }
        (n, dn_dx, dn_dy, det)
    }

    /// Mid-plane area
    pub fn area(&self) -> f64 {
        GAUSS2.iter().map(|&(r, s)| self.jacobian(r, s).determinant()).sum()
    }

    /// Tributary area of each corner, ∫ N_k dA
    pub fn nodal_areas(&self) -> [f64; 4] {
        let mut areas = [0.0; 4];
        for &(r, s) in &GAUSS2 {
            let (n, _, _, det) = self.cartesian(r, s);
            for k in 0..4 {
                areas[k] += n[k] * det;
            }
        }
        areas
    }

    fn membrane_b(&self, r: f64, s: f64) -> (Mat3x8, f64) {
        let (_, dn_dx, dn_dy, det) = self.cartesian(r, s);
        let mut b = Mat3x8::zeros();
        for k in 0..4 {
            b[(0, 2 * k)] = dn_dx[k];
            b[(1, 2 * k + 1)] = dn_dy[k];
            b[(2, 2 * k)] = dn_dy[k];
            b[(2, 2 * k + 1)] = dn_dx[k];
        }
        (b, det)
    }

    /// Curvatures from the plate DOFs (w, RX, RY) with βx = RY and βy = -RX
    fn bending_b(&self, r: f64, s: f64) -> (Mat3x12, f64) {
        let (_, dn_dx, dn_dy, det) = self.cartesian(r, s);
        let mut b = Mat3x12::zeros();
        for k in 0..4 {
            let (rx, ry) = (3 * k + 1, 3 * k + 2);
            b[(0, ry)] = dn_dx[k];
            b[(1, rx)] = -dn_dy[k];
            b[(2, ry)] = dn_dy[k];
            b[(2, rx)] = -dn_dx[k];
        }
        (b, det)
    }

    /// Covariant transverse shear strain along a natural direction at a tying point
    ///
    /// `along_r` selects γ_rz, otherwise γ_sz.
    fn covariant_shear_row(&self, r: f64, s: f64, along_r: bool) -> [f64; 12] {
        let (n, dn_dr, dn_ds) = shape_functions(r, s);
        let j = self.jacobian(r, s);
        let (dn, xd, yd) = if along_r {
            (dn_dr, j[(0, 0)], j[(0, 1)])
        } else {
            (dn_ds, j[(1, 0)], j[(1, 1)])
        };

        let mut row = [0.0; 12];
        for k in 0..4 {
            row[3 * k] = dn[k];
            row[3 * k + 1] = -n[k] * yd;
            row[3 * k + 2] = n[k] * xd;
        }
        row
    }

    /// MITC4 assumed transverse shear strains [γxz, γyz] at (r, s)
    fn shear_b(&self, r: f64, s: f64) -> (Mat2x12, f64) {
        let a = self.covariant_shear_row(0.0, 1.0, true);
        let c = self.covariant_shear_row(0.0, -1.0, true);
        let d = self.covariant_shear_row(1.0, 0.0, false);
        let b = self.covariant_shear_row(-1.0, 0.0, false);

        let j = self.jacobian(r, s);
        let det = j.determinant();
        let j_inv = j.try_inverse().unwrap_or_else(Matrix2::zeros);

        let mut out = Mat2x12::zeros();
        for col in 0..12 {
            let g_rz = 0.5 * (1.0 + s) * a[col] + 0.5 * (1.0 - s) * c[col];
            let g_sz = 0.5 * (1.0 + r) * d[col] + 0.5 * (1.0 - r) * b[col];
            let g = j_inv * Vector2::new(g_rz, g_sz);
            out[(0, col)] = g.x;
            out[(1, col)] = g.y;
        }
        (out, det)
    }
}

/// Bilinear shape functions and their natural derivatives
fn shape_functions(r: f64, s: f64) -> ([f64; 4], [f64; 4], [f64; 4]) {
    let mut n = [0.0; 4];
    let mut dn_dr = [0.0; 4];
    let mut dn_ds = [0.0; 4];
    for (k, &(rk, sk)) in CORNERS.iter().enumerate() {
        n[k] = 0.25 * (1.0 + rk * r) * (1.0 + sk * s);
        dn_dr[k] = 0.25 * rk * (1.0 + sk * s);
        dn_ds[k] = 0.25 * sk * (1.0 + rk * r);
    }
    (n, dn_dr, dn_ds)
}

/// Plane-stress constitutive matrix
fn membrane_constitutive(e: f64, nu: f64) -> Mat3 {
    let c = e / (1.0 - nu * nu);
    Mat3::new(c, c * nu, 0.0, c * nu, c, 0.0, 0.0, 0.0, c * (1.0 - nu) / 2.0)
}

/// Plate flexural rigidity matrix
fn bending_constitutive(e: f64, nu: f64, t: f64) -> Mat3 {
    membrane_constitutive(e, nu) * (t.powi(3) / 12.0)
}

fn shear_rigidity(e: f64, nu: f64, t: f64) -> f64 {
    SHEAR_CORRECTION * e / (2.0 * (1.0 + nu)) * t
}

/// Local 24x24 stiffness of a flat shell of thickness `t`
pub fn shell_local_stiffness(geometry: &ShellGeometry, e: f64, nu: f64, t: f64) -> Mat24 {
    let dm = membrane_constitutive(e, nu) * t;
    let db = bending_constitutive(e, nu, t);
    let ds = shear_rigidity(e, nu, t);

    let mut km = Mat8::zeros();
    let mut kb = Mat12::zeros();
    for &(r, s) in &GAUSS2 {
        let (bm, det) = geometry.membrane_b(r, s);
        km += bm.transpose() * dm * bm * det;

        let (bb, det) = geometry.bending_b(r, s);
        kb += bb.transpose() * db * bb * det;

        let (bs, det) = geometry.shear_b(r, s);
        kb += bs.transpose() * bs * (ds * det);
    }

    let mut k = Mat24::zeros();
    for (i, &gi) in MEMBRANE_DOFS.iter().enumerate() {
        for (j, &gj) in MEMBRANE_DOFS.iter().enumerate() {
            k[(gi, gj)] = km[(i, j)];
        }
    }
    for (i, &gi) in PLATE_DOFS.iter().enumerate() {
        for (j, &gj) in PLATE_DOFS.iter().enumerate() {
            k[(gi, gj)] = kb[(i, j)];
        }
    }

    // Weak spring on the drilling rotation
    let min_rot = (0..4)
        .flat_map(|node| [6 * node + 3, 6 * node + 4])
        .map(|dof| k[(dof, dof)])
        .fold(f64::INFINITY, f64::min);
    let k_rz = min_rot * DRILLING_RATIO;
    for node in 0..4 {
        k[(6 * node + 5, 6 * node + 5)] = k_rz;
    }

    // Symmetrize to remove round-off from the Gauss sums
    (k + k.transpose()) * 0.5
}

/// Lumped shell mass: translational mass ρt∫N_k dA and rotary inertia ρt³/12 ∫N_k dA
/// about the in-plane axes of each corner
pub fn shell_lumped_mass(geometry: &ShellGeometry, rho: f64, t: f64) -> Mat24 {
    let mut m = Mat24::zeros();
    for (node, area) in geometry.nodal_areas().into_iter().enumerate() {
        let mass = rho * t * area;
        let rotary = rho * t.powi(3) / 12.0 * area;
        for dof in 0..3 {
            m[(6 * node + dof, 6 * node + dof)] = mass;
        }
        m[(6 * node + 3, 6 * node + 3)] = rotary;
        m[(6 * node + 4, 6 * node + 4)] = rotary;
    }
    m
}

/// Fixed-end reactions of a uniform pressure acting along local +z
pub fn shell_pressure_fer(geometry: &ShellGeometry, pressure: f64) -> Vec24 {
    let mut fer = Vec24::zeros();
    for (node, area) in geometry.nodal_areas().into_iter().enumerate() {
        fer[6 * node + 2] = -pressure * area;
    }
    fer
}

/// Fixed-end reactions of a body acceleration `g` given in global axes
pub fn shell_body_force_fer(geometry: &ShellGeometry, rho: f64, t: f64, g: [f64; 3]) -> Vec24 {
    let local = geometry.rotation * Vec3::from(g);
    let mut fer = Vec24::zeros();
    for (node, area) in geometry.nodal_areas().into_iter().enumerate() {
        let mass = rho * t * area;
        for dof in 0..3 {
            fer[6 * node + dof] = -mass * local[dof];
        }
    }
    fer
}

/// Membrane stresses, moments and transverse shears at the centroid from local displacements
pub fn shell_resultants(geometry: &ShellGeometry, e: f64, nu: f64, t: f64, d: &Vec24) -> ShellResultants {
    let dm = SMatrix::<f64, 8, 1>::from_iterator(MEMBRANE_DOFS.iter().map(|&i| d[i]));
    let dp = SMatrix::<f64, 12, 1>::from_iterator(PLATE_DOFS.iter().map(|&i| d[i]));

    let (bm, _) = geometry.membrane_b(0.0, 0.0);
    let sigma = membrane_constitutive(e, nu) * (bm * dm);

    let (bb, _) = geometry.bending_b(0.0, 0.0);
    let moments = bending_constitutive(e, nu, t) * (bb * dp);

    let (bs, _) = geometry.shear_b(0.0, 0.0);
    let shear = (bs * dp) * shear_rigidity(e, nu, t);

    ShellResultants {
        membrane: [sigma.x, sigma.y, sigma.z],
        moments: [moments.x, moments.y, moments.z],
        shear: [shear.x, shear.y],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::asymmetry;
    use approx::assert_relative_eq;

    fn square(side: f64) -> ShellGeometry {
        ShellGeometry::new(&[
            [0.0, 0.0, 0.0],
            [side, 0.0, 0.0],
            [side, 0.0, side],
            [0.0, 0.0, side],
        ])
        .unwrap()
    }

    fn skewed() -> ShellGeometry {
        ShellGeometry::new(&[
            [0.0, 0.0, 0.0],
            [2.0, 0.2, 0.0],
            [2.3, 1.1, 0.5],
            [0.1, 0.8, 0.6],
        ])
        .unwrap()
    }

    #[test]
    fn test_local_frame_is_orthonormal() {
        let g = skewed();
        assert_relative_eq!(g.rotation * g.rotation.transpose(), Mat3::identity(), epsilon = 1e-12);
        assert_relative_eq!(g.xy[0][0], 0.0);
        assert_relative_eq!(g.xy[1][1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_square_area_and_tributary_areas() {
        let g = square(2.0);
        assert_relative_eq!(g.area(), 4.0, epsilon = 1e-12);
        for area in g.nodal_areas() {
            assert_relative_eq!(area, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_stiffness_is_symmetric() {
        let k = shell_local_stiffness(&skewed(), 30e9, 0.2, 0.2);
        assert!(asymmetry(&k) < 1e-6 * k.abs().max());
    }

    #[test]
    fn test_rigid_body_modes_are_strain_free() {
        let g = skewed();
        let k = shell_local_stiffness(&g, 200e9, 0.3, 0.05);

        // Translations along all three axes
        for dof in 0..3 {
            let mut d = Vec24::zeros();
            for node in 0..4 {
                d[6 * node + dof] = 1.0;
            }
            assert!((k * d).norm() < 1e-6 * k.abs().max());
        }

        // Rotation about local x: w = c y, RX = c
        let mut d = Vec24::zeros();
        for node in 0..4 {
            d[6 * node + 2] = g.xy[node][1];
            d[6 * node + 3] = 1.0;
        }
        assert!((k * d).norm() < 1e-6 * k.abs().max());

        // Rotation about local y: w = -c x, RY = c
        let mut d = Vec24::zeros();
        for node in 0..4 {
            d[6 * node + 2] = -g.xy[node][0];
            d[6 * node + 4] = 1.0;
        }
        assert!((k * d).norm() < 1e-6 * k.abs().max());
    }

    #[test]
    fn test_pressure_resultant() {
        let g = square(3.0);
        let fer = shell_pressure_fer(&g, -5.0);
        let total: f64 = (0..4).map(|n| fer[6 * n + 2]).sum();
        assert_relative_eq!(total, 5.0 * 9.0, epsilon = 1e-9);
    }

    #[test]
    fn test_lumped_mass_total() {
        let g = skewed();
        let m = shell_lumped_mass(&g, 2500.0, 0.2);
        let total: f64 = (0..4).map(|n| m[(6 * n, 6 * n)]).sum();
        assert_relative_eq!(total, 2500.0 * 0.2 * g.area(), epsilon = 1e-9);
    }

    #[test]
    fn test_constant_membrane_strain_recovered() {
        let g = square(1.0);
        // u = 1e-3 x gives σx = E/(1-ν²) 1e-3
        let mut d = Vec24::zeros();
        for node in 0..4 {
            d[6 * node] = 1e-3 * g.xy[node][0];
        }
        let (e, nu) = (210e9, 0.3);
        let res = shell_resultants(&g, e, nu, 0.01, &d);
        assert_relative_eq!(res.membrane[0], e / (1.0 - nu * nu) * 1e-3, max_relative = 1e-10);
        assert_relative_eq!(res.membrane[1], nu * e / (1.0 - nu * nu) * 1e-3, max_relative = 1e-10);
        assert_relative_eq!(res.moments[0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_shells_are_rejected() {
        let collinear = ShellGeometry::new(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [3.0, 0.0, 0.0],
        ]);
        assert!(matches!(collinear, Err(SolverError::InvalidGeometry(_))));

        let bow_tie = ShellGeometry::new(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ]);
        assert!(bow_tie.is_err());
    }
}
