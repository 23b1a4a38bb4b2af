//! Element kernels and numerical utilities
//!
//! Frame kernels (truss and beam-column) live here; the shell kernel is in
//! [`shell`], equivalent element loads in [`fer`] and the sparse storage and
//! factorization in [`sparse`].

pub mod fer;
pub mod shell;
pub mod sparse;

use nalgebra::{DVector, Matrix3, SMatrix, SVector, Vector3};

use crate::elements::{Material, Section};
use crate::error::{SolverError, SolverResult};

pub use sparse::{
    reverse_cuthill_mckee, sparse_matvec, FactorizationError, SkylineCholesky, SparseMatrixBuilder,
};

pub type Vector = DVector<f64>;
pub type Mat3 = Matrix3<f64>;
pub type Vec3 = Vector3<f64>;

/// 12x12 matrix for member stiffness
pub type Mat12 = SMatrix<f64, 12, 12>;
/// 12-element vector for member forces/displacements
pub type Vec12 = SVector<f64, 12>;
/// 24x24 matrix for shell stiffness
pub type Mat24 = SMatrix<f64, 24, 24>;
/// 24-element vector for shell forces/displacements
pub type Vec24 = SVector<f64, 24>;

/// Material and section constants consumed by the frame kernels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameProperties {
    pub e: f64,
    pub g: f64,
    pub a: f64,
    pub iy: f64,
    pub iz: f64,
    pub j: f64,
    pub asy: Option<f64>,
    pub asz: Option<f64>,
    pub rho: f64,
}

impl FrameProperties {
    pub fn new(material: &Material, section: &Section) -> Self {
        Self {
            e: material.e,
            g: material.g,
            a: section.a,
            iy: section.iy,
            iz: section.iz,
            j: section.j,
            asy: section.asy,
            asz: section.asz,
            rho: material.rho,
        }
    }

    /// Shear flexibility ratio for a bending plane, zero when no shear area is known
    fn shear_ratio(&self, inertia: f64, shear_area: Option<f64>, length: f64) -> f64 {
        match shear_area {
            Some(area) if area > 0.0 && self.g > 0.0 => 12.0 * self.e * inertia / (self.g * area * length * length),
            _ => 0.0,
        }
    }

    /// Shear flexibility ratio of the bending plane loaded along local axis
    /// `direction` (1 = y, 2 = z); zero for axial loads
    pub fn bending_shear_ratio(&self, direction: usize, length: f64) -> f64 {
        match direction {
            1 => self.shear_ratio(self.iz, self.asy, length),
            2 => self.shear_ratio(self.iy, self.asz, length),
            _ => 0.0,
        }
    }
}

/// Direction cosines of a frame element, rows are the local x, y, z axes
///
/// Local x runs from the i-node to the j-node. Horizontal members keep local
/// y on global Y. Vertical members take local z along global Z. `rotation`
/// rolls the y and z axes about local x.
pub fn member_direction_cosines(i_node: &[f64; 3], j_node: &[f64; 3], rotation: f64) -> SolverResult<Mat3> {
    let d = Vec3::new(j_node[0] - i_node[0], j_node[1] - i_node[1], j_node[2] - i_node[2]);
    let length = d.norm();
    if length < 1e-10 {
        return Err(SolverError::InvalidGeometry("member has zero length".to_string()));
    }
    let x = d / length;

    let (y, z) = if x.x.abs() < 1e-10 && x.z.abs() < 1e-10 {
        let y = if x.y > 0.0 { -Vec3::x() } else { Vec3::x() };
        (y, Vec3::z())
    } else if x.y.abs() < 1e-10 {
        let y = Vec3::y();
        (y, x.cross(&y).normalize())
    } else {
        // Inclined: keep local z horizontal
        let proj = Vec3::new(d.x, 0.0, d.z);
        let z = if x.y > 0.0 { proj.cross(&x) } else { x.cross(&proj) }.normalize();
        (z.cross(&x).normalize(), z)
    };

    let (y, z) = if rotation.abs() > 1e-10 {
        let (sin_r, cos_r) = rotation.sin_cos();
        (y * cos_r + z * sin_r, z * cos_r - y * sin_r)
    } else {
        (y, z)
    };

    Ok(Mat3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]))
}

/// Repeat a 3x3 rotation along the diagonal of an N x N transformation
pub fn block_transformation<const N: usize>(r: &Mat3) -> SMatrix<f64, N, N> {
    let mut t = SMatrix::<f64, N, N>::zeros();
    for block in 0..N / 3 {
        let offset = block * 3;
        t.fixed_view_mut::<3, 3>(offset, offset).copy_from(r);
    }
    t
}

/// Local stiffness of a 3D beam-column
///
/// Euler-Bernoulli unless the section carries shear areas, in which case the
/// bending terms include the Timoshenko shear flexibility in that plane.
pub fn member_local_stiffness(p: &FrameProperties, length: f64) -> Mat12 {
    let l = length;
    let l2 = l * l;
    let l3 = l2 * l;

    let ea_l = p.e * p.a / l;
    let gj_l = p.g * p.j / l;

    // Bending in the local x-y plane (about z), shear along y
    let py = p.shear_ratio(p.iz, p.asy, l);
    let z11 = 12.0 * p.e * p.iz / (l3 * (1.0 + py));
    let z12 = 6.0 * p.e * p.iz / (l2 * (1.0 + py));
    let z22 = (4.0 + py) * p.e * p.iz / (l * (1.0 + py));
    let z24 = (2.0 - py) * p.e * p.iz / (l * (1.0 + py));

    // Bending in the local x-z plane (about y), shear along z
    let pz = p.shear_ratio(p.iy, p.asz, l);
    let y11 = 12.0 * p.e * p.iy / (l3 * (1.0 + pz));
    let y12 = 6.0 * p.e * p.iy / (l2 * (1.0 + pz));
    let y22 = (4.0 + pz) * p.e * p.iy / (l * (1.0 + pz));
    let y24 = (2.0 - pz) * p.e * p.iy / (l * (1.0 + pz));

    #[rustfmt::skip]
    let data = [
        ea_l,  0.0,   0.0,   0.0,   0.0,   0.0,   -ea_l, 0.0,   0.0,   0.0,   0.0,   0.0,
        0.0,   z11,   0.0,   0.0,   0.0,   z12,   0.0,   -z11,  0.0,   0.0,   0.0,   z12,
        0.0,   0.0,   y11,   0.0,   -y12,  0.0,   0.0,   0.0,   -y11,  0.0,   -y12,  0.0,
        0.0,   0.0,   0.0,   gj_l,  0.0,   0.0,   0.0,   0.0,   0.0,   -gj_l, 0.0,   0.0,
        0.0,   0.0,   -y12,  0.0,   y22,   0.0,   0.0,   0.0,   y12,   0.0,   y24,   0.0,
        0.0,   z12,   0.0,   0.0,   0.0,   z22,   0.0,   -z12,  0.0,   0.0,   0.0,   z24,
        -ea_l, 0.0,   0.0,   0.0,   0.0,   0.0,   ea_l,  0.0,   0.0,   0.0,   0.0,   0.0,
        0.0,   -z11,  0.0,   0.0,   0.0,   -z12,  0.0,   z11,   0.0,   0.0,   0.0,   -z12,
        0.0,   0.0,   -y11,  0.0,   y12,   0.0,   0.0,   0.0,   y11,   0.0,   y12,   0.0,
        0.0,   0.0,   0.0,   -gj_l, 0.0,   0.0,   0.0,   0.0,   0.0,   gj_l,  0.0,   0.0,
        0.0,   0.0,   -y12,  0.0,   y24,   0.0,   0.0,   0.0,   y12,   0.0,   y22,   0.0,
        0.0,   z12,   0.0,   0.0,   0.0,   z24,   0.0,   -z12,  0.0,   0.0,   0.0,   z22,
    ];

    Mat12::from_row_slice(&data)
}

/// Axial-only stiffness of a truss laid out in the 12-DOF frame ordering
pub fn truss_local_stiffness(e: f64, a: f64, length: f64) -> Mat12 {
    let ea_l = e * a / length;
    let mut k = Mat12::zeros();
    k[(0, 0)] = ea_l;
    k[(6, 6)] = ea_l;
    k[(0, 6)] = -ea_l;
    k[(6, 0)] = -ea_l;
    k
}

/// Geometric stiffness of a beam-column under axial force `p` (tension positive)
pub fn member_geometric_stiffness(p: f64, a: f64, iy: f64, iz: f64, length: f64) -> Mat12 {
    if p.abs() < 1e-10 {
        return Mat12::zeros();
    }

    let l = length;
    let p_l = p / l;
    let v = 6.0 * p_l / 5.0;
    let c = p / 10.0;
    let r1 = 2.0 * p * l / 15.0;
    let r2 = -p * l / 30.0;
    let t = p_l * (iy + iz) / a;

    #[rustfmt::skip]
    let data = [
        p_l,  0.0,  0.0,  0.0,  0.0,  0.0,  -p_l, 0.0,  0.0,  0.0,  0.0,  0.0,
        0.0,  v,    0.0,  0.0,  0.0,  c,    0.0,  -v,   0.0,  0.0,  0.0,  c,
        0.0,  0.0,  v,    0.0,  -c,   0.0,  0.0,  0.0,  -v,   0.0,  -c,   0.0,
        0.0,  0.0,  0.0,  t,    0.0,  0.0,  0.0,  0.0,  0.0,  -t,   0.0,  0.0,
        0.0,  0.0,  -c,   0.0,  r1,   0.0,  0.0,  0.0,  c,    0.0,  r2,   0.0,
        0.0,  c,    0.0,  0.0,  0.0,  r1,   0.0,  -c,   0.0,  0.0,  0.0,  r2,
        -p_l, 0.0,  0.0,  0.0,  0.0,  0.0,  p_l,  0.0,  0.0,  0.0,  0.0,  0.0,
        0.0,  -v,   0.0,  0.0,  0.0,  -c,   0.0,  v,    0.0,  0.0,  0.0,  -c,
        0.0,  0.0,  -v,   0.0,  c,    0.0,  0.0,  0.0,  v,    0.0,  c,    0.0,
        0.0,  0.0,  0.0,  -t,   0.0,  0.0,  0.0,  0.0,  0.0,  t,    0.0,  0.0,
        0.0,  0.0,  -c,   0.0,  r2,   0.0,  0.0,  0.0,  c,    0.0,  r1,   0.0,
        0.0,  c,    0.0,  0.0,  0.0,  r2,   0.0,  -c,   0.0,  0.0,  0.0,  r1,
    ];

    Mat12::from_row_slice(&data)
}

/// Geometric stiffness of a truss: string stiffness P/L on the transverse translations
pub fn truss_geometric_stiffness(p: f64, length: f64) -> Mat12 {
    let p_l = p / length;
    let mut kg = Mat12::zeros();
    for dof in [1, 2] {
        kg[(dof, dof)] = p_l;
        kg[(dof + 6, dof + 6)] = p_l;
        kg[(dof, dof + 6)] = -p_l;
        kg[(dof + 6, dof)] = -p_l;
    }
    kg
}

/// Consistent mass of a beam-column from the cubic bending shape functions
pub fn member_consistent_mass(p: &FrameProperties, length: f64) -> Mat12 {
    let l = length;
    let m = p.rho * p.a * l;
    let ax = m / 3.0;
    let ax2 = m / 6.0;
    let tor = p.rho * (p.iy + p.iz) * l / 3.0;
    let tor2 = tor / 2.0;

    let t1 = 13.0 * m / 35.0;
    let t2 = 9.0 * m / 70.0;
    let c1 = 11.0 * m * l / 210.0;
    let c2 = 13.0 * m * l / 420.0;
    let r1 = m * l * l / 105.0;
    let r2 = -m * l * l / 140.0;

    #[rustfmt::skip]
    let data = [
        ax,   0.0,  0.0,  0.0,  0.0,  0.0,  ax2,  0.0,  0.0,  0.0,  0.0,  0.0,
        0.0,  t1,   0.0,  0.0,  0.0,  c1,   0.0,  t2,   0.0,  0.0,  0.0,  -c2,
        0.0,  0.0,  t1,   0.0,  -c1,  0.0,  0.0,  0.0,  t2,   0.0,  c2,   0.0,
        0.0,  0.0,  0.0,  tor,  0.0,  0.0,  0.0,  0.0,  0.0,  tor2, 0.0,  0.0,
        0.0,  0.0,  -c1,  0.0,  r1,   0.0,  0.0,  0.0,  -c2,  0.0,  r2,   0.0,
        0.0,  c1,   0.0,  0.0,  0.0,  r1,   0.0,  c2,   0.0,  0.0,  0.0,  r2,
        ax2,  0.0,  0.0,  0.0,  0.0,  0.0,  ax,   0.0,  0.0,  0.0,  0.0,  0.0,
        0.0,  t2,   0.0,  0.0,  0.0,  c2,   0.0,  t1,   0.0,  0.0,  0.0,  -c1,
        0.0,  0.0,  t2,   0.0,  -c2,  0.0,  0.0,  0.0,  t1,   0.0,  c1,   0.0,
        0.0,  0.0,  0.0,  tor2, 0.0,  0.0,  0.0,  0.0,  0.0,  tor,  0.0,  0.0,
        0.0,  0.0,  c2,   0.0,  r2,   0.0,  0.0,  0.0,  c1,   0.0,  r1,   0.0,
        0.0,  -c2,  0.0,  0.0,  0.0,  r2,   0.0,  -c1,  0.0,  0.0,  0.0,  r1,
    ];

    Mat12::from_row_slice(&data)
}

/// Consistent mass of a truss (linear interpolation in all three translations)
pub fn truss_consistent_mass(rho: f64, a: f64, length: f64) -> Mat12 {
    let m = rho * a * length;
    let mut mass = Mat12::zeros();
    for dof in 0..3 {
        mass[(dof, dof)] = m / 3.0;
        mass[(dof + 6, dof + 6)] = m / 3.0;
        mass[(dof, dof + 6)] = m / 6.0;
        mass[(dof + 6, dof)] = m / 6.0;
    }
    mass
}

/// Condense released DOFs out of a local stiffness and its fixed-end reactions
///
/// Each released DOF is eliminated in turn, so the result is the statically
/// condensed matrix with the released rows and columns set to exactly zero.
/// A released DOF whose pivot has already vanished (both ends released in
/// torsion, say) is simply zeroed.
fn condense(k: &Mat12, fer: &Vec12, releases: &[bool; 12]) -> (Mat12, Vec12) {
    let mut k = *k;
    let mut fer = *fer;
    let scale = (0..12).map(|i| k[(i, i)].abs()).fold(0.0, f64::max);

    for r in (0..12).filter(|&r| releases[r]) {
        let pivot = k[(r, r)];
        if pivot.abs() > 1e-12 * scale {
            let col = k.column(r).into_owned();
            for i in (0..12).filter(|&i| i != r) {
                fer[i] -= col[i] * fer[r] / pivot;
                for j in (0..12).filter(|&j| j != r) {
                    k[(i, j)] -= col[i] * col[j] / pivot;
                }
            }
        }
        k.row_mut(r).fill(0.0);
        k.column_mut(r).fill(0.0);
        fer[r] = 0.0;
    }

    (k, fer)
}

/// Apply end releases to a local stiffness matrix
pub fn apply_releases(k: &Mat12, releases: &[bool; 12]) -> Mat12 {
    if !releases.iter().any(|&r| r) {
        return *k;
    }
    condense(k, &Vec12::zeros(), releases).0
}

/// Apply end releases to a fixed-end reaction vector using the uncondensed stiffness
pub fn apply_fer_releases(fer: &Vec12, k: &Mat12, releases: &[bool; 12]) -> Vec12 {
    if !releases.iter().any(|&r| r) {
        return *fer;
    }
    condense(k, fer, releases).1
}

/// Largest absolute difference between a matrix and its transpose
pub fn asymmetry<const N: usize>(m: &SMatrix<f64, N, N>) -> f64 {
    (m - m.transpose()).abs().max()
}
