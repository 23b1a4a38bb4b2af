//! Natural frequencies and mode shapes by subspace iteration
//!
//! Solves K φ = ω² M φ on the free DOFs. A block of q > p trial vectors is
//! driven towards the lowest eigenspace with the single factorization of
//! K, and the small projected problem is solved densely each iteration.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, SymmetricEigen};
use nalgebra_sparse::CsrMatrix;

use super::static_solver::factorize;
use super::{CancelFlag, ModalOptions};
use crate::assembly::AssembledModel;
use crate::elements::Dof;
use crate::error::{SolverError, SolverResult};
use crate::math::{SkylineCholesky, Vector};
use crate::results::{Direction, ModalResult, Mode};
use crate::validation::ValidatedModel;

/// Relative gap below which two frequencies count as equal
const FREQUENCY_TIE: f64 = 1e-9;

/// Assemble a validated model and extract its modes
pub fn solve(validated: &ValidatedModel, options: &ModalOptions, cancel: &CancelFlag) -> SolverResult<ModalResult> {
    let assembled = AssembledModel::new(validated)?;
    extract(&assembled, options, cancel)
}

/// Extract modes of an assembled model
pub fn extract(assembled: &AssembledModel<'_>, options: &ModalOptions, cancel: &CancelFlag) -> SolverResult<ModalResult> {
    if let Some(cases) = &options.mass_cases {
        let known = &assembled.validated().model().load_cases;
        if let Some(missing) = cases.iter().find(|name| !known.contains_key(name.as_str())) {
            return Err(SolverError::LoadCaseNotFound(missing.clone()));
        }
    }
    let mass = assembled.mass_matrix(options.mass_cases.as_deref());
    let (m_ff, _) = assembled.reduce(&mass);
    let m_diag = diagonal(&m_ff);
    let n_mass = m_diag.iter().filter(|&&m| m > 0.0).count();
    if n_mass == 0 {
        return Err(SolverError::InvalidInput("Model has no mass on its free DOFs".to_string()));
    }
    if options.num_modes == 0 {
        return Err(SolverError::InvalidInput("At least one mode must be requested".to_string()));
    }

    let factor = factorize(assembled, &assembled.k_ff, || "modal stiffness".to_string())?;
    let influence = influence_vectors(assembled);
    let total_mass = [0usize, 1, 2].map(|d| influence[d].dot(&(&m_ff * &influence[d])));

    let problem = Problem {
        factor: &factor,
        m_ff: &m_ff,
        k_diag: diagonal(&assembled.k_ff),
        m_diag,
        n_mass,
    };

    let limit = options.max_modes.max(options.num_modes).min(n_mass);
    let mut p = options.num_modes.min(n_mass);
    loop {
        let pairs = problem.subspace_iteration(p, options, cancel)?;
        let mut result = build_modes(assembled, &m_ff, &influence, total_mass, pairs);

        let Some(target) = options.mass_participation else {
            return Ok(result);
        };
        let reached = result.modes.iter().position(|mode| {
            (0..3).all(|d| total_mass[d] <= 0.0 || mode.cumulative_ratio[d] >= target)
        });
        match reached {
            Some(index) => {
                result.modes.truncate(index + 1);
                log::info!("Mass participation {} reached with {} modes", target, index + 1);
                return Ok(result);
            }
            None if p >= limit => {
                log::warn!(
                    "Mass participation {} not reached with {} modes (cumulative {:?})",
                    target,
                    p,
                    result.cumulative_ratio()
                );
                return Ok(result);
            }
            None => p = (2 * p).min(limit),
        }
    }
}

/// Converged eigenpairs of the reduced problem, ascending
struct Eigenpairs {
    values: Vec<f64>,
    vectors: DMatrix<f64>,
    iterations: usize,
}

struct Problem<'f> {
    factor: &'f SkylineCholesky,
    m_ff: &'f CsrMatrix<f64>,
    k_diag: Vec<f64>,
    m_diag: Vec<f64>,
    n_mass: usize,
}

impl Problem<'_> {
    /// Lowest `p` eigenpairs
    fn subspace_iteration(&self, p: usize, options: &ModalOptions, cancel: &CancelFlag) -> SolverResult<Eigenpairs> {
        let q = (2 * p).min(p + 8).min(self.n_mass);
        let mut x = self.start_vectors(q);
        let mut previous: Option<Vec<f64>> = None;
        let mut residual = f64::INFINITY;

        for iteration in 1..=options.max_iterations {
            cancel.check()?;

            let y = self.m_ff * &x;
            let x_bar = self.factor.solve_many(&y);
            // K X̄ = Y, so X̄ᵀ K X̄ = X̄ᵀ Y
            let k_r = symmetric(x_bar.transpose() * &y);
            let m_r = symmetric(x_bar.transpose() * (self.m_ff * &x_bar));
            let (values, q_mat) = projected_eigen(k_r, m_r, iteration)?;
            x = x_bar * q_mat;

            if let Some(previous) = &previous {
                residual = values
                    .iter()
                    .zip(previous)
                    .take(p)
                    .map(|(new, old)| (new - old).abs() / new.abs().max(f64::MIN_POSITIVE))
                    .fold(0.0, f64::max);
                log::debug!("Subspace iteration {}: relative eigenvalue change {:.3e}", iteration, residual);
                if residual <= options.tolerance {
                    log::info!("Subspace iteration converged in {} iterations (q = {})", iteration, q);
                    return Ok(Eigenpairs {
                        values: values[..p].to_vec(),
                        vectors: x.columns(0, p).into_owned(),
                        iterations: iteration,
                    });
                }
            }
            previous = Some(values);
        }

        Err(SolverError::Convergence {
            context: format!("Subspace iteration for {} modes", p),
            iterations: options.max_iterations,
            residual,
        })
    }

    /// Mass diagonal first, then unit vectors at the smallest k/m ratios
    fn start_vectors(&self, q: usize) -> DMatrix<f64> {
        let n = self.m_diag.len();
        let mut x = DMatrix::zeros(n, q);
        for (i, &m) in self.m_diag.iter().enumerate() {
            x[(i, 0)] = m;
        }

        let mut candidates: Vec<(f64, usize)> = self
            .m_diag
            .iter()
            .enumerate()
            .filter(|(_, &m)| m > 0.0)
            .map(|(i, &m)| (self.k_diag[i] / m, i))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (column, &(_, i)) in (1..q).zip(&candidates) {
            x[(i, column)] = 1.0;
        }
        x
    }
}

/// Solve K_r v = λ M_r v through the Cholesky factor of M_r
///
/// Returns the eigenvalues ascending and the M_r-orthonormal vectors.
fn projected_eigen(k_r: DMatrix<f64>, m_r: DMatrix<f64>, iteration: usize) -> SolverResult<(Vec<f64>, DMatrix<f64>)> {
    let lost_rank = || SolverError::Convergence {
        context: "Subspace iteration (trial vectors became dependent)".to_string(),
        iterations: iteration,
        residual: f64::NAN,
    };

    let l = m_r.cholesky().ok_or_else(lost_rank)?.l();
    let l_inv_k = l.solve_lower_triangular(&k_r).ok_or_else(lost_rank)?;
    let a = l.solve_lower_triangular(&l_inv_k.transpose()).ok_or_else(lost_rank)?;
    let eigen = SymmetricEigen::new(symmetric(a));
    let vectors = l.transpose().solve_upper_triangular(&eigen.eigenvectors).ok_or_else(lost_rank)?;

    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

    let values = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let sorted = DMatrix::from_fn(vectors.nrows(), order.len(), |r, c| vectors[(r, order[c])]);
    Ok((values, sorted))
}

fn symmetric(a: DMatrix<f64>) -> DMatrix<f64> {
    (&a + a.transpose()) * 0.5
}

fn diagonal(a: &CsrMatrix<f64>) -> Vec<f64> {
    let mut diag = vec![0.0; a.nrows()];
    for (i, j, &v) in a.triplet_iter() {
        if i == j {
            diag[i] += v;
        }
    }
    diag
}

/// Rigid-body translation vectors of the free DOFs in X, Y and Z
fn influence_vectors(assembled: &AssembledModel<'_>) -> [Vector; 3] {
    let dof_map = &assembled.dof_map;
    Direction::ALL.map(|direction| {
        let mut r = Vector::zeros(assembled.size());
        let dof = Dof::ALL[direction.index()];
        for node in dof_map.nodes() {
            if let Some(i) = dof_map.index(node, dof) {
                r[i] = 1.0;
            }
        }
        assembled.partition.gather_free(&r)
    })
}

/// Normalize, orient and order the eigenvectors, then add participation data
fn build_modes(
    assembled: &AssembledModel<'_>,
    m_ff: &CsrMatrix<f64>,
    influence: &[Vector; 3],
    total_mass: [f64; 3],
    pairs: Eigenpairs,
) -> ModalResult {
    struct Candidate {
        lambda: f64,
        phi: Vector,
        dominant: usize,
    }

    let mut candidates: Vec<Candidate> = pairs
        .vectors
        .column_iter()
        .zip(&pairs.values)
        .map(|(column, &lambda)| {
            let mut phi: Vector = column.into_owned();
            let norm = phi.dot(&(m_ff * &phi)).sqrt();
            if norm > 0.0 {
                phi /= norm;
            }
            let dominant = phi.iamax();
            if phi[dominant] < 0.0 {
                phi.neg_mut();
            }
            Candidate { lambda, phi, dominant }
        })
        .collect();

    // Ascending frequency; equal frequencies by the dominant DOF in equation order
    let free = assembled.partition.free();
    candidates.sort_by(|a, b| a.lambda.total_cmp(&b.lambda));
    let mut start = 0;
    while start < candidates.len() {
        let base = candidates[start].lambda.abs();
        let end = (start..candidates.len())
            .find(|&k| (candidates[k].lambda - candidates[start].lambda).abs() > FREQUENCY_TIE * base)
            .unwrap_or(candidates.len());
        candidates[start..end].sort_by(|a, b| free[a.dominant].cmp(&free[b.dominant]));
        start = end;
    }

    let dof_map = &assembled.dof_map;
    let zeros = Vector::zeros(assembled.partition.fixed().len());
    let mut cumulative = [0.0; 3];
    let modes = candidates
        .into_iter()
        .enumerate()
        .map(|(k, candidate)| {
            let omega = candidate.lambda.max(0.0).sqrt();
            let frequency = omega / (2.0 * std::f64::consts::PI);
            let m_phi = m_ff * &candidate.phi;

            let mut participation = [0.0; 3];
            let mut effective_mass = [0.0; 3];
            let mut mass_ratio = [0.0; 3];
            for d in 0..3 {
                participation[d] = m_phi.dot(&influence[d]);
                effective_mass[d] = participation[d] * participation[d];
                if total_mass[d] > 0.0 {
                    mass_ratio[d] = effective_mass[d] / total_mass[d];
                }
                cumulative[d] += mass_ratio[d];
            }

            let full = assembled.partition.scatter_with(&candidate.phi, &zeros);
            let shape: BTreeMap<String, [f64; 6]> = assembled
                .validated()
                .model()
                .nodes
                .keys()
                .map(|node| (node.clone(), dof_map.node_values(node, &full)))
                .collect();

            let mut rms = [0.0; 3];
            for values in shape.values() {
                for d in 0..3 {
                    rms[d] += values[d] * values[d];
                }
            }
            let dominant_direction = Direction::ALL
                .into_iter()
                .fold(Direction::X, |best, d| if rms[d.index()] > rms[best.index()] { d } else { best });

            Mode {
                number: k + 1,
                omega,
                frequency,
                period: if frequency > 0.0 { 1.0 / frequency } else { f64::INFINITY },
                shape,
                participation,
                effective_mass,
                mass_ratio,
                cumulative_ratio: cumulative,
                dominant_direction,
            }
        })
        .collect();

    ModalResult {
        modes,
        total_mass,
        iterations: pairs.iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Element, Material, Node, Section, Support};
    use crate::loads::NodalMass;
    use crate::model::StructuralModel;
    use approx::assert_relative_eq;

    /// Two springs in series carrying two lumped masses along X
    fn two_mass_chain() -> StructuralModel {
        let mut model = StructuralModel::new();
        model.add_material("Rod", Material::new(1.0e6, 4.0e5, 0.25, 0.0)).unwrap();
        model.add_section("A", Section::axial(1.0)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(1.0, 0.0, 0.0)).unwrap();
        model.add_node("C", Node::new(2.0, 0.0, 0.0)).unwrap();
        model.add_element("AB", Element::truss("A", "B", "Rod", "A")).unwrap();
        model.add_element("BC", Element::truss("B", "C", "Rod", "A")).unwrap();
        model.add_support("A", Support::fixed()).unwrap();
        for node in ["B", "C"] {
            model
                .add_support(node, Support::with_restraints(false, true, true, false, false, false))
                .unwrap();
            model.add_load(NodalMass::new(node, 1.0, "Mass")).unwrap();
        }
        model
    }

    #[test]
    fn test_two_degree_of_freedom_chain() {
        // k = EA/L = 1e6, m = 1: λ = (3 ∓ √5)/2 · k/m
        let result = two_mass_chain().analyze_modal(&ModalOptions::new(2)).unwrap();
        assert_eq!(result.modes.len(), 2);
        let k = 1.0e6;
        assert_relative_eq!(result.modes[0].omega.powi(2), (3.0 - 5f64.sqrt()) / 2.0 * k, max_relative = 1e-8);
        assert_relative_eq!(result.modes[1].omega.powi(2), (3.0 + 5f64.sqrt()) / 2.0 * k, max_relative = 1e-8);
        assert_relative_eq!(result.total_mass[0], 2.0, max_relative = 1e-12);
        assert_relative_eq!(result.cumulative_ratio()[0], 1.0, max_relative = 1e-8);
        assert_eq!(result.modes[0].dominant_direction, Direction::X);
    }

    #[test]
    fn test_largest_component_is_positive() {
        let result = two_mass_chain().analyze_modal(&ModalOptions::new(2)).unwrap();
        for mode in &result.modes {
            let values: Vec<f64> = mode.shape.values().map(|v| v[0]).collect();
            let largest = values.iter().copied().fold(0.0f64, |a, v| if v.abs() > a.abs() { v } else { a });
            assert!(largest > 0.0);
        }
    }

    #[test]
    fn test_mass_participation_target_truncates() {
        let result = two_mass_chain()
            .analyze_modal(&ModalOptions::new(1).with_mass_participation(0.99))
            .unwrap();
        assert_eq!(result.modes.len(), 2);
        assert!(result.cumulative_ratio()[0] >= 0.99);
    }

    #[test]
    fn test_massless_model_is_rejected() {
        let mut model = two_mass_chain();
        model.loads.clear();
        assert!(matches!(
            model.analyze_modal(&ModalOptions::new(1)),
            Err(SolverError::InvalidInput(_))
        ));
    }
}
