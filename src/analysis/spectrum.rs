//! Response spectrum analysis
//!
//! Each mode contributes a peak response Γ φ Sa(T) / ω². Peaks are
//! recovered per mode (displacements, reactions and element end forces) and
//! combined entry by entry with SRSS or CQC. The combined values are
//! magnitudes only; the sign of a response is lost by the combination.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{CancelFlag, SpectrumOptions};
use crate::assembly::AssembledModel;
use crate::elements::Dof;
use crate::error::{SolverError, SolverResult};
use crate::math::{sparse_matvec, Vector};
use crate::recovery::support_reactions;
use crate::results::{CombinationRule, ModalResult, Mode, SpectrumResult};
use crate::validation::ValidatedModel;

/// Spectral acceleration as a function of period
pub trait SpectralAcceleration: Sync {
    fn acceleration(&self, period: f64) -> f64;
}

impl<F> SpectralAcceleration for F
where
    F: Fn(f64) -> f64 + Sync,
{
    fn acceleration(&self, period: f64) -> f64 {
        self(period)
    }
}

/// Tabulated design spectrum: `[period, acceleration]` pairs
///
/// Linear interpolation between points, constant beyond either end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumCurve {
    pub points: Vec<[f64; 2]>,
}

impl SpectrumCurve {
    /// Build a curve; points are sorted by period, which must be distinct
    pub fn new(mut points: Vec<[f64; 2]>) -> SolverResult<Self> {
        if points.is_empty() {
            return Err(SolverError::InvalidInput("Spectrum curve has no points".to_string()));
        }
        if points.iter().flatten().any(|v| !v.is_finite()) || points.iter().any(|p| p[0] < 0.0) {
            return Err(SolverError::InvalidInput(
                "Spectrum periods must be finite and non-negative".to_string(),
            ));
        }
        points.sort_by(|a, b| a[0].total_cmp(&b[0]));
        if points.windows(2).any(|w| w[0][0] == w[1][0]) {
            return Err(SolverError::InvalidInput("Spectrum periods must be distinct".to_string()));
        }
        Ok(Self { points })
    }

    /// Same acceleration at every period
    pub fn constant(acceleration: f64) -> Self {
        Self {
            points: vec![[0.0, acceleration]],
        }
    }
}

impl SpectralAcceleration for SpectrumCurve {
    fn acceleration(&self, period: f64) -> f64 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return 0.0;
        };
        if period <= first[0] {
            return first[1];
        }
        if period >= last[0] {
            return last[1];
        }
        let upper = self.points.partition_point(|p| p[0] <= period);
        let [t1, a1] = self.points[upper - 1];
        let [t2, a2] = self.points[upper];
        a1 + (a2 - a1) * (period - t1) / (t2 - t1)
    }
}

/// CQC cross-modal coefficient for modes with circular frequencies ω_i, ω_j
///
/// Equal frequencies correlate fully, whatever the damping.
pub fn cqc_coefficient(omega_i: f64, omega_j: f64, damping: f64) -> f64 {
    if omega_i <= 0.0 || omega_j <= 0.0 {
        return 0.0;
    }
    let r = omega_j / omega_i;
    if (r - 1.0).abs() <= 1e-9 {
        return 1.0;
    }
    let z2 = damping * damping;
    let numerator = 8.0 * z2 * (1.0 + r) * r.powf(1.5);
    let denominator = (1.0 - r * r).powi(2) + 4.0 * z2 * r * (1.0 + r).powi(2);
    numerator / denominator
}

/// Assemble a validated model and combine the modal peaks
pub fn solve<S>(
    validated: &ValidatedModel,
    modal: &ModalResult,
    spectrum: &S,
    options: &SpectrumOptions,
    cancel: &CancelFlag,
) -> SolverResult<Vec<SpectrumResult>>
where
    S: SpectralAcceleration + ?Sized,
{
    let assembled = AssembledModel::new(validated)?;
    combine(&assembled, modal, spectrum, options, cancel)
}

/// One `SpectrumResult` per requested rule
pub fn combine<S>(
    assembled: &AssembledModel<'_>,
    modal: &ModalResult,
    spectrum: &S,
    options: &SpectrumOptions,
    cancel: &CancelFlag,
) -> SolverResult<Vec<SpectrumResult>>
where
    S: SpectralAcceleration + ?Sized,
{
    if modal.modes.is_empty() {
        return Err(SolverError::InvalidInput("Response spectrum needs at least one mode".to_string()));
    }
    if let Some(mode) = modal.modes.iter().find(|m| m.omega <= 0.0) {
        return Err(SolverError::InvalidInput(format!("Mode {} has no stiffness", mode.number)));
    }

    let direction = options.direction.index();
    let accelerations: Vec<f64> = modal
        .modes
        .iter()
        .map(|m| spectrum.acceleration(m.period) * options.scale)
        .collect();

    let layout = Layout::new(assembled);
    let peaks = modal
        .modes
        .par_iter()
        .zip(&accelerations)
        .map(|(mode, &sa)| {
            cancel.check()?;
            let factor = mode.participation[direction] * sa / (mode.omega * mode.omega);
            Ok(layout.peak_response(assembled, mode, factor))
        })
        .collect::<SolverResult<Vec<Vec<f64>>>>()?;

    let omegas: Vec<f64> = modal.modes.iter().map(|m| m.omega).collect();
    let results = options
        .rules
        .iter()
        .map(|&rule| {
            let combined = combine_peaks(&peaks, &omegas, rule, options.damping);
            log::info!("{} combination of {} modes in {}", rule, peaks.len(), options.direction);
            layout.unpack(&combined, rule, options, accelerations.clone())
        })
        .collect();

    Ok(results)
}

/// Combine per-mode peaks entry by entry
fn combine_peaks(peaks: &[Vec<f64>], omegas: &[f64], rule: CombinationRule, damping: f64) -> Vec<f64> {
    let len = peaks.first().map(Vec::len).unwrap_or(0);
    match rule {
        CombinationRule::Srss => (0..len)
            .map(|e| peaks.iter().map(|p| p[e] * p[e]).sum::<f64>().sqrt())
            .collect(),
        CombinationRule::Cqc => {
            let n = omegas.len();
            let rho: Vec<Vec<f64>> = (0..n)
                .map(|i| (0..n).map(|j| cqc_coefficient(omegas[i], omegas[j], damping)).collect())
                .collect();
            (0..len)
                .map(|e| {
                    let mut sum = 0.0;
                    for i in 0..n {
                        for j in 0..n {
                            sum += rho[i][j] * peaks[i][e] * peaks[j][e];
                        }
                    }
                    sum.abs().sqrt()
                })
                .collect()
        }
    }
}

/// Flat ordering of every combined response quantity
///
/// Displacements of every DOF, then six reactions per supported node, then
/// six end forces per element node.
struct Layout {
    size: usize,
    nodes: Vec<String>,
    supported: Vec<String>,
    elements: Vec<(String, usize)>,
}

impl Layout {
    fn new(assembled: &AssembledModel<'_>) -> Self {
        let supported = assembled
            .validated()
            .model()
            .supports
            .iter()
            .filter(|(_, s)| s.is_supported())
            .map(|(n, _)| n.clone())
            .collect();
        let elements = assembled
            .kernels
            .iter()
            .map(|k| (k.name().to_string(), k.dofs().len() / 6))
            .collect();
        Self {
            size: assembled.size(),
            nodes: assembled.dof_map.nodes().to_vec(),
            supported,
            elements,
        }
    }

    /// Peak responses of one mode scaled by Γ Sa / ω²
    fn peak_response(&self, assembled: &AssembledModel<'_>, mode: &Mode, factor: f64) -> Vec<f64> {
        let mut u = Vector::zeros(self.size);
        for (node, values) in &mode.shape {
            for dof in Dof::ALL {
                if let Some(i) = assembled.dof_map.index(node, dof) {
                    u[i] = factor * values[dof.index()];
                }
            }
        }

        let mut out: Vec<f64> = u.iter().copied().collect();

        let residual = sparse_matvec(&assembled.stiffness, &u);
        let reactions = support_reactions(assembled, &u, &residual);
        for node in &self.supported {
            out.extend(reactions.get(node).map(|r| r.as_array()).unwrap_or_default());
        }

        for kernel in &assembled.kernels {
            for end in kernel.end_forces(&u, None, None) {
                out.extend(end);
            }
        }
        out
    }

    fn unpack(&self, combined: &[f64], rule: CombinationRule, options: &SpectrumOptions, sa: Vec<f64>) -> SpectrumResult {
        let six = |offset: usize| -> [f64; 6] {
            let mut v = [0.0; 6];
            v.copy_from_slice(&combined[offset..offset + 6]);
            v
        };

        let displacements = self
            .nodes
            .iter()
            .enumerate()
            .map(|(p, node)| (node.clone(), six(6 * p)))
            .collect();
        let mut offset = self.size;
        let reactions = self
            .supported
            .iter()
            .map(|node| {
                let values = six(offset);
                offset += 6;
                (node.clone(), values)
            })
            .collect();
        let element_forces = self
            .elements
            .iter()
            .map(|(name, ends)| {
                let values = (0..*ends).map(|e| six(offset + 6 * e)).collect();
                offset += 6 * ends;
                (name.clone(), values)
            })
            .collect();

        SpectrumResult {
            rule,
            damping: options.damping,
            direction: options.direction,
            spectral_accelerations: sa,
            displacements,
            reactions,
            element_forces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cqc_coefficient() {
        assert_relative_eq!(cqc_coefficient(10.0, 10.0, 0.05), 1.0);
        assert_relative_eq!(cqc_coefficient(10.0, 10.0, 0.0), 1.0);
        assert_relative_eq!(cqc_coefficient(10.0, 20.0, 0.0), 0.0);
        // Symmetric in i, j
        assert_relative_eq!(
            cqc_coefficient(10.0, 13.0, 0.05),
            cqc_coefficient(13.0, 10.0, 0.05),
            max_relative = 1e-12
        );
        assert!(cqc_coefficient(10.0, 100.0, 0.05) < 1e-3);
    }

    #[test]
    fn test_curve_is_clamped_and_interpolated() {
        let curve = SpectrumCurve::new(vec![[1.0, 2.0], [0.2, 4.0], [2.0, 1.0]]).unwrap();
        assert_relative_eq!(curve.acceleration(0.0), 4.0);
        assert_relative_eq!(curve.acceleration(0.6), 3.0);
        assert_relative_eq!(curve.acceleration(1.5), 1.5);
        assert_relative_eq!(curve.acceleration(10.0), 1.0);
        assert!(SpectrumCurve::new(vec![[1.0, 2.0], [1.0, 3.0]]).is_err());
        assert!(SpectrumCurve::new(Vec::new()).is_err());
    }

    #[test]
    fn test_closure_spectrum() {
        let flat = |_: f64| 3.5;
        assert_relative_eq!(flat.acceleration(0.7), 3.5);
    }

    #[test]
    fn test_srss_and_cqc_of_separated_modes() {
        let peaks = vec![vec![3.0, -1.0], vec![4.0, 2.0]];
        let omegas = [1.0, 50.0];
        let srss = combine_peaks(&peaks, &omegas, CombinationRule::Srss, 0.05);
        let cqc = combine_peaks(&peaks, &omegas, CombinationRule::Cqc, 0.05);
        assert_relative_eq!(srss[0], 5.0);
        assert_relative_eq!(cqc[0], srss[0], max_relative = 1e-3);
        assert_relative_eq!(cqc[1], srss[1], max_relative = 1e-3);
    }
}
