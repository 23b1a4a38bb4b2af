//! Analysis options, requests and the top-level driver

pub mod modal;
pub mod spectrum;
pub mod static_solver;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use spectrum::{cqc_coefficient, SpectralAcceleration, SpectrumCurve};

use crate::assembly::AssembledModel;
use crate::error::{SolverError, SolverResult};
use crate::model::StructuralModel;
use crate::results::{AnalysisType, CombinationRule, Direction, ModalResult, SpectrumResult, StaticAnalysis};

/// Cooperative cancellation shared between a caller and running analyses
///
/// Checked between load cases and between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Err(Cancelled) once `cancel` has been called
    pub fn check(&self) -> SolverResult<()> {
        if self.is_cancelled() {
            Err(SolverError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Options for static analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticOptions {
    /// Type of analysis
    pub analysis_type: AnalysisType,
    /// Maximum iterations for P-Delta analysis
    pub max_iterations: usize,
    /// P-Delta convergence tolerance on the relative displacement change
    pub tolerance: f64,
    /// Load cases and combinations to solve (None = all)
    pub targets: Option<Vec<String>>,
    /// Only solve combinations carrying one of these tags (None = all)
    pub combo_tags: Option<Vec<String>>,
    /// Relative tolerance of the equilibrium self-check
    pub equilibrium_tolerance: f64,
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            analysis_type: AnalysisType::Linear,
            max_iterations: 30,
            tolerance: 1e-6,
            targets: None,
            combo_tags: None,
            equilibrium_tolerance: 1e-6,
        }
    }
}

impl StaticOptions {
    /// Create options for linear analysis
    pub fn linear() -> Self {
        Self::default()
    }

    /// Create options for P-Delta analysis
    pub fn p_delta() -> Self {
        Self {
            analysis_type: AnalysisType::PDelta,
            ..Self::default()
        }
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Set convergence tolerance
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Restrict the run to the named cases and combinations
    pub fn with_targets<S: Into<String>>(mut self, targets: impl IntoIterator<Item = S>) -> Self {
        self.targets = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    /// Filter by combo tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.combo_tags = Some(tags);
        self
    }

    pub fn with_equilibrium_tolerance(mut self, tol: f64) -> Self {
        self.equilibrium_tolerance = tol;
        self
    }
}

/// Options for modal analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalOptions {
    /// Number of modes to extract
    pub num_modes: usize,
    /// Extract modes until the cumulative mass ratio of every direction
    /// with mass reaches this target (e.g. 0.9)
    pub mass_participation: Option<f64>,
    /// Upper bound on the mode count when a participation target is set
    pub max_modes: usize,
    /// Maximum subspace iterations
    pub max_iterations: usize,
    /// Relative eigenvalue change at convergence
    pub tolerance: f64,
    /// Load cases whose nodal masses are included (None = all)
    pub mass_cases: Option<Vec<String>>,
}

impl Default for ModalOptions {
    fn default() -> Self {
        Self {
            num_modes: 12,
            mass_participation: None,
            max_modes: 200,
            max_iterations: 200,
            tolerance: 1e-8,
            mass_cases: None,
        }
    }
}

impl ModalOptions {
    /// Extract a fixed number of modes
    pub fn new(num_modes: usize) -> Self {
        Self {
            num_modes,
            ..Self::default()
        }
    }

    /// Extract modes until the cumulative mass ratio reaches `target`
    pub fn with_mass_participation(mut self, target: f64) -> Self {
        self.mass_participation = Some(target);
        self
    }

    pub fn with_max_modes(mut self, max_modes: usize) -> Self {
        self.max_modes = max_modes;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Only count nodal masses of these load cases
    pub fn with_mass_cases<S: Into<String>>(mut self, cases: impl IntoIterator<Item = S>) -> Self {
        self.mass_cases = Some(cases.into_iter().map(Into::into).collect());
        self
    }
}

/// Options for response spectrum analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumOptions {
    /// Direction of the ground excitation
    pub direction: Direction,
    /// Factor applied to every spectral acceleration (e.g. g)
    pub scale: f64,
    /// Modal damping ratio used by CQC
    pub damping: f64,
    /// Combination rules to report
    pub rules: Vec<CombinationRule>,
}

impl Default for SpectrumOptions {
    fn default() -> Self {
        Self {
            direction: Direction::X,
            scale: 1.0,
            damping: 0.05,
            rules: vec![CombinationRule::Srss, CombinationRule::Cqc],
        }
    }
}

impl SpectrumOptions {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_rules(mut self, rules: Vec<CombinationRule>) -> Self {
        self.rules = rules;
        self
    }
}

/// A tabulated spectrum with its options, as sent over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumRequest {
    pub curve: SpectrumCurve,
    #[serde(default)]
    pub options: SpectrumOptions,
}

/// The analyses to run on one model
///
/// A spectrum request implies a modal analysis; default modal options are
/// used when none are given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisRequest {
    pub static_analysis: Option<StaticOptions>,
    pub modal: Option<ModalOptions>,
    pub spectrum: Option<SpectrumRequest>,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            static_analysis: Some(StaticOptions::default()),
            modal: None,
            spectrum: None,
        }
    }
}

/// Everything produced by one `AnalysisRequest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_analysis: Option<StaticAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modal: Option<ModalResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spectrum: Vec<SpectrumResult>,
}

/// Validate the model once and run every requested analysis on it
pub fn run(model: &StructuralModel, request: &AnalysisRequest, cancel: &CancelFlag) -> SolverResult<AnalysisReport> {
    let validated = model.validate()?;
    let assembled = AssembledModel::new(&validated)?;

    let static_analysis = match &request.static_analysis {
        Some(options) => Some(static_solver::solve_assembled(&assembled, options, cancel)?),
        None => None,
    };

    let modal_options = match (&request.modal, &request.spectrum) {
        (Some(options), _) => Some(options.clone()),
        (None, Some(_)) => Some(ModalOptions::default()),
        (None, None) => None,
    };
    let modal = match modal_options {
        Some(options) => Some(modal::extract(&assembled, &options, cancel)?),
        None => None,
    };

    let spectrum = match (&request.spectrum, &modal) {
        (Some(spectrum), Some(modes)) => {
            spectrum::combine(&assembled, modes, &spectrum.curve, &spectrum.options, cancel)?
        }
        _ => Vec::new(),
    };

    Ok(AnalysisReport {
        static_analysis,
        modal,
        spectrum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(flag.check().is_ok());
        clone.cancel();
        assert!(matches!(flag.check(), Err(SolverError::Cancelled)));
    }

    #[test]
    fn test_request_defaults_from_empty_json() {
        let request: AnalysisRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.static_analysis, Some(StaticOptions::linear()));
        assert!(request.modal.is_none());

        let request: AnalysisRequest =
            serde_json::from_str(r#"{"static_analysis": {"analysis_type": "p_delta", "max_iterations": 5}}"#).unwrap();
        let options = request.static_analysis.unwrap();
        assert_eq!(options.analysis_type, AnalysisType::PDelta);
        assert_eq!(options.max_iterations, 5);
        assert_eq!(options.tolerance, 1e-6);
    }
}
