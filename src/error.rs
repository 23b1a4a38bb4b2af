//! Error types for the structural solver

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::elements::Dof;

/// A single DOF identified by node name, used to point at the source of a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DofLabel {
    pub node: String,
    pub dof: Dof,
}

impl DofLabel {
    pub fn new(node: &str, dof: Dof) -> Self {
        Self {
            node: node.to_string(),
            dof,
        }
    }
}

impl fmt::Display for DofLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.dof)
    }
}

/// One violated model invariant found by the validator
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Model has no nodes")]
    NoNodes,

    #[error("Model has no elements")]
    NoElements,

    #[error("Model has no supports")]
    NoSupports,

    #[error("Element '{element}' references missing node '{node}'")]
    MissingNode { element: String, node: String },

    #[error("Element '{element}' references missing material '{material}'")]
    MissingMaterial { element: String, material: String },

    #[error("Element '{element}' references missing section '{section}'")]
    MissingSection { element: String, section: String },

    #[error("Element '{element}' expects {expected} nodes but has {found}")]
    WrongNodeCount {
        element: String,
        expected: usize,
        found: usize,
    },

    #[error("Element '{element}' connects node '{node}' to itself")]
    RepeatedNode { element: String, node: String },

    #[error("Element '{element}' has zero length")]
    ZeroLength { element: String },

    #[error("Element '{element}' has a degenerate shell geometry")]
    DegenerateShell { element: String },

    #[error("Element '{element}' needs a positive section {property} (got {value})")]
    InvalidSection {
        element: String,
        property: String,
        value: f64,
    },

    #[error("Material '{material}' has invalid {property} = {value}")]
    InvalidMaterial {
        material: String,
        property: String,
        value: f64,
    },

    #[error("Node '{node}' is not connected to any element")]
    DisconnectedNode { node: String },

    #[error("Support references missing node '{node}'")]
    SupportOnMissingNode { node: String },

    #[error("Node '{node}' declares {dof} both fixed and as a spring")]
    ConflictingSupport { node: String, dof: Dof },

    #[error("Node '{node}' has a non-positive spring stiffness on {dof}: {value}")]
    InvalidSpring { node: String, dof: Dof, value: f64 },

    #[error("Load references missing node '{node}'")]
    LoadOnMissingNode { node: String },

    #[error("Load references missing element '{element}'")]
    LoadOnMissingElement { element: String },

    #[error("Load of type {load} cannot be applied to element '{element}'")]
    IncompatibleLoad { element: String, load: String },

    #[error("Load on element '{element}' lies outside its span ({x1} to {x2}, length {length})")]
    LoadOutsideSpan {
        element: String,
        x1: f64,
        x2: f64,
        length: f64,
    },

    #[error("Moment on node '{node}' has no rotational stiffness to resist it (truss-only node)")]
    MomentOnTrussNode { node: String },

    #[error("Nodal mass on '{node}' is negative")]
    NegativeMass { node: String },

    #[error("Load references missing load case '{case}'")]
    UnknownLoadCase { case: String },

    #[error("Combination '{combination}' references missing load case '{case}'")]
    UnknownCombinationCase { combination: String, case: String },

    #[error("Combination '{0}' has the same name as a load case")]
    CombinationNameClash(String),
}

/// Main error type for analysis operations
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Model failed validation with {} issue(s): {}", .0.len(), join_issues(.0))]
    Validation(Vec<ValidationError>),

    #[error("Structure is unstable ({context}) at {}", join_dofs(.dofs))]
    Instability { context: String, dofs: Vec<DofLabel> },

    #[error("{context} did not converge after {iterations} iterations (residual {residual:.3e})")]
    Convergence {
        context: String,
        iterations: usize,
        residual: f64,
    },

    #[error("Node '{0}' not found in model")]
    NodeNotFound(String),

    #[error("Element '{0}' not found in model")]
    ElementNotFound(String),

    #[error("Load case or combination '{0}' not found")]
    LoadCaseNotFound(String),

    #[error("Duplicate name '{0}' already exists")]
    DuplicateName(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Analysis was cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SolverError {
    /// The validation issues, when this is a validation failure
    pub fn validation_issues(&self) -> Option<&[ValidationError]> {
        match self {
            SolverError::Validation(issues) => Some(issues),
            _ => None,
        }
    }
}

fn join_issues(issues: &[ValidationError]) -> String {
    issues
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_dofs(dofs: &[DofLabel]) -> String {
    if dofs.is_empty() {
        return "unknown DOF".to_string();
    }
    dofs.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for analysis operations
pub type SolverResult<T> = Result<T, SolverError>;

/// Non-fatal numerical warnings attached to results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumericalAnomaly {
    /// Reactions do not balance the applied loads
    EquilibriumImbalance {
        load_case: String,
        component: String,
        imbalance: f64,
        tolerance: f64,
    },
    /// Ratio of largest to smallest Cholesky pivot is suspiciously large
    IllConditioned { pivot_ratio: f64 },
}

impl fmt::Display for NumericalAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericalAnomaly::EquilibriumImbalance {
                load_case,
                component,
                imbalance,
                tolerance,
            } => write!(
                f,
                "'{}': {} out of balance by {:.3e} (tolerance {:.3e})",
                load_case, component, imbalance, tolerance
            ),
            NumericalAnomaly::IllConditioned { pivot_ratio } => {
                write!(f, "stiffness matrix is ill-conditioned (pivot ratio {:.3e})", pivot_ratio)
            }
        }
    }
}
