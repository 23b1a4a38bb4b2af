//! Frame Solver - 3D structural analysis core
//!
//! Analyzes 3D models of trusses, beam-columns and flat shells using the
//! PyNite axis conventions (Y up, 6 DOF per node), supporting:
//! - Linear static analysis of load cases and combinations
//! - P-Delta (second order) analysis
//! - Modal analysis by subspace iteration with mass participation
//! - Response spectrum analysis with SRSS and CQC combination
//!
//! The model is plain serializable data. Analysis validates it, freezes a
//! snapshot, assembles sparse matrices once and never mutates the input.
//!
//! ## Example
//! ```rust
//! use frame_solver::prelude::*;
//!
//! let mut model = StructuralModel::new();
//!
//! // Add material
//! model.add_material("Steel", Material::new(200e9, 77e9, 0.3, 7850.0)).unwrap();
//!
//! // Add section
//! model.add_section("W12x26", Section::new(7.65e-3, 204e-6, 17.3e-6, 0.3e-6)).unwrap();
//!
//! // Add nodes
//! model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
//! model.add_node("N2", Node::new(10.0, 0.0, 0.0)).unwrap();
//!
//! // Add element
//! model.add_element("M1", Element::beam("N1", "N2", "Steel", "W12x26")).unwrap();
//!
//! // Add supports
//! model.add_support("N1", Support::fixed()).unwrap();
//!
//! // Add loads
//! model.add_load(NodeLoad::force("N2", 0.0, -10000.0, 0.0, "Dead")).unwrap();
//!
//! // Analyze
//! let results = model.analyze_linear().unwrap();
//!
//! // Get results
//! let displacement = results.node_displacement("N2", "Dead").unwrap();
//! assert!(displacement.dy < 0.0);
//! ```

pub mod analysis;
pub mod assembly;
pub mod elements;
pub mod error;
pub mod loads;
pub mod math;
pub mod model;
pub mod recovery;
pub mod results;
pub mod validation;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{
        AnalysisReport, AnalysisRequest, CancelFlag, ModalOptions, SpectralAcceleration, SpectrumCurve,
        SpectrumOptions, SpectrumRequest, StaticOptions,
    };
    pub use crate::elements::{Dof, Element, ElementReleases, ElementType, Material, Node, Section, Support};
    pub use crate::error::{NumericalAnomaly, SolverError, SolverResult, ValidationError};
    pub use crate::loads::{
        DistributedLoad, Load, LoadCase, LoadCombination, LoadDirection, NodalMass, NodeLoad, PointLoad, SurfaceLoad,
    };
    pub use crate::model::StructuralModel;
    pub use crate::results::{
        AnalysisType, CombinationRule, Direction, ElementForces, MemberForces, ModalResult, Mode, NodeDisplacement,
        Reactions, ShellStress, SpectrumResult, StaticAnalysis, StaticResult,
    };
}
