//! Structural model - the serializable input of every analysis

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{self, AnalysisReport, AnalysisRequest, CancelFlag, ModalOptions, StaticOptions};
use crate::elements::{Element, Material, Node, Section, Support};
use crate::error::{SolverError, SolverResult};
use crate::loads::{Load, LoadCase, LoadCombination};
use crate::results::{ModalResult, StaticAnalysis};
use crate::validation::{self, ValidatedModel};

/// A 3D structural model
///
/// Everything is keyed by name. Maps are ordered, which makes DOF numbering
/// and result ordering independent of insertion order. Analysis never
/// mutates the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralModel {
    #[serde(default)]
    pub nodes: BTreeMap<String, Node>,
    #[serde(default)]
    pub materials: BTreeMap<String, Material>,
    #[serde(default)]
    pub sections: BTreeMap<String, Section>,
    #[serde(default)]
    pub elements: BTreeMap<String, Element>,
    /// Support conditions keyed by node name
    #[serde(default)]
    pub supports: BTreeMap<String, Support>,
    #[serde(default)]
    pub load_cases: BTreeMap<String, LoadCase>,
    #[serde(default)]
    pub combinations: BTreeMap<String, LoadCombination>,
    #[serde(default)]
    pub loads: Vec<Load>,
}

impl StructuralModel {
    /// Create a new empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a model from JSON
    pub fn from_json(json: &str) -> SolverResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> SolverResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // ========================
    // Model Building Methods
    // ========================

    /// Add a node to the model
    pub fn add_node(&mut self, name: &str, node: Node) -> SolverResult<()> {
        if self.nodes.contains_key(name) {
            return Err(SolverError::DuplicateName(name.to_string()));
        }
        self.nodes.insert(name.to_string(), node);
        Ok(())
    }

    /// Add a material to the model
    pub fn add_material(&mut self, name: &str, material: Material) -> SolverResult<()> {
        if self.materials.contains_key(name) {
            return Err(SolverError::DuplicateName(name.to_string()));
        }
        self.materials.insert(name.to_string(), material);
        Ok(())
    }

    /// Add a section to the model
    pub fn add_section(&mut self, name: &str, section: Section) -> SolverResult<()> {
        if self.sections.contains_key(name) {
            return Err(SolverError::DuplicateName(name.to_string()));
        }
        self.sections.insert(name.to_string(), section);
        Ok(())
    }

    /// Add an element; its nodes must already exist
    pub fn add_element(&mut self, name: &str, element: Element) -> SolverResult<()> {
        if self.elements.contains_key(name) {
            return Err(SolverError::DuplicateName(name.to_string()));
        }
        if let Some(missing) = element.nodes.iter().find(|n| !self.nodes.contains_key(*n)) {
            return Err(SolverError::NodeNotFound(missing.clone()));
        }
        self.elements.insert(name.to_string(), element);
        Ok(())
    }

    /// Add or replace the support condition of a node
    pub fn add_support(&mut self, node_name: &str, support: Support) -> SolverResult<()> {
        if !self.nodes.contains_key(node_name) {
            return Err(SolverError::NodeNotFound(node_name.to_string()));
        }
        self.supports.insert(node_name.to_string(), support);
        Ok(())
    }

    /// Register a load case
    pub fn add_load_case(&mut self, case: LoadCase) -> SolverResult<()> {
        if self.load_cases.contains_key(&case.name) {
            return Err(SolverError::DuplicateName(case.name));
        }
        self.load_cases.insert(case.name.clone(), case);
        Ok(())
    }

    /// Add a load; its case is registered on first use
    pub fn add_load(&mut self, load: impl Into<Load>) -> SolverResult<()> {
        let load = load.into();
        match &load {
            Load::Nodal(l) if !self.nodes.contains_key(&l.node) => {
                return Err(SolverError::NodeNotFound(l.node.clone()))
            }
            Load::Mass(l) if !self.nodes.contains_key(&l.node) => {
                return Err(SolverError::NodeNotFound(l.node.clone()))
            }
            Load::Distributed(l) if !self.elements.contains_key(&l.element) => {
                return Err(SolverError::ElementNotFound(l.element.clone()))
            }
            Load::MemberPoint(l) if !self.elements.contains_key(&l.element) => {
                return Err(SolverError::ElementNotFound(l.element.clone()))
            }
            Load::Pressure(l) if !self.elements.contains_key(&l.element) => {
                return Err(SolverError::ElementNotFound(l.element.clone()))
            }
            _ => {}
        }

        let case = load.case().to_string();
        self.load_cases
            .entry(case.clone())
            .or_insert_with(|| LoadCase::new(&case));
        self.loads.push(load);
        Ok(())
    }

    /// Add a load combination
    pub fn add_combination(&mut self, combo: LoadCombination) -> SolverResult<()> {
        let name = combo.name.clone();
        if self.combinations.contains_key(&name) {
            return Err(SolverError::DuplicateName(name));
        }
        self.combinations.insert(name, combo);
        Ok(())
    }

    // ========================
    // Analysis Methods
    // ========================

    /// Check the model and freeze it for analysis
    pub fn validate(&self) -> SolverResult<ValidatedModel> {
        validation::validate(self)
    }

    /// Run linear static analysis of every case and combination
    pub fn analyze_linear(&self) -> SolverResult<StaticAnalysis> {
        self.analyze_static(&StaticOptions::linear())
    }

    /// Run P-Delta (second order) analysis of every case and combination
    pub fn analyze_p_delta(&self) -> SolverResult<StaticAnalysis> {
        self.analyze_static(&StaticOptions::p_delta())
    }

    /// Run static analysis with custom options
    pub fn analyze_static(&self, options: &StaticOptions) -> SolverResult<StaticAnalysis> {
        let validated = self.validate()?;
        analysis::static_solver::solve(&validated, options, &CancelFlag::new())
    }

    /// Extract natural frequencies and mode shapes
    pub fn analyze_modal(&self, options: &ModalOptions) -> SolverResult<ModalResult> {
        let validated = self.validate()?;
        analysis::modal::solve(&validated, options, &CancelFlag::new())
    }

    /// Run every analysis named in a request
    pub fn analyze(&self, request: &AnalysisRequest) -> SolverResult<AnalysisReport> {
        analysis::run(self, request, &CancelFlag::new())
    }

    /// Names of all load cases, sorted
    pub fn case_names(&self) -> Vec<String> {
        self.load_cases.keys().cloned().collect()
    }

    /// Names of all load combinations, sorted
    pub fn combination_names(&self) -> Vec<String> {
        self.combinations.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loads::NodeLoad;

    fn cantilever() -> StructuralModel {
        let mut model = StructuralModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("Section1", Section::rectangular(0.3, 0.5)).unwrap();
        model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("N2", Node::new(10.0, 0.0, 0.0)).unwrap();
        model
            .add_element("M1", Element::beam("N1", "N2", "Steel", "Section1"))
            .unwrap();
        model.add_support("N1", Support::fixed()).unwrap();
        model
            .add_load(NodeLoad::force("N2", 0.0, -10000.0, 0.0, "Case 1"))
            .unwrap();
        model
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut model = cantilever();
        assert!(matches!(
            model.add_node("N1", Node::new(1.0, 0.0, 0.0)),
            Err(SolverError::DuplicateName(_))
        ));
        assert!(matches!(
            model.add_element("M2", Element::beam("N1", "N9", "Steel", "Section1")),
            Err(SolverError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_load_registers_case() {
        let model = cantilever();
        assert_eq!(model.case_names(), vec!["Case 1".to_string()]);
    }

    #[test]
    fn test_simple_cantilever() {
        let model = cantilever();
        let results = model.analyze_linear().unwrap();

        let disp = results.node_displacement("N2", "Case 1").unwrap();
        assert!(disp.dy < 0.0, "Expected negative Y displacement");

        let rxn = results.node_reactions("N1", "Case 1").unwrap();
        approx::assert_relative_eq!(rxn.fy, 10000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_json_round_trip_preserves_model() {
        let model = cantilever();
        let json = model.to_json().unwrap();
        assert_eq!(StructuralModel::from_json(&json).unwrap(), model);
    }
}
