//! Model validation
//!
//! [`validate`] checks references, geometry and section/material constants
//! in one pass and reports every problem it finds. On success it returns a
//! [`ValidatedModel`]: an immutable snapshot with each element's geometry
//! already resolved, shared read-only by every analysis.

use std::collections::{BTreeMap, BTreeSet};

use crate::elements::{Dof, Element, ElementType, Material, Section};
use crate::error::{SolverError, SolverResult, ValidationError};
use crate::loads::Load;
use crate::math::shell::ShellGeometry;
use crate::math::{member_direction_cosines, Mat3};
use crate::model::StructuralModel;

/// Geometry of an element resolved against its node coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum ElementShape {
    /// Truss or beam: length and direction cosines
    Line { length: f64, rotation: Mat3 },
    Shell(ShellGeometry),
}

/// An element with its references looked up
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedElement {
    pub name: String,
    pub element: Element,
    pub material: Material,
    pub section: Section,
    pub shape: ElementShape,
}

impl ResolvedElement {
    pub fn kind(&self) -> ElementType {
        self.element.kind
    }

    /// Frame length, zero for shells
    pub fn length(&self) -> f64 {
        match &self.shape {
            ElementShape::Line { length, .. } => *length,
            ElementShape::Shell(_) => 0.0,
        }
    }
}

/// A model that passed validation, frozen for analysis
#[derive(Debug, Clone)]
pub struct ValidatedModel {
    model: StructuralModel,
    elements: BTreeMap<String, ResolvedElement>,
    truss_only: BTreeSet<String>,
}

impl ValidatedModel {
    pub fn model(&self) -> &StructuralModel {
        &self.model
    }

    /// Resolved elements in name order
    pub fn elements(&self) -> &BTreeMap<String, ResolvedElement> {
        &self.elements
    }

    pub fn element(&self, name: &str) -> SolverResult<&ResolvedElement> {
        self.elements
            .get(name)
            .ok_or_else(|| SolverError::ElementNotFound(name.to_string()))
    }

    /// Whether every element at this node is a truss (its rotations carry no stiffness)
    pub fn is_truss_only(&self, node: &str) -> bool {
        self.truss_only.contains(node)
    }

    /// Resolve a load case or combination name into (case, factor) pairs
    pub fn case_factors(&self, name: &str) -> SolverResult<Vec<(String, f64)>> {
        if self.model.load_cases.contains_key(name) {
            return Ok(vec![(name.to_string(), 1.0)]);
        }
        self.model
            .combinations
            .get(name)
            .map(|combo| combo.factors.iter().map(|(c, f)| (c.clone(), *f)).collect())
            .ok_or_else(|| SolverError::LoadCaseNotFound(name.to_string()))
    }
}

/// Check a model and build its analysis snapshot
///
/// Either every check passes, or all violations are returned together in
/// [`SolverError::Validation`].
pub fn validate(model: &StructuralModel) -> SolverResult<ValidatedModel> {
    let mut issues = Vec::new();

    if model.nodes.is_empty() {
        issues.push(ValidationError::NoNodes);
    }
    if model.elements.is_empty() {
        issues.push(ValidationError::NoElements);
    }

    for (name, material) in &model.materials {
        check_material(name, material, &mut issues);
    }

    let mut elements = BTreeMap::new();
    for (name, element) in &model.elements {
        if let Some(resolved) = resolve_element(model, name, element, &mut issues) {
            elements.insert(name.clone(), resolved);
        }
    }

    // Connectivity
    let mut connected: BTreeMap<&str, bool> = BTreeMap::new();
    for element in model.elements.values() {
        let is_truss = element.kind == ElementType::Truss;
        for node in &element.nodes {
            let entry = connected.entry(node.as_str()).or_insert(true);
            *entry &= is_truss;
        }
    }
    for node in model.nodes.keys() {
        if !connected.contains_key(node.as_str()) {
            issues.push(ValidationError::DisconnectedNode { node: node.clone() });
        }
    }
    let truss_only: BTreeSet<String> = connected
        .into_iter()
        .filter(|&(node, only_truss)| only_truss && model.nodes.contains_key(node))
        .map(|(node, _)| node.to_string())
        .collect();

    check_supports(model, &mut issues);
    check_loads(model, &elements, &truss_only, &mut issues);

    for (name, combo) in &model.combinations {
        if model.load_cases.contains_key(name) {
            issues.push(ValidationError::CombinationNameClash(name.clone()));
        }
        for case in combo.factors.keys() {
            if !model.load_cases.contains_key(case) {
                issues.push(ValidationError::UnknownCombinationCase {
                    combination: name.clone(),
                    case: case.clone(),
                });
            }
        }
    }

    if !issues.is_empty() {
        log::warn!("Model validation found {} issue(s)", issues.len());
        return Err(SolverError::Validation(issues));
    }

    log::debug!(
        "Validated model: {} nodes, {} elements, {} load cases, {} combinations",
        model.nodes.len(),
        elements.len(),
        model.load_cases.len(),
        model.combinations.len()
    );

    Ok(ValidatedModel {
        model: model.clone(),
        elements,
        truss_only,
    })
}

fn check_material(name: &str, material: &Material, issues: &mut Vec<ValidationError>) {
    let invalid = |property: &str, value: f64| ValidationError::InvalidMaterial {
        material: name.to_string(),
        property: property.to_string(),
        value,
    };
    if !(material.e > 0.0) {
        issues.push(invalid("e", material.e));
    }
    if !(material.g > 0.0) {
        issues.push(invalid("g", material.g));
    }
    if !(material.nu > -1.0 && material.nu < 0.5) {
        issues.push(invalid("nu", material.nu));
    }
    if !(material.rho >= 0.0) {
        issues.push(invalid("rho", material.rho));
    }
}

fn resolve_element(
    model: &StructuralModel,
    name: &str,
    element: &Element,
    issues: &mut Vec<ValidationError>,
) -> Option<ResolvedElement> {
    let before = issues.len();

    let expected = element.kind.node_count();
    if element.nodes.len() != expected {
        issues.push(ValidationError::WrongNodeCount {
            element: name.to_string(),
            expected,
            found: element.nodes.len(),
        });
    }

    let mut seen = BTreeSet::new();
    for node in &element.nodes {
        if !seen.insert(node.as_str()) {
            issues.push(ValidationError::RepeatedNode {
                element: name.to_string(),
                node: node.clone(),
            });
        }
        if !model.nodes.contains_key(node) {
            issues.push(ValidationError::MissingNode {
                element: name.to_string(),
                node: node.clone(),
            });
        }
    }

    let material = model.materials.get(&element.material);
    if material.is_none() {
        issues.push(ValidationError::MissingMaterial {
            element: name.to_string(),
            material: element.material.clone(),
        });
    }
    let section = model.sections.get(&element.section);
    match section {
        Some(section) => check_section(name, element.kind, section, issues),
        None => issues.push(ValidationError::MissingSection {
            element: name.to_string(),
            section: element.section.clone(),
        }),
    }

    if issues.len() > before {
        return None;
    }
    let (material, section) = (material?, section?);

    let coords: Vec<[f64; 3]> = element
        .nodes
        .iter()
        .filter_map(|n| model.nodes.get(n))
        .map(|n| n.coords())
        .collect();

    let shape = match element.kind {
        ElementType::Truss | ElementType::Beam => {
            let (i, j) = (coords[0], coords[1]);
            match member_direction_cosines(&i, &j, element.rotation) {
                Ok(rotation) => {
                    let length = ((j[0] - i[0]).powi(2) + (j[1] - i[1]).powi(2) + (j[2] - i[2]).powi(2)).sqrt();
                    ElementShape::Line { length, rotation }
                }
                Err(_) => {
                    issues.push(ValidationError::ZeroLength {
                        element: name.to_string(),
                    });
                    return None;
                }
            }
        }
        ElementType::Shell => {
            let corners = [coords[0], coords[1], coords[2], coords[3]];
            match ShellGeometry::new(&corners) {
                Ok(geometry) => ElementShape::Shell(geometry),
                Err(_) => {
                    issues.push(ValidationError::DegenerateShell {
                        element: name.to_string(),
                    });
                    return None;
                }
            }
        }
    };

    Some(ResolvedElement {
        name: name.to_string(),
        element: element.clone(),
        material: material.clone(),
        section: section.clone(),
        shape,
    })
}

fn check_section(name: &str, kind: ElementType, section: &Section, issues: &mut Vec<ValidationError>) {
    let mut require = |property: &str, value: f64| {
        if !(value > 0.0) {
            issues.push(ValidationError::InvalidSection {
                element: name.to_string(),
                property: property.to_string(),
                value,
            });
        }
    };

    match kind {
        ElementType::Truss => require("a", section.a),
        ElementType::Beam => {
            require("a", section.a);
            require("iy", section.iy);
            require("iz", section.iz);
            require("j", section.j);
            if let Some(asy) = section.asy {
                require("asy", asy);
            }
            if let Some(asz) = section.asz {
                require("asz", asz);
            }
        }
        ElementType::Shell => require("thickness", section.thickness.unwrap_or(0.0)),
    }
}

fn check_supports(model: &StructuralModel, issues: &mut Vec<ValidationError>) {
    let mut any_support = false;
    for (node, support) in &model.supports {
        if !model.nodes.contains_key(node) {
            issues.push(ValidationError::SupportOnMissingNode { node: node.clone() });
            continue;
        }
        any_support |= support.is_supported();

        for dof in support.conflicts() {
            issues.push(ValidationError::ConflictingSupport {
                node: node.clone(),
                dof,
            });
        }
        for dof in Dof::ALL {
            if let Some(k) = support.springs[dof.index()] {
                if !(k > 0.0 && k.is_finite()) {
                    issues.push(ValidationError::InvalidSpring {
                        node: node.clone(),
                        dof,
                        value: k,
                    });
                }
            }
        }
    }

    if !any_support && !model.nodes.is_empty() {
        issues.push(ValidationError::NoSupports);
    }
}

fn check_loads(
    model: &StructuralModel,
    elements: &BTreeMap<String, ResolvedElement>,
    truss_only: &BTreeSet<String>,
    issues: &mut Vec<ValidationError>,
) {
    let mut unknown_cases = BTreeSet::new();

    for load in &model.loads {
        if !model.load_cases.contains_key(load.case()) && unknown_cases.insert(load.case().to_string()) {
            issues.push(ValidationError::UnknownLoadCase {
                case: load.case().to_string(),
            });
        }

        match load {
            Load::Nodal(l) => {
                if !model.nodes.contains_key(&l.node) {
                    issues.push(ValidationError::LoadOnMissingNode { node: l.node.clone() });
                } else if l.has_moment() && truss_only.contains(&l.node) {
                    issues.push(ValidationError::MomentOnTrussNode { node: l.node.clone() });
                }
            }
            Load::Mass(l) => {
                if !model.nodes.contains_key(&l.node) {
                    issues.push(ValidationError::LoadOnMissingNode { node: l.node.clone() });
                }
                if l.mass < 0.0 || l.rotary.iter().any(|&r| r < 0.0) {
                    issues.push(ValidationError::NegativeMass { node: l.node.clone() });
                }
            }
            Load::Distributed(l) => {
                if let Some(length) = frame_length(load, &l.element, model, elements, issues) {
                    let (x1, x2) = l.span(length);
                    if x1 < 0.0 || x2 > length * (1.0 + 1e-9) || x2 <= x1 {
                        issues.push(ValidationError::LoadOutsideSpan {
                            element: l.element.clone(),
                            x1,
                            x2,
                            length,
                        });
                    }
                }
            }
            Load::MemberPoint(l) => {
                if let Some(length) = frame_length(load, &l.element, model, elements, issues) {
                    if l.position < 0.0 || l.position > length * (1.0 + 1e-9) {
                        issues.push(ValidationError::LoadOutsideSpan {
                            element: l.element.clone(),
                            x1: l.position,
                            x2: l.position,
                            length,
                        });
                    }
                }
            }
            Load::Pressure(l) => match model.elements.get(&l.element) {
                None => issues.push(ValidationError::LoadOnMissingElement {
                    element: l.element.clone(),
                }),
                Some(element) if element.kind != ElementType::Shell => {
                    issues.push(ValidationError::IncompatibleLoad {
                        element: l.element.clone(),
                        load: load.kind_name().to_string(),
                    })
                }
                Some(_) => {}
            },
        }
    }
}

/// Length of the frame element a span load targets, reporting missing or
/// shell targets
fn frame_length(
    load: &Load,
    element: &str,
    model: &StructuralModel,
    elements: &BTreeMap<String, ResolvedElement>,
    issues: &mut Vec<ValidationError>,
) -> Option<f64> {
    match model.elements.get(element) {
        None => {
            issues.push(ValidationError::LoadOnMissingElement {
                element: element.to_string(),
            });
            None
        }
        Some(e) if !e.kind.is_frame() => {
            issues.push(ValidationError::IncompatibleLoad {
                element: element.to_string(),
                load: load.kind_name().to_string(),
            });
            None
        }
        // Elements that failed their own checks are already reported
        Some(_) => elements.get(element).map(ResolvedElement::length),
    }
}
