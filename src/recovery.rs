//! Result recovery
//!
//! Turns a solved displacement vector into nodal displacements, reactions,
//! element end forces and shell stresses, then checks global equilibrium.

use std::collections::BTreeMap;

use nalgebra_sparse::CsrMatrix;

use crate::assembly::{AssembledModel, DofStatus, ElementKernel, LoadVector};
use crate::elements::Dof;
use crate::error::NumericalAnomaly;
use crate::math::{sparse_matvec, Vec3, Vector};
use crate::results::{
    AnalysisSummary, ElementForces, EquilibriumCheck, NodeDisplacement, Reactions, ResultSource, ShellStress,
    StaticResult,
};

const COMPONENTS: [&str; 6] = ["FX", "FY", "FZ", "MX", "MY", "MZ"];

/// Second-order state of a P-Delta solution
#[derive(Debug, Clone, Copy)]
pub struct GeometricState<'s> {
    /// Frame axial forces, one per kernel
    pub axial: &'s [f64],
    /// Full geometric stiffness built from `axial`
    pub stiffness: &'s CsrMatrix<f64>,
}

/// Recover every result quantity of one load case or combination
pub fn recover(
    assembled: &AssembledModel<'_>,
    name: &str,
    source: ResultSource,
    u: &Vector,
    loads: &LoadVector,
    geometric: Option<GeometricState<'_>>,
    equilibrium_tolerance: f64,
) -> StaticResult {
    let model = assembled.validated().model();
    let dof_map = &assembled.dof_map;

    let displacements = model
        .nodes
        .keys()
        .map(|node| (node.clone(), NodeDisplacement::from_array(dof_map.node_values(node, u))))
        .collect();

    // K u - F is the support force at every fixed DOF
    let mut residual = sparse_matvec(&assembled.stiffness, u);
    if let Some(state) = geometric {
        residual += sparse_matvec(state.stiffness, u);
    }
    residual -= &loads.forces;
    let reactions = support_reactions(assembled, u, &residual);

    let mut element_forces = BTreeMap::new();
    let mut shell_stresses = BTreeMap::new();
    for (i, kernel) in assembled.kernels.iter().enumerate() {
        let axial = geometric.map(|s| s.axial[i]);
        let ends = kernel.end_forces(u, loads.fer.get(kernel.name()), axial);
        let axial_stress = match kernel {
            ElementKernel::Frame(k) => Some(-ends[0][0] / k.props.a),
            ElementKernel::Shell(k) => {
                let r = k.resultants(u);
                shell_stresses.insert(k.name.clone(), ShellStress::new(r.membrane, r.moments, r.shear, k.thickness));
                None
            }
        };
        element_forces.insert(kernel.name().to_string(), ElementForces { ends, axial_stress });
    }

    let (equilibrium, warnings) = check_equilibrium(
        assembled,
        name,
        &loads.forces,
        &reactions,
        geometric.is_none(),
        equilibrium_tolerance,
    );

    StaticResult {
        name: name.to_string(),
        source,
        displacements,
        reactions,
        element_forces,
        shell_stresses,
        equilibrium,
        warnings,
        iterations: 0,
    }
}

/// Reactions at nodes with any fixed or spring DOF
///
/// `residual` is K u - F over all DOFs. Spring DOFs report -k u.
pub fn support_reactions(assembled: &AssembledModel<'_>, u: &Vector, residual: &Vector) -> BTreeMap<String, Reactions> {
    let partition = &assembled.partition;
    let mut reactions = BTreeMap::new();

    for (node, support) in &assembled.validated().model().supports {
        if !support.is_supported() {
            continue;
        }
        let mut values = [0.0; 6];
        for dof in Dof::ALL {
            let Some(i) = assembled.dof_map.index(node, dof) else { continue };
            if partition.is_inactive(i) {
                continue;
            }
            values[dof.index()] = match (partition.status(i), partition.spring(i)) {
                (DofStatus::Fixed(_), _) => residual[i],
                (DofStatus::Free(_), Some(k)) => -k * u[i],
                (DofStatus::Free(_), None) => 0.0,
            };
        }
        reactions.insert(node.clone(), Reactions::from_array(values));
    }

    reactions
}

/// Force and moment resultant about the origin of nodal values
fn resultant<'n>(assembled: &AssembledModel<'_>, values: impl Iterator<Item = (&'n str, [f64; 6])>) -> ([f64; 6], [f64; 6]) {
    let nodes = &assembled.validated().model().nodes;
    let mut total = [0.0; 6];
    let mut scale = [0.0; 6];
    for (node, v) in values {
        let Some(coords) = nodes.get(node) else { continue };
        let r = Vec3::new(coords.x, coords.y, coords.z);
        let f = Vec3::new(v[0], v[1], v[2]);
        let m = r.cross(&f) + Vec3::new(v[3], v[4], v[5]);
        for k in 0..3 {
            total[k] += f[k];
            total[k + 3] += m[k];
            scale[k] += f[k].abs();
            scale[k + 3] += m[k].abs();
        }
    }
    (total, scale)
}

fn check_equilibrium(
    assembled: &AssembledModel<'_>,
    name: &str,
    forces: &Vector,
    reactions: &BTreeMap<String, Reactions>,
    check_moments: bool,
    tolerance: f64,
) -> (EquilibriumCheck, Vec<NumericalAnomaly>) {
    let dof_map = &assembled.dof_map;
    let (applied, applied_scale) = resultant(
        assembled,
        dof_map.nodes().iter().map(|n| (n.as_str(), dof_map.node_values(n, forces))),
    );
    let (reaction_total, reaction_scale) =
        resultant(assembled, reactions.iter().map(|(n, r)| (n.as_str(), r.as_array())));

    let mut imbalance = [0.0; 6];
    let mut warnings = Vec::new();
    let checked = if check_moments { 6 } else { 3 };
    for k in 0..6 {
        imbalance[k] = applied[k] + reaction_total[k];
        if k >= checked {
            continue;
        }
        let limit = tolerance * applied_scale[k].max(reaction_scale[k]).max(1.0);
        if imbalance[k].abs() > limit {
            log::warn!("'{}': {} out of balance by {:.3e}", name, COMPONENTS[k], imbalance[k]);
            warnings.push(NumericalAnomaly::EquilibriumImbalance {
                load_case: name.to_string(),
                component: COMPONENTS[k].to_string(),
                imbalance: imbalance[k],
                tolerance: limit,
            });
        }
    }

    let check = EquilibriumCheck {
        applied,
        reactions: reaction_total,
        imbalance,
        moments_checked: check_moments,
        balanced: warnings.is_empty(),
    };
    (check, warnings)
}

/// Extremes over every solved case and combination
pub fn summarize<'r>(assembled: &AssembledModel<'_>, results: impl IntoIterator<Item = &'r StaticResult>) -> AnalysisSummary {
    let model = assembled.validated().model();
    let num_shells = assembled
        .kernels
        .iter()
        .filter(|k| matches!(k, ElementKernel::Shell(_)))
        .count();

    let mut summary = AnalysisSummary {
        num_nodes: model.nodes.len(),
        num_members: assembled.kernels.len() - num_shells,
        num_shells,
        total_dofs: assembled.size(),
        free_dofs: assembled.partition.num_free(),
        ..Default::default()
    };

    for result in results {
        for (node, d) in &result.displacements {
            let value = d.translation_magnitude();
            if value > summary.max_displacement {
                summary.max_displacement = value;
                summary.max_disp_node = node.clone();
                summary.max_disp_result = result.name.clone();
            }
        }
        for (node, r) in &result.reactions {
            let value = r.force_magnitude();
            if value > summary.max_reaction {
                summary.max_reaction = value;
                summary.max_reaction_node = node.clone();
            }
        }
        for (element, forces) in &result.element_forces {
            if forces.axial_stress.is_none() {
                continue;
            }
            let value = forces.axial().abs();
            if value > summary.max_axial {
                summary.max_axial = value;
                summary.max_axial_member = element.clone();
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Element, Material, Node, Section, Support};
    use crate::loads::NodeLoad;
    use crate::model::StructuralModel;
    use crate::validation::validate;
    use approx::assert_relative_eq;

    #[test]
    fn test_reactions_from_prescribed_solution() {
        // Axial bar: a known displacement gives EA/L reactions without solving
        let mut model = StructuralModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("S", Section::rectangular(0.1, 0.1)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(2.0, 0.0, 0.0)).unwrap();
        model.add_element("M", Element::beam("A", "B", "Steel", "S")).unwrap();
        model.add_support("A", Support::fixed()).unwrap();
        model.add_load(NodeLoad::force("B", 1000.0, 0.0, 0.0, "Pull")).unwrap();

        let validated = validate(&model).unwrap();
        let assembled = AssembledModel::new(&validated).unwrap();
        let loads = assembled.case_loads("Pull").unwrap();
        let ea_l = 200e9 * 0.01 / 2.0;
        let mut u = Vector::zeros(assembled.size());
        u[assembled.dof_map.index("B", Dof::DX).unwrap()] = 1000.0 / ea_l;

        let result = recover(&assembled, "Pull", ResultSource::LoadCase, &u, loads, None, 1e-6);
        assert_relative_eq!(result.reactions["A"].fx, -1000.0, max_relative = 1e-9);
        assert_relative_eq!(result.element_forces["M"].axial(), 1000.0, max_relative = 1e-9);
        assert!(result.equilibrium.balanced);
    }
}
