use approx::assert_relative_eq;
use frame_solver::prelude::*;

const E: f64 = 200e9;
const G: f64 = 77e9;

fn steel() -> Material {
    Material::new(E, G, 0.3, 7850.0)
}

/// Cantilever along X of length `l`, fixed at N1, loaded at N2
fn cantilever(l: f64, section: Section) -> StructuralModel {
    let mut model = StructuralModel::new();
    model.add_material("Steel", steel()).unwrap();
    model.add_section("S", section).unwrap();
    model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("N2", Node::new(l, 0.0, 0.0)).unwrap();
    model.add_element("M1", Element::beam("N1", "N2", "Steel", "S")).unwrap();
    model.add_support("N1", Support::fixed()).unwrap();
    model
}

fn slender() -> Section {
    Section::new(0.01, 2e-5, 1e-5, 3e-5)
}

#[test]
fn zero_load_gives_zero_displacements() {
    let mut model = cantilever(3.0, slender());
    model.add_load(NodeLoad::force("N2", 0.0, 0.0, 0.0, "Empty")).unwrap();

    let analysis = model.analyze_linear().unwrap();
    let result = analysis.result("Empty").unwrap();
    for disp in result.displacements.values() {
        assert_eq!(disp.as_array(), [0.0; 6]);
    }
    assert_eq!(result.reactions["N1"].as_array(), [0.0; 6]);
    assert!(result.equilibrium.balanced);
}

#[test]
fn cantilever_tip_load_matches_beam_theory() {
    let (l, p, iz) = (3.0, 1000.0, 1e-5);
    let mut model = cantilever(l, slender());
    model.add_load(NodeLoad::force("N2", 0.0, -p, 0.0, "Tip")).unwrap();

    let analysis = model.analyze_linear().unwrap();
    let tip = analysis.node_displacement("N2", "Tip").unwrap();
    assert_relative_eq!(tip.dy, -p * l.powi(3) / (3.0 * E * iz), max_relative = 1e-9);
    assert_relative_eq!(tip.rz, -p * l.powi(2) / (2.0 * E * iz), max_relative = 1e-9);

    let rxn = analysis.node_reactions("N1", "Tip").unwrap();
    assert_relative_eq!(rxn.fy, p, max_relative = 1e-9);
    assert_relative_eq!(rxn.mz, p * l, max_relative = 1e-9);

    // End forces act on the element: the support force at i
    let forces = analysis.element_forces("M1", "Tip").unwrap();
    assert_relative_eq!(forces.ends[0][1], p, max_relative = 1e-9);
    assert_relative_eq!(forces.ends[0][5], p * l, max_relative = 1e-9);
    assert_relative_eq!(forces.ends[1][1], -p, max_relative = 1e-9);
    assert!(forces.ends[1][5].abs() < 1e-6);
}

#[test]
fn cantilever_with_shear_area_adds_shear_deflection() {
    let (l, p, iz, asy) = (3.0, 1000.0, 1e-5, 0.008);
    let mut model = cantilever(l, slender().with_shear_areas(asy, asy));
    model.add_load(NodeLoad::force("N2", 0.0, -p, 0.0, "Tip")).unwrap();

    let tip = model.analyze_linear().unwrap().node_displacement("N2", "Tip").unwrap();
    let expected = p * l.powi(3) / (3.0 * E * iz) + p * l / (G * asy);
    assert_relative_eq!(tip.dy, -expected, max_relative = 1e-9);
}

#[test]
fn span_loads_on_shear_deformable_cantilever() {
    let (l, p, a, w) = (2.0, 1000.0, 0.5, 4000.0);
    let section = Section::rectangular(0.2, 0.6);
    let (iz, asy) = (section.iz, section.asy.unwrap());

    let mut model = cantilever(l, section);
    model.add_load(PointLoad::new("M1", -p, a, LoadDirection::Fy, "Point")).unwrap();
    model
        .add_load(DistributedLoad::uniform("M1", -w, LoadDirection::Fy, "Uniform"))
        .unwrap();
    let analysis = model.analyze_linear().unwrap();

    // Bending and shear deflection at a, then a rigid rotation out to the tip
    let tip = analysis.node_displacement("N2", "Point").unwrap();
    let expected = p * a * a * (3.0 * l - a) / (6.0 * E * iz) + p * a / (G * asy);
    assert_relative_eq!(tip.dy, -expected, max_relative = 1e-9);
    assert_relative_eq!(tip.rz, -p * a * a / (2.0 * E * iz), max_relative = 1e-9);

    let forces = analysis.element_forces("M1", "Point").unwrap();
    assert_relative_eq!(forces.ends[0][1], p, max_relative = 1e-9);
    assert_relative_eq!(forces.ends[0][5], p * a, max_relative = 1e-9);
    assert!(forces.ends[1][1].abs() < 1e-6);

    let tip = analysis.node_displacement("N2", "Uniform").unwrap();
    let expected = w * l.powi(4) / (8.0 * E * iz) + w * l * l / (2.0 * G * asy);
    assert_relative_eq!(tip.dy, -expected, max_relative = 1e-9);
    assert_relative_eq!(tip.rz, -w * l.powi(3) / (6.0 * E * iz), max_relative = 1e-9);
}

fn portal_frame() -> StructuralModel {
    let mut model = StructuralModel::new();
    model.add_material("Steel", steel()).unwrap();
    model.add_section("W", Section::new(0.005, 1e-5, 8e-5, 2e-7)).unwrap();
    model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("N2", Node::new(6.0, 0.0, 0.0)).unwrap();
    model.add_node("N3", Node::new(0.0, 4.0, 0.0)).unwrap();
    model.add_node("N4", Node::new(6.0, 4.0, 0.0)).unwrap();
    model.add_element("Col1", Element::beam("N1", "N3", "Steel", "W")).unwrap();
    model.add_element("Col2", Element::beam("N2", "N4", "Steel", "W")).unwrap();
    model.add_element("Beam", Element::beam("N3", "N4", "Steel", "W")).unwrap();
    model.add_support("N1", Support::fixed()).unwrap();
    model.add_support("N2", Support::pinned()).unwrap();
    model
}

#[test]
fn reactions_balance_applied_loads() {
    let mut model = portal_frame();
    model.add_load_case(LoadCase::dead()).unwrap();
    model
        .add_load(DistributedLoad::uniform("Beam", -20000.0, LoadDirection::FY, "Dead"))
        .unwrap();
    model
        .add_load(DistributedLoad::new("Col1", 0.0, 3000.0, 1.0, 3.0, LoadDirection::FX, "Wind"))
        .unwrap();
    model
        .add_load(PointLoad::new("Beam", 5000.0, 2.0, LoadDirection::Fz, "Wind"))
        .unwrap();
    model.add_load(NodeLoad::moment("N4", 0.0, 0.0, 1500.0, "Wind")).unwrap();
    model
        .add_combination(LoadCombination::new("D+W").with_case("Dead", 1.2).with_case("Wind", 1.5))
        .unwrap();

    let analysis = model.analyze_linear().unwrap();

    let self_weight = 7850.0 * 9.81 * 0.005 * 14.0;
    let dead = analysis.result("Dead").unwrap();
    let total_fy: f64 = dead.reactions.values().map(|r| r.fy).sum();
    assert_relative_eq!(total_fy, 20000.0 * 6.0 + self_weight, max_relative = 1e-9);

    let wind = analysis.result("Wind").unwrap();
    let total_fx: f64 = wind.reactions.values().map(|r| r.fx).sum();
    let total_fz: f64 = wind.reactions.values().map(|r| r.fz).sum();
    assert_relative_eq!(total_fx, -3000.0, max_relative = 1e-9);
    assert_relative_eq!(total_fz, -5000.0, max_relative = 1e-9);

    for result in analysis.results.values() {
        assert!(result.equilibrium.moments_checked);
        assert!(result.equilibrium.balanced, "{} out of balance: {:?}", result.name, result.equilibrium);
        assert!(result.warnings.is_empty());
    }
}

#[test]
fn truss_bar_elongation() {
    let mut model = StructuralModel::new();
    model.add_material("Steel", Material::new(2e11, 7.7e10, 0.3, 0.0)).unwrap();
    model.add_section("Bar", Section::axial(1e-3)).unwrap();
    model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("B", Node::new(5.0, 0.0, 0.0)).unwrap();
    model.add_element("T1", Element::truss("A", "B", "Steel", "Bar")).unwrap();
    model.add_support("A", Support::pinned()).unwrap();
    model
        .add_support("B", Support::with_restraints(false, true, true, false, false, false))
        .unwrap();
    model.add_load(NodeLoad::force("B", 1e4, 0.0, 0.0, "Pull")).unwrap();

    let analysis = model.analyze_linear().unwrap();
    let result = analysis.result("Pull").unwrap();
    assert_relative_eq!(result.displacements["B"].dx, 2.5e-4, max_relative = 1e-9);

    let forces = &result.element_forces["T1"];
    assert_relative_eq!(forces.axial(), 1e4, max_relative = 1e-9);
    assert_relative_eq!(forces.axial_stress.unwrap(), 1e7, max_relative = 1e-9);
    assert_relative_eq!(result.reactions["A"].fx, -1e4, max_relative = 1e-9);

    // Rotations of truss-only nodes carry nothing
    assert_eq!(result.reactions["A"].moment_magnitude(), 0.0);
    assert_eq!(result.displacements["B"].rotation_magnitude(), 0.0);
}

#[test]
fn missing_restraint_is_reported_as_instability() {
    let mut model = cantilever(3.0, slender());
    model.add_support("N1", Support::pinned()).unwrap();
    model.add_load(NodeLoad::force("N2", 0.0, -1000.0, 0.0, "Tip")).unwrap();

    match model.analyze_linear() {
        Err(SolverError::Instability { dofs, .. }) => {
            assert!(!dofs.is_empty());
            assert!(dofs.iter().all(|d| d.node == "N1" || d.node == "N2"));
        }
        other => panic!("expected instability, got {:?}", other.map(|a| a.names())),
    }
}

#[test]
fn spring_support_reaction_is_minus_k_u() {
    let k = 1e6;
    let mut model = cantilever(3.0, slender());
    model.add_support("N2", Support::new().with_spring(Dof::DY, k)).unwrap();
    model.add_load(NodeLoad::force("N2", 0.0, -1000.0, 0.0, "Tip")).unwrap();

    let result = model.analyze_linear().unwrap();
    let result = result.result("Tip").unwrap();
    let dy = result.displacements["N2"].dy;
    assert!(dy < 0.0);
    assert_relative_eq!(result.reactions["N2"].fy, -k * dy, max_relative = 1e-12);
    assert_relative_eq!(
        result.reactions["N1"].fy + result.reactions["N2"].fy,
        1000.0,
        max_relative = 1e-9
    );
}

#[test]
fn enforced_settlement_of_fixed_fixed_beam() {
    let (l, iz, delta) = (3.0, 1e-5, -0.001);
    let mut model = cantilever(l, slender());
    model.add_support("N2", Support::fixed().with_enforced(Dof::DY, delta)).unwrap();
    model.add_load(NodeLoad::force("N2", 0.0, 0.0, 0.0, "Settlement")).unwrap();

    let analysis = model.analyze_linear().unwrap();
    let result = analysis.result("Settlement").unwrap();
    assert_eq!(result.displacements["N2"].dy, delta);
    assert_relative_eq!(result.reactions["N2"].fy, 12.0 * E * iz * delta / l.powi(3), max_relative = 1e-9);
    assert_relative_eq!(result.reactions["N1"].fy, -12.0 * E * iz * delta / l.powi(3), max_relative = 1e-9);
}

/// Vertical cantilever column in four elements with a lateral tip load
fn column(axial: f64, lateral: f64) -> StructuralModel {
    let mut model = StructuralModel::new();
    model.add_material("Steel", steel()).unwrap();
    model.add_section("C", Section::new(0.01, 1e-5, 1e-5, 2e-5)).unwrap();
    for i in 0..=4 {
        model.add_node(&format!("N{}", i), Node::new(0.0, i as f64, 0.0)).unwrap();
    }
    for i in 0..4 {
        model
            .add_element(&format!("C{}", i), Element::beam(&format!("N{}", i), &format!("N{}", i + 1), "Steel", "C"))
            .unwrap();
    }
    model.add_support("N0", Support::fixed()).unwrap();
    model.add_load(NodeLoad::force("N4", lateral, -axial, 0.0, "Sway")).unwrap();
    model
}

#[test]
fn p_delta_with_negligible_axial_load_matches_linear() {
    let model = column(1.0, 1000.0);
    let linear = model.analyze_linear().unwrap().node_displacement("N4", "Sway").unwrap();
    let second = model.analyze_p_delta().unwrap();
    let p_delta = second.node_displacement("N4", "Sway").unwrap();
    assert_relative_eq!(p_delta.dx, linear.dx, max_relative = 1e-5);
    assert!(second.result("Sway").unwrap().iterations >= 1);
    assert!(!second.result("Sway").unwrap().equilibrium.moments_checked);
}

#[test]
fn p_delta_amplifies_sway_under_compression() {
    let p_cr = std::f64::consts::PI.powi(2) * E * 1e-5 / (4.0 * 16.0);
    let model = column(0.3 * p_cr, 1000.0);

    let linear = model.analyze_linear().unwrap().node_displacement("N4", "Sway").unwrap();
    let p_delta = model.analyze_p_delta().unwrap().node_displacement("N4", "Sway").unwrap();

    // Roughly 1 / (1 - P/Pcr)
    let amplification = p_delta.dx / linear.dx;
    assert!(amplification > 1.3 && amplification < 1.6, "amplification {}", amplification);
}

#[test]
fn p_delta_beyond_buckling_is_unstable() {
    let p_cr = std::f64::consts::PI.powi(2) * E * 1e-5 / (4.0 * 16.0);
    let model = column(1.5 * p_cr, 1000.0);
    assert!(matches!(
        model.analyze_p_delta(),
        Err(SolverError::Instability { .. }) | Err(SolverError::Convergence { .. })
    ));
}

#[test]
fn repeated_runs_are_identical() {
    let mut model = portal_frame();
    model.add_load(NodeLoad::force("N3", 10000.0, -5000.0, 0.0, "Wind")).unwrap();
    model
        .add_load(DistributedLoad::uniform("Beam", -8000.0, LoadDirection::Fy, "Live"))
        .unwrap();

    let first = serde_json::to_string(&model.analyze_linear().unwrap()).unwrap();
    let second = serde_json::to_string(&model.analyze_linear().unwrap()).unwrap();
    assert_eq!(first, second);

    // A model rebuilt from its JSON solves to the same numbers
    let rebuilt = StructuralModel::from_json(&model.to_json().unwrap()).unwrap();
    let third = serde_json::to_string(&rebuilt.analyze_linear().unwrap()).unwrap();
    assert_eq!(first, third);
}

#[test]
fn validation_reports_every_issue() {
    let mut model = StructuralModel::new();
    model.add_material("Steel", steel()).unwrap();
    model.add_section("S", slender()).unwrap();
    model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("B", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("C", Node::new(1.0, 0.0, 0.0)).unwrap();
    model.add_node("D", Node::new(2.0, 0.0, 0.0)).unwrap();
    model.add_element("M1", Element::beam("A", "C", "Nope", "S")).unwrap();
    model.add_element("M2", Element::beam("A", "B", "Steel", "S")).unwrap();

    let err = model.analyze_linear().unwrap_err();
    let issues = err.validation_issues().unwrap();
    assert!(issues.contains(&ValidationError::MissingMaterial {
        element: "M1".to_string(),
        material: "Nope".to_string()
    }));
    assert!(issues.contains(&ValidationError::ZeroLength { element: "M2".to_string() }));
    assert!(issues.contains(&ValidationError::DisconnectedNode { node: "D".to_string() }));
    assert!(issues.contains(&ValidationError::NoSupports));
}
