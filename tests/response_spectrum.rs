use approx::assert_relative_eq;
use frame_solver::analysis::{cqc_coefficient, spectrum};
use frame_solver::prelude::*;

const E: f64 = 2e11;
const AREA: f64 = 1e-3;
const LENGTH: f64 = 5.0;

/// Axial bar with a lumped mass at its free end: one dynamic DOF
fn single_dof(mass: f64) -> StructuralModel {
    let mut model = StructuralModel::new();
    model.add_material("Steel", Material::new(E, 7.7e10, 0.3, 0.0)).unwrap();
    model.add_section("Bar", Section::axial(AREA)).unwrap();
    model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("B", Node::new(LENGTH, 0.0, 0.0)).unwrap();
    model.add_element("T1", Element::truss("A", "B", "Steel", "Bar")).unwrap();
    model.add_support("A", Support::pinned()).unwrap();
    model
        .add_support("B", Support::with_restraints(false, true, true, false, false, false))
        .unwrap();
    model.add_load(NodalMass::new("B", mass, "Mass")).unwrap();
    model
}

fn spectrum_request(curve: SpectrumCurve, options: SpectrumOptions) -> AnalysisRequest {
    AnalysisRequest {
        static_analysis: None,
        modal: Some(ModalOptions::new(1)),
        spectrum: Some(SpectrumRequest { curve, options }),
    }
}

#[test]
fn single_dof_peak_matches_closed_form() {
    let (mass, sa) = (500.0, 3.0);
    let k = E * AREA / LENGTH;

    let report = single_dof(mass)
        .analyze(&spectrum_request(
            SpectrumCurve::constant(sa),
            SpectrumOptions::new(Direction::X),
        ))
        .unwrap();

    let modal = report.modal.unwrap();
    assert_eq!(modal.modes.len(), 1);
    assert_relative_eq!(modal.modes[0].omega, (k / mass).sqrt(), max_relative = 1e-9);
    assert_relative_eq!(modal.modes[0].participation[0], mass.sqrt(), max_relative = 1e-9);
    assert_relative_eq!(modal.modes[0].mass_ratio[0], 1.0, max_relative = 1e-9);

    assert_eq!(report.spectrum.len(), 2);
    for result in &report.spectrum {
        let u = sa * mass / k;
        assert_relative_eq!(result.displacements["B"][0], u, max_relative = 1e-9);
        assert_eq!(result.displacements["A"], [0.0; 6]);
        assert_relative_eq!(result.reactions["A"][0], sa * mass, max_relative = 1e-9);
        assert_relative_eq!(result.element_forces["T1"][0][0], sa * mass, max_relative = 1e-9);
        assert_eq!(result.spectral_accelerations, vec![sa]);
    }
}

#[test]
fn scale_factor_multiplies_every_peak() {
    let model = single_dof(500.0);
    let curve = SpectrumCurve::new(vec![[0.0, 1.0], [0.1, 2.5], [1.0, 2.5], [3.0, 0.8]]).unwrap();

    let base = model
        .analyze(&spectrum_request(curve.clone(), SpectrumOptions::new(Direction::X)))
        .unwrap();
    let scaled = model
        .analyze(&spectrum_request(curve, SpectrumOptions::new(Direction::X).with_scale(9.81)))
        .unwrap();

    assert_relative_eq!(
        scaled.spectrum[0].displacements["B"][0],
        9.81 * base.spectrum[0].displacements["B"][0],
        max_relative = 1e-12
    );
    assert_relative_eq!(
        scaled.spectrum[0].spectral_accelerations[0],
        9.81 * base.spectrum[0].spectral_accelerations[0],
        max_relative = 1e-12
    );
}

#[test]
fn orthogonal_excitation_gives_no_response() {
    let report = single_dof(500.0)
        .analyze(&spectrum_request(
            SpectrumCurve::constant(3.0),
            SpectrumOptions::new(Direction::Y).with_rules(vec![CombinationRule::Srss]),
        ))
        .unwrap();

    assert_eq!(report.spectrum.len(), 1);
    assert_eq!(report.spectrum[0].rule, CombinationRule::Srss);
    assert_eq!(report.spectrum[0].displacements["B"], [0.0; 6]);
}

/// Shear building with well separated sway modes
fn three_storey_frame() -> StructuralModel {
    let mut model = StructuralModel::new();
    model.add_material("Massless", Material::new(200e9, 77e9, 0.3, 0.0)).unwrap();
    model.add_section("C", Section::new(0.02, 4e-5, 1e-5, 2e-5)).unwrap();
    for i in 0..=3 {
        model.add_node(&format!("N{}", i), Node::new(0.0, 3.0 * i as f64, 0.0)).unwrap();
    }
    for i in 0..3 {
        model
            .add_element(
                &format!("C{}", i),
                Element::beam(&format!("N{}", i), &format!("N{}", i + 1), "Massless", "C"),
            )
            .unwrap();
        model.add_load(NodalMass::new(&format!("N{}", i + 1), 2000.0, "Mass")).unwrap();
    }
    model.add_support("N0", Support::fixed()).unwrap();
    model
}

#[test]
fn srss_and_cqc_agree_for_separated_modes() {
    let model = three_storey_frame();
    let modal = model.analyze_modal(&ModalOptions::new(9)).unwrap();
    let validated = model.validate().unwrap();

    let results = spectrum::solve(
        &validated,
        &modal,
        &SpectrumCurve::constant(2.0),
        &SpectrumOptions::new(Direction::X),
        &CancelFlag::new(),
    )
    .unwrap();
    let (srss, cqc) = (&results[0], &results[1]);
    assert_eq!(srss.rule, CombinationRule::Srss);
    assert_eq!(cqc.rule, CombinationRule::Cqc);

    let roof_srss = srss.displacements["N3"][0];
    let roof_cqc = cqc.displacements["N3"][0];
    assert!(roof_srss > 0.0);
    assert_relative_eq!(roof_cqc, roof_srss, max_relative = 0.05);

    let base_srss = srss.reactions["N0"][0];
    assert!(base_srss > 0.0 && base_srss <= 2.0 * 6000.0);
}

#[test]
fn closure_spectrum_matches_tabulated_curve() {
    let model = three_storey_frame();
    let modal = model.analyze_modal(&ModalOptions::new(3)).unwrap();
    let validated = model.validate().unwrap();
    let options = SpectrumOptions::new(Direction::X).with_rules(vec![CombinationRule::Cqc]);

    let curve = SpectrumCurve::new(vec![[0.0, 1.0], [10.0, 11.0]]).unwrap();
    let linear = |period: f64| 1.0 + period;

    let tabulated = spectrum::solve(&validated, &modal, &curve, &options, &CancelFlag::new()).unwrap();
    let closure = spectrum::solve(&validated, &modal, &linear, &options, &CancelFlag::new()).unwrap();

    for (a, b) in tabulated[0]
        .spectral_accelerations
        .iter()
        .zip(&closure[0].spectral_accelerations)
    {
        assert_relative_eq!(a, b, max_relative = 1e-12);
    }
    assert_relative_eq!(
        tabulated[0].displacements["N3"][0],
        closure[0].displacements["N3"][0],
        max_relative = 1e-12
    );
}

#[test]
fn cqc_coefficient_properties() {
    assert_eq!(cqc_coefficient(10.0, 10.0, 0.05), 1.0);
    assert_eq!(cqc_coefficient(10.0, 10.0, 0.0), 1.0);
    assert_eq!(cqc_coefficient(0.0, 10.0, 0.05), 0.0);

    let near = cqc_coefficient(10.0, 10.5, 0.05);
    let far = cqc_coefficient(10.0, 30.0, 0.05);
    assert!(near > 0.5 && near < 1.0);
    assert!(far < 0.01);
    assert_relative_eq!(cqc_coefficient(10.0, 12.0, 0.05), cqc_coefficient(12.0, 10.0, 0.05), max_relative = 1e-12);
}

#[test]
fn spectrum_curve_rejects_bad_points() {
    assert!(SpectrumCurve::new(Vec::new()).is_err());
    assert!(SpectrumCurve::new(vec![[0.5, 1.0], [0.5, 2.0]]).is_err());
    assert!(SpectrumCurve::new(vec![[-0.1, 1.0]]).is_err());
    assert!(SpectrumCurve::new(vec![[f64::NAN, 1.0]]).is_err());
}
