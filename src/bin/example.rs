//! Frame Solver Example - Simple Portal Frame

use frame_solver::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    println!("=== Frame Solver Example: Portal Frame ===\n");

    // Create a new model
    let mut model = StructuralModel::new();

    // Add steel material
    model.add_material("Steel", Material::steel())?;

    // Add W12x26 section (approximate properties)
    // A = 7.65 in² = 0.00494 m²
    // Iy = 17.3 in⁴ = 7.2e-6 m⁴
    // Iz = 204 in⁴ = 8.49e-5 m⁴ (strong axis)
    // J = 0.3 in⁴ = 1.25e-7 m⁴
    model.add_section("W12x26", Section::new(0.00494, 7.2e-6, 8.49e-5, 1.25e-7))?;

    // Create a simple portal frame
    //
    //     N3 -------- N4
    //     |          |
    //     |          |
    //     |          |
    //     N1        N2
    //     ^          ^
    //   Fixed     Fixed
    //

    // Add nodes (in meters)
    let height = 4.0; // 4m column height
    let span = 6.0; // 6m beam span

    model.add_node("N1", Node::new(0.0, 0.0, 0.0))?;
    model.add_node("N2", Node::new(span, 0.0, 0.0))?;
    model.add_node("N3", Node::new(0.0, height, 0.0))?;
    model.add_node("N4", Node::new(span, height, 0.0))?;

    model.add_element("Col1", Element::beam("N1", "N3", "Steel", "W12x26"))?;
    model.add_element("Col2", Element::beam("N2", "N4", "Steel", "W12x26"))?;
    model.add_element("Beam", Element::beam("N3", "N4", "Steel", "W12x26"))?;

    // Add fixed supports at base
    model.add_support("N1", Support::fixed())?;
    model.add_support("N2", Support::fixed())?;

    // Dead load case: 20 kN/m on the beam (negative Y = downward) plus self weight
    model.add_load_case(LoadCase::dead())?;
    model.add_load(DistributedLoad::uniform("Beam", -20000.0, LoadDirection::FY, "Dead"))?;

    // Lateral load case: 10 kN at roof level (positive X)
    model.add_load(NodeLoad::force("N3", 10000.0, 0.0, 0.0, "Wind"))?;

    // Roof mass for the dynamic analyses
    for node in ["N3", "N4"] {
        model.add_load(NodalMass::new(node, 6000.0, "Mass"))?;
    }

    model.add_combination(LoadCombination::new("1.4D").with_case("Dead", 1.4))?;
    model.add_combination(
        LoadCombination::new("1.2D + 1.0W")
            .with_case("Dead", 1.2)
            .with_case("Wind", 1.0),
    )?;

    // Run analysis
    println!("Running linear analysis...\n");
    let linear = model.analyze_linear()?;

    for (name, result) in &linear.results {
        println!("=== Results for {} ===\n", name);

        println!("Node Displacements:");
        for (node, disp) in &result.displacements {
            println!(
                "  {}: DX={:.4}mm, DY={:.4}mm, RZ={:.6}rad",
                node,
                disp.dx * 1000.0,
                disp.dy * 1000.0,
                disp.rz
            );
        }

        println!("\nSupport Reactions:");
        for (node, rxn) in &result.reactions {
            println!(
                "  {}: FX={:.2}kN, FY={:.2}kN, MZ={:.2}kN·m",
                node,
                rxn.fx / 1000.0,
                rxn.fy / 1000.0,
                rxn.mz / 1000.0
            );
        }

        println!("\nMember Forces:");
        for (element, forces) in &result.element_forces {
            let forces_i = forces.member_forces_i();
            let forces_j = forces.member_forces_j();
            println!(
                "  {}: P={:.2}kN, Vmax={:.2}kN, Mmax={:.2}kN·m",
                element,
                forces.axial() / 1000.0,
                forces_i.shear_y.abs().max(forces_j.shear_y.abs()) / 1000.0,
                forces_i.moment_z.abs().max(forces_j.moment_z.abs()) / 1000.0
            );
        }

        let eq = &result.equilibrium;
        println!(
            "\nEquilibrium: {} (imbalance FX={:.2e}, FY={:.2e})",
            if eq.balanced { "balanced" } else { "OUT OF BALANCE" },
            eq.imbalance[0],
            eq.imbalance[1]
        );
        println!();
    }

    let summary = &linear.summary;
    println!("Summary:");
    println!(
        "  Max displacement: {:.4}mm at {} ({})",
        summary.max_displacement * 1000.0,
        summary.max_disp_node,
        summary.max_disp_result
    );
    println!("  Max reaction: {:.2}kN at {}", summary.max_reaction / 1000.0, summary.max_reaction_node);
    println!("  Max axial: {:.2}kN in {}", summary.max_axial / 1000.0, summary.max_axial_member);
    println!();

    // P-Delta analysis
    println!("=== P-Delta Analysis Comparison ===\n");
    let p_delta = model.analyze_p_delta()?;
    let disp_linear = linear.node_displacement("N3", "1.2D + 1.0W")?;
    let disp_p_delta = p_delta.node_displacement("N3", "1.2D + 1.0W")?;
    println!("Lateral displacement at N3 (linear):  {:.4}mm", disp_linear.dx * 1000.0);
    println!(
        "Lateral displacement at N3 (P-Delta): {:.4}mm after {} iterations",
        disp_p_delta.dx * 1000.0,
        p_delta.result("1.2D + 1.0W")?.iterations
    );
    println!();

    // Modal and response spectrum analysis
    println!("=== Modal Analysis ===\n");
    let curve = SpectrumCurve::new(vec![[0.0, 2.5], [0.5, 2.5], [2.0, 0.625], [4.0, 0.3]])?;
    let report = model.analyze(&AnalysisRequest {
        static_analysis: None,
        modal: Some(ModalOptions::new(6).with_mass_participation(0.9)),
        spectrum: Some(SpectrumRequest {
            curve,
            options: SpectrumOptions::new(Direction::X),
        }),
    })?;

    if let Some(modal) = &report.modal {
        for mode in &modal.modes {
            println!(
                "  Mode {}: f={:.3}Hz, T={:.4}s, mass ratio X={:.1}% Y={:.1}% ({})",
                mode.number,
                mode.frequency,
                mode.period,
                mode.mass_ratio[0] * 100.0,
                mode.mass_ratio[1] * 100.0,
                mode.dominant_direction
            );
        }
    }

    for spectrum in &report.spectrum {
        let roof = spectrum.displacements.get("N3").map(|d| d[0]).unwrap_or_default();
        println!("  {} roof displacement (X): {:.4}mm", spectrum.rule, roof * 1000.0);
    }

    println!("\n=== Analysis Complete ===");
    Ok(())
}
