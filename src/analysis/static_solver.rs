//! Linear and P-Delta static solution
//!
//! The reduced stiffness is factorized once and every load case and
//! combination is solved against it in parallel. P-Delta runs own their
//! geometric stiffness and refactorize each iteration.

use std::collections::BTreeMap;

use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;

use super::{CancelFlag, StaticOptions};
use crate::assembly::{AssembledModel, LoadVector};
use crate::error::{NumericalAnomaly, SolverError, SolverResult};
use crate::math::{sparse_matvec, FactorizationError, SkylineCholesky, Vector};
use crate::recovery::{self, GeometricState};
use crate::results::{AnalysisType, ResultSource, StaticAnalysis, StaticResult};
use crate::validation::ValidatedModel;

/// Pivot ratio above which the stiffness is reported as ill-conditioned
pub const ILL_CONDITIONED_RATIO: f64 = 1e12;

/// Assemble and solve a validated model
pub fn solve(validated: &ValidatedModel, options: &StaticOptions, cancel: &CancelFlag) -> SolverResult<StaticAnalysis> {
    let assembled = AssembledModel::new(validated)?;
    solve_assembled(&assembled, options, cancel)
}

/// Solve every selected load case and combination of an assembled model
pub fn solve_assembled(
    assembled: &AssembledModel<'_>,
    options: &StaticOptions,
    cancel: &CancelFlag,
) -> SolverResult<StaticAnalysis> {
    let targets = select_targets(assembled.validated(), options)?;
    cancel.check()?;

    let names: Vec<&str> = targets.iter().map(|(n, _)| n.as_str()).collect();
    let factor = factorize(assembled, &assembled.k_ff, || format!("stiffness for {}", names.join(", ")))?;
    log::info!(
        "Factorized {} free DOFs (profile {}), solving {} load case(s)",
        factor.size(),
        factor.profile(),
        targets.len()
    );

    let mut warnings = Vec::new();
    let pivot_ratio = factor.pivot_ratio();
    if pivot_ratio > ILL_CONDITIONED_RATIO {
        log::warn!("Stiffness is ill-conditioned: pivot ratio {:.3e}", pivot_ratio);
        warnings.push(NumericalAnomaly::IllConditioned { pivot_ratio });
    }

    let results = targets
        .par_iter()
        .map(|(name, source)| {
            cancel.check()?;
            let loads = assembled.loads_for(name)?;
            let result = match options.analysis_type {
                AnalysisType::Linear => solve_linear(assembled, &factor, name, *source, &loads, options),
                AnalysisType::PDelta => solve_p_delta(assembled, &factor, name, *source, &loads, options, cancel)?,
            };
            Ok((name.clone(), result))
        })
        .collect::<SolverResult<BTreeMap<String, StaticResult>>>()?;

    let summary = recovery::summarize(assembled, results.values());

    Ok(StaticAnalysis {
        analysis_type: options.analysis_type,
        results,
        summary,
        warnings,
    })
}

/// Load cases and combinations to solve, in name order
fn select_targets(validated: &ValidatedModel, options: &StaticOptions) -> SolverResult<Vec<(String, ResultSource)>> {
    let model = validated.model();
    let source_of = |name: &str| -> SolverResult<ResultSource> {
        if model.load_cases.contains_key(name) {
            Ok(ResultSource::LoadCase)
        } else if model.combinations.contains_key(name) {
            Ok(ResultSource::Combination)
        } else {
            Err(SolverError::LoadCaseNotFound(name.to_string()))
        }
    };

    let mut targets = match &options.targets {
        Some(names) => names
            .iter()
            .map(|name| Ok((name.clone(), source_of(name)?)))
            .collect::<SolverResult<Vec<_>>>()?,
        None => model
            .load_cases
            .keys()
            .map(|name| (name.clone(), ResultSource::LoadCase))
            .chain(
                model
                    .combinations
                    .keys()
                    .map(|name| (name.clone(), ResultSource::Combination)),
            )
            .collect(),
    };

    if let Some(tags) = &options.combo_tags {
        targets.retain(|(name, source)| match source {
            ResultSource::LoadCase => true,
            ResultSource::Combination => model
                .combinations
                .get(name)
                .is_some_and(|combo| combo.tags.iter().any(|t| tags.contains(t))),
        });
    }

    targets.sort_by(|a, b| a.0.cmp(&b.0));
    targets.dedup_by(|a, b| a.0 == b.0);
    Ok(targets)
}

/// Factorize a reduced stiffness, naming the offending DOF on failure
pub(crate) fn factorize(
    assembled: &AssembledModel<'_>,
    k_ff: &CsrMatrix<f64>,
    context: impl FnOnce() -> String,
) -> SolverResult<SkylineCholesky> {
    SkylineCholesky::factorize(k_ff).map_err(|err| instability(assembled, err, context()))
}

fn instability(assembled: &AssembledModel<'_>, err: FactorizationError, context: String) -> SolverError {
    let dofs = assembled
        .partition
        .free()
        .get(err.index)
        .map(|&dof| vec![assembled.dof_map.label(dof)])
        .unwrap_or_default();
    log::warn!("Factorization failed at pivot {} ({:.3e})", err.index, err.pivot);
    SolverError::Instability { context, dofs }
}

/// Full displacement vector from a factorized reduced stiffness
///
/// Enforced displacements move to the right-hand side as -K_fr u_r.
fn displacements(
    assembled: &AssembledModel<'_>,
    factor: &SkylineCholesky,
    k_fr: &CsrMatrix<f64>,
    loads: &LoadVector,
) -> Vector {
    let partition = &assembled.partition;
    let mut rhs = partition.gather_free(&loads.forces);
    if partition.enforced().iter().any(|&v| v != 0.0) {
        rhs -= sparse_matvec(k_fr, partition.enforced());
    }
    partition.scatter(&factor.solve(&rhs))
}

fn solve_linear(
    assembled: &AssembledModel<'_>,
    factor: &SkylineCholesky,
    name: &str,
    source: ResultSource,
    loads: &LoadVector,
    options: &StaticOptions,
) -> StaticResult {
    let u = displacements(assembled, factor, &assembled.k_fr, loads);
    log::debug!("'{}': max displacement {:.6e}", name, u.amax());
    recovery::recover(assembled, name, source, &u, loads, None, options.equilibrium_tolerance)
}

/// Iterate K + Kg(P) until the displacements settle
///
/// Axial forces come from the previous iterate, so the converged solution
/// satisfies equilibrium in the deformed configuration to first order.
fn solve_p_delta(
    assembled: &AssembledModel<'_>,
    factor: &SkylineCholesky,
    name: &str,
    source: ResultSource,
    loads: &LoadVector,
    options: &StaticOptions,
    cancel: &CancelFlag,
) -> SolverResult<StaticResult> {
    let mut u = displacements(assembled, factor, &assembled.k_fr, loads);
    let mut residual = f64::INFINITY;

    for iteration in 1..=options.max_iterations {
        cancel.check()?;

        let axial = assembled.axial_forces(&u, loads);
        let kg = assembled.geometric_stiffness(&axial);
        let combined = &assembled.stiffness + &kg;
        let (k_ff, k_fr) = assembled.reduce(&combined);
        let factor = factorize(assembled, &k_ff, || format!("'{}' P-Delta iteration {}", name, iteration))?;

        let next = displacements(assembled, &factor, &k_fr, loads);
        let change = (&next - &u).amax();
        residual = change / next.amax().max(f64::EPSILON);
        u = next;
        log::debug!("'{}': P-Delta iteration {} relative change {:.3e}", name, iteration, residual);

        if residual <= options.tolerance {
            log::info!("'{}': P-Delta converged in {} iterations", name, iteration);
            let geometric = GeometricState {
                axial: &axial,
                stiffness: &kg,
            };
            let mut result = recovery::recover(
                assembled,
                name,
                source,
                &u,
                loads,
                Some(geometric),
                options.equilibrium_tolerance,
            );
            result.iterations = iteration;
            return Ok(result);
        }
    }

    Err(SolverError::Convergence {
        context: format!("P-Delta analysis of '{}'", name),
        iterations: options.max_iterations,
        residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Element, Material, Node, Section, Support};
    use crate::loads::{LoadCombination, NodeLoad};
    use crate::model::StructuralModel;
    use approx::assert_relative_eq;

    fn cantilever() -> StructuralModel {
        let mut model = StructuralModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("S", Section::rectangular(0.2, 0.4)).unwrap();
        model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("N2", Node::new(4.0, 0.0, 0.0)).unwrap();
        model.add_element("M1", Element::beam("N1", "N2", "Steel", "S")).unwrap();
        model.add_support("N1", Support::fixed()).unwrap();
        model.add_load(NodeLoad::force("N2", 0.0, -1000.0, 0.0, "Dead")).unwrap();
        model.add_load(NodeLoad::force("N2", 500.0, 0.0, 0.0, "Wind")).unwrap();
        model
            .add_combination(LoadCombination::new("ULS").with_case("Dead", 1.2).with_case("Wind", 1.5).with_tag("strength"))
            .unwrap();
        model
            .add_combination(LoadCombination::new("SLS").with_case("Dead", 1.0).with_tag("service"))
            .unwrap();
        model
    }

    #[test]
    fn test_combination_is_factored_sum_of_cases() {
        let analysis = cantilever().analyze_linear().unwrap();
        let dead = analysis.node_displacement("N2", "Dead").unwrap();
        let wind = analysis.node_displacement("N2", "Wind").unwrap();
        let uls = analysis.node_displacement("N2", "ULS").unwrap();
        assert_relative_eq!(uls.dy, 1.2 * dead.dy + 1.5 * wind.dy, max_relative = 1e-10);
        assert_relative_eq!(uls.dx, 1.2 * dead.dx + 1.5 * wind.dx, max_relative = 1e-10);
        assert_eq!(analysis.results["ULS"].source, ResultSource::Combination);
    }

    #[test]
    fn test_target_selection() {
        let model = cantilever();
        let analysis = model
            .analyze_static(&StaticOptions::linear().with_targets(["ULS", "Dead"]))
            .unwrap();
        assert_eq!(analysis.names(), vec!["Dead".to_string(), "ULS".to_string()]);

        let analysis = model
            .analyze_static(&StaticOptions::linear().with_tags(vec!["service".to_string()]))
            .unwrap();
        assert!(analysis.results.contains_key("SLS"));
        assert!(!analysis.results.contains_key("ULS"));

        let missing = model.analyze_static(&StaticOptions::linear().with_targets(["Snow"]));
        assert!(matches!(missing, Err(SolverError::LoadCaseNotFound(_))));
    }

    #[test]
    fn test_cancelled_run() {
        let model = cantilever();
        let validated = model.validate().unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(
            solve(&validated, &StaticOptions::linear(), &cancel),
            Err(SolverError::Cancelled)
        ));
    }

    #[test]
    fn test_p_delta_iteration_limit() {
        let mut model = cantilever();
        // A heavy axial compression makes the second-order solution move
        model.add_load(NodeLoad::force("N2", -2.0e6, 0.0, 0.0, "Dead")).unwrap();
        let result = model.analyze_static(&StaticOptions::p_delta().with_max_iter(1).with_tolerance(1e-14));
        assert!(matches!(result, Err(SolverError::Convergence { iterations: 1, .. })));
    }
}
