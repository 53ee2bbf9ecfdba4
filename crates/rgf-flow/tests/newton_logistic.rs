use std::time::Duration;

use rgf_core::budget::{Budget, CancelToken};
use rgf_core::model::{Monomial, PolynomialFlowModel};
use rgf_core::CouplingVector;
use rgf_flow::newton::{find_fixed_point, SeedOutcome, SolverOpts};

/// Logistic-type flow beta(x) = -2x + c x^2 with the nontrivial fixed point
/// at x* = 2/c.
fn logistic(c: f64) -> PolynomialFlowModel {
    PolynomialFlowModel::new(
        vec!["x".to_string()],
        vec![vec![
            Monomial {
                coefficient: -2.0,
                powers: vec![1],
            },
            Monomial {
                coefficient: c,
                powers: vec![2],
            },
        ]],
    )
    .unwrap()
}

fn seed(x: f64) -> CouplingVector {
    CouplingVector::new(vec!["x".to_string()], vec![x]).unwrap()
}

#[test]
fn converges_to_the_nontrivial_fixed_point() {
    let model = logistic(0.5);
    let opts = SolverOpts::default();
    let budget = Budget::iterations(1_000);
    let seeds = vec![seed(3.0), seed(6.0), seed(10.0)];
    let report = find_fixed_point(&model, &seeds, &opts, &budget).unwrap();

    let x_star = report.candidate.point.values()[0];
    assert!((x_star - 4.0).abs() < 1e-6, "x* = {x_star}");
    assert!(report.candidate.residual_norm < opts.tolerance);
    assert_eq!(report.seed_records.len(), 3);
    for record in &report.seed_records {
        assert!(
            matches!(record.outcome, SeedOutcome::Converged { .. }),
            "seed {} did not converge: {:?}",
            record.seed_index,
            record.outcome
        );
    }
}

#[test]
fn solve_is_deterministic() {
    let model = logistic(0.5);
    let opts = SolverOpts::default();
    let budget = Budget::iterations(1_000);
    let seeds = vec![seed(3.0), seed(10.0)];
    let first = find_fixed_point(&model, &seeds, &opts, &budget).unwrap();
    let second = find_fixed_point(&model, &seeds, &opts, &budget).unwrap();
    assert_eq!(first, second);
}

#[test]
fn distinct_basins_are_rejected() {
    // Seed 0.5 falls into the trivial fixed point at 0, seed 3 into x* = 4.
    let model = logistic(0.5);
    let opts = SolverOpts::default();
    let budget = Budget::iterations(1_000);
    let seeds = vec![seed(0.5), seed(3.0)];
    let err = find_fixed_point(&model, &seeds, &opts, &budget).unwrap_err();
    assert_eq!(err.code(), "multiple-fixed-points");
    let info = err.info();
    assert!(info.context.contains_key("distance"));
    assert!(info.hint.is_some());
}

#[test]
fn no_seed_converging_is_an_error() {
    let model = logistic(0.5);
    let opts = SolverOpts {
        max_iterations: 1,
        tolerance: 1e-14,
        ..SolverOpts::default()
    };
    let budget = Budget::iterations(1_000);
    let err = find_fixed_point(&model, &[seed(30.0)], &opts, &budget).unwrap_err();
    assert_eq!(err.code(), "no-convergence");
}

#[test]
fn cancelled_solve_reports_a_timeout() {
    let model = logistic(0.5);
    let token = CancelToken::new();
    token.cancel();
    let budget = Budget::iterations(1_000).with_cancel(token);
    let seeds = vec![seed(3.0), seed(10.0)];
    let err = find_fixed_point(&model, &seeds, &SolverOpts::default(), &budget).unwrap_err();
    assert_eq!(err.code(), "timeout");
}

#[test]
fn expired_deadline_reports_a_timeout() {
    let model = logistic(0.5);
    let budget = Budget::iterations(1_000).with_timeout(Duration::from_secs(0));
    let err =
        find_fixed_point(&model, &[seed(3.0)], &SolverOpts::default(), &budget).unwrap_err();
    assert_eq!(err.code(), "timeout");
}

#[test]
fn stopped_seeds_record_why_they_stopped() {
    let model = logistic(0.5);
    let token = CancelToken::new();
    token.cancel();
    let budget = Budget::iterations(1_000).with_cancel(token);
    let err = find_fixed_point(&model, &[seed(3.0)], &SolverOpts::default(), &budget).unwrap_err();
    let info = err.info();
    assert!(info.context["seeds"].contains("exhausted"));
}

#[test]
fn empty_seed_list_is_rejected() {
    let model = logistic(0.5);
    let err = find_fixed_point(&model, &[], &SolverOpts::default(), &Budget::iterations(10))
        .unwrap_err();
    assert_eq!(err.code(), "bad-config");
}
