//! Bit-level reproducibility of sealed reports and their JSON round trip.

use rgf_core::budget::CancelToken;
use rgf_core::model::{Monomial, PolynomialFlowModel};
use rgf_engine::serde::{report_from_json, report_to_json};
use rgf_engine::{
    report_hash, solve, DomainSpec, McIntegrandSpec, ObservableDef, ObservableSpec, SolveConfig,
};
use rgf_mc::{AxisRange, SamplerOpts};

fn logistic_model() -> PolynomialFlowModel {
    PolynomialFlowModel::new(
        vec!["g".to_string()],
        vec![vec![
            Monomial {
                coefficient: 2.0,
                powers: vec![1],
            },
            Monomial {
                coefficient: -8.0,
                powers: vec![2],
            },
        ]],
    )
    .unwrap()
}

fn sampled_config() -> SolveConfig {
    SolveConfig {
        seeds: vec![vec![0.2]],
        resolutions: vec![32, 64],
        random_seed: 0xC0FFEE,
        sampler: SamplerOpts {
            samples: 8192,
            ..SamplerOpts::default()
        },
        observables: vec![ObservableSpec {
            name: "condensate".to_string(),
            def: ObservableDef::MonteCarlo {
                integrand: McIntegrandSpec::GaussianExponent { couplings: vec![0] },
                domain: DomainSpec {
                    axes: vec![AxisRange {
                        name: "x".to_string(),
                        lo: -3.0,
                        hi: 3.0,
                    }],
                },
                truncation: 0.0,
            },
            reference: None,
        }],
        ..SolveConfig::default()
    }
}

#[test]
fn identical_sessions_hash_identically() {
    let model = logistic_model();
    let config = sampled_config();
    let first = solve(&model, &config, CancelToken::new()).unwrap();
    let second = solve(&model, &config, CancelToken::new()).unwrap();

    // wall clock differs between the runs, the hash must not
    assert_eq!(
        report_hash(&first).unwrap(),
        report_hash(&second).unwrap()
    );
    assert_eq!(first.fixed_point, second.fixed_point);
    assert_eq!(first.observables, second.observables);
}

#[test]
fn changing_the_seed_changes_the_hash() {
    let model = logistic_model();
    let config = sampled_config();
    let mut reseeded = config.clone();
    reseeded.random_seed = 0xBEEF;

    let first = solve(&model, &config, CancelToken::new()).unwrap();
    let second = solve(&model, &reseeded, CancelToken::new()).unwrap();
    assert_ne!(
        report_hash(&first).unwrap(),
        report_hash(&second).unwrap()
    );
}

#[test]
fn report_round_trips_through_json() {
    let model = logistic_model();
    let report = solve(&model, &sampled_config(), CancelToken::new()).unwrap();

    let json = report_to_json(&report).unwrap();
    let back = report_from_json(&json).unwrap();
    assert_eq!(report, back);
    assert_eq!(report_hash(&report).unwrap(), report_hash(&back).unwrap());
}

#[test]
fn malformed_report_json_is_a_serde_error() {
    let err = report_from_json("{\"status\": \"certified\"").unwrap_err();
    assert_eq!(err.code(), "report-deserialize");
}
