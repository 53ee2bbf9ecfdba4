//! Full solve sessions on a one-coupling logistic flow with an
//! infrared-attractive fixed point at g* = 1/4.

use rgf_core::budget::CancelToken;
use rgf_core::model::{Monomial, PolynomialFlowModel};
use rgf_engine::{
    solve, ClosedForm, DomainSpec, McIntegrandSpec, ObservableDef, ObservableSpec,
    ReferenceValue, ReportStatus, SolveConfig,
};
use rgf_flow::EigenClass;
use rgf_mc::{AxisRange, SamplerOpts, SamplingPolicy};

// beta(g) = 2g - 8g^2, zeros at 0 and 1/4, the nontrivial zero attractive.
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

fn base_config() -> SolveConfig {
    SolveConfig {
        seeds: vec![vec![0.2], vec![0.3]],
        resolutions: vec![64, 128],
        observables: vec![
            ObservableSpec {
                name: "vertex".to_string(),
                def: ObservableDef::ClosedForm {
                    form: ClosedForm::VertexCorrection { coupling: 0 },
                },
                reference: None,
            },
            ObservableSpec {
                name: "log-series".to_string(),
                def: ObservableDef::ClosedForm {
                    form: ClosedForm::LogSeries {
                        coupling: 0,
                        terms: 8,
                    },
                },
                reference: Some(ReferenceValue {
                    value: 1.25_f64.ln(),
                    sigma: 1e-6,
                }),
            },
            ObservableSpec {
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
            },
        ],
        ..SolveConfig::default()
    }
}

#[test]
fn session_certifies_the_attractive_fixed_point() {
    let model = logistic_model();
    let report = solve(&model, &base_config(), CancelToken::new()).unwrap();

    assert_eq!(report.status, ReportStatus::Certified);
    assert!((report.fixed_point.point.values()[0] - 0.25).abs() < 1e-8);
    assert_eq!(report.stability.eigenvalues.len(), 1);
    let mode = &report.stability.eigenvalues[0];
    assert!((mode.re + 2.0).abs() < 1e-6);
    assert_eq!(mode.class, EigenClass::Irrelevant);
    assert_eq!(report.stability.jacobian_method, "analytic");

    // erf(3 * sqrt(0.25)) * sqrt(pi / 0.25)
    let condensate_truth = 3.424_754;
    let condensate = report
        .observables
        .iter()
        .find(|result| result.name == "condensate")
        .unwrap();
    assert!((condensate.value - condensate_truth).abs() < 0.05);
    assert!(condensate.uncertainty > 0.0);
    assert!(!condensate.poor_mixing);

    let series = report
        .observables
        .iter()
        .find(|result| result.name == "log-series")
        .unwrap();
    assert!((series.value - 1.25_f64.ln()).abs() < 1e-6);
    let deviation = series.reference_sigma_deviation.unwrap();
    assert!(deviation < 3.0);

    let vertex = report
        .observables
        .iter()
        .find(|result| result.name == "vertex")
        .unwrap();
    assert!((vertex.value - 0.250_099).abs() < 1e-4);
    assert_eq!(vertex.breakdown.statistical, 0.0);
    assert!(vertex.breakdown.truncation > 0.0);
}

#[test]
fn provenance_records_the_full_method_trail() {
    let model = logistic_model();
    let report = solve(&model, &base_config(), CancelToken::new()).unwrap();
    let provenance = &report.provenance;

    assert!(!provenance.input_hash.is_empty());
    assert_eq!(provenance.methods["integrator"], "rk4");
    assert_eq!(provenance.methods["solver"], "damped-newton");
    assert_eq!(provenance.methods["jacobian"], "analytic");
    assert_eq!(provenance.methods["sampler"], "plain");
    assert_eq!(provenance.resolutions, vec![64, 128]);
    // the flow probe endpoint joins the two configured seeds
    assert_eq!(provenance.counts["seeds"], 3);
    assert!(!provenance.created_at.is_empty());
}

#[test]
fn poorly_mixed_chain_downgrades_the_report_to_partial() {
    let model = logistic_model();
    let mut config = base_config();
    config.sampler = SamplerOpts {
        policy: SamplingPolicy::Mcmc,
        samples: 4096,
        burn_in: 512,
        thinning: 2,
        proposal_scale: 0.002,
        ..SamplerOpts::default()
    };
    let report = solve(&model, &config, CancelToken::new()).unwrap();

    assert_eq!(report.status, ReportStatus::Partial);
    let condensate = report
        .observables
        .iter()
        .find(|result| result.name == "condensate")
        .unwrap();
    assert!(condensate.poor_mixing);
}

#[test]
fn pre_cancelled_session_reports_a_timeout() {
    let model = logistic_model();
    let token = CancelToken::new();
    token.cancel();
    let err = solve(&model, &base_config(), token).unwrap_err();
    assert_eq!(err.code(), "timeout");
}

#[test]
fn expired_wall_clock_deadline_reports_a_timeout() {
    let model = logistic_model();
    let mut config = base_config();
    config.timeout_seconds = Some(1e-9);
    let err = solve(&model, &config, CancelToken::new()).unwrap_err();
    assert_eq!(err.code(), "timeout");
}

#[test]
fn empty_seed_list_is_rejected_before_any_work() {
    let model = logistic_model();
    let config = SolveConfig::default();
    let err = solve(&model, &config, CancelToken::new()).unwrap_err();
    assert_eq!(err.code(), "bad-config");
}
