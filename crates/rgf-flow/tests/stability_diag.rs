use rgf_core::model::{Monomial, PolynomialFlowModel};
use rgf_core::CouplingVector;
use rgf_flow::stability::{analyze, EigenClass, LyapunovOpts, StabilityOpts};

fn linear_model(rates: &[f64]) -> PolynomialFlowModel {
    let names: Vec<String> = (0..rates.len()).map(|i| format!("g{i}")).collect();
    let components = rates
        .iter()
        .enumerate()
        .map(|(i, &rate)| {
            let mut powers = vec![0u32; rates.len()];
            powers[i] = 1;
            vec![Monomial {
                coefficient: rate,
                powers,
            }]
        })
        .collect();
    PolynomialFlowModel::new(names, components).unwrap()
}

fn origin(dim: usize) -> CouplingVector {
    CouplingVector::unnamed(vec![0.0; dim]).unwrap()
}

#[test]
fn diagonal_jacobian_is_classified_per_mode() {
    // beta = (3x, -y): one relevant and one irrelevant direction.
    let model = linear_model(&[3.0, -1.0]);
    let verdict = analyze(&model, &origin(2), &StabilityOpts::default(), 7).unwrap();

    assert_eq!(verdict.eigenvalues.len(), 2);
    // Deterministic order: descending real part.
    assert!((verdict.eigenvalues[0].re - 3.0).abs() < 1e-9);
    assert_eq!(verdict.eigenvalues[0].class, EigenClass::Relevant);
    assert!((verdict.eigenvalues[1].re + 1.0).abs() < 1e-9);
    assert_eq!(verdict.eigenvalues[1].class, EigenClass::Irrelevant);
    assert_eq!(verdict.relevant_count(), 1);
    assert_eq!(verdict.jacobian_method, "analytic");
    // Certificate not attempted by default.
    assert!(verdict.lyapunov.is_none());
    assert!(!verdict.globally_attractive);
}

#[test]
fn contracting_flow_passes_the_lyapunov_certificate() {
    // beta = -v: (v - v*) . beta(v) = -|v|^2 < 0 everywhere.
    let model = linear_model(&[-1.0, -1.0]);
    let opts = StabilityOpts {
        lyapunov: LyapunovOpts {
            enabled: true,
            samples: 2048,
            ..LyapunovOpts::default()
        },
    };
    let verdict = analyze(&model, &origin(2), &opts, 7).unwrap();
    let evidence = verdict.lyapunov.unwrap();
    assert!(evidence.pass);
    assert!(evidence.worst_derivative < 0.0);
    assert!(verdict.globally_attractive);
}

#[test]
fn expanding_flow_fails_the_lyapunov_certificate() {
    let model = linear_model(&[1.0, 1.0]);
    let opts = StabilityOpts {
        lyapunov: LyapunovOpts {
            enabled: true,
            samples: 512,
            ..LyapunovOpts::default()
        },
    };
    let verdict = analyze(&model, &origin(2), &opts, 7).unwrap();
    let evidence = verdict.lyapunov.unwrap();
    assert!(!evidence.pass);
    assert!(!verdict.globally_attractive);
}

#[test]
fn lyapunov_sampling_is_reproducible() {
    let model = linear_model(&[-1.0, -2.0]);
    let opts = StabilityOpts {
        lyapunov: LyapunovOpts {
            enabled: true,
            samples: 256,
            ..LyapunovOpts::default()
        },
    };
    let first = analyze(&model, &origin(2), &opts, 99).unwrap();
    let second = analyze(&model, &origin(2), &opts, 99).unwrap();
    assert_eq!(first, second);
}

/// Contracts in the outer shell of the sampling box but expands inside
/// `|x| < 0.4`, so descent must be checked all the way down to the fixed
/// point.
struct InnerRepeller {
    names: Vec<String>,
}

impl rgf_core::model::FlowModel for InnerRepeller {
    fn dim(&self) -> usize {
        1
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn beta(&self, point: &CouplingVector) -> Result<CouplingVector, rgf_core::RgfError> {
        let x = point.values()[0];
        point.with_values(vec![50.0 * x * (0.4 - x.abs())])
    }
}

#[test]
fn expansion_near_the_fixed_point_is_not_masked_by_a_large_margin() {
    let model = InnerRepeller {
        names: vec!["x".to_string()],
    };
    let opts = StabilityOpts {
        lyapunov: LyapunovOpts {
            enabled: true,
            samples: 512,
            margin: 0.5,
            half_width: 1.0,
        },
    };
    let verdict = analyze(&model, &origin(1), &opts, 7).unwrap();
    let evidence = verdict.lyapunov.unwrap();
    assert!(!evidence.pass);
    assert!(evidence.worst_derivative > 0.0);
    assert!(!verdict.globally_attractive);
}

#[test]
fn dimension_mismatch_is_rejected() {
    let model = linear_model(&[-1.0, -2.0]);
    let err = analyze(&model, &origin(3), &StabilityOpts::default(), 7).unwrap_err();
    assert_eq!(err.code(), "shape-mismatch");
}
