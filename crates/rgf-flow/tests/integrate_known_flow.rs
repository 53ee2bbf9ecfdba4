use rgf_core::budget::Budget;
use rgf_core::model::{FlowModel, Monomial, PolynomialFlowModel};
use rgf_core::{CouplingVector, RgfError};
use rgf_flow::integrate::{integrate, StepMethod, StepPolicy};

fn one_coupling(terms: Vec<Monomial>) -> PolynomialFlowModel {
    PolynomialFlowModel::new(vec!["x".to_string()], vec![terms]).unwrap()
}

fn point(x: f64) -> CouplingVector {
    CouplingVector::new(vec!["x".to_string()], vec![x]).unwrap()
}

#[test]
fn rk4_tracks_exponential_decay() {
    // beta(x) = -x has the exact solution x(t) = x0 exp(-t).
    let model = one_coupling(vec![Monomial {
        coefficient: -1.0,
        powers: vec![1],
    }]);
    let policy = StepPolicy {
        flow_time_span: 3.0,
        ..StepPolicy::default()
    };
    let budget = Budget::iterations(100_000);
    let trajectory = integrate(&model, &point(1.0), &policy, &budget).unwrap();

    assert!(!trajectory.incomplete);
    let endpoint = trajectory.endpoint().values()[0];
    assert!(
        (endpoint - (-3.0_f64).exp()).abs() < 1e-4,
        "endpoint {endpoint} vs {}",
        (-3.0_f64).exp()
    );
    // Flow times are strictly increasing.
    for pair in trajectory.samples.windows(2) {
        assert!(pair[1].flow_time > pair[0].flow_time);
    }
}

#[test]
fn blowup_flow_reports_divergence() {
    // beta(x) = x^2 started above 1 blows up in finite flow time.
    let model = one_coupling(vec![Monomial {
        coefficient: 1.0,
        powers: vec![2],
    }]);
    let policy = StepPolicy {
        method: StepMethod::Euler,
        adaptive: false,
        initial_step: 0.01,
        divergence_bound: 1e6,
        flow_time_span: 10.0,
        ..StepPolicy::default()
    };
    let budget = Budget::iterations(100_000);
    let err = integrate(&model, &point(1.5), &policy, &budget).unwrap_err();
    assert_eq!(err.code(), "divergence");
}

/// Beta function with a step discontinuity the controller cannot resolve.
struct Cliff {
    names: Vec<String>,
}

impl FlowModel for Cliff {
    fn dim(&self) -> usize {
        1
    }
    fn names(&self) -> &[String] {
        &self.names
    }
    fn beta(&self, p: &CouplingVector) -> Result<CouplingVector, RgfError> {
        let x = p.values()[0];
        let rate = if x < 1.0 { 1.0 } else { 1e12 };
        p.with_values(vec![rate])
    }
}

#[test]
fn unresolvable_discontinuity_reports_step_underflow() {
    let model = Cliff {
        names: vec!["x".to_string()],
    };
    let policy = StepPolicy {
        method: StepMethod::Euler,
        initial_step: 0.1,
        min_step: 1e-6,
        error_tolerance: 1e-9,
        flow_time_span: 1.0,
        ..StepPolicy::default()
    };
    let budget = Budget::iterations(100_000);
    let start = point(1.0 - 1e-13);
    let err = integrate(&model, &start, &policy, &budget).unwrap_err();
    assert_eq!(err.code(), "step-underflow");
}

#[test]
fn budget_stop_yields_incomplete_trajectory() {
    let model = one_coupling(vec![Monomial {
        coefficient: -1.0,
        powers: vec![1],
    }]);
    let policy = StepPolicy::default();
    let budget = Budget::iterations(3);
    let trajectory = integrate(&model, &point(1.0), &policy, &budget).unwrap();
    assert!(trajectory.incomplete);
    assert_eq!(trajectory.stop_reason.as_deref(), Some("iteration-cap"));
    assert_eq!(trajectory.steps_taken, 3);
}

#[test]
fn euler_and_rk4_agree_on_slow_flows() {
    let model = one_coupling(vec![Monomial {
        coefficient: -0.1,
        powers: vec![1],
    }]);
    let budget = Budget::iterations(1_000_000);
    let euler = integrate(
        &model,
        &point(1.0),
        &StepPolicy {
            method: StepMethod::Euler,
            initial_step: 1e-3,
            max_step: 1e-3,
            flow_time_span: 1.0,
            ..StepPolicy::default()
        },
        &budget,
    )
    .unwrap();
    let rk4 = integrate(
        &model,
        &point(1.0),
        &StepPolicy {
            method: StepMethod::Rk4,
            flow_time_span: 1.0,
            ..StepPolicy::default()
        },
        &budget,
    )
    .unwrap();
    let a = euler.endpoint().values()[0];
    let b = rk4.endpoint().values()[0];
    assert!((a - b).abs() < 1e-4, "euler {a} vs rk4 {b}");
}
