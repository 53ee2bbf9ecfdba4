//! Explicit flow integration with adaptive step-size control.

use rgf_core::budget::{Budget, BudgetStop};
use rgf_core::coupling::CouplingVector;
use rgf_core::errors::{ErrorInfo, RgfError};
use rgf_core::model::FlowModel;
use serde::{Deserialize, Serialize};

fn divergence_error(magnitude: f64, time: f64, bound: f64) -> RgfError {
    RgfError::Flow(
        ErrorInfo::new("divergence", "flow trajectory left the stable region")
            .with_context("max_abs", format!("{magnitude:e}"))
            .with_context("flow_time", format!("{time}"))
            .with_context("bound", format!("{bound:e}"))
            .with_hint("lower the initial step or start closer to the fixed point"),
    )
}

fn underflow_error(step: f64, time: f64, min_step: f64) -> RgfError {
    RgfError::Flow(
        ErrorInfo::new(
            "step-underflow",
            "adaptive controller requires a step below the minimum",
        )
        .with_context("step", format!("{step:e}"))
        .with_context("flow_time", format!("{time}"))
        .with_context("min_step", format!("{min_step:e}")),
    )
}

/// Explicit stepping scheme used by the integrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StepMethod {
    /// First-order explicit Euler.
    Euler,
    /// Classical fourth-order Runge-Kutta.
    #[default]
    Rk4,
}

impl StepMethod {
    /// Stable label recorded in provenance.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepMethod::Euler => "euler",
            StepMethod::Rk4 => "rk4",
        }
    }
}

fn default_initial_step() -> f64 {
    1e-2
}

fn default_error_tolerance() -> f64 {
    1e-6
}

fn default_min_step() -> f64 {
    1e-12
}

fn default_max_step() -> f64 {
    1.0
}

fn default_divergence_bound() -> f64 {
    1e6
}

fn default_flow_time_span() -> f64 {
    10.0
}

fn default_adaptive() -> bool {
    true
}

/// Step-size policy for [`integrate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPolicy {
    /// Stepping scheme.
    #[serde(default)]
    pub method: StepMethod,
    /// Initial step size in flow time.
    #[serde(default = "default_initial_step")]
    pub initial_step: f64,
    /// Local truncation-error tolerance for the adaptive controller.
    #[serde(default = "default_error_tolerance")]
    pub error_tolerance: f64,
    /// Smallest step the controller may request before failing.
    #[serde(default = "default_min_step")]
    pub min_step: f64,
    /// Largest step the controller may grow to.
    #[serde(default = "default_max_step")]
    pub max_step: f64,
    /// Coupling magnitude beyond which the flow counts as divergent.
    #[serde(default = "default_divergence_bound")]
    pub divergence_bound: f64,
    /// Total flow time to integrate over.
    #[serde(default = "default_flow_time_span")]
    pub flow_time_span: f64,
    /// Whether the adaptive controller is active (fixed-step otherwise).
    #[serde(default = "default_adaptive")]
    pub adaptive: bool,
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            method: StepMethod::Rk4,
            initial_step: default_initial_step(),
            error_tolerance: default_error_tolerance(),
            min_step: default_min_step(),
            max_step: default_max_step(),
            divergence_bound: default_divergence_bound(),
            flow_time_span: default_flow_time_span(),
            adaptive: true,
        }
    }
}

/// One `(flow_time, point)` sample on a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    /// Flow time of the sample, increasing toward the infrared.
    pub flow_time: f64,
    /// Coupling vector at that time.
    pub point: CouplingVector,
}

/// Ordered, finite sequence of trajectory samples.
///
/// Append-only during generation, immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowTrajectory {
    /// Recorded samples including the initial point.
    pub samples: Vec<TrajectorySample>,
    /// Number of accepted integration steps.
    pub steps_taken: usize,
    /// Whether the budget stopped integration before the time span was covered.
    pub incomplete: bool,
    /// Budget stop reason, when `incomplete` is set.
    pub stop_reason: Option<String>,
}

impl FlowTrajectory {
    /// Final point of the trajectory.
    pub fn endpoint(&self) -> &CouplingVector {
        // samples always holds at least the initial point
        &self.samples[self.samples.len() - 1].point
    }
}

fn euler_step(
    model: &dyn FlowModel,
    point: &CouplingVector,
    h: f64,
) -> Result<CouplingVector, RgfError> {
    let k1 = model.beta(point)?;
    point.add(&k1.scale(h))
}

fn rk4_step(
    model: &dyn FlowModel,
    point: &CouplingVector,
    h: f64,
) -> Result<CouplingVector, RgfError> {
    let k1 = model.beta(point)?;
    let k2 = model.beta(&point.add(&k1.scale(h / 2.0))?)?;
    let k3 = model.beta(&point.add(&k2.scale(h / 2.0))?)?;
    let k4 = model.beta(&point.add(&k3.scale(h))?)?;
    let increment = k1
        .add(&k2.scale(2.0))?
        .add(&k3.scale(2.0))?
        .add(&k4)?
        .scale(h / 6.0);
    point.add(&increment)
}

fn take_step(
    model: &dyn FlowModel,
    method: StepMethod,
    point: &CouplingVector,
    h: f64,
) -> Result<CouplingVector, RgfError> {
    match method {
        StepMethod::Euler => euler_step(model, point, h),
        StepMethod::Rk4 => rk4_step(model, point, h),
    }
}

/// Outcome of one adaptive step attempt.
struct AcceptedStep {
    point: CouplingVector,
    step: f64,
    next_step: f64,
}

fn adaptive_step(
    model: &dyn FlowModel,
    policy: &StepPolicy,
    current: &CouplingVector,
    mut h: f64,
    time: f64,
) -> Result<AcceptedStep, RgfError> {
    loop {
        let full = take_step(model, policy.method, current, h)?;
        let half = take_step(model, policy.method, current, h / 2.0)?;
        let two_half = take_step(model, policy.method, &half, h / 2.0)?;
        let err = full.sub(&two_half)?.norm();
        if err.is_finite() && err <= policy.error_tolerance {
            // Keep the two-half-step result: it carries the smaller local error.
            let next_step = if err <= policy.error_tolerance * 0.1 {
                (h * 2.0).min(policy.max_step)
            } else {
                h
            };
            return Ok(AcceptedStep {
                point: two_half,
                step: h,
                next_step,
            });
        }
        let halved = h / 2.0;
        if halved < policy.min_step {
            return Err(underflow_error(halved, time, policy.min_step));
        }
        h = halved;
    }
}

/// Integrates the flow from `initial` over `policy.flow_time_span`.
///
/// Pure and deterministic given the model and inputs. The adaptive controller
/// compares one full step against two half steps; the step is halved while the
/// difference exceeds `error_tolerance` and doubled (up to `max_step`) when it
/// is well under. Fails with `divergence` when any coupling magnitude exceeds
/// `divergence_bound` and with `step-underflow` when the controller cannot
/// maintain tolerance above `min_step`. A budget stop yields a trajectory
/// tagged `incomplete` rather than an error.
pub fn integrate(
    model: &dyn FlowModel,
    initial: &CouplingVector,
    policy: &StepPolicy,
    budget: &Budget,
) -> Result<FlowTrajectory, RgfError> {
    if policy.initial_step <= 0.0 || policy.flow_time_span <= 0.0 {
        return Err(RgfError::Config(ErrorInfo::new(
            "bad-config",
            "step size and flow time span must be positive",
        )));
    }
    if !initial.is_finite() || initial.max_abs() > policy.divergence_bound {
        return Err(divergence_error(initial.max_abs(), 0.0, policy.divergence_bound));
    }

    let mut samples = vec![TrajectorySample {
        flow_time: 0.0,
        point: initial.clone(),
    }];
    let mut time = 0.0;
    let mut h = policy.initial_step.min(policy.max_step);
    let mut steps_taken = 0usize;
    let mut stop: Option<BudgetStop> = None;

    while time < policy.flow_time_span {
        if let Some(reason) = budget.check(steps_taken) {
            stop = Some(reason);
            break;
        }
        let current = samples[samples.len() - 1].point.clone();
        let attempt = h.min(policy.flow_time_span - time);

        let (next, taken) = if policy.adaptive {
            let accepted = adaptive_step(model, policy, &current, attempt, time)?;
            h = accepted.next_step;
            (accepted.point, accepted.step)
        } else {
            (take_step(model, policy.method, &current, attempt)?, attempt)
        };

        time += taken;
        steps_taken += 1;
        let magnitude = next.max_abs();
        if !next.is_finite() || magnitude > policy.divergence_bound {
            return Err(divergence_error(magnitude, time, policy.divergence_bound));
        }
        samples.push(TrajectorySample {
            flow_time: time,
            point: next,
        });
    }

    Ok(FlowTrajectory {
        samples,
        steps_taken,
        incomplete: stop.is_some(),
        stop_reason: stop.map(|reason| reason.as_str().to_string()),
    })
}
