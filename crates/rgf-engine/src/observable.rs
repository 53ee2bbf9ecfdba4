//! Observable definitions and their evaluation at a certified fixed point.
//!
//! Closed forms are exact functions of the fixed point with an explicit
//! truncation term where a series was cut; Monte Carlo observables are
//! integrands whose coefficients derive from the fixed-point couplings,
//! estimated through the multi-fidelity sampler.

use rgf_core::budget::Budget;
use rgf_core::coupling::CouplingVector;
use rgf_core::errors::{ErrorInfo, RgfError};
use rgf_mc::domain::{AxisRange, Domain};
use rgf_mc::fidelity::estimate_multi;
use rgf_mc::integrand::MetricGaussian;
use rgf_mc::sampler::SamplerOpts;
use rgf_mc::uncertainty::{combine, ErrorBreakdown};
use serde::{Deserialize, Serialize};

fn observable_error(code: &str, message: impl Into<String>) -> RgfError {
    RgfError::Config(ErrorInfo::new(code, message.into()))
}

/// Builtin closed-form observables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "kebab-case")]
pub enum ClosedForm {
    /// `4π² v[numerator] / v[denominator]`, scaled by the square root of the
    /// coupling-space dimension.
    InverseCouplingRatio {
        /// Index of the numerator coupling.
        numerator: usize,
        /// Index of the denominator coupling.
        denominator: usize,
    },
    /// Truncated alternating-harmonic logarithmic series of one coupling,
    /// `Σ (-1)^(k+1) x^k / k` up to `terms`. The first omitted term is the
    /// truncation error.
    LogSeries {
        /// Index of the coupling the series is built on.
        coupling: usize,
        /// Number of series terms kept.
        terms: usize,
    },
    /// One-loop-style vertex correction, `x (1 + x²/16π²)`, with the next
    /// order as the truncation term.
    VertexCorrection {
        /// Index of the corrected coupling.
        coupling: usize,
    },
}

/// Builtin Monte Carlo integrands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "integrand", rename_all = "kebab-case")]
pub enum McIntegrandSpec {
    /// `exp(-Σ cᵢ xᵢ²)` with `cᵢ = |v[couplings[i]]|`, the group-manifold
    /// geometric factor of the condensate.
    GaussianExponent {
        /// Fixed-point couplings supplying the metric coefficients.
        couplings: Vec<usize>,
    },
}

/// Sampling domain of a Monte Carlo observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSpec {
    /// One compact range per integrand axis.
    pub axes: Vec<AxisRange>,
}

/// What an observable is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ObservableDef {
    /// Exact function of the fixed point.
    ClosedForm {
        /// Which builtin closed form.
        form: ClosedForm,
    },
    /// Functional-integral term evaluated by sampling.
    MonteCarlo {
        /// Which builtin integrand.
        integrand: McIntegrandSpec,
        /// Sampling domain.
        domain: DomainSpec,
        /// Truncation term supplied by the observable definition (tail mass
        /// outside the domain and dropped higher orders).
        #[serde(default)]
        truncation: f64,
    },
}

/// Caller-supplied reference value for a consistency qualifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceValue {
    /// Reference central value.
    pub value: f64,
    /// One-sigma uncertainty of the reference.
    pub sigma: f64,
}

/// A named observable request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservableSpec {
    /// Name the result is reported under.
    pub name: String,
    /// Definition.
    #[serde(flatten)]
    pub def: ObservableDef,
    /// Optional reference to compare against.
    #[serde(default)]
    pub reference: Option<ReferenceValue>,
}

/// One evaluated observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservableResult {
    /// Name from the request.
    pub name: String,
    /// Central value.
    pub value: f64,
    /// Combined one-sigma uncertainty (the breakdown total).
    pub uncertainty: f64,
    /// Itemized error sources.
    pub breakdown: ErrorBreakdown,
    /// Deviation from the reference in combined sigmas, when a reference
    /// was supplied.
    pub reference_sigma_deviation: Option<f64>,
    /// Whether the underlying estimate was flagged for poor mixing.
    pub poor_mixing: bool,
    /// Whether the underlying estimate was stopped early by the budget.
    pub incomplete: bool,
    /// Diagnostics recorded in provenance.
    pub notes: Vec<String>,
}

fn coupling_at(point: &CouplingVector, index: usize, role: &str) -> Result<f64, RgfError> {
    point.values().get(index).copied().ok_or_else(|| {
        observable_error(
            "bad-config",
            format!("{role} index {index} exceeds coupling dimension {}", point.dim()),
        )
    })
}

#[derive(Debug)]
struct ClosedFormValue {
    value: f64,
    truncation: f64,
    notes: Vec<String>,
}

fn evaluate_closed_form(
    form: &ClosedForm,
    point: &CouplingVector,
) -> Result<ClosedFormValue, RgfError> {
    let four_pi_sq = 4.0 * std::f64::consts::PI * std::f64::consts::PI;
    match form {
        ClosedForm::InverseCouplingRatio {
            numerator,
            denominator,
        } => {
            let num = coupling_at(point, *numerator, "numerator")?;
            let den = coupling_at(point, *denominator, "denominator")?;
            if den == 0.0 {
                return Err(observable_error(
                    "bad-config",
                    format!("denominator coupling {denominator} vanishes at the fixed point"),
                ));
            }
            Ok(ClosedFormValue {
                value: four_pi_sq * num / den * (point.dim() as f64).sqrt(),
                truncation: 0.0,
                notes: Vec::new(),
            })
        }
        ClosedForm::LogSeries { coupling, terms } => {
            if *terms == 0 {
                return Err(observable_error(
                    "bad-config",
                    "log series needs at least one term",
                ));
            }
            let x = coupling_at(point, *coupling, "series")?;
            let mut notes = Vec::new();
            if x.abs() >= 1.0 {
                notes.push(format!(
                    "series argument {x} lies outside the convergence radius"
                ));
            }
            let mut value = 0.0;
            let mut power = x;
            for k in 1..=*terms {
                let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
                value += sign * power / k as f64;
                power *= x;
            }
            // First omitted term.
            let truncation = (power / (*terms as f64 + 1.0)).abs();
            Ok(ClosedFormValue {
                value,
                truncation,
                notes,
            })
        }
        ClosedForm::VertexCorrection { coupling } => {
            let x = coupling_at(point, *coupling, "vertex")?;
            let loop_factor = x * x / (4.0 * four_pi_sq);
            Ok(ClosedFormValue {
                value: x * (1.0 + loop_factor),
                truncation: (x * loop_factor * loop_factor).abs(),
                notes: Vec::new(),
            })
        }
    }
}

fn build_integrand(
    spec: &McIntegrandSpec,
    point: &CouplingVector,
) -> Result<MetricGaussian, RgfError> {
    match spec {
        McIntegrandSpec::GaussianExponent { couplings } => {
            let mut coefficients = Vec::with_capacity(couplings.len());
            for &index in couplings {
                let value = coupling_at(point, index, "metric")?;
                if value == 0.0 {
                    return Err(observable_error(
                        "bad-config",
                        format!("metric coupling {index} vanishes at the fixed point"),
                    ));
                }
                coefficients.push(value.abs());
            }
            MetricGaussian::new(coefficients)
        }
    }
}

fn sigma_deviation(value: f64, total: f64, reference: &ReferenceValue) -> f64 {
    let spread = (total * total + reference.sigma * reference.sigma).sqrt();
    if spread == 0.0 {
        if value == reference.value {
            0.0
        } else {
            f64::MAX
        }
    } else {
        (value - reference.value).abs() / spread
    }
}

/// Evaluates one observable at the certified fixed point.
///
/// Closed forms carry no statistical or discretization error; Monte Carlo
/// observables go through the multi-fidelity estimator with a substream of
/// the master seed per observable.
pub fn evaluate(
    spec: &ObservableSpec,
    point: &CouplingVector,
    sampler: &SamplerOpts,
    resolutions: &[u32],
    master_seed: u64,
    budget: &Budget,
) -> Result<ObservableResult, RgfError> {
    match &spec.def {
        ObservableDef::ClosedForm { form } => {
            let closed = evaluate_closed_form(form, point)?;
            let breakdown = combine(0.0, 0.0, closed.truncation, None)?;
            let deviation = spec
                .reference
                .as_ref()
                .map(|reference| sigma_deviation(closed.value, breakdown.total, reference));
            Ok(ObservableResult {
                name: spec.name.clone(),
                value: closed.value,
                uncertainty: breakdown.total,
                breakdown,
                reference_sigma_deviation: deviation,
                poor_mixing: false,
                incomplete: false,
                notes: closed.notes,
            })
        }
        ObservableDef::MonteCarlo {
            integrand,
            domain,
            truncation,
        } => {
            let gaussian = build_integrand(integrand, point)?;
            let base = Domain::new(domain.axes.clone(), 1)?;
            let estimate = estimate_multi(&gaussian, &base, resolutions, sampler, master_seed, budget)?;
            let breakdown = combine(
                estimate.statistical,
                estimate.discretization,
                truncation.abs(),
                None,
            )?;
            let deviation = spec
                .reference
                .as_ref()
                .map(|reference| sigma_deviation(estimate.value, breakdown.total, reference));
            Ok(ObservableResult {
                name: spec.name.clone(),
                value: estimate.value,
                uncertainty: breakdown.total,
                breakdown,
                reference_sigma_deviation: deviation,
                poor_mixing: estimate.poor_mixing,
                incomplete: estimate.incomplete,
                notes: estimate.notes,
            })
        }
    }
}
