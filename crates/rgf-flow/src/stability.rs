//! Eigenvalue classification of fixed points and Lyapunov certificate sampling.

use rgf_core::coupling::CouplingVector;
use rgf_core::errors::{ErrorInfo, RgfError};
use rgf_core::model::FlowModel;
use rgf_core::rng::{derive_substream_seed, RngHandle};
use serde::{Deserialize, Serialize};

use crate::jacobian::{jacobian_at, jacobian_method};

/// Substream used for Lyapunov certificate sampling.
const LYAPUNOV_SUBSTREAM: u64 = 0x4C59_4150;

fn stability_error(code: &str, message: impl Into<String>) -> RgfError {
    RgfError::Stability(ErrorInfo::new(code, message.into()))
}

/// Classification of one eigen-direction.
///
/// Convention: flow time increases toward the infrared, so a direction with a
/// strictly positive eigenvalue real part grows toward the infrared and is
/// tagged relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EigenClass {
    /// Strictly positive real part: grows toward the infrared.
    Relevant,
    /// Non-positive real part: shrinks (or is marginal) toward the infrared.
    Irrelevant,
}

/// One eigenvalue of the stability Jacobian with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenMode {
    /// Real part of the eigenvalue.
    pub re: f64,
    /// Imaginary part of the eigenvalue (conjugate pairs appear as two modes).
    pub im: f64,
    /// Relevant/irrelevant tag under the infrared sign convention.
    pub class: EigenClass,
}

fn default_lyapunov_samples() -> usize {
    4096
}

fn default_lyapunov_margin() -> f64 {
    1e-12
}

fn default_lyapunov_half_width() -> f64 {
    1.0
}

/// Options for the sampled Lyapunov global-attractiveness certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyapunovOpts {
    /// Whether to attempt the certificate at all.
    #[serde(default)]
    pub enabled: bool,
    /// Number of random sample points in the coupling domain.
    #[serde(default = "default_lyapunov_samples")]
    pub samples: usize,
    /// Safety margin: every sampled derivative must lie below `-margin`.
    #[serde(default = "default_lyapunov_margin")]
    pub margin: f64,
    /// Half-width of the sampled box centred on the fixed point.
    #[serde(default = "default_lyapunov_half_width")]
    pub half_width: f64,
}

impl Default for LyapunovOpts {
    fn default() -> Self {
        Self {
            enabled: false,
            samples: default_lyapunov_samples(),
            margin: default_lyapunov_margin(),
            half_width: default_lyapunov_half_width(),
        }
    }
}

/// Options controlling the full stability analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StabilityOpts {
    /// Lyapunov certificate configuration.
    #[serde(default)]
    pub lyapunov: LyapunovOpts,
}

/// Evidence recorded by a Lyapunov certificate attempt.
///
/// This is sampled evidence, not a proof: the certificate passes when every
/// sampled derivative of `V(v) = ½‖v − v*‖²` along the flow lies below the
/// margin, at the recorded sampling density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyapunovEvidence {
    /// Number of sampled points.
    pub samples: usize,
    /// Safety margin applied to every sample.
    pub margin: f64,
    /// Half-width of the sampled box.
    pub half_width: f64,
    /// Largest sampled value of `(v − v*)·beta(v)`.
    pub worst_derivative: f64,
    /// Whether every sample satisfied the descent condition.
    pub pass: bool,
}

/// Stability verdict for a fixed point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityVerdict {
    /// Eigenvalues of the Jacobian at the fixed point, in deterministic order.
    pub eigenvalues: Vec<EigenMode>,
    /// Set only when a Lyapunov certificate attempt passed.
    pub globally_attractive: bool,
    /// Certificate evidence, present when the certificate was attempted.
    pub lyapunov: Option<LyapunovEvidence>,
    /// Jacobian method used: `analytic` or `central-difference`.
    pub jacobian_method: String,
}

impl StabilityVerdict {
    /// Number of relevant directions.
    pub fn relevant_count(&self) -> usize {
        self.eigenvalues
            .iter()
            .filter(|mode| mode.class == EigenClass::Relevant)
            .count()
    }
}

fn sample_lyapunov(
    model: &dyn FlowModel,
    fixed_point: &CouplingVector,
    opts: &LyapunovOpts,
    master_seed: u64,
) -> Result<LyapunovEvidence, RgfError> {
    let mut rng = RngHandle::from_seed(derive_substream_seed(master_seed, LYAPUNOV_SUBSTREAM));
    let dim = fixed_point.dim();
    let centre = fixed_point.values();
    // Distance floor in coupling units, independent of the derivative margin.
    let exclusion_radius = opts.half_width * 1e-9;
    let mut worst = f64::NEG_INFINITY;
    let mut pass = true;
    let mut evaluated = 0usize;

    for _ in 0..opts.samples {
        let values: Vec<f64> = (0..dim)
            .map(|idx| rng.uniform_in(centre[idx] - opts.half_width, centre[idx] + opts.half_width))
            .collect();
        let point = fixed_point.with_values(values)?;
        let displacement = point.sub(fixed_point)?;
        if displacement.norm() < exclusion_radius {
            // Sampling the fixed point itself carries no descent information.
            continue;
        }
        let beta = model.beta(&point)?;
        let derivative: f64 = displacement
            .values()
            .iter()
            .zip(beta.values().iter())
            .map(|(d, b)| d * b)
            .sum();
        evaluated += 1;
        if derivative > worst {
            worst = derivative;
        }
        if derivative >= -opts.margin {
            pass = false;
        }
    }

    // An empty sample set certifies nothing.
    if evaluated == 0 {
        pass = false;
        worst = 0.0;
    }

    Ok(LyapunovEvidence {
        samples: opts.samples,
        margin: opts.margin,
        half_width: opts.half_width,
        worst_derivative: worst,
        pass,
    })
}

/// Analyzes the stability of a fixed point.
///
/// Computes the Jacobian (analytic if the model supplies one, else central
/// finite differences with Richardson refinement), its eigen-decomposition and
/// the relevant/irrelevant classification of each eigenvalue. When enabled,
/// additionally samples a Lyapunov descent certificate over a box around the
/// fixed point; `globally_attractive` is set only when that certificate
/// passes.
pub fn analyze(
    model: &dyn FlowModel,
    fixed_point: &CouplingVector,
    opts: &StabilityOpts,
    master_seed: u64,
) -> Result<StabilityVerdict, RgfError> {
    if fixed_point.dim() != model.dim() {
        return Err(stability_error(
            "shape-mismatch",
            format!(
                "fixed point has dim {}, model has dim {}",
                fixed_point.dim(),
                model.dim()
            ),
        ));
    }

    let method = jacobian_method(model, fixed_point);
    let jac = jacobian_at(model, fixed_point)?;
    let spectrum = jac.complex_eigenvalues();

    let mut eigenvalues: Vec<EigenMode> = spectrum
        .iter()
        .map(|value| EigenMode {
            re: value.re,
            im: value.im,
            class: if value.re > 0.0 {
                EigenClass::Relevant
            } else {
                EigenClass::Irrelevant
            },
        })
        .collect();
    // Deterministic ordering: descending real part, then ascending imaginary.
    eigenvalues.sort_by(|a, b| {
        b.re.partial_cmp(&a.re)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.im.partial_cmp(&b.im).unwrap_or(std::cmp::Ordering::Equal))
    });

    let lyapunov = if opts.lyapunov.enabled {
        Some(sample_lyapunov(model, fixed_point, &opts.lyapunov, master_seed)?)
    } else {
        None
    };
    let globally_attractive = lyapunov.as_ref().map(|ev| ev.pass).unwrap_or(false);

    Ok(StabilityVerdict {
        eigenvalues,
        globally_attractive,
        lyapunov,
        jacobian_method: method.to_string(),
    })
}
