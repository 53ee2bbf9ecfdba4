//! Estimators for the three sampling policies.
//!
//! All three share the same contract: estimate the integral of an
//! [`Integrand`](crate::integrand::Integrand) over a discretized
//! [`Domain`](crate::domain::Domain), returning the value with the standard
//! error of the mean and mixing diagnostics. Sample batches draw from
//! deterministic substreams of the master seed and merge in batch order, so
//! the estimate is bit-reproducible for a given seed.

use rayon::prelude::*;
use rgf_core::budget::{Budget, BudgetStop};
use rgf_core::errors::{ErrorInfo, RgfError};
use rgf_core::rng::{derive_substream_seed, RngHandle};
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::integrand::Integrand;
use crate::stats::{effective_sample_size, BatchStats};

/// Substream bases keeping the estimator families statistically independent.
const PLAIN_SUBSTREAM: u64 = 0x4D43_5043 << 16;
const IMPORTANCE_SUBSTREAM: u64 = 0x4D43_4953 << 16;
const MCMC_SUBSTREAM: u64 = 0x4D43_4D48 << 16;

fn sampling_error(code: &str, message: impl Into<String>) -> RgfError {
    RgfError::Sampling(ErrorInfo::new(code, message.into()))
}

/// Sampling policy selecting the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingPolicy {
    /// Uniform sampling over the domain.
    #[default]
    Plain,
    /// Axis-aligned Gaussian proposal iteratively refit to `|f|`-weighted
    /// moments.
    Importance,
    /// Metropolis random walk targeting `π ∝ |f|`, normalized through the
    /// domain volume.
    Mcmc,
}

impl SamplingPolicy {
    /// Stable label recorded in provenance.
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingPolicy::Plain => "plain",
            SamplingPolicy::Importance => "importance",
            SamplingPolicy::Mcmc => "mcmc",
        }
    }
}

fn default_samples() -> usize {
    65_536
}

fn default_batches() -> usize {
    16
}

fn default_refit_rounds() -> usize {
    3
}

fn default_burn_in() -> usize {
    1_024
}

fn default_thinning() -> usize {
    4
}

fn default_proposal_scale() -> f64 {
    0.25
}

fn default_acceptance_low() -> f64 {
    0.15
}

fn default_acceptance_high() -> f64 {
    0.60
}

fn default_min_ess_fraction() -> f64 {
    0.1
}

/// Options shared by all estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerOpts {
    /// Which estimator to run.
    #[serde(default)]
    pub policy: SamplingPolicy,
    /// Total sample count (per resolution).
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Number of independent batches the samples are split into.
    #[serde(default = "default_batches")]
    pub batches: usize,
    /// Importance sampling: proposal refit rounds (the last round produces
    /// the estimate).
    #[serde(default = "default_refit_rounds")]
    pub refit_rounds: usize,
    /// MCMC: burn-in steps discarded before recording.
    #[serde(default = "default_burn_in")]
    pub burn_in: usize,
    /// MCMC: keep every `thinning`-th state.
    #[serde(default = "default_thinning")]
    pub thinning: usize,
    /// MCMC: random-walk step as a fraction of each axis width.
    #[serde(default = "default_proposal_scale")]
    pub proposal_scale: f64,
    /// MCMC: lower edge of the healthy acceptance band.
    #[serde(default = "default_acceptance_low")]
    pub acceptance_low: f64,
    /// MCMC: upper edge of the healthy acceptance band.
    #[serde(default = "default_acceptance_high")]
    pub acceptance_high: f64,
    /// Minimum effective sample fraction before the estimate is flagged.
    #[serde(default = "default_min_ess_fraction")]
    pub min_ess_fraction: f64,
}

impl Default for SamplerOpts {
    fn default() -> Self {
        Self {
            policy: SamplingPolicy::default(),
            samples: default_samples(),
            batches: default_batches(),
            refit_rounds: default_refit_rounds(),
            burn_in: default_burn_in(),
            thinning: default_thinning(),
            proposal_scale: default_proposal_scale(),
            acceptance_low: default_acceptance_low(),
            acceptance_high: default_acceptance_high(),
            min_ess_fraction: default_min_ess_fraction(),
        }
    }
}

/// One Monte Carlo estimate with its diagnostics.
///
/// `poor_mixing` is a warning, never an error: the value is returned but a
/// consumer must be able to see it is low-confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McEstimate {
    /// Estimated integral.
    pub value: f64,
    /// Standard error of the estimate.
    pub std_error: f64,
    /// Effective number of independent samples behind the estimate.
    pub n_effective: f64,
    /// Metropolis acceptance rate, when the policy has one.
    pub acceptance_rate: Option<f64>,
    /// Whether the estimate failed a mixing health check.
    pub poor_mixing: bool,
    /// Whether the budget stopped sampling before the configured count.
    pub incomplete: bool,
    /// Diagnostic notes recorded in provenance.
    pub notes: Vec<String>,
}

/// Per-batch accumulator: sample statistics plus importance-weight moments.
#[derive(Debug, Clone, Copy, Default)]
struct BatchAccum {
    stats: BatchStats,
    weight_sum: f64,
    weight_sq_sum: f64,
    bad_samples: u64,
}

impl BatchAccum {
    fn merge(&mut self, other: &BatchAccum) {
        self.stats.merge(&other.stats);
        self.weight_sum += other.weight_sum;
        self.weight_sq_sum += other.weight_sq_sum;
        self.bad_samples += other.bad_samples;
    }
}

fn validate(integrand: &dyn Integrand, domain: &Domain, opts: &SamplerOpts) -> Result<(), RgfError> {
    if integrand.dim() != domain.dim() {
        return Err(sampling_error(
            "shape-mismatch",
            format!(
                "integrand has dim {}, domain has dim {}",
                integrand.dim(),
                domain.dim()
            ),
        ));
    }
    if opts.samples == 0 || opts.batches == 0 {
        return Err(sampling_error(
            "bad-config",
            "sample and batch counts must be positive",
        ));
    }
    if opts.policy == SamplingPolicy::Mcmc && opts.thinning == 0 {
        return Err(sampling_error("bad-config", "thinning must be at least 1"));
    }
    Ok(())
}

/// Estimates the integral of `integrand` over `domain`.
///
/// Numerical failures local to one sample (a non-finite integrand value) are
/// recovered by discarding that sample and noted in the diagnostics. A budget
/// stop yields a partial estimate tagged `incomplete`; producing no samples
/// at all is a hard `no-samples` error.
pub fn estimate(
    integrand: &dyn Integrand,
    domain: &Domain,
    opts: &SamplerOpts,
    master_seed: u64,
    budget: &Budget,
) -> Result<McEstimate, RgfError> {
    validate(integrand, domain, opts)?;
    match opts.policy {
        SamplingPolicy::Plain => estimate_plain(integrand, domain, opts, master_seed, budget),
        SamplingPolicy::Importance => {
            estimate_importance(integrand, domain, opts, master_seed, budget)
        }
        SamplingPolicy::Mcmc => estimate_mcmc(integrand, domain, opts, master_seed, budget),
    }
}

fn plain_batch(
    integrand: &dyn Integrand,
    domain: &Domain,
    seed: u64,
    count: usize,
) -> BatchAccum {
    let mut rng = RngHandle::from_seed(seed);
    let mut accum = BatchAccum::default();
    let volume = domain.volume();
    for _ in 0..count {
        let point = domain.sample_uniform(&mut rng);
        let value = integrand.evaluate(&point);
        if value.is_finite() {
            accum.stats.push(value * volume);
        } else {
            accum.bad_samples += 1;
        }
    }
    accum
}

/// Splits `samples` into `batches` near-equal batch sizes, truncated to the
/// budget's iteration cap. Returns the sizes and whether truncation happened.
fn batch_sizes(samples: usize, batches: usize, budget: &Budget) -> (Vec<usize>, bool) {
    let allowed = samples.min(budget.max_iterations());
    let truncated = allowed < samples;
    let base = allowed / batches;
    let extra = allowed % batches;
    let sizes = (0..batches)
        .map(|idx| base + usize::from(idx < extra))
        .filter(|size| *size > 0)
        .collect();
    (sizes, truncated)
}

fn finish_iid(
    merged: BatchAccum,
    opts: &SamplerOpts,
    weighted: bool,
    truncated: bool,
    stopped_early: bool,
    mut notes: Vec<String>,
) -> Result<McEstimate, RgfError> {
    let n = merged.stats.n;
    if n == 0 {
        return Err(sampling_error(
            "no-samples",
            "budget stopped sampling before any sample was collected",
        ));
    }
    if merged.bad_samples > 0 {
        notes.push(format!(
            "discarded {} non-finite integrand samples",
            merged.bad_samples
        ));
    }
    let incomplete = truncated || stopped_early;
    if incomplete {
        notes.push("sampling stopped by budget".to_string());
    }

    // For weighted (importance) samples the effective count comes from the
    // weight spread; i.i.d. uniform samples count fully.
    let n_effective = if weighted && merged.weight_sq_sum > 0.0 {
        (merged.weight_sum * merged.weight_sum) / merged.weight_sq_sum
    } else {
        n as f64
    };
    let poor_mixing = n_effective < opts.min_ess_fraction * n as f64;
    if poor_mixing {
        notes.push(format!(
            "effective sample size {:.1} of {} below the configured fraction",
            n_effective, n
        ));
    }

    Ok(McEstimate {
        value: merged.stats.mean,
        std_error: merged.stats.std_error(),
        n_effective,
        acceptance_rate: None,
        poor_mixing,
        incomplete,
        notes,
    })
}

fn estimate_plain(
    integrand: &dyn Integrand,
    domain: &Domain,
    opts: &SamplerOpts,
    master_seed: u64,
    budget: &Budget,
) -> Result<McEstimate, RgfError> {
    let (sizes, truncated) = batch_sizes(opts.samples, opts.batches, budget);
    let accums: Vec<Option<BatchAccum>> = sizes
        .par_iter()
        .enumerate()
        .map(|(idx, count)| {
            // The iteration cap is already applied by batch_sizes; only a
            // deadline or cancellation skips whole batches.
            match budget.check(0) {
                Some(BudgetStop::Deadline) | Some(BudgetStop::Cancelled) => None,
                _ => {
                    let seed = derive_substream_seed(master_seed, PLAIN_SUBSTREAM + idx as u64);
                    Some(plain_batch(integrand, domain, seed, *count))
                }
            }
        })
        .collect();

    let mut merged = BatchAccum::default();
    let mut stopped_early = false;
    for accum in &accums {
        match accum {
            Some(batch) => merged.merge(batch),
            None => stopped_early = true,
        }
    }
    finish_iid(merged, opts, false, truncated, stopped_early, Vec::new())
}

/// Axis-aligned Gaussian proposal.
#[derive(Debug, Clone)]
struct Proposal {
    mean: Vec<f64>,
    sigma: Vec<f64>,
}

impl Proposal {
    fn draw(&self, rng: &mut RngHandle) -> Vec<f64> {
        self.mean
            .iter()
            .zip(self.sigma.iter())
            .map(|(mu, sigma)| mu + sigma * rng.standard_normal())
            .collect()
    }

    fn density(&self, point: &[f64]) -> f64 {
        let mut q = 1.0;
        for ((x, mu), sigma) in point.iter().zip(self.mean.iter()).zip(self.sigma.iter()) {
            let z = (x - mu) / sigma;
            q *= (-0.5 * z * z).exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt());
        }
        q
    }
}

/// Fits `|f|`-weighted per-axis moments from a uniform pilot pass.
fn fit_proposal(
    integrand: &dyn Integrand,
    domain: &Domain,
    previous: Option<&Proposal>,
    seed: u64,
    count: usize,
) -> Proposal {
    let mut rng = RngHandle::from_seed(seed);
    let dim = domain.dim();
    let mut weight_total = 0.0;
    let mut mean = vec![0.0; dim];
    let mut second = vec![0.0; dim];

    for _ in 0..count {
        let point = match previous {
            Some(proposal) => {
                let raw = proposal.draw(&mut rng);
                if !domain.contains(&raw) {
                    continue;
                }
                domain.snap(&raw)
            }
            None => domain.sample_uniform(&mut rng),
        };
        let weight = integrand.evaluate(&point).abs();
        if !weight.is_finite() || weight == 0.0 {
            continue;
        }
        weight_total += weight;
        for axis in 0..dim {
            mean[axis] += weight * point[axis];
            second[axis] += weight * point[axis] * point[axis];
        }
    }

    if weight_total <= 0.0 {
        // Flat or vanishing pilot pass: fall back to a domain-wide proposal.
        let mean = domain
            .axes()
            .iter()
            .map(|axis| 0.5 * (axis.lo + axis.hi))
            .collect();
        let sigma = domain.axes().iter().map(|axis| 0.5 * axis.width()).collect();
        return Proposal { mean, sigma };
    }

    let mut sigma = vec![0.0; dim];
    for axis in 0..dim {
        mean[axis] /= weight_total;
        let variance = (second[axis] / weight_total - mean[axis] * mean[axis]).max(0.0);
        // Never narrower than a grid cell, never wider than the axis.
        let floor = 0.5 * domain.cell_width(axis);
        sigma[axis] = variance.sqrt().clamp(floor, domain.axes()[axis].width());
    }
    Proposal { mean, sigma }
}

fn importance_batch(
    integrand: &dyn Integrand,
    domain: &Domain,
    proposal: &Proposal,
    seed: u64,
    count: usize,
) -> BatchAccum {
    let mut rng = RngHandle::from_seed(seed);
    let mut accum = BatchAccum::default();
    for _ in 0..count {
        let raw = proposal.draw(&mut rng);
        if !domain.contains(&raw) {
            // Outside the domain the integrand is zero by definition.
            accum.stats.push(0.0);
            continue;
        }
        let density = proposal.density(&raw);
        let value = integrand.evaluate(&domain.snap(&raw));
        if !value.is_finite() || !density.is_finite() || density <= 0.0 {
            accum.bad_samples += 1;
            continue;
        }
        let weight = 1.0 / density;
        accum.stats.push(value * weight);
        accum.weight_sum += weight;
        accum.weight_sq_sum += weight * weight;
    }
    accum
}

fn estimate_importance(
    integrand: &dyn Integrand,
    domain: &Domain,
    opts: &SamplerOpts,
    master_seed: u64,
    budget: &Budget,
) -> Result<McEstimate, RgfError> {
    let rounds = opts.refit_rounds.max(1);
    let per_round = (opts.samples / (rounds + 1)).max(1);

    // Refit rounds: uniform pilot, then resample from each successive fit.
    let mut proposal: Option<Proposal> = None;
    for round in 0..rounds {
        let seed = derive_substream_seed(
            master_seed,
            IMPORTANCE_SUBSTREAM + ((round as u64) << 32),
        );
        proposal = Some(fit_proposal(
            integrand,
            domain,
            proposal.as_ref(),
            seed,
            per_round,
        ));
    }
    // fit_proposal always returns a proposal after at least one round
    let proposal = match proposal {
        Some(proposal) => proposal,
        None => {
            return Err(sampling_error(
                "bad-config",
                "importance sampling requires at least one refit round",
            ))
        }
    };

    let estimate_samples = opts.samples.saturating_sub(rounds * per_round).max(1);
    let estimate_budget = budget.max_iterations().saturating_sub(rounds * per_round);
    let sizes_budget = Budget::iterations(estimate_budget);
    let (sizes, truncated) = batch_sizes(estimate_samples, opts.batches, &sizes_budget);
    if sizes.is_empty() {
        return Err(sampling_error(
            "no-samples",
            "budget exhausted by proposal fitting before the estimate pass",
        ));
    }

    let accums: Vec<Option<BatchAccum>> = sizes
        .par_iter()
        .enumerate()
        .map(|(idx, count)| match budget.check(0) {
            Some(BudgetStop::Deadline) | Some(BudgetStop::Cancelled) => None,
            _ => {
                let seed = derive_substream_seed(
                    master_seed,
                    IMPORTANCE_SUBSTREAM + ((rounds as u64) << 32) + idx as u64,
                );
                Some(importance_batch(integrand, domain, &proposal, seed, *count))
            }
        })
        .collect();

    let mut merged = BatchAccum::default();
    let mut stopped_early = false;
    for accum in &accums {
        match accum {
            Some(batch) => merged.merge(batch),
            None => stopped_early = true,
        }
    }
    let notes = vec![format!("importance proposal refit over {rounds} rounds")];
    finish_iid(merged, opts, true, truncated, stopped_early, notes)
}

fn estimate_mcmc(
    integrand: &dyn Integrand,
    domain: &Domain,
    opts: &SamplerOpts,
    master_seed: u64,
    budget: &Budget,
) -> Result<McEstimate, RgfError> {
    let mut rng = RngHandle::from_seed(derive_substream_seed(master_seed, MCMC_SUBSTREAM));
    let volume = domain.volume();

    // Start at the domain centre.
    let centre: Vec<f64> = domain
        .axes()
        .iter()
        .map(|axis| 0.5 * (axis.lo + axis.hi))
        .collect();
    let mut current = domain.snap(&centre);
    let mut current_value = integrand.evaluate(&current);

    let mut proposed = 0u64;
    let mut accepted = 0u64;
    // Harmonic weights 1/|f| and signs of the kept states.
    let mut weights: Vec<f64> = Vec::new();
    let mut signs: Vec<f64> = Vec::new();
    let mut bad_samples = 0u64;
    let mut stop = None;

    let total_steps = opts.burn_in + opts.samples * opts.thinning;
    for step in 0..total_steps {
        if let Some(reason) = budget.check(step) {
            stop = Some(reason);
            break;
        }
        let raw: Vec<f64> = current
            .iter()
            .zip(domain.axes().iter())
            .map(|(x, axis)| x + opts.proposal_scale * axis.width() * rng.standard_normal())
            .collect();
        // Always consume one uniform so the stream does not depend on the
        // walker position.
        let coin = rng.uniform();
        if domain.contains(&raw) {
            let candidate = domain.snap(&raw);
            let candidate_value = integrand.evaluate(&candidate);
            if candidate_value.is_finite() {
                let accept = current_value == 0.0
                    || coin * current_value.abs() < candidate_value.abs();
                if accept {
                    current = candidate;
                    current_value = candidate_value;
                    accepted += 1;
                }
            } else {
                bad_samples += 1;
            }
        }
        proposed += 1;

        if step >= opts.burn_in && (step - opts.burn_in) % opts.thinning == 0 {
            if current_value != 0.0 {
                weights.push(1.0 / current_value.abs());
                signs.push(current_value.signum());
            } else {
                bad_samples += 1;
            }
        }
    }

    if weights.is_empty() {
        return Err(sampling_error(
            "no-samples",
            "metropolis chain produced no usable states within the budget",
        ));
    }

    let kept = weights.len();
    let mut weight_stats = BatchStats::new();
    for w in &weights {
        weight_stats.push(*w);
    }
    let mut sign_stats = BatchStats::new();
    for s in &signs {
        sign_stats.push(*s);
    }

    // Normalization through the domain volume: Z = V / E[1/|f|], then the
    // signed integral is Z * E[sign f].
    let normalization = volume / weight_stats.mean;
    let value = normalization * sign_stats.mean;

    let ess = effective_sample_size(&weights);
    // Delta-method propagation, scaled to the effective sample count.
    let scale = (kept as f64 / ess).sqrt();
    let rel_weight = weight_stats.std_error() * scale / weight_stats.mean;
    let rel_sign = if sign_stats.mean.abs() > 0.0 {
        sign_stats.std_error() * scale / sign_stats.mean.abs()
    } else {
        0.0
    };
    let std_error = if sign_stats.mean == 0.0 {
        normalization * sign_stats.std_error() * scale
    } else {
        value.abs() * (rel_weight * rel_weight + rel_sign * rel_sign).sqrt()
    };

    let acceptance = if proposed == 0 {
        0.0
    } else {
        accepted as f64 / proposed as f64
    };

    let mut notes = Vec::new();
    let mut poor_mixing = false;
    if acceptance < opts.acceptance_low || acceptance > opts.acceptance_high {
        poor_mixing = true;
        notes.push(format!(
            "acceptance rate {:.3} outside the healthy band [{}, {}]",
            acceptance, opts.acceptance_low, opts.acceptance_high
        ));
    }
    if ess < opts.min_ess_fraction * kept as f64 {
        poor_mixing = true;
        notes.push(format!(
            "effective sample size {:.1} of {} below the configured fraction",
            ess, kept
        ));
    }
    if bad_samples > 0 {
        notes.push(format!("discarded {bad_samples} unusable chain states"));
    }
    let incomplete = stop.is_some();
    if let Some(reason) = stop {
        notes.push(format!("sampling stopped by budget: {}", reason.as_str()));
    }

    Ok(McEstimate {
        value,
        std_error,
        n_effective: ess,
        acceptance_rate: Some(acceptance),
        poor_mixing,
        incomplete,
        notes,
    })
}
