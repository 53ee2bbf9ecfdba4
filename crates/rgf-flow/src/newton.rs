//! Multi-seed damped Newton solver for fixed points of the flow.

use nalgebra::DVector;
use rayon::prelude::*;
use rgf_core::budget::{Budget, BudgetStop};
use rgf_core::coupling::CouplingVector;
use rgf_core::errors::{ErrorInfo, RgfError};
use rgf_core::model::FlowModel;
use serde::{Deserialize, Serialize};

use crate::jacobian::jacobian_at;

fn solve_error(code: &str, message: impl Into<String>) -> RgfError {
    RgfError::Solve(ErrorInfo::new(code, message.into()))
}

fn default_tolerance() -> f64 {
    1e-8
}

fn default_max_iterations() -> usize {
    64
}

fn default_distinct_threshold() -> f64 {
    1e-4
}

fn default_divergence_bound() -> f64 {
    1e6
}

fn default_line_search_shrink() -> f64 {
    0.5
}

fn default_min_alpha() -> f64 {
    1e-4
}

/// Options controlling the damped Newton iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOpts {
    /// Residual norm below which a point counts as a fixed point.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Maximum Newton iterations per seed.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Distance above which two converged candidates count as materially
    /// different fixed points.
    #[serde(default = "default_distinct_threshold")]
    pub distinct_threshold: f64,
    /// Coupling magnitude beyond which an iterate counts as divergent.
    #[serde(default = "default_divergence_bound")]
    pub divergence_bound: f64,
    /// Multiplicative shrink factor of the backtracking line search.
    #[serde(default = "default_line_search_shrink")]
    pub line_search_shrink: f64,
    /// Smallest step scale the line search will try before giving up.
    #[serde(default = "default_min_alpha")]
    pub min_alpha: f64,
}

impl Default for SolverOpts {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            distinct_threshold: default_distinct_threshold(),
            divergence_bound: default_divergence_bound(),
            line_search_shrink: default_line_search_shrink(),
            min_alpha: default_min_alpha(),
        }
    }
}

/// A certified fixed-point candidate.
///
/// Never mutated after creation; refinement produces a new candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedPointCandidate {
    /// Coupling vector of the candidate.
    pub point: CouplingVector,
    /// Residual norm `‖beta(point)‖` at the candidate.
    pub residual_norm: f64,
    /// Newton iterations spent producing the candidate.
    pub iterations: usize,
    /// Index of the seed that produced the candidate.
    pub seed_index: usize,
}

/// Per-seed outcome recorded in provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum SeedOutcome {
    /// The seed converged to a fixed point within tolerance.
    Converged {
        /// Final coupling values of the basin this seed fell into.
        point: Vec<f64>,
        /// Residual norm at convergence.
        residual_norm: f64,
        /// Iterations used.
        iterations: usize,
    },
    /// The iteration budget ran out before reaching tolerance.
    Exhausted {
        /// Residual norm when iteration stopped.
        residual_norm: f64,
        /// What stopped the seed: `iteration-cap`, `deadline` or `cancelled`.
        stop_reason: String,
    },
    /// The iterate left the stable region.
    Diverged {
        /// Largest coupling magnitude observed.
        magnitude: f64,
    },
    /// A numerical failure local to this seed (singular Jacobian, stalled
    /// line search). Recovered by discarding the seed.
    Failed {
        /// Stable code describing the failure.
        code: String,
    },
}

/// Seed index plus its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRecord {
    /// Index into the caller-supplied seed list.
    pub seed_index: usize,
    /// What happened to the seed.
    pub outcome: SeedOutcome,
}

/// Result of a multi-seed solve: the winning candidate plus the full per-seed
/// basin record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    /// Smallest-residual converged candidate.
    pub candidate: FixedPointCandidate,
    /// Outcome of every seed, in seed order.
    pub seed_records: Vec<SeedRecord>,
}

fn newton_from_seed(
    model: &dyn FlowModel,
    seed: &CouplingVector,
    seed_index: usize,
    opts: &SolverOpts,
    budget: &Budget,
) -> SeedRecord {
    let outcome = match newton_iteration(model, seed, opts, budget) {
        Ok(NewtonEnd::Converged {
            point,
            residual_norm,
            iterations,
        }) => SeedOutcome::Converged {
            point: point.values().to_vec(),
            residual_norm,
            iterations,
        },
        Ok(NewtonEnd::Exhausted {
            residual_norm,
            stop,
        }) => SeedOutcome::Exhausted {
            residual_norm,
            stop_reason: stop
                .map(|stop| stop.as_str())
                .unwrap_or("iteration-cap")
                .to_string(),
        },
        Ok(NewtonEnd::Diverged { magnitude }) => SeedOutcome::Diverged { magnitude },
        Err(err) => SeedOutcome::Failed {
            code: err.code().to_string(),
        },
    };
    SeedRecord {
        seed_index,
        outcome,
    }
}

enum NewtonEnd {
    Converged {
        point: CouplingVector,
        residual_norm: f64,
        iterations: usize,
    },
    Exhausted {
        residual_norm: f64,
        stop: Option<BudgetStop>,
    },
    Diverged {
        magnitude: f64,
    },
}

fn newton_iteration(
    model: &dyn FlowModel,
    seed: &CouplingVector,
    opts: &SolverOpts,
    budget: &Budget,
) -> Result<NewtonEnd, RgfError> {
    let mut point = seed.clone();
    let mut residual = model.beta(&point)?;
    let mut residual_norm = residual.norm();

    for iteration in 0..opts.max_iterations {
        if residual_norm < opts.tolerance {
            return Ok(NewtonEnd::Converged {
                point,
                residual_norm,
                iterations: iteration,
            });
        }
        if let Some(stop) = budget.check(iteration) {
            return Ok(NewtonEnd::Exhausted {
                residual_norm,
                stop: Some(stop),
            });
        }
        if !point.is_finite() || point.max_abs() > opts.divergence_bound {
            return Ok(NewtonEnd::Diverged {
                magnitude: point.max_abs(),
            });
        }

        let jac = jacobian_at(model, &point)?;
        let rhs = DVector::from_column_slice(residual.values()).scale(-1.0);
        let delta = jac.lu().solve(&rhs).ok_or_else(|| {
            RgfError::Solve(
                ErrorInfo::new("singular-jacobian", "newton linear system is singular")
                    .with_context("iteration", iteration.to_string()),
            )
        })?;
        let direction = point.with_values(delta.iter().copied().collect())?;

        // Backtracking line search on the residual norm.
        let mut alpha = 1.0_f64;
        let accepted = loop {
            let trial = point.add(&direction.scale(alpha))?;
            let trial_residual = model.beta(&trial)?;
            let trial_norm = trial_residual.norm();
            if trial_norm.is_finite() && trial_norm < residual_norm * (1.0 - 1e-4 * alpha) {
                break Some((trial, trial_residual, trial_norm));
            }
            alpha *= opts.line_search_shrink;
            if alpha < opts.min_alpha {
                break None;
            }
        };

        match accepted {
            Some((trial, trial_residual, trial_norm)) => {
                point = trial;
                residual = trial_residual;
                residual_norm = trial_norm;
            }
            None => {
                return Err(RgfError::Solve(
                    ErrorInfo::new(
                        "line-search-stall",
                        "backtracking line search could not reduce the residual",
                    )
                    .with_context("iteration", iteration.to_string()),
                ));
            }
        }
    }

    if residual_norm < opts.tolerance {
        return Ok(NewtonEnd::Converged {
            point,
            residual_norm,
            iterations: opts.max_iterations,
        });
    }
    Ok(NewtonEnd::Exhausted {
        residual_norm,
        stop: None,
    })
}

fn seed_summary(records: &[SeedRecord]) -> String {
    records
        .iter()
        .map(|record| {
            let label = match &record.outcome {
                SeedOutcome::Converged { .. } => "converged",
                SeedOutcome::Exhausted { .. } => "exhausted",
                SeedOutcome::Diverged { .. } => "diverged",
                SeedOutcome::Failed { .. } => "failed",
            };
            format!("{}:{}", record.seed_index, label)
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Finds a fixed point of the flow via damped Newton iteration from `seeds`.
///
/// Seeds are tried in parallel; numerical failures local to one seed are
/// recorded in the per-seed basin record and recovered by discarding that
/// seed. Among converged candidates the smallest-residual one wins. Converged
/// candidates further apart than `distinct_threshold` produce
/// `multiple-fixed-points`: uniqueness must be demonstrated, never assumed.
/// No converged seed at all produces `no-convergence`, or `timeout` when
/// every seed was stopped by the deadline or cancellation.
pub fn find_fixed_point(
    model: &dyn FlowModel,
    seeds: &[CouplingVector],
    opts: &SolverOpts,
    budget: &Budget,
) -> Result<SolveReport, RgfError> {
    if seeds.is_empty() {
        return Err(solve_error("bad-config", "at least one seed is required"));
    }
    for seed in seeds {
        if seed.dim() != model.dim() {
            return Err(solve_error(
                "shape-mismatch",
                format!("seed has dim {}, model has dim {}", seed.dim(), model.dim()),
            ));
        }
    }

    let seed_records: Vec<SeedRecord> = seeds
        .par_iter()
        .enumerate()
        .map(|(idx, seed)| newton_from_seed(model, seed, idx, opts, budget))
        .collect();

    let mut converged: Vec<FixedPointCandidate> = Vec::new();
    for record in &seed_records {
        if let SeedOutcome::Converged {
            point,
            residual_norm,
            iterations,
        } = &record.outcome
        {
            converged.push(FixedPointCandidate {
                point: seeds[record.seed_index].with_values(point.clone())?,
                residual_norm: *residual_norm,
                iterations: *iterations,
                seed_index: record.seed_index,
            });
        }
    }

    if converged.is_empty() {
        // A wall-clock or cancellation stop across every seed is a timeout,
        // not a mathematical convergence failure.
        let timed_out = seed_records.iter().all(|record| {
            matches!(
                &record.outcome,
                SeedOutcome::Exhausted { stop_reason, .. }
                    if stop_reason == "deadline" || stop_reason == "cancelled"
            )
        });
        if timed_out {
            return Err(RgfError::Solve(
                ErrorInfo::new("timeout", "budget expired before any seed converged")
                    .with_context("seeds", seed_summary(&seed_records)),
            ));
        }
        return Err(RgfError::Solve(
            ErrorInfo::new("no-convergence", "no seed converged within the iteration budget")
                .with_context("seeds", seed_summary(&seed_records)),
        ));
    }

    // Uniqueness gate: all converged seeds must agree on the fixed point.
    for i in 0..converged.len() {
        for j in (i + 1)..converged.len() {
            let distance = converged[i]
                .point
                .distance(&converged[j].point)
                .unwrap_or(f64::INFINITY);
            if distance > opts.distinct_threshold {
                return Err(RgfError::Solve(
                    ErrorInfo::new(
                        "multiple-fixed-points",
                        "seeds converged to materially different fixed points",
                    )
                    .with_context("point_a", format!("{:?}", converged[i].point.values()))
                    .with_context("point_b", format!("{:?}", converged[j].point.values()))
                    .with_context("distance", format!("{distance:e}"))
                    .with_context("seeds", seed_summary(&seed_records))
                    .with_hint("tighten the seed list or raise distinct_threshold if the points are known aliases"),
                ));
            }
        }
    }

    converged.sort_by(|a, b| {
        a.residual_norm
            .partial_cmp(&b.residual_norm)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.seed_index.cmp(&b.seed_index))
    });
    let candidate = converged.remove(0);

    Ok(SolveReport {
        candidate,
        seed_records,
    })
}
