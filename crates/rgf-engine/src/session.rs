//! The solve session: flow probe, Newton solve, stability analysis and
//! observable certification, sealed into one report.

use std::time::{Duration, Instant};

use rgf_core::budget::{Budget, CancelToken};
use rgf_core::coupling::CouplingVector;
use rgf_core::errors::RgfError;
use rgf_core::model::FlowModel;
use rgf_core::provenance::SessionProvenance;
use rgf_core::rng::derive_substream_seed;
use rgf_flow::{analyze, find_fixed_point, integrate};

use crate::config::SolveConfig;
use crate::hash::{seed_from_hash, stable_hash_string};
use crate::observable;
use crate::report::{CertificationReport, ReportStatus};

const OBSERVABLE_SUBSTREAM: u64 = 0x4F42_5356 << 16;

/// Runs a full solve session against `model` and seals the result.
///
/// The pipeline is: validate, probe the flow from the first seed, run the
/// multi-seed Newton solve, analyze stability at the winner, then evaluate
/// each observable. Probe failures are recovered as provenance notes; solver,
/// stability and observable failures are hard errors. The report is tagged
/// `partial` instead of `certified` whenever any stage was budget-stopped or
/// flagged for poor mixing.
pub fn solve(
    model: &dyn FlowModel,
    config: &SolveConfig,
    cancel: CancelToken,
) -> Result<CertificationReport, RgfError> {
    let started = Instant::now();
    config.validate(model.dim())?;
    let input_hash = stable_hash_string(config)?;
    // Folding the input hash into the master seed ties every random
    // substream to the exact configuration that produced the report.
    let master_seed = config.random_seed ^ seed_from_hash(&input_hash);

    let mut budget = Budget::iterations(config.max_iterations).with_cancel(cancel);
    if let Some(timeout) = config.timeout_seconds {
        budget = budget.with_timeout(Duration::from_secs_f64(timeout));
    }

    let names = model.names().to_vec();
    let mut seeds = Vec::with_capacity(config.seeds.len() + 1);
    for seed in &config.seeds {
        seeds.push(CouplingVector::new(names.clone(), seed.clone())?);
    }

    let mut notes = Vec::new();
    let mut partial = false;

    // The flow endpoint is usually deep inside the right basin, so it joins
    // the seed list. A failed probe only costs us that extra seed.
    match integrate(model, &seeds[0], &config.step, &budget) {
        Ok(trajectory) => {
            if trajectory.incomplete {
                partial = true;
                let reason = trajectory
                    .stop_reason
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                notes.push(format!("flow probe stopped early: {reason}"));
            }
            seeds.push(trajectory.endpoint().clone());
        }
        Err(error) => {
            notes.push(format!("flow probe failed, continuing without it: {error}"));
        }
    }

    let solve_report = find_fixed_point(model, &seeds, &config.solver, &budget)?;
    let candidate = solve_report.candidate;

    let stability = analyze(model, &candidate.point, &config.stability, master_seed)?;

    let mut observables = Vec::with_capacity(config.observables.len());
    for (index, spec) in config.observables.iter().enumerate() {
        let seed = derive_substream_seed(master_seed, OBSERVABLE_SUBSTREAM + index as u64);
        let result = observable::evaluate(
            spec,
            &candidate.point,
            &config.sampler,
            &config.resolutions,
            seed,
            &budget,
        )?;
        if result.poor_mixing || result.incomplete {
            partial = true;
        }
        for note in &result.notes {
            notes.push(format!("{}: {note}", result.name));
        }
        observables.push(result);
    }

    let mut provenance = SessionProvenance {
        input_hash,
        seed: config.random_seed,
        resolutions: config.resolutions.clone(),
        notes,
        created_at: SessionProvenance::now_timestamp(),
        ..SessionProvenance::default()
    };
    provenance.note_method("integrator", config.step.method.as_str());
    provenance.note_method("solver", "damped-newton");
    provenance.note_method("jacobian", stability.jacobian_method.clone());
    provenance.note_method("sampler", config.sampler.policy.as_str());
    provenance.note_count("seeds", seeds.len() as u64);
    provenance.note_count("newton-iterations", candidate.iterations as u64);
    provenance.note_count("observables", config.observables.len() as u64);
    provenance.note_count("samples-per-resolution", config.sampler.samples as u64);
    provenance.note_threshold("solver-tolerance", config.solver.tolerance);
    provenance.note_threshold("distinct-threshold", config.solver.distinct_threshold);
    provenance.note_threshold("step-error-tolerance", config.step.error_tolerance);
    provenance.wall_clock_seconds = started.elapsed().as_secs_f64();

    let status = if partial {
        ReportStatus::Partial
    } else {
        ReportStatus::Certified
    };

    Ok(CertificationReport {
        status,
        fixed_point: candidate,
        seed_records: solve_report.seed_records,
        stability,
        observables,
        provenance,
    })
}
