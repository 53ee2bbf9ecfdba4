//! Multi-fidelity estimation: run the same estimator at several grid
//! resolutions and Richardson-extrapolate toward the continuum.
//!
//! The cell-centred grid makes the estimator a midpoint rule in disguise, so
//! the leading discretization error is second order in the cell width. The
//! extrapolation residual is reported as the discretization error; it never
//! silently disappears into the value.

use rgf_core::budget::Budget;
use rgf_core::errors::{ErrorInfo, RgfError};
use rgf_core::rng::derive_substream_seed;
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::integrand::Integrand;
use crate::sampler::{estimate, McEstimate, SamplerOpts};

/// Substream base separating resolutions from each other.
const FIDELITY_SUBSTREAM: u64 = 0x4D43_4644 << 16;

fn fidelity_error(code: &str, message: impl Into<String>) -> RgfError {
    RgfError::Sampling(ErrorInfo::new(code, message.into()))
}

/// The estimate obtained at one resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionEstimate {
    /// Grid resolution (cells per axis).
    pub resolution: u32,
    /// Estimate at that resolution.
    pub estimate: McEstimate,
}

/// Continuum estimate with its itemized sampling diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FidelityEstimate {
    /// Extrapolated (or single-resolution) value.
    pub value: f64,
    /// Statistical standard error propagated through the extrapolation.
    pub statistical: f64,
    /// Discretization error: the extrapolation residual, or a cell-width
    /// bound when only one resolution is configured.
    pub discretization: f64,
    /// Per-resolution estimates, finest last.
    pub per_resolution: Vec<ResolutionEstimate>,
    /// Whether any resolution was flagged for poor mixing.
    pub poor_mixing: bool,
    /// Whether any resolution was stopped early by the budget.
    pub incomplete: bool,
    /// Diagnostic notes recorded in provenance.
    pub notes: Vec<String>,
}

/// Runs the estimator at every configured resolution and extrapolates.
///
/// With two or more resolutions the two finest are combined assuming
/// second-order convergence in the cell width `h`:
/// `V = (v_f h_c² − v_c h_f²) / (h_c² − h_f²)`, and the discretization error
/// is `|V − v_f|`. A single resolution yields that estimate directly with a
/// heuristic `h²` bound and an explanatory note.
pub fn estimate_multi(
    integrand: &dyn Integrand,
    domain: &Domain,
    resolutions: &[u32],
    opts: &SamplerOpts,
    master_seed: u64,
    budget: &Budget,
) -> Result<FidelityEstimate, RgfError> {
    if resolutions.is_empty() {
        return Err(fidelity_error(
            "bad-config",
            "at least one resolution is required",
        ));
    }
    let mut sorted: Vec<u32> = resolutions.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut per_resolution = Vec::with_capacity(sorted.len());
    for &resolution in &sorted {
        let seed = derive_substream_seed(master_seed, FIDELITY_SUBSTREAM + resolution as u64);
        let level = domain.with_resolution(resolution)?;
        let estimate = estimate(integrand, &level, opts, seed, budget)?;
        per_resolution.push(ResolutionEstimate {
            resolution,
            estimate,
        });
    }

    let poor_mixing = per_resolution.iter().any(|r| r.estimate.poor_mixing);
    let incomplete = per_resolution.iter().any(|r| r.estimate.incomplete);
    let mut notes: Vec<String> = per_resolution
        .iter()
        .flat_map(|r| {
            r.estimate
                .notes
                .iter()
                .map(move |note| format!("r{}: {note}", r.resolution))
        })
        .collect();

    if per_resolution.len() == 1 {
        let only = &per_resolution[0];
        let h = domain.with_resolution(only.resolution)?.max_cell_width();
        let span = domain
            .axes()
            .iter()
            .map(|axis| axis.width())
            .fold(f64::INFINITY, f64::min);
        // Heuristic midpoint-rule bound; a second resolution replaces it
        // with a measured residual.
        let discretization = only.estimate.value.abs() * (h / span) * (h / span);
        notes.push("single resolution: discretization error is an h^2 bound, not a measured residual".to_string());
        return Ok(FidelityEstimate {
            value: only.estimate.value,
            statistical: only.estimate.std_error,
            discretization,
            per_resolution,
            poor_mixing,
            incomplete,
            notes,
        });
    }

    // Richardson step on the two finest levels.
    let coarse = &per_resolution[per_resolution.len() - 2];
    let fine = &per_resolution[per_resolution.len() - 1];
    let h_coarse = domain.with_resolution(coarse.resolution)?.max_cell_width();
    let h_fine = domain.with_resolution(fine.resolution)?.max_cell_width();
    let hc2 = h_coarse * h_coarse;
    let hf2 = h_fine * h_fine;
    let denom = hc2 - hf2;
    let weight_fine = hc2 / denom;
    let weight_coarse = -hf2 / denom;
    let value = weight_fine * fine.estimate.value + weight_coarse * coarse.estimate.value;
    let statistical = ((weight_fine * fine.estimate.std_error).powi(2)
        + (weight_coarse * coarse.estimate.std_error).powi(2))
    .sqrt();
    let discretization = (value - fine.estimate.value).abs();

    Ok(FidelityEstimate {
        value,
        statistical,
        discretization,
        per_resolution,
        poor_mixing,
        incomplete,
        notes,
    })
}
