//! Stability-gated invariant estimation.
//!
//! A topological invariant is resolution-independent once converged, so a
//! value is reported only when independent constructions agree; anything
//! else is an `unstable-invariant` failure, never a best guess.

use rgf_core::errors::{ErrorInfo, RgfError};
use rgf_core::rng::{derive_substream_seed, RngHandle};
use serde::{Deserialize, Serialize};

use crate::complex::RipsComplex;
use crate::reduce::{betti_numbers, BettiNumbers};

/// Substream base for subsampling rounds.
const SUBSAMPLE_SUBSTREAM: u64 = 0x544F_5353 << 16;

fn default_scales() -> Vec<f64> {
    vec![1.0, 1.1]
}

fn default_subsample_fraction() -> f64 {
    1.0
}

/// Options for [`estimate_invariant`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantOpts {
    /// Base connection radius of the Rips complex.
    pub radius: f64,
    /// Radius scales, one independent construction per entry (two or more).
    #[serde(default = "default_scales")]
    pub scales: Vec<f64>,
    /// Fraction of the cloud used per round; below one, each round draws an
    /// independent deterministic subsample.
    #[serde(default = "default_subsample_fraction")]
    pub subsample_fraction: f64,
}

fn subsample(points: &[Vec<f64>], fraction: f64, seed: u64) -> Vec<Vec<f64>> {
    let n = points.len();
    let keep = ((fraction * n as f64).ceil() as usize).clamp(1, n);
    if keep == n {
        return points.to_vec();
    }
    // Partial Fisher-Yates over the index set.
    let mut rng = RngHandle::from_seed(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..keep {
        let j = i + (rng.uniform() * (n - i) as f64) as usize;
        let j = j.min(n - 1);
        indices.swap(i, j);
    }
    indices[..keep].iter().map(|&i| points[i].clone()).collect()
}

/// Estimates the Betti numbers of a sampled manifold.
///
/// Runs one Rips construction per configured radius scale (on an independent
/// subsample when `subsample_fraction < 1`) and reports the invariant only
/// when every round computed the same value.
pub fn estimate_invariant(
    points: &[Vec<f64>],
    opts: &InvariantOpts,
    master_seed: u64,
) -> Result<BettiNumbers, RgfError> {
    if opts.scales.len() < 2 {
        return Err(RgfError::Topology(ErrorInfo::new(
            "bad-config",
            "invariant stability needs at least two independent constructions",
        )));
    }
    if !(0.0..=1.0).contains(&opts.subsample_fraction) || opts.subsample_fraction == 0.0 {
        return Err(RgfError::Topology(ErrorInfo::new(
            "bad-config",
            "subsample fraction must lie in (0, 1]",
        )));
    }

    let mut rounds: Vec<(f64, BettiNumbers)> = Vec::with_capacity(opts.scales.len());
    for (index, &scale) in opts.scales.iter().enumerate() {
        let seed = derive_substream_seed(master_seed, SUBSAMPLE_SUBSTREAM + index as u64);
        let cloud = subsample(points, opts.subsample_fraction, seed);
        let complex = RipsComplex::build(&cloud, opts.radius * scale)?;
        rounds.push((scale, betti_numbers(&complex)));
    }

    let first = rounds[0].1;
    if rounds.iter().all(|(_, betti)| *betti == first) {
        return Ok(first);
    }

    let mut error = ErrorInfo::new(
        "unstable-invariant",
        "betti numbers differ across independent constructions",
    )
    .with_hint("grow the point cloud or adjust the connection radius until the invariant converges");
    for (scale, betti) in &rounds {
        error = error.with_context(
            format!("scale_{scale}"),
            format!("b0={} b1={}", betti.b0, betti.b1),
        );
    }
    Err(RgfError::Topology(error))
}
