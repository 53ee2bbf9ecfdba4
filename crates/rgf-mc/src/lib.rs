#![deny(missing_docs)]
#![doc = "Monte Carlo estimation over discretized domains: plain, importance and Metropolis sampling, multi-fidelity extrapolation and uncertainty propagation."]

/// Compact sampling domains discretized on a cell-centred grid.
pub mod domain;
/// Multi-resolution estimation and Richardson extrapolation.
pub mod fidelity;
/// The integrand seam and builtin integrands.
pub mod integrand;
/// Estimators for the three sampling policies.
pub mod sampler;
/// Batch statistics with commutative merge, plus chain diagnostics.
pub mod stats;
/// Quadrature combination of error sources.
pub mod uncertainty;

pub use domain::{AxisRange, Domain};
pub use fidelity::{estimate_multi, FidelityEstimate, ResolutionEstimate};
pub use integrand::{Integrand, MetricGaussian};
pub use sampler::{estimate, McEstimate, SamplerOpts, SamplingPolicy};
pub use stats::{effective_sample_size, BatchStats};
pub use uncertainty::{combine, ErrorBreakdown};
