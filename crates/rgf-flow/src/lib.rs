#![deny(missing_docs)]
#![doc = "Flow integration, damped-Newton fixed-point solving and stability analysis."]

/// Explicit ODE stepping with adaptive step-size control.
pub mod integrate;
/// Analytic and finite-difference Jacobian evaluation.
pub mod jacobian;
/// Multi-seed damped Newton fixed-point solver.
pub mod newton;
/// Eigenvalue classification and Lyapunov certificate sampling.
pub mod stability;

pub use integrate::{integrate, FlowTrajectory, StepMethod, StepPolicy, TrajectorySample};
pub use jacobian::jacobian_at;
pub use newton::{find_fixed_point, FixedPointCandidate, SeedOutcome, SeedRecord, SolveReport, SolverOpts};
pub use stability::{analyze, EigenClass, EigenMode, LyapunovEvidence, LyapunovOpts, StabilityOpts, StabilityVerdict};
