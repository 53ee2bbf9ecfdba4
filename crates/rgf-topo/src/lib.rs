#![deny(missing_docs)]
#![doc = "Topological invariants of sampled condensate manifolds: Rips complexes, Z2 boundary reduction and resolution-stability gating."]

/// Vietoris-Rips complex construction from point clouds.
pub mod complex;
/// Stability-gated invariant estimation.
pub mod invariant;
/// Z2 boundary-matrix reduction and Betti numbers.
pub mod reduce;

pub use complex::RipsComplex;
pub use invariant::{estimate_invariant, InvariantOpts};
pub use reduce::{betti_numbers, BettiNumbers};
