//! The integrand seam between observable definitions and the estimators.

use rgf_core::errors::{ErrorInfo, RgfError};
use serde::{Deserialize, Serialize};

/// A pure function over a sampling domain.
///
/// Implementations must be deterministic and side-effect free; the estimators
/// evaluate them from multiple worker threads.
pub trait Integrand: Sync {
    /// Dimension of the sampling domain the integrand expects.
    fn dim(&self) -> usize;

    /// Evaluates the integrand at `point`.
    fn evaluate(&self, point: &[f64]) -> f64;
}

/// Gaussian of an axis-aligned metric form, `exp(-Σ cᵢ xᵢ²)`.
///
/// The coefficients come from fixed-point coupling ratios, so the factor is
/// defined per session rather than baked in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricGaussian {
    coefficients: Vec<f64>,
}

impl MetricGaussian {
    /// Validates and builds the integrand. Coefficients must be finite and
    /// strictly positive so the Gaussian is normalizable.
    pub fn new(coefficients: Vec<f64>) -> Result<Self, RgfError> {
        if coefficients.is_empty() {
            return Err(RgfError::Config(ErrorInfo::new(
                "bad-config",
                "metric gaussian needs at least one coefficient",
            )));
        }
        for (idx, c) in coefficients.iter().enumerate() {
            if !c.is_finite() || *c <= 0.0 {
                return Err(RgfError::Config(
                    ErrorInfo::new("bad-config", "metric gaussian coefficients must be positive")
                        .with_context("axis", idx.to_string())
                        .with_context("coefficient", format!("{c}")),
                ));
            }
        }
        Ok(Self { coefficients })
    }

    /// The metric coefficients.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Closed-form integral over all of space, `Π sqrt(π/cᵢ)`.
    ///
    /// A tight reference for wide domains; the tail mass outside the domain
    /// is the truncation term of observables built on this integrand.
    pub fn full_space_integral(&self) -> f64 {
        self.coefficients
            .iter()
            .map(|c| (std::f64::consts::PI / c).sqrt())
            .product()
    }
}

impl Integrand for MetricGaussian {
    fn dim(&self) -> usize {
        self.coefficients.len()
    }

    fn evaluate(&self, point: &[f64]) -> f64 {
        let exponent: f64 = self
            .coefficients
            .iter()
            .zip(point.iter())
            .map(|(c, x)| c * x * x)
            .sum();
        (-exponent).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_peaks_at_the_origin() {
        let g = MetricGaussian::new(vec![1.0, 2.0]).unwrap();
        assert!((g.evaluate(&[0.0, 0.0]) - 1.0).abs() < 1e-15);
        assert!(g.evaluate(&[1.0, 1.0]) < 1.0);
    }

    #[test]
    fn full_space_integral_matches_the_product_form() {
        let g = MetricGaussian::new(vec![1.0]).unwrap();
        assert!((g.full_space_integral() - std::f64::consts::PI.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn non_positive_coefficients_are_rejected() {
        assert_eq!(
            MetricGaussian::new(vec![1.0, 0.0]).unwrap_err().code(),
            "bad-config"
        );
    }
}
