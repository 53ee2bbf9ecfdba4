//! Quadrature combination of error sources.

use rgf_core::errors::{ErrorInfo, RgfError};
use serde::{Deserialize, Serialize};

/// Itemized uncertainty of one observable.
///
/// The total is always reported alongside the breakdown so a consumer can
/// see which source dominates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBreakdown {
    /// Statistical (sampling) error.
    pub statistical: f64,
    /// Discretization error from the multi-fidelity residual.
    pub discretization: f64,
    /// Truncation error: the first omitted term of any series used to build
    /// the observable, supplied by the observable definition.
    pub truncation: f64,
    /// Correlation coefficient between the statistical and discretization
    /// sources, when the caller knows they are correlated.
    pub correlation: Option<f64>,
    /// Combined one-sigma uncertainty.
    pub total: f64,
}

impl ErrorBreakdown {
    /// Label of the dominant error source.
    pub fn dominant(&self) -> &'static str {
        if self.statistical >= self.discretization && self.statistical >= self.truncation {
            "statistical"
        } else if self.discretization >= self.truncation {
            "discretization"
        } else {
            "truncation"
        }
    }
}

/// Combines independent error sources in quadrature.
///
/// Sources must be non-negative. When `correlation` is supplied it couples
/// the statistical and discretization sources (they share samples, so a
/// caller may know they co-vary); the cross term is clamped so the combined
/// variance never goes negative.
pub fn combine(
    statistical: f64,
    discretization: f64,
    truncation: f64,
    correlation: Option<f64>,
) -> Result<ErrorBreakdown, RgfError> {
    for (label, source) in [
        ("statistical", statistical),
        ("discretization", discretization),
        ("truncation", truncation),
    ] {
        if !source.is_finite() || source < 0.0 {
            return Err(RgfError::Config(
                ErrorInfo::new("bad-config", "error sources must be finite and non-negative")
                    .with_context("source", label)
                    .with_context("value", format!("{source}")),
            ));
        }
    }
    if let Some(rho) = correlation {
        if !(-1.0..=1.0).contains(&rho) {
            return Err(RgfError::Config(
                ErrorInfo::new("bad-config", "correlation coefficient must lie in [-1, 1]")
                    .with_context("correlation", format!("{rho}")),
            ));
        }
    }

    let cross = correlation.unwrap_or(0.0) * 2.0 * statistical * discretization;
    let variance = (statistical * statistical
        + discretization * discretization
        + truncation * truncation
        + cross)
        .max(0.0);

    Ok(ErrorBreakdown {
        statistical,
        discretization,
        truncation,
        correlation,
        total: variance.sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_sources_combine_in_quadrature() {
        let breakdown = combine(3.0, 4.0, 0.0, None).unwrap();
        assert!((breakdown.total - 5.0).abs() < 1e-12);
        assert_eq!(breakdown.dominant(), "discretization");
    }

    #[test]
    fn correlation_raises_and_lowers_the_total() {
        let up = combine(1.0, 1.0, 0.0, Some(1.0)).unwrap();
        assert!((up.total - 2.0).abs() < 1e-12);
        let down = combine(1.0, 1.0, 0.0, Some(-1.0)).unwrap();
        assert!(down.total.abs() < 1e-12);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert_eq!(combine(-1.0, 0.0, 0.0, None).unwrap_err().code(), "bad-config");
        assert_eq!(combine(1.0, 1.0, 0.0, Some(1.5)).unwrap_err().code(), "bad-config");
        assert_eq!(
            combine(f64::NAN, 0.0, 0.0, None).unwrap_err().code(),
            "bad-config"
        );
    }
}
