//! Solve session configuration.

use rgf_core::errors::{ErrorInfo, RgfError};
use rgf_flow::{SolverOpts, StabilityOpts, StepPolicy};
use rgf_mc::SamplerOpts;
use serde::{Deserialize, Serialize};

use crate::observable::ObservableSpec;

fn config_error(code: &str, message: impl Into<String>) -> RgfError {
    RgfError::Config(ErrorInfo::new(code, message.into()))
}

fn default_resolutions() -> Vec<u32> {
    vec![64, 128]
}

fn default_random_seed() -> u64 {
    0x5247_464C
}

fn default_max_iterations() -> usize {
    1_000_000
}

/// Everything a solve session needs besides the flow model itself.
///
/// Every field has a serde default so a config file only has to name the
/// seeds it cares about. The whole struct participates in the input hash,
/// so two sessions with equal model and config are bit-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveConfig {
    /// Step-size policy for flow integration.
    #[serde(default)]
    pub step: StepPolicy,
    /// Newton solver options.
    #[serde(default)]
    pub solver: SolverOpts,
    /// Stability analysis options.
    #[serde(default)]
    pub stability: StabilityOpts,
    /// Monte Carlo sampler options shared by all sampled observables.
    #[serde(default)]
    pub sampler: SamplerOpts,
    /// Newton starting points in coupling space.
    #[serde(default)]
    pub seeds: Vec<Vec<f64>>,
    /// Grid resolutions for multi-fidelity estimation, coarsest first.
    #[serde(default = "default_resolutions")]
    pub resolutions: Vec<u32>,
    /// Master seed every random substream derives from.
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    /// Wall-clock limit for the whole session.
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    /// Iteration budget shared across the session.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Observables to evaluate at the certified fixed point.
    #[serde(default)]
    pub observables: Vec<ObservableSpec>,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            step: StepPolicy::default(),
            solver: SolverOpts::default(),
            stability: StabilityOpts::default(),
            sampler: SamplerOpts::default(),
            seeds: Vec::new(),
            resolutions: default_resolutions(),
            random_seed: default_random_seed(),
            timeout_seconds: None,
            max_iterations: default_max_iterations(),
            observables: Vec::new(),
        }
    }
}

impl SolveConfig {
    /// Checks the cross-field constraints serde cannot express.
    pub fn validate(&self, dim: usize) -> Result<(), RgfError> {
        if self.seeds.is_empty() {
            return Err(config_error("bad-config", "at least one seed is required"));
        }
        for (index, seed) in self.seeds.iter().enumerate() {
            if seed.len() != dim {
                return Err(config_error(
                    "shape-mismatch",
                    format!(
                        "seed {index} has dimension {} but the model has {dim} couplings",
                        seed.len()
                    ),
                ));
            }
            if seed.iter().any(|value| !value.is_finite()) {
                return Err(config_error(
                    "bad-config",
                    format!("seed {index} contains a non-finite component"),
                ));
            }
        }
        if self.resolutions.is_empty() {
            return Err(config_error(
                "bad-config",
                "at least one resolution is required",
            ));
        }
        if self.resolutions.iter().any(|&resolution| resolution == 0) {
            return Err(config_error("bad-config", "resolutions must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(config_error("bad-config", "max_iterations must be positive"));
        }
        if let Some(timeout) = self.timeout_seconds {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(config_error(
                    "bad-config",
                    "timeout_seconds must be positive and finite",
                ));
            }
        }
        let mut names: Vec<&str> = self
            .observables
            .iter()
            .map(|spec| spec.name.as_str())
            .collect();
        names.sort_unstable();
        for pair in names.windows(2) {
            if pair[0] == pair[1] {
                return Err(config_error(
                    "bad-config",
                    format!("duplicate observable name {:?}", pair[0]),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_an_empty_config() {
        let config: SolveConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.resolutions, vec![64, 128]);
        assert_eq!(config.max_iterations, 1_000_000);
        assert!(config.seeds.is_empty());
        assert!(config.observables.is_empty());
    }

    #[test]
    fn missing_seeds_fail_validation() {
        let config = SolveConfig::default();
        let err = config.validate(2).unwrap_err();
        assert_eq!(err.code(), "bad-config");
    }

    #[test]
    fn mismatched_seed_dimension_is_rejected() {
        let config = SolveConfig {
            seeds: vec![vec![1.0, 2.0, 3.0]],
            ..SolveConfig::default()
        };
        let err = config.validate(2).unwrap_err();
        assert_eq!(err.code(), "shape-mismatch");
    }

    #[test]
    fn duplicate_observable_names_are_rejected() {
        use crate::observable::{ClosedForm, ObservableDef};
        let spec = ObservableSpec {
            name: "mass-gap".to_string(),
            def: ObservableDef::ClosedForm {
                form: ClosedForm::VertexCorrection { coupling: 0 },
            },
            reference: None,
        };
        let config = SolveConfig {
            seeds: vec![vec![1.0]],
            observables: vec![spec.clone(), spec],
            ..SolveConfig::default()
        };
        let err = config.validate(1).unwrap_err();
        assert_eq!(err.code(), "bad-config");
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = SolveConfig {
            seeds: vec![vec![3.0], vec![6.0]],
            random_seed: 99,
            ..SolveConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: SolveConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
