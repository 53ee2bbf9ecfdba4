//! Immutable coupling vectors and component-wise arithmetic.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, RgfError};

fn shape_error(message: impl Into<String>) -> RgfError {
    RgfError::Config(ErrorInfo::new("shape-mismatch", message.into()))
}

/// Ordered, fixed-length vector of named dimensionless couplings.
///
/// Value type: arithmetic always produces a new vector, the fields are never
/// mutated in place, so concurrent readers are safe by construction. Length
/// and name order are fixed for the lifetime of a solving session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl CouplingVector {
    /// Creates a coupling vector from parallel name and value lists.
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Result<Self, RgfError> {
        if names.is_empty() {
            return Err(shape_error("coupling vector must have at least one component"));
        }
        if names.len() != values.len() {
            return Err(shape_error(format!(
                "{} names supplied for {} values",
                names.len(),
                values.len()
            )));
        }
        Ok(Self { names, values })
    }

    /// Creates a vector with generated names `g0..g{n-1}`.
    pub fn unnamed(values: Vec<f64>) -> Result<Self, RgfError> {
        let names = (0..values.len()).map(|idx| format!("g{idx}")).collect();
        Self::new(names, values)
    }

    /// Produces a vector with the same names but replaced values.
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self, RgfError> {
        if values.len() != self.values.len() {
            return Err(shape_error(format!(
                "replacement has {} components, vector has {}",
                values.len(),
                self.values.len()
            )));
        }
        Ok(Self {
            names: self.names.clone(),
            values,
        })
    }

    /// Number of coupling components.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Component names in canonical order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Component values in canonical order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Returns the value of the component at `idx`.
    pub fn component(&self, idx: usize) -> Result<f64, RgfError> {
        self.values.get(idx).copied().ok_or_else(|| {
            shape_error(format!("component {idx} out of range for dim {}", self.dim()))
        })
    }

    /// Looks up a component by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }

    fn check_shape(&self, other: &Self, op: &str) -> Result<(), RgfError> {
        if self.names != other.names {
            return Err(shape_error(format!(
                "{op} on vectors with different shapes ({} vs {})",
                self.dim(),
                other.dim()
            )));
        }
        Ok(())
    }

    /// Component-wise sum.
    pub fn add(&self, other: &Self) -> Result<Self, RgfError> {
        self.check_shape(other, "add")?;
        let values = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a + b)
            .collect();
        Ok(Self {
            names: self.names.clone(),
            values,
        })
    }

    /// Component-wise difference `self - other`.
    pub fn sub(&self, other: &Self) -> Result<Self, RgfError> {
        self.check_shape(other, "sub")?;
        let values = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a - b)
            .collect();
        Ok(Self {
            names: self.names.clone(),
            values,
        })
    }

    /// Scales every component by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            names: self.names.clone(),
            values: self.values.iter().map(|v| v * factor).collect(),
        }
    }

    /// Euclidean norm of the component values.
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Largest absolute component value.
    pub fn max_abs(&self) -> f64 {
        self.values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// Euclidean distance to another vector of the same shape.
    pub fn distance(&self, other: &Self) -> Result<f64, RgfError> {
        Ok(self.sub(other)?.norm())
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}
