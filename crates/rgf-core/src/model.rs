//! Flow model trait and the polynomial reference implementation.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::coupling::CouplingVector;
use crate::errors::{ErrorInfo, RgfError};

fn model_error(code: &str, message: impl Into<String>) -> RgfError {
    RgfError::Config(ErrorInfo::new(code, message.into()))
}

/// A system of beta functions over coupling space.
///
/// Implementations must be pure: `beta` may not mutate hidden state and must
/// return the same output for the same input. The engine only ever borrows a
/// model for the duration of one solving session; ownership stays with the
/// caller.
pub trait FlowModel: Send + Sync {
    /// Number of couplings in the system.
    fn dim(&self) -> usize;

    /// Canonical coupling names, in the order used by every vector.
    fn names(&self) -> &[String];

    /// Evaluates the beta functions at `point`.
    fn beta(&self, point: &CouplingVector) -> Result<CouplingVector, RgfError>;

    /// Analytic Jacobian of the beta functions, if the model can supply one.
    ///
    /// Returning `None` makes the solver fall back to central finite
    /// differences with Richardson step refinement.
    fn jacobian(&self, point: &CouplingVector) -> Option<DMatrix<f64>> {
        let _ = point;
        None
    }
}

/// A single monomial term `coefficient * prod_k x_k^powers[k]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monomial {
    /// Scalar coefficient of the term.
    pub coefficient: f64,
    /// Integer power of each coupling, one entry per dimension.
    pub powers: Vec<u32>,
}

impl Monomial {
    /// Evaluates the monomial at the given point.
    fn evaluate(&self, values: &[f64]) -> f64 {
        let mut acc = self.coefficient;
        for (value, &power) in values.iter().zip(self.powers.iter()) {
            acc *= value.powi(power as i32);
        }
        acc
    }

    /// Partial derivative with respect to coupling `axis`.
    fn derivative(&self, values: &[f64], axis: usize) -> f64 {
        let power = self.powers[axis];
        if power == 0 {
            return 0.0;
        }
        let mut acc = self.coefficient * power as f64;
        for (idx, (value, &p)) in values.iter().zip(self.powers.iter()).enumerate() {
            let effective = if idx == axis { p - 1 } else { p };
            acc *= value.powi(effective as i32);
        }
        acc
    }
}

/// Beta functions expressed as sums of monomials, with an analytic Jacobian.
///
/// This is the serde-configurable model format used by the CLI and the test
/// suite. Different flow systems are different data, not different code
/// paths: the solver never branches on theory-specific constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialFlowModel {
    names: Vec<String>,
    components: Vec<Vec<Monomial>>,
}

impl PolynomialFlowModel {
    /// Creates a model after validating that every monomial matches the
    /// declared dimension.
    pub fn new(names: Vec<String>, components: Vec<Vec<Monomial>>) -> Result<Self, RgfError> {
        let dim = names.len();
        if dim == 0 {
            return Err(model_error("bad-config", "model must have at least one coupling"));
        }
        if components.len() != dim {
            return Err(model_error(
                "bad-config",
                format!("{} beta components for {} couplings", components.len(), dim),
            ));
        }
        for (idx, terms) in components.iter().enumerate() {
            for term in terms {
                if term.powers.len() != dim {
                    return Err(model_error(
                        "bad-config",
                        format!("monomial in component {idx} has {} powers, expected {dim}", term.powers.len()),
                    ));
                }
                if !term.coefficient.is_finite() {
                    return Err(model_error(
                        "bad-config",
                        format!("non-finite coefficient in component {idx}"),
                    ));
                }
            }
        }
        Ok(Self { names, components })
    }

    /// Validates a deserialized model in place.
    pub fn validated(self) -> Result<Self, RgfError> {
        Self::new(self.names, self.components)
    }
}

impl FlowModel for PolynomialFlowModel {
    fn dim(&self) -> usize {
        self.names.len()
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn beta(&self, point: &CouplingVector) -> Result<CouplingVector, RgfError> {
        if point.dim() != self.dim() {
            return Err(model_error(
                "shape-mismatch",
                format!("point has dim {}, model has dim {}", point.dim(), self.dim()),
            ));
        }
        let values = point.values();
        let beta = self
            .components
            .iter()
            .map(|terms| terms.iter().map(|t| t.evaluate(values)).sum())
            .collect();
        point.with_values(beta)
    }

    fn jacobian(&self, point: &CouplingVector) -> Option<DMatrix<f64>> {
        if point.dim() != self.dim() {
            return None;
        }
        let values = point.values();
        let dim = self.dim();
        let mut jac = DMatrix::<f64>::zeros(dim, dim);
        for (row, terms) in self.components.iter().enumerate() {
            for col in 0..dim {
                jac[(row, col)] = terms.iter().map(|t| t.derivative(values, col)).sum();
            }
        }
        Some(jac)
    }
}
