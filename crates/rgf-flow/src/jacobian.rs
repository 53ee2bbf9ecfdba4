//! Jacobian evaluation: analytic when the model supplies one, otherwise
//! central finite differences with one Richardson refinement.

use nalgebra::DMatrix;
use rgf_core::coupling::CouplingVector;
use rgf_core::errors::{ErrorInfo, RgfError};
use rgf_core::model::FlowModel;

fn stability_error(code: &str, message: impl Into<String>) -> RgfError {
    RgfError::Stability(ErrorInfo::new(code, message.into()))
}

/// Label recorded in provenance for the Jacobian method actually used.
pub fn jacobian_method(model: &dyn FlowModel, point: &CouplingVector) -> &'static str {
    if model.jacobian(point).is_some() {
        "analytic"
    } else {
        "central-difference"
    }
}

fn central_difference(
    model: &dyn FlowModel,
    point: &CouplingVector,
    steps: &[f64],
) -> Result<DMatrix<f64>, RgfError> {
    let dim = point.dim();
    let mut jac = DMatrix::<f64>::zeros(dim, dim);
    let values = point.values();
    for col in 0..dim {
        let h = steps[col];
        let mut forward = values.to_vec();
        let mut backward = values.to_vec();
        forward[col] += h;
        backward[col] -= h;
        let beta_fwd = model.beta(&point.with_values(forward)?)?;
        let beta_bwd = model.beta(&point.with_values(backward)?)?;
        for row in 0..dim {
            jac[(row, col)] = (beta_fwd.values()[row] - beta_bwd.values()[row]) / (2.0 * h);
        }
    }
    Ok(jac)
}

/// Evaluates the Jacobian of the beta functions at `point`.
///
/// Falls back to central differences with step `eps^(1/3) * (1 + |x_i|)` per
/// axis and one Richardson refinement at half step, which cancels the leading
/// `O(h^2)` truncation term while keeping round-off in check.
pub fn jacobian_at(
    model: &dyn FlowModel,
    point: &CouplingVector,
) -> Result<DMatrix<f64>, RgfError> {
    if let Some(jac) = model.jacobian(point) {
        if jac.nrows() != point.dim() || jac.ncols() != point.dim() {
            return Err(stability_error(
                "shape-mismatch",
                format!(
                    "analytic jacobian is {}x{}, expected {}x{}",
                    jac.nrows(),
                    jac.ncols(),
                    point.dim(),
                    point.dim()
                ),
            ));
        }
        return Ok(jac);
    }

    let base: Vec<f64> = point
        .values()
        .iter()
        .map(|x| f64::EPSILON.cbrt() * (1.0 + x.abs()))
        .collect();
    let halved: Vec<f64> = base.iter().map(|h| h / 2.0).collect();
    let coarse = central_difference(model, point, &base)?;
    let fine = central_difference(model, point, &halved)?;
    // Richardson: error ~ C h^2, so (4 D(h/2) - D(h)) / 3 cancels the lead term.
    let jac = (fine * 4.0 - coarse) / 3.0;
    if jac.iter().any(|v| !v.is_finite()) {
        return Err(stability_error(
            "non-finite-jacobian",
            "finite-difference jacobian contains non-finite entries",
        ));
    }
    Ok(jac)
}
