//! Certification report assembly and deterministic hashing.

use rgf_core::errors::{ErrorInfo, RgfError};
use rgf_core::provenance::SessionProvenance;
use rgf_flow::{FixedPointCandidate, SeedRecord, StabilityVerdict};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash::{round_f64, stable_hash_string};
use crate::observable::ObservableResult;

/// Overall verdict of a solve session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    /// Every stage ran to completion and passed its quality gates.
    Certified,
    /// The report is usable but at least one stage was budget-stopped or
    /// flagged for poor mixing.
    Partial,
}

impl ReportStatus {
    /// Status label used in logs and the CLI exit path.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Certified => "certified",
            ReportStatus::Partial => "partial",
        }
    }
}

/// The full output of a solve session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificationReport {
    /// Overall verdict.
    pub status: ReportStatus,
    /// The winning fixed-point candidate.
    pub fixed_point: FixedPointCandidate,
    /// Outcome of every Newton seed, in seed order.
    pub seed_records: Vec<SeedRecord>,
    /// Spectral and Lyapunov stability verdict at the fixed point.
    pub stability: StabilityVerdict,
    /// Evaluated observables, in request order.
    pub observables: Vec<ObservableResult>,
    /// Reproducibility trail.
    pub provenance: SessionProvenance,
}

fn strip_wall_clock(value: &mut Value) {
    if let Value::Object(map) = value {
        if let Some(Value::Object(provenance)) = map.get_mut("provenance") {
            provenance.remove("created_at");
            provenance.remove("wall_clock_seconds");
        }
    }
}

fn round_numbers(value: &mut Value) {
    match value {
        Value::Number(number) => {
            if let Some(float) = number.as_f64() {
                if number.as_i64().is_none() && number.as_u64().is_none() {
                    if let Some(rounded) = serde_json::Number::from_f64(round_f64(float)) {
                        *number = rounded;
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                round_numbers(item);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                round_numbers(item);
            }
        }
        _ => {}
    }
}

/// Deterministic hash of a report.
///
/// Wall-clock fields are excluded and floats are rounded to nanoprecision,
/// so two sessions with equal inputs hash equal even across machines with
/// different timing.
pub fn report_hash(report: &CertificationReport) -> Result<String, RgfError> {
    let mut value = serde_json::to_value(report)
        .map_err(|source| RgfError::Serde(ErrorInfo::new("report-serialize", source.to_string())))?;
    strip_wall_clock(&mut value);
    round_numbers(&mut value);
    stable_hash_string(&value)
}
