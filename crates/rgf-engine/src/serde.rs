//! Canonical JSON serialization.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use rgf_core::errors::{ErrorInfo, RgfError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::config::SolveConfig;
use crate::report::CertificationReport;

fn serde_error(code: &str, err: impl ToString) -> RgfError {
    RgfError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => {
            let canonical_values = values.into_iter().map(canonicalize).collect();
            Value::Array(canonical_values)
        }
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic ordering.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, RgfError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json-serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical).map_err(|err| serde_error("json-write", err))?;
    Ok(bytes)
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, RgfError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json-deserialize", err))
}

/// Serializes a certification report to pretty JSON.
pub fn report_to_json(report: &CertificationReport) -> Result<String, RgfError> {
    serde_json::to_string_pretty(report).map_err(|err| serde_error("report-serialize", err))
}

/// Restores a certification report from JSON.
pub fn report_from_json(json: &str) -> Result<CertificationReport, RgfError> {
    serde_json::from_str(json).map_err(|err| serde_error("report-deserialize", err))
}

/// Restores a solve configuration from JSON.
pub fn config_from_json(json: &str) -> Result<SolveConfig, RgfError> {
    serde_json::from_str(json).map_err(|err| serde_error("config-deserialize", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_round_trip_bit_exactly() {
        // Residual norms and converged couplings land on values whose
        // shortest decimal rendering is one ULP away from the original
        // unless serde_json's exact float parsing is enabled.
        let awkward = vec![
            1.164_153_218_269_348_1e-10_f64,
            0.249_999_999_848_341_54,
            f64::MIN_POSITIVE,
            -3.424_757_174_142_21,
        ];
        let bytes = to_canonical_json_bytes(&awkward).unwrap();
        let back: Vec<f64> = from_json_slice(&bytes).unwrap();
        for (a, b) in awkward.iter().zip(back.iter()) {
            assert_eq!(a.to_bits(), b.to_bits(), "{a} round-tripped as {b}");
        }
    }

    #[test]
    fn canonical_bytes_order_object_keys() {
        let value = serde_json::json!({ "z": 1, "a": { "y": 2, "b": 3 } });
        let bytes = to_canonical_json_bytes(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":{"b":3,"y":2},"z":1}"#
        );
    }
}
