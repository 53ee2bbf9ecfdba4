//! Provenance and schema descriptors attached to certification reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Semantic version describing the schema of serialized payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version incremented for breaking changes.
    pub major: u32,
    /// Minor version incremented for additive changes.
    pub minor: u32,
    /// Patch version incremented for bug fixes and documentation updates.
    pub patch: u32,
}

impl SchemaVersion {
    /// Creates a new schema version descriptor.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Provenance trail recorded by a solving session.
///
/// Everything needed to reproduce a report independently lives here: the
/// master seed, the algorithms used at each stage, iteration and sample
/// counts, thresholds and resolutions. The only fields excluded from the
/// determinism contract are `created_at` and `wall_clock_seconds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionProvenance {
    /// Schema version of the report payload.
    pub schema_version: SchemaVersion,
    /// Canonical hash of the solve configuration.
    pub input_hash: String,
    /// Master deterministic seed used for all randomness.
    pub seed: u64,
    /// Algorithm name per stage (integrator, solver, jacobian, sampler).
    pub methods: BTreeMap<String, String>,
    /// Iteration and sample counts per stage.
    pub counts: BTreeMap<String, u64>,
    /// Convergence thresholds and tolerances in effect.
    pub thresholds: BTreeMap<String, f64>,
    /// Discretization resolutions used by Monte Carlo observables.
    pub resolutions: Vec<u32>,
    /// Free-form notes: recovered per-seed failures, budget stops, warnings.
    pub notes: Vec<String>,
    /// ISO-8601 timestamp recording when the report was sealed.
    pub created_at: String,
    /// Wall-clock duration of the session in seconds.
    pub wall_clock_seconds: f64,
}

impl SessionProvenance {
    /// Returns the current time formatted for the `created_at` field.
    pub fn now_timestamp() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    /// Records a stage method name.
    pub fn note_method(&mut self, stage: impl Into<String>, method: impl Into<String>) {
        self.methods.insert(stage.into(), method.into());
    }

    /// Records an iteration or sample count.
    pub fn note_count(&mut self, key: impl Into<String>, count: u64) {
        self.counts.insert(key.into(), count);
    }

    /// Records a threshold value.
    pub fn note_threshold(&mut self, key: impl Into<String>, value: f64) {
        self.thresholds.insert(key.into(), value);
    }

    /// Appends a free-form note.
    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}
