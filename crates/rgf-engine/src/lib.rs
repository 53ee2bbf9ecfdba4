#![deny(missing_docs)]
#![doc = "Certification sessions for RG flow fixed points: configuration, observable evaluation and sealed, reproducible reports."]

/// Session configuration.
pub mod config;
/// Canonical hashing of configurations and reports.
pub mod hash;
/// Observable definitions and evaluation.
pub mod observable;
/// The certification report.
pub mod report;
/// Canonical JSON serialization.
pub mod serde;
/// The solve pipeline.
pub mod session;

pub use config::SolveConfig;
pub use hash::{round_f64, seed_from_hash, stable_hash_string};
pub use observable::{
    ClosedForm, DomainSpec, McIntegrandSpec, ObservableDef, ObservableResult, ObservableSpec,
    ReferenceValue,
};
pub use report::{report_hash, CertificationReport, ReportStatus};
pub use self::serde::{from_json_slice, to_canonical_json_bytes};
pub use session::solve;
