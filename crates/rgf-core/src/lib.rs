#![deny(missing_docs)]
#![doc = "Core traits and data types for the RGF flow certification engine."]

pub mod budget;
pub mod coupling;
pub mod errors;
pub mod model;
pub mod provenance;
pub mod rng;

pub use budget::{Budget, BudgetStop, CancelToken};
pub use coupling::CouplingVector;
pub use errors::{ErrorInfo, RgfError};
pub use model::{FlowModel, Monomial, PolynomialFlowModel};
pub use provenance::{SchemaVersion, SessionProvenance};
pub use rng::{derive_substream_seed, RngHandle};
