//! The ingestion pipeline: normalization, per-run orchestration and the
//! background service that schedules runs.

pub mod coordinator;
pub mod error;
pub mod normalizer;
pub mod phase;
pub mod registry;
pub mod runs;
pub mod service;
pub mod summary;

pub use coordinator::{IngestOptions, IngestionCoordinator};
pub use error::{FightError, IngestError};
pub use normalizer::{ActorDirectory, CanonicalEvent, NormalizeError, Normalized, normalize};
pub use phase::IngestPhase;
pub use registry::{InFlight, IngestRegistry};
pub use service::{Accepted, IngestService};
pub use summary::IngestSummary;
