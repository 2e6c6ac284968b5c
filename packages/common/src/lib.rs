pub mod config;
pub mod event_kind;
pub mod ingest_status;
pub mod retry;

pub use config::RetryPolicy;
pub use event_kind::EventKind;
pub use ingest_status::{IngestMode, RunStatus};
