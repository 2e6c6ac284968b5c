use serde::Serialize;

/// Where a running ingestion currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum IngestPhase {
    Resolving,
    Clearing,
    FetchingMeta,
    FetchingFights { completed: usize, total: usize },
    Persisting,
    Done,
    Failed,
}

impl IngestPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Legal transitions. Any live phase may fail; progress updates within
    /// `FetchingFights` only move forward.
    pub fn can_advance_to(&self, next: &IngestPhase) -> bool {
        use IngestPhase::*;
        match (self, next) {
            (current, Failed) => !current.is_terminal(),
            (Resolving, Clearing) => true,
            (Clearing, FetchingMeta) => true,
            (FetchingMeta, FetchingFights { completed: 0, .. }) => true,
            (
                FetchingFights {
                    completed: a,
                    total: t,
                },
                FetchingFights {
                    completed: b,
                    total: u,
                },
            ) => t == u && b >= a && b <= u,
            (FetchingFights { completed, total }, Persisting) => completed <= total,
            (Persisting, Done) => true,
            _ => false,
        }
    }
}
