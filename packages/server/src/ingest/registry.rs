use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;
use wcl::ReportCode;

use super::error::IngestError;
use super::phase::IngestPhase;

/// Report codes with an ingestion (or deletion) in flight, and their phase.
#[derive(Clone, Default)]
pub struct IngestRegistry {
    inner: Arc<DashMap<String, IngestPhase>>,
}

impl IngestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `code` for exclusive work. Fails if anything already holds it.
    pub fn try_begin(&self, code: &ReportCode) -> Result<InFlight, IngestError> {
        match self.inner.entry(code.as_str().to_string()) {
            Entry::Occupied(_) => Err(IngestError::Conflict(code.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(IngestPhase::Resolving);
                debug!(report_code = %code, "Claimed report code");
                Ok(InFlight {
                    code: code.as_str().to_string(),
                    registry: self.inner.clone(),
                })
            }
        }
    }

    pub fn phase_of(&self, code: &str) -> Option<IngestPhase> {
        self.inner.get(code).map(|entry| *entry.value())
    }

    pub fn is_running(&self, code: &str) -> bool {
        self.inner.contains_key(code)
    }
}

/// Exclusive claim on one report code. Released on drop.
pub struct InFlight {
    code: String,
    registry: Arc<DashMap<String, IngestPhase>>,
}

impl InFlight {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn phase(&self) -> IngestPhase {
        self.registry
            .get(&self.code)
            .map(|entry| *entry.value())
            .unwrap_or(IngestPhase::Failed)
    }

    pub fn advance(&self, next: IngestPhase) {
        if let Some(mut entry) = self.registry.get_mut(&self.code) {
            debug_assert!(
                entry.can_advance_to(&next),
                "illegal phase transition {:?} -> {:?}",
                *entry,
                next
            );
            *entry = next;
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.registry.remove(&self.code);
    }
}
