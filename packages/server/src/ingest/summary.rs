use std::collections::BTreeMap;

use common::{EventKind, IngestMode};
use serde::{Deserialize, Serialize};

/// Row counts per event kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct KindCounts {
    pub cast: u64,
    pub buff: u64,
    pub damage: u64,
    pub heal: u64,
    pub death: u64,
}

impl KindCounts {
    pub fn get(&self, kind: EventKind) -> u64 {
        match kind {
            EventKind::Cast => self.cast,
            EventKind::Buff => self.buff,
            EventKind::Damage => self.damage,
            EventKind::Heal => self.heal,
            EventKind::Death => self.death,
        }
    }

    pub fn add(&mut self, kind: EventKind, n: u64) {
        let slot = match kind {
            EventKind::Cast => &mut self.cast,
            EventKind::Buff => &mut self.buff,
            EventKind::Damage => &mut self.damage,
            EventKind::Heal => &mut self.heal,
            EventKind::Death => &mut self.death,
        };
        *slot += n;
    }

    pub fn merge(&mut self, other: &KindCounts) {
        for &kind in EventKind::ALL {
            self.add(kind, other.get(kind));
        }
    }

    pub fn total(&self) -> u64 {
        EventKind::ALL.iter().map(|&k| self.get(k)).sum()
    }
}

/// A fight left out of a best-effort run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FightFailure {
    pub fight_id: i32,
    pub name: String,
    pub reason: String,
}

/// What one fight contributed to the run.
#[derive(Debug, Clone, Default)]
pub struct FightOutcome {
    pub stored: KindCounts,
    pub skipped: u64,
    pub malformed: u64,
    pub skip_reasons: BTreeMap<String, u64>,
}

impl FightOutcome {
    pub fn record_skip(&mut self, key: &str) {
        self.skipped += 1;
        *self.skip_reasons.entry(key.to_string()).or_default() += 1;
    }
}

/// Outcome of a completed ingestion, stored with the run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct IngestSummary {
    pub report_code: String,
    pub mode: IngestMode,
    /// Whether an earlier copy of the report was deleted first.
    pub cleared_previous: bool,
    pub fights_total: usize,
    pub fights_processed: usize,
    pub events_stored: KindCounts,
    pub events_skipped: u64,
    pub events_malformed: u64,
    /// Skip counts keyed by reason.
    pub skip_reasons: BTreeMap<String, u64>,
    pub fights_skipped: Vec<FightFailure>,
}

impl IngestSummary {
    pub fn new(report_code: impl Into<String>, mode: IngestMode) -> Self {
        Self {
            report_code: report_code.into(),
            mode,
            cleared_previous: false,
            fights_total: 0,
            fights_processed: 0,
            events_stored: KindCounts::default(),
            events_skipped: 0,
            events_malformed: 0,
            skip_reasons: BTreeMap::new(),
            fights_skipped: Vec::new(),
        }
    }

    pub fn absorb(&mut self, outcome: FightOutcome) {
        self.fights_processed += 1;
        self.events_stored.merge(&outcome.stored);
        self.events_skipped += outcome.skipped;
        self.events_malformed += outcome.malformed;
        for (reason, n) in outcome.skip_reasons {
            *self.skip_reasons.entry(reason).or_default() += n;
        }
    }

    /// True when no fight was left out.
    pub fn is_complete(&self) -> bool {
        self.fights_skipped.is_empty() && self.fights_processed == self.fights_total
    }
}
