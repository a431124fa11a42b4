//! # Run Journal
//!
//! Append-only record of every item a run attempted. Stage counts, the final
//! summary and the JSON report are all derived from it. Recording an item
//! also emits its log line, so stages never log outcomes themselves.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::report::StageSummary;
use super::Stage;
use crate::cms::CmsError;

/// What happened to one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Created,
    /// Existing row patched in place (permissions only)
    Updated,
    /// Already present, nothing sent
    Skipped,
    Failed,
}

/// A single journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub stage: Stage,
    /// Natural key, e.g. `hotels`, `hotels/slug`, `read:hotels`
    pub key: String,
    pub outcome: ItemOutcome,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct Journal {
    records: Vec<ItemRecord>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ItemRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ItemRecord> {
        self.records
    }

    fn push(&mut self, stage: Stage, key: &str, outcome: ItemOutcome, started: Instant) -> &mut ItemRecord {
        self.records.push(ItemRecord {
            stage,
            key: key.to_string(),
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
            status: None,
            error: None,
        });
        let last = self.records.len() - 1;
        &mut self.records[last]
    }

    pub fn created(&mut self, stage: Stage, key: &str, started: Instant) {
        info!(%stage, %key, "Created");
        self.push(stage, key, ItemOutcome::Created, started);
    }

    pub fn updated(&mut self, stage: Stage, key: &str, started: Instant) {
        info!(%stage, %key, "Updated");
        self.push(stage, key, ItemOutcome::Updated, started);
    }

    pub fn skipped(&mut self, stage: Stage, key: &str, started: Instant) {
        warn!(%stage, %key, "Already exists, skipping");
        self.push(stage, key, ItemOutcome::Skipped, started);
    }

    /// Record a remote or transport failure, keeping status and payload
    pub fn failed(&mut self, stage: Stage, key: &str, started: Instant, err: &CmsError) {
        match err.payload() {
            Some(payload) => {
                error!(%stage, %key, code = err.error_code(), %payload, "Failed: {}", err)
            }
            None => error!(%stage, %key, code = err.error_code(), "Failed: {}", err),
        }
        let record = self.push(stage, key, ItemOutcome::Failed, started);
        record.status = err.status();
        record.error = Some(err.to_string());
    }

    /// Record an item abandoned before any request was made
    pub fn abandoned(&mut self, stage: Stage, key: &str, reason: &str) {
        error!(%stage, %key, "Failed: {}", reason);
        let record = self.push(stage, key, ItemOutcome::Failed, Instant::now());
        record.error = Some(reason.to_string());
    }

    pub fn count(&self, stage: Stage, outcome: ItemOutcome) -> usize {
        self.records
            .iter()
            .filter(|r| r.stage == stage && r.outcome == outcome)
            .count()
    }

    pub fn summary(&self, stage: Stage) -> StageSummary {
        StageSummary {
            stage,
            created: self.count(stage, ItemOutcome::Created),
            updated: self.count(stage, ItemOutcome::Updated),
            skipped: self.count(stage, ItemOutcome::Skipped),
            failed: self.count(stage, ItemOutcome::Failed),
        }
    }
}
