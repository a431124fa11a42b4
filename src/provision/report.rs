//! # Run Report
//!
//! Per-stage counts and the full item journal of one run.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::journal::ItemRecord;
use super::{ProvisionPhase, Stage};

/// Counts for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: Stage,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageSummary {
    pub fn attempted(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }
}

/// Outcome of a whole provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub schema_source: String,
    pub schema_fingerprint: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phase: ProvisionPhase,
    pub stages: Vec<StageSummary>,
    pub items: Vec<ItemRecord>,
}

impl RunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn total_created(&self) -> usize {
        self.stages.iter().map(|s| s.created).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.stages.iter().map(|s| s.failed).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.total_failed() > 0
    }

    /// Human-readable summary table
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Provisioning {} ({}){}\n",
            self.schema_source,
            self.schema_fingerprint,
            if self.dry_run { " [dry run]" } else { "" }
        ));
        out.push_str(&format!(
            "{:<12} {:>8} {:>8} {:>8} {:>8}\n",
            "stage", "created", "updated", "skipped", "failed"
        ));
        for s in &self.stages {
            out.push_str(&format!(
                "{:<12} {:>8} {:>8} {:>8} {:>8}\n",
                s.stage.as_str(),
                s.created,
                s.updated,
                s.skipped,
                s.failed
            ));
        }
        let elapsed = (self.finished_at - self.started_at).num_milliseconds();
        out.push_str(&format!(
            "Finished in {}ms, phase {:?}, {} created, {} failed\n",
            elapsed,
            self.phase,
            self.total_created(),
            self.total_failed()
        ));
        out
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: Uuid::new_v4(),
            schema_source: "bundled:hotel.yaml".to_string(),
            schema_fingerprint: "crc32:00000000".to_string(),
            dry_run: true,
            started_at: now,
            finished_at: now,
            phase: ProvisionPhase::Complete,
            stages: vec![
                StageSummary { stage: Stage::Collections, created: 5, updated: 0, skipped: 0, failed: 0 },
                StageSummary { stage: Stage::Permissions, created: 20, updated: 4, skipped: 0, failed: 1 },
            ],
            items: vec![],
        }
    }

    #[test]
    fn test_totals() {
        let report = report();
        assert_eq!(report.total_created(), 25);
        assert!(report.has_failures());
        assert_eq!(report.stage(Stage::Permissions).unwrap().attempted(), 25);
        assert!(report.stage(Stage::Seed).is_none());
    }

    #[test]
    fn test_render_summary_lists_stages() {
        let text = report().render_summary();
        assert!(text.contains("collections"));
        assert!(text.contains("permissions"));
        assert!(text.contains("[dry run]"));
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        report().write_json(&path).unwrap();

        let parsed: RunReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.stages.len(), 2);
        assert_eq!(parsed.phase, ProvisionPhase::Complete);
    }
}
