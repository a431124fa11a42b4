//! # Provisioning Module
//!
//! Idempotent, re-runnable provisioning of a schema definition into the CMS.
//!
//! # Stages
//!
//! Stages run strictly in this order, each item awaited before the next:
//!
//! 1. **collections**: one per declared collection
//! 2. **fields**: declared fields of every available collection
//! 3. **junctions**: junction collections and their two key fields
//! 4. **relations**: alias fields and relation records
//! 5. **permissions**: the role, then one wildcard row per collection x action
//! 6. **seed**: content rows, capturing IDs for later foreign keys
//!
//! Every create is preceded by an existence check, so a second run is a
//! no-op. A failed item is logged and recorded; the stage carries on and
//! nothing is rolled back. Only a failed login stops the run.
//!
//! Check-then-create is not atomic: two concurrent runs against the same
//! CMS can both create the same resource.

pub mod collections;
pub mod errors;
pub mod journal;
pub mod permissions;
pub mod relations;
pub mod report;
pub mod runner;
pub mod seed;

pub use errors::{ProvisionError, ProvisionResult};
pub use journal::{ItemOutcome, ItemRecord, Journal};
pub use report::{RunReport, StageSummary};
pub use runner::Provisioner;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cms::CmsClient;
use crate::schema::SchemaDefinition;

/// Named stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Collections,
    Fields,
    Junctions,
    Relations,
    Permissions,
    Seed,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Collections,
        Stage::Fields,
        Stage::Junctions,
        Stage::Relations,
        Stage::Permissions,
        Stage::Seed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Collections => "collections",
            Stage::Fields => "fields",
            Stage::Junctions => "junctions",
            Stage::Relations => "relations",
            Stage::Permissions => "permissions",
            Stage::Seed => "seed",
        }
    }

    /// Phase reached once this stage has attempted all of its items
    pub fn completed_phase(&self) -> ProvisionPhase {
        match self {
            Stage::Collections => ProvisionPhase::CollectionsDone,
            Stage::Fields => ProvisionPhase::FieldsDone,
            Stage::Junctions => ProvisionPhase::JunctionsDone,
            Stage::Relations => ProvisionPhase::RelationsDone,
            Stage::Permissions => ProvisionPhase::PermissionsDone,
            Stage::Seed => ProvisionPhase::SeedDone,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear run state. There is no failure state: soft failures are
/// recorded per item and the run still reaches `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPhase {
    LoggedOut,
    Authenticated,
    CollectionsDone,
    FieldsDone,
    JunctionsDone,
    RelationsDone,
    PermissionsDone,
    SeedDone,
    Complete,
}

impl ProvisionPhase {
    /// The only legal successor
    pub fn next(&self) -> Option<ProvisionPhase> {
        match self {
            Self::LoggedOut => Some(Self::Authenticated),
            Self::Authenticated => Some(Self::CollectionsDone),
            Self::CollectionsDone => Some(Self::FieldsDone),
            Self::FieldsDone => Some(Self::JunctionsDone),
            Self::JunctionsDone => Some(Self::RelationsDone),
            Self::RelationsDone => Some(Self::PermissionsDone),
            Self::PermissionsDone => Some(Self::SeedDone),
            Self::SeedDone => Some(Self::Complete),
            Self::Complete => None,
        }
    }
}

/// State shared by the stages of one run
pub struct RunContext<'a, T> {
    pub client: &'a CmsClient<T>,
    pub schema: &'a SchemaDefinition,
    pub journal: Journal,
    /// Collections confirmed to exist (created or found)
    pub available: BTreeSet<String>,
    /// Seed IDs keyed `collection/key`
    pub ids: BTreeMap<String, Value>,
}

impl<'a, T> RunContext<'a, T> {
    pub fn new(client: &'a CmsClient<T>, schema: &'a SchemaDefinition) -> Self {
        Self {
            client,
            schema,
            journal: Journal::new(),
            available: BTreeSet::new(),
            ids: BTreeMap::new(),
        }
    }

    pub fn is_available(&self, collection: &str) -> bool {
        self.available.contains(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_phases_follow_phase_order() {
        let mut phase = ProvisionPhase::Authenticated;
        for stage in Stage::ALL {
            let next = phase.next().unwrap();
            assert_eq!(next, stage.completed_phase());
            phase = next;
        }
        assert_eq!(phase.next(), Some(ProvisionPhase::Complete));
        assert_eq!(ProvisionPhase::Complete.next(), None);
    }

    #[test]
    fn test_stage_serialization() {
        assert_eq!(serde_json::to_string(&Stage::Permissions).unwrap(), "\"permissions\"");
        assert_eq!(
            serde_json::to_string(&ProvisionPhase::SeedDone).unwrap(),
            "\"seed_done\""
        );
    }
}
