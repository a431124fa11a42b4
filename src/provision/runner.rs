//! # Provisioning Runner
//!
//! Authenticates once, then walks the stages in order and advances the run
//! phase after each. Only authentication can abort a run.

use chrono::Utc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::cms::{CmsClient, CmsTransport, Credentials};
use crate::schema::LoadedSchema;

use super::collections::{create_collections, create_fields, create_junctions};
use super::errors::{ProvisionError, ProvisionResult};
use super::permissions::grant_permissions;
use super::relations::create_relations;
use super::report::RunReport;
use super::seed::seed_content;
use super::{ProvisionPhase, RunContext, Stage};

/// Drives one provisioning run against a CMS
pub struct Provisioner<T> {
    client: CmsClient<T>,
    credentials: Credentials,
    schema: LoadedSchema,
    dry_run: bool,
    phase: ProvisionPhase,
}

impl<T: CmsTransport> Provisioner<T> {
    pub fn new(transport: T, credentials: Credentials, schema: LoadedSchema) -> Self {
        Self {
            client: CmsClient::new(transport),
            credentials,
            schema,
            dry_run: false,
            phase: ProvisionPhase::LoggedOut,
        }
    }

    /// Mark the run as a dry run in logs and the report
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn phase(&self) -> ProvisionPhase {
        self.phase
    }

    pub fn client(&self) -> &CmsClient<T> {
        &self.client
    }

    /// Execute all stages
    pub async fn run(&mut self) -> ProvisionResult<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("provision", %run_id, schema = %self.schema.source);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&mut self, run_id: Uuid) -> ProvisionResult<RunReport> {
        let started_at = Utc::now();
        info!(
            fingerprint = %self.schema.fingerprint,
            dry_run = self.dry_run,
            "Starting provisioning run"
        );

        self.phase = ProvisionPhase::LoggedOut;
        if let Err(e) = self.client.authenticate(&self.credentials).await {
            error!(code = e.error_code(), "Authentication failed: {}", e);
            return Err(ProvisionError::Auth(e));
        }
        self.phase = ProvisionPhase::Authenticated;

        let mut ctx = RunContext::new(&self.client, &self.schema.definition);
        for stage in Stage::ALL {
            info!(%stage, "Stage started");
            match stage {
                Stage::Collections => create_collections(&mut ctx).await,
                Stage::Fields => create_fields(&mut ctx).await,
                Stage::Junctions => create_junctions(&mut ctx).await,
                Stage::Relations => create_relations(&mut ctx).await,
                Stage::Permissions => grant_permissions(&mut ctx).await,
                Stage::Seed => seed_content(&mut ctx).await,
            }

            let summary = ctx.journal.summary(stage);
            info!(
                %stage,
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failed,
                "Stage finished"
            );
            self.phase = stage.completed_phase();
        }
        self.phase = self.phase.next().unwrap_or(ProvisionPhase::Complete);

        let stages = Stage::ALL.iter().map(|s| ctx.journal.summary(*s)).collect();
        let items = ctx.journal.into_records();

        let report = RunReport {
            run_id,
            schema_source: self.schema.source.clone(),
            schema_fingerprint: self.schema.fingerprint.clone(),
            dry_run: self.dry_run,
            started_at,
            finished_at: Utc::now(),
            phase: self.phase,
            stages,
            items,
        };
        info!(
            created = report.total_created(),
            failed = report.total_failed(),
            "Provisioning complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{InMemoryCms, Method};
    use crate::provision::ItemOutcome;

    fn password(pw: &str) -> Credentials {
        Credentials::Password {
            email: "admin@example.com".to_string(),
            password: pw.to_string(),
        }
    }

    #[tokio::test]
    async fn test_bundled_schema_provisions_cleanly() {
        let cms = InMemoryCms::new().with_admin("admin@example.com", "secret");
        let mut provisioner =
            Provisioner::new(cms.clone(), password("secret"), LoadedSchema::bundled().unwrap());

        let report = provisioner.run().await.unwrap();

        assert_eq!(report.phase, ProvisionPhase::Complete);
        assert_eq!(provisioner.phase(), ProvisionPhase::Complete);
        assert!(!report.has_failures(), "{}", report.render_summary());
        assert_eq!(report.stages.len(), Stage::ALL.len());
        assert!(cms.collection_names().contains(&"hotels_categories".to_string()));
    }

    #[tokio::test]
    async fn test_bad_login_stops_before_any_write() {
        let cms = InMemoryCms::new().with_admin("admin@example.com", "secret");
        let mut provisioner =
            Provisioner::new(cms.clone(), password("nope"), LoadedSchema::bundled().unwrap());

        let err = provisioner.run().await.unwrap_err();

        assert!(matches!(err, ProvisionError::Auth(_)));
        assert_eq!(provisioner.phase(), ProvisionPhase::LoggedOut);
        assert_eq!(cms.calls().len(), 1);
        assert_eq!(cms.write_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_static_token_is_fatal() {
        let cms = InMemoryCms::new().with_token("good");
        let mut provisioner = Provisioner::new(
            cms.clone(),
            Credentials::Token { token: "bad".to_string() },
            LoadedSchema::bundled().unwrap(),
        );

        let err = provisioner.run().await.unwrap_err();

        assert!(matches!(err, ProvisionError::Auth(_)));
        assert_eq!(err.error_code(), "AUTH_FAILED");
        assert_eq!(provisioner.phase(), ProvisionPhase::LoggedOut);
        assert_eq!(cms.calls().len(), 1);
        assert!(cms.collection_names().is_empty());
    }

    #[tokio::test]
    async fn test_soft_failures_still_complete() {
        let cms = InMemoryCms::new();
        cms.fail_on(Method::Post, "/collections", 500);
        let mut provisioner = Provisioner::new(
            cms.clone(),
            Credentials::Token { token: "static".to_string() },
            LoadedSchema::bundled().unwrap(),
        )
        .with_dry_run(true);

        let report = provisioner.run().await.unwrap();

        assert_eq!(report.phase, ProvisionPhase::Complete);
        assert!(report.dry_run);
        assert!(report.has_failures());
        assert!(report
            .items
            .iter()
            .filter(|i| i.stage == Stage::Seed)
            .all(|i| i.outcome == ItemOutcome::Failed));
    }
}
