//! CLI command implementations
//!
//! Each command builds what it needs from configuration, then drives the
//! async parts on a tokio runtime created here.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cms::{CmsTransport, Credentials, HttpTransport, InMemoryCms};
use crate::config::{ConfigError, ProvisionConfig};
use crate::config_validator::ConfigValidator;
use crate::diagnostics::{self, EnvSnapshot};
use crate::observability;
use crate::provision::{ProvisionError, Provisioner, RunReport, Stage};
use crate::schema::{LoadedSchema, RelationKind, SchemaDefinition};
use crate::ui::{parse_stay_date, Quote};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Token the in-memory CMS accepts on dry runs
const DRY_RUN_TOKEN: &str = "dry-run";

pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    observability::init_tracing(cli.verbose);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Provision {
            config,
            schema,
            url,
            dry_run,
            report,
        } => provision(config.as_deref(), schema, url, dry_run, report.as_deref()),
        Command::Check { schema } => check(schema.as_ref()),
        Command::Diagnostics { port } => serve_diagnostics(port),
        Command::Quote {
            check_in,
            check_out,
            rate,
        } => quote(&check_in, &check_out, rate),
    }
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| CliError::io("Failed to create tokio runtime", e))
}

fn provision(
    config_path: Option<&Path>,
    schema_path: Option<PathBuf>,
    url: Option<String>,
    dry_run: bool,
    report_path: Option<&Path>,
) -> CliResult<()> {
    let config = ProvisionConfig::load(config_path)?
        .with_url(url)
        .with_schema(schema_path);
    let schema = LoadedSchema::load(config.schema.as_ref())?;
    info!(
        source = %schema.source,
        fingerprint = %schema.fingerprint,
        collections = schema.definition.collections.len(),
        "Schema loaded"
    );

    let rt = runtime()?;
    let report = if dry_run {
        info!("Dry run: provisioning an in-memory CMS, {} is not contacted", config.url);
        let credentials = Credentials::Token {
            token: DRY_RUN_TOKEN.to_string(),
        };
        rt.block_on(execute(InMemoryCms::new(), credentials, schema, true))?
    } else {
        let credentials = config.credentials()?;
        let transport =
            HttpTransport::new(&config.url, config.request_timeout()).map_err(ProvisionError::Client)?;
        info!(url = %transport.base_url(), "Provisioning CMS");
        rt.block_on(execute(transport, credentials, schema, false))?
    };

    print!("{}", report.render_summary());
    if report.has_failures() {
        warn!(
            failed = report.total_failed(),
            "Some items failed; fix the cause and re-run, completed items are skipped"
        );
    }

    if let Some(path) = report_path {
        report
            .write_json(path)
            .map_err(|e| CliError::io(format!("Failed to write report {}", path.display()), e))?;
        info!(path = %path.display(), "Report written");
    }
    Ok(())
}

async fn execute<T: CmsTransport>(
    transport: T,
    credentials: Credentials,
    schema: LoadedSchema,
    dry_run: bool,
) -> CliResult<RunReport> {
    let mut provisioner = Provisioner::new(transport, credentials, schema).with_dry_run(dry_run);
    Ok(provisioner.run().await?)
}

fn check(schema_path: Option<&PathBuf>) -> CliResult<()> {
    let schema = LoadedSchema::load(schema_path)?;
    println!("{} ({}) is valid", schema.source, schema.fingerprint);
    print!("{}", render_plan(&schema.definition));
    Ok(())
}

/// Items each stage will attempt against an empty CMS
pub fn stage_plan(definition: &SchemaDefinition) -> Vec<(Stage, usize)> {
    let junctions = definition.many_to_many().count();
    let relation_items: usize = definition
        .relations
        .iter()
        .map(|r| {
            let alias = usize::from(r.alias.is_some());
            match r.kind {
                RelationKind::OneToMany => 1 + alias,
                // owner alias + two relation records
                RelationKind::ManyToMany => 3 + alias,
            }
        })
        .sum();
    let permission_items = match &definition.permissions {
        Some(p) => 1 + definition.permission_collections().len() * p.actions.len(),
        None => 0,
    };

    vec![
        (Stage::Collections, definition.collections.len()),
        (
            Stage::Fields,
            definition.collections.iter().map(|c| c.fields.len()).sum(),
        ),
        (Stage::Junctions, junctions * 3),
        (Stage::Relations, relation_items),
        (Stage::Permissions, permission_items),
        (
            Stage::Seed,
            definition.seed.iter().map(|g| g.items.len()).sum(),
        ),
    ]
}

fn render_plan(definition: &SchemaDefinition) -> String {
    let mut out = String::new();
    for (i, (stage, items)) in stage_plan(definition).iter().enumerate() {
        out.push_str(&format!("{}. {:<12} {:>4} item(s)\n", i + 1, stage.as_str(), items));
    }
    out
}

fn serve_diagnostics(port: u16) -> CliResult<()> {
    let mut v = ConfigValidator::new();
    v.validate_port("port", port);
    v.finish().map_err(ConfigError::Invalid)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let rt = runtime()?;
    rt.block_on(diagnostics::serve(addr, EnvSnapshot::capture()))
        .map_err(|e| CliError::io(format!("Diagnostic server on {} failed", addr), e))
}

fn quote(check_in: &str, check_out: &str, rate: u64) -> CliResult<()> {
    let quote = Quote::new(parse_stay_date(check_in)?, parse_stay_date(check_out)?, rate);
    if quote.nights == 0 {
        warn!("Check-out is not after check-in; quoting zero nights");
    }
    println!("{}", quote);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_plan() {
        let schema = LoadedSchema::bundled().unwrap();
        let plan = stage_plan(&schema.definition);

        assert_eq!(plan.len(), Stage::ALL.len());
        assert_eq!(plan[0], (Stage::Collections, 5));
        assert_eq!(plan[2], (Stage::Junctions, 3));
        // two one-to-many with aliases, one many-to-many without
        assert_eq!(plan[3], (Stage::Relations, 7));
        // role + (5 collections + 1 junction) x 4 actions
        assert_eq!(plan[4], (Stage::Permissions, 25));
        assert_eq!(plan[5], (Stage::Seed, 17));
    }

    #[test]
    fn test_plan_matches_first_run() {
        let schema = LoadedSchema::bundled().unwrap();
        let plan = stage_plan(&schema.definition);

        let rt = runtime().unwrap();
        let report = rt
            .block_on(execute(
                InMemoryCms::new(),
                Credentials::Token { token: "t".to_string() },
                schema,
                true,
            ))
            .unwrap();

        for (stage, items) in plan {
            assert_eq!(report.stage(stage).unwrap().created, items, "{}", stage);
        }
    }

    #[test]
    fn test_dry_run_command() {
        let dir = tempfile::TempDir::new().unwrap();
        let report_path = dir.path().join("report.json");

        run_command(Command::Provision {
            config: None,
            schema: None,
            url: None,
            dry_run: true,
            report: Some(report_path.clone()),
        })
        .unwrap();

        let report: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert!(report.dry_run);
        assert!(!report.has_failures());
    }

    #[test]
    fn test_check_rejects_missing_file() {
        let err = run_command(Command::Check {
            schema: Some(PathBuf::from("/nonexistent/schema.yaml")),
        })
        .unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_READ_ERROR");
    }

    #[test]
    fn test_diagnostics_rejects_port_zero() {
        let err = run_command(Command::Diagnostics { port: 0 }).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_INVALID");
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_quote_command() {
        run_command(Command::Quote {
            check_in: "2026-05-01".to_string(),
            check_out: "2026-05-04".to_string(),
            rate: 850,
        })
        .unwrap();

        let err = run_command(Command::Quote {
            check_in: "soon".to_string(),
            check_out: "2026-05-04".to_string(),
            rate: 850,
        })
        .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }
}
