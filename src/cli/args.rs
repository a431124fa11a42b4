//! CLI argument definitions using clap
//!
//! Commands:
//! - hotel-cms provision [--config <path>] [--schema <path>] [--url <url>] [--dry-run] [--report <path>]
//! - hotel-cms check [--schema <path>]
//! - hotel-cms diagnostics [--port <port>]
//! - hotel-cms quote --check-in <date> --check-out <date> --rate <amount>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hotel-cms - schema provisioning for the hotel collection's CMS
#[derive(Parser, Debug)]
#[command(name = "hotel-cms")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Debug-level logging (ignored when RUST_LOG is set)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create collections, fields, relations, permissions and seed content
    ///
    /// Safe to re-run: anything that already exists is skipped.
    Provision {
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Schema definition (.yaml, .yml or .json); bundled hotel schema by default
        #[arg(long)]
        schema: Option<PathBuf>,

        /// CMS base URL, overriding config and environment
        #[arg(long)]
        url: Option<String>,

        /// Run against an in-memory CMS instead of the real one
        #[arg(long)]
        dry_run: bool,

        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Validate a schema definition and print the stage plan
    Check {
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Serve GET /api/debug with the CMS environment the process sees
    Diagnostics {
        #[arg(long, default_value = "3001")]
        port: u16,
    },

    /// Compute nights and total for a stay
    Quote {
        /// YYYY-MM-DD or RFC 3339
        #[arg(long)]
        check_in: String,

        #[arg(long)]
        check_out: String,

        /// Nightly rate in whole currency units
        #[arg(long)]
        rate: u64,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_flags() {
        let cli = Cli::try_parse_from([
            "hotel-cms",
            "provision",
            "--url",
            "https://cms.example.com",
            "--dry-run",
            "--report",
            "out.json",
        ])
        .unwrap();

        match cli.command {
            Command::Provision {
                url,
                dry_run,
                report,
                config,
                schema,
            } => {
                assert_eq!(url.as_deref(), Some("https://cms.example.com"));
                assert!(dry_run);
                assert_eq!(report, Some(PathBuf::from("out.json")));
                assert!(config.is_none());
                assert!(schema.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_quote_requires_dates() {
        assert!(Cli::try_parse_from(["hotel-cms", "quote", "--rate", "100"]).is_err());

        let cli = Cli::try_parse_from([
            "hotel-cms",
            "-v",
            "quote",
            "--check-in",
            "2026-05-01",
            "--check-out",
            "2026-05-03",
            "--rate",
            "100",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Quote { rate: 100, .. }));
    }

    #[test]
    fn test_diagnostics_default_port() {
        let cli = Cli::try_parse_from(["hotel-cms", "diagnostics"]).unwrap();
        assert!(matches!(cli.command, Command::Diagnostics { port: 3001 }));
    }
}
