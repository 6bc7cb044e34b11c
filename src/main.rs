//! Schema Vault
//!
//! Per-schema PostgreSQL backups to S3-compatible storage, and restores of a
//! dated backup set back into the database.

// schema-vault/src/main.rs
mod backup;
mod batch;
mod config;
mod credentials;
mod errors;
mod registry;
mod restore;
mod storage;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use backup::BackupDriver;
use batch::{validate_backup_date, BatchRunner, RestoreRequest, BACKUP_DATE_FORMAT};
use config::AppConfig;
use credentials::ConfigCredentialResolver;
use registry::SchemaTarget;
use restore::{RestoreDriver, SqlxVerifier};
use storage::{BackupKey, S3ObjectStore};
use utils::find_pg_executable;
use utils::process::TokioCommandRunner;

#[derive(Debug, Parser)]
#[command(name = "schema-vault", version, about = "Per-schema PostgreSQL backup and restore")]
struct Cli {
    /// Path to config.json
    #[arg(long, env = "SCHEMA_VAULT_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    operation: Operation,
}

#[derive(Debug, Subcommand)]
enum Operation {
    /// Back up every configured pair
    Backup {
        /// Date used in storage keys (defaults to today, UTC)
        #[arg(long)]
        run_date: Option<NaiveDate>,
    },
    /// Restore pairs from the backup taken on a given date
    Restore {
        /// Backup date, YYYY-MM-DD
        #[arg(long)]
        backup_date: Option<String>,
        /// Pair to restore as database.schema; repeatable. Defaults to all configured pairs.
        #[arg(long = "pair")]
        pairs: Vec<SchemaTarget>,
        /// Trigger parameters as JSON: {"backup_date": "...", "pairs": [{"database": "...", "schema": "..."}]}
        #[arg(long)]
        conf: Option<String>,
    },
    /// Show configured pairs and their storage keys for a date
    List {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

/// Main entry point for the backup/restore tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run_app(Cli::parse()).await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app(cli: Cli) -> Result<()> {
    let app_config = AppConfig::load_from_json(&cli.config).with_context(|| {
        format!(
            "Failed to load application configuration from {}",
            cli.config.display()
        )
    })?;

    let batch = BatchRunner::new(
        app_config.registry.clone(),
        app_config.credential_id.clone(),
        app_config.failure_policy,
    );

    match cli.operation {
        Operation::Backup { run_date } => {
            let run_timestamp = match run_date {
                Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
                None => Utc::now(),
            };
            let pg_dump = find_pg_executable("pg_dump", app_config.pg_bin_dir.as_deref())?;
            let driver = BackupDriver::new(
                Arc::new(ConfigCredentialResolver::new(app_config.credentials.clone())),
                Arc::new(S3ObjectStore::connect(&app_config.s3).await),
                Arc::new(TokioCommandRunner::new(app_config.command_timeout)),
                pg_dump,
                app_config.temp_dir.clone(),
            );

            let report = batch.run_backup(&driver, run_timestamp).await;
            report.log_summary();
            let summary = report.into_result().context("Backup process failed")?;
            println!("🎉 Backed up {} schema(s)", summary.succeeded);
        }
        Operation::Restore {
            backup_date,
            pairs,
            conf,
        } => {
            let request = build_restore_request(backup_date, pairs, conf.as_deref())?;
            let pg_restore = find_pg_executable("pg_restore", app_config.pg_bin_dir.as_deref())?;
            let mut driver = RestoreDriver::new(
                Arc::new(ConfigCredentialResolver::new(app_config.credentials.clone())),
                Arc::new(S3ObjectStore::connect(&app_config.s3).await),
                Arc::new(TokioCommandRunner::new(app_config.command_timeout)),
                pg_restore,
                app_config.temp_dir.clone(),
            );
            if app_config.verify_after_restore {
                driver = driver.with_verifier(Arc::new(SqlxVerifier));
            }

            let report = batch.run_restore(&driver, &request).await;
            report.log_summary();
            let summary = report.into_result().context("Restore process failed")?;
            println!(
                "🎉 Restored {} schema(s), skipped {} unknown pair(s)",
                summary.succeeded, summary.skipped
            );
        }
        Operation::List { date } => {
            let date = date
                .unwrap_or_else(|| Utc::now().date_naive())
                .format(BACKUP_DATE_FORMAT)
                .to_string();
            for target in app_config.registry.targets() {
                println!("{:<40} {}", target.to_string(), BackupKey::new(target, &date));
            }
        }
    }
    Ok(())
}

/// Merges the JSON trigger document with command-line flags (flags win) and
/// checks the backup date before any tool lookup or storage connection.
fn build_restore_request(
    backup_date: Option<String>,
    pairs: Vec<SchemaTarget>,
    conf: Option<&str>,
) -> Result<RestoreRequest> {
    let mut request = match conf {
        Some(raw) => serde_json::from_str::<RestoreRequest>(raw)
            .context("Failed to parse --conf as restore parameters")?,
        None => RestoreRequest::default(),
    };
    if backup_date.is_some() {
        request.backup_date = backup_date;
    }
    if !pairs.is_empty() {
        request.pairs = Some(pairs);
    }
    request.backup_date = Some(validate_backup_date(request.backup_date.as_deref())?);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_restore_flags() {
        let cli = Cli::parse_from([
            "schema-vault",
            "--config",
            "/etc/schema-vault.json",
            "restore",
            "--backup-date",
            "2024-06-01",
            "--pair",
            "app.public",
            "--pair",
            "crm.sales",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/schema-vault.json"));
        match cli.operation {
            Operation::Restore { backup_date, pairs, conf } => {
                assert_eq!(backup_date.as_deref(), Some("2024-06-01"));
                assert_eq!(
                    pairs,
                    vec![SchemaTarget::new("app", "public"), SchemaTarget::new("crm", "sales")]
                );
                assert!(conf.is_none());
            }
            other => panic!("unexpected operation: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_backup_run_date() {
        let cli = Cli::parse_from(["schema-vault", "backup", "--run-date", "2024-06-01"]);
        match cli.operation {
            Operation::Backup { run_date } => {
                assert_eq!(run_date, NaiveDate::from_ymd_opt(2024, 6, 1));
            }
            other => panic!("unexpected operation: {:?}", other),
        }
    }

    #[test]
    fn test_restore_request_from_conf() -> Result<()> {
        let request = build_restore_request(
            None,
            Vec::new(),
            Some(r#"{"backup_date": "2024-06-01", "pairs": [{"database": "app", "schema": "public"}]}"#),
        )?;
        assert_eq!(request.backup_date.as_deref(), Some("2024-06-01"));
        assert_eq!(request.pairs, Some(vec![SchemaTarget::new("app", "public")]));
        Ok(())
    }

    #[test]
    fn test_flags_override_conf() -> Result<()> {
        let request = build_restore_request(
            Some("2024-06-02".to_string()),
            vec![SchemaTarget::new("crm", "sales")],
            Some(r#"{"backup_date": "2024-06-01"}"#),
        )?;
        assert_eq!(request.backup_date.as_deref(), Some("2024-06-02"));
        assert_eq!(request.pairs, Some(vec![SchemaTarget::new("crm", "sales")]));
        Ok(())
    }

    #[test]
    fn test_bad_or_missing_date_is_rejected_before_setup() {
        for date in [None, Some("2024-13-40"), Some(" 2024-06-01")] {
            let err = build_restore_request(date.map(str::to_string), Vec::new(), None).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<errors::AppError>(), Some(errors::AppError::Validation(_))),
                "unexpected error for {:?}: {:?}",
                date,
                err
            );
        }
    }

    #[test]
    fn test_conf_date_is_validated_too() {
        let err = build_restore_request(None, Vec::new(), Some(r#"{"backup_date": "06/01/2024"}"#))
            .unwrap_err();
        assert!(err.downcast_ref::<errors::AppError>().is_some());
    }
}
