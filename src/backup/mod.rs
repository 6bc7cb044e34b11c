pub(crate) mod db_dump;

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use crate::credentials::CredentialResolver;
use crate::errors::Result;
use crate::registry::SchemaTarget;
use crate::storage::{BackupKey, ObjectStore};
use crate::utils::artifact::TempArtifact;
use crate::utils::process::CommandRunner;

/// Dumps one schema with pg_dump and uploads the archive.
pub struct BackupDriver {
    credentials: Arc<dyn CredentialResolver>,
    store: Arc<dyn ObjectStore>,
    runner: Arc<dyn CommandRunner>,
    pg_dump_path: PathBuf,
    temp_dir: Option<PathBuf>,
}

impl BackupDriver {
    pub fn new(
        credentials: Arc<dyn CredentialResolver>,
        store: Arc<dyn ObjectStore>,
        runner: Arc<dyn CommandRunner>,
        pg_dump_path: PathBuf,
        temp_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            credentials,
            store,
            runner,
            pg_dump_path,
            temp_dir,
        }
    }

    /// Backs up `database.schema` to
    /// `postgres_backups/{database}/{schema}/{YYYY-MM-DD}/{schema}.sql`,
    /// replacing any backup already stored for that day.
    ///
    /// The temp archive is removed on every exit path. Errors are logged with the
    /// pair and returned unchanged.
    pub async fn backup_one(
        &self,
        credential_id: &str,
        database: &str,
        schema: &str,
        run_timestamp: DateTime<Utc>,
    ) -> Result<BackupKey> {
        let target = SchemaTarget::new(database, schema);
        match self.dump_and_upload(credential_id, &target, run_timestamp).await {
            Ok(key) => {
                log::info!(
                    "✓ Successfully backed up schema {} from database {} to {}",
                    schema,
                    database,
                    key
                );
                Ok(key)
            }
            Err(e) => {
                log::error!(
                    "Error backing up schema {} from database {}: {}",
                    schema,
                    database,
                    e
                );
                Err(e)
            }
        }
    }

    async fn dump_and_upload(
        &self,
        credential_id: &str,
        target: &SchemaTarget,
        run_timestamp: DateTime<Utc>,
    ) -> Result<BackupKey> {
        let params = self.credentials.resolve(credential_id).await?;

        let artifact = TempArtifact::create(self.temp_dir.as_deref(), target)?;
        log::debug!("Dumping {} to {}", target, artifact.path().display());

        let command =
            db_dump::pg_dump_command(&self.pg_dump_path, &params, target, artifact.path());
        drop(params);
        let output = self.runner.run(command).await?;
        // pg_dump is silent on a clean run; anything on stderr is a warning.
        for line in output.stderr.lines() {
            log::warn!("[pg_dump {}] {}", target, line);
        }
        log::debug!("pg_dump for {} exited with status {}", target, output.status);

        let date = run_timestamp.date_naive().format("%Y-%m-%d").to_string();
        let key = BackupKey::new(target, &date);
        self.store.upload(artifact.path(), &key).await?;

        if let Err(e) = artifact.close() {
            log::warn!("Failed to remove temp archive for {}: {}", target, e);
        }
        Ok(key)
    }
}
