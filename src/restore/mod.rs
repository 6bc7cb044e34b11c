pub(crate) mod db_restore;
pub(crate) mod verification;

use std::path::PathBuf;
use std::sync::Arc;

use crate::credentials::CredentialResolver;
use crate::errors::{AppError, Result};
use crate::registry::SchemaTarget;
use crate::storage::{BackupKey, ObjectStore};
use crate::utils::artifact::TempArtifact;
use crate::utils::process::CommandRunner;

pub use verification::{RestoreVerifier, SqlxVerifier};

/// Downloads one schema backup and replays it with pg_restore.
pub struct RestoreDriver {
    credentials: Arc<dyn CredentialResolver>,
    store: Arc<dyn ObjectStore>,
    runner: Arc<dyn CommandRunner>,
    pg_restore_path: PathBuf,
    temp_dir: Option<PathBuf>,
    verifier: Option<Arc<dyn RestoreVerifier>>,
}

impl RestoreDriver {
    pub fn new(
        credentials: Arc<dyn CredentialResolver>,
        store: Arc<dyn ObjectStore>,
        runner: Arc<dyn CommandRunner>,
        pg_restore_path: PathBuf,
        temp_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            credentials,
            store,
            runner,
            pg_restore_path,
            temp_dir,
            verifier: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn RestoreVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Restores `database.schema` from the backup taken on `backup_date`
    /// (`YYYY-MM-DD`), dropping the schema's existing objects first.
    ///
    /// A missing backup fails with [`AppError::BackupNotFound`] before anything is
    /// downloaded. A nonzero pg_restore exit fails with
    /// [`AppError::ExternalProcess`]. The temp archive is removed on every path.
    pub async fn restore_one(
        &self,
        credential_id: &str,
        database: &str,
        schema: &str,
        backup_date: &str,
    ) -> Result<BackupKey> {
        let target = SchemaTarget::new(database, schema);
        match self.download_and_restore(credential_id, &target, backup_date).await {
            Ok(key) => {
                log::info!(
                    "✓ Successfully restored schema {} in database {} from backup: {}",
                    schema,
                    database,
                    key
                );
                Ok(key)
            }
            Err(e) => {
                log::error!(
                    "Error restoring schema {} in database {}: {}",
                    schema,
                    database,
                    e
                );
                Err(e)
            }
        }
    }

    async fn download_and_restore(
        &self,
        credential_id: &str,
        target: &SchemaTarget,
        backup_date: &str,
    ) -> Result<BackupKey> {
        let params = self.credentials.resolve(credential_id).await?;

        let key = BackupKey::new(target, backup_date);
        if !self.store.exists(&key).await? {
            return Err(AppError::BackupNotFound {
                key: key.to_string(),
            });
        }

        let artifact = TempArtifact::create(self.temp_dir.as_deref(), target)?;
        let bytes = self.store.download(&key, artifact.path()).await?;
        log::debug!(
            "Downloaded {} bytes for {} to {}",
            bytes,
            target,
            artifact.path().display()
        );

        let command =
            db_restore::pg_restore_command(&self.pg_restore_path, &params, target, artifact.path());
        let output = self.runner.run(command).await?;
        for line in output.stderr.lines() {
            log::debug!("[pg_restore {}] {}", target, line);
        }
        log::debug!("pg_restore for {} exited with status {}", target, output.status);

        if let Err(e) = artifact.close() {
            log::warn!("Failed to remove temp archive for {}: {}", target, e);
        }

        if let Some(verifier) = &self.verifier {
            verifier.verify(&params, target).await?;
        }
        Ok(key)
    }
}
