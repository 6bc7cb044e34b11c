pub(crate) mod s3;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;

use crate::errors::Result;
use crate::registry::SchemaTarget;

pub use s3::S3ObjectStore;

pub const KEY_ROOT: &str = "postgres_backups";

/// Storage key of one schema backup:
/// `postgres_backups/{database}/{schema}/{date}/{schema}.sql`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackupKey(String);

impl BackupKey {
    /// `date` must already be in `YYYY-MM-DD` form.
    pub fn new(target: &SchemaTarget, date: &str) -> Self {
        BackupKey(format!(
            "{}/{}/{}/{}/{}.sql",
            KEY_ROOT, target.database, target.schema, date, target.schema
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable object storage holding backup archives.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads `file_path` to `key`, replacing any existing object.
    async fn upload(&self, file_path: &Path, key: &BackupKey) -> Result<()>;

    /// Writes the object at `key` into `destination`, truncating it first.
    async fn download(&self, key: &BackupKey, destination: &Path) -> Result<u64>;

    async fn exists(&self, key: &BackupKey) -> Result<bool>;
}
