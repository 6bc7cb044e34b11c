// schema-vault/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::FailurePolicy;
use crate::credentials::CredentialEntry;
use crate::registry::{PairRegistry, SchemaTarget};

pub const DEFAULT_CREDENTIAL_ID: &str = "postgres_default";

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
pub struct JsonS3StorageConfig {
    pub bucket_name: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawJsonConfig {
    pub credential_id: Option<String>,
    #[serde(default)]
    pub credentials: HashMap<String, CredentialEntry>,
    pub s3_storage: Option<JsonS3StorageConfig>,
    #[serde(default)]
    pub db_schema_pairs: Vec<SchemaTarget>,
    pub temp_dir: Option<PathBuf>,
    pub pg_bin_dir: Option<PathBuf>,
    pub command_timeout_secs: Option<u64>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub verify_after_restore: bool,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credential_id: String,
    pub credentials: HashMap<String, CredentialEntry>,
    pub s3: S3Config,
    pub registry: PairRegistry,
    pub temp_dir: Option<PathBuf>,
    pub pg_bin_dir: Option<PathBuf>,
    pub command_timeout: Option<Duration>,
    pub failure_policy: FailurePolicy,
    pub verify_after_restore: bool,
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        Self::from_json_str(&config_content).with_context(|| {
            format!(
                "Invalid configuration in config file at {}",
                config_path.display()
            )
        })
    }

    pub fn from_json_str(config_content: &str) -> Result<Self> {
        let raw: RawJsonConfig =
            serde_json::from_str(config_content).context("Failed to parse JSON configuration")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        let credential_id = raw
            .credential_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CREDENTIAL_ID.to_string());

        let s3 = load_s3_config(raw.s3_storage.as_ref())?;

        if raw.db_schema_pairs.is_empty() {
            log::warn!("'db_schema_pairs' is empty in config.json. Backup and restore runs will have nothing to do.");
        }
        let registry = PairRegistry::new(raw.db_schema_pairs)
            .context("Invalid entry in db_schema_pairs")?;

        let command_timeout = match raw.command_timeout_secs {
            Some(0) => anyhow::bail!("command_timeout_secs must be greater than zero when set"),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(AppConfig {
            credential_id,
            credentials: raw.credentials,
            s3,
            registry,
            temp_dir: raw.temp_dir,
            pg_bin_dir: raw.pg_bin_dir,
            command_timeout,
            failure_policy: raw.failure_policy,
            verify_after_restore: raw.verify_after_restore,
        })
    }
}

fn load_s3_config(raw: Option<&JsonS3StorageConfig>) -> Result<S3Config> {
    let s3_raw = raw.context("s3_storage must be set in config.json")?;
    let bucket_name = s3_raw
        .bucket_name
        .clone()
        .filter(|s| !s.trim().is_empty())
        .context("s3_storage.bucket_name must be set in config.json")?;

    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
    let access_key_id = non_empty(&s3_raw.access_key_id);
    let secret_access_key = non_empty(&s3_raw.secret_access_key);
    if access_key_id.is_some() != secret_access_key.is_some() {
        anyhow::bail!(
            "s3_storage.access_key_id and s3_storage.secret_access_key must be set together"
        );
    }

    Ok(S3Config {
        bucket_name,
        region: non_empty(&s3_raw.region),
        endpoint_url: non_empty(&s3_raw.endpoint_url),
        access_key_id,
        secret_access_key,
        force_path_style: s3_raw.force_path_style,
    })
}
