//! In-memory stand-ins for the external collaborators, shared by unit tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::credentials::{ConnectionParams, CredentialResolver};
use crate::errors::{AppError, Result};
use crate::storage::{BackupKey, ObjectStore};
use crate::utils::process::{CommandOutput, CommandRunner, CommandSpec};

/// Resolves `postgres_default` only.
#[derive(Debug, Default)]
pub struct StaticResolver;

#[async_trait]
impl CredentialResolver for StaticResolver {
    async fn resolve(&self, credential_id: &str) -> Result<ConnectionParams> {
        if credential_id != "postgres_default" {
            return Err(AppError::credentials(credential_id, "no such connection id"));
        }
        Ok(ConnectionParams {
            host: "localhost".to_string(),
            port: 5432,
            user: "backup".to_string(),
            password: Some("pw".to_string()),
            database_name: Some("postgres".to_string()),
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    downloads: Mutex<Vec<String>>,
    existence_checks: Mutex<Vec<String>>,
    fail_uploads: bool,
    fail_downloads: bool,
}

impl MemoryStore {
    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub fn failing_downloads(mut self) -> Self {
        self.fail_downloads = true;
        self
    }

    pub fn insert(&self, key: &str, bytes: &[u8]) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes.to_vec());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn existence_checks(&self) -> Vec<String> {
        self.existence_checks.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, file_path: &Path, key: &BackupKey) -> Result<()> {
        if self.fail_uploads {
            return Err(AppError::storage(key.as_str(), "injected upload failure"));
        }
        let bytes = std::fs::read(file_path)?;
        self.insert(key.as_str(), &bytes);
        Ok(())
    }

    async fn download(&self, key: &BackupKey, destination: &Path) -> Result<u64> {
        self.downloads.lock().unwrap().push(key.to_string());
        if self.fail_downloads {
            return Err(AppError::storage(key.as_str(), "injected download failure"));
        }
        let bytes = self
            .get(key.as_str())
            .ok_or_else(|| AppError::storage(key.as_str(), "no such object"))?;
        std::fs::write(destination, &bytes)?;
        Ok(bytes.len() as u64)
    }

    async fn exists(&self, key: &BackupKey) -> Result<bool> {
        self.existence_checks.lock().unwrap().push(key.to_string());
        Ok(self.objects.lock().unwrap().contains_key(key.as_str()))
    }
}

/// The argument following `flag` in `spec`, if present.
pub fn flag_value<'a>(spec: &'a CommandSpec, flag: &str) -> Option<&'a OsString> {
    spec.args
        .iter()
        .position(|a| a == flag)
        .and_then(|i| spec.args.get(i + 1))
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<OsString>,
    pub secret_env: Vec<(String, String)>,
    pub artifact: Option<PathBuf>,
    pub artifact_contents: Option<Vec<u8>>,
}

impl RecordedCall {
    pub fn schema(&self) -> Option<String> {
        let i = self.args.iter().position(|a| a == "-n")?;
        self.args.get(i + 1).map(|s| s.to_string_lossy().into_owned())
    }
}

/// Pretends to be pg_dump/pg_restore. Dump calls (`-f PATH`) get `payload`
/// written to PATH; restore calls have their input file captured.
#[derive(Debug, Default)]
pub struct FakeRunner {
    payload: Vec<u8>,
    fail_all: Option<i32>,
    fail_schemas: Vec<String>,
    fail_code: i32,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeRunner {
    pub fn writing(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            ..Self::default()
        }
    }

    pub fn failing_with(code: i32) -> Self {
        Self {
            payload: b"partial".to_vec(),
            fail_all: Some(code),
            ..Self::default()
        }
    }

    pub fn failing_for_schema(schema: &str, code: i32) -> Self {
        Self::failing_for_schemas(&[schema], code)
    }

    pub fn failing_for_schemas(schemas: &[&str], code: i32) -> Self {
        Self {
            payload: b"PGDMP".to_vec(),
            fail_schemas: schemas.iter().map(|s| s.to_string()).collect(),
            fail_code: code,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.calls().into_iter().filter_map(|c| c.artifact).collect()
    }

    pub fn attempted_schemas(&self) -> Vec<String> {
        self.calls().iter().filter_map(|c| c.schema()).collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput> {
        let dump_target = flag_value(&spec, "-f").map(PathBuf::from);
        let artifact = dump_target
            .clone()
            .or_else(|| spec.args.last().map(PathBuf::from));

        if let Some(path) = &dump_target {
            std::fs::write(path, &self.payload)?;
        }
        let artifact_contents = artifact.as_ref().and_then(|p| std::fs::read(p).ok());

        let call = RecordedCall {
            program: spec.program_name(),
            args: spec.args.clone(),
            secret_env: spec.secret_env.clone(),
            artifact,
            artifact_contents,
        };
        let schema = call.schema();
        let program = call.program.clone();
        self.calls.lock().unwrap().push(call);

        let schema_fails = schema
            .as_ref()
            .is_some_and(|name| self.fail_schemas.contains(name));
        let code = match self.fail_all {
            Some(code) => Some(code),
            None if schema_fails => Some(self.fail_code),
            None => None,
        };
        if let Some(code) = code {
            return Err(AppError::ExternalProcess {
                program,
                status: Some(code),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(CommandOutput {
            status: 0,
            stderr: String::new(),
        })
    }
}
