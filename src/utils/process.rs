// schema-vault/src/utils/process.rs
use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::errors::{AppError, Result};

const STDERR_TAIL_LINES: usize = 20;

/// One external invocation.
///
/// Secrets ride in `secret_env` and are applied to the child's environment only;
/// the parent process environment is never touched. The value is consumed by
/// [`CommandRunner::run`], so the secret is dropped as soon as the call returns.
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub secret_env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            secret_env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn secret(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.secret_env.push((key.to_string(), value.to_string()));
        }
        self
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted: Vec<(&str, &str)> = self
            .secret_env
            .iter()
            .map(|(k, _)| (k.as_str(), "***"))
            .collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("secret_env", &redacted)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stderr: String,
}

/// Runs external tools. Implementations must report a nonzero exit as
/// [`AppError::ExternalProcess`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput>;
}

/// Spawns real processes through tokio.
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner {
    timeout: Option<Duration>,
}

impl TokioCommandRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput> {
        let program = spec.program_name();
        log::debug!("Executing {:?}", spec);

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.secret_env {
            command.env(key, value);
        }
        drop(spec);

        let child = command.spawn().map_err(|e| AppError::ExternalProcess {
            program: program.clone(),
            status: None,
            stderr: format!("failed to start: {}", e),
        })?;
        // The Command still holds the child's environment; release it once spawned.
        drop(command);

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(AppError::ExternalProcess {
                        program,
                        status: None,
                        stderr: format!("timed out after {} seconds", limit.as_secs()),
                    });
                }
            },
            None => child.wait_with_output().await,
        };
        let output = waited?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(AppError::ExternalProcess {
                program,
                status: output.status.code(),
                stderr: stderr_tail(&stderr),
            });
        }

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(0),
            stderr,
        })
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
