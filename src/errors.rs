use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential resolution failed for '{id}': {reason}")]
    CredentialResolution { id: String, reason: String },

    #[error("Backup not found in storage: {key}")]
    BackupNotFound { key: String },

    #[error("{program} failed{}: {stderr}", exit_suffix(.status))]
    ExternalProcess {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage operation failed for key {key}: {reason}")]
    StorageIo { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Batch failed at pair {target} ({failed} failed pair(s)): {source}")]
    BatchFailed {
        target: String,
        failed: usize,
        source: Box<AppError>,
    },
}

fn exit_suffix(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!(" with exit code {}", code),
        None => " without an exit code".to_string(),
    }
}

impl AppError {
    pub fn storage(key: impl Into<String>, reason: impl ToString) -> Self {
        AppError::StorageIo {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn credentials(id: impl Into<String>, reason: impl ToString) -> Self {
        AppError::CredentialResolution {
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_process_message_includes_exit_code() {
        let err = AppError::ExternalProcess {
            program: "pg_restore".to_string(),
            status: Some(1),
            stderr: "relation does not exist".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "pg_restore failed with exit code 1: relation does not exist"
        );
    }

    #[test]
    fn external_process_message_without_status() {
        let err = AppError::ExternalProcess {
            program: "pg_dump".to_string(),
            status: None,
            stderr: "timed out".to_string(),
        };
        assert_eq!(err.to_string(), "pg_dump failed without an exit code: timed out");
    }
}
