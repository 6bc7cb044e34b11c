pub mod artifact;
pub mod process;

use std::path::{Path, PathBuf};
use which::which;

use crate::errors::{AppError, Result};

/// Locates a PostgreSQL client tool, preferring `bin_dir` when configured.
pub fn find_pg_executable(name: &str, bin_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = bin_dir {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
        return Err(AppError::Config(format!(
            "{} not found in configured pg_bin_dir {}",
            name,
            dir.display()
        )));
    }
    which(name).map_err(|_| {
        AppError::Config(format!(
            "{} executable not found in PATH. Please ensure PostgreSQL client tools are installed and in your PATH.",
            name
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_in_configured_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fake = dir.path().join("pg_dump");
        std::fs::write(&fake, b"#!/bin/sh\n")?;

        assert_eq!(find_pg_executable("pg_dump", Some(dir.path()))?, fake);
        assert!(find_pg_executable("pg_restore", Some(dir.path())).is_err());
        Ok(())
    }
}
