// schema-vault/src/utils/artifact.rs
use std::path::Path;
use tempfile::{Builder as TempFileBuilder, TempPath};

use crate::errors::Result;
use crate::registry::SchemaTarget;

/// A local scratch file holding one dump archive.
///
/// The file is created empty with a collision-free name and removed when the
/// value is dropped, so every exit path of the owning operation (early return,
/// error, panic, or a cancelled future) leaves nothing behind.
#[derive(Debug)]
pub struct TempArtifact {
    path: TempPath,
}

impl TempArtifact {
    pub fn create(temp_dir: Option<&Path>, target: &SchemaTarget) -> Result<Self> {
        let prefix = format!("{}_{}_", target.database, target.schema);
        let mut builder = TempFileBuilder::new();
        builder.prefix(&prefix).suffix(".sql");
        let file = match temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        // Only the path is kept; the external tools open the file themselves.
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the file now, surfacing any deletion error instead of ignoring it on drop.
    pub fn close(self) -> Result<()> {
        self.path.close()?;
        Ok(())
    }
}
