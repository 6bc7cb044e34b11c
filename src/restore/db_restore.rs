// schema-vault/src/restore/db_restore.rs
use std::path::Path;

use crate::credentials::ConnectionParams;
use crate::registry::SchemaTarget;
use crate::utils::process::CommandSpec;

/// Builds the pg_restore invocation that replays `archive_path` into one schema.
///
/// `-c --if-exists` drops the schema's existing objects before recreating them,
/// so whatever the target schema held before is lost.
pub fn pg_restore_command(
    pg_restore_path: &Path,
    params: &ConnectionParams,
    target: &SchemaTarget,
    archive_path: &Path,
) -> CommandSpec {
    CommandSpec::new(pg_restore_path)
        .arg("-h")
        .arg(&params.host)
        .arg("-p")
        .arg(params.port.to_string())
        .arg("-U")
        .arg(&params.user)
        .arg("-d")
        .arg(&target.database)
        .arg("-n")
        .arg(&target.schema)
        .arg("-c")
        .arg("--if-exists")
        .arg("-v")
        .arg("-w")
        .arg(archive_path)
        .secret("PGPASSWORD", params.password.as_deref())
}
