// schema-vault/src/backup/db_dump.rs
use std::path::Path;

use crate::credentials::ConnectionParams;
use crate::registry::SchemaTarget;
use crate::utils::process::CommandSpec;

/// Builds the pg_dump invocation for a single schema, written as a custom-format
/// archive to `output_path`. The password travels in the child's `PGPASSWORD`.
pub fn pg_dump_command(
    pg_dump_path: &Path,
    params: &ConnectionParams,
    target: &SchemaTarget,
    output_path: &Path,
) -> CommandSpec {
    CommandSpec::new(pg_dump_path)
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
        .arg("-F")
        .arg("c")
        .arg("-w") // never prompt for a password
        .arg("-f")
        .arg(output_path)
        .secret("PGPASSWORD", params.password.as_deref())
}
