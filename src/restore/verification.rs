// schema-vault/src/restore/verification.rs
use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Connection};

use crate::credentials::ConnectionParams;
use crate::errors::{AppError, Result};
use crate::registry::SchemaTarget;

/// Post-restore sanity check on the target schema.
#[async_trait]
pub trait RestoreVerifier: Send + Sync {
    async fn verify(&self, params: &ConnectionParams, target: &SchemaTarget) -> Result<()>;
}

/// Confirms through a direct connection that the schema exists and reports
/// how many tables it holds.
#[derive(Debug, Clone, Default)]
pub struct SqlxVerifier;

#[async_trait]
impl RestoreVerifier for SqlxVerifier {
    async fn verify(&self, params: &ConnectionParams, target: &SchemaTarget) -> Result<()> {
        log::info!("Performing restore verification for {}", target);

        let mut options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.user)
            .database(&target.database);
        if let Some(password) = &params.password {
            options = options.password(password);
        }

        let mut conn = options
            .connect()
            .await
            .map_err(|e| AppError::Verification(format!("could not connect for {}: {}", target, e)))?;

        let schema_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM pg_namespace WHERE nspname = $1)",
        )
        .bind(&target.schema)
        .fetch_one(&mut conn)
        .await
        .map_err(|e| AppError::Verification(format!("schema lookup for {} failed: {}", target, e)))?;

        if !schema_exists {
            let _ = conn.close().await;
            return Err(AppError::Verification(format!(
                "schema {} is missing from database {} after restore",
                target.schema, target.database
            )));
        }

        let table_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pg_catalog.pg_tables WHERE schemaname = $1",
        )
        .bind(&target.schema)
        .fetch_one(&mut conn)
        .await
        .map_err(|e| AppError::Verification(format!("table count for {} failed: {}", target, e)))?;
        let _ = conn.close().await;

        if table_count == 0 {
            log::warn!(
                "No tables found in restored schema {}. The backup may have been taken from an empty schema.",
                target
            );
        } else {
            log::info!("✓ Found {} tables in restored schema {}", table_count, target);
        }
        Ok(())
    }
}
