// schema-vault/src/credentials.rs
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;
use url::Url;

use crate::errors::{AppError, Result};

const DEFAULT_PG_PORT: u16 = 5432;

/// Connection parameters for one PostgreSQL server.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database_name: Option<String>,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database_name", &self.database_name)
            .finish()
    }
}

/// Turns an opaque connection id into concrete connection parameters.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, credential_id: &str) -> Result<ConnectionParams>;
}

/// A connection entry from `config.json`: either a full URL or discrete fields.
#[derive(Clone, Deserialize)]
#[serde(untagged)]
pub enum CredentialEntry {
    Url {
        url: String,
    },
    Fields {
        host: String,
        port: Option<u16>,
        user: String,
        password: Option<String>,
        password_env: Option<String>,
        database: Option<String>,
    },
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialEntry::Url { url } => {
                let shown = Url::parse(url)
                    .map(|mut parsed| {
                        if parsed.password().is_some() {
                            let _ = parsed.set_password(Some("***"));
                        }
                        parsed.to_string()
                    })
                    .unwrap_or_else(|_| "<unparseable url>".to_string());
                f.debug_struct("Url").field("url", &shown).finish()
            }
            CredentialEntry::Fields {
                host,
                port,
                user,
                password,
                password_env,
                database,
            } => f
                .debug_struct("Fields")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("password", &password.as_ref().map(|_| "***"))
                .field("password_env", password_env)
                .field("database", database)
                .finish(),
        }
    }
}

impl CredentialEntry {
    fn to_params(&self, id: &str) -> Result<ConnectionParams> {
        match self {
            CredentialEntry::Url { url } => params_from_url(id, url),
            CredentialEntry::Fields {
                host,
                port,
                user,
                password,
                password_env,
                database,
            } => {
                let password = match (password, password_env) {
                    (Some(pw), _) => Some(pw.clone()),
                    (None, Some(var)) => Some(env::var(var).map_err(|e| {
                        AppError::credentials(id, format!("password_env {}: {}", var, e))
                    })?),
                    (None, None) => None,
                };
                Ok(ConnectionParams {
                    host: host.clone(),
                    port: port.unwrap_or(DEFAULT_PG_PORT),
                    user: user.clone(),
                    password,
                    database_name: database.clone(),
                })
            }
        }
    }
}

fn params_from_url(id: &str, raw: &str) -> Result<ConnectionParams> {
    let parsed = Url::parse(raw)
        .map_err(|e| AppError::credentials(id, format!("invalid connection URL: {}", e)))?;
    if !matches!(parsed.scheme(), "postgres" | "postgresql") {
        return Err(AppError::credentials(
            id,
            format!("unsupported URL scheme '{}'", parsed.scheme()),
        ));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::credentials(id, "connection URL has no host"))?
        .to_string();
    if parsed.username().is_empty() {
        return Err(AppError::credentials(id, "connection URL has no user"));
    }
    let database_name = Some(parsed.path().trim_start_matches('/'))
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    Ok(ConnectionParams {
        host,
        port: parsed.port().unwrap_or(DEFAULT_PG_PORT),
        user: parsed.username().to_string(),
        password: parsed.password().map(str::to_string),
        database_name,
    })
}

/// Resolves ids against the `credentials` map of the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigCredentialResolver {
    entries: HashMap<String, CredentialEntry>,
}

impl ConfigCredentialResolver {
    pub fn new(entries: HashMap<String, CredentialEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl CredentialResolver for ConfigCredentialResolver {
    async fn resolve(&self, credential_id: &str) -> Result<ConnectionParams> {
        let entry = self
            .entries
            .get(credential_id)
            .ok_or_else(|| AppError::credentials(credential_id, "no such connection id"))?;
        entry.to_params(credential_id)
    }
}
