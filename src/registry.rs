// schema-vault/src/registry.rs
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::errors::{AppError, Result};

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$-]*$").expect("identifier pattern is valid")
    })
}

/// One backup/restore unit: a schema inside a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaTarget {
    pub database: String,
    pub schema: String,
}

impl SchemaTarget {
    pub fn new(database: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
        }
    }

    /// Rejects names that could not be passed safely to pg_dump/pg_restore or
    /// embedded in a storage key.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("database", &self.database), ("schema", &self.schema)] {
            if !identifier_pattern().is_match(value) {
                return Err(AppError::Validation(format!(
                    "Invalid {} name '{}' in pair {}",
                    field, value, self
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for SchemaTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.schema)
    }
}

impl FromStr for SchemaTarget {
    type Err = AppError;

    /// Parses the `database.schema` form used on the command line.
    fn from_str(s: &str) -> Result<Self> {
        let (database, schema) = s.split_once('.').ok_or_else(|| {
            AppError::Validation(format!("Pair '{}' must be written as database.schema", s))
        })?;
        let target = SchemaTarget::new(database.trim(), schema.trim());
        target.validate()?;
        Ok(target)
    }
}

/// The configured set of pairs, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct PairRegistry {
    targets: Vec<SchemaTarget>,
}

impl PairRegistry {
    pub fn new(targets: impl IntoIterator<Item = SchemaTarget>) -> Result<Self> {
        let mut unique: Vec<SchemaTarget> = Vec::new();
        for target in targets {
            target.validate()?;
            if unique.contains(&target) {
                log::warn!("Ignoring duplicate pair {} in configuration", target);
                continue;
            }
            unique.push(target);
        }
        Ok(Self { targets: unique })
    }

    pub fn targets(&self) -> &[SchemaTarget] {
        &self.targets
    }

    pub fn contains(&self, target: &SchemaTarget) -> bool {
        self.targets.iter().any(|known| known == target)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_preserves_order_and_drops_duplicates() -> Result<()> {
        let registry = PairRegistry::new(vec![
            SchemaTarget::new("app", "public"),
            SchemaTarget::new("app", "billing"),
            SchemaTarget::new("app", "public"),
            SchemaTarget::new("crm", "public"),
        ])?;

        let names: Vec<String> = registry.targets().iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["app.public", "app.billing", "crm.public"]);
        Ok(())
    }

    #[test]
    fn test_membership_uses_both_fields() -> Result<()> {
        let registry = PairRegistry::new(vec![SchemaTarget::new("app", "public")])?;
        assert!(registry.contains(&SchemaTarget::new("app", "public")));
        assert!(!registry.contains(&SchemaTarget::new("app", "other")));
        assert!(!registry.contains(&SchemaTarget::new("public", "app")));
        Ok(())
    }

    #[test]
    fn test_rejects_unsafe_names() {
        let result = PairRegistry::new(vec![SchemaTarget::new("app; rm -rf /", "public")]);
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = PairRegistry::new(vec![SchemaTarget::new("app", "../public")]);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_parse_pair_from_cli_form() -> Result<()> {
        let target: SchemaTarget = "app.public".parse()?;
        assert_eq!(target, SchemaTarget::new("app", "public"));
        assert!("app".parse::<SchemaTarget>().is_err());
        Ok(())
    }

    #[test]
    fn test_deserialize_pair() {
        let target: SchemaTarget =
            serde_json::from_value(json!({"database": "app", "schema": "public"})).unwrap();
        assert_eq!(target, SchemaTarget::new("app", "public"));
    }
}
