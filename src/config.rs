//! YAML configuration shared by the CLI commands.
//!
//! ```yaml
//! schema: main
//! cascade: false
//! tables:
//!   - order_items
//!   - orders
//! ```
//!
//! Command-line flags take precedence over values from the file.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete YAML configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Schema to inspect (driver default when absent)
    pub schema: Option<String>,
    /// Request TRUNCATE ... CASCADE where the driver supports it
    pub cascade: bool,
    /// Default truncation subset (all tables when empty)
    pub tables: Vec<String>,
}

impl ResolverConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        // An empty document is a valid, empty config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_optional(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Flag value if given, else the configured schema
    pub fn resolve_schema(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.schema.clone())
    }

    /// Comma-separated flag value if given, else the configured subset
    pub fn resolve_tables(&self, flag: Option<&str>) -> Option<Vec<String>> {
        match flag {
            Some(list) => Some(
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            None if self.tables.is_empty() => None,
            None => Some(self.tables.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
schema: analytics
cascade: true
tables:
  - orders
  - users
"#;
        let config = ResolverConfig::parse(yaml).unwrap();
        assert_eq!(config.schema.as_deref(), Some("analytics"));
        assert!(config.cascade);
        assert_eq!(config.tables, vec!["orders", "users"]);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(ResolverConfig::parse("").unwrap(), ResolverConfig::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(ResolverConfig::parse("shema: main\n").is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let config = ResolverConfig {
            schema: Some("main".to_string()),
            cascade: false,
            tables: vec!["orders".to_string()],
        };
        assert_eq!(
            config.resolve_schema(Some("other".to_string())).as_deref(),
            Some("other")
        );
        assert_eq!(config.resolve_schema(None).as_deref(), Some("main"));
        assert_eq!(
            config.resolve_tables(Some("a, b,,c")),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(config.resolve_tables(None), Some(vec!["orders".to_string()]));
        assert_eq!(ResolverConfig::default().resolve_tables(None), None);
    }
}
