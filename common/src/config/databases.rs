//! Static database configuration sections.
//!
//! The document is a JSON object whose `Databases` member (or the root object
//! itself) maps a section name to a flat object of settings:
//!
//! ```json
//! {
//!   "Databases": {
//!     "Orders": {
//!       "Type": "SqlServer",
//!       "IsEnabled": true,
//!       "TimeoutSeconds": 15,
//!       "ConnectionString": "Server=db1;Database=orders;User ID=app;Password=x",
//!       "ConnectionString1": "Server=db2;Database=orders;User ID=app;Password=x"
//!     }
//!   }
//! }
//! ```
//!
//! Section and key order is preserved as written.

use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;

use crate::errors::{AppError, AppResult};

const SECTIONS_KEY: &str = "Databases";
const CONNECTION_STRING_KEY: &str = "ConnectionString";
const DEFAULT_CONNECTION_NAME: &str = "Default";
const DEFAULT_ENGINE: &str = "SqlServer";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// One named database section with its raw string values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSection {
    /// Section name, used as the prefix of every target it produces.
    pub key: String,
    /// Flattened settings in document order.
    pub values: IndexMap<String, String>,
}

impl DatabaseSection {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: IndexMap::new(),
        }
    }

    /// Builder-style setter, mostly for tests and programmatic setups.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Engine name as written, `SqlServer` when absent.
    pub fn engine_name(&self) -> &str {
        self.get("Type").unwrap_or(DEFAULT_ENGINE)
    }

    pub fn is_enabled(&self) -> bool {
        self.get("IsEnabled")
            .and_then(|v| v.trim().to_ascii_lowercase().parse().ok())
            .unwrap_or(true)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.get("TimeoutSeconds")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    /// Non-empty connection strings of this section as `(connection name, value)`.
    ///
    /// The base `ConnectionString` key is named `Default` and always comes
    /// first; every other key starting with `ConnectionString` keeps its raw
    /// name and document position.
    pub fn connection_strings(&self) -> Vec<(String, &str)> {
        let mut result = Vec::new();
        if let Some(value) = self.get(CONNECTION_STRING_KEY).filter(|v| !v.is_empty()) {
            result.push((DEFAULT_CONNECTION_NAME.to_string(), value));
        }
        for (key, value) in &self.values {
            if key.eq_ignore_ascii_case(CONNECTION_STRING_KEY) || value.is_empty() {
                continue;
            }
            if has_prefix_ignore_case(key, CONNECTION_STRING_KEY) {
                result.push((key.clone(), value.as_str()));
            }
        }
        result
    }
}

fn has_prefix_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// All static database sections known to the service.
#[derive(Debug, Clone, Default)]
pub struct DatabaseSettings {
    sections: Vec<DatabaseSection>,
}

impl DatabaseSettings {
    pub fn new(sections: Vec<DatabaseSection>) -> Self {
        Self { sections }
    }

    /// Sections in document order.
    pub fn sections(&self) -> &[DatabaseSection] {
        &self.sections
    }

    /// Reads settings from a JSON file.
    ///
    /// A missing file yields empty settings; unreadable or malformed content is
    /// a configuration error.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Database configuration file not found, no static databases configured");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let settings = Self::from_json_str(&content)?;
        tracing::info!(
            path = %path.display(),
            sections = settings.sections.len(),
            "Database configuration loaded"
        );
        Ok(settings)
    }

    /// Parses settings from a JSON document.
    pub fn from_json_str(content: &str) -> AppResult<Self> {
        let root: Value = serde_json::from_str(content)
            .map_err(|e| AppError::Config(format!("invalid database configuration: {}", e)))?;

        let Value::Object(mut root) = root else {
            return Err(AppError::Config(
                "database configuration must be a JSON object".into(),
            ));
        };
        let sections = match root.remove(SECTIONS_KEY) {
            Some(Value::Object(sections)) => sections,
            Some(_) => {
                return Err(AppError::Config(format!(
                    "`{}` must be a JSON object",
                    SECTIONS_KEY
                )))
            }
            None => root,
        };

        let sections = sections
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Object(fields) => Some(DatabaseSection {
                    values: flatten_fields(&key, fields),
                    key,
                }),
                _ => {
                    tracing::warn!(section = %key, "Ignoring database section that is not an object");
                    None
                }
            })
            .collect();

        Ok(Self { sections })
    }
}

fn flatten_fields(section: &str, fields: serde_json::Map<String, Value>) -> IndexMap<String, String> {
    let mut values = IndexMap::with_capacity(fields.len());
    for (key, value) in fields {
        let text = match value {
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Null => continue,
            Value::Array(_) | Value::Object(_) => {
                tracing::warn!(section = %section, key = %key, "Ignoring nested database setting");
                continue;
            }
        };
        values.insert(key, text);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Logging": { "Level": "info" },
        "Databases": {
            "Orders": {
                "Type": "SqlServer",
                "IsEnabled": false,
                "TimeoutSeconds": 15,
                "ConnectionString": "Server=a",
                "ConnectionString1": "Server=b",
                "ConnectionString2": ""
            },
            "Analytics": {
                "Type": "PostgreSQL",
                "ConnectionString": "Host=c"
            }
        }
    }"#;

    #[test]
    fn test_sections_preserve_document_order() {
        let settings = DatabaseSettings::from_json_str(SAMPLE).unwrap();
        let keys: Vec<_> = settings.sections().iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["Orders", "Analytics"]);
    }

    #[test]
    fn test_typed_accessors() {
        let settings = DatabaseSettings::from_json_str(SAMPLE).unwrap();
        let orders = &settings.sections()[0];
        assert_eq!(orders.engine_name(), "SqlServer");
        assert!(!orders.is_enabled());
        assert_eq!(orders.timeout_seconds(), 15);

        let analytics = &settings.sections()[1];
        assert!(analytics.is_enabled());
        assert_eq!(analytics.timeout_seconds(), 30);
    }

    #[test]
    fn test_connection_strings_default_first_and_skip_empty() {
        let section = DatabaseSection::new("S")
            .with("ConnectionString1", "Server=b")
            .with("ConnectionString", "Server=a")
            .with("ConnectionString2", "")
            .with("Type", "SqlServer");
        assert_eq!(
            section.connection_strings(),
            vec![
                ("Default".to_string(), "Server=a"),
                ("ConnectionString1".to_string(), "Server=b"),
            ]
        );
    }

    #[test]
    fn test_missing_type_defaults_to_sql_server() {
        let section = DatabaseSection::new("S").with("ConnectionString", "Server=a");
        assert_eq!(section.engine_name(), "SqlServer");
    }

    #[test]
    fn test_root_object_without_databases_key() {
        let settings =
            DatabaseSettings::from_json_str(r#"{"Main": {"ConnectionString": "Server=x"}}"#)
                .unwrap();
        assert_eq!(settings.sections().len(), 1);
        assert_eq!(settings.sections()[0].key, "Main");
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = DatabaseSettings::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_missing_file_yields_empty_settings() {
        let settings =
            DatabaseSettings::load(Path::new("/definitely/not/here/databases.json")).unwrap();
        assert!(settings.sections().is_empty());
    }
}
