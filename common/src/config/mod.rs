//! Service configuration.
//!
//! Server settings come from the environment (optionally seeded from a `.env`
//! file). The static database sections live in a separate JSON document, see
//! [`databases`].

pub mod databases;

use std::path::PathBuf;

pub use databases::{DatabaseSection, DatabaseSettings};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8082;
const DEFAULT_DATABASES_FILE: &str = "config/databases.json";

/// Runtime configuration for a service process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name of the service, used in logs and response metadata.
    pub service_name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Path to the static database configuration document.
    pub databases_file: PathBuf,
    /// Emit logs as JSON lines instead of human readable text.
    pub json_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            databases_file: PathBuf::from(DEFAULT_DATABASES_FILE),
            json_logs: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration for the named service from environment variables.
    ///
    /// | Variable           | Default                 |
    /// |--------------------|-------------------------|
    /// | `SERVER_HOST`      | `0.0.0.0`               |
    /// | `SERVER_PORT`      | `8082`                  |
    /// | `DATABASES_CONFIG` | `config/databases.json` |
    /// | `LOG_FORMAT`       | `text` (`json` allowed) |
    pub fn load_with_service(service_name: &str) -> Self {
        let defaults = Self::default();
        Self {
            service_name: service_name.to_string(),
            host: std::env::var("SERVER_HOST").unwrap_or(defaults.host),
            port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            databases_file: std::env::var("DATABASES_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.databases_file),
            json_logs: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    /// Socket address string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads a `.env` file from the working directory (best-effort, no error if missing).
///
/// Variables already present in the environment are left untouched.
pub fn load_dotenv() {
    let env_path = std::path::Path::new(".env");
    let Ok(content) = std::fs::read_to_string(env_path) else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
