//! 连接配置解析模块
//!
//! Turns one request into the ordered list of databases the statement is sent
//! to. Exactly one of three sources is used, in this order of precedence:
//!
//! 1. the multi-connection blob (every entry sanitized, engine forced or detected),
//! 2. a single custom connection string (used as-is, explicit engine required),
//! 3. the static configuration sections, filtered by engine.

use std::collections::HashSet;

use common::config::{DatabaseSection, DatabaseSettings};
use common::errors::AppResult;
use common::models::{DatabaseTarget, Engine, QueryRequest, ALL_ENGINES};
use common::utils::{parse_multiple_connections, sanitize};

/// Borrowed view of the request fields that drive resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub database_type: &'a str,
    pub custom_connection_string: Option<&'a str>,
    pub multiple_connections: Option<&'a str>,
    pub multiple_connections_db_type: Option<&'a str>,
}

impl<'a> From<&'a QueryRequest> for ResolveRequest<'a> {
    fn from(req: &'a QueryRequest) -> Self {
        Self {
            database_type: &req.database_type,
            custom_connection_string: req.custom_connection_string.as_deref(),
            multiple_connections: req.multiple_connections.as_deref(),
            multiple_connections_db_type: req.multiple_connections_db_type.as_deref(),
        }
    }
}

/// Resolves the request into database targets, preserving input order.
///
/// # Errors
/// Returns `AppError::UnsupportedEngine` when an explicitly named engine (the
/// filter, the custom-mode engine, or the multi-connection override) is not
/// supported. Nothing is executed in that case.
pub fn resolve(req: ResolveRequest<'_>, settings: &DatabaseSettings) -> AppResult<Vec<DatabaseTarget>> {
    if let Some(blob) = non_empty(req.multiple_connections) {
        return resolve_multiple(blob, non_empty(req.multiple_connections_db_type));
    }
    if let Some(connection_string) = non_empty(req.custom_connection_string) {
        return resolve_custom(req.database_type, connection_string).map(|target| vec![target]);
    }
    resolve_static(req.database_type, settings)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn resolve_multiple(blob: &str, engine_override: Option<&str>) -> AppResult<Vec<DatabaseTarget>> {
    let forced_engine = engine_override.map(Engine::parse).transpose()?;
    let mut names = UniqueNames::default();
    let mut targets = Vec::new();

    for entry in parse_multiple_connections(blob) {
        if entry.raw_value.is_empty() {
            continue;
        }
        let sanitized = sanitize(&entry.raw_value);
        if sanitized.is_empty() {
            tracing::warn!(label = %entry.label, "Connection entry has no usable key=value pairs, skipped");
            continue;
        }
        let engine = forced_engine.unwrap_or_else(|| Engine::detect(&sanitized));
        let name = names.claim(entry.label);
        tracing::debug!(name = %name, engine = %engine, "Resolved multi-connection target");
        targets.push(DatabaseTarget::new(name, engine, sanitized));
    }

    Ok(targets)
}

fn resolve_custom(database_type: &str, connection_string: &str) -> AppResult<DatabaseTarget> {
    let engine = Engine::parse(database_type)?;
    Ok(DatabaseTarget::new(
        format!("Custom_{}", database_type),
        engine,
        connection_string,
    ))
}

fn resolve_static(database_type: &str, settings: &DatabaseSettings) -> AppResult<Vec<DatabaseTarget>> {
    let requested = if database_type.eq_ignore_ascii_case(ALL_ENGINES) {
        None
    } else {
        Some(Engine::parse(database_type)?)
    };

    let mut targets = Vec::new();
    for section in settings.sections() {
        let Some(engine) = section_engine(section) else {
            continue;
        };
        if requested.is_some_and(|wanted| wanted != engine) {
            continue;
        }
        for (connection_name, connection_string) in section.connection_strings() {
            targets.push(DatabaseTarget {
                name: format!("{}_{}", section.key, connection_name),
                engine,
                connection_string: connection_string.to_string(),
                enabled: section.is_enabled(),
                timeout_seconds: section.timeout_seconds(),
            });
        }
    }
    Ok(targets)
}

/// Engine of a static section; sections naming an unsupported engine are
/// skipped instead of failing the whole request.
fn section_engine(section: &DatabaseSection) -> Option<Engine> {
    match Engine::parse(section.engine_name()) {
        Ok(engine) => Some(engine),
        Err(e) => {
            tracing::warn!(section = %section.key, error = %e, "Skipping database section");
            None
        }
    }
}

/// Hands out target names, suffixing repeats with `_2`, `_3`, ...
#[derive(Default)]
struct UniqueNames {
    used: HashSet<String>,
}

impl UniqueNames {
    fn claim(&mut self, label: String) -> String {
        if self.used.insert(label.clone()) {
            return label;
        }
        let mut suffix = 2;
        loop {
            let candidate = format!("{}_{}", label, suffix);
            if self.used.insert(candidate.clone()) {
                tracing::warn!(label = %label, name = %candidate, "Duplicate connection label renamed");
                return candidate;
            }
            suffix += 1;
        }
    }
}
