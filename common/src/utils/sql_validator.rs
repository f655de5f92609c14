//! SQL statement checks.
//!
//! The service forwards statements verbatim; blank input is rejected by
//! request validation, so all that is left here is deciding whether a
//! statement returns rows.

/// Leading keywords of statements that produce a result set.
const ROW_RETURNING_KEYWORDS: [&str; 2] = ["SELECT", "WITH"];

/// Classifies SQL statements before they are fanned out.
pub struct SqlValidator;

impl SqlValidator {
    /// Checks whether the statement returns rows (`SELECT` / `WITH`).
    pub fn returns_rows(sql: &str) -> bool {
        let sql_upper = sql.trim_start().to_uppercase();
        ROW_RETURNING_KEYWORDS
            .iter()
            .any(|keyword| sql_upper.starts_with(keyword))
    }
}
