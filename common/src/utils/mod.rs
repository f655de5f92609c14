//! Utility functions and helpers.

pub mod connection_string;
pub mod multi_connection;
pub mod sql_validator;

// Re-export commonly used types
pub use connection_string::{sanitize, strip_quotes};
pub use multi_connection::parse_multiple_connections;
pub use sql_validator::SqlValidator;
