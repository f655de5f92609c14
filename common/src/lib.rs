//! Shared building blocks for the query fan-out service.
//!
//! Holds the pieces that do not depend on a live database: configuration
//! loading, the error taxonomy, the API envelope, request middleware, and the
//! connection-string normalization used to turn loosely structured input into
//! typed database targets.

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
