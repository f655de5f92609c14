//! Shared data models.

pub mod query;
pub mod target;

// Re-export commonly used types
pub use query::{
    CellValue, ExecuteQueryResponse, QueryData, QueryRequest, QueryRequestBody, Row,
    TargetOutcome, ALL_ENGINES,
};
pub use target::{DatabaseTarget, Engine, RawConnectionEntry};
