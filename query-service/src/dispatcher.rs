//! 查询分发模块
//!
//! Sends one statement to every resolved target at once. Each target runs in
//! its own task under its own timeout; whatever happens to one target ends up
//! in that target's outcome and never touches the others.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::errors::{AppError, AppResult};
use common::models::{DatabaseTarget, QueryData, TargetOutcome};

use crate::executor::{EngineExecutors, QueryExecutor};

#[derive(Clone)]
pub struct Dispatcher {
    executors: EngineExecutors,
}

impl Dispatcher {
    pub fn new(executors: EngineExecutors) -> Self {
        Self { executors }
    }

    /// Runs `sql` on every target and returns one outcome per target, in the
    /// order the targets were given.
    pub async fn dispatch(&self, targets: &[DatabaseTarget], sql: &str) -> Vec<TargetOutcome> {
        let sql: Arc<str> = Arc::from(sql);

        let handles: Vec<_> = targets
            .iter()
            .cloned()
            .map(|target| {
                let executor = self.executors.for_engine(target.engine);
                let sql = Arc::clone(&sql);
                let name = target.name.clone();
                let handle = tokio::spawn(async move { run_target(executor, target, &sql).await });
                (name, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let error = AppError::Internal(format!("query task aborted: {}", e));
                    tracing::error!(target_name = %name, error = %error, "Query task aborted");
                    TargetOutcome::failure(name, error.to_string())
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

async fn run_target(executor: Arc<dyn QueryExecutor>, target: DatabaseTarget, sql: &str) -> TargetOutcome {
    if !target.enabled {
        tracing::info!(target_name = %target.name, "Database disabled in configuration, not executed");
        return TargetOutcome::failure(target.name, "Database is disabled in configuration");
    }

    let started = Instant::now();
    match execute_with_timeout(executor.as_ref(), &target, sql).await {
        Ok(data) => {
            let elapsed = started.elapsed();
            tracing::info!(
                target_name = %target.name,
                engine = %target.engine,
                rows = data.row_count(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Query succeeded"
            );
            TargetOutcome::success(target.name, data, elapsed)
        }
        Err(e) => {
            tracing::warn!(target_name = %target.name, engine = %target.engine, error = %e, "Query failed");
            TargetOutcome::failure(target.name, e.to_string())
        }
    }
}

async fn execute_with_timeout(
    executor: &dyn QueryExecutor,
    target: &DatabaseTarget,
    sql: &str,
) -> AppResult<QueryData> {
    if target.timeout_seconds == 0 {
        return executor.execute(target, sql).await;
    }
    tokio::time::timeout(
        Duration::from_secs(target.timeout_seconds),
        executor.execute(target, sql),
    )
    .await
    .map_err(|_| AppError::Timeout(target.timeout_seconds))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::stub_executors;
    use common::models::{CellValue, Engine};

    fn target(name: &str, connection_string: &str) -> DatabaseTarget {
        DatabaseTarget::new(name, Engine::SqlServer, connection_string)
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(stub_executors())
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_others() {
        let targets = vec![
            target("A", "Server=a"),
            target("B", "Server=fail"),
            target("C", "Server=c"),
        ];
        let outcomes = dispatcher().dispatch(&targets, "SELECT 1").await;

        assert_eq!(outcomes.len(), 3);
        let names: Vec<_> = outcomes.iter().map(|o| o.database_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(outcomes[0].success && outcomes[2].success);
        assert!(!outcomes[1].success);
        assert_eq!(outcomes[1].execution_time_ms, 0);
        assert!(outcomes[1].error.as_deref().unwrap().contains("cannot reach B"));
        assert_eq!(outcomes[0].row_count, Some(1));
    }

    #[tokio::test]
    async fn test_success_carries_rows() {
        let outcomes = dispatcher().dispatch(&[target("Main", "Server=m")], "SELECT 1").await;
        let Some(QueryData::Rows(rows)) = &outcomes[0].data else {
            panic!("expected rows");
        };
        assert_eq!(rows[0]["target"], CellValue::Text("Main".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_failure() {
        let mut slow = target("Slow", "Server=slow");
        slow.timeout_seconds = 1;
        let outcomes = dispatcher()
            .dispatch(&[slow, target("Fast", "Server=f")], "SELECT 1")
            .await;

        assert!(!outcomes[0].success);
        assert_eq!(outcomes[0].error.as_deref(), Some("Operation timed out after 1s"));
        assert!(outcomes[1].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_is_unbounded() {
        let mut slow = target("Slow", "Server=slow");
        slow.timeout_seconds = 0;
        let outcomes = dispatcher().dispatch(&[slow], "SELECT 1").await;
        assert!(outcomes[0].success);
    }

    #[tokio::test]
    async fn test_panicking_target_is_isolated() {
        let targets = vec![target("Bad", "Server=panic"), target("Good", "Server=g")];
        let outcomes = dispatcher().dispatch(&targets, "SELECT 1").await;

        assert!(!outcomes[0].success);
        assert!(outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Internal error: query task aborted"));
        assert!(outcomes[1].success);
    }

    #[tokio::test]
    async fn test_disabled_target_is_not_executed() {
        let mut disabled = target("Off", "Server=panic");
        disabled.enabled = false;
        let outcomes = dispatcher().dispatch(&[disabled], "SELECT 1").await;

        assert!(!outcomes[0].success);
        assert_eq!(
            outcomes[0].error.as_deref(),
            Some("Database is disabled in configuration")
        );
    }

    #[tokio::test]
    async fn test_no_targets() {
        assert!(dispatcher().dispatch(&[], "SELECT 1").await.is_empty());
    }
}
