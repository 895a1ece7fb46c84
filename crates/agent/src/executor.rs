use std::sync::Arc;

use staffchat_core::ExecutionResult;
use staffchat_db::{DataSource, QueryOutput};
use tracing::{debug, error};

use crate::sql::extract_column_names;

/// Runs generated queries and never lets a data-source failure escape as anything but data.
#[derive(Clone)]
pub struct SafeQueryExecutor {
    source: Arc<dyn DataSource>,
}

impl SafeQueryExecutor {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    pub async fn execute(&self, query: &str) -> ExecutionResult {
        match self.source.run(query).await {
            Ok(QueryOutput::Table { headers, rows }) => ExecutionResult::success(headers, rows),
            Ok(QueryOutput::Rows(rows)) => {
                let headers = extract_column_names(query);
                debug!(
                    event_name = "agent.executor.headers_derived",
                    header_count = headers.len(),
                    row_count = rows.len(),
                    "derived headers from select list"
                );
                ExecutionResult::success(headers, rows)
            }
            Err(source_error) => {
                error!(
                    event_name = "agent.executor.query_failed",
                    error = %source_error,
                    "query execution failed"
                );
                ExecutionResult::failure(source_error.to_string())
            }
        }
    }
}
