use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, ValueRef};
use staffchat_core::RowRecord;
use thiserror::Error;
use tracing::debug;

use crate::connection::DbPool;

#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),
    #[error("query timed out after {0}s")]
    Timeout(u64),
    #[error("{0}")]
    Unavailable(String),
}

/// What a data source hands back: either bare rows or rows with their own column names.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutput {
    Rows(Vec<RowRecord>),
    Table { headers: Vec<String>, rows: Vec<RowRecord> },
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn run(&self, query: &str) -> Result<QueryOutput, DataSourceError>;
}

#[derive(Clone, Debug)]
pub struct SqliteDataSource {
    pool: DbPool,
    timeout: Duration,
}

impl SqliteDataSource {
    pub fn new(pool: DbPool, timeout_secs: u64) -> Self {
        Self { pool, timeout: Duration::from_secs(timeout_secs.max(1)) }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl DataSource for SqliteDataSource {
    async fn run(&self, query: &str) -> Result<QueryOutput, DataSourceError> {
        let fetch = sqlx::query(query).fetch_all(&self.pool);
        let rows = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| DataSourceError::Timeout(self.timeout.as_secs()))??;

        debug!(row_count = rows.len(), "query returned rows");

        // SQLite only reports column metadata alongside at least one row.
        let Some(first) = rows.first() else {
            return Ok(QueryOutput::Rows(Vec::new()));
        };

        let headers = first.columns().iter().map(|column| column.name().to_string()).collect();
        let records = rows.iter().map(decode_row).collect();

        Ok(QueryOutput::Table { headers, rows: records })
    }
}

fn decode_row(row: &SqliteRow) -> RowRecord {
    RowRecord::Positional((0..row.len()).map(|index| decode_cell(row, index)).collect())
}

fn decode_cell(row: &SqliteRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    if let Ok(value) = row.try_get::<i64, _>(index) {
        return Value::from(value);
    }
    if let Ok(value) = row.try_get::<f64, _>(index) {
        return Value::from(value);
    }
    if let Ok(value) = row.try_get::<String, _>(index) {
        return Value::String(value);
    }
    if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
        return Value::String(String::from_utf8_lossy(&value).into_owned());
    }

    Value::Null
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use staffchat_core::RowRecord;

    use super::{DataSource, QueryOutput, SqliteDataSource};
    use crate::connection::{connect_with_settings, AccessMode};

    async fn scratch_source() -> SqliteDataSource {
        let pool = connect_with_settings("sqlite::memory:", 1, 5, AccessMode::ReadWrite)
            .await
            .expect("pool should connect");
        sqlx::query(
            "CREATE TABLE Users (USERID INTEGER, LOGIN TEXT, SCORE REAL, NOTE TEXT);
             INSERT INTO Users VALUES (1, 'amy', 1.5, NULL);
             INSERT INTO Users VALUES (2, 'bob', 2.0, 'lead');",
        )
        .execute(&pool)
        .await
        .expect("scratch schema");
        SqliteDataSource::new(pool, 5)
    }

    #[tokio::test]
    async fn non_empty_result_carries_column_names_and_typed_cells() {
        let source = scratch_source().await;

        let output = source
            .run("SELECT USERID, LOGIN AS login_name, SCORE, NOTE FROM Users ORDER BY USERID")
            .await
            .expect("query should succeed");

        assert_eq!(
            output,
            QueryOutput::Table {
                headers: vec![
                    "USERID".to_string(),
                    "login_name".to_string(),
                    "SCORE".to_string(),
                    "NOTE".to_string()
                ],
                rows: vec![
                    RowRecord::Positional(vec![json!(1), json!("amy"), json!(1.5), json!(null)]),
                    RowRecord::Positional(vec![json!(2), json!("bob"), json!(2.0), json!("lead")]),
                ],
            }
        );
    }

    #[tokio::test]
    async fn empty_result_is_reported_as_bare_rows() {
        let source = scratch_source().await;

        let output =
            source.run("SELECT USERID FROM Users WHERE USERID > 99").await.expect("query");

        assert_eq!(output, QueryOutput::Rows(Vec::new()));
    }

    #[tokio::test]
    async fn invalid_sql_surfaces_database_error() {
        let source = scratch_source().await;

        let error = source.run("SELECT nope FROM missing_table").await.expect_err("should fail");

        assert!(error.to_string().contains("missing_table"));
    }
}
