use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// Pools handed to agents run read-only so generated SQL can never mutate the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30, AccessMode::ReadOnly).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
    mode: AccessMode,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                if mode == AccessMode::ReadOnly {
                    sqlx::query("PRAGMA query_only = ON").execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, AccessMode};

    #[tokio::test]
    async fn read_only_pool_rejects_writes() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5, AccessMode::ReadOnly)
            .await
            .expect("pool should connect");

        let result = sqlx::query("CREATE TABLE scratch (id INTEGER)").execute(&pool).await;

        assert!(result.is_err(), "query_only pool must refuse DDL");
        pool.close().await;
    }

    #[tokio::test]
    async fn read_write_pool_accepts_writes() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5, AccessMode::ReadWrite)
            .await
            .expect("pool should connect");

        sqlx::query("CREATE TABLE scratch (id INTEGER)")
            .execute(&pool)
            .await
            .expect("read-write pool should allow DDL");
        pool.close().await;
    }
}
