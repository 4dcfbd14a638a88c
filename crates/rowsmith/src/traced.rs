//! Traced database connection wrapper.
//!
//! Wraps a deadpool-postgres pool and logs all statements via tracing.

use tokio_postgres::types::ToSql;
use tokio_postgres::{Error, Row};
use tracing::Instrument;

/// A traced connection pool.
///
/// Wraps a `deadpool_postgres::Pool` and returns `TracedObject` from `get()`.
/// The connection goes back to the pool when the `TracedObject` is dropped,
/// so every acquisition is scoped to the operation holding it.
///
/// # Example
///
/// ```ignore
/// use rowsmith::TracedPool;
///
/// let pool = TracedPool::new(pool);
/// let conn = pool.get().await?;
///
/// conn.execute("DELETE FROM sample WHERE id = $1", &[&id]).await?;
/// ```
#[derive(Clone)]
pub struct TracedPool {
    inner: deadpool_postgres::Pool,
}

impl TracedPool {
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { inner: pool }
    }

    /// Get a traced connection from the pool.
    pub async fn get(&self) -> Result<TracedObject, deadpool_postgres::PoolError> {
        let conn = self.inner.get().await?;
        Ok(TracedObject { inner: conn })
    }
}

/// A pooled connection whose statements are logged via tracing.
///
/// Each call runs inside a `tracing::debug_span!` carrying the SQL text and
/// the parameter count; row counts are recorded once the call returns.
pub struct TracedObject {
    inner: deadpool_postgres::Object,
}

impl TracedObject {
    /// Execute a statement, returning the number of rows affected.
    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, Error> {
        let span = tracing::debug_span!(
            "db.execute",
            sql = %sql,
            params = params.len(),
            affected = tracing::field::Empty,
        );
        let affected = self
            .inner
            .execute(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("affected", affected);
        Ok(affected)
    }

    /// Execute a query, returning all rows.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Error> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        let rows = self
            .inner
            .query(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("rows", rows.len());
        Ok(rows)
    }

    /// Execute a query, returning at most one row.
    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Error> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        let row = self
            .inner
            .query_opt(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("rows", if row.is_some() { 1u64 } else { 0u64 });
        Ok(row)
    }

    /// Run one or more unparameterized statements (DDL).
    pub async fn batch_execute(&self, sql: &str) -> Result<(), Error> {
        let span = tracing::debug_span!("db.batch_execute", sql = %sql);
        self.inner.batch_execute(sql).instrument(span).await
    }
}
