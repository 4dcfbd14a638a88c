//! The storage boundary.
//!
//! The record engine and the synchronizer talk to storage only through
//! [`RecordStore`] and [`SchemaStore`]. [`PgStore`] implements both over a
//! Postgres pool; [`MemoryStore`] implements both in process.

use crate::Result;
use crate::sync::Change;
use crate::value::{Key, Record, Value};
use rowsmith_schema::{Entity, TableSnapshot};
use std::future::Future;

mod memory;
pub use memory::MemoryStore;

mod pg;
pub use pg::PgStore;

/// An optimistic concurrency condition on an update: the row is only
/// written if `column` still holds `expected`.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub column: String,
    pub expected: Value,
}

impl Guard {
    pub fn new(column: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            expected: expected.into(),
        }
    }
}

/// Row-level operations over one entity's table.
///
/// Values handed to a store are already validated and coerced to the
/// declared column types. Returned records contain every declared column
/// in declaration order.
pub trait RecordStore: Send + Sync {
    /// The row with this key, if any.
    fn fetch(&self, entity: &Entity, key: &Key) -> impl Future<Output = Result<Option<Record>>> + Send;

    /// All rows, ordered by primary key.
    fn fetch_all(&self, entity: &Entity) -> impl Future<Output = Result<Vec<Record>>> + Send;

    /// Insert one row. Columns absent from `values` get their store default.
    fn insert(&self, entity: &Entity, values: &Record) -> impl Future<Output = Result<Record>> + Send;

    /// Assign `values` on the row with this key (and matching `guard`, if
    /// given). Returns `None` when no row matched.
    fn update(
        &self,
        entity: &Entity,
        key: &Key,
        values: &Record,
        guard: Option<&Guard>,
    ) -> impl Future<Output = Result<Option<Record>>> + Send;

    /// Delete the row with this key, returning how many rows went away.
    fn delete(&self, entity: &Entity, key: &Key) -> impl Future<Output = Result<u64>> + Send;

    /// Delete every row whose `column` equals `value` (NULL matches NULL).
    fn delete_where(
        &self,
        entity: &Entity,
        column: &str,
        value: &Value,
    ) -> impl Future<Output = Result<u64>> + Send;
}

/// Structural operations used by the synchronizer.
pub trait SchemaStore: Send + Sync {
    /// Observe the live structure of a table. `None` if it does not exist.
    fn snapshot(&self, table: &str) -> impl Future<Output = Result<Option<TableSnapshot>>> + Send;

    /// Apply one structural change to a table.
    fn apply(&self, table: &str, change: &Change) -> impl Future<Output = Result<()>> + Send;
}
