use rowsmith_schema::SchemaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("{0}")]
    Schema(#[from] SchemaError),

    #[error("{table}: no record with primary key ({key})")]
    NotFound { table: String, key: String },

    #[error("{table}: '{column}' is not a column of this entity")]
    InvalidColumn { table: String, column: String },

    #[error("{table}: expected {expected} key value(s), got {actual}")]
    KeyArity {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("{table}: payload sets key column '{column}' to a value other than the addressed key")]
    KeyMismatch { table: String, column: String },

    #[error("{table}: entity has no primary key")]
    NoPrimaryKey { table: String },

    #[error("type mismatch in {table}.{column}: expected {expected}, got {actual}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },

    #[error("failed to read {table}.{column} (expected {expected}): {message}")]
    ColumnRead {
        table: String,
        column: String,
        expected: String,
        message: String,
    },

    #[error("{table}: record ({key}) was modified concurrently ('{column}' no longer matches)")]
    Conflict {
        table: String,
        key: String,
        column: String,
    },

    #[error("{table}: version counter '{column}' of record ({key}) cannot be incremented further")]
    VersionExhausted {
        table: String,
        key: String,
        column: String,
    },

    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
