//! Schema-driven record access and table synchronization for Postgres.
//!
//! Declare tables as [`Entity`] values, then:
//!
//! - use [`RecordAccess`] to create, read, update and delete records of any
//!   entity without writing SQL per table;
//! - use [`Synchronizer`] to bring live tables in line with their
//!   declarations (create, rename, add, drop, retype, keys).
//!
//! Both talk to storage through the [`RecordStore`] and [`SchemaStore`]
//! traits, implemented over a Postgres pool by [`PgStore`] and in process by
//! [`MemoryStore`].
//!
//! ```no_run
//! use rowsmith::{Config, PgStore, Synchronizer, SyncOptions, TracedPool, sample};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let store = PgStore::new(TracedPool::new(config.create_pool()?));
//!
//! let schema = sample::schema()?;
//! for report in Synchronizer::new(&store)
//!     .synchronize_all(&schema, &SyncOptions::new())
//!     .await?
//! {
//!     print!("{report}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::{Error, Result};

mod value;
pub use value::{Key, Record, Value, record};

mod row;
pub use row::{RowContext, SqlParam, pg_row_to_record};

mod traced;
pub use traced::{TracedObject, TracedPool};

pub mod store;
pub use store::{Guard, MemoryStore, PgStore, RecordStore, SchemaStore};

pub mod sync;
pub use sync::{
    Change, ConstraintKind, SyncIssue, SyncOptions, SyncReport, SyncStep, Synchronizer,
};

mod records;
pub use records::RecordAccess;

pub mod sample;

mod config;
pub use config::{Config, ConfigError};

pub use rowsmith_schema::{
    Column, ColumnSnapshot, Entity, EntityBuilder, ForeignKey, PgType, Schema, SchemaError,
    TableSnapshot,
};
