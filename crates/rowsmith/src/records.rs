//! Generic record access for any declared entity.
//!
//! [`RecordAccess`] validates payloads against the entity (unknown columns,
//! key arity, type compatibility) before anything reaches the store, then
//! issues exactly one store call per operation.

use crate::store::{Guard, RecordStore};
use crate::value::{Key, Record, Value};
use crate::{Error, Result};
use rowsmith_schema::{Column, Entity};
use tracing::debug;

/// Create, read, update and delete records of one entity.
pub struct RecordAccess<'a, S> {
    store: &'a S,
    entity: &'a Entity,
}

impl<'a, S: RecordStore> RecordAccess<'a, S> {
    pub fn new(store: &'a S, entity: &'a Entity) -> Self {
        Self { store, entity }
    }

    pub fn entity(&self) -> &Entity {
        self.entity
    }

    /// Insert a record.
    ///
    /// Columns the payload omits are left to the store when they have a
    /// default (or are generated); the rest are set to NULL.
    pub async fn create(&self, payload: Record) -> Result<Record> {
        self.check_columns(&payload)?;

        let mut values = Record::with_capacity(self.entity.columns.len());
        for column in &self.entity.columns {
            match payload.get(&column.name) {
                Some(value) => {
                    values.insert(column.name.clone(), self.coerce(column, value.clone())?);
                }
                None if column.has_store_default() => {}
                None => {
                    values.insert(column.name.clone(), Value::Null);
                }
            }
        }

        debug!(table = %self.entity.name, columns = values.len(), "create");
        self.store.insert(self.entity, &values).await
    }

    /// Fetch one record by primary key.
    pub async fn get(&self, key: &Key) -> Result<Record> {
        let key = self.key(key)?;
        self.store
            .fetch(self.entity, &key)
            .await?
            .ok_or_else(|| self.not_found(&key))
    }

    /// All records, ordered by primary key.
    pub async fn list(&self) -> Result<Vec<Record>> {
        self.store.fetch_all(self.entity).await
    }

    /// Full update: every non-key column is assigned, from the payload or
    /// NULL when the payload omits it. Key columns are never reassigned.
    pub async fn update(&self, key: &Key, payload: Record) -> Result<Record> {
        self.check_columns(&payload)?;
        let key = self.key(key)?;
        self.check_key_columns(&key, &payload)?;

        let mut values = Record::with_capacity(self.entity.columns.len());
        for column in self.entity.columns.iter().filter(|c| !c.primary_key) {
            let value = match payload.get(&column.name) {
                Some(value) => self.coerce(column, value.clone())?,
                None => Value::Null,
            };
            values.insert(column.name.clone(), value);
        }

        self.write(&key, values, None).await
    }

    /// Partial update: only the payload's columns are assigned. An empty
    /// payload (or one that only repeats the key) changes nothing and
    /// returns the current record.
    pub async fn partial_update(&self, key: &Key, payload: Record) -> Result<Record> {
        self.check_columns(&payload)?;
        let key = self.key(key)?;
        self.check_key_columns(&key, &payload)?;
        let values = self.non_key_values(payload)?;
        self.write(&key, values, None).await
    }

    /// Partial update that only applies while `guard.column` still holds
    /// `guard.expected`; otherwise fails with [`Error::Conflict`].
    pub async fn partial_update_guarded(
        &self,
        key: &Key,
        payload: Record,
        guard: Guard,
    ) -> Result<Record> {
        self.check_columns(&payload)?;
        let key = self.key(key)?;
        self.check_key_columns(&key, &payload)?;
        let column = self
            .entity
            .column(&guard.column)
            .ok_or_else(|| self.invalid_column(&guard.column))?;
        let guard = Guard {
            expected: self.coerce(column, guard.expected)?,
            column: guard.column,
        };
        let values = self.non_key_values(payload)?;
        self.write(&key, values, Some(&guard)).await
    }

    /// Delete one record by primary key.
    pub async fn delete(&self, key: &Key) -> Result<()> {
        let key = self.key(key)?;
        match self.store.delete(self.entity, &key).await? {
            0 => Err(self.not_found(&key)),
            _ => Ok(()),
        }
    }

    /// Delete every record whose `column` equals `value` (a NULL value
    /// matches NULL cells). Returns how many records were deleted.
    pub async fn filter_delete(&self, column: &str, value: Value) -> Result<u64> {
        let declared = self
            .entity
            .column(column)
            .ok_or_else(|| self.invalid_column(column))?;
        let value = self.coerce(declared, value)?;
        let deleted = self.store.delete_where(self.entity, column, &value).await?;
        debug!(table = %self.entity.name, column, deleted, "filter delete");
        Ok(deleted)
    }

    /// Assign `values`, or just re-read the record when there is nothing to
    /// assign. A miss is told apart as conflict or not-found by re-reading.
    async fn write(&self, key: &Key, values: Record, guard: Option<&Guard>) -> Result<Record> {
        if values.is_empty() {
            let current = self.get(key).await?;
            if let Some(guard) = guard
                && current.get(&guard.column) != Some(&guard.expected)
            {
                return Err(self.conflict(key, guard));
            }
            return Ok(current);
        }

        debug!(table = %self.entity.name, columns = values.len(), guarded = guard.is_some(), "update");
        match self.store.update(self.entity, key, &values, guard).await? {
            Some(record) => Ok(record),
            None => match guard {
                Some(guard) if self.store.fetch(self.entity, key).await?.is_some() => {
                    Err(self.conflict(key, guard))
                }
                _ => Err(self.not_found(key)),
            },
        }
    }

    fn non_key_values(&self, payload: Record) -> Result<Record> {
        let mut values = Record::with_capacity(payload.len());
        for (name, value) in payload {
            let Some(column) = self.entity.column(&name) else {
                return Err(self.invalid_column(&name));
            };
            if column.primary_key {
                continue;
            }
            values.insert(name, self.coerce(column, value)?);
        }
        Ok(values)
    }

    fn check_columns(&self, payload: &Record) -> Result<()> {
        match payload.keys().find(|name| !self.entity.has_column(name)) {
            Some(name) => Err(self.invalid_column(name)),
            None => Ok(()),
        }
    }

    /// A payload may repeat key columns, but only with the addressed values.
    fn check_key_columns(&self, key: &Key, payload: &Record) -> Result<()> {
        let pk = self.entity.primary_key();
        for (name, expected) in pk.iter().zip(key.values()) {
            let Some(value) = payload.get(*name) else {
                continue;
            };
            let Some(column) = self.entity.column(name) else {
                continue;
            };
            if self.coerce(column, value.clone())? != *expected {
                return Err(Error::KeyMismatch {
                    table: self.entity.name.clone(),
                    column: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Check arity and coerce key values to the key column types.
    fn key(&self, key: &Key) -> Result<Key> {
        let pk: Vec<&Column> = self.entity.columns.iter().filter(|c| c.primary_key).collect();
        if pk.is_empty() {
            return Err(Error::NoPrimaryKey {
                table: self.entity.name.clone(),
            });
        }
        if pk.len() != key.len() {
            return Err(Error::KeyArity {
                table: self.entity.name.clone(),
                expected: pk.len(),
                actual: key.len(),
            });
        }

        let mut values = Vec::with_capacity(pk.len());
        for (column, value) in pk.into_iter().zip(key.values()) {
            let value = self.coerce(column, value.clone())?;
            if value.is_null() {
                return Err(Error::TypeMismatch {
                    table: self.entity.name.clone(),
                    column: column.name.clone(),
                    expected: column.pg_type.to_string(),
                    actual: "null".to_string(),
                });
            }
            values.push(value);
        }
        Ok(Key(values))
    }

    fn coerce(&self, column: &Column, value: Value) -> Result<Value> {
        value
            .coerce(column.pg_type)
            .map_err(|actual| Error::TypeMismatch {
                table: self.entity.name.clone(),
                column: column.name.clone(),
                expected: column.pg_type.to_string(),
                actual: actual.to_string(),
            })
    }

    fn invalid_column(&self, column: &str) -> Error {
        Error::InvalidColumn {
            table: self.entity.name.clone(),
            column: column.to_string(),
        }
    }

    fn not_found(&self, key: &Key) -> Error {
        Error::NotFound {
            table: self.entity.name.clone(),
            key: key.to_string(),
        }
    }

    fn conflict(&self, key: &Key, guard: &Guard) -> Error {
        Error::Conflict {
            table: self.entity.name.clone(),
            key: key.to_string(),
            column: guard.column.clone(),
        }
    }
}
