//! In-process store.
//!
//! Keeps tables, rows and constraints in memory and enforces them the way
//! Postgres would: NOT NULL, primary key uniqueness, foreign keys on insert,
//! update and delete, value conversion on retype, and column defaults
//! (`now()`, literals, serial sequences). Useful for tests and for planning
//! against a scratch copy of a schema.

use super::{Guard, RecordStore, SchemaStore};
use crate::sync::Change;
use crate::value::{Key, Record, Value};
use crate::{Error, Result};
use chrono::{NaiveDateTime, Utc};
use indexmap::IndexMap;
use rowsmith_schema::{ColumnSnapshot, Entity, ForeignKey, PgType, TableSnapshot};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

fn store_err(message: impl Into<String>) -> Error {
    Error::Store(message.into())
}

/// An in-memory implementation of [`RecordStore`] and [`SchemaStore`].
#[derive(Default)]
pub struct MemoryStore {
    db: Mutex<MemoryDb>,
}

#[derive(Default)]
struct MemoryDb {
    tables: IndexMap<String, MemTable>,
}

struct MemTable {
    snapshot: TableSnapshot,
    /// Last value handed out, per serial column
    sequences: HashMap<String, i64>,
    rows: Vec<Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row of a table, in insertion order, with all live columns.
    pub fn rows(&self, table: &str) -> Result<Vec<Record>> {
        Ok(self.db()?.table(table)?.rows.clone())
    }

    /// Names of the tables that currently exist.
    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.db()?.tables.keys().cloned().collect())
    }

    fn db(&self) -> Result<MutexGuard<'_, MemoryDb>> {
        self.db
            .lock()
            .map_err(|_| store_err("memory store lock poisoned"))
    }
}

/// Integer-aware equality, so an `I32` key matches an `I64` cell.
fn same(a: &Value, b: &Value) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering used for `ORDER BY`; NULL sorts last.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::TimestampTz(x), Value::TimestampTz(y)) => x.cmp(y),
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => a.to_string().cmp(&b.to_string()),
            },
        },
    }
}

/// The text form Postgres would produce when casting to a text type.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::TimestampTz(v) => v.format("%Y-%m-%d %H:%M:%S%.f+00").to_string(),
        other => other.to_string(),
    }
}

/// Explicit cast (`value::type`), as used when a column changes type.
fn cast(value: &Value, to: PgType) -> Result<Value> {
    if let Ok(v) = value.clone().coerce(to) {
        return check_length(v, to);
    }

    let converted = match (value, to) {
        (Value::String(s), t) if t.is_integer() => s
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|n| Value::I64(n).coerce(t).ok()),
        (Value::String(s), t) if t.is_float() => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|n| Value::F64(n).coerce(t).ok()),
        (Value::String(s), PgType::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "yes" | "on" | "1" => Some(Value::Bool(true)),
            "f" | "false" | "no" | "off" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        (Value::String(s), PgType::Jsonb) => serde_json::from_str(s).ok().map(Value::Json),
        (Value::String(s), PgType::Timestamp | PgType::Timestamptz) => {
            NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .and_then(|ts| Value::Timestamp(ts).coerce(to).ok())
        }
        (Value::Bool(b), t) if t.is_integer() => Value::I64(i64::from(*b)).coerce(t).ok(),
        (Value::F32(_) | Value::F64(_), t) if t.is_integer() => value
            .as_f64()
            .map(f64::round)
            .filter(|f| f.is_finite() && f.abs() < 9.2e18)
            .and_then(|f| Value::I64(f as i64).coerce(t).ok()),
        (v, t) if t.is_text() => Some(Value::String(text_of(v))),
        _ => None,
    };

    match converted {
        Some(v) => check_length(v, to),
        None => Err(store_err(format!(
            "invalid input syntax for type {}: \"{}\"",
            to.to_string().to_lowercase(),
            text_of(value)
        ))),
    }
}

fn check_length(value: Value, pg_type: PgType) -> Result<Value> {
    if let (PgType::Varchar(Some(max)), Value::String(s)) = (pg_type, &value)
        && s.chars().count() > max as usize
    {
        return Err(store_err(format!(
            "value too long for type character varying({max})"
        )));
    }
    Ok(value)
}

/// Evaluate a column default expression.
fn eval_default(expr: &str, pg_type: Option<PgType>) -> Result<Value> {
    let trimmed = expr.trim();
    let lower = trimmed.to_ascii_lowercase();
    let value = if lower == "now()" || lower == "current_timestamp" {
        match pg_type {
            Some(PgType::Timestamptz) => Value::TimestampTz(Utc::now()),
            _ => Value::Timestamp(Utc::now().naive_utc()),
        }
    } else if lower == "true" || lower == "false" {
        Value::Bool(lower == "true")
    } else if lower == "null" {
        Value::Null
    } else if let Ok(n) = trimmed.parse::<i64>() {
        Value::I64(n)
    } else if let Ok(f) = trimmed.parse::<f64>() {
        Value::F64(f)
    } else if let Some(s) = trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Value::String(s.replace("''", "'"))
    } else {
        return Err(store_err(format!("unsupported default expression: {expr}")));
    };

    match pg_type {
        Some(t) if !value.is_null() => cast(&value, t),
        _ => Ok(value),
    }
}

impl MemTable {
    fn new(snapshot: TableSnapshot) -> Self {
        let mut table = Self {
            snapshot,
            sequences: HashMap::new(),
            rows: Vec::new(),
        };
        let serial: Vec<String> = table
            .snapshot
            .columns
            .iter()
            .filter(|c| is_serial(c))
            .map(|c| c.name.clone())
            .collect();
        for name in serial {
            table.sequences.insert(name, 0);
        }
        table
    }

    fn column(&self, name: &str) -> Result<&ColumnSnapshot> {
        self.snapshot.column(name).ok_or_else(|| {
            store_err(format!(
                "column \"{}\" of relation \"{}\" does not exist",
                name, self.snapshot.name
            ))
        })
    }

    /// The value an omitted column gets.
    fn default_for(&mut self, column: &ColumnSnapshot) -> Result<Value> {
        if is_serial(column) {
            let next = self.sequences.entry(column.name.clone()).or_insert(0);
            *next += 1;
            let value = Value::I64(*next);
            return match column.pg_type {
                Some(t) => cast(&value, t),
                None => Ok(value),
            };
        }
        match &column.default {
            Some(expr) => eval_default(expr, column.pg_type),
            None => Ok(Value::Null),
        }
    }

    /// Convert a value for storage in a live column.
    fn assign(&self, column: &str, value: &Value) -> Result<Value> {
        let col = self.column(column)?;
        let Some(pg_type) = col.pg_type else {
            return Ok(value.clone());
        };
        let stored = value.clone().coerce(pg_type).map_err(|actual| {
            store_err(format!(
                "column \"{}\" is of type {} but expression is of type {}",
                column,
                col.data_type,
                actual
            ))
        })?;
        check_length(stored, pg_type)
    }

    fn matches_key(&self, row: &Record, columns: &[&str], key: &Key) -> bool {
        columns
            .iter()
            .zip(key.values())
            .all(|(col, value)| row.get(*col).is_some_and(|v| same(v, value)))
    }

    fn find(&self, entity: &Entity, key: &Key) -> Result<Vec<usize>> {
        let pk = entity.primary_key();
        for col in &pk {
            self.column(col)?;
        }
        Ok(self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.matches_key(row, &pk, key))
            .map(|(i, _)| i)
            .collect())
    }

    fn project(&self, entity: &Entity, row: &Record) -> Result<Record> {
        let mut out = Record::with_capacity(entity.columns.len());
        for col in &entity.columns {
            let value = row.get(&col.name).ok_or_else(|| {
                store_err(format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    col.name, self.snapshot.name
                ))
            })?;
            out.insert(col.name.clone(), value.clone());
        }
        Ok(out)
    }
}

fn is_serial(column: &ColumnSnapshot) -> bool {
    column
        .default
        .as_deref()
        .is_some_and(|d| d.starts_with("nextval("))
}

fn rename_key(row: &mut Record, from: &str, to: &str) {
    *row = std::mem::take(row)
        .into_iter()
        .map(|(k, v)| if k == from { (to.to_string(), v) } else { (k, v) })
        .collect();
}

impl MemoryDb {
    fn table(&self, name: &str) -> Result<&MemTable> {
        self.tables
            .get(name)
            .ok_or_else(|| store_err(format!("relation \"{name}\" does not exist")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| store_err(format!("relation \"{name}\" does not exist")))
    }

    /// Foreign keys in other tables that point at `table`, with the table
    /// that owns each.
    fn referencing(&self, table: &str) -> Vec<(&str, &ForeignKey)> {
        self.tables
            .iter()
            .flat_map(|(name, t)| {
                t.snapshot
                    .foreign_keys
                    .iter()
                    .filter(move |fk| fk.references_table == table)
                    .map(move |fk| (name.as_str(), fk))
            })
            .collect()
    }

    /// Whether `target` has a row whose `columns` equal `values`.
    fn has_row(&self, target: &str, columns: &[String], values: &[&Value]) -> bool {
        self.tables.get(target).is_some_and(|t| {
            t.rows.iter().any(|row| {
                columns
                    .iter()
                    .zip(values)
                    .all(|(c, v)| row.get(c).is_some_and(|cell| same(cell, v)))
            })
        })
    }

    /// Enforce NOT NULL, primary key and foreign key constraints for a row
    /// about to be stored at `position` (or appended, if `None`).
    fn check_row(&self, table_name: &str, row: &Record, position: Option<usize>) -> Result<()> {
        let table = self.table(table_name)?;
        let snapshot = &table.snapshot;

        for col in &snapshot.columns {
            if !col.nullable && row.get(&col.name).is_none_or(Value::is_null) {
                return Err(store_err(format!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    col.name, table_name
                )));
            }
        }

        if !snapshot.primary_key.is_empty() {
            let duplicate = table.rows.iter().enumerate().any(|(i, other)| {
                Some(i) != position
                    && snapshot.primary_key.iter().all(|c| match (row.get(c), other.get(c)) {
                        (Some(a), Some(b)) => same(a, b),
                        _ => false,
                    })
            });
            if duplicate {
                return Err(store_err(format!(
                    "duplicate key value violates unique constraint \"{}\"",
                    snapshot
                        .primary_key_constraint
                        .as_deref()
                        .unwrap_or("primary key")
                )));
            }
        }

        for fk in &snapshot.foreign_keys {
            let values: Vec<&Value> = fk
                .columns
                .iter()
                .map(|c| row.get(c).unwrap_or(&Value::Null))
                .collect();
            if values.iter().any(|v| v.is_null()) {
                continue;
            }
            if !self.has_row(&fk.references_table, &fk.references_columns, &values) {
                return Err(store_err(format!(
                    "insert or update on table \"{}\" violates foreign key constraint \"{}\"",
                    table_name,
                    fk.constraint_name(table_name)
                )));
            }
        }

        Ok(())
    }

    /// Refuse to remove rows that other tables still reference.
    fn check_removal(&self, table_name: &str, doomed: &[usize]) -> Result<()> {
        let table = self.table(table_name)?;
        for (child, fk) in self.referencing(table_name) {
            let Some(child_table) = self.tables.get(child) else {
                continue;
            };
            for &idx in doomed {
                let parent_row = &table.rows[idx];
                let values: Vec<&Value> = fk
                    .references_columns
                    .iter()
                    .map(|c| parent_row.get(c).unwrap_or(&Value::Null))
                    .collect();
                let referenced = child_table.rows.iter().enumerate().any(|(ci, row)| {
                    // A self-referencing row that is itself being removed does not count
                    !(child == table_name && doomed.contains(&ci))
                        && fk
                            .columns
                            .iter()
                            .zip(&values)
                            .all(|(c, v)| row.get(c).is_some_and(|cell| same(cell, v)))
                });
                if referenced {
                    return Err(store_err(format!(
                        "update or delete on table \"{}\" violates foreign key constraint \"{}\" on table \"{}\"",
                        table_name,
                        fk.constraint_name(child),
                        child
                    )));
                }
            }
        }
        Ok(())
    }

    fn remove_rows(&mut self, table_name: &str, doomed: Vec<usize>) -> Result<u64> {
        self.check_removal(table_name, &doomed)?;
        let table = self.table_mut(table_name)?;
        let mut idx = 0;
        table.rows.retain(|_| {
            let keep = !doomed.contains(&idx);
            idx += 1;
            keep
        });
        Ok(doomed.len() as u64)
    }

    fn apply(&mut self, table_name: &str, change: &Change) -> Result<()> {
        match change {
            Change::CreateTable(entity) => {
                if self.tables.contains_key(&entity.name) {
                    return Err(store_err(format!(
                        "relation \"{}\" already exists",
                        entity.name
                    )));
                }
                self.tables
                    .insert(entity.name.clone(), MemTable::new(entity.snapshot()));
            }

            Change::DropTable(name) => {
                self.table(name)?;
                if let Some((child, _)) = self
                    .referencing(name)
                    .into_iter()
                    .find(|(c, _)| *c != name.as_str())
                {
                    return Err(store_err(format!(
                        "cannot drop table {name} because other objects depend on it (table {child})"
                    )));
                }
                self.tables.shift_remove(name);
            }

            Change::RenameColumn { from, to } => {
                let table = self.table(table_name)?;
                table.column(from)?;
                if table.snapshot.has_column(to) {
                    return Err(store_err(format!(
                        "column \"{to}\" of relation \"{table_name}\" already exists"
                    )));
                }

                let table = self.table_mut(table_name)?;
                table.snapshot.rename_column(from, to);
                for row in &mut table.rows {
                    rename_key(row, from, to);
                }
                if let Some(seq) = table.sequences.remove(from) {
                    table.sequences.insert(to.clone(), seq);
                }

                // Constraints elsewhere follow the column
                for other in self.tables.values_mut() {
                    for fk in &mut other.snapshot.foreign_keys {
                        if fk.references_table == table_name {
                            for col in &mut fk.references_columns {
                                if *col == *from {
                                    *col = to.clone();
                                }
                            }
                        }
                    }
                }
            }

            Change::AddColumn(column) => {
                let table = self.table_mut(table_name)?;
                if table.snapshot.has_column(&column.name) {
                    return Err(store_err(format!(
                        "column \"{}\" of relation \"{}\" already exists",
                        column.name, table_name
                    )));
                }

                let snapshot = ColumnSnapshot::declared(table_name, column);
                if is_serial(&snapshot) {
                    table.sequences.insert(column.name.clone(), 0);
                }

                let mut filled = Vec::with_capacity(table.rows.len());
                for _ in 0..table.rows.len() {
                    let value = table.default_for(&snapshot)?;
                    if value.is_null() && !snapshot.nullable {
                        return Err(store_err(format!(
                            "column \"{}\" of relation \"{}\" contains null values",
                            column.name, table_name
                        )));
                    }
                    filled.push(value);
                }

                for (row, value) in table.rows.iter_mut().zip(filled) {
                    row.insert(column.name.clone(), value);
                }
                table.snapshot.add_column(snapshot);
            }

            Change::DropColumn(name) => {
                self.table(table_name)?.column(name)?;
                let depended_on = self
                    .referencing(table_name)
                    .iter()
                    .any(|(_, fk)| fk.references_columns.contains(name));
                if depended_on {
                    return Err(store_err(format!(
                        "cannot drop column {name} of table {table_name} because other objects depend on it"
                    )));
                }

                let table = self.table_mut(table_name)?;
                table.snapshot.drop_column(name);
                table.sequences.remove(name);
                for row in &mut table.rows {
                    row.shift_remove(name);
                }
            }

            Change::AlterColumnType { name, to, .. } => {
                let table = self.table_mut(table_name)?;
                table.column(name)?;

                let mut converted = Vec::with_capacity(table.rows.len());
                for row in &table.rows {
                    let value = row.get(name).unwrap_or(&Value::Null);
                    converted.push(if value.is_null() {
                        Value::Null
                    } else {
                        cast(value, *to)?
                    });
                }

                for (row, value) in table.rows.iter_mut().zip(converted) {
                    row.insert(name.clone(), value);
                }
                table.snapshot.set_type(name, *to);
            }

            Change::ReplacePrimaryKey { drop, columns } => {
                let table = self.table(table_name)?;
                if let Some(constraint) = drop {
                    if table.snapshot.primary_key_constraint.as_deref() != Some(constraint.as_str()) {
                        return Err(store_err(format!(
                            "constraint \"{constraint}\" of relation \"{table_name}\" does not exist"
                        )));
                    }
                    if let Some((child, _)) = self
                        .referencing(table_name)
                        .into_iter()
                        .find(|(c, _)| *c != table_name)
                    {
                        return Err(store_err(format!(
                            "cannot drop constraint {constraint} on table {table_name} because other objects depend on it (table {child})"
                        )));
                    }
                }

                for col in columns {
                    table.column(col)?;
                }
                let pkey = format!("{table_name}_pkey");
                let mut seen: Vec<Vec<&Value>> = Vec::with_capacity(table.rows.len());
                for row in &table.rows {
                    let values: Vec<&Value> = columns
                        .iter()
                        .map(|c| row.get(c).unwrap_or(&Value::Null))
                        .collect();
                    if values.iter().any(|v| v.is_null()) {
                        return Err(store_err(format!(
                            "column of relation \"{table_name}\" contains null values"
                        )));
                    }
                    let duplicate = seen
                        .iter()
                        .any(|other| other.iter().zip(&values).all(|(a, b)| same(a, b)));
                    if duplicate {
                        return Err(store_err(format!(
                            "could not create unique index \"{pkey}\""
                        )));
                    }
                    seen.push(values);
                }

                self.table_mut(table_name)?
                    .snapshot
                    .set_primary_key(columns.clone());
            }

            Change::AddForeignKey(fk) => {
                let table = self.table(table_name)?;
                for col in &fk.columns {
                    table.column(col)?;
                }
                let constraint = fk.constraint_name(table_name);
                if table
                    .snapshot
                    .foreign_keys
                    .iter()
                    .any(|existing| existing.constraint_name(table_name) == constraint)
                {
                    return Err(store_err(format!(
                        "constraint \"{constraint}\" for relation \"{table_name}\" already exists"
                    )));
                }

                let target = self.table(&fk.references_table)?;
                for col in &fk.references_columns {
                    target.column(col)?;
                }
                if target.snapshot.primary_key != fk.references_columns {
                    return Err(store_err(format!(
                        "there is no unique constraint matching given keys for referenced table \"{}\"",
                        fk.references_table
                    )));
                }

                for row in &table.rows {
                    let values: Vec<&Value> = fk
                        .columns
                        .iter()
                        .map(|c| row.get(c).unwrap_or(&Value::Null))
                        .collect();
                    if values.iter().any(|v| v.is_null()) {
                        continue;
                    }
                    if !self.has_row(&fk.references_table, &fk.references_columns, &values) {
                        return Err(store_err(format!(
                            "insert or update on table \"{table_name}\" violates foreign key constraint \"{constraint}\""
                        )));
                    }
                }

                self.table_mut(table_name)?
                    .snapshot
                    .add_foreign_key(fk.clone());
            }
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    async fn fetch(&self, entity: &Entity, key: &Key) -> Result<Option<Record>> {
        let db = self.db()?;
        let table = db.table(&entity.name)?;
        match table.find(entity, key)?.first() {
            Some(&idx) => Ok(Some(table.project(entity, &table.rows[idx])?)),
            None => Ok(None),
        }
    }

    async fn fetch_all(&self, entity: &Entity) -> Result<Vec<Record>> {
        let db = self.db()?;
        let table = db.table(&entity.name)?;
        let pk = entity.primary_key();

        let mut rows: Vec<&Record> = table.rows.iter().collect();
        rows.sort_by(|a, b| {
            pk.iter()
                .map(|c| {
                    compare(
                        a.get(*c).unwrap_or(&Value::Null),
                        b.get(*c).unwrap_or(&Value::Null),
                    )
                })
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        rows.into_iter()
            .map(|row| table.project(entity, row))
            .collect()
    }

    async fn insert(&self, entity: &Entity, values: &Record) -> Result<Record> {
        let mut db = self.db()?;
        let table = db.table_mut(&entity.name)?;

        for name in values.keys() {
            table.column(name)?;
        }
        let columns = table.snapshot.columns.clone();
        let mut row = Record::with_capacity(columns.len());
        for col in &columns {
            let value = match values.get(&col.name) {
                Some(v) => table.assign(&col.name, v)?,
                None => table.default_for(col)?,
            };
            row.insert(col.name.clone(), value);
        }

        db.check_row(&entity.name, &row, None)?;
        let table = db.table_mut(&entity.name)?;
        let projected = table.project(entity, &row)?;
        table.rows.push(row);
        Ok(projected)
    }

    async fn update(
        &self,
        entity: &Entity,
        key: &Key,
        values: &Record,
        guard: Option<&Guard>,
    ) -> Result<Option<Record>> {
        let mut db = self.db()?;
        let table = db.table(&entity.name)?;

        let Some(&idx) = table.find(entity, key)?.first() else {
            return Ok(None);
        };
        let current = &table.rows[idx];
        if let Some(guard) = guard {
            table.column(&guard.column)?;
            let cell = current.get(&guard.column).unwrap_or(&Value::Null);
            if !same(cell, &guard.expected) {
                return Ok(None);
            }
        }

        let mut row = current.clone();
        for (name, value) in values {
            let stored = table.assign(name, value)?;
            row.insert(name.clone(), stored);
        }
        db.check_row(&entity.name, &row, Some(idx))?;

        let table = db.table_mut(&entity.name)?;
        let projected = table.project(entity, &row)?;
        table.rows[idx] = row;
        Ok(Some(projected))
    }

    async fn delete(&self, entity: &Entity, key: &Key) -> Result<u64> {
        let mut db = self.db()?;
        let doomed = db.table(&entity.name)?.find(entity, key)?;
        db.remove_rows(&entity.name, doomed)
    }

    async fn delete_where(&self, entity: &Entity, column: &str, value: &Value) -> Result<u64> {
        let mut db = self.db()?;
        let table = db.table(&entity.name)?;
        table.column(column)?;
        let doomed: Vec<usize> = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                let cell = row.get(column).unwrap_or(&Value::Null);
                if value.is_null() {
                    cell.is_null()
                } else {
                    !cell.is_null() && same(cell, value)
                }
            })
            .map(|(i, _)| i)
            .collect();
        db.remove_rows(&entity.name, doomed)
    }
}

impl SchemaStore for MemoryStore {
    async fn snapshot(&self, table: &str) -> Result<Option<TableSnapshot>> {
        Ok(self.db()?.tables.get(table).map(|t| t.snapshot.clone()))
    }

    async fn apply(&self, table: &str, change: &Change) -> Result<()> {
        self.db()?.apply(table, change)
    }
}

#[cfg(test)]
mod tests;
