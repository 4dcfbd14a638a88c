//! Postgres-backed store.
//!
//! Every operation checks a connection out of the pool, runs a single
//! statement (or DDL batch) and hands the connection back when it returns,
//! whether it succeeded or not.

use super::{Guard, RecordStore, SchemaStore};
use crate::row::{RowContext, SqlParam, pg_row_to_record};
use crate::sync::Change;
use crate::traced::TracedPool;
use crate::value::{Key, Record, Value};
use crate::{Error, Result};
use indexmap::IndexMap;
use rowsmith_schema::{ColumnSnapshot, Entity, ForeignKey, PgType, TableSnapshot};
use rowsmith_sql::{
    DeleteStmt, Expr, InsertStmt, OrderBy, RenderedSql, SelectStmt, UpdateStmt, render,
};
use tokio_postgres::types::ToSql;

const COLUMNS_SQL: &str = "\
SELECT column_name::text, data_type::text, character_maximum_length::int4,
       is_nullable::text, column_default::text
FROM information_schema.columns
WHERE table_schema::text = current_schema() AND table_name::text = $1
ORDER BY ordinal_position";

const PRIMARY_KEY_SQL: &str = "\
SELECT c.conname::text, a.attname::text
FROM pg_constraint c
JOIN LATERAL unnest(c.conkey) WITH ORDINALITY AS k(attnum, ord) ON true
JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = k.attnum
WHERE c.contype = 'p' AND c.conrelid = to_regclass(quote_ident($1))
ORDER BY k.ord";

const FOREIGN_KEYS_SQL: &str = "\
SELECT
    ARRAY(SELECT a.attname::text
          FROM unnest(c.conkey) WITH ORDINALITY AS k(attnum, ord)
          JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = k.attnum
          ORDER BY k.ord),
    c.confrelid::regclass::text,
    ARRAY(SELECT a.attname::text
          FROM unnest(c.confkey) WITH ORDINALITY AS k(attnum, ord)
          JOIN pg_attribute a ON a.attrelid = c.confrelid AND a.attnum = k.attnum
          ORDER BY k.ord)
FROM pg_constraint c
WHERE c.contype = 'f' AND c.conrelid = to_regclass(quote_ident($1))
ORDER BY c.conname";

/// A [`RecordStore`] and [`SchemaStore`] over a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: TracedPool,
}

impl PgStore {
    pub fn new(pool: TracedPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &TracedPool {
        &self.pool
    }
}

/// Bind values to the parameter names a rendered statement expects.
fn bind<'a>(
    rendered: &RenderedSql,
    values: &'a IndexMap<String, Value>,
) -> Result<Vec<SqlParam<'a>>> {
    rendered
        .params
        .iter()
        .map(|name| {
            values
                .get(name)
                .map(SqlParam)
                .ok_or_else(|| Error::Store(format!("no value bound for parameter {name}")))
        })
        .collect()
}

fn as_refs<'a>(params: &'a [SqlParam<'_>]) -> Vec<&'a (dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

/// `key_col = $key.key_col AND ...`, binding the key values into `bindings`.
fn key_condition(entity: &Entity, key: &Key, bindings: &mut IndexMap<String, Value>) -> Option<Expr> {
    let pk = entity.primary_key();
    Expr::all(pk.iter().zip(key.values()).map(|(col, value)| {
        let param = format!("key.{col}");
        bindings.insert(param.clone(), value.clone());
        Expr::column(*col).eq(Expr::param(param))
    }))
}

fn ctx(entity: &Entity) -> RowContext<'_> {
    RowContext {
        table_name: &entity.name,
    }
}

impl RecordStore for PgStore {
    async fn fetch(&self, entity: &Entity, key: &Key) -> Result<Option<Record>> {
        let mut bindings = IndexMap::new();
        let mut stmt = SelectStmt::new()
            .columns(entity.column_names())
            .from(&entity.name);
        stmt.where_ = key_condition(entity, key, &mut bindings);

        let rendered = render(&stmt);
        let params = bind(&rendered, &bindings)?;
        let conn = self.pool.get().await?;
        let row = conn.query_opt(&rendered.sql, &as_refs(&params)).await?;
        row.map(|r| pg_row_to_record(&r, ctx(entity))).transpose()
    }

    async fn fetch_all(&self, entity: &Entity) -> Result<Vec<Record>> {
        let mut stmt = SelectStmt::new()
            .columns(entity.column_names())
            .from(&entity.name);
        for col in entity.primary_key() {
            stmt = stmt.order_by(OrderBy::asc(Expr::column(col)));
        }

        let rendered = render(&stmt);
        let conn = self.pool.get().await?;
        let rows = conn.query(&rendered.sql, &[]).await?;
        rows.iter()
            .map(|r| pg_row_to_record(r, ctx(entity)))
            .collect()
    }

    async fn insert(&self, entity: &Entity, values: &Record) -> Result<Record> {
        let mut stmt = InsertStmt::new(&entity.name).returning(entity.column_names());
        for name in values.keys() {
            stmt = stmt.column(name, Expr::param(name));
        }

        let rendered = render(&stmt);
        let params = bind(&rendered, values)?;
        let conn = self.pool.get().await?;
        let row = conn.query_opt(&rendered.sql, &as_refs(&params)).await?;
        let row = row.ok_or_else(|| Error::Store(format!("{}: insert returned no row", entity.name)))?;
        pg_row_to_record(&row, ctx(entity))
    }

    async fn update(
        &self,
        entity: &Entity,
        key: &Key,
        values: &Record,
        guard: Option<&Guard>,
    ) -> Result<Option<Record>> {
        let mut bindings = IndexMap::new();
        let mut stmt = UpdateStmt::new(&entity.name).returning(entity.column_names());
        for (name, value) in values {
            let param = format!("set.{name}");
            bindings.insert(param.clone(), value.clone());
            stmt = stmt.set(name, Expr::param(param));
        }
        stmt.where_ = key_condition(entity, key, &mut bindings);
        if let Some(guard) = guard {
            let param = format!("guard.{}", guard.column);
            bindings.insert(param.clone(), guard.expected.clone());
            stmt = stmt.and_where(Expr::column(&guard.column).not_distinct_from(Expr::param(param)));
        }

        let rendered = render(&stmt);
        let params = bind(&rendered, &bindings)?;
        let conn = self.pool.get().await?;
        let row = conn.query_opt(&rendered.sql, &as_refs(&params)).await?;
        row.map(|r| pg_row_to_record(&r, ctx(entity))).transpose()
    }

    async fn delete(&self, entity: &Entity, key: &Key) -> Result<u64> {
        let mut bindings = IndexMap::new();
        let mut stmt = DeleteStmt::new(&entity.name);
        stmt.where_ = key_condition(entity, key, &mut bindings);

        let rendered = render(&stmt);
        let params = bind(&rendered, &bindings)?;
        let conn = self.pool.get().await?;
        Ok(conn.execute(&rendered.sql, &as_refs(&params)).await?)
    }

    async fn delete_where(&self, entity: &Entity, column: &str, value: &Value) -> Result<u64> {
        let mut bindings = IndexMap::new();
        let condition = if value.is_null() {
            Expr::column(column).is_null()
        } else {
            let param = format!("filter.{column}");
            bindings.insert(param.clone(), value.clone());
            Expr::column(column).eq(Expr::param(param))
        };
        let stmt = DeleteStmt::new(&entity.name).where_(condition);

        let rendered = render(&stmt);
        let params = bind(&rendered, &bindings)?;
        let conn = self.pool.get().await?;
        Ok(conn.execute(&rendered.sql, &as_refs(&params)).await?)
    }
}

impl SchemaStore for PgStore {
    async fn snapshot(&self, table: &str) -> Result<Option<TableSnapshot>> {
        let conn = self.pool.get().await?;

        let rows = conn.query(COLUMNS_SQL, &[&table]).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let data_type: String = row.try_get(1)?;
            let max_length: Option<i32> = row.try_get(2)?;
            let is_nullable: String = row.try_get(3)?;
            columns.push(ColumnSnapshot {
                name: row.try_get(0)?,
                pg_type: PgType::from_information_schema(&data_type, max_length),
                data_type,
                nullable: is_nullable == "YES",
                default: row.try_get(4)?,
            });
        }

        let mut primary_key = Vec::new();
        let mut primary_key_constraint = None;
        for row in conn.query(PRIMARY_KEY_SQL, &[&table]).await? {
            primary_key_constraint = Some(row.try_get::<_, String>(0)?);
            primary_key.push(row.try_get(1)?);
        }

        let mut foreign_keys = Vec::new();
        for row in conn.query(FOREIGN_KEYS_SQL, &[&table]).await? {
            let references_table: String = row.try_get(1)?;
            foreign_keys.push(ForeignKey {
                columns: row.try_get(0)?,
                references_table: references_table.trim_matches('"').to_string(),
                references_columns: row.try_get(2)?,
            });
        }

        Ok(Some(TableSnapshot {
            name: table.to_string(),
            columns,
            primary_key,
            primary_key_constraint,
            foreign_keys,
        }))
    }

    async fn apply(&self, table: &str, change: &Change) -> Result<()> {
        let sql = change.to_sql(table);
        let conn = self.pool.get().await?;
        conn.batch_execute(&sql).await?;
        Ok(())
    }
}
