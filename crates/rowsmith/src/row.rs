//! Row mapping between Postgres and [`Value`].

use crate::value::{Record, Value};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::error::Error as StdError;
use tokio_postgres::types::{IsNull, ToSql, Type as PgTypeInfo, WrongType};

/// Context for error reporting when reading rows.
#[derive(Clone, Copy)]
pub struct RowContext<'a> {
    pub table_name: &'a str,
}

/// Convert a tokio_postgres Row to a [`Record`], keeping the row's column order.
pub fn pg_row_to_record(pg_row: &tokio_postgres::Row, ctx: RowContext<'_>) -> Result<Record> {
    let mut record = Record::with_capacity(pg_row.len());
    for (idx, column) in pg_row.columns().iter().enumerate() {
        let value = pg_value_to_value(pg_row, idx, column.name(), ctx)?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

/// Extract a value from a Postgres row at a given index, dispatching on the
/// column type the server reported.
fn pg_value_to_value(
    row: &tokio_postgres::Row,
    idx: usize,
    column_name: &str,
    ctx: RowContext<'_>,
) -> Result<Value> {
    let ty = row.columns()[idx].type_();

    let read_error = |expected: &str, e: tokio_postgres::Error| {
        // WrongType means the Rust type we asked for does not match the column
        if e.source()
            .and_then(|s| s.downcast_ref::<WrongType>())
            .is_some()
        {
            return Error::TypeMismatch {
                table: ctx.table_name.to_string(),
                column: column_name.to_string(),
                expected: expected.to_string(),
                actual: ty.name().to_string(),
            };
        }

        Error::ColumnRead {
            table: ctx.table_name.to_string(),
            column: column_name.to_string(),
            expected: expected.to_string(),
            message: e.to_string(),
        }
    };

    let value = match *ty {
        PgTypeInfo::BOOL => {
            let v: Option<bool> = row.try_get(idx).map_err(|e| read_error("boolean", e))?;
            v.map(Value::Bool)
        }
        PgTypeInfo::INT2 => {
            let v: Option<i16> = row.try_get(idx).map_err(|e| read_error("smallint", e))?;
            v.map(Value::I16)
        }
        PgTypeInfo::INT4 => {
            let v: Option<i32> = row.try_get(idx).map_err(|e| read_error("integer", e))?;
            v.map(Value::I32)
        }
        PgTypeInfo::INT8 => {
            let v: Option<i64> = row.try_get(idx).map_err(|e| read_error("bigint", e))?;
            v.map(Value::I64)
        }
        PgTypeInfo::FLOAT4 => {
            let v: Option<f32> = row.try_get(idx).map_err(|e| read_error("real", e))?;
            v.map(Value::F32)
        }
        PgTypeInfo::FLOAT8 => {
            let v: Option<f64> = row
                .try_get(idx)
                .map_err(|e| read_error("double precision", e))?;
            v.map(Value::F64)
        }
        PgTypeInfo::TEXT | PgTypeInfo::VARCHAR | PgTypeInfo::BPCHAR | PgTypeInfo::NAME => {
            let v: Option<String> = row.try_get(idx).map_err(|e| read_error("text", e))?;
            v.map(Value::String)
        }
        PgTypeInfo::JSON | PgTypeInfo::JSONB => {
            let v: Option<serde_json::Value> =
                row.try_get(idx).map_err(|e| read_error("jsonb", e))?;
            v.map(Value::Json)
        }
        PgTypeInfo::TIMESTAMP => {
            let v: Option<NaiveDateTime> =
                row.try_get(idx).map_err(|e| read_error("timestamp", e))?;
            v.map(Value::Timestamp)
        }
        PgTypeInfo::TIMESTAMPTZ => {
            let v: Option<DateTime<Utc>> =
                row.try_get(idx).map_err(|e| read_error("timestamptz", e))?;
            v.map(Value::TimestampTz)
        }
        _ => {
            return Err(Error::TypeMismatch {
                table: ctx.table_name.to_string(),
                column: column_name.to_string(),
                expected: "a supported column type".to_string(),
                actual: ty.name().to_string(),
            });
        }
    };

    Ok(value.unwrap_or(Value::Null))
}

/// Wrapper to make [`Value`] usable as a ToSql parameter.
///
/// Numeric values are converted to the width of the parameter type the
/// server inferred, so a value coerced for the declared column still binds
/// when the live column has a different width.
#[derive(Debug)]
pub struct SqlParam<'a>(pub &'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(
        &self,
        ty: &PgTypeInfo,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        let v = self.0;
        if v.is_null() {
            return Ok(IsNull::Yes);
        }

        let out_of_range = || -> Box<dyn StdError + Sync + Send> {
            format!("value {v} does not fit in {}", ty.name()).into()
        };

        match *ty {
            PgTypeInfo::INT2 if v.as_i64().is_some() => v
                .as_i64()
                .and_then(|n| i16::try_from(n).ok())
                .ok_or_else(out_of_range)?
                .to_sql(ty, out),
            PgTypeInfo::INT4 if v.as_i64().is_some() => v
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(out_of_range)?
                .to_sql(ty, out),
            PgTypeInfo::INT8 if v.as_i64().is_some() => v.as_i64().ok_or_else(out_of_range)?.to_sql(ty, out),
            PgTypeInfo::FLOAT4 if v.as_f64().is_some() => {
                (v.as_f64().ok_or_else(out_of_range)? as f32).to_sql(ty, out)
            }
            PgTypeInfo::FLOAT8 if v.as_f64().is_some() => v.as_f64().ok_or_else(out_of_range)?.to_sql(ty, out),
            // The inner value must accept the live type itself; a drifted
            // column fails here instead of receiving another type's bytes.
            _ => match v {
                Value::Null => Ok(IsNull::Yes),
                Value::Bool(v) => v.to_sql_checked(ty, out),
                Value::I16(v) => v.to_sql_checked(ty, out),
                Value::I32(v) => v.to_sql_checked(ty, out),
                Value::I64(v) => v.to_sql_checked(ty, out),
                Value::F32(v) => v.to_sql_checked(ty, out),
                Value::F64(v) => v.to_sql_checked(ty, out),
                Value::String(v) => v.to_sql_checked(ty, out),
                Value::Json(v) => v.to_sql_checked(ty, out),
                Value::Timestamp(v) => v.to_sql_checked(ty, out),
                Value::TimestampTz(v) => v.to_sql_checked(ty, out),
            },
        }
    }

    fn accepts(ty: &PgTypeInfo) -> bool {
        matches!(
            *ty,
            PgTypeInfo::BOOL
                | PgTypeInfo::INT2
                | PgTypeInfo::INT4
                | PgTypeInfo::INT8
                | PgTypeInfo::FLOAT4
                | PgTypeInfo::FLOAT8
                | PgTypeInfo::TEXT
                | PgTypeInfo::VARCHAR
                | PgTypeInfo::BPCHAR
                | PgTypeInfo::JSON
                | PgTypeInfo::JSONB
                | PgTypeInfo::TIMESTAMP
                | PgTypeInfo::TIMESTAMPTZ
        )
    }

    tokio_postgres::types::to_sql_checked!();
}
