//! The built-in `parent` / `sample` schema and the query/mutation API over
//! samples.

use crate::records::RecordAccess;
use crate::store::{Guard, RecordStore};
use crate::value::{Key, Record, Value};
use crate::{Error, Result};
use chrono::{NaiveDateTime, Utc};
use rowsmith_schema::{Column, Entity, PgType, Schema, SchemaError};
use std::future::Future;

pub const PARENT_TABLE: &str = "parent";
pub const SAMPLE_TABLE: &str = "sample";

pub fn parent_entity() -> Result<Entity, SchemaError> {
    Entity::builder(PARENT_TABLE)
        .column(Column::new("id", PgType::Integer).primary_key().auto())
        .column(Column::new("name", PgType::Varchar(None)))
        .column(Column::new("email_id", PgType::Varchar(None)))
        .build()
}

pub fn sample_entity() -> Result<Entity, SchemaError> {
    Entity::builder(SAMPLE_TABLE)
        .column(Column::new("id", PgType::Integer).primary_key().auto())
        .column(Column::new("parent_id", PgType::Integer))
        .column(Column::new("json_data", PgType::Jsonb))
        .column(Column::new("score", PgType::DoublePrecision))
        .column(Column::new("title", PgType::Varchar(Some(255))))
        .column(Column::new("description", PgType::Text))
        .column(Column::new("created_ts", PgType::Timestamp).default("now()"))
        .column(Column::new("created_by", PgType::Varchar(None)))
        .column(Column::new("modified_ts", PgType::Timestamp).default("now()"))
        .column(Column::new("modified_by", PgType::Varchar(None)))
        .column(Column::new("pmpt", PgType::Varchar(None)))
        .column(
            Column::new("pmpt_id", PgType::Integer)
                .default("1")
                .doc("Version of `pmpt`, bumped whenever it changes"),
        )
        .foreign_key("parent_id", "parent.id")
        .build()
}

/// Both built-in entities.
pub fn schema() -> Result<Schema, SchemaError> {
    Schema::new().with(parent_entity()?)?.with(sample_entity()?)
}

/// A stored sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: i32,
    pub parent_id: Option<i32>,
    pub json_data: Option<serde_json::Value>,
    pub score: Option<f64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_ts: Option<NaiveDateTime>,
    pub created_by: Option<String>,
    pub modified_ts: Option<NaiveDateTime>,
    pub modified_by: Option<String>,
    pub pmpt: Option<String>,
    pub pmpt_id: Option<i32>,
}

fn field<T>(
    record: &Record,
    column: &str,
    expected: &str,
    get: impl Fn(&Value) -> Option<T>,
) -> Result<Option<T>> {
    match record.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => get(value).map(Some).ok_or_else(|| Error::TypeMismatch {
            table: SAMPLE_TABLE.to_string(),
            column: column.to_string(),
            expected: expected.to_string(),
            actual: value.type_name().to_string(),
        }),
    }
}

fn text(v: &Value) -> Option<String> {
    v.as_str().map(String::from)
}

impl TryFrom<Record> for Sample {
    type Error = Error;

    fn try_from(record: Record) -> Result<Self> {
        let id = field(&record, "id", "integer", Value::as_i32)?.ok_or_else(|| {
            Error::TypeMismatch {
                table: SAMPLE_TABLE.to_string(),
                column: "id".to_string(),
                expected: "integer".to_string(),
                actual: "null".to_string(),
            }
        })?;

        Ok(Sample {
            id,
            parent_id: field(&record, "parent_id", "integer", Value::as_i32)?,
            json_data: field(&record, "json_data", "jsonb", |v| v.as_json().cloned())?,
            score: field(&record, "score", "double precision", Value::as_f64)?,
            title: field(&record, "title", "varchar", text)?,
            description: field(&record, "description", "text", text)?,
            created_ts: field(&record, "created_ts", "timestamp", Value::as_timestamp)?,
            created_by: field(&record, "created_by", "varchar", text)?,
            modified_ts: field(&record, "modified_ts", "timestamp", Value::as_timestamp)?,
            modified_by: field(&record, "modified_by", "varchar", text)?,
            pmpt: field(&record, "pmpt", "varchar", text)?,
            pmpt_id: field(&record, "pmpt_id", "integer", Value::as_i32)?,
        })
    }
}

/// Input for [`SampleApi::create_sample`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    pub parent_id: i32,
    pub json_data: serde_json::Value,
    pub score: f64,
    pub title: String,
    pub description: String,
    pub pmpt: String,
    pub created_by: String,
}

/// Input for [`SampleApi::update_sample`]. `None` and empty strings leave
/// the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub pmpt: Option<String>,
    pub modified_by: Option<String>,
}

/// The query and mutation operations exposed for samples.
pub trait SampleApi {
    fn list_samples(&self) -> impl Future<Output = Result<Vec<Sample>>> + Send;

    fn create_sample(&self, input: NewSample) -> impl Future<Output = Result<Sample>> + Send;

    fn update_sample(
        &self,
        sample_id: i32,
        input: SampleUpdate,
    ) -> impl Future<Output = Result<Sample>> + Send;

    /// Returns a status message rather than failing when the sample is missing.
    fn delete_sample(&self, sample_id: i32) -> impl Future<Output = Result<String>> + Send;
}

/// [`SampleApi`] over any [`RecordStore`].
pub struct SampleService<S> {
    store: S,
    sample: Entity,
}

impl<S: RecordStore> SampleService<S> {
    pub fn new(store: S) -> Result<Self> {
        Ok(Self {
            store,
            sample: sample_entity()?,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn records(&self) -> RecordAccess<'_, S> {
        RecordAccess::new(&self.store, &self.sample)
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl<S: RecordStore> SampleApi for SampleService<S> {
    async fn list_samples(&self) -> Result<Vec<Sample>> {
        self.records()
            .list()
            .await?
            .into_iter()
            .map(Sample::try_from)
            .collect()
    }

    async fn create_sample(&self, input: NewSample) -> Result<Sample> {
        let now = now();
        let mut payload = Record::new();
        payload.insert("parent_id".into(), input.parent_id.into());
        payload.insert("json_data".into(), input.json_data.into());
        payload.insert("score".into(), input.score.into());
        payload.insert("title".into(), input.title.into());
        payload.insert("description".into(), input.description.into());
        payload.insert("created_ts".into(), now.into());
        payload.insert("created_by".into(), input.created_by.clone().into());
        payload.insert("modified_ts".into(), now.into());
        payload.insert("modified_by".into(), input.created_by.into());
        payload.insert("pmpt".into(), input.pmpt.into());
        payload.insert("pmpt_id".into(), Value::I32(1));

        Sample::try_from(self.records().create(payload).await?)
    }

    async fn update_sample(&self, sample_id: i32, input: SampleUpdate) -> Result<Sample> {
        let records = self.records();
        let key = Key::from(sample_id);
        let current = records.get(&key).await?;
        let version = current.get("pmpt_id").cloned().unwrap_or(Value::Null);

        let mut payload = Record::new();
        if let Some(title) = non_empty(input.title) {
            payload.insert("title".into(), title.into());
        }
        if let Some(description) = non_empty(input.description) {
            payload.insert("description".into(), description.into());
        }
        if let Some(pmpt) = non_empty(input.pmpt)
            && current.get("pmpt").and_then(Value::as_str) != Some(pmpt.as_str())
        {
            let next = version
                .as_i64()
                .unwrap_or(0)
                .checked_add(1)
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| Error::VersionExhausted {
                    table: self.sample.name.clone(),
                    key: key.to_string(),
                    column: "pmpt_id".to_string(),
                })?;
            payload.insert("pmpt".into(), pmpt.into());
            payload.insert("pmpt_id".into(), Value::I32(next));
        }
        payload.insert("modified_ts".into(), now().into());
        if let Some(modified_by) = non_empty(input.modified_by) {
            payload.insert("modified_by".into(), modified_by.into());
        }

        let updated = records
            .partial_update_guarded(&key, payload, Guard::new("pmpt_id", version))
            .await?;
        Sample::try_from(updated)
    }

    async fn delete_sample(&self, sample_id: i32) -> Result<String> {
        match self.records().delete(&Key::from(sample_id)).await {
            Ok(()) => Ok("Sample deleted".to_string()),
            Err(Error::NotFound { .. }) => Ok("Sample not found".to_string()),
            Err(e) => Err(e),
        }
    }
}
