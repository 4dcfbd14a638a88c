//! The sample query/mutation API, end to end over the in-memory store.

use rowsmith::sample::{self, NewSample, SampleApi, SampleService, SampleUpdate};
use rowsmith::{
    Error, MemoryStore, RecordAccess, SyncOptions, Synchronizer, Value, record,
};
use serde_json::json;

async fn service() -> SampleService<MemoryStore> {
    let store = MemoryStore::new();
    let schema = sample::schema().unwrap();

    let reports = Synchronizer::new(&store)
        .synchronize_all(&schema, &SyncOptions::new())
        .await
        .unwrap();
    assert!(reports.iter().all(|r| r.is_clean()));

    let parent = sample::parent_entity().unwrap();
    RecordAccess::new(&store, &parent)
        .create(record([("name", "Ada"), ("email_id", "ada@example.com")]))
        .await
        .unwrap();

    SampleService::new(store).unwrap()
}

fn new_sample(title: &str) -> NewSample {
    NewSample {
        parent_id: 1,
        json_data: json!({"tags": ["a", "b"]}),
        score: 0.5,
        title: title.to_string(),
        description: "first draft".to_string(),
        pmpt: "Summarize the text".to_string(),
        created_by: "ada".to_string(),
    }
}

#[tokio::test]
async fn create_sample_stamps_audit_columns() {
    let samples = service().await;

    let created = samples.create_sample(new_sample("one")).await.unwrap();
    assert_eq!(created.id, 1);
    assert_eq!(created.parent_id, Some(1));
    assert_eq!(created.json_data, Some(json!({"tags": ["a", "b"]})));
    assert_eq!(created.score, Some(0.5));
    assert_eq!(created.pmpt_id, Some(1));
    assert_eq!(created.created_by.as_deref(), Some("ada"));
    assert_eq!(created.modified_by, created.created_by);
    assert!(created.created_ts.is_some());
    assert_eq!(created.modified_ts, created.created_ts);
}

#[tokio::test]
async fn create_sample_requires_existing_parent() {
    let samples = service().await;
    let input = NewSample {
        parent_id: 42,
        ..new_sample("orphan")
    };

    let err = samples.create_sample(input).await.unwrap_err();
    assert!(matches!(err, Error::Store(_)), "{err:?}");
    assert!(samples.list_samples().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_sample_bumps_version_when_prompt_changes() {
    let samples = service().await;
    let created = samples.create_sample(new_sample("one")).await.unwrap();

    let updated = samples
        .update_sample(
            created.id,
            SampleUpdate {
                pmpt: Some("Summarize in one sentence".to_string()),
                modified_by: Some("grace".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.pmpt.as_deref(), Some("Summarize in one sentence"));
    assert_eq!(updated.pmpt_id, Some(2));
    assert_eq!(updated.modified_by.as_deref(), Some("grace"));
    assert_eq!(updated.created_by.as_deref(), Some("ada"));
    assert_eq!(updated.title.as_deref(), Some("one"));
    assert!(updated.modified_ts >= created.modified_ts);
    assert_eq!(updated.created_ts, created.created_ts);

    // Same prompt again: no new version
    let again = samples
        .update_sample(
            created.id,
            SampleUpdate {
                pmpt: Some("Summarize in one sentence".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(again.pmpt_id, Some(2));
    assert_eq!(again.modified_by.as_deref(), Some("grace"));
}

#[tokio::test]
async fn update_sample_ignores_empty_fields() {
    let samples = service().await;
    let created = samples.create_sample(new_sample("one")).await.unwrap();

    let updated = samples
        .update_sample(
            created.id,
            SampleUpdate {
                title: Some(String::new()),
                description: Some("second draft".to_string()),
                pmpt: Some(String::new()),
                modified_by: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title.as_deref(), Some("one"));
    assert_eq!(updated.description.as_deref(), Some("second draft"));
    assert_eq!(updated.pmpt, created.pmpt);
    assert_eq!(updated.pmpt_id, Some(1));
    assert_eq!(updated.modified_by.as_deref(), Some("ada"));
}

#[tokio::test]
async fn update_sample_restarts_missing_version() {
    let samples = service().await;
    let created = samples.create_sample(new_sample("one")).await.unwrap();

    let entity = sample::sample_entity().unwrap();
    RecordAccess::new(samples.store(), &entity)
        .partial_update(&created.id.into(), record([("pmpt_id", Value::Null)]))
        .await
        .unwrap();

    let updated = samples
        .update_sample(
            created.id,
            SampleUpdate {
                pmpt: Some("new prompt".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.pmpt_id, Some(1));
}

#[tokio::test]
async fn update_sample_refuses_to_overflow_version() {
    let samples = service().await;
    let created = samples.create_sample(new_sample("one")).await.unwrap();

    let entity = sample::sample_entity().unwrap();
    RecordAccess::new(samples.store(), &entity)
        .partial_update(&created.id.into(), record([("pmpt_id", Value::I32(i32::MAX))]))
        .await
        .unwrap();

    let err = samples
        .update_sample(
            created.id,
            SampleUpdate {
                pmpt: Some("new prompt".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(
        matches!(&err, Error::VersionExhausted { column, .. } if column == "pmpt_id"),
        "{err:?}"
    );

    let stored = samples.list_samples().await.unwrap();
    assert_eq!(stored[0].pmpt.as_deref(), Some("Summarize the text"));
    assert_eq!(stored[0].pmpt_id, Some(i32::MAX));
}

#[tokio::test]
async fn update_missing_sample_fails() {
    let samples = service().await;
    let err = samples
        .update_sample(7, SampleUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn update_sample_rejects_overlong_title() {
    let samples = service().await;
    let created = samples.create_sample(new_sample("one")).await.unwrap();

    let err = samples
        .update_sample(
            created.id,
            SampleUpdate {
                title: Some("x".repeat(256)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    let stored = samples.list_samples().await.unwrap();
    assert_eq!(stored[0].title.as_deref(), Some("one"));
}

#[tokio::test]
async fn delete_sample_reports_status() {
    let samples = service().await;
    let created = samples.create_sample(new_sample("one")).await.unwrap();

    assert_eq!(samples.delete_sample(created.id).await.unwrap(), "Sample deleted");
    assert_eq!(samples.delete_sample(created.id).await.unwrap(), "Sample not found");
    assert!(samples.list_samples().await.unwrap().is_empty());
}

#[tokio::test]
async fn list_samples_in_key_order() {
    let samples = service().await;
    for title in ["one", "two", "three"] {
        samples.create_sample(new_sample(title)).await.unwrap();
    }
    samples.delete_sample(2).await.unwrap();

    let listed = samples.list_samples().await.unwrap();
    let titles: Vec<_> = listed.iter().map(|s| s.title.as_deref()).collect();
    assert_eq!(titles, [Some("one"), Some("three")]);
    assert_eq!(listed.iter().map(|s| s.id).collect::<Vec<_>>(), [1, 3]);
}

#[tokio::test]
async fn parent_with_samples_cannot_be_deleted() {
    let samples = service().await;
    samples.create_sample(new_sample("one")).await.unwrap();

    let parent = sample::parent_entity().unwrap();
    let err = RecordAccess::new(samples.store(), &parent)
        .delete(&1.into())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(_)));
}
