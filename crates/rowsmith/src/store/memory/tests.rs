use super::*;
use crate::value::record;
use rowsmith_schema::Column;

fn parent() -> Entity {
    Entity::builder("parent")
        .column(Column::new("id", PgType::Integer).primary_key().auto())
        .column(Column::new("name", PgType::Varchar(None)))
        .build()
        .unwrap()
}

fn child() -> Entity {
    Entity::builder("child")
        .column(Column::new("id", PgType::Integer).primary_key().auto())
        .column(Column::new("parent_id", PgType::Integer))
        .column(Column::new("label", PgType::Varchar(Some(5))))
        .column(Column::new("version", PgType::Integer).default("1"))
        .foreign_key("parent_id", "parent.id")
        .build()
        .unwrap()
}

async fn store() -> MemoryStore {
    let store = MemoryStore::new();
    for entity in [parent(), child()] {
        store
            .apply(&entity.name, &Change::CreateTable(entity.clone()))
            .await
            .unwrap();
        for fk in &entity.foreign_keys {
            store
                .apply(&entity.name, &Change::AddForeignKey(fk.clone()))
                .await
                .unwrap();
        }
    }
    store
}

fn store_message(err: Error) -> String {
    match err {
        Error::Store(message) => message,
        other => panic!("expected a store error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_insert_fills_serial_and_defaults() {
    let store = store().await;
    let parent = parent();
    let child = child();

    let first = store.insert(&parent, &record([("name", "a")])).await.unwrap();
    let second = store.insert(&parent, &record([("name", "b")])).await.unwrap();
    assert_eq!(first["id"], Value::I32(1));
    assert_eq!(second["id"], Value::I32(2));

    let row = store
        .insert(&child, &record([("parent_id", Value::I32(1))]))
        .await
        .unwrap();
    assert_eq!(row["version"], Value::I32(1));
    assert_eq!(row["label"], Value::Null);
    assert_eq!(row.keys().collect::<Vec<_>>(), ["id", "parent_id", "label", "version"]);
}

#[tokio::test]
async fn test_insert_rejects_duplicate_key() {
    let store = store().await;
    let parent = parent();

    store
        .insert(&parent, &record([("id", Value::I32(7)), ("name", "a".into())]))
        .await
        .unwrap();
    let err = store
        .insert(&parent, &record([("id", Value::I32(7)), ("name", "b".into())]))
        .await
        .unwrap_err();
    assert!(store_message(err).contains("parent_pkey"));
}

#[tokio::test]
async fn test_insert_rejects_overlong_varchar() {
    let store = store().await;
    let err = store
        .insert(&child(), &record([("label", "too long")]))
        .await
        .unwrap_err();
    assert_eq!(
        store_message(err),
        "value too long for type character varying(5)"
    );
}

#[tokio::test]
async fn test_foreign_key_checked_on_insert_and_delete() {
    let store = store().await;
    let parent = parent();
    let child = child();

    let err = store
        .insert(&child, &record([("parent_id", Value::I32(42))]))
        .await
        .unwrap_err();
    assert!(store_message(err).contains("child_parent_id_fkey"));

    store.insert(&parent, &record([("name", "a")])).await.unwrap();
    store
        .insert(&child, &record([("parent_id", Value::I32(1))]))
        .await
        .unwrap();

    let err = store.delete(&parent, &Key::from(1)).await.unwrap_err();
    assert!(store_message(err).contains("violates foreign key constraint"));
    assert_eq!(store.rows("parent").unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_with_guard() {
    let store = store().await;
    let parent = parent();
    let child = child();
    store.insert(&parent, &record([("name", "a")])).await.unwrap();
    store
        .insert(&child, &record([("parent_id", Value::I32(1))]))
        .await
        .unwrap();

    let stale = Guard::new("version", 2);
    let missed = store
        .update(&child, &Key::from(1), &record([("label", "x")]), Some(&stale))
        .await
        .unwrap();
    assert_eq!(missed, None);

    let current = Guard::new("version", 1);
    let updated = store
        .update(
            &child,
            &Key::from(1),
            &record([("label", Value::from("x")), ("version", Value::I32(2))]),
            Some(&current),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["label"], Value::from("x"));
    assert_eq!(updated["version"], Value::I32(2));
}

#[tokio::test]
async fn test_update_missing_row() {
    let store = store().await;
    let updated = store
        .update(&parent(), &Key::from(99), &record([("name", "x")]), None)
        .await
        .unwrap();
    assert_eq!(updated, None);
}

#[tokio::test]
async fn test_delete_where_matches_null() {
    let store = store().await;
    let parent = parent();
    for name in [Value::from("a"), Value::Null, Value::Null, Value::from("a")] {
        store.insert(&parent, &record([("name", name)])).await.unwrap();
    }

    assert_eq!(store.delete_where(&parent, "name", &Value::Null).await.unwrap(), 2);
    assert_eq!(store.delete_where(&parent, "name", &"b".into()).await.unwrap(), 0);
    assert_eq!(store.delete_where(&parent, "name", &"a".into()).await.unwrap(), 2);
    assert!(store.rows("parent").unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_all_orders_by_key() {
    let store = store().await;
    let parent = parent();
    for id in [3, 1, 2] {
        store
            .insert(&parent, &record([("id", Value::I32(id))]))
            .await
            .unwrap();
    }

    let ids: Vec<_> = store
        .fetch_all(&parent)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r["id"].clone())
        .collect();
    assert_eq!(ids, [Value::I32(1), Value::I32(2), Value::I32(3)]);
}

#[tokio::test]
async fn test_rename_keeps_data_and_references() {
    let store = store().await;
    let parent = parent();
    store.insert(&parent, &record([("name", "a")])).await.unwrap();

    let rename = Change::RenameColumn {
        from: "name".into(),
        to: "title".into(),
    };
    store.apply("parent", &rename).await.unwrap();
    assert_eq!(store.rows("parent").unwrap()[0]["title"], Value::from("a"));

    let rename_key = Change::RenameColumn {
        from: "id".into(),
        to: "parent_key".into(),
    };
    store.apply("parent", &rename_key).await.unwrap();
    let child = store.snapshot("child").await.unwrap().unwrap();
    assert_eq!(child.foreign_keys[0].references_columns, ["parent_key"]);
    let parent = store.snapshot("parent").await.unwrap().unwrap();
    assert_eq!(parent.primary_key, ["parent_key"]);
}

#[tokio::test]
async fn test_add_not_null_column_without_default() {
    let store = store().await;
    let required = Change::AddColumn(Column::new("code", PgType::Text).not_null());

    // Fine while the table is empty
    store.apply("parent", &required).await.unwrap();
    store
        .apply("parent", &Change::DropColumn("code".into()))
        .await
        .unwrap();

    store
        .insert(&parent(), &record([("name", "a")]))
        .await
        .unwrap();
    let err = store.apply("parent", &required).await.unwrap_err();
    assert_eq!(
        store_message(err),
        "column \"code\" of relation \"parent\" contains null values"
    );
    assert!(!store.snapshot("parent").await.unwrap().unwrap().has_column("code"));
}

#[tokio::test]
async fn test_add_column_fills_default() {
    let store = store().await;
    store
        .insert(&parent(), &record([("name", "a")]))
        .await
        .unwrap();
    store
        .apply(
            "parent",
            &Change::AddColumn(Column::new("active", PgType::Boolean).not_null().default("true")),
        )
        .await
        .unwrap();
    assert_eq!(store.rows("parent").unwrap()[0]["active"], Value::Bool(true));
}

#[tokio::test]
async fn test_retype_converts_or_fails_whole() {
    let store = store().await;
    let parent = parent();
    store.insert(&parent, &record([("name", "12")])).await.unwrap();

    let to_int = Change::AlterColumnType {
        name: "name".into(),
        from: "character varying".into(),
        to: PgType::Integer,
    };
    store.apply("parent", &to_int).await.unwrap();
    assert_eq!(store.rows("parent").unwrap()[0]["name"], Value::I32(12));

    let back = Change::AlterColumnType {
        name: "name".into(),
        from: "integer".into(),
        to: PgType::Text,
    };
    store.apply("parent", &back).await.unwrap();
    store.insert(&parent, &record([("name", "abc")])).await.unwrap();

    let err = store.apply("parent", &to_int).await.unwrap_err();
    assert_eq!(store_message(err), "invalid input syntax for type integer: \"abc\"");
    let rows = store.rows("parent").unwrap();
    assert_eq!(rows[0]["name"], Value::from("12"));
    assert_eq!(rows[1]["name"], Value::from("abc"));
}

#[tokio::test]
async fn test_replace_primary_key() {
    let store = store().await;
    let child = child();
    store
        .insert(&parent(), &record([("name", "a")]))
        .await
        .unwrap();
    for _ in 0..2 {
        store
            .insert(&child, &record([("parent_id", Value::I32(1))]))
            .await
            .unwrap();
    }

    let duplicate = Change::ReplacePrimaryKey {
        drop: Some("child_pkey".into()),
        columns: vec!["parent_id".into()],
    };
    let err = store.apply("child", &duplicate).await.unwrap_err();
    assert!(store_message(err).contains("could not create unique index"));

    let wrong_name = Change::ReplacePrimaryKey {
        drop: Some("nope".into()),
        columns: vec!["id".into()],
    };
    assert!(store.apply("child", &wrong_name).await.is_err());

    let compound = Change::ReplacePrimaryKey {
        drop: Some("child_pkey".into()),
        columns: vec!["id".into(), "parent_id".into()],
    };
    store.apply("child", &compound).await.unwrap();
    let snapshot = store.snapshot("child").await.unwrap().unwrap();
    assert_eq!(snapshot.primary_key, ["id", "parent_id"]);
}

#[tokio::test]
async fn test_primary_key_with_dependents_cannot_be_dropped() {
    let store = store().await;
    let change = Change::ReplacePrimaryKey {
        drop: Some("parent_pkey".into()),
        columns: vec!["name".into()],
    };
    let err = store.apply("parent", &change).await.unwrap_err();
    assert!(store_message(err).contains("other objects depend on it"));
}

#[tokio::test]
async fn test_add_foreign_key_validates_rows() {
    let store = MemoryStore::new();
    let parent = parent();
    let child = child();
    store
        .apply("parent", &Change::CreateTable(parent.clone()))
        .await
        .unwrap();
    store
        .apply("child", &Change::CreateTable(child.clone()))
        .await
        .unwrap();
    store
        .insert(&child, &record([("parent_id", Value::I32(5))]))
        .await
        .unwrap();

    let fk = Change::AddForeignKey(child.foreign_keys[0].clone());
    let err = store.apply("child", &fk).await.unwrap_err();
    assert!(store_message(err).contains("child_parent_id_fkey"));

    store
        .delete_where(&child, "parent_id", &Value::I32(5))
        .await
        .unwrap();
    store.apply("child", &fk).await.unwrap();
    let err = store.apply("child", &fk).await.unwrap_err();
    assert!(store_message(err).contains("already exists"));
}

#[tokio::test]
async fn test_drop_table_with_dependents() {
    let store = store().await;
    let err = store
        .apply("parent", &Change::DropTable("parent".into()))
        .await
        .unwrap_err();
    assert!(store_message(err).contains("other objects depend on it"));

    store
        .apply("child", &Change::DropTable("child".into()))
        .await
        .unwrap();
    store
        .apply("parent", &Change::DropTable("parent".into()))
        .await
        .unwrap();
    assert!(store.table_names().unwrap().is_empty());
}

#[test]
fn test_cast() {
    assert_eq!(cast(&Value::from(" 42 "), PgType::BigInt).unwrap(), Value::I64(42));
    assert_eq!(cast(&Value::from("yes"), PgType::Boolean).unwrap(), Value::Bool(true));
    assert_eq!(cast(&Value::F64(2.6), PgType::Integer).unwrap(), Value::I32(3));
    assert_eq!(cast(&Value::I32(5), PgType::Text).unwrap(), Value::from("5"));
    assert_eq!(
        cast(&Value::from("{\"a\":1}"), PgType::Jsonb).unwrap(),
        Value::Json(serde_json::json!({"a": 1}))
    );
    assert!(cast(&Value::from("nope"), PgType::Timestamp).is_err());
}

#[test]
fn test_eval_default() {
    assert_eq!(eval_default("1", Some(PgType::Integer)).unwrap(), Value::I32(1));
    assert_eq!(
        eval_default("'it''s'", Some(PgType::Text)).unwrap(),
        Value::from("it's")
    );
    assert!(matches!(
        eval_default("now()", Some(PgType::Timestamp)).unwrap(),
        Value::Timestamp(_)
    ));
    assert!(eval_default("gen_random_uuid()", None).is_err());
}
