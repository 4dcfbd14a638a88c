use super::*;

fn parent() -> Entity {
    Entity::builder("parent")
        .column(Column::new("id", PgType::Integer).primary_key().auto())
        .column(Column::new("name", PgType::Varchar(None)))
        .build()
        .unwrap()
}

fn sample() -> Entity {
    Entity::builder("sample")
        .column(Column::new("id", PgType::Integer).primary_key().auto())
        .column(Column::new("parent_id", PgType::Integer))
        .column(Column::new("title", PgType::Varchar(Some(255))))
        .column(Column::new("created_ts", PgType::Timestamp).default("now()"))
        .column(Column::new("pmpt_id", PgType::Integer).default("1"))
        .foreign_key("parent_id", "parent.id")
        .build()
        .unwrap()
}

#[test]
fn test_parse_fk_reference_dot_format() {
    assert_eq!(parse_fk_reference("parent.id"), Some(("parent", "id")));
    assert_eq!(
        parse_fk_reference("category.parent_id"),
        Some(("category", "parent_id"))
    );
}

#[test]
fn test_parse_fk_reference_paren_format() {
    assert_eq!(parse_fk_reference("parent(id)"), Some(("parent", "id")));
}

#[test]
fn test_parse_fk_reference_invalid() {
    assert_eq!(parse_fk_reference(""), None);
    assert_eq!(parse_fk_reference("parent"), None);
    assert_eq!(parse_fk_reference(".id"), None);
    assert_eq!(parse_fk_reference("parent."), None);
    assert_eq!(parse_fk_reference("(id)"), None);
    assert_eq!(parse_fk_reference("parent()"), None);
}

#[test]
fn test_pg_type_from_information_schema() {
    assert_eq!(
        PgType::from_information_schema("character varying", Some(255)),
        Some(PgType::Varchar(Some(255)))
    );
    assert_eq!(
        PgType::from_information_schema("character varying", None),
        Some(PgType::Varchar(None))
    );
    assert_eq!(
        PgType::from_information_schema("timestamp without time zone", None),
        Some(PgType::Timestamp)
    );
    assert_eq!(PgType::from_information_schema("jsonb", None), Some(PgType::Jsonb));
    assert_eq!(PgType::from_information_schema("tsvector", None), None);
}

#[test]
fn test_column_sql() {
    let col = Column::new("pmpt_id", PgType::Integer).default("1");
    assert_eq!(col.to_sql(), "\"pmpt_id\" INTEGER DEFAULT 1");

    let col = Column::new("id", PgType::BigInt).primary_key().auto();
    assert_eq!(col.to_sql(), "\"id\" BIGSERIAL NOT NULL");

    let col = Column::new("title", PgType::Varchar(Some(255))).not_null();
    assert_eq!(col.to_sql(), "\"title\" VARCHAR(255) NOT NULL");
}

#[test]
fn test_create_table_single_pk() {
    insta::assert_snapshot!(sample().to_create_table_sql(), @r#"
    CREATE TABLE "sample" (
        "id" SERIAL NOT NULL PRIMARY KEY,
        "parent_id" INTEGER,
        "title" VARCHAR(255),
        "created_ts" TIMESTAMP DEFAULT now(),
        "pmpt_id" INTEGER DEFAULT 1
    );
    "#);
}

#[test]
fn test_create_table_composite_pk() {
    let entity = Entity::builder("sample_tag")
        .column(Column::new("sample_id", PgType::Integer).primary_key())
        .column(Column::new("tag", PgType::Text).primary_key())
        .build()
        .unwrap();

    assert_eq!(
        entity.to_create_table_sql(),
        "CREATE TABLE \"sample_tag\" (\n    \"sample_id\" INTEGER NOT NULL,\n    \"tag\" TEXT NOT NULL,\n    PRIMARY KEY (\"sample_id\", \"tag\")\n);"
    );
}

#[test]
fn test_builder_rejects_duplicate_column() {
    let err = Entity::builder("parent")
        .column(Column::new("id", PgType::Integer))
        .column(Column::new("id", PgType::BigInt))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        SchemaError::DuplicateColumn {
            table: "parent".into(),
            column: "id".into()
        }
    );
}

#[test]
fn test_builder_rejects_foreign_key_on_unknown_column() {
    let err = Entity::builder("sample")
        .column(Column::new("id", PgType::Integer))
        .foreign_key("parent_id", "parent.id")
        .build()
        .unwrap_err();
    assert!(matches!(err, SchemaError::UnknownForeignKeyColumn { .. }));
}

#[test]
fn test_builder_rejects_bad_reference() {
    let err = Entity::builder("sample")
        .column(Column::new("parent_id", PgType::Integer))
        .foreign_key("parent_id", "parent")
        .build()
        .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidReference { .. }));
}

#[test]
fn test_entity_snapshot_matches_declaration() {
    let entity = sample();
    let snap = entity.snapshot();
    assert_eq!(snap.column_names(), entity.column_names());
    assert_eq!(snap.primary_key, vec!["id"]);
    assert_eq!(snap.primary_key_constraint.as_deref(), Some("sample_pkey"));
    assert!(snap.foreign_keys.is_empty());
    assert_eq!(
        snap.column("id").unwrap().default.as_deref(),
        Some("nextval('sample_id_seq'::regclass)")
    );
}

#[test]
fn test_snapshot_rename_and_drop() {
    let mut snap = sample().snapshot();
    snap.add_foreign_key(sample().foreign_keys[0].clone());

    snap.rename_column("parent_id", "owner_id");
    assert!(snap.has_column("owner_id"));
    assert!(!snap.has_column("parent_id"));
    assert!(snap.has_foreign_key_on(&["owner_id".to_string()]));

    snap.drop_column("owner_id");
    assert!(snap.foreign_keys.is_empty());

    snap.drop_column("id");
    assert!(snap.primary_key.is_empty());
    assert_eq!(snap.primary_key_constraint, None);
}

#[test]
fn test_creation_order_puts_referenced_tables_first() {
    let schema = Schema::new()
        .with(sample())
        .unwrap()
        .with(parent())
        .unwrap();

    let order: Vec<&str> = schema
        .creation_order()
        .into_iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(order, vec!["parent", "sample"]);
}

#[test]
fn test_schema_rejects_duplicate_table() {
    let err = Schema::new()
        .with(parent())
        .unwrap()
        .with(parent())
        .unwrap_err();
    assert_eq!(err, SchemaError::DuplicateTable("parent".into()));
}
