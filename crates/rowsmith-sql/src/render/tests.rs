use crate::*;

#[test]
fn test_select_by_key() {
    let stmt = SelectStmt::new()
        .columns(["id", "title"])
        .from("sample")
        .where_(Expr::column("id").eq(Expr::param("key.id")));

    let result = render(&stmt);
    insta::assert_snapshot!(result.sql, @r#"
    SELECT "id", "title"
    FROM "sample"
    WHERE "id" = $1
    "#);
    assert_eq!(result.params, vec!["key.id"]);
}

#[test]
fn test_select_star_ordered() {
    let stmt = SelectStmt::new()
        .from("sample")
        .order_by(OrderBy::asc(Expr::column("tenant")))
        .order_by(OrderBy::asc(Expr::column("id")));

    let result = render(&stmt);
    assert_eq!(
        result.sql,
        "SELECT *\nFROM \"sample\"\nORDER BY \"tenant\" ASC, \"id\" ASC"
    );
    assert!(result.params.is_empty());
}

#[test]
fn test_insert_returning() {
    let stmt = InsertStmt::new("sample")
        .column("title", Expr::param("title"))
        .column("description", Expr::param("description"))
        .returning(["id", "title", "description"]);

    let result = render(&stmt);
    insta::assert_snapshot!(result.sql, @r#"
    INSERT INTO "sample" ("title", "description")
    VALUES ($1, $2)
    RETURNING "id", "title", "description"
    "#);
    assert_eq!(result.params, vec!["title", "description"]);
}

#[test]
fn test_insert_default_values() {
    let stmt = InsertStmt::new("parent").returning(["id"]);

    let result = render(&stmt);
    assert_eq!(
        result.sql,
        "INSERT INTO \"parent\"\nDEFAULT VALUES\nRETURNING \"id\""
    );
}

#[test]
fn test_update_with_guard() {
    let stmt = UpdateStmt::new("sample")
        .set("pmpt", Expr::param("set.pmpt"))
        .set("pmpt_id", Expr::param("set.pmpt_id"))
        .where_(Expr::column("id").eq(Expr::param("key.id")))
        .and_where(Expr::column("pmpt_id").not_distinct_from(Expr::param("guard.pmpt_id")))
        .returning(["id", "pmpt", "pmpt_id"]);

    let result = render(&stmt);
    insta::assert_snapshot!(result.sql, @r#"
    UPDATE "sample"
    SET "pmpt" = $1, "pmpt_id" = $2
    WHERE "id" = $3 AND "pmpt_id" IS NOT DISTINCT FROM $4
    RETURNING "id", "pmpt", "pmpt_id"
    "#);
    assert_eq!(
        result.params,
        vec!["set.pmpt", "set.pmpt_id", "key.id", "guard.pmpt_id"]
    );
}

#[test]
fn test_repeated_param_reuses_placeholder() {
    let stmt = DeleteStmt::new("sample").where_(
        Expr::column("parent_id")
            .eq(Expr::param("v"))
            .and(Expr::column("id").eq(Expr::param("v"))),
    );

    let result = render(&stmt);
    assert_eq!(
        result.sql,
        "DELETE FROM \"sample\"\nWHERE \"parent_id\" = $1 AND \"id\" = $1"
    );
    assert_eq!(result.params, vec!["v"]);
}

#[test]
fn test_delete_is_null() {
    let stmt = DeleteStmt::new("sample").where_(Expr::column("pmpt").is_null());

    let result = render(&stmt);
    assert_eq!(result.sql, "DELETE FROM \"sample\"\nWHERE \"pmpt\" IS NULL");
}

#[test]
fn test_quoting() {
    let stmt = SelectStmt::new()
        .column("we\"ird")
        .from("user")
        .where_(Expr::column("order").eq(Expr::param("order")));

    let result = render(&stmt);
    assert_eq!(
        result.sql,
        "SELECT \"we\"\"ird\"\nFROM \"user\"\nWHERE \"order\" = $1"
    );
}

#[test]
fn test_all_combines_with_and() {
    assert_eq!(Expr::all(Vec::new()), None);
    let combined = Expr::all([
        Expr::column("a").eq(Expr::param("a")),
        Expr::column("b").eq(Expr::param("b")),
    ]);
    let stmt = DeleteStmt {
        table: "t".into(),
        where_: combined,
    };
    assert_eq!(
        render(&stmt).sql,
        "DELETE FROM \"t\"\nWHERE \"a\" = $1 AND \"b\" = $2"
    );
}
