//! Builder-level tests for the query drafts.

use crate::error::QbError;
use crate::expr::{CompareOp, RawFragment, count_all};
use crate::predicate::Predicate;
use crate::query::{
    Cte, Filter, JoinKind, NullsOrder, SortDir, Statement, delete_from, insert_into, select,
    select_from, table, update,
};
use crate::value::{Record, Value};

#[test]
fn test_select_star() {
    let q = table("persons").unwrap();
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "persons""#);
}

#[test]
fn test_where_map_is_anded_in_pair_order() {
    let stmt = table("persons")
        .unwrap()
        .where_map([("first_name", "Test"), ("last_name", "User")])
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT * FROM "persons" WHERE ("first_name" = $1 AND "last_name" = $2)"#
    );
    assert_eq!(
        stmt.params,
        vec![Value::from("Test"), Value::from("User")]
    );
}

#[test]
fn test_where_before_source_fails() {
    let err = select(["id"]).unwrap().where_eq("id", 1).unwrap_err();
    assert!(matches!(err, QbError::NoActiveFilterTarget("where_eq")));

    let err = select(["id"]).unwrap().where_raw("1 = 1", vec![]).unwrap_err();
    assert!(matches!(err, QbError::NoActiveFilterTarget("where_raw")));
}

#[test]
fn test_or_where_nests_groups() {
    let stmt = table("persons")
        .unwrap()
        .where_eq("a", 1)
        .unwrap()
        .or_where(
            Predicate::or([
                Predicate::gt("b", 2).unwrap(),
                Predicate::lt("b", 3).unwrap(),
            ])
            .unwrap(),
        )
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT * FROM "persons" WHERE ("a" = $1 OR ("b" > $2 OR "b" < $3))"#
    );
    assert_eq!(stmt.placeholder_count(), stmt.params.len());
}

#[test]
fn test_where_family_operators() {
    let stmt = table("animals")
        .unwrap()
        .where_in("species", ["dog", "cat"])
        .unwrap()
        .where_null("owner_id")
        .unwrap()
        .where_between("age", 1, 10)
        .unwrap()
        .where_op("name", "ilike", "%o%")
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        concat!(
            r#"SELECT * FROM "animals" WHERE ("species" IN ($1, $2) AND "owner_id" IS NULL "#,
            r#"AND "age" BETWEEN $3 AND $4 AND "name" ILIKE $5)"#
        )
    );
    assert_eq!(stmt.params.len(), 5);
}

#[test]
fn test_unknown_operator_is_rejected() {
    let err = table("persons")
        .unwrap()
        .where_op("age", "=>", 1)
        .unwrap_err();
    assert!(matches!(err, QbError::InvalidOperator(_)));
}

#[test]
fn test_where_raw_renumbers_placeholders() {
    let stmt = table("persons")
        .unwrap()
        .where_eq("id", 1)
        .unwrap()
        .where_raw("age > ? OR age < ?", vec![Value::Int(10), Value::Int(90)])
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT * FROM "persons" WHERE ("id" = $1 AND (age > $2 OR age < $3))"#
    );
}

#[test]
fn test_where_raw_quote_inside_identifier_keeps_placeholders() {
    let stmt = table("notes")
        .unwrap()
        .where_raw(r#""it's" = ? AND 'say "hi"' <> ?"#, vec![Value::Int(1), Value::Int(2)])
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT * FROM "notes" WHERE ("it's" = $1 AND 'say "hi"' <> $2)"#
    );
    assert_eq!(stmt.params, vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn test_where_exists_subquery_shares_numbering() {
    let pets = select_from("animals as a")
        .unwrap()
        .where_(Predicate::columns("a.owner_id", "=", "p.id").unwrap())
        .unwrap()
        .where_eq("a.species", "dog")
        .unwrap();
    let stmt = select_from("persons as p")
        .unwrap()
        .where_eq("p.last_name", "Lawrence")
        .unwrap()
        .where_exists(pets)
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        concat!(
            r#"SELECT * FROM "persons" AS "p" WHERE ("p"."last_name" = $1 AND EXISTS ("#,
            r#"SELECT * FROM "animals" AS "a" WHERE ("a"."owner_id" = "p"."id" AND "a"."species" = $2)))"#
        )
    );
}

#[test]
fn test_join_rendering() {
    let stmt = select(["p.first_name", "m.name as movie"])
        .unwrap()
        .from("persons as p")
        .unwrap()
        .inner_join(
            "persons_movies as pm",
            Predicate::columns("pm.person_id", "=", "p.id").unwrap(),
        )
        .unwrap()
        .left_join(
            "movies as m",
            Predicate::columns("m.id", "=", "pm.movie_id").unwrap(),
        )
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        concat!(
            r#"SELECT "p"."first_name", "m"."name" AS "movie" FROM "persons" AS "p" "#,
            r#"INNER JOIN "persons_movies" AS "pm" ON "pm"."person_id" = "p"."id" "#,
            r#"LEFT JOIN "movies" AS "m" ON "m"."id" = "pm"."movie_id""#
        )
    );
}

#[test]
fn test_join_forward_reference_fails() {
    let err = select_from("persons as p")
        .unwrap()
        .inner_join(
            "persons_movies as pm",
            Predicate::columns("pm.movie_id", "=", "m.id").unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, QbError::InvalidJoin(_)));
}

#[test]
fn test_join_shape_errors() {
    let no_on = select_from("persons")
        .unwrap()
        .join(JoinKind::Left, "animals", None)
        .unwrap_err();
    assert!(matches!(no_on, QbError::InvalidJoin(_)));

    let cross_on = select_from("persons")
        .unwrap()
        .join(
            JoinKind::Cross,
            "animals",
            Some(Predicate::columns("animals.owner_id", "=", "persons.id").unwrap()),
        )
        .unwrap_err();
    assert!(matches!(cross_on, QbError::InvalidJoin(_)));

    let stmt = select_from("persons")
        .unwrap()
        .cross_join("animals")
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(stmt.sql, r#"SELECT * FROM "persons" CROSS JOIN "animals""#);
}

#[test]
fn test_group_by_having() {
    let stmt = select(["owner_id"])
        .unwrap()
        .select_expr(count_all(), "pets")
        .unwrap()
        .from("animals")
        .unwrap()
        .group_by(["owner_id"])
        .unwrap()
        .having(Predicate::compare_expr(count_all(), CompareOp::Gt, Value::Int(1)))
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT "owner_id", COUNT(*) AS "pets" FROM "animals" GROUP BY "owner_id" HAVING COUNT(*) > $1"#
    );
}

#[test]
fn test_having_without_group_by_fails() {
    let err = table("animals")
        .unwrap()
        .having_raw("count(*) > ?", vec![Value::Int(1)])
        .unwrap_err();
    assert!(matches!(err, QbError::HavingWithoutGroupBy));
}

#[test]
fn test_order_limit_offset() {
    let stmt = table("persons")
        .unwrap()
        .order_by("last_name", SortDir::Asc)
        .unwrap()
        .order_by_nulls("age", SortDir::Desc, NullsOrder::Last)
        .unwrap()
        .limit(10)
        .offset(20)
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT * FROM "persons" ORDER BY "last_name" ASC, "age" DESC NULLS LAST LIMIT 10 OFFSET 20"#
    );
    assert!(stmt.params.is_empty());
}

#[test]
fn test_union_members_are_parenthesized_when_needed() {
    let plain = select(["id"]).unwrap().from("movies").unwrap();
    let limited = select(["id"]).unwrap().from("animals").unwrap().limit(1);
    let stmt = select(["id"])
        .unwrap()
        .from("persons")
        .unwrap()
        .union(plain)
        .union_all(limited)
        .order_by("id", SortDir::Asc)
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        concat!(
            r#"SELECT "id" FROM "persons" UNION SELECT "id" FROM "movies" "#,
            r#"UNION ALL (SELECT "id" FROM "animals" LIMIT 1) ORDER BY "id" ASC"#
        )
    );
}

#[test]
fn test_recursive_cte() {
    let seed = select_from("persons").unwrap().where_eq("id", 1).unwrap();
    let step = select_from("persons as p")
        .unwrap()
        .inner_join(
            "ancestors as a",
            Predicate::columns("p.id", "=", "a.parent_id").unwrap(),
        )
        .unwrap();
    let stmt = table("ancestors")
        .unwrap()
        .with_recursive("ancestors", seed.union_all(step))
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        concat!(
            r#"WITH RECURSIVE "ancestors" AS (SELECT * FROM "persons" WHERE "id" = $1 "#,
            r#"UNION ALL SELECT * FROM "persons" AS "p" INNER JOIN "ancestors" AS "a" "#,
            r#"ON "p"."id" = "a"."parent_id") SELECT * FROM "ancestors""#
        )
    );
    assert_eq!(stmt.params, vec![Value::Int(1)]);
}

#[test]
fn test_recursive_cte_without_self_reference_fails() {
    let body = select_from("persons").unwrap();
    let err = table("ancestors")
        .unwrap()
        .with_recursive("ancestors", body)
        .unwrap_err();
    assert!(matches!(err, QbError::InvalidRecursiveCte(ref name) if name == "ancestors"));

    let raw = RawFragment::sql("SELECT 1 UNION ALL SELECT n + 1 FROM counter WHERE n < 5");
    let cte = Cte::new("counter", raw).unwrap().columns(["n"]).unwrap().recursive();
    let stmt = table("counter").unwrap().with_cte(cte).unwrap().compile().unwrap();
    assert!(stmt.sql.starts_with(r#"WITH RECURSIVE "counter"("n") AS (SELECT 1"#));
}

#[test]
fn test_duplicate_cte_fails() {
    let err = table("t")
        .unwrap()
        .with("t", select_from("persons").unwrap())
        .unwrap()
        .with("t", select_from("animals").unwrap())
        .unwrap_err();
    assert!(matches!(err, QbError::DuplicateCte(ref name) if name == "t"));
}

#[test]
fn test_cte_params_come_first() {
    let adults = select_from("persons")
        .unwrap()
        .where_op("age", ">=", 18)
        .unwrap();
    let stmt = table("adults")
        .unwrap()
        .with("adults", adults)
        .unwrap()
        .where_eq("last_name", "Cooper")
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        concat!(
            r#"WITH "adults" AS (SELECT * FROM "persons" WHERE "age" >= $1) "#,
            r#"SELECT * FROM "adults" WHERE "last_name" = $2"#
        )
    );
    assert_eq!(stmt.params, vec![Value::Int(18), Value::from("Cooper")]);
}

#[test]
fn test_incomplete_select_fails_at_compile() {
    let err = select(["id"]).unwrap().compile().unwrap_err();
    assert!(matches!(err, QbError::IncompleteStatement(_)));
}

#[test]
fn test_insert_rows_union_columns() {
    let stmt = insert_into("persons")
        .unwrap()
        .row([("first_name", Value::from("Jennifer")), ("last_name", Value::from("Lawrence"))])
        .unwrap()
        .row([("first_name", Value::from("Bradley")), ("age", Value::Int(48))])
        .unwrap()
        .returning_all()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        concat!(
            r#"INSERT INTO "persons" ("first_name", "last_name", "age") VALUES "#,
            r#"($1, $2, DEFAULT), ($3, DEFAULT, $4) RETURNING *"#
        )
    );
    assert_eq!(stmt.params.len(), 4);
}

#[test]
fn test_insert_records_and_upsert() {
    let jen = Record::new().with("id", 1).with("first_name", "Jennifer");
    let stmt = insert_into("persons")
        .unwrap()
        .records([&jen])
        .unwrap()
        .on_conflict_merge(["id"], ["first_name"])
        .unwrap()
        .returning(["id"])
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        concat!(
            r#"INSERT INTO "persons" ("id", "first_name") VALUES ($1, $2) "#,
            r#"ON CONFLICT ("id") DO UPDATE SET "first_name" = EXCLUDED."first_name" RETURNING "id""#
        )
    );

    let stmt = insert_into("persons_movies")
        .unwrap()
        .set("person_id", 1)
        .unwrap()
        .set("movie_id", 2)
        .unwrap()
        .set_raw("created_at", "now()")
        .unwrap()
        .on_conflict_do_nothing(["person_id", "movie_id"])
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        concat!(
            r#"INSERT INTO "persons_movies" ("person_id", "movie_id", "created_at") "#,
            r#"VALUES ($1, $2, now()) ON CONFLICT ("person_id", "movie_id") DO NOTHING"#
        )
    );
}

#[test]
fn test_insert_edge_cases() {
    let err = insert_into("persons").unwrap().compile().unwrap_err();
    assert!(matches!(err, QbError::IncompleteStatement(_)));

    let empty: [(&str, Value); 0] = [];
    let stmt = insert_into("persons")
        .unwrap()
        .row(empty)
        .unwrap()
        .returning_all()
        .compile()
        .unwrap();
    assert_eq!(stmt.sql, r#"INSERT INTO "persons" DEFAULT VALUES RETURNING *"#);
}

#[test]
fn test_update_and_delete() {
    let stmt = update("persons")
        .unwrap()
        .set("last_name", "Cooper")
        .unwrap()
        .set_raw("age", "age + ?", vec![Value::Int(1)])
        .unwrap()
        .where_eq("id", 7)
        .unwrap()
        .returning_all()
        .compile()
        .unwrap();
    assert_eq!(
        stmt.sql,
        r#"UPDATE "persons" SET "last_name" = $1, "age" = age + $2 WHERE "id" = $3 RETURNING *"#
    );

    let err = update("persons").unwrap().compile().unwrap_err();
    assert!(matches!(err, QbError::IncompleteStatement(_)));

    let stmt = delete_from("animals")
        .unwrap()
        .where_in("id", [1, 2, 3])
        .unwrap()
        .compile()
        .unwrap();
    assert_eq!(stmt.sql, r#"DELETE FROM "animals" WHERE "id" IN ($1, $2, $3)"#);

    let err = delete_from("animals").unwrap().compile().unwrap_err();
    assert!(matches!(err, QbError::IncompleteStatement(_)));
    assert_eq!(
        delete_from("animals").unwrap().all_rows().to_sql().unwrap(),
        r#"DELETE FROM "animals""#
    );
}

#[test]
fn test_compile_is_deterministic() {
    let q = table("persons")
        .unwrap()
        .where_in("id", [1, 1, 2])
        .unwrap()
        .or_where_raw("name = ?", vec![Value::from("x")])
        .unwrap();
    let a = q.compile().unwrap();
    let b = q.compile().unwrap();
    assert_eq!(a, b);
    assert_eq!(a.placeholder_count(), a.params.len());
    assert_eq!(a.params.len(), 4);
}

#[test]
fn test_invalid_identifiers_are_rejected() {
    assert!(matches!(
        table("persons; drop table x"),
        Err(QbError::InvalidIdentifier(_))
    ));
    assert!(matches!(
        select(["id", "name--"]),
        Err(QbError::InvalidIdentifier(_))
    ));
}
