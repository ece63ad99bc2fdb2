mod common;

use common::{MockDriver, registry};
use relq::{
    GraphInsertOptions, GraphNode, InstrumentedDriver, MonitorConfig, QbError, Value, insert_graph,
    plan_graph,
};
use serde_json::json;
use std::time::Duration;

fn seed() -> serde_json::Value {
    json!([
        {
            "#id": "jennifer",
            "first_name": "Jennifer",
            "last_name": "Lawrence",
            "age": 32,
            "pets": [{ "name": "Doggo", "species": "dog" }],
            "movies": [{ "#id": "silver", "name": "Silver Linings Playbook", "role": "Tiffany" }]
        },
        {
            "first_name": "Bradley",
            "last_name": "Cooper",
            "movies": [{ "#ref": "silver", "role": "Pat" }]
        }
    ])
}

#[tokio::test]
async fn test_insert_graph_issues_batches_in_dependency_order() {
    let registry = registry();
    let forest = GraphNode::from_json(&registry, "Person", &seed()).unwrap();
    let driver = MockDriver::new();

    let report = insert_graph(&driver, &registry, &forest, &GraphInsertOptions::new())
        .await
        .unwrap();

    let issued = driver.issued();
    assert_eq!(issued.len(), 4);

    assert_eq!(
        issued[0].sql,
        r#"INSERT INTO "persons" ("age", "first_name", "last_name") VALUES ($1, $2, $3), (DEFAULT, $4, $5) RETURNING *"#
    );
    assert_eq!(
        issued[0].params,
        vec![
            Value::Int(32),
            Value::from("Jennifer"),
            Value::from("Lawrence"),
            Value::from("Bradley"),
            Value::from("Cooper"),
        ]
    );
    assert_eq!(
        issued[1].sql,
        r#"INSERT INTO "movies" ("name") VALUES ($1) RETURNING *"#
    );
    assert_eq!(
        issued[2].sql,
        r#"INSERT INTO "animals" ("name", "species", "owner_id") VALUES ($1, $2, $3) RETURNING *"#
    );
    assert_eq!(issued[2].params[2], Value::Int(1));
    assert_eq!(
        issued[3].sql,
        r#"INSERT INTO "persons_movies" ("person_id", "movie_id", "role") VALUES ($1, $2, $3), ($4, $5, $6) RETURNING *"#
    );
    assert_eq!(
        issued[3].params,
        vec![
            Value::Int(1),
            Value::Int(3),
            Value::from("Tiffany"),
            Value::Int(2),
            Value::Int(3),
            Value::from("Pat"),
        ]
    );

    assert_eq!(
        driver.tags(),
        vec![
            "graph:persons",
            "graph:movies",
            "graph:animals",
            "graph:persons_movies"
        ]
    );

    let waves: Vec<(String, usize, usize)> = report
        .batches
        .iter()
        .map(|b| (b.table.clone(), b.wave, b.rows))
        .collect();
    assert_eq!(
        waves,
        vec![
            ("persons".to_string(), 0, 2),
            ("movies".to_string(), 0, 1),
            ("animals".to_string(), 1, 1),
            ("persons_movies".to_string(), 1, 2),
        ]
    );
    assert_eq!(report.total_rows(), 6);
}

#[tokio::test]
async fn test_insert_graph_report_exposes_inserted_records() {
    let registry = registry();
    let forest = GraphNode::from_json(&registry, "Person", &seed()).unwrap();
    let driver = MockDriver::new();

    let report = insert_graph(&driver, &registry, &forest, &GraphInsertOptions::new())
        .await
        .unwrap();

    let silver = report.by_ref("silver").unwrap();
    assert_eq!(silver.get("id"), Some(&Value::Int(3)));
    assert_eq!(
        silver.get("name"),
        Some(&Value::from("Silver Linings Playbook"))
    );
    assert!(silver.get("role").is_none());

    let jennifer = report.by_ref("jennifer").unwrap();
    assert_eq!(jennifer.get("id"), Some(&Value::Int(1)));

    let roots: Vec<Option<&Value>> = report.roots().map(|r| r.get("first_name")).collect();
    assert_eq!(
        roots,
        vec![Some(&Value::from("Jennifer")), Some(&Value::from("Bradley"))]
    );

    // preorder: jennifer, silver, doggo, bradley
    assert_eq!(report.nodes.len(), 4);
    assert_eq!(report.node(2).unwrap().get("owner_id"), Some(&Value::Int(1)));
    assert_eq!(report.node(3).unwrap().get("id"), Some(&Value::Int(2)));
}

#[tokio::test]
async fn test_insert_graph_resolves_forward_references() {
    let registry = registry();
    let input = json!([
        { "first_name": "Bradley", "movies": [{ "#ref": "hangover" }] },
        { "first_name": "Zach", "movies": [{ "#id": "hangover", "name": "The Hangover" }] }
    ]);
    let forest = GraphNode::from_json(&registry, "Person", &input).unwrap();
    let driver = MockDriver::new();

    let report = insert_graph(&driver, &registry, &forest, &GraphInsertOptions::new())
        .await
        .unwrap();

    let join = driver.issued().pop().unwrap();
    assert!(join.sql.starts_with(r#"INSERT INTO "persons_movies""#));
    let movie_id = report.by_ref("hangover").unwrap().get("id").cloned().unwrap();
    assert_eq!(join.params[1], movie_id);
    assert_eq!(join.params[3], movie_id);
}

#[tokio::test]
async fn test_belongs_to_one_parent_is_inserted_first() {
    let registry = registry();
    let input = json!({
        "name": "Fluffy",
        "owner": { "first_name": "Arnold" }
    });
    let forest = GraphNode::from_json(&registry, "Animal", &input).unwrap();
    let driver = MockDriver::new();

    insert_graph(&driver, &registry, &forest, &GraphInsertOptions::new())
        .await
        .unwrap();

    let issued = driver.issued();
    assert_eq!(issued.len(), 2);
    assert!(issued[0].sql.starts_with(r#"INSERT INTO "persons""#));
    assert_eq!(
        issued[1].sql,
        r#"INSERT INTO "animals" ("name", "owner_id") VALUES ($1, $2) RETURNING *"#
    );
    assert_eq!(issued[1].params[1], Value::Int(1));
}

#[tokio::test]
async fn test_unresolved_reference_issues_no_statement() {
    let registry = registry();
    let input = json!([
        { "first_name": "Jennifer", "movies": [{ "#id": "silver", "name": "Silver" }] },
        { "first_name": "Bradley", "movies": [{ "#ref": "silverr" }] }
    ]);
    let forest = GraphNode::from_json(&registry, "Person", &input).unwrap();
    let driver = MockDriver::new();

    let err = insert_graph(&driver, &registry, &forest, &GraphInsertOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, QbError::UnresolvedGraphReference(ref id) if id == "silverr"));
    assert!(driver.issued().is_empty());
}

#[tokio::test]
async fn test_failed_batch_reports_committed_tables() {
    let registry = registry();
    let forest = GraphNode::from_json(&registry, "Person", &seed()).unwrap();
    let driver = MockDriver::new().failing_on("animals");

    let err = insert_graph(&driver, &registry, &forest, &GraphInsertOptions::new())
        .await
        .unwrap_err();

    match err {
        QbError::GraphInsertFailed {
            table,
            committed,
            source,
        } => {
            assert_eq!(table, "animals");
            assert_eq!(committed, vec!["persons".to_string(), "movies".to_string()]);
            assert!(matches!(*source, QbError::Decode { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    // nothing after the failing batch
    assert_eq!(driver.issued().len(), 3);
}

#[tokio::test]
async fn test_batch_timeout() {
    let registry = registry();
    let forest = GraphNode::from_json(&registry, "Person", &seed()).unwrap();
    let driver = MockDriver::new().with_delay(Duration::from_millis(500));
    let options = GraphInsertOptions::new().with_statement_timeout(Duration::from_millis(10));

    let err = insert_graph(&driver, &registry, &forest, &options)
        .await
        .unwrap_err();

    match err {
        QbError::GraphInsertFailed {
            table,
            committed,
            source,
        } => {
            assert_eq!(table, "persons");
            assert!(committed.is_empty());
            assert!(source.is_timeout());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_instrumented_driver_counts_graph_statements() {
    let registry = registry();
    let forest = GraphNode::from_json(&registry, "Person", &seed()).unwrap();
    let driver = InstrumentedDriver::new(MockDriver::new())
        .with_config(MonitorConfig::new().enable_monitoring());

    insert_graph(&driver, &registry, &forest, &GraphInsertOptions::new())
        .await
        .unwrap();

    let stats = driver.stats();
    assert_eq!(stats.total_queries, 4);
    assert_eq!(stats.insert_count, 4);
    assert_eq!(stats.failed_queries, 0);
    assert_eq!(driver.inner().tags()[3], "graph:persons_movies");
}

#[test]
fn test_plan_rejects_duplicate_reference_ids() {
    let registry = registry();
    let input = json!([
        { "#id": "a", "first_name": "One" },
        { "#id": "a", "first_name": "Two" }
    ]);
    let forest = GraphNode::from_json(&registry, "Person", &input).unwrap();

    let err = plan_graph(&registry, &forest).unwrap_err();
    assert!(matches!(err, QbError::InvalidGraph(_)));
}

#[test]
fn test_plan_rejects_reference_to_wrong_entity() {
    let registry = registry();
    let input = json!([
        { "#id": "jen", "first_name": "Jennifer" },
        { "first_name": "Bradley", "movies": [{ "#ref": "jen" }] }
    ]);
    let forest = GraphNode::from_json(&registry, "Person", &input).unwrap();

    let err = plan_graph(&registry, &forest).unwrap_err();
    assert!(matches!(err, QbError::InvalidGraph(ref msg) if msg.contains("expects 'Movie'")));
}
