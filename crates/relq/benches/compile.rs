use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use relq::prelude::*;
use relq::{InsertQuery, SelectQuery, plan_graph};
use serde_json::json;

/// SELECT with `n` AND-ed equality filters and one OR group.
fn build_select(n: usize) -> SelectQuery {
    let mut query = table("persons").unwrap();
    for i in 0..n {
        query = query.where_eq(format!("col{i}").as_str(), i as i64).unwrap();
    }
    query
        .or_where(Predicate::raw("age > ?", vec![Value::Int(18)]))
        .unwrap()
        .order_by("id", SortDir::Asc)
        .unwrap()
        .limit(100)
}

fn build_insert(rows: usize) -> InsertQuery {
    let mut insert = insert_into("persons").unwrap().returning_all();
    for i in 0..rows {
        insert = insert
            .row([
                ("first_name", Value::from(format!("name{i}"))),
                ("age", Value::Int(i as i64)),
            ])
            .unwrap();
    }
    insert
}

fn bench_compile_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/select");

    for n in [1, 5, 10, 50, 100] {
        let query = build_select(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &query, |b, query| {
            b.iter(|| black_box(query.build().unwrap()));
        });
    }

    group.finish();
}

fn bench_build_and_compile_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/build_and_compile_select");

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(build_select(n).build().unwrap()));
        });
    }

    group.finish();
}

fn bench_compile_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/insert_rows");

    for rows in [1, 10, 100, 1000] {
        let insert = build_insert(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &insert, |b, insert| {
            b.iter(|| black_box(insert.build().unwrap()));
        });
    }

    group.finish();
}

fn bench_plan_graph(c: &mut Criterion) {
    let registry = RelationRegistry::from_toml_str(include_str!("../tests/fixtures/relations.toml"))
        .unwrap();
    let mut group = c.benchmark_group("graph/plan");

    for people in [1, 10, 100] {
        let input: Vec<serde_json::Value> = (0..people)
            .map(|i| {
                json!({
                    "first_name": format!("person{i}"),
                    "pets": [{ "name": "a" }, { "name": "b" }],
                    "movies": [{ "#ref": "shared", "role": "extra" }]
                })
            })
            .chain(std::iter::once(json!({
                "first_name": "director",
                "movies": [{ "#id": "shared", "name": "Shared" }]
            })))
            .collect();
        let forest =
            GraphNode::from_json(&registry, "Person", &serde_json::Value::Array(input)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(people), &forest, |b, forest| {
            b.iter(|| black_box(plan_graph(&registry, forest).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile_select,
    bench_build_and_compile_select,
    bench_compile_insert,
    bench_plan_graph
);
criterion_main!(benches);
