use crate::cli::FetchArgs;
use crate::config::ProjectConfig;
use crate::db::connect;
use relq::{FetchOptions, Filter, InstrumentedDriver, RelationExpr, Value, fetch_graph, table};

pub async fn run(args: FetchArgs) -> anyhow::Result<()> {
    let project = ProjectConfig::load(args.config)?;
    let registry = project.registry()?;

    // Parse everything before touching the database.
    let expr = RelationExpr::parse(&args.relations)?;
    let meta = registry.entity(&args.entity)?;
    let mut root = table(meta.table.clone())?;
    for (column, raw) in &args.filters {
        root = root.where_eq(column.as_str(), filter_value(raw))?;
    }
    if let Some(limit) = args.limit {
        root = root.limit(limit);
    }

    let mut options = FetchOptions::new();
    if let Some(depth) = args.max_depth.or(project.file.fetch.max_depth) {
        options = options.with_max_depth(depth);
    }
    if let Some(ms) = project.file.fetch.statement_timeout_ms {
        options = options.with_statement_timeout(std::time::Duration::from_millis(ms));
    }

    let database_url = project.database_url(args.database)?;
    let client = connect(&database_url).await?;
    let driver = InstrumentedDriver::new(client).with_config(project.monitor_config());

    let records = fetch_graph(&driver, &registry, &root, &args.entity, &expr, &options).await?;
    let json: Vec<serde_json::Value> = records.iter().map(|r| r.to_json()).collect();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// `--where` values are read as JSON scalars when they parse, else as text.
fn filter_value(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json @ (serde_json::Value::Number(_)
        | serde_json::Value::Bool(_)
        | serde_json::Value::Null
        | serde_json::Value::String(_))) => Value::from_json(&json),
        _ => Value::Text(raw.to_string()),
    }
}
