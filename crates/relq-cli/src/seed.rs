use crate::cli::SeedArgs;
use crate::config::ProjectConfig;
use crate::db::{connect, read_json};
use relq::graph::execute_plan;
use relq::{GraphInsertOptions, GraphInsertReport, GraphNode, InstrumentedDriver, plan_graph};
use serde_json::json;

pub async fn run(args: SeedArgs) -> anyhow::Result<()> {
    let project = ProjectConfig::load(args.config)?;
    let registry = project.registry()?;
    let input = read_json(&args.input)?;

    // Plan before connecting: bad references never open a transaction.
    let forest = GraphNode::from_json(&registry, &args.entity, &input)?;
    let plan = plan_graph(&registry, &forest)?;

    let database_url = project.database_url(args.database)?;
    let mut client = connect(&database_url).await?;
    let tx = client.transaction().await?;

    let mut options = GraphInsertOptions::new();
    if let Some(timeout) = project.seed_statement_timeout() {
        options = options.with_statement_timeout(timeout);
    }

    let (report, stats) = {
        let driver = InstrumentedDriver::new(&tx).with_config(project.monitor_config());
        let report = execute_plan(&driver, &plan, &options).await?;
        (report, driver.stats())
    };

    if args.dry_run {
        tx.rollback().await?;
    } else {
        tx.commit().await?;
    }

    println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    if project.file.monitor.enabled {
        eprintln!(
            "{} statement(s), {} slow, {:?} total",
            stats.total_queries, stats.slow_queries, stats.total_duration
        );
    }
    if args.dry_run {
        eprintln!("dry run: rolled back");
    }
    Ok(())
}

fn report_json(report: &GraphInsertReport) -> serde_json::Value {
    json!({
        "batches": report
            .batches
            .iter()
            .map(|b| json!({ "wave": b.wave, "table": b.table, "rows": b.rows }))
            .collect::<Vec<_>>(),
        "roots": report.roots().map(|r| r.to_json()).collect::<Vec<_>>(),
        "total_rows": report.total_rows(),
    })
}
