use crate::cli::PlanArgs;
use crate::config::ProjectConfig;
use crate::db::read_json;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use relq::graph::Slot;
use relq::{GraphNode, GraphPlan, plan_graph};

pub fn run(args: PlanArgs) -> anyhow::Result<()> {
    let project = ProjectConfig::load(args.config)?;
    let registry = project.registry()?;
    let input = read_json(&args.input)?;

    let forest = GraphNode::from_json(&registry, &args.entity, &input)?;
    let plan = plan_graph(&registry, &forest)?;

    println!("{}", plan_table(&plan));
    println!(
        "{} node(s), {} row(s), {} statement(s) in {} wave(s)",
        plan.node_count(),
        plan.rows().len(),
        plan.batches().len(),
        plan.wave_count()
    );
    Ok(())
}

/// One printed line per batch.
#[derive(Debug, PartialEq)]
struct BatchLine {
    wave: usize,
    table: String,
    rows: usize,
    columns: Vec<String>,
}

fn batch_lines(plan: &GraphPlan) -> Vec<BatchLine> {
    plan.batches()
        .iter()
        .map(|batch| {
            let mut columns: Vec<String> = Vec::new();
            for &row in &batch.rows {
                for (column, slot) in &plan.rows()[row].values {
                    let label = match slot {
                        Slot::Value(_) => column.clone(),
                        Slot::KeyOf { node, column: key } => format!(
                            "{column} <- {}#{node}.{key}",
                            plan.entity_of(*node).unwrap_or("?")
                        ),
                    };
                    if !columns.contains(&label) {
                        columns.push(label);
                    }
                }
            }
            BatchLine {
                wave: batch.wave,
                table: batch.table.to_string(),
                rows: batch.rows.len(),
                columns,
            }
        })
        .collect()
}

fn plan_table(plan: &GraphPlan) -> Table {
    let header = |s: &str| Cell::new(s).add_attribute(Attribute::Bold).fg(Color::Cyan);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header("Wave"),
            header("Table"),
            header("Rows"),
            header("Columns"),
        ]);

    for line in batch_lines(plan) {
        table.add_row(vec![
            Cell::new(line.wave).fg(Color::Yellow),
            Cell::new(&line.table),
            Cell::new(line.rows),
            Cell::new(line.columns.join("\n")).fg(Color::DarkGrey),
        ]);
    }
    table
}
