use anyhow::Result;
use std::path::Path;

use agenthub::DependencyGraph;

use super::open_hub;

fn load_graph(dir: &Path) -> Result<DependencyGraph> {
    let hub = open_hub(dir)?;
    Ok(DependencyGraph::from_integration_points(
        &hub.integration_points()?,
    ))
}

/// Report cycles and dependencies nobody has announced. Exits non-zero on cycles.
pub fn run_check(dir: &Path, json: bool) -> Result<()> {
    let graph = load_graph(dir)?;
    let report = graph.report();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} components, {} dependency edges",
            report.components, report.edges
        );
        if !report.unregistered.is_empty() {
            eprintln!(
                "Warning: depended on but never registered: {}",
                report.unregistered.join(", ")
            );
        }
        for cycle in &report.cycles {
            eprintln!("Cycle: {}", cycle.join(" <-> "));
        }
        if report.ok {
            println!("No circular dependencies");
        }
    }

    if !report.ok {
        anyhow::bail!("{} dependency cycle(s) found", report.cycles.len());
    }
    Ok(())
}

pub fn run_order(dir: &Path, json: bool) -> Result<()> {
    let graph = load_graph(dir)?;
    let order = graph.build_order()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&order)?);
    } else if order.is_empty() {
        println!("No components registered");
    } else {
        for (i, name) in order.iter().enumerate() {
            println!("{:>3}. {}", i + 1, name);
        }
    }
    Ok(())
}
