use anyhow::Result;
use serde_json::{Map, Value, json};
use std::path::Path;

use agenthub::collab;

use super::{open_hub, parse_object, short_time};

/// Merge `--depends-on` names into the interface's `dependencies` list
fn build_interface(interface: Option<Map<String, Value>>, depends_on: &[String]) -> Value {
    let mut interface = interface.unwrap_or_default();
    if !depends_on.is_empty() {
        let mut deps: Vec<Value> = interface
            .get("dependencies")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();
        for name in depends_on {
            let name = json!(name);
            if !deps.contains(&name) {
                deps.push(name);
            }
        }
        interface.insert("dependencies".to_string(), Value::Array(deps));
    }
    Value::Object(interface)
}

pub fn run_register(
    dir: &Path,
    agent: &str,
    component: &str,
    interface: Option<&str>,
    depends_on: &[String],
) -> Result<()> {
    let interface = build_interface(parse_object(interface)?, depends_on);
    let hub = open_hub(dir)?;
    collab::register_interface(&hub, agent, component, interface)?;
    println!("Interface registered for {}", component);
    Ok(())
}

pub fn run_list(dir: &Path, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;
    let points = hub.integration_points()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
    } else if points.is_empty() {
        println!("No integration points registered yet");
    } else {
        for point in &points {
            let deps = point.dependencies();
            print!(
                "[{}] {} by {}",
                short_time(&point.timestamp),
                point.component,
                point.agent
            );
            if !deps.is_empty() {
                print!("  depends on: {}", deps.join(", "));
            }
            println!();
        }
    }
    Ok(())
}

pub fn run_deps(dir: &Path, component: &str, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;
    let users = collab::dependents_of(&hub, component)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
    } else if users.is_empty() {
        println!("No dependencies found for {}", component);
    } else {
        println!("Dependencies for {}:", component);
        for point in &users {
            println!("- {} by {}", point.component, point.agent);
        }
    }
    Ok(())
}
