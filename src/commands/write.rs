use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use agenthub::collab;

use super::open_hub;

pub fn run(
    dir: &Path,
    agent: &str,
    path: &str,
    content: Option<&str>,
    from_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let content = match (content, from_file) {
        (Some(c), _) => c.to_string(),
        (None, Some(src)) => fs::read_to_string(src)
            .with_context(|| format!("Failed to read {}", src.display()))?,
        (None, None) => anyhow::bail!("Provide --content or --from-file"),
    };

    let hub = open_hub(dir)?;
    let outcome = collab::write_file(&hub, agent, path, &content)
        .with_context(|| format!("Failed to write {}", path))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!(
            "Wrote {} ({} lines, {}). Team has been notified.",
            outcome.file_path,
            outcome.lines,
            outcome.action.as_str()
        );
    }
    Ok(())
}
