use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use agenthub::{CommunicationHub, Config};

/// Default content for .agenthub/.gitignore
const GITIGNORE_CONTENT: &str = r#"# Agent hub gitignore
# Live coordination state
*.json
*.lock
*.corrupt
.*.tmp.*
"#;

pub fn run(dir: &Path) -> Result<()> {
    if dir.exists() {
        anyhow::bail!("Hub already initialized at {}", dir.display());
    }

    fs::create_dir_all(dir).context("Failed to create hub directory")?;
    Config::init(dir).context("Failed to write config.toml")?;

    let config = Config::load(dir)?;
    CommunicationHub::open(config.store_path(dir), config.hub)
        .context("Failed to create hub document")?;

    fs::write(dir.join(".gitignore"), GITIGNORE_CONTENT).context("Failed to create .gitignore")?;

    println!("Initialized hub at {}", dir.display());
    Ok(())
}
