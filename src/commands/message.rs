use anyhow::Result;
use std::path::Path;

use super::{open_hub, short_time};

pub fn run_send(
    dir: &Path,
    from: &str,
    to: &str,
    message: &str,
    kind: &str,
    json: bool,
) -> Result<()> {
    let hub = open_hub(dir)?;
    let msg = hub.send_message(from, to, message, kind)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&msg)?);
    } else {
        println!("Sent {} -> {} ({})", from, to, msg.id);
    }
    Ok(())
}

pub fn run_inbox(dir: &Path, agent: &str, all: bool, mark_read: bool, json: bool) -> Result<()> {
    let hub = open_hub(dir)?;
    let messages = hub.get_messages(agent, !all)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else if messages.is_empty() {
        println!("No new messages");
    } else {
        for msg in &messages {
            let marker = if msg.read { " " } else { "*" };
            println!(
                "{} [{}] {} from {} ({}): {}",
                marker,
                short_time(&msg.timestamp),
                msg.id,
                msg.from_agent,
                msg.kind,
                msg.message
            );
        }
    }

    if mark_read {
        for msg in messages.iter().filter(|m| !m.read) {
            hub.mark_message_read(&msg.id)?;
        }
    }
    Ok(())
}

pub fn run_read(dir: &Path, id: &str) -> Result<()> {
    let hub = open_hub(dir)?;
    if !hub.mark_message_read(id)? {
        anyhow::bail!("Message '{}' not found", id);
    }
    println!("Marked '{}' as read", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, std::path::PathBuf) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(".agenthub");
        super::super::init::run(&dir).unwrap();
        (tmp, dir)
    }

    #[test]
    fn test_inbox_mark_read() {
        let (_tmp, dir) = setup();
        run_send(&dir, "frontend", "backend", "hello", "info", false).unwrap();
        run_inbox(&dir, "backend", false, true, false).unwrap();

        let hub = open_hub(&dir).unwrap();
        assert!(hub.get_messages("backend", true).unwrap().is_empty());
    }

    #[test]
    fn test_read_unknown_message_fails() {
        let (_tmp, dir) = setup();
        assert!(run_read(&dir, "nope").is_err());
    }
}
