use anyhow::{Context as AnyhowContext, Result};
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::cli::NotifyArgs;
use crate::notify::{self, ENV_STATUS, NotifyEnv, Status, TopicEvent};

/// Read a topic event from a file, or stdin for `-`
fn read_event(path: &Path) -> Result<TopicEvent> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read event from stdin")?;
        buf
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file: {}", path.display()))?
    };
    TopicEvent::parse(&content)
        .with_context(|| format!("Failed to parse event: {}", path.display()))
}

/// Build the function environment, with `--status` taking precedence over $STATUS
fn notify_env(
    status: Option<Status>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<NotifyEnv> {
    let lookup = |key: &str| match status {
        Some(s) if key == ENV_STATUS => Some(s.to_string()),
        _ => env(key),
    };
    Ok(NotifyEnv::from_lookup(lookup)?)
}

pub fn run(args: &NotifyArgs) -> Result<()> {
    let env = notify_env(args.status, |key| std::env::var(key).ok())?;
    let event = match &args.event {
        Some(path) => read_event(path)?,
        None => TopicEvent::default(),
    };

    let notification = notify::render(&env, &event);
    println!(
        "{}",
        serde_json::to_string_pretty(&notification).context("Failed to serialize notification")?
    );
    Ok(())
}
