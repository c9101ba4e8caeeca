pub mod declarative;
pub mod notify;
pub mod synth;

use anyhow::Result;

use crate::Context;
use crate::config::Config;
use crate::stack::{self, NotificationStack};

/// Loaded configuration and the stack assembled from it
pub struct Session {
    pub config: Config,
    pub built: NotificationStack,
}

impl Session {
    /// Load config, apply CLI overrides, validate and assemble the stack
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = Config::load(ctx.config.as_deref())?
            .with_overrides(ctx.stack.as_deref(), &ctx.context)?;
        Self::from_config(config, ctx.strict)
    }

    pub fn from_config(config: Config, strict: bool) -> Result<Self> {
        config.validate(strict)?;
        let built = stack::build(config.stack_name(), &config.context)?;
        log::info!(
            "Assembled stack {} with {} resources",
            built.stack.name(),
            built.stack.len()
        );
        Ok(Self { config, built })
    }
}
