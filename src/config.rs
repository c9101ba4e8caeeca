//! Configuration for stack assembly
//!
//! Stack-level inputs are an explicit struct passed into assembly. Values
//! come from `stackgraph.toml` and are overridden by `--context key=value`
//! flags. Only the enumerated keys are recognized.

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "stackgraph.toml";

/// Stack name used when neither the CLI nor the config file sets one
pub const DEFAULT_STACK_NAME: &str = "CommonLambdaStack";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Errors in context overrides
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContextError {
    #[error("context override must look like key=value, got '{0}'")]
    Malformed(String),

    #[error("unknown context key '{0}' (expected one of: {keys})", keys = StackContext::KEYS.join(", "))]
    UnknownKey(String),
}

/// Stack-level context inputs
///
/// Every field defaults to an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StackContext {
    /// Sender address of notification emails
    #[serde(default)]
    pub notify_sender: String,
    /// Recipient address of notification emails
    #[serde(default)]
    pub notify_email: String,
    /// Slack incoming webhook URL
    #[serde(default)]
    pub notify_slack: String,
}

impl StackContext {
    /// Recognized context keys
    pub const KEYS: [&'static str; 3] = ["notifySender", "notifyEmail", "notifySlack"];

    /// Set one value by its context key
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ContextError> {
        let slot = match key {
            "notifySender" => &mut self.notify_sender,
            "notifyEmail" => &mut self.notify_email,
            "notifySlack" => &mut self.notify_slack,
            other => return Err(ContextError::UnknownKey(other.to_string())),
        };
        *slot = value.to_string();
        Ok(())
    }

    /// Apply a `key=value` override
    pub fn apply_override(&mut self, pair: &str) -> Result<(), ContextError> {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ContextError::Malformed(pair.to_string()))?;
        self.set(key.trim(), value.trim())
    }

    /// Diagnostics for values that look wrong
    ///
    /// Empty values are accepted by assembly; they only disable the matching
    /// notification channel.
    pub fn diagnostics(&self) -> Vec<String> {
        let mut out = Vec::new();

        if self.notify_sender.is_empty() {
            out.push("notifySender is empty; email notifications are disabled".to_string());
        } else if !EMAIL_RE.is_match(&self.notify_sender) {
            out.push(format!(
                "notifySender '{}' is not an email address",
                self.notify_sender
            ));
        }

        if self.notify_email.is_empty() {
            out.push("notifyEmail is empty; email notifications are disabled".to_string());
        } else if !EMAIL_RE.is_match(&self.notify_email) {
            out.push(format!(
                "notifyEmail '{}' is not an email address",
                self.notify_email
            ));
        }

        if self.notify_slack.is_empty() {
            out.push("notifySlack is empty; Slack notifications are disabled".to_string());
        } else if !self.notify_slack.starts_with("https://") {
            out.push(format!(
                "notifySlack '{}' is not an https URL",
                self.notify_slack
            ));
        }

        out
    }
}

/// Settings for the local simulated provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_account")]
    pub account: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_account() -> String {
    "123456789012".to_string()
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            region: default_region(),
            account: default_account(),
        }
    }
}

/// Contents of `stackgraph.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Stack name
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub context: StackContext,
    #[serde(default)]
    pub provider: ProviderSettings,
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, `stackgraph.toml` in the
    /// config directory is used if present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = crate::paths::config_dir()?.join(CONFIG_FILE);
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    log::debug!("No config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply CLI overrides: stack name and `key=value` context pairs
    pub fn with_overrides(mut self, stack: Option<&str>, context: &[String]) -> Result<Self> {
        if let Some(name) = stack {
            self.stack = Some(name.to_string());
        }
        for pair in context {
            self.context.apply_override(pair)?;
        }
        Ok(self)
    }

    /// Check the context; warnings are logged, or fail in strict mode
    pub fn validate(&self, strict: bool) -> Result<()> {
        let diagnostics = self.context.diagnostics();
        if strict && !diagnostics.is_empty() {
            bail!("Invalid context:\n  - {}", diagnostics.join("\n  - "));
        }
        for d in &diagnostics {
            log::warn!("{d}");
        }
        Ok(())
    }

    pub fn stack_name(&self) -> &str {
        self.stack.as_deref().unwrap_or(DEFAULT_STACK_NAME)
    }
}
