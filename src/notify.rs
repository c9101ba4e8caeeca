//! Notification payload rendering
//!
//! Mirrors what a notify function does when invoked by one of the topics:
//! read its environment, parse the topic event and build the email and
//! Slack payloads. Nothing is delivered.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const ENV_STATUS: &str = "STATUS";
pub const ENV_SENDER: &str = "SENDER";
pub const ENV_TO_ADDR: &str = "TO_ADDR";
pub const ENV_SLACK_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";

/// Errors while rendering a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("{ENV_STATUS} is not set")]
    MissingStatus,

    #[error("invalid status '{0}' (expected DONE or FAILED)")]
    InvalidStatus(String),

    #[error("invalid event payload: {0}")]
    InvalidEvent(#[from] serde_json::Error),
}

/// Outcome a notify function reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Done,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }

    fn slack_icon(&self) -> &'static str {
        match self {
            Self::Done => ":white_check_mark:",
            Self::Failed => ":x:",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            _ => Err(NotifyError::InvalidStatus(s.to_string())),
        }
    }
}

/// Function environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyEnv {
    pub status: Status,
    pub sender: String,
    pub to_addr: String,
    pub slack_webhook_url: String,
}

impl NotifyEnv {
    /// Read the environment through a lookup function
    ///
    /// `STATUS` is required; the other variables default to empty, which
    /// disables the matching channel.
    pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self, NotifyError> {
        let status = env(ENV_STATUS)
            .filter(|s| !s.is_empty())
            .ok_or(NotifyError::MissingStatus)?
            .parse()?;
        Ok(Self {
            status,
            sender: env(ENV_SENDER).unwrap_or_default(),
            to_addr: env(ENV_TO_ADDR).unwrap_or_default(),
            slack_webhook_url: env(ENV_SLACK_WEBHOOK_URL).unwrap_or_default(),
        })
    }

    fn email_enabled(&self) -> bool {
        !self.sender.is_empty() && !self.to_addr.is_empty()
    }
}

/// Topic event delivered to a function
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<TopicRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicRecord {
    #[serde(rename = "Sns")]
    pub sns: TopicMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicMessage {
    #[serde(rename = "Subject", default)]
    pub subject: Option<String>,
    #[serde(rename = "Message", default)]
    pub message: String,
}

impl TopicEvent {
    pub fn parse(json: &str) -> Result<Self, NotifyError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Email a function would send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailEnvelope {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Everything a function would send for one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub status: Status,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailEnvelope>,
    /// Webhook URL and the JSON payload posted to it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackMessage {
    pub webhook_url: String,
    pub payload: serde_json::Value,
}

fn default_subject(status: Status) -> &'static str {
    match status {
        Status::Done => "Pipeline finished",
        Status::Failed => "Pipeline failed",
    }
}

/// Pretty-print JSON messages, pass anything else through
fn format_message(message: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(message) {
        Ok(value) if value.is_object() || value.is_array() => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| message.to_string())
        }
        _ => message.to_string(),
    }
}

/// Render the notification for an event
pub fn render(env: &NotifyEnv, event: &TopicEvent) -> Notification {
    let topic_subject = event
        .records
        .iter()
        .find_map(|r| r.sns.subject.as_deref().filter(|s| !s.is_empty()))
        .unwrap_or(default_subject(env.status));
    let subject = format!("[{}] {}", env.status, topic_subject);

    let body = if event.records.is_empty() {
        "(no message)".to_string()
    } else {
        event
            .records
            .iter()
            .map(|r| format_message(&r.sns.message))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let email = env.email_enabled().then(|| EmailEnvelope {
        from: env.sender.clone(),
        to: env.to_addr.clone(),
        subject: subject.clone(),
        body: body.clone(),
    });
    if email.is_none() {
        log::debug!("Email disabled: {ENV_SENDER} or {ENV_TO_ADDR} is empty");
    }

    let slack = (!env.slack_webhook_url.is_empty()).then(|| SlackMessage {
        webhook_url: env.slack_webhook_url.clone(),
        payload: json!({
            "text": format!("{} *{}*\n```{}```", env.status.slack_icon(), subject, body),
        }),
    });

    Notification {
        status: env.status,
        subject,
        body,
        email,
        slack,
    }
}
