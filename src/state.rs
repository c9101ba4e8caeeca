use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::{AppliedMap, ApplyReport, ApplyResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

// ============================================================================
// State Structures
// ============================================================================

/// Last-applied state of one stack
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct StackState {
    /// Stack name
    pub stack: String,

    /// Last time the state was written
    pub last_updated: Option<DateTime<Utc>>,

    /// When each resource was last created or updated
    #[serde(default)]
    pub applied_at: BTreeMap<String, DateTime<Utc>>,

    /// Applied resources keyed by id
    #[serde(default)]
    pub resources: AppliedMap,
}

impl StackState {
    pub fn new(stack: &str) -> Self {
        Self {
            stack: stack.to_string(),
            ..Default::default()
        }
    }

    /// Take over the applied state of a finished run
    pub fn record_report(&mut self, report: &ApplyReport) {
        let now = Utc::now();
        for (id, result) in &report.results {
            match result {
                ApplyResult::Created | ApplyResult::Updated => {
                    self.applied_at.insert(id.clone(), now);
                }
                ApplyResult::Deleted => {
                    self.applied_at.remove(id);
                }
                _ => {}
            }
        }
        self.resources = report.applied.clone();
        self.last_updated = Some(now);
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

// ============================================================================
// State Store
// ============================================================================

/// Directory holding one state file per stack
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the default state directory (~/.local/state/stackgraph)
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(crate::paths::state_dir()?))
    }

    /// State file path for a stack
    pub fn path_for(&self, stack: &str) -> PathBuf {
        let file: String = stack
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.toml"))
    }

    /// Load state from disk, or return empty state if the file doesn't exist
    pub fn load(&self, stack: &str) -> Result<StackState> {
        let path = self.path_for(stack);

        if !path.exists() {
            log::debug!("State file does not exist, using empty state");
            return Ok(StackState::new(stack));
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: StackState = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, state: &StackState) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create state directory: {}", self.dir.display()))?;

        let path = self.path_for(&state.stack);
        let content = toml::to_string_pretty(state).context("Failed to serialize state to TOML")?;

        fs::write(&path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(path)
    }

    /// Delete a stack's state file if present
    pub fn remove(&self, stack: &str) -> Result<bool> {
        let path = self.path_for(stack);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove state file: {}", path.display()))?;
        Ok(true)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{AppliedResource, Outputs, Properties, ResourceKind, Value};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn applied_function() -> AppliedResource {
        let mut properties = Properties::new();
        properties.insert("timeout".into(), Value::seconds(5));
        properties.insert("role".into(), Value::reference("Role", "arn"));
        properties.insert(
            "environment".into(),
            Value::string_map([("STATUS", "DONE"), ("SENDER", "")]),
        );
        AppliedResource {
            kind: ResourceKind::Function,
            fingerprint: "abc".into(),
            properties,
            outputs: Outputs::from([("arn".to_string(), Value::from("arn:aws:lambda:x"))]),
            depends_on: BTreeSet::from(["Role".to_string()]),
        }
    }

    #[test]
    fn test_missing_state_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let state = store.load("CommonLambdaStack").unwrap();
        assert_eq!(state.stack, "CommonLambdaStack");
        assert!(state.is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state"));

        let mut state = StackState::new("Stack");
        state.resources.insert("Fn".into(), applied_function());
        state.last_updated = Some(Utc::now());

        let path = store.save(&state).unwrap();
        assert!(path.ends_with("Stack.toml"));
        assert_eq!(store.load("Stack").unwrap(), state);
    }

    #[test]
    fn test_record_report_tracks_timestamps() {
        let mut report = ApplyReport::default();
        report.results.push(("Fn".into(), ApplyResult::Created));
        report.results.push(("Old".into(), ApplyResult::Deleted));
        report.applied.insert("Fn".into(), applied_function());

        let mut state = StackState::new("Stack");
        state.applied_at.insert("Old".into(), Utc::now());
        state.record_report(&report);

        assert!(state.applied_at.contains_key("Fn"));
        assert!(!state.applied_at.contains_key("Old"));
        assert_eq!(state.resources.len(), 1);
        assert!(state.last_updated.is_some());
    }

    #[test]
    fn test_path_sanitized_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        assert!(store.path_for("a/b c").ends_with("a_b_c.toml"));

        store.save(&StackState::new("gone")).unwrap();
        assert!(store.remove("gone").unwrap());
        assert!(!store.remove("gone").unwrap());
    }
}
