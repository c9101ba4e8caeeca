//! Core types for declarative resource graphs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Kind of infrastructure object a node declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Execution role assumed by functions
    Role,
    /// Notification topic
    Topic,
    /// Serverless function
    Function,
    /// Wiring that makes a function consume from a topic
    EventSubscription,
}

impl ResourceKind {
    /// All kinds, in declaration order
    pub const ALL: [Self; 4] = [
        Self::Role,
        Self::Topic,
        Self::Function,
        Self::EventSubscription,
    ];

    /// Stable lowercase name, used in targets and state files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Topic => "topic",
            Self::Function => "function",
            Self::EventSubscription => "event_subscription",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "role" | "roles" => Ok(Self::Role),
            "topic" | "topics" => Ok(Self::Topic),
            "function" | "functions" => Ok(Self::Function),
            "event_subscription" | "subscription" | "subscriptions" => {
                Ok(Self::EventSubscription)
            }
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// A deferred pointer to another node's output attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    /// Id of the referenced node
    pub node: String,
    /// Output attribute of the referenced node (e.g. "arn")
    pub attribute: String,
}

impl Reference {
    pub fn new(node: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.node, self.attribute)
    }
}

/// A property value: a literal or a reference to another node's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    /// Duration in whole seconds
    Duration(u64),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Reference(Reference),
}

impl Value {
    /// Build a reference value
    pub fn reference(node: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Reference(Reference::new(node, attribute))
    }

    /// Build a duration value from seconds
    pub fn seconds(secs: u64) -> Self {
        Self::Duration(secs)
    }

    /// Build a map value from string pairs
    pub fn string_map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Every reference contained in this value, including nested ones
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Self::Reference(r) => out.push(r),
            Self::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            Self::Map(map) => map.values().for_each(|v| v.collect_references(out)),
            _ => {}
        }
    }

    /// Whether the value contains no references at all
    pub fn is_literal(&self) -> bool {
        self.references().is_empty()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Self::String(s.clone())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Self::Reference(r)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Duration(secs) => write!(f, "{secs}s"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Reference(r) => write!(f, "{r}"),
        }
    }
}

/// Property bag of a node
pub type Properties = BTreeMap<String, Value>;

/// Output attributes reported by the apply engine for a materialized node
pub type Outputs = BTreeMap<String, Value>;

/// Fingerprint of a node's declared shape
///
/// BLAKE3 over the canonical JSON encoding of the kind and the declared
/// (unresolved) properties. `Properties` is a `BTreeMap`, so key order is
/// stable and equal declarations always hash the same.
pub fn fingerprint(kind: ResourceKind, properties: &Properties) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(&[0]);
    // Serializing a BTreeMap of plain data cannot fail
    let encoded = serde_json::to_vec(properties).unwrap_or_default();
    hasher.update(&encoded);
    hasher.finalize().to_hex().to_string()
}

/// Last-applied record of a node, as kept by the caller between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedResource {
    pub kind: ResourceKind,
    /// Fingerprint of the declaration that was applied
    pub fingerprint: String,
    /// Declared properties at apply time, kept for diff display
    #[serde(default)]
    pub properties: Properties,
    /// Outputs reported when the node was materialized
    #[serde(default)]
    pub outputs: Outputs,
    /// Dependencies at apply time, used to order deletes
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
}

/// Last-applied state of a whole stack, keyed by node id
pub type AppliedMap = BTreeMap<String, AppliedResource>;

/// Result of applying a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Node was materialized for the first time
    Created,
    /// Node was re-materialized with a changed declaration
    Updated,
    /// Node was removed
    Deleted,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// One-character marker used in progress output
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::NoChange => "○",
            Self::Created | Self::Updated | Self::Deleted => "✓",
            Self::Failed { .. } => "✗",
            Self::Skipped { .. } => "⊘",
        }
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of nodes processed
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted + self.skipped + self.failed + self.no_change
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Updated => self.updated += 1,
            ApplyResult::Deleted => self.deleted += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Maximum number of nodes materialized concurrently within a layer
    pub jobs: usize,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_references_are_found() {
        let value = Value::string_map([
            ("ROLE", Value::reference("Role", "arn")),
            ("STATUS", Value::from("DONE")),
        ]);
        let refs = value.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0], &Reference::new("Role", "arn"));
        assert!(!value.is_literal());
        assert!(Value::from("x").is_literal());
    }

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        let mut props = Properties::new();
        props.insert("timeout".into(), Value::seconds(5));
        let a = fingerprint(ResourceKind::Function, &props);
        let b = fingerprint(ResourceKind::Function, &props.clone());
        assert_eq!(a, b);

        props.insert("timeout".into(), Value::seconds(6));
        assert_ne!(a, fingerprint(ResourceKind::Function, &props));
        assert_ne!(
            fingerprint(ResourceKind::Topic, &Properties::new()),
            fingerprint(ResourceKind::Role, &Properties::new())
        );
    }

    #[test]
    fn test_kind_parsing_accepts_aliases() {
        assert_eq!("topics".parse::<ResourceKind>(), Ok(ResourceKind::Topic));
        assert_eq!(
            "subscription".parse::<ResourceKind>(),
            Ok(ResourceKind::EventSubscription)
        );
        assert!("bucket".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::seconds(5).to_string(), "5s");
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::reference("Role", "arn").to_string(), "${Role.arn}");
        assert_eq!(
            Value::from(vec!["a", "b"]).to_string(),
            "[\"a\", \"b\"]"
        );
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        summary.add_result(&ApplyResult::Created);
        summary.add_result(&ApplyResult::Failed {
            error: "boom".into(),
        });
        summary.add_result(&ApplyResult::NoChange);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.total_changes(), 1);
        assert!(!summary.is_success());
    }
}
