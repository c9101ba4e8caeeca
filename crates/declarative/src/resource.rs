//! Resource nodes: typed, identified declarations of infrastructure objects
//!
//! A node is a pure in-memory description. Building one has no side
//! effects; registration and edge derivation happen when a stack is frozen.

use crate::types::{Properties, Reference, ResourceKind, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A declared infrastructure object
///
/// # Example
///
/// ```
/// use declarative::{ResourceNode, Value};
///
/// let function = ResourceNode::function("NotifyDoneFunction")
///     .with_property("handler", "notify.handler")
///     .with_property("timeout", Value::seconds(5))
///     .with_property("role", Value::reference("ExecutionRole", "arn"));
///
/// assert_eq!(function.references().len(), 1);
/// assert!(function.depends_on().is_empty()); // derived at freeze time
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    id: String,
    kind: ResourceKind,
    #[serde(default)]
    properties: Properties,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    depends_on: BTreeSet<String>,
}

impl ResourceNode {
    /// Create a node with an empty property bag
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            properties: Properties::new(),
            depends_on: BTreeSet::new(),
        }
    }

    pub fn role(id: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::Role)
    }

    pub fn topic(id: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::Topic)
    }

    pub fn function(id: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::Function)
    }

    pub fn event_subscription(id: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::EventSubscription)
    }

    /// Set a property, replacing any previous value under the same key
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Ids of the nodes this one must be applied after
    ///
    /// Empty until the node is registered and its references declared.
    pub fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    /// Every reference found in the property bag, in key order
    pub fn references(&self) -> Vec<&Reference> {
        self.properties
            .values()
            .flat_map(Value::references)
            .collect()
    }

    /// Human-readable description, e.g. "function NotifyDoneFunction"
    pub fn description(&self) -> String {
        format!("{} {}", self.kind, self.id)
    }

    pub(crate) fn add_dependency(&mut self, id: &str) -> bool {
        self.depends_on.insert(id.to_string())
    }

    pub(crate) fn clear_dependencies(&mut self) {
        self.depends_on.clear();
    }
}

/// Handle returned on registration, used to point at a node's outputs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    id: String,
    kind: ResourceKind,
}

impl NodeHandle {
    pub(crate) fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Reference to one of this node's output attributes
    pub fn attr(&self, attribute: &str) -> Value {
        Value::reference(self.id.clone(), attribute)
    }

    /// Reference to this node's ARN
    pub fn arn(&self) -> Value {
        self.attr("arn")
    }
}
