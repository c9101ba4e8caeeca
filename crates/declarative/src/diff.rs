//! Diff computation between a frozen stack and its last-applied state

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::stack::Stack;
use crate::types::{fingerprint, AppliedMap, Properties, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What apply has to do for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// A diff between the applied and the declared state of a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Unique identifier of the node
    pub resource_id: String,
    /// Kind of the node (the declared kind, or the recorded one for deletes)
    pub kind: ResourceKind,
    pub change: ChangeKind,
    /// Human-readable description
    pub description: String,
    /// Declared properties at last apply
    pub current: Option<Properties>,
    /// Declared properties now
    pub desired: Option<Properties>,
}

impl ResourceDiff {
    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        self.change == ChangeKind::Create
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        self.change == ChangeKind::Delete
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        self.change == ChangeKind::Update
    }
}

/// Compute the changes needed to converge `applied` to `stack`
///
/// Creates and updates come first, in topological apply order. Deletes
/// follow, dependents before the nodes they depend on. Nodes whose
/// declaration is unchanged are omitted.
///
/// Fingerprints cover declared properties with references unresolved, so a
/// dependency re-materialized with new outputs does not mark its dependents
/// as updated.
pub fn compute_diffs(stack: &Stack, applied: &AppliedMap) -> Result<Vec<ResourceDiff>> {
    let mut diffs = Vec::new();

    for node in stack.ordered_nodes() {
        let desired = node.properties();
        let change = match applied.get(node.id()) {
            None => Some(ChangeKind::Create),
            Some(prev)
                if prev.kind != node.kind()
                    || prev.fingerprint != fingerprint(node.kind(), desired) =>
            {
                Some(ChangeKind::Update)
            }
            Some(_) => None,
        };

        if let Some(change) = change {
            diffs.push(ResourceDiff {
                resource_id: node.id().to_string(),
                kind: node.kind(),
                change,
                description: node.description(),
                current: applied.get(node.id()).map(|p| p.properties.clone()),
                desired: Some(desired.clone()),
            });
        }
    }

    let removed: Vec<&str> = applied
        .keys()
        .map(String::as_str)
        .filter(|id| !stack.registry().contains(id))
        .collect();

    for id in deletion_order(applied, &removed)? {
        let prev = &applied[&id];
        diffs.push(ResourceDiff {
            description: format!("{} {}", prev.kind, id),
            resource_id: id,
            kind: prev.kind,
            change: ChangeKind::Delete,
            current: Some(prev.properties.clone()),
            desired: None,
        });
    }

    Ok(diffs)
}

/// Order applied nodes for deletion, dependents first
///
/// Uses the dependencies recorded at apply time. Dependencies outside `ids`
/// are ignored, as they are not being deleted.
pub fn deletion_order(applied: &AppliedMap, ids: &[&str]) -> Result<Vec<String>> {
    let entries = ids.iter().filter_map(|id| {
        applied.get(*id).map(|prev| {
            let deps = prev
                .depends_on
                .iter()
                .filter(|d| ids.contains(&d.as_str()))
                .cloned()
                .collect();
            ((*id).to_string(), deps)
        })
    });

    let mut order = DependencyGraph::from_edges(entries)?.topological_order()?;
    order.reverse();
    Ok(order)
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of nodes to create
    pub additions: usize,
    /// Number of nodes to update
    pub updates: usize,
    /// Number of nodes to delete
    pub removals: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.change {
                ChangeKind::Create => summary.additions += 1,
                ChangeKind::Update => summary.updates += 1,
                ChangeKind::Delete => summary.removals += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.updates + self.removals
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource kind
pub fn group_by_kind(diffs: &[ResourceDiff]) -> HashMap<ResourceKind, Vec<&ResourceDiff>> {
    let mut groups: HashMap<ResourceKind, Vec<&ResourceDiff>> = HashMap::new();
    for diff in diffs {
        groups.entry(diff.kind).or_default().push(diff);
    }
    groups
}
