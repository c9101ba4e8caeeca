//! Execution planner - groups a frozen stack into apply layers

use crate::stack::Stack;
use crate::types::ResourceKind;
use std::collections::HashSet;

/// An execution plan: layers of node ids in dependency order
///
/// Every node in a layer depends only on nodes in earlier layers, so a
/// layer's nodes may be materialized concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub layers: Vec<Vec<String>>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan every node of a stack
    pub fn from_stack(stack: &Stack) -> Self {
        Self {
            layers: stack.layers().to_vec(),
        }
    }

    /// Keep only nodes matching a target pattern, plus what they depend on
    ///
    /// Target format: "kind", "kind.id" or a bare id. Ids match exactly.
    /// Dependencies are kept so that the filtered plan can still be applied
    /// on its own.
    pub fn filter_by_target(self, stack: &Stack, target: Option<&str>) -> Self {
        let Some(t) = target else {
            return self;
        };
        let (kind, name) = parse_target(t);

        let mut keep: HashSet<&str> = HashSet::new();
        for node in stack.nodes() {
            if matches_filter(node.id(), node.kind(), kind, name.as_deref()) {
                keep.extend(stack.graph().dependency_closure(node.id()));
            }
        }

        Self {
            layers: self
                .layers
                .into_iter()
                .map(|layer| {
                    layer
                        .into_iter()
                        .filter(|id| keep.contains(id.as_str()))
                        .collect::<Vec<_>>()
                })
                .filter(|layer| !layer.is_empty())
                .collect(),
        }
    }

    /// Total number of nodes in the plan
    pub fn total_resources(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Vec::is_empty)
    }

    /// Node ids in apply order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().flatten().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids().any(|i| i == id)
    }
}

/// Parse a target string like "kind.id" into (kind, id)
///
/// A first segment that is not a known kind is treated as an id filter.
fn parse_target(target: &str) -> (Option<ResourceKind>, Option<String>) {
    match target.split_once('.') {
        None => match target.parse::<ResourceKind>() {
            Ok(kind) => (Some(kind), None),
            Err(_) => (None, Some(target.to_string())),
        },
        Some((kind, name)) => match kind.parse::<ResourceKind>() {
            Ok(kind) => (Some(kind), Some(name.to_string())),
            Err(_) => (None, Some(target.to_string())),
        },
    }
}

/// Check if a node matches the filter criteria
fn matches_filter(
    id: &str,
    node_kind: ResourceKind,
    kind: Option<ResourceKind>,
    name: Option<&str>,
) -> bool {
    if let Some(k) = kind
        && k != node_kind
    {
        return false;
    }

    if let Some(n) = name
        && id != n
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceNode;
    use crate::stack::StackBuilder;

    fn stack() -> Stack {
        let mut builder = StackBuilder::new("Plan");
        let role = builder.add(ResourceNode::role("Role"));
        let done = builder.add(ResourceNode::topic("DoneTopic"));
        builder.add(ResourceNode::topic("FailTopic"));
        let f = builder.add(ResourceNode::function("NotifyDone").with_property("role", role.arn()));
        builder.add(
            ResourceNode::event_subscription("NotifyDoneSub")
                .with_property("topic", done.arn())
                .with_property("function", f.arn()),
        );
        builder.freeze().unwrap()
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("topic"), (Some(ResourceKind::Topic), None));
        assert_eq!(
            parse_target("function.NotifyDone"),
            (Some(ResourceKind::Function), Some("NotifyDone".to_string()))
        );
        assert_eq!(parse_target("DoneTopic"), (None, Some("DoneTopic".to_string())));
        assert_eq!(parse_target("a.b"), (None, Some("a.b".to_string())));
    }

    #[test]
    fn test_plan_from_stack() {
        let s = stack();
        let plan = ExecutionPlan::from_stack(&s);
        assert_eq!(plan.total_resources(), 5);
        assert_eq!(plan.layers.len(), 3);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_filter_keeps_dependencies() {
        let s = stack();
        let plan = ExecutionPlan::from_stack(&s).filter_by_target(&s, Some("function"));
        let ids: Vec<_> = plan.ids().collect();
        assert_eq!(ids, vec!["Role", "NotifyDone"]);

        let plan = ExecutionPlan::from_stack(&s).filter_by_target(&s, Some("subscription"));
        let ids: Vec<_> = plan.ids().collect();
        assert_eq!(ids, vec!["Role", "DoneTopic", "NotifyDone", "NotifyDoneSub"]);
        assert!(!plan.contains("FailTopic"));
    }

    #[test]
    fn test_filter_by_id_is_exact() {
        let s = stack();
        let plan = ExecutionPlan::from_stack(&s).filter_by_target(&s, Some("NotifyDone"));
        let ids: Vec<_> = plan.ids().collect();
        assert_eq!(ids, vec!["Role", "NotifyDone"]);
        assert!(!plan.contains("NotifyDoneSub"));

        let plan = ExecutionPlan::from_stack(&s).filter_by_target(&s, Some("Notify"));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_filter_without_match_is_empty() {
        let s = stack();
        let plan = ExecutionPlan::from_stack(&s).filter_by_target(&s, Some("role.Missing"));
        assert!(plan.is_empty());
    }
}
