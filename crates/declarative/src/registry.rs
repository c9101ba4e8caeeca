//! Resource node registry

use crate::error::{Error, Result};
use crate::resource::{NodeHandle, ResourceNode};
use std::collections::HashMap;

/// The set of declared nodes, in registration order
///
/// Registration order is kept so that topological sorting can break ties
/// deterministically.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    nodes: Vec<ResourceNode>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node
    ///
    /// Fails with [`Error::DuplicateId`] if the id is already taken, in which
    /// case the registry is left unchanged. Dependencies carried by the node
    /// are discarded; edges are only created through `declare_reference`.
    pub fn register(&mut self, mut node: ResourceNode) -> Result<NodeHandle> {
        if self.index.contains_key(node.id()) {
            return Err(Error::DuplicateId(node.id().to_string()));
        }

        node.clear_dependencies();
        let handle = NodeHandle::new(node.id(), node.kind());
        log::debug!("Registered {}", node.description());

        self.index.insert(node.id().to_string(), self.nodes.len());
        self.nodes.push(node);
        Ok(handle)
    }

    /// Look up a node by id
    pub fn get(&self, id: &str) -> Result<&ResourceNode> {
        self.index
            .get(id)
            .map(|&i| &self.nodes[i])
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Result<&mut ResourceNode> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.nodes[i]),
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Registration position of a node
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter()
    }

    /// Node ids in registration order
    pub fn ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.id().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;

    #[test]
    fn test_register_and_get() {
        let mut registry = Registry::new();
        let handle = registry.register(ResourceNode::role("R")).unwrap();
        assert_eq!(handle.id(), "R");
        assert_eq!(handle.kind(), ResourceKind::Role);
        assert_eq!(registry.get("R").unwrap().kind(), ResourceKind::Role);
    }

    #[test]
    fn test_duplicate_id_leaves_registry_unchanged() {
        let mut registry = Registry::new();
        registry
            .register(ResourceNode::role("R").with_property("path", "/"))
            .unwrap();

        let err = registry
            .register(ResourceNode::role("R").with_property("path", "/other"))
            .unwrap_err();

        assert_eq!(err, Error::DuplicateId("R".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("R").unwrap().property("path"),
            Some(&"/".into())
        );
    }

    #[test]
    fn test_get_missing_fails() {
        let registry = Registry::new();
        assert_eq!(
            registry.get("nope").unwrap_err(),
            Error::NotFound("nope".into())
        );
    }

    #[test]
    fn test_registration_order_retained() {
        let mut registry = Registry::new();
        for id in ["b", "a", "c"] {
            registry.register(ResourceNode::topic(id)).unwrap();
        }
        assert_eq!(registry.ids(), vec!["b", "a", "c"]);
        assert_eq!(registry.position("a"), Some(1));
    }
}
