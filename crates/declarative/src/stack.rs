//! Stack assembly: pure declaration followed by an explicit freeze
//!
//! [`StackBuilder`] only records declarations. [`StackBuilder::freeze`]
//! registers every node, declares every edge, and computes the apply order.
//! The resulting [`Stack`] is immutable.

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::registry::Registry;
use crate::resource::{NodeHandle, ResourceNode};
use crate::types::Reference;
use serde::Serialize;
use std::fmt::Write as _;

/// Collects node declarations for a stack
#[derive(Debug, Clone)]
pub struct StackBuilder {
    name: String,
    nodes: Vec<ResourceNode>,
    explicit: Vec<(String, Reference)>,
}

impl StackBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            explicit: Vec::new(),
        }
    }

    /// Declare a node
    ///
    /// Nothing is validated here; duplicate ids and dangling references are
    /// reported by [`freeze`](Self::freeze).
    pub fn add(&mut self, node: ResourceNode) -> NodeHandle {
        let handle = NodeHandle::new(node.id(), node.kind());
        self.nodes.push(node);
        handle
    }

    /// Declare an edge that is not carried by a property value
    pub fn depends_on(&mut self, from: &NodeHandle, to: &NodeHandle, attribute: &str) {
        self.explicit
            .push((from.id().to_string(), Reference::new(to.id(), attribute)));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register all nodes, declare all references and compute the apply order
    pub fn freeze(self) -> Result<Stack> {
        let mut registry = Registry::new();
        for node in self.nodes {
            registry.register(node)?;
        }

        for id in registry.ids() {
            registry.declare_property_references(&id)?;
        }
        for (from, r) in &self.explicit {
            registry.declare_reference(from, &r.node, &r.attribute)?;
        }

        let graph = DependencyGraph::from_registry(&registry)?;
        let order = graph.topological_order()?;
        let layers = graph.layers()?;

        log::info!(
            "Froze stack {} ({} resources, {} layers)",
            self.name,
            registry.len(),
            layers.len()
        );

        Ok(Stack {
            name: self.name,
            registry,
            graph,
            order,
            layers,
        })
    }
}

/// A frozen stack with its dependency order
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    registry: Registry,
    graph: DependencyGraph,
    order: Vec<String>,
    layers: Vec<Vec<String>>,
}

/// Serializable view of a frozen stack
#[derive(Debug, Serialize)]
pub struct StackDocument<'a> {
    pub name: &'a str,
    pub resources: Vec<&'a ResourceNode>,
    pub apply_order: &'a [String],
}

impl Stack {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Nodes in registration order
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.registry.iter()
    }

    pub fn node(&self, id: &str) -> Result<&ResourceNode> {
        self.registry.get(id)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Node ids in topological apply order
    pub fn apply_order(&self) -> &[String] {
        &self.order
    }

    /// Layers of nodes with no dependencies among each other
    pub fn layers(&self) -> &[Vec<String>] {
        &self.layers
    }

    /// Nodes in topological apply order
    pub fn ordered_nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.order.iter().filter_map(|id| self.registry.get(id).ok())
    }

    pub fn document(&self) -> StackDocument<'_> {
        StackDocument {
            name: &self.name,
            resources: self.registry.iter().collect(),
            apply_order: &self.order,
        }
    }

    /// Render the dependency graph in Graphviz DOT format
    ///
    /// Edges point from a node to what it depends on.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", self.name);
        let _ = writeln!(out, "  rankdir=BT;");
        for node in self.registry.iter() {
            let _ = writeln!(
                out,
                "  \"{}\" [label=\"{}\\n({})\", shape={}];",
                node.id(),
                node.id(),
                node.kind(),
                dot_shape(node.kind())
            );
        }
        for (from, to) in self.graph.edges() {
            let _ = writeln!(out, "  \"{from}\" -> \"{to}\";");
        }
        out.push_str("}\n");
        out
    }
}

fn dot_shape(kind: crate::types::ResourceKind) -> &'static str {
    use crate::types::ResourceKind;
    match kind {
        ResourceKind::Role => "hexagon",
        ResourceKind::Topic => "cylinder",
        ResourceKind::Function => "box",
        ResourceKind::EventSubscription => "ellipse",
    }
}
