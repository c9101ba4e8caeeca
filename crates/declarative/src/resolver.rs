//! Reference declaration and resolution
//!
//! Edges are declared explicitly against the registry. Values are resolved
//! from a cache that the apply engine fills as nodes are materialized.

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::resource::ResourceNode;
use crate::types::{Outputs, Properties, Reference, Value};
use std::collections::HashMap;

impl Registry {
    /// Declare that `from` reads `attribute` from `to`
    ///
    /// Adds the edge `from -> to` to the dependency graph. Declaring the same
    /// edge twice is harmless.
    pub fn declare_reference(&mut self, from: &str, to: &str, attribute: &str) -> Result<Reference> {
        if !self.contains(from) {
            return Err(Error::NotFound(from.to_string()));
        }
        if !self.contains(to) {
            return Err(Error::UnknownReferenceTarget {
                from: from.to_string(),
                to: to.to_string(),
                attribute: attribute.to_string(),
            });
        }
        if from == to {
            return Err(Error::SelfReference {
                node: from.to_string(),
                attribute: attribute.to_string(),
            });
        }

        if self.get_mut(from)?.add_dependency(to) {
            log::debug!("Edge {from} -> {to} ({attribute})");
        }
        Ok(Reference::new(to, attribute))
    }

    /// Declare an edge for every reference found in a node's properties
    pub fn declare_property_references(&mut self, id: &str) -> Result<()> {
        let refs: Vec<Reference> = self.get(id)?.references().into_iter().cloned().collect();
        for r in refs {
            self.declare_reference(id, &r.node, &r.attribute)?;
        }
        Ok(())
    }
}

/// Cache of materialized outputs, keyed by node id then attribute
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    materialized: HashMap<String, Outputs>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a node was materialized with the given outputs
    pub fn record_materialized(&mut self, id: &str, outputs: Outputs) {
        log::debug!("Materialized {id} ({} outputs)", outputs.len());
        self.materialized.insert(id.to_string(), outputs);
    }

    pub fn is_materialized(&self, id: &str) -> bool {
        self.materialized.contains_key(id)
    }

    /// Resolve one output attribute of a materialized node
    pub fn resolve(&self, node_id: &str, attribute: &str) -> Result<Value> {
        let outputs = self
            .materialized
            .get(node_id)
            .ok_or_else(|| Error::not_materialized(node_id, attribute))?;

        outputs
            .get(attribute)
            .cloned()
            .ok_or_else(|| Error::UnresolvedDependency {
                node: node_id.to_string(),
                attribute: attribute.to_string(),
                reason: "resource did not report this attribute".to_string(),
            })
    }

    /// Substitute every reference in a value, recursively
    pub fn resolve_value(&self, value: &Value) -> Result<Value> {
        Ok(match value {
            Value::Reference(r) => self.resolve(&r.node, &r.attribute)?,
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|v| self.resolve_value(v))
                    .collect::<Result<_>>()?,
            ),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve_value(v)?)))
                    .collect::<Result<_>>()?,
            ),
            literal => literal.clone(),
        })
    }

    /// Resolve a node's whole property bag into literals
    pub fn resolve_properties(&self, node: &ResourceNode) -> Result<Properties> {
        node.properties()
            .iter()
            .map(|(k, v)| Ok((k.clone(), self.resolve_value(v)?)))
            .collect()
    }

    /// First dependency of `node` that has not been materialized yet
    pub fn missing_dependency<'a>(&self, node: &'a ResourceNode) -> Option<&'a str> {
        node.depends_on()
            .iter()
            .map(String::as_str)
            .find(|d| !self.is_materialized(d))
    }
}
