//! Dependency graph and topological apply order
//!
//! The order is computed by depth-first search with a recursion-stack
//! membership check for cycles. Roots are visited in registration order and
//! each node's dependencies are visited in registration order too, so the
//! same declaration always yields the same order.

use crate::error::{Error, Result};
use crate::registry::Registry;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Directed graph of `depends_on` edges between nodes
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    ids: Vec<String>,
    /// deps[i] holds the indices node i depends on, sorted by registration
    deps: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph from a registry's nodes and their declared edges
    pub fn from_registry(registry: &Registry) -> Result<Self> {
        Self::from_edges(
            registry
                .iter()
                .map(|n| (n.id().to_string(), n.depends_on().iter().cloned().collect())),
        )
    }

    /// Build the graph from `(id, dependencies)` pairs given in registration order
    ///
    /// Fails with [`Error::UnknownReferenceTarget`] if a dependency names an id
    /// that is not part of the input.
    pub fn from_edges<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let entries: Vec<(String, Vec<String>)> = entries.into_iter().collect();
        let index: HashMap<&str, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id.as_str(), i))
            .collect();

        let mut deps = Vec::with_capacity(entries.len());
        for (id, targets) in &entries {
            let mut resolved = Vec::with_capacity(targets.len());
            for target in targets {
                let &j = index
                    .get(target.as_str())
                    .ok_or_else(|| Error::UnknownReferenceTarget {
                        from: id.clone(),
                        to: target.clone(),
                        attribute: String::new(),
                    })?;
                resolved.push(j);
            }
            resolved.sort_unstable();
            resolved.dedup();
            deps.push(resolved);
        }

        Ok(Self {
            ids: entries.into_iter().map(|(id, _)| id).collect(),
            deps,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Compute an order where every node comes after all nodes it depends on
    ///
    /// Depth-first: roots are taken in registration order and each node's
    /// dependencies are emitted before it, so `A -> C, B, C` orders as
    /// `C, A, B`.
    ///
    /// Fails with [`Error::CyclicDependency`] carrying the cycle's id sequence;
    /// no partial order is ever returned.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        Ok(self
            .topological_indices()?
            .into_iter()
            .map(|i| self.ids[i].clone())
            .collect())
    }

    fn topological_indices(&self) -> Result<Vec<usize>> {
        let mut marks = vec![Mark::Unvisited; self.ids.len()];
        let mut path = Vec::new();
        let mut order = Vec::with_capacity(self.ids.len());

        for root in 0..self.ids.len() {
            if marks[root] == Mark::Unvisited {
                self.visit(root, &mut marks, &mut path, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<()> {
        marks[node] = Mark::Visiting;
        path.push(node);

        for &dep in &self.deps[node] {
            match marks[dep] {
                Mark::Done => {}
                Mark::Unvisited => self.visit(dep, marks, path, order)?,
                Mark::Visiting => return Err(self.cycle_error(path, dep)),
            }
        }

        path.pop();
        marks[node] = Mark::Done;
        order.push(node);
        Ok(())
    }

    /// The cycle is the tail of the recursion stack starting at `closing`,
    /// reported in reference direction and closed with its first id
    fn cycle_error(&self, path: &[usize], closing: usize) -> Error {
        let start = path.iter().position(|&i| i == closing).unwrap_or(0);
        let mut cycle: Vec<String> = path[start..]
            .iter()
            .map(|&i| self.ids[i].clone())
            .collect();
        cycle.push(self.ids[closing].clone());
        Error::CyclicDependency { cycle }
    }

    /// Group nodes into layers that can be applied concurrently
    ///
    /// A node's layer is one more than the deepest layer among its
    /// dependencies. Nodes inside a layer never depend on each other and are
    /// listed in registration order.
    pub fn layers(&self) -> Result<Vec<Vec<String>>> {
        let order = self.topological_indices()?;
        let mut depth = vec![0usize; self.ids.len()];
        for &i in &order {
            depth[i] = self.deps[i]
                .iter()
                .map(|&d| depth[d] + 1)
                .max()
                .unwrap_or(0);
        }

        let layer_count = depth.iter().max().map_or(0, |d| d + 1);
        let mut layers = vec![Vec::new(); layer_count];
        for (i, id) in self.ids.iter().enumerate() {
            layers[depth[i]].push(id.clone());
        }
        Ok(layers)
    }

    /// Ids a node depends on directly
    pub fn dependencies(&self, id: &str) -> Vec<&str> {
        self.position(id)
            .map(|i| self.deps[i].iter().map(|&d| self.ids[d].as_str()).collect())
            .unwrap_or_default()
    }

    /// Ids that depend on a node directly, in registration order
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        let Some(target) = self.position(id) else {
            return Vec::new();
        };
        self.deps
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.contains(&target))
            .map(|(i, _)| self.ids[i].as_str())
            .collect()
    }

    /// A node and everything it transitively depends on
    pub fn dependency_closure(&self, id: &str) -> Vec<&str> {
        let Some(start) = self.position(id) else {
            return Vec::new();
        };
        let mut seen = vec![false; self.ids.len()];
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            if seen[i] {
                continue;
            }
            seen[i] = true;
            stack.extend(self.deps[i].iter().copied());
        }
        self.ids
            .iter()
            .enumerate()
            .filter(|(i, _)| seen[*i])
            .map(|(_, id)| id.as_str())
            .collect()
    }

    /// All `(from, to)` edges in registration order
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.deps
            .iter()
            .enumerate()
            .flat_map(|(i, deps)| {
                deps.iter()
                    .map(move |&d| (self.ids[i].as_str(), self.ids[d].as_str()))
            })
            .collect()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|i| i == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(entries: &[(&str, &[&str])]) -> DependencyGraph {
        DependencyGraph::from_edges(entries.iter().map(|(id, deps)| {
            (
                (*id).to_string(),
                deps.iter().map(|d| (*d).to_string()).collect(),
            )
        }))
        .unwrap()
    }

    fn assert_valid_order(g: &DependencyGraph, order: &[String]) {
        assert_eq!(order.len(), g.len());
        for (i, id) in order.iter().enumerate() {
            for dep in g.dependencies(id) {
                let pos = order.iter().position(|o| o == dep).unwrap();
                assert!(pos < i, "{dep} must come before {id}");
            }
        }
    }

    #[test]
    fn test_order_respects_dependencies() {
        let g = graph(&[
            ("Sub", &["Fn", "Topic"]),
            ("Fn", &["Role"]),
            ("Topic", &[]),
            ("Role", &[]),
        ]);
        let order = g.topological_order().unwrap();
        assert_valid_order(&g, &order);
        assert_eq!(order, vec!["Role", "Fn", "Topic", "Sub"]);
    }

    #[test]
    fn test_order_is_depth_first_from_roots() {
        let g = graph(&[("A", &["C"]), ("B", &[]), ("C", &[])]);
        assert_eq!(g.topological_order().unwrap(), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_order_is_deterministic() {
        let entries: &[(&str, &[&str])] = &[
            ("Role", &[]),
            ("TopicA", &[]),
            ("FnA", &["Role"]),
            ("TopicB", &[]),
            ("FnB", &["Role"]),
        ];
        let first = graph(entries).topological_order().unwrap();
        let second = graph(entries).topological_order().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec!["Role", "TopicA", "FnA", "TopicB", "FnB"]);
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"]), ("D", &[])]);
        let err = g.topological_order().unwrap_err();
        assert_eq!(
            err,
            Error::CyclicDependency {
                cycle: vec!["A".into(), "B".into(), "C".into(), "A".into()]
            }
        );
        assert!(g.layers().is_err());
    }

    #[test]
    fn test_cycle_not_reachable_from_first_root() {
        let g = graph(&[("Ok", &[]), ("X", &["Y"]), ("Y", &["X"])]);
        assert!(matches!(
            g.topological_order(),
            Err(Error::CyclicDependency { cycle }) if cycle == vec!["X", "Y", "X"]
        ));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let result = DependencyGraph::from_edges(vec![("A".to_string(), vec!["Z".to_string()])]);
        assert!(matches!(result, Err(Error::UnknownReferenceTarget { .. })));
    }

    #[test]
    fn test_layers_group_independent_nodes() {
        let g = graph(&[
            ("Role", &[]),
            ("DoneTopic", &[]),
            ("FailTopic", &[]),
            ("DoneFn", &["Role"]),
            ("FailFn", &["Role"]),
            ("DoneSub", &["DoneFn", "DoneTopic"]),
            ("FailSub", &["FailFn", "FailTopic"]),
        ]);
        let layers = g.layers().unwrap();
        assert_eq!(
            layers,
            vec![
                vec!["Role", "DoneTopic", "FailTopic"],
                vec!["DoneFn", "FailFn"],
                vec!["DoneSub", "FailSub"],
            ]
        );
    }

    #[test]
    fn test_dependents_and_closure() {
        let g = graph(&[("Role", &[]), ("FnA", &["Role"]), ("FnB", &["Role"]), ("Sub", &["FnA"])]);
        assert_eq!(g.dependents("Role"), vec!["FnA", "FnB"]);
        assert_eq!(g.dependency_closure("Sub"), vec!["Role", "FnA", "Sub"]);
        assert_eq!(g.edges().len(), 3);
        assert!(g.dependents("Missing").is_empty());
    }

    #[test]
    fn test_empty_graph() {
        let g = graph(&[]);
        assert!(g.topological_order().unwrap().is_empty());
        assert!(g.layers().unwrap().is_empty());
    }
}
