//! Error types for the declarative crate

use thiserror::Error;

/// Errors raised while assembling or applying a resource graph
///
/// Graph construction errors are fatal to stack assembly: there is no
/// partial-graph recovery, the declaration has to be fixed and reassembled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A node with the same id is already registered
    #[error("duplicate resource id: {0}")]
    DuplicateId(String),

    /// No node with this id is registered
    #[error("resource not found: {0}")]
    NotFound(String),

    /// A reference points at a node that was never registered
    #[error("resource {from} references unknown resource {to} (attribute {attribute})")]
    UnknownReferenceTarget {
        from: String,
        to: String,
        attribute: String,
    },

    /// A node references one of its own attributes
    #[error("resource {node} references itself (attribute {attribute})")]
    SelfReference { node: String, attribute: String },

    /// A reference was resolved before its target reported the attribute
    #[error("cannot resolve {node}.{attribute}: {reason}")]
    UnresolvedDependency {
        node: String,
        attribute: String,
        reason: String,
    },

    /// The dependency relation contains a cycle
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// The apply engine failed to materialize a node
    #[error("failed to materialize {node}: {message}")]
    Materialization { node: String, message: String },
}

impl Error {
    /// Shorthand for an unresolved dependency whose target is not materialized
    pub(crate) fn not_materialized(node: &str, attribute: &str) -> Self {
        Self::UnresolvedDependency {
            node: node.to_string(),
            attribute: attribute.to_string(),
            reason: "resource has not been materialized".to_string(),
        }
    }

}

/// Result type for declarative operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = Error::CyclicDependency {
            cycle: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: A -> B -> A");
    }

}
