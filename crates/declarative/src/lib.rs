//! # Declarative
//!
//! A framework for declarative resource graphs.
//!
//! This crate provides the core abstractions for declaring infrastructure
//! resources, deriving the dependency graph between them from explicit
//! references, and applying them in a deterministic topological order.
//!
//! ## Core Concepts
//!
//! - **ResourceNode**: A typed, identified declaration with a property bag
//! - **Value / Reference**: Property values, possibly pointing at another
//!   node's output attribute
//! - **Registry**: Declared nodes in registration order, unique by id
//! - **Resolver**: Outputs of materialized nodes, used to resolve references
//! - **DependencyGraph**: Topological order, layers and cycle detection
//! - **StackBuilder / Stack**: Pure declaration, then an explicit freeze
//! - **Executor**: Applies a stack layer by layer through a [`Materializer`]
//!
//! ## Example
//!
//! ```
//! use declarative::{ResourceNode, StackBuilder, Value};
//!
//! let mut builder = StackBuilder::new("Notifications");
//! let role = builder.add(ResourceNode::role("ExecutionRole"));
//! let topic = builder.add(ResourceNode::topic("DoneTopic"));
//! let function = builder.add(
//!     ResourceNode::function("NotifyDone")
//!         .with_property("role", role.arn())
//!         .with_property("timeout", Value::seconds(5)),
//! );
//! builder.add(
//!     ResourceNode::event_subscription("NotifyDoneSubscription")
//!         .with_property("topic", topic.arn())
//!         .with_property("function", function.arn()),
//! );
//!
//! let stack = builder.freeze()?;
//! assert_eq!(
//!     stack.apply_order(),
//!     ["ExecutionRole", "DoneTopic", "NotifyDone", "NotifyDoneSubscription"]
//! );
//! # Ok::<(), declarative::Error>(())
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`Materializer`]: The apply engine that makes nodes exist
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific cloud backends, UI frameworks, etc.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod planner;
pub mod registry;
pub mod resolver;
pub mod resource;
pub mod stack;
pub mod types;

// Re-export main types at crate root
pub use context::{
    AutoConfirm, AutoDecline, ConfirmCallback, MaterializeRequest, Materializer, NoProgress,
    ProgressCallback,
};
pub use diff::{
    ChangeKind, DiffSummary, ResourceDiff, compute_diffs, deletion_order, group_by_kind,
};
pub use error::{Error, Result};
pub use executor::{ApplyReport, destroy, execute, execute_simple};
pub use graph::DependencyGraph;
pub use planner::ExecutionPlan;
pub use registry::Registry;
pub use resolver::Resolver;
pub use resource::{NodeHandle, ResourceNode};
pub use stack::{Stack, StackBuilder, StackDocument};
pub use types::{
    AppliedMap, AppliedResource, ApplyResult, ExecuteOptions, ExecuteSummary, Outputs, Properties,
    Reference, ResourceKind, Value, fingerprint,
};
