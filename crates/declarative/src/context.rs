//! Apply engine boundary and callback traits
//!
//! These traits allow the declarative crate to drive any provisioning
//! backend, progress display or confirmation prompt without depending on a
//! specific implementation.

use crate::types::{ApplyResult, Outputs, Properties, ResourceKind};
use anyhow::Result;

/// Everything a backend needs to materialize one node
#[derive(Debug, Clone, Copy)]
pub struct MaterializeRequest<'a> {
    /// Name of the stack the node belongs to
    pub stack: &'a str,
    /// Node id
    pub id: &'a str,
    pub kind: ResourceKind,
    /// Property bag with every reference already substituted
    pub properties: &'a Properties,
    /// Outputs from the previous apply, when the node is being updated
    pub previous: Option<&'a Outputs>,
}

impl MaterializeRequest<'_> {
    /// Whether this request updates an existing node
    pub fn is_update(&self) -> bool {
        self.previous.is_some()
    }
}

/// The external apply engine
///
/// Implementations perform the actual provisioning calls. Errors are opaque
/// to the core and reported per node.
pub trait Materializer: Send + Sync {
    /// Cause the node to exist with the given properties and report its outputs
    fn materialize(&self, request: &MaterializeRequest<'_>) -> Result<Outputs>;

    /// Remove a previously materialized node
    fn destroy(&self, id: &str, kind: ResourceKind, outputs: &Outputs) -> Result<()>;
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting a layer of independent nodes
    fn on_layer_start(&mut self, index: usize, count: usize);

    /// Called when starting to apply a single node
    fn on_resource_start(&mut self, id: &str, description: &str);

    /// Called when a node application completes
    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult);

    /// Called when a layer completes
    fn on_layer_complete(&mut self);
}

/// Confirmation callback for user interaction
///
/// Implement this trait to handle user confirmations.
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_layer_start(&mut self, _index: usize, _count: usize) {}
    fn on_resource_start(&mut self, _id: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _id: &str, _result: &ApplyResult) {}
    fn on_layer_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}
