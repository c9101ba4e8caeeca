//! Execution engine - applies a frozen stack layer by layer
//!
//! Nodes of one layer are materialized concurrently on a bounded rayon pool.
//! A layer only starts once every earlier layer has been fully recorded, and
//! each node is checked for readiness before it is handed to the backend.
//! The first failing layer halts the run; what was materialized and what was
//! not is reported back so the caller can decide on retry or rollback.

use crate::context::{ConfirmCallback, MaterializeRequest, Materializer, ProgressCallback};
use crate::diff::{ChangeKind, ResourceDiff, compute_diffs, deletion_order};
use crate::error::Error;
use crate::planner::ExecutionPlan;
use crate::resolver::Resolver;
use crate::resource::ResourceNode;
use crate::stack::Stack;
use crate::types::{
    AppliedMap, AppliedResource, ApplyResult, ExecuteOptions, ExecuteSummary, Outputs, Properties,
    fingerprint,
};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::HashMap;

/// Outcome of an apply or destroy run
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    /// Per-node results in processing order
    pub results: Vec<(String, ApplyResult)>,
    /// Declared nodes that are materialized after the run
    pub materialized: Vec<String>,
    /// Declared nodes that are not materialized after the run
    pub pending: Vec<String>,
    /// Nodes that failed, with the backend's error message
    pub failed: Vec<(String, String)>,
    pub summary: ExecuteSummary,
    /// Applied state after the run, to be persisted by the caller
    pub applied: AppliedMap,
}

impl ApplyReport {
    fn record(&mut self, id: &str, result: ApplyResult) {
        if let ApplyResult::Failed { error } = &result {
            self.failed.push((id.to_string(), error.clone()));
        }
        self.summary.add_result(&result);
        self.results.push((id.to_string(), result));
    }

    /// Whether every declared node ended up materialized without failures
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.pending.is_empty()
    }

    /// The first failure, as a core error
    pub fn first_error(&self) -> Option<Error> {
        self.failed.first().map(|(node, message)| Error::Materialization {
            node: node.clone(),
            message: message.clone(),
        })
    }

    pub fn result_for(&self, id: &str) -> Option<&ApplyResult> {
        self.results.iter().find(|(i, _)| i == id).map(|(_, r)| r)
    }

    fn finish(mut self, stack: &Stack) -> Self {
        let (materialized, pending): (Vec<String>, Vec<String>) = stack
            .apply_order()
            .iter()
            .cloned()
            .partition(|id| self.applied.contains_key(id));
        self.materialized = materialized;
        self.pending = pending;
        self
    }
}

/// A node prepared for materialization
struct Prepared<'a> {
    node: &'a ResourceNode,
    change: ChangeKind,
    properties: Properties,
}

/// Apply a plan against the last-applied state
///
/// # Arguments
/// * `stack` - The frozen stack
/// * `plan` - Layers to apply (possibly filtered to a target)
/// * `applied` - Last-applied state of the stack
/// * `opts` - Execution options (dry_run, jobs, verbose)
/// * `materializer` - The apply engine backend
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
///
/// # Returns
/// A report with per-node results and the new applied state. Backend
/// failures are reported in the report, not as an `Err`.
pub fn execute<M, P, C>(
    stack: &Stack,
    plan: &ExecutionPlan,
    applied: &AppliedMap,
    opts: &ExecuteOptions,
    materializer: &M,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ApplyReport>
where
    M: Materializer,
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let full_plan = plan.total_resources() == stack.len();
    let diffs: Vec<ResourceDiff> = compute_diffs(stack, applied)?
        .into_iter()
        .filter(|d| plan.contains(&d.resource_id) || (full_plan && d.is_removal()))
        .collect();
    let changes: HashMap<&str, ChangeKind> = diffs
        .iter()
        .map(|d| (d.resource_id.as_str(), d.change))
        .collect();

    let mut report = ApplyReport {
        applied: applied.clone(),
        ..Default::default()
    };

    if diffs.is_empty() {
        for id in plan.ids() {
            report.record(id, ApplyResult::NoChange);
        }
        return Ok(report.finish(stack));
    }

    // Confirm before proceeding (unless dry_run)
    if !opts.dry_run && !confirm.confirm("Apply changes?")? {
        for diff in &diffs {
            report.record(
                &diff.resource_id,
                ApplyResult::Skipped {
                    reason: "Declined".into(),
                },
            );
        }
        return Ok(report.finish(stack));
    }

    if opts.dry_run {
        for diff in &diffs {
            report.record(
                &diff.resource_id,
                ApplyResult::Skipped {
                    reason: "Dry run".into(),
                },
            );
        }
        return Ok(report.finish(stack));
    }

    let mut resolver = Resolver::new();
    for (id, prev) in applied {
        if stack.registry().contains(id) {
            resolver.record_materialized(id, prev.outputs.clone());
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create apply thread pool: {}", e))?;

    let mut halted = false;
    for (index, layer) in plan.layers.iter().enumerate() {
        if halted {
            for id in layer.iter().filter(|id| changes.contains_key(id.as_str())) {
                report.record(
                    id,
                    ApplyResult::Skipped {
                        reason: "Blocked by an earlier failure".into(),
                    },
                );
            }
            continue;
        }

        let mut batch = Vec::new();
        for id in layer {
            let Some(&change) = changes.get(id.as_str()) else {
                report.record(id, ApplyResult::NoChange);
                continue;
            };
            let node = stack.node(id)?;
            match prepare(node, change, &resolver) {
                Ok(prepared) => batch.push(prepared),
                Err(e) => {
                    log::warn!("{} is not ready: {}", id, e);
                    report.record(id, ApplyResult::Failed { error: e.to_string() });
                    halted = true;
                }
            }
        }

        if batch.is_empty() {
            continue;
        }

        progress.on_layer_start(index, batch.len());
        for p in &batch {
            progress.on_resource_start(p.node.id(), &p.node.description());
            if opts.verbose {
                log::info!("Materializing {} with {:?}", p.node.id(), p.properties);
            }
        }

        let outcomes = materialize_batch(stack.name(), &batch, applied, materializer, &pool);

        for (prepared, outcome) in batch.iter().zip(outcomes) {
            let id = prepared.node.id();
            let result = match outcome {
                Ok(outputs) => {
                    resolver.record_materialized(id, outputs.clone());
                    report.applied.insert(
                        id.to_string(),
                        AppliedResource {
                            kind: prepared.node.kind(),
                            fingerprint: fingerprint(
                                prepared.node.kind(),
                                prepared.node.properties(),
                            ),
                            properties: prepared.node.properties().clone(),
                            outputs,
                            depends_on: prepared.node.depends_on().clone(),
                        },
                    );
                    match prepared.change {
                        ChangeKind::Update => ApplyResult::Updated,
                        _ => ApplyResult::Created,
                    }
                }
                Err(e) => {
                    log::warn!("Failed to materialize {}: {:#}", id, e);
                    halted = true;
                    ApplyResult::Failed {
                        error: format!("{e:#}"),
                    }
                }
            };
            progress.on_resource_complete(id, &result);
            report.record(id, result);
        }
        progress.on_layer_complete();
    }

    let deletes: Vec<&ResourceDiff> = diffs.iter().filter(|d| d.is_removal()).collect();
    if !deletes.is_empty() {
        if halted {
            for diff in deletes {
                report.record(
                    &diff.resource_id,
                    ApplyResult::Skipped {
                        reason: "Blocked by an earlier failure".into(),
                    },
                );
            }
        } else {
            let ids: Vec<&str> = deletes.iter().map(|d| d.resource_id.as_str()).collect();
            destroy_in_order(&ids, &mut report, materializer, progress);
        }
    }

    log::info!(
        "Apply of {} finished: {} created, {} updated, {} deleted, {} failed",
        stack.name(),
        report.summary.created,
        report.summary.updated,
        report.summary.deleted,
        report.summary.failed
    );

    Ok(report.finish(stack))
}

/// Check readiness and resolve a node's properties
fn prepare<'a>(
    node: &'a ResourceNode,
    change: ChangeKind,
    resolver: &Resolver,
) -> crate::error::Result<Prepared<'a>> {
    if let Some(missing) = resolver.missing_dependency(node) {
        return Err(Error::UnresolvedDependency {
            node: missing.to_string(),
            attribute: String::new(),
            reason: format!("{} depends on it and it has not been materialized", node.id()),
        });
    }

    Ok(Prepared {
        node,
        change,
        properties: resolver.resolve_properties(node)?,
    })
}

/// Materialize a batch of independent nodes
fn materialize_batch<M: Materializer>(
    stack: &str,
    batch: &[Prepared<'_>],
    applied: &AppliedMap,
    materializer: &M,
    pool: &rayon::ThreadPool,
) -> Vec<Result<Outputs>> {
    let run = |p: &Prepared<'_>| {
        let request = MaterializeRequest {
            stack,
            id: p.node.id(),
            kind: p.node.kind(),
            properties: &p.properties,
            previous: applied.get(p.node.id()).map(|prev| &prev.outputs),
        };
        materializer.materialize(&request)
    };

    if pool.current_num_threads() == 1 || batch.len() == 1 {
        batch.iter().map(run).collect()
    } else {
        pool.install(|| batch.par_iter().map(run).collect())
    }
}

/// Destroy nodes one at a time, stopping at the first failure
fn destroy_in_order<M, P>(
    ids: &[&str],
    report: &mut ApplyReport,
    materializer: &M,
    progress: &mut P,
) where
    M: Materializer,
    P: ProgressCallback,
{
    let mut halted = false;
    for id in ids {
        let Some(prev) = report.applied.get(*id).cloned() else {
            continue;
        };
        if halted {
            report.record(
                id,
                ApplyResult::Skipped {
                    reason: "Blocked by an earlier failure".into(),
                },
            );
            continue;
        }

        progress.on_resource_start(id, &format!("{} {}", prev.kind, id));
        let result = match materializer.destroy(id, prev.kind, &prev.outputs) {
            Ok(()) => {
                report.applied.remove(*id);
                ApplyResult::Deleted
            }
            Err(e) => {
                log::warn!("Failed to destroy {}: {:#}", id, e);
                halted = true;
                ApplyResult::Failed {
                    error: format!("{e:#}"),
                }
            }
        };
        progress.on_resource_complete(id, &result);
        report.record(id, result);
    }
}

/// Destroy every applied node of a stack, dependents first
pub fn destroy<M, P, C>(
    stack: &Stack,
    applied: &AppliedMap,
    materializer: &M,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ApplyReport>
where
    M: Materializer,
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let mut report = ApplyReport {
        applied: applied.clone(),
        ..Default::default()
    };
    if applied.is_empty() {
        return Ok(report.finish(stack));
    }

    if !confirm.confirm("Destroy all resources?")? {
        for id in applied.keys() {
            report.record(
                id,
                ApplyResult::Skipped {
                    reason: "Declined".into(),
                },
            );
        }
        return Ok(report.finish(stack));
    }

    let ids: Vec<&str> = applied.keys().map(String::as_str).collect();
    let order = deletion_order(applied, &ids)?;
    let order: Vec<&str> = order.iter().map(String::as_str).collect();

    progress.on_layer_start(0, order.len());
    destroy_in_order(&order, &mut report, materializer, progress);
    progress.on_layer_complete();

    Ok(report.finish(stack))
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple<M: Materializer>(
    stack: &Stack,
    applied: &AppliedMap,
    opts: &ExecuteOptions,
    materializer: &M,
) -> Result<ApplyReport> {
    use crate::context::{AutoConfirm, NoProgress};

    let plan = ExecutionPlan::from_stack(stack);
    execute(
        stack,
        &plan,
        applied,
        opts,
        materializer,
        &mut NoProgress,
        &mut AutoConfirm,
    )
}
