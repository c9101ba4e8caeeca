//! Declarative commands
//!
//! - `diff` - Preview what apply would change
//! - `apply` - Make the applied state match the stack
//! - `destroy` - Remove everything that was applied

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{
    ApplyReport, ConfirmCallback, ExecuteOptions, ExecutionPlan, ProgressCallback, ResourceDiff,
    compute_diffs,
};

use super::Session;
use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs};
use crate::engine::{self, BarProgress, PromptConfirm};
use crate::provider::LocalProvider;
use crate::state::StateStore;
use crate::ui;

/// Diffs restricted to a target; deletes only show for a whole-stack view
fn planned_diffs(
    session: &Session,
    store: &StateStore,
    target: Option<&str>,
) -> Result<Vec<ResourceDiff>> {
    let stack = &session.built.stack;
    let state = store.load(stack.name())?;
    let plan = ExecutionPlan::from_stack(stack).filter_by_target(stack, target);

    Ok(compute_diffs(stack, &state.resources)?
        .into_iter()
        .filter(|d| plan.contains(&d.resource_id) || (target.is_none() && d.is_removal()))
        .collect())
}

// ============================================================================
// Diff Command
// ============================================================================

pub fn diff(ctx: &Context, target: Option<&str>) -> Result<()> {
    let session = Session::open(ctx)?;
    let store = StateStore::open_default()?;

    ui::header(&format!("Diff: {}", session.built.stack.name()));
    let diffs = planned_diffs(&session, &store, target)?;
    engine::display_diff(&diffs, ctx.verbose > 0);
    Ok(())
}

// ============================================================================
// Apply Command
// ============================================================================

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let store = StateStore::open_default()?;

    ui::header(&format!("Applying {}", session.built.stack.name()));
    if args.dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let diffs = planned_diffs(&session, &store, args.target.as_deref())?;
    engine::display_diff(&diffs, ctx.verbose > 0);

    let provider = LocalProvider::new(session.config.provider.clone())
        .with_failures(args.fail.iter().cloned());
    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: usize::from(args.jobs).max(1),
        verbose: ctx.verbose > 0,
    };

    let report = run_apply(
        &session,
        &store,
        args.target.as_deref(),
        &opts,
        &provider,
        &mut BarProgress::new(ctx.quiet),
        &mut PromptConfirm::new(args.yes),
    )?;

    if report.summary.total_changes() == 0 && report.failed.is_empty() {
        if args.dry_run && !diffs.is_empty() {
            println!();
            ui::info("Dry run - no changes made");
        } else if report.summary.skipped > 0 {
            println!();
            println!("  {} Aborted", "✗".red());
        }
        return Ok(());
    }

    engine::print_summary(&report.summary, "applied");
    engine::print_partial(&report);

    if let Some(err) = report.first_error() {
        bail!("Apply of {} did not complete: {}", session.built.stack.name(), err);
    }
    Ok(())
}

fn log_invocations(provider: &LocalProvider) {
    for call in provider.invocations() {
        log::debug!("provider: {:?} {} ({})", call.operation, call.id, call.kind);
    }
}

/// Apply and persist the resulting state
pub fn run_apply<P, C>(
    session: &Session,
    store: &StateStore,
    target: Option<&str>,
    opts: &ExecuteOptions,
    provider: &LocalProvider,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ApplyReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let stack = &session.built.stack;
    let mut state = store.load(stack.name())?;
    let plan = ExecutionPlan::from_stack(stack).filter_by_target(stack, target);

    if plan.is_empty() {
        bail!("No resources match target '{}'", target.unwrap_or_default());
    }

    let report = declarative::execute(
        stack,
        &plan,
        &state.resources,
        opts,
        provider,
        progress,
        confirm,
    )?;
    log_invocations(provider);

    // Anything materialized is kept, even when the run failed part way
    if report.summary.total_changes() > 0 {
        state.record_report(&report);
        let path = store.save(&state)?;
        log::info!("Saved state to {}", path.display());
    }

    Ok(report)
}

// ============================================================================
// Destroy Command
// ============================================================================

pub fn destroy(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let store = StateStore::open_default()?;

    ui::header(&format!("Destroying {}", session.built.stack.name()));

    let provider = LocalProvider::new(session.config.provider.clone());
    let report = run_destroy(
        &session,
        &store,
        &provider,
        &mut BarProgress::new(ctx.quiet),
        &mut PromptConfirm::new(args.yes),
    )?;

    if report.results.is_empty() {
        ui::info("Nothing to destroy");
        return Ok(());
    }

    if report.summary.deleted == 0 && report.failed.is_empty() {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    engine::print_summary(&report.summary, "destroyed");
    if let Some(err) = report.first_error() {
        bail!("Destroy of {} did not complete: {}", session.built.stack.name(), err);
    }
    Ok(())
}

/// Destroy everything in the applied state and persist what is left
pub fn run_destroy<P, C>(
    session: &Session,
    store: &StateStore,
    provider: &LocalProvider,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ApplyReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let stack = &session.built.stack;
    let mut state = store.load(stack.name())?;

    let report = declarative::destroy(stack, &state.resources, provider, progress, confirm)?;
    log_invocations(provider);

    if report.summary.deleted > 0 {
        state.record_report(&report);
        if state.is_empty() {
            store.remove(stack.name())?;
        } else {
            store.save(&state)?;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ProviderSettings};
    use crate::provider::Operation;
    use declarative::{AutoConfirm, AutoDecline, NoProgress};
    use tempfile::TempDir;

    fn session(email: &str) -> Session {
        let config = Config::default()
            .with_overrides(None, &[format!("notifyEmail={email}")])
            .unwrap();
        Session::from_config(config, false).unwrap()
    }

    fn apply(session: &Session, store: &StateStore, provider: &LocalProvider) -> ApplyReport {
        run_apply(
            session,
            store,
            None,
            &ExecuteOptions::default(),
            provider,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap()
    }

    #[test]
    fn test_apply_persists_state_and_second_apply_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let session = session("ops@example.com");

        let first = apply(&session, &store, &LocalProvider::new(ProviderSettings::default()));
        assert_eq!(first.summary.created, 7);
        assert_eq!(store.load("CommonLambdaStack").unwrap().resources.len(), 7);

        let provider = LocalProvider::new(ProviderSettings::default());
        let second = apply(&session, &store, &provider);
        assert_eq!(second.summary.no_change, 7);
        assert!(provider.invocations().is_empty());
    }

    #[test]
    fn test_context_change_updates_only_functions() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        apply(
            &session("ops@example.com"),
            &store,
            &LocalProvider::new(ProviderSettings::default()),
        );

        let provider = LocalProvider::new(ProviderSettings::default());
        let report = apply(&session("oncall@example.com"), &store, &provider);
        assert_eq!(report.summary.updated, 2);

        let calls = provider.invocations();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.operation == Operation::Update));
    }

    #[test]
    fn test_partial_apply_keeps_materialized_state() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let session = session("ops@example.com");

        let failing =
            LocalProvider::new(ProviderSettings::default()).with_failures(["NotifyDoneFunction"]);
        let report = apply(&session, &store, &failing);
        assert!(report.first_error().is_some());

        let state = store.load("CommonLambdaStack").unwrap();
        assert!(state.resources.contains_key("NotifyFailFunction"));
        assert!(!state.resources.contains_key("NotifyDoneFunction"));
        assert!(!state.resources.contains_key("NotifyDoneFunctionSubscription"));

        // A retry picks up where the failure left off
        let provider = LocalProvider::new(ProviderSettings::default());
        let retry = apply(&session, &store, &provider);
        assert!(retry.is_complete());
        assert_eq!(retry.summary.created, 3);
    }

    #[test]
    fn test_target_includes_dependencies() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let session = session("ops@example.com");
        let provider = LocalProvider::new(ProviderSettings::default());

        let report = run_apply(
            &session,
            &store,
            Some("function.NotifyDoneFunction"),
            &ExecuteOptions::default(),
            &provider,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(report.summary.created, 2);
        let ids: Vec<String> = provider.invocations().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["PersonalizeLambdaExecutionRole", "NotifyDoneFunction"]);
    }

    #[test]
    fn test_bare_id_target_matches_exactly() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let session = session("ops@example.com");
        let provider = LocalProvider::new(ProviderSettings::default());

        run_apply(
            &session,
            &store,
            Some("NotifyDoneFunction"),
            &ExecuteOptions::default(),
            &provider,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        let ids: Vec<String> = provider.invocations().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["PersonalizeLambdaExecutionRole", "NotifyDoneFunction"]);
        let state = store.load("CommonLambdaStack").unwrap();
        assert!(!state.resources.contains_key("NotifyDoneFunctionSubscription"));
    }

    #[test]
    fn test_unknown_target_is_error() {
        let dir = TempDir::new().unwrap();
        let result = run_apply(
            &session("ops@example.com"),
            &StateStore::new(dir.path()),
            Some("bucket"),
            &ExecuteOptions::default(),
            &LocalProvider::new(ProviderSettings::default()),
            &mut NoProgress,
            &mut AutoConfirm,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_destroy_removes_state_file() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let session = session("ops@example.com");
        apply(&session, &store, &LocalProvider::new(ProviderSettings::default()));

        // Declined destroy leaves everything in place
        let provider = LocalProvider::new(ProviderSettings::default());
        run_destroy(&session, &store, &provider, &mut NoProgress, &mut AutoDecline).unwrap();
        assert!(provider.invocations().is_empty());

        let report =
            run_destroy(&session, &store, &provider, &mut NoProgress, &mut AutoConfirm).unwrap();
        assert_eq!(report.summary.deleted, 7);
        assert!(!store.path_for("CommonLambdaStack").exists());

        let calls: Vec<String> = provider.invocations().into_iter().map(|c| c.id).collect();
        let pos = |id: &str| calls.iter().position(|c| c == id).unwrap();
        assert!(pos("NotifyDoneFunctionSubscription") < pos("NotifyDoneFunction"));
        assert!(pos("NotifyDoneFunctionSubscription") < pos("DoneTopic"));
        assert!(pos("NotifyDoneFunction") < pos("PersonalizeLambdaExecutionRole"));
        assert!(pos("NotifyFailFunction") < pos("PersonalizeLambdaExecutionRole"));
    }
}
