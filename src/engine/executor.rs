//! Terminal integration for the apply engine: progress bars, prompts, reports

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{ApplyReport, ApplyResult, ConfirmCallback, ExecuteSummary, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};

use crate::ui;

/// Progress bar per layer, with a line per finished resource
pub struct BarProgress {
    bar: Option<ProgressBar>,
    hidden: bool,
}

impl BarProgress {
    /// Bars are hidden when quiet or when stderr is not a terminal
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: None,
            hidden: quiet || !console::Term::stderr().is_term(),
        }
    }

    fn print_line(&self, line: &str) {
        match &self.bar {
            Some(bar) => bar.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }
}

impl ProgressCallback for BarProgress {
    fn on_layer_start(&mut self, index: usize, count: usize) {
        println!();
        println!(
            "  {} Layer {} ({})",
            "→".cyan(),
            index + 1,
            ui::count(count, "resource")
        );

        let bar = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(count as u64)
        };
        let template = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            bar.set_style(style.progress_chars("=>-"));
        }
        self.bar = Some(bar);
    }

    fn on_resource_start(&mut self, id: &str, description: &str) {
        log::debug!("Applying {id}");
        if let Some(bar) = &self.bar {
            bar.set_message(description.to_string());
        }
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        let symbol = result.symbol();
        let line = match result {
            ApplyResult::Created => format!("    {} {} {}", symbol.green(), id, "created".dimmed()),
            ApplyResult::Updated => format!("    {} {} {}", symbol.green(), id, "updated".dimmed()),
            ApplyResult::Deleted => format!("    {} {} {}", symbol.green(), id, "deleted".dimmed()),
            ApplyResult::NoChange => format!("    {} {}", symbol.dimmed(), id),
            ApplyResult::Failed { error } => format!("    {} {} {}", symbol.red(), id, error.red()),
            ApplyResult::Skipped { reason } => {
                format!("    {} {} {}", symbol.yellow(), id, reason.dimmed())
            }
        };
        self.print_line(&line);
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_layer_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Confirmation through a dialoguer prompt, or `--yes`
pub struct PromptConfirm {
    yes: bool,
}

impl PromptConfirm {
    pub fn new(yes: bool) -> Self {
        Self { yes }
    }
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }
        if !console::Term::stdout().is_term() {
            bail!("{prompt} needs confirmation; pass --yes when not running in a terminal");
        }

        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary, action: &str) {
    println!();
    if summary.is_success() {
        println!("  {} Stack {} successfully!", "✓".green().bold(), action);
    } else {
        println!("  {} Stack {} with errors", "⚠".yellow().bold(), action);
    }

    if summary.created > 0 {
        println!("    • {} created", ui::count(summary.created, "resource"));
    }
    if summary.updated > 0 {
        println!("    • {} updated", ui::count(summary.updated, "resource"));
    }
    if summary.deleted > 0 {
        println!("    • {} deleted", ui::count(summary.deleted, "resource"));
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", ui::count(summary.skipped, "resource"));
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

/// Print what a partial apply left behind
pub fn print_partial(report: &ApplyReport) {
    if report.failed.is_empty() {
        return;
    }

    ui::section("Partial apply");
    for (id, error) in &report.failed {
        println!("  {} {}: {}", "✗".red(), id, error);
    }
    ui::kv("materialized", &report.materialized.join(", "));
    ui::kv("not materialized", &report.pending.join(", "));
    ui::dim("Fix the failure and run apply again; materialized resources are kept.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_confirm_with_yes_skips_prompt() {
        assert!(PromptConfirm::new(true).confirm("Apply changes?").unwrap());
    }

    #[test]
    fn test_hidden_progress_tracks_layers() {
        let mut progress = BarProgress::new(true);
        progress.on_layer_start(0, 2);
        assert!(progress.bar.is_some());
        progress.on_resource_start("Role", "role Role");
        progress.on_resource_complete("Role", &ApplyResult::Created);
        progress.on_layer_complete();
        assert!(progress.bar.is_none());
    }
}
