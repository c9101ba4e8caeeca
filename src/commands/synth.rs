//! Read-only views of the assembled stack: synth, plan, graph

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use declarative::{ExecutionPlan, Stack};

use super::Session;
use crate::Context;
use crate::cli::OutputFormat;
use crate::ui;

/// Serialize the frozen stack
pub fn render(stack: &Stack, format: OutputFormat) -> Result<String> {
    let document = stack.document();
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&document).context("Failed to serialize stack to JSON")
        }
        OutputFormat::Toml => {
            toml::to_string_pretty(&document).context("Failed to serialize stack to TOML")
        }
    }
}

pub fn synth(ctx: &Context, format: OutputFormat) -> Result<()> {
    let session = Session::open(ctx)?;
    println!("{}", render(&session.built.stack, format)?);
    Ok(())
}

pub fn plan(ctx: &Context, target: Option<&str>) -> Result<()> {
    let session = Session::open(ctx)?;
    let stack = &session.built.stack;
    let plan = ExecutionPlan::from_stack(stack).filter_by_target(stack, target);

    ui::header(&format!("Plan: {}", stack.name()));

    if plan.is_empty() {
        ui::warn(&format!(
            "No resources match target '{}'",
            target.unwrap_or_default()
        ));
        return Ok(());
    }

    for (index, layer) in plan.layers.iter().enumerate() {
        ui::section(&format!("Layer {}", index + 1));
        for id in layer {
            let node = stack.node(id)?;
            let deps: Vec<&str> = node.depends_on().iter().map(String::as_str).collect();
            if deps.is_empty() {
                println!("  {} {:<34} {}", "•".cyan(), id, node.kind().to_string().dimmed());
            } else {
                println!(
                    "  {} {:<34} {} {}",
                    "•".cyan(),
                    id,
                    node.kind().to_string().dimmed(),
                    format!("← {}", deps.join(", ")).dimmed()
                );
            }
        }
    }

    if target.is_none() {
        let handles = &session.built.handles;
        ui::section("Exports");
        ui::kv("executionRole", handles.execution_role.id());
        ui::kv("doneTopic", handles.done_topic.id());
        ui::kv("failTopic", handles.fail_topic.id());
    }

    println!();
    ui::kv("resources", &plan.total_resources().to_string());
    ui::kv("layers", &plan.layers.len().to_string());
    Ok(())
}

pub fn graph(ctx: &Context) -> Result<()> {
    let session = Session::open(ctx)?;
    print!("{}", session.built.stack.to_dot());
    Ok(())
}
