mod cli;
mod commands;
mod config;
mod engine;
mod notify;
mod paths;
mod provider;
mod stack;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Explicit config file
    pub config: Option<PathBuf>,
    /// Stack name override
    pub stack: Option<String>,
    /// `key=value` context overrides
    pub context: Vec<String>,
    pub strict: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        stack: cli.stack,
        context: cli.context,
        strict: cli.strict,
    };

    match cli.command {
        Command::Synth(args) => commands::synth::synth(&ctx, args.format),
        Command::Plan(args) => commands::synth::plan(&ctx, args.target.as_deref()),
        Command::Graph => commands::synth::graph(&ctx),
        Command::Diff(args) => commands::declarative::diff(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::declarative::apply(&ctx, &args),
        Command::Destroy(args) => commands::declarative::destroy(&ctx, &args),
        Command::Notify(args) => commands::notify::run(&args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "stackgraph", &mut io::stdout());
            Ok(())
        }
    }
}
