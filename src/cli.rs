use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::notify::Status;

#[derive(Parser)]
#[command(name = "stackgraph")]
#[command(version)]
#[command(about = "Plan, diff and apply declarative notification stacks", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: stackgraph.toml in the config directory)
    #[arg(long, global = true, env = "STACKGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Stack name (default: CommonLambdaStack)
    #[arg(long, global = true)]
    pub stack: Option<String>,

    /// Context override, e.g. -c notifyEmail=ops@example.com
    #[arg(short = 'c', long = "context", value_name = "KEY=VALUE", global = true)]
    pub context: Vec<String>,

    /// Treat context warnings as errors
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the assembled stack
    Synth(SynthArgs),

    /// Show apply layers
    Plan(PlanArgs),

    /// Print the dependency graph in Graphviz DOT format
    Graph,

    /// Preview what apply would change
    Diff(DiffArgs),

    /// Make the applied state match the stack
    Apply(ApplyArgs),

    /// Remove every applied resource, dependents first
    Destroy(DestroyArgs),

    /// Render the notification a function would send
    Notify(NotifyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Toml,
}

#[derive(Args)]
pub struct SynthArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Limit to a kind, kind.id or id (e.g. function, topic.DoneTopic)
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Limit to a kind, kind.id or id
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Limit to a kind, kind.id or id; dependencies are included
    #[arg(long)]
    pub target: Option<String>,

    /// Show what would happen without materializing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Resources materialized concurrently within a layer
    #[arg(short, long, default_value = "4")]
    pub jobs: u16,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Make the local provider fail this resource (repeatable)
    #[arg(long, value_name = "ID")]
    pub fail: Vec<String>,
}

#[derive(Args)]
pub struct DestroyArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct NotifyArgs {
    /// Status to report (default: $STATUS)
    #[arg(long, value_parser = parse_status)]
    pub status: Option<Status>,

    /// Topic event JSON file, or - for stdin
    #[arg(long)]
    pub event: Option<PathBuf>,
}

fn parse_status(s: &str) -> Result<Status, String> {
    s.parse().map_err(|e: crate::notify::NotifyError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stackgraph",
            "apply",
            "--jobs",
            "2",
            "--fail",
            "DoneTopic",
            "-c",
            "notifyEmail=ops@example.com",
            "--stack",
            "Dev",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.stack.as_deref(), Some("Dev"));
        assert_eq!(cli.context, vec!["notifyEmail=ops@example.com"]);
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.jobs, 2);
                assert_eq!(args.fail, vec!["DoneTopic"]);
                assert!(!args.dry_run);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_notify_status_parsing() {
        let cli = Cli::try_parse_from(["stackgraph", "notify", "--status", "failed"]).unwrap();
        match cli.command {
            Command::Notify(args) => assert_eq!(args.status, Some(Status::Failed)),
            _ => panic!("expected notify"),
        }
        assert!(Cli::try_parse_from(["stackgraph", "notify", "--status", "maybe"]).is_err());
    }
}
