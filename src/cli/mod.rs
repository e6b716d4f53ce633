pub mod args;
pub mod commands;

pub use args::{RunArgs, ValidateArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
WORKFLOW COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "swrunner")]
#[command(version = crate::VERSION)]
#[command(about = "Run declarative task-orchestration workflows")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: validate a workflow document, then run it with a JSON input."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Execute a workflow document",
        long_about = "Run loads a YAML or JSON workflow, executes it against the given input and prints the output as JSON on stdout. Failures are printed as a typed error on stderr.",
        after_help = "Example:\n    swrunner run ./greet.yaml --input '{\"name\": \"ada\"}'"
    )]
    Run(RunArgs),
    #[command(
        about = "Check a workflow document without running it",
        long_about = "Validate parses the document and builds every task runner, reporting undefined error references, unknown jump targets and unsupported task configurations.",
        after_help = "Example:\n    swrunner validate ./greet.yaml"
    )]
    Validate(ValidateArgs),
}

impl Command {
    /// Engine configuration file for this invocation: `--config`, or swrunner.toml next to
    /// the workflow document.
    pub fn config_file(&self) -> PathBuf {
        match self {
            Command::Run(args) => {
                commands::resolve_config_path(args.config.as_deref(), &args.workflow)
            }
            Command::Validate(args) => {
                commands::resolve_config_path(args.config.as_deref(), &args.workflow)
            }
        }
    }

    /// Whether the command writes its result to stdout.
    pub fn prints_output(&self) -> bool {
        matches!(self, Command::Run(_))
    }
}

pub async fn run(args: Args) -> crate::Result<()> {
    match args.command {
        Command::Run(run_args) => commands::run(run_args).await,
        Command::Validate(validate_args) => commands::validate(validate_args).await,
    }
}
