use clap::Args;
use std::path::PathBuf;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Workflow document (YAML or JSON)
    #[arg(value_name = "WORKFLOW")]
    pub workflow: PathBuf,

    /// Workflow input as an inline JSON document (default: {})
    #[arg(long, value_name = "JSON", conflicts_with = "input_file")]
    pub input: Option<String>,

    /// Read the workflow input from a JSON file
    #[arg(long, value_name = "PATH")]
    pub input_file: Option<PathBuf>,

    /// Engine configuration file (default: swrunner.toml next to the workflow)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Workflow document (YAML or JSON)
    #[arg(value_name = "WORKFLOW")]
    pub workflow: PathBuf,

    /// Engine configuration file (default: swrunner.toml next to the workflow)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
