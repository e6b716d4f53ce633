use crate::cli::args::{RunArgs, ValidateArgs};
use crate::core::config::{ConfigLoader, EngineConfig, CONFIG_FILE_NAME};
use crate::core::model::{load_workflow, Workflow};
use crate::core::runner::WorkflowRunner;
use crate::Result;
use anyhow::{anyhow, Context};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// `--config` when given, otherwise swrunner.toml in the workflow's directory.
pub fn resolve_config_path(explicit: Option<&Path>, workflow: &Path) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => workflow
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONFIG_FILE_NAME),
    }
}

fn load_config(explicit: Option<&Path>, workflow: &Path) -> Result<EngineConfig> {
    let path = resolve_config_path(explicit, workflow);
    if explicit.is_some() && !path.exists() {
        return Err(anyhow!("config file {} does not exist", path.display()));
    }
    ConfigLoader::load(&path).map_err(|err| anyhow!("{}", err))
}

fn read_input(args: &RunArgs) -> Result<Value> {
    if let Some(raw) = &args.input {
        return serde_json::from_str(raw).context("--input is not valid JSON");
    }
    if let Some(path) = &args.input_file {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("input file {} is not valid JSON", path.display()));
    }
    Ok(Value::Object(Default::default()))
}

fn build_runner(workflow: Workflow, config: EngineConfig) -> Result<WorkflowRunner> {
    WorkflowRunner::builder(workflow)
        .with_config(config)
        .build()
        .map_err(|err| {
            eprintln!("{}", to_pretty(&err.to_value()));
            anyhow!("workflow is invalid: {}", err)
        })
}

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Execute a workflow and print its output as JSON.
pub async fn run(args: RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), &args.workflow)?;
    let input = read_input(&args)?;
    let workflow = load_workflow(&args.workflow).map_err(|err| anyhow!("{}", err))?;
    let runner = build_runner(workflow, config)?;

    tracing::info!(workflow = %args.workflow.display(), "running workflow");
    match runner.run(input).await {
        Ok(output) => {
            println!("{}", to_pretty(&output));
            Ok(())
        }
        Err(err) => {
            tracing::error!("workflow failed: {}", err);
            eprintln!("{}", to_pretty(&err.to_value()));
            Err(anyhow!("workflow failed: {}", err))
        }
    }
}

/// Parse a workflow and build its runner tree without executing anything.
pub async fn validate(args: ValidateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), &args.workflow)?;
    let workflow = load_workflow(&args.workflow).map_err(|err| anyhow!("{}", err))?;
    let name = workflow.document.name.clone();
    let version = workflow.document.version.clone();
    build_runner(workflow, config)?;
    println!("workflow '{}' ({}) is valid", name, version);
    Ok(())
}
