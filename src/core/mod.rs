pub mod config;
pub mod context;
pub mod error;
pub mod expression;
pub mod model;
pub mod runner;
pub mod schema;
pub mod types;

pub use config::{ConfigLoader, ConfigValidator, EngineConfig};
pub use context::WorkflowContext;
pub use error::WorkflowError;
pub use model::{load_workflow, Task, TaskList, Workflow};
pub use runner::{WorkflowRunner, WorkflowRunnerBuilder};
pub use types::{ErrorCategory, StatusPhase};
