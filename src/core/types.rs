use serde::{Deserialize, Serialize};

const ERROR_TYPE_BASE: &str = "https://serverlessworkflow.io/spec/1.0.0/errors";

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Authentication,
    Validation,
    Communication,
    Authorization,
    Configuration,
    Expression,
    Runtime,
    Timeout,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 8] = [
        ErrorCategory::Authentication,
        ErrorCategory::Validation,
        ErrorCategory::Communication,
        ErrorCategory::Authorization,
        ErrorCategory::Configuration,
        ErrorCategory::Expression,
        ErrorCategory::Runtime,
        ErrorCategory::Timeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Communication => "communication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Expression => "expression",
            ErrorCategory::Runtime => "runtime",
            ErrorCategory::Timeout => "timeout",
        }
    }

    /// Type URI carried by errors of this category.
    pub fn type_uri(&self) -> String {
        format!("{}/{}", ERROR_TYPE_BASE, self.as_str())
    }

    pub fn default_status(&self) -> u16 {
        match self {
            ErrorCategory::Authentication => 401,
            ErrorCategory::Authorization => 403,
            ErrorCategory::Timeout => 408,
            ErrorCategory::Validation
            | ErrorCategory::Configuration
            | ErrorCategory::Expression => 400,
            ErrorCategory::Communication | ErrorCategory::Runtime => 500,
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "Authentication Error",
            ErrorCategory::Validation => "Validation Error",
            ErrorCategory::Communication => "Communication Error",
            ErrorCategory::Authorization => "Authorization Error",
            ErrorCategory::Configuration => "Configuration Error",
            ErrorCategory::Expression => "Expression Error",
            ErrorCategory::Runtime => "Runtime Error",
            ErrorCategory::Timeout => "Timeout Error",
        }
    }

    /// Look up a well-known category from an error type URI.
    pub fn from_type_uri(uri: &str) -> Option<Self> {
        let uri = uri.trim();
        ErrorCategory::ALL
            .iter()
            .copied()
            .find(|category| category.type_uri() == uri)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle phase of a workflow or task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusPhase {
    #[default]
    Pending,
    Running,
    Waiting,
    Suspended,
    Cancelled,
    Faulted,
    Completed,
}

impl StatusPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusPhase::Pending => "pending",
            StatusPhase::Running => "running",
            StatusPhase::Waiting => "waiting",
            StatusPhase::Suspended => "suspended",
            StatusPhase::Cancelled => "cancelled",
            StatusPhase::Faulted => "faulted",
            StatusPhase::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusPhase::Cancelled | StatusPhase::Faulted | StatusPhase::Completed
        )
    }
}

impl std::fmt::Display for StatusPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
