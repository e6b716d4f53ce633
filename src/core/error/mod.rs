use crate::core::types::ErrorCategory;
use serde::Serialize;

/// Typed workflow error surfaced by the engine.
///
/// Errors raised by a `raise` task keep the type URI, status and title of their definition;
/// errors produced by the engine itself are built through the category constructors below.
#[derive(Debug, Serialize)]
pub struct WorkflowError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(skip)]
    pub source: Option<anyhow::Error>,
}

impl WorkflowError {
    pub fn new<T: Into<String>>(category: ErrorCategory, detail: T) -> Self {
        WorkflowError {
            error_type: category.type_uri(),
            status: category.default_status(),
            title: Some(category.default_title().to_string()),
            detail: Some(detail.into()),
            instance: None,
            source: None,
        }
    }

    /// Build an error with a type URI outside the well-known categories.
    pub fn custom<T: Into<String>>(error_type: T, status: u16) -> Self {
        WorkflowError {
            error_type: error_type.into(),
            status,
            title: None,
            detail: None,
            instance: None,
            source: None,
        }
    }

    pub fn authentication<E: std::fmt::Display>(cause: E, instance: &str) -> Self {
        Self::new(ErrorCategory::Authentication, cause.to_string()).with_instance(instance)
    }

    pub fn authorization<E: std::fmt::Display>(cause: E, instance: &str) -> Self {
        Self::new(ErrorCategory::Authorization, cause.to_string()).with_instance(instance)
    }

    pub fn communication<E: std::fmt::Display>(cause: E, instance: &str) -> Self {
        Self::new(ErrorCategory::Communication, cause.to_string()).with_instance(instance)
    }

    pub fn configuration<E: std::fmt::Display>(cause: E, instance: &str) -> Self {
        Self::new(ErrorCategory::Configuration, cause.to_string()).with_instance(instance)
    }

    pub fn expression<E: std::fmt::Display>(cause: E, instance: &str) -> Self {
        Self::new(ErrorCategory::Expression, cause.to_string()).with_instance(instance)
    }

    pub fn runtime<E: std::fmt::Display>(cause: E, instance: &str) -> Self {
        Self::new(ErrorCategory::Runtime, cause.to_string()).with_instance(instance)
    }

    pub fn timeout<E: std::fmt::Display>(cause: E, instance: &str) -> Self {
        Self::new(ErrorCategory::Timeout, cause.to_string()).with_instance(instance)
    }

    pub fn validation<E: std::fmt::Display>(cause: E, instance: &str) -> Self {
        Self::new(ErrorCategory::Validation, cause.to_string()).with_instance(instance)
    }

    /// Constructor used by the raise task's category lookup table.
    pub fn for_category<E: std::fmt::Display>(
        category: ErrorCategory,
        cause: E,
        instance: &str,
    ) -> Self {
        Self::new(category, cause.to_string()).with_instance(instance)
    }

    pub fn with_title<T: Into<String>>(mut self, title: T) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_detail<T: Into<String>>(mut self, detail: T) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set the instance pointer. An empty reference leaves the error untouched.
    pub fn with_instance<T: Into<String>>(mut self, instance: T) -> Self {
        let instance = instance.into();
        if !instance.is_empty() {
            self.instance = Some(instance);
        }
        self
    }

    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Annotate the error with the failing task reference unless one is already present.
    pub fn with_instance_ref(mut self, reference: &str) -> Self {
        if self.instance.as_deref().map_or(true, str::is_empty) {
            let reference = if reference.is_empty() { "/" } else { reference };
            self.instance = Some(reference.to_string());
        }
        self
    }

    /// Well-known category of this error, if its type URI matches one.
    pub fn category(&self) -> Option<ErrorCategory> {
        ErrorCategory::from_type_uri(&self.error_type)
    }

    pub fn is_category(&self, category: ErrorCategory) -> bool {
        self.category() == Some(category)
    }

    /// Serialize to a JSON value for reporting.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let title = self.title.as_deref().unwrap_or(self.error_type.as_str());
        write!(f, "[{}] {}", self.status, title)?;
        if let Some(ref detail) = self.detail {
            write!(f, ": {}", detail)?;
        }
        if let Some(ref instance) = self.instance {
            write!(f, " (instance: {})", instance)?;
        }
        if let Some(ref source) = self.source {
            write!(f, "\nCaused by: {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref())
    }
}

impl From<anyhow::Error> for WorkflowError {
    fn from(e: anyhow::Error) -> Self {
        WorkflowError::new(ErrorCategory::Runtime, e.to_string()).with_source(e)
    }
}

impl From<std::io::Error> for WorkflowError {
    fn from(e: std::io::Error) -> Self {
        WorkflowError::new(ErrorCategory::Runtime, e.to_string()).with_source(anyhow::anyhow!(e))
    }
}
