use super::{TaskRunner, TaskSupport};
use crate::core::error::WorkflowError;
use crate::core::model::CallTask;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::{json, Map, Value};

/// Shape of the value returned by an HTTP call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HttpOutput {
    Content,
    Response,
    Raw,
}

impl HttpOutput {
    fn parse(value: Option<&Value>) -> Option<Self> {
        match value.and_then(Value::as_str).unwrap_or("content") {
            "content" => Some(HttpOutput::Content),
            "response" => Some(HttpOutput::Response),
            "raw" => Some(HttpOutput::Raw),
            _ => None,
        }
    }
}

/// Runs `call: http` tasks with the shared `reqwest` client.
#[derive(Debug)]
pub struct HttpCallRunner {
    name: String,
    arguments: Map<String, Value>,
    output: HttpOutput,
}

impl HttpCallRunner {
    pub fn new(name: &str, task: &CallTask, reference: &str) -> Result<Self, WorkflowError> {
        if task.call != "http" {
            return Err(WorkflowError::configuration(
                format!("call task '{}' uses unsupported function '{}'", name, task.call),
                reference,
            ));
        }
        let arguments = match &task.with {
            Some(Value::Object(arguments)) => arguments.clone(),
            _ => {
                return Err(WorkflowError::validation(
                    format!("http call '{}' requires a 'with' mapping", name),
                    reference,
                ))
            }
        };
        for required in ["method", "endpoint"] {
            if !arguments.contains_key(required) {
                return Err(WorkflowError::validation(
                    format!("http call '{}' is missing '{}'", name, required),
                    reference,
                ));
            }
        }
        let output = HttpOutput::parse(arguments.get("output")).ok_or_else(|| {
            WorkflowError::validation(
                format!(
                    "http call '{}' output must be one of content, response, raw",
                    name
                ),
                reference,
            )
        })?;

        Ok(HttpCallRunner {
            name: name.to_string(),
            arguments,
            output,
        })
    }
}

fn endpoint_uri(endpoint: &Value) -> Option<String> {
    match endpoint {
        Value::String(uri) => Some(uri.clone()),
        Value::Object(map) => map.get("uri").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn header_map(headers: Option<&Value>, reference: &str) -> Result<HeaderMap, WorkflowError> {
    let mut map = HeaderMap::new();
    let Some(Value::Object(headers)) = headers else {
        return Ok(map);
    };
    for (name, value) in headers {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let invalid = |err: &dyn std::fmt::Display| {
            WorkflowError::validation(format!("header '{}': {}", name, err), reference)
        };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| invalid(&err))?;
        let value = HeaderValue::from_str(&text).map_err(|err| invalid(&err))?;
        map.insert(header_name, value);
    }
    Ok(map)
}

fn headers_to_value(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        map.insert(
            name.as_str().to_string(),
            Value::String(value.to_str().unwrap_or_default().to_string()),
        );
    }
    Value::Object(map)
}

fn decode_body(body: &str) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

#[async_trait]
impl TaskRunner for HttpCallRunner {
    async fn run(&self, input: Value, support: &TaskSupport) -> Result<Value, WorkflowError> {
        let reference = support.context.task_reference().unwrap_or_default();
        let arguments = support
            .traverse(&Value::Object(self.arguments.clone()), &input)
            .map_err(|err| WorkflowError::expression(err, &reference))?;

        let method_name = arguments
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_uppercase();
        let method = Method::from_bytes(method_name.as_bytes()).map_err(|_| {
            WorkflowError::validation(format!("invalid HTTP method '{}'", method_name), &reference)
        })?;
        let uri = arguments
            .get("endpoint")
            .and_then(endpoint_uri)
            .ok_or_else(|| WorkflowError::validation("http endpoint must be a uri", &reference))?;
        let url = url::Url::parse(&uri).map_err(|err| {
            WorkflowError::validation(format!("invalid endpoint '{}': {}", uri, err), &reference)
        })?;
        let headers = header_map(arguments.get("headers"), &reference)?;

        let mut request = support
            .services
            .http_client
            .request(method.clone(), url)
            .headers(headers.clone());
        if let Some(Value::Object(query)) = arguments.get("query") {
            let pairs: Vec<(String, String)> = query
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), value)
                })
                .collect();
            request = request.query(&pairs);
        }
        match arguments.get("body") {
            None | Some(Value::Null) => {}
            Some(Value::String(body)) => request = request.body(body.clone()),
            Some(body) => request = request.json(body),
        }

        tracing::debug!(task = %reference, method = %method, uri = %uri, "sending http request");
        let response = tokio::select! {
            response = request.send() => response.map_err(|err| {
                let detail = format!("request to {} failed: {}", uri, err);
                WorkflowError::communication(detail, &reference)
            })?,
            _ = support.cancellation().cancelled() => {
                return Err(WorkflowError::runtime("http call cancelled", &reference));
            }
        };

        let status = response.status();
        let response_headers = headers_to_value(response.headers());
        let body = response.text().await.map_err(|err| {
            let detail = format!("failed to read response body: {}", err);
            WorkflowError::communication(detail, &reference)
        })?;

        if !status.is_success() {
            return Err(WorkflowError::communication(
                format!("{} {} returned HTTP {}", method, uri, status),
                &reference,
            )
            .with_status(status.as_u16()));
        }

        Ok(match self.output {
            HttpOutput::Raw => Value::String(body),
            HttpOutput::Content => decode_body(&body),
            HttpOutput::Response => json!({
                "request": {
                    "method": method.as_str(),
                    "uri": uri,
                    "headers": headers_to_value(&headers),
                },
                "statusCode": status.as_u16(),
                "headers": response_headers,
                "content": decode_body(&body),
            }),
        })
    }

    fn task_name(&self) -> &str {
        &self.name
    }
}
