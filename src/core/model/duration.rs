use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Duration as written in a workflow: an inline record, an ISO 8601 string (`PT1M30S`)
/// or a humantime string (`90s`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    Inline(DurationInline),
    Expression(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationInline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milliseconds: Option<u64>,
}

/// `timeout` block attached to tasks and workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeout {
    pub after: DurationSpec,
}

impl Timeout {
    pub fn duration(&self) -> Result<Duration, String> {
        self.after.to_duration()
    }
}

impl DurationInline {
    pub fn to_duration(&self) -> Duration {
        let secs = self.days.unwrap_or(0) * 86_400
            + self.hours.unwrap_or(0) * 3_600
            + self.minutes.unwrap_or(0) * 60
            + self.seconds.unwrap_or(0);
        Duration::from_secs(secs) + Duration::from_millis(self.milliseconds.unwrap_or(0))
    }
}

impl DurationSpec {
    pub fn to_duration(&self) -> Result<Duration, String> {
        match self {
            DurationSpec::Inline(inline) => Ok(inline.to_duration()),
            DurationSpec::Expression(text) => parse_duration_text(text),
        }
    }
}

fn iso8601_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(
            r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
        )
        .expect("static ISO 8601 duration pattern")
    })
}

fn parse_duration_text(text: &str) -> Result<Duration, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("duration cannot be empty".to_string());
    }
    if !trimmed.starts_with('P') {
        return humantime::parse_duration(trimmed)
            .map_err(|err| format!("invalid duration '{}': {}", trimmed, err));
    }

    let captures = iso8601_pattern()
        .captures(trimmed)
        .ok_or_else(|| format!("invalid ISO 8601 duration '{}'", trimmed))?;
    if captures.iter().skip(1).all(|group| group.is_none()) {
        return Err(format!("ISO 8601 duration '{}' has no components", trimmed));
    }

    let number = |index: usize| -> u64 {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    let seconds = captures
        .get(4)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);

    let whole = number(1) * 86_400 + number(2) * 3_600 + number(3) * 60;
    Ok(Duration::from_secs(whole) + Duration::from_secs_f64(seconds))
}
