use crate::core::model::duration::Timeout;
use crate::core::model::{ErrorDefinition, Export, Input, Output};
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Flow directive keywords.
pub const FLOW_CONTINUE: &str = "continue";
pub const FLOW_END: &str = "end";
pub const FLOW_EXIT: &str = "exit";

/// `then` directive: a sibling task name or one of `continue`, `end`, `exit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowDirective(pub String);

impl FlowDirective {
    pub fn new<T: Into<String>>(value: T) -> Self {
        FlowDirective(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.trim()
    }

    pub fn is_continue(&self) -> bool {
        self.as_str() == FLOW_CONTINUE
    }

    /// `end` and `exit` both terminate the enclosing task list.
    pub fn is_termination(&self) -> bool {
        matches!(self.as_str(), FLOW_END | FLOW_EXIT)
    }

    /// True when the directive names a task rather than a keyword.
    pub fn is_task_target(&self) -> bool {
        !self.is_continue() && !self.is_termination()
    }
}

/// Fields shared by every task kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskBase {
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub if_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Input>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Output>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Timeout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<FlowDirective>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// A task definition. The variant is selected by the kind-specific key in the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Call(CallTask),
    Do(DoTask),
    For(ForTask),
    Fork(ForkTask),
    Raise(RaiseTask),
    Run(RunTask),
    Set(SetTask),
    Switch(SwitchTask),
}

impl Task {
    pub fn base(&self) -> &TaskBase {
        match self {
            Task::Call(task) => &task.base,
            Task::Do(task) => &task.base,
            Task::For(task) => &task.base,
            Task::Fork(task) => &task.base,
            Task::Raise(task) => &task.base,
            Task::Run(task) => &task.base,
            Task::Set(task) => &task.base,
            Task::Switch(task) => &task.base,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Task::Call(_) => "call",
            Task::Do(_) => "do",
            Task::For(_) => "for",
            Task::Fork(_) => "fork",
            Task::Raise(_) => "raise",
            Task::Run(_) => "run",
            Task::Set(_) => "set",
            Task::Switch(_) => "switch",
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for Task {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Task::Call(task) => task.serialize(serializer),
            Task::Do(task) => task.serialize(serializer),
            Task::For(task) => task.serialize(serializer),
            Task::Fork(task) => task.serialize(serializer),
            Task::Raise(task) => task.serialize(serializer),
            Task::Run(task) => task.serialize(serializer),
            Task::Set(task) => task.serialize(serializer),
            Task::Switch(task) => task.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Task {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let map = value
            .as_object()
            .ok_or_else(|| D::Error::custom("task definition must be a mapping"))?;

        // `for` is checked before `do` because a for task carries both keys.
        let task = if map.contains_key("call") {
            serde_json::from_value(value).map(Task::Call)
        } else if map.contains_key("for") {
            serde_json::from_value(value).map(Task::For)
        } else if map.contains_key("fork") {
            serde_json::from_value(value).map(Task::Fork)
        } else if map.contains_key("raise") {
            serde_json::from_value(value).map(Task::Raise)
        } else if map.contains_key("run") {
            serde_json::from_value(value).map(Task::Run)
        } else if map.contains_key("set") {
            serde_json::from_value(value).map(Task::Set)
        } else if map.contains_key("switch") {
            serde_json::from_value(value).map(Task::Switch)
        } else if map.contains_key("do") {
            serde_json::from_value(value).map(Task::Do)
        } else {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            return Err(D::Error::custom(format!(
                "unsupported task kind (keys: {})",
                keys.join(", ")
            )));
        };
        task.map_err(D::Error::custom)
    }
}

/// Named entry of a task list.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskItem {
    pub key: String,
    pub task: Task,
}

/// Ordered list of named tasks with name-addressable jumps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskList(pub Vec<TaskItem>);

impl TaskList {
    pub fn new(items: Vec<TaskItem>) -> Self {
        TaskList(items)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TaskItem> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaskItem> {
        self.0.iter()
    }

    /// Resolve a task by key.
    pub fn key_and_index(&self, key: &str) -> Option<(usize, &TaskItem)> {
        self.0
            .iter()
            .enumerate()
            .find(|(_, item)| item.key == key)
    }

    /// Task that follows `index`, honouring its `then` directive.
    ///
    /// Returns `None` when the list is complete: past the end, on `end`/`exit`, or when a
    /// jump target does not exist (runners validate targets before execution).
    pub fn next(&self, index: usize) -> Option<(usize, &TaskItem)> {
        let current = self.0.get(index)?;
        match &current.task.base().then {
            Some(directive) if directive.is_termination() => None,
            Some(directive) if directive.is_task_target() => {
                self.key_and_index(directive.as_str())
            }
            _ => self.0.get(index + 1).map(|item| (index + 1, item)),
        }
    }
}

impl Serialize for TaskList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|item| {
            let mut entry = IndexMap::with_capacity(1);
            entry.insert(item.key.as_str(), &item.task);
            entry
        }))
    }
}

impl<'de> Deserialize<'de> for TaskList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<IndexMap<String, Task>>::deserialize(deserializer)?;
        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.len() != 1 {
                return Err(D::Error::custom(format!(
                    "each task list entry must have exactly one named task, found {}",
                    entry.len()
                )));
            }
            for (key, task) in entry {
                items.push(TaskItem { key, task });
            }
        }
        Ok(TaskList(items))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoTask {
    #[serde(flatten)]
    pub base: TaskBase,
    #[serde(rename = "do")]
    pub do_: TaskList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub each: Option<String>,
    #[serde(rename = "in")]
    pub in_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForTask {
    #[serde(flatten)]
    pub base: TaskBase,
    #[serde(rename = "for")]
    pub for_: ForSpec,
    #[serde(rename = "while", default, skip_serializing_if = "Option::is_none")]
    pub while_: Option<String>,
    #[serde(rename = "do")]
    pub do_: TaskList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkSpec {
    pub branches: TaskList,
    #[serde(default)]
    pub compete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkTask {
    #[serde(flatten)]
    pub base: TaskBase,
    pub fork: ForkSpec,
}

/// Error raised by a `raise` task: a reference into `use.errors` or an inline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RaiseError {
    Ref(String),
    Definition(ErrorDefinition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaiseSpec {
    pub error: RaiseError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaiseTask {
    #[serde(flatten)]
    pub base: TaskBase,
    pub raise: RaiseSpec,
}

/// What a shell task returns as its output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessReturnType {
    #[default]
    Stdout,
    Stderr,
    Code,
    All,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellSpec {
    pub command: String,
    /// Either a list of arguments or a `name: value` mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Map<String, Value>>,
}

fn default_await() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<ShellSpec>,
    #[serde(rename = "await", default = "default_await", skip_serializing_if = "is_true")]
    pub await_: bool,
    #[serde(rename = "return", default)]
    pub return_: ProcessReturnType,
    /// Process kinds other than `shell` (script, container, workflow) are kept verbatim.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTask {
    #[serde(flatten)]
    pub base: TaskBase,
    pub run: RunSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetTask {
    #[serde(flatten)]
    pub base: TaskBase,
    /// A `name: value` template or a single runtime expression.
    pub set: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<FlowDirective>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchTask {
    #[serde(flatten)]
    pub base: TaskBase,
    pub switch: Vec<IndexMap<String, SwitchCase>>,
}

impl SwitchTask {
    /// Cases in declaration order.
    pub fn cases(&self) -> impl Iterator<Item = (&String, &SwitchCase)> {
        self.switch.iter().flat_map(|entry| entry.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTask {
    #[serde(flatten)]
    pub base: TaskBase,
    pub call: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with: Option<Value>,
}
