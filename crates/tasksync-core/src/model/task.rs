use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::error::ApiError;
use crate::wire;

/// Longest task name the server accepts.
pub const MAX_NAME_LEN: usize = 255;

/// Identity of a task record.
///
/// Server ids are opaque strings even when the API sends numbers. A
/// `Pending` id marks a record synthesized by an optimistic create that the
/// server has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskId {
    Server(String),
    Pending(u64),
}

impl TaskId {
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => f.write_str(id),
            Self::Pending(n) => write!(f, "pending-{n}"),
        }
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self::Server(id.to_string())
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::Server(id.to_string())
    }
}

impl FromStr for TaskId {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseEnumError {
                expected: "task id",
                got: s.to_string(),
            });
        }
        if let Some(n) = trimmed
            .strip_prefix("pending-")
            .and_then(|n| n.parse::<u64>().ok())
        {
            return Ok(Self::Pending(n));
        }
        Ok(Self::Server(trimmed.to_string()))
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Unsigned(u64),
            Signed(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Unsigned(n) => Self::Server(n.to_string()),
            RawId::Signed(n) => Self::Server(n.to_string()),
            RawId::Text(s) => Self::Server(s),
        })
    }
}

/// The three board columns a task can sit in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Done")]
    Done,
}

impl Status {
    pub const ALL: [Self; 3] = [Self::ToDo, Self::InProgress, Self::Done];

    /// Wire and display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToDo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string cannot be parsed into one of the model enums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

pub(crate) fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "todo" => Ok(Self::ToDo),
            "inprogress" | "doing" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

/// Unknown status strings decode as `None` rather than failing the whole
/// collection.
fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Status>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// Cached copy of a server-owned task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<Status>,
    #[serde(default, with = "wire::lenient_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, with = "wire::lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Column this task belongs to; absent or unknown status counts as To Do.
    #[must_use]
    pub fn column(&self) -> Status {
        self.status.unwrap_or(Status::ToDo)
    }

    /// Synthesize the optimistic record for a create.
    #[must_use]
    pub fn pending(marker: u64, draft: &TaskDraft) -> Self {
        Self {
            id: TaskId::Pending(marker),
            name: draft.name.trim().to_string(),
            description: draft.description.clone(),
            status: Some(draft.status.unwrap_or(Status::ToDo)),
            due_date: draft.due_date,
            created_at: None,
        }
    }
}

/// Pagination metadata from a collection response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMeta {
    pub current_page: u64,
    pub last_page: u64,
    pub per_page: u64,
    pub total: u64,
}

/// One page of a task collection, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

impl TaskPage {
    #[must_use]
    pub const fn new(tasks: Vec<Task>) -> Self {
        Self { tasks, meta: None }
    }

    #[must_use]
    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }
}

/// Payload of a cache entry: a collection page or a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum QueryData {
    Collection(TaskPage),
    Single(Task),
}

impl QueryData {
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        match self {
            Self::Collection(page) => &page.tasks,
            Self::Single(task) => std::slice::from_ref(task),
        }
    }

    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }
}

fn check_name(name: &str) -> Result<(), ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::invalid_field("name", "The name field is required."));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::invalid_field(
            "name",
            format!("The name may not be greater than {MAX_NAME_LEN} characters."),
        ));
    }
    Ok(())
}

/// Fields for a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Reject drafts the server would refuse, before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), ApiError> {
        check_name(&self.name)
    }
}

/// Partial update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<Status>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskChanges {
    /// A change restricted to `status`.
    #[must_use]
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for an empty change set or a bad name.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.is_empty() {
            return Err(ApiError::Validation {
                message: "no fields to update".to_string(),
                fields: crate::error::FieldErrors::new(),
            });
        }
        match &self.name {
            Some(name) => check_name(name),
            None => Ok(()),
        }
    }

    /// Merge into `task`, touching only the fields that are set.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(name) = &self.name {
            task.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(status) = self.status {
            task.status = Some(status);
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
    }
}
