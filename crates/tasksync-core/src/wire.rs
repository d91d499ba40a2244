//! JSON wire format: response envelopes, request bodies and date handling.
//!
//! Dates are `NaiveDate` in memory and only become `DD-MM-YYYY` strings when
//! a request body is serialized. Responses are parsed leniently because the
//! server echoes dates in more than one shape.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ApiError, FieldErrors};
use crate::model::{PageMeta, Task, TaskChanges, TaskDraft, TaskPage};

/// Date format used in request bodies.
pub const WIRE_DATE_FORMAT: &str = "%d-%m-%Y";
/// Date format used in memory and in query parameters.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

#[must_use]
pub fn format_wire_date(date: NaiveDate) -> String {
    date.format(WIRE_DATE_FORMAT).to_string()
}

#[must_use]
pub fn format_iso_date(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

/// Parse a date echoed by the server or typed by a user.
///
/// Accepts `YYYY-MM-DD`, `DD-MM-YYYY`, RFC 3339 timestamps and
/// `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, ISO_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, WIRE_DATE_FORMAT))
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
}

/// Parse a server timestamp (RFC 3339, or `YYYY-MM-DD HH:MM:SS` in UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Serde adapter: ISO out, anything [`parse_date`] understands in.
pub mod lenient_date {
    use super::{format_iso_date, parse_date, warn};
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&format_iso_date(*date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| {
            let parsed = parse_date(&s);
            if parsed.is_none() && !s.trim().is_empty() {
                warn!(value = %s, "ignoring unparseable date");
            }
            parsed
        }))
    }
}

/// Serde adapter for server-assigned timestamps.
pub mod lenient_timestamp {
    use super::parse_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_timestamp))
    }
}

/// Body for `POST /tasks`.
#[must_use]
pub fn draft_body(draft: &TaskDraft) -> Value {
    let mut body = Map::new();
    body.insert("name".into(), Value::String(draft.name.trim().to_string()));
    if let Some(description) = &draft.description {
        body.insert("description".into(), Value::String(description.clone()));
    }
    if let Some(status) = draft.status {
        body.insert("status".into(), Value::String(status.as_str().to_string()));
    }
    if let Some(due_date) = draft.due_date {
        body.insert("due_date".into(), Value::String(format_wire_date(due_date)));
    }
    Value::Object(body)
}

/// Body for `PUT /tasks/{id}`: only the fields being changed.
#[must_use]
pub fn changes_body(changes: &TaskChanges) -> Value {
    let mut body = Map::new();
    if let Some(name) = &changes.name {
        body.insert("name".into(), Value::String(name.trim().to_string()));
    }
    if let Some(description) = &changes.description {
        body.insert(
            "description".into(),
            description.clone().map_or(Value::Null, Value::String),
        );
    }
    if let Some(status) = changes.status {
        body.insert("status".into(), Value::String(status.as_str().to_string()));
    }
    if let Some(due_date) = changes.due_date {
        body.insert(
            "due_date".into(),
            due_date.map_or(Value::Null, |d| Value::String(format_wire_date(d))),
        );
    }
    Value::Object(body)
}

/// Strip the `{success, message, data}` envelope if present.
fn unwrap_envelope(body: &Value) -> &Value {
    match body.get("data") {
        Some(inner @ (Value::Object(_) | Value::Array(_))) => inner,
        _ => body,
    }
}

fn decode_tasks(items: &[Value]) -> Result<Vec<Task>, ApiError> {
    items
        .iter()
        .map(|item| Task::deserialize(item).map_err(ApiError::malformed))
        .collect()
}

/// Decode a collection response: a bare array, `{data: [...]}`, or a
/// paginator `{data: {data: [...], current_page, ...}}`.
///
/// # Errors
///
/// Returns a malformed-response failure when no task array is found or a
/// record is missing required fields.
pub fn decode_page(body: &Value) -> Result<TaskPage, ApiError> {
    let inner = unwrap_envelope(body);
    match inner {
        Value::Array(items) => Ok(TaskPage::new(decode_tasks(items)?)),
        Value::Object(paginator) => {
            let Some(Value::Array(items)) = paginator.get("data") else {
                return Err(ApiError::malformed("collection without a task array"));
            };
            let meta = PageMeta::deserialize(inner).map_err(ApiError::malformed)?;
            Ok(TaskPage {
                tasks: decode_tasks(items)?,
                meta: Some(meta),
            })
        }
        other => Err(ApiError::malformed(format!(
            "expected a task collection, got {}",
            kind_of(other)
        ))),
    }
}

/// Decode a single-task response, with or without the `data` envelope.
///
/// # Errors
///
/// Returns a malformed-response failure when the body is not a task.
pub fn decode_task(body: &Value) -> Result<Task, ApiError> {
    Task::deserialize(unwrap_envelope(body)).map_err(ApiError::malformed)
}

/// User-facing message from an error body.
#[must_use]
pub fn error_message(body: &Value) -> Option<String> {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty());
    if let Some(message) = message {
        return Some(message.to_string());
    }
    if let Some(first) = field_errors(body)
        .into_values()
        .flatten()
        .next()
    {
        return Some(first);
    }
    body.get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// The `errors` map of a validation response.
#[must_use]
pub fn field_errors(body: &Value) -> FieldErrors {
    let Some(Value::Object(errors)) = body.get("errors") else {
        return FieldErrors::new();
    };
    errors
        .iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::Array(list) => list
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                Value::String(one) => vec![one.clone()],
                _ => Vec::new(),
            };
            (field.clone(), messages)
        })
        .collect()
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Status, TaskId};
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn echoed_wire_date_equals_submitted_iso_date() {
        let submitted = parse_date("2025-03-12").expect("iso");
        let body = draft_body(&TaskDraft {
            due_date: Some(submitted),
            ..TaskDraft::named("x")
        });
        assert_eq!(body["due_date"], "12-03-2025");

        let echoed: Task = serde_json::from_value(json!({
            "id": 1, "name": "x", "due_date": "12-03-2025"
        }))
        .expect("decode");
        assert_eq!(echoed.due_date, Some(submitted));
    }

    #[test]
    fn parse_date_accepts_timestamps() {
        assert_eq!(parse_date("2025-03-12T00:00:00.000000Z"), Some(ymd(2025, 3, 12)));
        assert_eq!(parse_date("2025-03-12 08:00:00"), Some(ymd(2025, 3, 12)));
        assert_eq!(parse_date("12/03/2025"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn in_memory_dates_serialize_as_iso() {
        let task = Task {
            id: TaskId::from(1),
            name: "x".into(),
            description: None,
            status: None,
            due_date: Some(ymd(2025, 3, 12)),
            created_at: None,
        };
        let value = serde_json::to_value(&task).expect("serialize");
        assert_eq!(value["due_date"], "2025-03-12");
    }

    #[test]
    fn changes_body_only_carries_touched_fields() {
        let body = changes_body(&TaskChanges::status(Status::Done));
        assert_eq!(body, json!({"status": "Done"}));

        let body = changes_body(&TaskChanges {
            description: Some(None),
            due_date: Some(Some(ymd(2024, 12, 1))),
            ..TaskChanges::default()
        });
        assert_eq!(body, json!({"description": null, "due_date": "01-12-2024"}));
    }

    #[test]
    fn decode_page_reads_paginator() {
        let body = json!({
            "success": true,
            "data": {
                "current_page": 2,
                "data": [{"id": 3, "name": "c", "status": "Done"}],
                "last_page": 4,
                "per_page": 1,
                "total": 4
            }
        });
        let page = decode_page(&body).expect("decode");
        assert_eq!(page.tasks.len(), 1);
        let meta = page.meta.expect("meta");
        assert_eq!(meta.current_page, 2);
        assert_eq!(meta.total, 4);
    }

    #[test]
    fn decode_page_accepts_bare_arrays() {
        let page = decode_page(&json!([{"id": "a", "name": "n"}])).expect("decode");
        assert_eq!(page.tasks[0].id, TaskId::from("a"));
        assert!(page.meta.is_none());
        assert!(decode_page(&json!({"data": 5})).is_err());
        assert!(decode_page(&json!({"data": {"current_page": 1}})).is_err());
    }

    #[test]
    fn decode_task_unwraps_envelope() {
        let task = decode_task(&json!({
            "success": true,
            "message": "Task created successfully",
            "data": {"id": 7, "name": "Buy milk", "status": "To Do"}
        }))
        .expect("decode");
        assert_eq!(task.id, TaskId::from(7));
        assert!(decode_task(&json!({"success": true})).is_err());
    }

    #[test]
    fn error_message_prefers_message_then_fields() {
        assert_eq!(
            error_message(&json!({"message": "Unauthenticated."})).as_deref(),
            Some("Unauthenticated.")
        );
        assert_eq!(
            error_message(&json!({"message": "", "errors": {"name": ["Too long."]}})).as_deref(),
            Some("Too long.")
        );
        assert_eq!(error_message(&json!({})), None);
    }
}
