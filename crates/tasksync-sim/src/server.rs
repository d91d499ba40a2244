//! Authoritative in-memory task API.
//!
//! Speaks the same envelope shapes as the real backend: paginated
//! collections under `data.data`, single records under `data`, dates as
//! `DD-MM-YYYY` and 422 bodies with per-field messages.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value, json};
use tasksync_core::model::{MAX_NAME_LEN, Status};
use tasksync_core::transport::{ApiRequest, Method, TransportError};
use tasksync_core::wire;

use crate::rng::DeterministicRng;

/// 2025-01-01T00:00:00Z; `created_at` counts seconds from here.
const EPOCH_SECS: i64 = 1_735_689_600;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Record {
    id: u64,
    name: String,
    description: Option<String>,
    status: Status,
    due_date: Option<NaiveDate>,
    created: i64,
}

impl Record {
    fn to_json(&self) -> Value {
        let created_at = DateTime::from_timestamp(EPOCH_SECS + self.created, 0)
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string());
        json!({
            "id": self.id,
            "name": self.name,
            "description": self.description,
            "status": self.status.as_str(),
            "due_date": self.due_date.map(wire::format_wire_date),
            "created_at": created_at,
        })
    }

    fn matches(&self, params: &BTreeMap<String, String>) -> bool {
        if let Some(status) = params.get("status")
            && self.status.as_str() != status
        {
            return false;
        }
        if let Some(search) = params.get("search").map(|s| s.trim().to_lowercase())
            && !search.is_empty()
        {
            let hit = self.name.to_lowercase().contains(&search)
                || self
                    .description
                    .as_ref()
                    .is_some_and(|d| d.to_lowercase().contains(&search));
            if !hit {
                return false;
            }
        }
        let from = params.get("due_date_from").and_then(|d| wire::parse_date(d));
        let to = params.get("due_date_to").and_then(|d| wire::parse_date(d));
        if from.is_some() || to.is_some() {
            let Some(due) = self.due_date else {
                return false;
            };
            if from.is_some_and(|f| due < f) || to.is_some_and(|t| due > t) {
                return false;
            }
        }
        true
    }
}

fn compare(a: &Record, b: &Record, sort_by: &str) -> Ordering {
    match sort_by {
        "name" => a.name.cmp(&b.name),
        "due_date" => a.due_date.cmp(&b.due_date),
        _ => a.created.cmp(&b.created),
    }
}

/// The backend's view of the world.
#[derive(Debug, Clone, Default)]
pub struct SimulatedServer {
    records: Vec<Record>,
    next_id: u64,
    clock: i64,
    writes_applied: u64,
}

impl SimulatedServer {
    /// A server holding `count` generated tasks.
    #[must_use]
    pub fn seeded(count: usize, rng: &mut DeterministicRng) -> Self {
        let mut server = Self {
            next_id: 1,
            ..Self::default()
        };
        for n in 0..count {
            let status = rng.choose(&Status::ALL).copied().unwrap_or(Status::ToDo);
            let due_date = rng
                .flip()
                .then(|| random_date(rng))
                .flatten();
            server.insert(format!("seed task {n}"), None, status, due_date);
        }
        server
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// Writes that changed server state, including ones whose response
    /// never reached the client.
    #[must_use]
    pub const fn writes_applied(&self) -> u64 {
        self.writes_applied
    }

    fn insert(
        &mut self,
        name: String,
        description: Option<String>,
        status: Status,
        due_date: Option<NaiveDate>,
    ) -> &Record {
        self.clock += 1;
        let record = Record {
            id: self.next_id,
            name,
            description,
            status,
            due_date,
            created: self.clock,
        };
        self.next_id += 1;
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Answer one request the way the HTTP API would.
    ///
    /// # Errors
    ///
    /// Returns the HTTP failure the backend would send (404, 405, 422).
    pub fn handle(&mut self, request: &ApiRequest) -> Result<Value, TransportError> {
        let id = match request.path.strip_prefix("/tasks/") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| not_found())?),
            None if request.path == "/tasks" => None,
            None => return Err(not_found()),
        };
        match (request.method, id) {
            (Method::Get, None) => Ok(self.list(&request.params)),
            (Method::Get, Some(id)) => self.show(id),
            (Method::Post, None) => self.create(request.body.as_ref()),
            (Method::Put, Some(id)) => self.update(id, request.body.as_ref()),
            (Method::Delete, Some(id)) => self.delete(id),
            _ => Err(TransportError::Http {
                status: 405,
                body: Some(json!({"message": "Method not allowed"})),
            }),
        }
    }

    fn list(&self, params: &BTreeMap<String, String>) -> Value {
        let sort_by = params.get("sort_by").map_or("created_at", String::as_str);
        let descending = params.get("sort_direction").is_none_or(|d| d != "asc");
        let per_page = params
            .get("per_page")
            .and_then(|p| p.parse::<usize>().ok())
            .unwrap_or(10)
            .max(1);
        let page = params
            .get("page")
            .and_then(|p| p.parse::<usize>().ok())
            .unwrap_or(1)
            .max(1);

        let mut hits: Vec<&Record> = self.records.iter().filter(|r| r.matches(params)).collect();
        hits.sort_by(|a, b| {
            let order = compare(a, b, sort_by);
            let order = if descending { order.reverse() } else { order };
            order.then(a.id.cmp(&b.id))
        });

        let total = hits.len();
        let last_page = total.div_ceil(per_page).max(1);
        let data: Vec<Value> = hits
            .iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .map(|r| r.to_json())
            .collect();
        json!({
            "success": true,
            "data": {
                "data": data,
                "current_page": page,
                "last_page": last_page,
                "per_page": per_page,
                "total": total,
            }
        })
    }

    fn position(&self, id: u64) -> Result<usize, TransportError> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(not_found)
    }

    fn show(&self, id: u64) -> Result<Value, TransportError> {
        let record = &self.records[self.position(id)?];
        Ok(json!({"success": true, "data": record.to_json()}))
    }

    fn create(&mut self, body: Option<&Value>) -> Result<Value, TransportError> {
        let fields = body.and_then(Value::as_object).cloned().unwrap_or_default();
        let mut errors = Map::new();
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            errors.insert("name".into(), json!(["The name field is required."]));
        } else if name.chars().count() > MAX_NAME_LEN {
            errors.insert(
                "name".into(),
                json!(["The name field must not be greater than 255 characters."]),
            );
        }
        let status = match fields.get("status") {
            None | Some(Value::Null) => Ok(Status::ToDo),
            Some(value) => parse_status(value),
        };
        let due_date = parse_due(fields.get("due_date"));
        if let Err(message) = &status {
            errors.insert("status".into(), json!([message]));
        }
        if let Err(message) = &due_date {
            errors.insert("due_date".into(), json!([message]));
        }
        if !errors.is_empty() {
            return Err(unprocessable(errors));
        }
        let (Ok(status), Ok(due_date)) = (status, due_date) else {
            return Err(unprocessable(errors));
        };
        let description = fields
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        self.writes_applied += 1;
        let record = self.insert(name, description, status, due_date);
        Ok(json!({
            "success": true,
            "message": "Task created successfully",
            "data": record.to_json(),
        }))
    }

    fn update(&mut self, id: u64, body: Option<&Value>) -> Result<Value, TransportError> {
        let index = self.position(id)?;
        let fields = body.and_then(Value::as_object).cloned().unwrap_or_default();
        let mut next = self.records[index].clone();
        let mut errors = Map::new();

        if let Some(value) = fields.get("name") {
            match value.as_str().map(str::trim) {
                Some(name) if !name.is_empty() && name.chars().count() <= MAX_NAME_LEN => {
                    next.name = name.to_string();
                }
                _ => {
                    errors.insert("name".into(), json!(["The name field is invalid."]));
                }
            }
        }
        if let Some(value) = fields.get("description") {
            next.description = value.as_str().map(str::to_string);
        }
        if let Some(value) = fields.get("status") {
            match parse_status(value) {
                Ok(status) => next.status = status,
                Err(message) => {
                    errors.insert("status".into(), json!([message]));
                }
            }
        }
        if fields.contains_key("due_date") {
            match parse_due(fields.get("due_date")) {
                Ok(due) => next.due_date = due,
                Err(message) => {
                    errors.insert("due_date".into(), json!([message]));
                }
            }
        }
        if !errors.is_empty() {
            return Err(unprocessable(errors));
        }

        if next != self.records[index] {
            self.writes_applied += 1;
        }
        self.records[index] = next;
        Ok(json!({
            "success": true,
            "message": "Task updated successfully",
            "data": self.records[index].to_json(),
        }))
    }

    fn delete(&mut self, id: u64) -> Result<Value, TransportError> {
        let index = self.position(id)?;
        self.records.remove(index);
        self.writes_applied += 1;
        Ok(json!({"success": true, "message": "Task deleted successfully"}))
    }
}

fn parse_status(value: &Value) -> Result<Status, String> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| "The selected status is invalid.".to_string())
}

fn parse_due(value: Option<&Value>) -> Result<Option<NaiveDate>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => wire::parse_date(raw)
            .map(Some)
            .ok_or_else(|| "The due date is not a valid date.".to_string()),
        Some(_) => Err("The due date is not a valid date.".to_string()),
    }
}

fn random_date(rng: &mut DeterministicRng) -> Option<NaiveDate> {
    let day = u32::try_from(rng.next_bounded(28)).ok()? + 1;
    let month = u32::try_from(rng.next_bounded(12)).ok()? + 1;
    NaiveDate::from_ymd_opt(2025, month, day)
}

fn not_found() -> TransportError {
    TransportError::Http {
        status: 404,
        body: Some(json!({"success": false, "message": "Task not found"})),
    }
}

fn unprocessable(errors: Map<String, Value>) -> TransportError {
    TransportError::Http {
        status: 422,
        body: Some(json!({
            "message": "The given data was invalid.",
            "errors": errors,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> SimulatedServer {
        let mut rng = DeterministicRng::new(11);
        SimulatedServer::seeded(3, &mut rng)
    }

    fn list(server: &mut SimulatedServer, params: &[(&str, &str)]) -> Value {
        let params = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        server
            .handle(&ApiRequest::get("/tasks").with_params(params))
            .expect("list")
    }

    #[test]
    fn newest_first_by_default() {
        let mut server = server();
        let body = list(&mut server, &[]);
        let ids: Vec<u64> = body["data"]["data"]
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|t| t["id"].as_u64())
            .collect();
        assert_eq!(ids, [3, 2, 1]);
        assert_eq!(body["data"]["total"], 3);
    }

    #[test]
    fn pages_slice_results() {
        let mut server = server();
        let body = list(&mut server, &[("per_page", "2"), ("page", "2")]);
        assert_eq!(body["data"]["data"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["data"]["last_page"], 2);
    }

    #[test]
    fn create_validates_and_assigns_ids() {
        let mut server = server();
        let err = server
            .handle(&ApiRequest::with_body(
                Method::Post,
                "/tasks",
                Some(json!({"name": "  "})),
            ))
            .expect_err("blank name");
        assert!(matches!(err, TransportError::Http { status: 422, .. }));

        let created = server
            .handle(&ApiRequest::with_body(
                Method::Post,
                "/tasks",
                Some(json!({"name": "Buy milk", "due_date": "12-03-2025"})),
            ))
            .expect("created");
        assert_eq!(created["data"]["id"], 4);
        assert_eq!(created["data"]["status"], "To Do");
        assert_eq!(created["data"]["due_date"], "12-03-2025");
    }

    #[test]
    fn update_merges_and_delete_removes() {
        let mut server = server();
        let updated = server
            .handle(&ApiRequest::with_body(
                Method::Put,
                "/tasks/2",
                Some(json!({"status": "Done"})),
            ))
            .expect("updated");
        assert_eq!(updated["data"]["status"], "Done");
        assert_eq!(updated["data"]["name"], "seed task 1");

        server
            .handle(&ApiRequest::with_body(Method::Delete, "/tasks/2", None))
            .expect("deleted");
        assert_eq!(server.ids(), [1, 3]);
        let err = server
            .handle(&ApiRequest::get("/tasks/2"))
            .expect_err("gone");
        assert!(matches!(err, TransportError::Http { status: 404, .. }));
    }

    #[test]
    fn filters_by_status_and_search() {
        let mut server = server();
        server
            .handle(&ApiRequest::with_body(
                Method::Post,
                "/tasks",
                Some(json!({"name": "Quarterly report", "status": "Done"})),
            ))
            .expect("created");
        let body = list(&mut server, &[("status", "Done"), ("search", "REPORT")]);
        let names: Vec<&str> = body["data"]["data"]
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(names, ["Quarterly report"]);
    }
}
