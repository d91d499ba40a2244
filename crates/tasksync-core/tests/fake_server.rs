#![allow(dead_code)]

//! In-memory task API behind the `Transport` seam, with a gate that holds
//! write responses until the test releases them and per-path holds for
//! finer ordering.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value, json};
use tasksync_core::transport::{ApiRequest, Method, Transport, TransportError};
use tokio::sync::Semaphore;

#[derive(Default)]
struct ServerState {
    tasks: Vec<Value>,
    next_id: u64,
    calls: Vec<ApiRequest>,
    write_failures: VecDeque<TransportError>,
    read_failures: VecDeque<TransportError>,
}

pub struct FakeServer {
    state: Mutex<ServerState>,
    write_gate: Option<Arc<Semaphore>>,
    holds: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl FakeServer {
    pub fn new(tasks: Vec<Value>, next_id: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ServerState {
                tasks,
                next_id,
                ..ServerState::default()
            }),
            write_gate: None,
            holds: Mutex::default(),
        })
    }

    /// Writes wait for [`FakeServer::release`] before answering.
    pub fn gated(tasks: Vec<Value>, next_id: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ServerState {
                tasks,
                next_id,
                ..ServerState::default()
            }),
            write_gate: Some(Arc::new(Semaphore::new(0))),
            holds: Mutex::default(),
        })
    }

    pub fn release(&self) {
        if let Some(gate) = &self.write_gate {
            gate.add_permits(1);
        }
    }

    /// Requests of any method to `path` wait for [`FakeServer::release_path`]
    /// instead of the write gate.
    pub fn hold(&self, path: &str) {
        self.holds
            .lock()
            .expect("lock")
            .insert(path.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release_path(&self, path: &str) {
        if let Some(hold) = self.holds.lock().expect("lock").get(path) {
            hold.add_permits(1);
        }
    }

    fn held(&self, path: &str) -> Option<Arc<Semaphore>> {
        self.holds.lock().expect("lock").get(path).cloned()
    }

    pub fn fail_next_write(&self, error: TransportError) {
        self.state.lock().expect("lock").write_failures.push_back(error);
    }

    pub fn fail_next_read(&self, error: TransportError) {
        self.state.lock().expect("lock").read_failures.push_back(error);
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.state.lock().expect("lock").calls.clone()
    }

    pub fn count(&self, method: Method, path_prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.method == method && c.path.starts_with(path_prefix))
            .count()
    }

    fn answer(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        let mut state = self.state.lock().expect("lock");
        state.calls.push(request.clone());
        let failure = if request.method == Method::Get {
            state.read_failures.pop_front()
        } else {
            state.write_failures.pop_front()
        };
        if let Some(failure) = failure {
            return Err(failure);
        }

        let id = request.path.strip_prefix("/tasks/").map(str::to_string);
        let find = |tasks: &[Value], id: &str| {
            tasks
                .iter()
                .position(|t| t["id"].to_string().trim_matches('"') == id)
        };
        match (request.method, id) {
            (Method::Get, None) => {
                let status = request.params.get("status");
                let search = request.params.get("search");
                let data: Vec<Value> = state
                    .tasks
                    .iter()
                    .filter(|t| status.is_none_or(|s| t["status"] == *s.as_str()))
                    .filter(|t| {
                        search.is_none_or(|s| {
                            t["name"].as_str().is_some_and(|n| n.contains(s.as_str()))
                        })
                    })
                    .cloned()
                    .collect();
                let total = data.len();
                Ok(json!({
                    "success": true,
                    "data": {
                        "data": data,
                        "current_page": 1,
                        "last_page": 1,
                        "per_page": 10,
                        "total": total,
                    }
                }))
            }
            (Method::Get, Some(id)) => match find(&state.tasks, &id) {
                Some(pos) => Ok(json!({"success": true, "data": state.tasks[pos]})),
                None => Err(not_found()),
            },
            (Method::Post, None) => {
                let mut task = request.body.clone().unwrap_or_else(|| json!({}));
                task["id"] = json!(state.next_id);
                if task.get("status").is_none() {
                    task["status"] = json!("To Do");
                }
                task["created_at"] = json!("2025-01-01T00:00:00Z");
                state.next_id += 1;
                state.tasks.insert(0, task.clone());
                Ok(json!({"success": true, "message": "Task created", "data": task}))
            }
            (Method::Put, Some(id)) => {
                let Some(pos) = find(&state.tasks, &id) else {
                    return Err(not_found());
                };
                let fields: Map<String, Value> = request
                    .body
                    .as_ref()
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                for (field, value) in fields {
                    state.tasks[pos][field] = value;
                }
                Ok(json!({"success": true, "data": state.tasks[pos]}))
            }
            (Method::Delete, Some(id)) => match find(&state.tasks, &id) {
                Some(pos) => {
                    state.tasks.remove(pos);
                    Ok(json!({"success": true, "message": "Task deleted"}))
                }
                None => Err(not_found()),
            },
            _ => Err(TransportError::Http {
                status: 405,
                body: None,
            }),
        }
    }
}

fn not_found() -> TransportError {
    TransportError::Http {
        status: 404,
        body: Some(json!({"message": "Task not found"})),
    }
}

/// Shares one server between the test and the client.
pub struct FakeTransport(pub Arc<FakeServer>);

impl Transport for FakeTransport {
    fn request(&self, request: ApiRequest) -> BoxFuture<'static, Result<Value, TransportError>> {
        let server = Arc::clone(&self.0);
        async move {
            if let Some(hold) = server.held(&request.path) {
                hold.acquire().await.expect("hold open").forget();
            } else if request.method != Method::Get
                && let Some(gate) = &server.write_gate
            {
                gate.acquire().await.expect("gate open").forget();
            }
            tokio::task::yield_now().await;
            server.answer(&request)
        }
        .boxed()
    }
}

pub fn task_json(id: u64, name: &str, status: &str) -> Value {
    json!({"id": id, "name": name, "status": status, "due_date": null})
}
