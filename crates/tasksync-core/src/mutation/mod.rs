//! Optimistic writes.
//!
//! [`MutationExecutor::begin`] patches every affected cache entry before the
//! request is sent. [`MutationExecutor::settle`] then either confirms the
//! write and invalidates the tags its kind declares, or removes exactly the
//! patches this mutation applied.

pub mod patch;

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use tracing::{info, warn};

use crate::cache::tags::{Tag, invalidate_tags};
use crate::cache::{FetchTicket, QueryCache};
use crate::error::ApiError;
use crate::model::{Status, Task, TaskChanges, TaskDraft, TaskId};
use crate::query::QueryKey;
use crate::transport::{ApiRequest, Method};
use crate::wire;
use patch::Patch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutationId(u64);

impl MutationId {
    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// The four writes the API supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    Create(TaskDraft),
    Update { id: TaskId, changes: TaskChanges },
    /// A field update restricted to `status`.
    Status { id: TaskId, status: Status },
    Delete { id: TaskId },
}

impl MutationKind {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Status { .. } => "status",
            Self::Delete { .. } => "delete",
        }
    }

    const fn target_id(&self) -> Option<&TaskId> {
        match self {
            Self::Create(_) => None,
            Self::Update { id, .. } | Self::Status { id, .. } | Self::Delete { id } => Some(id),
        }
    }

    fn validate(&self) -> Result<(), ApiError> {
        if let Some(id) = self.target_id()
            && id.is_pending()
        {
            return Err(ApiError::invalid_field(
                "id",
                format!("task {id} has not been saved by the server yet"),
            ));
        }
        match self {
            Self::Create(draft) => draft.validate(),
            Self::Update { changes, .. } => changes.validate(),
            Self::Status { .. } | Self::Delete { .. } => Ok(()),
        }
    }

    fn request(&self) -> ApiRequest {
        match self {
            Self::Create(draft) => {
                ApiRequest::with_body(Method::Post, "/tasks", Some(wire::draft_body(draft)))
            }
            Self::Update { id, changes } => ApiRequest::with_body(
                Method::Put,
                format!("/tasks/{id}"),
                Some(wire::changes_body(changes)),
            ),
            Self::Status { id, status } => ApiRequest::with_body(
                Method::Put,
                format!("/tasks/{id}"),
                Some(wire::changes_body(&TaskChanges::status(*status))),
            ),
            Self::Delete { id } => {
                ApiRequest::with_body(Method::Delete, format!("/tasks/{id}"), None)
            }
        }
    }

    fn optimistic_patch(&self, marker: MutationId) -> Patch {
        match self {
            Self::Create(draft) => Patch::Prepend(Task::pending(marker.get(), draft)),
            Self::Update { id, changes } => Patch::Merge {
                id: id.clone(),
                changes: changes.clone(),
            },
            Self::Status { id, status } => Patch::Merge {
                id: id.clone(),
                changes: TaskChanges::status(*status),
            },
            Self::Delete { id } => Patch::Remove { id: id.clone() },
        }
    }

    /// Entries the optimistic patch applies to.
    ///
    /// A create only touches collections; single-task entries for the new
    /// record are populated by the refetch its invalidation triggers.
    fn targets(&self, cache: &QueryCache) -> Vec<QueryKey> {
        match self {
            Self::Create(_) => cache.collection_keys(),
            Self::Update { id, .. } | Self::Status { id, .. } => {
                cache.keys_tagged(&Tag::Item(id.clone()))
            }
            Self::Delete { id } => cache
                .keys_tagged(&Tag::Item(id.clone()))
                .into_iter()
                .filter(QueryKey::is_collection)
                .collect(),
        }
    }

    /// Tags invalidated once the server confirms the write.
    #[must_use]
    pub fn invalidates(&self) -> Vec<Tag> {
        match self {
            Self::Create(_) | Self::Delete { .. } => vec![Tag::Collection],
            Self::Update { id, .. } | Self::Status { id, .. } => vec![Tag::Item(id.clone())],
        }
    }
}

/// A write whose response has not been processed yet.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    pub id: MutationId,
    pub kind: MutationKind,
    pub targets: Vec<QueryKey>,
    pub request: ApiRequest,
    pub attempts: u32,
}

/// Retries for writes that failed before reaching the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts allowed for idempotent writes.
    pub max_retries: u32,
}

impl RetryPolicy {
    #[must_use]
    pub const fn allows(&self, request: &ApiRequest, error: &ApiError, attempts: u32) -> bool {
        request.method.is_idempotent() && error.is_transient() && attempts <= self.max_retries
    }
}

/// What [`MutationExecutor::settle`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The server accepted the write. `task` is the server's record when
    /// the response carried one.
    Confirmed {
        task: Option<Task>,
        refetch: Vec<FetchTicket>,
    },
    /// The write failed; this mutation's patches were removed from
    /// `restored`.
    RolledBack {
        error: ApiError,
        restored: Vec<QueryKey>,
    },
    /// Send `request` again; patches stay in place.
    Retry { request: ApiRequest, attempt: u32 },
}

/// Outcome reported to the caller of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Confirmed(Option<Task>),
    RolledBack(ApiError),
    /// Refused locally; nothing was patched or sent.
    Rejected(ApiError),
}

impl MutationOutcome {
    /// # Errors
    ///
    /// Returns the failure for rolled-back and rejected writes.
    pub fn into_result(self) -> Result<Option<Task>, ApiError> {
        match self {
            Self::Confirmed(task) => Ok(task),
            Self::RolledBack(error) | Self::Rejected(error) => Err(error),
        }
    }

    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

#[derive(Debug, Default)]
pub struct MutationExecutor {
    next_id: u64,
    pending: BTreeMap<MutationId, PendingMutation>,
    retry: RetryPolicy,
}

impl MutationExecutor {
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn pending(&self) -> impl Iterator<Item = &PendingMutation> {
        self.pending.values()
    }

    #[must_use]
    pub fn is_pending(&self, id: MutationId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Validate, patch every target synchronously and return the request
    /// to send.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] without touching the cache when the
    /// write would be rejected anyway.
    pub fn begin(
        &mut self,
        cache: &mut QueryCache,
        kind: MutationKind,
    ) -> Result<(MutationId, ApiRequest), ApiError> {
        kind.validate()?;
        self.next_id += 1;
        let id = MutationId(self.next_id);

        let patch = kind.optimistic_patch(id);
        let targets = kind.targets(cache);
        for key in &targets {
            cache.apply_optimistic(key, id, &patch);
        }
        let request = kind.request();
        info!(mutation = %id, kind = kind.label(), targets = targets.len(), "mutation started");

        self.pending.insert(
            id,
            PendingMutation {
                id,
                kind,
                targets,
                request: request.clone(),
                attempts: 1,
            },
        );
        Ok((id, request))
    }

    /// Process the response to `id`'s request.
    ///
    /// Unknown ids (already settled) yield a rollback with no restored
    /// entries.
    pub fn settle(
        &mut self,
        cache: &mut QueryCache,
        id: MutationId,
        result: Result<Value, ApiError>,
    ) -> Settlement {
        let Some(mut pending) = self.pending.remove(&id) else {
            warn!(mutation = %id, "settle for unknown mutation");
            return Settlement::RolledBack {
                error: ApiError::Unknown {
                    status: None,
                    message: format!("mutation {id} is not pending"),
                },
                restored: Vec::new(),
            };
        };

        match result {
            Ok(body) => {
                let task = match &pending.kind {
                    MutationKind::Delete { .. } => None,
                    _ => match wire::decode_task(&body) {
                        Ok(task) => Some(task),
                        Err(err) => {
                            warn!(mutation = %id, error = %err, "write confirmed without a usable record");
                            None
                        }
                    },
                };
                let replacement = task.as_ref().map(|task| match &pending.kind {
                    MutationKind::Create(_) => Patch::Prepend(task.clone()),
                    _ => Patch::Replace(task.clone()),
                });
                cache.confirm_patch(id, replacement.as_ref());
                let refetch = invalidate_tags(cache, &pending.kind.invalidates());
                info!(mutation = %id, kind = pending.kind.label(), refetch = refetch.len(), "mutation confirmed");
                Settlement::Confirmed { task, refetch }
            }
            Err(error) => {
                if self.retry.allows(&pending.request, &error, pending.attempts) {
                    pending.attempts += 1;
                    let attempt = pending.attempts;
                    let request = pending.request.clone();
                    warn!(mutation = %id, attempt, error = %error, "retrying write");
                    self.pending.insert(id, pending);
                    return Settlement::Retry { request, attempt };
                }
                let restored = cache.rollback_patch(id);
                warn!(
                    mutation = %id,
                    kind = pending.kind.label(),
                    error = %error,
                    restored = restored.len(),
                    "mutation rolled back"
                );
                Settlement::RolledBack { error, restored }
            }
        }
    }
}

impl Settlement {
    /// The caller-facing outcome, or `None` while a retry is pending.
    #[must_use]
    pub fn into_outcome(self) -> Option<MutationOutcome> {
        match self {
            Self::Confirmed { task, .. } => Some(MutationOutcome::Confirmed(task)),
            Self::RolledBack { error, .. } => Some(MutationOutcome::RolledBack(error)),
            Self::Retry { .. } => None,
        }
    }
}
