//! Async facade over the sans-IO engine.
//!
//! All engine state sits behind one lock that is never held across an
//! `.await`; suspension happens only while the transport runs. Every write
//! to the cache bumps a revision published on a [`watch`] channel so views
//! can re-read.
//!
//! Requests and writes are detached onto the current tokio runtime, so a
//! caller that stops waiting never leaves a response uncached or a patch
//! unsettled. Without a runtime they run when something awaits them
//! ([`TaskClient::idle`] included).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::board::{Board, BoardGrouping};
use crate::cache::{FetchPlan, FetchTicket, QueryCache, QueryState};
use crate::config::EngineConfig;
use crate::error::ApiError;
use crate::filters::{FilterController, KeyChange};
use crate::model::{Status, Task, TaskChanges, TaskDraft, TaskId};
use crate::mutation::{MutationExecutor, MutationId, MutationKind, MutationOutcome, Settlement};
use crate::query::{FilterChange, QueryKey, TaskFilter};
use crate::transport::{ApiRequest, AuthState, Transport};

type SharedFetch = Shared<BoxFuture<'static, Result<(), ApiError>>>;
type SharedWrite = Shared<BoxFuture<'static, MutationOutcome>>;

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

/// Run `future` on the current runtime, if there is one.
fn detach<F>(future: F)
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(future);
        }
        Err(_) => debug!("no async runtime, request runs once awaited"),
    }
}

struct State {
    cache: QueryCache,
    executor: MutationExecutor,
    board: Board,
    filters: FilterController,
    /// Key of the list view; the client holds one subscription on it.
    active: QueryKey,
    fetches: HashMap<FetchTicket, SharedFetch>,
    writes: HashMap<MutationId, SharedWrite>,
    had_token: bool,
    revision: u64,
}

struct Inner {
    state: Mutex<State>,
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthState>,
    changes: watch::Sender<u64>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, state: &mut State) {
        state.revision += 1;
        self.changes.send_replace(state.revision);
    }

    /// Drop everything learned under the rejected credentials.
    fn session_lost(&self, state: &mut State) {
        warn!("credentials rejected or gone, clearing cached data");
        self.auth.session_rejected();
        state.had_token = false;
        state.cache.clear();
        state.fetches.clear();
        state.board = Board::new();
    }

    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        debug!(request = %request, "sending");
        self.transport
            .request(request)
            .await
            .map_err(ApiError::from)
    }

    fn start_fetch(self: &Arc<Self>, state: &mut State, ticket: FetchTicket) -> SharedFetch {
        let inner = Arc::clone(self);
        let run = ticket.clone();
        let fetch = async move { inner.run_fetch(run).await }.boxed().shared();
        state.fetches.insert(ticket, fetch.clone());
        fetch
    }

    fn spawn_fetches(self: &Arc<Self>, state: &mut State, tickets: Vec<FetchTicket>) {
        for ticket in tickets {
            detach(self.start_fetch(state, ticket));
        }
    }

    async fn run_fetch(self: Arc<Self>, ticket: FetchTicket) -> Result<(), ApiError> {
        let result = self
            .send(ticket.key.request())
            .await
            .and_then(|body| ticket.key.decode(&body));
        let outcome = result.as_ref().map(|_| ()).map_err(ApiError::clone);

        let follow_up = {
            let mut state = self.lock();
            state.fetches.remove(&ticket);
            let next = state.cache.complete(&ticket, result, now());
            if outcome.as_ref().is_err_and(ApiError::is_auth) {
                self.session_lost(&mut state);
                None
            } else {
                let next = next.map(|t| self.start_fetch(&mut state, t));
                self.notify(&mut state);
                next
            }
        };

        match follow_up {
            Some(next) => next.await,
            None => outcome,
        }
    }

    /// Send, retry and settle one write. Runs detached from its caller.
    async fn run_write(
        self: Arc<Self>,
        id: MutationId,
        mut request: ApiRequest,
    ) -> MutationOutcome {
        loop {
            let result = self.send(request).await;
            match self.settle(id, result) {
                Settlement::Retry { request: again, .. } => request = again,
                settled => {
                    return settled.into_outcome().unwrap_or_else(|| {
                        MutationOutcome::RolledBack(ApiError::malformed("unsettled mutation"))
                    });
                }
            }
        }
    }

    fn settle(self: &Arc<Self>, id: MutationId, result: Result<Value, ApiError>) -> Settlement {
        let auth_failure = result.as_ref().is_err_and(ApiError::is_auth);
        let mut state = self.lock();
        let settlement = {
            let State {
                cache, executor, ..
            } = &mut *state;
            executor.settle(cache, id, result)
        };
        if matches!(settlement, Settlement::Retry { .. }) {
            return settlement;
        }
        state.writes.remove(&id);
        state.board.settle(id);
        if auth_failure {
            self.session_lost(&mut state);
        } else if let Settlement::Confirmed { refetch, .. } = &settlement {
            self.spawn_fetches(&mut state, refetch.clone());
        }
        self.notify(&mut state);
        settlement
    }

    /// Move the list subscription from `change.previous` to
    /// `change.current` and fetch the new key if it is not fresh.
    fn switch_key(self: &Arc<Self>, state: &mut State, change: &KeyChange) {
        state.cache.subscribe(&change.current);
        state.cache.unsubscribe(&change.previous, now());
        state.active = change.current.clone();
        if let FetchPlan::Issue(ticket) = state.cache.fetch(&change.current, now()) {
            self.spawn_fetches(state, vec![ticket]);
        }
        self.notify(state);
    }
}

/// Subscription to one query. Dropping it releases the subscription.
pub struct QueryHandle {
    inner: Arc<Inner>,
    key: QueryKey,
}

impl QueryHandle {
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> QueryState {
        self.inner.lock().cache.read(&self.key)
    }

    /// Wait for the current request for this key, starting one if the
    /// entry is not fresh.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure; previously cached data stays readable.
    pub async fn refresh(&self) -> Result<QueryState, ApiError> {
        fetch_key(&self.inner, &self.key).await
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        self.inner.lock().cache.unsubscribe(&self.key, now());
    }
}

async fn fetch_key(inner: &Arc<Inner>, key: &QueryKey) -> Result<QueryState, ApiError> {
    let pending = {
        let mut state = inner.lock();
        match state.cache.fetch(key, now()) {
            FetchPlan::Fresh => None,
            FetchPlan::InFlight(ticket) => state.fetches.get(&ticket).cloned(),
            FetchPlan::Issue(ticket) => {
                let fetch = inner.start_fetch(&mut state, ticket);
                detach(fetch.clone());
                Some(fetch)
            }
        }
    };
    if let Some(fetch) = pending {
        fetch.await?;
    }
    Ok(inner.lock().cache.read(key))
}

/// Cache, mutation executor, board and filter controller behind one handle.
#[derive(Clone)]
pub struct TaskClient {
    inner: Arc<Inner>,
}

impl TaskClient {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: Arc<dyn AuthState>,
        config: &EngineConfig,
        filter: TaskFilter,
    ) -> Self {
        let filters = FilterController::new(filter, config.search_debounce());
        let active = filters.current_key();
        let mut cache = QueryCache::new(config.cache_policy());
        cache.subscribe(&active);
        let (changes, _) = watch::channel(0);
        let had_token = auth.has_token();
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    cache,
                    executor: MutationExecutor::new(config.retry_policy()),
                    board: Board::new(),
                    filters,
                    active,
                    fetches: HashMap::new(),
                    writes: HashMap::new(),
                    had_token,
                    revision: 0,
                }),
                transport,
                auth,
                changes,
            }),
        }
    }

    /// Revision counter bumped on every cache write.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    /// Subscribe to `key` and start loading it in the background if needed.
    ///
    /// Outside a tokio runtime the load is only registered; it runs on the
    /// next [`TaskClient::fetch`], [`QueryHandle::refresh`] or
    /// [`TaskClient::idle`].
    #[must_use]
    pub fn use_query(&self, key: QueryKey) -> QueryHandle {
        {
            let mut state = self.inner.lock();
            state.cache.subscribe(&key);
            if let FetchPlan::Issue(ticket) = state.cache.fetch(&key, now()) {
                self.inner.spawn_fetches(&mut state, vec![ticket]);
            }
        }
        QueryHandle {
            inner: Arc::clone(&self.inner),
            key,
        }
    }

    /// Load `key` unless fresh data is cached, joining any request already
    /// running for it.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure.
    pub async fn fetch(&self, key: &QueryKey) -> Result<QueryState, ApiError> {
        fetch_key(&self.inner, key).await
    }

    #[must_use]
    pub fn read(&self, key: &QueryKey) -> QueryState {
        self.inner.lock().cache.read(key)
    }

    /// The list view's current key.
    #[must_use]
    pub fn active_key(&self) -> QueryKey {
        self.inner.lock().active.clone()
    }

    #[must_use]
    pub fn filter(&self) -> TaskFilter {
        self.inner.lock().filters.filter().clone()
    }

    /// Fetch the list view's current key.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure.
    pub async fn list(&self) -> Result<QueryState, ApiError> {
        let key = self.active_key();
        self.fetch(&key).await
    }

    /// Wait until no fetch or write is running.
    pub async fn idle(&self) {
        loop {
            let (writes, fetches): (Vec<SharedWrite>, Vec<SharedFetch>) = {
                let state = self.inner.lock();
                (
                    state.writes.values().cloned().collect(),
                    state.fetches.values().cloned().collect(),
                )
            };
            if writes.is_empty() && fetches.is_empty() {
                return;
            }
            for write in writes {
                write.await;
            }
            for fetch in fetches {
                let _ = fetch.await;
            }
        }
    }

    /// Patch the cache and start the write. Dropping the returned future
    /// does not cancel the write; it still settles in the background.
    async fn mutate(&self, kind: MutationKind, from_drop: bool) -> MutationOutcome {
        let write = {
            let mut state = self.inner.lock();
            let State {
                cache, executor, board, ..
            } = &mut *state;
            let (id, request) = match executor.begin(cache, kind.clone()) {
                Ok(started) => started,
                Err(error) => {
                    debug!(error = %error, "mutation rejected before sending");
                    return MutationOutcome::Rejected(error);
                }
            };
            if from_drop && let MutationKind::Status { id: task, status } = &kind {
                board.track(id, task.clone(), *status);
            }
            let inner = Arc::clone(&self.inner);
            let write = inner.run_write(id, request).boxed().shared();
            state.writes.insert(id, write.clone());
            self.inner.notify(&mut state);
            write
        };
        detach(write.clone());
        write.await
    }

    pub async fn mutate_create(&self, draft: TaskDraft) -> MutationOutcome {
        self.mutate(MutationKind::Create(draft), false).await
    }

    pub async fn mutate_update(&self, id: TaskId, changes: TaskChanges) -> MutationOutcome {
        self.mutate(MutationKind::Update { id, changes }, false).await
    }

    pub async fn mutate_status(&self, id: TaskId, status: Status) -> MutationOutcome {
        self.mutate(MutationKind::Status { id, status }, false).await
    }

    pub async fn mutate_delete(&self, id: TaskId) -> MutationOutcome {
        self.mutate(MutationKind::Delete { id }, false).await
    }

    /// Apply structured filter changes now. Returns the list key in effect.
    pub fn set_filters(&self, changes: impl IntoIterator<Item = FilterChange>) -> QueryKey {
        let mut state = self.inner.lock();
        if let Some(change) = state.filters.set_filters(changes) {
            self.inner.switch_key(&mut state, &change);
        }
        state.active.clone()
    }

    pub fn clear_filters(&self) -> QueryKey {
        let mut state = self.inner.lock();
        if let Some(change) = state.filters.clear() {
            self.inner.switch_key(&mut state, &change);
        }
        state.active.clone()
    }

    /// Record search input; it applies once typing pauses.
    pub fn input_search(&self, text: impl Into<String>) {
        self.inner.lock().filters.input_search(text, now());
    }

    /// Apply a due search. Returns the new key when it changed.
    pub fn tick(&self) -> Option<QueryKey> {
        let mut state = self.inner.lock();
        let change = state.filters.poll(now())?;
        self.inner.switch_key(&mut state, &change);
        Some(change.current)
    }

    /// Sleep until pending search input is due, then apply it.
    pub async fn settle_search(&self) -> Option<QueryKey> {
        loop {
            let deadline = self.inner.lock().filters.deadline()?;
            tokio::time::sleep_until(Instant::from_std(deadline)).await;
            if let Some(key) = self.tick() {
                return Some(key);
            }
        }
    }

    /// Board grouping of the list view, pending moves included.
    #[must_use]
    pub fn board_view(&self) -> BoardGrouping {
        let state = self.inner.lock();
        let data = state.cache.entry(&state.active).and_then(|e| e.data());
        state.board.view(data)
    }

    /// Start dragging `id` if the list view shows it.
    pub fn begin_drag(&self, id: &TaskId) -> bool {
        let mut state = self.inner.lock();
        let task: Option<Task> = state
            .cache
            .entry(&state.active)
            .and_then(|e| e.data())
            .and_then(|data| data.tasks().iter().find(|t| &t.id == id).cloned());
        match task {
            Some(task) => {
                state.board.begin_drag(&task);
                true
            }
            None => false,
        }
    }

    pub fn drag_over(&self, column: Option<Status>) {
        self.inner.lock().board.drag_over(column);
    }

    pub fn cancel_drag(&self) {
        self.inner.lock().board.cancel_drag();
    }

    /// Finish the drag. `None` when no status change was needed.
    pub async fn complete_drop(&self, target: Option<Status>) -> Option<MutationOutcome> {
        let kind = self.inner.lock().board.complete_drop(target)?;
        Some(self.mutate(kind, true).await)
    }

    /// React to the auth collaborator: clear everything when the token is
    /// gone, refetch subscribed queries when it comes back.
    pub fn sync_auth(&self) {
        let present = self.inner.auth.has_token();
        let mut state = self.inner.lock();
        match (state.had_token, present) {
            (true, false) => {
                state.had_token = false;
                state.cache.clear();
                state.fetches.clear();
                state.board = Board::new();
                info!("token gone, cache cleared");
                self.inner.notify(&mut state);
            }
            (false, true) => {
                state.had_token = true;
                let tickets = state.cache.invalidate_matching(|_| true);
                info!(refetch = tickets.len(), "token available, refetching");
                self.inner.spawn_fetches(&mut state, tickets);
                self.inner.notify(&mut state);
            }
            _ => {}
        }
    }

    /// Drop unused entries past their retention.
    pub fn collect_garbage(&self) -> Vec<QueryKey> {
        let mut state = self.inner.lock();
        let collected = state.cache.collect_garbage(now());
        if !collected.is_empty() {
            self.inner.notify(&mut state);
        }
        collected
    }
}
