#![forbid(unsafe_code)]
//! Deterministic simulation of the tasksync engine against a faulty API.
//!
//! The engine's sans-IO core ([`QueryCache`], [`MutationExecutor`],
//! [`FilterController`], [`Board`]) is driven round by round with
//! seeded random user actions while a [`SimulatedNetwork`] delays, loses
//! and reorders exchanges with a [`SimulatedServer`]. After the last
//! round the link is made reliable, drained, every entry is invalidated
//! and drained again; [`oracle::ConsistencyOracle`] then checks that what
//! subscribers see matches the server.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod campaign;
pub mod network;
pub mod oracle;
pub mod rng;
pub mod server;

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tasksync_core::board::{Board, BoardGrouping};
use tasksync_core::cache::tags::{Tag, invalidate_tags};
use tasksync_core::cache::{CacheEntry, CachePolicy, FetchPlan, FetchStatus, FetchTicket, QueryCache};
use tasksync_core::error::ApiError;
use tasksync_core::filters::{FilterController, KeyChange};
use tasksync_core::model::{QueryData, Status, Task, TaskChanges, TaskDraft, TaskId};
use tasksync_core::mutation::{MutationExecutor, MutationId, MutationKind, RetryPolicy, Settlement};
use tasksync_core::query::{FilterChange, QueryKey, SortField, TaskFilter};
use tasksync_core::transport::{ApiRequest, TransportError};
use tracing::{debug, info};

use network::{Delivery, Exchange, FaultConfig, SimulatedNetwork};
use rng::DeterministicRng;
use server::SimulatedServer;

/// Simulated wall-clock time per round.
pub const ROUND: Duration = Duration::from_millis(100);

const SEARCH_TERMS: [&str; 5] = ["seed", "task 1", "sim", "", "renamed"];
const PAGE_SIZES: [u32; 3] = [3, 5, 10];
const SORT_FIELDS: [SortField; 3] = [SortField::CreatedAt, SortField::Name, SortField::DueDate];

fn rounds(n: u64) -> Duration {
    ROUND.saturating_mul(u32::try_from(n).unwrap_or(u32::MAX))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    pub rounds: u64,
    pub actions_per_round: u8,
    pub initial_tasks: usize,
    pub fault: FaultConfig,
    pub mutation_retries: u32,
    /// Unused entries are collected after this many rounds.
    pub retention_rounds: u64,
    pub search_debounce_rounds: u64,
    /// Upper bound on rounds spent draining the link at the end.
    pub drain_limit: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            rounds: 40,
            actions_per_round: 2,
            initial_tasks: 6,
            fault: FaultConfig::default(),
            mutation_retries: 1,
            retention_rounds: 8,
            search_debounce_rounds: 3,
            drain_limit: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEventKind {
    KeyChanged { key: String },
    QueryOpened { key: String },
    QueryClosed { key: String },
    FetchIssued { key: String, epoch: u64 },
    FetchCompleted { key: String, ok: bool },
    MutationBegun { mutation: u64, kind: String },
    MutationRejected { kind: String, reason: String },
    MutationRetried { mutation: u64, attempt: u32 },
    MutationConfirmed { mutation: u64 },
    MutationRolledBack { mutation: u64, error: String },
    RequestLost,
    ResponseTimedOut,
    ServerFailed,
    Collected { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub round: u64,
    #[serde(flatten)]
    pub kind: TraceEventKind,
}

/// Counters over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub fetches_issued: u64,
    pub mutations_begun: u64,
    pub confirmed: u64,
    pub rolled_back: u64,
    pub rejected: u64,
    pub retries: u64,
    pub reorders: u64,
    pub lost_requests: u64,
    pub timeouts: u64,
    /// Rollbacks that happened while another mutation was still pending.
    pub overlapping_rollbacks: u64,
    pub collected: u64,
    pub server_writes: u64,
}

/// One cache entry as it stood at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub key: QueryKey,
    pub status: FetchStatus,
    pub data: Option<QueryData>,
    pub error: Option<ApiError>,
    pub subscribers: usize,
    pub patches: usize,
    pub unconfirmed: usize,
    pub in_flight: bool,
}

impl EntrySnapshot {
    fn capture(entry: &CacheEntry) -> Self {
        Self {
            key: entry.key().clone(),
            status: entry.status(),
            data: entry.data().cloned(),
            error: entry.error().cloned(),
            subscribers: entry.subscribers(),
            patches: entry.patch_owners().count(),
            unconfirmed: entry.unconfirmed_patches(),
            in_flight: entry.in_flight().is_some(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub seed: u64,
    pub rounds_run: u64,
    pub trace: Vec<TraceEvent>,
    pub entries: Vec<EntrySnapshot>,
    /// The server's answer for every subscribed key, by key.
    pub expected: BTreeMap<String, Result<QueryData, ApiError>>,
    /// How often each `(key, epoch)` generation was requested.
    pub fetch_counts: BTreeMap<(String, u64), usize>,
    pub pending_mutations: usize,
    pub pending_moves: bool,
    pub active_key: String,
    pub board: BoardGrouping,
    pub board_source: Vec<Task>,
    pub stats: SimulationStats,
}

impl SimulationResult {
    /// Whether the run hit a state worth counting: a rollback under
    /// concurrent writes, or reordered responses alongside a rollback.
    #[must_use]
    pub const fn interesting(&self) -> bool {
        self.stats.overlapping_rollbacks > 0
            || (self.stats.reorders > 0 && self.stats.rolled_back > 0)
    }
}

pub struct Simulator {
    config: SimulationConfig,
    rng: DeterministicRng,
    server: SimulatedServer,
    network: SimulatedNetwork,
    cache: QueryCache,
    executor: MutationExecutor,
    filters: FilterController,
    board: Board,
    active: QueryKey,
    details: Vec<QueryKey>,
    base: Instant,
    round: u64,
    renames: u64,
    trace: Vec<TraceEvent>,
    fetch_counts: BTreeMap<(String, u64), usize>,
    stats: SimulationStats,
}

impl Simulator {
    /// # Errors
    ///
    /// Returns an error if the configuration cannot drive a run.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if config.drain_limit == 0 {
            bail!("drain_limit must be at least 1");
        }
        let mut rng = DeterministicRng::new(config.seed);
        let server = SimulatedServer::seeded(config.initial_tasks, &mut rng);
        let cache = QueryCache::new(CachePolicy {
            retention: rounds(config.retention_rounds),
            stale_after: None,
        });
        let executor = MutationExecutor::new(RetryPolicy {
            max_retries: config.mutation_retries,
        });
        let filters = FilterController::new(
            TaskFilter::default(),
            rounds(config.search_debounce_rounds),
        );
        let active = filters.current_key();
        Ok(Self {
            network: SimulatedNetwork::new(config.fault),
            config,
            rng,
            server,
            cache,
            executor,
            filters,
            board: Board::new(),
            active,
            details: Vec::new(),
            base: Instant::now(),
            round: 0,
            renames: 0,
            trace: Vec::new(),
            fetch_counts: BTreeMap::new(),
            stats: SimulationStats::default(),
        })
    }

    /// Run all rounds, settle, and snapshot the final state.
    ///
    /// # Errors
    ///
    /// Returns an error if the link does not go quiet within `drain_limit`
    /// rounds once faults are switched off.
    pub fn run(&mut self) -> Result<SimulationResult> {
        info!(
            seed = self.config.seed,
            rounds = self.config.rounds,
            tasks = self.server.len(),
            "simulation started"
        );
        let active = self.active.clone();
        self.cache.subscribe(&active);
        self.request_fetch(&active);

        for round in 0..self.config.rounds {
            self.round = round;
            for _ in 0..self.config.actions_per_round {
                self.step();
            }
            let now = self.now();
            if let Some(change) = self.filters.poll(now) {
                self.switch_key(change);
            }
            self.deliver();
            for key in self.cache.collect_garbage(now) {
                self.stats.collected += 1;
                self.record(TraceEventKind::Collected {
                    key: key.to_string(),
                });
            }
        }

        self.network.set_fault(FaultConfig::reliable());
        self.board.cancel_drag();
        if let Some(change) = self.filters.flush() {
            self.switch_key(change);
        }
        self.drain()?;
        self.refresh();
        self.drain()?;

        let result = self.snapshot();
        info!(
            seed = result.seed,
            rounds = result.rounds_run,
            fetches = result.stats.fetches_issued,
            mutations = result.stats.mutations_begun,
            rolled_back = result.stats.rolled_back,
            "simulation finished"
        );
        Ok(result)
    }

    fn now(&self) -> Instant {
        self.base
            .checked_add(rounds(self.round))
            .unwrap_or(self.base)
    }

    fn record(&mut self, kind: TraceEventKind) {
        self.trace.push(TraceEvent {
            round: self.round,
            kind,
        });
    }

    fn visible(&self) -> Vec<Task> {
        self.cache
            .read(&self.active)
            .data
            .map(|data| data.tasks().to_vec())
            .unwrap_or_default()
    }

    fn pick_visible(&mut self) -> Option<Task> {
        let visible = self.visible();
        self.rng.choose(&visible).cloned()
    }

    fn random_status(&mut self) -> Status {
        self.rng.choose(&Status::ALL).copied().unwrap_or(Status::ToDo)
    }

    fn random_date(&mut self) -> Option<NaiveDate> {
        let day = u32::try_from(self.rng.next_bounded(28)).ok()? + 1;
        NaiveDate::from_ymd_opt(2025, 6, day)
    }

    fn step(&mut self) {
        match self.rng.next_bounded(12) {
            0 | 1 => self.change_filter(),
            2 => self.type_search(),
            3 => self.open_detail(),
            4 => self.close_detail(),
            5 | 6 => self.create(),
            7 => self.update(),
            8 => self.change_status(),
            9 => self.delete(),
            _ => self.drag(),
        }
    }

    fn change_filter(&mut self) {
        let change = match self.rng.next_bounded(5) {
            0 => {
                let status = self.random_status();
                FilterChange::Status(self.rng.flip().then_some(status))
            }
            1 => FilterChange::ToggleSort(
                self.rng
                    .choose(&SORT_FIELDS)
                    .copied()
                    .unwrap_or(SortField::CreatedAt),
            ),
            2 => FilterChange::Page(u32::try_from(self.rng.next_bounded(3) + 1).ok()),
            3 => FilterChange::PerPage(self.rng.choose(&PAGE_SIZES).copied().unwrap_or(10)),
            _ => {
                if let Some(change) = self.filters.clear() {
                    self.switch_key(change);
                }
                return;
            }
        };
        if let Some(change) = self.filters.set_filters([change]) {
            self.switch_key(change);
        }
    }

    fn type_search(&mut self) {
        let text = self.rng.choose(&SEARCH_TERMS).copied().unwrap_or_default();
        let now = self.now();
        self.filters.input_search(text, now);
    }

    fn switch_key(&mut self, change: KeyChange) {
        let now = self.now();
        let KeyChange { previous, current } = change;
        self.cache.subscribe(&current);
        self.cache.unsubscribe(&previous, now);
        self.record(TraceEventKind::KeyChanged {
            key: current.to_string(),
        });
        self.request_fetch(&current);
        self.active = current;
    }

    fn open_detail(&mut self) {
        let mut ids = self.server.ids();
        ids.push(9_999);
        let Some(id) = self.rng.choose(&ids).copied() else {
            return;
        };
        let key = QueryKey::Task(TaskId::from(id));
        self.cache.subscribe(&key);
        self.record(TraceEventKind::QueryOpened {
            key: key.to_string(),
        });
        self.request_fetch(&key);
        self.details.push(key);
    }

    fn close_detail(&mut self) {
        let Ok(len) = u64::try_from(self.details.len()) else {
            return;
        };
        if len == 0 {
            return;
        }
        let Ok(index) = usize::try_from(self.rng.next_bounded(len)) else {
            return;
        };
        let key = self.details.swap_remove(index);
        let now = self.now();
        self.cache.unsubscribe(&key, now);
        self.record(TraceEventKind::QueryClosed {
            key: key.to_string(),
        });
    }

    fn create(&mut self) {
        self.renames += 1;
        let name = if self.rng.hit(5) {
            "  ".to_string()
        } else {
            format!("sim task {}", self.renames)
        };
        let status = self.random_status();
        let due_date = if self.rng.flip() { self.random_date() } else { None };
        let draft = TaskDraft {
            status: self.rng.flip().then_some(status),
            due_date,
            ..TaskDraft::named(name)
        };
        self.begin(MutationKind::Create(draft), None);
    }

    fn update(&mut self) {
        let Some(task) = self.pick_visible() else {
            return;
        };
        self.renames += 1;
        let changes = match self.rng.next_bounded(3) {
            0 => TaskChanges {
                name: Some(format!("renamed {}", self.renames)),
                ..TaskChanges::default()
            },
            1 => TaskChanges {
                description: Some(self.rng.flip().then(|| "note".to_string())),
                ..TaskChanges::default()
            },
            _ => TaskChanges {
                due_date: Some(self.random_date()),
                ..TaskChanges::default()
            },
        };
        self.begin(
            MutationKind::Update {
                id: task.id,
                changes,
            },
            None,
        );
    }

    fn change_status(&mut self) {
        let Some(task) = self.pick_visible() else {
            return;
        };
        let status = self.random_status();
        self.begin(MutationKind::Status { id: task.id, status }, None);
    }

    fn delete(&mut self) {
        let Some(task) = self.pick_visible() else {
            return;
        };
        self.begin(MutationKind::Delete { id: task.id }, None);
    }

    fn drag(&mut self) {
        let Some(task) = self.pick_visible() else {
            return;
        };
        self.board.begin_drag(&task);
        let target = if self.rng.hit(10) {
            None
        } else {
            Some(self.random_status())
        };
        self.board.drag_over(target);
        if self.rng.hit(10) {
            self.board.cancel_drag();
            return;
        }
        // Released over whichever column the card was last dragged across.
        let released = self.board.hovered();
        let Some(kind) = self.board.complete_drop(released) else {
            return;
        };
        let moved = match &kind {
            MutationKind::Status { id, status } => Some((id.clone(), *status)),
            _ => None,
        };
        self.begin(kind, moved);
    }

    fn begin(&mut self, kind: MutationKind, moved: Option<(TaskId, Status)>) {
        let label = kind.label().to_string();
        match self.executor.begin(&mut self.cache, kind) {
            Ok((id, request)) => {
                if let Some((task, to)) = moved {
                    self.board.track(id, task, to);
                }
                self.stats.mutations_begun += 1;
                self.record(TraceEventKind::MutationBegun {
                    mutation: id.get(),
                    kind: label,
                });
                self.send(Exchange::Mutation(id), request);
            }
            Err(error) => {
                self.stats.rejected += 1;
                self.record(TraceEventKind::MutationRejected {
                    kind: label,
                    reason: error.to_string(),
                });
            }
        }
    }

    fn send(&mut self, exchange: Exchange, request: ApiRequest) {
        let sent = self
            .network
            .send(exchange, request, self.round, &mut self.rng);
        if sent.lost {
            self.stats.lost_requests += 1;
            self.record(TraceEventKind::RequestLost);
        }
    }

    fn request_fetch(&mut self, key: &QueryKey) {
        let now = self.now();
        if let FetchPlan::Issue(ticket) = self.cache.fetch(key, now) {
            self.dispatch(ticket);
        }
    }

    fn dispatch(&mut self, ticket: FetchTicket) {
        let key = ticket.key.to_string();
        *self
            .fetch_counts
            .entry((key.clone(), ticket.epoch))
            .or_default() += 1;
        self.stats.fetches_issued += 1;
        self.record(TraceEventKind::FetchIssued {
            key,
            epoch: ticket.epoch,
        });
        let request = ticket.key.request();
        self.send(Exchange::Fetch(ticket), request);
    }

    fn deliver(&mut self) {
        let outcome = self.network.deliver_ready(self.round, &mut self.rng);
        if outcome.reordered {
            self.stats.reorders += 1;
        }
        for delivery in outcome.delivered {
            match delivery {
                Delivery::Request { exchange, request } => self.serve(exchange, &request),
                Delivery::Response {
                    exchange: Exchange::Fetch(ticket),
                    result,
                } => self.finish_fetch(&ticket, result),
                Delivery::Response {
                    exchange: Exchange::Mutation(id),
                    result,
                } => self.finish_mutation(id, result),
            }
        }
    }

    fn serve(&mut self, exchange: Exchange, request: &ApiRequest) {
        let fault = self.network.fault();
        let mut result = if self.rng.hit(fault.server_error_rate_percent) {
            self.record(TraceEventKind::ServerFailed);
            Err(TransportError::Http {
                status: 500,
                body: Some(json!({"message": "Server Error"})),
            })
        } else {
            self.server.handle(request)
        };
        if self.rng.hit(fault.timeout_rate_percent) {
            self.stats.timeouts += 1;
            self.record(TraceEventKind::ResponseTimedOut);
            result = Err(TransportError::Timeout);
        }
        debug!(request = %request, ok = result.is_ok(), "served");
        self.network.respond(exchange, result, self.round, &mut self.rng);
    }

    fn finish_fetch(&mut self, ticket: &FetchTicket, result: Result<Value, TransportError>) {
        let decoded = result
            .map_err(ApiError::from)
            .and_then(|body| ticket.key.decode(&body));
        self.record(TraceEventKind::FetchCompleted {
            key: ticket.key.to_string(),
            ok: decoded.is_ok(),
        });
        let now = self.now();
        if let Some(next) = self.cache.complete(ticket, decoded, now) {
            self.dispatch(next);
        }
    }

    fn finish_mutation(&mut self, id: MutationId, result: Result<Value, TransportError>) {
        let settlement = self
            .executor
            .settle(&mut self.cache, id, result.map_err(ApiError::from));
        match settlement {
            Settlement::Retry { request, attempt } => {
                self.stats.retries += 1;
                self.record(TraceEventKind::MutationRetried {
                    mutation: id.get(),
                    attempt,
                });
                self.send(Exchange::Mutation(id), request);
            }
            Settlement::Confirmed { refetch, .. } => {
                self.board.settle(id);
                self.stats.confirmed += 1;
                self.record(TraceEventKind::MutationConfirmed { mutation: id.get() });
                for ticket in refetch {
                    self.dispatch(ticket);
                }
            }
            Settlement::RolledBack { error, .. } => {
                self.board.settle(id);
                self.stats.rolled_back += 1;
                if self.executor.pending().next().is_some() {
                    self.stats.overlapping_rollbacks += 1;
                }
                self.record(TraceEventKind::MutationRolledBack {
                    mutation: id.get(),
                    error: error.to_string(),
                });
            }
        }
    }

    fn drain(&mut self) -> Result<()> {
        for _ in 0..self.config.drain_limit {
            if self.network.is_idle() && self.executor.pending().next().is_none() {
                return Ok(());
            }
            self.round += 1;
            self.deliver();
        }
        bail!(
            "link still busy after {} drain rounds ({} in transit, {} mutations pending)",
            self.config.drain_limit,
            self.network.in_transit(),
            self.executor.pending().count()
        )
    }

    /// Invalidate every entry so subscribed ones refetch from the settled
    /// server.
    fn refresh(&mut self) {
        let tags: BTreeSet<Tag> = self.cache.entries().flat_map(CacheEntry::tags).collect();
        for ticket in invalidate_tags(&mut self.cache, &tags) {
            self.dispatch(ticket);
        }
    }

    fn snapshot(&mut self) -> SimulationResult {
        let entries: Vec<EntrySnapshot> = self.cache.entries().map(EntrySnapshot::capture).collect();
        let mut expected = BTreeMap::new();
        for entry in entries.iter().filter(|e| e.subscribers > 0) {
            let answer = self
                .server
                .handle(&entry.key.request())
                .map_err(ApiError::from)
                .and_then(|body| entry.key.decode(&body));
            expected.insert(entry.key.to_string(), answer);
        }

        let active = self.cache.read(&self.active).data;
        let mut stats = self.stats;
        stats.server_writes = self.server.writes_applied();
        SimulationResult {
            seed: self.config.seed,
            rounds_run: self.round + 1,
            trace: std::mem::take(&mut self.trace),
            entries,
            expected,
            fetch_counts: self.fetch_counts.clone(),
            pending_mutations: self.executor.pending().count(),
            pending_moves: self.board.has_pending_moves(),
            active_key: self.active.to_string(),
            board: self.board.view(active.as_ref()),
            board_source: active.map(|d| d.tasks().to_vec()).unwrap_or_default(),
            stats,
        }
    }
}
