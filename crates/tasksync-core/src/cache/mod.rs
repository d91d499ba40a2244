//! Query-keyed cache of server results.
//!
//! The cache never performs I/O. [`QueryCache::fetch`] decides whether a
//! request is needed and hands out a [`FetchTicket`]; whoever runs the
//! request reports back through [`QueryCache::complete`]. Only the ticket
//! holder may complete a fetch, which is what keeps each key to one request
//! in flight.
//!
//! An entry's visible `data` is its last server result (`base`) with every
//! outstanding optimistic patch replayed on top, in issue order.

pub mod tags;

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::ApiError;
use crate::model::QueryData;
use crate::mutation::MutationId;
use crate::mutation::patch::Patch;
use crate::query::QueryKey;
use tags::{Tag, tags_for};

/// How long an unsubscribed entry survives before garbage collection.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub retention: Duration,
    /// Age after which a successful result is treated as stale. `None`
    /// keeps results fresh until invalidated.
    pub stale_after: Option<Duration>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            stale_after: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Permission to run one request for `key`.
///
/// `epoch` identifies the staleness generation being fetched; `issued_seq`
/// orders the request against mutation confirmations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub key: QueryKey,
    pub epoch: u64,
    pub issued_seq: u64,
}

/// Result of asking the cache for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// Cached data is current; nothing to do.
    Fresh,
    /// A request is already running; wait for it.
    InFlight(FetchTicket),
    /// Run this request and report back via [`QueryCache::complete`].
    Issue(FetchTicket),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AppliedPatch {
    mutation: MutationId,
    patch: Patch,
    /// Undo for this patch, valid while `revision` matches the entry's.
    undo: Option<Patch>,
    revision: u64,
    confirmed_seq: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    key: QueryKey,
    status: FetchStatus,
    data: Option<QueryData>,
    base: Option<QueryData>,
    patches: Vec<AppliedPatch>,
    error: Option<ApiError>,
    last_fetched_at: Option<Instant>,
    subscribers: usize,
    unused_since: Option<Instant>,
    epoch: u64,
    stale: bool,
    in_flight: Option<FetchTicket>,
    revision: u64,
}

impl CacheEntry {
    fn new(key: QueryKey, epoch: u64) -> Self {
        Self {
            key,
            status: FetchStatus::Idle,
            data: None,
            base: None,
            patches: Vec::new(),
            error: None,
            last_fetched_at: None,
            subscribers: 0,
            unused_since: None,
            epoch,
            stale: false,
            in_flight: None,
            revision: 0,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    #[must_use]
    pub const fn status(&self) -> FetchStatus {
        self.status
    }

    #[must_use]
    pub const fn data(&self) -> Option<&QueryData> {
        self.data.as_ref()
    }

    #[must_use]
    pub const fn error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }

    #[must_use]
    pub const fn subscribers(&self) -> usize {
        self.subscribers
    }

    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.stale
    }

    #[must_use]
    pub const fn last_fetched_at(&self) -> Option<Instant> {
        self.last_fetched_at
    }

    #[must_use]
    pub const fn in_flight(&self) -> Option<&FetchTicket> {
        self.in_flight.as_ref()
    }

    #[must_use]
    pub fn tags(&self) -> BTreeSet<Tag> {
        tags_for(&self.key, self.data.as_ref())
    }

    /// Mutations with a patch on this entry, in issue order.
    pub fn patch_owners(&self) -> impl Iterator<Item = MutationId> + '_ {
        self.patches.iter().map(|p| p.mutation)
    }

    /// Number of patches still waiting for their write to be confirmed.
    #[must_use]
    pub fn unconfirmed_patches(&self) -> usize {
        self.patches
            .iter()
            .filter(|p| p.confirmed_seq.is_none())
            .count()
    }

    fn rematerialize(&mut self) {
        self.revision += 1;
        let mut data = self.base.clone();
        for applied in &mut self.patches {
            if let Some(value) = data.as_mut() {
                applied.undo = applied.patch.inverse(value);
                applied.patch.apply(value);
            } else {
                applied.undo = None;
            }
            applied.revision = self.revision;
        }
        self.data = data;
    }
}

/// Read-only view handed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub data: Option<QueryData>,
    pub status: FetchStatus,
    /// First load: nothing to show yet.
    pub is_loading: bool,
    /// A request is running, possibly behind cached data.
    pub is_fetching: bool,
    pub is_error: bool,
    pub is_stale: bool,
    pub error: Option<ApiError>,
}

impl QueryState {
    const fn empty() -> Self {
        Self {
            data: None,
            status: FetchStatus::Idle,
            is_loading: false,
            is_fetching: false,
            is_error: false,
            is_stale: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    entries: BTreeMap<QueryKey, CacheEntry>,
    policy: CachePolicy,
    seq: u64,
}

impl QueryCache {
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: BTreeMap::new(),
            policy,
            seq: 0,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub(crate) const fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    #[must_use]
    pub fn entry(&self, key: &QueryKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, key: &QueryKey) -> &mut CacheEntry {
        let seq = &mut self.seq;
        self.entries.entry(key.clone()).or_insert_with(|| {
            *seq += 1;
            CacheEntry::new(key.clone(), *seq)
        })
    }

    fn issue(&mut self, key: &QueryKey) -> FetchTicket {
        let issued_seq = self.next_seq();
        let entry = self.entry_mut(key);
        let ticket = FetchTicket {
            key: key.clone(),
            epoch: entry.epoch,
            issued_seq,
        };
        entry.in_flight = Some(ticket.clone());
        entry.status = FetchStatus::Loading;
        debug!(key = %key, epoch = ticket.epoch, "fetch issued");
        ticket
    }

    /// Decide whether `key` needs a request.
    ///
    /// Fresh successful data and running requests are reused; idle, failed
    /// or stale entries get a new ticket.
    pub fn fetch(&mut self, key: &QueryKey, now: Instant) -> FetchPlan {
        let stale_after = self.policy.stale_after;
        let expired_epoch = {
            let created = !self.entries.contains_key(key);
            let entry = self.entry_mut(key);
            if created {
                entry.unused_since = Some(now);
            }
            if let Some(ticket) = &entry.in_flight {
                return FetchPlan::InFlight(ticket.clone());
            }
            let expired = entry.status == FetchStatus::Success
                && !entry.stale
                && stale_after
                    .zip(entry.last_fetched_at)
                    .is_some_and(|(ttl, at)| now.saturating_duration_since(at) >= ttl);
            if entry.status == FetchStatus::Success && !entry.stale && !expired {
                return FetchPlan::Fresh;
            }
            expired
        };
        if expired_epoch {
            let epoch = self.next_seq();
            let entry = self.entry_mut(key);
            entry.epoch = epoch;
            entry.stale = true;
        }
        FetchPlan::Issue(self.issue(key))
    }

    pub fn subscribe(&mut self, key: &QueryKey) {
        let entry = self.entry_mut(key);
        entry.subscribers += 1;
        entry.unused_since = None;
        trace!(key = %key, subscribers = entry.subscribers, "subscribe");
    }

    pub fn unsubscribe(&mut self, key: &QueryKey, now: Instant) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers == 0 {
            entry.unused_since = Some(now);
        }
        trace!(key = %key, subscribers = entry.subscribers, "unsubscribe");
    }

    /// Record the outcome of a ticketed request.
    ///
    /// Responses for tickets that are no longer current (for example after
    /// [`QueryCache::clear`]) are dropped. Returns a follow-up ticket when
    /// the entry was invalidated while the request ran and someone still
    /// subscribes to it.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: Result<QueryData, ApiError>,
        now: Instant,
    ) -> Option<FetchTicket> {
        let Some(entry) = self.entries.get_mut(&ticket.key) else {
            debug!(key = %ticket.key, "dropping response for collected entry");
            return None;
        };
        if entry.in_flight.as_ref() != Some(ticket) {
            debug!(key = %ticket.key, "dropping response for superseded fetch");
            return None;
        }
        entry.in_flight = None;

        match result {
            Ok(data) => {
                entry.base = Some(data);
                entry.patches.retain(|p| {
                    p.confirmed_seq
                        .is_none_or(|confirmed| confirmed >= ticket.issued_seq)
                });
                entry.rematerialize();
                entry.status = FetchStatus::Success;
                entry.error = None;
                entry.last_fetched_at = Some(now);
                if entry.epoch == ticket.epoch {
                    entry.stale = false;
                    debug!(key = %ticket.key, "fetch succeeded");
                    return None;
                }
                let wanted = entry.subscribers > 0;
                debug!(key = %ticket.key, refetch = wanted, "fetch succeeded but entry went stale");
                if wanted {
                    let key = ticket.key.clone();
                    return Some(self.issue(&key));
                }
                None
            }
            Err(err) => {
                debug!(key = %ticket.key, error = %err, "fetch failed, keeping previous data");
                entry.status = FetchStatus::Error;
                entry.error = Some(err);
                let epoch = self.next_seq();
                if let Some(entry) = self.entries.get_mut(&ticket.key) {
                    entry.epoch = epoch;
                }
                None
            }
        }
    }

    /// Mark every entry carrying `tag` stale; returns refetches for the
    /// subscribed ones that are not already loading.
    pub fn invalidate(&mut self, tag: &Tag) -> Vec<FetchTicket> {
        self.invalidate_matching(|tags| tags.contains(tag))
    }

    pub(crate) fn invalidate_matching(
        &mut self,
        matches: impl Fn(&BTreeSet<Tag>) -> bool,
    ) -> Vec<FetchTicket> {
        let keys: Vec<QueryKey> = self
            .entries
            .values()
            .filter(|entry| matches(&entry.tags()))
            .map(|entry| entry.key.clone())
            .collect();

        let mut tickets = Vec::new();
        for key in keys {
            let epoch = self.next_seq();
            let refetch = {
                let entry = self.entry_mut(&key);
                entry.epoch = epoch;
                entry.stale = true;
                entry.subscribers > 0 && entry.in_flight.is_none()
            };
            debug!(key = %key, refetch, "invalidated");
            if refetch {
                tickets.push(self.issue(&key));
            }
        }
        tickets
    }

    /// Subscriber view of `key`.
    #[must_use]
    pub fn read(&self, key: &QueryKey) -> QueryState {
        let Some(entry) = self.entries.get(key) else {
            return QueryState::empty();
        };
        QueryState {
            data: entry.data.clone(),
            status: entry.status,
            is_loading: entry.data.is_none() && entry.in_flight.is_some(),
            is_fetching: entry.in_flight.is_some(),
            is_error: entry.status == FetchStatus::Error,
            is_stale: entry.stale,
            error: entry.error.clone(),
        }
    }

    /// Drop unsubscribed entries whose retention has elapsed. Entries with a
    /// request in flight or an unconfirmed patch are kept.
    pub fn collect_garbage(&mut self, now: Instant) -> Vec<QueryKey> {
        let retention = self.policy.retention;
        let expired: Vec<QueryKey> = self
            .entries
            .values()
            .filter(|entry| {
                entry.subscribers == 0
                    && entry.in_flight.is_none()
                    && entry.unconfirmed_patches() == 0
                    && entry
                        .unused_since
                        .is_some_and(|since| now.saturating_duration_since(since) >= retention)
            })
            .map(|entry| entry.key.clone())
            .collect();
        for key in &expired {
            self.entries.remove(key);
            debug!(key = %key, "collected");
        }
        expired
    }

    /// Forget all server data, e.g. after the credentials are gone.
    /// Subscriptions survive so views refetch once a token is back.
    pub fn clear(&mut self) {
        let keys: Vec<QueryKey> = self.entries.keys().cloned().collect();
        for key in keys {
            let epoch = self.next_seq();
            let entry = self.entry_mut(&key);
            entry.data = None;
            entry.base = None;
            entry.patches.clear();
            entry.error = None;
            entry.status = FetchStatus::Idle;
            entry.in_flight = None;
            entry.last_fetched_at = None;
            entry.epoch = epoch;
            entry.stale = false;
            entry.revision += 1;
        }
        debug!(entries = self.entries.len(), "cache cleared");
    }

    /// Collection keys that currently hold data.
    pub(crate) fn collection_keys(&self) -> Vec<QueryKey> {
        self.entries
            .values()
            .filter(|e| e.key.is_collection() && e.data.is_some())
            .map(|e| e.key.clone())
            .collect()
    }

    /// Keys whose current data carries `tag`.
    pub(crate) fn keys_tagged(&self, tag: &Tag) -> Vec<QueryKey> {
        self.entries
            .values()
            .filter(|e| e.data.is_some() && e.tags().contains(tag))
            .map(|e| e.key.clone())
            .collect()
    }

    /// Apply `patch` on behalf of `mutation`. Entries without data are
    /// skipped. Returns whether the visible data changed.
    pub(crate) fn apply_optimistic(
        &mut self,
        key: &QueryKey,
        mutation: MutationId,
        patch: &Patch,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        let Some(data) = entry.data.as_mut() else {
            return false;
        };
        let undo = patch.inverse(data);
        let changed = patch.apply(data);
        entry.patches.push(AppliedPatch {
            mutation,
            patch: patch.clone(),
            undo,
            revision: entry.revision,
            confirmed_seq: None,
        });
        trace!(key = %key, mutation = %mutation, changed, "optimistic patch applied");
        changed
    }

    /// Mark `mutation`'s patches confirmed, optionally swapping in the
    /// server's version of the record.
    pub(crate) fn confirm_patch(&mut self, mutation: MutationId, replacement: Option<&Patch>) {
        let seq = self.next_seq();
        for entry in self.entries.values_mut() {
            let mut touched = false;
            for applied in entry.patches.iter_mut().filter(|p| p.mutation == mutation) {
                applied.confirmed_seq = Some(seq);
                if let Some(replacement) = replacement {
                    applied.patch = replacement.clone();
                    touched = true;
                }
            }
            if touched {
                entry.rematerialize();
            }
        }
    }

    /// Remove `mutation`'s patches and restore what they replaced.
    ///
    /// When the patch is the newest one on an entry and nothing has been
    /// replayed since it was applied, its recorded undo restores the prior
    /// data exactly. Otherwise the entry is rebuilt from the server result
    /// and the remaining patches, which leaves other mutations' pending
    /// patches in place.
    pub(crate) fn rollback_patch(&mut self, mutation: MutationId) -> Vec<QueryKey> {
        let mut restored = Vec::new();
        for entry in self.entries.values_mut() {
            let Some(pos) = entry.patches.iter().position(|p| p.mutation == mutation) else {
                continue;
            };
            let applied = entry.patches.remove(pos);
            let newest = pos == entry.patches.len();
            if newest && applied.revision == entry.revision {
                if let (Some(undo), Some(data)) = (&applied.undo, entry.data.as_mut()) {
                    undo.apply(data);
                }
            } else {
                entry.rematerialize();
            }
            restored.push(entry.key.clone());
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Status, Task, TaskChanges, TaskId, TaskPage};
    use crate::query::ListParams;

    fn key() -> QueryKey {
        QueryKey::Tasks(ListParams::default())
    }

    fn task(id: u64) -> Task {
        Task {
            id: TaskId::from(id),
            name: format!("t{id}"),
            description: None,
            status: Some(Status::ToDo),
            due_date: None,
            created_at: None,
        }
    }

    fn collection(ids: &[u64]) -> QueryData {
        QueryData::Collection(TaskPage::new(ids.iter().copied().map(task).collect()))
    }

    fn issued(plan: FetchPlan) -> FetchTicket {
        match plan {
            FetchPlan::Issue(ticket) => ticket,
            other => panic!("expected a new ticket, got {other:?}"),
        }
    }

    #[test]
    fn second_fetch_attaches_to_first() {
        let mut cache = QueryCache::default();
        let now = Instant::now();
        let ticket = issued(cache.fetch(&key(), now));
        assert_eq!(cache.fetch(&key(), now), FetchPlan::InFlight(ticket.clone()));
        assert!(cache.read(&key()).is_loading);

        assert_eq!(cache.complete(&ticket, Ok(collection(&[1])), now), None);
        assert_eq!(cache.fetch(&key(), now), FetchPlan::Fresh);
        assert_eq!(cache.read(&key()).status, FetchStatus::Success);
    }

    #[test]
    fn subscribe_twice_unsubscribe_twice() {
        let mut cache = QueryCache::default();
        let now = Instant::now();
        cache.subscribe(&key());
        cache.subscribe(&key());
        assert_eq!(cache.entry(&key()).map(CacheEntry::subscribers), Some(2));
        cache.unsubscribe(&key(), now);
        cache.unsubscribe(&key(), now);
        cache.unsubscribe(&key(), now);
        assert_eq!(cache.entry(&key()).map(CacheEntry::subscribers), Some(0));
    }

    #[test]
    fn failure_keeps_previous_data() {
        let mut cache = QueryCache::default();
        let now = Instant::now();
        let first = issued(cache.fetch(&key(), now));
        cache.complete(&first, Ok(collection(&[1, 2])), now);

        cache.subscribe(&key());
        let tickets = cache.invalidate(&Tag::Collection);
        assert_eq!(tickets.len(), 1);
        cache.complete(&tickets[0], Err(ApiError::Timeout), now);

        let state = cache.read(&key());
        assert!(state.is_error);
        assert!(!state.is_loading);
        assert_eq!(state.data, Some(collection(&[1, 2])));
        assert_eq!(state.error, Some(ApiError::Timeout));

        let retry = issued(cache.fetch(&key(), now));
        assert_ne!(retry.epoch, tickets[0].epoch);
    }

    #[test]
    fn invalidate_only_refetches_subscribed_entries() {
        let mut cache = QueryCache::default();
        let now = Instant::now();
        let other = QueryKey::Task(TaskId::from(9));
        for k in [key(), other.clone()] {
            let t = issued(cache.fetch(&k, now));
            let data = if k.is_collection() {
                collection(&[1])
            } else {
                QueryData::Single(task(9))
            };
            cache.complete(&t, Ok(data), now);
        }

        assert!(cache.invalidate(&Tag::Collection).is_empty());
        assert!(cache.entry(&key()).is_some_and(CacheEntry::is_stale));
        assert!(!cache.entry(&other).is_some_and(CacheEntry::is_stale));

        cache.subscribe(&key());
        assert_eq!(cache.invalidate(&Tag::Item(TaskId::from(1))).len(), 1);
    }

    #[test]
    fn invalidation_during_fetch_chains_one_refetch() {
        let mut cache = QueryCache::default();
        let now = Instant::now();
        cache.subscribe(&key());
        let first = issued(cache.fetch(&key(), now));
        assert!(cache.invalidate(&Tag::Collection).is_empty());
        let follow_up = cache
            .complete(&first, Ok(collection(&[1])), now)
            .expect("stale subscribed entry refetches");
        assert_ne!(follow_up.epoch, first.epoch);
        assert_eq!(cache.complete(&follow_up, Ok(collection(&[1, 2])), now), None);
        assert!(!cache.read(&key()).is_stale);
    }

    #[test]
    fn garbage_collection_respects_retention() {
        let mut cache = QueryCache::default();
        let now = Instant::now();
        cache.subscribe(&key());
        let t = issued(cache.fetch(&key(), now));
        cache.complete(&t, Ok(collection(&[])), now);
        cache.unsubscribe(&key(), now);

        assert!(cache.collect_garbage(now + Duration::from_secs(59)).is_empty());
        assert_eq!(
            cache.collect_garbage(now + DEFAULT_RETENTION),
            vec![key()]
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_data_and_late_responses() {
        let mut cache = QueryCache::default();
        let now = Instant::now();
        cache.subscribe(&key());
        let t = issued(cache.fetch(&key(), now));
        cache.clear();
        assert_eq!(cache.complete(&t, Ok(collection(&[1])), now), None);
        let state = cache.read(&key());
        assert_eq!(state.data, None);
        assert_eq!(state.status, FetchStatus::Idle);
        assert_eq!(cache.entry(&key()).map(CacheEntry::subscribers), Some(1));
    }

    #[test]
    fn stale_after_expires_fresh_data() {
        let mut cache = QueryCache::new(CachePolicy {
            stale_after: Some(Duration::from_secs(5)),
            ..CachePolicy::default()
        });
        let now = Instant::now();
        let t = issued(cache.fetch(&key(), now));
        cache.complete(&t, Ok(collection(&[1])), now);
        assert_eq!(cache.fetch(&key(), now + Duration::from_secs(4)), FetchPlan::Fresh);
        let again = issued(cache.fetch(&key(), now + Duration::from_secs(5)));
        assert_ne!(again.epoch, t.epoch);
    }

    #[test]
    fn interleaved_rollback_keeps_other_pending_patch() {
        let mut cache = QueryCache::default();
        let now = Instant::now();
        let t = issued(cache.fetch(&key(), now));
        cache.complete(&t, Ok(collection(&[1, 2])), now);

        let first = MutationId::new(1);
        let second = MutationId::new(2);
        cache.apply_optimistic(
            &key(),
            first,
            &Patch::Merge {
                id: TaskId::from(1),
                changes: TaskChanges::status(Status::Done),
            },
        );
        cache.apply_optimistic(&key(), second, &Patch::Remove { id: TaskId::from(2) });

        cache.rollback_patch(first);
        let data = cache.read(&key()).data.expect("data");
        assert_eq!(data.tasks().len(), 1);
        assert_eq!(data.tasks()[0].status, Some(Status::ToDo));

        cache.rollback_patch(second);
        assert_eq!(cache.read(&key()).data, Some(collection(&[1, 2])));
    }

    #[test]
    fn refetch_drops_only_patches_confirmed_before_issue() {
        let mut cache = QueryCache::default();
        let now = Instant::now();
        cache.subscribe(&key());
        let t = issued(cache.fetch(&key(), now));
        cache.complete(&t, Ok(collection(&[1, 2])), now);

        let m = MutationId::new(1);
        cache.apply_optimistic(&key(), m, &Patch::Remove { id: TaskId::from(1) });
        let early = cache.invalidate(&Tag::Collection);
        cache.confirm_patch(m, None);

        // Issued before confirmation: server may not reflect the delete yet.
        cache.complete(&early[0], Ok(collection(&[1, 2])), now);
        assert_eq!(cache.read(&key()).data, Some(collection(&[2])));

        let late = cache.invalidate(&Tag::Collection);
        cache.complete(&late[0], Ok(collection(&[2])), now);
        assert_eq!(cache.entry(&key()).map(CacheEntry::unconfirmed_patches), Some(0));
        assert_eq!(cache.entry(&key()).map(|e| e.patch_owners().count()), Some(0));
    }
}
