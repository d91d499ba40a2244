//! Effective list filter and the search debounce in front of it.
//!
//! Structured fields apply immediately. Free-text search is held until the
//! input has been quiet for the debounce delay; the caller drives time by
//! calling [`FilterController::poll`] at or after [`FilterController::deadline`].

use std::time::{Duration, Instant};

use tracing::debug;

use crate::query::{FilterChange, QueryKey, TaskFilter};

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// The published query key moved from `previous` to `current`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    pub previous: QueryKey,
    pub current: QueryKey,
}

#[derive(Debug, Clone)]
struct PendingSearch {
    text: String,
    due: Instant,
}

#[derive(Debug, Clone)]
pub struct FilterController {
    filter: TaskFilter,
    pending: Option<PendingSearch>,
    debounce: Duration,
}

impl Default for FilterController {
    fn default() -> Self {
        Self::new(TaskFilter::default(), DEFAULT_SEARCH_DEBOUNCE)
    }
}

impl FilterController {
    #[must_use]
    pub const fn new(filter: TaskFilter, debounce: Duration) -> Self {
        Self {
            filter,
            pending: None,
            debounce,
        }
    }

    #[must_use]
    pub const fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    #[must_use]
    pub fn current_key(&self) -> QueryKey {
        self.filter.query_key()
    }

    /// Search text typed but not yet applied.
    #[must_use]
    pub fn pending_search(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.text.as_str())
    }

    /// When the pending search becomes due.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    fn publish(&mut self, edit: impl FnOnce(&mut TaskFilter)) -> Option<KeyChange> {
        let previous = self.current_key();
        edit(&mut self.filter);
        let current = self.current_key();
        if previous == current {
            return None;
        }
        debug!(from = %previous, to = %current, "query key changed");
        Some(KeyChange { previous, current })
    }

    /// Apply structured changes now. An explicit search change here also
    /// discards any debounced input.
    pub fn set_filters(
        &mut self,
        changes: impl IntoIterator<Item = FilterChange>,
    ) -> Option<KeyChange> {
        let changes: Vec<FilterChange> = changes.into_iter().collect();
        if changes.iter().any(|c| matches!(c, FilterChange::Search(_))) {
            self.pending = None;
        }
        self.publish(|filter| {
            for change in changes {
                filter.apply(change);
            }
        })
    }

    /// Record a keystroke. Each call restarts the debounce window.
    pub fn input_search(&mut self, text: impl Into<String>, now: Instant) {
        self.pending = Some(PendingSearch {
            text: text.into(),
            due: now + self.debounce,
        });
    }

    /// Apply the pending search if its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<KeyChange> {
        if self.deadline().is_none_or(|due| now < due) {
            return None;
        }
        self.flush()
    }

    /// Apply the pending search immediately.
    pub fn flush(&mut self) -> Option<KeyChange> {
        let pending = self.pending.take()?;
        self.publish(|filter| filter.apply(FilterChange::Search(pending.text)))
    }

    /// Back to the default filter, dropping any pending search.
    pub fn clear(&mut self) -> Option<KeyChange> {
        self.pending = None;
        self.publish(|filter| *filter = TaskFilter::default())
    }
}
