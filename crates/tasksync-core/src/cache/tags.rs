//! Tags derived from cache contents.
//!
//! Nothing here is stored: an entry's tags are recomputed from its key and
//! current data whenever they are needed, so they cannot drift.

use std::collections::BTreeSet;
use std::fmt;

use crate::cache::{FetchTicket, QueryCache};
use crate::model::{QueryData, TaskId};
use crate::query::QueryKey;

/// Label used to group cache entries for bulk invalidation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    Collection,
    Item(TaskId),
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collection => f.write_str("collection"),
            Self::Item(id) => write!(f, "item:{id}"),
        }
    }
}

/// Tags carried by an entry with `key` holding `data`.
///
/// Collection entries carry `collection` plus one `item:<id>` per task they
/// currently hold; single-task entries carry only their own `item:<id>`.
#[must_use]
pub fn tags_for(key: &QueryKey, data: Option<&QueryData>) -> BTreeSet<Tag> {
    match key {
        QueryKey::Tasks(_) => std::iter::once(Tag::Collection)
            .chain(
                data.into_iter()
                    .flat_map(QueryData::tasks)
                    .map(|task| Tag::Item(task.id.clone())),
            )
            .collect(),
        QueryKey::Task(id) => BTreeSet::from([Tag::Item(id.clone())]),
    }
}

/// Invalidate every entry carrying any of `tags`.
///
/// Each matching entry is invalidated once even if it carries several of the
/// tags. Returns the refetches that must be performed.
pub fn invalidate_tags<'a>(
    cache: &mut QueryCache,
    tags: impl IntoIterator<Item = &'a Tag>,
) -> Vec<FetchTicket> {
    let tags: BTreeSet<&Tag> = tags.into_iter().collect();
    cache.invalidate_matching(|entry_tags| entry_tags.iter().any(|t| tags.contains(t)))
}
