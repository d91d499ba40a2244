#![allow(dead_code)]

use chrono::NaiveDate;
use proptest::prelude::*;
use tasksync_core::model::{PageMeta, QueryData, Status, Task, TaskChanges, TaskId, TaskPage};
use tasksync_core::mutation::patch::Patch;
use tasksync_core::query::{FilterChange, SortDirection, SortField};

pub fn arb_status() -> impl Strategy<Value = Status> + Clone {
    prop::sample::select(Status::ALL.to_vec())
}

pub fn arb_date() -> impl Strategy<Value = NaiveDate> + Clone {
    (2000i32..2040, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default())
}

pub fn arb_task(id: u64) -> impl Strategy<Value = Task> {
    (
        "[a-z ]{1,12}",
        prop::option::of("[a-z]{0,8}"),
        prop::option::of(arb_status()),
        prop::option::of(arb_date()),
    )
        .prop_map(move |(name, description, status, due_date)| Task {
            id: TaskId::from(id),
            name,
            description,
            status,
            due_date,
            created_at: None,
        })
}

/// A collection of up to `max` tasks with distinct ids `1..=n`.
pub fn arb_collection(max: usize) -> impl Strategy<Value = QueryData> {
    (0..=max)
        .prop_flat_map(|n| {
            (1..=n as u64)
                .map(arb_task)
                .collect::<Vec<_>>()
        })
        .prop_map(|tasks| {
            let total = tasks.len() as u64;
            QueryData::Collection(TaskPage {
                tasks,
                meta: Some(PageMeta {
                    current_page: 1,
                    last_page: 1,
                    per_page: 10,
                    total,
                }),
            })
        })
}

pub fn arb_changes() -> impl Strategy<Value = TaskChanges> {
    (
        prop::option::of("[a-z]{1,8}"),
        prop::option::of(prop::option::of("[a-z]{0,8}")),
        prop::option::of(arb_status()),
        prop::option::of(prop::option::of(arb_date())),
    )
        .prop_map(|(name, description, status, due_date)| TaskChanges {
            name,
            description,
            status,
            due_date,
        })
}

/// Patches over ids `1..=8`, so some target records that do not exist.
pub fn arb_patch() -> impl Strategy<Value = Patch> {
    prop_oneof![
        (100u64..200).prop_flat_map(arb_task).prop_map(Patch::Prepend),
        (1u64..=8).prop_map(|id| Patch::Remove {
            id: TaskId::from(id)
        }),
        ((1u64..=8), arb_changes()).prop_map(|(id, changes)| Patch::Merge {
            id: TaskId::from(id),
            changes,
        }),
        (1u64..=8).prop_flat_map(arb_task).prop_map(Patch::Replace),
        ((0usize..10), (200u64..300).prop_flat_map(arb_task))
            .prop_map(|(index, task)| Patch::Insert { index, task }),
    ]
}

pub fn arb_sort_field() -> impl Strategy<Value = SortField> + Clone {
    prop::sample::select(vec![SortField::CreatedAt, SortField::Name, SortField::DueDate])
}

/// One change per filter field, so any permutation yields the same filter.
pub fn arb_field_changes() -> impl Strategy<Value = Vec<FilterChange>> {
    (
        prop::option::of(arb_status()),
        prop::option::of(arb_date()),
        prop::option::of(arb_date()),
        "[ a-z]{0,6}",
        arb_sort_field(),
        prop::bool::ANY,
        1u32..50,
    )
        .prop_map(|(status, from, to, search, sort_by, asc, per_page)| {
            vec![
                FilterChange::Status(status),
                FilterChange::DueDateFrom(from),
                FilterChange::DueDateTo(to),
                FilterChange::Search(search),
                FilterChange::SortBy(sort_by),
                FilterChange::SortDirection(if asc {
                    SortDirection::Asc
                } else {
                    SortDirection::Desc
                }),
                FilterChange::PerPage(per_page),
            ]
        })
}
