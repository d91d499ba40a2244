//! Optimistic patches over cached query data, and their inverses.
//!
//! Every patch that changes a value has an inverse computed against the value
//! it was applied to; applying the patch and then the inverse yields the
//! original value exactly.

use crate::model::{QueryData, Task, TaskChanges, TaskId, TaskPage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    /// Add a record at the head of a collection unless its id is already there.
    Prepend(Task),
    /// Merge fields into the record with `id`.
    Merge { id: TaskId, changes: TaskChanges },
    /// Drop the record with `id` from a collection.
    Remove { id: TaskId },
    /// Put a record back at `index` (clamped to the collection length).
    Insert { index: usize, task: Task },
    /// Swap in a whole record, matched by id.
    Replace(Task),
}

fn adjust_total(page: &mut TaskPage, grow: bool) {
    if let Some(meta) = page.meta.as_mut() {
        meta.total = if grow {
            meta.total.saturating_add(1)
        } else {
            meta.total.saturating_sub(1)
        };
    }
}

fn find<'a>(data: &'a QueryData, id: &TaskId) -> Option<(usize, &'a Task)> {
    match data {
        QueryData::Collection(page) => page.position(id).map(|pos| (pos, &page.tasks[pos])),
        QueryData::Single(task) => (&task.id == id).then_some((0, task)),
    }
}

impl Patch {
    /// Id of the record this patch touches.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        match self {
            Self::Prepend(task) | Self::Insert { task, .. } | Self::Replace(task) => &task.id,
            Self::Merge { id, .. } | Self::Remove { id } => id,
        }
    }

    /// Apply in place. Returns whether anything changed.
    pub fn apply(&self, data: &mut QueryData) -> bool {
        match (self, data) {
            (Self::Prepend(task), QueryData::Collection(page)) => {
                if page.position(&task.id).is_some() {
                    return false;
                }
                page.tasks.insert(0, task.clone());
                adjust_total(page, true);
                true
            }
            (Self::Insert { index, task }, QueryData::Collection(page)) => {
                let at = (*index).min(page.tasks.len());
                page.tasks.insert(at, task.clone());
                adjust_total(page, true);
                true
            }
            (Self::Remove { id }, QueryData::Collection(page)) => {
                let Some(pos) = page.position(id) else {
                    return false;
                };
                page.tasks.remove(pos);
                adjust_total(page, false);
                true
            }
            (Self::Merge { id, changes }, QueryData::Collection(page)) => {
                let Some(pos) = page.position(id) else {
                    return false;
                };
                changes.apply_to(&mut page.tasks[pos]);
                true
            }
            (Self::Merge { id, changes }, QueryData::Single(task)) if &task.id == id => {
                changes.apply_to(task);
                true
            }
            (Self::Replace(new), QueryData::Collection(page)) => {
                let Some(pos) = page.position(&new.id) else {
                    return false;
                };
                page.tasks[pos] = new.clone();
                true
            }
            (Self::Replace(new), QueryData::Single(task)) if task.id == new.id => {
                *task = new.clone();
                true
            }
            _ => false,
        }
    }

    /// The patch that undoes `self` when `self` is applied to `before`.
    ///
    /// `None` when `self` would leave `before` unchanged.
    #[must_use]
    pub fn inverse(&self, before: &QueryData) -> Option<Self> {
        match self {
            Self::Prepend(task) => match before {
                QueryData::Collection(page) if page.position(&task.id).is_none() => {
                    Some(Self::Remove {
                        id: task.id.clone(),
                    })
                }
                _ => None,
            },
            Self::Insert { task, .. } => before.is_collection().then(|| Self::Remove {
                id: task.id.clone(),
            }),
            Self::Remove { id } => match before {
                QueryData::Collection(page) => page.position(id).map(|index| Self::Insert {
                    index,
                    task: page.tasks[index].clone(),
                }),
                QueryData::Single(_) => None,
            },
            Self::Merge { id, .. } => find(before, id).map(|(_, old)| Self::Replace(old.clone())),
            Self::Replace(new) => find(before, &new.id).map(|(_, old)| Self::Replace(old.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageMeta, Status, TaskDraft};

    fn task(id: u64, status: Status) -> Task {
        Task {
            id: TaskId::from(id),
            name: format!("task {id}"),
            description: None,
            status: Some(status),
            due_date: None,
            created_at: None,
        }
    }

    fn page(tasks: Vec<Task>) -> QueryData {
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
    }

    fn round_trip(patch: &Patch, before: &QueryData) -> QueryData {
        let mut data = before.clone();
        let changed = patch.apply(&mut data);
        match patch.inverse(before) {
            Some(inverse) => {
                assert!(changed);
                inverse.apply(&mut data);
            }
            None => assert!(!changed, "a changing patch must have an inverse"),
        }
        data
    }

    #[test]
    fn delete_then_undo_restores_order() {
        let before = page(vec![task(1, Status::ToDo), task(2, Status::ToDo)]);
        let patch = Patch::Remove { id: TaskId::from(1) };
        let mut data = before.clone();
        patch.apply(&mut data);
        assert_eq!(data.tasks().len(), 1);
        assert_eq!(data.tasks()[0].id, TaskId::from(2));
        assert_eq!(round_trip(&patch, &before), before);
    }

    #[test]
    fn prepend_adjusts_total_and_undoes() {
        let before = page(vec![task(1, Status::Done)]);
        let pending = Task::pending(9, &TaskDraft::named("Buy milk"));
        let patch = Patch::Prepend(pending);
        let mut data = before.clone();
        patch.apply(&mut data);
        let QueryData::Collection(p) = &data else {
            panic!("collection expected");
        };
        assert_eq!(p.tasks[0].name, "Buy milk");
        assert_eq!(p.meta.map(|m| m.total), Some(2));
        assert_eq!(round_trip(&patch, &before), before);
    }

    #[test]
    fn prepend_skips_known_ids() {
        let before = page(vec![task(7, Status::ToDo)]);
        let patch = Patch::Prepend(task(7, Status::Done));
        let mut data = before.clone();
        assert!(!patch.apply(&mut data));
        assert_eq!(data, before);
        assert!(patch.inverse(&before).is_none());
    }

    #[test]
    fn merge_on_single_and_collection() {
        let patch = Patch::Merge {
            id: TaskId::from(1),
            changes: TaskChanges::status(Status::Done),
        };
        let single = QueryData::Single(task(1, Status::ToDo));
        assert_eq!(round_trip(&patch, &single), single);

        let mut data = single;
        patch.apply(&mut data);
        assert_eq!(data.tasks()[0].status, Some(Status::Done));
    }

    #[test]
    fn merge_restores_absent_status() {
        let mut raw = task(1, Status::ToDo);
        raw.status = None;
        let before = page(vec![raw]);
        let patch = Patch::Merge {
            id: TaskId::from(1),
            changes: TaskChanges::status(Status::InProgress),
        };
        assert_eq!(round_trip(&patch, &before), before);
    }

    #[test]
    fn patches_on_missing_ids_are_noops() {
        let before = page(vec![task(1, Status::ToDo)]);
        for patch in [
            Patch::Remove { id: TaskId::from(5) },
            Patch::Merge {
                id: TaskId::from(5),
                changes: TaskChanges::status(Status::Done),
            },
            Patch::Replace(task(5, Status::Done)),
        ] {
            assert_eq!(round_trip(&patch, &before), before);
        }
    }
}
