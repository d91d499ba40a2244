//! Status board: the same cached tasks regrouped into one column per status.
//!
//! [`project`] is a pure function of a collection. [`Board`] adds the drag
//! gesture and an overlay of moves whose status change is still pending, so
//! a dropped card sits at the end of its new column until the write settles.

use serde::Serialize;
use tracing::debug;

use crate::model::{QueryData, Status, Task, TaskId};
use crate::mutation::{MutationId, MutationKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardColumn {
    pub status: Status,
    pub tasks: Vec<Task>,
}

/// Tasks grouped by status, columns in [`Status::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardGrouping {
    pub columns: Vec<BoardColumn>,
}

impl BoardGrouping {
    fn empty() -> Self {
        Self {
            columns: Status::ALL
                .iter()
                .map(|&status| BoardColumn {
                    status,
                    tasks: Vec::new(),
                })
                .collect(),
        }
    }

    fn column_mut(&mut self, status: Status) -> Option<&mut BoardColumn> {
        self.columns.iter_mut().find(|c| c.status == status)
    }

    #[must_use]
    pub fn column(&self, status: Status) -> &[Task] {
        self.columns
            .iter()
            .find(|c| c.status == status)
            .map_or(&[][..], |c| c.tasks.as_slice())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column currently holding `id`.
    #[must_use]
    pub fn locate(&self, id: &TaskId) -> Option<Status> {
        self.columns
            .iter()
            .find(|c| c.tasks.iter().any(|t| &t.id == id))
            .map(|c| c.status)
    }

    fn take(&mut self, id: &TaskId) -> Option<Task> {
        self.columns.iter_mut().find_map(|c| {
            let pos = c.tasks.iter().position(|t| &t.id == id)?;
            Some(c.tasks.remove(pos))
        })
    }
}

/// Group `tasks` by status. Absent or unknown statuses land in To Do;
/// order within a column follows `tasks`.
#[must_use]
pub fn project(tasks: &[Task]) -> BoardGrouping {
    let mut grouping = BoardGrouping::empty();
    for task in tasks {
        if let Some(column) = grouping.column_mut(task.column()) {
            column.tasks.push(task.clone());
        }
    }
    grouping
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DragState {
    task: TaskId,
    from: Status,
    over: Option<Status>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingMove {
    mutation: MutationId,
    task: TaskId,
    to: Status,
}

#[derive(Debug, Default)]
pub struct Board {
    drag: Option<DragState>,
    moves: Vec<PendingMove>,
}

impl Board {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_drag(&mut self, task: &Task) {
        debug!(task = %task.id, from = %task.column(), "drag started");
        self.drag = Some(DragState {
            task: task.id.clone(),
            from: task.column(),
            over: None,
        });
    }

    /// Hover feedback only; cache state is never touched here.
    pub fn drag_over(&mut self, column: Option<Status>) {
        if let Some(drag) = self.drag.as_mut() {
            drag.over = column;
        }
    }

    /// Column under the card being dragged.
    #[must_use]
    pub fn hovered(&self) -> Option<Status> {
        self.drag.as_ref().and_then(|d| d.over)
    }

    #[must_use]
    pub fn dragging(&self) -> Option<&TaskId> {
        self.drag.as_ref().map(|d| &d.task)
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    /// End the gesture. Returns the status change to issue, or `None` when
    /// there is no target or the card stays in its column.
    pub fn complete_drop(&mut self, target: Option<Status>) -> Option<MutationKind> {
        let drag = self.drag.take()?;
        let to = target?;
        if to == drag.from {
            debug!(task = %drag.task, "dropped on its own column");
            return None;
        }
        Some(MutationKind::Status {
            id: drag.task,
            status: to,
        })
    }

    /// Remember that `mutation` moves `task` to `to` until it settles.
    pub fn track(&mut self, mutation: MutationId, task: TaskId, to: Status) {
        self.moves.push(PendingMove { mutation, task, to });
    }

    /// Forget `mutation`'s move, whatever its outcome.
    pub fn settle(&mut self, mutation: MutationId) {
        self.moves.retain(|m| m.mutation != mutation);
    }

    #[must_use]
    pub fn has_pending_moves(&self) -> bool {
        !self.moves.is_empty()
    }

    /// Grouping for `data`, with pending moves placed at the end of their
    /// target column in drop order.
    #[must_use]
    pub fn view(&self, data: Option<&QueryData>) -> BoardGrouping {
        let mut grouping = project(data.map_or(&[][..], QueryData::tasks));
        for pending in &self.moves {
            let Some(task) = grouping.take(&pending.task) else {
                continue;
            };
            if let Some(column) = grouping.column_mut(pending.to) {
                column.tasks.push(task);
            }
        }
        grouping
    }
}
