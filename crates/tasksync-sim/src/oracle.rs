use std::collections::BTreeSet;

use tasksync_core::board::project;
use tasksync_core::cache::FetchStatus;
use tasksync_core::model::QueryData;

use crate::{EntrySnapshot, SimulationResult};

// ── Core result types ─────────────────────────────────────────────────────────

/// Outcome of one or more invariant checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    #[must_use]
    pub fn fail(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Merge another result into this one (failures accumulate).
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

// ── Invariant violation diagnostics ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A subscribed entry shows something other than the server's answer
    /// after the final refresh.
    ///
    /// Emitted by `check_server_agreement`.
    Divergence {
        key: String,
        /// What subscribers see, rendered for the report.
        cached: String,
        /// What the server returns for the same request.
        server: String,
    },

    /// An optimistic patch outlived its mutation.
    ///
    /// Emitted by `check_settled`.
    ResidualPatch {
        key: String,
        patches: usize,
        unconfirmed: usize,
    },

    /// Mutations or board moves were still pending once the link was drained.
    ///
    /// Emitted by `check_settled`.
    Unsettled {
        pending_mutations: usize,
        pending_moves: bool,
    },

    /// The same staleness generation of a key was requested more than once.
    ///
    /// Emitted by `check_fetch_dedup`.
    DuplicateFetch {
        key: String,
        epoch: u64,
        count: usize,
    },

    /// The board lost, duplicated or misplaced a task.
    ///
    /// Emitted by `check_board`.
    BoardMismatch { key: String, detail: String },
}

fn render(data: Option<&QueryData>) -> String {
    data.map_or_else(
        || "nothing".to_string(),
        |data| {
            let ids: Vec<String> = data.tasks().iter().map(|t| t.id.to_string()).collect();
            format!("[{}]", ids.join(", "))
        },
    )
}

// ── Oracle ────────────────────────────────────────────────────────────────────

/// Checks a finished run against the server.
///
/// # Invariants checked
///
/// 1. **Server agreement** (`check_server_agreement`): every subscribed
///    entry holds exactly what the server answers for its key, or the
///    server's error if it answers with one.
/// 2. **Settled** (`check_settled`): no pending mutations or board moves,
///    no unconfirmed patch anywhere, and no patch at all on a subscribed
///    entry that refreshed successfully.
/// 3. **Fetch dedup** (`check_fetch_dedup`): no `(key, epoch)` pair was
///    requested twice.
/// 4. **Board** (`check_board`): the settled board is the plain projection
///    of the active list.
pub struct ConsistencyOracle;

impl ConsistencyOracle {
    #[must_use]
    pub fn check_all(result: &SimulationResult) -> OracleResult {
        Self::check_server_agreement(result)
            .merge(Self::check_settled(result))
            .merge(Self::check_fetch_dedup(result))
            .merge(Self::check_board(result))
    }

    #[must_use]
    pub fn check_server_agreement(result: &SimulationResult) -> OracleResult {
        let mut violations = Vec::new();
        for entry in result.entries.iter().filter(|e| e.subscribers > 0) {
            let key = entry.key.to_string();
            let Some(expected) = result.expected.get(&key) else {
                continue;
            };
            let agrees = match expected {
                Ok(data) => {
                    entry.status == FetchStatus::Success && entry.data.as_ref() == Some(data)
                }
                Err(error) => {
                    entry.status == FetchStatus::Error && entry.error.as_ref() == Some(error)
                }
            };
            if !agrees {
                violations.push(InvariantViolation::Divergence {
                    key,
                    cached: describe(entry),
                    server: match expected {
                        Ok(data) => render(Some(data)),
                        Err(error) => format!("error: {error}"),
                    },
                });
            }
        }
        OracleResult::fail(violations)
    }

    #[must_use]
    pub fn check_settled(result: &SimulationResult) -> OracleResult {
        let mut violations = Vec::new();
        if result.pending_mutations > 0 || result.pending_moves {
            violations.push(InvariantViolation::Unsettled {
                pending_mutations: result.pending_mutations,
                pending_moves: result.pending_moves,
            });
        }
        for entry in &result.entries {
            let refreshed = entry.subscribers > 0 && entry.status == FetchStatus::Success;
            if entry.unconfirmed > 0 || (refreshed && entry.patches > 0) {
                violations.push(InvariantViolation::ResidualPatch {
                    key: entry.key.to_string(),
                    patches: entry.patches,
                    unconfirmed: entry.unconfirmed,
                });
            }
        }
        OracleResult::fail(violations)
    }

    #[must_use]
    pub fn check_fetch_dedup(result: &SimulationResult) -> OracleResult {
        let violations = result
            .fetch_counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|((key, epoch), count)| InvariantViolation::DuplicateFetch {
                key: key.clone(),
                epoch: *epoch,
                count: *count,
            })
            .collect();
        OracleResult::fail(violations)
    }

    #[must_use]
    pub fn check_board(result: &SimulationResult) -> OracleResult {
        let key = result.active_key.clone();
        let mut violations = Vec::new();

        if result.board != project(&result.board_source) {
            violations.push(InvariantViolation::BoardMismatch {
                key: key.clone(),
                detail: "board differs from the projection of the list".into(),
            });
        }
        if result.board.len() != result.board_source.len() {
            violations.push(InvariantViolation::BoardMismatch {
                key: key.clone(),
                detail: format!(
                    "board holds {} tasks, list holds {}",
                    result.board.len(),
                    result.board_source.len()
                ),
            });
        }
        let unique: BTreeSet<String> = result
            .board_source
            .iter()
            .map(|t| t.id.to_string())
            .collect();
        if unique.len() != result.board_source.len() {
            violations.push(InvariantViolation::BoardMismatch {
                key: key.clone(),
                detail: "the list shows a task more than once".into(),
            });
        }
        for task in &result.board_source {
            if result.board.locate(&task.id) != Some(task.column()) {
                violations.push(InvariantViolation::BoardMismatch {
                    key: key.clone(),
                    detail: format!("task {} is not in its status column", task.id),
                });
            }
        }
        OracleResult::fail(violations)
    }
}

fn describe(entry: &EntrySnapshot) -> String {
    let status = match entry.status {
        FetchStatus::Idle => "idle",
        FetchStatus::Loading => "loading",
        FetchStatus::Success => "success",
        FetchStatus::Error => "error",
    };
    match &entry.error {
        Some(error) => format!("{status} {} ({error})", render(entry.data.as_ref())),
        None => format!("{status} {}", render(entry.data.as_ref())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(n: u64) -> InvariantViolation {
        InvariantViolation::DuplicateFetch {
            key: "tasks".into(),
            epoch: n,
            count: 2,
        }
    }

    #[test]
    fn merge_accumulates_failures() {
        let merged = OracleResult::pass()
            .merge(OracleResult::fail(vec![violation(1)]))
            .merge(OracleResult::pass())
            .merge(OracleResult::fail(vec![violation(2)]));
        assert!(!merged.passed);
        assert_eq!(merged.violations, [violation(1), violation(2)]);
    }

    #[test]
    fn empty_failure_list_passes() {
        assert!(OracleResult::fail(Vec::new()).passed);
    }
}
