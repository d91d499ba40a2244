pub mod board;
pub mod config;
pub mod create;
pub mod delete;
pub mod list;
pub mod move_cmd;
pub mod prefs;
pub mod show;
pub mod update;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::Args;
use tasksync_core::cache::QueryState;
use tasksync_core::config::UserConfig;
use tasksync_core::error::ApiError;
use tasksync_core::model::{Status, Task};
use tasksync_core::mutation::MutationOutcome;
use tasksync_core::prefs::{self as saved, Preferences};
use tasksync_core::query::{FilterChange, SortDirection, SortField, TaskFilter};
use tasksync_core::{TaskClient, wire};

use crate::http::{HttpTransport, SessionToken};
use crate::output::{CliError, OutputMode, render_error};

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub config: UserConfig,
    pub output: OutputMode,
    pub prefs_path: Option<PathBuf>,
}

impl Context {
    /// A client over HTTP whose list view starts at `filter`.
    pub fn client(&self, filter: TaskFilter) -> TaskClient {
        let session = Arc::new(SessionToken::new(self.config.client.token.clone()));
        let transport = Arc::new(HttpTransport::new(&self.config.client, Arc::clone(&session)));
        TaskClient::new(transport, session, &self.config.engine, filter)
    }

    pub fn preferences(&self) -> Preferences {
        self.prefs_path
            .as_deref()
            .map(saved::load_preferences)
            .unwrap_or_default()
    }

    pub fn save_preferences(&self, prefs: &Preferences) -> Result<()> {
        let Some(path) = &self.prefs_path else {
            bail!("no data directory available to store preferences");
        };
        saved::save_preferences(path, prefs)
    }
}

/// Render a failed read and turn it into an error.
pub fn loaded(output: OutputMode, result: Result<QueryState, ApiError>) -> Result<QueryState> {
    result.or_else(|err| {
        render_error(output, &CliError::from(&err))?;
        Err(err.into())
    })
}

/// Render a failed or rejected mutation and turn it into an error.
pub fn confirmed(output: OutputMode, outcome: MutationOutcome) -> Result<Option<Task>> {
    outcome.into_result().or_else(|err| {
        render_error(output, &CliError::from(&err))?;
        Err(err.into())
    })
}

pub fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    wire::parse_date(raw).ok_or_else(|| format!("'{raw}' is not a date (use DD-MM-YYYY or YYYY-MM-DD)"))
}

/// List filters shared by `list` and `board`.
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Only tasks with this status (to-do, in-progress, done).
    #[arg(long, conflicts_with = "any_status")]
    pub status: Option<Status>,

    /// Drop a saved status filter.
    #[arg(long)]
    pub any_status: bool,

    /// Due on or after this date.
    #[arg(long, value_parser = parse_date_arg)]
    pub from: Option<NaiveDate>,

    /// Due on or before this date.
    #[arg(long, value_parser = parse_date_arg)]
    pub to: Option<NaiveDate>,

    /// Match name or description.
    #[arg(long)]
    pub search: Option<String>,

    /// Sort field (created_at, name, due_date).
    #[arg(long)]
    pub sort: Option<SortField>,

    #[arg(long, conflicts_with = "desc")]
    pub asc: bool,

    #[arg(long)]
    pub desc: bool,

    #[arg(long)]
    pub per_page: Option<u32>,

    #[arg(long)]
    pub page: Option<u32>,

    /// Ignore saved filters.
    #[arg(long)]
    pub fresh: bool,

    /// Remember the resulting filters and view.
    #[arg(long)]
    pub save: bool,
}

impl FilterArgs {
    /// Changes in application order; the page goes last because every other
    /// change resets it.
    pub fn changes(&self) -> Vec<FilterChange> {
        let mut changes = Vec::new();
        if let Some(status) = self.status {
            changes.push(FilterChange::Status(Some(status)));
        }
        if self.any_status {
            changes.push(FilterChange::Status(None));
        }
        if let Some(from) = self.from {
            changes.push(FilterChange::DueDateFrom(Some(from)));
        }
        if let Some(to) = self.to {
            changes.push(FilterChange::DueDateTo(Some(to)));
        }
        if let Some(search) = &self.search {
            changes.push(FilterChange::Search(search.clone()));
        }
        if let Some(field) = self.sort {
            changes.push(FilterChange::SortBy(field));
        }
        if self.asc {
            changes.push(FilterChange::SortDirection(SortDirection::Asc));
        }
        if self.desc {
            changes.push(FilterChange::SortDirection(SortDirection::Desc));
        }
        if let Some(n) = self.per_page {
            changes.push(FilterChange::PerPage(n));
        }
        if self.page.is_some() {
            changes.push(FilterChange::Page(self.page));
        }
        changes
    }

    pub fn resolve(&self, saved: &TaskFilter) -> TaskFilter {
        let base = if self.fresh {
            TaskFilter::default()
        } else {
            saved.clone()
        };
        base.with(self.changes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_survives_other_changes() {
        let args = FilterArgs {
            status: Some(Status::Done),
            page: Some(3),
            ..FilterArgs::default()
        };
        let filter = args.resolve(&TaskFilter::default());
        assert_eq!(filter.status, Some(Status::Done));
        assert_eq!(filter.page, Some(3));
    }

    #[test]
    fn fresh_ignores_saved_filters() {
        let saved = TaskFilter::default().with([FilterChange::Search("milk".into())]);
        let kept = FilterArgs::default().resolve(&saved);
        assert_eq!(kept.search, "milk");
        let args = FilterArgs {
            fresh: true,
            ..FilterArgs::default()
        };
        assert_eq!(args.resolve(&saved), TaskFilter::default());
    }

    #[test]
    fn dates_accept_both_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 12);
        assert_eq!(parse_date_arg("12-03-2025").ok(), expected);
        assert_eq!(parse_date_arg("2025-03-12").ok(), expected);
        assert!(parse_date_arg("soon").is_err());
    }
}
