//! `tsk prefs`: the saved view and filters.

use std::io::Write;

use chrono::NaiveDate;
use clap::{Subcommand, ValueEnum};
use tasksync_core::model::Status;
use tasksync_core::prefs::{ActiveView, Preferences};
use tasksync_core::wire;

use super::Context;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    /// Print the saved view and filters.
    Show,
    /// Forget everything saved.
    Reset,
    /// Choose which view opens by default.
    View { view: ViewArg },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ViewArg {
    Board,
    List,
}

impl From<ViewArg> for ActiveView {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Board => Self::Board,
            ViewArg::List => Self::List,
        }
    }
}

/// Execute `tsk prefs <show|reset|view>`.
///
/// # Errors
///
/// Returns an error when preferences cannot be written.
pub fn run_prefs(command: &PrefsCommand, ctx: &Context) -> anyhow::Result<()> {
    let prefs = match command {
        PrefsCommand::Show => ctx.preferences(),
        PrefsCommand::Reset => {
            let prefs = Preferences::default();
            ctx.save_preferences(&prefs)?;
            prefs
        }
        PrefsCommand::View { view } => {
            let mut prefs = ctx.preferences();
            prefs.active_view = (*view).into();
            ctx.save_preferences(&prefs)?;
            prefs
        }
    };
    render_mode(ctx.output, &prefs, render_prefs_text, render_prefs_human)
}

fn render_prefs_text(prefs: &Preferences, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "view\t{}", prefs.active_view)?;
    for (name, value) in prefs.filters.params().iter() {
        writeln!(w, "{name}\t{value}")?;
    }
    Ok(())
}

fn render_prefs_human(prefs: &Preferences, w: &mut dyn Write) -> std::io::Result<()> {
    let filters = &prefs.filters;
    pretty_section(w, "Preferences")?;
    pretty_kv(w, "view", prefs.active_view.to_string())?;
    pretty_kv(w, "status", filters.status.map_or("any", Status::as_str))?;
    let date = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), wire::format_wire_date);
    pretty_kv(
        w,
        "due",
        format!("{} .. {}", date(filters.due_date_from), date(filters.due_date_to)),
    )?;
    if !filters.search.is_empty() {
        pretty_kv(w, "search", &filters.search)?;
    }
    pretty_kv(
        w,
        "sort",
        format!("{} {}", filters.sort_by, filters.sort_direction),
    )?;
    pretty_kv(w, "per page", filters.per_page.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_core::query::{FilterChange, TaskFilter};

    #[test]
    fn text_lists_view_and_params() {
        let prefs = Preferences {
            active_view: ActiveView::Board,
            filters: TaskFilter::default().with([FilterChange::Status(Some(Status::Done))]),
        };
        let mut buf = Vec::new();
        render_prefs_text(&prefs, &mut buf).expect("render");
        let text = String::from_utf8_lossy(&buf);
        assert!(text.starts_with("view\tboard\n"));
        assert!(text.contains("status\tDone\n"));
    }
}
