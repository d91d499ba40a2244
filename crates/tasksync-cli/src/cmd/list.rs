//! `tsk list`: one page of tasks under the current filters.

use std::io::Write;

use clap::Args;
use serde::Serialize;
use tasksync_core::model::{PageMeta, QueryData, Task};
use tasksync_core::prefs::ActiveView;
use tracing::info;

use super::{Context, FilterArgs, loaded};
use crate::output::{pretty_rule, pretty_section, render_mode, task_line, task_row};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Debug, Serialize)]
pub struct ListOutput {
    pub key: String,
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

/// Execute `tsk list`.
///
/// # Errors
///
/// Returns an error when the request fails or preferences cannot be saved.
pub async fn run_list(args: &ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut prefs = ctx.preferences();
    let filter = args.filters.resolve(&prefs.filters);
    let client = ctx.client(filter.clone());

    let state = loaded(ctx.output, client.list().await)?;
    if args.filters.save {
        prefs.filters = filter;
        prefs.active_view = ActiveView::List;
        ctx.save_preferences(&prefs)?;
        info!("list filters saved");
    }

    let (tasks, meta) = match state.data {
        Some(QueryData::Collection(page)) => (page.tasks, page.meta),
        Some(QueryData::Single(task)) => (vec![task], None),
        None => (Vec::new(), None),
    };
    let output = ListOutput {
        key: client.active_key().to_string(),
        tasks,
        meta,
    };

    render_mode(ctx.output, &output, render_list_text, render_list_human)
}

fn render_list_text(list: &ListOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for task in &list.tasks {
        task_row(w, task)?;
    }
    Ok(())
}

fn render_list_human(list: &ListOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Tasks ({})", list.tasks.len()))?;
    if list.tasks.is_empty() {
        writeln!(w, "No tasks match these filters.")?;
        return Ok(());
    }
    writeln!(w, "{:<8} {:<12} {:<11} NAME", "ID", "STATUS", "DUE")?;
    for task in &list.tasks {
        task_line(w, task)?;
    }
    if let Some(meta) = list.meta {
        pretty_rule(w)?;
        writeln!(
            w,
            "page {} of {} ({} total, {} per page)",
            meta.current_page, meta.last_page, meta.total, meta.per_page
        )?;
    }
    Ok(())
}
