//! `tsk board`: the list view regrouped into status columns.

use std::io::Write;

use clap::Args;
use tasksync_core::BoardGrouping;
use tasksync_core::prefs::ActiveView;

use super::{Context, FilterArgs, loaded};
use crate::output::{due_label, pretty_section, render_mode, task_row};

#[derive(Args, Debug)]
pub struct BoardArgs {
    #[command(flatten)]
    pub filters: FilterArgs,
}

/// Execute `tsk board`.
///
/// # Errors
///
/// Returns an error when the request fails or preferences cannot be saved.
pub async fn run_board(args: &BoardArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut prefs = ctx.preferences();
    let filter = args.filters.resolve(&prefs.filters);
    let client = ctx.client(filter.clone());

    loaded(ctx.output, client.list().await)?;
    if args.filters.save {
        prefs.filters = filter;
        prefs.active_view = ActiveView::Board;
        ctx.save_preferences(&prefs)?;
    }

    let board = client.board_view();
    render_mode(ctx.output, &board, render_board_text, render_board_human)
}

fn render_board_text(board: &BoardGrouping, w: &mut dyn Write) -> std::io::Result<()> {
    for column in &board.columns {
        for task in &column.tasks {
            task_row(w, task)?;
        }
    }
    Ok(())
}

fn render_board_human(board: &BoardGrouping, w: &mut dyn Write) -> std::io::Result<()> {
    for (i, column) in board.columns.iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }
        pretty_section(w, &format!("{} ({})", column.status, column.tasks.len()))?;
        for task in &column.tasks {
            writeln!(w, "  {:<8} {:<11} {}", task.id.to_string(), due_label(task), task.name)?;
        }
    }
    Ok(())
}
