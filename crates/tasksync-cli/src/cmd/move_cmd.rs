//! `tsk move`: drop a task into another board column.
//!
//! When the task is on the saved list view the move goes through the board
//! gesture, so the card is shown in its new column while the write is
//! pending. Tasks outside the view get a plain status update.

use std::io::Write;

use clap::Args;
use serde::Serialize;
use tasksync_core::model::{Status, TaskId};
use tracing::debug;

use super::{Context, confirmed, loaded};
use crate::output::render_mode;

#[derive(Args, Debug)]
pub struct MoveArgs {
    pub id: TaskId,
    /// Target column (to-do, in-progress, done).
    pub status: Status,
}

#[derive(Debug, Serialize)]
struct MoveOutput {
    id: TaskId,
    status: Status,
    changed: bool,
}

/// Execute `tsk move <id> <status>`.
///
/// # Errors
///
/// Returns an error when the list cannot be loaded or the status change is
/// rolled back.
pub async fn run_move(args: &MoveArgs, ctx: &Context) -> anyhow::Result<()> {
    let client = ctx.client(ctx.preferences().filters);
    loaded(ctx.output, client.list().await)?;

    let outcome = if client.begin_drag(&args.id) {
        client.drag_over(Some(args.status));
        client.complete_drop(Some(args.status)).await
    } else {
        debug!(id = %args.id, "task not on the list view, updating status directly");
        Some(client.mutate_status(args.id.clone(), args.status).await)
    };

    let changed = match outcome {
        Some(outcome) => {
            confirmed(ctx.output, outcome)?;
            true
        }
        None => false,
    };
    client.idle().await;

    let output = MoveOutput {
        id: args.id.clone(),
        status: args.status,
        changed,
    };
    render_mode(ctx.output, &output, render_move, render_move)
}

fn render_move(output: &MoveOutput, w: &mut dyn Write) -> std::io::Result<()> {
    if output.changed {
        writeln!(w, "moved {} to {}", output.id, output.status)
    } else {
        writeln!(w, "{} is already in {}", output.id, output.status)
    }
}
