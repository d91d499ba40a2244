//! `tsk delete`: remove a task.


use clap::Args;
use serde::Serialize;
use tasksync_core::model::TaskId;

use super::{Context, confirmed};
use crate::output::render_mode;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: TaskId,
}

#[derive(Debug, Serialize)]
struct Deleted {
    deleted: TaskId,
}

/// Execute `tsk delete <id>`.
///
/// # Errors
///
/// Returns an error when the server refuses the delete.
pub async fn run_delete(args: &DeleteArgs, ctx: &Context) -> anyhow::Result<()> {
    let client = ctx.client(ctx.preferences().filters);
    confirmed(ctx.output, client.mutate_delete(args.id.clone()).await)?;
    client.idle().await;

    let output = Deleted {
        deleted: args.id.clone(),
    };
    render_mode(
        ctx.output,
        &output,
        |d, w| writeln!(w, "{}", d.deleted),
        |d, w| writeln!(w, "deleted task {}", d.deleted),
    )
}
