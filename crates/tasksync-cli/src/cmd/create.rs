//! `tsk create`: add a task.

use chrono::NaiveDate;
use clap::Args;
use tasksync_core::model::{Status, TaskDraft};
use tracing::info;

use super::{Context, confirmed, parse_date_arg};
use crate::output::{render_mode, task_line, task_row};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Task name.
    pub name: String,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Initial status; the server defaults to To Do.
    #[arg(short, long)]
    pub status: Option<Status>,

    /// Due date (DD-MM-YYYY or YYYY-MM-DD).
    #[arg(long, value_parser = parse_date_arg)]
    pub due: Option<NaiveDate>,
}

/// Execute `tsk create`.
///
/// # Errors
///
/// Returns an error when the draft is invalid or the server rejects it.
pub async fn run_create(args: &CreateArgs, ctx: &Context) -> anyhow::Result<()> {
    let draft = TaskDraft {
        name: args.name.clone(),
        description: args.description.clone(),
        status: args.status,
        due_date: args.due,
    };
    let client = ctx.client(ctx.preferences().filters);
    let created = confirmed(ctx.output, client.mutate_create(draft).await)?;
    client.idle().await;

    match created {
        Some(task) => {
            info!(id = %task.id, "task created");
            render_mode(ctx.output, &task, |t, w| task_row(w, t), |t, w| task_line(w, t))
        }
        None => Ok(()),
    }
}
