//! `tsk update`: change fields of an existing task.

use anyhow::bail;
use chrono::NaiveDate;
use clap::Args;
use tasksync_core::model::{Status, TaskChanges, TaskId};
use tasksync_core::query::TaskFilter;

use super::{Context, confirmed, parse_date_arg};
use crate::output::{CliError, render_error, render_mode, task_line, task_row};

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: TaskId,

    #[arg(short, long)]
    pub name: Option<String>,

    #[arg(short, long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long)]
    pub clear_description: bool,

    #[arg(short, long)]
    pub status: Option<Status>,

    #[arg(long, value_parser = parse_date_arg, conflicts_with = "clear_due")]
    pub due: Option<NaiveDate>,

    #[arg(long)]
    pub clear_due: bool,
}

impl UpdateArgs {
    fn changes(&self) -> TaskChanges {
        TaskChanges {
            name: self.name.clone(),
            description: if self.clear_description {
                Some(None)
            } else {
                self.description.clone().map(Some)
            },
            status: self.status,
            due_date: if self.clear_due {
                Some(None)
            } else {
                self.due.map(Some)
            },
        }
    }
}

/// Execute `tsk update`.
///
/// # Errors
///
/// Returns an error when no field is given or the server rejects the change.
pub async fn run_update(args: &UpdateArgs, ctx: &Context) -> anyhow::Result<()> {
    let changes = args.changes();
    if changes.is_empty() {
        let error = CliError {
            suggestion: Some("pass --name, --description, --status or --due".into()),
            ..CliError::new("nothing to update")
        };
        render_error(ctx.output, &error)?;
        bail!("nothing to update");
    }

    let client = ctx.client(TaskFilter::default());
    let updated = confirmed(ctx.output, client.mutate_update(args.id.clone(), changes).await)?;
    client.idle().await;

    match updated {
        Some(task) => render_mode(ctx.output, &task, |t, w| task_row(w, t), |t, w| task_line(w, t)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> UpdateArgs {
        UpdateArgs {
            id: TaskId::from(4),
            name: None,
            description: None,
            clear_description: false,
            status: None,
            due: None,
            clear_due: false,
        }
    }

    #[test]
    fn no_flags_means_no_changes() {
        assert!(args().changes().is_empty());
    }

    #[test]
    fn clear_flags_map_to_explicit_none() {
        let changes = UpdateArgs {
            clear_description: true,
            clear_due: true,
            ..args()
        }
        .changes();
        assert_eq!(changes.description, Some(None));
        assert_eq!(changes.due_date, Some(None));
        assert_eq!(changes.name, None);
    }
}
