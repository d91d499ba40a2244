//! `tsk show`: one task in full.

use std::io::Write;

use anyhow::bail;
use clap::Args;
use tasksync_core::model::{QueryData, Task, TaskId};
use tasksync_core::query::{QueryKey, TaskFilter};

use super::{Context, loaded};
use crate::output::{
    CliError, due_label, pretty_kv, pretty_section, render_error, render_mode, status_label,
};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Task id.
    pub id: TaskId,
}

/// Execute `tsk show <id>`.
///
/// # Errors
///
/// Returns an error when the task cannot be fetched.
pub async fn run_show(args: &ShowArgs, ctx: &Context) -> anyhow::Result<()> {
    let client = ctx.client(TaskFilter::default());
    let state = loaded(ctx.output, client.fetch(&QueryKey::Task(args.id.clone())).await)?;
    let Some(QueryData::Single(task)) = state.data else {
        render_error(ctx.output, &CliError::new(format!("task {} not found", args.id)))?;
        bail!("task {} not found", args.id);
    };
    render_mode(ctx.output, &task, render_show_text, render_show_human)
}

fn render_show_text(task: &Task, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "id\t{}", task.id)?;
    writeln!(w, "name\t{}", task.name)?;
    writeln!(w, "status\t{}", status_label(task))?;
    writeln!(w, "due\t{}", due_label(task))?;
    writeln!(w, "description\t{}", task.description.as_deref().unwrap_or(""))
}

fn render_show_human(task: &Task, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Task {}", task.id))?;
    writeln!(w, "{}", task.name)?;
    writeln!(w)?;
    pretty_kv(w, "status", status_label(task))?;
    pretty_kv(w, "due", due_label(task))?;
    if let Some(created) = task.created_at {
        pretty_kv(w, "created", created.format("%Y-%m-%d %H:%M").to_string())?;
    }
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        writeln!(w)?;
        writeln!(w, "{description}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_core::model::Status;

    #[test]
    fn human_detail_lists_fields() {
        let task = Task {
            id: TaskId::from(7),
            name: "Plan sprint".into(),
            description: Some("Agenda first".into()),
            status: Some(Status::InProgress),
            due_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 31),
            created_at: None,
        };
        let mut buf = Vec::new();
        render_show_human(&task, &mut buf).expect("render");
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("Task 7"));
        assert!(text.contains("In Progress"));
        assert!(text.contains("31-01-2025"));
        assert!(text.contains("Agenda first"));
    }
}
