//! Shared output layer for pretty/text/JSON parity across all commands.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` / hidden `--json` flag
//! 2. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. `output` in the user config file
//! 4. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use std::io::{self, Write};

use clap::ValueEnum;
use serde::Serialize;
use tasksync_core::config::resolve_output;
use tasksync_core::error::{ApiError, ErrorCode};
use tasksync_core::model::{Status, Task};
use tasksync_core::wire;

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (tables, sections, visual framing).
    Pretty,
    /// Plain tab-separated rows for scripts and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Text => "text",
            Self::Json => "json",
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            "text" => Self::Text,
            _ => Self::Pretty,
        }
    }
}

/// Resolve the output mode from flags, `FORMAT`, the config file and the
/// terminal.
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    user_output: Option<&str>,
) -> OutputMode {
    let flag = format_flag
        .or_else(|| json_flag.then_some(OutputMode::Json))
        .map(OutputMode::as_str);
    let env_val = std::env::var("FORMAT").ok();
    OutputMode::from_name(resolve_output(flag, user_output, env_val.as_deref()))
}

/// Render a serializable value in JSON mode, or through the given closures.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Per-field validation messages.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<(String, String)>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
            fields: Vec::new(),
        }
    }

    /// An error that did not come from the API, tagged with `code`.
    pub fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
            ..Self::new(message)
        }
    }
}

impl From<&ApiError> for CliError {
    fn from(err: &ApiError) -> Self {
        let code = err.code();
        let fields = match err {
            ApiError::Validation { fields, .. } => fields
                .iter()
                .flat_map(|(field, messages)| {
                    messages.iter().map(move |m| (field.clone(), m.clone()))
                })
                .collect(),
            _ => Vec::new(),
        };
        Self {
            message: err.to_string(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
            fields,
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            writeln!(out, "error: {}", error.message)?;
            for (field, message) in &error.fields {
                writeln!(out, "  {field}: {message}")?;
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

pub fn status_label(task: &Task) -> &'static str {
    task.status.map_or("-", Status::as_str)
}

pub fn due_label(task: &Task) -> String {
    task.due_date
        .map_or_else(|| "-".to_string(), wire::format_wire_date)
}

/// One tab-separated row: id, status, due date, name.
pub fn task_row(w: &mut dyn Write, task: &Task) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}",
        task.id,
        status_label(task),
        due_label(task),
        task.name
    )
}

/// One aligned row for pretty tables.
pub fn task_line(w: &mut dyn Write, task: &Task) -> io::Result<()> {
    writeln!(
        w,
        "{:<8} {:<12} {:<11} {}",
        task.id.to_string(),
        status_label(task),
        due_label(task),
        task.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_core::model::TaskId;

    #[test]
    fn flag_beats_everything() {
        assert_eq!(
            resolve_output_mode(Some(OutputMode::Text), true, Some("json")),
            OutputMode::Text
        );
        assert_eq!(resolve_output_mode(None, true, Some("text")), OutputMode::Json);
    }

    #[test]
    fn validation_fields_are_listed() {
        let err = ApiError::invalid_field("name", "The name field is required.");
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E4001"));
        assert_eq!(
            cli.fields,
            [("name".to_string(), "The name field is required.".to_string())]
        );
    }

    #[test]
    fn rows_use_wire_dates() {
        let task = Task {
            id: TaskId::from(3),
            name: "Ship".into(),
            description: None,
            status: None,
            due_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 12),
            created_at: None,
        };
        let mut buf = Vec::new();
        task_row(&mut buf, &task).expect("write");
        assert_eq!(String::from_utf8_lossy(&buf), "3\t-\t12-03-2025\tShip\n");
    }
}
