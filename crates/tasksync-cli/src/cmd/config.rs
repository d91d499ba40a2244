//! `tsk config`: inspect the effective configuration.

use std::io::Write;

use clap::Subcommand;
use serde::Serialize;
use tasksync_core::config::{UserConfig, default_config_path};

use super::Context;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the merged configuration (file plus environment).
    Show,
    /// Print where the config file is read from.
    Path,
}

#[derive(Debug, Serialize)]
struct ConfigPath {
    path: Option<String>,
    exists: bool,
}

/// Masks the token so `config show` can be pasted into a bug report.
fn redacted(config: &UserConfig) -> UserConfig {
    let mut shown = config.clone();
    if shown.client.token.is_some() {
        shown.client.token = Some("<redacted>".into());
    }
    shown
}

/// Execute `tsk config <show|path>`.
///
/// # Errors
///
/// Returns an error when the configuration cannot be serialized or written.
pub fn run_config(command: &ConfigCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => render_mode(
            ctx.output,
            &redacted(&ctx.config),
            render_config_text,
            render_config_human,
        ),
        ConfigCommand::Path => {
            let path = default_config_path();
            let output = ConfigPath {
                exists: path.as_deref().is_some_and(std::path::Path::exists),
                path: path.map(|p| p.display().to_string()),
            };
            render_mode(
                ctx.output,
                &output,
                |p, w| writeln!(w, "{}", p.path.as_deref().unwrap_or("")),
                |p, w| {
                    let label = if p.exists { "" } else { " (not created yet)" };
                    writeln!(w, "{}{label}", p.path.as_deref().unwrap_or("no config directory"))
                },
            )
        }
    }
}

fn render_config_text(config: &UserConfig, w: &mut dyn Write) -> std::io::Result<()> {
    let body = toml::to_string_pretty(config).map_err(std::io::Error::other)?;
    write!(w, "{body}")
}

fn render_config_human(config: &UserConfig, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Configuration")?;
    pretty_kv(w, "base_url", &config.client.base_url)?;
    pretty_kv(w, "timeout", format!("{}s", config.client.timeout_secs))?;
    pretty_kv(w, "token", config.client.token.as_deref().unwrap_or("(none)"))?;
    pretty_kv(w, "output", config.output.as_deref().unwrap_or("(auto)"))?;
    pretty_kv(w, "debounce", format!("{}ms", config.engine.search_debounce_ms))?;
    pretty_kv(w, "retention", format!("{}s", config.engine.retention_secs))?;
    pretty_kv(
        w,
        "stale after",
        config
            .engine
            .stale_after_secs
            .map_or_else(|| "never".to_string(), |s| format!("{s}s")),
    )?;
    pretty_kv(w, "retries", config.engine.mutation_retries.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_masked() {
        let mut config = UserConfig::default();
        config.client.token = Some("secret".into());
        let shown = redacted(&config);
        assert_eq!(shown.client.token.as_deref(), Some("<redacted>"));
        assert_eq!(redacted(&UserConfig::default()).client.token, None);
    }
}
