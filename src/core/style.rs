//! Colored terminal output for the abaribot CLI.
//!
//! Colors are disabled automatically when the stream is not a TTY.

use colored::Colorize;

use crate::providers::ProviderId;

/// "=== Title ==="
pub fn header(title: &str) -> String {
    format!("=== {} ===", title.bold())
}

pub fn success(msg: &str) -> String {
    format!("{} {}", "✓".green().bold(), msg)
}

pub fn warning(msg: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), msg)
}

pub fn error(msg: &str) -> String {
    format!("{} {}", "✗".red().bold(), msg)
}

pub fn hint(msg: &str) -> String {
    format!("{}", msg.dimmed())
}

/// Aligned "key: value" line
pub fn summary_line(key: &str, value: &str) -> String {
    format!("  {:<22} {}", format!("{}:", key).dimmed(), value)
}

/// Chat prompt shown before each question
pub fn prompt() -> String {
    format!("{} ", "you>".bold().cyan())
}

/// The assistant's answer, labelled with the provider that produced it
pub fn answer(text: &str, provider: ProviderId) -> String {
    let label = match provider {
        ProviderId::LocalFallback => provider.name().yellow(),
        _ => provider.name().green(),
    };
    format!("{} {}\n{}", "dr.eye".bold().magenta(), format!("[{}]", label).dimmed(), text)
}

/// Key presence without revealing the key: "set (sk-abcde...)" or "NOT SET"
pub fn key_status(value: Option<&str>) -> String {
    match value {
        Some(key) => {
            let shown: String = key.chars().take(8).collect();
            format!("{} ({}...)", "set".green(), shown)
        }
        None => format!("{}", "NOT SET".red()),
    }
}

/// "  + eye_3" for an inserted chunk
pub fn chunk_inserted(id: &str) -> String {
    format!("  {} {}", "+".green().bold(), id)
}

/// "  ✗ eye_4: error" for a chunk that could not be stored
pub fn chunk_failed(id: &str, error: &str) -> String {
    format!("  {} {} {}", "✗".red().bold(), id.red(), error.dimmed())
}
