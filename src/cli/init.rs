use anyhow::{Context, Result};
use colored::Colorize;

use crate::core::config::{CONFIG_FILE, DEFAULT_CONFIG};
use crate::core::style;

pub async fn run(force: bool) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config_path = cwd.join(CONFIG_FILE);

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists in {}\n\
             Hint: Use `abaribot init --force` to overwrite it.",
            CONFIG_FILE,
            cwd.display()
        );
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    eprintln!(
        "{}",
        style::success(&format!("Wrote {} in {}", CONFIG_FILE, cwd.display()))
    );
    eprintln!();
    eprintln!("{}", "Next steps:".bold());
    eprintln!(
        "  1. Put your API keys in {} (OPENAI_API_KEY, ANTHROPIC_API_KEY, MISTRAL_API_KEY)",
        ".env".cyan()
    );
    eprintln!("  2. Run {} to add documents", "abaribot populate <file.txt>".cyan());
    eprintln!("  3. Run {} to start a conversation", "abaribot chat".cyan());

    Ok(())
}
