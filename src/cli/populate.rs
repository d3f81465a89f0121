use std::path::PathBuf;

use anyhow::{Result, bail};
use colored::Colorize;

use crate::cli::setup::{build_embedder, build_store, load_project};
use crate::core::populate::{PopulateOptions, Populator, default_prefix};
use crate::core::style;

pub async fn run(
    path: PathBuf,
    prefix: Option<String>,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let (config, root) = load_project()?;

    let options = PopulateOptions {
        prefix: prefix.unwrap_or_else(|| default_prefix(&path)),
        chunk_size: chunk_size.unwrap_or(config.chunking.chunk_size),
        overlap: overlap.unwrap_or(config.chunking.overlap),
    };

    let populator = Populator::new(build_embedder(&config)?, build_store(&config, &root)?);

    eprintln!(
        "{} {} {}",
        "Populating from".cyan(),
        path.display().to_string().bold(),
        style::hint(&format!(
            "(chunks of {}, overlap {}, ids {}_N)",
            options.chunk_size, options.overlap, options.prefix
        ))
    );

    let summary = populator.populate(&path, &options).await?;

    for id in &summary.inserted {
        eprintln!("{}", style::chunk_inserted(id));
    }
    for (id, error) in &summary.failed {
        eprintln!("{}", style::chunk_failed(id, error));
    }

    eprintln!();
    eprintln!("{}", style::summary_line("chunks", &summary.chunks.to_string()));
    eprintln!("{}", style::summary_line("inserted", &summary.inserted.len().to_string()));
    eprintln!("{}", style::summary_line("failed", &summary.failed.len().to_string()));

    if summary.chunks == 0 {
        eprintln!("{}", style::warning("Document has no text to store"));
    } else if summary.inserted.is_empty() {
        bail!("No chunks could be stored (see errors above)");
    } else {
        eprintln!(
            "{}",
            style::success(&format!("Stored {} chunk(s)", summary.inserted.len()))
        );
    }

    Ok(())
}
