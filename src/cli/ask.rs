use anyhow::Result;

use crate::cli::setup::{build_assistant, load_project};
use crate::core::style;

pub async fn run(
    question: String,
    temperature: Option<f64>,
    top_k: Option<usize>,
    no_context: bool,
) -> Result<()> {
    let (config, root) = load_project()?;

    let mut assistant = build_assistant(&config, &root, !no_context)?;
    if let Some(t) = temperature {
        assistant = assistant.with_temperature(t);
    }
    if let Some(k) = top_k {
        assistant = assistant.with_top_k(k);
    }

    let answer = assistant.ask(&question).await?;

    println!("{}", style::answer(&answer.text, answer.result.provider));
    if !answer.context.is_empty() {
        eprintln!();
        eprintln!(
            "{}",
            style::hint(&format!("({} chars of retrieved context)", answer.context.chars().count()))
        );
    }

    Ok(())
}
