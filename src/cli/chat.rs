use std::io::Write;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::setup::{build_assistant, load_project};
use crate::core::style;

pub async fn run(temperature: Option<f64>, no_context: bool) -> Result<()> {
    let (config, root) = load_project()?;

    let mut assistant = build_assistant(&config, &root, !no_context)?;
    if let Some(t) = temperature {
        assistant = assistant.with_temperature(t);
    }

    eprintln!("{}", "abaribot chat".bold().cyan());
    eprintln!(
        "{}",
        style::hint("Ask about eye health. `reset` starts over, `quit` leaves.")
    );
    eprintln!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}", style::prompt());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            println!();
            break;
        };
        let question = line.trim();

        match question {
            "" => continue,
            "quit" | "exit" => break,
            "reset" => {
                assistant.reset();
                eprintln!("{}", style::success("Conversation cleared"));
                continue;
            }
            _ => {}
        }

        match assistant.ask(question).await {
            Ok(answer) => println!("{}", style::answer(&answer.text, answer.result.provider)),
            Err(e) => eprintln!("{}", style::error(&format!("{:#}", e))),
        }
        println!();
    }

    let turns = assistant.conversation().len() / 2;
    eprintln!("{}", style::hint(&format!("Session ended after {} answer(s).", turns)));
    Ok(())
}
