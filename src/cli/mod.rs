pub mod ask;
pub mod chat;
pub mod config;
pub mod init;
pub mod populate;
pub mod setup;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "abaribot")]
#[command(about = "Ophthalmology chat assistant with retrieval and LLM provider fallback")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question
    Ask {
        /// The question
        question: String,

        /// Sampling temperature (0.0 - 1.0)
        #[arg(short, long, value_parser = parse_temperature)]
        temperature: Option<f64>,

        /// Number of stored chunks to use as context
        #[arg(short = 'k', long, value_parser = parse_top_k)]
        top_k: Option<usize>,

        /// Answer without looking up context
        #[arg(long)]
        no_context: bool,
    },

    /// Start an interactive conversation (type `quit` to leave)
    Chat {
        /// Sampling temperature (0.0 - 1.0)
        #[arg(short, long, value_parser = parse_temperature)]
        temperature: Option<f64>,

        /// Answer without looking up context
        #[arg(long)]
        no_context: bool,
    },

    /// Chunk a document, embed it and add it to the vector store
    Populate {
        /// Path to a .txt or .md document
        path: PathBuf,

        /// Chunk id prefix (defaults to the file name without extension)
        #[arg(long)]
        prefix: Option<String>,

        /// Characters per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared by consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Write a default abaribot.toml in the current directory
    Init {
        /// Overwrite an existing abaribot.toml
        #[arg(long)]
        force: bool,
    },

    /// Show the resolved configuration and which API keys are set
    Config,
}

fn parse_temperature(value: &str) -> Result<f64, String> {
    let temperature: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if !(0.0..=1.0).contains(&temperature) {
        return Err(format!("temperature must be between 0.0 and 1.0, got {}", temperature));
    }
    Ok(temperature)
}

fn parse_top_k(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) | Err(_) => Err(format!("'{}' is not a positive integer", value)),
        Ok(k) => Ok(k),
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Ask {
                question,
                temperature,
                top_k,
                no_context,
            } => ask::run(question, temperature, top_k, no_context).await,
            Commands::Chat {
                temperature,
                no_context,
            } => chat::run(temperature, no_context).await,
            Commands::Populate {
                path,
                prefix,
                chunk_size,
                overlap,
            } => populate::run(path, prefix, chunk_size, overlap).await,
            Commands::Init { force } => init::run(force).await,
            Commands::Config => config::run().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_temperature() {
        assert_eq!(parse_temperature("0.2"), Ok(0.2));
        assert_eq!(parse_temperature("1"), Ok(1.0));
        assert!(parse_temperature("1.5").is_err());
        assert!(parse_temperature("-0.1").is_err());
        assert!(parse_temperature("warm").is_err());
    }

    #[test]
    fn test_parse_top_k() {
        assert_eq!(parse_top_k("3"), Ok(3));
        assert!(parse_top_k("0").is_err());
        assert!(parse_top_k("-1").is_err());
    }

    #[test]
    fn test_cli_parses_ask() {
        let cli = Cli::try_parse_from(["abaribot", "-v", "ask", "What is a cataract?", "-t", "0.3", "--no-context"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Ask {
                question,
                temperature,
                top_k,
                no_context,
            } => {
                assert_eq!(question, "What is a cataract?");
                assert_eq!(temperature, Some(0.3));
                assert_eq!(top_k, None);
                assert!(no_context);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_cli_rejects_out_of_range_temperature() {
        assert!(Cli::try_parse_from(["abaribot", "ask", "hi", "--temperature", "2"]).is_err());
    }
}
