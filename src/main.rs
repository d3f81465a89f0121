use clap::Parser;

use abaribot::cli::Cli;
use abaribot::core::style;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let default_filter = if cli.verbose { "abaribot=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli.run().await {
        eprintln!("{}", style::error(&format!("{:#}", e)));
        std::process::exit(1);
    }
}
