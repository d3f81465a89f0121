use anyhow::Result;

use crate::cli::setup::load_project;
use crate::core::config::{AbariConfig, CONFIG_FILE, resolve_secret};
use crate::core::style;
use crate::providers::ProviderId;

pub async fn run() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let source = AbariConfig::find(&cwd);
    let (config, root) = load_project()?;

    println!("{}", style::header("CONFIG"));
    println!();
    match &source {
        Some(path) => println!("{}", style::summary_line("file", &path.display().to_string())),
        None => println!(
            "{}",
            style::summary_line("file", &format!("(no {}, using defaults)", CONFIG_FILE))
        ),
    }
    println!("{}", style::summary_line("project root", &root.display().to_string()));
    println!();

    let a = &config.assistant;
    println!("{}", style::summary_line("assistant.persona", &a.persona));
    println!("{}", style::summary_line("assistant.temperature", &a.temperature.to_string()));
    println!("{}", style::summary_line("assistant.top_k", &a.top_k.to_string()));
    println!();

    let c = &config.client;
    let order: Vec<&str> = c.order.iter().map(|id| id.name()).collect();
    println!("{}", style::summary_line("client.order", &order.join(" -> ")));
    println!("{}", style::summary_line("client.timeout_secs", &c.timeout_secs.to_string()));
    println!("{}", style::summary_line("client.max_retries", &c.max_retries.to_string()));
    println!("{}", style::summary_line("client.max_tokens", &c.max_tokens.to_string()));
    println!();

    println!("{}", style::header("PROVIDERS"));
    println!();
    for id in ProviderId::ALL {
        let enabled = if c.order.contains(&id) { "" } else { " (not in order)" };
        match (config.remote_settings(id), config.key_env(id)) {
            (Some(settings), Some(key_env)) => {
                let key = resolve_secret(&key_env);
                println!(
                    "{}",
                    style::summary_line(id.name(), &format!("{}{}", settings.model, enabled))
                );
                println!("{}", style::summary_line("  base_url", &settings.base_url));
                println!(
                    "{}",
                    style::summary_line(
                        "  key",
                        &format!("{} [{}]", key_env, style::key_status(key.as_deref()))
                    )
                );
            }
            _ => {
                let local = &config.providers.local;
                println!(
                    "{}",
                    style::summary_line(
                        id.name(),
                        &format!("canned answer, confidence {}{}", local.confidence, enabled)
                    )
                );
            }
        }
    }
    println!();

    println!("{}", style::header("RETRIEVAL"));
    println!();
    let e = &config.embedding;
    println!("{}", style::summary_line("embedding.model", &e.model));
    println!(
        "{}",
        style::summary_line(
            "embedding.key",
            &format!("{} [{}]", e.key_env, style::key_status(resolve_secret(&e.key_env).as_deref()))
        )
    );

    let v = &config.vector_store;
    println!("{}", style::summary_line("vector_store.backend", &v.backend));
    if v.backend == "pinecone" {
        println!(
            "{}",
            style::summary_line("vector_store.index_host", v.index_host.as_deref().unwrap_or("(none)"))
        );
        println!(
            "{}",
            style::summary_line(
                "vector_store.key",
                &format!("{} [{}]", v.key_env, style::key_status(resolve_secret(&v.key_env).as_deref()))
            )
        );
    } else {
        let path = AbariConfig::resolve_path(&root, &v.path);
        println!("{}", style::summary_line("vector_store.path", &path.display().to_string()));
    }
    println!(
        "{}",
        style::summary_line(
            "chunking",
            &format!("{} chars, {} overlap", config.chunking.chunk_size, config.chunking.overlap)
        )
    );
    println!();

    println!("{}", style::header("INTERACTION LOG"));
    println!();
    let l = &config.interaction_log;
    println!("{}", style::summary_line("backend", &l.backend));
    match l.backend.as_str() {
        "jsonl" => {
            let path = AbariConfig::resolve_path(&root, &l.path);
            println!("{}", style::summary_line("path", &path.display().to_string()));
        }
        "supabase" => {
            println!(
                "{}",
                style::summary_line(
                    "url",
                    &format!("{} [{}]", l.url_env, style::key_status(resolve_secret(&l.url_env).as_deref()))
                )
            );
            println!(
                "{}",
                style::summary_line(
                    "key",
                    &format!("{} [{}]", l.key_env, style::key_status(resolve_secret(&l.key_env).as_deref()))
                )
            );
            println!("{}", style::summary_line("table", &l.table));
        }
        _ => {}
    }

    Ok(())
}
