//! Cameriere - virtual waiter for the terminal.
//!
//! Loads the menu, picks the generation backend from config/flags and runs
//! the conversation loop. Exits non-zero only on unrecoverable startup
//! failure; everything per-turn is downgraded to a user-visible message.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cameriere::cli::Cli;
use cameriere::llm_client::LlmBackend;
use cameriere::orchestrator::Session;
use cameriere::repl;

use cameriere_common::config::{Config, ProviderKind};
use cameriere_common::menu::Catalog;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with the conversation.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(provider) = &cli.provider {
        config.llm.provider = provider.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.llm.base_url = base_url.clone();
    }
    if let Some(menu) = &cli.menu {
        config.menu.path = menu.display().to_string();
    }

    let catalog =
        Catalog::load(&config.menu.path).context("failed to load menu, cannot start")?;
    info!(
        "Menu '{}' ready: {} items",
        catalog.restaurant,
        catalog.len()
    );

    let backend = LlmBackend::from_config(&config.llm).context("failed to set up LLM provider")?;
    if !backend.is_available().await {
        eprintln!(
            "Attenzione: il provider {} non risponde su {}.",
            config.llm.provider, config.llm.base_url
        );
        if config.llm.provider == ProviderKind::Ollama {
            eprintln!("  - Assicurati che Ollama sia in esecuzione: ollama serve");
            eprintln!("  - Scarica il modello: ollama pull {}", config.llm.model);
        }
        eprintln!("Le risposte del cameriere useranno il messaggio di cortesia.\n");
    }

    let mut session = Session::new(Arc::new(catalog), backend, config.llm.clone());
    repl::run(&mut session, cli.export.as_deref(), cli.debug_extraction).await
}
