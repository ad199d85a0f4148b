//! Command-line argument parsing.
//!
//! Flags override the corresponding config file fields; everything has a
//! working default so `cameriere` with a `menu.json` next to it just runs.

use clap::Parser;
use std::path::PathBuf;

/// Virtual waiter: conversational menu ordering powered by a local LLM.
#[derive(Parser)]
#[command(name = "cameriere")]
#[command(about = "Cameriere virtuale - ordina dal menu conversando", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Path to the menu JSON file (overrides the config file)
    #[arg(long)]
    pub menu: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Generation backend: ollama, openai-compatible or scripted
    #[arg(long)]
    pub provider: Option<String>,

    /// Model name (provider-specific)
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL of the generation API
    #[arg(long)]
    pub base_url: Option<String>,

    /// Write the conversation transcript here on exit
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Show the extraction engine's decisions after each turn
    #[arg(long)]
    pub debug_extraction: bool,
}
