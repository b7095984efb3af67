//! Fathom CLI — deep research, web search, and summaries from the terminal.
//!
//! Plans and compiles multi-step research reports, or retrieves and
//! summarizes web sources, using an OpenRouter-hosted language model.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
