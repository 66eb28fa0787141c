use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use quill_core::config::ConfigLoader;
use quill_core::llm::providers::create_adapter;
use quill_core::{ChatPipeline, FileSessionStore, VaultDocuments};

mod commands;
mod repl;

#[derive(Parser, Debug)]
#[clap(name = "quill", author, version = "0.1.0", about = "Chat with a model that edits your markdown notes")]
struct Cli {
    #[clap(long, short, help = "Path to a quill.yaml configuration file")]
    config: Option<PathBuf>,

    #[clap(long, help = "Directory holding the markdown documents (overrides vault.root)")]
    vault: Option<PathBuf>,

    #[clap(long, short, help = "Log level (overrides logging.level)")]
    log_level: Option<String>,

    #[clap(long, help = "Chat session id to resume")]
    session: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::from_file(path).await?,
        None => ConfigLoader::from_env()?,
    };
    if let Some(vault) = cli.vault {
        config.vault.root = vault;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // Logs go to a file so they don't interleave with the chat on stdout
    let log_level_filter = config.logging.level.parse().unwrap_or(LevelFilter::Info);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.logging.file)
        .with_context(|| format!("Failed to open log file {}", config.logging.file.display()))?;
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    log::info!(
        "Starting quill with vault {} and sessions in {}",
        config.vault.root.display(),
        config.sessions.dir.display()
    );

    let adapter = create_adapter(&config.llm)?;
    let documents = Arc::new(
        VaultDocuments::new(config.vault.root.clone()).with_extension(config.vault.extension.clone()),
    );
    let store = Arc::new(FileSessionStore::new(config.sessions.dir.clone()));

    let mut pipeline = ChatPipeline::open(adapter, documents, store, &config).await?;
    if let Some(session) = cli.session {
        pipeline
            .switch_session(&session)
            .await
            .with_context(|| format!("Could not resume session {}", session))?;
    }

    repl::run(pipeline).await
}
