//! `clap`-derived subcommands wired to a single `RetrievalFacade`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nook_core::path_layout::PathLayout;
use nook_rag::RetrievalFacade;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "nook", version, about = "Local-first knowledge base and retrieval engine")]
pub struct Cli {
    /// Override the data directory (defaults to `~/.Nook`).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Re-index every document from scratch, diffing against what's stored.
    Reindex,
    /// Serve the JSON-RPC tool host over stdio.
    ServeMcp,
    /// Run a one-shot semantic search against the indexed documents.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        chunks: bool,
    },
    /// Print index and embedding-provider status.
    Stats,
    /// Delete the vector store and re-embed everything (use after an
    /// embedding provider or model change).
    RebuildIndex,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let layout = match cli.data_dir {
        Some(dir) => PathLayout::new(dir),
        None => PathLayout::default_layout(),
    };

    match cli.command {
        Command::RebuildIndex => {
            let vectors_db = layout.vectors_db();
            if vectors_db.exists() {
                std::fs::remove_file(&vectors_db)?;
                info!(path = %vectors_db.display(), "removed existing vector store");
            }
            let facade = RetrievalFacade::open(layout).await?;
            run_reindex(&facade).await?;
        }
        Command::Reindex => {
            let facade = RetrievalFacade::open(layout).await?;
            run_reindex(&facade).await?;
        }
        Command::ServeMcp => {
            let facade = Arc::new(RetrievalFacade::open(layout).await?);
            nook_mcp::serve(facade).await?;
        }
        Command::Search { query, limit, chunks } => {
            let facade = RetrievalFacade::open(layout).await?;
            if chunks {
                let hits = facade.search_semantic_chunks(&query, limit, None).await?;
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                let hits = facade.search_semantic_documents(&query, limit).await?;
                println!("{}", serde_json::to_string_pretty(&hits)?);
            }
        }
        Command::Stats => {
            let facade = RetrievalFacade::open(layout).await?;
            let stats = facade.get_rag_status()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

async fn run_reindex(facade: &RetrievalFacade) -> anyhow::Result<()> {
    let report = facade
        .reindex_all(|progress| {
            info!(
                phase = ?progress.phase,
                current = progress.current,
                total = progress.total,
                "reindexing"
            );
        })
        .await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.failed > 0 {
        for error in &report.errors {
            eprintln!("error: {error}");
        }
    }
    Ok(())
}
