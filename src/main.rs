use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stock_rag::cli::{self, RetrieverKind};
use stock_rag::config::Settings;

#[derive(Parser)]
#[command(name = "stock-rag")]
#[command(about = "News-driven stock analysis with retrieval-augmented generation", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Corpus JSON file (overrides settings)
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address (overrides settings)
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Embed the corpus and save the dense index
    Index,

    /// Query the corpus and print ranked records
    Query {
        /// Query text
        query: String,

        /// Number of results (defaults to retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Retriever to query
        #[arg(short, long, value_enum, default_value_t = RetrieverKind::Hybrid)]
        retriever: RetrieverKind,
    },

    /// Fetch and print a market snapshot
    Market,

    /// Print corpus statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stock_rag=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(corpus) = cli.corpus {
        settings.corpus_path = corpus;
    }

    match cli.command {
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                settings.server.addr = addr;
            }
            cli::serve(settings).await?;
        }

        Commands::Index => {
            cli::index(settings).await?;
        }

        Commands::Query {
            query,
            top_k,
            retriever,
        } => {
            cli::query(settings, query, top_k, retriever).await?;
        }

        Commands::Market => {
            cli::market(settings).await?;
        }

        Commands::Stats => {
            cli::stats(&settings)?;
        }
    }

    Ok(())
}
