//! # docsage CLI
//!
//! The `docsage` binary initializes the database, ingests and queries
//! documents from the command line, and starts the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! docsage --config ./config/docsage.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsage init` | Create the SQLite database and run schema migrations |
//! | `docsage serve` | Start the HTTP server |
//! | `docsage ingest <file>` | Extract, embed and store a document |
//! | `docsage extract <file>` | Print a document's extracted text |
//! | `docsage query "<question>"` | Answer a question from stored documents |
//! | `docsage documents` | List stored documents |
//! | `docsage reset --yes` | Delete every stored document |
//!
//! `ingest`, `query` and `serve` need `JINA_API_KEY` (or the configured
//! embedding key) and `GEMINI_API_KEY` in the environment.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use docsage::config;
use docsage::rag::RagService;
use docsage::store::sqlite::SqliteStore;
use docsage::store::Store;
use docsage::{extract, server};

/// docsage: upload documents, ask questions about them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "docsage",
    about = "docsage: a small retrieval-augmented generation backend",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docsage.toml`. Settings can be overridden with
    /// `DB_PATH`, `TOP_K`, `MAX_DOCS`, `MAX_DOC_SIZE`, `GEMINI_GEN_MODEL`
    /// and `BIND_ADDR`.
    #[arg(long, global = true, default_value = "./config/docsage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents table.
    /// Running it more than once is safe.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Extract, embed and store a document.
    Ingest {
        /// Path to a `.pdf`, `.docx`, `.txt` or `.md` file.
        file: PathBuf,
    },

    /// Print the text extracted from a document without storing it.
    Extract {
        /// Path to a `.pdf`, `.docx`, `.txt` or `.md` file.
        file: PathBuf,
    },

    /// Answer a question using the stored documents as context.
    Query {
        /// The question.
        question: String,
    },

    /// List stored documents.
    Documents,

    /// Delete every stored document.
    ///
    /// Required after switching to an embedding model with a different
    /// dimensionality.
    Reset {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Extraction needs neither config nor database.
    if let Commands::Extract { file } = &cli.command {
        let (filename, bytes) = read_document(file)?;
        let text = extract::extract_text(&bytes, &filename)?;
        println!("{}", text);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            SqliteStore::open(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ingest { file } => {
            let service = RagService::from_config(&cfg).await?;
            let (filename, bytes) = read_document(&file)?;
            let outcome = service.upload(&filename, &bytes).await?;
            println!(
                "{} (ID: {}, file: {})",
                outcome.message, outcome.doc_id, outcome.filename
            );
        }
        Commands::Query { question } => {
            let service = RagService::from_config(&cfg).await?;
            let answer = service.query(&question).await?;
            println!("{}", answer.answer);
            if !answer.contexts.is_empty() {
                println!();
                println!("Sources:");
                for ctx in &answer.contexts {
                    println!(
                        "  [id={}] {} (similarity {:.4})",
                        ctx.id, ctx.title, ctx.similarity
                    );
                }
            }
        }
        Commands::Documents => {
            let store = SqliteStore::open(&cfg).await?;
            list_documents(&store).await?;
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("Refusing to delete all documents without --yes");
            }
            let store = SqliteStore::open(&cfg).await?;
            let removed = store.clear().await?;
            println!("Removed {} document(s).", removed);
        }
        Commands::Extract { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}

fn read_document(path: &Path) -> anyhow::Result<(String, Vec<u8>)> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Not a file path: {}", path.display()))?
        .to_string();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok((filename, bytes))
}

async fn list_documents(store: &dyn Store) -> anyhow::Result<()> {
    let docs = store.list().await?;
    if docs.is_empty() {
        println!("No documents stored.");
        return Ok(());
    }
    for doc in &docs {
        println!("{:>5}  {}", doc.id, doc.title);
    }
    println!("{} document(s)", docs.len());
    Ok(())
}
