//! # campus-rag CLI Application
//!
//! This module implements the command-line interface for the retrieval
//! pipeline, one subcommand per stage.
//!
//! ## Key Components
//!
//! - CLI argument parsing with clap
//! - Subcommands for the pipeline stages:
//!   - `crawl`: Harvest an institution's website into JSON artifacts
//!   - `index`: Summarize, embed and store the artifacts
//!   - `search`: Rank indexed documents against query texts
//!   - `ask`: Answer a question, grounded on the index when relevant
//!   - `list`: Inspect the document store
//!
//! Paths and the API key can also be supplied through environment variables
//! (`CAMPUS_RAG_DATABASE`, `CAMPUS_RAG_DOCUMENTS`, `CAMPUS_RAG_INSTITUTIONS`,
//! `OPENAI_API_KEY`).

mod telemetry;

use anyhow::Context as _;
use campus_rag::assistant::{Assistant, ChatMessage};
use campus_rag::crawler::{Crawler, CrawlerConfig, Storage, StorageConfig};
use campus_rag::index::{Database, InstitutionRegistry};
use campus_rag::model::OpenAiClient;
use campus_rag::processor::{IndexOutcome, IndexProgress, Indexer, ProcessorConfig};
use campus_rag::search::{SearchEngine, SearchOptions};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rig::providers::openai;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::instrument;

#[derive(Parser)]
#[command(author, version, about = "Crawl, index and search institutional websites for a campus assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl a website and save one artifact per page
    Crawl(CrawlArgs),

    /// Summarize, embed and store crawled artifacts
    Index(IndexArgs),

    /// Search the indexed documents
    Search(SearchArgs),

    /// Ask the assistant a question
    Ask(AskArgs),

    /// List indexed documents
    List(ListArgs),
}

#[derive(Args, Debug)]
struct DatabaseArg {
    /// Database path
    #[arg(long, env = "CAMPUS_RAG_DATABASE", default_value = "index.db")]
    database: PathBuf,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// URL to start from
    #[arg(required = true)]
    url: String,

    /// Deepest level whose links are followed
    #[arg(short, long, default_value = "5")]
    depth: u32,

    /// Per-request timeout in seconds
    #[arg(short, long, default_value = "5")]
    timeout: u64,

    /// Number of pages fetched at once
    #[arg(short, long, default_value = "1")]
    concurrency: usize,

    /// Directory for the crawled artifacts
    #[arg(short, long, env = "CAMPUS_RAG_DOCUMENTS", default_value = "documents")]
    output_dir: PathBuf,
}

#[derive(Args, Debug)]
struct IndexArgs {
    /// Directory holding the crawled artifacts
    #[arg(long, env = "CAMPUS_RAG_DOCUMENTS", default_value = "documents")]
    documents: PathBuf,

    #[command(flatten)]
    db: DatabaseArg,

    /// JSON list of `{"id", "url_prefix"}` institutions
    #[arg(short, long, env = "CAMPUS_RAG_INSTITUTIONS")]
    institutions: Option<PathBuf>,

    /// Number of documents processed concurrently
    #[arg(short, long, default_value = "8")]
    concurrency: usize,

    /// Delete artifacts once they are stored
    #[arg(long)]
    prune: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Query texts; each is embedded separately
    #[arg(required = true)]
    query: Vec<String>,

    /// Restrict results to this institution (plus general documents)
    #[arg(short, long)]
    school: Option<i64>,

    /// Limit results
    #[arg(short, long, default_value = "10")]
    limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(flatten)]
    db: DatabaseArg,
}

#[derive(Args, Debug)]
struct AskArgs {
    /// Question to answer
    #[arg(required = true)]
    question: String,

    /// Institution the student belongs to
    #[arg(short, long)]
    school: Option<i64>,

    #[command(flatten)]
    db: DatabaseArg,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[command(flatten)]
    db: DatabaseArg,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _otel = telemetry::init_tracing_subscriber()?;

    match cli.command {
        Some(Commands::Crawl(args)) => crawl_command(args).await?,
        Some(Commands::Index(args)) => index_command(args).await?,
        Some(Commands::Search(args)) => search_command(args).await?,
        Some(Commands::Ask(args)) => ask_command(args).await?,
        Some(Commands::List(args)) => list_command(args).await?,
        None => {
            // If no command is provided, show help
            let _ = Cli::parse_from(["--help"]);
        }
    }

    Ok(())
}

async fn open_database(path: &Path) -> anyhow::Result<Database> {
    Database::new_from_path(&path.to_string_lossy())
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))
}

fn openai_client(config: &ProcessorConfig) -> anyhow::Result<OpenAiClient> {
    let api_key =
        std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY environment variable must be set")?;
    Ok(OpenAiClient::new_openai(
        openai::Client::new(&api_key),
        &config.completion_model,
        &config.embedding_model,
        config.timeout(),
    ))
}

#[instrument]
async fn crawl_command(args: CrawlArgs) -> anyhow::Result<()> {
    println!("Crawling {}...", args.url);

    let config = CrawlerConfig::builder()
        .max_depth(args.depth)
        .timeout_secs(args.timeout)
        .concurrency(args.concurrency)
        .build();
    let storage = Storage::with_config(StorageConfig {
        base_path: args.output_dir.clone(),
    });

    let report = Crawler::new(config)?
        .with_storage(storage)
        .crawl(&args.url)
        .await?;

    println!(
        "Crawled {} pages ({} visited, {} dead links, {} duplicates)",
        report.documents.len(),
        report.visited.len(),
        report.dead_branches,
        report.duplicates
    );
    println!("Saved artifacts to {}", args.output_dir.display());

    Ok(())
}

#[instrument]
async fn index_command(args: IndexArgs) -> anyhow::Result<()> {
    let config = ProcessorConfig::builder()
        .concurrency(args.concurrency)
        .prune_artifacts(args.prune)
        .build();
    let client = openai_client(&config)?;

    let mut db = open_database(&args.db.database).await?;
    if let Some(path) = &args.institutions {
        let registry = InstitutionRegistry::load(path)
            .await
            .with_context(|| format!("Failed to load institutions from {}", path.display()))?;
        println!("Loaded {} institutions", registry.institutions().len());
        db = db.with_registry(registry);
    }

    let storage = Storage::with_config(StorageConfig {
        base_path: args.documents.clone(),
    });
    let total = storage.list().await?.len();
    println!("Indexing {} artifacts from {}...", total, args.documents.display());

    let progress_bar = ProgressBar::new(total as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")?
            .progress_chars("##-"),
    );
    progress_bar.set_message("Indexing documents...");

    let (progress_sender, mut progress_receiver) = mpsc::channel::<IndexProgress>(100);
    let start_time = std::time::Instant::now();

    let progress_handle = tokio::spawn({
        let progress_bar = progress_bar.clone();
        async move {
            while let Some(event) = progress_receiver.recv().await {
                progress_bar.inc(1);
                progress_bar.set_message(progress_message(&event));
            }
            progress_bar.finish_with_message("Indexing completed");
        }
    });

    let indexer = Indexer::new(client, db, config);
    let report = indexer.index_storage(&storage, Some(progress_sender)).await?;

    // Wait for progress task to complete (it will end when all senders are dropped)
    let _ = progress_handle.await;

    println!(
        "Indexed {}, skipped {}, failed {} in {:.2?}",
        report.indexed,
        report.skipped,
        report.failed,
        start_time.elapsed()
    );

    Ok(())
}

/// Artifact file name followed by what happened to it
fn progress_message(event: &IndexProgress) -> String {
    let name = event
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let status = match &event.result {
        Ok(IndexOutcome::Indexed(_)) => "indexed",
        Ok(IndexOutcome::AlreadyIndexed) => "already indexed",
        Ok(IndexOutcome::EmptyContent) => "empty",
        Err(_) => "failed",
    };
    format!("{} {}", name, status)
}

#[instrument]
async fn search_command(args: SearchArgs) -> anyhow::Result<()> {
    let client = openai_client(&ProcessorConfig::default())?;
    let db = open_database(&args.db.database).await?;

    let options = SearchOptions {
        limit: args.limit,
        ..SearchOptions::default()
    };
    let engine = SearchEngine::load(&db, client.embedding().clone(), options).await?;
    let results = engine.search(&args.query, args.school).await?;

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        OutputFormat::Text => {
            println!("Found {} results", results.len());
            for (i, result) in results.iter().enumerate() {
                let document = &result.document.document;
                println!("{}. {} ({:.3})", i + 1, document.title, result.score);
                println!("   URL: {}", document.url);
                println!("   Summary: {}", result.document.summary);
                println!();
            }
        }
    }

    Ok(())
}

#[instrument]
async fn ask_command(args: AskArgs) -> anyhow::Result<()> {
    let client = openai_client(&ProcessorConfig::default())?;
    let db = open_database(&args.db.database).await?;

    let engine =
        SearchEngine::load(&db, client.embedding().clone(), SearchOptions::default()).await?;
    let assistant = Assistant::new(client.completion().clone(), engine);

    let reply = assistant
        .reply(&[ChatMessage::user(args.question)], args.school)
        .await?;

    println!("{}", reply.message);
    if let Some(attachment) = reply.attachment {
        println!("\nSource: {}", attachment.title);
        println!("{}", attachment.url);
    }

    Ok(())
}

#[instrument]
async fn list_command(args: ListArgs) -> anyhow::Result<()> {
    let db = open_database(&args.db.database).await?;

    let documents = db.list_documents().await?;
    println!("Stored documents: {}", db.count_documents().await?);

    for document in documents {
        let school = document
            .school_id
            .map(|id| format!("school {}", id))
            .unwrap_or_else(|| "general".to_string());
        println!(
            "{} - {} [{}] (indexed: {})",
            document.url,
            document.title,
            school,
            document.indexed_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}
