use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use scout_engine::{
    run_eval, ContextEngine, EngineConfig, EvalDataset, JsonlSink, LogSink, TelemetrySink,
    TelemetryWriter,
};
use scout_indexer::{EnrichmentReport, FileChange, IndexOutcome};
use scout_protocol::{ContextRequest, SearchMode, SearchRequest};
use scout_store::{RepoRecord, Store};
use scout_vector_store::{Capabilities, StubEmbedder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_DB: &str = ".scout/index.db";
const STUB_DIMENSION: usize = 64;

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Context packs and code search for coding agents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Index database (defaults to <project>/.scout/index.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Engine settings in TOML
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Embedding backend
    #[arg(long, global = true, value_enum, default_value_t = EmbedMode::None)]
    embed_mode: EmbedMode,

    /// Append telemetry events as JSON lines to this file
    #[arg(long, global = true)]
    telemetry: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EmbedMode {
    /// No embeddings; semantic features degrade to keyword search
    None,
    /// Deterministic token-hash vectors, no model download
    Stub,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a project (skipped when the index already matches HEAD)
    Index(IndexArgs),
    /// Build a context pack for a goal
    Context(ContextArgs),
    /// Grep, semantic or hybrid code search
    Search(SearchArgs),
    /// Keep the index fresh while files change
    Watch(WatchArgs),
    /// Replay a gold dataset and report hit@k, recall@k and MRR
    Eval(EvalArgs),
    /// Manage registered repositories
    #[command(subcommand)]
    Repos(ReposCommand),
}

#[derive(Args)]
struct IndexArgs {
    /// Project directory to index (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Reindex even when the revision is unchanged
    #[arg(long)]
    force: bool,

    /// Display name for the repository
    #[arg(long)]
    name: Option<String>,

    /// Wait for embeddings, purposes and vocabulary clusters
    #[arg(long)]
    enrich: bool,
}

#[derive(Args)]
struct ContextArgs {
    /// What the agent is trying to do
    goal: String,

    /// Project directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Print the full response as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Grep,
    Semantic,
    Hybrid,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Grep => SearchMode::Grep,
            ModeArg::Semantic => SearchMode::Semantic,
            ModeArg::Hybrid => SearchMode::Hybrid,
        }
    }
}

#[derive(Args)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Project directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Search mode
    #[arg(long, short = 'm', value_enum, default_value_t = ModeArg::Grep)]
    mode: ModeArg,

    /// Maximum number of results
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Skip documentation and config files
    #[arg(long)]
    code_only: bool,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct WatchArgs {
    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,
}

#[derive(Args)]
struct EvalArgs {
    /// Dataset JSON file
    dataset: PathBuf,

    /// Project directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Cutoff for hit@k and recall@k
    #[arg(long, short = 'k', default_value_t = 10)]
    k: usize,
}

#[derive(Subcommand)]
enum ReposCommand {
    /// List registered repositories
    List,
    /// Forget a repository and everything indexed for it
    Remove {
        /// Repository id
        id: String,
    },
}

#[derive(Serialize)]
struct IndexOutput {
    repo: RepoRecord,
    outcome: IndexOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    enrichment: Option<EnrichmentReport>,
}

#[derive(Serialize)]
struct RemoveOutput {
    id: String,
    removed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match &cli.command {
        Commands::Index(args) => run_index(&cli, config, args).await,
        Commands::Context(args) => run_context(&cli, config, args).await,
        Commands::Search(args) => run_search(&cli, config, args).await,
        Commands::Watch(args) => run_watch(&cli, config, args).await,
        Commands::Eval(args) => run_eval_command(&cli, config, args).await,
        Commands::Repos(command) => run_repos(&cli, config, command).await,
    }
}

fn project_root(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("Invalid project path {}", path.display()))
}

fn db_path(cli: &Cli, root: &Path) -> PathBuf {
    cli.db.clone().unwrap_or_else(|| root.join(DEFAULT_DB))
}

fn capabilities(mode: EmbedMode) -> Capabilities {
    match mode {
        EmbedMode::None => Capabilities::none(),
        EmbedMode::Stub => {
            Capabilities::none().with_embedder(Arc::new(StubEmbedder::new(STUB_DIMENSION)))
        }
    }
}

fn open_engine(cli: &Cli, config: EngineConfig, db: &Path) -> Result<ContextEngine> {
    let store = Store::open(db)
        .with_context(|| format!("Failed to open index database {}", db.display()))?;
    let jsonl_path = cli.telemetry.clone().or_else(|| config.telemetry.jsonl_path.clone());
    let pending_limit = config.telemetry.pending_limit;
    let engine = ContextEngine::new(Arc::new(store), capabilities(cli.embed_mode), config)
        .context("Failed to start engine")?;

    let sink: Arc<dyn TelemetrySink> = match jsonl_path {
        Some(path) => Arc::new(JsonlSink::new(path)),
        None => Arc::new(LogSink),
    };
    Ok(engine.with_telemetry(TelemetryWriter::spawn(sink, pending_limit)))
}

/// Engine plus the repository rooted at `path`
fn open_project(
    cli: &Cli,
    config: EngineConfig,
    path: &Path,
    name: Option<&str>,
) -> Result<(ContextEngine, RepoRecord)> {
    let root = project_root(path)?;
    let engine = open_engine(cli, config, &db_path(cli, &root))?;
    let repo = engine
        .register(&root, name)
        .with_context(|| format!("Failed to register {}", root.display()))?;
    Ok((engine, repo))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_index(cli: &Cli, config: EngineConfig, args: &IndexArgs) -> Result<()> {
    let (engine, repo) = open_project(cli, config, &args.path, args.name.as_deref())?;
    let outcome = engine
        .indexer()
        .run_index(&repo.id, args.force)
        .await
        .with_context(|| format!("Indexing {} failed", repo.root_path))?;
    let enrichment = if args.enrich {
        Some(
            engine
                .indexer()
                .enrich(&repo.id)
                .await
                .context("Enrichment failed")?,
        )
    } else {
        None
    };

    let repo = engine.store().require_repo(&repo.id)?;
    print_json(&IndexOutput {
        repo,
        outcome,
        enrichment,
    })?;
    engine.shutdown().await;
    Ok(())
}

async fn run_context(cli: &Cli, config: EngineConfig, args: &ContextArgs) -> Result<()> {
    let (engine, repo) = open_project(cli, config, &args.path, None)?;
    let response = engine
        .context(&ContextRequest {
            repo_id: repo.id.clone(),
            goal: args.goal.clone(),
        })
        .await;

    if args.json {
        print_json(&response)?;
    } else {
        println!("{}", response.context_pack);
    }
    engine.shutdown().await;
    Ok(())
}

async fn run_search(cli: &Cli, config: EngineConfig, args: &SearchArgs) -> Result<()> {
    let (engine, repo) = open_project(cli, config, &args.path, None)?;
    engine
        .refresh(&repo.id)
        .await
        .with_context(|| format!("Indexing {} failed", repo.root_path))?;
    let mode = SearchMode::from(args.mode);
    if mode.needs_embeddings() && engine.indexer().capabilities().has_embeddings() {
        engine
            .indexer()
            .ensure_embedded(&repo.id)
            .await
            .context("Embedding backfill failed")?;
    }

    let response = engine
        .search(&SearchRequest {
            repo_id: repo.id.clone(),
            query: args.query.clone(),
            mode: Some(mode),
            limit: args.limit,
            code_only: args.code_only,
        })
        .await
        .context("Search failed")?;

    if args.json {
        print_json(&response)?;
    } else {
        if response.search_mode_used != mode {
            eprintln!("No embeddings available; used {} search", response.search_mode_used);
        }
        for (i, result) in response.results.iter().enumerate() {
            println!(
                "{}. {}:{}-{} (score: {:.3})",
                i + 1,
                result.path,
                result.start_line,
                result.end_line,
                result.score
            );
            if !result.snippet.is_empty() {
                println!("   {}", result.snippet);
            }
        }
    }
    engine.shutdown().await;
    Ok(())
}

async fn run_watch(cli: &Cli, config: EngineConfig, args: &WatchArgs) -> Result<()> {
    let (engine, repo) = open_project(cli, config, &args.path, None)?;
    engine
        .refresh(&repo.id)
        .await
        .with_context(|| format!("Indexing {} failed", repo.root_path))?;
    engine
        .indexer()
        .watch(&repo.id)
        .context("Failed to start watcher")?;
    let mut updates = engine
        .indexer()
        .watch_updates(&repo.id)
        .context("Watcher stopped before it could be subscribed")?;
    log::info!("Watching {} (Ctrl-C to stop)", repo.root_path);

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => match update.change {
                    FileChange::Rechunked(diff) => log::info!(
                        "{}: +{} ={} -{}",
                        update.path,
                        diff.inserted,
                        diff.unchanged,
                        diff.deleted
                    ),
                    FileChange::Removed { chunks } => {
                        log::info!("{}: removed ({chunks} chunks)", update.path)
                    }
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Skipped {skipped} watcher updates");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    log::warn!("Watcher stopped");
                    break;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }
    engine.shutdown().await;
    Ok(())
}

async fn run_eval_command(cli: &Cli, config: EngineConfig, args: &EvalArgs) -> Result<()> {
    let dataset = EvalDataset::load(&args.dataset).await?;
    let (engine, repo) = open_project(cli, config, &args.path, None)?;
    let report = run_eval(&engine, &repo.id, &dataset, args.k).await;
    print_json(&report)?;
    engine.shutdown().await;
    Ok(())
}

async fn run_repos(cli: &Cli, config: EngineConfig, command: &ReposCommand) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let engine = open_engine(cli, config, &db_path(cli, &cwd))?;
    match command {
        ReposCommand::List => print_json(&engine.list_repos()?)?,
        ReposCommand::Remove { id } => {
            let removed = engine.remove(id)?;
            print_json(&RemoveOutput {
                id: id.clone(),
                removed,
            })?;
        }
    }
    engine.shutdown().await;
    Ok(())
}
