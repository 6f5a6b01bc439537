use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sememe_vector_store::{EmbeddingConfig, EmbeddingMode, Pooling};
use std::io;
use std::path::PathBuf;

mod command;
pub mod config;
pub mod generation;
pub mod multi_turn;
pub mod prompt;

use config::AppConfig;
use prompt::PromptMode;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "sememe")]
#[command(about = "Sememe-augmented taxonomy classification and retrieval", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    #[command(flatten)]
    embedding: EmbeddingArgs,

    /// Config file (default: ./sememe.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Encoder overrides; only commands that embed text read them
#[derive(Args)]
struct EmbeddingArgs {
    /// Override embedding backend in this process
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Model directory holding model.onnx and tokenizer.json (overrides SEMEME_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Sentence pooling (overrides SEMEME_POOLING)
    #[arg(long, global = true, value_enum)]
    pooling: Option<PoolingArg>,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten, classify and export a taxonomy
    Classify(ClassifyArgs),

    /// Annotate question / triple samples with sememes (JSONL output)
    #[command(name = "process-qa")]
    ProcessQa(ProcessQaArgs),

    /// Build every configured index source
    #[command(name = "build-index")]
    BuildIndex(BuildIndexArgs),

    /// Search all configured indexes
    Search(SearchArgs),

    /// Retrieve and answer one question with the generation service
    Ask(AskArgs),

    /// Multi-turn retrieval-augmented answering
    Chat(ChatArgs),
}

#[derive(Args, Clone)]
struct TaxonomyArgs {
    /// Taxonomy JSON (overrides [taxonomy].path)
    #[arg(long)]
    taxonomy: Option<PathBuf>,

    /// Subtree key path, slash separated, e.g. Country/categories/Taiwan
    #[arg(long)]
    root: Option<String>,
}

#[derive(Args)]
struct ClassifyArgs {
    #[command(flatten)]
    taxonomy: TaxonomyArgs,

    /// Output directory for taxonomy_export.json and synonym_data.json
    #[arg(long, default_value = "output")]
    out: PathBuf,

    /// Print run statistics as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ProcessQaArgs {
    /// JSON array of {q, path} samples
    input: PathBuf,

    /// Output JSONL
    output: PathBuf,

    /// Record id prefix
    #[arg(long, default_value = "nlpcc")]
    base_id: String,

    #[arg(long, default_value_t = sememe_indexer::DEFAULT_QA_BATCH_SIZE)]
    batch_size: usize,

    #[command(flatten)]
    taxonomy: TaxonomyArgs,

    /// Print processing statistics as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct BuildIndexArgs {
    /// Only build the named sources
    #[arg(long = "source")]
    sources: Vec<String>,

    #[command(flatten)]
    taxonomy: TaxonomyArgs,

    /// Print indexing statistics as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SearchArgs {
    query: String,

    /// Number of merged results (overrides [search].top_k)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Merge strategy (overrides [search].merge)
    #[arg(long, value_enum)]
    merge: Option<MergeArg>,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct AskArgs {
    query: String,

    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    #[arg(long, value_enum, default_value_t = PromptMode::Standard)]
    mode: PromptMode,

    /// Print the prompt sent to the generation service
    #[arg(long)]
    show_prompt: bool,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ChatArgs {
    /// Initial question (read from stdin when omitted)
    query: Option<String>,

    #[arg(long)]
    max_turns: Option<usize>,

    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    #[arg(long, value_enum)]
    mode: Option<PromptMode>,

    /// Stop after the first answer instead of asking follow-ups
    #[arg(long)]
    no_follow_up: bool,

    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum EmbedMode {
    Onnx,
    Stub,
}

impl EmbedMode {
    const fn as_mode(self) -> EmbeddingMode {
        match self {
            Self::Onnx => EmbeddingMode::Onnx,
            Self::Stub => EmbeddingMode::Stub,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PoolingArg {
    Cls,
    Mean,
}

impl PoolingArg {
    const fn as_pooling(self) -> Pooling {
        match self {
            Self::Cls => Pooling::Cls,
            Self::Mean => Pooling::Mean,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MergeArg {
    Score,
    Rrf,
}

impl EmbeddingArgs {
    /// Embedding settings from the environment, with CLI flags taking precedence
    fn resolve(&self) -> Result<EmbeddingConfig> {
        let mut config = EmbeddingConfig::from_env().context("Invalid embedding environment")?;
        if let Some(mode) = self.embed_mode {
            config.mode = mode.as_mode();
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(pooling) = self.pooling {
            config.pooling = pooling.as_pooling();
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // ORT logs every session option at info
    if !cli.verbose {
        builder.filter_module("ort", log::LevelFilter::Off);
    }
    builder.target(env_logger::Target::Stderr).init();
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = AppConfig::load(cli.config.as_deref())?;
    let embedding = &cli.embedding;

    match cli.command {
        Commands::Classify(args) => command::classify::run(args, &config),
        Commands::ProcessQa(args) => command::qa::run(args, &config),
        Commands::BuildIndex(args) => {
            command::index::run(args, &config, &embedding.resolve()?).await
        }
        Commands::Search(args) => command::search::run(args, &config, &embedding.resolve()?).await,
        Commands::Ask(args) => {
            command::answer::run_ask(args, &config, &embedding.resolve()?).await
        }
        Commands::Chat(args) => {
            command::answer::run_chat(args, &config, &embedding.resolve()?).await
        }
    }
}
