//! `rfp-eval` CLI
//!
//! Builds fixtures and indexes from RFP records, answers questions with the
//! remote or local backend, and compares the two.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rfp_rag_eval::{
    AnswerBackend, Comparator, Config, Evaluator, FixtureBuilder, FixtureItem, Judge, LlmJudge,
    ProgressSink, PromptPolicy, RagBackend, RuleJudge,
    config::JudgeMode,
    corpus::{build_corpus, summarize_corpus},
    fixture::{load_fixture, save_fixture},
    llm::{LlmClient, OllamaClient},
    persistence::{load_index, save_index},
    records::{SourceRecord, load_records},
    retrieval::{ChunkConfig, ChunkIndex, RetrieverFactory},
    telemetry,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Retrieval-augmented QA over RFP documents with a remote-vs-local evaluator
#[derive(Parser)]
#[command(name = "rfp-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Remote,
    Local,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an evaluation fixture from the source records
    Fixture {
        /// CSV file of source records
        #[arg(long)]
        data: PathBuf,

        /// Number of questions to keep
        #[arg(long)]
        sample: Option<usize>,

        /// Output path for the fixture
        #[arg(short, long, default_value = "data/fixture.json")]
        output: PathBuf,
    },

    /// Chunk the corpus and save the index
    Index {
        /// CSV file of source records
        #[arg(long)]
        data: PathBuf,

        /// Output path (.bin for bincode, .json for JSON)
        #[arg(short, long, default_value = "data/rfp_index.bin")]
        output: PathBuf,

        /// Summarize every document with the remote model before chunking
        #[arg(long)]
        summarize: bool,
    },

    /// Answer one question
    Ask {
        question: String,

        #[arg(long, value_enum, default_value_t = BackendKind::Remote)]
        backend: BackendKind,

        /// CSV file of source records
        #[arg(long, required_unless_present = "index")]
        data: Option<PathBuf>,

        /// Saved index to retrieve from
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Evaluate one backend over a fixture
    Evaluate {
        #[arg(long, value_enum)]
        backend: BackendKind,

        /// CSV file of source records
        #[arg(long)]
        data: PathBuf,

        /// Saved fixture; built from --data when absent
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Number of questions when building the fixture
        #[arg(long)]
        sample: Option<usize>,

        /// Saved index; built from --data when absent
        #[arg(long)]
        index: Option<PathBuf>,

        /// Write the run as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Evaluate both backends over the same fixture and compare them
    Compare {
        /// CSV file of source records
        #[arg(long)]
        data: PathBuf,

        /// Saved fixture; built from --data when absent
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Number of questions when building the fixture
        #[arg(long)]
        sample: Option<usize>,

        /// Saved index; built from --data when absent
        #[arg(long)]
        index: Option<PathBuf>,

        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the per-item table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Check connectivity to the remote and local models
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json, telemetry::level_for_verbosity(cli.verbose));

    match cli.command {
        Commands::Fixture {
            data,
            sample,
            output,
        } => cmd_fixture(data, sample, output),
        Commands::Index {
            data,
            output,
            summarize,
        } => cmd_index(data, output, summarize).await,
        Commands::Ask {
            question,
            backend,
            data,
            index,
        } => cmd_ask(question, backend, data, index).await,
        Commands::Evaluate {
            backend,
            data,
            fixture,
            sample,
            index,
            output,
        } => cmd_evaluate(backend, data, fixture, sample, index, output).await,
        Commands::Compare {
            data,
            fixture,
            sample,
            index,
            output,
            csv,
        } => cmd_compare(data, fixture, sample, index, output, csv).await,
        Commands::Test => cmd_test().await,
    }
}

fn load_config() -> Result<Config> {
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn read_records(path: &Path) -> Result<Vec<SourceRecord>> {
    load_records(path).with_context(|| format!("Failed to load records from {}", path.display()))
}

fn chunk_config(config: &Config) -> ChunkConfig {
    ChunkConfig {
        chunk_size: config.retrieval.chunk_size,
        chunk_overlap: config.retrieval.chunk_overlap,
    }
}

fn fixture_for(
    records: &[SourceRecord],
    fixture: Option<&Path>,
    sample: Option<usize>,
) -> Result<Vec<FixtureItem>> {
    match fixture {
        Some(path) => {
            load_fixture(path).with_context(|| format!("Failed to load fixture {}", path.display()))
        }
        None => Ok(FixtureBuilder::build(records, sample)),
    }
}

fn index_for(records: &[SourceRecord], index: Option<&Path>, config: &Config) -> Result<ChunkIndex> {
    match index {
        Some(path) => load_index(path).context("Failed to load index"),
        None => Ok(ChunkIndex::build(&build_corpus(records), &chunk_config(config))),
    }
}

/// Attach the embedding model when a configured mode needs it.
#[cfg(feature = "embeddings")]
fn retriever_factory(mut index: ChunkIndex, config: &Config) -> Result<RetrieverFactory> {
    use rfp_rag_eval::retrieval::EmbeddingModel;

    let modes = [config.retrieval.remote_mode, config.retrieval.local_mode];
    if !modes.iter().any(|m| m.needs_embeddings()) {
        return Ok(RetrieverFactory::new(index));
    }

    let model = match &index.embedding_model {
        Some(model_id) => EmbeddingModel::load(model_id),
        None => EmbeddingModel::load_default(),
    }
    .context("Failed to load embedding model")?;
    if !index.has_embeddings() {
        index.embed_with(&model).context("Failed to embed chunks")?;
    }
    Ok(RetrieverFactory::new(index).with_model(Arc::new(model)))
}

#[cfg(not(feature = "embeddings"))]
fn retriever_factory(index: ChunkIndex, _config: &Config) -> Result<RetrieverFactory> {
    Ok(RetrieverFactory::new(index))
}

fn build_backend(
    kind: BackendKind,
    factory: &RetrieverFactory,
    config: &Config,
) -> Result<RagBackend> {
    let backend = match kind {
        BackendKind::Remote => {
            config.validate_remote().context("Remote backend is not configured")?;
            let retriever = factory
                .build(config.retrieval.remote_mode)
                .context("Failed to build remote retriever")?;
            RagBackend::new(
                "remote",
                retriever,
                Arc::new(LlmClient::new(config.remote.clone())),
                PromptPolicy::Remote,
            )
        }
        BackendKind::Local => {
            let retriever = factory
                .build(config.retrieval.local_mode)
                .context("Failed to build local retriever")?;
            RagBackend::new(
                "local",
                retriever,
                Arc::new(OllamaClient::new(config.local.clone())?),
                PromptPolicy::Local,
            )
        }
    };
    Ok(backend.with_top_k(config.retrieval.top_k))
}

fn build_judge(config: &Config) -> Result<Arc<dyn Judge>> {
    match config.judge.mode {
        JudgeMode::Llm => {
            config.validate_remote().context("LLM judge needs the remote endpoint")?;
            let client = LlmClient::new(config.judge_llm());
            Ok(Arc::new(LlmJudge::new(Arc::new(client))))
        }
        JudgeMode::Rules => Ok(Arc::new(RuleJudge::new())),
    }
}

/// Progress bar fed by the evaluator.
struct BarSink(ProgressBar);

impl BarSink {
    fn new(multi: &MultiProgress, total: usize) -> Result<Self> {
        let bar = multi.add(ProgressBar::new(total as u64));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress template")?
                .progress_chars("=>-"),
        );
        Ok(Self(bar))
    }
}

impl ProgressSink for BarSink {
    fn report(&mut self, fraction: f64, message: &str) {
        let len = self.0.length().unwrap_or(0);
        self.0.set_position((fraction * len as f64).round() as u64);
        self.0.set_message(message.to_string());
        if fraction >= 1.0 {
            self.0.finish();
        }
    }
}

fn cmd_fixture(data: PathBuf, sample: Option<usize>, output: PathBuf) -> Result<()> {
    let records = read_records(&data)?;
    let fixture = FixtureBuilder::build(&records, sample);
    save_fixture(&fixture, &output).context("Failed to save fixture")?;

    println!("Records:   {}", records.len());
    println!("Questions: {}", fixture.len());
    println!("Fixture saved to: {}", output.display());
    Ok(())
}

async fn cmd_index(data: PathBuf, output: PathBuf, summarize: bool) -> Result<()> {
    let config = load_config()?;
    let records = read_records(&data)?;
    let start = Instant::now();

    let mut docs = build_corpus(&records);
    println!("Documents: {} (of {} records)", docs.len(), records.len());

    if summarize {
        config
            .validate_remote()
            .context("Summarization needs the remote endpoint")?;
        println!("Summarizing with {}...", config.remote.model);
        let client = LlmClient::new(config.remote.clone());
        summarize_corpus(&mut docs, &client).await;
    }

    #[allow(unused_mut)]
    let mut index = ChunkIndex::build(&docs, &chunk_config(&config));

    #[cfg(feature = "embeddings")]
    {
        println!("Embedding {} chunks...", index.len());
        let model = rfp_rag_eval::retrieval::EmbeddingModel::load_default()
            .context("Failed to load embedding model")?;
        index.embed_with(&model).context("Failed to embed chunks")?;
    }

    save_index(&index, &output).context("Failed to save index")?;

    println!("\nIndex built:");
    println!("  Chunks:      {}", index.len());
    println!("  Embeddings:  {}", if index.has_embeddings() { "yes" } else { "no" });
    println!("  Build time:  {:.2?}", start.elapsed());
    println!("Index saved to: {}", output.display());
    Ok(())
}

async fn cmd_ask(
    question: String,
    kind: BackendKind,
    data: Option<PathBuf>,
    index: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;
    let records = match &data {
        Some(path) => read_records(path)?,
        None => Vec::new(),
    };
    let index = index_for(&records, index.as_deref(), &config)?;
    let factory = retriever_factory(index, &config)?;
    let backend = build_backend(kind, &factory, &config)?;

    let start = Instant::now();
    let answer = backend
        .generate_answer(&question, &[])
        .await
        .context("Failed to generate answer")?;

    println!("{}", answer.trim());
    println!("\n({} backend, {:.2?})", backend.name(), start.elapsed());
    Ok(())
}

async fn cmd_evaluate(
    kind: BackendKind,
    data: PathBuf,
    fixture: Option<PathBuf>,
    sample: Option<usize>,
    index: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;
    let records = read_records(&data)?;
    let fixture = fixture_for(&records, fixture.as_deref(), sample)?;
    let factory = retriever_factory(index_for(&records, index.as_deref(), &config)?, &config)?;
    let backend = build_backend(kind, &factory, &config)?;
    let judge = build_judge(&config)?;

    println!("Evaluating {} backend on {} questions...", backend.name(), fixture.len());
    let multi = MultiProgress::new();
    let mut bar = BarSink::new(&multi, fixture.len())?;

    let run = Evaluator::from_config(&config.eval)
        .evaluate(&fixture, &backend, judge.as_ref(), Some(&mut bar))
        .await;

    run.print_summary();
    if let Some(path) = output {
        run.save_json(&path).context("Failed to save results")?;
        println!("Results saved to: {}", path.display());
    }
    Ok(())
}

async fn cmd_compare(
    data: PathBuf,
    fixture: Option<PathBuf>,
    sample: Option<usize>,
    index: Option<PathBuf>,
    output: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;
    let records = read_records(&data)?;
    let fixture = fixture_for(&records, fixture.as_deref(), sample)?;
    let factory = retriever_factory(index_for(&records, index.as_deref(), &config)?, &config)?;
    let remote = build_backend(BackendKind::Remote, &factory, &config)?;
    let local = build_backend(BackendKind::Local, &factory, &config)?;
    let judge = build_judge(&config)?;

    println!("Comparing remote and local backends on {} questions...", fixture.len());
    let multi = MultiProgress::new();
    let mut remote_bar = BarSink::new(&multi, fixture.len())?;
    let mut local_bar = BarSink::new(&multi, fixture.len())?;

    let comparator = Comparator::new(Evaluator::from_config(&config.eval));
    let report = comparator
        .run(
            &fixture,
            &remote,
            &local,
            judge.as_ref(),
            Some(&mut remote_bar),
            Some(&mut local_bar),
        )
        .await;

    report.print_summary();
    if let Some(path) = output {
        report.save_json(&path).context("Failed to save report")?;
        println!("Report saved to: {}", path.display());
    }
    if let Some(path) = csv {
        report.save_csv(&path).context("Failed to save CSV table")?;
        println!("Table saved to: {}", path.display());
    }
    Ok(())
}

async fn cmd_test() -> Result<()> {
    println!("Testing model connections...\n");

    let config = Config::load().context("Failed to load configuration")?;
    let key_prefix: String = config.remote.api_key.chars().take(8).collect();

    println!("Remote:");
    println!("  API Base:  {}", config.remote.api_base);
    println!("  Model:     {}", config.remote.model);
    println!("  API Key:   {}...", key_prefix);
    match config.validate_remote() {
        Err(e) => println!("  Configuration error: {}", e),
        Ok(()) => match LlmClient::new(config.remote.clone()).test_connection().await {
            Ok(()) => println!("  Connection successful!"),
            Err(e) => println!("  Connection failed: {}", e),
        },
    }

    println!("\nLocal:");
    println!("  URL:       {}", config.local.base_url);
    println!("  Model:     {}", config.local.model);
    let client = OllamaClient::new(config.local.clone())?;
    if client.health_check().await? {
        println!("  Ollama is reachable.");
    } else {
        println!("  Ollama is not reachable.");
    }

    Ok(())
}
