//! # specaudit CLI entry point
//!
//! Indexes a specification corpus into SQLite and analyzes audit text
//! against it, printing the JSON report on stdout. Logs go to stderr.

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use specaudit::config::Config;
use specaudit::corpus::loader;
use specaudit::db::Db;
use specaudit::embedder::download;
use specaudit::{AnalysisOptions, Engine, EngineError, Thresholds};

#[derive(Parser, Debug)]
#[command(name = "specaudit", version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, global = true, default_value = "config.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk and embed the specification corpus and save it to the database.
    Index {
        /// Overwrite an existing corpus snapshot.
        #[arg(long)]
        replace: bool,

        /// Files, directories or globs; defaults to `corpus_patterns` from the config.
        patterns: Vec<String>,
    },

    /// Analyze an audit document (`-` reads stdin) and print the JSON report.
    Analyze {
        input: String,

        /// Matches kept per infraction.
        #[arg(long)]
        top_k: Option<usize>,

        /// Similarity below which no specification is considered to match.
        #[arg(long)]
        min_match: Option<f32>,

        /// Similarity at which a match makes the infraction repealable (MEDIUM).
        #[arg(long)]
        medium: Option<f32>,

        /// Similarity for a HIGH confidence repeal.
        #[arg(long)]
        high: Option<f32>,

        /// Pretty-print the report.
        #[arg(long)]
        pretty: bool,
    },

    /// Show the persisted corpus.
    Status,

    /// Download the ONNX model files into the configured model directory.
    DownloadModel,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            let input_error = e
                .downcast_ref::<EngineError>()
                .is_some_and(EngineError::is_input_error);
            ExitCode::from(if input_error { 2 } else { 1 })
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Index { replace, patterns } => {
            if !patterns.is_empty() {
                config.corpus_patterns = patterns;
            }
            index(&config, replace)
        }
        Commands::Analyze {
            input,
            top_k,
            min_match,
            medium,
            high,
            pretty,
        } => {
            let thresholds = Thresholds {
                top_k: top_k.unwrap_or(config.thresholds.top_k),
                min_match: min_match.unwrap_or(config.thresholds.min_match),
                medium_confidence: medium.unwrap_or(config.thresholds.medium_confidence),
                high_confidence: high.unwrap_or(config.thresholds.high_confidence),
            };
            analyze(&config, &input, thresholds, pretty)
        }
        Commands::Status => status(&config),
        Commands::DownloadModel => {
            download::download_model_files(Path::new(&config.model.dir), &config.model.name)?;
            info!("Model files ready in {}", config.model.dir);
            Ok(())
        }
    }
}

fn index(config: &Config, replace: bool) -> Result<()> {
    let mut db = Db::open(&config.db_path).context("Failed to open database")?;
    if !replace && db.corpus_meta()?.is_some() {
        bail!(
            "{} already holds a corpus; pass --replace to rebuild it",
            config.db_path
        );
    }

    let documents = loader::load_from_config(config)?;
    if documents.is_empty() {
        warn!("No specification documents found; the corpus will be empty");
    }

    let engine = Engine::from_config(config)?;
    let handle = engine.build_corpus(&documents)?;
    db.save_store(handle.store())?;
    info!(
        "Indexed {} document(s) into {} chunk(s)",
        documents.len(),
        handle.store().len()
    );
    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    let bytes = if input == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read(input).with_context(|| format!("Failed to read {input}"))?
    };
    String::from_utf8(bytes)
        .map_err(|_| EngineError::InvalidInput("audit text is not valid UTF-8".to_string()).into())
}

fn analyze(config: &Config, input: &str, thresholds: Thresholds, pretty: bool) -> Result<()> {
    let text = read_input(input)?;
    let engine = Engine::from_config(config)?;

    let db = Db::open(&config.db_path).context("Failed to open database")?;
    if let Some(store) = db.load_store(&config.index, config.worker_count())? {
        engine.install_store(store)?;
    }

    let report = engine.analyze_current(&text, &AnalysisOptions::with_thresholds(thresholds))?;
    println!("{}", report.to_json(pretty)?);
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let db = Db::open(&config.db_path).context("Failed to open database")?;
    match db.corpus_meta()? {
        Some(meta) => println!("{}", serde_json::to_string_pretty(&meta)?),
        None => println!("No corpus indexed in {}", config.db_path),
    }
    Ok(())
}
