//! # rapor CLI
//!
//! The `rapor` binary analyzes batches of Siemens-format service-report
//! PDFs and exports the extracted fields as a spreadsheet.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rapor analyze <pdfs...>` | Extract fields from a batch of PDFs, export XLSX, print metrics |
//! | `rapor check` | Verify configuration and the API credential |
//!
//! ## Examples
//!
//! ```bash
//! # Analyze a batch and write the spreadsheet into the current directory
//! rapor analyze reports/*.pdf
//!
//! # Analyze, write to a specific file, and render the dashboard
//! rapor analyze reports/*.pdf --out sonuclar.xlsx --dashboard
//!
//! # Health check (config + credential)
//! rapor check
//! ```
//!
//! The API credential is read from `OPENAI_API_KEY` (a `.env` file is
//! honored). All other settings come from an optional TOML config file.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rapor::analytics;
use rapor::analyze::{self, OpenAiBackend, API_KEY_ENV};
use rapor::batch::{self, InputDocument};
use rapor::config::{self, Config};
use rapor::export;
use rapor::models::DocumentStatus;
use rapor::progress::ProgressMode;
use rapor::session::Session;

/// rapor — field extraction and analytics for Siemens service-report PDFs.
#[derive(Parser)]
#[command(
    name = "rapor",
    about = "Field extraction and analytics for bilingual Siemens service-report PDFs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults apply when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./rapor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a batch of service-report PDFs.
    ///
    /// Each PDF runs through text extraction and model-based field
    /// extraction; documents that cannot be read or analyzed are skipped
    /// with a warning. The resulting table is exported as XLSX unless the
    /// whole batch failed.
    Analyze {
        /// PDF files to process, in batch order.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Export target: an existing directory (conventional timestamped
        /// file name) or an explicit file path.
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Render the analytics dashboard after the batch.
        #[arg(long)]
        dashboard: bool,

        /// Progress output on stderr: auto, off, human, or json.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Verify configuration and the API credential.
    ///
    /// Sends a minimal test completion to prove the credential works.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before anything else reads the env).
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rapor=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Analyze {
            files,
            out,
            dashboard,
            progress,
        } => run_analyze(&cfg, &files, &out, dashboard, &progress).await,
        Commands::Check => run_check(&cfg).await,
    }
}

async fn run_analyze(
    cfg: &Config,
    files: &[PathBuf],
    out: &Path,
    dashboard: bool,
    progress: &str,
) -> Result<()> {
    let mode = parse_progress_mode(progress)?;

    // Credential problems are fatal to the whole session: surfaced once,
    // before any document is touched.
    let backend = OpenAiBackend::from_env(&cfg.model)
        .with_context(|| format!("set {} or add it to a .env file", API_KEY_ENV))?;
    analyze::verify_credential(&backend, &cfg.model)
        .await
        .context("API credential rejected by the completion endpoint")?;

    let documents = load_documents(files)?;

    let mut session = Session::new();
    let reporter = mode.reporter();
    let report = batch::run_batch(&backend, &cfg.model, &documents, reporter.as_ref()).await;

    println!("analyze");
    for outcome in &report.outcomes {
        match &outcome.status {
            DocumentStatus::Analyzed => println!("  ok    {}", outcome.file_name),
            DocumentStatus::Skipped(reason) => {
                println!("  skip  {} ({})", outcome.file_name, reason)
            }
        }
    }
    println!("  total: {} documents", report.total());
    println!("  analyzed: {}", report.succeeded());
    println!("  success rate: {:.1}%", report.success_rate());

    if report.table.is_empty() {
        bail!("no documents could be analyzed; nothing to export");
    }

    session.publish(report.table);
    export::run_export(&cfg.export, session.table(), out)?;

    if dashboard {
        println!();
        analytics::run_dashboard(&session);
    }

    Ok(())
}

async fn run_check(cfg: &Config) -> Result<()> {
    println!("{:<16} {:<12}", "COMPONENT", "STATUS");

    println!("{:<16} {:<12}", "config", "OK");
    println!("{:<16} {:<12}", "model", cfg.model.name);

    let backend = match OpenAiBackend::from_env(&cfg.model) {
        Ok(backend) => {
            println!("{:<16} {:<12}", "credential", "present");
            backend
        }
        Err(e) => {
            println!("{:<16} {:<12}", "credential", "MISSING");
            bail!("{}", e);
        }
    };

    match analyze::verify_credential(&backend, &cfg.model).await {
        Ok(()) => {
            println!("{:<16} {:<12}", "endpoint", "OK");
            Ok(())
        }
        Err(e) => {
            println!("{:<16} {:<12}", "endpoint", "FAILED");
            bail!("{}", e);
        }
    }
}

fn load_documents(files: &[PathBuf]) -> Result<Vec<InputDocument>> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        documents.push(InputDocument::new(name, bytes));
    }
    Ok(documents)
}

fn parse_progress_mode(value: &str) -> Result<ProgressMode> {
    match value {
        "auto" => Ok(ProgressMode::default_for_tty()),
        "off" => Ok(ProgressMode::Off),
        "human" => Ok(ProgressMode::Human),
        "json" => Ok(ProgressMode::Json),
        other => bail!(
            "Unknown progress mode: '{}'. Must be auto, off, human, or json.",
            other
        ),
    }
}
