use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use jobpulse::analysis::{HealthEngine, ReportRequest};
use jobpulse::config::AppConfig;
use jobpulse::export::{export_all_jobs, export_failed_jobs, ExportKind, FailedExportOptions};
use jobpulse::storage::{self, SqliteSource};
use jobpulse::window::{WindowPreset, WindowSelection};
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "jobpulse",
    about = "Health, root-cause and trend analysis for artifact job pipelines",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (defaults to $JOBPULSE_CONFIG, then ./jobpulse.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print a health report for a time window
    Report {
        #[command(flatten)]
        window: WindowArgs,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Entries shown per ranking
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Load job documents (JSON array or one object per line) into the store
    Ingest {
        /// Input file, or `-` for stdin
        file: PathBuf,
    },

    /// Write a failed-jobs JSON or all-jobs CSV export
    Export {
        /// What to export
        #[arg(value_enum)]
        kind: ExportArg,

        #[command(flatten)]
        window: WindowArgs,

        /// Keep cascading failures in the failed-jobs export
        #[arg(long)]
        include_cascading: bool,

        /// Output file (defaults to a timestamped name in the current directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportArg {
    Failed,
    Jobs,
}

#[derive(clap::Args)]
struct WindowArgs {
    /// Preset range: last-hour, last-6-hours, last-24-hours, last-7-days, last-30-days
    #[arg(long, conflicts_with_all = ["start", "end"])]
    range: Option<WindowPreset>,

    /// First day of an explicit range (YYYY-MM-DD)
    #[arg(long, requires = "end")]
    start: Option<NaiveDate>,

    /// Last day of an explicit range, inclusive (YYYY-MM-DD)
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,

    /// Only analyse jobs of this artifact type id
    #[arg(long)]
    artifact_type: Option<String>,
}

impl WindowArgs {
    fn to_request(&self) -> ReportRequest {
        let selection = match (self.range, self.start, self.end) {
            (_, Some(start), Some(end)) => WindowSelection::Dates { start, end },
            (Some(preset), _, _) => WindowSelection::Preset(preset),
            _ => WindowSelection::default(),
        };
        ReportRequest {
            selection,
            artifact_type: self.artifact_type.clone(),
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn open_source(config: &AppConfig) -> Result<SqliteSource> {
    let db_path = config.storage.db_path.to_string_lossy().into_owned();
    let pool = storage::open_pool(&db_path)
        .with_context(|| format!("failed to open database: {}", db_path))?;
    Ok(SqliteSource::new(pool))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting jobpulse server");
            jobpulse::serve(&config).await?;
        }
        Commands::Report { window, json, top } => {
            let source = open_source(&config)?;
            let engine = HealthEngine::new(config.analysis()?);
            let report = engine.analyze(&source, &window.to_request(), Utc::now())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", jobpulse::analysis::summary::format_summary(&report, top));
            }
        }
        Commands::Ingest { file } => {
            let docs = if file.as_os_str() == "-" {
                storage::read_documents(std::io::stdin().lock())?
            } else {
                let handle = std::fs::File::open(&file)
                    .with_context(|| format!("failed to open {}", file.display()))?;
                storage::read_documents(BufReader::new(handle))
                    .with_context(|| format!("failed to read {}", file.display()))?
            };
            let source = open_source(&config)?;
            let summary = storage::ingest_documents(source.pool(), &docs)?;
            let total = storage::document_count(source.pool())?;
            println!(
                "Ingested {} documents ({} rejected); store now holds {}.",
                summary.stored, summary.rejected, total
            );
        }
        Commands::Export {
            kind,
            window,
            include_cascading,
            output,
        } => {
            let source = open_source(&config)?;
            let engine = HealthEngine::new(config.analysis()?);
            let snapshot = engine.snapshot(&source, &window.to_request(), Utc::now())?;
            let names = &engine.config().artifact_names;

            let (kind, body) = match kind {
                ExportArg::Failed => {
                    let mut options = FailedExportOptions::from(&config.export);
                    if include_cascading {
                        options.omit_cascading = false;
                    }
                    let body =
                        export_failed_jobs(&snapshot.records, &engine.config().errors, names, &options)?;
                    (ExportKind::FailedJobs, body)
                }
                ExportArg::Jobs => (ExportKind::AllJobs, export_all_jobs(&snapshot.records, names)),
            };

            let path = output.unwrap_or_else(|| PathBuf::from(kind.file_name(Utc::now())));
            std::fs::write(&path, &body)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), jobs = snapshot.records.len(), "Export written");
            println!("{}", path.display());
        }
    }

    Ok(())
}
