use std::fs;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kb_loader::app::{App, normalize_name, write_error_log};
use kb_loader::config::ConfigLoader;
use kb_loader::domain::VariantRecord;
use kb_loader::error::LoaderError;
use kb_loader::graphkb::GraphKbHttpClient;
use kb_loader::output::{JsonOutput, LogProgress};
use kb_loader::sources::SOURCES;

#[derive(Parser)]
#[command(name = "kb-loader")]
#[command(about = "Normalize variant notation and load variant records into GraphKB")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Normalize a variant name without contacting GraphKB")]
    Normalize(NormalizeArgs),
    #[command(about = "Upload variant records from a JSON file")]
    Load(LoadArgs),
    #[command(about = "List known sources")]
    Sources,
}

#[derive(Args)]
struct NormalizeArgs {
    name: String,

    #[arg(long)]
    gene: String,

    #[arg(long)]
    gene_id: Option<String>,
}

#[derive(Args)]
struct LoadArgs {
    file: Utf8PathBuf,

    #[arg(long)]
    source: Option<String>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    error_log: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<LoaderError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &LoaderError) -> u8 {
    match error {
        LoaderError::MissingConfig
        | LoaderError::ConfigRead(_)
        | LoaderError::MissingCredentials(_)
        | LoaderError::UnknownSource(_) => 2,
        err if err.is_remote() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let filter = std::env::var("GKB_LOG_LEVEL")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(EnvFilter::from_default_env);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize(args) => {
            let result = normalize_name(&args.name, &args.gene, args.gene_id.as_deref())?;
            JsonOutput::print_normalized(&result).into_diagnostic()?;
        }
        Commands::Load(args) => run_load(args)?,
        Commands::Sources => JsonOutput::print_sources(SOURCES).into_diagnostic()?,
    }
    Ok(())
}

fn run_load(args: LoadArgs) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let content = fs::read_to_string(args.file.as_std_path())
        .map_err(|err| LoaderError::InvalidInput(format!("read {}: {err}", args.file)))?;
    let records: Vec<VariantRecord> = serde_json::from_str(&content)
        .map_err(|err| LoaderError::InvalidInput(format!("parse {}: {err}", args.file)))?;

    let client = GraphKbHttpClient::new(&config.graphkb_url, config.credentials()?)?;
    let source = args.source.unwrap_or_else(|| config.default_source.clone());
    let mut app = App::new(client, &source, &config.gene_source)?;
    let mut summary = app.run(&records, &LogProgress)?;

    if !summary.errors.is_empty() {
        let prefix = args.error_log.unwrap_or_else(|| config.error_log_prefix.clone());
        let path = write_error_log(&mut summary, &prefix)?;
        tracing::info!(path = %path, count = summary.errors.len(), "wrote error log");
    }
    JsonOutput::print_summary(&summary).into_diagnostic()?;
    Ok(())
}
