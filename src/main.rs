//! Command line entry point.
//!
//! Usage:
//!   statement-import import  --user <ID> --category <ID> <PATH>
//!   statement-import preview --user <ID> --category <ID> <PATH>
//!
//! The JSON summary goes to stdout, logs to stderr (`RUST_LOG` controls the
//! level). Exit codes:
//!   0 - Summary produced (individual documents may still have failed)
//!   1 - The import could not run at all

use clap::{Args, Parser, Subcommand};
use statement_import::config::ImportConfig;
use statement_import::db::init_database;
use statement_import::pdf_import::raster::is_tool_available;
use statement_import::pdf_import::{ImportPipeline, ImportSource};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "statement-import", version, about = "Import scanned statement PDFs as expenses")]
struct Cli {
    /// JSON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overrides the configured path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import every PDF under PATH
    Import(ImportArgs),
    /// Run the import without writing anything and print what would be stored
    Preview(ImportArgs),
}

#[derive(Args)]
struct ImportArgs {
    /// Owner of the imported expenses
    #[arg(long)]
    user: String,

    /// Category assigned to every imported expense
    #[arg(long)]
    category: String,

    /// A PDF file or a directory searched recursively
    path: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let mut config = ImportConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    for (tool, version_arg) in [
        (&config.pdfinfo_command, "-v"),
        (&config.pdftoppm_command, "-v"),
        (&config.tesseract_command, "--version"),
    ] {
        if !is_tool_available(tool, version_arg).await {
            log::warn!("'{}' was not found; every document will fail until it is installed", tool);
        }
    }

    let mut store = init_database(&config.database_path)?;
    let pipeline = ImportPipeline::from_config(&config)?;
    log::info!("Using database {}", config.database_path.display());

    let json = match cli.command {
        Command::Import(args) => {
            let summary = pipeline
                .import_pdf(&mut store, &args.user, &args.category, ImportSource::Path(args.path))
                .await?;
            serde_json::to_string_pretty(&summary)?
        }
        Command::Preview(args) => {
            let preview = pipeline
                .preview_pdf(&mut store, &args.user, &args.category, ImportSource::Path(args.path))
                .await?;
            serde_json::to_string_pretty(&preview)?
        }
    };

    Ok(json)
}
