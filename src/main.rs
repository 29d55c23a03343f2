use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use card_album::config::AppConfig;
use card_album::export::{export_collection, ListingTemplate};
use card_album::gallery::{render_card, GalleryFilter, SortOrder};
use card_album::logging;
use card_album::pipeline::ingestion::{FileReport, IngestMeta, SpreadsheetSource, UploadedFile};
use card_album::pipeline::{IngestOutcome, IngestPipeline};
use card_album::storage::{CardStore, SqliteCardStore};

#[derive(Parser)]
#[command(name = "card_album")]
#[command(about = "Trading card inventory album")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to $CARD_ALBUM_CONFIG or config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load spreadsheet files into the card database
    Ingest {
        /// Spreadsheet files to load
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Validate only, leave the database untouched
        #[arg(long)]
        dry_run: bool,
    },
    /// Show stored cards
    View {
        /// Card types to show (comma-separated)
        #[arg(
            long,
            value_delimiter = ',',
            default_values_t = ["Monsters", "Spells", "Traps"].map(String::from)
        )]
        types: Vec<String>,
        #[arg(long, value_enum, default_value_t = SortOrder::Ascending)]
        price_sort: SortOrder,
        #[arg(long, value_enum, default_value_t = SortOrder::Ascending)]
        quantity_sort: SortOrder,
        #[arg(long, value_enum, default_value_t = SortOrder::Ascending)]
        name_sort: SortOrder,
        /// Print JSON instead of card tiles
        #[arg(long)]
        json: bool,
    },
    /// Export stored cards to a listing workbook
    Export {
        /// Listing template workbook
        #[arg(long)]
        template: Option<PathBuf>,
        /// Output workbook path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List recent ingestion runs
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if cli.debug {
        config.logging.debug = true;
    }
    Ok(config)
}

fn run_ingest(config: &AppConfig, files: &[PathBuf], dry_run: bool) -> anyhow::Result<()> {
    let mut sources: Vec<Box<dyn SpreadsheetSource>> = Vec::with_capacity(files.len());
    let mut unreadable = Vec::new();
    for path in files {
        match UploadedFile::from_path(path) {
            Ok(file) => sources.push(Box::new(file)),
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                unreadable.push(FileReport::failed(path.display().to_string(), e));
            }
        }
    }

    let meta = IngestMeta::open(&config.storage.database_path)
        .context("opening ingest run log")?;
    for source in &sources {
        if let Some(fingerprint) = source.fingerprint() {
            if let Some(run_id) = meta.run_for_fingerprint(&fingerprint)? {
                warn!("{} was already loaded by run {}", source.source_name(), run_id);
            }
        }
    }

    let pipeline = IngestPipeline::new(config.ingest.clone());
    let required = pipeline.required_columns();
    let mut run = pipeline.run(&mut sources, &required);
    run.files.extend(unreadable);
    let recorded = if dry_run {
        meta.record_dry_run(&run)
    } else {
        meta.record_run(&run)
    };
    recorded.context("recording ingest run")?;

    for file in run.failed_files() {
        println!("⚠️  Could not load {}", file.file_name);
    }

    match &run.outcome {
        IngestOutcome::Loaded(_) => {
            let records = run.outcome.records();
            println!("📊 Loaded {} cards (run {})", records.len(), run.run_id);
            if dry_run {
                println!("Dry run: database left unchanged");
                return Ok(());
            }
            let store = SqliteCardStore::open(&config.storage.database_path)?;
            let stored = store.replace_all(&records)?;
            info!("Stored {} cards", stored);
            println!("✅ Data successfully uploaded and stored in the database.");
        }
        IngestOutcome::Empty => {
            println!("No data to load.");
        }
        IngestOutcome::Rejected(e) => {
            error!("Upload rejected: {}", e);
            println!("❌ Upload rejected: {}", e);
            anyhow::bail!("upload rejected: {e}");
        }
    }
    Ok(())
}

fn run_view(config: &AppConfig, filter: GalleryFilter, json: bool) -> anyhow::Result<()> {
    let store = SqliteCardStore::open(&config.storage.database_path)?;
    let cards = filter.apply(&store.fetch_all()?);
    if json {
        println!("{}", serde_json::to_string_pretty(&cards)?);
        return Ok(());
    }
    if cards.is_empty() {
        println!("No cards match the selected filters.");
        return Ok(());
    }
    for card in &cards {
        println!("{}", render_card(card));
    }
    Ok(())
}

fn run_export(
    config: &AppConfig,
    template: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = SqliteCardStore::open(&config.storage.database_path)?;
    let cards = store.fetch_all()?;
    let template_path = template.or_else(|| config.export.template_path.clone());
    let template = ListingTemplate::load(template_path.as_deref())
        .context("loading listing template")?;
    let output = output.unwrap_or_else(|| config.export.output_path.clone());
    let path = export_collection(&cards, &template, &output)?;
    println!("💾 Exported {} cards to {}", cards.len(), path.display());
    Ok(())
}

fn run_runs(config: &AppConfig, limit: usize) -> anyhow::Result<()> {
    let meta = IngestMeta::open(&config.storage.database_path)?;
    for run in meta.recent_runs(limit)? {
        println!(
            "{}  {}  {:<8}{} rows={} files={} failed={}{}",
            run.started_at,
            run.run_id,
            run.outcome,
            if run.dry_run { " (dry run)" } else { "" },
            run.rows,
            run.files,
            run.failed_files,
            run.detail.map(|d| format!("  ({d})")).unwrap_or_default()
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let _guard = logging::init_logging(&config.logging);

    match cli.command {
        Commands::Ingest { files, dry_run } => run_ingest(&config, &files, dry_run),
        Commands::View {
            types,
            price_sort,
            quantity_sort,
            name_sort,
            json,
        } => {
            let filter = GalleryFilter {
                card_types: types,
                price_sort,
                quantity_sort,
                name_sort,
            };
            run_view(&config, filter, json)
        }
        Commands::Export { template, output } => run_export(&config, template, output),
        Commands::Runs { limit } => run_runs(&config, limit),
    }
}
