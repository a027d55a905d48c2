/*!
tracedash Command Line Interface

Loads the dashboard collections from a record store, applies a selection and
writes the resulting report as JSON.
*/

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracedash::config::StoreConfig;
use tracedash::normalize::{normalize, CollectionSchema};
use tracedash::pipeline::{DashboardData, LoadOptions, Selection, SummaryOptions};
use tracedash::reader::{fetch_all, TableCache};
use tracedash::writer::{dataframe_to_values, JsonWriter, Writer};
use tracedash::VERSION;

#[derive(Parser)]
#[command(name = "tracedash")]
#[command(about = "Data layer of the traceability reporting dashboard")]
#[command(version = VERSION)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct StoreArgs {
    /// Record store connection string (https://, json://, memory://)
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Access key for the record store
    #[arg(long, global = true)]
    pub key: Option<String>,

    /// Secrets TOML file with a [supabase] table
    #[arg(long, global = true)]
    pub secrets: Option<PathBuf>,

    /// Rows per page request
    #[arg(long, global = true)]
    pub page_size: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline and write the report
    Report {
        /// Exporter to select (repeatable); none selects all
        #[arg(long = "exporter")]
        exporters: Vec<String>,

        /// Minimum farm area in hectares (defaults to the smallest present)
        #[arg(long)]
        min_area: Option<f64>,

        /// First year of the weight trend
        #[arg(long, default_value_t = 2024)]
        since_year: i32,

        /// Show every year in the weight trend
        #[arg(long, conflicts_with = "since_year")]
        all_years: bool,

        /// Number of farmers in the ranking
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Include the working table rows
        #[arg(long)]
        include_rows: bool,

        /// Output file path
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List the exporter names found in the traceability records
    Exporters,

    /// Fetch one collection and print it as JSON (for debugging)
    Fetch {
        /// Collection name
        collection: String,

        /// Output file path
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tracedash=debug" } else { "tracedash=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = store_config(&cli.store)?;

    match cli.command {
        Commands::Report {
            exporters,
            min_area,
            since_year,
            all_years,
            top,
            include_rows,
            output,
        } => {
            let mut selection = Selection::new().with_exporters(exporters);
            selection.min_area = min_area;
            let options = SummaryOptions {
                since_year: if all_years { None } else { Some(since_year) },
                top_n: top,
            };
            cmd_report(&config, &selection, &options, include_rows, output)
        }

        Commands::Exporters => cmd_exporters(&config),

        Commands::Fetch { collection, output } => cmd_fetch(&config, &collection, output),
    }
}

/// Secrets file or environment first, then flag overrides
fn store_config(args: &StoreArgs) -> anyhow::Result<StoreConfig> {
    let mut config = match (&args.secrets, &args.store) {
        (Some(path), _) => StoreConfig::from_secrets_file(path)?,
        (None, Some(url)) => StoreConfig::new(url.clone()),
        (None, None) => StoreConfig::from_env()
            .context("No record store configured; pass --store, --secrets or set SUPABASE_URL")?,
    };

    if let Some(url) = &args.store {
        config.url = url.clone();
    }
    if let Some(key) = &args.key {
        config.key = Some(key.clone());
    }
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if config.key.is_none() {
        config.key = std::env::var(tracedash::config::KEY_ENV).ok();
    }

    config.validate()?;
    Ok(config)
}

fn load(config: &StoreConfig) -> anyhow::Result<DashboardData> {
    let store = config.open_store()?;
    let mut cache = TableCache::new();
    let options = LoadOptions {
        page_size: config.page_size,
        ..LoadOptions::default()
    };
    DashboardData::load(&store, &mut cache, &options)
        .with_context(|| format!("Failed to load collections from {}", config.url))
}

fn emit(content: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Written to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn cmd_report(
    config: &StoreConfig,
    selection: &Selection,
    options: &SummaryOptions,
    include_rows: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let data = load(config)?;
    let prepared = data.prepare(selection)?;
    if let Some(message) = prepared.status().message() {
        eprintln!("{}", message);
    }

    let summary = prepared.summarize(options)?;
    let writer = JsonWriter::new().with_rows(include_rows).pretty(true);
    let json = writer.write(&prepared, summary.as_ref())?;
    emit(&json, output)
}

fn cmd_exporters(config: &StoreConfig) -> anyhow::Result<()> {
    let data = load(config)?;
    for exporter in data.exporters() {
        println!("{}", exporter);
    }
    Ok(())
}

fn cmd_fetch(config: &StoreConfig, collection: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let store = config.open_store()?;
    let raw = fetch_all(&store, collection, &[], config.page_size)?;

    let schema = match collection {
        "traceability" => Some(CollectionSchema::traceability()),
        "quota_view" => Some(CollectionSchema::quota_view()),
        "farmers" => Some(CollectionSchema::farmers()),
        _ => None,
    };
    let df = match schema {
        Some(schema) => normalize(&raw, &schema)?.0,
        None => raw,
    };
    let rows = dataframe_to_values(&df)?;
    let json = serde_json::to_string_pretty(&rows).context("Failed to serialize rows")?;
    emit(&json, output)
}
