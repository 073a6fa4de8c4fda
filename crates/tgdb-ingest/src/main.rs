//! TGDB Ingest - reference data import tool

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tgdb_common::config::IngestConfig;
use tgdb_common::logging::{init_logging, LogConfig, LogLevel};
use tgdb_ingest::gene_sets::GeneSetIndex;
use tgdb_ingest::parser::{parse_gene_column, parse_gene_list, parse_metadata, parse_network};
use tgdb_ingest::store::PgStore;
use tgdb_ingest::validation::{
    ensure_unique_genes, validate_metadata_values, validate_read_counts,
};
use tgdb_ingest::{
    AnnotationImportOptions, EdgeFormat, EdgeImportOptions, ImportOutcome,
    ReconciliationOrchestrator,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tgdb-ingest")]
#[command(author, version, about = "TGDB reference data import tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Reconcile gene annotations with an annotation CSV
    Annotations {
        /// Annotation CSV (gene_id, name, fullname, gene_type, gene_family)
        file: PathBuf,

        /// Log the changes without writing them
        #[arg(long)]
        dry_run: bool,

        /// Keep annotations that are missing from the file
        #[arg(long)]
        keep_existing: bool,
    },

    /// Import additional edges between annotated genes
    Edges {
        /// Edge CSV (source, target, edge), or a network file with --network
        file: PathBuf,

        /// Read the file as a whitespace-delimited network
        #[arg(long)]
        network: bool,

        /// Store newly created edge types as undirected
        #[arg(long)]
        undirected: bool,
    },

    /// Import one analysis from a data table and its metadata
    Experiment {
        /// Expression or binding table
        data: PathBuf,

        /// `KEY: value` metadata file
        metadata: PathBuf,

        /// Data column delimiter (defaults to TGDB_DATA_DELIMITER)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Print the merged gene membership table of lists and networks as JSON
    MergeLists {
        /// Gene list files with `>name` sections
        #[arg(long = "list")]
        lists: Vec<PathBuf>,

        /// Network files, named after the file
        #[arg(long = "network")]
        networks: Vec<PathBuf>,
    },

    /// Check submission files before import
    Validate {
        /// `KEY: value` metadata file
        metadata: PathBuf,

        /// Gene list whose first column must hold unique genes
        #[arg(long)]
        genes: Option<PathBuf>,

        /// Tab-delimited read count table
        #[arg(long, requires = "design")]
        read_counts: Option<PathBuf>,

        /// Tab-delimited experimental design
        #[arg(long, requires = "read_counts")]
        design: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("tgdb-ingest")
        .build();

    // Environment variables take precedence
    let log_config = log_config.merge_env()?;
    let _guard = init_logging(&log_config)?;

    let config = IngestConfig::load().context("Failed to load configuration")?;

    match cli.command {
        Command::Annotations {
            file,
            dry_run,
            keep_existing,
        } => {
            let text = read(&file)?;
            let mut options = AnnotationImportOptions::from_config(&config);
            options.dry_run = dry_run;
            options.delete_existing &= !keep_existing;

            let orchestrator = connect(&config).await?;
            let outcome = orchestrator.import_annotations(&text, options).await?;
            print_outcome(&outcome)?;
        },
        Command::Edges {
            file,
            network,
            undirected,
        } => {
            let text = read(&file)?;
            let format = if network {
                EdgeFormat::Network
            } else {
                EdgeFormat::Table
            };
            let mut options = EdgeImportOptions::from_config(format, &config);
            options.directional &= !undirected;

            let orchestrator = connect(&config).await?;
            let outcome = orchestrator
                .import_edges(&file_name(&file), &text, options)
                .await?;
            print_outcome(&outcome)?;
        },
        Command::Experiment {
            data,
            metadata,
            delimiter,
        } => {
            let data_text = read(&data)?;
            let metadata_text = read(&metadata)?;
            let delimiter = delimiter.unwrap_or(config.data_delimiter);

            let orchestrator = connect(&config).await?;
            let outcome = orchestrator
                .import_experiment(&data_text, delimiter, &metadata_text)
                .await?;
            print_outcome(&outcome)?;
        },
        Command::MergeLists { lists, networks } => {
            let mut indices = Vec::with_capacity(lists.len() + networks.len());
            for path in &lists {
                indices.push(parse_gene_list(&read(path)?));
            }
            for path in &networks {
                let network = parse_network(&file_name(path), &read(path)?)?;
                indices.push(GeneSetIndex::from_network(&network));
            }

            let merged = GeneSetIndex::merge_all(&indices);
            info!(sources = indices.len(), genes = merged.len(), "Merged gene sets");
            println!("{}", serde_json::to_string_pretty(&merged.to_table())?);
        },
        Command::Validate {
            metadata,
            genes,
            read_counts,
            design,
        } => {
            let record = parse_metadata(&read(&metadata)?)?;
            validate_metadata_values(&record)?;

            if let Some(path) = genes {
                let column: Vec<String> = parse_gene_column(&read(&path)?)
                    .into_iter()
                    .map(|line| line.split('\t').next().unwrap_or("").trim().to_uppercase())
                    .filter(|gene| !gene.is_empty())
                    .collect();
                ensure_unique_genes(&column)?;
            }

            if let (Some(counts), Some(design)) = (read_counts, design) {
                validate_read_counts(&read(&counts)?, &read(&design)?)?;
            }

            info!("Submission files validated");
        },
    }

    Ok(())
}

async fn connect(config: &IngestConfig) -> Result<ReconciliationOrchestrator<PgStore>> {
    let store = PgStore::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    Ok(ReconciliationOrchestrator::from_config(store, config))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// File stem, used to name networks and their edges
fn file_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| tgdb_ingest::parser::DEFAULT_NETWORK_NAME.to_string())
}

fn print_outcome(outcome: &ImportOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}
