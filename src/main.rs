use anyhow::Result;
use clap::Parser;
use liquor_etl::{init_tracing_once, LiquorETL, DEFAULT_BATCH_SIZE, DEFAULT_DATABASE, DEFAULT_SOURCE};
use std::path::PathBuf;

/// Load the Iowa liquor sales CSV into a normalized SQLite database.
#[derive(Debug, Parser)]
#[command(name = "liquor-etl", version, about)]
struct Cli {
    /// Log every SQL statement the backend executes.
    #[arg(long)]
    echo: bool,

    /// Source CSV (a `.zst` suffix is decompressed on the fly).
    #[arg(long, default_value = DEFAULT_SOURCE)]
    source: PathBuf,

    /// SQLite database file; a leading `~` is expanded.
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: PathBuf,

    /// Keep existing tables and data instead of dropping them first.
    #[arg(long)]
    incremental: bool,

    /// Transaction and entity rows per commit.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// stores_items rows per commit.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    association_batch_size: usize,

    /// Parser threads (defaults to all cores).
    #[arg(long)]
    threads: Option<usize>,

    /// Record the last committed row here after every batch.
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Continue from --checkpoint instead of starting over.
    #[arg(long, requires = "checkpoint")]
    resume: bool,

    /// Disable progress bars.
    #[arg(long)]
    no_progress: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_once(cli.echo);

    let mut etl = LiquorETL::new()
        .source(&cli.source)
        .database(&cli.database)
        .echo(cli.echo)
        .drop_existing(!cli.incremental)
        .batch_size(cli.batch_size)
        .association_batch_size(cli.association_batch_size)
        .progress(!cli.no_progress)
        .resume(cli.resume);
    if let Some(n) = cli.threads {
        etl = etl.parallelism(n);
    }
    if let Some(cp) = &cli.checkpoint {
        etl = etl.checkpoint(cp);
    }

    let report = etl.build()?;
    println!(
        "Loaded {} transactions, {} items, {} stores, {} store/item links ({} of {} rows skipped)",
        report.transactions_written,
        report.items_written,
        report.stores_written,
        report.associations_written,
        report.rows_skipped,
        report.rows_read,
    );
    Ok(())
}
