mod clean;
mod database;
mod error;
mod ingest;
mod report;
mod utils;

use std::path::PathBuf;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::clean::pipeline::{self, CleanOptions};
use crate::database::repo::CollectionStore;
use crate::ingest::importer;
use crate::report::{OutputFormat, ReportKind};
use crate::utils::config;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    db_path: String,

    #[arg(long)]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug, Clone)]
struct SourceArgs {
    /// Artworks CSV. Looked up via .env or by searching nearby directories when omitted.
    #[arg(long)]
    artworks_csv: Option<PathBuf>,

    /// Artists CSV. Looked up via .env or by searching nearby directories when omitted.
    #[arg(long)]
    artists_csv: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
struct CleanArgs {
    #[arg(long, default_value_t = 500)]
    batch_size: usize,

    /// Stop after examining this many rows; the next run picks up the rest.
    #[arg(long)]
    row_limit: Option<usize>,
}

#[derive(clap::Args, Debug, Clone)]
struct ReportArgs {
    /// Reports to run. Defaults to all of them.
    #[arg(short, long, value_enum)]
    report: Vec<ReportKind>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bulk-load the artists and artworks CSV files.
    Import(SourceArgs),
    /// Fill empty derived columns from the raw fields.
    Clean(CleanArgs),
    /// Print aggregate reports over the cleaned columns.
    Report(ReportArgs),
    /// Clean, then report. Imports first when --import is given.
    Run {
        #[arg(long)]
        import: bool,
        #[command(flatten)]
        sources: SourceArgs,
        #[command(flatten)]
        clean: CleanArgs,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Print one stored record with its raw and derived fields.
    Show {
        #[arg(long, required_unless_present = "artist")]
        artwork: Option<i64>,
        #[arg(long)]
        artist: Option<i64>,
    },
}

fn run_import(store: &mut CollectionStore, sources: SourceArgs, progress: bool) -> Result<()> {
    let paths = config::get_collection_paths(sources.artworks_csv, sources.artists_csv)?;
    info!("Artists: {:?}", paths.artists_csv);
    info!("Artworks: {:?}", paths.artworks_csv);
    let (artists, artworks) =
        importer::import_files(&paths.artists_csv, &paths.artworks_csv, store, progress)?;
    info!("Import finished: {} artists, {} artworks", artists, artworks);
    info!(
        "Store now holds {} artists, {} artworks",
        store.count_artists()?,
        store.count_artworks()?
    );
    Ok(())
}

fn run_clean(store: &mut CollectionStore, args: &CleanArgs, progress: bool) -> Result<()> {
    let options = CleanOptions {
        batch_size: args.batch_size,
        row_limit: args.row_limit,
        show_progress: progress,
    };
    let stats = pipeline::run_pass(store, &options)?;
    if stats.stopped_early {
        warn!("Row limit reached; run clean again to finish the remaining rows");
    }
    Ok(())
}

fn run_reports(store: &CollectionStore, args: &ReportArgs) -> Result<()> {
    let kinds: Vec<ReportKind> = if args.report.is_empty() {
        ReportKind::ALL.to_vec()
    } else {
        args.report.clone()
    };

    let reports = kinds
        .into_iter()
        .map(|kind| report::build(store.conn(), kind, args.top))
        .collect::<Result<Vec<_>>>()?;
    println!("{}", report::render(&reports, args.format)?);
    Ok(())
}

fn show(store: &CollectionStore, artwork: Option<i64>, artist: Option<i64>) -> Result<()> {
    if let Some(id) = artwork {
        match store.artwork(id)? {
            Some(record) => println!("{:#?}", record),
            None => warn!("No artwork with id {}", id),
        }
    }
    if let Some(id) = artist {
        match store.artist(id)? {
            Some(record) => println!("{:#?}", record),
            None => warn!("No artist with id {}", id),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // stdout is reserved for report output.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = Args::parse();
    let progress = !args.no_progress;

    info!("DB: {}", args.db_path);
    let mut store = CollectionStore::open(&args.db_path)?;

    match args.command {
        Command::Import(sources) => run_import(&mut store, sources, progress)?,
        Command::Clean(clean) => run_clean(&mut store, &clean, progress)?,
        Command::Report(report) => run_reports(&store, &report)?,
        Command::Run { import, sources, clean, report } => {
            if import {
                run_import(&mut store, sources, progress)?;
            }
            run_clean(&mut store, &clean, progress)?;
            run_reports(&store, &report)?;
        }
        Command::Show { artwork, artist } => show(&store, artwork, artist)?,
    }

    info!("Done.");
    Ok(())
}
