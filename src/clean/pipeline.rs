use anyhow::Result;
use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::clean::dimension::clean_dimensions;
use crate::clean::years::clean_years;
use crate::database::repo::{ArtistRecord, ArtworkRecord, CollectionStore};

#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Rows loaded and committed per transaction.
    pub batch_size: usize,
    /// Stop after this many rows have been examined. Unreached rows stay NULL for the next run.
    pub row_limit: Option<usize>,
    pub show_progress: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            row_limit: None,
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    pub artworks_scanned: usize,
    pub artworks_updated: usize,
    pub dimensions_filled: usize,
    pub artists_scanned: usize,
    pub artists_updated: usize,
    pub years_filled: usize,
    pub stopped_early: bool,
}

impl PassStats {
    pub fn fields_filled(&self) -> usize {
        self.dimensions_filled + self.years_filled
    }

    fn scanned(&self) -> usize {
        self.artworks_scanned + self.artists_scanned
    }
}

/// Cleans a batch of artworks in memory. Returns the records that gained a value.
pub fn clean_artworks(records: &mut [ArtworkRecord], stats: &mut PassStats) -> Vec<ArtworkRecord> {
    let mut changed = Vec::new();
    for record in records.iter_mut() {
        stats.artworks_scanned += 1;
        let filled = clean_dimensions(record);
        if filled > 0 {
            stats.dimensions_filled += filled;
            stats.artworks_updated += 1;
            changed.push(record.clone());
        }
    }
    changed
}

/// Cleans a batch of artists in memory. Returns the records that gained a value.
pub fn clean_artists(records: &mut [ArtistRecord], stats: &mut PassStats) -> Vec<ArtistRecord> {
    let mut changed = Vec::new();
    for record in records.iter_mut() {
        stats.artists_scanned += 1;
        let filled = clean_years(record);
        if filled > 0 {
            stats.years_filled += filled;
            stats.artists_updated += 1;
            changed.push(record.clone());
        }
    }
    changed
}

fn progress_bar(total: u64, show: bool) -> ProgressBar {
    if show {
        ProgressBar::new(total)
    } else {
        ProgressBar::hidden()
    }
}

/// How many more rows may be examined before the row limit is hit.
fn budget(options: &CleanOptions, stats: &PassStats) -> usize {
    match options.row_limit {
        Some(limit) => limit.saturating_sub(stats.scanned()).min(options.batch_size),
        None => options.batch_size,
    }
}

/// One cleaning pass over the whole store.
///
/// Only rows with a NULL derived field are loaded, and writes never replace
/// a populated value, so the pass can be repeated or resumed after an early
/// stop. Rows whose raw text has nothing to extract stay NULL and are
/// re-examined on every run.
pub fn run_pass(store: &mut CollectionStore, options: &CleanOptions) -> Result<PassStats> {
    let batch_size = options.batch_size.max(1);
    let options = CleanOptions { batch_size, ..options.clone() };
    let mut stats = PassStats::default();

    let pending = store.count_pending_artworks()? + store.count_pending_artists()?;
    info!("Cleaning pass started: {} rows with empty derived fields", pending);
    let pb = progress_bar(pending, options.show_progress);

    let mut last_id = i64::MIN;
    loop {
        let limit = budget(&options, &stats);
        if limit == 0 {
            stats.stopped_early = true;
            break;
        }
        let mut batch = store.pending_artworks(last_id, limit)?;
        let Some(last) = batch.last() else { break };
        last_id = last.id;

        let changed = clean_artworks(&mut batch, &mut stats);
        store.write_artwork_dimensions(&changed)?;
        pb.inc(batch.len() as u64);
        debug!("Artwork batch up to id {}: {} updated", last_id, changed.len());
    }

    let mut last_id = i64::MIN;
    while !stats.stopped_early {
        let limit = budget(&options, &stats);
        if limit == 0 {
            stats.stopped_early = true;
            break;
        }
        let mut batch = store.pending_artists(last_id, limit)?;
        let Some(last) = batch.last() else { break };
        last_id = last.id;

        let changed = clean_artists(&mut batch, &mut stats);
        store.write_artist_years(&changed)?;
        pb.inc(batch.len() as u64);
        debug!("Artist batch up to id {}: {} updated", last_id, changed.len());
    }

    pb.finish_and_clear();
    info!(
        "Cleaning pass finished: {} artworks ({} updated), {} artists ({} updated), {} fields filled{}",
        stats.artworks_scanned,
        stats.artworks_updated,
        stats.artists_scanned,
        stats.artists_updated,
        stats.fields_filled(),
        if stats.stopped_early { ", stopped at row limit" } else { "" },
    );
    Ok(stats)
}
