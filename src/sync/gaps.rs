//! Gap detection and chunked backfill.

use chrono::NaiveDate;
use tracing::{error, info};

use crate::api::IndexSource;
use crate::db::{index_repo, Database};
use crate::error::Result;
use crate::runtime::Shutdown;
use crate::settings::Settings;

use super::updater;

/// Opens the gap `[start, end)`, coalescing with existing ranges.
pub fn open_gap(db: &Database, start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start >= end {
        return Ok(());
    }
    db.with_tx(|tx| index_repo::insert_gap_merged(tx, start, end))?;
    info!(%start, %end, "Opened index gap");
    Ok(())
}

/// Processes up to `days_chunk_size` days from the front of the earliest
/// gap, oldest first. Each day's ingest and the matching gap shrink commit
/// together, so the table never claims coverage it does not have. A fetch
/// failure stops the chunk; the remaining days stay in the gap for the
/// next cycle.
pub fn process_earliest_gap_chunk(
    db: &Database,
    source: &dyn IndexSource,
    settings: &Settings,
    shutdown: &Shutdown,
) -> Result<()> {
    let Some(gap) = db.with_conn(index_repo::earliest_gap)? else {
        return Ok(());
    };

    info!(start = %gap.start, end = %gap.end, "Backfilling earliest gap");

    let mut remaining = gap;
    for day in gap.days().take(settings.days_chunk_size as usize) {
        if shutdown.is_requested() {
            break;
        }
        match updater::ingest_day(db, source, settings, day, Some(remaining)) {
            Ok(_) => {
                remaining = index_repo::GapRange {
                    start: day + chrono::Duration::days(1),
                    end: gap.end,
                };
            }
            Err(e) => {
                error!(%day, error = %e, "Failed to backfill day, leaving it in the gap");
                break;
            }
        }
    }
    Ok(())
}
