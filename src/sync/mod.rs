//! Metadata synchronizer service.
//!
//! Keeps the per-day article index complete from the configured first day
//! up to today: ingests today's index every cycle, detects day switches,
//! and backfills recorded gaps one chunk at a time.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};

use crate::api::IndexSource;
use crate::db::{index_repo, Database};
use crate::error::Result;
use crate::runtime::{self, Shutdown};
use crate::settings::Settings;

pub mod gaps;
pub mod updater;

pub struct Synchronizer<'a> {
    db: &'a Database,
    source: &'a dyn IndexSource,
    settings: &'a Settings,
    shutdown: Shutdown,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        db: &'a Database,
        source: &'a dyn IndexSource,
        settings: &'a Settings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            db,
            source,
            settings,
            shutdown,
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now()
            .with_timezone(&self.settings.source_timezone)
            .date_naive()
    }

    /// Main loop: probe, one cycle of work, refined sleep.
    pub fn run(&self) {
        info!("Starting metadata synchronizer");

        if let Err(e) = self.handle_initial_gaps(self.today()) {
            error!(error = %e, "Failed to record initial gaps");
        }

        let interval = Duration::from_secs(self.settings.check_updates_interval);
        while !self.shutdown.is_requested() {
            if !self.source.available() {
                warn!("No connectivity, skipping this cycle");
                runtime::sleep_until_next_check(&self.shutdown, interval);
                continue;
            }

            if let Err(e) = self.run_cycle(self.today()) {
                error!(error = %e, "Synchronizer cycle failed");
            }

            runtime::sleep_until_next_check(&self.shutdown, interval);
        }

        info!("Metadata synchronizer shutdown complete");
    }

    /// On first start (or after a long outage) the coverage owed before the
    /// oldest known index is recorded as gaps so backfill can begin.
    pub fn handle_initial_gaps(&self, today: NaiveDate) -> Result<()> {
        let Some(first_day) = self.settings.first_day else {
            return Ok(());
        };

        match self.db.with_conn(index_repo::daily_index_range)? {
            None => gaps::open_gap(self.db, first_day, today),
            Some((oldest, _)) if first_day < oldest => {
                gaps::open_gap(self.db, first_day, oldest)
            }
            Some(_) => Ok(()),
        }
    }

    /// One unit of synchronizer work: day-switch detection, today's index,
    /// one gap chunk.
    pub fn run_cycle(&self, today: NaiveDate) -> Result<()> {
        if !self.db.with_conn(|conn| index_repo::daily_index_exists(conn, today))? {
            self.handle_day_switch(today)?;
        }

        // A failure here leaves today uncovered; the next cycle (or the
        // day-switch gap) picks it up.
        if let Err(e) = updater::ingest_day(self.db, self.source, self.settings, today, None) {
            error!(date = %today, error = %e, "Failed to ingest today's index");
        }

        gaps::process_earliest_gap_chunk(self.db, self.source, self.settings, &self.shutdown)
    }

    /// When the wall-clock date has advanced past the last ingested date,
    /// the skipped days become a gap `[last + 1, today)`.
    fn handle_day_switch(&self, today: NaiveDate) -> Result<()> {
        let Some((_, latest)) = self.db.with_conn(index_repo::daily_index_range)? else {
            return Ok(());
        };
        gaps::open_gap(self.db, latest + chrono::Duration::days(1), today)
    }
}
