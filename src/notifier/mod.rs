//! Notifier service.
//!
//! At each configured trigger time the notifier selects the analyzed,
//! unsent articles published inside the shifted window and publishes
//! their summaries to the channel, pacing messages by the configured
//! delay. Sends and sent-log inserts are serialized per article, in
//! ascending publication order.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::db::{notifier_repo, Database};
use crate::error::Result;
use crate::runtime::{self, Shutdown};
use crate::settings::Settings;
use crate::storage;

pub mod message;
pub mod sender;
pub mod triggers;

use sender::MessageSender;

pub struct Notifier<'a> {
    db: &'a Database,
    sender: &'a dyn MessageSender,
    settings: &'a Settings,
    shutdown: Shutdown,
}

impl<'a> Notifier<'a> {
    pub fn new(
        db: &'a Database,
        sender: &'a dyn MessageSender,
        settings: &'a Settings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            db,
            sender,
            settings,
            shutdown,
        }
    }

    pub fn run(&self) {
        info!("Starting notifier");

        // One cycle immediately: a restart inside a window must not wait
        // for the next trigger to retry unsent articles.
        if let Err(e) = self.run_cycle(Utc::now()) {
            error!(error = %e, "Notifier cycle failed");
        }

        let quantum = Duration::from_secs(self.settings.notifier.max_inactivity_interval);
        while !self.shutdown.is_requested() {
            let now = Utc::now();
            let info = triggers::trigger_info(
                &self.settings.notifier.trigger_times,
                self.settings.source_timezone,
                now,
            );

            info!(next_trigger = %info.next, "Sleeping until next trigger");
            runtime::sleep_until_wall(&self.shutdown, info.next, quantum);
            if self.shutdown.is_requested() {
                break;
            }

            if let Err(e) = self.run_cycle(info.next) {
                error!(error = %e, "Notifier cycle failed");
            }
        }

        info!("Notifier shutdown complete");
    }

    /// One publication cycle for the trigger window containing `at`.
    pub fn run_cycle(&self, at: DateTime<Utc>) -> Result<()> {
        let info = triggers::trigger_info(
            &self.settings.notifier.trigger_times,
            self.settings.source_timezone,
            at,
        );
        let window_start = info.previous - triggers::window_shift(self.settings);
        let window_end = info.current;
        info!(%window_start, %window_end, "Running notifier cycle");

        let pruned = self
            .db
            .with_conn(|conn| notifier_repo::prune_sent_before(conn, &window_start))?;
        if pruned > 0 {
            info!(pruned, "Pruned old sent-log rows");
        }

        let sent = self
            .db
            .with_conn(|conn| notifier_repo::sent_ids_since(conn, &window_start))?;
        let candidates = self
            .db
            .with_conn(|conn| notifier_repo::candidates(conn, &window_start, &window_end))?;
        info!(
            candidates = candidates.len(),
            already_sent = sent.len(),
            "Selected window candidates"
        );

        let lang = &self.settings.notifier.summary_language;
        for candidate in candidates {
            if self.shutdown.is_requested() {
                break;
            }
            if sent.contains(&candidate.article_id) {
                continue;
            }
            let started = Instant::now();

            let summary_file = self.db.with_conn(|conn| {
                notifier_repo::summary_path(conn, candidate.article_id, lang)
            })?;
            let Some(summary_file) = summary_file else {
                warn!(article = candidate.article_id, lang = %lang, "No summary on record, skipping");
                continue;
            };
            let summary = match storage::read_to_string(Path::new(&summary_file)) {
                Ok(summary) => summary.trim().to_string(),
                Err(e) => {
                    error!(article = candidate.article_id, error = %e, "Failed to read summary");
                    continue;
                }
            };

            let text = message::format_message(
                &candidate.published_at,
                self.settings.source_timezone,
                &candidate.url,
                &candidate.category,
                &summary,
            );

            // Send first, record second: a crash in between can duplicate
            // one message after restart, never drop one silently.
            if !sender::send_with_retries(
                self.sender,
                &self.shutdown,
                &text,
                self.settings.notifier.max_retries,
            ) {
                error!(article = candidate.article_id, "Article left unsent");
                continue;
            }
            self.db.with_conn(|conn| {
                notifier_repo::record_sent(conn, candidate.article_id, &candidate.published_at)
            })?;
            info!(article = candidate.article_id, "Article published");

            let delay = Duration::from_secs(self.settings.notifier.message_delay)
                .saturating_sub(started.elapsed());
            if !delay.is_zero() {
                runtime::sleep_with_quantum(&self.shutdown, delay, Duration::from_secs(1));
            }
        }

        Ok(())
    }
}
