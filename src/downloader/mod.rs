//! Article downloader service.
//!
//! Each cycle selects a chunk of unprocessed articles, downloads and
//! parses their pages, writes the markdown bodies to disk, and runs LLM
//! analysis. Every article is its own transaction; a failure on one never
//! blocks the rest of the chunk.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::api::ArticleFetcher;
use crate::db::article_repo::{self, ArticleRow};
use crate::db::Database;
use crate::error::Result;
use crate::llm::Engine;
use crate::notifier::triggers;
use crate::runtime::{self, Shutdown};
use crate::settings::Settings;
use crate::storage;
use crate::webparse::ArticlePageParser;

pub mod analyzer;

pub struct Downloader<'a> {
    db: &'a Database,
    fetcher: &'a dyn ArticleFetcher,
    parser: &'a dyn ArticlePageParser,
    engine: &'a dyn Engine,
    settings: &'a Settings,
    shutdown: Shutdown,
}

impl<'a> Downloader<'a> {
    pub fn new(
        db: &'a Database,
        fetcher: &'a dyn ArticleFetcher,
        parser: &'a dyn ArticlePageParser,
        engine: &'a dyn Engine,
        settings: &'a Settings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            db,
            fetcher,
            parser,
            engine,
            settings,
            shutdown,
        }
    }

    pub fn run(&self) {
        info!("Starting news downloader");

        let interval = Duration::from_secs(self.settings.download_interval);
        while !self.shutdown.is_requested() {
            if !self.fetcher.available() {
                warn!("No connectivity, skipping this cycle");
                runtime::sleep_until_next_check(&self.shutdown, interval);
                continue;
            }

            if let Err(e) = self.process_chunk(Utc::now()) {
                error!(error = %e, "Downloader cycle failed");
            }

            runtime::sleep_until_next_check(&self.shutdown, interval);
        }

        info!("News downloader shutdown complete");
    }

    /// Selects and processes one chunk of articles.
    ///
    /// Selection is two-tier: articles inside the current notification
    /// window first (oldest first, so fresh news is timely), then backlog
    /// articles newest-first so history catches up toward the present.
    pub fn process_chunk(&self, now: DateTime<Utc>) -> Result<()> {
        let window_start = triggers::shifted_window_start(self.settings, now);
        let chunk_size = self.settings.downloads_chunk_size;

        let chunk = self.db.with_conn(|conn| {
            let mut chunk = article_repo::pending_in_window(conn, &window_start, chunk_size)?;
            let remaining = chunk_size as usize - chunk.len();
            if remaining > 0 {
                chunk.extend(article_repo::pending_backlog(
                    conn,
                    &window_start,
                    remaining as u32,
                )?);
            }
            Ok(chunk)
        })?;

        if chunk.is_empty() {
            info!("No articles to process");
            return Ok(());
        }

        let ids: Vec<i64> = chunk.iter().map(|a| a.id).collect();
        let categories = self.db.with_conn(|conn| article_repo::categories_for(conn, &ids))?;

        info!(count = chunk.len(), "Processing article chunk");
        for article in chunk {
            if self.shutdown.is_requested() {
                break;
            }
            let declared = categories.get(&article.id).map(Vec::as_slice).unwrap_or(&[]);
            if let Err(e) = self.process_article(article, declared, now) {
                error!(error = %e, "Failed to process article");
            }
        }
        Ok(())
    }

    fn process_article(
        &self,
        mut article: ArticleRow,
        declared_categories: &[String],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if declared_categories
            .iter()
            .any(|c| self.settings.ignore_categories.contains(c))
        {
            self.db
                .with_conn(|conn| article_repo::mark_skipped(conn, article.id))?;
            info!(article = article.id, "Article skipped: ignored source category");
            return Ok(());
        }

        let html = match self.fetcher.fetch_article_html(&article.url) {
            Ok(html) => html,
            Err(e) => {
                warn!(article = article.id, error = %e, "Article download failed");
                self.db
                    .with_conn(|conn| article_repo::mark_failed(conn, article.id))?;
                return Ok(());
            }
        };

        let parsed = match self.parser.parse_article(&html) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(article = article.id, error = %e, "Article parse failed");
                self.db
                    .with_conn(|conn| article_repo::mark_failed(conn, article.id))?;
                return Ok(());
            }
        };

        let path = storage::news_path(
            &self.settings.data_dir,
            &article.published_at,
            self.settings.source_timezone,
            article.id,
        );
        storage::write_atomic(&path, parsed.to_markdown_file().as_bytes())?;
        let path_str = path.to_string_lossy().into_owned();
        self.db
            .with_conn(|conn| article_repo::set_content_path(conn, article.id, &path_str))?;
        article.content_path = Some(path_str);
        info!(article = article.id, "Article downloaded");

        // The download above is committed; an analysis failure only logs.
        if let Err(e) = analyzer::analyze_article(
            self.db,
            self.engine,
            self.settings,
            &self.shutdown,
            &article,
            false,
            now,
        ) {
            error!(article = article.id, error = %e, "Article analysis failed");
        }
        Ok(())
    }
}
