//! Single-day index ingestion.
//!
//! Fetching and saving the day's JSON happens outside the transaction; the
//! database writes (catalog entries, articles, category links, daily-index
//! row, optional gap shrink) are all-or-nothing. A saved JSON file left
//! behind by a rollback is harmless: ingestion is idempotent on retry.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::info;

use crate::api::IndexSource;
use crate::db::index_repo::GapRange;
use crate::db::{article_repo, index_repo, Database};
use crate::error::{ApiError, Result};
use crate::settings::Settings;
use crate::storage;

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub new_articles: usize,
    pub new_categories: usize,
}

/// Fetches, persists, and ingests one day's index. When `shrink` is given,
/// the day is removed from the front of that gap in the same transaction.
pub fn ingest_day(
    db: &Database,
    source: &dyn IndexSource,
    settings: &Settings,
    date: NaiveDate,
    shrink: Option<GapRange>,
) -> Result<IngestStats> {
    let index = source.fetch_daily_index(date)?;

    let path = storage::metadata_path(&settings.data_dir, date);
    let body = serde_json::to_vec_pretty(&index.raw)
        .map_err(|e| ApiError::InvalidDocument(e.to_string()))?;
    storage::write_atomic(&path, &body)?;
    let path_str = path.to_string_lossy().into_owned();

    let stats = db.with_tx(|tx| {
        let ids: Vec<i64> = index.entries.iter().map(|e| e.id).collect();
        let known = article_repo::existing_ids(tx, &ids)?;

        let new_entries: Vec<article_repo::NewArticle> = index
            .entries
            .iter()
            .filter(|e| !known.contains(&e.id))
            .map(|e| article_repo::NewArticle {
                id: e.id,
                url: e.url.clone(),
                published_at: e.published_at,
                category: e.category.clone(),
            })
            .collect();

        let categories: HashSet<String> =
            new_entries.iter().map(|e| e.category.clone()).collect();

        article_repo::insert_catalog_entries(tx, &categories)?;
        article_repo::insert_articles(tx, &new_entries)?;
        index_repo::record_daily_index(tx, date, &path_str)?;

        if let Some(gap) = shrink {
            index_repo::shrink_gap_front(tx, gap, date + chrono::Duration::days(1))?;
        }

        Ok(IngestStats {
            new_articles: new_entries.len(),
            new_categories: categories.len(),
        })
    })?;

    info!(
        %date,
        new_articles = stats.new_articles,
        "Ingested daily index"
    );
    Ok(stats)
}
