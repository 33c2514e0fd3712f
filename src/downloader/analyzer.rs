//! Per-article LLM analysis: categorization, summaries, and the notifier
//! projection.
//!
//! Analysis runs in its own transactions, after the download has already
//! committed: a transient LLM failure must never lose a downloaded
//! article. On unrecoverable analysis errors the article is recorded under
//! the fallback category with `failed` set, which the notifier never
//! publishes.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::agents;
use crate::db::article_repo::ArticleRow;
use crate::db::notifier_repo::{self, NotifierArticleRow, Relation};
use crate::db::smart_category_repo::{self, UNKNOWN_CATEGORY};
use crate::db::Database;
use crate::error::Result;
use crate::llm::Engine;
use crate::notifier::triggers;
use crate::runtime::Shutdown;
use crate::settings::Settings;
use crate::storage;

/// Analyzes one downloaded article and records the results.
///
/// Articles published before the previous trigger are past their
/// notification window and are left unanalyzed unless `force` is set.
pub fn analyze_article(
    db: &Database,
    engine: &dyn Engine,
    settings: &Settings,
    shutdown: &Shutdown,
    article: &ArticleRow,
    force: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    if !force {
        let info = triggers::trigger_info(
            &settings.notifier.trigger_times,
            settings.source_timezone,
            now,
        );
        if article.published_at < info.previous {
            debug!(
                article = article.id,
                published_at = %article.published_at,
                "Skipping analysis, article is older than the previous trigger"
            );
            return Ok(());
        }
    }

    if already_analyzed(db, article.id)? {
        info!(article = article.id, "Article already analyzed");
        return Ok(());
    }

    let Some(content_path) = article.content_path.as_deref() else {
        warn!(article = article.id, "Article has no content file, nothing to analyze");
        return Ok(());
    };
    let content = storage::read_to_string(Path::new(content_path))?;

    let catalog = db.with_conn(smart_category_repo::catalog)?;
    let ignored = db.with_conn(smart_category_repo::ignored_set)?;
    let session_id = format!("{}_{}", article.id, now.format("%Y%m%d_%H%M%S"));

    let category = match agents::categorize_article(
        engine,
        &settings.llm,
        shutdown,
        &session_id,
        &content,
        &catalog,
    ) {
        Ok(category) => category,
        Err(e) => {
            record_failure(db, article)?;
            return Err(e.into());
        }
    };

    // A fresh category is admitted in its own transaction before the
    // notifier row referencing it.
    if let Some(description) = &category.description {
        db.with_conn(|conn| smart_category_repo::upsert(conn, &category.category, description))?;
        info!(category = %category.category, "Admitted new smart category");
    }

    let should_skip = category.relation == Relation::NotApplicable
        || ignored.contains(&category.category);
    let row = NotifierArticleRow {
        article_id: article.id,
        published_at: article.published_at,
        relation: category.relation,
        category: category.category.clone(),
        skipped: should_skip,
        failed: false,
    };

    if should_skip {
        db.with_conn(|conn| notifier_repo::upsert_notifier_article(conn, &row))?;
        info!(
            article = article.id,
            relation = row.relation.as_sql(),
            category = %row.category,
            "Article analyzed: not for notification"
        );
        return Ok(());
    }

    let summaries = match agents::summarize_article(
        engine,
        &settings.llm,
        shutdown,
        &session_id,
        &content,
    ) {
        Ok(summaries) => summaries,
        Err(e) => {
            record_failure(db, article)?;
            return Err(e.into());
        }
    };

    let mut files: Vec<(String, String)> = Vec::new();
    let mut save = |lang: &str, text: &str| -> Result<()> {
        let path = storage::summary_path(
            &settings.data_dir,
            &article.published_at,
            settings.source_timezone,
            article.id,
            lang,
        );
        storage::write_atomic(&path, text.as_bytes())?;
        files.push((lang.to_string(), path.to_string_lossy().into_owned()));
        Ok(())
    };
    save("en", &summaries.summary)?;
    for (lang, translation) in &summaries.translations {
        save(lang, translation)?;
    }

    db.with_tx(|tx| {
        for (lang, path) in &files {
            notifier_repo::insert_summary(tx, article.id, lang, path)?;
        }
        notifier_repo::upsert_notifier_article(tx, &row)
    })?;

    info!(
        article = article.id,
        category = %row.category,
        "Article analyzed"
    );
    Ok(())
}

/// An article counts as analyzed when a non-failed notifier row exists and
/// the row either opted out of notification or already has its summaries.
fn already_analyzed(db: &Database, article_id: i64) -> Result<bool> {
    let existing = db.with_conn(|conn| notifier_repo::get_notifier_article(conn, article_id))?;
    match existing {
        Some(row) if !row.failed => {
            if row.skipped {
                return Ok(true);
            }
            Ok(db.with_conn(|conn| notifier_repo::has_summaries(conn, article_id))?)
        }
        _ => Ok(false),
    }
}

/// Records the fallback row after an unrecoverable analysis error.
fn record_failure(db: &Database, article: &ArticleRow) -> Result<()> {
    db.with_conn(|conn| {
        notifier_repo::upsert_notifier_article(
            conn,
            &NotifierArticleRow {
                article_id: article.id,
                published_at: article.published_at,
                relation: Relation::NotApplicable,
                category: UNKNOWN_CATEGORY.to_string(),
                skipped: false,
                failed: true,
            },
        )
    })?;
    warn!(article = article.id, "Article analysis failed, recorded under fallback category");
    Ok(())
}
