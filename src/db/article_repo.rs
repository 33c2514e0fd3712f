//! Article and category-catalog repository.
//!
//! Only the synchronizer inserts rows here; only the downloader mutates
//! `skipped`/`failed`/`content_path`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};

use super::{ts_from_sql, ts_to_sql, DatabaseError};

/// One article as observed from the source index.
#[derive(Debug, Clone)]
pub struct ArticleRow {
    pub id: i64,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub content_path: Option<String>,
    pub skipped: bool,
    pub failed: bool,
}

/// A new article extracted from a daily index document.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub id: i64,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub category: String,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, Option<String>, bool, bool)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_article(
    (id, url, published_at, content_path, skipped, failed): (i64, String, String, Option<String>, bool, bool),
) -> Result<ArticleRow, DatabaseError> {
    Ok(ArticleRow {
        id,
        url,
        published_at: ts_from_sql(&published_at)?,
        content_path,
        skipped,
        failed,
    })
}

const ARTICLE_COLUMNS: &str = "id, url, published_at, content_path, skipped, failed";

/// Returns the subset of `ids` already present in the articles table.
pub fn existing_ids(conn: &Connection, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT id FROM articles WHERE id IN ({})",
        placeholders.join(", ")
    );
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map(params_ref.as_slice(), |row| row.get::<_, i64>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(found)
}

/// Inserts catalog entries for every category path not yet known.
pub fn insert_catalog_entries(
    tx: &Transaction,
    categories: &HashSet<String>,
) -> Result<(), DatabaseError> {
    let mut stmt =
        tx.prepare("INSERT OR IGNORE INTO categories_catalog (category) VALUES (?1)")?;
    for category in categories {
        stmt.execute(params![category])?;
    }
    Ok(())
}

/// Inserts new articles together with their category links.
pub fn insert_articles(tx: &Transaction, articles: &[NewArticle]) -> Result<(), DatabaseError> {
    let mut insert_article = tx.prepare(
        "INSERT OR IGNORE INTO articles (id, url, published_at) VALUES (?1, ?2, ?3)",
    )?;
    let mut insert_link = tx.prepare(
        "INSERT OR IGNORE INTO article_categories (article_id, category) VALUES (?1, ?2)",
    )?;

    for article in articles {
        insert_article.execute(params![
            article.id,
            article.url,
            ts_to_sql(&article.published_at)
        ])?;
        insert_link.execute(params![article.id, article.category])?;
    }
    Ok(())
}

/// Source-declared category paths for each of the given articles.
pub fn categories_for(
    conn: &Connection,
    ids: &[i64],
) -> Result<HashMap<i64, Vec<String>>, DatabaseError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT article_id, category FROM article_categories WHERE article_id IN ({})",
        placeholders.join(", ")
    );
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_ref.as_slice(), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut map: HashMap<i64, Vec<String>> = HashMap::new();
    for row in rows {
        let (id, category) = row?;
        map.entry(id).or_default().push(category);
    }
    Ok(map)
}

/// Pending articles published inside the current notification window,
/// oldest first, so fresh news reaches the notifier in time.
pub fn pending_in_window(
    conn: &Connection,
    window_start: &DateTime<Utc>,
    limit: u32,
) -> Result<Vec<ArticleRow>, DatabaseError> {
    let sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles
         WHERE content_path IS NULL AND skipped = 0 AND failed = 0
           AND published_at >= ?1
         ORDER BY published_at ASC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![ts_to_sql(window_start), limit], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(into_article).collect()
}

/// Pending articles older than the window, newest first, so the backlog
/// catches up toward the present.
pub fn pending_backlog(
    conn: &Connection,
    window_start: &DateTime<Utc>,
    limit: u32,
) -> Result<Vec<ArticleRow>, DatabaseError> {
    let sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles
         WHERE content_path IS NULL AND skipped = 0 AND failed = 0
           AND published_at < ?1
         ORDER BY published_at DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![ts_to_sql(window_start), limit], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(into_article).collect()
}

pub fn mark_skipped(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    conn.execute("UPDATE articles SET skipped = 1 WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn mark_failed(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    conn.execute("UPDATE articles SET failed = 1 WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn set_content_path(conn: &Connection, id: i64, path: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE articles SET content_path = ?1 WHERE id = ?2",
        params![path, id],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<ArticleRow>, DatabaseError> {
    let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map(params![id], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    match rows.pop() {
        Some(raw) => Ok(Some(into_article(raw)?)),
        None => Ok(None),
    }
}
