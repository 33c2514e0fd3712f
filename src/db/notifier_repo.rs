//! Notifier projection: analyzed articles ready for publishing, their
//! summaries, and the sent log.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::{ts_from_sql, ts_to_sql, DatabaseError};

/// How an article relates to the audience locus (Costa Rica).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Direct,
    Indirect,
    NotApplicable,
}

impl Relation {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Relation::Direct => "direct",
            Relation::Indirect => "indirect",
            Relation::NotApplicable => "na",
        }
    }

    pub fn from_sql(value: &str) -> Result<Self, DatabaseError> {
        match value {
            "direct" => Ok(Relation::Direct),
            "indirect" => Ok(Relation::Indirect),
            "na" => Ok(Relation::NotApplicable),
            other => Err(DatabaseError::CorruptValue {
                column: "relation",
                value: other.to_string(),
            }),
        }
    }
}

/// The "ready to publish?" projection of an analyzed article.
#[derive(Debug, Clone)]
pub struct NotifierArticleRow {
    pub article_id: i64,
    pub published_at: DateTime<Utc>,
    pub relation: Relation,
    pub category: String,
    pub skipped: bool,
    pub failed: bool,
}

/// An article selected for publishing in the current window.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub article_id: i64,
    pub published_at: DateTime<Utc>,
    pub url: String,
    pub category: String,
}

/// Writes the analysis result for an article. Exactly one row per article;
/// re-analysis after a failure overwrites the failed row.
pub fn upsert_notifier_article(
    conn: &Connection,
    row: &NotifierArticleRow,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO notifier_articles
         (article_id, published_at, relation, category, skipped, failed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.article_id,
            ts_to_sql(&row.published_at),
            row.relation.as_sql(),
            row.category,
            row.skipped,
            row.failed,
        ],
    )?;
    Ok(())
}

pub fn get_notifier_article(
    conn: &Connection,
    article_id: i64,
) -> Result<Option<NotifierArticleRow>, DatabaseError> {
    let row: Option<(String, String, String, bool, bool)> = conn
        .query_row(
            "SELECT published_at, relation, category, skipped, failed
             FROM notifier_articles WHERE article_id = ?1",
            params![article_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )
        .optional()?;

    match row {
        Some((published_at, relation, category, skipped, failed)) => Ok(Some(NotifierArticleRow {
            article_id,
            published_at: ts_from_sql(&published_at)?,
            relation: Relation::from_sql(&relation)?,
            category,
            skipped,
            failed,
        })),
        None => Ok(None),
    }
}

pub fn insert_summary(
    tx: &Transaction,
    article_id: i64,
    lang: &str,
    path: &str,
) -> Result<(), DatabaseError> {
    tx.execute(
        "INSERT OR REPLACE INTO summaries (article_id, lang, path) VALUES (?1, ?2, ?3)",
        params![article_id, lang, path],
    )?;
    Ok(())
}

pub fn summary_path(
    conn: &Connection,
    article_id: i64,
    lang: &str,
) -> Result<Option<String>, DatabaseError> {
    let path = conn
        .query_row(
            "SELECT path FROM summaries WHERE article_id = ?1 AND lang = ?2",
            params![article_id, lang],
            |r| r.get(0),
        )
        .optional()?;
    Ok(path)
}

pub fn has_summaries(conn: &Connection, article_id: i64) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM summaries WHERE article_id = ?1)",
        params![article_id],
        |r| r.get(0),
    )?;
    Ok(exists)
}

/// Drops sent-log rows older than the retention horizon. Runs at the start
/// of every notifier cycle.
pub fn prune_sent_before(
    conn: &Connection,
    horizon: &DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sent_log WHERE published_at < ?1",
        params![ts_to_sql(horizon)],
    )?;
    Ok(deleted)
}

/// IDs of articles already sent at or after the given instant.
pub fn sent_ids_since(
    conn: &Connection,
    since: &DateTime<Utc>,
) -> Result<HashSet<i64>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT article_id FROM sent_log WHERE published_at >= ?1")?;
    let ids = stmt
        .query_map(params![ts_to_sql(since)], |row| row.get::<_, i64>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

/// Records a successful send. At most one row per article.
pub fn record_sent(
    conn: &Connection,
    article_id: i64,
    published_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO sent_log (article_id, published_at) VALUES (?1, ?2)",
        params![article_id, ts_to_sql(published_at)],
    )?;
    Ok(())
}

/// Publishable articles inside the half-open window `[start, end)`:
/// analyzed, not skipped, not failed, related to the locus, category not
/// ignored. Ordered by publication timestamp ascending. The caller filters
/// out already-sent IDs.
pub fn candidates(
    conn: &Connection,
    window_start: &DateTime<Utc>,
    window_end: &DateTime<Utc>,
) -> Result<Vec<Candidate>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT na.article_id, na.published_at, a.url, na.category
         FROM notifier_articles na
         JOIN articles a ON a.id = na.article_id
         JOIN smart_categories sc ON sc.category = na.category
         WHERE na.published_at >= ?1 AND na.published_at < ?2
           AND na.skipped = 0 AND na.failed = 0
           AND na.relation IN ('direct', 'indirect')
           AND sc.ignored = 0
         ORDER BY na.published_at ASC",
    )?;
    let rows = stmt
        .query_map(params![ts_to_sql(window_start), ts_to_sql(window_end)], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(article_id, published_at, url, category)| {
            Ok(Candidate {
                article_id,
                published_at: ts_from_sql(&published_at)?,
                url,
                category,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{article_repo, smart_category_repo, Database};
    use chrono::TimeZone;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, 0).unwrap()
    }

    fn seed_article(db: &Database, id: i64, published_at: DateTime<Utc>) {
        db.with_tx(|tx| {
            let categories = std::iter::once("nacionales".to_string()).collect();
            article_repo::insert_catalog_entries(tx, &categories)?;
            article_repo::insert_articles(
                tx,
                &[article_repo::NewArticle {
                    id,
                    url: format!("https://www.crhoy.com/nota-{id}"),
                    published_at,
                    category: "nacionales".to_string(),
                }],
            )
        })
        .unwrap();
    }

    fn analyzed(db: &Database, id: i64, published_at: DateTime<Utc>, relation: Relation) {
        db.with_conn(|conn| {
            upsert_notifier_article(
                conn,
                &NotifierArticleRow {
                    article_id: id,
                    published_at,
                    relation,
                    category: "nacionales".to_string(),
                    skipped: false,
                    failed: false,
                },
            )
        })
        .unwrap();
    }

    #[test]
    fn test_relation_sql_roundtrip() {
        for relation in [Relation::Direct, Relation::Indirect, Relation::NotApplicable] {
            assert_eq!(Relation::from_sql(relation.as_sql()).unwrap(), relation);
        }
        assert!(Relation::from_sql("bogus").is_err());
    }

    #[test]
    fn test_candidates_window_is_half_open() {
        let db = Database::open_in_memory().unwrap();
        for (id, at) in [(1, ts(5, 59)), (2, ts(6, 0)), (3, ts(11, 59)), (4, ts(12, 0))] {
            seed_article(&db, id, at);
            analyzed(&db, id, at, Relation::Direct);
        }

        db.with_conn(|conn| {
            let picked = candidates(conn, &ts(6, 0), &ts(12, 0))?;
            let ids: Vec<i64> = picked.iter().map(|c| c.article_id).collect();
            assert_eq!(ids, vec![2, 3]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_candidates_exclude_na_failed_skipped_and_ignored() {
        let db = Database::open_in_memory().unwrap();
        for id in 1..=4 {
            seed_article(&db, id, ts(10, id as u32));
        }
        analyzed(&db, 1, ts(10, 1), Relation::NotApplicable);
        db.with_conn(|conn| {
            upsert_notifier_article(
                conn,
                &NotifierArticleRow {
                    article_id: 2,
                    published_at: ts(10, 2),
                    relation: Relation::Direct,
                    category: "nacionales".into(),
                    skipped: false,
                    failed: true,
                },
            )?;
            upsert_notifier_article(
                conn,
                &NotifierArticleRow {
                    article_id: 3,
                    published_at: ts(10, 3),
                    relation: Relation::Direct,
                    category: "nacionales".into(),
                    skipped: true,
                    failed: false,
                },
            )?;
            // Category with the ignored flag set.
            upsert_notifier_article(
                conn,
                &NotifierArticleRow {
                    article_id: 4,
                    published_at: ts(10, 4),
                    relation: Relation::Indirect,
                    category: "deportes".into(),
                    skipped: false,
                    failed: false,
                },
            )?;
            assert!(candidates(conn, &ts(9, 0), &ts(12, 0))?.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_sent_log_pruning_and_lookup() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            record_sent(conn, 1, &ts(5, 0))?;
            record_sent(conn, 2, &ts(10, 0))?;
            record_sent(conn, 2, &ts(10, 0))?; // at most one row per article

            let deleted = prune_sent_before(conn, &ts(6, 0))?;
            assert_eq!(deleted, 1);

            let sent = sent_ids_since(conn, &ts(6, 0))?;
            assert_eq!(sent, HashSet::from([2]));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_new_smart_category_reaches_candidates() {
        let db = Database::open_in_memory().unwrap();
        seed_article(&db, 1, ts(10, 0));
        db.with_conn(|conn| {
            smart_category_repo::upsert(conn, "salud", "Public health news")?;
            upsert_notifier_article(
                conn,
                &NotifierArticleRow {
                    article_id: 1,
                    published_at: ts(10, 0),
                    relation: Relation::Direct,
                    category: "salud".into(),
                    skipped: false,
                    failed: false,
                },
            )?;
            assert_eq!(candidates(conn, &ts(9, 0), &ts(12, 0))?.len(), 1);
            Ok(())
        })
        .unwrap();
    }
}
