//! Smart-category repository.
//!
//! Smart categories are curated by the analysis pipeline itself: the label
//! finalizer may admit new ones at any time. Insertion therefore races
//! between downloader processes and uses an upsert; readers tolerate the
//! eventual addition.

use std::collections::{BTreeMap, HashSet};

use rusqlite::{params, Connection};

use super::DatabaseError;

/// Fallback category assigned when LLM analysis fails. Always present.
pub const UNKNOWN_CATEGORY: &str = "__unknown__";

#[derive(Debug, Clone)]
pub struct SmartCategory {
    pub category: String,
    pub description: String,
    pub ignored: bool,
}

/// All categories with their descriptions, excluding the fallback row,
/// ordered by name. This is the catalog shown to the labeler.
pub fn catalog(conn: &Connection) -> Result<BTreeMap<String, String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT category, description FROM smart_categories WHERE category != ?1
         ORDER BY category",
    )?;
    let rows = stmt
        .query_map(params![UNKNOWN_CATEGORY], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(rows)
}

/// Names of categories flagged as ignored.
pub fn ignored_set(conn: &Connection) -> Result<HashSet<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT category FROM smart_categories WHERE ignored = 1")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(rows)
}

/// Admits a new category. Lost races with another process are fine: the
/// first writer wins and later upserts are no-ops.
pub fn upsert(conn: &Connection, category: &str, description: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO smart_categories (category, description, ignored)
         VALUES (?1, ?2, 0)
         ON CONFLICT (category) DO NOTHING",
        params![category, description],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, category: &str) -> Result<Option<SmartCategory>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT category, description, ignored FROM smart_categories WHERE category = ?1",
    )?;
    let mut rows = stmt
        .query_map(params![category], |row| {
            Ok(SmartCategory {
                category: row.get(0)?,
                description: row.get(1)?,
                ignored: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_catalog_excludes_unknown() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let catalog = catalog(conn)?;
            assert!(!catalog.contains_key(UNKNOWN_CATEGORY));
            assert!(catalog.contains_key("nacionales"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_upsert_does_not_clobber_existing() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            upsert(conn, "clima", "rewritten description")?;
            let row = get(conn, "clima")?.unwrap();
            assert_ne!(row.description, "rewritten description");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_upsert_admits_new_category_as_not_ignored() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            upsert(conn, "salud", "Public health, hospitals, and epidemics")?;
            let row = get(conn, "salud")?.unwrap();
            assert!(!row.ignored);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_ignored_set_contains_seeded_flags() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let ignored = ignored_set(conn)?;
            assert!(ignored.contains("deportes"));
            assert!(!ignored.contains("nacionales"));
            Ok(())
        })
        .unwrap();
    }
}
