//! Database access for all three pipeline services.
//!
//! A single SQLite database is shared by the synchronizer, downloader, and
//! notifier processes; every unit of work (one day, one article, one
//! message) is one transaction.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Transaction};

mod error;
pub mod migrations;

pub mod article_repo;
pub mod index_repo;
pub mod notifier_repo;
pub mod smart_category_repo;

pub use error::DatabaseError;

/// Shared handle to the pipeline database.
///
/// Wraps a single connection behind a mutex: each service is one logical
/// worker, so contention only exists across processes, which SQLite handles
/// with its own file locking.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (creating if needed) the database at `database_url` and runs
    /// pending migrations. Accepts a bare path or a `sqlite:` URL.
    pub fn open(database_url: &str) -> Result<Self, DatabaseError> {
        let path = strip_sqlite_url(database_url);
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens an in-memory database with migrations applied. Test use only.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the underlying connection. Reads and single-statement
    /// writes; multi-statement units of work go through [`Self::with_tx`].
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        f(&conn)
    }

    /// Runs `f` inside a transaction, committing on `Ok` and rolling back
    /// on `Err`.
    pub fn with_tx<T>(
        &self,
        f: impl FnOnce(&Transaction) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Formats a timestamp for storage. All timestamps are stored as RFC 3339
/// UTC strings so that lexicographic order matches chronological order.
pub fn ts_to_sql(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Parses a stored timestamp back into UTC.
pub fn ts_from_sql(value: &str) -> Result<chrono::DateTime<chrono::Utc>, DatabaseError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|_| DatabaseError::CorruptValue {
            column: "published_at",
            value: value.to_string(),
        })
}

fn strip_sqlite_url(url: &str) -> &str {
    let path = url.strip_prefix("sqlite:").unwrap_or(url);
    path.split('?').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_sqlite_url() {
        assert_eq!(strip_sqlite_url("sqlite:data/p.db?mode=rwc"), "data/p.db");
        assert_eq!(strip_sqlite_url("data/p.db"), "data/p.db");
    }

    #[test]
    fn test_open_in_memory_runs_migrations() {
        let db = Database::open_in_memory().unwrap();
        let count: u32 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?)
            })
            .unwrap();
        assert!(count > 0);
    }

    #[test]
    fn test_with_tx_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<(), DatabaseError> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO categories_catalog (category) VALUES ('economia')",
                [],
            )?;
            Err(DatabaseError::Migration {
                version: 0,
                reason: "forced".into(),
            })
        });
        assert!(result.is_err());

        let count: u32 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM categories_catalog", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
