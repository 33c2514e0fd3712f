//! Daily-index coverage and gap-range repository.
//!
//! A `daily_index` row means the day's index has been ingested. Gap ranges
//! are half-open `[start, end)` date intervals still waiting for ingestion;
//! the table invariant is that ranges are pairwise disjoint, non-empty, and
//! never cover an ingested date.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::DatabaseError;

const DATE_FMT: &str = "%Y-%m-%d";

/// A half-open `[start, end)` interval of missing days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl GapRange {
    /// Number of days covered by the range.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// The covered dates, oldest first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let mut current = self.start;
        let end = self.end;
        std::iter::from_fn(move || {
            if current >= end {
                return None;
            }
            let day = current;
            current += chrono::Duration::days(1);
            Some(day)
        })
    }
}

fn date_to_sql(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

fn date_from_sql(value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, DATE_FMT).map_err(|_| DatabaseError::CorruptValue {
        column: "date",
        value: value.to_string(),
    })
}

/// Marks a date as ingested, recording the path of the saved index JSON.
pub fn record_daily_index(
    tx: &Transaction,
    date: NaiveDate,
    path: &str,
) -> Result<(), DatabaseError> {
    tx.execute(
        "INSERT OR REPLACE INTO daily_index (date, path) VALUES (?1, ?2)",
        params![date_to_sql(date), path],
    )?;
    Ok(())
}

pub fn daily_index_exists(conn: &Connection, date: NaiveDate) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM daily_index WHERE date = ?1)",
        params![date_to_sql(date)],
        |r| r.get(0),
    )?;
    Ok(exists)
}

/// Oldest and newest ingested dates, or `None` for a fresh database.
pub fn daily_index_range(
    conn: &Connection,
) -> Result<Option<(NaiveDate, NaiveDate)>, DatabaseError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT MIN(date), MAX(date) FROM daily_index WHERE date IS NOT NULL",
            [],
            |r| Ok((r.get::<_, Option<String>>(0)?, r.get::<_, Option<String>>(1)?)),
        )
        .optional()?
        .and_then(|(min, max)| min.zip(max));

    match row {
        Some((min, max)) => Ok(Some((date_from_sql(&min)?, date_from_sql(&max)?))),
        None => Ok(None),
    }
}

/// Inserts the gap `[start, end)`, coalescing with every existing range it
/// overlaps or touches. Keeps the disjointness invariant at commit.
pub fn insert_gap_merged(
    tx: &Transaction,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), DatabaseError> {
    if start >= end {
        return Ok(());
    }

    let mut merged_start = start;
    let mut merged_end = end;

    {
        let mut stmt = tx.prepare(
            "SELECT start_date, end_date FROM gap_ranges
             WHERE end_date >= ?1 AND start_date <= ?2",
        )?;
        let touching = stmt
            .query_map(params![date_to_sql(start), date_to_sql(end)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (range_start, range_end) in touching {
            merged_start = merged_start.min(date_from_sql(&range_start)?);
            merged_end = merged_end.max(date_from_sql(&range_end)?);
            tx.execute(
                "DELETE FROM gap_ranges WHERE start_date = ?1",
                params![range_start],
            )?;
        }
    }

    tx.execute(
        "INSERT INTO gap_ranges (start_date, end_date) VALUES (?1, ?2)",
        params![date_to_sql(merged_start), date_to_sql(merged_end)],
    )?;
    Ok(())
}

/// The gap with the oldest start date, if any.
pub fn earliest_gap(conn: &Connection) -> Result<Option<GapRange>, DatabaseError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT start_date, end_date FROM gap_ranges ORDER BY start_date LIMIT 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    match row {
        Some((start, end)) => Ok(Some(GapRange {
            start: date_from_sql(&start)?,
            end: date_from_sql(&end)?,
        })),
        None => Ok(None),
    }
}

/// Removes the days `[gap.start, new_start)` from the front of a gap after
/// they have been ingested. Deletes the row once the range is empty.
pub fn shrink_gap_front(
    tx: &Transaction,
    gap: GapRange,
    new_start: NaiveDate,
) -> Result<(), DatabaseError> {
    if new_start >= gap.end {
        tx.execute(
            "DELETE FROM gap_ranges WHERE start_date = ?1",
            params![date_to_sql(gap.start)],
        )?;
    } else {
        tx.execute(
            "UPDATE gap_ranges SET start_date = ?1 WHERE start_date = ?2",
            params![date_to_sql(new_start), date_to_sql(gap.start)],
        )?;
    }
    Ok(())
}

/// All gap ranges ordered by start date.
pub fn all_gaps(conn: &Connection) -> Result<Vec<GapRange>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT start_date, end_date FROM gap_ranges ORDER BY start_date")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(start, end)| {
            Ok(GapRange {
                start: date_from_sql(&start)?,
                end: date_from_sql(&end)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn test_gap_days_iteration() {
        let gap = GapRange { start: d(2), end: d(4) };
        assert_eq!(gap.len_days(), 2);
        assert_eq!(gap.days().collect::<Vec<_>>(), vec![d(2), d(3)]);
    }

    #[test]
    fn test_insert_gap_merges_touching_ranges() {
        let db = Database::open_in_memory().unwrap();
        db.with_tx(|tx| insert_gap_merged(tx, d(2), d(4))).unwrap();
        db.with_tx(|tx| insert_gap_merged(tx, d(6), d(8))).unwrap();
        // [4, 6) touches both neighbours: everything collapses into one range.
        db.with_tx(|tx| insert_gap_merged(tx, d(4), d(6))).unwrap();

        let gaps = db.with_conn(all_gaps).unwrap();
        assert_eq!(gaps, vec![GapRange { start: d(2), end: d(8) }]);
    }

    #[test]
    fn test_insert_gap_merges_overlap() {
        let db = Database::open_in_memory().unwrap();
        db.with_tx(|tx| insert_gap_merged(tx, d(2), d(5))).unwrap();
        db.with_tx(|tx| insert_gap_merged(tx, d(3), d(9))).unwrap();

        let gaps = db.with_conn(all_gaps).unwrap();
        assert_eq!(gaps, vec![GapRange { start: d(2), end: d(9) }]);
    }

    #[test]
    fn test_empty_gap_is_not_inserted() {
        let db = Database::open_in_memory().unwrap();
        db.with_tx(|tx| insert_gap_merged(tx, d(5), d(5))).unwrap();
        assert!(db.with_conn(all_gaps).unwrap().is_empty());
    }

    #[test]
    fn test_shrink_front_and_delete_when_empty() {
        let db = Database::open_in_memory().unwrap();
        db.with_tx(|tx| insert_gap_merged(tx, d(2), d(4))).unwrap();

        let gap = db.with_conn(earliest_gap).unwrap().unwrap();
        db.with_tx(|tx| shrink_gap_front(tx, gap, d(3))).unwrap();
        let gap = db.with_conn(earliest_gap).unwrap().unwrap();
        assert_eq!(gap, GapRange { start: d(3), end: d(4) });

        db.with_tx(|tx| shrink_gap_front(tx, gap, d(4))).unwrap();
        assert!(db.with_conn(earliest_gap).unwrap().is_none());
    }

    #[test]
    fn test_earliest_gap_orders_by_start() {
        let db = Database::open_in_memory().unwrap();
        db.with_tx(|tx| insert_gap_merged(tx, d(10), d(12))).unwrap();
        db.with_tx(|tx| insert_gap_merged(tx, d(2), d(4))).unwrap();

        let gap = db.with_conn(earliest_gap).unwrap().unwrap();
        assert_eq!(gap.start, d(2));
    }

    #[test]
    fn test_daily_index_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        db.with_tx(|tx| record_daily_index(tx, d(1), "metadata/2024/06/01.json"))
            .unwrap();

        db.with_conn(|conn| {
            assert!(daily_index_exists(conn, d(1))?);
            assert!(!daily_index_exists(conn, d(2))?);
            assert_eq!(daily_index_range(conn)?, Some((d(1), d(1))));
            Ok(())
        })
        .unwrap();
    }
}
