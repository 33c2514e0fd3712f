//! Daily index document parsing.
//!
//! The source publishes one JSON document per day:
//! `{"ultimas": [{"id", "url", "date", "hour", "categories"}, ...]}` with
//! Spanish month names ("Febrero 6, 2025"), 12-hour times (" 9:01 am ") and
//! categories as `[display_name, slug]` pairs from most general to most
//! specific.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::ApiError;

const SPANISH_MONTHS: [(&str, u32); 12] = [
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

/// One day's index: the raw document (persisted verbatim) plus the parsed
/// article tuples.
#[derive(Debug, Clone)]
pub struct DailyIndex {
    pub raw: Value,
    pub entries: Vec<IndexArticle>,
}

impl DailyIndex {
    pub fn empty() -> Self {
        Self {
            raw: serde_json::json!({ "ultimas": [] }),
            entries: Vec::new(),
        }
    }
}

/// An article as listed in the daily index.
#[derive(Debug, Clone)]
pub struct IndexArticle {
    pub id: i64,
    pub url: String,
    pub published_at: DateTime<Utc>,
    /// Slug path, e.g. `deportes/futbol`.
    pub category: String,
}

/// Parses a raw index document. A malformed entry fails the whole day: the
/// synchronizer logs it and leaves the day unprocessed.
pub fn parse_index(raw: Value, tz: Tz) -> Result<DailyIndex, ApiError> {
    let items = raw
        .get("ultimas")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::InvalidDocument("missing 'ultimas' array".to_string()))?;

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let id = item
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ApiError::InvalidDocument(format!("entry without id: {item}")))?;
        let url = item
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::InvalidDocument(format!("entry {id} without url")))?;
        let date = item.get("date").and_then(Value::as_str).ok_or_else(|| {
            ApiError::InvalidDocument(format!("entry {id} without date"))
        })?;
        let hour = item.get("hour").and_then(Value::as_str).ok_or_else(|| {
            ApiError::InvalidDocument(format!("entry {id} without hour"))
        })?;

        entries.push(IndexArticle {
            id,
            url: url.to_string(),
            published_at: parse_timestamp(date, hour, tz)?,
            category: category_path(item.get("categories"))?,
        });
    }

    Ok(DailyIndex { raw, entries })
}

/// Joins the slug element of each `[display, slug]` category pair with `/`.
fn category_path(categories: Option<&Value>) -> Result<String, ApiError> {
    let pairs = categories
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::InvalidDocument("entry without categories".to_string()))?;

    let slugs: Vec<&str> = pairs
        .iter()
        .filter_map(|pair| pair.get(1).and_then(Value::as_str))
        .collect();
    if slugs.is_empty() {
        return Err(ApiError::InvalidDocument(
            "entry with empty categories".to_string(),
        ));
    }
    Ok(slugs.join("/"))
}

/// Parses the index's Spanish date ("Febrero 6, 2025") and 12-hour time
/// (" 9:01 am ") into a UTC instant via the source timezone.
pub fn parse_timestamp(date: &str, hour: &str, tz: Tz) -> Result<DateTime<Utc>, ApiError> {
    let original = format!("{date} {hour}");
    let bad = || ApiError::Timestamp(original.clone());

    let cleaned = date.to_lowercase().replace(',', "");
    let mut parts = cleaned.split_whitespace();
    let month_name = parts.next().ok_or_else(bad)?;
    let day: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let year: i32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let month = SPANISH_MONTHS
        .iter()
        .find(|(name, _)| *name == month_name)
        .map(|(_, number)| *number)
        .ok_or_else(bad)?;

    let time = hour.trim().to_lowercase();
    let is_pm = time.contains("pm");
    let digits = time.replace("am", "").replace("pm", "");
    let mut hm = digits.trim().split(':');
    let mut h: u32 = hm.next().and_then(|p| p.trim().parse().ok()).ok_or_else(bad)?;
    let m: u32 = hm.next().and_then(|p| p.trim().parse().ok()).ok_or_else(bad)?;
    if is_pm && h != 12 {
        h += 12;
    } else if !is_pm && h == 12 {
        h = 0;
    }

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| NaiveTime::from_hms_opt(h, m, 0).map(|t| d.and_time(t)))
        .ok_or_else(bad)?;

    // On a DST gap the local time does not exist; on a fold it is ambiguous.
    // Either way the earliest valid interpretation is taken.
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz
            .from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest()
            .ok_or_else(bad)?,
    };
    Ok(local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Costa_Rica;

    #[test]
    fn test_parse_timestamp_morning() {
        let ts = parse_timestamp("Febrero 6, 2025", " 9:01 am ", Costa_Rica).unwrap();
        // 09:01 -06:00 == 15:01 UTC
        assert_eq!(ts.to_rfc3339(), "2025-02-06T15:01:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_noon_and_midnight() {
        let noon = parse_timestamp("Junio 1, 2024", "12:00 pm", Costa_Rica).unwrap();
        assert_eq!(noon.to_rfc3339(), "2024-06-01T18:00:00+00:00");

        let midnight = parse_timestamp("Junio 1, 2024", "12:05 am", Costa_Rica).unwrap();
        assert_eq!(midnight.to_rfc3339(), "2024-06-01T06:05:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("Smarch 1, 2024", "9:00 am", Costa_Rica).is_err());
        assert!(parse_timestamp("Junio 1, 2024", "morning", Costa_Rica).is_err());
    }

    #[test]
    fn test_parse_index_document() {
        let raw = serde_json::json!({
            "ultimas": [
                {
                    "id": 101,
                    "url": "https://www.crhoy.com/deportes/futbol/gol",
                    "date": "Junio 1, 2024",
                    "hour": "10:15 am",
                    "categories": [["Deportes", "deportes"], ["Fútbol", "futbol"]]
                }
            ]
        });
        let index = parse_index(raw, Costa_Rica).unwrap();
        assert_eq!(index.entries.len(), 1);
        let entry = &index.entries[0];
        assert_eq!(entry.id, 101);
        assert_eq!(entry.category, "deportes/futbol");
        assert_eq!(entry.published_at.to_rfc3339(), "2024-06-01T16:15:00+00:00");
    }

    #[test]
    fn test_parse_index_rejects_malformed_entry() {
        let raw = serde_json::json!({ "ultimas": [{ "url": "https://x" }] });
        assert!(parse_index(raw, Costa_Rica).is_err());

        let raw = serde_json::json!({ "items": [] });
        assert!(parse_index(raw, Costa_Rica).is_err());
    }
}
