//! File manager: deterministic path layout and atomic writes.
//!
//! Layout:
//! - daily index JSON: `{data_dir}/metadata/YYYY/MM/DD.json`
//! - article body:     `{data_dir}/news/YYYY-MM-DD/HH-MM-{id}.md`
//! - summary:          `{data_dir}/news/YYYY-MM-DD/HH-MM-{id}-sum.{lang}.txt`
//! - raw LLM dumps:    `{raw_dir}/{session_id}/{agent_id}_{utc}.txt`
//!
//! The manager never deletes files; stale files are a tolerated footprint.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::StorageError;

pub fn metadata_path(data_dir: &Path, date: NaiveDate) -> PathBuf {
    data_dir
        .join("metadata")
        .join(date.format("%Y").to_string())
        .join(date.format("%m").to_string())
        .join(format!("{}.json", date.format("%d")))
}

/// Article body path. Date and time components come from the publication
/// timestamp rendered in the source timezone.
pub fn news_path(data_dir: &Path, published_at: &DateTime<Utc>, tz: Tz, id: i64) -> PathBuf {
    let local = published_at.with_timezone(&tz);
    data_dir
        .join("news")
        .join(local.format("%Y-%m-%d").to_string())
        .join(format!("{}-{}.md", local.format("%H-%M"), id))
}

pub fn summary_path(
    data_dir: &Path,
    published_at: &DateTime<Utc>,
    tz: Tz,
    id: i64,
    lang: &str,
) -> PathBuf {
    let local = published_at.with_timezone(&tz);
    data_dir
        .join("news")
        .join(local.format("%Y-%m-%d").to_string())
        .join(format!("{}-{}-sum.{}.txt", local.format("%H-%M"), id, lang))
}

pub fn raw_response_path(
    raw_dir: &Path,
    session_id: &str,
    agent_id: &str,
    at: &DateTime<Utc>,
) -> PathBuf {
    raw_dir.join(session_id).join(format!(
        "{}_{}.txt",
        agent_id,
        at.format("%Y-%m-%d_%H-%M-%S%.3f")
    ))
}

/// Creates parent directories as needed, then writes atomically: content
/// goes to a temporary file in the same directory which is renamed over the
/// target, so readers never observe a partial file.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
        path: parent.to_path_buf(),
        source: e,
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let tmp = parent.join(format!(".{}.tmp", file_name));

    std::fs::write(&tmp, content).map_err(|e| StorageError::WriteFile {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

pub fn read_to_string(path: &Path) -> Result<String, StorageError> {
    std::fs::read_to_string(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Costa_Rica;

    #[test]
    fn test_metadata_path_layout() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let path = metadata_path(Path::new("/data"), date);
        assert_eq!(path, PathBuf::from("/data/metadata/2024/06/01.json"));
    }

    #[test]
    fn test_news_path_uses_source_timezone() {
        // 16:15 UTC is 10:15 in Costa Rica (UTC-6, no DST).
        let published = Utc.with_ymd_and_hms(2024, 6, 1, 16, 15, 0).unwrap();
        let path = news_path(Path::new("/data"), &published, Costa_Rica, 42);
        assert_eq!(path, PathBuf::from("/data/news/2024-06-01/10-15-42.md"));
    }

    #[test]
    fn test_summary_path_layout() {
        let published = Utc.with_ymd_and_hms(2024, 6, 1, 16, 15, 0).unwrap();
        let path = summary_path(Path::new("/data"), &published, Costa_Rica, 42, "ru");
        assert_eq!(
            path,
            PathBuf::from("/data/news/2024-06-01/10-15-42-sum.ru.txt")
        );
    }

    #[test]
    fn test_write_atomic_creates_directories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let target = tmp.path().join("news").join("2024-06-01").join("a.md");
        write_atomic(&target, b"# hola\n").unwrap();
        assert_eq!(read_to_string(&target).unwrap(), "# hola\n");
        // No temp file left behind.
        let entries: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_write_atomic_overwrites_existing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let target = tmp.path().join("summary.txt");
        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();
        assert_eq!(read_to_string(&target).unwrap(), "second");
    }
}
