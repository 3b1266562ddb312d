use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::info;

use crate::error::LoadError;
use crate::models::RawRow;

static EXPORT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2})(\d{2})\.csv$").expect("export name pattern is valid")
});

const UTF8_BOM: char = '\u{feff}';

/// Where one load reads from.
#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub export: PathBuf,
    pub roster: Option<PathBuf>,
    pub offline: Option<PathBuf>,
}

impl SourcePaths {
    /// Uses the newest dated export in `dir`.
    pub fn in_dir(
        dir: &Path,
        roster: Option<PathBuf>,
        offline: Option<PathBuf>,
    ) -> Result<Self, LoadError> {
        Ok(Self {
            export: latest_export(dir)?,
            roster,
            offline,
        })
    }
}

/// Raw contents of every source, read but not yet interpreted.
#[derive(Debug, Clone)]
pub struct Sources {
    pub file_name: String,
    pub last_update: NaiveDateTime,
    pub export: Vec<RawRow>,
    pub roster: Vec<RawRow>,
    pub offline: Vec<RawRow>,
}

/// Exports are named `YYYY-MM-DDThhmm.csv`, so the lexicographically last
/// name is the newest.
pub fn latest_export(dir: &Path) -> Result<PathBuf, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|e| LoadError::io(dir, e))?;

    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| LoadError::io(dir, e))?;
        if let Some(name) = entry.file_name().to_str() {
            if EXPORT_NAME.is_match(name) {
                names.push(name.to_string());
            }
        }
    }

    names
        .into_iter()
        .max()
        .map(|name| dir.join(name))
        .ok_or_else(|| LoadError::NoExport(dir.to_path_buf()))
}

pub fn parse_timestamp(file_name: &str) -> Result<NaiveDateTime, LoadError> {
    let bad = || LoadError::BadTimestamp(file_name.to_string());
    let caps = EXPORT_NAME.captures(file_name).ok_or_else(bad)?;
    let part = |i: usize| caps[i].parse::<u32>().map_err(|_| bad());

    let year = caps[1].parse::<i32>().map_err(|_| bad())?;
    NaiveDate::from_ymd_opt(year, part(2)?, part(3)?)
        .and_then(|date| date.and_hms_opt(part(4).ok()?, part(5).ok()?, 0))
        .ok_or_else(bad)
}

/// Reads a headed CSV into rows keyed by header. Short or ragged rows are
/// kept; missing trailing cells are simply absent.
pub fn read_rows(text: &str) -> Result<Vec<RawRow>, LoadError> {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let fields = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(RawRow { line, fields });
    }

    Ok(rows)
}

async fn read_text(path: &Path) -> Result<String, LoadError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoadError::io(path, e))
}

async fn read_optional(path: Option<&Path>) -> Result<Option<String>, LoadError> {
    match path {
        Some(path) => read_text(path).await.map(Some),
        None => Ok(None),
    }
}

/// Reads the export, roster and offline ledger concurrently. The three are
/// merged by key later, so arrival order does not matter.
pub async fn read_sources(paths: &SourcePaths) -> Result<Sources, LoadError> {
    let file_name = paths
        .export
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let last_update = parse_timestamp(&file_name)?;

    let (export, roster, offline) = tokio::try_join!(
        read_text(&paths.export),
        read_optional(paths.roster.as_deref()),
        read_optional(paths.offline.as_deref()),
    )?;

    let sources = Sources {
        export: read_rows(&export)?,
        roster: roster.as_deref().map(read_rows).transpose()?.unwrap_or_default(),
        offline: offline.as_deref().map(read_rows).transpose()?.unwrap_or_default(),
        file_name,
        last_update,
    };
    info!(
        file = %sources.file_name,
        rows = sources.export.len(),
        roster_rows = sources.roster.len(),
        offline_rows = sources.offline.len(),
        "read sources"
    );
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CLASS_NAME, FIRST_NAME, MINUTE_COUNT};

    #[test]
    fn parses_export_timestamps() {
        let stamp = parse_timestamp("2025-03-14T0930.csv").unwrap();
        assert_eq!(stamp.to_string(), "2025-03-14 09:30:00");
    }

    #[test]
    fn rejects_impossible_timestamps() {
        assert!(matches!(
            parse_timestamp("2025-02-30T0930.csv"),
            Err(LoadError::BadTimestamp(_))
        ));
        assert!(matches!(
            parse_timestamp("2025-03-14T2575.csv"),
            Err(LoadError::BadTimestamp(_))
        ));
        assert!(matches!(
            parse_timestamp("donors.csv"),
            Err(LoadError::BadTimestamp(_))
        ));
    }

    #[test]
    fn picks_latest_dated_export() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "2025-03-01T0800.csv",
            "2025-03-14T0930.csv",
            "2025-03-14T0815.csv",
            "roster.csv",
            "zzz.csv",
        ] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let latest = latest_export(dir.path()).unwrap();
        assert_eq!(latest, dir.path().join("2025-03-14T0930.csv"));
    }

    #[test]
    fn missing_export_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("roster.csv"), "").unwrap();
        assert!(matches!(
            latest_export(dir.path()),
            Err(LoadError::NoExport(_))
        ));
    }

    #[test]
    fn reads_rows_by_header() {
        let text = "\u{feff}First Name,Class Name,Minute Count\nJane,1MonkeyCAR,10\n\"Total\",,\nBo\n";
        let rows = read_rows(text).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].get(FIRST_NAME), Some("Jane"));
        assert_eq!(rows[0].get(CLASS_NAME), Some("1MonkeyCAR"));
        assert_eq!(rows[0].get(MINUTE_COUNT), Some("10"));
        assert_eq!(rows[1].get(FIRST_NAME), Some("Total"));
        assert_eq!(rows[2].get(CLASS_NAME), None);
        assert!(!rows[2].has_column(CLASS_NAME));
    }

    #[tokio::test]
    async fn reads_optional_sources_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("2025-03-14T0930.csv");
        let roster = dir.path().join("roster.csv");
        std::fs::write(&export, "First Name,Class Name\nJane,1MonkeyCAR\n").unwrap();
        std::fs::write(&roster, "First Name,Last Name,Class Name\nJane,Doe,1TigerCAR\n").unwrap();

        let paths = SourcePaths::in_dir(dir.path(), Some(roster), None).unwrap();
        let sources = read_sources(&paths).await.unwrap();

        assert_eq!(sources.file_name, "2025-03-14T0930.csv");
        assert_eq!(sources.export.len(), 1);
        assert_eq!(sources.roster.len(), 1);
        assert!(sources.offline.is_empty());
    }

    #[tokio::test]
    async fn unreadable_roster_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2025-03-14T0930.csv"), "First Name\n").unwrap();

        let paths =
            SourcePaths::in_dir(dir.path(), Some(dir.path().join("missing.csv")), None).unwrap();
        assert!(matches!(
            read_sources(&paths).await,
            Err(LoadError::Io { .. })
        ));
    }
}
