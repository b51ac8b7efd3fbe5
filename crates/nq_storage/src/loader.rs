use anyhow::anyhow;
use nq_core::{ArticleStore, Error, Result, Row};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Inserted(usize),
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            FileOutcome::Inserted(n) => write!(f, "{}: inserted {} articles", self.path.display(), n),
            FileOutcome::Skipped(reason) => write!(f, "{}: skipped ({})", self.path.display(), reason),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub files: Vec<FileReport>,
}

impl LoadReport {
    pub fn inserted(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.outcome {
                FileOutcome::Inserted(n) => n,
                FileOutcome::Skipped(_) => 0,
            })
            .sum()
    }

    pub fn skipped(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Skipped(_)))
            .count()
    }
}

fn into_rows(values: Vec<Value>) -> Option<Vec<Row>> {
    values
        .into_iter()
        .map(|v| match v {
            Value::Object(row) => Some(row),
            _ => None,
        })
        .collect()
}

/// Parses one file's content into article rows.
///
/// The whole content is tried as one JSON value first: an array of objects is
/// a batch, any other value is the wrong shape. Content that is not a single
/// JSON value is read as one value per non-empty line, where a line may itself
/// hold an array. Returns `Ok(None)` when the JSON is valid but not made of
/// objects.
pub fn parse_batch(content: &str) -> Result<Option<Vec<Row>>> {
    if let Ok(value) = serde_json::from_str::<Value>(content) {
        return Ok(match value {
            Value::Array(items) => into_rows(items),
            _ => None,
        });
    }

    let mut values = Vec::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str(line)? {
            Value::Array(items) => values.extend(items),
            value => values.push(value),
        }
    }
    Ok(into_rows(values))
}

/// Loads a single file into the store.
pub async fn load_file(store: &dyn ArticleStore, path: &Path) -> Result<FileOutcome> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
    })?;
    let content = String::from_utf8(bytes)
        .map_err(|e| Error::External(anyhow!("{}: invalid UTF-8: {}", path.display(), e)))?;
    let rows = parse_batch(&content)
        .map_err(|e| Error::External(anyhow!("{}: invalid JSON: {}", path.display(), e)))?;

    match rows {
        Some(rows) if rows.is_empty() => Ok(FileOutcome::Inserted(0)),
        Some(rows) => Ok(FileOutcome::Inserted(store.insert_many(rows).await?)),
        None => Ok(FileOutcome::Skipped("not in the expected format".to_string())),
    }
}

/// Loads files in order. The first unreadable or malformed file aborts the
/// run; files loaded before it stay in the store.
pub async fn load_files(store: &dyn ArticleStore, paths: &[PathBuf]) -> Result<LoadReport> {
    let mut report = LoadReport::default();
    for path in paths {
        let outcome = load_file(store, path).await?;
        match &outcome {
            FileOutcome::Inserted(n) => info!(path = %path.display(), inserted = n, "loaded file"),
            FileOutcome::Skipped(reason) => warn!(path = %path.display(), "skipping file: {}", reason),
        }
        report.files.push(FileReport {
            path: path.clone(),
            outcome,
        });
    }
    info!(
        store = store.name(),
        inserted = report.inserted(),
        skipped = report.skipped(),
        "load finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file
    }

    #[test]
    fn test_parse_batch_array() {
        let rows = parse_batch(r#"  [{"postid": "1"}, {"postid": "2"}]"#).unwrap().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["postid"], "2");
    }

    #[test]
    fn test_parse_batch_lines() {
        let content = "{\"postid\": \"1\"}\n\n[{\"postid\": \"2\"}, {\"postid\": \"3\"}]\n";
        let rows = parse_batch(content).unwrap().unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_parse_batch_lines_of_arrays() {
        let content = "[{\"postid\": \"1\"}]\n[{\"postid\": \"2\"}]\n";
        let rows = parse_batch(content).unwrap().unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_parse_batch_wrong_shape() {
        assert!(parse_batch("[1, 2, 3]").unwrap().is_none());
        assert!(parse_batch("\"just a string\"").unwrap().is_none());
        assert!(parse_batch("{\"a\": 1}").unwrap().is_none());
        assert!(parse_batch("{\n  \"postid\": \"1\",\n  \"title\": \"x\"\n}\n").unwrap().is_none());
    }

    #[test]
    fn test_parse_batch_invalid_json() {
        assert!(parse_batch("[{\"postid\": ").is_err());
        assert!(parse_batch("{not json}").is_err());
    }

    #[tokio::test]
    async fn test_load_files() {
        let store = MemoryStorage::new();
        let good = write_file(br#"[{"postid": "1", "title": "One"}, {"postid": "2", "title": "Two"}]"#);
        let odd = write_file(b"[1, 2]");
        let empty = write_file(b"[]");
        let paths = vec![
            good.path().to_path_buf(),
            odd.path().to_path_buf(),
            empty.path().to_path_buf(),
        ];

        let report = load_files(&store, &paths).await.unwrap();
        assert_eq!(report.inserted(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.files[2].outcome, FileOutcome::Inserted(0));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_pretty_printed_object_is_skipped() {
        let store = MemoryStorage::new();
        let first = write_file(br#"[{"postid": "1"}]"#);
        let single = write_file(b"{\n  \"postid\": \"2\",\n  \"title\": \"Alone\"\n}\n");
        let last = write_file(br#"[{"postid": "3"}]"#);
        let paths = vec![
            first.path().to_path_buf(),
            single.path().to_path_buf(),
            last.path().to_path_buf(),
        ];

        let report = load_files(&store, &paths).await.unwrap();
        assert_eq!(report.inserted(), 2);
        assert_eq!(report.skipped(), 1);
        assert!(matches!(report.files[1].outcome, FileOutcome::Skipped(_)));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_load_files_aborts_without_rollback() {
        let store = MemoryStorage::new();
        let good = write_file(br#"[{"postid": "1"}]"#);
        let broken = write_file(b"[{\"postid\": ");
        let never = write_file(br#"[{"postid": "3"}]"#);
        let paths = vec![
            good.path().to_path_buf(),
            broken.path().to_path_buf(),
            never.path().to_path_buf(),
        ];

        assert!(load_files(&store, &paths).await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let store = MemoryStorage::new();
        let dir = tempfile::tempdir().unwrap();
        let result = load_files(&store, &[dir.path().join("missing.json")]).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_utf8() {
        let store = MemoryStorage::new();
        let file = write_file(&[0x5b, 0xff, 0xfe, 0x5d]);
        let result = load_file(&store, file.path()).await;
        assert!(result.is_err());
    }
}
