//! The append-only log of scraped listings, keyed by URL.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::formats::RawListingRecord;

/// Records in scrape order. A URL appears at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordLog {
    records: Vec<RawListingRecord>,
    urls: HashSet<String>,
}

impl RecordLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a log from previously persisted records. Later duplicates of a
    /// URL are dropped.
    pub fn from_records(records: Vec<RawListingRecord>) -> Self {
        let mut log = Self::new();
        for record in records {
            log.push(record);
        }
        log
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Appends `record` unless its URL is already logged. Returns whether it
    /// was added.
    pub fn push(&mut self, record: RawListingRecord) -> bool {
        if !self.urls.insert(record.url.clone()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[RawListingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<RawListingRecord> {
        self.records
    }
}

/// Where the log goes after every new record.
pub trait RecordSink: Send {
    fn persist(&mut self, records: &[RawListingRecord]) -> anyhow::Result<()>;
}

/// Rewrites the whole log as a pretty JSON array. The write goes through a
/// temporary file and a rename, so a crash leaves the previous version.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonFileSink {
    fn persist(&mut self, records: &[RawListingRecord]) -> anyhow::Result<()> {
        write_json_atomic(&self.path, records)
    }
}

/// Collects every persisted snapshot. Lets tests observe write order without
/// a filesystem.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub snapshots: Vec<Vec<RawListingRecord>>,
}

impl RecordSink for MemorySink {
    fn persist(&mut self, records: &[RawListingRecord]) -> anyhow::Result<()> {
        self.snapshots.push(records.to_vec());
        Ok(())
    }
}

/// Loads the persisted log. A missing file is an empty log; so is a file
/// that cannot be read or is not a JSON array, after a warning. Entries that
/// are not valid records are skipped one by one.
pub fn load_record_log(path: &Path) -> RecordLog {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return RecordLog::new(),
        Err(err) => {
            tracing::warn!(path = %path.display(), ?err, "record log unreadable; starting empty");
            return RecordLog::new();
        }
    };

    let entries = match serde_json::from_slice::<Vec<serde_json::Value>>(&bytes) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(path = %path.display(), ?err, "record log corrupt; starting empty");
            return RecordLog::new();
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<RawListingRecord>(entry) {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::warn!(path = %path.display(), index, ?err, "skipping malformed record");
            }
        }
    }
    let log = RecordLog::from_records(records);
    tracing::info!(path = %path.display(), records = log.len(), "loaded record log");
    log
}

fn write_json_atomic<T: serde::Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    std::fs::write(&tmp_path, &data)
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
