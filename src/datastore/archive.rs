use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};

use crate::error::IngestionError;

/// One line of the raw event archive
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawEventRecord {
    pub id: u64,
    pub created_at: String,
    pub path: String,
    pub payload: String,
}

struct ArchiveWriter {
    writer: csv::Writer<File>,
    next_id: u64,
}

/// Append-only, tab separated log of every request received from the node
pub struct TsvArchive {
    path: PathBuf,
    inner: Mutex<ArchiveWriter>,
}

impl TsvArchive {
    pub fn open(path: &Path) -> Result<TsvArchive, IngestionError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    IngestionError::Storage(format!(
                        "unable to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        let next_id = match path.exists() {
            true => TsvArchive::read_records(path)?
                .last()
                .map(|record| record.id + 1)
                .unwrap_or(1),
            false => 1,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                IngestionError::Storage(format!("unable to open {}: {}", path.display(), e))
            })?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .from_writer(file);
        Ok(TsvArchive {
            path: path.to_path_buf(),
            inner: Mutex::new(ArchiveWriter { writer, next_id }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a record and flushes it, returning its id
    pub fn append(&self, path: &str, payload: &str) -> Result<u64, IngestionError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| IngestionError::Storage(format!("archive lock poisoned: {}", e)))?;
        let record = RawEventRecord {
            id: inner.next_id,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            path: path.to_string(),
            payload: payload.to_string(),
        };
        inner
            .writer
            .serialize(&record)
            .map_err(|e| IngestionError::Storage(format!("unable to archive event: {}", e)))?;
        inner
            .writer
            .flush()
            .map_err(|e| IngestionError::Storage(format!("unable to flush archive: {}", e)))?;
        inner.next_id += 1;
        Ok(record.id)
    }

    pub fn read_records(path: &Path) -> Result<Vec<RawEventRecord>, IngestionError> {
        let mut reader = csv::ReaderBuilder::default()
            .has_headers(false)
            .delimiter(b'\t')
            .buffer_capacity(8 * (1 << 10))
            .from_path(path)
            .map_err(|e| {
                IngestionError::Storage(format!("unable to read {}: {}", path.display(), e))
            })?;
        let mut records = vec![];
        for result in reader.deserialize() {
            let record: RawEventRecord = result
                .map_err(|e| IngestionError::Storage(format!("corrupted archive: {}", e)))?;
            records.push(record);
        }
        Ok(records)
    }
}
