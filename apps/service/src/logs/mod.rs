//! Per-check audit logs.
//!
//! Every evaluation appends one JSON line to `{dir}/{check_id}.log`. Rotation
//! moves a live log into `{dir}/{check_id}-{timestamp}.gz.b64` and empties it.
//! All mutation of one stream goes through that stream's lock, so appends,
//! rotation and truncation never interleave on the same file.

pub mod archive;
pub mod rotation;

pub use archive::{decode_archive, encode_archive};
pub use rotation::{LogRotation, RotationReport};

use dashmap::DashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::monitoring::types::EvaluationLogEntry;

const LOG_SUFFIX: &str = ".log";
const ARCHIVE_SUFFIX: &str = ".gz.b64";

#[derive(Debug, Error)]
pub enum AuditLogError {
    #[error("Log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not serialize log entry: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Archive content is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid log stream name '{0}'")]
    InvalidStreamId(String),

    #[error("Archive '{0}' already exists")]
    ArchiveExists(String),
}

/// What happened to a stream during rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRotation {
    /// Contents archived and the live log emptied
    Archived { bytes: u64 },
    /// Nothing to archive
    Empty,
}

/// Append-only writer for the per-check log streams
pub struct AuditLog {
    dir: PathBuf,
    streams: DashMap<String, Arc<Mutex<()>>>,
}

impl AuditLog {
    /// Open the log directory, creating it if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AuditLogError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir, streams: DashMap::new() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one evaluation record to the check's stream
    pub async fn append_entry(&self, entry: &EvaluationLogEntry) -> Result<(), AuditLogError> {
        let line = serde_json::to_string(entry)?;
        self.append(&entry.check.id, &line).await
    }

    /// Append `line` plus a newline, creating the stream on first write
    pub async fn append(&self, id: &str, line: &str) -> Result<(), AuditLogError> {
        let path = self.log_path(id)?;
        let lock = self.stream_lock(id);
        let _guard = lock.lock().await;

        let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Current contents of a live stream; a stream never written to is empty
    pub async fn read(&self, id: &str) -> Result<String, AuditLogError> {
        let path = self.log_path(id)?;
        let lock = self.stream_lock(id);
        let _guard = lock.lock().await;

        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of the live streams, plus archive ids when `include_archives` is set
    pub async fn list(&self, include_archives: bool) -> Result<Vec<String>, AuditLogError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            if let Some(id) = file_name.strip_suffix(LOG_SUFFIX) {
                names.push(id.to_string());
            } else if let Some(archive_id) = file_name.strip_suffix(ARCHIVE_SUFFIX) {
                if include_archives {
                    names.push(archive_id.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Write the live stream's contents into a new archive without touching the stream
    pub async fn compress(&self, id: &str, archive_id: &str) -> Result<u64, AuditLogError> {
        let lock = self.stream_lock(id);
        let _guard = lock.lock().await;

        let contents = fs::read(self.log_path(id)?).await?;
        self.write_archive(archive_id, &contents).await?;
        Ok(contents.len() as u64)
    }

    /// Decoded contents of an archive
    pub async fn decompress(&self, archive_id: &str) -> Result<String, AuditLogError> {
        let text = fs::read_to_string(self.archive_path(archive_id)?).await?;
        let data = decode_archive(&text)?;
        Ok(String::from_utf8(data)?)
    }

    /// Empty a live stream
    pub async fn truncate(&self, id: &str) -> Result<(), AuditLogError> {
        let path = self.log_path(id)?;
        let lock = self.stream_lock(id);
        let _guard = lock.lock().await;

        truncate_file(&path).await
    }

    /// Archive and empty one stream while holding its lock
    ///
    /// The live log is only truncated after the archive has been synced to
    /// disk; any failure before that leaves the live log as it was.
    pub async fn rotate(&self, id: &str, archive_id: &str) -> Result<StreamRotation, AuditLogError> {
        let path = self.log_path(id)?;
        let lock = self.stream_lock(id);
        let rotated = {
            let _guard = lock.lock().await;
            self.rotate_locked(&path, archive_id).await
        };
        drop(lock);

        self.release_stream_lock(id);
        rotated
    }

    async fn rotate_locked(&self, path: &Path, archive_id: &str) -> Result<StreamRotation, AuditLogError> {
        let contents = fs::read(path).await?;
        if contents.is_empty() {
            return Ok(StreamRotation::Empty);
        }

        self.write_archive(archive_id, &contents).await?;
        truncate_file(path).await?;

        Ok(StreamRotation::Archived { bytes: contents.len() as u64 })
    }

    async fn write_archive(&self, archive_id: &str, contents: &[u8]) -> Result<(), AuditLogError> {
        let path = self.archive_path(archive_id)?;
        let encoded = encode_archive(contents)?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AuditLogError::ArchiveExists(archive_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        // The archive only counts once both its data and its directory entry are on disk
        let written = async {
            file.write_all(encoded.as_bytes()).await?;
            file.sync_all().await?;
            sync_dir(&self.dir).await
        }
        .await;

        if let Err(e) = written {
            // A half-written archive would block the next attempt with the same name
            if let Err(cleanup) = fs::remove_file(&path).await {
                tracing::warn!(archive = archive_id, error = %cleanup, "Failed to remove partial archive");
            }
            return Err(e.into());
        }

        Ok(())
    }

    fn stream_lock(&self, id: &str) -> Arc<Mutex<()>> {
        Arc::clone(&self.streams.entry(id.to_string()).or_default())
    }

    /// Forget a stream's lock if nobody else is holding or waiting on it
    fn release_stream_lock(&self, id: &str) {
        self.streams.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn log_path(&self, id: &str) -> Result<PathBuf, AuditLogError> {
        validate_stream_id(id)?;
        Ok(self.dir.join(format!("{id}{LOG_SUFFIX}")))
    }

    fn archive_path(&self, archive_id: &str) -> Result<PathBuf, AuditLogError> {
        validate_stream_id(archive_id)?;
        Ok(self.dir.join(format!("{archive_id}{ARCHIVE_SUFFIX}")))
    }
}

async fn truncate_file(path: &Path) -> Result<(), AuditLogError> {
    let file = OpenOptions::new().write(true).open(path).await?;
    file.set_len(0).await?;
    file.sync_all().await?;
    Ok(())
}

async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

/// Stream names become file names, so they must stay inside the log directory
fn validate_stream_id(id: &str) -> Result<(), AuditLogError> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && !id.contains(['/', '\\', '\0']);
    if valid { Ok(()) } else { Err(AuditLogError::InvalidStreamId(id.to_string())) }
}
