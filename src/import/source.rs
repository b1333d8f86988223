//! Core types and traits for archive ingestion

use crate::extract::ExtractError;
use crate::store::{EntityStore, StoreError};
use crate::types::EntityRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that abort a whole archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Store error: {0}")]
    Sink(#[from] StoreError),
}

/// Destination of extracted records
pub trait RecordSink {
    fn write_batch(&mut self, records: &[EntityRecord]) -> Result<(), StoreError>;
}

impl RecordSink for EntityStore {
    fn write_batch(&mut self, records: &[EntityRecord]) -> Result<(), StoreError> {
        EntityStore::write_batch(self, records).map(|_| ())
    }
}

/// Collects records in memory
impl RecordSink for Vec<EntityRecord> {
    fn write_batch(&mut self, records: &[EntityRecord]) -> Result<(), StoreError> {
        self.extend_from_slice(records);
        Ok(())
    }
}

/// Receives per-member and per-archive progress.
///
/// Implementations are shared between pool workers, so every method takes `&self`.
pub trait ProgressReporter: Send + Sync {
    fn member_finished(&self, _archive: &Path, _member: &str, _records: usize) {}

    /// `records` were completed and written before the member failed
    fn member_failed(&self, _archive: &Path, _member: &str, _records: usize, _error: &ExtractError) {
    }

    fn archive_finished(&self, _summary: &ArchiveSummary) {}
}

/// Reporter that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {}

/// Shared cancellation flag, checked between archive members
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A member that failed extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberFailure {
    pub member: String,
    pub error: String,
    /// Registration number of the in-flight record dropped with the member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandoned: Option<String>,
}

/// Outcome of one archive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub archive: PathBuf,
    /// Members attempted, failed ones included
    pub members: usize,
    pub records: usize,
    pub failed_members: Vec<MemberFailure>,
    /// Stopped early because the run was cancelled
    pub cancelled: bool,
}

impl ArchiveSummary {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed_members.is_empty() && !self.cancelled
    }
}

/// Run-wide statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub archives_total: usize,
    pub archives_processed: usize,
    pub archives_failed: usize,
    pub members_processed: usize,
    pub members_failed: usize,
    pub records_written: usize,
    pub elapsed_seconds: f64,
    pub records_per_second: f64,
}

impl ImportStats {
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.records_per_second = self.records_written as f64 / self.elapsed_seconds;
        }
    }
}
