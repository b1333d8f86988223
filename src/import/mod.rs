//! Bulk ingestion of registry archives
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        EnrichCoordinator                            │
//! │            (scan folder, run report, Ctrl-C cancellation)           │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │ one task per archive
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    WorkerPool<ArchiveWorkerFactory>                 │
//! └─────────────────────────────────────────────────────────────────────┘
//!          │                        │                        │
//!          ▼                        ▼                        ▼
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │ ArchiveWorker   │    │ ArchiveWorker   │    │ ArchiveWorker   │
//! │ - zip members   │    │      ...        │    │      ...        │
//! │ - cp1251 decode │    │                 │    │                 │
//! │ - extractor     │    │                 │    │                 │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//!                                    │ batches
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       EntityStore (sled)                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod archive;
pub mod coordinator;
pub mod progress;
pub mod scan;
pub mod source;

pub use archive::{ArchiveFormat, ArchiveProcessor, ArchiveReader};
pub use coordinator::{
    ArchiveWorker, ArchiveWorkerFactory, EnrichCoordinator, FailedArchive, RunReport,
    RUN_REPORT_FILE,
};
pub use progress::ImportProgress;
pub use scan::scan_archives;
pub use source::{
    ArchiveError, ArchiveSummary, CancelFlag, ImportStats, MemberFailure, ProgressReporter,
    RecordSink, SilentProgress,
};
