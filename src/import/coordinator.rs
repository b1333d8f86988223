//! Enrichment run coordinator
//!
//! Scans the input folder, fans archives out over the [`WorkerPool`] and
//! collects their summaries into a [`RunReport`].

use super::archive::ArchiveProcessor;
use super::progress::ImportProgress;
use super::scan::scan_archives;
use super::source::{ArchiveError, ArchiveSummary, CancelFlag, ImportStats, ProgressReporter};
use crate::config::Config;
use crate::extract::Registry;
use crate::pool::{Worker, WorkerError, WorkerFactory, WorkerId, WorkerPool};
use crate::store::EntityStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// File name of the run report inside the data dir
pub const RUN_REPORT_FILE: &str = "run-report.json";

/// Processes whole archives on a pool thread
pub struct ArchiveWorker {
    id: WorkerId,
    processor: ArchiveProcessor,
    store: EntityStore,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancelFlag,
}

impl Worker for ArchiveWorker {
    type Task = PathBuf;
    type Output = ArchiveSummary;

    fn run(&mut self, archive: &PathBuf) -> Result<ArchiveSummary, WorkerError> {
        debug!("Worker {} takes {}", self.id, archive.display());
        let result = self.processor.process(
            archive,
            &mut self.store,
            self.progress.as_ref(),
            &self.cancel,
        );
        match result {
            Ok(summary) => Ok(summary),
            // A failing store is not going to recover for the next archive either
            Err(ArchiveError::Sink(e)) => Err(WorkerError::Fatal(format!(
                "store write failed for {}: {}",
                archive.display(),
                e
            ))),
            Err(e) => Err(WorkerError::Task(format!("{}: {}", archive.display(), e))),
        }
    }
}

/// Hands every new worker its own processor and store handle
pub struct ArchiveWorkerFactory {
    processor: ArchiveProcessor,
    store: EntityStore,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancelFlag,
}

impl ArchiveWorkerFactory {
    pub fn new(
        processor: ArchiveProcessor,
        store: EntityStore,
        progress: Arc<dyn ProgressReporter>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            processor,
            store,
            progress,
            cancel,
        }
    }
}

impl WorkerFactory for ArchiveWorkerFactory {
    type Worker = ArchiveWorker;

    fn start(&self, id: WorkerId) -> Result<ArchiveWorker, WorkerError> {
        Ok(ArchiveWorker {
            id,
            processor: self.processor.clone(),
            store: self.store.clone(),
            progress: self.progress.clone(),
            cancel: self.cancel.clone(),
        })
    }
}

/// An archive that produced no summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedArchive {
    pub archive: PathBuf,
    pub reason: String,
}

/// Outcome of one enrichment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub registry: Registry,
    pub input_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    /// Completed archives, in completion order
    pub archives: Vec<ArchiveSummary>,
    pub failed_archives: Vec<FailedArchive>,
    pub stats: ImportStats,
}

impl RunReport {
    pub fn new(registry: Registry, input_dir: &Path) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            registry,
            input_dir: input_dir.to_path_buf(),
            started_at: Utc::now(),
            finished_at: None,
            cancelled: false,
            archives: Vec::new(),
            failed_archives: Vec::new(),
            stats: ImportStats::default(),
        }
    }

    pub fn records(&self) -> usize {
        self.archives.iter().map(|a| a.records).sum()
    }

    pub fn failed_members(&self) -> usize {
        self.archives.iter().map(|a| a.failed_members.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed_archives.is_empty() && self.archives.iter().all(|a| a.is_clean())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run report '{}'", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run report '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Runs one enrichment pass over an input folder
pub struct EnrichCoordinator {
    config: Config,
    cancel: CancelFlag,
    quiet: bool,
    handle_ctrl_c: bool,
}

impl EnrichCoordinator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancelFlag::new(),
            quiet: false,
            handle_ctrl_c: true,
        }
    }

    /// Set quiet mode (no progress output)
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Whether Ctrl-C cancels the run (on by default)
    pub fn with_ctrl_c(mut self, enabled: bool) -> Self {
        self.handle_ctrl_c = enabled;
        self
    }

    /// Flag that stops the run between archive members
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Ingest every archive in `input_dir` and write the run report.
    ///
    /// Individual archive failures end up in the report; only setup and
    /// report-writing problems are returned as errors.
    pub async fn run(&self, input_dir: &Path) -> Result<RunReport> {
        let mut report = RunReport::new(self.config.registry.kind, input_dir);
        let archives = scan_archives(input_dir)
            .with_context(|| format!("Failed to scan '{}'", input_dir.display()))?;
        info!(
            "Run {}: {} {} archives in {}",
            report.run_id,
            archives.len(),
            self.config.registry.kind,
            input_dir.display()
        );

        let data_dir = &self.config.store.data_dir;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir '{}'", data_dir.display()))?;
        let store = EntityStore::open(data_dir)
            .with_context(|| format!("Failed to open store in '{}'", data_dir.display()))?;
        if self.config.store.drop_existing {
            store.clear().context("Failed to clear store")?;
        }

        let processor = ArchiveProcessor::from_config(&self.config)?;
        let progress = Arc::new(ImportProgress::new(archives.len(), self.quiet));
        let factory = ArchiveWorkerFactory::new(
            processor,
            store.clone(),
            progress.clone(),
            self.cancel.clone(),
        );
        let pool = WorkerPool::new(&self.config.pool, factory);
        info!("Started pool with {} workers", pool.size());

        let ctrl_c = self.handle_ctrl_c.then(|| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, finishing current members");
                    cancel.cancel();
                }
            })
        });

        let mut pending: FuturesUnordered<_> = archives
            .into_iter()
            .map(|archive| {
                let task = pool.submit(archive.clone());
                async move { (archive, task.await) }
            })
            .collect();

        while let Some((archive, result)) = pending.next().await {
            match result {
                Ok(summary) => {
                    report.cancelled |= summary.cancelled;
                    report.archives.push(summary);
                }
                Err(e) => {
                    error!("Archive {} failed: {}", archive.display(), e);
                    progress.archive_failed(&archive, &e.to_string());
                    report.failed_archives.push(FailedArchive {
                        archive,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let pool_stats = pool.stats().await;
        if pool_stats.replaced > 0 {
            warn!("{} workers were replaced during the run", pool_stats.replaced);
        }
        pool.shutdown().await;
        if let Some(handle) = ctrl_c {
            handle.abort();
        }

        store.flush().context("Failed to flush store")?;

        report.cancelled |= self.cancel.is_cancelled();
        if report.cancelled {
            progress.abandon();
        } else {
            progress.finish();
        }
        if !self.quiet {
            progress.print_summary();
        }

        report.stats = progress.get_stats();
        report.finished_at = Some(Utc::now());
        report.save(&data_dir.join(RUN_REPORT_FILE))?;
        info!(
            "Run {} finished: {} records, {} failed archives, {} failed members",
            report.run_id,
            report.records(),
            report.failed_archives.len(),
            report.failed_members()
        );

        Ok(report)
    }
}
