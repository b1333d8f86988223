//! Progress tracking for archive ingestion

use super::source::{ArchiveSummary, ImportStats, ProgressReporter};
use crate::extract::ExtractError;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Progress tracker shared by all pool workers
pub struct ImportProgress {
    /// Progress bar over archives (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    start_time: Instant,
    archives_total: usize,
    archives_processed: AtomicUsize,
    archives_failed: AtomicUsize,
    members_processed: AtomicUsize,
    members_failed: AtomicUsize,
    records_written: AtomicUsize,
}

impl ImportProgress {
    pub fn new(archives_total: usize, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = ProgressBar::new(archives_total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} archives ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            archives_total,
            archives_processed: AtomicUsize::new(0),
            archives_failed: AtomicUsize::new(0),
            members_processed: AtomicUsize::new(0),
            members_failed: AtomicUsize::new(0),
            records_written: AtomicUsize::new(0),
        }
    }

    /// An archive that never produced a summary (crashed worker, sink error, ...)
    pub fn archive_failed(&self, archive: &Path, reason: &str) {
        self.archives_failed.fetch_add(1, Ordering::Relaxed);
        self.advance(archive);
        if let Some(ref pb) = self.progress_bar {
            pb.println(format!("FAILED {}: {}", archive.display(), reason));
        }
    }

    fn advance(&self, archive: &Path) {
        let processed = self.archives_processed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(ref pb) = self.progress_bar {
            pb.set_position(processed as u64);
            let name = archive
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            // Truncate on chars, not bytes
            let name = if name.chars().count() > 30 {
                format!("{}...", name.chars().take(27).collect::<String>())
            } else {
                name
            };
            pb.set_message(format!(
                "{:.0} records/s | {}",
                self.get_stats().records_per_second,
                name
            ));
        }
    }

    pub fn get_stats(&self) -> ImportStats {
        let mut stats = ImportStats {
            archives_total: self.archives_total,
            archives_processed: self.archives_processed.load(Ordering::Relaxed),
            archives_failed: self.archives_failed.load(Ordering::Relaxed),
            members_processed: self.members_processed.load(Ordering::Relaxed),
            members_failed: self.members_failed.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
            records_per_second: 0.0,
        };
        stats.update_rate();
        stats
    }

    pub fn abandon(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.abandon_with_message("Cancelled");
        }
    }

    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            let stats = self.get_stats();
            pb.finish_with_message(format!(
                "Done! {} records, {} failed archives, {:.0} records/s",
                stats.records_written, stats.archives_failed, stats.records_per_second
            ));
        }
    }

    pub fn print_summary(&self) {
        let stats = self.get_stats();

        println!("\nIngest Summary");
        println!("==============");
        println!("Archives processed: {}/{}", stats.archives_processed, stats.archives_total);
        println!("Archives failed:    {}", stats.archives_failed);
        println!("Members processed:  {}", stats.members_processed);
        println!("Members failed:     {}", stats.members_failed);
        println!("Records written:    {}", stats.records_written);
        println!("Elapsed time:       {:.1}s", stats.elapsed_seconds);
        println!("Processing rate:    {:.1} records/s", stats.records_per_second);
    }
}

impl ProgressReporter for ImportProgress {
    fn member_finished(&self, _archive: &Path, _member: &str, records: usize) {
        self.members_processed.fetch_add(1, Ordering::Relaxed);
        self.records_written.fetch_add(records, Ordering::Relaxed);
    }

    fn member_failed(&self, archive: &Path, member: &str, records: usize, error: &ExtractError) {
        self.members_processed.fetch_add(1, Ordering::Relaxed);
        self.members_failed.fetch_add(1, Ordering::Relaxed);
        self.records_written.fetch_add(records, Ordering::Relaxed);
        if let Some(ref pb) = self.progress_bar {
            pb.println(format!("{} / {}: {}", archive.display(), member, error));
        }
    }

    fn archive_finished(&self, summary: &ArchiveSummary) {
        self.advance(&summary.archive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracking() {
        let progress = ImportProgress::new(2, true);
        let archive = Path::new("input/egrul_1.zip");

        progress.member_finished(archive, "1.xml", 10);
        progress.member_failed(archive, "2.xml", 3, &ExtractError::MissingField("registration_date"));
        progress.member_finished(archive, "3.xml", 5);
        progress.archive_failed(Path::new("input/egrul_2.zip"), "worker crashed");

        let stats = progress.get_stats();
        assert_eq!(stats.archives_total, 2);
        assert_eq!(stats.archives_processed, 1);
        assert_eq!(stats.archives_failed, 1);
        assert_eq!(stats.members_processed, 3);
        assert_eq!(stats.members_failed, 1);
        assert_eq!(stats.records_written, 18);
    }
}
