//! Link-list files
//!
//! Writes one URL per stored entity (`{hostname}{inn}-{kpp}/`) into numbered
//! text files of a fixed number of lines, for sitemap generation downstream.

use crate::config::LinksConfig;
use crate::store::{EntityStore, LinkKey};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Counts from one [`LinksWriter::write_all`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinksSummary {
    pub files: usize,
    pub links: usize,
    /// Entities without a tax id
    pub skipped: usize,
}

pub struct LinksWriter {
    base: Url,
    output_dir: PathBuf,
    file_size: usize,
}

impl LinksWriter {
    pub fn new(config: &LinksConfig) -> Result<Self> {
        Self::with_output(&config.hostname, &config.output_dir, config.file_size)
    }

    pub fn with_output(hostname: &str, output_dir: &Path, file_size: usize) -> Result<Self> {
        // Without a trailing slash Url::join would replace the last path segment
        let hostname = if hostname.ends_with('/') {
            hostname.to_string()
        } else {
            format!("{}/", hostname)
        };
        let base = Url::parse(&hostname)
            .with_context(|| format!("Invalid links hostname '{}'", hostname))?;
        anyhow::ensure!(file_size > 0, "links file_size must be positive");

        Ok(Self {
            base,
            output_dir: output_dir.to_path_buf(),
            file_size,
        })
    }

    /// URL for one entity; `None` when it has no tax id
    pub fn link_for(&self, key: &LinkKey) -> Result<Option<Url>> {
        let Some(inn) = key.inn.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let pathname = match key.kpp.as_deref().filter(|s| !s.is_empty()) {
            Some(kpp) => format!("{}-{}/", inn, kpp),
            None => format!("{}/", inn),
        };
        Ok(Some(self.base.join(&pathname)?))
    }

    /// Write links for every entity in the store
    pub fn write_all(&self, store: &EntityStore) -> Result<LinksSummary> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create links folder '{}'", self.output_dir.display())
        })?;

        let mut summary = LinksSummary::default();
        let mut batch: Vec<String> = Vec::with_capacity(self.file_size);

        for key in store.link_keys() {
            let key = key.context("Failed to read link key")?;
            match self.link_for(&key)? {
                Some(url) => batch.push(url.into()),
                None => {
                    summary.skipped += 1;
                    continue;
                }
            }
            if batch.len() == self.file_size {
                self.save_batch(&mut summary, &mut batch)?;
            }
        }
        if !batch.is_empty() {
            self.save_batch(&mut summary, &mut batch)?;
        }

        info!(
            "Wrote {} links into {} files in {}",
            summary.links,
            summary.files,
            self.output_dir.display()
        );
        Ok(summary)
    }

    fn save_batch(&self, summary: &mut LinksSummary, batch: &mut Vec<String>) -> Result<()> {
        let path = self
            .output_dir
            .join(format!("links-batch-{}.txt", summary.files + 1));
        fs::write(&path, batch.join("\n"))
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        debug!("Wrote {} links to {}", batch.len(), path.display());

        summary.files += 1;
        summary.links += batch.len();
        batch.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(inn: Option<&str>, kpp: Option<&str>) -> LinkKey {
        LinkKey {
            inn: inn.map(str::to_string),
            kpp: kpp.map(str::to_string),
        }
    }

    #[test]
    fn test_link_shapes() {
        let temp_dir = TempDir::new().unwrap();
        let writer = LinksWriter::with_output("https://example.org/company", temp_dir.path(), 10)
            .unwrap();

        assert_eq!(
            writer
                .link_for(&key(Some("7701234567"), Some("770101001")))
                .unwrap()
                .unwrap()
                .as_str(),
            "https://example.org/company/7701234567-770101001/"
        );
        assert_eq!(
            writer
                .link_for(&key(Some("770000000011"), None))
                .unwrap()
                .unwrap()
                .as_str(),
            "https://example.org/company/770000000011/"
        );
        assert!(writer.link_for(&key(None, Some("770101001"))).unwrap().is_none());
    }

    #[test]
    fn test_rejects_zero_file_size() {
        assert!(LinksWriter::with_output("https://example.org/", Path::new("links"), 0).is_err());
    }
}
