//! Registry archive reader and per-archive processing
//!
//! An archive is a `.zip` holding many XML members, or a single `.xml` /
//! `.xml.bz2` document. Members are decoded from the registry's legacy encoding
//! and streamed through a fresh [`EntityExtractor`] each.

use super::source::{
    ArchiveError, ArchiveSummary, CancelFlag, MemberFailure, ProgressReporter, RecordSink,
};
use crate::config::Config;
use crate::extract::{
    decode_reader, EntityExtractor, ExtractError, Registry, TagEvent, TagTokenizer,
    UnknownStatusPolicy,
};
use crate::types::EntityRecord;
use bzip2::read::BzDecoder;
use encoding_rs::{Encoding, WINDOWS_1251};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Container format of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Bzip2,
    Plain,
}

impl ArchiveFormat {
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".bz2") {
            Some(Self::Bzip2)
        } else if name.ends_with(".xml") {
            Some(Self::Plain)
        } else {
            None
        }
    }
}

enum Container {
    Zip(ZipArchive<File>),
    Bzip2,
    Plain,
}

/// Lists the XML members of one input file and opens them one at a time
pub struct ArchiveReader {
    path: PathBuf,
    container: Container,
    /// (name, zip index)
    members: Vec<(String, usize)>,
}

impl ArchiveReader {
    /// Open `path`; zip entries are kept when their name ends in `.{member_extension}`
    pub fn open(path: impl AsRef<Path>, member_extension: &str) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();
        let format = ArchiveFormat::detect(&path)
            .ok_or_else(|| ArchiveError::UnsupportedFormat(path.clone()))?;

        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let (container, members) = match format {
            ArchiveFormat::Zip => {
                let mut archive = ZipArchive::new(File::open(&path)?)?;
                let suffix = format!(".{}", member_extension.trim_start_matches('.').to_lowercase());
                let mut members = Vec::new();
                for index in 0..archive.len() {
                    let entry = archive.by_index_raw(index)?;
                    if entry.is_dir() || !entry.name().to_lowercase().ends_with(&suffix) {
                        continue;
                    }
                    members.push((entry.name().to_string(), index));
                }
                (Container::Zip(archive), members)
            }
            ArchiveFormat::Bzip2 => {
                File::open(&path)?;
                (Container::Bzip2, vec![(file_name, 0)])
            }
            ArchiveFormat::Plain => {
                File::open(&path)?;
                (Container::Plain, vec![(file_name, 0)])
            }
        };

        Ok(Self {
            path,
            container,
            members,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member names in archive order
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(name, _)| name.as_str())
    }

    /// Raw (still encoded) byte stream of the `n`th member
    pub fn open_member(&mut self, n: usize) -> Result<Box<dyn Read + '_>, ArchiveError> {
        let index = self
            .members
            .get(n)
            .map(|(_, index)| *index)
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, format!("no member #{}", n))
            })?;

        match self.container {
            Container::Zip(ref mut archive) => Ok(Box::new(archive.by_index(index)?)),
            Container::Bzip2 => {
                let file = File::open(&self.path)?;
                Ok(Box::new(BzDecoder::new(BufReader::new(file))))
            }
            Container::Plain => Ok(Box::new(File::open(&self.path)?)),
        }
    }
}

/// What happened to one member
#[derive(Debug)]
struct MemberOutcome {
    records: usize,
    error: Option<ExtractError>,
    abandoned: Option<String>,
}

/// Turns one archive into stored records.
///
/// Members are processed strictly one after another; only the pool runs
/// archives in parallel.
#[derive(Debug, Clone)]
pub struct ArchiveProcessor {
    registry: Registry,
    encoding: &'static Encoding,
    status_policy: UnknownStatusPolicy,
    member_extension: String,
    batch_size: usize,
}

impl ArchiveProcessor {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            encoding: WINDOWS_1251,
            status_policy: UnknownStatusPolicy::default(),
            member_extension: "xml".to_string(),
            batch_size: 1000,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(config.registry.kind)
            .with_encoding(config.encoding()?)
            .with_status_policy(config.registry.unknown_status)
            .with_member_extension(&config.input.member_extension)
            .with_batch_size(config.store.batch_size))
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_status_policy(mut self, policy: UnknownStatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    pub fn with_member_extension(mut self, extension: &str) -> Self {
        self.member_extension = extension.to_string();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn registry(&self) -> Registry {
        self.registry
    }

    /// Process every member of `path`.
    ///
    /// Extraction errors are contained to their member; sink errors abort the
    /// archive.
    pub fn process<S>(
        &self,
        path: &Path,
        sink: &mut S,
        progress: &dyn ProgressReporter,
        cancel: &CancelFlag,
    ) -> Result<ArchiveSummary, ArchiveError>
    where
        S: RecordSink + ?Sized,
    {
        let mut reader = ArchiveReader::open(path, &self.member_extension)?;
        let mut summary = ArchiveSummary::new(path);
        info!(
            "Processing {} ({} members, {})",
            path.display(),
            reader.len(),
            self.registry
        );

        for n in 0..reader.len() {
            if cancel.is_cancelled() {
                info!("Cancelled before member #{} of {}", n, path.display());
                summary.cancelled = true;
                break;
            }

            let name = reader.members[n].0.clone();
            let outcome = match reader.open_member(n) {
                Ok(member) => self.process_member(member, &mut *sink)?,
                Err(e) => MemberOutcome {
                    records: 0,
                    error: Some(ExtractError::Io(std::io::Error::other(e.to_string()))),
                    abandoned: None,
                },
            };

            summary.members += 1;
            summary.records += outcome.records;

            match outcome.error {
                None => {
                    debug!("{}: {} records", name, outcome.records);
                    progress.member_finished(path, &name, outcome.records);
                }
                Some(error) => {
                    warn!(
                        "Member {} of {} failed after {} records: {}",
                        name,
                        path.display(),
                        outcome.records,
                        error
                    );
                    if let Some(ref number) = outcome.abandoned {
                        warn!("Dropped incomplete record {} from {}", number, name);
                    }
                    progress.member_failed(path, &name, outcome.records, &error);
                    summary.failed_members.push(MemberFailure {
                        member: name,
                        error: error.to_string(),
                        abandoned: outcome.abandoned,
                    });
                }
            }
        }

        info!(
            "Finished {}: {} records, {} failed members",
            path.display(),
            summary.records,
            summary.failed_members.len()
        );
        progress.archive_finished(&summary);
        Ok(summary)
    }

    fn process_member<S>(&self, member: impl Read, sink: &mut S) -> Result<MemberOutcome, ArchiveError>
    where
        S: RecordSink + ?Sized,
    {
        let mut extractor = EntityExtractor::new(self.registry).with_status_policy(self.status_policy);
        let mut tokenizer = TagTokenizer::new(decode_reader(member, self.encoding));
        let mut pending: Vec<EntityRecord> = Vec::with_capacity(self.batch_size);
        let mut written = 0;

        let error = loop {
            let event = match tokenizer.next_event() {
                Ok(event) => event,
                Err(e) => break Some(e),
            };
            let end = event == TagEvent::End;
            if let Err(e) = extractor.feed(event) {
                break Some(e);
            }
            pending.append(&mut extractor.take_records());
            if pending.len() >= self.batch_size {
                written += self.write(&mut *sink, &mut pending)?;
            }
            if end {
                break None;
            }
        };

        let abandoned = match error {
            Some(_) => extractor.abandon(),
            None => None,
        };
        pending.append(&mut extractor.take_records());
        written += self.write(&mut *sink, &mut pending)?;

        Ok(MemberOutcome {
            records: written,
            error,
            abandoned,
        })
    }

    fn write<S>(&self, sink: &mut S, pending: &mut Vec<EntityRecord>) -> Result<usize, ArchiveError>
    where
        S: RecordSink + ?Sized,
    {
        for batch in pending.chunks(self.batch_size) {
            sink.write_batch(batch)?;
        }
        let count = pending.len();
        pending.clear();
        Ok(count)
    }
}
