//! egrul-ingest: Streaming ingestion of the EGRUL/EGRIP business registries
//!
//! Converts the registry's zipped windows-1251 XML dumps into typed entity
//! records, featuring:
//! - A tag-context-aware extractor driven by per-registry dispatch tables
//! - A bounded worker pool with crash replacement and exactly-once callbacks
//! - Batched persistence into an embedded sled store
//! - Link-list generation for sitemap builders

pub mod config;
pub mod extract;
pub mod import;
pub mod links;
pub mod pool;
pub mod store;
pub mod types;

pub use config::Config;
pub use types::*;
