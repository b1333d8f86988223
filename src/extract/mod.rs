//! Streaming record extraction
//!
//! Turns a decoded registry XML member into a sequence of [`EntityRecord`]s.
//!
//! # Architecture
//!
//! ```text
//! bytes ──▶ decode_reader ──▶ TagTokenizer ──▶ EntityExtractor ──▶ Vec<EntityRecord>
//!            (windows-1251)    (quick-xml)       │
//!                                                ├─ ContextStack   (open ancestors)
//!                                                ├─ Schema         (dispatch rules)
//!                                                └─ RecordBuilder  (one per entity)
//! ```
//!
//! The active [`Registry`] selects one dispatch table for the whole run.
//! Handlers are plain functions over `(&mut RecordBuilder, &Attrs)`, so every
//! tag case can be tested without a tokenizer.
//!
//! [`EntityRecord`]: crate::types::EntityRecord

pub mod builder;
mod common;
pub mod context;
pub mod dictionaries;
pub mod dispatch;
pub mod egrip;
pub mod egrul;
pub mod extractor;
pub mod tokenizer;

pub use builder::{FounderDraft, RecordBuilder};
pub use context::ContextStack;
pub use dictionaries::UnknownStatusPolicy;
pub use dispatch::{Guard, Registry, Rule, Schema, TextRule};
pub use extractor::{EntityExtractor, ExtractorState};
pub use tokenizer::{decode_reader, encoding_for_label, Attrs, TagEvent, TagTokenizer};

use thiserror::Error;

/// Errors that abort extraction of the current member
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("<{tag}> is missing required attribute {attribute}")]
    MissingAttribute { tag: String, attribute: String },

    #[error("Invalid date for {field}: {value:?}")]
    InvalidDate { field: String, value: String },

    #[error("Record has no {0}")]
    MissingField(&'static str),
}

impl From<quick_xml::Error> for ExtractError {
    fn from(e: quick_xml::Error) -> Self {
        ExtractError::Xml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ExtractError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        ExtractError::Xml(e.to_string())
    }
}
