//! Registry selection and input configuration

use crate::extract::{Registry, UnknownStatusPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which registry is ingested and how its members are decoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Dispatch table for the whole run
    #[serde(default)]
    pub kind: Registry,
    /// Legacy 8-bit encoding of the XML members
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Treatment of status codes missing from the status table
    #[serde(default)]
    pub unknown_status: UnknownStatusPolicy,
}

fn default_encoding() -> String {
    "windows-1251".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            kind: Registry::default(),
            encoding: default_encoding(),
            unknown_status: UnknownStatusPolicy::default(),
        }
    }
}

/// Where the archives come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Folder scanned for `*.zip` archives
    #[serde(default = "default_input_dir")]
    pub dir: PathBuf,
    /// Extension of XML members inside an archive
    #[serde(default = "default_member_extension")]
    pub member_extension: String,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}

fn default_member_extension() -> String {
    "xml".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: default_input_dir(),
            member_extension: default_member_extension(),
        }
    }
}
