//! On-disk manifest of discovered flows plus discovery metadata.

use crate::flow::Flow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// JSON document persisted under the project's hidden state directory so a
/// later invocation can serve flows without re-scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowManifest {
    /// Manifest schema version
    pub version: u32,

    /// Discovered flows at the time of the scan
    pub flows: Vec<Flow>,

    /// When the scan producing this manifest completed
    pub scanned_at: DateTime<Utc>,

    /// Source files consulted by the scan, with their mtimes
    #[serde(default)]
    pub source_files: Vec<SourceFileRecord>,

    /// Non-fatal errors collected during the scan
    #[serde(default)]
    pub errors: Vec<String>,
}

impl FlowManifest {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(flows: Vec<Flow>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            flows,
            scanned_at: Utc::now(),
            source_files: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// One scanned source file and its modification time, used to decide whether
/// a manifest is still in sync with the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFileRecord {
    pub path: PathBuf,
    pub modified_at: DateTime<Utc>,
}
