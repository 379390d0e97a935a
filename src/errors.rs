use std::io;

use thiserror::Error;

use crate::types::{PathString, SourceId};

/// Error type for registry, extract-source, IO, and configuration failures.
///
/// Only structurally broken inputs become errors. Data gaps between sources
/// are reported as [`crate::diagnostics::Diagnostic`] values instead.
#[derive(Debug, Error)]
pub enum StabilityError {
    #[error("run registry '{path}' is malformed: {details}")]
    MalformedRegistry { path: PathString, details: String },
    #[error("source '{source_id}' is malformed at line {line}: {details}")]
    MalformedSource {
        source_id: SourceId,
        line: usize,
        details: String,
    },
    #[error("source '{source_id}' is unavailable: {reason}")]
    SourceUnavailable { source_id: SourceId, reason: String },
    #[error("invalid scan configuration: {0}")]
    InvalidScanConfig(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
