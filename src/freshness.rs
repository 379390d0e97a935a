//! Source-modification fingerprints.
//!
//! A fingerprint is the sorted set of `path : mtime` lines for the files that
//! feed one derived artifact. Capturing and persisting are separate steps on
//! one value, so the owner of an artifact does check-then-update itself and
//! no other thread interleaves on the same stored fingerprint.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use tracing::debug;

use crate::constants::discovery::FINGERPRINT_DELIMITER;
use crate::errors::StabilityError;
use crate::transport::fs::file_mtime;
use crate::types::PathString;

const MISSING_MTIME: &str = "missing";

/// Modification-time snapshot of a set of source files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceFingerprint {
    entries: BTreeMap<PathString, String>,
}

impl SourceFingerprint {
    /// Snapshot the current mtimes of `paths`.
    pub fn capture<P: AsRef<Path>>(paths: &[P]) -> Self {
        let entries = paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                let mtime = file_mtime(path)
                    .map(|time| time.to_rfc3339_opts(SecondsFormat::Nanos, true))
                    .unwrap_or_else(|| MISSING_MTIME.to_string());
                (path.display().to_string(), mtime)
            })
            .collect();
        Self { entries }
    }

    /// Parse the stored text form.
    pub fn parse(text: &str) -> Result<Self, StabilityError> {
        let mut entries = BTreeMap::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (path, mtime) = line.rsplit_once(FINGERPRINT_DELIMITER).ok_or_else(|| {
                StabilityError::MalformedSource {
                    source_id: "fingerprint".to_string(),
                    line: idx + 1,
                    details: format!("expected 'path{FINGERPRINT_DELIMITER}mtime'"),
                }
            })?;
            entries.insert(path.to_string(), mtime.trim().to_string());
        }
        Ok(Self { entries })
    }

    /// Read a stored fingerprint; `None` when nothing was stored yet.
    pub fn load(path: &Path) -> Result<Option<Self>, StabilityError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Store this fingerprint, replacing any previous one.
    pub fn persist(&self, path: &Path) -> Result<(), StabilityError> {
        fs::write(path, self.to_text())?;
        debug!(path = %path.display(), files = self.entries.len(), "stored source fingerprint");
        Ok(())
    }

    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(|(path, mtime)| format!("{path}{FINGERPRINT_DELIMITER}{mtime}\n"))
            .collect()
    }

    /// True when `stored` is absent or differs from this snapshot.
    pub fn is_stale_against(&self, stored: Option<&SourceFingerprint>) -> bool {
        stored != Some(self)
    }

    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.entries.keys().map(PathBuf::from)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
