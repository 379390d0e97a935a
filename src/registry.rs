//! Good-run-list loading.
//!
//! The registry is the authoritative source of run intervals and quality
//! flags. Rows are validated against a typed schema; a missing run id, start
//! time, or quality flag fails the whole load, while a missing stop time is
//! kept as an explicit unknown.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::DateWindow;
use crate::data::{Quality, RunRecord};
use crate::errors::StabilityError;
use crate::source::date_helpers::parse_registry_timestamp;
use crate::types::{ConfigLabel, RunId, SourceId};

#[derive(Deserialize)]
struct RegistryDocument {
    runs: Option<Vec<RegistryRow>>,
}

#[derive(Deserialize)]
struct RegistryRow {
    run: Option<RunId>,
    good_i3: Option<bool>,
    good_tstart: Option<String>,
    good_tstop: Option<String>,
}

/// Run id to configuration label mapping (`{"118175": "IC86-2011"}`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunConfigMap {
    runs: HashMap<RunId, ConfigLabel>,
}

impl RunConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the mapping from a JSON file.
    pub fn load(path: &Path) -> Result<Self, StabilityError> {
        let text = fs::read_to_string(path).map_err(|err| StabilityError::SourceUnavailable {
            source_id: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_json_str(path.display().to_string(), &text)
    }

    /// Parse the mapping from JSON text; every key must be an integer run id.
    pub fn from_json_str(source_id: impl Into<SourceId>, json: &str) -> Result<Self, StabilityError> {
        let source_id = source_id.into();
        let raw: HashMap<String, ConfigLabel> =
            serde_json::from_str(json).map_err(|err| StabilityError::MalformedSource {
                source_id: source_id.clone(),
                line: err.line(),
                details: err.to_string(),
            })?;
        let mut runs = HashMap::with_capacity(raw.len());
        for (key, configuration) in raw {
            let run_id = key
                .trim()
                .parse::<RunId>()
                .map_err(|_| StabilityError::MalformedSource {
                    source_id: source_id.clone(),
                    line: 0,
                    details: format!("run key '{key}' is not an integer"),
                })?;
            runs.insert(run_id, configuration);
        }
        Ok(Self { runs })
    }

    /// Add or replace one mapping.
    pub fn insert(&mut self, run_id: RunId, configuration: impl Into<ConfigLabel>) {
        self.runs.insert(run_id, configuration.into());
    }

    pub fn get(&self, run_id: RunId) -> Option<&str> {
        self.runs.get(&run_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl<S: Into<ConfigLabel>> FromIterator<(RunId, S)> for RunConfigMap {
    fn from_iter<I: IntoIterator<Item = (RunId, S)>>(iter: I) -> Self {
        Self {
            runs: iter
                .into_iter()
                .map(|(run_id, configuration)| (run_id, configuration.into()))
                .collect(),
        }
    }
}

/// Validated good run list, sorted by run id and restricted to a date window.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunRegistry {
    records: Vec<RunRecord>,
}

impl RunRegistry {
    /// Build a registry from already-validated records.
    pub fn from_records(mut records: Vec<RunRecord>) -> Self {
        records.sort_by_key(|record| record.run_id);
        Self { records }
    }

    /// Load and validate a registry JSON file.
    pub fn load(
        path: &Path,
        run_configs: &RunConfigMap,
        window: &DateWindow,
    ) -> Result<Self, StabilityError> {
        info!(path = %path.display(), "loading run registry");
        let text = fs::read_to_string(path).map_err(|err| StabilityError::SourceUnavailable {
            source_id: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_json_str(&path.display().to_string(), &text, run_configs, window)
    }

    /// Parse and validate registry JSON text.
    ///
    /// `label` names the input in error messages.
    pub fn from_json_str(
        label: &str,
        json: &str,
        run_configs: &RunConfigMap,
        window: &DateWindow,
    ) -> Result<Self, StabilityError> {
        let malformed = |details: String| StabilityError::MalformedRegistry {
            path: label.to_string(),
            details,
        };
        let document: RegistryDocument =
            serde_json::from_str(json).map_err(|err| malformed(err.to_string()))?;
        let rows = document
            .runs
            .ok_or_else(|| malformed("missing top-level 'runs' list".to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        let mut outside_window = 0usize;
        for (index, row) in rows.into_iter().enumerate() {
            let run_id = row
                .run
                .ok_or_else(|| malformed(format!("row {index} has no 'run'")))?;
            let good = row
                .good_i3
                .ok_or_else(|| malformed(format!("run {run_id} has no 'good_i3'")))?;
            let start_raw = row
                .good_tstart
                .ok_or_else(|| malformed(format!("run {run_id} has no 'good_tstart'")))?;
            let start = parse_registry_timestamp(&start_raw).ok_or_else(|| {
                malformed(format!("run {run_id} has unparsable good_tstart '{start_raw}'"))
            })?;
            let stop = match row.good_tstop.as_deref().map(str::trim) {
                None => None,
                Some(raw) if raw.eq_ignore_ascii_case("null") => None,
                Some(raw) => Some(parse_registry_timestamp(raw).ok_or_else(|| {
                    malformed(format!("run {run_id} has unparsable good_tstop '{raw}'"))
                })?),
            };

            if !window.contains(start.date()) {
                outside_window += 1;
                continue;
            }

            let configuration = run_configs.get(run_id).map(str::to_string);
            if configuration.is_none() {
                debug!(run_id, "run has no configuration mapping");
            }
            records.push(RunRecord {
                run_id,
                configuration,
                start,
                stop,
                quality: Quality::from_flag(good),
            });
        }

        debug!(
            kept = records.len(),
            outside_window, "registry rows filtered by window"
        );
        Ok(Self::from_records(records))
    }

    /// All records in run-id order.
    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn get(&self, run_id: RunId) -> Option<&RunRecord> {
        self.records
            .binary_search_by_key(&run_id, |record| record.run_id)
            .ok()
            .map(|idx| &self.records[idx])
    }

    /// Records mapped to `configuration`, in run-id order.
    pub fn runs_for(&self, configuration: &str) -> Vec<&RunRecord> {
        self.records
            .iter()
            .filter(|record| record.configuration.as_deref() == Some(configuration))
            .collect()
    }

    /// Bad runs mapped to `configuration`.
    pub fn bad_runs(&self, configuration: &str) -> BTreeSet<RunId> {
        self.runs_for(configuration)
            .into_iter()
            .filter(|record| !record.quality.is_good())
            .map(|record| record.run_id)
            .collect()
    }

    /// Every bad run, mapped or not.
    pub fn all_bad_runs(&self) -> BTreeSet<RunId> {
        self.records
            .iter()
            .filter(|record| !record.quality.is_good())
            .map(|record| record.run_id)
            .collect()
    }

    /// Configurations with at least one mapped run.
    pub fn configurations(&self) -> BTreeSet<ConfigLabel> {
        self.records
            .iter()
            .filter_map(|record| record.configuration.clone())
            .collect()
    }

    /// Runs without a configuration mapping.
    pub fn unmapped_runs(&self) -> impl Iterator<Item = RunId> + '_ {
        self.records
            .iter()
            .filter(|record| record.configuration.is_none())
            .map(|record| record.run_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
