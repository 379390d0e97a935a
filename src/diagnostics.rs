//! Recoverable data conditions reported alongside results.
//!
//! None of these stop processing. Each is logged once with `tracing::warn!`
//! when recorded through [`Diagnostics::record`].

use std::fmt;

use chrono::NaiveDate;
use tracing::warn;

use crate::data::RateSource;
use crate::types::{ConfigLabel, RunId, SourceId};

/// A recoverable condition found while loading or reconciling sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// A registry run has no configuration mapping and is excluded from totals.
    UnknownConfiguration { run_id: RunId },
    /// A good run has no stop time; its livetime is unknown.
    UnknownLivetime {
        configuration: ConfigLabel,
        day: NaiveDate,
        run_id: RunId,
    },
    /// A run crosses more than one midnight and was not split.
    DayBoundaryOverflow {
        run_id: RunId,
        start_day: NaiveDate,
        stop_day: NaiveDate,
    },
    /// A run stops before it starts and was not allocated.
    InvertedInterval { run_id: RunId },
    /// No map counts for a day that other sources cover.
    MissingMapCounts {
        configuration: ConfigLabel,
        day: NaiveDate,
    },
    /// A day covered by extracts is absent from the registry.
    MissingRegistryDay {
        configuration: ConfigLabel,
        day: NaiveDate,
    },
    /// A registry day has no run-extract data.
    MissingExtractDay {
        configuration: ConfigLabel,
        day: NaiveDate,
    },
    /// A rate could not be computed and is excluded from the scan.
    UndefinedRate {
        configuration: ConfigLabel,
        day: NaiveDate,
        source: RateSource,
    },
    /// A map source reported the same day twice.
    DuplicateMapDay {
        source_id: SourceId,
        day: NaiveDate,
    },
    /// A whole source was skipped because it failed to load.
    SourceSkipped { source_id: SourceId, reason: String },
    /// A configuration was skipped because it has no registry runs.
    ConfigurationSkipped {
        configuration: ConfigLabel,
        reason: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownConfiguration { run_id } => {
                write!(f, "run {run_id} has no configuration mapping")
            }
            Diagnostic::UnknownLivetime {
                configuration,
                day,
                run_id,
            } => write!(
                f,
                "run {run_id} on {day} ({configuration}) has no stop time; livetime unknown"
            ),
            Diagnostic::DayBoundaryOverflow {
                run_id,
                start_day,
                stop_day,
            } => write!(
                f,
                "run {run_id} spans {start_day} to {stop_day}; more than one day boundary"
            ),
            Diagnostic::InvertedInterval { run_id } => {
                write!(f, "run {run_id} stops before it starts")
            }
            Diagnostic::MissingMapCounts { configuration, day } => {
                write!(f, "{day} ({configuration}) has no map counts")
            }
            Diagnostic::MissingRegistryDay { configuration, day } => {
                write!(f, "{day} ({configuration}) has no registry runs")
            }
            Diagnostic::MissingExtractDay { configuration, day } => {
                write!(f, "{day} ({configuration}) has no run-extract data")
            }
            Diagnostic::UndefinedRate {
                configuration,
                day,
                source,
            } => write!(f, "{day} ({configuration}) has an undefined {source} rate"),
            Diagnostic::DuplicateMapDay { source_id, day } => {
                write!(f, "map source '{source_id}' reports {day} more than once")
            }
            Diagnostic::SourceSkipped { source_id, reason } => {
                write!(f, "skipping source '{source_id}': {reason}")
            }
            Diagnostic::ConfigurationSkipped {
                configuration,
                reason,
            } => write!(f, "skipping configuration {configuration}: {reason}"),
        }
    }
}

/// Ordered collection of diagnostics for one unit of work.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and keep a diagnostic.
    pub fn record(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when any recorded diagnostic satisfies `predicate`.
    pub fn any(&self, predicate: impl Fn(&Diagnostic) -> bool) -> bool {
        self.items.iter().any(predicate)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
