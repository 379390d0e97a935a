//! Merges registry livetime with the two extract sources into one ledger.
//!
//! The registry and extract totals for a day are reported side by side and
//! never combined. Missing counterparts stay missing: nothing here fabricates
//! a zero for a source that did not report.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::data::{
    DayRunLivetime, ExtractTable, LedgerDay, LedgerEntry, Livetime, MapTable, Quality, Rate,
    RatePoint, RateSeries, RateSource, RunId, UndefinedReason,
};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::types::ConfigLabel;

/// Reconciled day blocks for one configuration, in day order.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigLedger {
    pub configuration: ConfigLabel,
    pub days: Vec<LedgerDay>,
}

impl ConfigLedger {
    pub fn day(&self, day: NaiveDate) -> Option<&LedgerDay> {
        self.days
            .binary_search_by_key(&day, |block| block.day)
            .ok()
            .map(|idx| &self.days[idx])
    }

    /// Day-ordered defined rates for `source`; undefined days are skipped.
    pub fn rate_series(&self, source: RateSource) -> RateSeries {
        let points = self
            .days
            .iter()
            .filter_map(|block| {
                block.rate(source).value().map(|rate| RatePoint {
                    day: block.day,
                    rate,
                })
            })
            .collect();
        RateSeries::new(self.configuration.clone(), source, points)
    }

    /// Good-run registry livetime summed over every day the registry covers.
    pub fn registry_livetime(&self) -> Livetime {
        self.days
            .iter()
            .filter_map(|block| block.registry_livetime)
            .sum()
    }
}

/// Ledger plus the diagnostics raised while building it.
#[derive(Clone, Debug)]
pub struct Reconciliation {
    pub ledger: ConfigLedger,
    pub diagnostics: Diagnostics,
}

/// Inputs for one configuration.
#[derive(Clone, Copy, Debug)]
pub struct ReconcileInputs<'a> {
    pub day_run_livetime: &'a DayRunLivetime,
    pub run_extract: &'a ExtractTable,
    pub map_extract: &'a MapTable,
    pub bad_runs: &'a BTreeSet<RunId>,
}

/// Build the ledger for `configuration`.
///
/// Covers the union of days seen by the registry, the run extract and the
/// map extract. The registry-based rate needs registry, map and run-extract
/// data for the day; the extract-based rate needs run-extract data only.
pub fn reconcile(configuration: &str, inputs: ReconcileInputs<'_>) -> Reconciliation {
    let mut diagnostics = Diagnostics::new();
    let days: BTreeSet<NaiveDate> = inputs
        .day_run_livetime
        .days(configuration)
        .chain(inputs.run_extract.days())
        .chain(inputs.map_extract.days())
        .collect();

    let blocks: Vec<LedgerDay> = days
        .into_iter()
        .map(|day| reconcile_day(configuration, day, &inputs, &mut diagnostics))
        .collect();

    info!(
        configuration,
        days = blocks.len(),
        diagnostics = diagnostics.len(),
        "reconciled configuration"
    );
    Reconciliation {
        ledger: ConfigLedger {
            configuration: configuration.to_string(),
            days: blocks,
        },
        diagnostics,
    }
}

fn reconcile_day(
    configuration: &str,
    day: NaiveDate,
    inputs: &ReconcileInputs<'_>,
    diagnostics: &mut Diagnostics,
) -> LedgerDay {
    let registry_runs = inputs.day_run_livetime.runs_on(configuration, day);
    let extract_runs = inputs.run_extract.runs_on(day);
    let registry_livetime =
        inputs
            .day_run_livetime
            .good_livetime(configuration, day, inputs.bad_runs);
    let extract = inputs.run_extract.day_totals(day);
    let map_count = inputs.map_extract.get(day);

    if map_count.is_none() {
        diagnostics.record(Diagnostic::MissingMapCounts {
            configuration: configuration.to_string(),
            day,
        });
    }
    if registry_runs.is_none() {
        diagnostics.record(Diagnostic::MissingRegistryDay {
            configuration: configuration.to_string(),
            day,
        });
    }
    if extract.is_none() {
        diagnostics.record(Diagnostic::MissingExtractDay {
            configuration: configuration.to_string(),
            day,
        });
    }

    let registry_rate = match (map_count, registry_livetime, extract) {
        (Some(count), Some(livetime), Some(_)) => Rate::compute(count, livetime),
        _ => Rate::Undefined(UndefinedReason::MissingCounterpart),
    };
    let extract_rate = match extract {
        Some(totals) => Rate::compute(totals.event_count, Livetime::Known(totals.livetime)),
        None => Rate::Undefined(UndefinedReason::MissingCounterpart),
    };
    for (source, rate) in [
        (RateSource::Registry, registry_rate),
        (RateSource::Extract, extract_rate),
    ] {
        if matches!(
            rate,
            Rate::Undefined(UndefinedReason::ZeroLivetime | UndefinedReason::UnknownLivetime)
        ) {
            diagnostics.record(Diagnostic::UndefinedRate {
                configuration: configuration.to_string(),
                day,
                source,
            });
        }
    }

    let run_ids: BTreeSet<RunId> = registry_runs
        .into_iter()
        .flat_map(|runs| runs.keys())
        .chain(extract_runs.into_iter().flat_map(|runs| runs.keys()))
        .copied()
        .collect();

    let entries = run_ids
        .into_iter()
        .map(|run_id| {
            let extract = extract_runs.and_then(|runs| runs.get(&run_id)).copied();
            LedgerEntry {
                run_id,
                registry_livetime: registry_runs.and_then(|runs| runs.get(&run_id)).copied(),
                extract,
                quality: Quality::from_flag(!inputs.bad_runs.contains(&run_id)),
                rate: extract
                    .map(|totals| {
                        Rate::compute(totals.event_count, Livetime::Known(totals.livetime))
                    })
                    .unwrap_or(Rate::Undefined(UndefinedReason::MissingCounterpart)),
            }
        })
        .collect::<Vec<_>>();

    debug!(
        configuration,
        %day,
        runs = entries.len(),
        "reconciled day"
    );
    LedgerDay {
        day,
        registry_livetime,
        map_count,
        extract,
        registry_rate,
        extract_rate,
        entries,
    }
}
