//! Assigns registry livetime to calendar days.
//!
//! A run that crosses midnight is split at the midnight instant so the two
//! day shares add up to the run's duration exactly. Runs crossing more than
//! one midnight, or stopping before they start, are reported and recorded
//! as unknown on their start day instead of being split.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::data::{DayRunLivetime, Livetime, RunRecord};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::types::{ConfigLabel, Seconds};

/// Result of allocating registry runs to days.
#[derive(Clone, Debug, Default)]
pub struct Allocation {
    pub livetime: DayRunLivetime,
    pub diagnostics: Diagnostics,
}

/// How one run's interval maps onto calendar days.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DaySplit {
    /// The whole interval lies inside one day.
    Single { day: NaiveDate, seconds: Seconds },
    /// The interval crosses exactly one midnight.
    Crossing {
        before_day: NaiveDate,
        before: Seconds,
        after_day: NaiveDate,
        after: Seconds,
    },
    /// The interval crosses more than one midnight.
    Overflow {
        start_day: NaiveDate,
        stop_day: NaiveDate,
    },
    /// The interval stops before it starts.
    Inverted,
}

/// Split `[start, stop)` at calendar-day boundaries.
pub fn split_interval(start: NaiveDateTime, stop: NaiveDateTime) -> DaySplit {
    if stop < start {
        return DaySplit::Inverted;
    }
    let start_day = start.date();
    let stop_day = stop.date();
    if start_day == stop_day {
        return DaySplit::Single {
            day: start_day,
            seconds: whole_seconds(start, stop),
        };
    }
    if start_day.checked_add_days(Days::new(1)) != Some(stop_day) {
        return DaySplit::Overflow {
            start_day,
            stop_day,
        };
    }
    let midnight = stop_day.and_time(chrono::NaiveTime::MIN);
    DaySplit::Crossing {
        before_day: start_day,
        before: whole_seconds(start, midnight),
        after_day: stop_day,
        after: whole_seconds(midnight, stop),
    }
}

fn whole_seconds(from: NaiveDateTime, to: NaiveDateTime) -> Seconds {
    (to - from).num_seconds().max(0) as Seconds
}

/// Allocate every mapped run's livetime to (configuration, day, run).
///
/// Unmapped runs are excluded and reported. Runs without a stop time are
/// recorded as `Livetime::Unknown` on their start day.
pub fn allocate<'a, I>(records: I) -> Allocation
where
    I: IntoIterator<Item = &'a RunRecord>,
{
    let mut allocation = Allocation::default();
    for record in records {
        let Some(configuration) = record.configuration.as_deref() else {
            allocation
                .diagnostics
                .record(Diagnostic::UnknownConfiguration {
                    run_id: record.run_id,
                });
            continue;
        };
        allocate_run(configuration, record, &mut allocation);
    }
    allocation
}

fn allocate_run(configuration: &str, record: &RunRecord, allocation: &mut Allocation) {
    let run_id = record.run_id;
    let start_day = record.start_day();
    let livetime = &mut allocation.livetime;

    let Some(stop) = record.stop else {
        livetime.insert(configuration, start_day, run_id, Livetime::Unknown);
        if record.quality.is_good() {
            allocation.diagnostics.record(Diagnostic::UnknownLivetime {
                configuration: configuration.to_string(),
                day: start_day,
                run_id,
            });
        }
        return;
    };

    match split_interval(record.start, stop) {
        DaySplit::Single { day, seconds } => {
            livetime.insert(configuration, day, run_id, Livetime::Known(seconds));
        }
        DaySplit::Crossing {
            before_day,
            before,
            after_day,
            after,
        } => {
            debug!(run_id, %before_day, before, %after_day, after, "splitting run at midnight");
            livetime.insert(configuration, before_day, run_id, Livetime::Known(before));
            livetime.insert(configuration, after_day, run_id, Livetime::Known(after));
        }
        DaySplit::Overflow {
            start_day,
            stop_day,
        } => {
            livetime.insert(configuration, start_day, run_id, Livetime::Unknown);
            allocation.diagnostics.record(Diagnostic::DayBoundaryOverflow {
                run_id,
                start_day,
                stop_day,
            });
        }
        DaySplit::Inverted => {
            livetime.insert(configuration, start_day, run_id, Livetime::Unknown);
            allocation
                .diagnostics
                .record(Diagnostic::InvertedInterval { run_id });
        }
    }
}

/// Detector up-time per configuration from successive run-start deltas.
///
/// Each run is credited with the time until the next run (in run-id order)
/// starts, so the estimate survives missing stop times. The gap before the
/// first run of a new configuration is credited to the previous
/// configuration; this edge inaccuracy is accepted. The last run has no
/// successor and contributes nothing. Unmapped runs are excluded.
pub fn total_livetimes(records: &[RunRecord]) -> BTreeMap<ConfigLabel, Seconds> {
    let mut totals: BTreeMap<ConfigLabel, Seconds> = BTreeMap::new();
    for record in records {
        if let Some(configuration) = &record.configuration {
            totals.entry(configuration.clone()).or_default();
        }
    }
    for pair in records.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        let Some(configuration) = &current.configuration else {
            continue;
        };
        let delta = whole_seconds(current.start, next.start);
        if let Some(total) = totals.get_mut(configuration) {
            *total = total.saturating_add(delta);
        }
    }
    totals
}

/// Successive-start up-time estimate for one configuration.
pub fn total_livetime(records: &[RunRecord], configuration: &str) -> Seconds {
    total_livetimes(records)
        .get(configuration)
        .copied()
        .unwrap_or(0)
}
