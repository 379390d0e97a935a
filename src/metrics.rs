use std::collections::BTreeMap;

use crate::allocator::{allocate, total_livetimes};
use crate::data::{Livetime, RunRecord};
use crate::types::{ConfigLabel, Seconds};

/// Good-run livetime against estimated detector up-time for one configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct LivetimeCoverage {
    pub configuration: ConfigLabel,
    /// Registry livetime of good runs with a known stop time.
    pub good_seconds: Seconds,
    /// Good runs whose livetime is unknown and therefore not in `good_seconds`.
    pub unknown_runs: usize,
    /// Successive-start up-time estimate.
    pub total_seconds: Seconds,
}

impl LivetimeCoverage {
    /// `good / total`, or `None` when the total is zero.
    pub fn fraction(&self) -> Option<f64> {
        if self.total_seconds == 0 {
            return None;
        }
        Some(self.good_seconds as f64 / self.total_seconds as f64)
    }
}

/// Compute coverage for every mapped configuration in `records`.
///
/// `records` must be sorted by run id (as `RunRegistry::records` is). Bad
/// runs are excluded from the good livetime; unmapped runs appear nowhere.
pub fn livetime_coverage(records: &[RunRecord]) -> Vec<LivetimeCoverage> {
    let good: Vec<&RunRecord> = records
        .iter()
        .filter(|record| record.quality.is_good())
        .collect();
    let allocation = allocate(good.iter().copied());

    let mut per_configuration: BTreeMap<ConfigLabel, (Seconds, usize)> = BTreeMap::new();
    for configuration in allocation.livetime.configurations() {
        let mut good_seconds: Seconds = 0;
        let mut unknown_runs = 0usize;
        for day in allocation.livetime.days(configuration) {
            let Some(runs) = allocation.livetime.runs_on(configuration, day) else {
                continue;
            };
            for livetime in runs.values() {
                match livetime {
                    Livetime::Known(seconds) => good_seconds = good_seconds.saturating_add(*seconds),
                    Livetime::Unknown => unknown_runs += 1,
                }
            }
        }
        per_configuration.insert(configuration.to_string(), (good_seconds, unknown_runs));
    }

    total_livetimes(records)
        .into_iter()
        .map(|(configuration, total_seconds)| {
            let (good_seconds, unknown_runs) = per_configuration
                .get(&configuration)
                .copied()
                .unwrap_or((0, 0));
            LivetimeCoverage {
                configuration,
                good_seconds,
                unknown_runs,
                total_seconds,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Quality;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn run(run_id: u32, start: NaiveDateTime, stop: Option<NaiveDateTime>, quality: Quality) -> RunRecord {
        RunRecord {
            run_id,
            configuration: Some("IC86-2020".to_string()),
            start,
            stop,
            quality,
        }
    }

    #[test]
    fn coverage_excludes_bad_runs_and_counts_unknowns() {
        let records = vec![
            run(1, at(1, 0), Some(at(1, 6)), Quality::Good),
            run(2, at(1, 8), Some(at(1, 12)), Quality::Bad),
            run(3, at(1, 12), None, Quality::Good),
            run(4, at(1, 16), Some(at(1, 20)), Quality::Good),
        ];
        let coverage = livetime_coverage(&records);
        assert_eq!(coverage.len(), 1);
        let cfg = &coverage[0];
        assert_eq!(cfg.good_seconds, 10 * 3600);
        assert_eq!(cfg.unknown_runs, 1);
        assert_eq!(cfg.total_seconds, 16 * 3600);
        let fraction = cfg.fraction().unwrap();
        assert!((fraction - 10.0 / 16.0).abs() < 1e-12);
    }

    #[test]
    fn zero_total_has_no_fraction() {
        let records = vec![run(1, at(1, 0), Some(at(1, 6)), Quality::Good)];
        let coverage = livetime_coverage(&records);
        assert_eq!(coverage[0].total_seconds, 0);
        assert_eq!(coverage[0].fraction(), None);
    }
}
