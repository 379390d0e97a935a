//! Self-correcting rolling-average anomaly scan.
//!
//! The baseline is seeded from the first `warmup` rates. Each day is compared
//! against the current baseline; unflagged days fold into it with
//! `comp = (4 * comp + r) / 5`, flagged days never do. A day flagged while
//! still inside the seed window (`i < warmup - 1`) is also removed from the
//! seed sample and the seed statistic is recomputed, so an early outlier does
//! not bias the baseline for the rest of the series.
//!
//! The scan is strictly sequential within one series.

use chrono::NaiveDate;
use tracing::debug;

use crate::config::{ScanConfig, SeedStatistic};
use crate::constants::scan::{BASELINE_DIVISOR, BASELINE_WEIGHT};
use crate::data::{AnomalyKind, RateSeries, RateSource};
use crate::errors::StabilityError;
use crate::types::ConfigLabel;

/// Flagged days for one configuration and rate source, day-ordered per kind.
#[derive(Clone, Debug, PartialEq)]
pub struct AnomalyReport {
    pub configuration: ConfigLabel,
    pub source: RateSource,
    pub over: Vec<NaiveDate>,
    pub under: Vec<NaiveDate>,
}

impl AnomalyReport {
    pub fn flagged(&self, kind: AnomalyKind) -> &[NaiveDate] {
        match kind {
            AnomalyKind::Over => &self.over,
            AnomalyKind::Under => &self.under,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.over.is_empty() && self.under.is_empty()
    }
}

/// One step of the scan, for inspection and tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanStep {
    pub day: NaiveDate,
    pub rate: f64,
    /// Baseline the rate was compared against.
    pub baseline: f64,
    pub flag: Option<AnomalyKind>,
    /// True when this step removed its value from the seed sample.
    pub seed_corrected: bool,
}

/// Rolling-average outlier detector.
#[derive(Clone, Debug)]
pub struct AnomalyScanner {
    config: ScanConfig,
}

impl AnomalyScanner {
    /// Create a scanner, rejecting invalid thresholds or warm-up length.
    pub fn new(config: ScanConfig) -> Result<Self, StabilityError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Flag the series' over/under days.
    pub fn scan(&self, series: &RateSeries) -> AnomalyReport {
        let mut report = AnomalyReport {
            configuration: series.configuration.clone(),
            source: series.source,
            over: Vec::new(),
            under: Vec::new(),
        };
        for step in self.trace(series) {
            match step.flag {
                Some(AnomalyKind::Over) => report.over.push(step.day),
                Some(AnomalyKind::Under) => report.under.push(step.day),
                None => {}
            }
        }
        debug!(
            configuration = %report.configuration,
            source = %report.source,
            days = series.len(),
            over = report.over.len(),
            under = report.under.len(),
            "scanned rate series"
        );
        report
    }

    /// Run the scan and return every step.
    pub fn trace(&self, series: &RateSeries) -> Vec<ScanStep> {
        let points = &series.points;
        let seed_len = self.config.warmup.min(points.len());
        // (series index, value) of the values still in the seed sample.
        let mut seed: Vec<(usize, f64)> = points[..seed_len]
            .iter()
            .enumerate()
            .map(|(idx, point)| (idx, point.rate))
            .collect();
        let Some(mut comp) = seed_value(&seed, self.config.seed) else {
            return Vec::new();
        };

        let mut steps = Vec::with_capacity(points.len());
        for (idx, point) in points.iter().enumerate() {
            let rate = point.rate;
            let baseline = comp;
            // A rate equal to the baseline is never flagged, even at comp = 0.
            let flag = if rate > comp && rate >= self.config.high * comp {
                Some(AnomalyKind::Over)
            } else if rate < comp && rate <= self.config.low * comp {
                Some(AnomalyKind::Under)
            } else {
                None
            };

            let mut seed_corrected = false;
            match flag {
                None => comp = (BASELINE_WEIGHT * comp + rate) / BASELINE_DIVISOR,
                Some(_) if idx + 1 < self.config.warmup => {
                    seed.retain(|(seed_idx, _)| *seed_idx != idx);
                    if let Some(corrected) = seed_value(&seed, self.config.seed) {
                        comp = corrected;
                        seed_corrected = true;
                    }
                }
                Some(_) => {}
            }

            steps.push(ScanStep {
                day: point.day,
                rate,
                baseline,
                flag,
                seed_corrected,
            });
        }
        steps
    }
}

fn seed_value(seed: &[(usize, f64)], statistic: SeedStatistic) -> Option<f64> {
    if seed.is_empty() {
        return None;
    }
    let mut values: Vec<f64> = seed.iter().map(|(_, value)| *value).collect();
    match statistic {
        SeedStatistic::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
        SeedStatistic::Median => {
            values.sort_by(f64::total_cmp);
            let mid = values.len() / 2;
            if values.len() % 2 == 0 {
                Some((values[mid - 1] + values[mid]) / 2.0)
            } else {
                Some(values[mid])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RatePoint;
    use chrono::Days;

    fn series(rates: &[f64]) -> RateSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let points = rates
            .iter()
            .enumerate()
            .map(|(idx, rate)| RatePoint {
                day: start.checked_add_days(Days::new(idx as u64)).unwrap(),
                rate: *rate,
            })
            .collect();
        RateSeries::new("IC86-2020", RateSource::Registry, points)
    }

    fn day(idx: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .checked_add_days(Days::new(idx))
            .unwrap()
    }

    fn scanner(seed: SeedStatistic) -> AnomalyScanner {
        AnomalyScanner::new(ScanConfig::default().with_seed(seed)).unwrap()
    }

    #[test]
    fn median_is_robust() {
        assert_eq!(seed_value(&[(0, 1.0), (1, 9.0), (2, 2.0)], SeedStatistic::Median), Some(2.0));
        assert_eq!(
            seed_value(&[(0, 1.0), (1, 3.0), (2, 2.0), (3, 4.0)], SeedStatistic::Median),
            Some(2.5)
        );
        assert_eq!(seed_value(&[], SeedStatistic::Mean), None);
    }

    #[test]
    fn constant_series_has_no_flags() {
        let report = scanner(SeedStatistic::Median).scan(&series(&[4.2; 30]));
        assert!(report.is_empty());
        let report = scanner(SeedStatistic::Mean).scan(&series(&[4.2; 30]));
        assert!(report.is_empty());
    }

    #[test]
    fn all_zero_series_has_no_flags() {
        for seed in [SeedStatistic::Median, SeedStatistic::Mean] {
            let scanner = scanner(seed);
            let report = scanner.scan(&series(&[0.0; 20]));
            assert!(report.is_empty(), "seed {seed:?}");
            assert!(
                scanner
                    .trace(&series(&[0.0; 20]))
                    .iter()
                    .all(|step| step.baseline == 0.0)
            );
        }
    }

    #[test]
    fn first_events_after_zero_baseline_are_over() {
        let mut rates = vec![0.0; 10];
        rates[8] = 0.5;
        let report = scanner(SeedStatistic::Median).scan(&series(&rates));
        assert_eq!(report.over, vec![day(8)]);
        assert!(report.under.is_empty());
    }

    #[test]
    fn empty_series_has_no_flags() {
        let report = scanner(SeedStatistic::Median).scan(&series(&[]));
        assert!(report.is_empty());
    }

    #[test]
    fn seed_window_spike_is_flagged_and_removed() {
        let mut rates = vec![1.0; 20];
        rates[2] = 2.0;
        let scanner = scanner(SeedStatistic::Median);
        let report = scanner.scan(&series(&rates));
        assert_eq!(report.over, vec![day(2)]);
        assert!(report.under.is_empty());

        let steps = scanner.trace(&series(&rates));
        assert!(steps[2].seed_corrected);
        assert!(steps[3..].iter().all(|step| (step.baseline - 1.0).abs() < 1e-12));
    }

    #[test]
    fn mean_seed_correction_recovers_the_baseline() {
        let mut rates = vec![1.0; 20];
        rates[2] = 3.0;
        let scanner = scanner(SeedStatistic::Mean);
        let steps = scanner.trace(&series(&rates));
        // Mean seed 9/7 puts the first two normal days below 0.95 * comp.
        assert_eq!(steps[0].flag, Some(AnomalyKind::Under));
        assert_eq!(steps[1].flag, Some(AnomalyKind::Under));
        assert_eq!(steps[2].flag, Some(AnomalyKind::Over));
        assert!(steps[..3].iter().all(|step| step.seed_corrected));
        assert!((steps[3].baseline - 1.0).abs() < 1e-12);
        assert!(steps[3..].iter().all(|step| step.flag.is_none()));

        let report = scanner.scan(&series(&rates));
        assert_eq!(report.under, vec![day(0), day(1)]);
        assert_eq!(report.over, vec![day(2)]);
    }

    #[test]
    fn correction_stops_at_the_end_of_the_seed_window() {
        let mut rates = vec![1.0; 12];
        rates[6] = 2.0;
        rates[9] = 0.5;
        let steps = scanner(SeedStatistic::Median).trace(&series(&rates));
        assert_eq!(steps[6].flag, Some(AnomalyKind::Over));
        assert!(!steps[6].seed_corrected);
        assert_eq!(steps[9].flag, Some(AnomalyKind::Under));
        assert!(!steps[9].seed_corrected);
        assert!((steps[7].baseline - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unflagged_days_fold_into_the_baseline() {
        let rates = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.04, 1.0];
        let steps = scanner(SeedStatistic::Median).trace(&series(&rates));
        assert!(steps.iter().all(|step| step.flag.is_none()));
        assert!((steps[8].baseline - (4.0 + 1.04) / 5.0).abs() < 1e-12);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let rates = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.05, 0.95];
        let steps = scanner(SeedStatistic::Median).trace(&series(&rates));
        assert_eq!(steps[7].flag, Some(AnomalyKind::Over));
        assert_eq!(steps[8].flag, Some(AnomalyKind::Under));
    }

    #[test]
    fn series_shorter_than_warmup_seeds_from_what_exists() {
        let steps = scanner(SeedStatistic::Median).trace(&series(&[2.0, 2.0, 2.0]));
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|step| step.flag.is_none()));
        assert_eq!(steps[0].baseline, 2.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(AnomalyScanner::new(ScanConfig::default().with_warmup(0)).is_err());
    }
}
