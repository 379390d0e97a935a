use chrono::NaiveDate;

use crate::constants::registry::{DEFAULT_WINDOW_END, DEFAULT_WINDOW_START};
use crate::constants::scan::{DEFAULT_HIGH, DEFAULT_LOW, DEFAULT_WARMUP};
use crate::errors::StabilityError;
use crate::source::date_helpers::day_as_int;
use crate::types::{ConfigLabel, DayInt};

/// Calendar-date window `[start, end)` bounding which registry rows participate.
///
/// Bounds are `YYYYMMDD` integers and membership is tested on the run's start
/// day with integer comparison, so no timezone is involved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
    /// Inclusive first day, or unbounded.
    pub start: Option<DayInt>,
    /// Exclusive last day, or unbounded.
    pub end: Option<DayInt>,
}

impl DateWindow {
    /// Window with both bounds set.
    pub fn new(start: DayInt, end: DayInt) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Window that admits every day.
    pub fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// True when `day` falls inside `[start, end)`.
    pub fn contains(&self, day: NaiveDate) -> bool {
        let day = day_as_int(day);
        if let Some(start) = self.start
            && day < start
        {
            return false;
        }
        if let Some(end) = self.end
            && day >= end
        {
            return false;
        }
        true
    }
}

impl Default for DateWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_START, DEFAULT_WINDOW_END)
    }
}

/// Statistic used to seed the rolling baseline from the warm-up days.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SeedStatistic {
    /// Median of the seed values (robust to a single spike).
    #[default]
    Median,
    /// Arithmetic mean of the seed values.
    Mean,
}

/// Controls the self-correcting rolling-average scan.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanConfig {
    /// Number of leading values used to seed the baseline.
    pub warmup: usize,
    /// Fraction of the baseline at or below which a day is flagged under.
    pub low: f64,
    /// Fraction of the baseline at or above which a day is flagged over.
    pub high: f64,
    /// Seed statistic.
    pub seed: SeedStatistic,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            warmup: DEFAULT_WARMUP,
            low: DEFAULT_LOW,
            high: DEFAULT_HIGH,
            seed: SeedStatistic::default(),
        }
    }
}

impl ScanConfig {
    /// Override the warm-up length.
    pub fn with_warmup(mut self, warmup: usize) -> Self {
        self.warmup = warmup;
        self
    }

    /// Override the under/over thresholds.
    pub fn with_thresholds(mut self, low: f64, high: f64) -> Self {
        self.low = low;
        self.high = high;
        self
    }

    /// Override the seed statistic.
    pub fn with_seed(mut self, seed: SeedStatistic) -> Self {
        self.seed = seed;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), StabilityError> {
        if self.warmup == 0 {
            return Err(StabilityError::InvalidScanConfig(
                "warmup must be at least 1".to_string(),
            ));
        }
        if !self.low.is_finite() || self.low <= 0.0 || self.low >= 1.0 {
            return Err(StabilityError::InvalidScanConfig(format!(
                "low threshold must be finite and in (0, 1); got {}",
                self.low
            )));
        }
        if !self.high.is_finite() || self.high <= 1.0 {
            return Err(StabilityError::InvalidScanConfig(format!(
                "high threshold must be finite and > 1; got {}",
                self.high
            )));
        }
        Ok(())
    }
}

/// Top-level configuration for a reconciliation run.
#[derive(Clone, Debug, Default)]
pub struct StabilityConfig {
    /// Registry date window.
    pub window: DateWindow,
    /// Anomaly scan settings.
    pub scan: ScanConfig,
    /// Configurations to process; empty means every configuration found.
    pub configurations: Vec<ConfigLabel>,
}

impl StabilityConfig {
    /// Override the registry window.
    pub fn with_window(mut self, window: DateWindow) -> Self {
        self.window = window;
        self
    }

    /// Override the scan settings.
    pub fn with_scan(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    /// Restrict processing to the given configurations.
    pub fn with_configurations<I, S>(mut self, configurations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ConfigLabel>,
    {
        self.configurations = configurations.into_iter().map(Into::into).collect();
        self
    }

    /// True when `configuration` is selected by this config.
    pub fn selects(&self, configuration: &str) -> bool {
        self.configurations.is_empty()
            || self
                .configurations
                .iter()
                .any(|selected| selected == configuration)
    }
}
