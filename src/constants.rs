/// Constants used by the good-run-list loader and date windows.
pub mod registry {
    use crate::types::DayInt;

    /// Timestamp layout used by `good_tstart` / `good_tstop` after dropping fractions.
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
    /// Calendar-day layout used by every source.
    pub const DAY_FORMAT: &str = "%Y-%m-%d";
    /// Default inclusive window start (first IC86 season).
    pub const DEFAULT_WINDOW_START: DayInt = 20100513;
    /// Default exclusive window end.
    pub const DEFAULT_WINDOW_END: DayInt = 20230513;
}

/// Constants used by the self-correcting rolling-average scan.
pub mod scan {
    /// Number of leading days used to seed the baseline.
    pub const DEFAULT_WARMUP: usize = 7;
    /// Rates at or below `low * baseline` are flagged under.
    pub const DEFAULT_LOW: f64 = 0.95;
    /// Rates at or above `high * baseline` are flagged over.
    pub const DEFAULT_HIGH: f64 = 1.05;
    /// Weight of the previous baseline in the exponential update.
    pub const BASELINE_WEIGHT: f64 = 4.0;
    /// Divisor of the exponential update (baseline weight + 1).
    pub const BASELINE_DIVISOR: f64 = 5.0;
}

/// Constants used by text and JSON reports.
pub mod report {
    /// Marker printed where a source has no value for a day or run.
    pub const MISSING_MARKER: &str = "N/A";
    /// Marker printed for rates that cannot be computed.
    pub const UNDEFINED_MARKER: &str = "undefined";
    /// Heading for the over-baseline section of the anomaly report.
    pub const OVER_HEADING: &str = "Over Average";
    /// Heading for the under-baseline section of the anomaly report.
    pub const UNDER_HEADING: &str = "Under Average";
    /// Seconds per day used when printing livetime in days.
    pub const SECONDS_PER_DAY: f64 = 86_400.0;
    /// File name of the rates document written next to the summaries.
    pub const RATES_FILENAME: &str = "rates.json";
    /// File name of the anomaly report.
    pub const ANOMALIES_FILENAME: &str = "anomalies.txt";
    /// Suffix of the per-configuration ledger summary files.
    pub const SUMMARY_SUFFIX: &str = "_summary.txt";
}

/// Constants used by extract-source discovery and caching.
pub mod discovery {
    /// File name prefix of per-configuration run-summary extracts.
    pub const RUN_SUMMARY_PREFIX: &str = "root-summary_";
    /// Extension of run-summary extracts.
    pub const RUN_SUMMARY_EXTENSION: &str = "txt";
    /// File name prefix of per-configuration map-count documents.
    pub const MAP_COUNTS_PREFIX: &str = "mapcounts_";
    /// Extension of map-count documents.
    pub const MAP_COUNTS_EXTENSION: &str = "json";
    /// File name prefix of stored source fingerprints.
    pub const FINGERPRINT_PREFIX: &str = "mtimes_";
    /// Field separator in run-summary lines.
    pub const RUN_SUMMARY_DELIMITER: &str = " - ";
    /// Separator between path and mtime in stored fingerprints.
    pub const FINGERPRINT_DELIMITER: &str = " : ";
}

/// Constants used for modified Julian date conversion.
pub mod mjd {
    /// Calendar date of MJD 0.
    pub const EPOCH_YEAR: i32 = 1858;
    pub const EPOCH_MONTH: u32 = 11;
    pub const EPOCH_DAY: u32 = 17;
}
