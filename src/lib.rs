#![doc = include_str!("../README.md")]

/// Livetime allocation of registry runs to calendar days.
pub mod allocator;
/// CLI runners shared by the bundled binaries.
pub mod apps;
/// Date window and scan configuration types.
pub mod config;
/// Centralized constants used across loaders, scan, and reports.
pub mod constants;
/// Ledger, livetime, and rate types.
pub mod data;
/// Recoverable data conditions collected alongside results.
pub mod diagnostics;
/// Source-modification fingerprints for cached extracts.
pub mod freshness;
/// Livetime coverage metrics.
pub mod metrics;
/// End-to-end reconciliation over every configuration.
pub mod pipeline;
/// Three-source reconciliation into the per-day ledger.
pub mod reconcile;
/// Good run list and run-to-configuration loading.
pub mod registry;
/// Text and JSON report rendering.
pub mod report;
/// Rolling-average anomaly scan.
pub mod scan;
/// Extract-source traits and built-in sources.
pub mod source;
/// Input transports used by sources (filesystem today).
pub mod transport;
/// Shared type aliases.
pub mod types;

mod errors;

pub use allocator::{Allocation, DaySplit, allocate, split_interval, total_livetime, total_livetimes};
pub use config::{DateWindow, ScanConfig, SeedStatistic, StabilityConfig};
pub use data::{
    AnomalyKind, DayRunLivetime, ExtractTable, ExtractTotals, LedgerDay, LedgerEntry, Livetime,
    MapFragment, MapTable, Quality, Rate, RatePoint, RateSeries, RateSource, RunFragment,
    RunRecord, UndefinedReason,
};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use errors::StabilityError;
pub use metrics::{LivetimeCoverage, livetime_coverage};
pub use pipeline::{PipelineOutput, StabilityPipeline};
pub use reconcile::{ConfigLedger, ReconcileInputs, Reconciliation, reconcile};
pub use registry::{RunConfigMap, RunRegistry};
pub use scan::{AnomalyReport, AnomalyScanner, ScanStep};
pub use source::{
    InMemoryMapExtract, InMemoryRunExtract, MapExtractSource, RunExtractSource,
};
pub use types::{ConfigLabel, DayInt, EventCount, PathString, RunId, Seconds, SourceId};
