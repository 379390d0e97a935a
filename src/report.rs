//! Text and JSON renderings of ledgers, anomaly reports and coverage.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::info;

use crate::constants::report::{
    ANOMALIES_FILENAME, MISSING_MARKER, OVER_HEADING, RATES_FILENAME, SECONDS_PER_DAY,
    SUMMARY_SUFFIX, UNDEFINED_MARKER, UNDER_HEADING,
};
use crate::data::{EventCount, LedgerDay, Livetime, Rate, RateSource, UndefinedReason};
use crate::errors::StabilityError;
use crate::metrics::LivetimeCoverage;
use crate::reconcile::ConfigLedger;
use crate::scan::AnomalyReport;
use crate::types::ConfigLabel;

/// `{"registry": {cfg: {day: rate}}, "extract": {...}}` with day order kept.
pub type RatesDocument = IndexMap<String, IndexMap<ConfigLabel, IndexMap<String, f64>>>;

fn livetime_cell(livetime: Option<Livetime>) -> String {
    match livetime {
        Some(Livetime::Known(seconds)) => seconds.to_string(),
        Some(Livetime::Unknown) | None => MISSING_MARKER.to_string(),
    }
}

fn count_cell(count: Option<EventCount>) -> String {
    count.map_or_else(|| MISSING_MARKER.to_string(), |count| count.to_string())
}

fn rate_cell(rate: Rate) -> String {
    match rate {
        Rate::Defined(value) => format!("{value:.6}"),
        Rate::Undefined(UndefinedReason::MissingCounterpart) => MISSING_MARKER.to_string(),
        Rate::Undefined(_) => UNDEFINED_MARKER.to_string(),
    }
}

fn write_day_block(out: &mut String, block: &LedgerDay) {
    let _ = writeln!(out, "{}", block.day);
    let _ = writeln!(
        out,
        "  registry - {} - {} - {}",
        livetime_cell(block.registry_livetime),
        count_cell(block.map_count),
        rate_cell(block.registry_rate)
    );
    let _ = writeln!(
        out,
        "  extract  - {} - {} - {}",
        livetime_cell(block.extract.map(|totals| Livetime::Known(totals.livetime))),
        count_cell(block.extract.map(|totals| totals.event_count)),
        rate_cell(block.extract_rate)
    );
    for entry in &block.entries {
        let _ = writeln!(
            out,
            "  {}:{} - {} - {} - {} - {}",
            entry.run_id,
            entry.quality,
            livetime_cell(entry.registry_livetime),
            livetime_cell(entry.extract.map(|totals| Livetime::Known(totals.livetime))),
            count_cell(entry.extract.map(|totals| totals.event_count)),
            rate_cell(entry.rate)
        );
    }
}

/// Render one configuration's ledger.
///
/// Each day block has a header line, a registry row (good-run livetime, map
/// count, rate), an extract row (livetime, count, rate) and one row per run
/// (`<run>:<good|bad> - registry livetime - extract livetime - count - rate`).
pub fn format_ledger(ledger: &ConfigLedger) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", ledger.configuration);
    for block in &ledger.days {
        write_day_block(&mut out, block);
    }
    out
}

/// Path of the summary file for `configuration` under `dir`.
pub fn summary_path(dir: &Path, configuration: &str) -> PathBuf {
    dir.join(format!("{configuration}{SUMMARY_SUFFIX}"))
}

/// Write `<cfg>_summary.txt` under `dir`.
pub fn write_ledger(dir: &Path, ledger: &ConfigLedger) -> Result<PathBuf, StabilityError> {
    let path = summary_path(dir, &ledger.configuration);
    fs::write(&path, format_ledger(ledger))?;
    info!(path = %path.display(), days = ledger.days.len(), "wrote ledger summary");
    Ok(path)
}

/// Defined rates of every ledger, keyed by source, configuration and day.
pub fn rates_document(ledgers: &[ConfigLedger]) -> RatesDocument {
    let mut document = RatesDocument::new();
    for source in [RateSource::Registry, RateSource::Extract] {
        let per_configuration: IndexMap<ConfigLabel, IndexMap<String, f64>> = ledgers
            .iter()
            .map(|ledger| {
                let days: IndexMap<String, f64> = ledger
                    .rate_series(source)
                    .points
                    .into_iter()
                    .map(|point| (point.day.to_string(), point.rate))
                    .collect();
                (ledger.configuration.clone(), days)
            })
            .collect();
        document.insert(source.to_string(), per_configuration);
    }
    document
}

/// Write `rates.json` under `dir`.
pub fn write_rates(dir: &Path, ledgers: &[ConfigLedger]) -> Result<PathBuf, StabilityError> {
    let path = dir.join(RATES_FILENAME);
    let json = serde_json::to_string_pretty(&rates_document(ledgers))?;
    fs::write(&path, json)?;
    info!(path = %path.display(), configurations = ledgers.len(), "wrote rates");
    Ok(path)
}

/// Render anomaly reports, one section pair per configuration and source.
pub fn format_anomalies(reports: &[AnomalyReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(out, "{} ({})", report.configuration, report.source);
        for (heading, days) in [(OVER_HEADING, &report.over), (UNDER_HEADING, &report.under)] {
            let _ = writeln!(out, "{heading}");
            for day in days {
                let _ = writeln!(out, "  {day}");
            }
        }
        out.push('\n');
    }
    out
}

/// Write the anomaly report under `dir`.
pub fn write_anomalies(dir: &Path, reports: &[AnomalyReport]) -> Result<PathBuf, StabilityError> {
    let path = dir.join(ANOMALIES_FILENAME);
    fs::write(&path, format_anomalies(reports))?;
    info!(path = %path.display(), reports = reports.len(), "wrote anomaly report");
    Ok(path)
}

/// `"<cfg> : <good days> / <total days>  (<pct>%)"`.
pub fn format_coverage(coverage: &LivetimeCoverage) -> String {
    let good_days = coverage.good_seconds as f64 / SECONDS_PER_DAY;
    let total_days = coverage.total_seconds as f64 / SECONDS_PER_DAY;
    let percent = coverage
        .fraction()
        .map_or_else(|| MISSING_MARKER.to_string(), |fraction| format!("{:.1}", fraction * 100.0));
    format!(
        "{} : {good_days:.2} / {total_days:.2}  ({percent}%)",
        coverage.configuration
    )
}
