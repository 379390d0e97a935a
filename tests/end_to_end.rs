use std::fs;

use chrono::NaiveDate;
use tempfile::tempdir;

use stability::source::discovery::{discover_map_counts, discover_run_summaries};
use stability::source::run_extract::{EventTally, write_run_summary};
use stability::{
    DateWindow, Diagnostic, InMemoryMapExtract, InMemoryRunExtract, Livetime, MapExtractSource,
    MapFragment, Quality, Rate, RateSource, RunConfigMap, RunExtractSource, RunFragment,
    RunRegistry, StabilityConfig, StabilityPipeline, UndefinedReason,
};

const CFG: &str = "IC86-2019";

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
}

fn run_map() -> RunConfigMap {
    [(1, CFG), (2, CFG), (3, CFG)].into_iter().collect()
}

fn registry(json: &str) -> RunRegistry {
    RunRegistry::from_json_str("grl.json", json, &run_map(), &DateWindow::default()).unwrap()
}

#[test]
fn midnight_run_is_reconciled_against_both_extracts() {
    let registry = registry(
        r#"{"runs": [{"run": 1, "good_i3": true,
            "good_tstart": "2020-01-01 23:30:00", "good_tstop": "2020-01-02 00:30:00"}]}"#,
    );
    let runs: Vec<Box<dyn RunExtractSource>> = vec![Box::new(InMemoryRunExtract::new(
        "runs",
        CFG,
        vec![RunFragment {
            day: day(1),
            run_id: 1,
            event_count: 100,
            livetime: 1800,
        }],
    ))];
    let maps: Vec<Box<dyn MapExtractSource>> = vec![Box::new(InMemoryMapExtract::new(
        "maps",
        CFG,
        vec![MapFragment {
            day: day(1),
            event_count: 100,
        }],
    ))];

    let pipeline = StabilityPipeline::new(StabilityConfig::default()).unwrap();
    let output = pipeline.run(&registry, &runs, &maps);
    let ledger = output.ledger(CFG).unwrap();

    let first = ledger.day(day(1)).unwrap();
    let entry = first.entry(1).unwrap();
    assert_eq!(entry.registry_livetime, Some(Livetime::Known(1800)));
    assert_eq!(entry.extract.map(|totals| totals.livetime), Some(1800));
    let rate = first.rate(RateSource::Registry).value().unwrap();
    assert!((rate - 100.0 / 1800.0).abs() < 1e-9);
    assert!((rate - 0.0556).abs() < 1e-4);

    let second = ledger.day(day(2)).unwrap();
    assert_eq!(
        second.entry(1).unwrap().registry_livetime,
        Some(Livetime::Known(1800))
    );
    assert_eq!(second.map_count, None);
    assert_eq!(second.extract, None);
    assert_eq!(
        second.registry_rate,
        Rate::Undefined(UndefinedReason::MissingCounterpart)
    );
    assert!(output.diagnostics.any(|d| matches!(
        d,
        Diagnostic::MissingMapCounts { day: missing, .. } if *missing == day(2)
    )));
    assert!(output.diagnostics.any(|d| matches!(
        d,
        Diagnostic::MissingExtractDay { day: missing, .. } if *missing == day(2)
    )));

    let series = ledger.rate_series(RateSource::Registry);
    assert_eq!(series.len(), 1);
    assert_eq!(series.points[0].day, day(1));
}

#[test]
fn bad_run_is_tagged_and_kept_out_of_good_livetime() {
    let registry = registry(
        r#"{"runs": [
            {"run": 1, "good_i3": true, "good_tstart": "2020-01-03 00:00:00", "good_tstop": "2020-01-03 08:00:00"},
            {"run": 2, "good_i3": false, "good_tstart": "2020-01-03 08:00:00", "good_tstop": "2020-01-03 16:00:00"}
        ]}"#,
    );
    let runs: Vec<Box<dyn RunExtractSource>> = vec![Box::new(InMemoryRunExtract::new(
        "runs",
        CFG,
        vec![
            RunFragment {
                day: day(3),
                run_id: 1,
                event_count: 800,
                livetime: 28_800,
            },
            RunFragment {
                day: day(3),
                run_id: 2,
                event_count: 9_000,
                livetime: 28_800,
            },
        ],
    ))];
    let maps: Vec<Box<dyn MapExtractSource>> = vec![Box::new(InMemoryMapExtract::new(
        "maps",
        CFG,
        vec![MapFragment {
            day: day(3),
            event_count: 2_880,
        }],
    ))];

    let pipeline = StabilityPipeline::new(StabilityConfig::default()).unwrap();
    let output = pipeline.run(&registry, &runs, &maps);
    let block = output.ledger(CFG).unwrap().day(day(3)).unwrap();

    assert_eq!(block.registry_livetime, Some(Livetime::Known(28_800)));
    assert_eq!(block.entry(2).unwrap().quality, Quality::Bad);
    assert_eq!(block.entry(1).unwrap().quality, Quality::Good);
    assert_eq!(block.registry_rate, Rate::Defined(0.1));

    let text = stability::report::format_ledger(output.ledger(CFG).unwrap());
    assert!(text.contains("  2:bad - 28800 - 28800 - 9000 - "));
}

#[test]
fn malformed_source_is_skipped_without_touching_others() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(
        root.join("root-summary_IC86-2019.txt"),
        "2020-01-01 - 1 - 100 - 1800\n",
    )
    .unwrap();
    fs::write(
        root.join("root-summary_IC86-2020.txt"),
        "2020-01-01 - 3 - 100\n",
    )
    .unwrap();
    fs::write(root.join("mapcounts_IC86-2019.json"), r#"{"2020-01-01": 100}"#).unwrap();

    let mut map: RunConfigMap = run_map();
    map.insert(3, "IC86-2020");
    let registry = RunRegistry::from_json_str(
        "grl.json",
        r#"{"runs": [
            {"run": 1, "good_i3": true, "good_tstart": "2020-01-01 10:00:00", "good_tstop": "2020-01-01 10:30:00"},
            {"run": 3, "good_i3": true, "good_tstart": "2020-01-01 11:00:00", "good_tstop": "2020-01-01 11:30:00"}
        ]}"#,
        &map,
        &DateWindow::unbounded(),
    )
    .unwrap();

    let runs: Vec<Box<dyn RunExtractSource>> = discover_run_summaries(root)
        .into_iter()
        .map(|source| Box::new(source) as Box<dyn RunExtractSource>)
        .collect();
    let maps: Vec<Box<dyn MapExtractSource>> = discover_map_counts(root)
        .into_iter()
        .map(|source| Box::new(source) as Box<dyn MapExtractSource>)
        .collect();
    let output = StabilityPipeline::new(StabilityConfig::default())
        .unwrap()
        .run(&registry, &runs, &maps);

    assert!(output.diagnostics.any(|d| matches!(
        d,
        Diagnostic::SourceSkipped { source_id, .. } if source_id == "root-summary_IC86-2020.txt"
    )));
    let good = output.ledger("IC86-2019").unwrap().day(day(1)).unwrap();
    assert_eq!(good.extract.map(|totals| totals.event_count), Some(100));
    let skipped = output.ledger("IC86-2020").unwrap().day(day(1)).unwrap();
    assert_eq!(skipped.extract, None);
    assert_eq!(skipped.registry_livetime, Some(Livetime::Known(1800)));
}

#[test]
fn tallied_events_round_trip_through_summary_files() {
    let temp = tempdir().unwrap();
    let mut tally = EventTally::new();
    // MJD 58849 is 2020-01-01.
    for step in 0..=10 {
        tally.observe(58849.5 + f64::from(step) * 0.001, 1);
    }
    let path = temp.path().join("root-summary_IC86-2019.txt");
    write_run_summary(&path, &tally.fragments()).unwrap();

    let sources = discover_run_summaries(temp.path());
    assert_eq!(sources.len(), 1);
    let table = stability::source::collect_run_table(&sources[0]).unwrap();
    let totals = table.get(day(1), 1).unwrap();
    assert_eq!(totals.event_count, 11);
    // 0.01 day is 864 s; truncation may drop the last second.
    assert!((863..=864).contains(&totals.livetime));
}

#[test]
fn reports_are_written_for_every_configuration() {
    let temp = tempdir().unwrap();
    let registry = registry(
        r#"{"runs": [{"run": 1, "good_i3": true,
            "good_tstart": "2020-01-01 10:00:00", "good_tstop": "2020-01-01 11:00:00"}]}"#,
    );
    let runs: Vec<Box<dyn RunExtractSource>> = vec![Box::new(InMemoryRunExtract::new(
        "runs",
        CFG,
        vec![RunFragment {
            day: day(1),
            run_id: 1,
            event_count: 36,
            livetime: 3600,
        }],
    ))];
    let maps: Vec<Box<dyn MapExtractSource>> = Vec::new();
    let output = StabilityPipeline::new(StabilityConfig::default())
        .unwrap()
        .run(&registry, &runs, &maps);
    let written = output.write_reports(temp.path()).unwrap();
    assert_eq!(written.len(), 3);
    assert!(temp.path().join("IC86-2019_summary.txt").is_file());

    let rates: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp.path().join("rates.json")).unwrap())
            .unwrap();
    assert_eq!(rates["extract"][CFG]["2020-01-01"], serde_json::json!(0.01));
    assert!(rates["registry"][CFG].as_object().unwrap().is_empty());
}
