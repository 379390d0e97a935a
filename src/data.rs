use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use chrono::{NaiveDate, NaiveDateTime};

pub use crate::types::{ConfigLabel, EventCount, RunId, Seconds};

/// Quality flag from the good run list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quality {
    Good,
    Bad,
}

impl Quality {
    /// Map the registry's boolean flag onto a quality.
    pub fn from_flag(good: bool) -> Self {
        if good { Quality::Good } else { Quality::Bad }
    }

    pub fn is_good(self) -> bool {
        self == Quality::Good
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Good => f.write_str("good"),
            Quality::Bad => f.write_str("bad"),
        }
    }
}

/// Livetime in seconds, or explicitly unknown when a run has no stop time.
///
/// `Unknown` is never treated as zero: any sum that includes it is `Unknown`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Livetime {
    Known(Seconds),
    Unknown,
}

impl Livetime {
    pub const ZERO: Livetime = Livetime::Known(0);

    /// Seconds when known.
    pub fn known(self) -> Option<Seconds> {
        match self {
            Livetime::Known(seconds) => Some(seconds),
            Livetime::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Livetime::Unknown)
    }
}

impl Add for Livetime {
    type Output = Livetime;

    fn add(self, rhs: Livetime) -> Livetime {
        match (self, rhs) {
            (Livetime::Known(a), Livetime::Known(b)) => Livetime::Known(a.saturating_add(b)),
            _ => Livetime::Unknown,
        }
    }
}

impl Sum for Livetime {
    fn sum<I: Iterator<Item = Livetime>>(iter: I) -> Livetime {
        iter.fold(Livetime::ZERO, Add::add)
    }
}

impl fmt::Display for Livetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Livetime::Known(seconds) => write!(f, "{seconds}"),
            Livetime::Unknown => f.write_str("null"),
        }
    }
}

/// One row of the good run list after schema validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRecord {
    pub run_id: RunId,
    /// Configuration from the run map; `None` when the run is unmapped.
    pub configuration: Option<ConfigLabel>,
    pub start: NaiveDateTime,
    /// Stop time; `None` means the run's livetime is unknown.
    pub stop: Option<NaiveDateTime>,
    pub quality: Quality,
}

impl RunRecord {
    /// Calendar day the run started on.
    pub fn start_day(&self) -> NaiveDate {
        self.start.date()
    }
}

/// Event count and livetime accumulated for one (day, run) of an extract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractTotals {
    pub event_count: EventCount,
    pub livetime: Seconds,
}

impl ExtractTotals {
    pub fn new(event_count: EventCount, livetime: Seconds) -> Self {
        Self {
            event_count,
            livetime,
        }
    }
}

impl Add for ExtractTotals {
    type Output = ExtractTotals;

    fn add(self, rhs: ExtractTotals) -> ExtractTotals {
        ExtractTotals {
            event_count: self.event_count.saturating_add(rhs.event_count),
            livetime: self.livetime.saturating_add(rhs.livetime),
        }
    }
}

impl Sum for ExtractTotals {
    fn sum<I: Iterator<Item = ExtractTotals>>(iter: I) -> ExtractTotals {
        iter.fold(ExtractTotals::default(), Add::add)
    }
}

/// A single `(day, run, count delta, livetime delta)` tuple from a run extract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunFragment {
    pub day: NaiveDate,
    pub run_id: RunId,
    pub event_count: EventCount,
    pub livetime: Seconds,
}

/// A single `(day, count)` tuple from a map extract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapFragment {
    pub day: NaiveDate,
    pub event_count: EventCount,
}

/// Run-extract data for one configuration, keyed by day then run.
///
/// Fragments for the same (day, run) accumulate additively, so merge order
/// never changes the result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractTable {
    days: BTreeMap<NaiveDate, BTreeMap<RunId, ExtractTotals>>,
}

impl ExtractTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one fragment into the table.
    pub fn accumulate(&mut self, fragment: RunFragment) {
        let slot = self
            .days
            .entry(fragment.day)
            .or_default()
            .entry(fragment.run_id)
            .or_default();
        *slot = *slot + ExtractTotals::new(fragment.event_count, fragment.livetime);
    }

    /// Fold every entry of `other` into this table.
    pub fn merge(&mut self, other: ExtractTable) {
        for (day, runs) in other.days {
            let target = self.days.entry(day).or_default();
            for (run_id, totals) in runs {
                let slot = target.entry(run_id).or_default();
                *slot = *slot + totals;
            }
        }
    }

    pub fn get(&self, day: NaiveDate, run_id: RunId) -> Option<ExtractTotals> {
        self.days.get(&day)?.get(&run_id).copied()
    }

    pub fn runs_on(&self, day: NaiveDate) -> Option<&BTreeMap<RunId, ExtractTotals>> {
        self.days.get(&day)
    }

    /// Day total summed over every run present for `day`.
    pub fn day_totals(&self, day: NaiveDate) -> Option<ExtractTotals> {
        self.days
            .get(&day)
            .map(|runs| runs.values().copied().sum())
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl FromIterator<RunFragment> for ExtractTable {
    fn from_iter<I: IntoIterator<Item = RunFragment>>(iter: I) -> Self {
        let mut table = ExtractTable::new();
        for fragment in iter {
            table.accumulate(fragment);
        }
        table
    }
}

/// Map-extract counts for one configuration, keyed by day.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapTable {
    days: BTreeMap<NaiveDate, EventCount>,
}

impl MapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one fragment; returns `true` when the day was already present.
    pub fn accumulate(&mut self, fragment: MapFragment) -> bool {
        let existed = self.days.contains_key(&fragment.day);
        let slot = self.days.entry(fragment.day).or_default();
        *slot = slot.saturating_add(fragment.event_count);
        existed
    }

    /// Fold every entry of `other` into this table, returning the days both
    /// tables already held.
    pub fn merge(&mut self, other: MapTable) -> Vec<NaiveDate> {
        let mut overlapping = Vec::new();
        for (day, count) in other.days {
            if self.days.contains_key(&day) {
                overlapping.push(day);
            }
            let slot = self.days.entry(day).or_default();
            *slot = slot.saturating_add(count);
        }
        overlapping
    }

    pub fn get(&self, day: NaiveDate) -> Option<EventCount> {
        self.days.get(&day).copied()
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl FromIterator<MapFragment> for MapTable {
    fn from_iter<I: IntoIterator<Item = MapFragment>>(iter: I) -> Self {
        let mut table = MapTable::new();
        for fragment in iter {
            table.accumulate(fragment);
        }
        table
    }
}

/// Registry livetime per (configuration, day, run).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DayRunLivetime {
    configurations: BTreeMap<ConfigLabel, BTreeMap<NaiveDate, BTreeMap<RunId, Livetime>>>,
}

impl DayRunLivetime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, configuration: &str, day: NaiveDate, run_id: RunId, livetime: Livetime) {
        self.configurations
            .entry(configuration.to_string())
            .or_default()
            .entry(day)
            .or_default()
            .insert(run_id, livetime);
    }

    pub fn get(&self, configuration: &str, day: NaiveDate, run_id: RunId) -> Option<Livetime> {
        self.runs_on(configuration, day)?.get(&run_id).copied()
    }

    pub fn runs_on(&self, configuration: &str, day: NaiveDate) -> Option<&BTreeMap<RunId, Livetime>> {
        self.configurations.get(configuration)?.get(&day)
    }

    pub fn days(&self, configuration: &str) -> impl Iterator<Item = NaiveDate> + '_ {
        self.configurations
            .get(configuration)
            .into_iter()
            .flat_map(|days| days.keys().copied())
    }

    pub fn configurations(&self) -> impl Iterator<Item = &str> + '_ {
        self.configurations.keys().map(String::as_str)
    }

    /// Livetime of runs not in `bad_runs` on `day`, or `None` when the day is absent.
    pub fn good_livetime(
        &self,
        configuration: &str,
        day: NaiveDate,
        bad_runs: &BTreeSet<RunId>,
    ) -> Option<Livetime> {
        self.runs_on(configuration, day).map(|runs| {
            runs.iter()
                .filter(|(run_id, _)| !bad_runs.contains(run_id))
                .map(|(_, livetime)| *livetime)
                .sum()
        })
    }
}

/// Which pair of sources a rate is computed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RateSource {
    /// Map-extract counts over good-run registry livetime.
    Registry,
    /// Run-extract counts over run-extract livetime.
    Extract,
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateSource::Registry => f.write_str("registry"),
            RateSource::Extract => f.write_str("extract"),
        }
    }
}

/// Why a rate has no numeric value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UndefinedReason {
    ZeroLivetime,
    UnknownLivetime,
    /// One of the two required sources has no entry.
    MissingCounterpart,
}

/// Event rate in events per second, or an explicit undefined marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rate {
    Defined(f64),
    Undefined(UndefinedReason),
}

impl Rate {
    /// `count / livetime`, undefined when livetime is zero or unknown.
    pub fn compute(event_count: EventCount, livetime: Livetime) -> Self {
        match livetime {
            Livetime::Unknown => Rate::Undefined(UndefinedReason::UnknownLivetime),
            Livetime::Known(0) => Rate::Undefined(UndefinedReason::ZeroLivetime),
            Livetime::Known(seconds) => Rate::Defined(event_count as f64 / seconds as f64),
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Rate::Defined(value) => Some(value),
            Rate::Undefined(_) => None,
        }
    }
}

/// Run-level row of the ledger.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerEntry {
    pub run_id: RunId,
    /// Registry livetime; `None` when the run is absent from the registry for this day.
    pub registry_livetime: Option<Livetime>,
    /// Extract totals; `None` when no extract reported this run for this day.
    pub extract: Option<ExtractTotals>,
    pub quality: Quality,
    /// Extract count over extract livetime for this run.
    pub rate: Rate,
}

/// Day-level block of the ledger with the two source summaries side by side.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerDay {
    pub day: NaiveDate,
    /// Good-run registry livetime; `None` when the day is absent from the registry.
    pub registry_livetime: Option<Livetime>,
    /// Map-extract count; `None` when no map covers the day.
    pub map_count: Option<EventCount>,
    /// Run-extract totals over every run; `None` when no extract covers the day.
    pub extract: Option<ExtractTotals>,
    pub registry_rate: Rate,
    pub extract_rate: Rate,
    pub entries: Vec<LedgerEntry>,
}

impl LedgerDay {
    pub fn rate(&self, source: RateSource) -> Rate {
        match source {
            RateSource::Registry => self.registry_rate,
            RateSource::Extract => self.extract_rate,
        }
    }

    pub fn entry(&self, run_id: RunId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|entry| entry.run_id == run_id)
    }
}

/// One day's defined rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RatePoint {
    pub day: NaiveDate,
    pub rate: f64,
}

/// Day-ordered defined rates for one configuration and one source.
#[derive(Clone, Debug, PartialEq)]
pub struct RateSeries {
    pub configuration: ConfigLabel,
    pub source: RateSource,
    pub points: Vec<RatePoint>,
}

impl RateSeries {
    pub fn new(configuration: impl Into<ConfigLabel>, source: RateSource, points: Vec<RatePoint>) -> Self {
        Self {
            configuration: configuration.into(),
            source,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Direction of an anomalous day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnomalyKind {
    Over,
    Under,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
    }

    #[test]
    fn unknown_livetime_poisons_sums() {
        let total: Livetime = [Livetime::Known(10), Livetime::Unknown, Livetime::Known(5)]
            .into_iter()
            .sum();
        assert_eq!(total, Livetime::Unknown);
        let total: Livetime = [Livetime::Known(10), Livetime::Known(5)].into_iter().sum();
        assert_eq!(total, Livetime::Known(15));
        let empty: Livetime = std::iter::empty().sum();
        assert_eq!(empty, Livetime::ZERO);
    }

    #[test]
    fn rate_is_undefined_for_zero_or_unknown_livetime() {
        assert_eq!(
            Rate::compute(10, Livetime::Known(0)),
            Rate::Undefined(UndefinedReason::ZeroLivetime)
        );
        assert_eq!(
            Rate::compute(10, Livetime::Unknown),
            Rate::Undefined(UndefinedReason::UnknownLivetime)
        );
        assert_eq!(Rate::compute(10, Livetime::Known(4)), Rate::Defined(2.5));
        assert_eq!(Rate::compute(0, Livetime::Known(0)).value(), None);
    }

    #[test]
    fn extract_fragments_accumulate_in_any_order() {
        let a = RunFragment {
            day: day(1),
            run_id: 7,
            event_count: 40,
            livetime: 600,
        };
        let b = RunFragment {
            day: day(1),
            run_id: 7,
            event_count: 60,
            livetime: 1200,
        };
        let forward: ExtractTable = [a, b].into_iter().collect();
        let backward: ExtractTable = [b, a].into_iter().collect();
        assert_eq!(forward, backward);
        assert_eq!(forward.get(day(1), 7), Some(ExtractTotals::new(100, 1800)));

        let mut merged: ExtractTable = [a].into_iter().collect();
        merged.merge([b].into_iter().collect());
        assert_eq!(merged, forward);
    }

    #[test]
    fn extract_day_totals_sum_every_run() {
        let table: ExtractTable = [
            RunFragment {
                day: day(2),
                run_id: 1,
                event_count: 10,
                livetime: 100,
            },
            RunFragment {
                day: day(2),
                run_id: 2,
                event_count: 30,
                livetime: 300,
            },
        ]
        .into_iter()
        .collect();
        assert_eq!(table.day_totals(day(2)), Some(ExtractTotals::new(40, 400)));
        assert_eq!(table.day_totals(day(3)), None);
    }

    #[test]
    fn map_table_reports_duplicate_days() {
        let mut table = MapTable::new();
        assert!(!table.accumulate(MapFragment {
            day: day(1),
            event_count: 5,
        }));
        assert!(table.accumulate(MapFragment {
            day: day(1),
            event_count: 7,
        }));
        assert_eq!(table.get(day(1)), Some(12));
    }

    #[test]
    fn good_livetime_skips_bad_runs() {
        let mut livetime = DayRunLivetime::new();
        livetime.insert("IC86-2020", day(1), 1, Livetime::Known(100));
        livetime.insert("IC86-2020", day(1), 2, Livetime::Known(50));
        let bad: BTreeSet<RunId> = [2].into_iter().collect();
        assert_eq!(
            livetime.good_livetime("IC86-2020", day(1), &bad),
            Some(Livetime::Known(100))
        );
        assert_eq!(livetime.good_livetime("IC86-2020", day(2), &bad), None);
    }
}
