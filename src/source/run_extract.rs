//! Run-summary extracts.
//!
//! A run summary is a text file of `YYYY-MM-DD - <run> - <count> - <livetime>`
//! lines, one per (day, run) fragment of one raw file. Summaries are produced
//! from per-event observations by [`EventTally`] and read back lazily by
//! [`RunSummaryFile`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::constants::discovery::RUN_SUMMARY_DELIMITER;
use crate::constants::report::SECONDS_PER_DAY;
use crate::data::RunFragment;
use crate::errors::StabilityError;
use crate::source::date_helpers::{day_from_mjd, parse_day};
use crate::source::{FragmentIter, InMemoryRunExtract, RunExtractSource};
use crate::types::{ConfigLabel, EventCount, RunId, Seconds, SourceId};

/// Run-extract source backed by a run-summary text file.
#[derive(Clone, Debug)]
pub struct RunSummaryFile {
    id: SourceId,
    configuration: ConfigLabel,
    path: PathBuf,
}

impl RunSummaryFile {
    /// Source for `path`; the id defaults to the path.
    pub fn new(path: impl Into<PathBuf>, configuration: impl Into<ConfigLabel>) -> Self {
        let path = path.into();
        Self {
            id: path.display().to_string(),
            configuration: configuration.into(),
            path,
        }
    }

    /// Override the identifier used in diagnostics.
    pub fn with_id(mut self, id: impl Into<SourceId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunExtractSource for RunSummaryFile {
    fn id(&self) -> &str {
        &self.id
    }

    fn configuration(&self) -> &str {
        &self.configuration
    }

    fn fragments(&self) -> Result<FragmentIter<'_, RunFragment>, StabilityError> {
        let file = File::open(&self.path).map_err(|err| StabilityError::SourceUnavailable {
            source_id: self.id.clone(),
            reason: err.to_string(),
        })?;
        Ok(Box::new(SummaryLines {
            source_id: &self.id,
            lines: BufReader::new(file).lines(),
            line: 0,
        }))
    }
}

struct SummaryLines<'a, R> {
    source_id: &'a str,
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> Iterator for SummaryLines<'_, R> {
    type Item = Result<RunFragment, StabilityError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(err) => return Some(Err(StabilityError::Io(err))),
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            return Some(parse_summary_line(&text).map_err(|details| {
                StabilityError::MalformedSource {
                    source_id: self.source_id.to_string(),
                    line: self.line,
                    details,
                }
            }));
        }
    }
}

/// Parse one `YYYY-MM-DD - <run> - <count> - <livetime>` line.
///
/// Livetime may be written with a fractional part; it is truncated to whole
/// seconds.
pub fn parse_summary_line(line: &str) -> Result<RunFragment, String> {
    let fields: Vec<&str> = line.trim().split(RUN_SUMMARY_DELIMITER).collect();
    let [day, run_id, event_count, livetime] = fields.as_slice() else {
        return Err(format!("expected 4 fields, found {}", fields.len()));
    };
    let day = parse_day(day.trim()).ok_or_else(|| format!("invalid day '{day}'"))?;
    let run_id = run_id
        .trim()
        .parse::<RunId>()
        .map_err(|_| format!("invalid run id '{run_id}'"))?;
    let event_count = event_count
        .trim()
        .parse::<EventCount>()
        .map_err(|_| format!("invalid event count '{event_count}'"))?;
    let livetime = parse_seconds(livetime.trim()).ok_or_else(|| format!("invalid livetime '{livetime}'"))?;
    Ok(RunFragment {
        day,
        run_id,
        event_count,
        livetime,
    })
}

fn parse_seconds(value: &str) -> Option<Seconds> {
    if let Ok(seconds) = value.parse::<Seconds>() {
        return Some(seconds);
    }
    let seconds = value.parse::<f64>().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds.trunc() as Seconds)
}

/// Format one fragment as a run-summary line (without newline).
pub fn format_summary_line(fragment: &RunFragment) -> String {
    let d = RUN_SUMMARY_DELIMITER;
    format!(
        "{}{d}{}{d}{}{d}{}",
        fragment.day, fragment.run_id, fragment.event_count, fragment.livetime
    )
}

/// Write fragments as a run-summary file, replacing any existing file.
pub fn write_run_summary<'a, I>(path: &Path, fragments: I) -> Result<(), StabilityError>
where
    I: IntoIterator<Item = &'a RunFragment>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    let mut lines = 0usize;
    for fragment in fragments {
        writeln!(writer, "{}", format_summary_line(fragment))?;
        lines += 1;
    }
    writer.flush()?;
    debug!(path = %path.display(), lines, "wrote run summary");
    Ok(())
}

#[derive(Clone, Copy, Debug)]
struct TallySlot {
    event_count: EventCount,
    first_mjd: f64,
    last_mjd: f64,
}

/// Per-event tally that day-buckets observations into run fragments.
///
/// Livetime for a (day, run) is the span between its first and last event,
/// truncated to whole seconds.
#[derive(Clone, Debug, Default)]
pub struct EventTally {
    slots: BTreeMap<(NaiveDate, RunId), TallySlot>,
    rejected: usize,
}

impl EventTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event at modified Julian date `mjd` from `run_id`.
    ///
    /// Returns the day the event was bucketed into, or `None` when the date
    /// is not a valid MJD (the event is counted as rejected).
    pub fn observe(&mut self, mjd: f64, run_id: RunId) -> Option<NaiveDate> {
        let Some(day) = day_from_mjd(mjd) else {
            self.rejected += 1;
            return None;
        };
        self.slots
            .entry((day, run_id))
            .and_modify(|slot| {
                slot.event_count += 1;
                slot.first_mjd = slot.first_mjd.min(mjd);
                slot.last_mjd = slot.last_mjd.max(mjd);
            })
            .or_insert(TallySlot {
                event_count: 1,
                first_mjd: mjd,
                last_mjd: mjd,
            });
        Some(day)
    }

    /// Number of events with an invalid date.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Fragments in (day, run) order.
    pub fn fragments(&self) -> Vec<RunFragment> {
        self.slots
            .iter()
            .map(|(&(day, run_id), slot)| RunFragment {
                day,
                run_id,
                event_count: slot.event_count,
                livetime: ((slot.last_mjd - slot.first_mjd) * SECONDS_PER_DAY) as Seconds,
            })
            .collect()
    }

    /// Wrap the tally as a run-extract source.
    pub fn into_source(
        self,
        id: impl Into<SourceId>,
        configuration: impl Into<ConfigLabel>,
    ) -> InMemoryRunExtract {
        InMemoryRunExtract::new(id, configuration, self.fragments())
    }
}
