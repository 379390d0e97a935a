//! Map-count extracts.
//!
//! The map extract is a JSON object of per-day event totals for one
//! configuration (`{"2020-01-01": 123456}`). It is rebuilt from the raw
//! per-day map files only when their fingerprint changed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::constants::discovery::{FINGERPRINT_PREFIX, MAP_COUNTS_EXTENSION, MAP_COUNTS_PREFIX};
use crate::data::MapFragment;
use crate::errors::StabilityError;
use crate::freshness::SourceFingerprint;
use crate::source::date_helpers::{day_from_map_file_name, parse_day};
use crate::source::{FragmentIter, MapExtractSource};
use crate::transport::fs::{FileScanner, file_name_str, has_extension};
use crate::types::{ConfigLabel, EventCount, SourceId};

/// Map-extract source backed by a `{day: count}` JSON document.
#[derive(Clone, Debug)]
pub struct MapCountsFile {
    id: SourceId,
    configuration: ConfigLabel,
    path: PathBuf,
}

impl MapCountsFile {
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

    fn read_counts(&self) -> Result<IndexMap<String, EventCount>, StabilityError> {
        let text = fs::read_to_string(&self.path).map_err(|err| StabilityError::SourceUnavailable {
            source_id: self.id.clone(),
            reason: err.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|err| StabilityError::MalformedSource {
            source_id: self.id.clone(),
            line: err.line(),
            details: err.to_string(),
        })
    }
}

impl MapExtractSource for MapCountsFile {
    fn id(&self) -> &str {
        &self.id
    }

    fn configuration(&self) -> &str {
        &self.configuration
    }

    fn fragments(&self) -> Result<FragmentIter<'_, MapFragment>, StabilityError> {
        let counts = self.read_counts()?;
        let source_id = self.id.clone();
        Ok(Box::new(counts.into_iter().map(move |(key, event_count)| {
            let day = parse_day(&key).ok_or_else(|| StabilityError::MalformedSource {
                source_id: source_id.clone(),
                line: 0,
                details: format!("day key '{key}' is not YYYY-MM-DD"),
            })?;
            Ok(MapFragment { day, event_count })
        })))
    }
}

/// Write per-day counts as a map-counts JSON document.
pub fn write_map_counts(
    path: &Path,
    counts: &BTreeMap<NaiveDate, EventCount>,
) -> Result<(), StabilityError> {
    let document: IndexMap<String, EventCount> = counts
        .iter()
        .map(|(day, count)| (day.to_string(), *count))
        .collect();
    fs::write(path, serde_json::to_string_pretty(&document)?)?;
    Ok(())
}

/// Result of refreshing a map-count cache.
#[derive(Clone, Debug)]
pub struct CacheRefresh {
    pub source: MapCountsFile,
    /// True when the counts were recomputed from the raw map files.
    pub rebuilt: bool,
    /// Raw map files whose name carries no day and were ignored.
    pub ignored: Vec<PathBuf>,
}

/// Per-configuration map-count document kept in step with raw map files.
#[derive(Clone, Debug)]
pub struct MapCountCache {
    configuration: ConfigLabel,
    map_dir: PathBuf,
    cache_dir: PathBuf,
    extension: Option<String>,
}

impl MapCountCache {
    /// Cache for raw maps under `map_dir`, storing `mapcounts_<cfg>.json`
    /// and its fingerprint under `cache_dir`.
    pub fn new(
        configuration: impl Into<ConfigLabel>,
        map_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            configuration: configuration.into(),
            map_dir: map_dir.into(),
            cache_dir: cache_dir.into(),
            extension: None,
        }
    }

    /// Only consider raw map files with this extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn counts_path(&self) -> PathBuf {
        self.cache_dir.join(format!(
            "{MAP_COUNTS_PREFIX}{}.{MAP_COUNTS_EXTENSION}",
            self.configuration
        ))
    }

    pub fn fingerprint_path(&self) -> PathBuf {
        self.cache_dir
            .join(format!("{FINGERPRINT_PREFIX}{}.txt", self.configuration))
    }

    fn raw_maps(&self) -> Vec<PathBuf> {
        FileScanner::new(&self.map_dir).files(|path| match &self.extension {
            Some(extension) => has_extension(path, extension),
            None => true,
        })
    }

    /// Rebuild the counts document when the raw maps changed.
    ///
    /// `count_events` reads one raw map file and returns its event total.
    /// Counts for maps that share a day are summed.
    pub fn refresh<F>(&self, mut count_events: F) -> Result<CacheRefresh, StabilityError>
    where
        F: FnMut(&Path) -> Result<EventCount, StabilityError>,
    {
        let maps = self.raw_maps();
        let current = SourceFingerprint::capture(&maps);
        let stored = SourceFingerprint::load(&self.fingerprint_path())?;
        let counts_path = self.counts_path();
        let source = MapCountsFile::new(&counts_path, self.configuration.clone());

        if !current.is_stale_against(stored.as_ref()) && counts_path.is_file() {
            debug!(configuration = %self.configuration, "map counts up to date");
            return Ok(CacheRefresh {
                source,
                rebuilt: false,
                ignored: Vec::new(),
            });
        }

        info!(
            configuration = %self.configuration,
            maps = maps.len(),
            "rebuilding map counts"
        );
        let mut counts: BTreeMap<NaiveDate, EventCount> = BTreeMap::new();
        let mut ignored = Vec::new();
        for path in maps {
            let Some(day) = file_name_str(&path).and_then(day_from_map_file_name) else {
                warn!(path = %path.display(), "map file name carries no day; ignoring");
                ignored.push(path);
                continue;
            };
            let count = count_events(&path)?;
            let slot = counts.entry(day).or_default();
            *slot = slot.saturating_add(count);
        }
        fs::create_dir_all(&self.cache_dir)?;
        write_map_counts(&counts_path, &counts)?;
        current.persist(&self.fingerprint_path())?;
        Ok(CacheRefresh {
            source,
            rebuilt: true,
            ignored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::source::collect_map_table;
    use std::cell::Cell;
    use tempfile::tempdir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
    }

    #[test]
    fn map_counts_file_yields_one_fragment_per_day() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("mapcounts_IC86-2020.json");
        fs::write(&path, r#"{"2020-01-01": 100, "2020-01-02": 250}"#).unwrap();
        let source = MapCountsFile::new(&path, "IC86-2020");
        let mut diagnostics = Diagnostics::new();
        let table = collect_map_table(&source, &mut diagnostics).unwrap();
        assert_eq!(table.get(day(1)), Some(100));
        assert_eq!(table.get(day(2)), Some(250));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn bad_day_keys_and_bad_json_are_malformed() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("bad.json");
        fs::write(&path, r#"{"yesterday": 1}"#).unwrap();
        let mut diagnostics = Diagnostics::new();
        assert!(matches!(
            collect_map_table(&MapCountsFile::new(&path, "C"), &mut diagnostics),
            Err(StabilityError::MalformedSource { .. })
        ));
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            collect_map_table(&MapCountsFile::new(&path, "C"), &mut diagnostics),
            Err(StabilityError::MalformedSource { .. })
        ));
    }

    #[test]
    fn cache_rebuilds_only_when_maps_change() {
        let temp = tempdir().unwrap();
        let maps = temp.path().join("maps");
        let cache_dir = temp.path().join("cache");
        fs::create_dir(&maps).unwrap();
        fs::write(maps.join("IC86-2020_24H_sid_2020-01-01.fits"), b"10").unwrap();
        fs::write(maps.join("IC86-2020_24H_sid_2020-01-02.fits"), b"20").unwrap();
        fs::write(maps.join("notes.fits"), b"0").unwrap();

        let reads = Cell::new(0);
        let reader = |path: &Path| -> Result<EventCount, StabilityError> {
            reads.set(reads.get() + 1);
            let text = fs::read_to_string(path)?;
            text.trim()
                .parse::<EventCount>()
                .map_err(|err| StabilityError::Configuration(err.to_string()))
        };

        let cache = MapCountCache::new("IC86-2020", &maps, &cache_dir).with_extension("fits");
        let first = cache.refresh(reader).unwrap();
        assert!(first.rebuilt);
        assert_eq!(first.ignored.len(), 1);
        assert_eq!(reads.get(), 2);

        let mut diagnostics = Diagnostics::new();
        let table = collect_map_table(&first.source, &mut diagnostics).unwrap();
        assert_eq!(table.get(day(1)), Some(10));
        assert_eq!(table.get(day(2)), Some(20));

        let second = cache.refresh(reader).unwrap();
        assert!(!second.rebuilt);
        assert_eq!(reads.get(), 2);

        fs::write(maps.join("IC86-2020_24H_sid_2020-01-03.fits"), b"30").unwrap();
        let third = cache.refresh(reader).unwrap();
        assert!(third.rebuilt);
        assert_eq!(reads.get(), 5);
    }
}
