//! Extract-source interfaces and table loading.
//!
//! Ownership model:
//! - `RunExtractSource` / `MapExtractSource` are the core-facing adapters.
//!   Each yields already day-bucketed fragments for one configuration and
//!   never pre-aggregates across files.
//! - `load_run_extracts` / `load_map_extracts` own accumulation. A source
//!   that fails mid-stream is dropped whole so partial files never leak
//!   into the tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::data::{ExtractTable, MapFragment, MapTable, RunFragment};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::errors::StabilityError;
use crate::types::{ConfigLabel, SourceId};

/// Day and timestamp parsing helpers.
pub mod date_helpers;
/// Extract-file discovery by naming convention.
pub mod discovery;
/// Map-count sources and the fingerprinted map-count cache.
pub mod map_extract;
/// Run-summary sources and the per-event tally producer.
pub mod run_extract;

/// Lazy fallible fragment stream returned by sources.
pub type FragmentIter<'a, T> = Box<dyn Iterator<Item = Result<T, StabilityError>> + 'a>;

/// Source of per-(day, run) event counts and livetimes for one configuration.
pub trait RunExtractSource: Send + Sync {
    /// Stable identifier used in diagnostics.
    fn id(&self) -> &str;
    /// Configuration this source belongs to.
    fn configuration(&self) -> &str;
    /// Stream the source's fragments in file order.
    fn fragments(&self) -> Result<FragmentIter<'_, RunFragment>, StabilityError>;
}

/// Source of per-day event counts for one configuration.
pub trait MapExtractSource: Send + Sync {
    /// Stable identifier used in diagnostics.
    fn id(&self) -> &str;
    /// Configuration this source belongs to.
    fn configuration(&self) -> &str;
    /// Stream the source's fragments.
    fn fragments(&self) -> Result<FragmentIter<'_, MapFragment>, StabilityError>;
}

/// Run-extract source backed by prebuilt fragments.
#[derive(Clone, Debug)]
pub struct InMemoryRunExtract {
    id: SourceId,
    configuration: ConfigLabel,
    fragments: Arc<Vec<RunFragment>>,
}

impl InMemoryRunExtract {
    pub fn new(
        id: impl Into<SourceId>,
        configuration: impl Into<ConfigLabel>,
        fragments: Vec<RunFragment>,
    ) -> Self {
        Self {
            id: id.into(),
            configuration: configuration.into(),
            fragments: Arc::new(fragments),
        }
    }
}

impl RunExtractSource for InMemoryRunExtract {
    fn id(&self) -> &str {
        &self.id
    }

    fn configuration(&self) -> &str {
        &self.configuration
    }

    fn fragments(&self) -> Result<FragmentIter<'_, RunFragment>, StabilityError> {
        Ok(Box::new(self.fragments.iter().copied().map(Ok)))
    }
}

/// Map-extract source backed by prebuilt fragments.
#[derive(Clone, Debug)]
pub struct InMemoryMapExtract {
    id: SourceId,
    configuration: ConfigLabel,
    fragments: Arc<Vec<MapFragment>>,
}

impl InMemoryMapExtract {
    pub fn new(
        id: impl Into<SourceId>,
        configuration: impl Into<ConfigLabel>,
        fragments: Vec<MapFragment>,
    ) -> Self {
        Self {
            id: id.into(),
            configuration: configuration.into(),
            fragments: Arc::new(fragments),
        }
    }
}

impl MapExtractSource for InMemoryMapExtract {
    fn id(&self) -> &str {
        &self.id
    }

    fn configuration(&self) -> &str {
        &self.configuration
    }

    fn fragments(&self) -> Result<FragmentIter<'_, MapFragment>, StabilityError> {
        Ok(Box::new(self.fragments.iter().copied().map(Ok)))
    }
}

/// Accumulate one run-extract source into a fresh table.
pub fn collect_run_table(source: &dyn RunExtractSource) -> Result<ExtractTable, StabilityError> {
    let mut table = ExtractTable::new();
    let mut fragments = 0usize;
    for fragment in source.fragments()? {
        table.accumulate(fragment?);
        fragments += 1;
    }
    debug!(source_id = source.id(), fragments, "collected run extract");
    Ok(table)
}

/// Accumulate one map-extract source, recording days reported twice.
pub fn collect_map_table(
    source: &dyn MapExtractSource,
    diagnostics: &mut Diagnostics,
) -> Result<MapTable, StabilityError> {
    let mut table = MapTable::new();
    let mut duplicates = Vec::new();
    for fragment in source.fragments()? {
        let fragment = fragment?;
        if table.accumulate(fragment) {
            duplicates.push(fragment.day);
        }
    }
    for day in duplicates {
        diagnostics.record(Diagnostic::DuplicateMapDay {
            source_id: source.id().to_string(),
            day,
        });
    }
    Ok(table)
}

/// Load every run-extract source into per-configuration tables.
///
/// Sources for the same configuration merge additively. A failing source is
/// skipped whole and reported.
pub fn load_run_extracts<S>(
    sources: &[S],
    diagnostics: &mut Diagnostics,
) -> BTreeMap<ConfigLabel, ExtractTable>
where
    S: AsRef<dyn RunExtractSource>,
{
    let mut tables: BTreeMap<ConfigLabel, ExtractTable> = BTreeMap::new();
    for source in sources {
        let source = source.as_ref();
        info!(source_id = source.id(), "loading run extract");
        match collect_run_table(source) {
            Ok(table) => tables
                .entry(source.configuration().to_string())
                .or_default()
                .merge(table),
            Err(err) => diagnostics.record(Diagnostic::SourceSkipped {
                source_id: source.id().to_string(),
                reason: err.to_string(),
            }),
        }
    }
    tables
}

/// Load every map-extract source into per-configuration tables.
///
/// A day already reported by an earlier source of the same configuration is
/// summed and recorded as a duplicate.
pub fn load_map_extracts<S>(
    sources: &[S],
    diagnostics: &mut Diagnostics,
) -> BTreeMap<ConfigLabel, MapTable>
where
    S: AsRef<dyn MapExtractSource>,
{
    let mut tables: BTreeMap<ConfigLabel, MapTable> = BTreeMap::new();
    for source in sources {
        let source = source.as_ref();
        info!(source_id = source.id(), "loading map extract");
        let mut source_diagnostics = Diagnostics::new();
        match collect_map_table(source, &mut source_diagnostics) {
            Ok(table) => {
                diagnostics.extend(source_diagnostics);
                let overlapping = tables
                    .entry(source.configuration().to_string())
                    .or_default()
                    .merge(table);
                for day in overlapping {
                    diagnostics.record(Diagnostic::DuplicateMapDay {
                        source_id: source.id().to_string(),
                        day,
                    });
                }
            }
            Err(err) => diagnostics.record(Diagnostic::SourceSkipped {
                source_id: source.id().to_string(),
                reason: err.to_string(),
            }),
        }
    }
    tables
}
