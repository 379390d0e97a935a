//! End-to-end reconciliation over every configuration.
//!
//! Registry allocation and extract loading happen once up front. Each
//! configuration is then reconciled and scanned independently on the rayon
//! pool; the anomaly scan of one configuration stays sequential.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::info;

use crate::allocator::allocate;
use crate::config::StabilityConfig;
use crate::data::{DayRunLivetime, ExtractTable, MapTable, RateSource};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::errors::StabilityError;
use crate::reconcile::{ConfigLedger, ReconcileInputs, reconcile};
use crate::registry::RunRegistry;
use crate::report::{write_anomalies, write_ledger, write_rates};
use crate::scan::{AnomalyReport, AnomalyScanner};
use crate::source::{MapExtractSource, RunExtractSource, load_map_extracts, load_run_extracts};
use crate::types::ConfigLabel;

/// Everything produced by one pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    /// Ledgers in configuration order.
    pub ledgers: Vec<ConfigLedger>,
    /// Registry and extract reports per configuration, in configuration order.
    pub anomalies: Vec<AnomalyReport>,
    pub diagnostics: Diagnostics,
}

impl PipelineOutput {
    pub fn ledger(&self, configuration: &str) -> Option<&ConfigLedger> {
        self.ledgers
            .iter()
            .find(|ledger| ledger.configuration == configuration)
    }

    pub fn anomalies_for(
        &self,
        configuration: &str,
        source: RateSource,
    ) -> Option<&AnomalyReport> {
        self.anomalies
            .iter()
            .find(|report| report.configuration == configuration && report.source == source)
    }

    /// Write ledger summaries, `rates.json` and the anomaly report under `dir`.
    pub fn write_reports(&self, dir: &Path) -> Result<Vec<PathBuf>, StabilityError> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.ledgers.len() + 2);
        for ledger in &self.ledgers {
            written.push(write_ledger(dir, ledger)?);
        }
        written.push(write_rates(dir, &self.ledgers)?);
        written.push(write_anomalies(dir, &self.anomalies)?);
        Ok(written)
    }
}

struct ConfigOutcome {
    ledger: ConfigLedger,
    anomalies: Vec<AnomalyReport>,
    diagnostics: Diagnostics,
}

/// Reconciles a registry with extract sources and scans the resulting rates.
#[derive(Clone, Debug)]
pub struct StabilityPipeline {
    config: StabilityConfig,
    scanner: AnomalyScanner,
}

impl StabilityPipeline {
    pub fn new(config: StabilityConfig) -> Result<Self, StabilityError> {
        let scanner = AnomalyScanner::new(config.scan.clone())?;
        Ok(Self { config, scanner })
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    /// Run over already-built extract tables.
    pub fn run_tables(
        &self,
        registry: &RunRegistry,
        run_tables: &BTreeMap<ConfigLabel, ExtractTable>,
        map_tables: &BTreeMap<ConfigLabel, MapTable>,
        mut diagnostics: Diagnostics,
    ) -> PipelineOutput {
        let allocation = allocate(registry.records());
        diagnostics.extend(allocation.diagnostics);
        let livetime = allocation.livetime;

        let registry_configurations = registry.configurations();
        let candidates: BTreeSet<ConfigLabel> = registry_configurations
            .iter()
            .chain(run_tables.keys())
            .chain(map_tables.keys())
            .filter(|configuration| self.config.selects(configuration))
            .cloned()
            .collect();

        let mut selected = Vec::with_capacity(candidates.len());
        for configuration in candidates {
            if registry_configurations.contains(&configuration) {
                selected.push(configuration);
            } else {
                diagnostics.record(Diagnostic::ConfigurationSkipped {
                    configuration,
                    reason: "no registry runs in the window".to_string(),
                });
            }
        }
        info!(configurations = selected.len(), "reconciling configurations");

        let empty_extract = ExtractTable::new();
        let empty_maps = MapTable::new();
        let outcomes: Vec<ConfigOutcome> = selected
            .par_iter()
            .map(|configuration| {
                self.process_configuration(
                    configuration,
                    registry,
                    &livetime,
                    run_tables.get(configuration).unwrap_or(&empty_extract),
                    map_tables.get(configuration).unwrap_or(&empty_maps),
                )
            })
            .collect();

        let mut ledgers = Vec::with_capacity(outcomes.len());
        let mut anomalies = Vec::with_capacity(outcomes.len() * 2);
        for outcome in outcomes {
            ledgers.push(outcome.ledger);
            anomalies.extend(outcome.anomalies);
            diagnostics.extend(outcome.diagnostics);
        }
        PipelineOutput {
            ledgers,
            anomalies,
            diagnostics,
        }
    }

    /// Load every source, then reconcile and scan each configuration.
    ///
    /// A source that fails to load is skipped whole and reported.
    pub fn run<R, M>(
        &self,
        registry: &RunRegistry,
        run_sources: &[R],
        map_sources: &[M],
    ) -> PipelineOutput
    where
        R: AsRef<dyn RunExtractSource>,
        M: AsRef<dyn MapExtractSource>,
    {
        let mut diagnostics = Diagnostics::new();
        let run_tables = load_run_extracts(run_sources, &mut diagnostics);
        let map_tables = load_map_extracts(map_sources, &mut diagnostics);
        self.run_tables(registry, &run_tables, &map_tables, diagnostics)
    }

    fn process_configuration(
        &self,
        configuration: &str,
        registry: &RunRegistry,
        livetime: &DayRunLivetime,
        run_extract: &ExtractTable,
        map_extract: &MapTable,
    ) -> ConfigOutcome {
        let bad_runs = registry.bad_runs(configuration);
        let reconciliation = reconcile(
            configuration,
            ReconcileInputs {
                day_run_livetime: livetime,
                run_extract,
                map_extract,
                bad_runs: &bad_runs,
            },
        );
        let anomalies = [RateSource::Registry, RateSource::Extract]
            .into_iter()
            .map(|source| {
                self.scanner
                    .scan(&reconciliation.ledger.rate_series(source))
            })
            .collect();
        ConfigOutcome {
            ledger: reconciliation.ledger,
            anomalies,
            diagnostics: reconciliation.diagnostics,
        }
    }
}
