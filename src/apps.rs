use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, ValueEnum, error::ErrorKind};

use crate::config::{DateWindow, ScanConfig, SeedStatistic, StabilityConfig};
use crate::constants::registry::{DEFAULT_WINDOW_END, DEFAULT_WINDOW_START};
use crate::constants::scan::{DEFAULT_HIGH, DEFAULT_LOW, DEFAULT_WARMUP};
use crate::data::AnomalyKind;
use crate::metrics::livetime_coverage;
use crate::pipeline::StabilityPipeline;
use crate::registry::{RunConfigMap, RunRegistry};
use crate::report::{format_anomalies, format_coverage};
use crate::source::date_helpers::parse_day_bound;
use crate::source::discovery::{discover_map_counts, discover_run_summaries};
use crate::source::{MapExtractSource, RunExtractSource};
use crate::types::DayInt;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SeedArg {
    Median,
    Mean,
}

impl From<SeedArg> for SeedStatistic {
    fn from(value: SeedArg) -> Self {
        match value {
            SeedArg::Median => SeedStatistic::Median,
            SeedArg::Mean => SeedStatistic::Mean,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "stability_check",
    disable_help_subcommand = true,
    about = "Reconcile run registry, run extracts and map counts",
    long_about = "Build the per-day livetime ledger for every configuration, write summaries and rates.json, and flag days whose rate leaves the rolling baseline.",
    after_help = "Extract files are discovered by name: root-summary_<cfg>.txt and mapcounts_<cfg>.json."
)]
struct StabilityCheckCli {
    #[arg(long, value_name = "PATH", help = "Good run list JSON")]
    registry: PathBuf,
    #[arg(
        long = "run-map",
        value_name = "PATH",
        help = "Run id to configuration JSON"
    )]
    run_map: PathBuf,
    #[arg(
        long = "extract-dir",
        value_name = "DIR",
        help = "Directory holding run-summary and map-count extracts"
    )]
    extract_dir: PathBuf,
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory for summaries, rates.json and the anomaly report"
    )]
    output_dir: PathBuf,
    #[command(flatten)]
    window: WindowArgs,
    #[arg(
        long = "configuration",
        value_name = "LABEL",
        help = "Only process this configuration, repeat as needed"
    )]
    configurations: Vec<String>,
    #[arg(
        long,
        default_value_t = DEFAULT_WARMUP,
        value_parser = parse_positive_usize,
        help = "Number of leading days used to seed the baseline"
    )]
    warmup: usize,
    #[arg(
        long,
        default_value_t = DEFAULT_LOW,
        help = "Fraction of the baseline at or below which a day is flagged under"
    )]
    low: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_HIGH,
        help = "Fraction of the baseline at or above which a day is flagged over"
    )]
    high: f64,
    #[arg(long, value_enum, default_value = "median", help = "Seed statistic")]
    seed: SeedArg,
}

#[derive(Debug, Parser)]
#[command(
    name = "livetime_summary",
    disable_help_subcommand = true,
    about = "Good-run livetime against total detector livetime",
    long_about = "Print, per configuration, good-run registry livetime and the successive-start up-time estimate in days."
)]
struct LivetimeSummaryCli {
    #[arg(long, value_name = "PATH", help = "Good run list JSON")]
    registry: PathBuf,
    #[arg(
        long = "run-map",
        value_name = "PATH",
        help = "Run id to configuration JSON"
    )]
    run_map: PathBuf,
    #[command(flatten)]
    window: WindowArgs,
    #[arg(
        long = "configuration",
        value_name = "LABEL",
        help = "Only report this configuration, repeat as needed"
    )]
    configurations: Vec<String>,
}

#[derive(Debug, clap::Args)]
struct WindowArgs {
    #[arg(
        long,
        value_name = "YYYYMMDD",
        default_value_t = DEFAULT_WINDOW_START,
        value_parser = parse_day_bound_arg,
        help = "Inclusive first day of the registry window"
    )]
    start: DayInt,
    #[arg(
        long,
        value_name = "YYYYMMDD",
        default_value_t = DEFAULT_WINDOW_END,
        value_parser = parse_day_bound_arg,
        help = "Exclusive last day of the registry window"
    )]
    end: DayInt,
    #[arg(long = "no-window", help = "Ignore --start/--end and keep every registry row")]
    unbounded: bool,
}

impl WindowArgs {
    fn to_window(&self) -> Result<DateWindow, Box<dyn Error>> {
        if self.unbounded {
            return Ok(DateWindow::unbounded());
        }
        if self.start >= self.end {
            return Err(format!(
                "--start ({}) must be before --end ({})",
                self.start, self.end
            )
            .into());
        }
        Ok(DateWindow::new(self.start, self.end))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Run the full reconciliation and anomaly scan from CLI arguments.
pub fn run_stability_check<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_tracing();

    let Some(cli) = parse_cli::<StabilityCheckCli, _>(
        std::iter::once("stability_check".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let scan = ScanConfig::default()
        .with_warmup(cli.warmup)
        .with_thresholds(cli.low, cli.high)
        .with_seed(cli.seed.into());
    let config = StabilityConfig::default()
        .with_window(cli.window.to_window()?)
        .with_scan(scan)
        .with_configurations(cli.configurations);
    let pipeline = StabilityPipeline::new(config)?;

    let run_configs = RunConfigMap::load(&cli.run_map)?;
    let registry = RunRegistry::load(&cli.registry, &run_configs, &pipeline.config().window)?;

    let run_sources: Vec<Box<dyn RunExtractSource>> = discover_run_summaries(&cli.extract_dir)
        .into_iter()
        .map(|source| Box::new(source) as Box<dyn RunExtractSource>)
        .collect();
    let map_sources: Vec<Box<dyn MapExtractSource>> = discover_map_counts(&cli.extract_dir)
        .into_iter()
        .map(|source| Box::new(source) as Box<dyn MapExtractSource>)
        .collect();
    if run_sources.is_empty() && map_sources.is_empty() {
        return Err(format!(
            "no run-summary or map-count extracts found under {}",
            cli.extract_dir.display()
        )
        .into());
    }

    let output = pipeline.run(&registry, &run_sources, &map_sources);
    let written = output.write_reports(&cli.output_dir)?;

    println!("=== stability check ===");
    println!("registry runs     : {}", registry.len());
    println!("run extracts      : {}", run_sources.len());
    println!("map extracts      : {}", map_sources.len());
    println!("diagnostics       : {}", output.diagnostics.len());
    for ledger in &output.ledgers {
        let flagged: usize = output
            .anomalies
            .iter()
            .filter(|report| report.configuration == ledger.configuration)
            .map(|report| {
                report.flagged(AnomalyKind::Over).len() + report.flagged(AnomalyKind::Under).len()
            })
            .sum();
        println!(
            "  {} : {} days, {} flagged",
            ledger.configuration,
            ledger.days.len(),
            flagged
        );
    }
    println!();
    print!("{}", format_anomalies(&output.anomalies));
    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(())
}

/// Print good-run livetime coverage per configuration from CLI arguments.
pub fn run_livetime_summary<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_tracing();

    let Some(cli) = parse_cli::<LivetimeSummaryCli, _>(
        std::iter::once("livetime_summary".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let window = cli.window.to_window()?;
    let config = StabilityConfig::default()
        .with_window(window)
        .with_configurations(cli.configurations);
    let run_configs = RunConfigMap::load(&cli.run_map)?;
    let registry = RunRegistry::load(&cli.registry, &run_configs, &config.window)?;

    for coverage in livetime_coverage(registry.records())
        .iter()
        .filter(|coverage| config.selects(&coverage.configuration))
    {
        println!("{}", format_coverage(coverage));
        if coverage.unknown_runs > 0 {
            println!(
                "  ({} good runs with unknown livetime not counted)",
                coverage.unknown_runs
            );
        }
    }
    Ok(())
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_day_bound_arg(raw: &str) -> Result<DayInt, String> {
    parse_day_bound(raw).ok_or_else(|| format!("invalid day '{raw}': expected YYYYMMDD or YYYY-MM-DD"))
}
