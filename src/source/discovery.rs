use std::path::Path;

use tracing::debug;

use crate::constants::discovery::{
    MAP_COUNTS_EXTENSION, MAP_COUNTS_PREFIX, RUN_SUMMARY_EXTENSION, RUN_SUMMARY_PREFIX,
};
use crate::source::map_extract::MapCountsFile;
use crate::source::run_extract::RunSummaryFile;
use crate::transport::fs::{FileScanner, file_name_str};

/// Configuration label embedded in `<prefix><label>.<extension>`.
///
/// Example: `root-summary_IC86-2011.txt` with prefix `root-summary_` and
/// extension `txt` yields `IC86-2011`.
pub fn configuration_from_file_name<'a>(
    file_name: &'a str,
    prefix: &str,
    extension: &str,
) -> Option<&'a str> {
    let stem = file_name.strip_prefix(prefix)?;
    let (label, ext) = stem.rsplit_once('.')?;
    (ext.eq_ignore_ascii_case(extension) && !label.is_empty()).then_some(label)
}

/// Run-summary extracts directly under `dir`, one source per file.
pub fn discover_run_summaries(dir: &Path) -> Vec<RunSummaryFile> {
    let sources: Vec<RunSummaryFile> = FileScanner::new(dir)
        .with_max_depth(1)
        .files(|_| true)
        .into_iter()
        .filter_map(|path| {
            let name = file_name_str(&path)?;
            let label =
                configuration_from_file_name(name, RUN_SUMMARY_PREFIX, RUN_SUMMARY_EXTENSION)?;
            let label = label.to_string();
            let id = name.to_string();
            Some(RunSummaryFile::new(path, label).with_id(id))
        })
        .collect();
    debug!(dir = %dir.display(), found = sources.len(), "discovered run summaries");
    sources
}

/// Map-count documents directly under `dir`, one source per file.
pub fn discover_map_counts(dir: &Path) -> Vec<MapCountsFile> {
    let sources: Vec<MapCountsFile> = FileScanner::new(dir)
        .with_max_depth(1)
        .files(|_| true)
        .into_iter()
        .filter_map(|path| {
            let name = file_name_str(&path)?;
            let label =
                configuration_from_file_name(name, MAP_COUNTS_PREFIX, MAP_COUNTS_EXTENSION)?;
            let label = label.to_string();
            let id = name.to_string();
            Some(MapCountsFile::new(path, label).with_id(id))
        })
        .collect();
    debug!(dir = %dir.display(), found = sources.len(), "discovered map counts");
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MapExtractSource, RunExtractSource};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn labels_come_from_file_names() {
        assert_eq!(
            configuration_from_file_name("root-summary_IC86-2011.txt", "root-summary_", "txt"),
            Some("IC86-2011")
        );
        assert_eq!(
            configuration_from_file_name("root-summary_.txt", "root-summary_", "txt"),
            None
        );
        assert_eq!(
            configuration_from_file_name("mapcounts_IC86-2011.json", "root-summary_", "txt"),
            None
        );
        assert_eq!(
            configuration_from_file_name("root-summary_IC86-2011.csv", "root-summary_", "txt"),
            None
        );
    }

    #[test]
    fn discovers_sources_by_convention() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        for name in [
            "root-summary_IC86-2011.txt",
            "root-summary_IC86-2012.txt",
            "mapcounts_IC86-2011.json",
            "mtimes_IC86-2011.txt",
            "README.txt",
        ] {
            fs::write(root.join(name), b"").unwrap();
        }

        let runs = discover_run_summaries(root);
        let labels: Vec<&str> = runs.iter().map(|source| source.configuration()).collect();
        assert_eq!(labels, vec!["IC86-2011", "IC86-2012"]);
        assert_eq!(runs[0].id(), "root-summary_IC86-2011.txt");

        let maps = discover_map_counts(root);
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].configuration(), "IC86-2011");
    }
}
