/// Detector configuration label (the top-level partition key).
/// Examples: `IC86-2011`, `IC86-2022`
pub type ConfigLabel = String;
/// Integer run identifier from the good run list.
/// Example: `118175`
pub type RunId = u32;
/// Identifier for an extract source (usually derived from its file name).
/// Examples: `root-summary_IC86-2011`, `mapcounts_IC86-2011`
pub type SourceId = String;
/// File path strings carried in errors and fingerprints.
/// Example: `/data/stability/root-summary_IC86-2011.txt`
pub type PathString = String;
/// Livetime or duration in whole seconds.
pub type Seconds = u64;
/// Event count reported by an extract source.
pub type EventCount = u64;
/// Calendar date packed as a `YYYYMMDD` integer.
/// Example: `20100513`
pub type DayInt = u32;
