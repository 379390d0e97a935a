/// Filesystem listing and modification-time helpers.
pub mod fs;
