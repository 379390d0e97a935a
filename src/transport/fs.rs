use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Filesystem listing of source files under a root directory.
pub struct FileScanner {
    root: PathBuf,
    follow_links: bool,
    max_depth: Option<usize>,
}

impl FileScanner {
    /// Create a scanner rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_links: false,
            max_depth: None,
        }
    }

    /// Configure symlink traversal.
    pub fn with_follow_symlinks(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    /// Limit recursion; `1` lists only the root's direct children.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Regular files accepted by `keep`, sorted by path.
    ///
    /// Unreadable entries are skipped. A missing root yields an empty list.
    pub fn files<F>(&self, mut keep: F) -> Vec<PathBuf>
    where
        F: FnMut(&Path) -> bool,
    {
        let mut walker = WalkDir::new(&self.root);
        if self.follow_links {
            walker = walker.follow_links(true);
        }
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }
        let mut paths: Vec<PathBuf> = walker
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| keep(path))
            .collect();
        paths.sort();
        paths
    }
}

/// True if the path has the given extension (case-insensitive, no dot).
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// File name as UTF-8, if any.
pub fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Best-effort file modified time.
pub fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}
