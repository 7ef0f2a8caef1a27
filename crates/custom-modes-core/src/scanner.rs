//! Candidate file discovery below a mode directory root.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Entry names never descended into or read
pub const DEFAULT_EXCLUDED_NAMES: &[&str] = &[
    // Version control
    ".git",
    ".svn",
    ".hg",
    // Dependencies
    "node_modules",
    // Build/cache directories
    "target",
    "dist",
    "build",
    "out",
    "__pycache__",
    ".cache",
    // OS artifacts
    ".DS_Store",
    "Thumbs.db",
];

/// Hidden directories that are walked regardless (auxiliary rule text)
pub const DEFAULT_INCLUDED_HIDDEN: &[&str] = &[".kilocode"];

pub const DEFAULT_MAX_DEPTH: usize = 16;

const CANDIDATE_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Files starting with this prefix are disabled or templates
const DISABLED_PREFIX: char = '_';

/// Rules deciding which entries the scanner visits
#[derive(Debug, Clone)]
pub struct ScanRules {
    pub excluded_names: Vec<String>,
    /// Hidden names walked anyway (overrides exclusion)
    pub included_hidden: Vec<String>,
    pub max_depth: usize,
}

impl Default for ScanRules {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ScanRules {
    pub fn with_defaults() -> Self {
        Self {
            excluded_names: DEFAULT_EXCLUDED_NAMES.iter().map(|s| s.to_string()).collect(),
            included_hidden: DEFAULT_INCLUDED_HIDDEN.iter().map(|s| s.to_string()).collect(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Add a name to exclude
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded_names.push(name.into());
        self
    }

    /// Add a hidden name to walk anyway
    pub fn include(mut self, name: impl Into<String>) -> Self {
        self.included_hidden.push(name.into());
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Whether the walker may visit (and, for directories, descend into) an entry
    fn allows(&self, name: &str, is_dir: bool) -> bool {
        if self.included_hidden.iter().any(|n| n == name) {
            return true;
        }
        if self.excluded_names.iter().any(|n| n == name) {
            return false;
        }
        !(is_dir && name.starts_with('.'))
    }

    /// Whether a file name is a mode file candidate
    pub fn is_candidate_file(&self, name: &OsStr) -> bool {
        let path = Path::new(name);
        let name = name.to_string_lossy();
        if name.starts_with(DISABLED_PREFIX) {
            return false;
        }
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| CANDIDATE_EXTENSIONS.contains(&ext.as_str()))
    }

    fn allows_entry(&self, entry: &DirEntry) -> bool {
        // The root itself is never filtered, even when it is hidden (`.kilocode/modes`)
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        self.allows(&name, entry.file_type().is_dir())
    }
}

/// A candidate mode file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Path relative to the scanned root
    pub relative: PathBuf,
}

/// Walk `root` and collect candidate files in file-name order.
///
/// A missing root contributes nothing. Unreadable directories are skipped.
pub fn scan(root: &Path, rules: &ScanRules) -> Vec<ScannedFile> {
    if !root.is_dir() {
        debug!(root = %root.display(), "mode directory absent");
        return Vec::new();
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .max_depth(rules.max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| rules.allows_entry(entry));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() || !rules.is_candidate_file(entry.file_name()) {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => continue,
        };

        files.push(ScannedFile {
            path: entry.path().to_path_buf(),
            relative,
        });
    }

    debug!(root = %root.display(), count = files.len(), "scanned mode directory");
    files
}
