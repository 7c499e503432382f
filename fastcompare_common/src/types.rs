use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Separator used when the exclusion list is edited as a single string
pub const SUFFIX_SEPARATOR: char = '|';

/// Suffix excluded when nothing else is configured
pub const DEFAULT_EXCLUDED_SUFFIX: &str = ".meta";

/// How a comparison walks the right tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareStrategy {
    /// Live recursion, one directory at a time
    #[default]
    Normal,
    /// Enumerate every subdirectory first, then compare them as independent,
    /// concurrency-capped units
    BoundedFlat,
}

impl fmt::Display for CompareStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareStrategy::Normal => write!(f, "normal"),
            CompareStrategy::BoundedFlat => write!(f, "bounded-flat"),
        }
    }
}

/// Settings snapshot for one comparison or patch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Baseline tree
    pub left_path: Option<PathBuf>,

    /// Tree checked for differences
    pub right_path: Option<PathBuf>,

    /// Where patch directories are created
    pub patch_path: Option<PathBuf>,

    /// Lowercase file suffixes that are never compared or copied
    pub exclude_suffixes: Vec<String>,

    /// Treat files with equal modification times as identical without
    /// reading them. This is a heuristic, not a content guarantee.
    pub compare_by_date: bool,

    /// After a content match, copy the left modification time onto the right
    /// file (only together with `compare_by_date`)
    pub sync_date_on_match: bool,

    /// Order results by modification time, newest first
    pub sort_by_date: bool,

    /// Count directories up front so progress has a total (Normal strategy)
    pub show_progress: bool,

    /// Zip the patch directory and remove the uncompressed copy
    pub compress_patch: bool,

    pub strategy: CompareStrategy,

    /// Maximum in-flight directory units for the bounded-flat strategy
    pub thread_limit: usize,

    /// Version recorded the last time the settings were saved
    pub last_version: Option<String>,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            left_path: None,
            right_path: None,
            patch_path: None,
            exclude_suffixes: vec![DEFAULT_EXCLUDED_SUFFIX.to_string()],
            compare_by_date: true,
            sync_date_on_match: false,
            sort_by_date: true,
            show_progress: true,
            compress_patch: true,
            strategy: CompareStrategy::Normal,
            thread_limit: 120,
            last_version: None,
        }
    }
}

impl CompareConfig {
    /// Exclusion list joined with `|`
    pub fn exclude_suffix_string(&self) -> String {
        self.exclude_suffixes.join(&SUFFIX_SEPARATOR.to_string())
    }

    /// Replace the exclusion list from a `|`-separated string
    pub fn set_exclude_suffix_string(&mut self, value: &str) {
        self.exclude_suffixes = split_suffix_list(value);
    }
}

/// Split a `|`-separated suffix list. Segments are trimmed and lowercased;
/// empty segments are dropped, so `"a||b"` and `"a|b"` are the same list.
pub fn split_suffix_list(value: &str) -> Vec<String> {
    value
        .split(SUFFIX_SEPARATOR)
        .map(|segment| segment.trim().to_lowercase())
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// One line of a comparison result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffEntry {
    /// A right-tree file or directory that is new or changed
    Path(PathBuf),
    /// A diagnostic standing in for a failure
    Error(String),
}

impl DiffEntry {
    pub fn path(&self) -> Option<&Path> {
        match self {
            DiffEntry::Path(path) => Some(path.as_path()),
            DiffEntry::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DiffEntry::Error(_))
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffEntry::Path(path) => write!(f, "{}", path.display()),
            DiffEntry::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// Outcome of one comparison run
///
/// A run failed exactly when its first entry is a [`DiffEntry::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffResult {
    entries: Vec<DiffEntry>,
}

impl DiffResult {
    pub fn new(entries: Vec<DiffEntry>) -> Self {
        Self { entries }
    }

    /// Single-entry failure
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            entries: vec![DiffEntry::Error(message.into())],
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.entries.first(), Some(DiffEntry::Error(_)))
    }

    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<DiffEntry> {
        self.entries
    }

    /// Reported paths, skipping diagnostics
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter_map(|entry| entry.path().map(Path::to_path_buf))
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                DiffEntry::Error(message) => Some(message.as_str()),
                DiffEntry::Path(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identifier attached to every comparison run in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
