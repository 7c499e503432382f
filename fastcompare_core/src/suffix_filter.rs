use fastcompare_common::{split_suffix_list, CompareConfig, DEFAULT_EXCLUDED_SUFFIX, SUFFIX_SEPARATOR};
use std::path::Path;

/// Case-insensitive file suffix exclusion
///
/// Only ever consulted for files. Directories are never suffix-filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixFilter {
    suffixes: Vec<String>,
}

impl SuffixFilter {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = suffixes
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { suffixes }
    }

    /// Filter that excludes nothing
    pub fn none() -> Self {
        Self { suffixes: Vec::new() }
    }

    pub fn from_config(config: &CompareConfig) -> Self {
        Self::new(&config.exclude_suffixes)
    }

    /// Parse a `|`-separated list, dropping empty segments
    pub fn parse(value: &str) -> Self {
        Self {
            suffixes: split_suffix_list(value),
        }
    }

    pub fn to_pipe_string(&self) -> String {
        self.suffixes.join(&SUFFIX_SEPARATOR.to_string())
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    pub fn should_exclude(&self, path: &Path) -> bool {
        if self.suffixes.is_empty() {
            return false;
        }
        let lowered = path.to_string_lossy().to_lowercase();
        self.suffixes.iter().any(|suffix| lowered.ends_with(suffix.as_str()))
    }
}

impl Default for SuffixFilter {
    fn default() -> Self {
        Self::new([DEFAULT_EXCLUDED_SUFFIX])
    }
}
