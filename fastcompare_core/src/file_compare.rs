use crate::file_operations::FileOperations;
use fastcompare_common::{CompareConfig, FastCompareError, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Decides whether two existing files hold the same bytes
#[derive(Debug, Clone)]
pub struct FileComparator {
    compare_by_date: bool,
    sync_date_on_match: bool,
    ops: FileOperations,
}

impl FileComparator {
    pub fn new(compare_by_date: bool, sync_date_on_match: bool) -> Self {
        Self {
            compare_by_date,
            sync_date_on_match,
            ops: FileOperations::new(),
        }
    }

    pub fn from_config(config: &CompareConfig) -> Self {
        Self::new(config.compare_by_date, config.sync_date_on_match)
    }

    /// Date fast path: with date comparison enabled, equal modification times
    /// count as identical and the content is never read.
    ///
    /// Two files can share an mtime and still differ; this trades that case
    /// for not opening every unchanged file.
    pub fn skip_by_date(&self, left: &Path, right: &Path) -> bool {
        self.compare_by_date && timestamps_match(left, right)
    }

    /// Size check, then a full byte comparison.
    ///
    /// Any read failure becomes [`FastCompareError::Comparison`] carrying both
    /// paths.
    pub fn are_identical(left: &Path, right: &Path) -> Result<bool> {
        let pair_error = |source| FastCompareError::Comparison {
            left: left.to_path_buf(),
            right: right.to_path_buf(),
            source,
        };

        let left_len = fs::metadata(left).map_err(pair_error)?.len();
        let right_len = fs::metadata(right).map_err(pair_error)?.len();
        if left_len != right_len {
            return Ok(false);
        }

        let left_bytes = fs::read(left).map_err(pair_error)?;
        let right_bytes = fs::read(right).map_err(pair_error)?;
        Ok(left_bytes == right_bytes)
    }

    /// Compare a pair and, when configured, align the right file's mtime with
    /// the left one after a content match.
    pub fn compare(&self, left: &Path, right: &Path) -> Result<bool> {
        let identical = Self::are_identical(left, right)?;

        if identical
            && self.compare_by_date
            && self.sync_date_on_match
            && !timestamps_match(left, right)
        {
            self.sync_timestamp(left, right);
        }

        debug!(
            "{} {} {}",
            right.display(),
            if identical { "==" } else { "!=" },
            left.display()
        );
        Ok(identical)
    }

    /// Best-effort; a failure here never changes a comparison verdict.
    pub fn sync_timestamp(&self, left: &Path, right: &Path) {
        if let Err(e) = self.ops.touch_timestamp(left, right) {
            warn!("Failed to sync timestamp onto {}: {}", right.display(), e);
        }
    }
}

/// True when both modification times can be read and are equal
pub fn timestamps_match(left: &Path, right: &Path) -> bool {
    let modified = |path: &Path| fs::metadata(path).and_then(|m| m.modified()).ok();
    match (modified(left), modified(right)) {
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}
