use fastcompare_common::{FastCompareError, Result};
use std::path::{Path, PathBuf};

/// Map a path inside the right tree onto the same relative location under
/// `left_root`.
///
/// Pure prefix substitution, no existence checks. `right_path` must lie under
/// `right_root`; anything else is a caller error and is reported as
/// [`FastCompareError::Path`].
pub fn map_right_to_left(left_root: &Path, right_root: &Path, right_path: &Path) -> Result<PathBuf> {
    rebase(right_root, left_root, right_path)
}

/// Inverse of [`map_right_to_left`]
pub fn map_left_to_right(left_root: &Path, right_root: &Path, left_path: &Path) -> Result<PathBuf> {
    rebase(left_root, right_root, left_path)
}

fn rebase(from_root: &Path, to_root: &Path, path: &Path) -> Result<PathBuf> {
    let relative = path.strip_prefix(from_root).map_err(|_| {
        FastCompareError::Path(format!(
            "{} is not inside {}",
            path.display(),
            from_root.display()
        ))
    })?;

    if relative.as_os_str().is_empty() {
        Ok(to_root.to_path_buf())
    } else {
        Ok(to_root.join(relative))
    }
}

/// A fixed pair of roots, for callers that map many paths
#[derive(Debug, Clone)]
pub struct PathMapper {
    left_root: PathBuf,
    right_root: PathBuf,
}

impl PathMapper {
    pub fn new(left_root: impl Into<PathBuf>, right_root: impl Into<PathBuf>) -> Self {
        Self {
            left_root: left_root.into(),
            right_root: right_root.into(),
        }
    }

    pub fn to_left(&self, right_path: &Path) -> Result<PathBuf> {
        map_right_to_left(&self.left_root, &self.right_root, right_path)
    }

    pub fn to_right(&self, left_path: &Path) -> Result<PathBuf> {
        map_left_to_right(&self.left_root, &self.right_root, left_path)
    }
}
