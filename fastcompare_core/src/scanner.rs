use crate::suffix_filter::SuffixFilter;
use fastcompare_common::{FastCompareError, Result};
use jwalk::WalkDir;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Immediate children of one directory, each list sorted by path
#[derive(Debug, Default, Clone)]
pub struct DirectoryListing {
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
}

/// Tree enumeration using jwalk
#[derive(Debug, Clone)]
pub struct FolderScanner {
    filter: SuffixFilter,
}

impl FolderScanner {
    pub fn new(filter: SuffixFilter) -> Self {
        Self { filter }
    }

    /// List the files and subdirectories directly inside `dir`.
    ///
    /// Symlinks to files count as files. Symlinked directories are not
    /// followed, matching [`FolderScanner::subdirectories`], and dangling
    /// links are skipped.
    pub fn list_children(&self, dir: &Path) -> Result<DirectoryListing> {
        let mut listing = DirectoryListing::default();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                listing.dirs.push(path);
            } else if file_type.is_symlink() {
                match fs::metadata(&path) {
                    Ok(meta) if meta.is_file() => listing.files.push(path),
                    Ok(_) => debug!("Not following directory link {}", path.display()),
                    Err(e) => debug!("Skipping dangling link {}: {}", path.display(), e),
                }
            } else {
                listing.files.push(path);
            }
        }

        listing.files.sort();
        listing.dirs.sort();
        Ok(listing)
    }

    /// Every directory below `root` at any depth, excluding `root` itself,
    /// in sorted walk order.
    pub fn subdirectories(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();

        let walker = WalkDir::new(root)
            .skip_hidden(false)
            .follow_links(false)
            .sort(true);

        for entry in walker {
            let entry = entry.map_err(|e| FastCompareError::Walk(e.to_string()))?;

            // Skip the synthetic root entry
            if entry.depth() == 0 {
                continue;
            }

            if entry.file_type().is_dir() {
                dirs.push(entry.path());
            }
        }

        debug!("Found {} subdirectories under {:?}", dirs.len(), root);
        Ok(dirs)
    }

    pub fn count_subdirectories(&self, root: &Path) -> Result<usize> {
        self.subdirectories(root).map(|dirs| dirs.len())
    }

    /// Whether a directory that is new on the right should be reported.
    ///
    /// True if it holds no files at all, or at least one file anywhere below
    /// it that the suffix filter keeps. A directory made only of excluded
    /// files is not worth reporting.
    pub fn has_reportable_content(&self, dir: &Path) -> Result<bool> {
        let walker = WalkDir::new(dir)
            .skip_hidden(false)
            .follow_links(false);

        let mut saw_file = false;
        for entry in walker {
            let entry = entry.map_err(|e| FastCompareError::Walk(e.to_string()))?;
            if entry.file_type().is_dir() {
                continue;
            }
            saw_file = true;
            if !self.filter.should_exclude(&entry.path()) {
                return Ok(true);
            }
        }

        Ok(!saw_file)
    }
}
