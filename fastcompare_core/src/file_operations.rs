use crate::suffix_filter::SuffixFilter;
use fastcompare_common::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Copy,
    CreateDir,
    TouchTimestamp,
}

/// Result of a file operation
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub operation: FileOperation,
    pub bytes_processed: u64,
}

/// Filesystem mutations used by timestamp sync and patch building
#[derive(Debug, Clone, Default)]
pub struct FileOperations;

impl FileOperations {
    pub fn new() -> Self {
        Self
    }

    /// Copy a file, creating the destination's parent directories. The
    /// source modification time is carried over.
    pub fn copy_file(&self, source: &Path, dest: &Path) -> Result<OperationResult> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!("Copying {} to {}", source.display(), dest.display());
        let bytes = fs::copy(source, dest)?;

        if let Ok(modified) = fs::metadata(source).and_then(|m| m.modified()) {
            let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(modified));
        }

        Ok(OperationResult {
            source: source.to_path_buf(),
            destination: dest.to_path_buf(),
            operation: FileOperation::Copy,
            bytes_processed: bytes,
        })
    }

    /// Copy the modification time of `source` onto `dest`
    pub fn touch_timestamp(&self, source: &Path, dest: &Path) -> Result<OperationResult> {
        let modified = fs::metadata(source)?.modified()?;

        filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(modified))?;

        debug!(
            "Synced timestamp from {} to {}",
            source.display(),
            dest.display()
        );

        Ok(OperationResult {
            source: source.to_path_buf(),
            destination: dest.to_path_buf(),
            operation: FileOperation::TouchTimestamp,
            bytes_processed: 0,
        })
    }

    /// Recreate `source` under `dest`, skipping files the filter excludes.
    /// Empty directories are recreated as well.
    pub fn copy_tree(
        &self,
        source: &Path,
        dest: &Path,
        filter: &SuffixFilter,
    ) -> Result<Vec<OperationResult>> {
        let mut results = Vec::new();
        self.copy_tree_into(source, dest, filter, &mut results)?;
        info!(
            "Copied directory {} to {} ({} operations)",
            source.display(),
            dest.display(),
            results.len()
        );
        Ok(results)
    }

    fn copy_tree_into(
        &self,
        source: &Path,
        dest: &Path,
        filter: &SuffixFilter,
        results: &mut Vec<OperationResult>,
    ) -> Result<()> {
        if !dest.is_dir() {
            fs::create_dir_all(dest)?;
            results.push(OperationResult {
                source: source.to_path_buf(),
                destination: dest.to_path_buf(),
                operation: FileOperation::CreateDir,
                bytes_processed: 0,
            });
        }

        let mut children = fs::read_dir(source)?
            .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
            .collect::<io::Result<Vec<_>>>()?;
        children.sort_by(|a, b| a.0.cmp(&b.0));

        for (child, file_type) in children {
            let Some(name) = child.file_name() else {
                continue;
            };
            let target = dest.join(name);

            if file_type.is_dir() {
                self.copy_tree_into(&child, &target, filter, results)?;
                continue;
            }

            // Same link rules as the scanner. Only links to files are copied.
            if file_type.is_symlink() {
                match fs::metadata(&child) {
                    Ok(meta) if meta.is_file() => {}
                    Ok(_) => {
                        debug!("Not following directory link {}", child.display());
                        continue;
                    }
                    Err(e) => {
                        debug!("Skipping dangling link {}: {}", child.display(), e);
                        continue;
                    }
                }
            }

            if filter.should_exclude(&child) {
                debug!("Skipping excluded file {}", child.display());
            } else {
                results.push(self.copy_file(&child, &target)?);
            }
        }

        Ok(())
    }
}
