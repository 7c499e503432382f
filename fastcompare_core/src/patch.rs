use crate::archive::Archiver;
use crate::directory::ProgressCallback;
use crate::file_operations::{FileOperations, OperationResult};
use crate::path_mapper::PathMapper;
use crate::suffix_filter::SuffixFilter;
use chrono::{DateTime, Local};
use fastcompare_common::{CompareConfig, FastCompareError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, info_span};

/// One diffed path and where it lands inside the patch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchManifestEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// What a patch build produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Directory holding the result: the patch directory itself, or the
    /// directory containing the archive. `None` when nothing was built.
    pub final_path: Option<PathBuf>,
    /// Entries copied into the patch, in input order
    pub copied: Vec<PatchManifestEntry>,
    /// The archive file, when the patch was compressed
    pub archived: Option<PathBuf>,
}

impl PatchOutcome {
    pub fn skipped() -> Self {
        Self::default()
    }

    pub fn is_skipped(&self) -> bool {
        self.final_path.is_none()
    }

    pub fn final_path_string(&self) -> String {
        self.final_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

/// Copies the result of a comparison into a fresh patch directory
pub struct PatchBuilder {
    config: CompareConfig,
    filter: SuffixFilter,
    ops: FileOperations,
    progress: Option<ProgressCallback>,
    archiver: Option<Box<dyn Archiver>>,
}

impl PatchBuilder {
    pub fn new(config: &CompareConfig) -> Self {
        Self {
            config: config.clone(),
            filter: SuffixFilter::from_config(config),
            ops: FileOperations::new(),
            progress: None,
            archiver: default_archiver(),
        }
    }

    /// Progress is `(index, total)`, reported before each entry is copied
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn with_archiver(mut self, archiver: Box<dyn Archiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    /// `{os}_{version}_{YYYYmmdd-HHMM-SS}_[{label}]`
    pub fn patch_dir_name(&self, label: &str, now: DateTime<Local>) -> String {
        let version = self
            .config
            .last_version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or("unversioned");

        format!(
            "{}_{}_{}_[{}]",
            std::env::consts::OS,
            version,
            now.format("%Y%m%d-%H%M-%S"),
            label
        )
    }

    /// Build a patch from `paths`, which must lie under the configured right
    /// root. Does nothing when no patch location is configured.
    pub fn create_patch(&self, paths: &[PathBuf], label: &str) -> Result<PatchOutcome> {
        let Some(patch_root) = self.config.patch_path.clone() else {
            info!("No patch location configured, skipping patch");
            return Ok(PatchOutcome::skipped());
        };
        let right_root = self
            .config
            .right_path
            .clone()
            .ok_or_else(|| FastCompareError::Config("right path is not set".to_string()))?;

        let span = info_span!("patch", label = %label);
        let _enter = span.enter();

        let patch_dir = patch_root.join(self.patch_dir_name(label, Local::now()));
        if patch_dir.exists() {
            debug!("Removing existing {}", patch_dir.display());
            fs::remove_dir_all(&patch_dir)?;
        }
        fs::create_dir_all(&patch_dir)?;

        let mapper = PathMapper::new(&patch_dir, &right_root);
        let total = paths.len();
        let mut copied = Vec::with_capacity(total);

        for (index, source) in paths.iter().enumerate() {
            if let Some(progress) = &self.progress {
                progress(index, total);
            }

            let destination = mapper.to_left(source)?;
            if self.copy_entry(source, &destination)? {
                copied.push(PatchManifestEntry {
                    source: source.clone(),
                    destination,
                });
            }
        }

        info!(
            "Copied {} of {} entries into {}",
            copied.len(),
            total,
            patch_dir.display()
        );

        if !self.config.compress_patch {
            return Ok(PatchOutcome {
                final_path: Some(patch_dir),
                copied,
                archived: None,
            });
        }

        let archive_path = self.compress(&patch_root, &patch_dir)?;
        Ok(PatchOutcome {
            final_path: Some(patch_root),
            copied,
            archived: Some(archive_path),
        })
    }

    fn copy_entry(&self, source: &Path, destination: &Path) -> Result<bool> {
        if source.is_dir() {
            let results: Vec<OperationResult> = self.ops.copy_tree(source, destination, &self.filter)?;
            debug!("{} operations for {}", results.len(), source.display());
            return Ok(true);
        }

        if self.filter.should_exclude(source) {
            debug!("Skipping excluded {}", source.display());
            return Ok(false);
        }

        self.ops.copy_file(source, destination)?;
        Ok(true)
    }

    fn compress(&self, patch_root: &Path, patch_dir: &Path) -> Result<PathBuf> {
        let archiver = self.archiver.as_ref().ok_or_else(|| {
            FastCompareError::Archive("compression requested but no archiver is available".to_string())
        })?;

        let name = patch_dir
            .file_name()
            .ok_or_else(|| FastCompareError::Path(format!("{} has no name", patch_dir.display())))?
            .to_string_lossy();
        let archive_path = patch_root.join(format!("{}.{}", name, archiver.extension()));

        archiver.archive(patch_dir, &archive_path)?;
        fs::remove_dir_all(patch_dir)?;

        info!("Patch archived to {}", archive_path.display());
        Ok(archive_path)
    }

    /// Build the patch on a background thread. `on_complete` receives the
    /// final path, or an empty string when nothing was built or the build
    /// failed. It runs exactly once, even if no thread could be started.
    pub fn spawn<F>(self, paths: Vec<PathBuf>, label: String, on_complete: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(String) + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Some(on_complete)));
        let worker_slot = Arc::clone(&slot);

        let spawned = thread::Builder::new()
            .name("fastcompare-patch".to_string())
            .spawn(move || {
                let final_path = match self.create_patch(&paths, &label) {
                    Ok(outcome) => outcome.final_path_string(),
                    Err(e) => {
                        error!("Patch build failed: {}", e.describe());
                        String::new()
                    }
                };
                let callback = worker_slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(callback) = callback {
                    callback(final_path);
                }
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to start patch thread: {}", e);
                let callback = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(callback) = callback {
                    callback(String::new());
                }
                None
            }
        }
    }
}

#[cfg(feature = "archives")]
fn default_archiver() -> Option<Box<dyn Archiver>> {
    Some(Box::new(crate::archive::ZipArchiver))
}

#[cfg(not(feature = "archives"))]
fn default_archiver() -> Option<Box<dyn Archiver>> {
    None
}
