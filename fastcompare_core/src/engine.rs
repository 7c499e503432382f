use crate::directory::{panic_message, DirectoryComparator, ProgressCallback};
use fastcompare_common::{
    CompareConfig, CompareStrategy, DiffEntry, DiffResult, FastCompareError, Result, RunId,
};
use std::cmp::Reverse;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;
use tracing::{error, info, info_span, warn};

/// Runs one full comparison of the configured right tree against the left tree
pub struct DiffEngine {
    config: CompareConfig,
    progress: Option<ProgressCallback>,
    run_id: RunId,
}

impl DiffEngine {
    pub fn new(config: CompareConfig) -> Self {
        Self {
            config,
            progress: None,
            run_id: RunId::new(),
        }
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Both roots must be configured and be existing directories.
    pub fn check_roots(&self) -> Result<(PathBuf, PathBuf)> {
        let left = self
            .config
            .left_path
            .clone()
            .ok_or_else(|| FastCompareError::Config("left path is not set".to_string()))?;
        let right = self
            .config
            .right_path
            .clone()
            .ok_or_else(|| FastCompareError::Config("right path is not set".to_string()))?;

        if !left.is_dir() {
            return Err(FastCompareError::Config(format!(
                "left path is not a directory: {}",
                left.display()
            )));
        }
        if !right.is_dir() {
            return Err(FastCompareError::Config(format!(
                "right path is not a directory: {}",
                right.display()
            )));
        }

        Ok((left, right))
    }

    /// Run the comparison on the current thread.
    ///
    /// Never fails outright: configuration problems, I/O errors and panics
    /// all come back as a result whose first entry is an error.
    pub fn compare(&self) -> DiffResult {
        let span = info_span!("compare", run = %self.run_id, strategy = %self.config.strategy);
        let _enter = span.enter();

        let (left, right) = match self.check_roots() {
            Ok(roots) => roots,
            Err(e) => {
                error!("{}", e);
                return DiffResult::failure(e.to_string());
            }
        };

        info!("Comparing {} against {}", right.display(), left.display());

        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.run(left, right))) {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                let message = e.describe();
                error!("Comparison failed: {}", message);
                DiffResult::failure(message)
            }
            Err(payload) => {
                let message = format!("panic during comparison: {}", panic_message(&*payload));
                error!("{}", message);
                DiffResult::failure(message)
            }
        };

        info!(
            "Comparison finished: success={}, entries={}",
            result.is_success(),
            result.len()
        );
        result
    }

    fn run(&self, left: PathBuf, right: PathBuf) -> Result<DiffResult> {
        let comparator = DirectoryComparator::new(left, right, &self.config, self.progress.clone());

        match self.config.strategy {
            CompareStrategy::Normal => comparator.run_normal()?,
            CompareStrategy::BoundedFlat => comparator.run_bounded_flat(self.config.thread_limit)?,
        }

        let mut entries = comparator.into_entries();
        validate_entries(&mut entries);

        let mut result = DiffResult::new(entries);
        if result.is_success() && self.config.sort_by_date {
            let mut entries = result.into_entries();
            sort_by_date(&mut entries);
            result = DiffResult::new(entries);
        }

        Ok(result)
    }

    /// Run the comparison on a background thread and hand the outcome to
    /// `on_complete` exactly once.
    ///
    /// Missing or invalid roots are reported synchronously and no thread is
    /// started; `None` is returned in that case.
    pub fn spawn<F>(self, on_complete: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(bool, Vec<DiffEntry>) + Send + 'static,
    {
        if let Err(e) = self.check_roots() {
            error!("{}", e);
            on_complete(false, vec![DiffEntry::Error(e.to_string())]);
            return None;
        }

        let slot = Arc::new(Mutex::new(Some(on_complete)));
        let worker_slot = Arc::clone(&slot);

        let spawned = thread::Builder::new()
            .name("fastcompare-diff".to_string())
            .spawn(move || {
                let result = self.compare();
                let callback = worker_slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(callback) = callback {
                    let success = result.is_success();
                    callback(success, result.into_entries());
                }
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to start comparison thread: {}", e);
                let callback = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(callback) = callback {
                    callback(false, vec![DiffEntry::Error(format!("failed to start comparison: {e}"))]);
                }
                None
            }
        }
    }
}

/// Re-check that every reported path still exists. The first missing one
/// puts an error naming its index at the front and stops the check.
pub fn validate_entries(entries: &mut Vec<DiffEntry>) {
    let missing = entries.iter().enumerate().find_map(|(index, entry)| match entry {
        DiffEntry::Path(path) if !path.exists() => Some((index, path.clone())),
        _ => None,
    });

    if let Some((index, path)) = missing {
        let err = FastCompareError::Validation { index, path };
        warn!("{}", err);
        entries.insert(0, DiffEntry::Error(err.to_string()));
    }
}

/// Stable sort, newest modification time first. Diagnostics stay in front;
/// paths whose metadata cannot be read sort as the epoch.
pub fn sort_by_date(entries: &mut [DiffEntry]) {
    entries.sort_by_cached_key(|entry| match entry {
        DiffEntry::Error(_) => (false, Reverse(SystemTime::UNIX_EPOCH)),
        DiffEntry::Path(path) => {
            let modified = fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (true, Reverse(modified))
        }
    });
}
