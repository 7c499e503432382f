use crate::file_compare::FileComparator;
use crate::path_mapper::map_right_to_left;
use crate::scanner::FolderScanner;
use crate::suffix_filter::SuffixFilter;
use crossbeam::channel::{self, Receiver};
use fastcompare_common::{CompareConfig, DiffEntry, FastCompareError, Result};
use rayon::prelude::*;
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

/// Progress sink: `(processed_directories, total_directories)`.
/// `total` is 0 when no count was taken.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// The shared result list. Every mutation goes through one lock.
#[derive(Debug, Default)]
pub(crate) struct DiffCollector {
    entries: Mutex<Vec<DiffEntry>>,
}

impl DiffCollector {
    fn lock(&self) -> MutexGuard<'_, Vec<DiffEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, path: PathBuf) {
        self.lock().push(DiffEntry::Path(path));
    }

    pub(crate) fn extend(&self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }
        self.lock().extend(paths.into_iter().map(DiffEntry::Path));
    }

    /// Diagnostics always go to the front; a leading error marks the run failed.
    pub(crate) fn push_error_front(&self, message: String) {
        self.lock().insert(0, DiffEntry::Error(message));
    }

    pub(crate) fn into_entries(self) -> Vec<DiffEntry> {
        self.entries.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serialises the counter and the callback so observers see `current`
/// increase monotonically.
struct ProgressReporter {
    callback: Option<ProgressCallback>,
    state: Mutex<(usize, usize)>,
}

impl ProgressReporter {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            state: Mutex::new((0, 0)),
        }
    }

    fn is_enabled(&self) -> bool {
        self.callback.is_some()
    }

    fn start(&self, total: usize) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.1 = total;
        if let Some(callback) = &self.callback {
            callback(state.0, state.1);
        }
    }

    fn step(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.0 += 1;
        if let Some(callback) = &self.callback {
            callback(state.0, state.1);
        }
    }
}

/// Outcome of one queued file comparison
enum PairOutcome {
    Same,
    Changed(PathBuf),
    Failed(FastCompareError),
}

/// Compares a right tree against a left tree and collects what is new or
/// changed on the right.
pub struct DirectoryComparator {
    left_root: PathBuf,
    right_root: PathBuf,
    filter: SuffixFilter,
    files: FileComparator,
    scanner: FolderScanner,
    show_progress: bool,
    collector: DiffCollector,
    progress: ProgressReporter,
}

impl DirectoryComparator {
    pub fn new(
        left_root: impl Into<PathBuf>,
        right_root: impl Into<PathBuf>,
        config: &CompareConfig,
        progress: Option<ProgressCallback>,
    ) -> Self {
        let filter = SuffixFilter::from_config(config);
        Self {
            left_root: left_root.into(),
            right_root: right_root.into(),
            scanner: FolderScanner::new(filter.clone()),
            filter,
            files: FileComparator::from_config(config),
            show_progress: config.show_progress,
            collector: DiffCollector::default(),
            progress: ProgressReporter::new(progress),
        }
    }

    /// Normal strategy: recurse from the roots, one directory at a time.
    pub fn run_normal(&self) -> Result<()> {
        if self.show_progress && self.progress.is_enabled() {
            let total = self.scanner.count_subdirectories(&self.right_root)? + 1;
            self.progress.start(total);
        }

        self.compare_children(&self.left_root, &self.right_root, true)
    }

    /// Bounded-flat strategy: enumerate every right subdirectory first, then
    /// compare each one as an independent, non-recursive unit.
    ///
    /// A unit is admitted while no more than `limit` units are in flight.
    /// All units are joined before this returns.
    pub fn run_bounded_flat(&self, limit: usize) -> Result<()> {
        let subdirs = self.scanner.subdirectories(&self.right_root)?;
        self.progress.start(subdirs.len() + 1);

        self.compare_children(&self.left_root, &self.right_root, false)?;

        // Tokens in the channel are in-flight units. The channel preallocates
        // its slots, so never ask for more than there are units.
        let capacity = limit.min(subdirs.len()).saturating_add(1);
        let (gate_tx, gate_rx) = channel::bounded::<()>(capacity);

        let outcomes = crossbeam::scope(|scope| -> Result<Vec<Result<()>>> {
            let mut handles = Vec::new();

            for right_dir in &subdirs {
                let left_dir = map_right_to_left(&self.left_root, &self.right_root, right_dir)?;

                // An ancestor is new on the left and was already reported.
                if !left_dir.parent().is_some_and(Path::is_dir) {
                    continue;
                }

                if !left_dir.is_dir() {
                    self.report_new_directory(right_dir)?;
                    continue;
                }

                gate_tx
                    .send(())
                    .map_err(|_| FastCompareError::Fault("admission gate closed".to_string()))?;
                let gate = &gate_rx;

                handles.push(scope.spawn(move |_| {
                    let _permit = GatePermit(gate);
                    self.compare_children(&left_dir, right_dir, false)
                }));
            }

            debug!("Dispatched {} directory units", handles.len());
            Ok(handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| Err(FastCompareError::Fault(panic_message(&*payload))))
                })
                .collect())
        })
        .map_err(|payload| FastCompareError::Fault(panic_message(&*payload)))??;

        outcomes.into_iter().collect()
    }

    /// Compare the immediate children of one directory pair.
    ///
    /// File comparisons run in parallel and are all finished before progress
    /// is reported or any subdirectory is visited.
    pub fn compare_children(&self, left: &Path, right: &Path, recursive: bool) -> Result<()> {
        let listing = self.scanner.list_children(right)?;

        let mut pending = Vec::new();
        for right_file in listing.files {
            if self.filter.should_exclude(&right_file) {
                continue;
            }

            let left_file = map_right_to_left(left, right, &right_file)?;
            if !left_file.is_file() {
                debug!("New file {}", right_file.display());
                self.collector.push(right_file);
                continue;
            }

            if self.files.skip_by_date(&left_file, &right_file) {
                continue;
            }

            pending.push((left_file, right_file));
        }

        let outcomes: Vec<PairOutcome> = pending
            .into_par_iter()
            .map(|(left_file, right_file)| match self.files.compare(&left_file, &right_file) {
                Ok(true) => PairOutcome::Same,
                Ok(false) => PairOutcome::Changed(right_file),
                Err(e) => PairOutcome::Failed(e),
            })
            .collect();

        let mut changed = Vec::new();
        for outcome in outcomes {
            match outcome {
                PairOutcome::Same => {}
                PairOutcome::Changed(path) => changed.push(path),
                PairOutcome::Failed(e) => {
                    let message = e.describe();
                    error!("{}", message);
                    self.collector.push_error_front(message);
                }
            }
        }
        self.collector.extend(changed);

        self.progress.step();

        if !recursive {
            return Ok(());
        }

        for right_dir in listing.dirs {
            let left_dir = map_right_to_left(left, right, &right_dir)?;
            if !left_dir.is_dir() {
                self.report_new_directory(&right_dir)?;
                continue;
            }
            self.compare_children(&left_dir, &right_dir, true)?;
        }

        Ok(())
    }

    /// A directory missing on the left is reported as one entry, without its
    /// contents, unless everything inside it is excluded.
    fn report_new_directory(&self, right_dir: &Path) -> Result<()> {
        if self.scanner.has_reportable_content(right_dir)? {
            debug!("New directory {}", right_dir.display());
            self.collector.push(right_dir.to_path_buf());
        } else {
            debug!("Skipping new directory with only excluded files {}", right_dir.display());
        }
        Ok(())
    }

    pub fn into_entries(self) -> Vec<DiffEntry> {
        let entries = self.collector.into_entries();
        info!("Collected {} entries", entries.len());
        entries
    }
}

/// Releases one admission slot when a unit finishes, even by panicking.
struct GatePermit<'a>(&'a Receiver<()>);

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        let _ = self.0.try_recv();
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
