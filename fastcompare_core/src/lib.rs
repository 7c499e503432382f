pub mod archive;
pub mod directory;
pub mod engine;
pub mod file_compare;
pub mod file_operations;
pub mod patch;
pub mod path_mapper;
pub mod scanner;
pub mod suffix_filter;

pub use archive::Archiver;
#[cfg(feature = "archives")]
pub use archive::ZipArchiver;
pub use directory::{DirectoryComparator, ProgressCallback};
pub use engine::{sort_by_date, DiffEngine};
pub use file_compare::FileComparator;
pub use file_operations::FileOperations;
pub use patch::{PatchBuilder, PatchManifestEntry, PatchOutcome};
pub use path_mapper::{map_left_to_right, map_right_to_left, PathMapper};
pub use scanner::FolderScanner;
pub use suffix_filter::SuffixFilter;
