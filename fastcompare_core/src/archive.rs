use fastcompare_common::Result;
use std::path::Path;

/// Packs a finished patch directory into a single archive file
pub trait Archiver: Send + Sync {
    /// Extension of the produced archive, without the dot
    fn extension(&self) -> &str;

    /// Write every entry below `source_dir` into a new archive at `archive_path`.
    fn archive(&self, source_dir: &Path, archive_path: &Path) -> Result<()>;
}

/// Deflate-compressed zip archives
#[cfg(feature = "archives")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiver;

#[cfg(feature = "archives")]
mod zip_impl {
    use super::{Archiver, ZipArchiver};
    use fastcompare_common::{FastCompareError, Result};
    use std::fs::{self, File};
    use std::io::{self, Write};
    use std::path::Path;
    use tracing::{debug, info};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn zip_error(e: zip::result::ZipError) -> FastCompareError {
        FastCompareError::Archive(e.to_string())
    }

    /// Zip entry name for `path`, '/'-separated and relative to `base`
    fn entry_name(base: &Path, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(base).map_err(|_| {
            FastCompareError::Path(format!(
                "{} is not under {}",
                path.display(),
                base.display()
            ))
        })?;

        Ok(relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"))
    }

    fn add_directory_to_zip(
        zip: &mut ZipWriter<File>,
        base_path: &Path,
        current_path: &Path,
        options: FileOptions,
    ) -> Result<()> {
        let mut children = fs::read_dir(current_path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        children.sort();

        for path in children {
            let name = entry_name(base_path, &path)?;

            if path.is_dir() {
                zip.add_directory(format!("{name}/"), options).map_err(zip_error)?;
                add_directory_to_zip(zip, base_path, &path, options)?;
            } else {
                debug!("Archiving {}", name);
                zip.start_file(name, options).map_err(zip_error)?;
                let content = fs::read(&path)?;
                zip.write_all(&content)?;
            }
        }
        Ok(())
    }

    impl Archiver for ZipArchiver {
        fn extension(&self) -> &str {
            "zip"
        }

        fn archive(&self, source_dir: &Path, archive_path: &Path) -> Result<()> {
            let file = File::create(archive_path)?;
            let mut zip = ZipWriter::new(file);
            let options =
                FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

            add_directory_to_zip(&mut zip, source_dir, source_dir, options)?;

            zip.finish().map_err(zip_error)?;
            info!("Wrote archive {}", archive_path.display());
            Ok(())
        }
    }
}
