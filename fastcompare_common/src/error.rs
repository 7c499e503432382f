use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FastCompareError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A single file pair could not be read. Only that pair is affected.
    #[error("Failed to compare {} with {}: {source}", left.display(), right.display())]
    Comparison {
        left: PathBuf,
        right: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid path in result at index {index}: {}", path.display())]
    Validation { index: usize, path: PathBuf },

    #[error("Walk error: {0}")]
    Walk(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unexpected fault: {0}")]
    Fault(String),
}

pub type Result<T> = std::result::Result<T, FastCompareError>;

impl FastCompareError {
    /// Render the error together with its chain of sources.
    pub fn describe(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let cause_text = cause.to_string();
            if !message.contains(&cause_text) {
                message.push_str(": ");
                message.push_str(&cause_text);
            }
            source = cause.source();
        }
        message
    }
}
