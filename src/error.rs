//! Error types for motion photo muxing

use std::{io, path::PathBuf};

/// Result type for muxer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while locating, tagging, or merging files
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing file, wrong extension, or an unusable combination of inputs
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The metadata backend could not open, parse, or rewrite the image
    #[error("Metadata write failed for {}: {reason}", path.display())]
    MetadataWrite { path: PathBuf, reason: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The merged file does not have the size the merge promised
    #[error(
        "Merge integrity check failed for {}: expected {expected} bytes, found {actual}",
        path.display()
    )]
    MergeIntegrity {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Invalid file format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Invalid segment
    #[error("Invalid segment at offset {offset}: {reason}")]
    InvalidSegment { offset: u64, reason: String },

    /// Malformed XMP packet
    #[error("XMP error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Data size exceeds maximum allowed
    #[error("Data too large: {size} bytes (max: {max})")]
    DataTooLarge { size: usize, max: usize },
}

/// Coarse classification of an [`Error`], as recorded in batch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    MetadataWrite,
    Io,
    MergeIntegrity,
}

impl ErrorKind {
    /// Get a string representation of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid input",
            Self::MetadataWrite => "metadata write",
            Self::Io => "i/o",
            Self::MergeIntegrity => "merge integrity",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Error {
    /// Classify this error
    ///
    /// Container and XMP errors only surface through the metadata backend,
    /// so they count as metadata write failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Io(_) => ErrorKind::Io,
            Self::MergeIntegrity { .. } => ErrorKind::MergeIntegrity,
            Self::MetadataWrite { .. }
            | Self::InvalidFormat(_)
            | Self::InvalidSegment { .. }
            | Self::Xml(_)
            | Self::DataTooLarge { .. } => ErrorKind::MetadataWrite,
        }
    }

    /// Wrap any backend error as a metadata write failure for `path`
    pub(crate) fn metadata_write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::MetadataWrite {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::InvalidInput("x".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            Error::InvalidFormat("Not a JPEG file".into()).kind(),
            ErrorKind::MetadataWrite
        );
        assert_eq!(
            Error::from(io::Error::new(io::ErrorKind::Other, "disk full")).kind(),
            ErrorKind::Io
        );
        assert_eq!(
            Error::MergeIntegrity {
                path: "a.jpg".into(),
                expected: 10,
                actual: 9
            }
            .kind(),
            ErrorKind::MergeIntegrity
        );
    }

    #[test]
    fn test_metadata_write_message() {
        let err = Error::metadata_write("photo.jpg", "Not a JPEG file");
        assert_eq!(
            err.to_string(),
            "Metadata write failed for photo.jpg: Not a JPEG file"
        );
    }
}
