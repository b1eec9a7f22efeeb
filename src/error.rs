use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ArchiverError>;

/// The primary error type for all operations in the `shellarch` crate.
///
/// Every failure surfaces as exactly one of these variants, so callers can
/// match on the variant instead of inspecting message text.
#[derive(Debug, Error)]
pub enum ArchiverError {
    /// Compression was requested with an empty item list.
    #[error("No files or folders were given to compress")]
    InvalidItems,

    /// Compression was requested without an output path.
    #[error("No output archive path was given")]
    MissingOutput,

    /// Extraction or listing was requested without an archive path.
    #[error("No archive file was given")]
    MissingArchiveFile,

    /// Extraction was requested without an output directory.
    #[error("No output directory was given")]
    MissingOutputDir,

    /// The archive extension does not map to a supported format.
    #[error("Unsupported archive format: '{0}'")]
    UnsupportedFormat(String),

    /// The archive path does not exist on disk.
    #[error("Archive not found: '{}'", .0.display())]
    ArchiveNotFound(PathBuf),

    /// The external tool reported a wrong or missing password.
    #[error("Incorrect password for the archive")]
    IncorrectPassword,

    /// Compression failed for a reason other than a typed one above.
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    /// Extraction failed for a reason other than a typed one above.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Listing failed before any output could be parsed.
    #[error("Listing failed: {0}")]
    ListingFailed(String),

    /// An item could not be staged into the scratch directory.
    #[error("Failed to prepare '{}' for archiving: {reason}", .item.display())]
    FilePreparationFailed { item: PathBuf, reason: String },

    /// A raw file copy failed while staging items or moving extracted output.
    #[error("Failed to copy '{}' to '{}': {source}", .from.display(), .to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external tool could not be spawned at all.
    #[error("Failed to execute '{program}': {source}")]
    CommandExecutionFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool ran but exited with a non-zero status.
    /// `code` is `-1` when the process was killed by a signal.
    #[error("'{program}' exited with code {code}: {output}")]
    ProcessExitError {
        program: String,
        code: i32,
        output: String,
    },

    /// A stop request could not terminate the running tool.
    #[error("Failed to stop process {pid}: {source}")]
    StopProcessFailed {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// The operation was terminated by a stop request.
    #[error("Operation stopped")]
    Stopped,
}
