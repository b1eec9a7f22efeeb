//! # Shellarch Core Library
//!
//! This crate provides the core functionality for the `shellarch` archiver
//! front-end.
//!
//! It is designed to be used by the `shellarch` command-line application,
//! but its public API can also be used to programmatically create, inspect,
//! and extract zip, 7z and rar archives through the external `7z` and `rar`
//! tools.
//!
//! ## Key Modules
//!
//! - [`archiver`]: The high-level facade that orchestrates compress,
//!   extract and list operations.
//! - [`listing`]: Parses the external tool's verbose listing output into a
//!   directory hierarchy with aggregate statistics.
//! - [`staging`]: Copies input items into a scratch layout before they are
//!   archived.
//! - [`format`]: Maps archive formats to external-tool argument templates.
//! - [`events`]: Progress and terminal events observers can subscribe to.
//!
//! ## Examples
//!
//! ```no_run
//! use shellarch::archiver::{Archiver, CompressOptions};
//! use std::path::{Path, PathBuf};
//!
//! # async fn demo() -> Result<(), shellarch::ArchiverError> {
//! let archiver = Archiver::new();
//! let report = archiver
//!     .compress(&[PathBuf::from("notes.txt")], Path::new("notes.zip"), &CompressOptions::default())
//!     .await?;
//! println!("wrote {}", report.full_path.display());
//! # Ok(())
//! # }
//! ```

pub mod archiver;
pub mod cli;
pub mod error;
pub mod events;
pub mod format;
pub mod listing;
pub mod staging;

mod process;

pub use archiver::Archiver;
pub use error::ArchiverError;
