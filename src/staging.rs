//! Staging of input items into a scratch directory before compression.
//!
//! Compression never archives the caller's paths directly. Each item is
//! first copied under a scratch root, optionally below a caller-supplied
//! relative prefix, and the archiver is then pointed at the copies. This is
//! what lets an archive's internal layout diverge from the filesystem
//! layout the items came from.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ArchiverError, Result};

/// Copy every item into `destination_root`, optionally nested under
/// `custom_structure`, and return the member name each copy should be
/// archived as, in input order.
///
/// Member names use forward slashes regardless of platform because they
/// name entries inside the archive, not filesystem paths. The prefix must
/// be a plain relative path; absolute or `..`-carrying prefixes are
/// rejected before anything is copied. The first item that fails aborts
/// the whole staging pass; whatever was already copied is left for the
/// caller's scratch-directory cleanup to sweep away.
pub fn stage_items(
    items: &[PathBuf],
    destination_root: &Path,
    custom_structure: Option<&Path>,
) -> Result<Vec<String>> {
    if let Some(prefix) = custom_structure {
        validate_structure(prefix)?;
    }
    let mut staged = Vec::with_capacity(items.len());
    for item in items {
        let member = stage_one(item, destination_root, custom_structure).map_err(|err| match err {
            prepared @ ArchiverError::FilePreparationFailed { .. } => prepared,
            other => ArchiverError::FilePreparationFailed {
                item: item.clone(),
                reason: other.to_string(),
            },
        })?;
        staged.push(member);
    }
    Ok(staged)
}

// The prefix is joined onto the scratch root, so anything other than plain
// name segments would place copies outside it.
fn validate_structure(prefix: &Path) -> Result<()> {
    if prefix.components().all(|part| matches!(part, Component::Normal(_))) {
        return Ok(());
    }
    Err(ArchiverError::FilePreparationFailed {
        item: prefix.to_path_buf(),
        reason: "custom structure must be a plain relative path".to_string(),
    })
}

fn stage_one(item: &Path, destination_root: &Path, custom_structure: Option<&Path>) -> Result<String> {
    let name = item.file_name().ok_or_else(|| ArchiverError::FilePreparationFailed {
        item: item.to_path_buf(),
        reason: "item has no base name".to_string(),
    })?;

    let relative = match custom_structure {
        Some(prefix) => prefix.join(name),
        None => PathBuf::from(name),
    };
    let destination = destination_root.join(&relative);
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| ArchiverError::FilePreparationFailed {
            item: item.to_path_buf(),
            reason: format!("could not create '{}': {}", parent.display(), err),
        })?;
    }
    copy_recursively(item, &destination)?;
    Ok(to_slash(&relative))
}

/// Copy a file, or a directory subtree file-by-file. Only content is
/// guaranteed to survive the copy; timestamps and ownership are not.
fn copy_recursively(source: &Path, destination: &Path) -> Result<()> {
    let metadata = fs::metadata(source).map_err(|err| ArchiverError::CopyFailed {
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
        source: err,
    })?;

    if !metadata.is_dir() {
        return copy_file(source, destination);
    }

    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|err| ArchiverError::CopyFailed {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: io::Error::from(err),
        })?;
        let relative = entry.path().strip_prefix(source).map_err(|err| ArchiverError::CopyFailed {
            from: entry.path().to_path_buf(),
            to: destination.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, err),
        })?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|err| ArchiverError::CopyFailed {
                from: entry.path().to_path_buf(),
                to: target.clone(),
                source: err,
            })?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map_err(|err| ArchiverError::CopyFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: err,
    })?;
    Ok(())
}

/// Render a relative path with forward slashes, the separator archives use
/// internally on every platform.
pub(crate) fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
