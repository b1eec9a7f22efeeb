//! High-level orchestration of compress, extract and list operations.
//!
//! The [`Archiver`] owns the event bus and the process runner, builds the
//! per-format tool invocation, and manages the scratch directories that
//! isolate the external tools from the caller's filesystem: compression
//! archives staged copies, extraction unpacks into scratch and only then
//! delivers into the caller's output directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tempfile::TempDir;
use tokio::sync::Notify;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ArchiverError, Result};
use crate::events::{ArchiverEvent, EventBus};
use crate::format::{self, ArchiveFormat, Tool};
use crate::listing::{compare_entry_names, parse_listing, ListingResult};
use crate::process::CommandRunner;
use crate::staging;

/// Options for [`Archiver::compress`].
#[derive(Debug, Clone, Default)]
pub struct CompressOptions {
    /// Target format; inferred from the output extension when `None`,
    /// falling back to zip.
    pub format: Option<ArchiveFormat>,
    /// Compression level 0-9 where 0 stores without compression. Values
    /// beyond what the target tool supports are clamped.
    pub level: u32,
    /// Relative prefix the items are placed under inside the archive.
    pub custom_structure: Option<PathBuf>,
    pub password: Option<String>,
}

/// Options for [`Archiver::extract`].
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub password: Option<String>,
    /// Member paths to extract; empty extracts everything.
    pub selected_files: Vec<String>,
}

/// Outcome of a successful compression.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionReport {
    /// Base name of the archive that was written.
    pub file_name: String,
    /// Absolute path of the archive.
    pub full_path: PathBuf,
}

/// One extracted filesystem entry, with children for directories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedEntry {
    pub name: String,
    /// Path relative to the output directory, `/`-separated.
    pub relative_path: String,
    /// Size in bytes; 0 for directories.
    pub size: u64,
    pub is_directory: bool,
    pub children: Vec<ExtractedEntry>,
}

/// Outcome of a successful extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub success: bool,
    pub message: String,
    /// Extracted entries as delivered, directories first.
    pub files: Vec<ExtractedEntry>,
}

/// Unified front-end over the external archiver tools.
///
/// One instance runs one operation at a time: starting a second operation
/// before the first resolves replaces the tracked process handle, which
/// makes [`Archiver::stop`] ambiguous. Callers that need concurrency
/// should use one instance per operation.
pub struct Archiver {
    events: EventBus,
    runner: CommandRunner,
    stop_handle: Mutex<Option<Arc<Notify>>>,
    sevenz_program: String,
    rar_program: String,
}

impl Archiver {
    /// Create an archiver that invokes `7z` and `rar` from `PATH`.
    pub fn new() -> Self {
        Self::with_programs("7z", "rar")
    }

    /// Create an archiver that invokes the given binaries instead of the
    /// defaults, for installs where the tools live outside `PATH` or use
    /// different names such as `7zz` or `7za`.
    pub fn with_programs(sevenz: impl Into<String>, rar: impl Into<String>) -> Self {
        let events = EventBus::new();
        Self {
            runner: CommandRunner::new(events.clone()),
            events,
            stop_handle: Mutex::new(None),
            sevenz_program: sevenz.into(),
            rar_program: rar.into(),
        }
    }

    /// Register an observer for progress and terminal events. Observers
    /// registered after an operation completes do not see its events.
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(ArchiverEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback);
    }

    /// Create an archive at `output` containing `items`.
    ///
    /// Items are staged into a scratch directory first, so the archive's
    /// internal layout follows the staged copies (and any
    /// `custom_structure` prefix), not the items' original locations. The
    /// scratch directory is removed whether or not the operation succeeds.
    pub async fn compress(
        &self,
        items: &[PathBuf],
        output: &Path,
        options: &CompressOptions,
    ) -> Result<CompressionReport> {
        let result = self.compress_inner(items, output, options).await;
        self.settle(result)
    }

    /// Unpack `archive` into `output_dir` and report what was extracted.
    ///
    /// Entries are unpacked into a scratch directory and then delivered
    /// into `output_dir` with per-file renames, creating directories as
    /// needed.
    pub async fn extract(
        &self,
        archive: &Path,
        output_dir: &Path,
        options: &ExtractOptions,
    ) -> Result<ExtractionReport> {
        let result = self.extract_inner(archive, output_dir, options).await;
        self.settle(result)
    }

    /// List the contents of `archive` as a directory hierarchy with
    /// aggregate statistics.
    pub async fn list(&self, archive: &Path, password: Option<&str>) -> Result<ListingResult> {
        let result = self.list_inner(archive, password).await;
        self.settle(result)
    }

    /// Best-effort termination of the tracked external process. Does
    /// nothing when no operation is in flight.
    pub fn stop(&self) {
        match self.stop_handle.lock().unwrap().as_ref() {
            Some(cancel) => cancel.notify_one(),
            None => debug!("stop requested with no operation in flight"),
        }
    }

    async fn compress_inner(
        &self,
        items: &[PathBuf],
        output: &Path,
        options: &CompressOptions,
    ) -> Result<CompressionReport> {
        if items.is_empty() {
            return Err(ArchiverError::InvalidItems);
        }
        if output.as_os_str().is_empty() {
            return Err(ArchiverError::MissingOutput);
        }

        let format = options
            .format
            .or_else(|| ArchiveFormat::from_extension(output))
            .unwrap_or(ArchiveFormat::Zip);
        let output = resolve_output(output)?;

        let scratch = TempDir::new().map_err(|err| {
            ArchiverError::CompressionFailed(format!("could not create scratch directory: {err}"))
        })?;
        let outcome = self.compress_with_scratch(&scratch, items, &output, format, options).await;
        self.discard_scratch(scratch);
        outcome?;

        let file_name = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| output.display().to_string());
        Ok(CompressionReport { file_name, full_path: output })
    }

    async fn compress_with_scratch(
        &self,
        scratch: &TempDir,
        items: &[PathBuf],
        output: &Path,
        format: ArchiveFormat,
        options: &CompressOptions,
    ) -> Result<()> {
        let staged = {
            let items = items.to_vec();
            let root = scratch.path().to_path_buf();
            let structure = options.custom_structure.clone();
            tokio::task::spawn_blocking(move || staging::stage_items(&items, &root, structure.as_deref()))
                .await
                .map_err(|err| ArchiverError::CompressionFailed(format!("staging task failed: {err}")))??
        };

        let command =
            format::compress_command(format, options.level, output, options.password.as_deref(), &staged);
        let cancel = self.track_operation();
        self.runner
            .run(self.program_for(command.tool), &command.args, Some(scratch.path()), &cancel)
            .await
            .map_err(|err| wrap_tool_error(err, ArchiverError::CompressionFailed))?;
        Ok(())
    }

    async fn extract_inner(
        &self,
        archive: &Path,
        output_dir: &Path,
        options: &ExtractOptions,
    ) -> Result<ExtractionReport> {
        if archive.as_os_str().is_empty() {
            return Err(ArchiverError::MissingArchiveFile);
        }
        if output_dir.as_os_str().is_empty() {
            return Err(ArchiverError::MissingOutputDir);
        }
        if !archive.exists() {
            return Err(ArchiverError::ArchiveNotFound(archive.to_path_buf()));
        }

        let scratch = TempDir::new().map_err(|err| {
            ArchiverError::ExtractionFailed(format!("could not create scratch directory: {err}"))
        })?;
        let outcome = self.extract_with_scratch(&scratch, archive, output_dir, options).await;
        self.discard_scratch(scratch);
        outcome
    }

    async fn extract_with_scratch(
        &self,
        scratch: &TempDir,
        archive: &Path,
        output_dir: &Path,
        options: &ExtractOptions,
    ) -> Result<ExtractionReport> {
        let command = format::extract_command(
            archive,
            scratch.path(),
            options.password.as_deref(),
            &options.selected_files,
        );
        let cancel = self.track_operation();
        self.runner
            .run(self.program_for(command.tool), &command.args, None, &cancel)
            .await
            .map_err(|err| wrap_tool_error(err, ArchiverError::ExtractionFailed))?;

        let message = format!("Archive extracted to '{}'", output_dir.display());
        let scratch_root = scratch.path().to_path_buf();
        let destination = output_dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || {
            let files = collect_extracted(&scratch_root)?;
            deliver_tree(&scratch_root, &destination)?;
            Ok::<_, ArchiverError>(files)
        })
        .await
        .map_err(|err| ArchiverError::ExtractionFailed(format!("delivery task failed: {err}")))??;

        Ok(ExtractionReport { success: true, message, files })
    }

    async fn list_inner(&self, archive: &Path, password: Option<&str>) -> Result<ListingResult> {
        if archive.as_os_str().is_empty() {
            return Err(ArchiverError::MissingArchiveFile);
        }
        if !archive.exists() {
            return Err(ArchiverError::ArchiveNotFound(archive.to_path_buf()));
        }
        if ArchiveFormat::from_extension(archive).is_none() {
            return Err(ArchiverError::UnsupportedFormat(format_label(archive)));
        }

        let command = format::list_command(archive, password);
        let cancel = self.track_operation();
        let output = self
            .runner
            .run(self.program_for(command.tool), &command.args, None, &cancel)
            .await
            .map_err(|err| wrap_tool_error(err, ArchiverError::ListingFailed))?;
        if !output.stderr.is_empty() {
            // Entry records arrive on stdout; anything on stderr is a
            // warning the tool still exited zero over.
            debug!(diagnostics = %output.stderr.trim(), "listing tool warnings");
        }
        Ok(parse_listing(&output.stdout))
    }

    /// Install a fresh cancellation handle for the operation about to
    /// start, replacing whatever was tracked before.
    fn track_operation(&self) -> Arc<Notify> {
        let cancel = Arc::new(Notify::new());
        *self.stop_handle.lock().unwrap() = Some(Arc::clone(&cancel));
        cancel
    }

    /// Emit the terminal event for an operation outcome and hand the
    /// outcome back. A stop request gets its own signal instead of an
    /// error event.
    fn settle<T>(&self, result: Result<T>) -> Result<T> {
        *self.stop_handle.lock().unwrap() = None;
        match &result {
            Ok(_) => self.events.emit(ArchiverEvent::Success),
            Err(ArchiverError::Stopped) => self.events.emit(ArchiverEvent::Stopped),
            Err(err) => self.events.emit(ArchiverEvent::Error { message: err.to_string() }),
        }
        result
    }

    /// Remove a scratch directory. Removal failures are logged and never
    /// change the operation's outcome.
    fn discard_scratch(&self, scratch: TempDir) {
        let path = scratch.path().to_path_buf();
        if let Err(err) = scratch.close() {
            warn!("could not remove scratch directory '{}': {err}", path.display());
        }
    }

    fn program_for(&self, tool: Tool) -> &str {
        match tool {
            Tool::SevenZip => &self.sevenz_program,
            Tool::Rar => &self.rar_program,
        }
    }
}

impl Default for Archiver {
    fn default() -> Self {
        Self::new()
    }
}

/// Pass the password and stop kinds through untouched so callers can match
/// on them; wrap any other tool failure into the operation's generic kind.
fn wrap_tool_error(err: ArchiverError, wrap: fn(String) -> ArchiverError) -> ArchiverError {
    match err {
        passthrough @ (ArchiverError::IncorrectPassword
        | ArchiverError::Stopped
        | ArchiverError::StopProcessFailed { .. }) => passthrough,
        other => wrap(other.to_string()),
    }
}

fn resolve_output(output: &Path) -> Result<PathBuf> {
    if output.is_absolute() {
        return Ok(output.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|err| {
        ArchiverError::CompressionFailed(format!("could not resolve working directory: {err}"))
    })?;
    Ok(cwd.join(output))
}

/// Text identifying an unrecognized archive kind: the extension when there
/// is one, otherwise the file name.
fn format_label(archive: &Path) -> String {
    archive
        .extension()
        .or_else(|| archive.file_name())
        .map(|part| part.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive.display().to_string())
}

fn collect_extracted(root: &Path) -> Result<Vec<ExtractedEntry>> {
    collect_dir(root, root)
}

fn collect_dir(root: &Path, dir: &Path) -> Result<Vec<ExtractedEntry>> {
    let reader = fs::read_dir(dir).map_err(|err| {
        ArchiverError::ExtractionFailed(format!("could not inspect '{}': {err}", dir.display()))
    })?;

    let mut entries = Vec::new();
    for item in reader {
        let item = item.map_err(|err| {
            ArchiverError::ExtractionFailed(format!("could not inspect '{}': {err}", dir.display()))
        })?;
        let path = item.path();
        let metadata = item.metadata().map_err(|err| {
            ArchiverError::ExtractionFailed(format!("could not inspect '{}': {err}", path.display()))
        })?;
        let name = item.file_name().to_string_lossy().into_owned();
        let relative_path = match path.strip_prefix(root) {
            Ok(relative) => staging::to_slash(relative),
            Err(_) => staging::to_slash(&path),
        };

        if metadata.is_dir() {
            let children = collect_dir(root, &path)?;
            entries.push(ExtractedEntry {
                name,
                relative_path,
                size: 0,
                is_directory: true,
                children,
            });
        } else {
            entries.push(ExtractedEntry {
                name,
                relative_path,
                size: metadata.len(),
                is_directory: false,
                children: Vec::new(),
            });
        }
    }
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| compare_entry_names(&a.name, &b.name))
    });
    Ok(entries)
}

/// Move everything under `from` into `to`: directories are created at the
/// destination, files are renamed across.
fn deliver_tree(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to).map_err(|err| {
        ArchiverError::ExtractionFailed(format!("could not create '{}': {err}", to.display()))
    })?;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(|err| {
            ArchiverError::ExtractionFailed(format!("could not walk extracted output: {err}"))
        })?;
        let relative = entry.path().strip_prefix(from).map_err(|err| {
            ArchiverError::ExtractionFailed(format!("could not walk extracted output: {err}"))
        })?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|err| {
                ArchiverError::ExtractionFailed(format!("could not create '{}': {err}", target.display()))
            })?;
        } else {
            deliver_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn deliver_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Renames fail across mount points; fall back to copy and remove.
    fs::copy(from, to).map_err(|err| ArchiverError::CopyFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: err,
    })?;
    if let Err(err) = fs::remove_file(from) {
        warn!("could not remove delivered copy '{}': {err}", from.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    fn archiver_without_tools() -> Archiver {
        // Operations that validate correctly would fail to spawn this
        // program, so reaching a validation error proves nothing ran.
        Archiver::with_programs("/definitely/absent/7z", "/definitely/absent/rar")
    }

    #[tokio::test]
    async fn test_compress_rejects_empty_item_list() {
        let archiver = archiver_without_tools();
        let err = archiver
            .compress(&[], Path::new("/tmp/out.zip"), &CompressOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiverError::InvalidItems));
    }

    #[tokio::test]
    async fn test_compress_requires_output_path() {
        let archiver = archiver_without_tools();
        let err = archiver
            .compress(&[PathBuf::from("a.txt")], Path::new(""), &CompressOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiverError::MissingOutput));
    }

    #[tokio::test]
    async fn test_extract_requires_both_paths() {
        let archiver = archiver_without_tools();

        let err = archiver
            .extract(Path::new(""), Path::new("/tmp/out"), &ExtractOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiverError::MissingArchiveFile));

        let err = archiver
            .extract(Path::new("/tmp/a.zip"), Path::new(""), &ExtractOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiverError::MissingOutputDir));
    }

    #[tokio::test]
    async fn test_extract_missing_archive_is_reported() {
        let archiver = archiver_without_tools();
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.zip");

        let err = archiver
            .extract(&missing, dir.path(), &ExtractOptions::default())
            .await
            .unwrap_err();

        match err {
            ArchiverError::ArchiveNotFound(path) => assert_eq!(path, missing),
            other => panic!("expected ArchiveNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_missing_archive_fails_before_any_spawn() {
        let archiver = archiver_without_tools();
        let dir = tempdir().unwrap();

        let err = archiver.list(&dir.path().join("absent.zip"), None).await.unwrap_err();
        assert!(matches!(err, ArchiverError::ArchiveNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_rejects_unrecognized_extension() {
        let archiver = archiver_without_tools();
        let dir = tempdir().unwrap();
        let odd = dir.path().join("bundle.tar");
        fs::write(&odd, b"not an archive we list").unwrap();

        let err = archiver.list(&odd, None).await.unwrap_err();
        match err {
            ArchiverError::UnsupportedFormat(label) => assert_eq!(label, "tar"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validation_failure_emits_error_event() {
        let archiver = archiver_without_tools();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        archiver.on_event(move |event| sink.lock().unwrap().push(event));

        let _ = archiver
            .compress(&[], Path::new("/tmp/out.zip"), &CompressOptions::default())
            .await;

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ArchiverEvent::Error { .. }));
    }

    #[test]
    fn test_stop_without_operation_is_a_noop() {
        let archiver = archiver_without_tools();
        archiver.stop();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_deliver_file_copies_across_mount_points() {
        // /dev/shm is its own mount, so the rename attempt fails with
        // EXDEV and delivery has to take the copy-and-remove path.
        let scratch = tempdir().unwrap();
        let outside = match tempfile::tempdir_in("/dev/shm") {
            Ok(dir) => dir,
            Err(_) => return,
        };

        let from = scratch.path().join("payload.bin");
        fs::write(&from, b"across mounts").unwrap();
        let to = outside.path().join("payload.bin");

        deliver_file(&from, &to).unwrap();

        assert_eq!(fs::read(&to).unwrap(), b"across mounts");
        assert!(!from.exists());
    }

    #[test]
    fn test_format_label_prefers_extension() {
        assert_eq!(format_label(Path::new("a/b/archive.tar")), "tar");
        assert_eq!(format_label(Path::new("a/b/archive")), "archive");
    }
}
