//! Asynchronous execution of the external archiver tools.
//!
//! Both output pipes are streamed as the process runs: every chunk is
//! scanned for progress figures and kept for later classification, so a
//! failed run can be told apart by what the tool printed, not just by its
//! exit code.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::ArchiverError;
use crate::events::{scan_percents, ArchiverEvent, EventBus};

/// Substring the tools print when a password is wrong or missing. They do
/// not reserve a distinct exit code for this case, so detection rides on
/// their English-language output text.
const WRONG_PASSWORD_MARKER: &str = "Wrong password";

/// Captured output of a finished external command.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

pub(crate) struct CommandRunner {
    events: EventBus,
}

impl CommandRunner {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }

    /// Run `program` with `args` to completion and capture its output.
    ///
    /// Progress events are emitted through the bus while the process runs.
    /// A signal on `cancel` kills the process and resolves the run with
    /// [`ArchiverError::Stopped`]; if the kill itself fails the run
    /// resolves with [`ArchiverError::StopProcessFailed`] instead.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        working_dir: Option<&Path>,
        cancel: &Notify,
    ) -> Result<RunOutput, ArchiverError> {
        debug!(program, ?args, ?working_dir, "spawning external tool");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ArchiverError::CommandExecutionFailed {
            program: program.to_string(),
            source,
        })?;
        let pid = child.id().unwrap_or_default();

        let stdout = child.stdout.take().ok_or_else(|| missing_pipe(program, "stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe(program, "stderr"))?;
        let stdout_task = self.spawn_reader(stdout);
        let stderr_task = self.spawn_reader(stderr);

        let status = tokio::select! {
            status = child.wait() => status.map_err(|source| ArchiverError::CommandExecutionFailed {
                program: program.to_string(),
                source,
            })?,
            _ = cancel.notified() => {
                debug!(program, pid, "stop requested, killing external tool");
                if let Err(source) = child.kill().await {
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(ArchiverError::StopProcessFailed { pid, source });
                }
                // The kill closed the pipes; drain the readers so any
                // buffered progress is delivered before the stop resolves.
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                return Err(ArchiverError::Stopped);
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        debug!(program, code = ?status.code(), "external tool finished");

        if status.success() {
            return Ok(RunOutput { stdout, stderr });
        }
        if stderr.contains(WRONG_PASSWORD_MARKER) || stdout.contains(WRONG_PASSWORD_MARKER) {
            return Err(ArchiverError::IncorrectPassword);
        }

        let mut output = stdout;
        if !output.is_empty() && !stderr.is_empty() {
            output.push('\n');
        }
        output.push_str(&stderr);
        Err(ArchiverError::ProcessExitError {
            program: program.to_string(),
            code: status.code().unwrap_or(-1),
            output: output.trim().to_string(),
        })
    }

    /// Drain one output pipe to a string, emitting a progress event for
    /// every completion figure seen along the way.
    fn spawn_reader<R>(&self, mut pipe: R) -> JoinHandle<String>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut captured = String::new();
            let mut chunk = [0u8; 4096];
            loop {
                let read = match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(read) => read,
                };
                let text = String::from_utf8_lossy(&chunk[..read]);
                for percent in scan_percents(&text) {
                    events.emit(ArchiverEvent::Progress { percent });
                }
                captured.push_str(&text);
            }
            captured
        })
    }
}

fn missing_pipe(program: &str, pipe: &str) -> ArchiverError {
    ArchiverError::CommandExecutionFailed {
        program: program.to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            format!("failed to capture {pipe}"),
        ),
    }
}
