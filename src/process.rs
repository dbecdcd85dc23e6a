//! Supervised child processes.
//!
//! Every ffmpeg process the pipeline starts is handed to a watcher thread
//! that locks the [`Child`](std::process::Child) and polls it. The spawning
//! thread keeps only the stdout pipe and reads it to completion. When the job's [`JobControl`]
//! fires, or the reader asks for an early stop, the watcher kills the child;
//! the pipe then reaches end-of-file and the reader unblocks.

use std::ffi::OsStr;
use std::io::Read;
use std::process::{ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::BifError;
use crate::progress::JobControl;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a supervised process ended.
#[derive(Debug)]
pub(crate) enum ProcessExit {
    /// The process exited on its own.
    Finished(ExitStatus),
    /// The process was killed after [`SupervisedChild::abort`].
    Aborted,
}

/// A running child whose lifetime is managed by a watcher thread.
pub(crate) struct SupervisedChild {
    stdout: ChildStdout,
    abort: Arc<AtomicBool>,
    watcher: Option<JoinHandle<Result<ProcessExit, BifError>>>,
}

impl SupervisedChild {
    /// Spawn `command` with stdout piped and stderr discarded.
    ///
    /// `control` is checked once before spawning so that a cancelled or
    /// expired job never starts another process.
    pub(crate) fn spawn(command: &mut Command, control: &JobControl) -> Result<Self, BifError> {
        control.check()?;

        log::debug!("Spawning {}", describe(command));
        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BifError::IoError(std::io::Error::other(
                "child stdout was not captured",
            )));
        };

        let abort = Arc::new(AtomicBool::new(false));
        let watcher_abort = Arc::clone(&abort);
        let watcher_control = control.clone();
        // Shared with the watcher so the child can still be killed if the
        // watcher thread never starts.
        let child = Arc::new(Mutex::new(child));
        let watched = Arc::clone(&child);
        let spawned = thread::Builder::new()
            .name("bifgen-process-watcher".to_string())
            .spawn(move || -> Result<ProcessExit, BifError> {
                let mut child = watched.lock().unwrap_or_else(PoisonError::into_inner);
                loop {
                    if let Some(status) = child.try_wait()? {
                        return Ok(ProcessExit::Finished(status));
                    }
                    if watcher_abort.load(Ordering::Acquire) {
                        let _ = child.kill();
                        child.wait()?;
                        return Ok(ProcessExit::Aborted);
                    }
                    if let Err(error) = watcher_control.check() {
                        let _ = child.kill();
                        child.wait()?;
                        return Err(error);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            });
        let watcher = match spawned {
            Ok(watcher) => watcher,
            Err(error) => {
                let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
                let _ = child.kill();
                let _ = child.wait();
                return Err(error.into());
            }
        };

        Ok(Self {
            stdout,
            abort,
            watcher: Some(watcher),
        })
    }

    /// The child's standard output.
    pub(crate) fn stdout(&mut self) -> &mut ChildStdout {
        &mut self.stdout
    }

    /// Read the whole of stdout into a buffer.
    pub(crate) fn read_to_end(&mut self) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(16 * 1024);
        self.stdout.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Ask the watcher to kill the child.
    pub(crate) fn abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    /// Wait for the child to end.
    ///
    /// Returns the job-control error if the process was killed because the
    /// job was cancelled or timed out.
    pub(crate) fn wait(mut self) -> Result<ProcessExit, BifError> {
        match self.watcher.take() {
            Some(watcher) => watcher
                .join()
                .map_err(|_| BifError::IoError(std::io::Error::other("process watcher panicked")))?,
            None => Ok(ProcessExit::Aborted),
        }
    }
}

impl Drop for SupervisedChild {
    fn drop(&mut self) {
        // Dropped without `wait`: the watcher must not outlive its reader.
        if self.watcher.is_some() {
            self.abort();
        }
    }
}

/// Program and arguments of `command`, for log messages.
pub(crate) fn describe(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().into_owned()];
    parts.extend(
        command
            .get_args()
            .map(OsStr::to_string_lossy)
            .map(|arg| arg.into_owned()),
    );
    parts.join(" ")
}
