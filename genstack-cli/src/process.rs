//! Subprocess execution with live output streaming.
//!
//! Child stdout and stderr are drained on independent tasks so a chatty
//! child never blocks on a full pipe buffer; both drains are joined before
//! the exit code is reported.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use snafu::ResultExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{CancelledSnafu, CommandError, SpawnSnafu, WaitSnafu};

pub struct CommandRunner {
    cwd: PathBuf,
}

impl CommandRunner {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    /// Run to completion, echoing output, and return the exit code.
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<i32, CommandError> {
        self.run_cancellable(program, args, &CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), but force-terminates the child and returns
    /// [`CommandError::Cancelled`] when the token fires.
    pub async fn run_cancellable(
        &self,
        program: &str,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<i32, CommandError> {
        debug!(program, ?args, cwd = %self.cwd.display(), "spawning child process");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context(SpawnSnafu { program })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_drain = tokio::spawn(echo_lines(stdout, false));
        let err_drain = tokio::spawn(echo_lines(stderr, true));

        let status = tokio::select! {
            status = child.wait() => status.context(WaitSnafu { program })?,
            () = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                let _ = out_drain.await;
                let _ = err_drain.await;
                return CancelledSnafu { program }.fail();
            }
        };

        // Both drains must finish before the exit code is reported.
        let _ = out_drain.await;
        let _ = err_drain.await;

        let code = status.code().unwrap_or(-1);
        debug!(program, code, "child process exited");
        Ok(code)
    }

    /// Launch a long-lived process with null stdio and return immediately.
    /// The caller gives up ownership; nothing terminates the child later.
    pub fn spawn_detached(
        program: &Path,
        args: &[&OsStr],
        workdir: &Path,
    ) -> std::io::Result<()> {
        std::process::Command::new(program)
            .args(args)
            .current_dir(workdir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map(|_| ())
    }
}

async fn echo_lines<R>(pipe: Option<R>, stderr_stream: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else { return };
    let mut lines = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if stderr_stream {
            eprintln!("ERROR: {line}");
        } else {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_child_exit_code() {
        let runner = CommandRunner::new(std::env::temp_dir());
        let code = runner.run("sh", &["-c", "exit 3"]).await.unwrap();
        assert_eq!(code, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_code_for_success() {
        let runner = CommandRunner::new(std::env::temp_dir());
        let code = runner.run("sh", &["-c", "echo hello"]).await.unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let runner = CommandRunner::new(std::env::temp_dir());
        let err = runner
            .run("genstack-test-no-such-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_terminates_the_child() {
        let runner = CommandRunner::new(std::env::temp_dir());
        let cancel = CancellationToken::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                cancel.cancel();
            });
        }

        let started = Instant::now();
        let err = runner
            .run_cancellable("sleep", &["5"], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
