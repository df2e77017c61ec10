//! External process execution with cooperative cancellation.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished command.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Short description of a failure: the exit status plus the tail of stderr (or stdout when
    /// stderr is empty).
    pub fn failure_message(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let tail: Vec<&str> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .rev()
            .take(5)
            .collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        if tail.is_empty() {
            format!("exited with {}", self.status)
        } else {
            format!("exited with {}: {}", self.status, tail.join(" | "))
        }
    }
}

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// Both pipes are drained on background threads so a chatty child never blocks. Once `cancel`
/// fires, the child gets `grace` to exit on its own before it is killed; a killed child yields
/// [`Error::Cancelled`]. A child that exits within the grace period is reported normally.
pub fn run_command(cmd: &mut Command, cancel: &CancelToken, grace: Duration) -> Result<CommandOutput> {
    debug!(command = ?cmd, "spawning");

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait_or_kill(&mut child, cancel, grace);

    // Join the readers even on the kill path so no thread outlives the call.
    let stdout = join_drain(stdout);
    let stderr = join_drain(stderr);

    match status? {
        Some(status) => Ok(CommandOutput {
            status,
            stdout,
            stderr,
        }),
        None => Err(Error::Cancelled),
    }
}

/// `Ok(None)` when the child had to be killed.
fn wait_or_kill(child: &mut Child, cancel: &CancelToken, grace: Duration) -> Result<Option<ExitStatus>> {
    let mut deadline: Option<Instant> = None;

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        if cancel.is_cancelled() {
            let limit = *deadline.get_or_insert_with(|| Instant::now() + grace);
            if Instant::now() >= limit {
                warn!(pid = child.id(), "grace period elapsed; killing child process");
                // The child may have exited between try_wait and kill.
                if let Err(e) = child.kill() {
                    debug!(error = %e, "kill failed");
                }
                child.wait()?;
                return Ok(None);
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R>(pipe: Option<R>) -> Option<JoinHandle<String>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_drain(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
