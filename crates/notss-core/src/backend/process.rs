//! Blocking subprocess execution with captured output and an optional deadline.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io::{self, Read};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::warn;

use super::CommandTimeout;
use crate::types::{CommandOutcome, Verdict};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
pub(crate) struct Captured {
    pub stdout: String,
    pub stderr: String,
    /// `None` when killed by a signal or by the deadline.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

/// Spawn `cmd` with piped stdout/stderr and wait for it.
///
/// Both pipes are drained on their own threads so a chatty child cannot
/// block on a full pipe while we wait on it. The child leads its own process
/// group, so a deadline kills everything it forked and the pipes close.
/// Returns `Err` only when the process could not be spawned or waited on.
pub(crate) fn run_captured(cmd: &mut Command, timeout: CommandTimeout) -> io::Result<Captured> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    let mut child = cmd.spawn()?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let (status, timed_out) = match timeout.duration() {
        None => (Some(child.wait()?), false),
        Some(limit) => wait_until(&mut child, limit)?,
    };

    Ok(Captured {
        stdout: collect(stdout),
        stderr: collect(stderr),
        exit_code: status.and_then(|s| s.code()),
        timed_out,
    })
}

/// Turn captured process output into an outcome with the given verdict.
pub(crate) fn outcome(command: &str, captured: Captured, verdict: Verdict) -> CommandOutcome {
    let mut stderr = captured.stderr;
    if captured.timed_out {
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str("command timed out and was killed");
    }
    CommandOutcome {
        command: command.to_string(),
        stdout: captured.stdout,
        stderr,
        exit_code: captured.exit_code,
        verdict,
    }
}

fn wait_until(child: &mut Child, limit: Duration) -> io::Result<(Option<ExitStatus>, bool)> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((Some(status), false));
        }
        if Instant::now() >= deadline {
            kill_group(child);
            let _ = child.wait();
            return Ok((None, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn kill_group(child: &mut Child) {
    let Ok(pid) = i32::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    match signal::kill(Pid::from_raw(-pid), Signal::SIGKILL) {
        // ESRCH: the group already exited between try_wait and kill.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => {
            warn!(pid, error = %e, "SIGKILL to process group failed");
            let _ = child.kill();
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut p| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
