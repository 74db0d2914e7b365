use crate::limit::{ResourceLimitPolicy, ResourceLimiter};
use crate::pipe::{self, Captured};
use crate::signal;

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use nix::unistd::{self, Pid};
use scopeguard::guard;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time;
use tracing::trace;

#[derive(Debug)]
pub enum Exit {
    Status(ExitStatus),
    WallClockExceeded,
}

#[derive(Debug)]
pub struct Finished {
    pub exit: Exit,
    pub output: Captured,
    pub real_time: Duration,
}

/// Knobs for one bounded child run.
pub struct Bounds {
    pub limiter: Arc<dyn ResourceLimiter>,
    pub policy: ResourceLimitPolicy,
    pub wall_time: Duration,
    pub capture_limit: usize,
}

/// Spawns `command` in a fresh process group with the given rlimits,
/// feeds it `stdin`, and captures stdout and stderr together.
///
/// The whole group is killed once the leader exits, when the wall-clock
/// ceiling elapses, or when this future is dropped.
pub async fn run_bounded(
    mut command: Command,
    stdin: Option<&[u8]>,
    bounds: Bounds,
) -> Result<Finished> {
    let (pipe_tx, pipe_rx) = pipe::create().context("failed to create pipe")?;
    let (stdout, stderr) = pipe_tx
        .into_stdio()
        .context("failed to duplicate pipe")?;

    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true);

    let limiter = Arc::clone(&bounds.limiter);
    let policy = bounds.policy;
    unsafe {
        command.pre_exec(move || {
            unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0)).map_err(io::Error::from)?;
            limiter.apply(&policy)
        });
    }

    let t0 = Instant::now();
    let mut child = command.spawn().context("failed to spawn")?;
    // The command still owns the parent's copies of the pipe's write end.
    drop(command);

    let pgid = match child.id() {
        Some(id) => Pid::from_raw(id as i32),
        None => anyhow::bail!("child was reaped before its pid was observed"),
    };
    // Races the child's own setpgid; EACCES after exec is harmless.
    let _ = unistd::setpgid(pgid, pgid);
    let _reaper = guard(pgid, signal::kill_group);

    trace!(?pgid, limiter = bounds.limiter.name(), ?policy);

    let joined = {
        let child_stdin = child.stdin.take();
        // Fed alongside the wait so a child that never reads cannot stall
        // the wall clock. Dropping the pipe closes the child's stdin.
        let fed = async move {
            if let (Some(data), Some(mut sink)) = (stdin, child_stdin) {
                match sink.write_all(data).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {}
                    Err(err) => return Err(err),
                }
            }
            Ok::<_, io::Error>(())
        };
        let waited = async {
            let status = child.wait().await?;
            // Stragglers may still hold the write end open.
            signal::kill_group(pgid);
            Ok::<_, io::Error>(status)
        };
        let captured = pipe_rx.read_capped(bounds.capture_limit);
        time::timeout(bounds.wall_time, async move {
            tokio::try_join!(fed, waited, captured)
        })
        .await
    };

    let finished = match joined {
        Ok(result) => {
            let ((), status, output) = result.context("failed to collect child")?;
            Finished {
                exit: Exit::Status(status),
                output,
                real_time: t0.elapsed(),
            }
        }
        Err(_elapsed) => {
            signal::kill_group(pgid);
            let status = child.wait().await.context("failed to wait child")?;
            trace!(?status, "killed after wall-clock ceiling");
            Finished {
                exit: Exit::WallClockExceeded,
                output: Captured {
                    bytes: Vec::new(),
                    overflowed: false,
                },
                real_time: t0.elapsed(),
            }
        }
    };

    trace!(exit = ?finished.exit, real_time = ?finished.real_time);

    Ok(finished)
}
