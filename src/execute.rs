use crate::built_in::program_env;
use crate::limit::{ResourceLimitPolicy, ResourceLimiter};
use crate::output::{decode, OutputCapper};
use crate::proc::{run_bounded, Bounds, Exit};
use crate::submission::ExecutionOutcome;
use crate::workspace::Workspace;
use crate::Limits;

use std::os::unix::process::ExitStatusExt;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Splits program arguments on whitespace; blank input gives no arguments.
pub fn split_args(args: &str) -> Vec<&str> {
    args.split_whitespace().collect()
}

/// Runs the compiled artifact under the program policy and both timeouts.
///
/// Never fails: launch and host faults come back as `RuntimeError`.
#[tracing::instrument(level = "debug", skip_all, fields(dir = %workspace.dir().display()))]
pub async fn execute(
    workspace: &Workspace,
    args: &str,
    stdin: &str,
    limits: &Limits,
    limiter: Arc<dyn ResourceLimiter>,
) -> ExecutionOutcome {
    match try_execute(workspace, args, stdin, limits, limiter).await {
        Ok(outcome) => outcome,
        Err(err) => {
            debug!(?err, "execution failed");
            ExecutionOutcome::RuntimeError(format!("{:#}", err))
        }
    }
}

async fn try_execute(
    workspace: &Workspace,
    args: &str,
    stdin: &str,
    limits: &Limits,
    limiter: Arc<dyn ResourceLimiter>,
) -> Result<ExecutionOutcome> {
    let artifact = workspace.artifact_path();

    let mut cmd = Command::new(artifact);
    cmd.args(split_args(args))
        .env_clear()
        .envs(program_env(workspace.dir()))
        .current_dir(workspace.dir());

    let bounds = Bounds {
        limiter,
        policy: ResourceLimitPolicy::for_program(limits),
        wall_time: limits.wall_time(),
        capture_limit: OutputCapper::new(limits.max_output_bytes).capture_limit(),
    };

    let input = if stdin.is_empty() {
        None
    } else {
        Some(stdin.as_bytes())
    };

    let finished = run_bounded(cmd, input, bounds)
        .await
        .with_context(|| format!("failed to run program: {}", artifact.display()))?;

    let status = match finished.exit {
        Exit::Status(status) => status,
        Exit::WallClockExceeded => {
            debug!(real_time = ?finished.real_time, "wall-clock ceiling exceeded");
            return Ok(ExecutionOutcome::TimedOut);
        }
    };

    debug!(?status, real_time = ?finished.real_time, overflowed = finished.output.overflowed, "program exited");

    // SIGXCPU at the soft cpu limit, SIGKILL at the hard one.
    if let Some(libc::SIGXCPU) | Some(libc::SIGKILL) = status.signal() {
        return Ok(ExecutionOutcome::TimedOut);
    }

    Ok(ExecutionOutcome::Completed(decode(finished.output.bytes)))
}
