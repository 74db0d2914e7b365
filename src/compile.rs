use crate::built_in::compiler_env;
use crate::limit::{ResourceLimitPolicy, ResourceLimiter};
use crate::output::{decode, OutputCapper};
use crate::proc::{run_bounded, Bounds, Exit};
use crate::submission::CompileOutcome;
use crate::workspace::Workspace;
use crate::RunnerConfig;

use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("workspace path is not UTF-8: path = {}", path.display()))
}

/// Substitutes `{source}`, `{artifact}` and `{workdir}` in the argument template.
pub fn expand_args(template: &[String], workspace: &Workspace) -> Result<Vec<String>> {
    let source = path_str(workspace.source_path())?;
    let artifact = path_str(workspace.artifact_path())?;
    let workdir = path_str(workspace.dir())?;
    Ok(template
        .iter()
        .map(|arg| {
            arg.replace("{source}", source)
                .replace("{artifact}", artifact)
                .replace("{workdir}", workdir)
        })
        .collect())
}

/// Runs the compiler over the workspace's source file.
///
/// Exit status 0 is success; anything else yields the compiler's combined
/// output as diagnostics.
#[tracing::instrument(level = "debug", err, skip_all, fields(dir = %workspace.dir().display()))]
pub async fn compile(
    workspace: &Workspace,
    config: &RunnerConfig,
    limiter: Arc<dyn ResourceLimiter>,
) -> Result<CompileOutcome> {
    let args = expand_args(&config.compiler_args, workspace)?;

    let mut cmd = Command::new(&config.compiler);
    cmd.args(&args)
        .env_clear()
        .envs(compiler_env(workspace.dir(), &config.compiler_path))
        .current_dir(workspace.dir());

    let capper = OutputCapper::new(config.limits.max_output_bytes);
    let bounds = Bounds {
        limiter,
        policy: ResourceLimitPolicy::for_compiler(&config.limits),
        wall_time: config.limits.compile_timeout(),
        capture_limit: capper.capture_limit(),
    };

    let finished = run_bounded(cmd, None, bounds)
        .await
        .with_context(|| format!("failed to run compiler: {}", config.compiler.display()))?;

    let status = match finished.exit {
        Exit::Status(status) => status,
        Exit::WallClockExceeded => {
            debug!("compiler timed out");
            return Ok(CompileOutcome::Failed(format!(
                "Compilation exceeded the time limit of {} seconds.",
                config.limits.compile_timeout_secs
            )));
        }
    };

    debug!(?status, real_time = ?finished.real_time, "compiler exited");

    if status.success() {
        return Ok(CompileOutcome::Success);
    }

    let mut diagnostics = decode(finished.output.bytes);
    if diagnostics.trim().is_empty() {
        diagnostics = match status.signal() {
            Some(sig) => format!("Compiler terminated by signal {}.", sig),
            None => format!("Compiler exited with status {}.", status.code().unwrap_or(-1)),
        };
    }
    Ok(CompileOutcome::Failed(diagnostics))
}
