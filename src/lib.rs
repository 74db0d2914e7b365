#![deny(clippy::all)]

pub mod built_in;
pub mod compile;
pub mod execute;
pub mod limit;
pub mod output;
pub mod rules;
pub mod validate;
pub mod workspace;

mod pipe;
mod proc;
mod run;
mod signal;
mod submission;
mod utils;

pub use crate::limit::{NoLimits, ResourceLimitPolicy, ResourceLimiter};
pub use crate::rules::RuleSet;
pub use crate::run::Runner;
pub use crate::submission::{
    CompileOutcome, ExecutionOutcome, Outcome, RejectReason, Rejection, Submission, Verdict,
};
pub use crate::validate::Validator;
pub use crate::workspace::Workspace;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const MAX_SOURCE_BYTES: usize = 16 * 1024;
pub const MAX_ARGS_BYTES: usize = 64;
pub const MAX_STDIN_BYTES: usize = 64;
pub const MAX_OUTPUT_BYTES: usize = 48 * 1024;

pub const TRUNCATION_MARKER: &str = "\n ... (output truncated)";

pub const DEFAULT_COMPILER: &str = "fpc";
pub const DEFAULT_COMPILER_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// `{source}`, `{artifact}` and `{workdir}` are substituted per workspace.
pub fn default_compiler_args() -> Vec<String> {
    [
        "-Xs",          // strip symbols
        "-XX",          // smart linking
        "-Xt",          // static linking only
        "-Se1",         // stop at the first error
        "-vew",         // errors and warnings only
        "-FE{workdir}", // keep every build product inside the workspace
        "-o{artifact}",
        "{source}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
#[serde(default)]
pub struct RunnerConfig {
    /// Compiler executable, resolved against `compiler_path`.
    #[arg(long, value_name = "path", env = "FPCBOX_COMPILER", default_value = DEFAULT_COMPILER)]
    pub compiler: PathBuf,

    /// Repeat once per argument. Not read from the environment, since
    /// arguments may contain spaces.
    #[arg(
        long = "compiler-arg",
        value_name = "arg",
        allow_hyphen_values = true,
        default_values_t = default_compiler_args()
    )]
    pub compiler_args: Vec<String>,

    /// Search path handed to the compiler (it must find its assembler and linker).
    #[arg(long, value_name = "paths", env = "FPCBOX_COMPILER_PATH", default_value = DEFAULT_COMPILER_PATH)]
    pub compiler_path: String,

    /// Directory under which per-submission workspaces are created.
    #[arg(long, value_name = "path", env = "FPCBOX_WORK_ROOT")]
    pub work_root: Option<PathBuf>,

    /// JSON deny-list replacing the built-in one.
    #[arg(long, value_name = "path", env = "FPCBOX_RULES")]
    pub rules: Option<PathBuf>,

    #[command(flatten)]
    pub limits: Limits,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            compiler: DEFAULT_COMPILER.into(),
            compiler_args: default_compiler_args(),
            compiler_path: DEFAULT_COMPILER_PATH.into(),
            work_root: None,
            rules: None,
            limits: Limits::default(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.compiler.as_os_str().is_empty() {
            anyhow::bail!("compiler must not be empty");
        }
        if let Some(ref root) = self.work_root {
            if !root.is_absolute() {
                anyhow::bail!("work root must be absolute: path = {}", root.display());
            }
        }
        self.limits.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, clap::Args)]
#[serde(default)]
pub struct Limits {
    #[arg(long, value_name = "bytes", env = "FPCBOX_MAX_SOURCE_BYTES", default_value_t = MAX_SOURCE_BYTES)]
    pub max_source_bytes: usize,

    #[arg(long, value_name = "bytes", env = "FPCBOX_MAX_ARGS_BYTES", default_value_t = MAX_ARGS_BYTES)]
    pub max_args_bytes: usize,

    #[arg(long, value_name = "bytes", env = "FPCBOX_MAX_STDIN_BYTES", default_value_t = MAX_STDIN_BYTES)]
    pub max_stdin_bytes: usize,

    /// Ceiling on `begin` tokens.
    #[arg(long, value_name = "count", env = "FPCBOX_MAX_BLOCK_OPENERS", default_value_t = 20)]
    pub max_block_openers: usize,

    #[arg(long, value_name = "count", env = "FPCBOX_MAX_PARENTHESES", default_value_t = 100)]
    pub max_parentheses: usize,

    #[arg(long, value_name = "count", env = "FPCBOX_MAX_BRACKETS", default_value_t = 50)]
    pub max_brackets: usize,

    #[arg(long, value_name = "seconds", env = "FPCBOX_COMPILE_TIMEOUT", default_value_t = 30)]
    pub compile_timeout_secs: u64,

    #[arg(long, value_name = "seconds", env = "FPCBOX_CPU_TIME", default_value_t = 10)]
    pub cpu_time_secs: u64,

    #[arg(long, value_name = "seconds", env = "FPCBOX_WALL_TIME", default_value_t = 20)]
    pub wall_time_secs: u64,

    #[arg(long, value_name = "bytes", env = "FPCBOX_MAX_ADDRESS_SPACE_BYTES", default_value_t = 256 * 1024 * 1024)]
    pub max_address_space_bytes: u64,

    #[arg(long, value_name = "count", env = "FPCBOX_MAX_PROCESSES", default_value_t = 1)]
    pub max_processes: u64,

    #[arg(long, value_name = "bytes", env = "FPCBOX_MAX_FILE_SIZE_BYTES", default_value_t = 1024 * 1024)]
    pub max_file_size_bytes: u64,

    #[arg(long, value_name = "count", env = "FPCBOX_MAX_OPEN_FILES", default_value_t = 64)]
    pub max_open_files: u64,

    #[arg(long, value_name = "bytes", env = "FPCBOX_MAX_OUTPUT_BYTES", default_value_t = MAX_OUTPUT_BYTES)]
    pub max_output_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_source_bytes: MAX_SOURCE_BYTES,
            max_args_bytes: MAX_ARGS_BYTES,
            max_stdin_bytes: MAX_STDIN_BYTES,
            max_block_openers: 20,
            max_parentheses: 100,
            max_brackets: 50,
            compile_timeout_secs: 30,
            cpu_time_secs: 10,
            wall_time_secs: 20,
            max_address_space_bytes: 256 * 1024 * 1024,
            max_processes: 1,
            max_file_size_bytes: 1024 * 1024,
            max_open_files: 64,
            max_output_bytes: MAX_OUTPUT_BYTES,
        }
    }
}

impl Limits {
    pub fn validate(&self) -> Result<()> {
        if self.compile_timeout_secs == 0 || self.cpu_time_secs == 0 || self.wall_time_secs == 0 {
            anyhow::bail!("timeouts must be positive: limits = {:?}", self);
        }
        if self.wall_time_secs <= self.cpu_time_secs {
            anyhow::bail!(
                "wall-clock ceiling must exceed the cpu-time ceiling: wall = {}s, cpu = {}s",
                self.wall_time_secs,
                self.cpu_time_secs
            );
        }
        if self.max_output_bytes == 0 {
            anyhow::bail!("output cap must be positive");
        }
        Ok(())
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    pub fn wall_time(&self) -> Duration {
        Duration::from_secs(self.wall_time_secs)
    }
}
