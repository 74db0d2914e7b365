use crate::Limits;

use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Kernel-enforced ceilings applied to one child process between fork and exec.
///
/// `None` leaves the inherited limit untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimitPolicy {
    pub cpu_seconds: Option<u64>,
    pub max_address_space_bytes: Option<u64>,
    pub max_processes: Option<u64>,
    pub max_file_size_bytes: Option<u64>,
    pub max_open_files: Option<u64>,
    pub core_dumps_disabled: bool,
}

impl ResourceLimitPolicy {
    /// Policy for the submitted program: every ceiling set.
    pub fn for_program(limits: &Limits) -> Self {
        Self {
            cpu_seconds: Some(limits.cpu_time_secs),
            max_address_space_bytes: Some(limits.max_address_space_bytes),
            max_processes: Some(limits.max_processes),
            max_file_size_bytes: Some(limits.max_file_size_bytes),
            max_open_files: Some(limits.max_open_files),
            core_dumps_disabled: true,
        }
    }

    /// Policy for the compiler, which has to spawn its assembler and linker
    /// and map considerably more memory than the programs it builds.
    pub fn for_compiler(limits: &Limits) -> Self {
        Self {
            cpu_seconds: Some(limits.compile_timeout_secs),
            max_address_space_bytes: Some(limits.max_address_space_bytes.saturating_mul(4)),
            max_processes: None,
            max_file_size_bytes: Some(limits.max_file_size_bytes.saturating_mul(64)),
            max_open_files: None,
            core_dumps_disabled: true,
        }
    }
}

/// Strategy that imposes a [`ResourceLimitPolicy`] on the calling process.
///
/// `apply` runs in the forked child before exec, so implementations must
/// restrict themselves to async-signal-safe calls.
pub trait ResourceLimiter: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn apply(&self, policy: &ResourceLimitPolicy) -> io::Result<()>;
}

/// Leaves every limit as inherited.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimits;

impl ResourceLimiter for NoLimits {
    fn name(&self) -> &'static str {
        "none"
    }

    fn apply(&self, _: &ResourceLimitPolicy) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
pub use self::unix::Rlimits;

#[cfg(unix)]
mod unix {
    use super::{ResourceLimitPolicy, ResourceLimiter};

    use std::io;

    use rlimit::Resource;

    /// `setrlimit(2)` with soft = hard, clamped to the inherited hard limit.
    ///
    /// The CPU hard limit sits one second above the soft one: the kernel sends
    /// `SIGKILL` at the hard limit, and `SIGXCPU` is only seen if it comes first.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Rlimits;

    fn set(resource: Resource, soft: u64, hard: u64) -> io::Result<()> {
        if !resource.is_supported() {
            return Ok(());
        }
        let (_, inherited) = resource.get()?;
        let hard = hard.min(inherited);
        resource.set(soft.min(hard), hard)
    }

    fn set_hard(resource: Resource, value: u64) -> io::Result<()> {
        set(resource, value, value)
    }

    impl ResourceLimiter for Rlimits {
        fn name(&self) -> &'static str {
            "rlimit"
        }

        fn apply(&self, policy: &ResourceLimitPolicy) -> io::Result<()> {
            macro_rules! direct_set {
                ($res:expr, $field:ident) => {
                    if let Some($field) = policy.$field {
                        set_hard($res, $field)?;
                    }
                };
            }

            if let Some(secs) = policy.cpu_seconds {
                set(Resource::CPU, secs, secs.saturating_add(1))?;
            }
            direct_set!(Resource::AS, max_address_space_bytes);
            direct_set!(Resource::NPROC, max_processes);
            direct_set!(Resource::FSIZE, max_file_size_bytes);
            direct_set!(Resource::NOFILE, max_open_files);

            if policy.core_dumps_disabled {
                set_hard(Resource::CORE, 0)?;
            }

            Ok(())
        }
    }
}

/// The limiter this platform supports.
pub fn platform_default() -> Arc<dyn ResourceLimiter> {
    #[cfg(unix)]
    {
        Arc::new(Rlimits)
    }
    #[cfg(not(unix))]
    {
        Arc::new(NoLimits)
    }
}
