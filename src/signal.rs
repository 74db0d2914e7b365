use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::trace;

pub fn send_group_signal(pgid: Pid, signal: Signal) -> nix::Result<()> {
    let result = signal::killpg(pgid, signal);
    trace!(
        "killpg pgid = {}, signal = {}, result = {:?}",
        pgid,
        signal,
        result
    );
    result
}

/// Stops then kills every process left in the group.
///
/// `ESRCH` (group already gone) is expected and ignored.
pub fn kill_group(pgid: Pid) {
    let _ = send_group_signal(pgid, Signal::SIGSTOP);
    let _ = send_group_signal(pgid, Signal::SIGKILL);
}
