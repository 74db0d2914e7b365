use crate::utils::libc_call;

use std::fs;
use std::io;
use std::os::unix::io::{FromRawFd, OwnedFd};
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe::Receiver;

/// Write end, shared by the child's stdout and stderr.
pub struct PipeTx(OwnedFd);

/// Read end, kept by the parent.
pub struct PipeRx(OwnedFd);

pub fn create() -> io::Result<(PipeTx, PipeRx)> {
    let mut fds = [0, 0];
    libc_call(|| unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) })?;
    let (rx, tx) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    Ok((PipeTx(tx), PipeRx(rx)))
}

impl PipeTx {
    /// Stdio handles for stdout and stderr writing into the same pipe,
    /// so diagnostics interleave with regular output in write order.
    pub fn into_stdio(self) -> io::Result<(Stdio, Stdio)> {
        let err = self.0.try_clone()?;
        Ok((Stdio::from(self.0), Stdio::from(err)))
    }
}

#[derive(Debug)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub overflowed: bool,
}

impl PipeRx {
    /// Reads until every write end is closed, retaining at most `limit` bytes.
    ///
    /// The remainder is drained and dropped so that the writer never blocks
    /// on a full pipe.
    pub async fn read_capped(self, limit: usize) -> io::Result<Captured> {
        let mut rx = Receiver::from_file(fs::File::from(self.0))?;
        let mut bytes = Vec::new();
        let mut overflowed = false;
        let mut buf = [0u8; 8192];

        loop {
            let n = rx.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let room = limit.saturating_sub(bytes.len());
            if n <= room {
                bytes.extend_from_slice(&buf[..n]);
            } else {
                bytes.extend_from_slice(&buf[..room]);
                overflowed = true;
            }
        }

        Ok(Captured { bytes, overflowed })
    }
}
