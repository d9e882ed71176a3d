// src/system/signals.rs

//! Platform-specific halves of the termination escalation.
//!
//! On Unix `Terminate` is `SIGTERM` and `Kill` is `SIGKILL`. Elsewhere there is
//! no graceful path, so both steps force the process to stop; callers still go
//! through the same two-step sequence.

use std::io;
use std::process::ExitStatus;
use tokio::process::Child;

/// The two steps of the escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Ask the process to exit.
    Terminate,
    /// Stop the process unconditionally.
    Kill,
}

/// Sends `kind` to a tokio child. A child that has already been reaped is left alone.
pub fn send(child: &mut Child, kind: SignalKind) -> io::Result<()> {
    #[cfg(unix)]
    {
        match child.id() {
            Some(pid) => deliver(pid, kind),
            None => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        log::trace!("No signal support on this platform; forcing stop for {:?}", kind);
        match child.start_kill() {
            Ok(()) => Ok(()),
            // Already exited and reaped.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Delivers `kind` to a raw PID. A process that no longer exists is not an error.
#[cfg(unix)]
pub fn deliver(pid: u32, kind: SignalKind) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let raw_pid = i32::try_from(pid).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("PID {} is out of range", pid))
    })?;
    let signal = match kind {
        SignalKind::Terminate => Signal::SIGTERM,
        SignalKind::Kill => Signal::SIGKILL,
    };

    match signal::kill(Pid::from_raw(raw_pid), signal) {
        Ok(()) => {
            log::debug!("Sent {} to PID {}", signal, pid);
            Ok(())
        }
        Err(Errno::ESRCH) => {
            log::trace!("PID {} already gone, {} not sent", pid, signal);
            Ok(())
        }
        Err(errno) => Err(io::Error::from(errno)),
    }
}

/// Maps an exit status to the code surfaced in a `Response`.
///
/// Normal exits keep their code. On Unix a signal death becomes the negated
/// signal number (`-15` for `SIGTERM`). Anything else is reported as `-1`,
/// never as success.
pub fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_status_code_normal_exit() {
        assert_eq!(status_code(ExitStatus::from_raw(0)), 0);
        // Raw wait status encodes the exit code in the high byte.
        assert_eq!(status_code(ExitStatus::from_raw(3 << 8)), 3);
    }

    #[test]
    fn test_status_code_signal_death_is_negative() {
        assert_eq!(status_code(ExitStatus::from_raw(15)), -15);
        assert_eq!(status_code(ExitStatus::from_raw(9)), -9);
    }

    #[test]
    fn test_deliver_to_missing_process_is_benign() {
        // PIDs this large are never handed out on Linux or macOS.
        let pid = u32::try_from(i32::MAX).unwrap();
        assert!(deliver(pid, SignalKind::Terminate).is_ok());
    }
}
