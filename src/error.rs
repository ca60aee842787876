use std::io;

use nix::errno::Errno;

use crate::ptracer::Resume;
use crate::tracee::{Lifecycle, Operation};

use nix::unistd::Pid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Could not launch `{program}`")]
    Launch {
        program: String,
        source: io::Error,
    },

    #[error("Could not establish tracing of pid = {pid}: {reason}")]
    TraceSetup { pid: Pid, reason: String },

    #[error("Cannot {operation} tracee = {pid} while it is {lifecycle}")]
    LifecycleViolation {
        pid: Pid,
        operation: Operation,
        lifecycle: Lifecycle,
    },

    #[error("Could not read registers of tracee = {pid}")]
    RegisterRead { pid: Pid, source: nix::Error },

    #[error("Could not resume tracee = {pid} with mode = {mode:?}")]
    Resume { pid: Pid, mode: Resume, source: nix::Error },

    #[error("Could not kill tracee = {pid}")]
    Kill { pid: Pid, source: nix::Error },

    #[error("Could not wait on tracee = {pid}")]
    Wait { pid: Pid, source: nix::Error },

    #[error("Input/output error")]
    IO(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the underlying OS error says the tracee no longer exists.
    pub fn tracee_died(&self) -> bool {
        matches!(
            self,
            Error::RegisterRead { source: Errno::ESRCH, .. }
                | Error::Resume { source: Errno::ESRCH, .. }
                | Error::Kill { source: Errno::ESRCH, .. }
                | Error::Wait { source: Errno::ECHILD, .. }
        )
    }

    /// Errors after which the tracing session cannot go on.
    ///
    /// A lifecycle violation or a failed register read is reported, and the operator
    /// may issue another command.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::LifecycleViolation { .. } | Error::RegisterRead { .. } => false,
            Error::Kill { .. } => false,
            Error::Launch { .. }
            | Error::TraceSetup { .. }
            | Error::Resume { .. }
            | Error::Wait { .. }
            | Error::IO(_)
            | Error::Internal(_) => true,
        }
    }
}

/// Attach tracee context to raw `nix` results.
pub(crate) trait ResultExt<T> {
    fn registers_of(self, pid: Pid) -> Result<T>;

    fn resuming(self, pid: Pid, mode: Resume) -> Result<T>;

    fn waiting_on(self, pid: Pid) -> Result<T>;
}

impl<T> ResultExt<T> for nix::Result<T> {
    fn registers_of(self, pid: Pid) -> Result<T> {
        self.map_err(|source| Error::RegisterRead { pid, source })
    }

    fn resuming(self, pid: Pid, mode: Resume) -> Result<T> {
        self.map_err(|source| Error::Resume { pid, mode, source })
    }

    fn waiting_on(self, pid: Pid) -> Result<T> {
        self.map_err(|source| Error::Wait { pid, source })
    }
}

macro_rules! internal_error {
    ($msg: expr) => {
        return Err($crate::error::Error::Internal($msg.into()))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid() -> Pid {
        Pid::from_raw(1)
    }

    #[test]
    fn test_died_only_on_esrch_or_echild() {
        let pid = pid();

        assert!(Error::RegisterRead { pid, source: Errno::ESRCH }.tracee_died());
        assert!(!Error::RegisterRead { pid, source: Errno::EIO }.tracee_died());

        let mode = Resume::Syscall;
        assert!(Error::Resume { pid, mode, source: Errno::ESRCH }.tracee_died());
        assert!(!Error::Resume { pid, mode, source: Errno::EPERM }.tracee_died());

        assert!(Error::Kill { pid, source: Errno::ESRCH }.tracee_died());
        assert!(Error::Wait { pid, source: Errno::ECHILD }.tracee_died());
        assert!(!Error::Wait { pid, source: Errno::ESRCH }.tracee_died());

        let violation = Error::LifecycleViolation {
            pid,
            operation: Operation::ReadRegisters,
            lifecycle: Lifecycle::Killed,
        };
        assert!(!violation.tracee_died());
    }

    #[test]
    fn test_fatal_classification() {
        let pid = pid();

        let recoverable = [
            Error::RegisterRead { pid, source: Errno::EIO },
            Error::RegisterRead { pid, source: Errno::ESRCH },
            Error::Kill { pid, source: Errno::EPERM },
            Error::LifecycleViolation {
                pid,
                operation: Operation::Resume,
                lifecycle: Lifecycle::Exited,
            },
        ];

        for err in &recoverable {
            assert!(!err.is_fatal(), "{err:?}");
        }

        let fatal = [
            Error::Resume { pid, mode: Resume::Continue, source: Errno::EIO },
            Error::Wait { pid, source: Errno::ECHILD },
            Error::TraceSetup { pid, reason: "no SIGTRAP".into() },
            Error::Launch {
                program: "missing".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
            Error::IO(io::Error::from(io::ErrorKind::BrokenPipe)),
            Error::Internal("unreachable".into()),
        ];

        for err in &fatal {
            assert!(err.is_fatal(), "{err:?}");
        }
    }

    #[test]
    fn test_violation_message() {
        let err = Error::LifecycleViolation {
            pid: Pid::from_raw(42),
            operation: Operation::ReadRegisters,
            lifecycle: Lifecycle::Killed,
        };

        assert_eq!(err.to_string(), "Cannot read registers of tracee = 42 while it is killed");
    }
}
