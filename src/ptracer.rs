//! Resuming a stopped tracee and interpreting its next stop.

use nix::{
    errno::Errno,
    sys::{
        ptrace,
        signal::{self, Signal},
        wait::{self, WaitPidFlag, WaitStatus},
    },
};
use tracing::{debug, info, trace};

use crate::cmd::Command;
use crate::error::{Error, Result, ResultExt};
use crate::regs::Registers;
use crate::tracee::{Exit, Lifecycle, Operation, Stop, Tracee};

/// Resume requests, which restart stopped tracees.
///
/// The mode determines the possible next stops of the resumed tracee.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resume {
    /// Run until the next signal-delivery-stop or ptrace-event-stop.
    Continue,

    /// Run until the next syscall-enter-stop or syscall-exit-stop, or any earlier stop.
    Syscall,
}

/// What a resumed tracee did next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Stopped(Stop),
    Exited(Exit),
}

/// Synchronous controller for a single tracee.
///
/// Every request blocks until the kernel reports the tracee's next state change, so
/// exactly one `wait(2)` notification is consumed per resume.
#[derive(Debug)]
pub struct Ptracer {
    tracee: Tracee,
}

impl Ptracer {
    pub fn new(tracee: Tracee) -> Self {
        Self { tracee }
    }

    /// Launch `cmd` and take control of the resulting tracee.
    pub fn spawn(cmd: &Command) -> Result<Self> {
        Ok(Self::new(cmd.launch()?))
    }

    pub fn tracee(&self) -> &Tracee {
        &self.tracee
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.tracee.lifecycle()
    }

    /// Read the tracee's registers. See [`Tracee::registers()`].
    pub fn registers(&mut self) -> Result<Registers> {
        self.tracee.registers()
    }

    /// Resume the stopped tracee, delivering any pending signal, and wait for it to stop
    /// again or terminate.
    ///
    /// A tracee found to have died under us is reaped and reported as
    /// [`Status::Exited`], not as an error.
    pub fn resume(&mut self, mode: Resume) -> Result<Status> {
        self.tracee.ensure_stopped(Operation::Resume)?;

        let pid = self.tracee.pid();
        let pending = self.tracee.take_pending();

        if mode == Resume::Continue {
            // No syscall-exit-stop follows a syscall-enter-stop left with `PTRACE_CONT`.
            self.tracee.set_in_syscall(false);
        }

        trace!(pid = pid.as_raw(), ?mode, ?pending, "resuming tracee");

        let res = match mode {
            Resume::Continue => ptrace::cont(pid, pending),
            Resume::Syscall => ptrace::syscall(pid, pending),
        };

        self.tracee.set_running()?;

        match res {
            Err(Errno::ESRCH) => {
                debug!(pid = pid.as_raw(), "tracee vanished on resume");
                let exit = self.reap()?;
                return Ok(Status::Exited(exit));
            },
            res => res.resuming(pid, mode)?,
        }

        self.wait()
    }

    /// Wait for the terminal status of a tracee that is known to be dying, such as after
    /// a register read failed with `ESRCH`.
    pub fn reap(&mut self) -> Result<Exit> {
        if let Some(exit) = self.tracee.exit() {
            return Ok(exit);
        }

        let pid = self.tracee.pid();

        loop {
            let status = wait::waitpid(pid, Some(WaitPidFlag::__WALL)).waiting_on(pid)?;

            if let Some(exit) = Exit::from_wait_status(status) {
                info!(pid = pid.as_raw(), %exit, "tracee exited");
                self.tracee.set_exited(exit)?;
                return Ok(exit);
            }

            // A final stop raced with its death. The kernel still owes us the exit.
            trace!(?status, "skipping non-terminal status while reaping");
        }
    }

    /// Forcibly terminate the tracee with `SIGKILL`, and reap it.
    pub fn kill(&mut self) -> Result<Exit> {
        if self.tracee.is_terminated() {
            return Err(self.tracee.violation(Operation::Kill));
        }

        let pid = self.tracee.pid();

        // An unreaped child can always be signaled, even as a zombie.
        signal::kill(pid, Signal::SIGKILL).map_err(|source| Error::Kill { pid, source })?;

        let exit = loop {
            let status = wait::waitpid(pid, Some(WaitPidFlag::__WALL)).waiting_on(pid)?;

            if let Some(exit) = Exit::from_wait_status(status) {
                break exit;
            }
        };

        info!(pid = pid.as_raw(), %exit, "killed tracee");
        self.tracee.set_killed(exit)?;

        Ok(exit)
    }

    // Block for the next `wait(2)` status of the running tracee.
    fn wait(&mut self) -> Result<Status> {
        let pid = self.tracee.pid();
        let status = wait::waitpid(pid, Some(WaitPidFlag::__WALL)).waiting_on(pid)?;

        debug!(?status, "tracee changed state");

        let (stop, pending) = match status {
            WaitStatus::Exited(..) | WaitStatus::Signaled(..) => {
                if let Some(exit) = Exit::from_wait_status(status) {
                    info!(pid = pid.as_raw(), %exit, "tracee exited");
                    self.tracee.set_exited(exit)?;
                    return Ok(Status::Exited(exit));
                }
                internal_error!("terminal wait status without exit")
            },
            // With `PTRACE_O_TRACESYSGOOD` set, syscall-stops are reported here. The kernel
            // does not say whether a syscall-stop is an entry or an exit, so alternate,
            // starting from the entry.
            WaitStatus::PtraceSyscall(_) => {
                let stop = if self.tracee.in_syscall() {
                    self.tracee.set_in_syscall(false);
                    Stop::SyscallExit
                } else {
                    self.tracee.set_in_syscall(true);
                    Stop::SyscallEnter
                };
                (stop, None)
            },
            WaitStatus::PtraceEvent(_, _, code) => {
                // An exec replaces the image mid-`execve()`. Its syscall-exit-stop is
                // still to come, so leave `in_syscall` untouched.
                (Stop::Event { code }, None)
            },
            WaitStatus::Stopped(_, signal) => {
                // Re-deliver the signal on resume, so the tracee sees it as if untraced.
                (Stop::SignalDelivery { signal }, Some(signal))
            },
            // Assume `!WNOHANG`, `!WCONTINUED`.
            WaitStatus::Continued(_) | WaitStatus::StillAlive => {
                internal_error!("unreachable `wait()` status")
            },
        };

        self.tracee.set_stopped(stop, pending)?;

        Ok(Status::Stopped(stop))
    }
}
