//! The traced process and its lifecycle.

use std::fmt;
use std::marker::PhantomData;

use nix::sys::wait::WaitStatus;
use tracing::debug;

use crate::error::{Error, Result};
use crate::regs::{self, Registers};

pub use nix::unistd::Pid;

/// POSIX signal.
pub use nix::sys::signal::Signal;

/// Where a tracee is in its life, as far as the tracer is concerned.
///
/// `Killed` and `Exited` are terminal: once reached, no transition leaves them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lifecycle {
    /// In a ptrace-stop, ready to be inspected or resumed.
    Stopped,

    /// Resumed, with the next stop not yet observed.
    Running,

    /// Terminated by an explicit kill request.
    Killed,

    /// Terminated on its own, or by a signal from outside the tracer.
    Exited,
}

impl Lifecycle {
    pub fn is_terminal(self) -> bool {
        matches!(self, Lifecycle::Killed | Lifecycle::Exited)
    }

    /// Whether the state machine permits moving from `self` to `to`.
    pub fn can_transition(self, to: Lifecycle) -> bool {
        use Lifecycle::*;

        match (self, to) {
            (Killed, _) | (Exited, _) => false,
            (Stopped, Running) | (Stopped, Killed) | (Stopped, Exited) => true,
            (Running, Stopped) | (Running, Killed) | (Running, Exited) => true,
            (Stopped, Stopped) | (Running, Running) => false,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Stopped => "stopped",
            Lifecycle::Running => "running",
            Lifecycle::Killed => "killed",
            Lifecycle::Exited => "exited",
        };
        f.write_str(s)
    }
}

/// An operation gated on the tracee lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    Resume,
    ReadRegisters,
    Kill,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Resume => "resume",
            Operation::ReadRegisters => "read registers of",
            Operation::Kill => "kill",
        };
        f.write_str(s)
    }
}

/// The kind of ptrace-stop a tracee was last seen in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stop {
    /// First stop after the traced `execve()` loaded the new image.
    Exec,

    // signal-delivery-stop
    SignalDelivery { signal: Signal },

    // syscall-stops
    SyscallEnter,
    SyscallExit,

    /// Any other ptrace-event-stop, with its `PTRACE_EVENT_*` code.
    Event { code: i32 },
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stop::Exec => f.write_str("exec"),
            Stop::SignalDelivery { signal } => write!(f, "signal {signal}"),
            Stop::SyscallEnter => f.write_str("syscall entry"),
            Stop::SyscallExit => f.write_str("syscall exit"),
            Stop::Event { code } => write!(f, "ptrace event {code}"),
        }
    }
}

/// How a tracee terminated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Exit {
    Code(i32),
    Signal { signal: Signal, core_dumped: bool },
}

impl Exit {
    /// Exit value as a shell would report it: the exit code, or `128 + signo`.
    pub fn exit_value(&self) -> i32 {
        match *self {
            Exit::Code(code) => code,
            Exit::Signal { signal, .. } => 128 + signal as i32,
        }
    }

    /// Interpret a terminal `wait(2)` status. Returns `None` for stops.
    pub(crate) fn from_wait_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(Exit::Code(code)),
            WaitStatus::Signaled(_, signal, core_dumped) => Some(Exit::Signal { signal, core_dumped }),
            _ => None,
        }
    }
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exit::Code(code) => write!(f, "exit code {code}"),
            Exit::Signal { signal, core_dumped: true } => write!(f, "signal {signal} (core dumped)"),
            Exit::Signal { signal, .. } => write!(f, "signal {signal}"),
        }
    }
}

/// A traced process.
///
/// Only the thread that launched the tracee may issue ptrace requests for it, so a
/// `Tracee` is neither `Send` nor `Sync`.
#[derive(Debug)]
pub struct Tracee {
    pid: Pid,
    lifecycle: Lifecycle,
    stop: Option<Stop>,
    pending: Option<Signal>,
    last_registers: Option<Registers>,
    exit: Option<Exit>,

    // Inside a syscall: the next syscall-stop is a syscall-exit-stop.
    in_syscall: bool,

    #[doc(hidden)]
    _not_send: PhantomData<*const ()>,
}

impl Tracee {
    /// Wrap a freshly-launched tracee, known to be in its first ptrace-stop.
    pub(crate) fn new(pid: Pid) -> Self {
        Self {
            pid,
            lifecycle: Lifecycle::Stopped,
            stop: Some(Stop::Exec),
            pending: None,
            last_registers: None,
            exit: None,
            in_syscall: false,
            _not_send: PhantomData,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_terminated(&self) -> bool {
        self.lifecycle.is_terminal()
    }

    /// The most recent stop, if the tracee is stopped.
    pub fn stop(&self) -> Option<Stop> {
        self.stop
    }

    /// Signal to be delivered when the tracee is next resumed.
    pub fn pending_signal(&self) -> Option<Signal> {
        self.pending
    }

    /// How the tracee terminated, once it has been reaped.
    pub fn exit(&self) -> Option<Exit> {
        self.exit
    }

    /// Registers from the last successful read at the current stop.
    pub fn last_registers(&self) -> Option<&Registers> {
        self.last_registers.as_ref()
    }

    /// Read the full register set.
    ///
    /// Only legal while [`Lifecycle::Stopped`]. A failed read leaves the lifecycle as is;
    /// if [`Error::tracee_died()`] holds for the error, the caller should reap the
    /// tracee (see [`Ptracer::reap()`](crate::Ptracer::reap)).
    pub fn registers(&mut self) -> Result<Registers> {
        self.ensure_stopped(Operation::ReadRegisters)?;

        let regs = regs::read(self.pid)?;
        self.last_registers = Some(regs);

        Ok(regs)
    }

    pub(crate) fn ensure_stopped(&self, operation: Operation) -> Result<()> {
        if self.lifecycle == Lifecycle::Stopped {
            Ok(())
        } else {
            Err(self.violation(operation))
        }
    }

    pub(crate) fn violation(&self, operation: Operation) -> Error {
        Error::LifecycleViolation {
            pid: self.pid,
            operation,
            lifecycle: self.lifecycle,
        }
    }

    pub(crate) fn in_syscall(&self) -> bool {
        self.in_syscall
    }

    pub(crate) fn set_in_syscall(&mut self, in_syscall: bool) {
        self.in_syscall = in_syscall;
    }

    pub(crate) fn take_pending(&mut self) -> Option<Signal> {
        self.pending.take()
    }

    pub(crate) fn set_running(&mut self) -> Result<()> {
        self.transition(Lifecycle::Running)?;
        self.stop = None;
        self.last_registers = None;
        Ok(())
    }

    pub(crate) fn set_stopped(&mut self, stop: Stop, pending: Option<Signal>) -> Result<()> {
        self.transition(Lifecycle::Stopped)?;
        self.stop = Some(stop);
        self.pending = pending;
        Ok(())
    }

    pub(crate) fn set_exited(&mut self, exit: Exit) -> Result<()> {
        self.transition(Lifecycle::Exited)?;
        self.terminate(exit);
        Ok(())
    }

    pub(crate) fn set_killed(&mut self, exit: Exit) -> Result<()> {
        self.transition(Lifecycle::Killed)?;
        self.terminate(exit);
        Ok(())
    }

    fn terminate(&mut self, exit: Exit) {
        self.exit = Some(exit);
        self.stop = None;
        self.pending = None;
        self.last_registers = None;
        self.in_syscall = false;
    }

    fn transition(&mut self, to: Lifecycle) -> Result<()> {
        let from = self.lifecycle;

        if !from.can_transition(to) {
            internal_error!(format!("illegal lifecycle transition {from} -> {to} for tracee {}", self.pid));
        }

        debug!(pid = self.pid.as_raw(), %from, %to, "tracee lifecycle transition");
        self.lifecycle = to;

        Ok(())
    }
}
