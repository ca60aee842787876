//! A minimal `ptrace(2)` tracer for x86_64 Linux.
//!
//! A [`Tracee`] is launched from a [`Command`], then driven by a [`Ptracer`] in either of
//! two modes: free-running until its next stop, or stepping from one syscall boundary to
//! the next. [`strace::SyscallTrace`] and [`debugger::Debugger`] build the two operator
//! tools on top of that.

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
compile_error!("stoptrace only supports x86_64 Linux");

#[macro_use]
pub mod error;

pub mod cmd;
pub mod debugger;
pub mod ptracer;
pub mod regs;
pub mod strace;
pub mod syscalls;
pub mod tracee;

pub use cmd::Command;
pub use error::{Error, Result};
pub use ptracer::{Ptracer, Resume, Status};
pub use regs::Registers;
pub use tracee::{Exit, Lifecycle, Operation, Pid, Signal, Stop, Tracee};
