//! Syscall tracing: bracketing every syscall of a tracee between its entry and exit stops.

use std::fmt;

use tracing::{trace, warn};

use crate::error::Result;
use crate::ptracer::{Ptracer, Resume, Status};
use crate::regs::Registers;
use crate::syscalls;
use crate::tracee::{Exit, Stop};

/// A syscall observed at its entry stop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyscallEntry {
    pub number: u64,
    pub name: &'static str,
}

impl From<&Registers> for SyscallEntry {
    fn from(regs: &Registers) -> Self {
        let number = regs.syscall_number();
        let name = syscalls::name(number);
        Self { number, name }
    }
}

/// A syscall that returned to the tracee.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyscallRecord {
    pub number: u64,
    pub name: &'static str,
    pub return_value: i64,
}

impl fmt::Display for SyscallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}() => {}", self.number, self.name, self.return_value)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Record {
    Syscall(SyscallRecord),

    /// The tracee terminated. This is always the last record.
    ///
    /// `last_syscall` is the syscall it was in, if it never returned from it, such as
    /// `exit_group()`.
    Exit {
        exit: Exit,
        last_syscall: Option<SyscallEntry>,
    },
}

/// Iterator over the syscalls of a tracee, driving it with syscall-boundary steps.
///
/// Each item covers one syscall, from its entry stop to its exit stop. Register reads
/// that fail for reasons other than the tracee's death are yielded as errors, and tracing
/// carries on with the next syscall. Iteration ends after the [`Record::Exit`] record,
/// or after the first fatal error.
#[derive(Debug)]
pub struct SyscallTrace<'a> {
    ptracer: &'a mut Ptracer,
    done: bool,
}

impl<'a> SyscallTrace<'a> {
    pub fn new(ptracer: &'a mut Ptracer) -> Self {
        Self { ptracer, done: false }
    }

    fn trace_syscall(&mut self) -> Result<Record> {
        if let Some(exit) = self.advance_to(Stop::SyscallEnter)? {
            return Ok(Record::Exit { exit, last_syscall: None });
        }

        let entry = match self.ptracer.registers() {
            Ok(regs) => Ok(SyscallEntry::from(&regs)),
            Err(err) if err.tracee_died() => {
                let exit = self.ptracer.reap()?;
                return Ok(Record::Exit { exit, last_syscall: None });
            },
            Err(err) => Err(err),
        };

        // Step to the exit even if the entry was unreadable, to stay in sync with the
        // enter/exit alternation.
        if let Some(exit) = self.advance_to(Stop::SyscallExit)? {
            if let Err(err) = &entry {
                warn!(%err, "dropping register read error of final syscall");
            }
            return Ok(Record::Exit { exit, last_syscall: entry.ok() });
        }

        let entry = entry?;

        match self.ptracer.registers() {
            Ok(regs) => Ok(Record::Syscall(SyscallRecord {
                number: entry.number,
                name: entry.name,
                return_value: regs.return_value(),
            })),
            Err(err) if err.tracee_died() => {
                let exit = self.ptracer.reap()?;
                Ok(Record::Exit { exit, last_syscall: Some(entry) })
            },
            Err(err) => Err(err),
        }
    }

    // Step from syscall-stop to syscall-stop until reaching `target`, passing through any
    // other stops. Returns the exit if the tracee terminates first.
    fn advance_to(&mut self, target: Stop) -> Result<Option<Exit>> {
        loop {
            match self.ptracer.resume(Resume::Syscall)? {
                Status::Exited(exit) => return Ok(Some(exit)),
                Status::Stopped(stop) if stop == target => return Ok(None),
                Status::Stopped(stop) => {
                    trace!(?stop, ?target, "passing through stop");
                },
            }
        }
    }
}

impl Iterator for SyscallTrace<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = self.trace_syscall();
        self.done = ends_trace(&item, self.ptracer.tracee().is_terminated());

        Some(item)
    }
}

// Recoverable errors keep the trace going for as long as the tracee lives.
fn ends_trace(item: &Result<Record>, terminated: bool) -> bool {
    match item {
        Ok(Record::Exit { .. }) => true,
        Ok(Record::Syscall(_)) => false,
        Err(err) => err.is_fatal() || terminated,
    }
}

#[cfg(test)]
mod tests {
    use nix::{errno::Errno, unistd::Pid};

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_entry_decodes_orig_rax() {
        let regs = Registers {
            orig_rax: 231,
            rax: -38i64 as u64,
            ..Registers::default()
        };

        let entry = SyscallEntry::from(&regs);
        assert_eq!(entry, SyscallEntry { number: 231, name: "exit_group" });
    }

    #[test]
    fn test_record_display() {
        let record = SyscallRecord { number: 1, name: "write", return_value: 6 };
        assert_eq!(record.to_string(), "1 - write() => 6");

        let failed = SyscallRecord { number: 21, name: "access", return_value: -2 };
        assert_eq!(failed.to_string(), "21 - access() => -2");
    }

    #[test]
    fn test_register_read_error_does_not_end_live_trace() {
        let pid = Pid::from_raw(1);
        let item = Err(Error::RegisterRead { pid, source: Errno::EIO });

        assert!(!ends_trace(&item, false));
        assert!(ends_trace(&item, true));
    }

    #[test]
    fn test_resume_error_ends_trace() {
        let pid = Pid::from_raw(1);
        let item = Err(Error::Resume { pid, mode: Resume::Syscall, source: Errno::EIO });

        assert!(ends_trace(&item, false));
    }

    #[test]
    fn test_exit_record_ends_trace() {
        let syscall = Ok(Record::Syscall(SyscallRecord { number: 1, name: "write", return_value: 3 }));
        let exit = Ok(Record::Exit { exit: Exit::Code(0), last_syscall: None });

        assert!(!ends_trace(&syscall, false));
        assert!(ends_trace(&exit, false));
    }
}
