//! General-purpose register state of a stopped tracee.

use std::fmt;

use nix::sys::ptrace;

use crate::error::{Result, ResultExt};
use crate::tracee::Pid;

/// Snapshot of the x86_64 general-purpose registers at one stop.
///
/// The layout mirrors the kernel's `struct user_regs_struct` field for field, in the
/// order `PTRACE_GETREGS` fills it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Registers {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rax: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub orig_rax: u64,
    pub rip: u64,
    pub cs: u64,
    pub eflags: u64,
    pub rsp: u64,
    pub ss: u64,
    pub fs_base: u64,
    pub gs_base: u64,
    pub ds: u64,
    pub es: u64,
    pub fs: u64,
    pub gs: u64,
}

impl Registers {
    /// Number of the syscall being invoked, valid at syscall-stops.
    pub fn syscall_number(&self) -> u64 {
        self.orig_rax
    }

    /// Syscall return value, valid at syscall-exit-stops. Negative values are `-errno`.
    pub fn return_value(&self) -> i64 {
        self.rax as i64
    }

    pub fn instruction_pointer(&self) -> u64 {
        self.rip
    }

    pub fn stack_pointer(&self) -> u64 {
        self.rsp
    }

    pub fn flags(&self) -> u64 {
        self.eflags
    }

    /// Register names and values, in the order the kernel lays them out.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> {
        [
            ("R15", self.r15),
            ("R14", self.r14),
            ("R13", self.r13),
            ("R12", self.r12),
            ("RBP", self.rbp),
            ("RBX", self.rbx),
            ("R11", self.r11),
            ("R10", self.r10),
            ("R9", self.r9),
            ("R8", self.r8),
            ("RAX", self.rax),
            ("RCX", self.rcx),
            ("RDX", self.rdx),
            ("RSI", self.rsi),
            ("RDI", self.rdi),
            ("O_RAX", self.orig_rax),
            ("RIP", self.rip),
            ("CS", self.cs),
            ("EFLAGS", self.eflags),
            ("RSP", self.rsp),
            ("SS", self.ss),
            ("FS_BASE", self.fs_base),
            ("GS_BASE", self.gs_base),
            ("DS", self.ds),
            ("ES", self.es),
            ("FS", self.fs),
            ("GS", self.gs),
        ]
        .into_iter()
    }
}

impl From<libc::user_regs_struct> for Registers {
    fn from(regs: libc::user_regs_struct) -> Self {
        Self {
            r15: regs.r15,
            r14: regs.r14,
            r13: regs.r13,
            r12: regs.r12,
            rbp: regs.rbp,
            rbx: regs.rbx,
            r11: regs.r11,
            r10: regs.r10,
            r9: regs.r9,
            r8: regs.r8,
            rax: regs.rax,
            rcx: regs.rcx,
            rdx: regs.rdx,
            rsi: regs.rsi,
            rdi: regs.rdi,
            orig_rax: regs.orig_rax,
            rip: regs.rip,
            cs: regs.cs,
            eflags: regs.eflags,
            rsp: regs.rsp,
            ss: regs.ss,
            fs_base: regs.fs_base,
            gs_base: regs.gs_base,
            ds: regs.ds,
            es: regs.es,
            fs: regs.fs,
            gs: regs.gs,
        }
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

/// Read the register file of the stopped task `pid`.
///
/// Does not consult or change any lifecycle state; see [`Tracee::registers()`].
///
/// [`Tracee::registers()`]: crate::Tracee::registers
pub(crate) fn read(pid: Pid) -> Result<Registers> {
    let regs = ptrace::getregs(pid).registers_of(pid)?;
    Ok(regs.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_every_register() {
        let regs = Registers {
            orig_rax: 60,
            rip: 0x401000,
            ..Registers::default()
        };

        let dump = regs.to_string();
        let lines: Vec<_> = dump.lines().collect();

        assert_eq!(lines.len(), 27);
        assert_eq!(lines[0], "R15: 0");
        assert!(lines.contains(&"O_RAX: 60"));
        assert!(lines.contains(&"RIP: 4198400"));
    }

    #[test]
    fn test_return_value_is_signed() {
        let regs = Registers {
            rax: -2i64 as u64,
            ..Registers::default()
        };

        assert_eq!(regs.return_value(), -2);
    }
}
