//! Decoding of raw x86_64 syscall numbers.
//!
//! Numbering follows the kernel's `arch/x86/entry/syscalls/syscall_64.tbl`. The table is
//! split into two dense blocks, since numbers 336 through 423 are reserved on x86_64 to
//! keep the 64-bit table aligned with the generic one.

/// Name reported for numbers that do not denote a known syscall.
pub const UNKNOWN: &str = "UNKNOWN";

/// The x86_64 syscall table.
pub static SYSCALLS: SyscallTable = SyscallTable {
    blocks: &[(0, LEGACY), (424, MODERN)],
};

/// Syscalls `0..=335`.
const LEGACY: &[&str] = &[
    "read", "write", "open", "close", "stat", "fstat", "lstat", "poll", "lseek", "mmap",
    "mprotect", "munmap", "brk", "rt_sigaction", "rt_sigprocmask", "rt_sigreturn", "ioctl",
    "pread64", "pwrite64", "readv", "writev", "access", "pipe", "select", "sched_yield",
    "mremap", "msync", "mincore", "madvise", "shmget", "shmat", "shmctl", "dup", "dup2",
    "pause", "nanosleep", "getitimer", "alarm", "setitimer", "getpid", "sendfile", "socket",
    "connect", "accept", "sendto", "recvfrom", "sendmsg", "recvmsg", "shutdown", "bind",
    "listen", "getsockname", "getpeername", "socketpair", "setsockopt", "getsockopt",
    "clone", "fork", "vfork", "execve", "exit", "wait4", "kill", "uname", "semget", "semop",
    "semctl", "shmdt", "msgget", "msgsnd", "msgrcv", "msgctl", "fcntl", "flock", "fsync",
    "fdatasync", "truncate", "ftruncate", "getdents", "getcwd", "chdir", "fchdir", "rename",
    "mkdir", "rmdir", "creat", "link", "unlink", "symlink", "readlink", "chmod", "fchmod",
    "chown", "fchown", "lchown", "umask", "gettimeofday", "getrlimit", "getrusage",
    "sysinfo", "times", "ptrace", "getuid", "syslog", "getgid", "setuid", "setgid",
    "geteuid", "getegid", "setpgid", "getppid", "getpgrp", "setsid", "setreuid", "setregid",
    "getgroups", "setgroups", "setresuid", "getresuid", "setresgid", "getresgid", "getpgid",
    "setfsuid", "setfsgid", "getsid", "capget", "capset", "rt_sigpending",
    "rt_sigtimedwait", "rt_sigqueueinfo", "rt_sigsuspend", "sigaltstack", "utime", "mknod",
    "uselib", "personality", "ustat", "statfs", "fstatfs", "sysfs", "getpriority",
    "setpriority", "sched_setparam", "sched_getparam", "sched_setscheduler",
    "sched_getscheduler", "sched_get_priority_max", "sched_get_priority_min",
    "sched_rr_get_interval", "mlock", "munlock", "mlockall", "munlockall", "vhangup",
    "modify_ldt", "pivot_root", "_sysctl", "prctl", "arch_prctl", "adjtimex", "setrlimit",
    "chroot", "sync", "acct", "settimeofday", "mount", "umount2", "swapon", "swapoff",
    "reboot", "sethostname", "setdomainname", "iopl", "ioperm", "create_module",
    "init_module", "delete_module", "get_kernel_syms", "query_module", "quotactl",
    "nfsservctl", "getpmsg", "putpmsg", "afs_syscall", "tuxcall", "security", "gettid",
    "readahead", "setxattr", "lsetxattr", "fsetxattr", "getxattr", "lgetxattr", "fgetxattr",
    "listxattr", "llistxattr", "flistxattr", "removexattr", "lremovexattr", "fremovexattr",
    "tkill", "time", "futex", "sched_setaffinity", "sched_getaffinity", "set_thread_area",
    "io_setup", "io_destroy", "io_getevents", "io_submit", "io_cancel", "get_thread_area",
    "lookup_dcookie", "epoll_create", "epoll_ctl_old", "epoll_wait_old", "remap_file_pages",
    "getdents64", "set_tid_address", "restart_syscall", "semtimedop", "fadvise64",
    "timer_create", "timer_settime", "timer_gettime", "timer_getoverrun", "timer_delete",
    "clock_settime", "clock_gettime", "clock_getres", "clock_nanosleep", "exit_group",
    "epoll_wait", "epoll_ctl", "tgkill", "utimes", "vserver", "mbind", "set_mempolicy",
    "get_mempolicy", "mq_open", "mq_unlink", "mq_timedsend", "mq_timedreceive", "mq_notify",
    "mq_getsetattr", "kexec_load", "waitid", "add_key", "request_key", "keyctl",
    "ioprio_set", "ioprio_get", "inotify_init", "inotify_add_watch", "inotify_rm_watch",
    "migrate_pages", "openat", "mkdirat", "mknodat", "fchownat", "futimesat", "newfstatat",
    "unlinkat", "renameat", "linkat", "symlinkat", "readlinkat", "fchmodat", "faccessat",
    "pselect6", "ppoll", "unshare", "set_robust_list", "get_robust_list", "splice", "tee",
    "sync_file_range", "vmsplice", "move_pages", "utimensat", "epoll_pwait", "signalfd",
    "timerfd_create", "eventfd", "fallocate", "timerfd_settime", "timerfd_gettime",
    "accept4", "signalfd4", "eventfd2", "epoll_create1", "dup3", "pipe2", "inotify_init1",
    "preadv", "pwritev", "rt_tgsigqueueinfo", "perf_event_open", "recvmmsg",
    "fanotify_init", "fanotify_mark", "prlimit64", "name_to_handle_at", "open_by_handle_at",
    "clock_adjtime", "syncfs", "sendmmsg", "setns", "getcpu", "process_vm_readv",
    "process_vm_writev", "kcmp", "finit_module", "sched_setattr", "sched_getattr",
    "renameat2", "seccomp", "getrandom", "memfd_create", "kexec_file_load", "bpf",
    "execveat", "userfaultfd", "membarrier", "mlock2", "copy_file_range", "preadv2",
    "pwritev2", "pkey_mprotect", "pkey_alloc", "pkey_free", "statx", "io_pgetevents",
    "rseq", "uretprobe",
];

/// Syscalls `424..`, numbered alike across architectures.
const MODERN: &[&str] = &[
    "pidfd_send_signal", "io_uring_setup", "io_uring_enter", "io_uring_register",
    "open_tree", "move_mount", "fsopen", "fsconfig", "fsmount", "fspick", "pidfd_open",
    "clone3", "close_range", "openat2", "pidfd_getfd", "faccessat2", "process_madvise",
    "epoll_pwait2", "mount_setattr", "quotactl_fd", "landlock_create_ruleset",
    "landlock_add_rule", "landlock_restrict_self", "memfd_secret", "process_mrelease",
    "futex_waitv", "set_mempolicy_home_node", "cachestat", "fchmodat2", "map_shadow_stack",
    "futex_wake", "futex_wait", "futex_requeue", "statmount", "listmount",
    "lsm_get_self_attr", "lsm_set_self_attr", "lsm_list_modules", "mseal",
];

/// Fixed mapping from syscall number to its canonical name.
///
/// Each block is a contiguous run of numbers starting at its base, so a lookup is one
/// range check and one index per block.
#[derive(Debug)]
pub struct SyscallTable {
    blocks: &'static [(u64, &'static [&'static str])],
}

impl SyscallTable {
    /// Canonical name of syscall `nr`, or [`UNKNOWN`].
    pub fn name(&self, nr: u64) -> &'static str {
        self.get(nr).unwrap_or(UNKNOWN)
    }

    pub fn get(&self, nr: u64) -> Option<&'static str> {
        self.blocks.iter().find_map(|&(base, names)| {
            let index = nr.checked_sub(base)?;
            let index = usize::try_from(index).ok()?;
            names.get(index).copied()
        })
    }

    /// Inverse of [`SyscallTable::get()`].
    pub fn number(&self, name: &str) -> Option<u64> {
        self.iter().find(|&(_, n)| n == name).map(|(nr, _)| nr)
    }

    /// Number of known syscalls.
    pub fn len(&self) -> usize {
        self.blocks.iter().map(|(_, names)| names.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest known syscall number.
    pub fn max(&self) -> u64 {
        self.blocks
            .iter()
            .map(|&(base, names)| base + names.len() as u64 - 1)
            .max()
            .unwrap_or(0)
    }

    /// Known `(number, name)` pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &'static str)> + '_ {
        self.blocks.iter().flat_map(|&(base, names)| {
            names
                .iter()
                .enumerate()
                .map(move |(i, &name)| (base + i as u64, name))
        })
    }
}

/// Canonical name of syscall `nr` on x86_64, or [`UNKNOWN`].
pub fn name(nr: u64) -> &'static str {
    SYSCALLS.name(nr)
}

/// Number of the x86_64 syscall called `name`, if any.
pub fn number(name: &str) -> Option<u64> {
    SYSCALLS.number(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_match_libc() {
        let cases = [
            (libc::SYS_read, "read"),
            (libc::SYS_write, "write"),
            (libc::SYS_execve, "execve"),
            (libc::SYS_exit, "exit"),
            (libc::SYS_arch_prctl, "arch_prctl"),
            (libc::SYS_exit_group, "exit_group"),
            (libc::SYS_openat, "openat"),
            (libc::SYS_rseq, "rseq"),
            (libc::SYS_pidfd_send_signal, "pidfd_send_signal"),
            (libc::SYS_clone3, "clone3"),
            (libc::SYS_faccessat2, "faccessat2"),
        ];

        for (nr, expected) in cases {
            assert_eq!(name(nr as u64), expected, "syscall {nr}");
        }
    }

    #[test]
    fn test_reserved_gap_is_unknown() {
        for nr in 336..424 {
            assert_eq!(name(nr), UNKNOWN);
        }
    }

    #[test]
    fn test_max() {
        assert_eq!(SYSCALLS.max(), 462);
        assert_eq!(name(SYSCALLS.max()), "mseal");
        assert_eq!(name(SYSCALLS.max() + 1), UNKNOWN);
        assert_eq!(SYSCALLS.len(), 336 + 39);
    }

    #[test]
    fn test_iter_is_ascending() {
        let numbers: Vec<u64> = SYSCALLS.iter().map(|(nr, _)| nr).collect();
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(numbers.len(), SYSCALLS.len());
    }
}
