use std::ffi::{OsStr, OsString};
use std::os::unix::process::CommandExt;
use std::process;

use nix::{
    sys::{
        ptrace::{self, Options},
        signal::{self, Signal},
        wait::{self, WaitPidFlag, WaitStatus},
    },
    unistd::Pid,
};
use tracing::{debug, info};

use crate::error::{Error, Result, ResultExt};
use crate::tracee::{Exit, Tracee};

/// Exit code of a child that could not request `PTRACE_TRACEME`.
const TRACEME_FAILED: i32 = 127;

/// Options set on every launched tracee.
///
/// `PTRACE_O_TRACESYSGOOD` lets syscall-stops be told apart from `SIGTRAP` deliveries, and
/// `PTRACE_O_TRACEEXEC` turns any further `execve()` into a ptrace-event-stop instead of
/// a bare `SIGTRAP`.
pub const REQUIRED_OPTIONS: Options = Options::PTRACE_O_TRACESYSGOOD.union(Options::PTRACE_O_TRACEEXEC);

/// Command to launch as a traced child process.
#[derive(Clone, Debug)]
pub struct Command {
    program: OsString,
    args: Vec<OsString>,

    /// Have the kernel `SIGKILL` the tracee if the tracer exits.
    ///
    /// Defaults to `true`.
    exit_kill: bool,
}

impl Command {
    /// The program is resolved against `PATH` like `execvp()`.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: vec![],
            exit_kill: true,
        }
    }

    /// Build a command from an argument vector whose first element is the program.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut argv = argv.into_iter();
        let mut cmd = Self::new(argv.next()?);
        cmd.args(argv);
        Some(cmd)
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    /// Set the value of the `exit_kill` flag.
    pub fn exit_kill(&mut self, exit_kill: bool) -> &mut Self {
        self.exit_kill = exit_kill;
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Ptrace options that will be set on the launched tracee.
    pub fn options(&self) -> Options {
        if self.exit_kill {
            REQUIRED_OPTIONS | Options::PTRACE_O_EXITKILL
        } else {
            REQUIRED_OPTIONS
        }
    }

    /// Fork and exec the command as a tracee of the calling thread.
    ///
    /// The child requests `PTRACE_TRACEME` after forking, pre-exec, so the kernel stops it
    /// with a `SIGTRAP` as soon as the new image is loaded. We wait for exactly that stop
    /// before returning, so the tracee is [`Stopped`](crate::Lifecycle::Stopped) on
    /// success.
    pub fn launch(&self) -> Result<Tracee> {
        let program = self.program.to_string_lossy().into_owned();

        if program.is_empty() {
            let source = std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty program name");
            return Err(Error::Launch { program, source });
        }

        let mut cmd = process::Command::new(&self.program);
        cmd.args(&self.args);

        // On fork, request `PTRACE_TRACEME`. If that fails, bail out before `exec()`
        // so the parent sees an exit instead of the trace-ready stop. Only
        // async-signal-safe calls are allowed here.
        unsafe {
            cmd.pre_exec(|| {
                if ptrace::traceme().is_err() {
                    libc::_exit(TRACEME_FAILED);
                }
                Ok(())
            })
        };

        let child = cmd.spawn().map_err(|source| Error::Launch { program: program.clone(), source })?;
        let pid = Pid::from_raw(child.id() as i32);

        info!(pid = pid.as_raw(), %program, "launched tracee");

        sync_exec(pid, self.options())?;

        Ok(Tracee::new(pid))
    }
}

// Wait for the post-`execve()` `SIGTRAP` of a self-attached child, then set `options`.
fn sync_exec(pid: Pid, options: Options) -> Result<()> {
    let status = wait::waitpid(pid, Some(WaitPidFlag::__WALL)).waiting_on(pid)?;

    debug!(?status, "initial wait status");

    match status {
        WaitStatus::Stopped(_, Signal::SIGTRAP) => {},
        WaitStatus::Exited(_, TRACEME_FAILED) => {
            let reason = "child could not request PTRACE_TRACEME".into();
            return Err(Error::TraceSetup { pid, reason });
        },
        status => {
            if Exit::from_wait_status(status).is_none() {
                discard(pid);
            }
            let reason = format!("expected a SIGTRAP stop after exec, saw {status:?}");
            return Err(Error::TraceSetup { pid, reason });
        },
    }

    if let Err(errno) = ptrace::setoptions(pid, options) {
        discard(pid);
        let reason = format!("could not set ptrace options: {errno}");
        return Err(Error::TraceSetup { pid, reason });
    }

    Ok(())
}

// Kill and reap a live child we failed to set up for tracing.
fn discard(pid: Pid) {
    debug!(pid = pid.as_raw(), "tracing not established, discarding child");

    if let Err(errno) = signal::kill(pid, Signal::SIGKILL) {
        debug!(pid = pid.as_raw(), %errno, "could not kill discarded child");
    }

    match wait::waitpid(pid, Some(WaitPidFlag::__WALL)) {
        Ok(status) => debug!(pid = pid.as_raw(), ?status, "reaped discarded child"),
        Err(errno) => debug!(pid = pid.as_raw(), %errno, "could not reap discarded child"),
    }
}
