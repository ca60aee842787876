use std::io::{self, Write};
use std::process;

use anyhow::{Context, Result};
use structopt::{clap::AppSettings, StructOpt};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use stoptrace::debugger::Debugger;
use stoptrace::strace::{Record, SyscallTrace};
use stoptrace::{Command, Ptracer};

#[derive(StructOpt, Debug)]
#[structopt(about = "Trace the syscalls of a program, or drive it from stdin")]
struct Opt {
    /// Log tracer internals to stderr. `RUST_LOG` takes precedence.
    #[structopt(short, long)]
    verbose: bool,

    /// Let the tracee outlive the tracer.
    #[structopt(long)]
    no_exit_kill: bool,

    #[structopt(subcommand)]
    mode: Mode,
}

#[derive(StructOpt, Debug)]
enum Mode {
    /// Print every syscall the program makes, with its return value.
    #[structopt(setting = AppSettings::TrailingVarArg)]
    Trace {
        #[structopt(min_values = 1, required = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },

    /// Stop the program after exec and accept `quit`, `kill`, `continue` and `registers`.
    #[structopt(setting = AppSettings::TrailingVarArg)]
    Debug {
        #[structopt(min_values = 1, required = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },
}

impl Mode {
    fn argv(&self) -> &[String] {
        match self {
            Mode::Trace { argv } | Mode::Debug { argv } => argv,
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    init_logging(opt.verbose);

    let mut cmd = Command::from_argv(opt.mode.argv()).context("program required")?;
    cmd.exit_kill(!opt.no_exit_kill);

    println!("Executing {}:", cmd.program().to_string_lossy());

    let mut ptracer = Ptracer::spawn(&cmd)?;
    debug!(pid = ptracer.tracee().pid().as_raw(), "tracee ready");

    match opt.mode {
        Mode::Trace { .. } => {
            let code = trace(&mut ptracer)?;
            process::exit(code);
        },
        Mode::Debug { .. } => {
            let mut debugger = Debugger::new(ptracer);
            let stdin = io::stdin();
            debugger.run(stdin.lock(), io::stdout())?;
        },
    }

    Ok(())
}

// Print one line per syscall. Returns the tracee's exit value.
fn trace(ptracer: &mut Ptracer) -> Result<i32> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for record in SyscallTrace::new(ptracer) {
        match record {
            Ok(Record::Syscall(syscall)) => writeln!(out, "{syscall}")?,
            Ok(Record::Exit { exit, last_syscall }) => {
                if let Some(entry) = last_syscall {
                    writeln!(out, "{} - {}() => ?", entry.number, entry.name)?;
                }
                writeln!(out, "Child exited with {}.", exit.exit_value())?;
                return Ok(exit.exit_value());
            },
            Err(err) if !err.is_fatal() => eprintln!("error: {err}"),
            Err(err) => return Err(err.into()),
        }
    }

    anyhow::bail!("trace ended without tracee exit")
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Opt {
        Opt::from_iter_safe(args).unwrap()
    }

    #[test]
    fn test_tracee_flags_are_passed_through() {
        let opt = parse(&["stoptrace", "trace", "sh", "-c", "exit 7"]);
        assert!(matches!(opt.mode, Mode::Trace { .. }));
        assert_eq!(opt.mode.argv(), ["sh", "-c", "exit 7"]);

        let opt = parse(&["stoptrace", "debug", "ls", "-l", "--color=never"]);
        assert!(matches!(opt.mode, Mode::Debug { .. }));
        assert_eq!(opt.mode.argv(), ["ls", "-l", "--color=never"]);
    }

    #[test]
    fn test_tracer_flags_precede_mode() {
        let opt = parse(&["stoptrace", "-v", "--no-exit-kill", "trace", "true", "-v"]);
        assert!(opt.verbose);
        assert!(opt.no_exit_kill);
        assert_eq!(opt.mode.argv(), ["true", "-v"]);
    }

    #[test]
    fn test_separator_still_accepted() {
        let opt = parse(&["stoptrace", "trace", "--", "sh", "-c", "exit 7"]);
        assert_eq!(opt.mode.argv(), ["sh", "-c", "exit 7"]);
    }

    #[test]
    fn test_program_required() {
        assert!(Opt::from_iter_safe(&["stoptrace", "trace"]).is_err());
    }
}
