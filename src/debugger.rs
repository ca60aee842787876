//! Line-oriented operator commands against a stopped tracee.

use std::io::{BufRead, Write};

use tracing::debug;

use crate::error::Result;
use crate::ptracer::{Ptracer, Resume, Status};
use crate::regs::Registers;
use crate::tracee::{Exit, Stop};

/// Operator command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Verb {
    /// Leave the command loop. The tracee is left as it is.
    Quit,

    /// Forcibly terminate the tracee.
    Kill,

    /// Run the tracee until it next stops.
    Continue,

    /// Show the tracee's registers.
    Registers,

    /// Unrecognized input, kept for reporting.
    Invalid(String),
}

// Verbs in matching order: an abbreviation selects the first verb it is a prefix of.
const VERBS: &[(&str, Verb)] = &[
    ("quit", Verb::Quit),
    ("kill", Verb::Kill),
    ("continue", Verb::Continue),
    ("registers", Verb::Registers),
];

impl Verb {
    /// Parse the first word of `line`. Any trailing arguments are ignored.
    pub fn parse(line: &str) -> Self {
        let word = match line.split_whitespace().next() {
            Some(word) => word,
            None => return Verb::Invalid(line.trim().to_owned()),
        };

        VERBS
            .iter()
            .find(|(verb, _)| verb.starts_with(word))
            .map(|(_, cmd)| cmd.clone())
            .unwrap_or_else(|| Verb::Invalid(word.to_owned()))
    }
}

/// Outcome of one command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reply<'a> {
    Quit,
    Killed(Exit),
    Stopped(Stop),
    Exited(Exit),
    Registers(Registers),
    Invalid(&'a str),
}

/// Command dispatcher, translating each command into one request to the [`Ptracer`].
#[derive(Debug)]
pub struct Debugger {
    ptracer: Ptracer,
}

impl Debugger {
    pub fn new(ptracer: Ptracer) -> Self {
        Self { ptracer }
    }

    pub fn ptracer(&self) -> &Ptracer {
        &self.ptracer
    }

    /// Execute a single command.
    ///
    /// A register read that fails because the tracee died reaps it, and is answered
    /// with [`Reply::Exited`].
    pub fn execute<'c>(&mut self, cmd: &'c Verb) -> Result<Reply<'c>> {
        debug!(?cmd, "executing command");

        let reply = match cmd {
            Verb::Quit => Reply::Quit,
            Verb::Kill => Reply::Killed(self.ptracer.kill()?),
            Verb::Continue => match self.ptracer.resume(Resume::Continue)? {
                Status::Stopped(stop) => Reply::Stopped(stop),
                Status::Exited(exit) => Reply::Exited(exit),
            },
            Verb::Registers => match self.ptracer.registers() {
                Ok(regs) => Reply::Registers(regs),
                Err(err) if err.tracee_died() => Reply::Exited(self.ptracer.reap()?),
                Err(err) => return Err(err),
            },
            Verb::Invalid(text) => Reply::Invalid(text),
        };

        Ok(reply)
    }

    /// Read commands from `input` until `quit`, end of input, or a fatal error, writing
    /// replies and non-fatal errors to `output`.
    pub fn run(&mut self, input: impl BufRead, mut output: impl Write) -> Result<()> {
        for line in input.lines() {
            let cmd = Verb::parse(&line?);

            match self.execute(&cmd) {
                Ok(Reply::Quit) => break,
                Ok(reply) => report(&mut output, &reply)?,
                Err(err) if !err.is_fatal() => {
                    debug!(%err, "command failed");
                    writeln!(output, "error: {err}")?;
                },
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}

fn report(out: &mut impl Write, reply: &Reply<'_>) -> Result<()> {
    match reply {
        Reply::Quit => {},
        Reply::Killed(exit) => writeln!(out, "Killed ({exit}).")?,
        Reply::Stopped(stop) => writeln!(out, "Stopped at {stop}.")?,
        Reply::Exited(exit) => writeln!(out, "Process exited with {exit}.")?,
        Reply::Registers(regs) => write!(out, "{regs}")?,
        Reply::Invalid(text) => writeln!(out, "Invalid command: {text:?}")?,
    }

    Ok(())
}
