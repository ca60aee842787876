#![allow(dead_code)]

use stoptrace::strace::{Record, SyscallTrace};
use stoptrace::{Command, Ptracer, Result};

/// Command running `script` with `/bin/sh -c`.
pub fn sh(script: &str) -> Command {
    let mut cmd = Command::new("/bin/sh");
    cmd.args(["-c", script]);
    cmd
}

/// Launch `cmd`, stopped after exec.
pub fn launch(cmd: &Command) -> Result<Ptracer> {
    let ptracer = Ptracer::spawn(cmd)?;
    eprintln!("tracee pid = {}", ptracer.tracee().pid());
    Ok(ptracer)
}

/// Trace `ptracer` to completion, failing on any error.
pub fn trace_all(ptracer: &mut Ptracer) -> Result<Vec<Record>> {
    let mut records = vec![];

    for record in SyscallTrace::new(ptracer) {
        let record = record?;
        eprintln!("{:?}", record);
        records.push(record);
    }

    Ok(records)
}

/// Assert that `records` is a run of syscalls closed by exactly one exit record.
pub fn assert_well_formed(records: &[Record]) {
    let (last, syscalls) = records.split_last().expect("no records");

    assert!(matches!(last, Record::Exit { .. }), "last record is not an exit: {:?}", last);

    for record in syscalls {
        assert!(matches!(record, Record::Syscall(_)), "exit record before the end: {:?}", record);
    }
}
