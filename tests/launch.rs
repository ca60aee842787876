use anyhow::Result;
use ntest::timeout;
use stoptrace::{Command, Error, Lifecycle, Resume, Status, Stop};

mod support;
use support::*;

#[test]
#[timeout(2000)]
fn test_launch_is_stopped_after_exec() -> Result<()> {
    let mut ptracer = launch(&Command::new("true"))?;

    assert_eq!(ptracer.lifecycle(), Lifecycle::Stopped);
    assert_eq!(ptracer.tracee().stop(), Some(Stop::Exec));
    assert_eq!(ptracer.tracee().pending_signal(), None);
    assert!(ptracer.tracee().exit().is_none());

    ptracer.kill()?;

    Ok(())
}

#[test]
#[timeout(2000)]
fn test_registers_after_launch() -> Result<()> {
    let mut ptracer = launch(&Command::new("true"))?;

    let regs = ptracer.registers()?;
    eprintln!("{regs}");

    // Stopped at the entry point of the loaded image (or its interpreter).
    assert_ne!(regs.instruction_pointer(), 0);
    assert_ne!(regs.stack_pointer(), 0);
    assert_eq!(ptracer.tracee().last_registers(), Some(&regs));

    // Reading again at the same stop yields the same snapshot.
    assert_eq!(ptracer.registers()?, regs);

    ptracer.kill()?;

    Ok(())
}

#[test]
#[timeout(2000)]
fn test_resume_invalidates_registers() -> Result<()> {
    let mut ptracer = launch(&Command::new("true"))?;

    ptracer.registers()?;
    assert!(ptracer.tracee().last_registers().is_some());

    let status = ptracer.resume(Resume::Syscall)?;
    assert_eq!(status, Status::Stopped(Stop::SyscallEnter));
    assert!(ptracer.tracee().last_registers().is_none());

    ptracer.kill()?;

    Ok(())
}

#[test]
fn test_launch_missing_program() {
    let err = Command::new("/nonexistent/stoptrace-test-program").launch().unwrap_err();

    assert!(matches!(err, Error::Launch { .. }), "{err:?}");
    assert!(err.is_fatal());
}

#[test]
fn test_launch_empty_program() {
    let err = Command::new("").launch().unwrap_err();

    assert!(matches!(err, Error::Launch { .. }), "{err:?}");
}

#[test]
#[timeout(2000)]
fn test_launch_without_exit_kill() -> Result<()> {
    let mut cmd = Command::new("true");
    cmd.exit_kill(false);

    let mut ptracer = launch(&cmd)?;
    let exit = ptracer.kill()?;

    assert_eq!(ptracer.lifecycle(), Lifecycle::Killed);
    assert_eq!(exit.exit_value(), 137);

    Ok(())
}
