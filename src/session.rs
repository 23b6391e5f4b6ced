//! The interactive context: the current source text, what it compiled to, and
//! the machine running it.

use std::fmt;

use crate::assembler::{self, Diagnostics};
use crate::program::Program;
use crate::vm::{Error, Snapshot, Step, Vm};

/// Identifies one load of a program or one run loop over it.
///
/// Every reload and every new run loop bumps the session's generation, so a
/// run loop holding an older value knows it has been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
  fn next(self) -> Self {
    Self(self.0.wrapping_add(1))
  }
}

impl fmt::Display for Generation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Debug)]
pub struct Session {
  source: String,
  program: Result<Program, Diagnostics>,
  vm: Vm,
  generation: Generation,
}

impl Session {
  /// A session with empty source, compiled and ready to step.
  pub fn new() -> Self {
    Self::with_source(String::new())
  }

  pub fn with_source(source: impl Into<String>) -> Self {
    let source = source.into();
    let program = assembler::assemble(&source);
    Self {
      source,
      program,
      vm: Vm::new(),
      generation: Generation(0),
    }
  }

  pub fn source(&self) -> &str {
    &self.source
  }

  /// Replace the source text without recompiling; see [`Session::reload`].
  pub fn set_source(&mut self, source: impl Into<String>) {
    self.source = source.into();
  }

  /// Replace the source text and reload from it.
  pub fn load(&mut self, source: impl Into<String>) -> Result<&Program, &Diagnostics> {
    self.set_source(source);
    self.reload()
  }

  /// Recompile the current source and start over on a fresh machine.
  ///
  /// Whatever was running is invalidated, whether it had halted or not.
  pub fn reload(&mut self) -> Result<&Program, &Diagnostics> {
    self.program = assembler::assemble(&self.source);
    self.vm = Vm::new();
    self.generation = self.generation.next();
    match &self.program {
      Ok(program) => tracing::info!(
        generation = %self.generation,
        instructions = program.len(),
        "program loaded"
      ),
      Err(errors) => tracing::info!(
        generation = %self.generation,
        errors = errors.len(),
        "program has errors"
      ),
    }
    self.program()
  }

  pub fn program(&self) -> Result<&Program, &Diagnostics> {
    self.program.as_ref()
  }

  /// The compiled output: the disassembly, or every error message when the
  /// source did not compile.
  pub fn listing(&self) -> String {
    match &self.program {
      Ok(program) => program.disassembly(),
      Err(errors) => errors.to_string(),
    }
  }

  /// Execute one instruction. Refused while the source has errors.
  pub fn step(&mut self) -> Result<Step, Error> {
    match &self.program {
      Ok(program) => self.vm.step(program),
      Err(errors) => Err(Error::InvalidProgram(errors.clone())),
    }
  }

  pub fn stop(&mut self) {
    tracing::debug!(generation = %self.generation, "stop requested");
    self.vm.stop();
  }

  pub fn vm(&self) -> &Vm {
    &self.vm
  }

  pub fn snapshot(&self) -> Snapshot {
    self.vm.snapshot()
  }

  pub fn generation(&self) -> Generation {
    self.generation
  }

  /// Claim the session for a new run loop, retiring any earlier one.
  pub(crate) fn begin_run(&mut self) -> Generation {
    self.generation = self.generation.next();
    self.generation
  }
}

impl Default for Session {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::registers::Reg;
  use crate::vm::{Halt, State};

  fn reg(index: u32) -> Reg {
    Reg::new(index).unwrap()
  }

  #[test]
  fn new_session_is_empty() {
    let mut session = Session::new();
    assert_eq!(session.source(), "");
    assert_eq!(session.listing(), "");
    assert_eq!(session.step(), Ok(Step::Halted));
  }

  #[test]
  fn listing_shows_disassembly() {
    let session = Session::with_source("addi  x5,x0,10\nloop:\njal x0, loop");
    assert_eq!(session.listing(), "addi x5, x0, 10\njal x0, 0 # loop");
  }

  #[test]
  fn listing_shows_errors_instead() {
    let mut session = Session::with_source("addi x1, x0, 1\nfoo x1, x2, x3");
    assert_eq!(session.listing(), "unknown operator 'foo' of type 'R' at line 2");
    assert!(matches!(session.step(), Err(Error::InvalidProgram(_))));
    assert_eq!(session.snapshot().pc, 0);
    assert_eq!(session.vm().register(reg(1)), 0);
  }

  #[test]
  fn reload_replaces_machine_state() {
    let mut session = Session::with_source("addi x1, x0, 3\naddi x2, x0, 4");
    assert_eq!(session.step(), Ok(Step::Executed));
    assert_eq!(session.step(), Ok(Step::Executed));
    assert_eq!(session.step(), Ok(Step::Halted));

    let before = session.generation();
    assert!(session.reload().is_ok());
    assert!(session.generation() > before);
    assert_eq!(session.vm().state(), State::Running);
    assert_eq!(session.snapshot().pc, 0);
    assert_eq!(session.vm().register(reg(1)), 0);
    assert_eq!(session.vm().register(reg(2)), 0);
  }

  #[test]
  fn set_source_waits_for_reload() {
    let mut session = Session::with_source("addi x1, x0, 1");
    session.set_source("addi x1, x0, 2");
    assert_eq!(session.listing(), "addi x1, x0, 1");
    assert_eq!(session.source(), "addi x1, x0, 2");
    assert!(session.reload().is_ok());
    assert_eq!(session.listing(), "addi x1, x0, 2");
  }

  #[test]
  fn load_with_errors_then_fix() {
    let mut session = Session::new();
    assert!(session.load("jal x0, nowhere").is_err());
    assert_eq!(session.listing(), "unknown label 'nowhere' at line 1");
    let program = session.load("nowhere:\njal x0, nowhere").unwrap();
    assert_eq!(program.len(), 1);
  }

  #[test]
  fn stop_is_observed_by_the_next_step() {
    let mut session = Session::with_source("loop:\naddi x1, x1, 1\njal x0, loop");
    assert_eq!(session.step(), Ok(Step::Executed));
    session.stop();
    assert_eq!(session.vm().halt(), Some(Halt::Stopped));
    assert_eq!(session.step(), Err(Error::MachineHalted));
    assert!(session.snapshot().halted);
    assert_eq!(session.vm().register(reg(1)), 1);
  }

  #[test]
  fn begin_run_bumps_generation() {
    let mut session = Session::new();
    let first = session.begin_run();
    let second = session.begin_run();
    assert!(second > first);
    assert_eq!(session.generation(), second);
  }
}
