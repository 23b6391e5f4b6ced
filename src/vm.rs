use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instruction::Instruction;
use crate::opcode::Opcode;
use crate::program::Region;
use crate::registers::{Reg, Registers, REGISTER_COUNT};

/// Words of data memory. Addresses index words, not bytes.
pub const MEMORY_WORDS: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  Running,
  Halted(Halt),
}

/// Why a machine halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
  /// The program counter left the program.
  End,
  /// [`Vm::stop`] was called.
  Stopped,
  Fault { pc: usize, fault: Fault },
}

/// A virtual machine for a small RV32 subset.
///
/// The program counter indexes instructions rather than bytes, so every
/// instruction advances it by exactly one and jump offsets count
/// instructions.
#[derive(Debug)]
pub struct Vm {
  pc: usize,
  registers: Registers,
  memory: Vec<i32>,
  state: State,
}

impl Vm {
  /// Create a new, empty virtual machine
  pub fn new() -> Self {
    Self {
      pc: 0,
      registers: Registers::new(),
      memory: vec![0; MEMORY_WORDS],
      state: State::Running,
    }
  }

  /// Execute the instruction under the program counter.
  ///
  /// Running off either end of `region` halts the machine without side
  /// effects. A fault also halts it, leaving the program counter on the
  /// faulting instruction.
  pub fn step<R>(&mut self, region: &R) -> Result<Step, Error>
  where
    R: Region,
  {
    if self.is_halted() {
      return Err(Error::MachineHalted);
    }

    let pc = self.pc;
    let Some(instruction) = region.instructions().get(pc) else {
      tracing::debug!(pc, "program counter left the program, halting");
      self.state = State::Halted(Halt::End);
      return Ok(Step::Halted);
    };
    tracing::trace!(pc, %instruction, "execute");

    let mut task = Task::new(self, pc);
    match task.run(instruction) {
      Ok(()) => Ok(Step::Executed),
      Err(fault) => {
        tracing::warn!(pc, %instruction, %fault, "runtime fault, halting");
        self.state = State::Halted(Halt::Fault { pc, fault });
        Err(Error::Fault { pc, fault })
      }
    }
  }

  /// Halt the machine. Any further step is refused.
  ///
  /// A machine that already halted keeps its original [`Halt`].
  pub fn stop(&mut self) {
    if self.state == State::Running {
      self.state = State::Halted(Halt::Stopped);
    }
  }

  pub fn pc(&self) -> usize {
    self.pc
  }

  pub fn state(&self) -> State {
    self.state
  }

  pub fn is_halted(&self) -> bool {
    self.halt().is_some()
  }

  pub fn halt(&self) -> Option<Halt> {
    match self.state {
      State::Running => None,
      State::Halted(halt) => Some(halt),
    }
  }

  pub fn register(&self, reg: Reg) -> i32 {
    self.registers.get(reg)
  }

  pub fn read_word(&self, address: usize) -> Option<i32> {
    self.memory.get(address).copied()
  }

  pub fn snapshot(&self) -> Snapshot {
    Snapshot {
      pc: self.pc,
      registers: self.registers.to_array(),
      halted: self.is_halted(),
    }
  }

  fn address(base: i32, offset: i32) -> Result<usize, Fault> {
    let address = i64::from(base) + i64::from(offset);
    usize::try_from(address)
      .ok()
      .filter(|&address| address < MEMORY_WORDS)
      .ok_or(Fault::MemoryOutOfBounds(address))
  }

  fn write_word(&mut self, address: usize, value: i32) -> Option<()> {
    self.memory.get_mut(address).map(|prev| {
      *prev = value;
    })
  }
}

impl Default for Vm {
  fn default() -> Self {
    Self::new()
  }
}

/// What a successful [`Vm::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  /// One instruction ran.
  Executed,
  /// The program counter was outside the program; the machine is now halted.
  Halted,
}

/// The machine state observers get to see after each step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
  pub pc: usize,
  pub registers: [i32; REGISTER_COUNT],
  pub halted: bool,
}

const PANEL_COLUMNS: usize = 4;

/// Renders the register panel: the program counter, then the registers four
/// to a row.
impl fmt::Display for Snapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "pc  {}", self.pc)?;
    if self.halted {
      f.write_str(" (halted)")?;
    }
    for (i, value) in self.registers.iter().enumerate() {
      if i % PANEL_COLUMNS == 0 {
        f.write_str("\n")?;
      } else {
        f.write_str("  ")?;
      }
      write!(f, "{:<3} {value:>11}", format!("x{i}"))?;
    }
    Ok(())
  }
}

/// A condition that stops execution of an instruction.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
  #[error("division by zero")]
  DivisionByZero,

  #[error("memory address {0} is out of bounds")]
  MemoryOutOfBounds(i64),

  #[error("jump target {0} is before the start of the program")]
  JumpOutOfRange(i64),

  #[error("`{0}` cannot be executed in this form")]
  IllegalInstruction(Opcode),
}

/// An error that occurred during execution of instructions
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
  #[error("machine is halted")]
  MachineHalted,

  #[error("fault at instruction {pc}: {fault}")]
  Fault { pc: usize, fault: Fault },

  #[error("program has errors:\n{0}")]
  InvalidProgram(#[from] crate::assembler::Diagnostics),
}

struct Task<'vm> {
  vm: &'vm mut Vm,
  pc: usize,
}

impl<'vm> Task<'vm> {
  fn new(vm: &'vm mut Vm, pc: usize) -> Self {
    Self { vm, pc }
  }

  fn reg(&self, reg: Reg) -> i32 {
    self.vm.registers.get(reg)
  }

  fn set_reg(&mut self, reg: Reg, value: i32) {
    self.vm.registers.set(reg, value);
  }

  /// The index of the instruction after this one, as a register value.
  fn link(&self) -> i32 {
    // programs come from source lines, so an index never nears i32::MAX
    (self.pc + 1) as i32
  }

  fn run(&mut self, instruction: &Instruction) -> Result<(), Fault> {
    let next = match *instruction {
      Instruction::R { op, rd, rs1, rs2 } => {
        let b = self.reg(rs2);
        arithmetic(self, op, rd, rs1, b)?
      }
      Instruction::I {
        op: Opcode::Jalr,
        rd,
        rs1,
        imm,
      } => jump_and_link_register(self, rd, rs1, imm)?,
      Instruction::I {
        op: Opcode::Lw,
        rd,
        rs1,
        imm,
      } => load_word(self, rd, rs1, imm)?,
      Instruction::I { op, rd, rs1, imm } => arithmetic(self, op, rd, rs1, imm)?,
      Instruction::S { op, rs2, imm, rs1 } => store_word(self, op, rs2, imm, rs1)?,
      Instruction::U { op, rd, imm } => jump_and_link(self, op, rd, imm)?,
      Instruction::Resolved { op, rd, offset, .. } => jump_and_link(self, op, rd, offset)?,
    };

    self.vm.pc = match next {
      Next::Fallthrough => self.pc + 1,
      Next::Jump(target) => target,
    };
    Ok(())
  }

  /// Resolves a displacement relative to this instruction.
  ///
  /// The displacement is the net change of the program counter, so a jump
  /// replaces the usual advance by one rather than adding to it.
  fn target(&self, offset: i64) -> Result<usize, Fault> {
    let target = self.pc as i64 + offset;
    usize::try_from(target).map_err(|_| Fault::JumpOutOfRange(target))
  }
}

enum Next {
  Fallthrough,
  Jump(usize),
}

// r[d] ← r[s1] op b
fn arithmetic(task: &mut Task<'_>, op: Opcode, rd: Reg, rs1: Reg, b: i32) -> Result<Next, Fault> {
  let alu = op.alu().ok_or(Fault::IllegalInstruction(op))?;
  let value = alu.apply(task.reg(rs1), b)?;
  task.set_reg(rd, value);
  Ok(Next::Fallthrough)
}

// r[d] ← pc + 1; pc ← pc + r[s1] + imm
fn jump_and_link_register(task: &mut Task<'_>, rd: Reg, rs1: Reg, imm: i32) -> Result<Next, Fault> {
  let target = task.target(i64::from(task.reg(rs1)) + i64::from(imm))?;
  let link = task.link();
  task.set_reg(rd, link);
  Ok(Next::Jump(target))
}

// r[d] ← m[r[s1] + imm]
fn load_word(task: &mut Task<'_>, rd: Reg, rs1: Reg, imm: i32) -> Result<Next, Fault> {
  let address = Vm::address(task.reg(rs1), imm)?;
  let value = task
    .vm
    .read_word(address)
    .ok_or(Fault::MemoryOutOfBounds(address as i64))?;
  task.set_reg(rd, value);
  Ok(Next::Fallthrough)
}

// m[r[s1] + imm] ← r[s2]
fn store_word(
  task: &mut Task<'_>,
  op: Opcode,
  rs2: Reg,
  imm: i32,
  rs1: Reg,
) -> Result<Next, Fault> {
  if op != Opcode::Sw {
    return Err(Fault::IllegalInstruction(op));
  }
  let address = Vm::address(task.reg(rs1), imm)?;
  let value = task.reg(rs2);
  task
    .vm
    .write_word(address, value)
    .ok_or(Fault::MemoryOutOfBounds(address as i64))?;
  Ok(Next::Fallthrough)
}

// r[d] ← pc + 1; pc ← pc + offset
fn jump_and_link(task: &mut Task<'_>, op: Opcode, rd: Reg, offset: i32) -> Result<Next, Fault> {
  if op != Opcode::Jal {
    return Err(Fault::IllegalInstruction(op));
  }
  let target = task.target(i64::from(offset))?;
  let link = task.link();
  task.set_reg(rd, link);
  Ok(Next::Jump(target))
}
