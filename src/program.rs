use std::fmt;

use serde::Serialize;

use crate::instruction::Instruction;

/// A region of instructions
pub trait Region {
  fn instructions(&self) -> &[Instruction];
}

/// A `Program` is a fully resolved sequence of instructions that our virtual
/// machine may execute. Only the assembler builds one, and only when the
/// source had no errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Program {
  instructions: Vec<Instruction>,
}

impl Program {
  pub(crate) fn new(instructions: Vec<Instruction>) -> Self {
    Self { instructions }
  }

  pub fn len(&self) -> usize {
    self.instructions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&Instruction> {
    self.instructions.get(index)
  }

  /// One canonical instruction per line.
  pub fn disassembly(&self) -> String {
    self.to_string()
  }
}

impl Region for Program {
  fn instructions(&self) -> &[Instruction] {
    &self.instructions
  }
}

impl fmt::Display for Program {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, instruction) in self.instructions.iter().enumerate() {
      if i > 0 {
        f.write_str("\n")?;
      }
      write!(f, "{instruction}")?;
    }
    Ok(())
  }
}
