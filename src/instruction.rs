use std::fmt;

use serde::{Deserialize, Serialize};

use crate::opcode::{Format, Opcode};
use crate::registers::Reg;

/// A decoded instruction. Plain data; the [`Vm`](crate::vm::Vm) gives it
/// meaning.
///
/// `Display` produces the canonical assembly text, rebuilt from the operands
/// rather than copied from the source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
  R {
    op: Opcode,
    rd: Reg,
    rs1: Reg,
    rs2: Reg,
  },
  I {
    op: Opcode,
    rd: Reg,
    rs1: Reg,
    imm: i32,
  },
  S {
    op: Opcode,
    rs2: Reg,
    imm: i32,
    rs1: Reg,
  },
  U {
    op: Opcode,
    rd: Reg,
    imm: i32,
  },
  /// A `jal` whose offset was computed from `label`.
  Resolved {
    op: Opcode,
    rd: Reg,
    offset: i32,
    label: String,
  },
}

impl Instruction {
  pub fn opcode(&self) -> Opcode {
    match *self {
      Self::R { op, .. }
      | Self::I { op, .. }
      | Self::S { op, .. }
      | Self::U { op, .. }
      | Self::Resolved { op, .. } => op,
    }
  }

  pub fn format(&self) -> Format {
    match self {
      Self::R { .. } => Format::R,
      Self::I { .. } => Format::I,
      Self::S { .. } => Format::S,
      Self::U { .. } | Self::Resolved { .. } => Format::U,
    }
  }
}

impl fmt::Display for Instruction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::R { op, rd, rs1, rs2 } => write!(f, "{op} {rd}, {rs1}, {rs2}"),
      Self::I { op, rd, rs1, imm } => write!(f, "{op} {rd}, {rs1}, {imm}"),
      Self::S { op, rs2, imm, rs1 } => write!(f, "{op} {rs2}, {imm}, {rs1}"),
      Self::U { op, rd, imm } => write!(f, "{op} {rd}, {imm}"),
      Self::Resolved {
        op,
        rd,
        offset,
        label,
      } => write!(f, "{op} {rd}, {offset} # {label}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn reg(index: u32) -> Reg {
    Reg::new(index).unwrap()
  }

  #[test]
  fn canonical_text() {
    let cases = [
      (
        Instruction::R {
          op: Opcode::Add,
          rd: reg(1),
          rs1: reg(2),
          rs2: reg(3),
        },
        "add x1, x2, x3",
      ),
      (
        Instruction::I {
          op: Opcode::Addi,
          rd: reg(5),
          rs1: reg(0),
          imm: -10,
        },
        "addi x5, x0, -10",
      ),
      (
        Instruction::S {
          op: Opcode::Sw,
          rs2: reg(4),
          imm: 8,
          rs1: reg(2),
        },
        "sw x4, 8, x2",
      ),
      (
        Instruction::U {
          op: Opcode::Jal,
          rd: reg(1),
          imm: 3,
        },
        "jal x1, 3",
      ),
      (
        Instruction::Resolved {
          op: Opcode::Jal,
          rd: reg(0),
          offset: -1,
          label: "loop".into(),
        },
        "jal x0, -1 # loop",
      ),
    ];
    for (instruction, text) in cases {
      assert_eq!(instruction.to_string(), text);
    }
  }

  #[test]
  fn resolved_jump_is_u_format() {
    let jump = Instruction::Resolved {
      op: Opcode::Jal,
      rd: reg(0),
      offset: 2,
      label: "end".into(),
    };
    assert_eq!(jump.format(), Format::U);
    assert_eq!(jump.opcode(), Opcode::Jal);
  }
}
