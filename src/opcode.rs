use std::fmt;

use serde::{Deserialize, Serialize};

use crate::alu::AluOp;

/// The operand layout of a source line.
///
/// Every [`Opcode`] belongs to exactly one format, and a mnemonic is only
/// accepted on a line whose operands have that layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
  /// `op rd, rs1, rs2`
  R,
  /// `op rd, rs1, imm`
  I,
  /// `op rs2, imm, rs1`
  S,
  /// `op rd, imm` (and `op rd, label`)
  U,
}

impl fmt::Display for Format {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let tag = match self {
      Self::R => "R",
      Self::I => "I",
      Self::S => "S",
      Self::U => "U",
    };
    f.write_str(tag)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
  /// | Operation | Semantics/RTL           | Assembly          |
  /// |-----------|-------------------------|-------------------|
  /// | Add       | `r[d] ← r[s1] + r[s2]`  | `add rd, rs1, rs2` |
  Add,
  /// | Operation | Semantics/RTL           | Assembly          |
  /// |-----------|-------------------------|-------------------|
  /// | Subtract  | `r[d] ← r[s1] − r[s2]`  | `sub rd, rs1, rs2` |
  Sub,
  /// | Operation     | Semantics/RTL                  | Assembly          |
  /// |---------------|--------------------------------|-------------------|
  /// | Set Less Than | `r[d] ← r[s1] < r[s2] ? 1 : 0` | `slt rd, rs1, rs2` |
  Slt,
  And,
  Or,
  Xor,
  /// | Operation          | Semantics/RTL                | Assembly          |
  /// |--------------------|------------------------------|-------------------|
  /// | Shift Left Logical | `r[d] ← r[s1] << r[s2][4:0]` | `sll rd, rs1, rs2` |
  Sll,
  /// Zero-filling right shift.
  Srl,
  /// Sign-extending right shift.
  Sra,
  Mul,
  /// | Operation | Semantics/RTL          | Assembly          |
  /// |-----------|------------------------|-------------------|
  /// | Divide    | `r[d] ← r[s1] ÷ r[s2]` | `div rd, rs1, rs2` |
  ///
  /// Truncates toward zero. Faults when `r[s2]` is zero.
  Div,
  /// Remainder with the sign of the dividend. Faults when `r[s2]` is zero.
  Rem,

  /// | Operation     | Semantics/RTL          | Assembly           |
  /// |---------------|------------------------|--------------------|
  /// | Add Immediate | `r[d] ← r[s1] + imm`   | `addi rd, rs1, imm` |
  Addi,
  Slti,
  Andi,
  Ori,
  Xori,
  Slli,
  Srli,
  Srai,

  /// | Operation              | Semantics/RTL                       | Assembly           |
  /// |------------------------|-------------------------------------|--------------------|
  /// | Jump And Link Register | `r[d] ← pc + 1; pc ← pc + r[s1] + imm` | `jalr rd, rs1, imm` |
  ///
  /// The target is relative to the jump itself, not absolute.
  Jalr,

  /// | Operation | Semantics/RTL             | Assembly         |
  /// |-----------|---------------------------|------------------|
  /// | Load Word | `r[d] ← m[r[s1] + imm]`   | `lw rd, rs1, imm` |
  Lw,

  /// | Operation  | Semantics/RTL             | Assembly          |
  /// |------------|---------------------------|-------------------|
  /// | Store Word | `m[r[s1] + imm] ← r[s2]`  | `sw rs2, imm, rs1` |
  Sw,

  /// | Operation     | Semantics/RTL                    | Assembly                         |
  /// |---------------|----------------------------------|----------------------------------|
  /// | Jump And Link | `r[d] ← pc + 1; pc ← pc + off`   | `jal rd, off` or `jal rd, label` |
  Jal,
}

impl Opcode {
  pub const ALL: [Opcode; 24] = [
    Self::Add,
    Self::Sub,
    Self::Slt,
    Self::And,
    Self::Or,
    Self::Xor,
    Self::Sll,
    Self::Srl,
    Self::Sra,
    Self::Mul,
    Self::Div,
    Self::Rem,
    Self::Addi,
    Self::Slti,
    Self::Andi,
    Self::Ori,
    Self::Xori,
    Self::Slli,
    Self::Srli,
    Self::Srai,
    Self::Jalr,
    Self::Lw,
    Self::Sw,
    Self::Jal,
  ];

  pub fn mnemonic(self) -> &'static str {
    match self {
      Self::Add => "add",
      Self::Sub => "sub",
      Self::Slt => "slt",
      Self::And => "and",
      Self::Or => "or",
      Self::Xor => "xor",
      Self::Sll => "sll",
      Self::Srl => "srl",
      Self::Sra => "sra",
      Self::Mul => "mul",
      Self::Div => "div",
      Self::Rem => "rem",
      Self::Addi => "addi",
      Self::Slti => "slti",
      Self::Andi => "andi",
      Self::Ori => "ori",
      Self::Xori => "xori",
      Self::Slli => "slli",
      Self::Srli => "srli",
      Self::Srai => "srai",
      Self::Jalr => "jalr",
      Self::Lw => "lw",
      Self::Sw => "sw",
      Self::Jal => "jal",
    }
  }

  pub fn format(self) -> Format {
    match self {
      Self::Add
      | Self::Sub
      | Self::Slt
      | Self::And
      | Self::Or
      | Self::Xor
      | Self::Sll
      | Self::Srl
      | Self::Sra
      | Self::Mul
      | Self::Div
      | Self::Rem => Format::R,
      Self::Addi
      | Self::Slti
      | Self::Andi
      | Self::Ori
      | Self::Xori
      | Self::Slli
      | Self::Srli
      | Self::Srai
      | Self::Jalr
      | Self::Lw => Format::I,
      Self::Sw => Format::S,
      Self::Jal => Format::U,
    }
  }

  /// Looks `mnemonic` up in the operation table of `format`.
  ///
  /// Mnemonics are case-sensitive, and a known mnemonic used with the wrong
  /// operand layout (`add x1, x2, 5`) is not found.
  pub fn lookup(format: Format, mnemonic: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|op| op.format() == format && op.mnemonic() == mnemonic)
  }

  /// The arithmetic function shared by the register and immediate forms.
  pub fn alu(self) -> Option<AluOp> {
    let op = match self {
      Self::Add | Self::Addi => AluOp::Add,
      Self::Sub => AluOp::Sub,
      Self::Slt | Self::Slti => AluOp::Slt,
      Self::And | Self::Andi => AluOp::And,
      Self::Or | Self::Ori => AluOp::Or,
      Self::Xor | Self::Xori => AluOp::Xor,
      Self::Sll | Self::Slli => AluOp::Sll,
      Self::Srl | Self::Srli => AluOp::Srl,
      Self::Sra | Self::Srai => AluOp::Sra,
      Self::Mul => AluOp::Mul,
      Self::Div => AluOp::Div,
      Self::Rem => AluOp::Rem,
      Self::Jalr | Self::Lw | Self::Sw | Self::Jal => return None,
    };
    Some(op)
  }
}

impl fmt::Display for Opcode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.mnemonic())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_respects_format() {
    assert_eq!(Opcode::lookup(Format::R, "add"), Some(Opcode::Add));
    assert_eq!(Opcode::lookup(Format::I, "add"), None);
    assert_eq!(Opcode::lookup(Format::I, "addi"), Some(Opcode::Addi));
    assert_eq!(Opcode::lookup(Format::I, "lw"), Some(Opcode::Lw));
    assert_eq!(Opcode::lookup(Format::S, "sw"), Some(Opcode::Sw));
    assert_eq!(Opcode::lookup(Format::U, "jal"), Some(Opcode::Jal));
    assert_eq!(Opcode::lookup(Format::U, "jalr"), None);
  }

  #[test]
  fn lookup_is_case_sensitive() {
    assert_eq!(Opcode::lookup(Format::R, "ADD"), None);
  }

  #[test]
  fn there_is_no_subi() {
    assert_eq!(Opcode::lookup(Format::I, "subi"), None);
    assert_eq!(Opcode::lookup(Format::I, "muli"), None);
  }

  #[test]
  fn immediate_forms_share_the_register_function() {
    assert_eq!(Opcode::Addi.alu(), Opcode::Add.alu());
    assert_eq!(Opcode::Srai.alu(), Some(AluOp::Sra));
    assert_eq!(Opcode::Jalr.alu(), None);
    assert_eq!(Opcode::Sw.alu(), None);
  }

  #[test]
  fn every_mnemonic_is_unique() {
    for (i, a) in Opcode::ALL.iter().enumerate() {
      for b in &Opcode::ALL[i + 1..] {
        assert_ne!(a.mnemonic(), b.mnemonic());
      }
    }
  }
}
