use std::fmt;

use serde::{Deserialize, Serialize};

/// The number of addressable registers.
pub const REGISTER_COUNT: usize = 32;

/// An index into the register file, always below [`REGISTER_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Reg(u8);

impl Reg {
  /// The hardwired zero register, `x0`.
  pub const ZERO: Reg = Reg(0);

  pub fn new(index: u32) -> Option<Self> {
    if (index as usize) < REGISTER_COUNT {
      Some(Self(index as u8))
    } else {
      None
    }
  }

  pub fn index(self) -> usize {
    self.0 as usize
  }
}

impl TryFrom<u8> for Reg {
  type Error = String;

  fn try_from(index: u8) -> Result<Self, Self::Error> {
    Self::new(index as u32).ok_or_else(|| format!("register x{index} does not exist"))
  }
}

impl From<Reg> for u8 {
  fn from(reg: Reg) -> Self {
    reg.0
  }
}

impl fmt::Display for Reg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "x{}", self.0)
  }
}

/// The register file. `x0` reads as zero and discards writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers([i32; REGISTER_COUNT]);

impl Registers {
  pub fn new() -> Self {
    Self([0; REGISTER_COUNT])
  }

  pub fn get(&self, reg: Reg) -> i32 {
    if reg == Reg::ZERO {
      0
    } else {
      self.0[reg.index()]
    }
  }

  pub fn set(&mut self, reg: Reg, value: i32) {
    if reg != Reg::ZERO {
      self.0[reg.index()] = value;
    }
  }

  pub fn to_array(&self) -> [i32; REGISTER_COUNT] {
    self.0
  }
}

impl Default for Registers {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn reg(index: u32) -> Reg {
    Reg::new(index).unwrap()
  }

  #[test]
  fn range() {
    assert!(Reg::new(0).is_some());
    assert!(Reg::new(31).is_some());
    assert!(Reg::new(32).is_none());
    assert!(Reg::new(u32::MAX).is_none());
  }

  #[test]
  fn display() {
    assert_eq!(reg(17).to_string(), "x17");
  }

  #[test]
  fn zero_is_hardwired() {
    let mut regs = Registers::new();
    regs.set(Reg::ZERO, 42);
    assert_eq!(regs.get(Reg::ZERO), 0);
    assert_eq!(regs.to_array()[0], 0);
  }

  #[test]
  fn write_then_read() {
    let mut regs = Registers::new();
    regs.set(reg(5), -7);
    assert_eq!(regs.get(reg(5)), -7);
    assert_eq!(regs.get(reg(6)), 0);
  }

  #[test]
  fn deserialize_rejects_out_of_range() {
    assert!(serde_json::from_str::<Reg>("31").is_ok());
    assert!(serde_json::from_str::<Reg>("32").is_err());
  }
}
