//! The arithmetic unit: stateless binary functions over 32-bit words.
//!
//! Results wrap on overflow, and shift amounts only use their low five bits,
//! so that every function is total apart from division by zero.

use serde::{Deserialize, Serialize};

use crate::vm::Fault;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
  Add,
  Sub,
  Slt,
  And,
  Or,
  Xor,
  Sll,
  Srl,
  Sra,
  Mul,
  Div,
  Rem,
}

const SHAMT_MASK: i32 = 0x1F;

impl AluOp {
  pub fn apply(self, a: i32, b: i32) -> Result<i32, Fault> {
    let value = match self {
      Self::Add => a.wrapping_add(b),
      Self::Sub => a.wrapping_sub(b),
      Self::Slt => (a < b) as i32,
      Self::And => a & b,
      Self::Or => a | b,
      Self::Xor => a ^ b,
      Self::Sll => a.wrapping_shl((b & SHAMT_MASK) as u32),
      Self::Srl => ((a as u32) >> (b & SHAMT_MASK)) as i32,
      Self::Sra => a >> (b & SHAMT_MASK),
      Self::Mul => a.wrapping_mul(b),
      Self::Div => {
        if b == 0 {
          return Err(Fault::DivisionByZero);
        }
        // i32::MIN / -1 overflows; it wraps back to i32::MIN
        a.wrapping_div(b)
      }
      Self::Rem => {
        if b == 0 {
          return Err(Fault::DivisionByZero);
        }
        a.wrapping_rem(b)
      }
    };
    Ok(value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn add_sub_wrap() {
    assert_eq!(AluOp::Add.apply(2, 3), Ok(5));
    assert_eq!(AluOp::Add.apply(i32::MAX, 1), Ok(i32::MIN));
    assert_eq!(AluOp::Sub.apply(i32::MIN, 1), Ok(i32::MAX));
    assert_eq!(AluOp::Sub.apply(3, 5), Ok(-2));
  }

  #[test]
  fn slt_is_signed() {
    assert_eq!(AluOp::Slt.apply(-1, 0), Ok(1));
    assert_eq!(AluOp::Slt.apply(0, -1), Ok(0));
    assert_eq!(AluOp::Slt.apply(4, 4), Ok(0));
  }

  #[test]
  fn bitwise() {
    assert_eq!(AluOp::And.apply(0b1100, 0b1010), Ok(0b1000));
    assert_eq!(AluOp::Or.apply(0b1100, 0b1010), Ok(0b1110));
    assert_eq!(AluOp::Xor.apply(0b1100, 0b1010), Ok(0b0110));
  }

  mod shifts {
    use super::*;

    #[test]
    fn left() {
      assert_eq!(AluOp::Sll.apply(1, 4), Ok(16));
      assert_eq!(AluOp::Sll.apply(1, 31), Ok(i32::MIN));
    }

    #[test]
    fn amount_uses_low_five_bits() {
      assert_eq!(AluOp::Sll.apply(1, 32), Ok(1));
      assert_eq!(AluOp::Sll.apply(1, 33), Ok(2));
      assert_eq!(AluOp::Srl.apply(8, -1), Ok(0)); // -1 & 31 == 31
    }

    #[test]
    fn right_logical_fills_with_zero() {
      assert_eq!(AluOp::Srl.apply(-8, 1), Ok(0x7FFF_FFFC));
      assert_eq!(AluOp::Srl.apply(8, 2), Ok(2));
    }

    #[test]
    fn right_arithmetic_keeps_sign() {
      assert_eq!(AluOp::Sra.apply(-8, 1), Ok(-4));
      assert_eq!(AluOp::Sra.apply(8, 2), Ok(2));
    }
  }

  mod muldiv {
    use super::*;

    #[test]
    fn mul_wraps() {
      assert_eq!(AluOp::Mul.apply(-6, 7), Ok(-42));
      assert_eq!(AluOp::Mul.apply(0x1_0000, 0x1_0000), Ok(0));
    }

    #[test]
    fn div_truncates_toward_zero() {
      assert_eq!(AluOp::Div.apply(7, 2), Ok(3));
      assert_eq!(AluOp::Div.apply(-7, 2), Ok(-3));
    }

    #[test]
    fn rem_takes_dividend_sign() {
      assert_eq!(AluOp::Rem.apply(7, 3), Ok(1));
      assert_eq!(AluOp::Rem.apply(-7, 3), Ok(-1));
    }

    #[test]
    fn by_zero_faults() {
      assert_eq!(AluOp::Div.apply(1, 0), Err(Fault::DivisionByZero));
      assert_eq!(AluOp::Rem.apply(1, 0), Err(Fault::DivisionByZero));
    }

    #[test]
    fn overflow_wraps() {
      assert_eq!(AluOp::Div.apply(i32::MIN, -1), Ok(i32::MIN));
      assert_eq!(AluOp::Rem.apply(i32::MIN, -1), Ok(0));
    }
  }
}
