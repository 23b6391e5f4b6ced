//! Line-oriented tokenizer.
//!
//! A source line is split into a mnemonic and comma-separated operands, each
//! operand is classified as a register (`x5`), an immediate (`-12`) or an
//! identifier (`loop`), and the sequence of operand kinds selects the line's
//! [`Line`] shape. Mnemonics are not checked here; that happens against the
//! shape's operation table in the assembler.

use crate::registers::Reg;

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';
const OPERAND_SEPARATOR: char = ',';

/// A classified source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'src> {
  /// `op rd, rs1, rs2`
  R {
    mnemonic: &'src str,
    rd: Reg,
    rs1: Reg,
    rs2: Reg,
  },
  /// `op rd, rs1, imm`
  I {
    mnemonic: &'src str,
    rd: Reg,
    rs1: Reg,
    imm: i32,
  },
  /// `op rs2, imm, rs1`
  S {
    mnemonic: &'src str,
    rs2: Reg,
    imm: i32,
    rs1: Reg,
  },
  /// `op rd, imm`
  U {
    mnemonic: &'src str,
    rd: Reg,
    imm: i32,
  },
  /// `jal rd, label`
  LabelJump { rd: Reg, label: &'src str },
  /// `label:`
  Label(&'src str),
  /// Blank or comment-only.
  Empty,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
  #[error("no instruction shape matches")]
  Unmatched,

  #[error("operand '{0}' is out of range")]
  OutOfRange(String),
}

/// An operand token, classified by its spelling alone. Values are range
/// checked only once the line has matched a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand<'src> {
  Reg(&'src str),
  Imm(&'src str),
  Ident(&'src str),
}

/// Classifies one line of source text.
pub fn parse_line(line: &str) -> Result<Line<'_>, LineError> {
  let code = match line.split_once(COMMENT_CHAR) {
    Some((code, _comment)) => code,
    None => line,
  }
  .trim();

  if code.is_empty() {
    return Ok(Line::Empty);
  }

  if let Some(name) = code.strip_suffix(LABEL_SUFFIX) {
    return if is_identifier(name) {
      Ok(Line::Label(name))
    } else {
      Err(LineError::Unmatched)
    };
  }

  let (mnemonic, rest) = code
    .split_once(char::is_whitespace)
    .ok_or(LineError::Unmatched)?;
  if !is_word(mnemonic) {
    return Err(LineError::Unmatched);
  }

  let operands = rest
    .split(OPERAND_SEPARATOR)
    .map(|token| operand(token.trim()))
    .collect::<Option<Vec<_>>>()
    .ok_or(LineError::Unmatched)?;

  let shape = match operands[..] {
    [Operand::Reg(rd), Operand::Reg(rs1), Operand::Reg(rs2)] => Line::R {
      mnemonic,
      rd: register(rd)?,
      rs1: register(rs1)?,
      rs2: register(rs2)?,
    },
    [Operand::Reg(rd), Operand::Reg(rs1), Operand::Imm(imm)] => Line::I {
      mnemonic,
      rd: register(rd)?,
      rs1: register(rs1)?,
      imm: immediate(imm)?,
    },
    [Operand::Reg(rs2), Operand::Imm(imm), Operand::Reg(rs1)] => Line::S {
      mnemonic,
      rs2: register(rs2)?,
      imm: immediate(imm)?,
      rs1: register(rs1)?,
    },
    [Operand::Reg(rd), Operand::Imm(imm)] => Line::U {
      mnemonic,
      rd: register(rd)?,
      imm: immediate(imm)?,
    },
    [Operand::Reg(rd), Operand::Ident(label)] if mnemonic == "jal" => Line::LabelJump {
      rd: register(rd)?,
      label,
    },
    _ => return Err(LineError::Unmatched),
  };
  Ok(shape)
}

fn operand(token: &str) -> Option<Operand<'_>> {
  if token.strip_prefix(['x', 'X']).is_some_and(is_digits) {
    Some(Operand::Reg(token))
  } else if is_digits(token.strip_prefix('-').unwrap_or(token)) {
    Some(Operand::Imm(token))
  } else if is_identifier(token) {
    Some(Operand::Ident(token))
  } else {
    None
  }
}

fn register(token: &str) -> Result<Reg, LineError> {
  token
    .strip_prefix(['x', 'X'])
    .and_then(|digits| digits.parse::<u32>().ok())
    .and_then(Reg::new)
    .ok_or_else(|| LineError::OutOfRange(token.to_string()))
}

fn immediate(token: &str) -> Result<i32, LineError> {
  // the characters are already known to be digits, so only overflow fails
  token
    .parse::<i32>()
    .map_err(|_| LineError::OutOfRange(token.to_string()))
}

fn is_digits(s: &str) -> bool {
  !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_word(s: &str) -> bool {
  !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn is_identifier(s: &str) -> bool {
  s.as_bytes().first().is_some_and(u8::is_ascii_alphabetic) && is_word(s)
}
