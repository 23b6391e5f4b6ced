//! Turns source text into a [`Program`].
//!
//! Assembly runs in two passes. The first walks the source line by line,
//! decoding instructions into slots, recording label positions, and reserving a
//! slot for every `jal rd, label`. The second turns each reserved slot into a
//! jump whose offset is `label index − slot index`.
//!
//! Errors never stop a pass. Every problem in the source is collected into
//! [`Diagnostics`], and a [`Program`] is only produced when there are none.

use std::collections::HashMap;

use crate::instruction::Instruction;
use crate::opcode::{Format, Opcode};
use crate::parser::{self, Line, LineError};
use crate::program::Program;
use crate::registers::Reg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
  /// No line shape matched.
  UnmatchedLine,
  /// The mnemonic is not in the operation table of the matched shape.
  UnknownOperator,
  /// A symbolic jump names a label that is never defined.
  UnknownLabel,
  /// A register above `x31` or an immediate outside 32 bits.
  OperandOutOfRange,
}

/// A single compile error, tied to its 1-based source line.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Diagnostic {
  pub kind: DiagnosticKind,
  pub line: usize,
  pub message: String,
}

/// Every error found in a source text, in the order they were found.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", join_lines(.0))]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn messages(&self) -> Vec<String> {
    self.0.iter().map(|d| d.message.clone()).collect()
  }
}

fn join_lines(diagnostics: &[Diagnostic]) -> String {
  diagnostics
    .iter()
    .map(|d| d.message.as_str())
    .collect::<Vec<_>>()
    .join("\n")
}

/// Assembles `source`, returning the program or every error found in it.
pub fn assemble(source: &str) -> Result<Program, Diagnostics> {
  let span = tracing::info_span!("assemble", bytes = source.len());
  let _guard = span.enter();

  let mut assembler = Assembler::default();
  tracing::debug!("first pass: decoding lines");
  for (i, text) in source.lines().enumerate() {
    assembler.line(i + 1, text);
  }
  tracing::debug!(
    slots = assembler.slots.len(),
    labels = assembler.labels.len(),
    "second pass: resolving labels"
  );
  assembler.resolve()
}

/// A `jal rd, label` waiting for its label.
struct PendingJump<'src> {
  label: &'src str,
  line: usize,
  rd: Reg,
  op: Opcode,
}

enum Slot<'src> {
  Ready(Instruction),
  Pending(PendingJump<'src>),
}

#[derive(Default)]
struct Assembler<'src> {
  slots: Vec<Slot<'src>>,
  labels: HashMap<&'src str, usize>,
  diagnostics: Vec<Diagnostic>,
}

impl<'src> Assembler<'src> {
  fn line(&mut self, line: usize, text: &'src str) {
    let decoded = match parser::parse_line(text) {
      Ok(decoded) => decoded,
      Err(LineError::Unmatched) => {
        self.error(
          DiagnosticKind::UnmatchedLine,
          line,
          format!("unknown operator format: '{}' at line {line}", text.trim()),
        );
        return;
      }
      Err(LineError::OutOfRange(token)) => {
        self.error(
          DiagnosticKind::OperandOutOfRange,
          line,
          format!("operand '{token}' out of range at line {line}"),
        );
        return;
      }
    };
    tracing::trace!(line, ?decoded, "decoded");

    let instruction = match decoded {
      Line::Empty => return,
      Line::Label(name) => {
        let index = self.slots.len();
        if let Some(previous) = self.labels.insert(name, index) {
          tracing::warn!(label = name, previous, index, line, "label redefined");
        }
        return;
      }
      Line::LabelJump { rd, label } => {
        let Some(op) = self.lookup(Format::U, "jal", line) else {
          return;
        };
        self.slots.push(Slot::Pending(PendingJump {
          label,
          line,
          rd,
          op,
        }));
        return;
      }
      Line::R {
        mnemonic,
        rd,
        rs1,
        rs2,
      } => self
        .lookup(Format::R, mnemonic, line)
        .map(|op| Instruction::R { op, rd, rs1, rs2 }),
      Line::I {
        mnemonic,
        rd,
        rs1,
        imm,
      } => self
        .lookup(Format::I, mnemonic, line)
        .map(|op| Instruction::I { op, rd, rs1, imm }),
      Line::S {
        mnemonic,
        rs2,
        imm,
        rs1,
      } => self
        .lookup(Format::S, mnemonic, line)
        .map(|op| Instruction::S { op, rs2, imm, rs1 }),
      Line::U { mnemonic, rd, imm } => self
        .lookup(Format::U, mnemonic, line)
        .map(|op| Instruction::U { op, rd, imm }),
    };

    if let Some(instruction) = instruction {
      self.slots.push(Slot::Ready(instruction));
    }
  }

  fn lookup(&mut self, format: Format, mnemonic: &str, line: usize) -> Option<Opcode> {
    let op = Opcode::lookup(format, mnemonic);
    if op.is_none() {
      self.error(
        DiagnosticKind::UnknownOperator,
        line,
        format!("unknown operator '{mnemonic}' of type '{format}' at line {line}"),
      );
    }
    op
  }

  fn resolve(mut self) -> Result<Program, Diagnostics> {
    let slots = std::mem::take(&mut self.slots);
    let mut instructions = Vec::with_capacity(slots.len());
    for (slot, entry) in slots.into_iter().enumerate() {
      match entry {
        Slot::Ready(instruction) => instructions.push(instruction),
        Slot::Pending(jump) => {
          if let Some(instruction) = self.patch(slot, jump) {
            instructions.push(instruction);
          }
        }
      }
    }

    if !self.diagnostics.is_empty() {
      tracing::debug!(errors = self.diagnostics.len(), "assembly failed");
      return Err(Diagnostics(self.diagnostics));
    }
    Ok(Program::new(instructions))
  }

  fn patch(&mut self, slot: usize, jump: PendingJump<'src>) -> Option<Instruction> {
    let Some(&target) = self.labels.get(jump.label) else {
      self.error(
        DiagnosticKind::UnknownLabel,
        jump.line,
        format!("unknown label '{}' at line {}", jump.label, jump.line),
      );
      return None;
    };
    // both indices are slot positions, so the difference always fits
    let offset = target as i32 - slot as i32;
    tracing::trace!(label = jump.label, slot, offset, "resolved");
    Some(Instruction::Resolved {
      op: jump.op,
      rd: jump.rd,
      offset,
      label: jump.label.to_string(),
    })
  }

  fn error(&mut self, kind: DiagnosticKind, line: usize, message: String) {
    tracing::debug!(?kind, line, %message, "diagnostic");
    self.diagnostics.push(Diagnostic {
      kind,
      line,
      message,
    });
  }
}
