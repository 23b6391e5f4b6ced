//! Assembler and stepwise interpreter for a small RV32 subset
//!
//! Source text is assembled into a [`program::Program`] of decoded
//! instructions, with symbolic `jal` targets resolved to offsets, and then
//! executed one instruction at a time by a [`vm::Vm`] whose program counter
//! indexes instructions rather than bytes.
//!
//! ```text
//! loop:
//!   addi x1, x1, 1   # count
//!   jal x0, loop
//! ```

pub mod alu;
pub mod assembler;
pub mod instruction;
pub mod opcode;
pub mod parser;
pub mod program;
pub mod registers;
pub mod runner;
pub mod session;
pub mod vm;
