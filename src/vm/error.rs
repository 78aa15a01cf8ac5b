//! Errors raised while loading or running a program

use thiserror::Error;

use super::opcodes::{Opcode, Register};

/// A fatal run-time failure. `offset` is the program index of the
/// opcode that failed.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("stack underflow at {offset}: {op} needs {needed} value(s), stack has {depth}")]
    StackUnderflow {
        offset: usize,
        op: Opcode,
        needed: usize,
        depth: usize,
    },

    #[error("missing operand at {offset}: {op} is the last word of the program")]
    MissingOperand { offset: usize, op: Opcode },

    #[error("unknown register {register} at {offset}")]
    UnknownRegister { offset: usize, register: Register },

    #[error("division by zero at {offset}")]
    DivisionByZero { offset: usize },

    #[error("integer overflow at {offset}: {a} {op} {b}")]
    Overflow {
        offset: usize,
        op: Opcode,
        a: i64,
        b: i64,
    },

    #[error("stack overflow at {offset}: depth limit {limit} reached")]
    StackOverflow { offset: usize, limit: usize },

    /// Writing a `PRINT` line failed. A failed flush after the last
    /// instruction reports the program length as its offset.
    #[error("failed to write output at {offset}: {source}")]
    Output {
        offset: usize,
        source: std::io::Error,
    },
}

impl VmError {
    /// Program index of the failing instruction.
    pub fn offset(&self) -> usize {
        match self {
            VmError::StackUnderflow { offset, .. }
            | VmError::MissingOperand { offset, .. }
            | VmError::UnknownRegister { offset, .. }
            | VmError::DivisionByZero { offset }
            | VmError::Overflow { offset, .. }
            | VmError::StackOverflow { offset, .. }
            | VmError::Output { offset, .. } => *offset,
        }
    }
}

/// Failure to load a program from its JSON form.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("invalid program JSON: {0}")]
    Json(#[from] serde_json::Error),
}
