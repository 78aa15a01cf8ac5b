//! regvm virtual machine
//!
//! Instruction set, program container and the stack-based interpreter
//! that executes it.

pub mod opcodes;
pub mod error;
pub mod bytecode;
pub mod machine;

pub use bytecode::{Program, ProgramBuilder};
pub use error::{ProgramError, VmError};
pub use machine::{run, run_with_output, Execution, VmConfig, VM};
pub use opcodes::{Instruction, Opcode, Register};
