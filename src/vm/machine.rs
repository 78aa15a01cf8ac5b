//! regvm virtual machine: stack-based execution with named registers
//!
//! - The program is borrowed read-only; each word is decoded as it is
//!   reached, so a malformed tail only fails once execution gets there
//! - Stack and register table live inside one `VM` value and are dropped
//!   with it, so separate runs never share state
//! - Main loop is fetch, advance, dispatch

use std::collections::HashMap;
use std::io::{self, Write};

use super::bytecode::{decode_at, Program};
use super::error::VmError;
use super::opcodes::{Instruction, Opcode, Register};

const DEFAULT_STACK_CAPACITY: usize = 100;
const MAX_STACK_SIZE: usize = 65536;

/// Interpreter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Slots reserved up front for the evaluation stack
    pub stack_capacity: usize,
    /// Pushing beyond this depth aborts the run
    pub max_stack_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_capacity: DEFAULT_STACK_CAPACITY,
            max_stack_depth: MAX_STACK_SIZE,
        }
    }
}

/// Final machine state of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    pub stack: Vec<i64>,
    pub registers: HashMap<Register, i64>,
    /// Instructions dispatched, skipped words included
    pub steps: usize,
}

impl Execution {
    pub fn top(&self) -> Option<i64> {
        self.stack.last().copied()
    }

    pub fn register(&self, register: impl Into<Register>) -> Option<i64> {
        self.registers.get(&register.into()).copied()
    }
}

/// Run `program` with the default configuration, printing to stdout.
pub fn run(program: &Program) -> Result<(), VmError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    VM::new(program, &mut out, VmConfig::default()).run()?;
    Ok(())
}

/// Run `program` with the default configuration, printing to `out`.
pub fn run_with_output<W: Write>(program: &Program, out: &mut W) -> Result<Execution, VmError> {
    VM::new(program, out, VmConfig::default()).run()
}

/// The regvm virtual machine
pub struct VM<'p, W: Write> {
    program: &'p Program,
    code: &'p [i64],
    ip: usize,
    stack: Vec<i64>,
    registers: HashMap<Register, i64>,
    out: W,
    config: VmConfig,
    steps: usize,
}

impl<'p, W: Write> VM<'p, W> {
    pub fn new(program: &'p Program, out: W, config: VmConfig) -> Self {
        Self {
            program,
            code: program.words(),
            ip: 0,
            stack: Vec::with_capacity(config.stack_capacity.min(config.max_stack_depth)),
            registers: HashMap::new(),
            out,
            config,
            steps: 0,
        }
    }

    /// Execute to the end of the program or the first failure.
    pub fn run(mut self) -> Result<Execution, VmError> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                words = self.code.len(),
                fingerprint = %self.program.fingerprint(),
                "run started"
            );
        }

        while self.ip < self.code.len() {
            let offset = self.ip;
            let inst = match decode_at(self.code, offset) {
                Ok(inst) => inst,
                Err(e) => return Err(self.abort(e)),
            };
            self.ip += inst.width();
            self.steps += 1;

            tracing::trace!(offset, %inst, depth = self.stack.len(), "dispatch");
            if let Err(e) = self.dispatch(offset, inst) {
                return Err(self.abort(e));
            }
        }

        let end = self.code.len();
        self.out
            .flush()
            .map_err(|source| VmError::Output { offset: end, source })?;
        tracing::debug!(
            steps = self.steps,
            depth = self.stack.len(),
            registers = self.registers.len(),
            "run finished"
        );

        Ok(Execution {
            stack: self.stack,
            registers: self.registers,
            steps: self.steps,
        })
    }

    fn abort(&mut self, e: VmError) -> VmError {
        // Keep whatever was printed before the failure
        let _ = self.out.flush();
        tracing::warn!(steps = self.steps, error = %e, "run aborted");
        e
    }

    // ── Instruction dispatch ─────────────────────────────────────────

    fn dispatch(&mut self, offset: usize, inst: Instruction) -> Result<(), VmError> {
        match inst {
            Instruction::Add => self.binary(offset, Opcode::Add, i64::checked_add)?,
            Instruction::Sub => self.binary(offset, Opcode::Sub, i64::checked_sub)?,
            Instruction::Mul => self.binary(offset, Opcode::Mul, i64::checked_mul)?,
            Instruction::Div => self.binary(offset, Opcode::Div, i64::checked_div)?,
            Instruction::Push(value) => self.push(offset, value)?,
            Instruction::Pop => {
                self.require(offset, Opcode::Pop, 1)?;
                self.stack.pop();
            }
            Instruction::Print => {
                let top = self.top(offset, Opcode::Print)?;
                writeln!(self.out, "{}", top)
                    .map_err(|source| VmError::Output { offset, source })?;
            }
            Instruction::Save(register) => {
                let top = self.top(offset, Opcode::Save)?;
                self.registers.insert(register, top);
            }
            Instruction::Load(register) => {
                let value = *self
                    .registers
                    .get(&register)
                    .ok_or(VmError::UnknownRegister { offset, register })?;
                self.push(offset, value)?;
            }
            Instruction::Skip(_) => {}
        }
        Ok(())
    }

    // ── Stack helpers ────────────────────────────────────────────────

    fn require(&self, offset: usize, op: Opcode, needed: usize) -> Result<(), VmError> {
        if self.stack.len() < needed {
            return Err(VmError::StackUnderflow {
                offset,
                op,
                needed,
                depth: self.stack.len(),
            });
        }
        Ok(())
    }

    fn top(&self, offset: usize, op: Opcode) -> Result<i64, VmError> {
        self.require(offset, op, 1)?;
        Ok(self.stack[self.stack.len() - 1])
    }

    fn push(&mut self, offset: usize, value: i64) -> Result<(), VmError> {
        if self.stack.len() >= self.config.max_stack_depth {
            return Err(VmError::StackOverflow {
                offset,
                limit: self.config.max_stack_depth,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    /// Replace the two top values `a` (deeper) and `b` (top) with `a op b`.
    /// `apply` is the checked operation; `None` means overflow.
    fn binary(
        &mut self,
        offset: usize,
        op: Opcode,
        apply: fn(i64, i64) -> Option<i64>,
    ) -> Result<(), VmError> {
        self.require(offset, op, 2)?;
        let len = self.stack.len();
        let (a, b) = (self.stack[len - 2], self.stack[len - 1]);
        if op == Opcode::Div && b == 0 {
            return Err(VmError::DivisionByZero { offset });
        }
        let result = apply(a, b).ok_or(VmError::Overflow { offset, op, a, b })?;
        self.stack.truncate(len - 1);
        self.stack[len - 2] = result;
        Ok(())
    }
}
