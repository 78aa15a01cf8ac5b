//! regvm instruction set

use std::fmt;

/// Opcode tags as they appear in a program word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    /// Followed by the literal to push
    Push,
    Pop,
    /// Print top of stack without removing it
    Print,
    /// Followed by a register id; stores top of stack without popping
    Save,
    /// Followed by a register id; pushes the register's value
    Load,
}

// Word encoding
const OP_ADD: i64 = 0;
const OP_SUB: i64 = 1;
const OP_MUL: i64 = 2;
const OP_DIV: i64 = 3;
const OP_PUSH: i64 = 4;
const OP_POP: i64 = 5;
const OP_PRINT: i64 = 6;
const OP_SAVE: i64 = 7;
const OP_LOAD: i64 = 8;

impl Opcode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            OP_ADD => Some(Opcode::Add),
            OP_SUB => Some(Opcode::Sub),
            OP_MUL => Some(Opcode::Mul),
            OP_DIV => Some(Opcode::Div),
            OP_PUSH => Some(Opcode::Push),
            OP_POP => Some(Opcode::Pop),
            OP_PRINT => Some(Opcode::Print),
            OP_SAVE => Some(Opcode::Save),
            OP_LOAD => Some(Opcode::Load),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Opcode::Add => OP_ADD,
            Opcode::Sub => OP_SUB,
            Opcode::Mul => OP_MUL,
            Opcode::Div => OP_DIV,
            Opcode::Push => OP_PUSH,
            Opcode::Pop => OP_POP,
            Opcode::Print => OP_PRINT,
            Opcode::Save => OP_SAVE,
            Opcode::Load => OP_LOAD,
        }
    }

    /// Whether the next program word belongs to this opcode.
    pub fn takes_operand(self) -> bool {
        matches!(self, Opcode::Push | Opcode::Save | Opcode::Load)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Print => "PRINT",
            Opcode::Save => "SAVE",
            Opcode::Load => "LOAD",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Register identifier: the raw operand word, normally a code point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(pub i64);

impl Register {
    pub fn as_char(self) -> Option<char> {
        u32::try_from(self.0).ok().and_then(char::from_u32)
    }
}

impl From<char> for Register {
    fn from(c: char) -> Self {
        Register(c as i64)
    }
}

impl From<i64> for Register {
    fn from(word: i64) -> Self {
        Register(word)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.as_char() {
            Some(c) if !c.is_control() => write!(f, "'{}'", c),
            _ => write!(f, "#{}", self.0),
        }
    }
}

/// A decoded instruction.
///
/// `Skip` carries a word in opcode position that matches no opcode;
/// the machine passes over it without touching any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Add,
    Sub,
    Mul,
    Div,
    Push(i64),
    Pop,
    Print,
    Save(Register),
    Load(Register),
    Skip(i64),
}

impl Instruction {
    /// Number of program words this instruction occupies.
    pub fn width(&self) -> usize {
        match self {
            Instruction::Push(_) | Instruction::Save(_) | Instruction::Load(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instruction::Add => write!(f, "ADD"),
            Instruction::Sub => write!(f, "SUB"),
            Instruction::Mul => write!(f, "MUL"),
            Instruction::Div => write!(f, "DIV"),
            Instruction::Push(v) => write!(f, "PUSH {}", v),
            Instruction::Pop => write!(f, "POP"),
            Instruction::Print => write!(f, "PRINT"),
            Instruction::Save(r) => write!(f, "SAVE {}", r),
            Instruction::Load(r) => write!(f, "LOAD {}", r),
            Instruction::Skip(w) => write!(f, "NOP ({})", w),
        }
    }
}
