//! regvm program format
//!
//! A program is a flat list of signed words: opcodes, each optionally
//! followed by one operand word. On disk it is a JSON array whose
//! elements are integers or one-character strings; a string stands for
//! its code point, which keeps register ids readable:
//!
//! ```json
//! [4, 33, 7, "A", 8, "A", 0, 6]
//! ```

use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::{ProgramError, VmError};
use super::opcodes::{Instruction, Opcode, Register};

/// An immutable instruction sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Program {
    words: Vec<i64>,
}

impl Program {
    pub fn new(words: Vec<i64>) -> Self {
        Self { words }
    }

    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    pub fn words(&self) -> &[i64] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn from_json(text: &str) -> Result<Self, ProgramError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> String {
        // A Vec<i64> always serializes
        serde_json::to_string(&self.words).unwrap_or_default()
    }

    /// Decode the whole program into `(offset, instruction)` pairs.
    ///
    /// Unknown words decode to `Instruction::Skip`. Only a trailing
    /// operand-taking opcode fails.
    pub fn decode(&self) -> Result<Vec<(usize, Instruction)>, VmError> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < self.words.len() {
            let inst = decode_at(&self.words, offset)?;
            out.push((offset, inst));
            offset += inst.width();
        }
        Ok(out)
    }

    /// SHA-256 over the little-endian encoding of every word, as hex.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for word in &self.words {
            hasher.update(word.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// The sample program the interpreter ships with. Prints
    /// `84084`, `504504` and `578`.
    pub fn demo() -> Self {
        Program::builder()
            .push(33)
            .push(44)
            .add()
            .push(567)
            .sub()
            .push(-13)
            .mul()
            .push(5)
            .div()
            .push(45)
            .push(21)
            .add()
            .mul()
            .print()
            .save('А')
            .pop()
            .push(3)
            .push(9)
            .push(7)
            .sub()
            .mul()
            .load('А')
            .mul()
            .print()
            .save('Б')
            .load('А')
            .push(10230)
            .load('Б')
            .sub()
            .sub()
            .push(1000)
            .div()
            .print()
            .build()
    }
}

impl From<Vec<i64>> for Program {
    fn from(words: Vec<i64>) -> Self {
        Program::new(words)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.decode() {
            Ok(listing) => {
                for (offset, inst) in listing {
                    writeln!(f, "{:>6}  {}", offset, inst)?;
                }
                Ok(())
            }
            Err(e) => write!(f, "<undecodable program: {}>", e),
        }
    }
}

/// Decode the instruction whose opcode word sits at `offset`.
pub(crate) fn decode_at(words: &[i64], offset: usize) -> Result<Instruction, VmError> {
    let word = words[offset];
    let op = match Opcode::from_code(word) {
        Some(op) => op,
        None => return Ok(Instruction::Skip(word)),
    };
    let operand = if op.takes_operand() {
        match words.get(offset + 1) {
            Some(v) => *v,
            None => return Err(VmError::MissingOperand { offset, op }),
        }
    } else {
        0
    };
    Ok(match op {
        Opcode::Add => Instruction::Add,
        Opcode::Sub => Instruction::Sub,
        Opcode::Mul => Instruction::Mul,
        Opcode::Div => Instruction::Div,
        Opcode::Push => Instruction::Push(operand),
        Opcode::Pop => Instruction::Pop,
        Opcode::Print => Instruction::Print,
        Opcode::Save => Instruction::Save(Register(operand)),
        Opcode::Load => Instruction::Load(Register(operand)),
    })
}

// ── JSON loading ─────────────────────────────────────────────────────────

impl<'de> Deserialize<'de> for Program {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(ProgramVisitor)
    }
}

struct ProgramVisitor;

impl<'de> Visitor<'de> for ProgramVisitor {
    type Value = Program;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of integers or one-character strings")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Program, A::Error> {
        let mut words = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(word) = seq.next_element::<Word>()? {
            words.push(word.0);
        }
        Ok(Program::new(words))
    }
}

struct Word(i64);

impl<'de> Deserialize<'de> for Word {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(WordVisitor)
    }
}

struct WordVisitor;

impl<'de> Visitor<'de> for WordVisitor {
    type Value = Word;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer or a one-character string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Word, E> {
        Ok(Word(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Word, E> {
        i64::try_from(v)
            .map(Word)
            .map_err(|_| E::custom(format!("word {} does not fit in 64 signed bits", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Word, E> {
        let mut chars = v.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Word(c as i64)),
            _ => Err(E::custom(format!(
                "expected a one-character string, got \"{}\"",
                v
            ))),
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Emits program words without hand-encoding opcodes.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    words: Vec<i64>,
}

impl ProgramBuilder {
    fn emit(mut self, op: Opcode) -> Self {
        self.words.push(op.code());
        self
    }

    fn emit_with(mut self, op: Opcode, operand: i64) -> Self {
        self.words.push(op.code());
        self.words.push(operand);
        self
    }

    pub fn add(self) -> Self {
        self.emit(Opcode::Add)
    }

    pub fn sub(self) -> Self {
        self.emit(Opcode::Sub)
    }

    pub fn mul(self) -> Self {
        self.emit(Opcode::Mul)
    }

    pub fn div(self) -> Self {
        self.emit(Opcode::Div)
    }

    pub fn push(self, value: i64) -> Self {
        self.emit_with(Opcode::Push, value)
    }

    pub fn pop(self) -> Self {
        self.emit(Opcode::Pop)
    }

    pub fn print(self) -> Self {
        self.emit(Opcode::Print)
    }

    pub fn save(self, register: impl Into<Register>) -> Self {
        self.emit_with(Opcode::Save, register.into().0)
    }

    pub fn load(self, register: impl Into<Register>) -> Self {
        self.emit_with(Opcode::Load, register.into().0)
    }

    /// Append an arbitrary word, e.g. an unknown opcode or a dangling
    /// operand-taking opcode.
    pub fn raw(mut self, word: i64) -> Self {
        self.words.push(word);
        self
    }

    pub fn build(self) -> Program {
        Program::new(self.words)
    }
}
