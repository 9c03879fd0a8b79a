use std::fmt;

use crate::symbol::{ScriptInfo, VariableInfo};

use super::opcode::Opcode;

/// A generator-assigned unique block label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    pub id: u32,
    pub name: String,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The single operand of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Int(i32),
    Long(i64),
    Str(String),
    Script(ScriptInfo),
    Variable(VariableInfo),
    Label(Label),
    /// A local slot index within the script's per-domain slot space.
    Local(u16),
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Self { opcode, operand }
    }
}

/// A labelled block of instructions.
///
/// A block always terminates in a branch or return instruction; flow never
/// falls through to the next block by position.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: Label,
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn new(label: Label) -> Self {
        Self {
            label,
            instructions: Vec::new(),
        }
    }

    pub fn add(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn last_opcode(&self) -> Option<Opcode> {
        self.instructions.last().map(|i| i.opcode)
    }
}

/// The generated bytecode of one script.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    /// Canonical `"[trigger,name]"` identifier.
    pub name: String,
    pub blocks: Vec<Block>,
    pub int_locals: u16,
    pub string_locals: u16,
    pub long_locals: u16,
}

impl Script {
    /// Find a block by its label name; test helper and disassembly aid.
    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.label.name == name)
    }

    pub fn entry(&self) -> Option<&Block> {
        self.block("entry")
    }
}
