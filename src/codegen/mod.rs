mod generator;
mod local;
mod opcode;
mod script;

pub use generator::CodeGenerator;
pub use local::{Local, LocalMap};
pub use opcode::{CodegenError, CoreOpcode, InstructionMap, Opcode};
pub use script::{Block, Instruction, Label, Operand, Script};
