use std::collections::HashMap;

use thiserror::Error;

/// Abstract, portable opcode identifiers used by code generation.
///
/// A core opcode never reaches a block directly: it is remapped through an
/// [`InstructionMap`] into the runtime's concrete [`Opcode`] numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreOpcode {
    PushIntConstant,
    PushStringConstant,
    PushLongConstant,
    PushIntLocal,
    PopIntLocal,
    PushStringLocal,
    PopStringLocal,
    PushLongLocal,
    PopLongLocal,
    PushVarp,
    PopVarp,
    PushVarpBit,
    PopVarpBit,
    PushVarcInt,
    PopVarcInt,
    PushVarcString,
    PopVarcString,
    PopIntDiscard,
    PopStringDiscard,
    PopLongDiscard,
    Branch,
    BranchIfTrue,
    BranchEquals,
    BranchLessThan,
    BranchGreaterThan,
    BranchLessThanOrEquals,
    BranchGreaterThanOrEquals,
    GosubWithParams,
    JoinString,
    Return,
    Add,
    Sub,
    Mul,
    Div,
}

impl CoreOpcode {
    /// Every core opcode, in a stable order.
    pub const ALL: &'static [CoreOpcode] = &[
        CoreOpcode::PushIntConstant,
        CoreOpcode::PushStringConstant,
        CoreOpcode::PushLongConstant,
        CoreOpcode::PushIntLocal,
        CoreOpcode::PopIntLocal,
        CoreOpcode::PushStringLocal,
        CoreOpcode::PopStringLocal,
        CoreOpcode::PushLongLocal,
        CoreOpcode::PopLongLocal,
        CoreOpcode::PushVarp,
        CoreOpcode::PopVarp,
        CoreOpcode::PushVarpBit,
        CoreOpcode::PopVarpBit,
        CoreOpcode::PushVarcInt,
        CoreOpcode::PopVarcInt,
        CoreOpcode::PushVarcString,
        CoreOpcode::PopVarcString,
        CoreOpcode::PopIntDiscard,
        CoreOpcode::PopStringDiscard,
        CoreOpcode::PopLongDiscard,
        CoreOpcode::Branch,
        CoreOpcode::BranchIfTrue,
        CoreOpcode::BranchEquals,
        CoreOpcode::BranchLessThan,
        CoreOpcode::BranchGreaterThan,
        CoreOpcode::BranchLessThanOrEquals,
        CoreOpcode::BranchGreaterThanOrEquals,
        CoreOpcode::GosubWithParams,
        CoreOpcode::JoinString,
        CoreOpcode::Return,
        CoreOpcode::Add,
        CoreOpcode::Sub,
        CoreOpcode::Mul,
        CoreOpcode::Div,
    ];
}

/// A concrete runtime opcode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u16);

/// An internal code generation failure. These are compiler bugs or missing
/// environment setup, never user errors.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("no concrete opcode is mapped for {0:?}")]
    UnmappedOpcode(CoreOpcode),
    #[error("unresolved symbol '{0}' reached code generation")]
    UnresolvedSymbol(String),
    #[error("expression reached code generation without a resolved type")]
    MissingType,
    #[error("comparison operator reached code generation outside a condition")]
    ComparisonOutsideCondition,
    #[error("unexpected operator '{0}'")]
    UnexpectedOperator(&'static str),
}

/// Mapping from abstract core opcodes to the runtime's concrete numbering.
#[derive(Debug, Clone, Default)]
pub struct InstructionMap {
    mapping: HashMap<CoreOpcode, Opcode>,
}

impl InstructionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A complete map assigning sequential opcode numbers; useful for tests
    /// and embedders without a fixed runtime numbering.
    pub fn sequential() -> Self {
        let mut map = Self::new();
        for (index, core) in CoreOpcode::ALL.iter().enumerate() {
            map.register(*core, Opcode(index as u16));
        }
        map
    }

    /// Register the concrete opcode of a core opcode, replacing any previous
    /// registration.
    pub fn register(&mut self, core: CoreOpcode, opcode: Opcode) {
        self.mapping.insert(core, opcode);
    }

    pub fn lookup(&self, core: CoreOpcode) -> Result<Opcode, CodegenError> {
        self.mapping
            .get(&core)
            .copied()
            .ok_or(CodegenError::UnmappedOpcode(core))
    }

    /// Whether every core opcode has a concrete mapping.
    pub fn is_complete(&self) -> bool {
        CoreOpcode::ALL.iter().all(|core| self.mapping.contains_key(core))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_map_is_complete() {
        let map = InstructionMap::sequential();
        assert!(map.is_complete());
        assert_eq!(map.lookup(CoreOpcode::PushIntConstant).unwrap(), Opcode(0));
    }

    #[test]
    fn test_missing_mapping_is_an_error() {
        let map = InstructionMap::new();
        assert!(matches!(
            map.lookup(CoreOpcode::Return),
            Err(CodegenError::UnmappedOpcode(CoreOpcode::Return))
        ));
    }
}
