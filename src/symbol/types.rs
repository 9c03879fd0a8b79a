use std::fmt;

use crate::codegen::Opcode;
use crate::types::{PrimitiveType, Type};

/// The declaration of a script: the part dependents depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInfo {
    pub trigger: String,
    pub name: String,
    pub arguments: Vec<PrimitiveType>,
    pub returns: Type,
}

impl ScriptInfo {
    pub fn new(
        trigger: impl Into<String>,
        name: impl Into<String>,
        arguments: Vec<PrimitiveType>,
        returns: Type,
    ) -> Self {
        Self {
            trigger: trigger.into(),
            name: name.into(),
            arguments,
            returns,
        }
    }

    /// Canonical `"[trigger,name]"` identifier.
    pub fn full_name(&self) -> String {
        format!("[{},{}]", self.trigger, self.name)
    }

    /// Whether two declarations look identical from a caller's viewpoint.
    pub fn equal_signature(&self, other: &ScriptInfo) -> bool {
        self.trigger == other.trigger
            && self.name == other.name
            && self.arguments == other.arguments
            && self.returns == other.returns
    }
}

impl fmt::Display for ScriptInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// An engine-provided built-in callable by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub opcode: Opcode,
    pub arguments: Vec<PrimitiveType>,
    pub returns: Type,
    /// Whether calls execute in the alternative form (operand 1).
    pub alternative: bool,
}

impl CommandInfo {
    pub fn new(
        name: impl Into<String>,
        opcode: Opcode,
        arguments: Vec<PrimitiveType>,
        returns: Type,
        alternative: bool,
    ) -> Self {
        Self {
            name: name.into(),
            opcode,
            arguments,
            returns,
            alternative,
        }
    }
}

/// The literal value of a constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    String(String),
    Bool(bool),
}

impl ConstantValue {
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            ConstantValue::Int(_) => PrimitiveType::Int,
            ConstantValue::Long(_) => PrimitiveType::Long,
            ConstantValue::String(_) => PrimitiveType::String,
            ConstantValue::Bool(_) => PrimitiveType::Boolean,
        }
    }
}

/// A `^name` compile-time constant whose value is inlined at use sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantInfo {
    pub name: String,
    pub value: ConstantValue,
}

impl ConstantInfo {
    pub fn new(name: impl Into<String>, value: ConstantValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A constant that is substituted by the runtime rather than the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConstantInfo {
    pub name: String,
    pub ty: PrimitiveType,
    pub value: ConstantValue,
}

impl RuntimeConstantInfo {
    pub fn new(name: impl Into<String>, ty: PrimitiveType, value: ConstantValue) -> Self {
        Self {
            name: name.into(),
            ty,
            value,
        }
    }
}

/// Where a variable lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableDomain {
    Local,
    Player,
    PlayerBit,
    ClientInt,
    ClientString,
}

/// A shared variable declaration registered by the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableInfo {
    pub domain: VariableDomain,
    pub name: String,
    pub ty: PrimitiveType,
    /// Runtime index of the variable, used as the instruction operand.
    pub id: i32,
}

impl VariableInfo {
    pub fn new(
        domain: VariableDomain,
        name: impl Into<String>,
        ty: PrimitiveType,
        id: i32,
    ) -> Self {
        Self {
            domain,
            name: name.into(),
            ty,
            id,
        }
    }
}
