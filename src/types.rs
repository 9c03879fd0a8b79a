use std::fmt;

use serde::{Deserialize, Serialize};

/// A line/column position inside a source file, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: i32,
    pub column: i32,
}

impl Position {
    pub fn new(line: i32, column: i32) -> Self {
        Self { line, column }
    }
}

/// A source range from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Smallest range covering both `self` and `other`.
    pub fn merge(&self, other: &Range) -> Range {
        let start = if (other.start.line, other.start.column) < (self.start.line, self.start.column) {
            other.start
        } else {
            self.start
        };
        let end = if (other.end.line, other.end.column) > (self.end.line, self.end.column) {
            other.end
        } else {
            self.end
        };
        Range { start, end }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start.line, self.start.column)
    }
}

/// A diagnostic produced by any phase of the compilation pipeline.
///
/// Diagnostics are accumulated values, never propagated as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub range: Range,
    pub message: String,
}

impl Diagnostic {
    pub fn new(range: Range, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
        }
    }
}

/// Which of the three parallel operand stacks a value lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackDomain {
    Int,
    String,
    Long,
}

/// A primitive value type of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Int,
    String,
    Long,
    Boolean,
}

impl PrimitiveType {
    /// The stack domain values of this type are pushed onto.
    pub fn stack_domain(&self) -> StackDomain {
        match self {
            PrimitiveType::Int | PrimitiveType::Boolean => StackDomain::Int,
            PrimitiveType::String => StackDomain::String,
            PrimitiveType::Long => StackDomain::Long,
        }
    }

    /// Stable tag used by the binary cache format.
    pub fn tag(&self) -> u8 {
        match self {
            PrimitiveType::Int => 0,
            PrimitiveType::String => 1,
            PrimitiveType::Long => 2,
            PrimitiveType::Boolean => 3,
        }
    }

    /// Reverse of [`PrimitiveType::tag`].
    pub fn from_tag(tag: u8) -> Option<PrimitiveType> {
        match tag {
            0 => Some(PrimitiveType::Int),
            1 => Some(PrimitiveType::String),
            2 => Some(PrimitiveType::Long),
            3 => Some(PrimitiveType::Boolean),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Int => "int",
            PrimitiveType::String => "string",
            PrimitiveType::Long => "long",
            PrimitiveType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved expression type: a single primitive or a flattened tuple.
///
/// Tuples come from multi-value script and command returns. The empty tuple
/// is the type of a script that returns nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Primitive(PrimitiveType),
    Tuple(Vec<PrimitiveType>),
}

impl Type {
    /// The empty tuple type.
    pub fn unit() -> Type {
        Type::Tuple(Vec::new())
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Tuple(types) if types.is_empty())
    }

    /// The flattened sequence of primitives this type pushes.
    pub fn flattened(&self) -> Vec<PrimitiveType> {
        match self {
            Type::Primitive(ty) => vec![*ty],
            Type::Tuple(types) => types.clone(),
        }
    }

    /// Collapse a single-element sequence into its primitive.
    pub fn from_flattened(types: Vec<PrimitiveType>) -> Type {
        if types.len() == 1 {
            Type::Primitive(types[0])
        } else {
            Type::Tuple(types)
        }
    }

    /// How many values of each stack domain this type pushes.
    pub fn push_counts(&self) -> PushCounts {
        let mut counts = PushCounts::default();
        for ty in self.flattened() {
            match ty.stack_domain() {
                StackDomain::Int => counts.ints += 1,
                StackDomain::String => counts.strings += 1,
                StackDomain::Long => counts.longs += 1,
            }
        }
        counts
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(ty) => write!(f, "{}", ty),
            Type::Tuple(types) => {
                write!(f, "(")?;
                for (index, ty) in types.iter().enumerate() {
                    if index > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", ty)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Per-domain push counts of an expression type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushCounts {
    pub ints: usize,
    pub strings: usize,
    pub longs: usize,
}
