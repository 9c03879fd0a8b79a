pub mod analyzer;
pub mod ast;
pub mod cache;
pub mod codegen;
pub mod compiler;
pub mod deps;
pub mod lexer;
pub mod parser;
pub mod project;
pub mod symbol;
pub mod types;
pub mod utils;

pub use cache::{Cache, CachedError, CachedFile};
pub use compiler::{
    CompileError, CompileInput, CompileResult, CompiledScript, Compiler, Environment,
};
pub use project::{Project, ProjectConfig};
pub use symbol::{
    CommandInfo, ConstantInfo, ConstantValue, RuntimeConstantInfo, ScriptInfo, SymbolTable,
    VariableDomain, VariableInfo,
};
pub use types::{Diagnostic, Position, PrimitiveType, Range, StackDomain, Type};
