mod table;
mod types;

pub use table::{SymbolError, SymbolTable};
pub use types::{
    CommandInfo, ConstantInfo, ConstantValue, RuntimeConstantInfo, ScriptInfo, VariableDomain,
    VariableInfo,
};
