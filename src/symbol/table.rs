use std::collections::HashMap;

use thiserror::Error;

use super::types::{
    CommandInfo, ConstantInfo, RuntimeConstantInfo, ScriptInfo, VariableDomain, VariableInfo,
};

/// Error raised when a registry key is already occupied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("the script '{0}' is already defined")]
    ScriptAlreadyDefined(String),
    #[error("the command '{0}' is already defined")]
    CommandAlreadyDefined(String),
    #[error("the constant '{0}' is already defined")]
    ConstantAlreadyDefined(String),
    #[error("the runtime constant '{0}' is already defined")]
    RuntimeConstantAlreadyDefined(String),
    #[error("the variable '{0}' is already defined")]
    VariableAlreadyDefined(String),
}

/// Process-wide registry of scripts, commands, constants and variables.
///
/// There is no scoping at this level: at most one live declaration exists
/// per key, and locals are handled by the analyzer and codegen instead.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scripts: HashMap<(String, String), ScriptInfo>,
    commands: HashMap<String, CommandInfo>,
    constants: HashMap<String, ConstantInfo>,
    runtime_constants: HashMap<String, RuntimeConstantInfo>,
    variables: HashMap<(VariableDomain, String), VariableInfo>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a script declaration; fails if `(trigger, name)` is taken.
    pub fn define_script(&mut self, info: ScriptInfo) -> Result<(), SymbolError> {
        let key = (info.trigger.clone(), info.name.clone());
        if self.scripts.contains_key(&key) {
            return Err(SymbolError::ScriptAlreadyDefined(info.full_name()));
        }
        self.scripts.insert(key, info);
        Ok(())
    }

    /// Remove a script declaration; removing an absent key is a no-op.
    pub fn undefine_script(&mut self, trigger: &str, name: &str) {
        self.scripts
            .remove(&(trigger.to_string(), name.to_string()));
    }

    pub fn lookup_script(&self, trigger: &str, name: &str) -> Option<&ScriptInfo> {
        self.scripts.get(&(trigger.to_string(), name.to_string()))
    }

    pub fn define_command(&mut self, info: CommandInfo) -> Result<(), SymbolError> {
        if self.commands.contains_key(&info.name) {
            return Err(SymbolError::CommandAlreadyDefined(info.name));
        }
        self.commands.insert(info.name.clone(), info);
        Ok(())
    }

    pub fn lookup_command(&self, name: &str) -> Option<&CommandInfo> {
        self.commands.get(name)
    }

    pub fn define_constant(&mut self, info: ConstantInfo) -> Result<(), SymbolError> {
        if self.constants.contains_key(&info.name) {
            return Err(SymbolError::ConstantAlreadyDefined(info.name));
        }
        self.constants.insert(info.name.clone(), info);
        Ok(())
    }

    pub fn lookup_constant(&self, name: &str) -> Option<&ConstantInfo> {
        self.constants.get(name)
    }

    pub fn define_runtime_constant(
        &mut self,
        info: RuntimeConstantInfo,
    ) -> Result<(), SymbolError> {
        if self.runtime_constants.contains_key(&info.name) {
            return Err(SymbolError::RuntimeConstantAlreadyDefined(info.name));
        }
        self.runtime_constants.insert(info.name.clone(), info);
        Ok(())
    }

    pub fn lookup_runtime_constant(&self, name: &str) -> Option<&RuntimeConstantInfo> {
        self.runtime_constants.get(name)
    }

    pub fn define_variable(&mut self, info: VariableInfo) -> Result<(), SymbolError> {
        let key = (info.domain, info.name.clone());
        if self.variables.contains_key(&key) {
            return Err(SymbolError::VariableAlreadyDefined(info.name));
        }
        self.variables.insert(key, info);
        Ok(())
    }

    pub fn lookup_variable(&self, domain: VariableDomain, name: &str) -> Option<&VariableInfo> {
        self.variables.get(&(domain, name.to_string()))
    }

    /// Resolve a `%name` reference by searching the game variable domains.
    pub fn lookup_game_variable(&self, name: &str) -> Option<&VariableInfo> {
        [
            VariableDomain::Player,
            VariableDomain::PlayerBit,
            VariableDomain::ClientInt,
            VariableDomain::ClientString,
        ]
        .iter()
        .find_map(|domain| self.lookup_variable(*domain, name))
    }

    /// Every script declaration currently in the table.
    pub fn scripts(&self) -> impl Iterator<Item = &ScriptInfo> {
        self.scripts.values()
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }
}
