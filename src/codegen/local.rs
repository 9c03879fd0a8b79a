use std::collections::HashMap;

use crate::types::{PrimitiveType, StackDomain};

/// A registered local slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub name: String,
    pub ty: PrimitiveType,
    pub slot: u16,
}

/// Per-script table of local slots, partitioned by stack domain.
///
/// Parameters and declared locals share the same per-domain index spaces:
/// int locals count separately from string and long locals.
#[derive(Debug, Default)]
pub struct LocalMap {
    locals: HashMap<String, Local>,
    int_count: u16,
    string_count: u16,
    long_count: u16,
    synthetic_seq: u32,
}

impl LocalMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.locals.clear();
        self.int_count = 0;
        self.string_count = 0;
        self.long_count = 0;
        self.synthetic_seq = 0;
    }

    /// Register a parameter and return its slot.
    pub fn register_parameter(&mut self, name: &str, ty: PrimitiveType) -> u16 {
        self.register_variable(name, ty)
    }

    /// Register a declared local and return its slot.
    pub fn register_variable(&mut self, name: &str, ty: PrimitiveType) -> u16 {
        let slot = self.next_slot(ty.stack_domain());
        self.locals.insert(
            name.to_string(),
            Local {
                name: name.to_string(),
                ty,
                slot,
            },
        );
        slot
    }

    /// Register an unnamed compiler temporary and return its slot.
    ///
    /// The generated name starts with '@' so it can never collide with a
    /// source-level local.
    pub fn register_synthetic(&mut self, ty: PrimitiveType) -> u16 {
        let name = format!("@tmp{}", self.synthetic_seq);
        self.synthetic_seq += 1;
        self.register_variable(&name, ty)
    }

    pub fn lookup(&self, name: &str) -> Option<&Local> {
        self.locals.get(name)
    }

    pub fn count(&self, domain: StackDomain) -> u16 {
        match domain {
            StackDomain::Int => self.int_count,
            StackDomain::String => self.string_count,
            StackDomain::Long => self.long_count,
        }
    }

    fn next_slot(&mut self, domain: StackDomain) -> u16 {
        let counter = match domain {
            StackDomain::Int => &mut self.int_count,
            StackDomain::String => &mut self.string_count,
            StackDomain::Long => &mut self.long_count,
        };
        let slot = *counter;
        *counter += 1;
        slot
    }
}
