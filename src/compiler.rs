use log::debug;

use crate::analyzer::{declared_info, Analyzer, DependencyTreeBuilder};
use crate::ast::{self, walk_script};
use crate::codegen::{self, CodeGenerator, InstructionMap};
use crate::deps::DependencyGraph;
use crate::lexer::{runescript_table, LexicalTable, Lexer};
use crate::parser::Parser;
use crate::symbol::{
    CommandInfo, ConstantInfo, RuntimeConstantInfo, SymbolError, SymbolTable, VariableInfo,
};
use crate::types::Range;

/// A batch of sources to compile, keyed by their project-relative path.
#[derive(Debug, Default)]
pub struct CompileInput {
    sources: Vec<(String, Vec<u8>)>,
}

impl CompileInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(key: impl Into<String>, data: Vec<u8>) -> Self {
        let mut input = Self::new();
        input.add_source_code(key, data);
        input
    }

    pub fn add_source_code(&mut self, key: impl Into<String>, data: Vec<u8>) {
        self.sources.push((key.into(), data));
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

/// A successfully generated script.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    /// Key of the source the script came from.
    pub key: String,
    pub info: crate::symbol::ScriptInfo,
    pub script: codegen::Script,
}

/// A diagnostic attributed to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub key: String,
    pub range: Range,
    pub message: String,
}

/// The outcome of a compilation batch.
#[derive(Debug, Default)]
pub struct CompileResult {
    pub scripts: Vec<CompiledScript>,
    pub errors: Vec<CompileError>,
}

impl CompileResult {
    /// Whether any error belongs to the given source key.
    pub fn has_errors_for(&self, key: &str) -> bool {
        self.errors.iter().any(|e| e.key == key)
    }
}

/// Externally provided declarations registered before any compilation:
/// engine commands, runtime constants, compile-time constants and shared
/// game variables.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub commands: Vec<CommandInfo>,
    pub constants: Vec<ConstantInfo>,
    pub runtime_constants: Vec<RuntimeConstantInfo>,
    pub variables: Vec<VariableInfo>,
}

impl Environment {
    pub fn register_into(&self, symbols: &mut SymbolTable) -> Result<(), SymbolError> {
        for command in &self.commands {
            symbols.define_command(command.clone())?;
        }
        for constant in &self.constants {
            symbols.define_constant(constant.clone())?;
        }
        for constant in &self.runtime_constants {
            symbols.define_runtime_constant(constant.clone())?;
        }
        for variable in &self.variables {
            symbols.define_variable(variable.clone())?;
        }
        Ok(())
    }
}

struct Unit {
    key: String,
    script: ast::Script,
    declared: bool,
    emitted: bool,
}

/// The compilation pipeline: lexing, parsing, semantic analysis and
/// bytecode generation over a batch of sources.
///
/// The compiler holds no project state of its own; the symbol table and
/// dependency graph are passed in explicitly by the caller.
pub struct Compiler {
    lexical_table: LexicalTable,
    instruction_map: InstructionMap,
}

impl Compiler {
    pub fn new(instruction_map: InstructionMap) -> Self {
        Self {
            lexical_table: runescript_table(),
            instruction_map,
        }
    }

    pub fn instruction_map(&self) -> &InstructionMap {
        &self.instruction_map
    }

    /// Compile a batch of sources.
    ///
    /// Declarations are installed into the symbol table before any body is
    /// analyzed, so scripts in one batch may reference each other in any
    /// order. A declaration whose script fails analysis or generation is
    /// retracted before returning. When a dependency graph is supplied the
    /// post-parse dependency walker records an edge for every call site.
    pub fn compile(
        &self,
        symbols: &mut SymbolTable,
        input: CompileInput,
        mut graph: Option<&mut DependencyGraph<String>>,
    ) -> CompileResult {
        let mut result = CompileResult::default();
        let mut units = Vec::new();
        for (key, data) in input.sources {
            let source = String::from_utf8_lossy(&data);
            let (tokens, lex_diagnostics) = Lexer::new(&self.lexical_table, &source).tokenize();
            for diagnostic in lex_diagnostics {
                result.errors.push(CompileError {
                    key: key.clone(),
                    range: diagnostic.range,
                    message: diagnostic.message,
                });
            }
            let (scripts, parse_diagnostics) = Parser::new(&tokens).parse_file();
            for diagnostic in parse_diagnostics {
                result.errors.push(CompileError {
                    key: key.clone(),
                    range: diagnostic.range,
                    message: diagnostic.message,
                });
            }
            for script in scripts {
                if let Some(graph) = graph.as_deref_mut() {
                    let mut builder = DependencyTreeBuilder::new(graph);
                    walk_script(&mut builder, &script);
                }
                units.push(Unit {
                    key: key.clone(),
                    script,
                    declared: false,
                    emitted: false,
                });
            }
        }
        debug!("compiling {} scripts", units.len());
        // declare everything first so bodies can reference each other
        for unit in &mut units {
            let info = declared_info(&unit.script);
            match symbols.define_script(info) {
                Ok(()) => unit.declared = true,
                Err(error) => {
                    let range = unit.script.trigger.range.merge(&unit.script.name.range);
                    result.errors.push(CompileError {
                        key: unit.key.clone(),
                        range,
                        message: error.to_string(),
                    });
                }
            }
        }
        for unit in &mut units {
            if !unit.declared {
                continue;
            }
            let diagnostics = {
                let mut analyzer = Analyzer::new(symbols);
                analyzer.analyze_script(&mut unit.script)
            };
            let clean = diagnostics.is_empty();
            for diagnostic in diagnostics {
                result.errors.push(CompileError {
                    key: unit.key.clone(),
                    range: diagnostic.range,
                    message: diagnostic.message,
                });
            }
            if !clean {
                continue;
            }
            let info = declared_info(&unit.script);
            let mut generator = CodeGenerator::new(symbols, &self.instruction_map);
            match generator.generate(&unit.script, &info) {
                Ok(script) => {
                    unit.emitted = true;
                    result.scripts.push(CompiledScript {
                        key: unit.key.clone(),
                        info,
                        script,
                    });
                }
                Err(error) => {
                    result.errors.push(CompileError {
                        key: unit.key.clone(),
                        range: unit.script.range,
                        message: format!("internal error: {}", error),
                    });
                }
            }
        }
        // a declaration without bytecode must not linger in the table
        for unit in &units {
            if unit.declared && !unit.emitted {
                symbols.undefine_script(&unit.script.trigger.text, &unit.script.name.text);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Opcode;
    use crate::symbol::ScriptInfo;
    use crate::types::{PrimitiveType, Type};

    fn test_environment() -> Environment {
        Environment {
            commands: vec![CommandInfo::new(
                "mes",
                Opcode(1001),
                vec![PrimitiveType::String],
                Type::unit(),
                false,
            )],
            ..Environment::default()
        }
    }

    fn setup() -> (Compiler, SymbolTable) {
        let compiler = Compiler::new(InstructionMap::sequential());
        let mut symbols = SymbolTable::new();
        test_environment().register_into(&mut symbols).unwrap();
        (compiler, symbols)
    }

    #[test]
    fn test_cross_file_references() {
        let (compiler, mut symbols) = setup();
        let mut input = CompileInput::new();
        input.add_source_code("b.rs2", b"[proc,bar]() ~foo(1);".to_vec());
        input.add_source_code("a.rs2", b"[proc,foo](int $x)(int) return($x);".to_vec());
        let result = compiler.compile(&mut symbols, input, None);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.scripts.len(), 2);
        assert_eq!(symbols.script_count(), 2);
    }

    #[test]
    fn test_duplicate_declaration_is_a_semantic_error() {
        let (compiler, mut symbols) = setup();
        let mut input = CompileInput::new();
        input.add_source_code("a.rs2", b"[proc,foo]() return;".to_vec());
        input.add_source_code("b.rs2", b"[proc,foo]() return;".to_vec());
        let result = compiler.compile(&mut symbols, input, None);
        assert_eq!(result.scripts.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].key, "b.rs2");
        assert!(result.errors[0].message.contains("already defined"));
    }

    #[test]
    fn test_failed_script_is_retracted() {
        let (compiler, mut symbols) = setup();
        let input = CompileInput::of("a.rs2", b"[proc,broken]() ~nothing;".to_vec());
        let result = compiler.compile(&mut symbols, input, None);
        assert!(result.scripts.is_empty());
        assert!(result.has_errors_for("a.rs2"));
        assert!(symbols.lookup_script("proc", "broken").is_none());
    }

    #[test]
    fn test_dependency_graph_collection() {
        let (compiler, mut symbols) = setup();
        let mut graph = DependencyGraph::new();
        let mut input = CompileInput::new();
        input.add_source_code("a.rs2", b"[proc,foo](int $x)(int) return($x);".to_vec());
        input.add_source_code("b.rs2", b"[proc,bar]() ~foo(1); mes(\"ok\");".to_vec());
        let result = compiler.compile(&mut symbols, input, Some(&mut graph));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let bar = graph.find(&"[proc,bar]".to_string()).unwrap();
        assert!(bar.depends_on().contains("[proc,foo]"));
        assert!(bar.depends_on().contains("mes"));
        let foo = graph.find(&"[proc,foo]".to_string()).unwrap();
        assert!(foo.used_by().contains("[proc,bar]"));
    }

    #[test]
    fn test_external_declarations_survive() {
        let (compiler, mut symbols) = setup();
        symbols
            .define_script(ScriptInfo::new(
                "proc",
                "engine_hook",
                vec![],
                Type::unit(),
            ))
            .unwrap();
        let input = CompileInput::of("a.rs2", b"[proc,x]() ~engine_hook;".to_vec());
        let result = compiler.compile(&mut symbols, input, None);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(symbols.lookup_script("proc", "engine_hook").is_some());
    }

    #[test]
    fn test_lex_and_parse_errors_are_attributed() {
        let (compiler, mut symbols) = setup();
        let input = CompileInput::of("bad.rs2", b"[proc,p]() def_int $x = 12ab;".to_vec());
        let result = compiler.compile(&mut symbols, input, None);
        assert!(result.has_errors_for("bad.rs2"));
    }
}
