use std::collections::{HashMap, HashSet};

use crate::ast::{self, AssignTarget, BinaryOp, Expr, ExprKind, Stmt, StmtKind};
use crate::symbol::{ScriptInfo, SymbolTable};
use crate::types::{Diagnostic, PrimitiveType, Range, StackDomain, Type};

/// Triggers the compiler accepts in script headers.
const KNOWN_TRIGGERS: &[&str] = &["proc", "clientscript"];

/// Build the declaration a script header describes.
pub fn declared_info(script: &ast::Script) -> ScriptInfo {
    ScriptInfo::new(
        script.trigger.text.clone(),
        script.name.text.clone(),
        script.parameters.iter().map(|p| p.ty).collect(),
        Type::from_flattened(script.returns.clone()),
    )
}

/// The semantic analyzer.
///
/// Resolves every name against the symbol table and the script's locals,
/// annotates each expression with its type, and accumulates diagnostics.
/// Analysis never stops at the first error; unresolved subexpressions are
/// left untyped so a single mistake does not cascade.
pub struct Analyzer<'a> {
    symbols: &'a SymbolTable,
    diagnostics: Vec<Diagnostic>,
    locals: HashMap<String, PrimitiveType>,
    returns: Type,
}

impl<'a> Analyzer<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            diagnostics: Vec::new(),
            locals: HashMap::new(),
            returns: Type::unit(),
        }
    }

    /// Analyze one script, returning the diagnostics it produced.
    pub fn analyze_script(&mut self, script: &mut ast::Script) -> Vec<Diagnostic> {
        self.diagnostics.clear();
        self.locals.clear();
        if !KNOWN_TRIGGERS.contains(&script.trigger.text.as_str()) {
            self.error(
                script.trigger.range,
                format!("unknown trigger '{}'", script.trigger.text),
            );
        }
        self.returns = Type::from_flattened(script.returns.clone());
        for parameter in &script.parameters {
            if self.locals.contains_key(&parameter.name.text) {
                self.error(
                    parameter.range,
                    format!("duplicate parameter '${}'", parameter.name.text),
                );
            } else {
                self.locals
                    .insert(parameter.name.text.clone(), parameter.ty);
            }
        }
        let mut body = std::mem::take(&mut script.body);
        self.analyze_stmts(&mut body);
        script.body = body;
        std::mem::take(&mut self.diagnostics)
    }

    /// Analyze a statement list, flagging code after a return.
    fn analyze_stmts(&mut self, stmts: &mut [Stmt]) {
        let mut returned = false;
        let mut reported = false;
        for stmt in stmts.iter_mut() {
            if returned && !reported {
                self.error(stmt.range, "unreachable code");
                reported = true;
            }
            if matches!(stmt.kind, StmtKind::Return(_)) {
                returned = true;
            }
            self.analyze_stmt(stmt);
        }
    }

    fn analyze_stmt(&mut self, stmt: &mut Stmt) {
        let range = stmt.range;
        match &mut stmt.kind {
            StmtKind::Block(stmts) => self.analyze_stmts(stmts),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.analyze_condition(condition);
                self.analyze_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.analyze_stmt(else_branch);
                }
            }
            StmtKind::While { condition, body } => {
                self.analyze_condition(condition);
                self.analyze_stmt(body);
            }
            StmtKind::Switch {
                condition,
                cases,
                default,
            } => {
                if let Some(ty) = self.analyze_expr(condition) {
                    if !matches!(ty, Type::Primitive(p) if p.stack_domain() == StackDomain::Int) {
                        self.error(
                            condition.range,
                            format!("switch condition must be of int type, found {}", ty),
                        );
                    }
                }
                let mut seen_keys = HashSet::new();
                for case in cases.iter_mut() {
                    for key in &mut case.keys {
                        self.analyze_expr(key);
                        match key.kind {
                            ExprKind::LiteralInt(value) => {
                                if !seen_keys.insert(value) {
                                    self.error(
                                        key.range,
                                        format!("duplicate case key {}", value),
                                    );
                                }
                            }
                            _ => {
                                self.error(key.range, "case key must be an integer literal");
                            }
                        }
                    }
                    self.analyze_stmts(&mut case.body);
                }
                if let Some(default) = default {
                    self.analyze_stmts(default);
                }
            }
            StmtKind::Return(exprs) => {
                let mut found = Vec::new();
                let mut unresolved = false;
                for expr in exprs.iter_mut() {
                    match self.analyze_expr(expr) {
                        Some(ty) => found.extend(ty.flattened()),
                        None => unresolved = true,
                    }
                }
                if !unresolved && found != self.returns.flattened() {
                    let found = Type::from_flattened(found);
                    let expected = self.returns.clone();
                    self.error(
                        range,
                        format!(
                            "return type mismatch: expected {}, found {}",
                            expected, found
                        ),
                    );
                }
            }
            StmtKind::Expr(expr) => {
                self.analyze_expr(expr);
            }
            StmtKind::VarDecl {
                ty,
                name,
                initializer,
            } => {
                if let Some(initializer) = initializer {
                    if let Some(found) = self.analyze_expr(initializer) {
                        self.expect_type(*ty, &found, initializer.range);
                    }
                }
                if self.locals.contains_key(&name.text) {
                    self.error(
                        name.range,
                        format!("duplicate local variable '${}'", name.text),
                    );
                } else {
                    self.locals.insert(name.text.clone(), *ty);
                }
            }
            StmtKind::VarInit { target, expr } => {
                let found = self.analyze_expr(expr);
                match target {
                    AssignTarget::Local(name) => match self.locals.get(&name.text).copied() {
                        Some(ty) => {
                            if let Some(found) = found {
                                self.expect_type(ty, &found, expr.range);
                            }
                        }
                        None => self.error(
                            name.range,
                            format!("undeclared local variable '${}'", name.text),
                        ),
                    },
                    AssignTarget::Game(name) => {
                        match self.symbols.lookup_game_variable(&name.text) {
                            Some(variable) => {
                                if let Some(found) = found {
                                    self.expect_type(variable.ty, &found, expr.range);
                                }
                            }
                            None => self.error(
                                name.range,
                                format!("undeclared game variable '%{}'", name.text),
                            ),
                        }
                    }
                }
            }
        }
    }

    /// Analyze an if/while condition.
    ///
    /// A comparison is only valid here: the opcode set branches on
    /// comparisons directly and has no compare-to-value instruction.
    fn analyze_condition(&mut self, condition: &mut Expr) {
        if let ExprKind::Binary { op, lhs, rhs } = &mut condition.kind {
            if op.is_comparison() {
                let op = *op;
                let lhs_ty = self.analyze_expr(lhs);
                let rhs_ty = self.analyze_expr(rhs);
                let range = condition.range;
                self.check_comparison(op, lhs_ty, rhs_ty, range);
                condition.ty = Some(Type::Primitive(PrimitiveType::Boolean));
                return;
            }
        }
        if let Some(ty) = self.analyze_expr(condition) {
            if ty != Type::Primitive(PrimitiveType::Boolean) {
                self.error(
                    condition.range,
                    format!("condition must be a boolean expression, found {}", ty),
                );
            }
        }
    }

    fn check_comparison(
        &mut self,
        op: BinaryOp,
        lhs: Option<Type>,
        rhs: Option<Type>,
        range: Range,
    ) {
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return;
        };
        let (Type::Primitive(lhs), Type::Primitive(rhs)) = (&lhs, &rhs) else {
            self.error(range, "comparison operands must be single values");
            return;
        };
        if lhs.stack_domain() != rhs.stack_domain() {
            self.error(
                range,
                format!(
                    "type mismatch: cannot compare {} against {}",
                    lhs, rhs
                ),
            );
            return;
        }
        let relational = !matches!(op, BinaryOp::Equal | BinaryOp::NotEqual);
        if relational && lhs.stack_domain() == StackDomain::String {
            self.error(
                range,
                format!("operator '{}' does not apply to string operands", op.symbol()),
            );
        }
    }

    /// Analyze an expression, annotate it, and return its resolved type.
    ///
    /// Returns `None` when resolution failed; the error has already been
    /// reported and callers skip dependent checks.
    fn analyze_expr(&mut self, expr: &mut Expr) -> Option<Type> {
        let range = expr.range;
        let ty = match &mut expr.kind {
            ExprKind::LiteralBool(_) => Some(Type::Primitive(PrimitiveType::Boolean)),
            ExprKind::LiteralInt(_) => Some(Type::Primitive(PrimitiveType::Int)),
            ExprKind::LiteralLong(_) => Some(Type::Primitive(PrimitiveType::Long)),
            ExprKind::LiteralString(_) => Some(Type::Primitive(PrimitiveType::String)),
            ExprKind::Concat(parts) => {
                // heterogeneous parts are stringified at runtime
                for part in parts.iter_mut() {
                    self.analyze_expr(part);
                }
                Some(Type::Primitive(PrimitiveType::String))
            }
            ExprKind::LocalVar(name) => match self.locals.get(&name.text).copied() {
                Some(ty) => Some(Type::Primitive(ty)),
                None => {
                    self.error(
                        range,
                        format!("undeclared local variable '${}'", name.text),
                    );
                    None
                }
            },
            ExprKind::GameVar(name) => match self.symbols.lookup_game_variable(&name.text) {
                Some(variable) => Some(Type::Primitive(variable.ty)),
                None => {
                    self.error(
                        range,
                        format!("undeclared game variable '%{}'", name.text),
                    );
                    None
                }
            },
            ExprKind::Constant(name) => match self.symbols.lookup_constant(&name.text) {
                Some(constant) => Some(Type::Primitive(constant.value.primitive_type())),
                None => {
                    self.error(range, format!("undeclared constant '^{}'", name.text));
                    None
                }
            },
            ExprKind::Gosub { name, args } => {
                let arg_types = self.analyze_args(args);
                match self.symbols.lookup_script("proc", &name.text) {
                    Some(info) => {
                        let expected = info.arguments.clone();
                        let returns = info.returns.clone();
                        let callee = format!("~{}", name.text);
                        self.check_arguments(&callee, &expected, arg_types, range);
                        Some(returns)
                    }
                    None => {
                        self.error(range, format!("undeclared proc '~{}'", name.text));
                        None
                    }
                }
            }
            ExprKind::Command { name, args } => {
                let arg_types = self.analyze_args(args);
                match self.symbols.lookup_command(&name.text) {
                    Some(command) => {
                        let expected = command.arguments.clone();
                        let returns = command.returns.clone();
                        let callee = name.text.clone();
                        self.check_arguments(&callee, &expected, arg_types, range);
                        Some(returns)
                    }
                    None => {
                        self.error(range, format!("undeclared command '{}'", name.text));
                        None
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_comparison() {
                    self.error(range, "comparison is only allowed inside a condition");
                    self.analyze_expr(lhs);
                    self.analyze_expr(rhs);
                    None
                } else {
                    let lhs_ty = self.analyze_expr(lhs);
                    let rhs_ty = self.analyze_expr(rhs);
                    for ty in [&lhs_ty, &rhs_ty].into_iter().flatten() {
                        if *ty != Type::Primitive(PrimitiveType::Int) {
                            self.error(
                                range,
                                format!("arithmetic operands must be of int type, found {}", ty),
                            );
                            break;
                        }
                    }
                    Some(Type::Primitive(PrimitiveType::Int))
                }
            }
            ExprKind::Dynamic(name) => {
                if let Some(constant) = self.symbols.lookup_runtime_constant(&name.text) {
                    Some(Type::Primitive(constant.ty))
                } else if let Some(command) = self.symbols.lookup_command(&name.text) {
                    let expected = command.arguments.clone();
                    let returns = command.returns.clone();
                    let callee = name.text.clone();
                    self.check_arguments(&callee, &expected, Some(Vec::new()), range);
                    Some(returns)
                } else {
                    self.error(range, format!("undeclared symbol '{}'", name.text));
                    None
                }
            }
        };
        expr.ty = ty.clone();
        ty
    }

    /// Analyze call arguments; `None` when any argument failed to resolve.
    fn analyze_args(&mut self, args: &mut [Expr]) -> Option<Vec<PrimitiveType>> {
        let mut types = Vec::new();
        let mut unresolved = false;
        for arg in args.iter_mut() {
            match self.analyze_expr(arg) {
                Some(ty) => types.extend(ty.flattened()),
                None => unresolved = true,
            }
        }
        (!unresolved).then_some(types)
    }

    fn check_arguments(
        &mut self,
        callee: &str,
        expected: &[PrimitiveType],
        found: Option<Vec<PrimitiveType>>,
        range: Range,
    ) {
        let Some(found) = found else {
            return;
        };
        if found.len() != expected.len() {
            self.error(
                range,
                format!(
                    "'{}' takes {} arguments but {} were provided",
                    callee,
                    expected.len(),
                    found.len()
                ),
            );
            return;
        }
        for (index, (expected, found)) in expected.iter().zip(&found).enumerate() {
            if expected != found {
                self.error(
                    range,
                    format!(
                        "argument {} of '{}' expects {}, found {}",
                        index + 1,
                        callee,
                        expected,
                        found
                    ),
                );
            }
        }
    }

    fn expect_type(&mut self, expected: PrimitiveType, found: &Type, range: Range) {
        if *found != Type::Primitive(expected) {
            self.error(
                range,
                format!("type mismatch: expected {}, found {}", expected, found),
            );
        }
    }

    fn error(&mut self, range: Range, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(range, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Opcode;
    use crate::lexer::{runescript_table, Lexer};
    use crate::parser::Parser;
    use crate::symbol::{
        CommandInfo, ConstantInfo, ConstantValue, RuntimeConstantInfo, VariableDomain,
        VariableInfo,
    };

    fn test_symbols() -> SymbolTable {
        let mut symbols = SymbolTable::new();
        symbols
            .define_command(CommandInfo::new(
                "mes",
                Opcode(1001),
                vec![PrimitiveType::String],
                Type::unit(),
                false,
            ))
            .unwrap();
        symbols
            .define_constant(ConstantInfo::new("max_stack", ConstantValue::Int(2147483647)))
            .unwrap();
        symbols
            .define_runtime_constant(RuntimeConstantInfo::new(
                "map_members",
                PrimitiveType::Boolean,
                ConstantValue::Bool(true),
            ))
            .unwrap();
        symbols
            .define_variable(VariableInfo::new(
                VariableDomain::Player,
                "energy",
                PrimitiveType::Int,
                12,
            ))
            .unwrap();
        symbols
    }

    fn analyze(symbols: &mut SymbolTable, source: &str) -> Vec<Diagnostic> {
        let table = runescript_table();
        let (tokens, lex_diagnostics) = Lexer::new(&table, source).tokenize();
        assert!(lex_diagnostics.is_empty(), "{:?}", lex_diagnostics);
        let (mut scripts, parse_diagnostics) = Parser::new(&tokens).parse_file();
        assert!(parse_diagnostics.is_empty(), "{:?}", parse_diagnostics);
        for script in &scripts {
            symbols.define_script(declared_info(script)).unwrap();
        }
        let mut diagnostics = Vec::new();
        for script in &mut scripts {
            let mut analyzer = Analyzer::new(symbols);
            diagnostics.extend(analyzer.analyze_script(script));
        }
        diagnostics
    }

    #[test]
    fn test_clean_script() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(
            &mut symbols,
            "[proc,foo](int $x)(int) if ($x > 0) { return($x); } return(0);",
        );
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_undeclared_references() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(
            &mut symbols,
            "[proc,a]() ~missing(1); unknown_cmd(); $ghost = 1; %novar = 2;",
        );
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("undeclared proc")));
        assert!(messages.iter().any(|m| m.contains("undeclared command")));
        assert!(messages.iter().any(|m| m.contains("undeclared local variable")));
        assert!(messages.iter().any(|m| m.contains("undeclared game variable")));
    }

    #[test]
    fn test_arity_mismatch() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(
            &mut symbols,
            "[proc,callee](int $a, int $b) return; [proc,caller]() ~callee(1);",
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("takes 2 arguments but 1"));
    }

    #[test]
    fn test_argument_type_mismatch() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(&mut symbols, "[proc,m]() mes(5);");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("expects string"));
    }

    #[test]
    fn test_duplicate_parameter() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(&mut symbols, "[proc,d](int $x, int $x) return;");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("duplicate parameter"));
    }

    #[test]
    fn test_unreachable_code() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(&mut symbols, "[proc,u]() return; mes(\"gone\");");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("unreachable"));
    }

    #[test]
    fn test_return_type_mismatch() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(&mut symbols, "[proc,r](int) return(\"nope\");");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("return type mismatch"));
    }

    #[test]
    fn test_condition_type_checks() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(&mut symbols, "[proc,c]() if (1 < \"a\") { return; }");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("cannot compare"));
    }

    #[test]
    fn test_comparison_outside_condition() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(&mut symbols, "[proc,x]() def_boolean $b = 1 < 2;");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("only allowed inside a condition")));
    }

    #[test]
    fn test_arithmetic_requires_int() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(&mut symbols, "[proc,p](int) return(1 + \"a\");");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("arithmetic operands")));
    }

    #[test]
    fn test_constant_and_runtime_constant() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(
            &mut symbols,
            "[proc,k](int) if (map_members) { return(^max_stack); } return(0);",
        );
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_switch_checks() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(
            &mut symbols,
            "[proc,s](string $x) switch ($x) { case 1, 1 : return; }",
        );
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("switch condition")));
        assert!(messages.iter().any(|m| m.contains("duplicate case key")));
    }

    #[test]
    fn test_tuple_returns_flow_through_gosub() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(
            &mut symbols,
            "[proc,pair]()(int,string) return(1, \"a\"); [proc,use]()(int,string) return(~pair);",
        );
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_unknown_trigger() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(&mut symbols, "[sorcery,z]() return;");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("unknown trigger")));
    }

    #[test]
    fn test_var_decl_type_mismatch_and_duplicate() {
        let mut symbols = test_symbols();
        let diagnostics = analyze(
            &mut symbols,
            "[proc,v]() def_int $x = \"s\"; def_int $x = 2;",
        );
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("type mismatch")));
        assert!(messages.iter().any(|m| m.contains("duplicate local variable")));
    }
}
