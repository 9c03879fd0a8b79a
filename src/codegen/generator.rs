use std::collections::HashMap;

use crate::ast::{self, AssignTarget, BinaryOp, Expr, ExprKind, Stmt, StmtKind};
use crate::symbol::{ScriptInfo, SymbolTable, VariableDomain};
use crate::types::{PrimitiveType, StackDomain};

use super::local::LocalMap;
use super::opcode::{CodegenError, CoreOpcode, InstructionMap};
use super::script::{Block, Instruction, Label, Operand, Script};

/// The bytecode generator.
///
/// Lowers one analyzed script at a time into labelled blocks. A context
/// stack tracks the block instructions are appended into; every block is
/// terminated explicitly with a branch or return, block order never implies
/// flow.
pub struct CodeGenerator<'a> {
    symbols: &'a SymbolTable,
    instruction_map: &'a InstructionMap,
    label_counters: HashMap<String, u32>,
    label_seq: u32,
    locals: LocalMap,
    blocks: Vec<Block>,
    last_core: Vec<Option<CoreOpcode>>,
    contexts: Vec<usize>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(symbols: &'a SymbolTable, instruction_map: &'a InstructionMap) -> Self {
        Self {
            symbols,
            instruction_map,
            label_counters: HashMap::new(),
            label_seq: 0,
            locals: LocalMap::new(),
            blocks: Vec::new(),
            last_core: Vec::new(),
            contexts: Vec::new(),
        }
    }

    /// Generate the bytecode of one script.
    pub fn generate(
        &mut self,
        script: &ast::Script,
        info: &ScriptInfo,
    ) -> Result<Script, CodegenError> {
        self.reset();
        self.contexts.push(0);
        for parameter in &script.parameters {
            self.locals
                .register_parameter(&parameter.name.text, parameter.ty);
        }
        let entry = self.make_label("entry");
        self.bind_new(entry);
        for stmt in &script.body {
            self.gen_stmt(stmt)?;
        }
        if self.last_core[self.current_block()] != Some(CoreOpcode::Return) {
            self.emit(CoreOpcode::Return, Operand::Int(0))?;
        }
        self.contexts.pop();
        Ok(Script {
            name: info.full_name(),
            blocks: std::mem::take(&mut self.blocks),
            int_locals: self.locals.count(StackDomain::Int),
            string_locals: self.locals.count(StackDomain::String),
            long_locals: self.locals.count(StackDomain::Long),
        })
    }

    fn reset(&mut self) {
        self.label_counters.clear();
        self.label_seq = 0;
        self.locals.reset();
        self.blocks.clear();
        self.last_core.clear();
        self.contexts.clear();
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                for stmt in stmts {
                    self.gen_stmt(stmt)?;
                }
                Ok(())
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.gen_if(condition, then_branch, else_branch.as_deref()),
            StmtKind::While { condition, body } => self.gen_while(condition, body),
            StmtKind::Switch {
                condition,
                cases,
                default,
            } => self.gen_switch(condition, cases, default.as_deref()),
            StmtKind::Return(exprs) => {
                for expr in exprs {
                    self.gen_expr(expr)?;
                }
                self.emit(CoreOpcode::Return, Operand::Int(0))
            }
            StmtKind::Expr(expr) => {
                self.gen_expr(expr)?;
                let ty = expr.ty.as_ref().ok_or(CodegenError::MissingType)?;
                let counts = ty.push_counts();
                self.gen_discard(counts.ints, counts.strings, counts.longs)
            }
            StmtKind::VarDecl {
                ty,
                name,
                initializer,
            } => {
                match initializer {
                    Some(expr) => self.gen_expr(expr)?,
                    None => self.gen_default_value(*ty)?,
                }
                let slot = self.locals.register_variable(&name.text, *ty);
                let opcode = pop_local_opcode(ty.stack_domain());
                self.emit(opcode, Operand::Local(slot))
            }
            StmtKind::VarInit { target, expr } => {
                self.gen_expr(expr)?;
                match target {
                    AssignTarget::Local(name) => {
                        let local = self
                            .locals
                            .lookup(&name.text)
                            .ok_or_else(|| CodegenError::UnresolvedSymbol(name.text.clone()))?;
                        let opcode = pop_local_opcode(local.ty.stack_domain());
                        let slot = local.slot;
                        self.emit(opcode, Operand::Local(slot))
                    }
                    AssignTarget::Game(name) => {
                        let variable = self
                            .symbols
                            .lookup_game_variable(&name.text)
                            .ok_or_else(|| CodegenError::UnresolvedSymbol(name.text.clone()))?
                            .clone();
                        let opcode = pop_game_opcode(variable.domain);
                        self.emit(opcode, Operand::Variable(variable))
                    }
                }
            }
        }
    }

    fn gen_if(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<(), CodegenError> {
        // labels are generated up front to preserve numbering order
        let true_label = self.make_label("if_true");
        let else_label = else_branch.map(|_| self.make_label("if_else"));
        let end_label = self.make_label("if_end");
        let opcode = self.gen_condition(condition)?;
        self.emit(opcode, Operand::Label(true_label.clone()))?;
        let miss = else_label.clone().unwrap_or_else(|| end_label.clone());
        self.emit(CoreOpcode::Branch, Operand::Label(miss))?;
        self.bind_new(true_label);
        self.gen_stmt(then_branch)?;
        self.emit(CoreOpcode::Branch, Operand::Label(end_label.clone()))?;
        if let (Some(else_label), Some(else_branch)) = (else_label, else_branch) {
            self.bind_new(else_label);
            self.gen_stmt(else_branch)?;
            self.emit(CoreOpcode::Branch, Operand::Label(end_label.clone()))?;
        }
        self.bind_new(end_label);
        Ok(())
    }

    fn gen_while(&mut self, condition: &Expr, body: &Stmt) -> Result<(), CodegenError> {
        let start_label = self.make_label("while_start");
        let body_label = self.make_label("while_body");
        let end_label = self.make_label("while_end");
        self.emit(CoreOpcode::Branch, Operand::Label(start_label.clone()))?;
        self.bind_new(start_label.clone());
        let opcode = self.gen_condition(condition)?;
        self.emit(opcode, Operand::Label(body_label.clone()))?;
        self.emit(CoreOpcode::Branch, Operand::Label(end_label.clone()))?;
        self.bind_new(body_label);
        self.gen_stmt(body)?;
        self.emit(CoreOpcode::Branch, Operand::Label(start_label))?;
        self.bind_new(end_label);
        Ok(())
    }

    fn gen_switch(
        &mut self,
        condition: &Expr,
        cases: &[ast::SwitchCase],
        default: Option<&[Stmt]>,
    ) -> Result<(), CodegenError> {
        self.gen_expr(condition)?;
        // the scrutinee is evaluated once into a synthesized local
        let slot = self.locals.register_synthetic(PrimitiveType::Int);
        self.emit(CoreOpcode::PopIntLocal, Operand::Local(slot))?;
        let case_labels: Vec<Label> = cases
            .iter()
            .map(|_| self.make_label("switch_case"))
            .collect();
        let default_label = default.map(|_| self.make_label("switch_default"));
        let end_label = self.make_label("switch_end");
        for (case, label) in cases.iter().zip(&case_labels) {
            for key in &case.keys {
                self.emit(CoreOpcode::PushIntLocal, Operand::Local(slot))?;
                self.gen_expr(key)?;
                self.emit(CoreOpcode::BranchEquals, Operand::Label(label.clone()))?;
            }
        }
        let miss = default_label.clone().unwrap_or_else(|| end_label.clone());
        self.emit(CoreOpcode::Branch, Operand::Label(miss))?;
        for (case, label) in cases.iter().zip(case_labels) {
            self.bind_new(label);
            for stmt in &case.body {
                self.gen_stmt(stmt)?;
            }
            self.emit(CoreOpcode::Branch, Operand::Label(end_label.clone()))?;
        }
        if let (Some(default_label), Some(default)) = (default_label, default) {
            self.bind_new(default_label);
            for stmt in default {
                self.gen_stmt(stmt)?;
            }
            self.emit(CoreOpcode::Branch, Operand::Label(end_label.clone()))?;
        }
        self.bind_new(end_label);
        Ok(())
    }

    /// Lower a condition and return the opcode that branches on it.
    ///
    /// A binary comparison lowers its two operands and branches with its
    /// own comparison opcode; any other condition lowers to a scalar and
    /// branches with `BranchIfTrue`. A comparison without a branch opcode
    /// (`!=`) is an invariant violation.
    fn gen_condition(&mut self, condition: &Expr) -> Result<CoreOpcode, CodegenError> {
        if let ExprKind::Binary { op, lhs, rhs } = &condition.kind {
            if op.is_comparison() {
                let opcode = comparison_opcode(*op)
                    .ok_or(CodegenError::UnexpectedOperator(op.symbol()))?;
                self.gen_expr(lhs)?;
                self.gen_expr(rhs)?;
                return Ok(opcode);
            }
        }
        self.gen_expr(condition)?;
        Ok(CoreOpcode::BranchIfTrue)
    }

    fn gen_expr(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        match &expr.kind {
            ExprKind::LiteralBool(value) => self.emit(
                CoreOpcode::PushIntConstant,
                Operand::Int(if *value { 1 } else { 0 }),
            ),
            ExprKind::LiteralInt(value) => {
                self.emit(CoreOpcode::PushIntConstant, Operand::Int(*value))
            }
            ExprKind::LiteralLong(value) => {
                self.emit(CoreOpcode::PushLongConstant, Operand::Long(*value))
            }
            ExprKind::LiteralString(value) => {
                self.emit(CoreOpcode::PushStringConstant, Operand::Str(value.clone()))
            }
            ExprKind::Concat(parts) => {
                for part in parts {
                    self.gen_expr(part)?;
                }
                self.emit(CoreOpcode::JoinString, Operand::Int(parts.len() as i32))
            }
            ExprKind::LocalVar(name) => {
                let local = self
                    .locals
                    .lookup(&name.text)
                    .ok_or_else(|| CodegenError::UnresolvedSymbol(name.text.clone()))?;
                let opcode = push_local_opcode(local.ty.stack_domain());
                let slot = local.slot;
                self.emit(opcode, Operand::Local(slot))
            }
            ExprKind::GameVar(name) => {
                let variable = self
                    .symbols
                    .lookup_game_variable(&name.text)
                    .ok_or_else(|| CodegenError::UnresolvedSymbol(name.text.clone()))?
                    .clone();
                let opcode = push_game_opcode(variable.domain);
                self.emit(opcode, Operand::Variable(variable))
            }
            ExprKind::Constant(name) => {
                let constant = self
                    .symbols
                    .lookup_constant(&name.text)
                    .ok_or_else(|| CodegenError::UnresolvedSymbol(name.text.clone()))?;
                let value = constant.value.clone();
                self.gen_constant_value(&value)
            }
            ExprKind::Gosub { name, args } => {
                for arg in args {
                    self.gen_expr(arg)?;
                }
                let info = self
                    .symbols
                    .lookup_script("proc", &name.text)
                    .ok_or_else(|| CodegenError::UnresolvedSymbol(name.text.clone()))?
                    .clone();
                self.emit(CoreOpcode::GosubWithParams, Operand::Script(info))
            }
            ExprKind::Command { name, args } => {
                let command = self
                    .symbols
                    .lookup_command(&name.text)
                    .ok_or_else(|| CodegenError::UnresolvedSymbol(name.text.clone()))?;
                let opcode = command.opcode;
                let operand = Operand::Int(if command.alternative { 1 } else { 0 });
                for arg in args {
                    self.gen_expr(arg)?;
                }
                self.emit_concrete(opcode, operand);
                Ok(())
            }
            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_comparison() {
                    return Err(CodegenError::ComparisonOutsideCondition);
                }
                self.gen_expr(lhs)?;
                self.gen_expr(rhs)?;
                let opcode = match op {
                    BinaryOp::Add => CoreOpcode::Add,
                    BinaryOp::Sub => CoreOpcode::Sub,
                    BinaryOp::Mul => CoreOpcode::Mul,
                    _ => CoreOpcode::Div,
                };
                self.emit(opcode, Operand::Int(0))
            }
            ExprKind::Dynamic(name) => {
                if let Some(constant) = self.symbols.lookup_runtime_constant(&name.text) {
                    let value = constant.value.clone();
                    return self.gen_constant_value(&value);
                }
                let command = self
                    .symbols
                    .lookup_command(&name.text)
                    .ok_or_else(|| CodegenError::UnresolvedSymbol(name.text.clone()))?;
                let operand = Operand::Int(if command.alternative { 1 } else { 0 });
                self.emit_concrete(command.opcode, operand);
                Ok(())
            }
        }
    }

    /// Push a constant's literal value with the opcode of its stack domain.
    fn gen_constant_value(
        &mut self,
        value: &crate::symbol::ConstantValue,
    ) -> Result<(), CodegenError> {
        use crate::symbol::ConstantValue;
        match value {
            ConstantValue::Int(v) => self.emit(CoreOpcode::PushIntConstant, Operand::Int(*v)),
            ConstantValue::Bool(v) => self.emit(
                CoreOpcode::PushIntConstant,
                Operand::Int(if *v { 1 } else { 0 }),
            ),
            ConstantValue::Long(v) => self.emit(CoreOpcode::PushLongConstant, Operand::Long(*v)),
            ConstantValue::String(v) => {
                self.emit(CoreOpcode::PushStringConstant, Operand::Str(v.clone()))
            }
        }
    }

    fn gen_default_value(&mut self, ty: PrimitiveType) -> Result<(), CodegenError> {
        match ty.stack_domain() {
            StackDomain::Int => self.emit(CoreOpcode::PushIntConstant, Operand::Int(0)),
            StackDomain::String => {
                self.emit(CoreOpcode::PushStringConstant, Operand::Str(String::new()))
            }
            StackDomain::Long => self.emit(CoreOpcode::PushLongConstant, Operand::Long(0)),
        }
    }

    /// Emit one discard instruction per pushed value of each stack domain.
    fn gen_discard(
        &mut self,
        ints: usize,
        strings: usize,
        longs: usize,
    ) -> Result<(), CodegenError> {
        for _ in 0..ints {
            self.emit(CoreOpcode::PopIntDiscard, Operand::Int(0))?;
        }
        for _ in 0..strings {
            self.emit(CoreOpcode::PopStringDiscard, Operand::Int(0))?;
        }
        for _ in 0..longs {
            self.emit(CoreOpcode::PopLongDiscard, Operand::Int(0))?;
        }
        Ok(())
    }

    /// Remap a core opcode and append the instruction to the current block.
    fn emit(&mut self, core: CoreOpcode, operand: Operand) -> Result<(), CodegenError> {
        let opcode = self.instruction_map.lookup(core)?;
        let block = self.current_block();
        self.blocks[block].add(Instruction::new(opcode, operand));
        self.last_core[block] = Some(core);
        Ok(())
    }

    /// Append an instruction that already carries a concrete opcode.
    fn emit_concrete(&mut self, opcode: super::opcode::Opcode, operand: Operand) {
        let block = self.current_block();
        self.blocks[block].add(Instruction::new(opcode, operand));
        self.last_core[block] = None;
    }

    /// Create a new block for `label` and bind it as the current block.
    fn bind_new(&mut self, label: Label) {
        self.blocks.push(Block::new(label));
        self.last_core.push(None);
        let index = self.blocks.len() - 1;
        if let Some(top) = self.contexts.last_mut() {
            *top = index;
        }
    }

    fn current_block(&self) -> usize {
        self.contexts.last().copied().unwrap_or(0)
    }

    /// Generate a unique label; the first label of a base name is the bare
    /// name, later ones get a numeric suffix.
    fn make_label(&mut self, base: &str) -> Label {
        let counter = self.label_counters.entry(base.to_string()).or_insert(0);
        let name = if *counter == 0 {
            base.to_string()
        } else {
            format!("{}_{}", base, counter)
        };
        *counter += 1;
        let id = self.label_seq;
        self.label_seq += 1;
        Label { id, name }
    }
}

fn comparison_opcode(op: BinaryOp) -> Option<CoreOpcode> {
    match op {
        BinaryOp::Equal => Some(CoreOpcode::BranchEquals),
        BinaryOp::LessThan => Some(CoreOpcode::BranchLessThan),
        BinaryOp::GreaterThan => Some(CoreOpcode::BranchGreaterThan),
        BinaryOp::LessThanOrEquals => Some(CoreOpcode::BranchLessThanOrEquals),
        BinaryOp::GreaterThanOrEquals => Some(CoreOpcode::BranchGreaterThanOrEquals),
        _ => None,
    }
}

fn push_local_opcode(domain: StackDomain) -> CoreOpcode {
    match domain {
        StackDomain::Int => CoreOpcode::PushIntLocal,
        StackDomain::String => CoreOpcode::PushStringLocal,
        StackDomain::Long => CoreOpcode::PushLongLocal,
    }
}

fn pop_local_opcode(domain: StackDomain) -> CoreOpcode {
    match domain {
        StackDomain::Int => CoreOpcode::PopIntLocal,
        StackDomain::String => CoreOpcode::PopStringLocal,
        StackDomain::Long => CoreOpcode::PopLongLocal,
    }
}

fn push_game_opcode(domain: VariableDomain) -> CoreOpcode {
    match domain {
        VariableDomain::Player => CoreOpcode::PushVarp,
        VariableDomain::PlayerBit => CoreOpcode::PushVarpBit,
        VariableDomain::ClientInt => CoreOpcode::PushVarcInt,
        VariableDomain::ClientString => CoreOpcode::PushVarcString,
        VariableDomain::Local => CoreOpcode::PushIntLocal,
    }
}

fn pop_game_opcode(domain: VariableDomain) -> CoreOpcode {
    match domain {
        VariableDomain::Player => CoreOpcode::PopVarp,
        VariableDomain::PlayerBit => CoreOpcode::PopVarpBit,
        VariableDomain::ClientInt => CoreOpcode::PopVarcInt,
        VariableDomain::ClientString => CoreOpcode::PopVarcString,
        VariableDomain::Local => CoreOpcode::PopIntLocal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{declared_info, Analyzer};
    use crate::lexer::{runescript_table, Lexer};
    use crate::parser::Parser;
    use crate::symbol::{CommandInfo, VariableInfo};
    use crate::types::Type;

    use super::super::opcode::Opcode;

    fn test_symbols() -> SymbolTable {
        let mut symbols = SymbolTable::new();
        symbols
            .define_command(CommandInfo::new(
                "stat_totals",
                Opcode(1000),
                vec![],
                Type::Tuple(vec![PrimitiveType::Int, PrimitiveType::String]),
                false,
            ))
            .unwrap();
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
            .define_variable(VariableInfo::new(
                VariableDomain::Player,
                "energy",
                PrimitiveType::Int,
                12,
            ))
            .unwrap();
        symbols
    }

    /// Analyze and generate every script in `source`, returning the results.
    fn generate(symbols: &mut SymbolTable, source: &str) -> Vec<Script> {
        let table = runescript_table();
        let (tokens, lex_diagnostics) = Lexer::new(&table, source).tokenize();
        assert!(lex_diagnostics.is_empty(), "{:?}", lex_diagnostics);
        let (mut scripts, parse_diagnostics) = Parser::new(&tokens).parse_file();
        assert!(parse_diagnostics.is_empty(), "{:?}", parse_diagnostics);
        for script in &scripts {
            symbols.define_script(declared_info(script)).unwrap();
        }
        let mut generated = Vec::new();
        for script in &mut scripts {
            let diagnostics = {
                let mut analyzer = Analyzer::new(symbols);
                analyzer.analyze_script(script)
            };
            assert!(diagnostics.is_empty(), "{:?}", diagnostics);
            let info = declared_info(script);
            let map = InstructionMap::sequential();
            let mut generator = CodeGenerator::new(symbols, &map);
            generated.push(generator.generate(script, &info).unwrap());
        }
        generated
    }

    fn core(map: &InstructionMap, core: CoreOpcode) -> Opcode {
        map.lookup(core).unwrap()
    }

    #[test]
    fn test_single_proc_bytecode() {
        let mut symbols = test_symbols();
        let scripts = generate(&mut symbols, "[proc,foo](int $x)(int) return($x);");
        let script = &scripts[0];
        assert_eq!(script.name, "[proc,foo]");
        assert_eq!(script.blocks.len(), 1);
        let map = InstructionMap::sequential();
        let entry = script.entry().unwrap();
        assert_eq!(
            entry.instructions,
            vec![
                Instruction::new(core(&map, CoreOpcode::PushIntLocal), Operand::Local(0)),
                Instruction::new(core(&map, CoreOpcode::Return), Operand::Int(0)),
            ]
        );
        assert_eq!(script.int_locals, 1);
    }

    #[test]
    fn test_if_else_lowering() {
        let mut symbols = test_symbols();
        let scripts = generate(
            &mut symbols,
            "[proc,p]() if (1 < 2) { return; } else { return; }",
        );
        let script = &scripts[0];
        let names: Vec<&str> = script.blocks.iter().map(|b| b.label.name.as_str()).collect();
        assert_eq!(names, vec!["entry", "if_true", "if_else", "if_end"]);
        let map = InstructionMap::sequential();
        let entry = script.entry().unwrap();
        assert_eq!(
            entry.instructions,
            vec![
                Instruction::new(core(&map, CoreOpcode::PushIntConstant), Operand::Int(1)),
                Instruction::new(core(&map, CoreOpcode::PushIntConstant), Operand::Int(2)),
                Instruction::new(
                    core(&map, CoreOpcode::BranchLessThan),
                    Operand::Label(script.block("if_true").unwrap().label.clone()),
                ),
                Instruction::new(
                    core(&map, CoreOpcode::Branch),
                    Operand::Label(script.block("if_else").unwrap().label.clone()),
                ),
            ]
        );
        let end_label = script.block("if_end").unwrap().label.clone();
        for name in ["if_true", "if_else"] {
            let block = script.block(name).unwrap();
            let last = block.instructions.last().unwrap();
            assert_eq!(last.opcode, core(&map, CoreOpcode::Branch));
            assert_eq!(last.operand, Operand::Label(end_label.clone()));
        }
        // if_end is terminal
        let end = script.block("if_end").unwrap();
        assert_eq!(end.last_opcode().unwrap(), core(&map, CoreOpcode::Return));
    }

    #[test]
    fn test_if_without_else_branches_to_end() {
        let mut symbols = test_symbols();
        let scripts = generate(&mut symbols, "[proc,p]() if (1 == 1) { return; }");
        let script = &scripts[0];
        let map = InstructionMap::sequential();
        let entry = script.entry().unwrap();
        let last = entry.instructions.last().unwrap();
        assert_eq!(last.opcode, core(&map, CoreOpcode::Branch));
        assert_eq!(
            last.operand,
            Operand::Label(script.block("if_end").unwrap().label.clone())
        );
    }

    #[test]
    fn test_boolean_condition_uses_branch_if_true() {
        let mut symbols = test_symbols();
        let scripts = generate(&mut symbols, "[proc,p](boolean $b) if ($b) { return; }");
        let script = &scripts[0];
        let map = InstructionMap::sequential();
        let entry = script.entry().unwrap();
        assert_eq!(
            entry.instructions[1].opcode,
            core(&map, CoreOpcode::BranchIfTrue)
        );
    }

    #[test]
    fn test_expression_statement_discards() {
        let mut symbols = test_symbols();
        let scripts = generate(&mut symbols, "[proc,p]() stat_totals();");
        let script = &scripts[0];
        let map = InstructionMap::sequential();
        let entry = script.entry().unwrap();
        assert_eq!(entry.instructions[0].opcode, Opcode(1000));
        assert_eq!(
            entry.instructions[1].opcode,
            core(&map, CoreOpcode::PopIntDiscard)
        );
        assert_eq!(
            entry.instructions[2].opcode,
            core(&map, CoreOpcode::PopStringDiscard)
        );
    }

    #[test]
    fn test_while_lowering() {
        let mut symbols = test_symbols();
        let scripts = generate(
            &mut symbols,
            "[proc,w](int $n) while ($n < 10) { $n = $n + 1; }",
        );
        let script = &scripts[0];
        let names: Vec<&str> = script.blocks.iter().map(|b| b.label.name.as_str()).collect();
        assert_eq!(names, vec!["entry", "while_start", "while_body", "while_end"]);
        let map = InstructionMap::sequential();
        // the body loops back to the condition block
        let body = script.block("while_body").unwrap();
        let last = body.instructions.last().unwrap();
        assert_eq!(last.opcode, core(&map, CoreOpcode::Branch));
        assert_eq!(
            last.operand,
            Operand::Label(script.block("while_start").unwrap().label.clone())
        );
        let start = script.block("while_start").unwrap();
        assert_eq!(
            start.instructions[2].opcode,
            core(&map, CoreOpcode::BranchLessThan)
        );
    }

    #[test]
    fn test_switch_lowering() {
        let mut symbols = test_symbols();
        let scripts = generate(
            &mut symbols,
            "[proc,s](int $x) switch ($x) { case 1, 2 : return; case default : return; }",
        );
        let script = &scripts[0];
        let names: Vec<&str> = script.blocks.iter().map(|b| b.label.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["entry", "switch_case", "switch_default", "switch_end"]
        );
        let map = InstructionMap::sequential();
        let entry = script.entry().unwrap();
        // scrutinee stored once, then one equality test per case key
        assert_eq!(entry.instructions[1].opcode, core(&map, CoreOpcode::PopIntLocal));
        let equals = entry
            .instructions
            .iter()
            .filter(|i| i.opcode == core(&map, CoreOpcode::BranchEquals))
            .count();
        assert_eq!(equals, 2);
        let last = entry.instructions.last().unwrap();
        assert_eq!(
            last.operand,
            Operand::Label(script.block("switch_default").unwrap().label.clone())
        );
    }

    #[test]
    fn test_concat_lowering() {
        let mut symbols = test_symbols();
        let scripts = generate(
            &mut symbols,
            "[proc,c](int $x)(string) return(\"have <$x> left\");",
        );
        let script = &scripts[0];
        let map = InstructionMap::sequential();
        let entry = script.entry().unwrap();
        let join = entry
            .instructions
            .iter()
            .find(|i| i.opcode == core(&map, CoreOpcode::JoinString))
            .unwrap();
        assert_eq!(join.operand, Operand::Int(3));
    }

    #[test]
    fn test_game_variable_access() {
        let mut symbols = test_symbols();
        let scripts = generate(&mut symbols, "[proc,g]() %energy = 100;");
        let script = &scripts[0];
        let map = InstructionMap::sequential();
        let entry = script.entry().unwrap();
        assert_eq!(entry.instructions[1].opcode, core(&map, CoreOpcode::PopVarp));
        assert!(matches!(
            entry.instructions[1].operand,
            Operand::Variable(ref v) if v.id == 12
        ));
    }

    #[test]
    fn test_var_decl_without_initializer_pushes_default() {
        let mut symbols = test_symbols();
        let scripts = generate(&mut symbols, "[proc,d]() def_string $s;");
        let script = &scripts[0];
        let map = InstructionMap::sequential();
        let entry = script.entry().unwrap();
        assert_eq!(
            entry.instructions[0],
            Instruction::new(
                core(&map, CoreOpcode::PushStringConstant),
                Operand::Str(String::new())
            )
        );
        assert_eq!(
            entry.instructions[1].opcode,
            core(&map, CoreOpcode::PopStringLocal)
        );
    }

    #[test]
    fn test_gosub_operand_carries_script_info() {
        let mut symbols = test_symbols();
        let scripts = generate(
            &mut symbols,
            "[proc,callee](int $x)(int) return($x); [proc,caller]() def_int $y = ~callee(1);",
        );
        let caller = scripts.iter().find(|s| s.name == "[proc,caller]").unwrap();
        let map = InstructionMap::sequential();
        let entry = caller.entry().unwrap();
        let gosub = entry
            .instructions
            .iter()
            .find(|i| i.opcode == core(&map, CoreOpcode::GosubWithParams))
            .unwrap();
        assert!(matches!(
            gosub.operand,
            Operand::Script(ref info) if info.full_name() == "[proc,callee]"
        ));
    }

    #[test]
    fn test_not_equals_condition_is_rejected() {
        let mut symbols = test_symbols();
        let table = runescript_table();
        let (tokens, _) = Lexer::new(&table, "[proc,p]() if (1 != 2) { return; }").tokenize();
        let (mut scripts, _) = Parser::new(&tokens).parse_file();
        let script = &mut scripts[0];
        let info = declared_info(script);
        symbols.define_script(info.clone()).unwrap();
        let diagnostics = {
            let mut analyzer = Analyzer::new(&symbols);
            analyzer.analyze_script(script)
        };
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        // no branch opcode exists for '!=', so generation must abort
        let map = InstructionMap::sequential();
        let mut generator = CodeGenerator::new(&symbols, &map);
        assert!(matches!(
            generator.generate(script, &info),
            Err(CodegenError::UnexpectedOperator("!="))
        ));
    }

    #[test]
    fn test_unmapped_opcode_aborts_generation() {
        let mut symbols = test_symbols();
        let table = runescript_table();
        let (tokens, _) = Lexer::new(&table, "[proc,x]() return;").tokenize();
        let (mut scripts, _) = Parser::new(&tokens).parse_file();
        let script = &mut scripts[0];
        let info = declared_info(script);
        symbols.define_script(info.clone()).unwrap();
        let diagnostics = {
            let mut analyzer = Analyzer::new(&symbols);
            analyzer.analyze_script(script)
        };
        assert!(diagnostics.is_empty());
        let empty_map = InstructionMap::new();
        let mut generator = CodeGenerator::new(&symbols, &empty_map);
        assert!(matches!(
            generator.generate(script, &info),
            Err(CodegenError::UnmappedOpcode(_))
        ));
    }
}
