use crate::ast::{
    AssignTarget, BinaryOp, Expr, ExprKind, Ident, Parameter, Script, Stmt, StmtKind, SwitchCase,
};
use crate::lexer::{Token, TokenKind};
use crate::types::{Diagnostic, PrimitiveType, Range};

/// Recursive-descent parser producing one or more scripts per file.
///
/// Parse errors are recovery points at statement boundaries: the error is
/// recorded as a diagnostic and parsing continues with the next statement
/// or script where possible.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Parse every script in the token stream.
    pub fn parse_file(mut self) -> (Vec<Script>, Vec<Diagnostic>) {
        let mut scripts = Vec::new();
        while !self.at(TokenKind::Eof) {
            if self.at(TokenKind::LBracket) {
                if let Some(script) = self.parse_script() {
                    scripts.push(script);
                }
            } else {
                let token = self.peek().clone();
                self.error(
                    token.range,
                    format!("expected a script declaration, found '{}'", token.lexeme),
                );
                // skip to the next script header
                while !self.at(TokenKind::LBracket) && !self.at(TokenKind::Eof) {
                    self.advance();
                }
            }
        }
        (scripts, self.diagnostics)
    }

    fn parse_script(&mut self) -> Option<Script> {
        let start = self.peek().range;
        self.expect(TokenKind::LBracket, "'['")?;
        let trigger = self.expect_ident("a trigger name")?;
        self.expect(TokenKind::Comma, "','")?;
        let name = self.expect_ident("a script name")?;
        self.expect(TokenKind::RBracket, "']'")?;
        let (parameters, returns) = self.parse_signature();
        let mut body = Vec::new();
        while !self.at(TokenKind::LBracket) && !self.at(TokenKind::Eof) {
            if let Some(stmt) = self.parse_statement_or_skip() {
                body.push(stmt);
            }
        }
        let range = start.merge(&self.previous_range());
        Some(Script {
            range,
            trigger,
            name,
            parameters,
            returns,
            body,
        })
    }

    /// Parse the optional `(params)` and `(returns)` groups of a header.
    ///
    /// A single group containing bare type names is a returns group with no
    /// parameters, e.g. `[proc,x](int)`.
    fn parse_signature(&mut self) -> (Vec<Parameter>, Vec<PrimitiveType>) {
        if !self.at(TokenKind::LParen) {
            return (Vec::new(), Vec::new());
        }
        let first_is_params = match self.peek_at(1).map(|t| t.kind) {
            Some(TokenKind::RParen) => true,
            Some(kind) if kind.is_type_keyword() => {
                matches!(self.peek_at(2).map(|t| t.kind), Some(TokenKind::LocalVariable))
            }
            _ => true,
        };
        let mut parameters = Vec::new();
        let mut returns = Vec::new();
        if first_is_params {
            self.parse_parameters(&mut parameters);
            if self.at(TokenKind::LParen) {
                self.parse_return_types(&mut returns);
            }
        } else {
            self.parse_return_types(&mut returns);
        }
        (parameters, returns)
    }

    fn parse_parameters(&mut self, parameters: &mut Vec<Parameter>) {
        self.advance(); // '('
        if !self.at(TokenKind::RParen) {
            loop {
                let start = self.peek().range;
                let Some(ty) = self.parse_type_keyword() else {
                    break;
                };
                let Some(name) = self.expect_local_name() else {
                    break;
                };
                let range = start.merge(&name.range);
                parameters.push(Parameter { range, ty, name });
                if !self.consume_if(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'");
    }

    fn parse_return_types(&mut self, returns: &mut Vec<PrimitiveType>) {
        self.advance(); // '('
        if !self.at(TokenKind::RParen) {
            loop {
                let Some(ty) = self.parse_type_keyword() else {
                    break;
                };
                returns.push(ty);
                if !self.consume_if(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'");
    }

    fn parse_type_keyword(&mut self) -> Option<PrimitiveType> {
        let token = self.peek();
        let ty = match token.kind {
            TokenKind::KwInt => PrimitiveType::Int,
            TokenKind::KwString => PrimitiveType::String,
            TokenKind::KwLong => PrimitiveType::Long,
            TokenKind::KwBoolean => PrimitiveType::Boolean,
            _ => {
                let range = token.range;
                let lexeme = token.lexeme.clone();
                self.error(range, format!("expected a type name, found '{}'", lexeme));
                return None;
            }
        };
        self.advance();
        Some(ty)
    }

    fn parse_statement(&mut self) -> Option<Stmt> {
        let start = self.peek().range;
        let stmt = match self.peek().kind {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => self.parse_while(),
            TokenKind::KwSwitch => self.parse_switch(),
            TokenKind::KwReturn => self.parse_return(),
            TokenKind::KwDefInt => self.parse_var_decl(PrimitiveType::Int),
            TokenKind::KwDefString => self.parse_var_decl(PrimitiveType::String),
            TokenKind::KwDefLong => self.parse_var_decl(PrimitiveType::Long),
            TokenKind::KwDefBoolean => self.parse_var_decl(PrimitiveType::Boolean),
            TokenKind::LocalVariable | TokenKind::GameVariable
                if self.peek_at(1).map(|t| t.kind) == Some(TokenKind::Assign) =>
            {
                self.parse_var_init()
            }
            _ => self.parse_expr_statement(),
        };
        match stmt {
            Some(kind) => Some(Stmt {
                range: start.merge(&self.previous_range()),
                kind,
            }),
            None => {
                self.recover_statement();
                None
            }
        }
    }

    fn parse_expr_statement(&mut self) -> Option<StmtKind> {
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(StmtKind::Expr(expr))
    }

    fn parse_block(&mut self) -> Option<StmtKind> {
        self.advance(); // '{'
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if let Some(stmt) = self.parse_statement_or_skip() {
                stmts.push(stmt);
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Some(StmtKind::Block(stmts))
    }

    fn parse_if(&mut self) -> Option<StmtKind> {
        self.advance(); // 'if'
        self.expect(TokenKind::LParen, "'('")?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.consume_if(TokenKind::KwElse) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Some(StmtKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> Option<StmtKind> {
        self.advance(); // 'while'
        self.expect(TokenKind::LParen, "'('")?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        Some(StmtKind::While { condition, body })
    }

    fn parse_switch(&mut self) -> Option<StmtKind> {
        self.advance(); // 'switch'
        self.expect(TokenKind::LParen, "'('")?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut cases = Vec::new();
        let mut default = None;
        while self.at(TokenKind::KwCase) {
            let case_start = self.peek().range;
            self.advance(); // 'case'
            if self.at(TokenKind::KwDefault) {
                let token_range = self.peek().range;
                self.advance();
                self.expect(TokenKind::Colon, "':'")?;
                let body = self.parse_case_body();
                if default.is_some() {
                    self.error(token_range, "duplicate default case");
                } else {
                    default = Some(body);
                }
            } else {
                let mut keys = Vec::new();
                loop {
                    keys.push(self.parse_expr()?);
                    if !self.consume_if(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::Colon, "':'")?;
                let body = self.parse_case_body();
                cases.push(SwitchCase {
                    range: case_start.merge(&self.previous_range()),
                    keys,
                    body,
                });
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Some(StmtKind::Switch {
            condition,
            cases,
            default,
        })
    }

    fn parse_case_body(&mut self) -> Vec<Stmt> {
        let mut body = Vec::new();
        while !self.at(TokenKind::KwCase) && !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof)
        {
            if let Some(stmt) = self.parse_statement_or_skip() {
                body.push(stmt);
            }
        }
        body
    }

    /// Parse a statement, forcing forward progress if recovery stalled on a
    /// token the statement grammar cannot begin with.
    fn parse_statement_or_skip(&mut self) -> Option<Stmt> {
        let before = self.pos;
        let stmt = self.parse_statement();
        if stmt.is_none() && self.pos == before {
            self.advance();
        }
        stmt
    }

    fn parse_return(&mut self) -> Option<StmtKind> {
        self.advance(); // 'return'
        let mut exprs = Vec::new();
        if self.consume_if(TokenKind::LParen) {
            if !self.at(TokenKind::RParen) {
                loop {
                    exprs.push(self.parse_expr()?);
                    if !self.consume_if(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(StmtKind::Return(exprs))
    }

    fn parse_var_decl(&mut self, ty: PrimitiveType) -> Option<StmtKind> {
        self.advance(); // 'def_*'
        let name = self.expect_local_name()?;
        let initializer = if self.consume_if(TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(StmtKind::VarDecl {
            ty,
            name,
            initializer,
        })
    }

    fn parse_var_init(&mut self) -> Option<StmtKind> {
        let token = self.peek().clone();
        let name = Ident {
            range: token.range,
            text: token.lexeme.clone(),
        };
        let target = match token.kind {
            TokenKind::LocalVariable => AssignTarget::Local(name),
            _ => AssignTarget::Game(name),
        };
        self.advance();
        self.expect(TokenKind::Assign, "'='")?;
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(StmtKind::VarInit { target, expr })
    }

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Equal => BinaryOp::Equal,
                TokenKind::NotEqual => BinaryOp::NotEqual,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = binary(op, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_relational(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Less => BinaryOp::LessThan,
                TokenKind::LessEqual => BinaryOp::LessThanOrEquals,
                TokenKind::Greater => BinaryOp::GreaterThan,
                TokenKind::GreaterEqual => BinaryOp::GreaterThanOrEquals,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        if self.at(TokenKind::Minus) {
            let start = self.peek().range;
            self.advance();
            let token = self.peek().clone();
            return match token.kind {
                TokenKind::IntLiteral => {
                    self.advance();
                    let value = self.parse_int_lexeme(&token, true);
                    Some(Expr::new(
                        start.merge(&token.range),
                        ExprKind::LiteralInt(value),
                    ))
                }
                TokenKind::LongLiteral => {
                    self.advance();
                    let value = self.parse_long_lexeme(&token, true);
                    Some(Expr::new(
                        start.merge(&token.range),
                        ExprKind::LiteralLong(value),
                    ))
                }
                _ => {
                    self.error(start, "expected a numeric literal after '-'");
                    None
                }
            };
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::IntLiteral => {
                self.advance();
                let value = self.parse_int_lexeme(&token, false);
                Some(Expr::new(token.range, ExprKind::LiteralInt(value)))
            }
            TokenKind::LongLiteral => {
                self.advance();
                let value = self.parse_long_lexeme(&token, false);
                Some(Expr::new(token.range, ExprKind::LiteralLong(value)))
            }
            TokenKind::StringLiteral => {
                self.advance();
                Some(Expr::new(
                    token.range,
                    ExprKind::LiteralString(token.lexeme),
                ))
            }
            TokenKind::BoolLiteral => {
                self.advance();
                Some(Expr::new(
                    token.range,
                    ExprKind::LiteralBool(token.lexeme.eq_ignore_ascii_case("true")),
                ))
            }
            TokenKind::ConcatBegin => self.parse_concat(),
            TokenKind::LocalVariable => {
                self.advance();
                Some(Expr::new(
                    token.range,
                    ExprKind::LocalVar(ident_of(&token)),
                ))
            }
            TokenKind::GameVariable => {
                self.advance();
                Some(Expr::new(token.range, ExprKind::GameVar(ident_of(&token))))
            }
            TokenKind::ConstantReference => {
                self.advance();
                Some(Expr::new(
                    token.range,
                    ExprKind::Constant(ident_of(&token)),
                ))
            }
            TokenKind::Tilde => {
                self.advance();
                let name = self.expect_ident("a proc name")?;
                let args = if self.at(TokenKind::LParen) {
                    self.parse_arguments()?
                } else {
                    Vec::new()
                };
                let range = token.range.merge(&self.previous_range());
                Some(Expr::new(range, ExprKind::Gosub { name, args }))
            }
            TokenKind::Identifier => {
                self.advance();
                let name = ident_of(&token);
                if self.at(TokenKind::LParen) {
                    let args = self.parse_arguments()?;
                    let range = token.range.merge(&self.previous_range());
                    Some(Expr::new(range, ExprKind::Command { name, args }))
                } else {
                    Some(Expr::new(token.range, ExprKind::Dynamic(name)))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Some(expr)
            }
            _ => {
                self.error(
                    token.range,
                    format!("expected an expression, found '{}'", token.lexeme),
                );
                None
            }
        }
    }

    fn parse_concat(&mut self) -> Option<Expr> {
        let start = self.peek().range;
        self.advance(); // concat begin
        let mut parts = Vec::new();
        while !self.at(TokenKind::ConcatEnd) && !self.at(TokenKind::Eof) {
            if self.at(TokenKind::StringLiteral) {
                let token = self.peek().clone();
                self.advance();
                parts.push(Expr::new(
                    token.range,
                    ExprKind::LiteralString(token.lexeme),
                ));
            } else {
                parts.push(self.parse_expr()?);
            }
        }
        self.expect(TokenKind::ConcatEnd, "the end of the string")?;
        let range = start.merge(&self.previous_range());
        Some(Expr::new(range, ExprKind::Concat(parts)))
    }

    fn parse_arguments(&mut self) -> Option<Vec<Expr>> {
        self.advance(); // '('
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.consume_if(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Some(args)
    }

    fn parse_int_lexeme(&mut self, token: &Token, negative: bool) -> i32 {
        let text = if negative {
            format!("-{}", token.lexeme)
        } else {
            token.lexeme.clone()
        };
        match text.parse::<i32>() {
            Ok(value) => value,
            Err(_) => {
                self.error(token.range, "integer literal out of range");
                0
            }
        }
    }

    fn parse_long_lexeme(&mut self, token: &Token, negative: bool) -> i64 {
        let text = if negative {
            format!("-{}", token.lexeme)
        } else {
            token.lexeme.clone()
        };
        match text.parse::<i64>() {
            Ok(value) => value,
            Err(_) => {
                self.error(token.range, "long literal out of range");
                0
            }
        }
    }

    /// Skip to the next statement boundary after a parse error.
    fn recover_statement(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::Eof | TokenKind::RBrace | TokenKind::KwCase | TokenKind::LBracket => {
                    return
                }
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Option<&Token> {
        if self.at(kind) {
            self.advance();
            Some(&self.tokens[self.pos - 1])
        } else {
            let token = self.peek().clone();
            self.error(
                token.range,
                format!("expected {}, found '{}'", what, token.lexeme),
            );
            None
        }
    }

    fn expect_ident(&mut self, what: &str) -> Option<Ident> {
        let token = self.peek().clone();
        if token.kind == TokenKind::Identifier {
            self.advance();
            Some(ident_of(&token))
        } else {
            self.error(
                token.range,
                format!("expected {}, found '{}'", what, token.lexeme),
            );
            None
        }
    }

    fn expect_local_name(&mut self) -> Option<Ident> {
        let token = self.peek().clone();
        if token.kind == TokenKind::LocalVariable {
            self.advance();
            Some(ident_of(&token))
        } else {
            self.error(
                token.range,
                format!("expected a '$'-prefixed name, found '{}'", token.lexeme),
            );
            None
        }
    }

    fn error(&mut self, range: Range, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(range, message));
    }

    fn previous_range(&self) -> Range {
        if self.pos == 0 {
            self.tokens[0].range
        } else {
            self.tokens[self.pos - 1].range
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn consume_if(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }
}

fn ident_of(token: &Token) -> Ident {
    Ident {
        range: token.range,
        text: token.lexeme.clone(),
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let range = lhs.range.merge(&rhs.range);
    Expr::new(
        range,
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{runescript_table, Lexer};

    fn parse(source: &str) -> (Vec<Script>, Vec<Diagnostic>) {
        let table = runescript_table();
        let (tokens, lex_diagnostics) = Lexer::new(&table, source).tokenize();
        assert!(lex_diagnostics.is_empty(), "{:?}", lex_diagnostics);
        Parser::new(&tokens).parse_file()
    }

    #[test]
    fn test_single_proc() {
        let (scripts, diagnostics) = parse("[proc,foo](int $x)(int) return($x);");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(scripts.len(), 1);
        let script = &scripts[0];
        assert_eq!(script.full_name(), "[proc,foo]");
        assert_eq!(script.parameters.len(), 1);
        assert_eq!(script.parameters[0].ty, PrimitiveType::Int);
        assert_eq!(script.returns, vec![PrimitiveType::Int]);
        assert_eq!(script.body.len(), 1);
        assert!(matches!(script.body[0].kind, StmtKind::Return(ref e) if e.len() == 1));
    }

    #[test]
    fn test_returns_only_signature() {
        let (scripts, diagnostics) = parse("[proc,foo](int) return(1);");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert!(scripts[0].parameters.is_empty());
        assert_eq!(scripts[0].returns, vec![PrimitiveType::Int]);
    }

    #[test]
    fn test_empty_params_signature() {
        let (scripts, diagnostics) = parse("[proc,bar]() ~foo(1);");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert!(scripts[0].parameters.is_empty());
        assert!(scripts[0].returns.is_empty());
        assert!(matches!(
            scripts[0].body[0].kind,
            StmtKind::Expr(Expr {
                kind: ExprKind::Gosub { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_multiple_scripts_per_file() {
        let (scripts, diagnostics) = parse("[proc,a] return; [proc,b] return;");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[1].full_name(), "[proc,b]");
    }

    #[test]
    fn test_if_else() {
        let (scripts, diagnostics) =
            parse("[proc,p]() if (1 < 2) { return; } else { return; }");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        let StmtKind::If {
            condition,
            else_branch,
            ..
        } = &scripts[0].body[0].kind
        else {
            panic!("expected an if statement");
        };
        assert!(matches!(
            condition.kind,
            ExprKind::Binary {
                op: BinaryOp::LessThan,
                ..
            }
        ));
        assert!(else_branch.is_some());
    }

    #[test]
    fn test_switch() {
        let source = "[proc,s](int $x) switch ($x) { case 1, 2 : return; case default : return; }";
        let (scripts, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        let StmtKind::Switch { cases, default, .. } = &scripts[0].body[0].kind else {
            panic!("expected a switch statement");
        };
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].keys.len(), 2);
        assert!(default.is_some());
    }

    #[test]
    fn test_var_decl_and_init() {
        let (scripts, diagnostics) =
            parse("[proc,v] def_int $x = 1; $x = 2; %energy = 3;");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert!(matches!(scripts[0].body[0].kind, StmtKind::VarDecl { .. }));
        assert!(matches!(
            scripts[0].body[1].kind,
            StmtKind::VarInit {
                target: AssignTarget::Local(_),
                ..
            }
        ));
        assert!(matches!(
            scripts[0].body[2].kind,
            StmtKind::VarInit {
                target: AssignTarget::Game(_),
                ..
            }
        ));
    }

    #[test]
    fn test_precedence() {
        let (scripts, diagnostics) = parse("[proc,p](boolean) return(1 + 2 * 3 < 4);");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        let StmtKind::Return(exprs) = &scripts[0].body[0].kind else {
            panic!("expected a return");
        };
        let ExprKind::Binary { op, lhs, .. } = &exprs[0].kind else {
            panic!("expected a comparison");
        };
        assert_eq!(*op, BinaryOp::LessThan);
        assert!(matches!(
            lhs.kind,
            ExprKind::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_literal() {
        let (scripts, diagnostics) = parse("[proc,n](int) return(-5);");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        let StmtKind::Return(exprs) = &scripts[0].body[0].kind else {
            panic!("expected a return");
        };
        assert!(matches!(exprs[0].kind, ExprKind::LiteralInt(-5)));
    }

    #[test]
    fn test_error_recovery_at_statement_boundary() {
        let (scripts, diagnostics) = parse("[proc,r] def_int $x = ; return;");
        assert!(!diagnostics.is_empty());
        // the return statement after the bad declaration still parses
        assert!(scripts[0]
            .body
            .iter()
            .any(|s| matches!(s.kind, StmtKind::Return(_))));
    }

    #[test]
    fn test_modulo_is_not_an_operator() {
        let (_, diagnostics) = parse("[proc,m](int) return(4 % 2);");
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn test_interpolated_concat() {
        let (scripts, diagnostics) = parse("[proc,c](string) return(\"a <$x> b\");");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        let StmtKind::Return(exprs) = &scripts[0].body[0].kind else {
            panic!("expected a return");
        };
        let ExprKind::Concat(parts) = &exprs[0].kind else {
            panic!("expected a concatenation");
        };
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn test_dynamic_reference() {
        let (scripts, diagnostics) = parse("[proc,d](int) return(max_int);");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        let StmtKind::Return(exprs) = &scripts[0].body[0].kind else {
            panic!("expected a return");
        };
        assert!(matches!(exprs[0].kind, ExprKind::Dynamic(_)));
    }
}
