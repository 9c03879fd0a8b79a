use super::{Expr, ExprKind, Script, Stmt, StmtKind, SwitchCase};

/// Read-only traversal hooks over the tree, called around each node.
///
/// All hooks default to doing nothing; implementors override the ones they
/// care about and let the `walk_*` functions drive child order.
pub trait AstVisitor {
    fn enter_script(&mut self, _script: &Script) {}
    fn exit_script(&mut self, _script: &Script) {}
    fn enter_stmt(&mut self, _stmt: &Stmt) {}
    fn exit_stmt(&mut self, _stmt: &Stmt) {}
    fn enter_expr(&mut self, _expr: &Expr) {}
    fn exit_expr(&mut self, _expr: &Expr) {}
}

/// Walk a script and its body in source order.
pub fn walk_script<V: AstVisitor + ?Sized>(visitor: &mut V, script: &Script) {
    visitor.enter_script(script);
    for stmt in &script.body {
        walk_stmt(visitor, stmt);
    }
    visitor.exit_script(script);
}

/// Walk a statement and its children in source order.
pub fn walk_stmt<V: AstVisitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    visitor.enter_stmt(stmt);
    match &stmt.kind {
        StmtKind::Block(stmts) => {
            for stmt in stmts {
                walk_stmt(visitor, stmt);
            }
        }
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            walk_expr(visitor, condition);
            walk_stmt(visitor, then_branch);
            if let Some(else_branch) = else_branch {
                walk_stmt(visitor, else_branch);
            }
        }
        StmtKind::While { condition, body } => {
            walk_expr(visitor, condition);
            walk_stmt(visitor, body);
        }
        StmtKind::Switch {
            condition,
            cases,
            default,
        } => {
            walk_expr(visitor, condition);
            for SwitchCase { keys, body, .. } in cases {
                for key in keys {
                    walk_expr(visitor, key);
                }
                for stmt in body {
                    walk_stmt(visitor, stmt);
                }
            }
            if let Some(default) = default {
                for stmt in default {
                    walk_stmt(visitor, stmt);
                }
            }
        }
        StmtKind::Return(exprs) => {
            for expr in exprs {
                walk_expr(visitor, expr);
            }
        }
        StmtKind::Expr(expr) => walk_expr(visitor, expr),
        StmtKind::VarDecl { initializer, .. } => {
            if let Some(initializer) = initializer {
                walk_expr(visitor, initializer);
            }
        }
        StmtKind::VarInit { expr, .. } => walk_expr(visitor, expr),
    }
    visitor.exit_stmt(stmt);
}

/// Walk an expression and its children in source order.
pub fn walk_expr<V: AstVisitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    visitor.enter_expr(expr);
    match &expr.kind {
        ExprKind::Concat(parts) => {
            for part in parts {
                walk_expr(visitor, part);
            }
        }
        ExprKind::Gosub { args, .. } | ExprKind::Command { args, .. } => {
            for arg in args {
                walk_expr(visitor, arg);
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            walk_expr(visitor, lhs);
            walk_expr(visitor, rhs);
        }
        _ => {}
    }
    visitor.exit_expr(expr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Position, Range};

    fn range() -> Range {
        Range::new(Position::new(1, 1), Position::new(1, 1))
    }

    struct Counter {
        enters: usize,
        exits: usize,
    }

    impl AstVisitor for Counter {
        fn enter_expr(&mut self, _expr: &Expr) {
            self.enters += 1;
        }
        fn exit_expr(&mut self, _expr: &Expr) {
            self.exits += 1;
        }
    }

    #[test]
    fn test_walk_visits_every_expression() {
        use crate::ast::{BinaryOp, Ident};
        let lhs = Expr::new(range(), ExprKind::LiteralInt(1));
        let rhs = Expr::new(range(), ExprKind::LiteralInt(2));
        let cmp = Expr::new(
            range(),
            ExprKind::Binary {
                op: BinaryOp::LessThan,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        );
        let stmt = Stmt {
            range: range(),
            kind: StmtKind::If {
                condition: cmp,
                then_branch: Box::new(Stmt {
                    range: range(),
                    kind: StmtKind::Return(vec![Expr::new(
                        range(),
                        ExprKind::LocalVar(Ident {
                            range: range(),
                            text: "x".to_string(),
                        }),
                    )]),
                }),
                else_branch: None,
            },
        };
        let mut counter = Counter { enters: 0, exits: 0 };
        walk_stmt(&mut counter, &stmt);
        assert_eq!(counter.enters, 4);
        assert_eq!(counter.exits, 4);
    }
}
