mod walk;

pub use walk::{walk_expr, walk_script, walk_stmt, AstVisitor};

use crate::types::{PrimitiveType, Range, Type};

/// An identifier with its source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub range: Range,
    pub text: String,
}

/// A single script declaration: `[trigger,name](params)(returns) body`.
#[derive(Debug, Clone)]
pub struct Script {
    pub range: Range,
    pub trigger: Ident,
    pub name: Ident,
    pub parameters: Vec<Parameter>,
    pub returns: Vec<PrimitiveType>,
    pub body: Vec<Stmt>,
}

impl Script {
    /// Canonical `"[trigger,name]"` identifier of the script.
    pub fn full_name(&self) -> String {
        format!("[{},{}]", self.trigger.text, self.name.text)
    }
}

/// A declared script parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub range: Range,
    pub ty: PrimitiveType,
    pub name: Ident,
}

/// A statement node.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub range: Range,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Switch {
        condition: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Stmt>>,
    },
    Return(Vec<Expr>),
    Expr(Expr),
    VarDecl {
        ty: PrimitiveType,
        name: Ident,
        initializer: Option<Expr>,
    },
    VarInit {
        target: AssignTarget,
        expr: Expr,
    },
}

/// The left-hand side of an assignment statement.
#[derive(Debug, Clone)]
pub enum AssignTarget {
    Local(Ident),
    Game(Ident),
}

/// One `case key[, key]* :` arm of a switch statement.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub range: Range,
    pub keys: Vec<Expr>,
    pub body: Vec<Stmt>,
}

/// An expression node. `ty` is filled in by the semantic analyzer.
#[derive(Debug, Clone)]
pub struct Expr {
    pub range: Range,
    pub kind: ExprKind,
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(range: Range, kind: ExprKind) -> Self {
        Self {
            range,
            kind,
            ty: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    LiteralBool(bool),
    LiteralInt(i32),
    LiteralLong(i64),
    LiteralString(String),
    /// Interpolated string concatenation parts, in source order.
    Concat(Vec<Expr>),
    /// `$name` reference to a parameter or declared local.
    LocalVar(Ident),
    /// `%name` reference to a shared game variable.
    GameVar(Ident),
    /// `^name` reference to a compile-time constant.
    Constant(Ident),
    /// `~name(args)` call to a user-defined proc.
    Gosub { name: Ident, args: Vec<Expr> },
    /// `name(args)` call to an engine command.
    Command { name: Ident, args: Vec<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A bare identifier resolved during analysis (runtime constant or
    /// argument-less command).
    Dynamic(Ident),
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEquals,
    GreaterThanOrEquals,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Whether this operator compares its operands.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::GreaterThan
                | BinaryOp::LessThanOrEquals
                | BinaryOp::GreaterThanOrEquals
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessThanOrEquals => "<=",
            BinaryOp::GreaterThanOrEquals => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}
