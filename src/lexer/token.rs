use crate::types::Range;

/// The kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Identifier,
    IntLiteral,
    LongLiteral,
    StringLiteral,
    BoolLiteral,
    /// `$name` local variable reference.
    LocalVariable,
    /// `%name` game variable reference.
    GameVariable,
    /// `^name` constant reference.
    ConstantReference,
    /// Start of an interpolated string; literal parts and embedded
    /// expression tokens follow until [`TokenKind::ConcatEnd`].
    ConcatBegin,
    ConcatEnd,
    // keywords
    KwIf,
    KwElse,
    KwWhile,
    KwSwitch,
    KwCase,
    KwDefault,
    KwReturn,
    KwDefInt,
    KwDefString,
    KwDefLong,
    KwDefBoolean,
    KwInt,
    KwString,
    KwLong,
    KwBoolean,
    // separators
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
    // operators
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Tilde,
}

impl TokenKind {
    /// Whether this kind maps to a primitive type keyword.
    pub fn is_type_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::KwInt | TokenKind::KwString | TokenKind::KwLong | TokenKind::KwBoolean
        )
    }
}

/// A single lexical token with its exact source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub range: Range,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, range: Range) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            range,
        }
    }
}
