use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::token::TokenKind;

/// Registry of the keywords and separator characters the lexer recognises.
///
/// Keyword lookup is case-insensitive; registration keys must be unique.
#[derive(Debug, Clone)]
pub struct LexicalTable {
    keywords: HashMap<String, TokenKind>,
    separators: HashMap<char, TokenKind>,
}

impl LexicalTable {
    /// Create an empty table, optionally preloading the default content
    /// (`true`/`false` and the bracket/paren/brace separators).
    pub fn new(default_table: bool) -> Self {
        let mut table = Self {
            keywords: HashMap::new(),
            separators: HashMap::new(),
        };
        if default_table {
            table.register_defaults();
        }
        table
    }

    fn register_defaults(&mut self) {
        // never fails on an empty table
        self.register_keyword("true", TokenKind::BoolLiteral).unwrap();
        self.register_keyword("false", TokenKind::BoolLiteral).unwrap();
        self.register_separator('(', TokenKind::LParen).unwrap();
        self.register_separator(')', TokenKind::RParen).unwrap();
        self.register_separator('[', TokenKind::LBracket).unwrap();
        self.register_separator(']', TokenKind::RBracket).unwrap();
        self.register_separator('{', TokenKind::LBrace).unwrap();
        self.register_separator('}', TokenKind::RBrace).unwrap();
    }

    /// Register a keyword; the word is lowercased before insertion.
    pub fn register_keyword(&mut self, word: &str, kind: TokenKind) -> Result<()> {
        let word = word.to_lowercase();
        if self.keywords.contains_key(&word) {
            return Err(anyhow!("keyword '{}' is already registered", word));
        }
        self.keywords.insert(word, kind);
        Ok(())
    }

    /// Register a separator character.
    pub fn register_separator(&mut self, character: char, kind: TokenKind) -> Result<()> {
        if self.separators.contains_key(&character) {
            return Err(anyhow!("separator '{}' is already registered", character));
        }
        self.separators.insert(character, kind);
        Ok(())
    }

    /// Look up the token kind of a keyword, case-insensitively.
    pub fn lookup_keyword(&self, word: &str) -> Option<TokenKind> {
        self.keywords.get(&word.to_lowercase()).copied()
    }

    /// Look up the token kind of a separator character.
    pub fn lookup_separator(&self, character: char) -> Option<TokenKind> {
        self.separators.get(&character).copied()
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.keywords.contains_key(&word.to_lowercase())
    }

    pub fn is_separator(&self, character: char) -> bool {
        self.separators.contains_key(&character)
    }
}

impl Default for LexicalTable {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Build the full lexical table of the RuneScript language: the default
/// content plus every keyword and separator the parser understands.
pub fn runescript_table() -> LexicalTable {
    let mut table = LexicalTable::default();
    let keywords = [
        ("if", TokenKind::KwIf),
        ("else", TokenKind::KwElse),
        ("while", TokenKind::KwWhile),
        ("switch", TokenKind::KwSwitch),
        ("case", TokenKind::KwCase),
        ("default", TokenKind::KwDefault),
        ("return", TokenKind::KwReturn),
        ("def_int", TokenKind::KwDefInt),
        ("def_string", TokenKind::KwDefString),
        ("def_long", TokenKind::KwDefLong),
        ("def_boolean", TokenKind::KwDefBoolean),
        ("int", TokenKind::KwInt),
        ("string", TokenKind::KwString),
        ("long", TokenKind::KwLong),
        ("boolean", TokenKind::KwBoolean),
    ];
    for (word, kind) in keywords {
        table.register_keyword(word, kind).unwrap();
    }
    table.register_separator(',', TokenKind::Comma).unwrap();
    table.register_separator(';', TokenKind::Semicolon).unwrap();
    table.register_separator(':', TokenKind::Colon).unwrap();
    table
}
