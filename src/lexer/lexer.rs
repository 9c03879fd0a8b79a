use crate::types::{Diagnostic, Position, Range};

use super::table::LexicalTable;
use super::token::{Token, TokenKind};

/// Hand-written lexer over a character stream.
///
/// Produces a flat token stream ending in an EOF token. Malformed input is
/// reported as a diagnostic and the lexer resynchronises at the next
/// separator, so a single bad character never aborts the file.
pub struct Lexer<'a> {
    table: &'a LexicalTable,
    chars: Vec<char>,
    pos: usize,
    line: i32,
    column: i32,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn new(table: &'a LexicalTable, source: &str) -> Self {
        Self {
            table,
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Tokenize the whole source.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        loop {
            self.skip_trivia();
            if self.peek().is_none() {
                let position = self.position();
                self.tokens.push(Token::new(
                    TokenKind::Eof,
                    "",
                    Range::new(position, position),
                ));
                break;
            }
            self.lex_one();
        }
        (self.tokens, self.diagnostics)
    }

    /// Lex one source construct, appending one or more tokens.
    fn lex_one(&mut self) {
        let start = self.position();
        let c = match self.peek() {
            Some(c) => c,
            None => return,
        };
        if c.is_ascii_digit() {
            self.lex_number(start);
        } else if c.is_alphabetic() || c == '_' {
            self.lex_identifier(start);
        } else if c == '"' {
            self.lex_string(start);
        } else if c == '$' || c == '^' {
            self.lex_sigil(start, c);
        } else if c == '%' {
            // a game variable when followed by a name, a stray token otherwise
            if self.peek_at(1).map_or(false, |n| n.is_alphabetic() || n == '_') {
                self.lex_sigil(start, c);
            } else {
                self.advance();
                self.push(TokenKind::Percent, "%", start);
            }
        } else if let Some(kind) = self.table.lookup_separator(c) {
            self.advance();
            self.push(kind, c.to_string(), start);
        } else {
            self.lex_operator(start, c);
        }
    }

    fn lex_operator(&mut self, start: Position, c: char) {
        self.advance();
        match c {
            '=' => {
                if self.consume_if('=') {
                    self.push(TokenKind::Equal, "==", start);
                } else {
                    self.push(TokenKind::Assign, "=", start);
                }
            }
            '!' => {
                if self.consume_if('=') {
                    self.push(TokenKind::NotEqual, "!=", start);
                } else {
                    self.error_at(start, "unexpected character '!'");
                    self.resynchronise();
                }
            }
            '<' => {
                if self.consume_if('=') {
                    self.push(TokenKind::LessEqual, "<=", start);
                } else {
                    self.push(TokenKind::Less, "<", start);
                }
            }
            '>' => {
                if self.consume_if('=') {
                    self.push(TokenKind::GreaterEqual, ">=", start);
                } else {
                    self.push(TokenKind::Greater, ">", start);
                }
            }
            '+' => self.push(TokenKind::Plus, "+", start),
            '-' => self.push(TokenKind::Minus, "-", start),
            '*' => self.push(TokenKind::Star, "*", start),
            '/' => self.push(TokenKind::Slash, "/", start),
            '~' => self.push(TokenKind::Tilde, "~", start),
            _ => {
                self.error_at(start, format!("unexpected character '{}'", c));
                self.resynchronise();
            }
        }
    }

    fn lex_number(&mut self, start: Position) {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let long = self.peek() == Some('l') || self.peek() == Some('L');
        if long {
            self.advance();
        }
        // a trailing identifier character makes the whole literal malformed
        if self.peek().map_or(false, |c| c.is_alphanumeric() || c == '_') {
            while self.peek().map_or(false, |c| c.is_alphanumeric() || c == '_') {
                self.advance();
            }
            self.error_at(start, "malformed numeric literal");
            self.resynchronise();
            return;
        }
        let kind = if long {
            TokenKind::LongLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.push(kind, text, start);
    }

    fn lex_identifier(&mut self, start: Position) {
        let text = self.take_name();
        match self.table.lookup_keyword(&text) {
            Some(kind) => self.push(kind, text, start),
            None => self.push(TokenKind::Identifier, text, start),
        }
    }

    /// Lex a `$name`, `%name` or `^name` reference; the lexeme is the bare name.
    fn lex_sigil(&mut self, start: Position, sigil: char) {
        self.advance();
        if !self.peek().map_or(false, |c| c.is_alphabetic() || c == '_') {
            self.error_at(start, format!("expected a name after '{}'", sigil));
            self.resynchronise();
            return;
        }
        let name = self.take_name();
        let kind = match sigil {
            '$' => TokenKind::LocalVariable,
            '%' => TokenKind::GameVariable,
            _ => TokenKind::ConstantReference,
        };
        self.push(kind, name, start);
    }

    /// Lex a string literal, expanding `<expr>` interpolations into a
    /// `ConcatBegin .. ConcatEnd` token sequence.
    fn lex_string(&mut self, start: Position) {
        self.advance(); // opening quote
        let mut buffer = String::new();
        let mut part_start = self.position();
        let mut interpolated = false;
        loop {
            match self.peek() {
                None => {
                    self.error_at(start, "unterminated string literal");
                    break;
                }
                Some('\n') => {
                    self.error_at(start, "unterminated string literal");
                    break;
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('\\') => buffer.push('\\'),
                        Some('"') => buffer.push('"'),
                        Some('n') => buffer.push('\n'),
                        Some('t') => buffer.push('\t'),
                        Some('<') => buffer.push('<'),
                        Some('>') => buffer.push('>'),
                        other => {
                            let position = self.position();
                            self.error_at(
                                position,
                                format!(
                                    "invalid escape sequence '\\{}'",
                                    other.map(String::from).unwrap_or_default()
                                ),
                            );
                        }
                    }
                    if self.peek().is_some() {
                        self.advance();
                    }
                }
                Some('<') => {
                    if !interpolated {
                        interpolated = true;
                        self.push(TokenKind::ConcatBegin, "", start);
                    }
                    if !buffer.is_empty() {
                        let text = std::mem::take(&mut buffer);
                        self.push(TokenKind::StringLiteral, text, part_start);
                    }
                    self.advance(); // '<'
                    self.lex_interpolation();
                    part_start = self.position();
                }
                Some(c) => {
                    buffer.push(c);
                    self.advance();
                }
            }
        }
        if interpolated {
            if !buffer.is_empty() {
                self.push(TokenKind::StringLiteral, buffer, part_start);
            }
            let end = self.position();
            self.tokens.push(Token::new(
                TokenKind::ConcatEnd,
                "",
                Range::new(end, end),
            ));
        } else {
            self.push(TokenKind::StringLiteral, buffer, start);
        }
    }

    /// Lex the embedded expression tokens of one `<...>` interpolation.
    fn lex_interpolation(&mut self) {
        let mut depth = 0usize;
        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    let position = self.position();
                    self.error_at(position, "unterminated string interpolation");
                    return;
                }
                Some('>') if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {
                    let before = self.tokens.len();
                    self.lex_one();
                    for token in &self.tokens[before..] {
                        match token.kind {
                            TokenKind::LParen => depth += 1,
                            TokenKind::RParen => depth = depth.saturating_sub(1),
                            _ => {}
                        }
                    }
                }
            }
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while self.peek().map_or(false, |c| c != '\n') {
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.position();
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => {
                                self.error_at(start, "unterminated block comment");
                                break;
                            }
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Skip forward to the next separator, whitespace or end of input.
    fn resynchronise(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || self.table.is_separator(c) {
                break;
            }
            self.advance();
        }
    }

    fn take_name(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        text
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>, start: Position) {
        let range = Range::new(start, self.position());
        self.tokens.push(Token::new(kind, lexeme, range));
    }

    fn error_at(&mut self, position: Position, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(Range::new(position, self.position()), message));
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if let Some(c) = c {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    fn consume_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::table::runescript_table;

    fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
        let table = runescript_table();
        Lexer::new(&table, source).tokenize()
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_script_header() {
        let (tokens, diagnostics) = lex("[proc,foo](int $x)(int)");
        assert!(diagnostics.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::LBracket,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::Identifier,
                TokenKind::RBracket,
                TokenKind::LParen,
                TokenKind::KwInt,
                TokenKind::LocalVariable,
                TokenKind::RParen,
                TokenKind::LParen,
                TokenKind::KwInt,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[7].lexeme, "x");
    }

    #[test]
    fn test_literals() {
        let (tokens, diagnostics) = lex("123 456L \"hi\" true");
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[0].lexeme, "123");
        assert_eq!(tokens[1].kind, TokenKind::LongLiteral);
        assert_eq!(tokens[1].lexeme, "456");
        assert_eq!(tokens[2].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[2].lexeme, "hi");
        assert_eq!(tokens[3].kind, TokenKind::BoolLiteral);
    }

    #[test]
    fn test_string_escapes() {
        let (tokens, diagnostics) = lex(r#""a\"b\\c\n""#);
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[0].lexeme, "a\"b\\c\n");
    }

    #[test]
    fn test_interpolated_string() {
        let (tokens, diagnostics) = lex("\"count <$x> items\"");
        assert!(diagnostics.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::ConcatBegin,
                TokenKind::StringLiteral,
                TokenKind::LocalVariable,
                TokenKind::StringLiteral,
                TokenKind::ConcatEnd,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[1].lexeme, "count ");
        assert_eq!(tokens[3].lexeme, " items");
    }

    #[test]
    fn test_interpolated_call_with_args() {
        let (tokens, diagnostics) = lex("\"<~total(1, 2)>\"");
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::ConcatBegin);
        assert_eq!(tokens[1].kind, TokenKind::Tilde);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::ConcatEnd).count(), 1);
    }

    #[test]
    fn test_unterminated_string() {
        let (_, diagnostics) = lex("\"oops");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("unterminated string"));
    }

    #[test]
    fn test_malformed_number_resynchronises() {
        let (tokens, diagnostics) = lex("12ab; 5");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("malformed numeric"));
        // lexing continues after the separator
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Semicolon));
        assert!(tokens.iter().any(|t| t.lexeme == "5"));
    }

    #[test]
    fn test_bad_character() {
        let (tokens, diagnostics) = lex("@@ 7");
        assert_eq!(diagnostics.len(), 1);
        assert!(tokens.iter().any(|t| t.lexeme == "7"));
    }

    #[test]
    fn test_comments_are_skipped() {
        let (tokens, diagnostics) = lex("1 // line\n/* block */ 2");
        assert!(diagnostics.is_empty());
        let kinds = kinds(&tokens);
        assert_eq!(
            kinds,
            vec![TokenKind::IntLiteral, TokenKind::IntLiteral, TokenKind::Eof]
        );
    }

    #[test]
    fn test_variable_sigils() {
        let (tokens, diagnostics) = lex("$local %game ^const 4 % 2");
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::LocalVariable);
        assert_eq!(tokens[1].kind, TokenKind::GameVariable);
        assert_eq!(tokens[2].kind, TokenKind::ConstantReference);
        assert_eq!(tokens[4].kind, TokenKind::Percent);
    }

    #[test]
    fn test_ranges_track_lines() {
        let (tokens, _) = lex("1\n  2");
        assert_eq!(tokens[0].range.start, Position::new(1, 1));
        assert_eq!(tokens[1].range.start, Position::new(2, 3));
    }
}
