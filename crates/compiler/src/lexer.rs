//! Hand-written lexer for Sage source
//!
//! Reads bytes off a [`Queue`] one at a time, pushing the byte back whenever
//! it has read one character past the end of a lexeme. Newlines are emitted
//! as tokens because the grammar terminates some statements with them.
//! At most one token of look-ahead is buffered through `unget`.

use crate::queue::Queue;
use crate::token::{Token, TokenKind};

/// Reserved identifiers.
pub const KEYWORDS: &[&str] = &[
    "int",
    "char",
    "void",
    "i16",
    "i32",
    "i64",
    "f32",
    "f64",
    "bool",
    "include",
    "for",
    "while",
    "in",
    "if",
    "else",
    "break",
    "continue",
    "fallthrough",
    "ret",
    "struct",
];

pub struct Lexer {
    buffer: Queue<u8>,
    pushback: Queue<Token>,
    line: usize,
    column: usize,
    current: Option<char>,
    last_token: Option<Token>,
    filename: String,
}

impl Lexer {
    pub fn new(filename: impl Into<String>, source: &[u8]) -> Self {
        Lexer {
            buffer: Queue::from_items(source.iter().copied()),
            pushback: Queue::new(),
            line: 0,
            column: 0,
            current: None,
            last_token: None,
            filename: filename.into(),
        }
    }

    /// Produce the next token. Never fails: unrecognised bytes become
    /// `Error`-kind tokens and lexing continues after them.
    pub fn next_token(&mut self) -> Token {
        if let Some(tok) = self.pushback.pop() {
            self.last_token = Some(tok.clone());
            return tok;
        }

        self.bump();
        while matches!(self.current, Some(' ') | Some('\t')) {
            self.bump();
        }

        // line comments run to the end of the line; the newline itself
        // still becomes a token
        while self.current == Some('/') {
            match self.buffer.pop() {
                Some(b'/') => {
                    while !matches!(self.current, Some('\n') | None) {
                        self.bump();
                    }
                }
                Some(other) => {
                    self.buffer.stack(other);
                    break;
                }
                None => break,
            }
        }

        let Some(ch) = self.current else {
            return self.finish(self.make_token(TokenKind::Eof, "eof"));
        };

        if ch == '\n' {
            let token = self.make_token(TokenKind::Newline, "\n");
            self.line += 1;
            self.column = 0;
            return self.finish(token);
        }

        if let Some(token) = self.lex_symbols() {
            return self.finish(token);
        }
        if let Some(token) = self.lex_identifiers() {
            return self.finish(token);
        }
        if let Some(token) = self.lex_numbers() {
            return self.finish(token);
        }

        self.finish(self.make_token(TokenKind::Error, format!("unrecognized symbol '{}'", ch)))
    }

    /// Restore the last token so the next `next_token` call returns it again.
    pub fn unget(&mut self) {
        if let Some(tok) = self.last_token.clone() {
            self.pushback.stack(tok);
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    fn finish(&mut self, token: Token) -> Token {
        self.last_token = Some(token.clone());
        token
    }

    fn make_token(&self, kind: TokenKind, lexeme: impl Into<String>) -> Token {
        let lexeme = lexeme.into();
        let width = lexeme.chars().count();
        Token {
            kind,
            lexeme,
            line: self.line,
            column: self.column.saturating_sub(width),
            filename: self.filename.clone(),
        }
    }

    /// Advance `current` by one byte.
    fn bump(&mut self) {
        self.current = self.buffer.pop().map(|b| {
            self.column += 1;
            b as char
        });
    }

    /// Push the current character back and clear it.
    fn restore_current(&mut self) {
        if let Some(ch) = self.current.take() {
            self.column = self.column.saturating_sub(1);
            self.buffer.stack(ch as u8);
        }
    }

    /// If the next byte equals `expected`, produce the two-character token;
    /// otherwise push the byte back so the caller can emit the one-character
    /// form.
    fn followed_by(&mut self, expected: char, kind: TokenKind, lexeme: &str) -> Option<Token> {
        match self.buffer.pop() {
            Some(b) if b as char == expected => {
                self.column += 1;
                Some(self.make_token(kind, lexeme))
            }
            Some(b) => {
                self.buffer.stack(b);
                None
            }
            None => None,
        }
    }

    fn check_for_string(&mut self) -> Option<Token> {
        if self.current != Some('"') {
            return None;
        }

        let mut lexeme = String::from("\"");
        self.bump();
        while self.current != Some('"') {
            let Some(ch) = self.current else {
                return Some(self.make_token(TokenKind::Error, "unterminated string literal"));
            };
            lexeme.push(ch);
            self.bump();
        }
        lexeme.push('"');

        Some(self.make_token(TokenKind::StringLit, lexeme))
    }

    fn lex_symbols(&mut self) -> Option<Token> {
        if let Some(token) = self.check_for_string() {
            return Some(token);
        }

        let ch = self.current?;
        let token = match ch {
            '(' => self.make_token(TokenKind::Lparen, "("),
            ')' => self.make_token(TokenKind::Rparen, ")"),
            '{' => self.make_token(TokenKind::Lbrace, "{"),
            '}' => self.make_token(TokenKind::Rbrace, "}"),
            '[' => self.make_token(TokenKind::Lbracket, "["),
            ']' => self.make_token(TokenKind::Rbracket, "]"),
            ',' => self.make_token(TokenKind::Comma, ","),
            '*' => self.make_token(TokenKind::Mul, "*"),
            '/' => self.make_token(TokenKind::Div, "/"),
            '#' => self.make_token(TokenKind::Pound, "#"),
            '^' => self.make_token(TokenKind::Exp, "^"),

            ':' => self
                .followed_by(':', TokenKind::Binding, "::")
                .unwrap_or_else(|| self.make_token(TokenKind::Colon, ":")),

            '=' => self
                .followed_by('=', TokenKind::Equality, "==")
                .unwrap_or_else(|| self.make_token(TokenKind::Assign, "=")),

            '+' => self
                .followed_by('+', TokenKind::Increment, "++")
                .unwrap_or_else(|| self.make_token(TokenKind::Add, "+")),

            '>' => self
                .followed_by('=', TokenKind::Gte, ">=")
                .unwrap_or_else(|| self.make_token(TokenKind::Gt, ">")),

            '<' => self
                .followed_by('=', TokenKind::Lte, "<=")
                .unwrap_or_else(|| self.make_token(TokenKind::Lt, "<")),

            '&' => self
                .followed_by('&', TokenKind::And, "&&")
                .unwrap_or_else(|| self.make_token(TokenKind::BitAnd, "&")),

            '|' => self
                .followed_by('|', TokenKind::Or, "||")
                .unwrap_or_else(|| self.make_token(TokenKind::BitOr, "|")),

            '-' => match self.buffer.pop() {
                Some(b'>') => {
                    self.column += 1;
                    self.make_token(TokenKind::Arrow, "->")
                }
                Some(b'-') => {
                    self.column += 1;
                    self.make_token(TokenKind::Decrement, "--")
                }
                Some(other) => {
                    self.buffer.stack(other);
                    self.make_token(TokenKind::Sub, "-")
                }
                None => self.make_token(TokenKind::Sub, "-"),
            },

            '.' => return Some(self.lex_dot()),

            _ => return None,
        };

        Some(token)
    }

    /// `.` is tri-valent: field accessor after an identifier, `...` as a
    /// range (or a vararg marker when an identifier precedes it), otherwise
    /// an error.
    fn lex_dot(&mut self) -> Token {
        let after_ident = self
            .last_token
            .as_ref()
            .is_some_and(|t| t.kind == TokenKind::Ident);

        match self.buffer.pop() {
            Some(b) if after_ident && ((b as char).is_alphabetic() || b == b'_') => {
                self.buffer.stack(b);
                self.make_token(TokenKind::FieldAccessor, ".")
            }
            Some(b'.') => {
                self.column += 1;
                match self.buffer.pop() {
                    Some(b'.') => {
                        self.column += 1;
                        let kind = if after_ident {
                            TokenKind::Vararg
                        } else {
                            TokenKind::Range
                        };
                        self.make_token(kind, "...")
                    }
                    other => {
                        if let Some(b) = other {
                            self.buffer.stack(b);
                        }
                        self.make_token(TokenKind::Error, "ambiguous '.' symbol")
                    }
                }
            }
            other => {
                if let Some(b) = other {
                    self.buffer.stack(b);
                }
                self.make_token(TokenKind::Error, "ambiguous '.' symbol")
            }
        }
    }

    fn lex_identifiers(&mut self) -> Option<Token> {
        let ch = self.current?;
        if !ch.is_alphabetic() && ch != '_' {
            return None;
        }

        let mut lexeme = String::new();
        while let Some(ch) = self.current {
            if !ch.is_alphanumeric() && ch != '_' {
                break;
            }
            lexeme.push(ch);
            self.bump();
        }
        self.restore_current();

        let kind = if KEYWORDS.contains(&lexeme.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Ident
        };
        Some(self.make_token(kind, lexeme))
    }

    fn lex_numbers(&mut self) -> Option<Token> {
        let ch = self.current?;
        if !ch.is_ascii_digit() {
            return None;
        }

        let mut kind = TokenKind::Num;
        let mut dot_count = 0;
        let mut lexeme = String::new();
        while let Some(ch) = self.current {
            if ch.is_ascii_digit() {
                lexeme.push(ch);
            } else if ch == '.' && dot_count == 0 {
                kind = TokenKind::Float;
                dot_count += 1;
                lexeme.push(ch);
            } else {
                break;
            }
            self.bump();
        }

        // a trailing '.' means this was a number butting against the range
        // operator, not a float: restore the dot and downgrade
        if lexeme.ends_with('.') {
            kind = TokenKind::Num;
            lexeme.pop();
            self.restore_current();
            self.buffer.stack(b'.');
        } else {
            self.restore_current();
        }

        Some(self.make_token(kind, lexeme))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new("test.sage", source.as_bytes());
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token();
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex_all(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_multi_char_symbols() {
        assert_eq!(
            kinds(":: -> == >= <= && || ++ --"),
            vec![
                TokenKind::Binding,
                TokenKind::Arrow,
                TokenKind::Equality,
                TokenKind::Gte,
                TokenKind::Lte,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Increment,
                TokenKind::Decrement,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_single_char_fallbacks_keep_next_char() {
        // the peeked byte after a single-char operator must be restored
        let tokens = lex_all("a+b");
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["a", "+", "b", "eof"]);
    }

    #[test]
    fn test_range_between_numbers() {
        let tokens = lex_all("3...7");
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["3", "...", "7", "eof"]);
        assert_eq!(tokens[0].kind, TokenKind::Num);
        assert_eq!(tokens[1].kind, TokenKind::Range);
        assert_eq!(tokens[2].kind, TokenKind::Num);
    }

    #[test]
    fn test_float_literal() {
        let tokens = lex_all("3.25");
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[0].lexeme, "3.25");
    }

    #[test]
    fn test_vararg_after_identifier() {
        let tokens = lex_all("args ...");
        assert_eq!(tokens[1].kind, TokenKind::Vararg);
    }

    #[test]
    fn test_field_accessor_after_identifier() {
        let tokens = lex_all("settings.name");
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["settings", ".", "name", "eof"]);
        assert_eq!(tokens[1].kind, TokenKind::FieldAccessor);
    }

    #[test]
    fn test_keywords_versus_identifiers() {
        let tokens = lex_all("ret retval struct structure");
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[2].kind, TokenKind::Keyword);
        assert_eq!(tokens[3].kind, TokenKind::Ident);
    }

    #[test]
    fn test_string_literal_keeps_quotes() {
        let tokens = lex_all("puts(\"hi there\")");
        assert_eq!(tokens[2].kind, TokenKind::StringLit);
        assert_eq!(tokens[2].lexeme, "\"hi there\"");
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let tokens = lex_all("\"oops");
        assert_eq!(tokens[0].kind, TokenKind::Error);
    }

    #[test]
    fn test_unrecognized_byte_is_error_and_lexing_continues() {
        let tokens = lex_all("a $ b");
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[1].kind, TokenKind::Error);
        assert_eq!(tokens[2].kind, TokenKind::Ident);
    }

    #[test]
    fn test_newlines_are_tokens() {
        let tokens = lex_all("a\nb");
        assert_eq!(tokens[1].kind, TokenKind::Newline);
        assert_eq!(tokens[0].line, 0);
        assert_eq!(tokens[2].line, 1);
    }

    #[test]
    fn test_line_comments_are_skipped() {
        let tokens = lex_all("a // trailing note\nb");
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["a", "\n", "b", "eof"]);
    }

    #[test]
    fn test_unget_restores_one_token() {
        let mut lexer = Lexer::new("test.sage", b"a b");
        let first = lexer.next_token();
        assert_eq!(first.lexeme, "a");
        let second = lexer.next_token();
        assert_eq!(second.lexeme, "b");
        lexer.unget();
        assert_eq!(lexer.next_token().lexeme, "b");
    }

    // Lexer round-trip: concatenating the lexemes of every non-layout token
    // reproduces the source modulo whitespace and comments.
    #[test]
    fn test_lexer_round_trip() {
        let source = "main :: ( ) -> int { ret 1 + 2 * x }";
        let joined: Vec<String> = lex_all(source)
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Eof))
            .map(|t| t.lexeme)
            .collect();
        let original: Vec<&str> = source.split_whitespace().collect();
        assert_eq!(joined.join(" "), original.join(" "));
    }
}
