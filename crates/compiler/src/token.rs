//! Token model
//!
//! Every lexeme gets its own `TokenKind`; the Pratt parser asks for an
//! operator's precedence class through `precedence()` rather than comparing
//! kinds directly, so `+` and `-` stay distinct kinds that happen to share a
//! class.

use std::fmt;

/// Highest operator precedence class. Classes run 0 (binds loosest) through
/// this value (binds tightest).
pub const MAX_PRECEDENCE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Operators (see `precedence`)
    Equality,
    Lt,
    Gt,
    Lte,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
    Exp,

    // Literals and names
    Num,
    Float,
    Ident,
    Keyword,
    StringLit,

    // Punctuation
    Assign,
    Lparen,
    Rparen,
    Lbrace,
    Rbrace,
    Lbracket,
    Rbracket,
    Comma,
    Colon,
    Arrow,
    Binding,
    Range,
    Vararg,
    FieldAccessor,
    Pound,
    BitAnd,
    BitOr,
    And,
    Or,
    Increment,
    Decrement,

    // Layout and sentinels
    Newline,
    Eof,
    Error,
    CompilerCreated,
}

impl TokenKind {
    /// Precedence class for operator kinds, `None` for everything else.
    ///
    /// `==` binds loosest; `^` binds tightest and is the only
    /// right-associative operator.
    pub fn precedence(self) -> Option<u8> {
        match self {
            TokenKind::Equality => Some(0),
            TokenKind::Lt | TokenKind::Gt => Some(1),
            TokenKind::Lte | TokenKind::Gte => Some(2),
            TokenKind::Add | TokenKind::Sub => Some(3),
            TokenKind::Mul | TokenKind::Div => Some(4),
            TokenKind::Exp => Some(5),
            _ => None,
        }
    }

    pub fn is_operator(self) -> bool {
        self.precedence().is_some()
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Equality => "EQUALITY",
            TokenKind::Lt => "LT",
            TokenKind::Gt => "GT",
            TokenKind::Lte => "LTE",
            TokenKind::Gte => "GTE",
            TokenKind::Add => "ADD",
            TokenKind::Sub => "SUB",
            TokenKind::Mul => "MUL",
            TokenKind::Div => "DIV",
            TokenKind::Exp => "EXP",
            TokenKind::Num => "NUM",
            TokenKind::Float => "FLOAT",
            TokenKind::Ident => "IDENT",
            TokenKind::Keyword => "KEYWORD",
            TokenKind::StringLit => "STRING",
            TokenKind::Assign => "ASSIGN",
            TokenKind::Lparen => "LPAREN",
            TokenKind::Rparen => "RPAREN",
            TokenKind::Lbrace => "LBRACE",
            TokenKind::Rbrace => "RBRACE",
            TokenKind::Lbracket => "LBRACKET",
            TokenKind::Rbracket => "RBRACKET",
            TokenKind::Comma => "COMMA",
            TokenKind::Colon => "COLON",
            TokenKind::Arrow => "ARROW",
            TokenKind::Binding => "BINDING",
            TokenKind::Range => "RANGE",
            TokenKind::Vararg => "VARARG",
            TokenKind::FieldAccessor => "FIELD_ACCESSOR",
            TokenKind::Pound => "POUND",
            TokenKind::BitAnd => "BIT_AND",
            TokenKind::BitOr => "BIT_OR",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Increment => "INCREMENT",
            TokenKind::Decrement => "DECREMENT",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Eof => "EOF",
            TokenKind::Error => "ERROR",
            TokenKind::CompilerCreated => "COMPILER_CREATED",
        };
        write!(f, "{}", name)
    }
}

/// A token with its lexeme and source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    /// Line number, 0-indexed
    pub line: usize,
    /// Column number, 0-indexed
    pub column: usize,
    pub filename: String,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
            filename: String::new(),
        }
    }

    /// A token fabricated by the parser rather than read from source.
    pub fn synthetic(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
        Token::new(kind, lexeme, line, 0)
    }

    pub fn error(message: impl Into<String>, line: usize) -> Self {
        Token::new(TokenKind::Error, message, line, 0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token{{{}, {:?}, {}:{}}}",
            self.kind,
            self.lexeme,
            self.line + 1,
            self.column + 1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_classes() {
        assert_eq!(TokenKind::Equality.precedence(), Some(0));
        assert_eq!(TokenKind::Lt.precedence(), Some(1));
        assert_eq!(TokenKind::Gt.precedence(), Some(1));
        assert_eq!(TokenKind::Lte.precedence(), Some(2));
        assert_eq!(TokenKind::Gte.precedence(), Some(2));
        assert_eq!(TokenKind::Add.precedence(), Some(3));
        assert_eq!(TokenKind::Sub.precedence(), Some(3));
        assert_eq!(TokenKind::Mul.precedence(), Some(4));
        assert_eq!(TokenKind::Div.precedence(), Some(4));
        assert_eq!(TokenKind::Exp.precedence(), Some(MAX_PRECEDENCE));
    }

    #[test]
    fn test_non_operators_have_no_precedence() {
        assert_eq!(TokenKind::Ident.precedence(), None);
        assert_eq!(TokenKind::Assign.precedence(), None);
        assert_eq!(TokenKind::Range.precedence(), None);
        assert!(!TokenKind::Newline.is_operator());
    }

    #[test]
    fn test_distinct_kinds_share_a_class() {
        // Add and Sub are different kinds but the same class; the old
        // shared-integer encoding made them compare equal.
        assert_ne!(TokenKind::Add, TokenKind::Sub);
        assert_eq!(
            TokenKind::Add.precedence(),
            TokenKind::Sub.precedence()
        );
    }
}
