//! Recursive-descent parser for Sage
//!
//! Statements are discriminated with one token of look-ahead; expressions
//! use Pratt-style precedence climbing. Errors are collected rather than
//! thrown: each unexpected token appends an error and the offending
//! production returns `None`. After the full parse, a non-empty error list
//! suppresses the tree.

use crate::ast::{NodeKind, ParseNode, Structure, TypeShape};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

pub struct Parser {
    lexer: Lexer,
    current: Token,
    /// One-slot stash for a path that parsed as an l-value but turned out to
    /// be the first primary of an expression.
    node_cache: Option<ParseNode>,
    errors: Vec<Token>,
}

impl Parser {
    pub fn new(filename: impl Into<String>, source: &[u8]) -> Self {
        let mut lexer = Lexer::new(filename, source);
        let current = lexer.next_token();
        Parser {
            lexer,
            current,
            node_cache: None,
            errors: Vec::new(),
        }
    }

    /// Parse a whole source file into a `Program` block node.
    pub fn parse(&mut self) -> Result<ParseNode, String> {
        let mut children = self.parse_libraries();
        let mut statements = self.parse_statements();
        children.append(&mut statements);

        if !self.errors.is_empty() {
            let summary: Vec<String> = self.errors.iter().map(|e| e.lexeme.clone()).collect();
            return Err(summary.join("\n"));
        }

        let root_token = Token::synthetic(TokenKind::CompilerCreated, "", 0);
        Ok(ParseNode::block(root_token, NodeKind::Program, children))
    }

    pub fn errors(&self) -> &[Token] {
        &self.errors
    }

    fn parse_libraries(&mut self) -> Vec<ParseNode> {
        let mut includes = Vec::new();
        while self.errors.is_empty() {
            self.skip_newlines();
            if self.current.kind != TokenKind::Keyword || self.current.lexeme != "include" {
                break;
            }
            if let Some(node) = self.library_statement() {
                includes.push(node);
            }
        }
        includes
    }

    fn library_statement(&mut self) -> Option<ParseNode> {
        self.consume(
            TokenKind::Keyword,
            "expected include keyword in include statement",
        );

        if self.current.kind != TokenKind::StringLit {
            self.raise_error("expected string literal in include statement");
            return None;
        }
        let string_token = self.current.clone();
        let node = ParseNode::unary(string_token, NodeKind::Include);
        self.advance();

        if self.current.kind != TokenKind::Eof {
            self.consume(
                TokenKind::Newline,
                "include statements must sit on their own lines",
            );
        }
        Some(node)
    }

    fn parse_statements(&mut self) -> Vec<ParseNode> {
        let mut statements = Vec::new();
        while self.errors.is_empty() {
            self.skip_newlines();
            if self.current.kind == TokenKind::Eof {
                break;
            }
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
        }
        statements
    }

    fn parse_statement(&mut self) -> Option<ParseNode> {
        match self.current.kind {
            TokenKind::Ident => {
                let next = self.peek();
                if next.kind == TokenKind::Binding {
                    return self.parse_construct();
                }
                if matches!(
                    next.kind,
                    TokenKind::Keyword | TokenKind::Lbracket | TokenKind::Ident
                ) {
                    return self.parse_value_dec();
                }
                if matches!(next.kind, TokenKind::Assign | TokenKind::FieldAccessor) {
                    match self.parse_assign() {
                        Some(node) => return Some(node),
                        // a cached node means this was really an expression
                        None if self.node_cache.is_some() => return self.expression(),
                        None => return None,
                    }
                }
                if next.kind == TokenKind::Lparen {
                    return self.parse_function_call();
                }
                self.expression()
            }
            TokenKind::Keyword => self.parse_keyword_statement(),
            TokenKind::Pound => self.parse_compile_time_execute(),
            _ => self.expression(),
        }
    }

    fn parse_compile_time_execute(&mut self) -> Option<ParseNode> {
        self.consume(
            TokenKind::Pound,
            "expected 'run' statement to begin with '#' symbol",
        );

        if self.current.kind != TokenKind::Ident || self.current.lexeme != "run" {
            self.raise_error("expected 'run' keyword in compile time execution statement");
            return None;
        }
        self.advance();

        let run_token =
            Token::synthetic(TokenKind::CompilerCreated, "#run { ... }", self.current.line);
        let body = self.parse_body()?;
        Some(ParseNode::unary_branch(
            run_token,
            NodeKind::CompileTimeExecute,
            body,
        ))
    }

    fn parse_value_dec(&mut self) -> Option<ParseNode> {
        let name_token = self.current.clone();
        let name_node = ParseNode::unary(name_token.clone(), NodeKind::Identifier);
        self.advance();

        if !matches!(
            self.current.kind,
            TokenKind::Keyword | TokenKind::Lbracket | TokenKind::Ident | TokenKind::Vararg
        ) {
            self.raise_error("expected type to be associated with identifier in value declaration");
            return None;
        }

        let type_node = self.parse_type()?;
        let type_lexeme = type_node.token().lexeme.clone();

        if self.current.kind == TokenKind::Assign {
            self.advance();
            let rhs = self.expression()?;

            let lexeme = format!(
                "{} {} = {}",
                name_token.lexeme,
                type_lexeme,
                rhs.token().lexeme
            );
            let dec_token = Token::synthetic(TokenKind::Assign, lexeme, name_token.line);
            return Some(ParseNode::trinary(
                dec_token,
                NodeKind::Assign,
                name_node,
                type_node,
                rhs,
            ));
        }

        let kind = if type_node.kind() == NodeKind::Vararg {
            NodeKind::Vararg
        } else {
            NodeKind::VarDec
        };
        let lexeme = format!("{} {}", name_token.lexeme, type_lexeme);
        let dec_token = Token::synthetic(TokenKind::CompilerCreated, lexeme, name_token.line);
        Some(ParseNode::binary(dec_token, kind, name_node, type_node))
    }

    /// A comma-separated run of value declarations: parameter lists and
    /// struct bodies.
    fn parse_value_dec_list(&mut self) -> Option<ParseNode> {
        if self.current.kind == TokenKind::Rparen {
            let token = Token::synthetic(
                TokenKind::CompilerCreated,
                "empty parameter list",
                self.current.line,
            );
            return Some(ParseNode::block(token, NodeKind::ParamList, Vec::new()));
        }

        self.skip_newlines();

        if self.current.kind != TokenKind::Ident {
            self.raise_error("expected value declaration to begin with identifier");
            return None;
        }

        let list_line = self.current.line;
        let mut lexemes = Vec::new();
        let mut children = Vec::new();
        while self.current.kind == TokenKind::Ident {
            let value_dec = self.parse_value_dec()?;
            if value_dec.structure() == Structure::Trinary {
                self.raise_error("cannot initialize value in value declaration list");
                return None;
            }
            lexemes.push(value_dec.token().lexeme.clone());

            self.skip_newlines();
            if matches!(self.current.kind, TokenKind::Rbrace | TokenKind::Rparen) {
                children.push(value_dec);
                break;
            }

            self.consume(
                TokenKind::Comma,
                "expected comma after entry in value declaration list",
            );
            children.push(value_dec);
            self.skip_newlines();
        }

        let token = Token::synthetic(TokenKind::CompilerCreated, lexemes.join(", "), list_line);
        Some(ParseNode::block(token, NodeKind::ParamList, children))
    }

    /// Parse `name = expr` or `path.to.field = expr`. Returns `None` with
    /// the path stashed in the node cache when the dotted path turned out to
    /// be an r-value.
    fn parse_assign(&mut self) -> Option<ParseNode> {
        let mut name_lexeme = self.current.lexeme.clone();
        let name_line = self.current.line;

        let is_field_access = self.peek().kind == TokenKind::FieldAccessor;
        let name_node = if is_field_access {
            let path = self.parse_struct_field_access()?;
            if let ParseNode::List(list) = &path {
                name_lexeme = list.full_lexeme();
            }
            path
        } else {
            let node = ParseNode::unary(self.current.clone(), NodeKind::Identifier);
            self.advance();
            node
        };

        // the field path may be referenced inside an expression instead of
        // assigned to; hand the parsed node back for expression parsing
        if is_field_access && self.current.kind != TokenKind::Assign {
            self.putback_node(name_node);
            return None;
        }

        self.consume(TokenKind::Assign, "expected '=' symbol in assign statement");

        let value = self.expression()?;
        let lexeme = format!("{} = {}", name_lexeme, value.token().lexeme);
        let token = Token::synthetic(TokenKind::Assign, lexeme, name_line);
        Some(ParseNode::binary(token, NodeKind::Assign, name_node, value))
    }

    fn parse_keyword_statement(&mut self) -> Option<ParseNode> {
        match self.current.lexeme.as_str() {
            "ret" => {
                let return_token = self.current.clone();
                let next = self.peek();
                if matches!(
                    next.kind,
                    TokenKind::Newline | TokenKind::Rbrace | TokenKind::Eof
                ) {
                    self.advance();
                    return Some(ParseNode::unary(return_token, NodeKind::Keyword));
                }

                self.advance();
                let expression = self.expression()?;
                let token = Token::synthetic(
                    TokenKind::Keyword,
                    format!("ret {}", expression.token().lexeme),
                    return_token.line,
                );
                Some(ParseNode::unary_branch(token, NodeKind::Keyword, expression))
            }
            "if" => self.parse_if_statement(),
            "while" => self.parse_while_statement(),
            "for" => self.parse_for_statement(),
            _ => {
                self.raise_error("could not recognize statement");
                None
            }
        }
    }

    fn parse_if_statement(&mut self) -> Option<ParseNode> {
        self.advance();

        let condition = self.expression()?;
        let condition_token = condition.token().clone();
        let body = self.parse_body()?;
        let branch_token = Token::synthetic(
            TokenKind::CompilerCreated,
            "if ... { ... }",
            condition_token.line,
        );
        let mut branches = vec![ParseNode::binary(
            branch_token,
            NodeKind::IfBranch,
            condition,
            body,
        )];

        while self.current.lexeme == "else" {
            self.advance();

            if self.current.lexeme != "if" && self.current.kind != TokenKind::Lbrace {
                self.raise_error("expected body or if statement after else keyword");
                return None;
            }

            if self.current.lexeme == "if" {
                self.advance();
                let condition = self.expression()?;
                let line = condition.token().line;
                let body = self.parse_body()?;
                let token =
                    Token::synthetic(TokenKind::CompilerCreated, "else if ... { ... }", line);
                branches.push(ParseNode::binary(token, NodeKind::IfBranch, condition, body));
            } else {
                let body = self.parse_body()?;
                let token = Token::synthetic(
                    TokenKind::CompilerCreated,
                    "else { ... }",
                    body.token().line,
                );
                branches.push(ParseNode::unary_branch(token, NodeKind::ElseBranch, body));
                break;
            }
        }

        Some(ParseNode::block(condition_token, NodeKind::If, branches))
    }

    fn parse_while_statement(&mut self) -> Option<ParseNode> {
        self.consume(
            TokenKind::Keyword,
            "expected 'while' keyword in while statement",
        );

        let condition = self.expression()?;
        let body = self.parse_body()?;

        let token = Token::synthetic(
            TokenKind::CompilerCreated,
            "while <condition> { ... }",
            condition.token().line,
        );
        Some(ParseNode::binary(token, NodeKind::While, condition, body))
    }

    fn parse_for_statement(&mut self) -> Option<ParseNode> {
        self.consume(
            TokenKind::Keyword,
            "expected 'for' keyword in for statement",
        );

        if self.current.kind != TokenKind::Ident {
            self.raise_error("for statement expects iterator name");
            return None;
        }
        let iterator_token = self.current.clone();
        let iterator = ParseNode::unary(iterator_token.clone(), NodeKind::VarDec);
        self.advance();

        if self.current.lexeme != "in" {
            self.raise_error("expected 'in' keyword in for statement");
            return None;
        }
        self.advance();

        let range = self.parse_range()?;
        let body = self.parse_body()?;

        let token = Token::synthetic(
            TokenKind::CompilerCreated,
            format!(
                "for {} in {} {{ ... }}",
                iterator_token.lexeme,
                range.token().lexeme
            ),
            iterator_token.line,
        );
        Some(ParseNode::trinary(
            token,
            NodeKind::For,
            iterator,
            range,
            body,
        ))
    }

    fn parse_range(&mut self) -> Option<ParseNode> {
        let lhs = self.expression()?;
        self.consume(
            TokenKind::Range,
            "expected '...' operator in range statement",
        );
        let rhs = self.expression()?;

        let token = Token::synthetic(
            TokenKind::CompilerCreated,
            format!("{}...{}", lhs.token().lexeme, rhs.token().lexeme),
            lhs.token().line,
        );
        Some(ParseNode::binary(token, NodeKind::Range, lhs, rhs))
    }

    /// Parse `name :: rhs` where rhs is a struct, function, or type.
    fn parse_construct(&mut self) -> Option<ParseNode> {
        if self.current.kind != TokenKind::Ident {
            self.raise_error("expected identifier at the beginning of binding statement");
            return None;
        }

        let name_token = self.current.clone();
        let name_node = ParseNode::unary(name_token.clone(), NodeKind::Identifier);
        self.advance();

        self.consume(
            TokenKind::Binding,
            "expected '::' symbol in binding statement",
        );

        let (binding_node, kind) = match self.current.kind {
            TokenKind::Keyword => (self.parse_struct()?, NodeKind::Struct),
            TokenKind::Lparen => {
                let function = self.parse_function()?;
                let kind = function.kind();
                (function, kind)
            }
            _ => (self.parse_type()?, NodeKind::Type),
        };

        let lexeme = format!("{} :: {}", name_token.lexeme, binding_node.token().lexeme);
        let token = Token::synthetic(TokenKind::CompilerCreated, lexeme, name_token.line);
        Some(ParseNode::binary(token, kind, name_node, binding_node))
    }

    fn parse_struct(&mut self) -> Option<ParseNode> {
        if self.current.lexeme != "struct" {
            self.raise_error("expected 'struct' keyword in structure definition");
            return None;
        }
        self.advance();

        self.consume(TokenKind::Lbrace, "expected '{' in structure definition");
        let contents = self.parse_value_dec_list()?;
        self.consume(TokenKind::Rbrace, "expected '}' in structure definition");

        let token = contents.token().clone();
        Some(ParseNode::unary_branch(token, NodeKind::Struct, contents))
    }

    fn parse_function(&mut self) -> Option<ParseNode> {
        self.consume(TokenKind::Lparen, "expected '(' in function definition");

        let parameter_list = self.parse_value_dec_list()?;
        let mut signature = format!("({}", parameter_list.token().lexeme);

        self.consume(TokenKind::Rparen, "expected ')' in function definition");
        self.consume(
            TokenKind::Arrow,
            "expected '->' symbol in function definition",
        );
        signature.push_str(") -> ");

        if !matches!(self.current.kind, TokenKind::Keyword | TokenKind::Ident) {
            self.raise_error("function must have a return type");
            return None;
        }
        let return_type = self.parse_type()?;
        signature.push_str(&return_type.token().lexeme);

        let signature_token = Token::synthetic(
            TokenKind::CompilerCreated,
            signature,
            parameter_list.token().line,
        );

        // a newline instead of a brace means this is a forward declaration
        if matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof) {
            if self.current.kind == TokenKind::Newline {
                self.advance();
            }
            return Some(ParseNode::binary(
                signature_token,
                NodeKind::FuncDec,
                parameter_list,
                return_type,
            ));
        }

        let body = self.parse_body()?;
        Some(ParseNode::trinary(
            signature_token,
            NodeKind::FuncDef,
            parameter_list,
            return_type,
            body,
        ))
    }

    fn parse_function_call(&mut self) -> Option<ParseNode> {
        let name_token = self.current.clone();
        self.advance();

        self.consume(TokenKind::Lparen, "expected '(' to open function call");

        let mut arguments = Vec::new();
        if self.current.kind != TokenKind::Rparen {
            loop {
                let argument = self.parse_primary()?;
                arguments.push(argument);

                if self.current.kind != TokenKind::Comma {
                    break;
                }
                self.advance();
            }
        }

        self.consume(TokenKind::Rparen, "expected ')' to close function call");

        let arguments_token = Token::synthetic(TokenKind::CompilerCreated, "", name_token.line);
        let arguments_node = ParseNode::block(arguments_token, NodeKind::Block, arguments);
        Some(ParseNode::unary_branch(
            name_token,
            NodeKind::FuncCall,
            arguments_node,
        ))
    }

    fn parse_body(&mut self) -> Option<ParseNode> {
        self.consume(TokenKind::Lbrace, "expected '{' in body definition");

        let body_token = Token::synthetic(TokenKind::CompilerCreated, "{ ... }", self.current.line);
        let mut children = Vec::new();
        loop {
            self.skip_newlines();
            if self.current.kind == TokenKind::Rbrace || !self.errors.is_empty() {
                break;
            }
            if self.current.kind == TokenKind::Eof {
                self.raise_error("unexpected end of file inside body");
                return None;
            }
            if let Some(statement) = self.parse_statement() {
                children.push(statement);
            }
        }

        self.consume(TokenKind::Rbrace, "expected '}' in body definition");
        Some(ParseNode::block(body_token, NodeKind::Block, children))
    }

    /// Parse any of the type shapes: named primitives and structs, array
    /// types, function types, pointer suffixes, and vararg markers.
    fn parse_type(&mut self) -> Option<ParseNode> {
        let mut node = match self.current.kind {
            TokenKind::Lparen => {
                let function_type = self.parse_function()?;
                let token = function_type.token().clone();
                let mut node = ParseNode::unary_branch(token, NodeKind::Type, function_type);
                if let ParseNode::Unary(u) = &mut node {
                    u.shape = Some(TypeShape::Function);
                }
                // pointers to function types are not allowed
                return Some(node);
            }

            TokenKind::Lbracket => {
                self.advance();

                if !matches!(self.current.kind, TokenKind::Keyword | TokenKind::Ident) {
                    self.raise_error("expected valid type identifier in array type");
                    return None;
                }
                let element_token = self.current.clone();
                let element = ParseNode::unary(element_token.clone(), NodeKind::Type);
                self.advance();

                let mut length = None;
                if self.current.kind == TokenKind::Colon {
                    self.advance();
                    if self.current.kind != TokenKind::Num {
                        self.raise_error("expected a number as the array length in array type");
                        return None;
                    }
                    length = self.current.lexeme.parse::<usize>().ok();
                    self.advance();
                }

                self.consume(TokenKind::Rbracket, "expected ']' to close array type");

                let token = Token::synthetic(
                    element_token.kind,
                    format!("[{}]", element_token.lexeme),
                    element_token.line,
                );
                let mut node = ParseNode::unary_branch(token, NodeKind::Type, element);
                if let ParseNode::Unary(u) = &mut node {
                    u.shape = Some(TypeShape::ArrayOf);
                    u.array_length = length;
                }
                node
            }

            TokenKind::Vararg => {
                let vararg_token = self.current.clone();
                self.advance();
                let type_token =
                    if matches!(self.current.kind, TokenKind::Keyword | TokenKind::Ident) {
                        let token = self.current.clone();
                        self.advance();
                        token
                    } else {
                        vararg_token
                    };
                let mut node = ParseNode::unary(type_token, NodeKind::Vararg);
                if let ParseNode::Unary(u) = &mut node {
                    u.shape = Some(TypeShape::Named);
                }
                node
            }

            _ => {
                let token = self.current.clone();
                self.advance();
                let mut node = ParseNode::unary(token, NodeKind::Type);
                if let ParseNode::Unary(u) = &mut node {
                    u.shape = Some(TypeShape::Named);
                }
                node
            }
        };

        while self.current.lexeme == "*" {
            self.advance();
            let inner_token = node.token().clone();
            let token = Token::synthetic(
                inner_token.kind,
                format!("{}*", inner_token.lexeme),
                inner_token.line,
            );
            let mut pointer = ParseNode::unary_branch(token, NodeKind::Type, node);
            if let ParseNode::Unary(u) = &mut pointer {
                u.shape = Some(TypeShape::PointerTo);
            }
            node = pointer;
        }

        Some(node)
    }

    pub fn expression(&mut self) -> Option<ParseNode> {
        // a stashed node means a previous statement parse already consumed
        // the first primary; pick it up instead of parsing a fresh one
        if let Some(first_primary) = self.take_cached_node() {
            return self.parse_operator(first_primary, 0);
        }
        let primary = self.parse_primary()?;
        self.parse_operator(primary, 0)
    }

    /// Pratt climb: extend `left` while the next operator's class is at
    /// least `min_class`.
    fn parse_operator(&mut self, left: ParseNode, min_class: u8) -> Option<ParseNode> {
        let mut left = left;
        while let Some(class) = self.current.kind.precedence() {
            if class < min_class {
                break;
            }
            let op = self.current.clone();
            let op_class = class;
            self.advance();

            let mut right = self.parse_primary()?;
            while let Some(next_class) = self.current.kind.precedence() {
                let climbs = next_class > op_class
                    || (is_right_associative(self.current.kind) && next_class == op_class);
                if !climbs {
                    break;
                }
                let inc = if next_class > op_class { 1 } else { 0 };
                right = self.parse_operator(right, op_class + inc)?;
            }

            left = ParseNode::binary(op, NodeKind::Binary, left, right);
        }
        Some(left)
    }

    fn parse_primary(&mut self) -> Option<ParseNode> {
        match self.current.kind {
            TokenKind::Num => {
                let token = self.current.clone();
                self.advance();
                Some(ParseNode::unary(token, NodeKind::Number))
            }
            TokenKind::Float => {
                let token = self.current.clone();
                self.advance();
                Some(ParseNode::unary(token, NodeKind::Float))
            }
            TokenKind::StringLit => {
                let token = self.current.clone();
                self.advance();
                Some(ParseNode::unary(token, NodeKind::StringLit))
            }
            TokenKind::Ident => {
                let next = self.peek();
                if next.kind == TokenKind::FieldAccessor {
                    return self.parse_struct_field_access();
                }
                if next.kind == TokenKind::Lparen {
                    return self.parse_function_call();
                }
                let token = self.current.clone();
                self.advance();
                Some(ParseNode::unary(token, NodeKind::VarRef))
            }
            TokenKind::Lparen => {
                self.consume(TokenKind::Lparen, "expected opening '('");
                let expression = self.expression()?;
                self.consume(TokenKind::Rparen, "expected closing ')'");
                Some(expression)
            }
            _ => {
                self.raise_error("unrecognized statement; could not find valid primary");
                None
            }
        }
    }

    fn parse_struct_field_access(&mut self) -> Option<ParseNode> {
        let first_token = self.current.clone();
        let mut lexemes = vec![self.current.lexeme.clone()];
        self.advance();

        while self.current.kind == TokenKind::FieldAccessor {
            self.advance();
            if self.current.kind != TokenKind::Ident {
                self.raise_error("expected identifier in struct field accessor");
                return None;
            }
            lexemes.push(self.current.lexeme.clone());
            self.advance();
        }

        let token = Token::synthetic(
            TokenKind::CompilerCreated,
            first_token.lexeme,
            first_token.line,
        );
        Some(ParseNode::list(token, lexemes))
    }

    //// parser utilities ////

    fn raise_error(&mut self, message: &str) {
        let error = Token::error(
            format!(
                "{}:{}: {}",
                self.lexer.filename(),
                self.current.line + 1,
                message
            ),
            self.current.line,
        );
        self.errors.push(error);
    }

    /// Advance past the current token if it matches, recording an error
    /// otherwise. Returns the token as consumed.
    fn consume(&mut self, kind: TokenKind, message: &str) -> Token {
        if self.current.kind == kind {
            let consumed = self.current.clone();
            self.advance();
            return consumed;
        }
        self.raise_error(message);
        self.current.clone()
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    fn peek(&mut self) -> Token {
        let token = self.lexer.next_token();
        self.lexer.unget();
        token
    }

    fn skip_newlines(&mut self) {
        while self.current.kind == TokenKind::Newline {
            self.advance();
        }
    }

    /// Stash an already-parsed node for the next `expression` call,
    /// symmetrical with the lexer's `unget`.
    fn putback_node(&mut self, node: ParseNode) {
        self.node_cache = Some(node);
    }

    fn take_cached_node(&mut self) -> Option<ParseNode> {
        self.node_cache.take()
    }
}

fn is_right_associative(kind: TokenKind) -> bool {
    kind == TokenKind::Exp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryNode, TrinaryNode};

    fn parse_source(source: &str) -> ParseNode {
        let mut parser = Parser::new("test.sage", source.as_bytes());
        parser.parse().unwrap()
    }

    fn parse_expression(source: &str) -> ParseNode {
        let root = parse_source(source);
        let ParseNode::Block(block) = root else {
            panic!("expected program block");
        };
        block.children.into_iter().next().unwrap()
    }

    fn as_binary(node: &ParseNode) -> &BinaryNode {
        match node {
            ParseNode::Binary(b) => b,
            other => panic!("expected binary node, got {}", other),
        }
    }

    #[test]
    fn test_pratt_higher_class_binds_tighter() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = parse_expression("1 + 2 * 3");
        let add = as_binary(&expr);
        assert_eq!(add.token.lexeme, "+");
        let mul = as_binary(&add.right);
        assert_eq!(mul.token.lexeme, "*");
        assert_eq!(mul.left.token().lexeme, "2");
        assert_eq!(mul.right.token().lexeme, "3");
    }

    #[test]
    fn test_pratt_left_associativity() {
        // 1 - 2 - 3 parses as (1 - 2) - 3
        let expr = parse_expression("1 - 2 - 3");
        let outer = as_binary(&expr);
        assert_eq!(outer.token.lexeme, "-");
        assert_eq!(outer.right.token().lexeme, "3");
        let inner = as_binary(&outer.left);
        assert_eq!(inner.left.token().lexeme, "1");
        assert_eq!(inner.right.token().lexeme, "2");
    }

    #[test]
    fn test_pratt_exponent_is_right_associative() {
        // 2 ^ 3 ^ 4 parses as 2 ^ (3 ^ 4)
        let expr = parse_expression("2 ^ 3 ^ 4");
        let outer = as_binary(&expr);
        assert_eq!(outer.token.lexeme, "^");
        assert_eq!(outer.left.token().lexeme, "2");
        let inner = as_binary(&outer.right);
        assert_eq!(inner.left.token().lexeme, "3");
        assert_eq!(inner.right.token().lexeme, "4");
    }

    #[test]
    fn test_pratt_equality_binds_loosest() {
        // a + 1 == b * 2 parses as (a + 1) == (b * 2)
        let expr = parse_expression("a + 1 == b * 2");
        let eq = as_binary(&expr);
        assert_eq!(eq.token.lexeme, "==");
        assert_eq!(as_binary(&eq.left).token.lexeme, "+");
        assert_eq!(as_binary(&eq.right).token.lexeme, "*");
    }

    #[test]
    fn test_parenthesised_expression() {
        let expr = parse_expression("(1 + 2) * 3");
        let mul = as_binary(&expr);
        assert_eq!(mul.token.lexeme, "*");
        assert_eq!(as_binary(&mul.left).token.lexeme, "+");
    }

    #[test]
    fn test_function_definition_construct() {
        let root = parse_source("main :: () -> int { ret 0 }");
        let ParseNode::Block(block) = &root else {
            panic!("expected program block")
        };
        let construct = as_binary(&block.children[0]);
        assert_eq!(construct.kind, NodeKind::FuncDef);
        assert_eq!(construct.left.token().lexeme, "main");
        match construct.right.as_ref() {
            ParseNode::Trinary(TrinaryNode { kind, .. }) => {
                assert_eq!(*kind, NodeKind::FuncDef)
            }
            other => panic!("expected trinary function node, got {}", other),
        }
    }

    #[test]
    fn test_function_declaration_without_body() {
        let root = parse_source("puts :: (s char*) -> i32\n");
        let ParseNode::Block(block) = &root else {
            panic!("expected program block")
        };
        let construct = as_binary(&block.children[0]);
        assert_eq!(construct.kind, NodeKind::FuncDec);
    }

    #[test]
    fn test_value_declaration_with_initialiser_is_trinary() {
        let node = parse_expression("x i32 = 3 + 4");
        match &node {
            ParseNode::Trinary(t) => {
                assert_eq!(t.kind, NodeKind::Assign);
                assert_eq!(t.left.token().lexeme, "x");
                assert_eq!(t.middle.token().lexeme, "i32");
                assert_eq!(as_binary(&t.right).token.lexeme, "+");
            }
            other => panic!("expected trinary assign, got {}", other),
        }
    }

    #[test]
    fn test_value_declaration_without_initialiser() {
        let node = parse_expression("x i32");
        match &node {
            ParseNode::Binary(b) => {
                assert_eq!(b.kind, NodeKind::VarDec);
                assert_eq!(b.right.kind(), NodeKind::Type);
            }
            other => panic!("expected binary var dec, got {}", other),
        }
    }

    #[test]
    fn test_assignment_statement() {
        let node = parse_expression("x = 5");
        let assign = as_binary(&node);
        assert_eq!(assign.kind, NodeKind::Assign);
        assert_eq!(assign.left.token().lexeme, "x");
        assert_eq!(assign.right.token().lexeme, "5");
    }

    #[test]
    fn test_field_assignment_uses_list_path() {
        let node = parse_expression("point.x = 5");
        let assign = as_binary(&node);
        assert_eq!(assign.kind, NodeKind::Assign);
        match assign.left.as_ref() {
            ParseNode::List(list) => assert_eq!(list.lexemes, vec!["point", "x"]),
            other => panic!("expected list path, got {}", other),
        }
    }

    #[test]
    fn test_field_reference_falls_back_to_expression() {
        // looks like an assignment until the '+': the parsed path must be
        // recycled as the first primary of the expression
        let node = parse_expression("point.x + 1");
        let add = as_binary(&node);
        assert_eq!(add.token.lexeme, "+");
        match add.left.as_ref() {
            ParseNode::List(list) => assert_eq!(list.lexemes, vec!["point", "x"]),
            other => panic!("expected cached list path, got {}", other),
        }
    }

    #[test]
    fn test_if_else_chain() {
        let node =
            parse_expression("if a == 1 { ret 1 } else if a == 2 { ret 2 } else { ret 3 }");
        let ParseNode::Block(block) = &node else {
            panic!("expected if block")
        };
        assert_eq!(block.kind, NodeKind::If);
        assert_eq!(block.children.len(), 3);
        assert_eq!(block.children[0].kind(), NodeKind::IfBranch);
        assert_eq!(block.children[1].kind(), NodeKind::IfBranch);
        assert_eq!(block.children[2].kind(), NodeKind::ElseBranch);
    }

    #[test]
    fn test_while_statement() {
        let node = parse_expression("while x < 10 { x = x + 1 }");
        let while_node = as_binary(&node);
        assert_eq!(while_node.kind, NodeKind::While);
        assert_eq!(as_binary(&while_node.left).token.lexeme, "<");
    }

    #[test]
    fn test_for_statement_with_range() {
        let node = parse_expression("for i in 0 ... 10 { x = x + i }");
        match &node {
            ParseNode::Trinary(t) => {
                assert_eq!(t.kind, NodeKind::For);
                assert_eq!(t.left.token().lexeme, "i");
                assert_eq!(t.middle.kind(), NodeKind::Range);
            }
            other => panic!("expected trinary for, got {}", other),
        }
    }

    #[test]
    fn test_struct_definition() {
        let node = parse_expression("Point :: struct { x i32, y i32 }");
        let construct = as_binary(&node);
        assert_eq!(construct.kind, NodeKind::Struct);
        assert_eq!(construct.left.token().lexeme, "Point");
        match construct.right.as_ref() {
            ParseNode::Unary(u) => {
                assert_eq!(u.kind, NodeKind::Struct);
                let contents = u.operand.as_deref().unwrap();
                let ParseNode::Block(fields) = contents else {
                    panic!("expected field list")
                };
                assert_eq!(fields.children.len(), 2);
            }
            other => panic!("expected unary struct node, got {}", other),
        }
    }

    #[test]
    fn test_struct_fields_on_separate_lines() {
        let node = parse_expression("Point :: struct {\n\tx i32,\n\ty i32\n}");
        let construct = as_binary(&node);
        assert_eq!(construct.kind, NodeKind::Struct);
    }

    #[test]
    fn test_function_call_with_arguments() {
        let node = parse_expression("add(1, 2)");
        match &node {
            ParseNode::Unary(u) => {
                assert_eq!(u.kind, NodeKind::FuncCall);
                assert_eq!(u.token.lexeme, "add");
                let ParseNode::Block(args) = u.operand.as_deref().unwrap() else {
                    panic!("expected argument block")
                };
                assert_eq!(args.children.len(), 2);
            }
            other => panic!("expected function call, got {}", other),
        }
    }

    #[test]
    fn test_function_call_without_arguments() {
        let node = parse_expression("tick()");
        match &node {
            ParseNode::Unary(u) => {
                let ParseNode::Block(args) = u.operand.as_deref().unwrap() else {
                    panic!("expected argument block")
                };
                assert!(args.children.is_empty());
            }
            other => panic!("expected function call, got {}", other),
        }
    }

    #[test]
    fn test_vararg_parameter() {
        let root = parse_source("printf :: (fmt char*, args ...any) -> void\n");
        let ParseNode::Block(block) = &root else {
            panic!("expected program block")
        };
        let construct = as_binary(&block.children[0]);
        let ParseNode::Binary(signature) = construct.right.as_ref() else {
            panic!("expected declaration")
        };
        let ParseNode::Block(params) = signature.left.as_ref() else {
            panic!("expected parameter list")
        };
        assert_eq!(params.children[1].kind(), NodeKind::Vararg);
    }

    #[test]
    fn test_include_statement() {
        let root = parse_source("include \"io\"\nmain :: () -> void { }\n");
        let ParseNode::Block(block) = &root else {
            panic!("expected program block")
        };
        assert_eq!(block.children[0].kind(), NodeKind::Include);
        assert_eq!(block.children[0].token().lexeme, "\"io\"");
    }

    #[test]
    fn test_compile_time_execute_block() {
        let root = parse_source("#run { x i32 = 3 }");
        let ParseNode::Block(block) = &root else {
            panic!("expected program block")
        };
        let node = &block.children[0];
        assert_eq!(node.kind(), NodeKind::CompileTimeExecute);
        assert_eq!(node.first_child().unwrap().kind(), NodeKind::Block);
    }

    #[test]
    fn test_pointer_type_suffix() {
        let root = parse_source("puts :: (s char*) -> i32\n");
        let ParseNode::Block(block) = &root else {
            panic!("expected program block")
        };
        let construct = as_binary(&block.children[0]);
        let ParseNode::Binary(signature) = construct.right.as_ref() else {
            panic!("expected declaration")
        };
        let ParseNode::Block(params) = signature.left.as_ref() else {
            panic!("expected parameter list")
        };
        let param = as_binary(&params.children[0]);
        match param.right.as_ref() {
            ParseNode::Unary(u) => assert_eq!(u.shape, Some(TypeShape::PointerTo)),
            other => panic!("expected pointer type, got {}", other),
        }
    }

    #[test]
    fn test_array_type_with_length() {
        let node = parse_expression("buf [i32 : 8]");
        let dec = as_binary(&node);
        assert_eq!(dec.kind, NodeKind::VarDec);
        match dec.right.as_ref() {
            ParseNode::Unary(u) => {
                assert_eq!(u.shape, Some(TypeShape::ArrayOf));
                assert_eq!(u.array_length, Some(8));
            }
            other => panic!("expected array type, got {}", other),
        }
    }

    #[test]
    fn test_errors_are_collected_and_reported() {
        let mut parser = Parser::new("test.sage", b"main :: ( -> int { ret 0 }");
        let result = parser.parse();
        assert!(result.is_err());
        assert!(!parser.errors().is_empty());
    }

    #[test]
    fn test_unknown_keyword_statement_errors() {
        let mut parser = Parser::new("test.sage", b"main :: () -> void { break }");
        assert!(parser.parse().is_err());
    }
}
