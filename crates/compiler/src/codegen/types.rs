//! Type resolution
//!
//! `resolve_node_type` computes the datatype of an AST node without
//! consulting emitted IR: literals have fixed types, binary arithmetic is
//! integer unless a float leaks in, comparisons are boolean, and type nodes
//! map through their shape refinement.

use crate::ast::{NodeKind, ParseNode, TypeShape};
use crate::symbols::SageType;
use crate::token::TokenKind;

pub fn resolve_node_type(node: &ParseNode) -> Result<SageType, String> {
    match node.kind() {
        NodeKind::Number => Ok(SageType::I32),
        NodeKind::Float => Ok(SageType::F32),
        NodeKind::StringLit => {
            let length = unescaped_length(&node.token().lexeme);
            Ok(SageType::Array(Box::new(SageType::Char), length + 1))
        }
        NodeKind::Binary => {
            if matches!(
                node.token().kind,
                TokenKind::Equality
                    | TokenKind::Lt
                    | TokenKind::Gt
                    | TokenKind::Lte
                    | TokenKind::Gte
            ) {
                return Ok(SageType::Bool);
            }
            let ParseNode::Binary(binary) = node else {
                return Ok(SageType::I32);
            };
            let float = side_is_float(&binary.left) || side_is_float(&binary.right);
            Ok(if float { SageType::F32 } else { SageType::I32 })
        }
        NodeKind::Type | NodeKind::Identifier => resolve_type_node(node),
        NodeKind::Vararg => Ok(SageType::Vararg),
        _ => Err(format!("could not resolve type of node: {}", node)),
    }
}

/// Resolve a type-position node through its shape refinement.
fn resolve_type_node(node: &ParseNode) -> Result<SageType, String> {
    let ParseNode::Unary(unary) = node else {
        return Err(format!("malformed type node: {}", node));
    };

    match unary.shape {
        Some(TypeShape::PointerTo) => {
            let inner = unary
                .operand
                .as_deref()
                .ok_or_else(|| "pointer type is missing its element type".to_string())?;
            Ok(SageType::Pointer(Box::new(resolve_type_node(inner)?)))
        }
        Some(TypeShape::ArrayOf) => {
            let inner = unary
                .operand
                .as_deref()
                .ok_or_else(|| "array type is missing its element type".to_string())?;
            Ok(SageType::Array(
                Box::new(resolve_type_node(inner)?),
                unary.array_length.unwrap_or(0),
            ))
        }
        Some(TypeShape::Function) => {
            Err("function types cannot be used as value types".to_string())
        }
        Some(TypeShape::Named) | None => Ok(SageType::from_name(&unary.token.lexeme)),
    }
}

fn side_is_float(node: &ParseNode) -> bool {
    matches!(resolve_node_type(node), Ok(t) if t.is_float())
}

/// Byte length of a string literal once escape sequences collapse; the
/// lexeme still carries its surrounding quotes.
pub fn unescaped_length(lexeme: &str) -> usize {
    let body = lexeme
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(lexeme);

    let mut length = 0;
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            chars.next();
        }
        length += 1;
    }
    length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn first_statement(source: &str) -> ParseNode {
        let mut parser = Parser::new("test.sage", source.as_bytes());
        let root = parser.parse().unwrap();
        let ParseNode::Block(block) = root else {
            panic!("expected program block")
        };
        block.children.into_iter().next().unwrap()
    }

    #[test]
    fn test_integer_plus_integer_is_i32() {
        let node = first_statement("1 + 2");
        assert_eq!(resolve_node_type(&node).unwrap(), SageType::I32);
    }

    #[test]
    fn test_float_side_promotes_expression() {
        let node = first_statement("1 + 2.5");
        assert_eq!(resolve_node_type(&node).unwrap(), SageType::F32);

        let node = first_statement("1.5 * 2");
        assert_eq!(resolve_node_type(&node).unwrap(), SageType::F32);
    }

    #[test]
    fn test_comparison_is_bool() {
        let node = first_statement("1 < 2");
        assert_eq!(resolve_node_type(&node).unwrap(), SageType::Bool);
        let node = first_statement("1 == 2");
        assert_eq!(resolve_node_type(&node).unwrap(), SageType::Bool);
    }

    #[test]
    fn test_string_literal_length_counts_terminator() {
        let node = first_statement("\"hi\"");
        assert_eq!(
            resolve_node_type(&node).unwrap(),
            SageType::Array(Box::new(SageType::Char), 3)
        );
    }

    #[test]
    fn test_escape_sequences_collapse_in_length() {
        assert_eq!(unescaped_length("\"a\\nb\""), 3);
        assert_eq!(unescaped_length("\"\\\\\""), 1);
        assert_eq!(unescaped_length("\"hi\""), 2);
    }

    #[test]
    fn test_pointer_and_array_type_nodes() {
        let dec = first_statement("s char*");
        let ParseNode::Binary(binary) = dec else {
            panic!("expected var dec")
        };
        assert_eq!(
            resolve_node_type(&binary.right).unwrap(),
            SageType::Pointer(Box::new(SageType::Char))
        );

        let dec = first_statement("buf [i64 : 4]");
        let ParseNode::Binary(binary) = dec else {
            panic!("expected var dec")
        };
        assert_eq!(
            resolve_node_type(&binary.right).unwrap(),
            SageType::Array(Box::new(SageType::I64), 4)
        );
    }

    #[test]
    fn test_unresolvable_node_is_error() {
        let node = first_statement("foo()");
        assert!(resolve_node_type(&node).is_err());
    }
}
