//! Compile-time interpreter
//!
//! Walks the statements inside `#run { ... }` blocks. Interpretation never
//! emits IR: its only observable effect is mutation of symbol-table entries
//! (most usefully the `build_settings` record) that code generation reads
//! afterwards. Nodes outside the supported set produce soft errors and are
//! skipped.

use crate::ast::{NodeKind, ParseNode, Structure};
use crate::codegen::resolve_node_type;
use crate::symbols::{AtomicValue, SageType, SymbolKind, SymbolTable, Value};

pub struct Interpreter<'t> {
    table: &'t mut SymbolTable,
    errors: Vec<String>,
}

impl<'t> Interpreter<'t> {
    pub fn new(table: &'t mut SymbolTable) -> Self {
        Interpreter {
            table,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn take_errors(self) -> Vec<String> {
        self.errors
    }

    /// Evaluate one compile-time node. Returns the computed value for
    /// expressions, `None` for statements (and for anything that failed
    /// softly).
    pub fn interpret(&mut self, node: &ParseNode) -> Option<AtomicValue> {
        match node.kind() {
            NodeKind::Assign => {
                if node.structure() == Structure::Trinary {
                    self.interpret_trinary_assign(node);
                    return None;
                }
                self.interpret_binary_assign(node);
                None
            }

            NodeKind::CompileTimeExecute => {
                let child = node.first_child()?;
                self.interpret(child)
            }

            NodeKind::Block => {
                if let ParseNode::Block(block) = node {
                    for statement in &block.children {
                        self.interpret(statement);
                    }
                }
                None
            }

            NodeKind::StringLit => {
                let text = unquote(&node.token().lexeme);
                Some(AtomicValue {
                    datatype: SageType::Array(Box::new(SageType::Char), text.len() + 1),
                    value: Value::Str(text),
                })
            }

            NodeKind::Number => {
                let parsed = node.token().lexeme.parse::<i64>();
                match parsed {
                    Ok(n) => Some(AtomicValue {
                        datatype: SageType::I32,
                        value: Value::Int(n),
                    }),
                    Err(_) => {
                        self.soft_error(format!(
                            "invalid integer literal '{}'",
                            node.token().lexeme
                        ));
                        None
                    }
                }
            }

            NodeKind::Float => {
                let parsed = node.token().lexeme.parse::<f64>();
                match parsed {
                    Ok(x) => Some(AtomicValue {
                        datatype: SageType::F32,
                        value: Value::Float(x),
                    }),
                    Err(_) => {
                        self.soft_error(format!(
                            "invalid float literal '{}'",
                            node.token().lexeme
                        ));
                        None
                    }
                }
            }

            NodeKind::VarRef => {
                let name = &node.token().lexeme;
                match self.table.lookup(name) {
                    Ok(id) => {
                        let symbol = self.table.symbol(id);
                        match &symbol.value {
                            Some(value) => Some(value.clone()),
                            None => {
                                self.soft_error(format!(
                                    "'{}' has no compile-time value",
                                    name
                                ));
                                None
                            }
                        }
                    }
                    Err(e) => {
                        self.soft_error(e.to_string());
                        None
                    }
                }
            }

            _ => {
                self.soft_error(format!("cannot interpret node: {}", node));
                None
            }
        }
    }

    /// `name type = value`: declare and initialise in the current scope.
    fn interpret_trinary_assign(&mut self, node: &ParseNode) {
        let ParseNode::Trinary(trinary) = node else {
            return;
        };

        let name = trinary.left.token().lexeme.clone();
        let datatype = match resolve_node_type(&trinary.middle) {
            Ok(datatype) => datatype,
            Err(e) => {
                self.soft_error(e);
                return;
            }
        };

        let id = match self
            .table
            .add(&name, SymbolKind::Variable, None, datatype)
        {
            Ok(id) => id,
            Err(e) => {
                self.soft_error(e.to_string());
                return;
            }
        };

        if let Some(value) = self.interpret(&trinary.right) {
            self.table
                .symbol_mut(id)
                .set_value(value.datatype, value.value);
        }
    }

    /// `name = value` or `path.to.field = value`: update an existing symbol.
    fn interpret_binary_assign(&mut self, node: &ParseNode) {
        let ParseNode::Binary(binary) = node else {
            return;
        };

        let Some(value) = self.interpret(&binary.right) else {
            return;
        };

        if let ParseNode::List(path) = binary.left.as_ref() {
            self.interpret_field_assign(&path.lexemes, value);
            return;
        }

        let name = &binary.left.token().lexeme;
        match self.table.lookup(name) {
            Ok(id) => {
                self.table
                    .symbol_mut(id)
                    .set_value(value.datatype, value.value);
            }
            Err(e) => self.soft_error(e.to_string()),
        }
    }

    /// Navigate a dotted path, descending into each symbol's owned scope,
    /// and write the final field.
    fn interpret_field_assign(&mut self, path: &[String], value: AtomicValue) {
        let (first, rest) = match path.split_first() {
            Some(split) => split,
            None => return,
        };

        let mut id = match self.table.lookup(first) {
            Ok(id) => id,
            Err(e) => {
                self.soft_error(e.to_string());
                return;
            }
        };

        for accessor in rest {
            let Some(scope) = self.table.symbol(id).scope else {
                self.soft_error(format!(
                    "'{}' has no fields to access",
                    self.table.symbol(id).name
                ));
                return;
            };
            id = match self.table.lookup_local(scope, accessor) {
                Ok(field) => field,
                Err(e) => {
                    self.soft_error(e.to_string());
                    return;
                }
            };
        }

        self.table
            .symbol_mut(id)
            .set_value(value.datatype, value.value);
    }

    fn soft_error(&mut self, message: String) {
        self.errors.push(message);
    }
}

fn unquote(lexeme: &str) -> String {
    lexeme
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(lexeme)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_settings::BuildSettings;
    use crate::parser::Parser;

    fn run_block(table: &mut SymbolTable, source: &str) -> Vec<String> {
        let mut parser = Parser::new("test.sage", source.as_bytes());
        let root = parser.parse().unwrap();
        let ParseNode::Block(program) = &root else {
            panic!("expected program block")
        };

        let mut interpreter = Interpreter::new(table);
        for node in &program.children {
            interpreter.interpret(node);
        }
        interpreter.take_errors()
    }

    #[test]
    fn test_build_settings_field_assignment() {
        let mut table = SymbolTable::new();
        BuildSettings::defaults("demo.sage")
            .seed_symbol_table(&mut table)
            .unwrap();

        let errors = run_block(
            &mut table,
            "#run { build_settings.executable_name = \"demo\" }",
        );
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        let settings = BuildSettings::defaults("demo.sage").read_back(&table);
        assert_eq!(settings.executable_name, "demo");
    }

    #[test]
    fn test_declaration_then_reference() {
        let mut table = SymbolTable::new();
        BuildSettings::defaults("demo.sage")
            .seed_symbol_table(&mut table)
            .unwrap();

        let errors = run_block(
            &mut table,
            "#run {\n\tname [char] = \"tool\"\n\tbuild_settings.executable_name = name\n}",
        );
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        let settings = BuildSettings::defaults("demo.sage").read_back(&table);
        assert_eq!(settings.executable_name, "tool");
    }

    #[test]
    fn test_numeric_field_assignment() {
        let mut table = SymbolTable::new();
        BuildSettings::defaults("demo.sage")
            .seed_symbol_table(&mut table)
            .unwrap();

        let errors = run_block(&mut table, "#run { build_settings.bitsize = 32 }");
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        let settings = BuildSettings::defaults("demo.sage").read_back(&table);
        assert_eq!(settings.bitsize, 32);
    }

    #[test]
    fn test_unsupported_node_is_soft_error() {
        let mut table = SymbolTable::new();
        let errors = run_block(&mut table, "#run { while 1 { x = 2 } }");
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_assignment_to_undefined_name_is_soft_error() {
        let mut table = SymbolTable::new();
        let errors = run_block(&mut table, "#run { missing = 3 }");
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_interpretation_never_touches_ast() {
        let mut parser = Parser::new("test.sage", b"#run { x i32 = 1 }");
        let root = parser.parse().unwrap();
        let before = root.clone();

        let mut table = SymbolTable::new();
        let ParseNode::Block(program) = &root else {
            panic!("expected program block")
        };
        let mut interpreter = Interpreter::new(&mut table);
        for node in &program.children {
            interpreter.interpret(node);
        }

        assert_eq!(root, before);
    }
}
