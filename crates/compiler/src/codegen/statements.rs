//! Statement and expression code generation
//!
//! `visit_operand_branch` is the workhorse: literals become operands with
//! no emitted instructions, everything else compiles to an instruction
//! sequence whose last result register is the operand.

use super::CodeGen;
use crate::ast::{NodeKind, ParseNode, Structure};
use crate::ir::IrInstruction;
use crate::symbols::{SageType, SymbolKind};
use crate::token::TokenKind;

impl CodeGen {
    /// Dispatch one statement inside a function body.
    pub(super) fn compile_statement(&mut self, node: &ParseNode) {
        match node.kind() {
            NodeKind::Assign => {
                if node.structure() == Structure::Trinary {
                    self.compile_local_dec_init(node);
                } else {
                    self.compile_assign(node);
                }
            }
            NodeKind::VarDec => self.compile_var_dec(node),
            NodeKind::FuncCall => {
                self.compile_call(node);
            }
            NodeKind::Binary => {
                self.compile_expression(node);
            }
            NodeKind::Keyword => self.compile_return(node),
            NodeKind::If => self.compile_if(node),
            NodeKind::While => self.compile_while(node),
            NodeKind::For => self.compile_for(node),
            NodeKind::CompileTimeExecute => {
                let mut interpreter = crate::interpreter::Interpreter::new(&mut self.table);
                if let Some(body) = node.first_child() {
                    interpreter.interpret(body);
                }
                let errors = interpreter.take_errors();
                for error in errors {
                    self.record_error(error);
                }
            }
            _ => self.record_error(format!("statement is not allowed here: {}", node)),
        }
    }

    /// Compile a node in operand position. Returns the rendered operand and
    /// its datatype; instructions are emitted into the current block.
    pub(super) fn visit_operand_branch(&mut self, node: &ParseNode) -> Option<(String, SageType)> {
        match node.kind() {
            NodeKind::Number => Some((node.token().lexeme.clone(), SageType::I32)),
            NodeKind::Float => Some((node.token().lexeme.clone(), SageType::F32)),
            NodeKind::StringLit => {
                let (reference, datatype) = self.compile_string_literal(&node.token().lexeme);
                Some((reference, datatype))
            }
            NodeKind::VarRef => self.compile_var_ref(node),
            NodeKind::Binary => self.compile_expression(node),
            NodeKind::FuncCall => {
                let (operand, datatype) = self.compile_call(node)?;
                if datatype.is_void() {
                    self.record_error(format!(
                        "void result of '{}' cannot be used as a value",
                        node.token().lexeme
                    ));
                    return None;
                }
                Some((operand, datatype))
            }
            NodeKind::List => self.compile_field_read(node),
            _ => {
                self.record_error(format!("cannot use node as a value: {}", node));
                None
            }
        }
    }

    /// Load a variable into a fresh register. Parameters are SSA values
    /// already and are used directly; globals load through `@name`.
    fn compile_var_ref(&mut self, node: &ParseNode) -> Option<(String, SageType)> {
        let name = &node.token().lexeme;
        let id = match self.table.lookup(name) {
            Ok(id) => id,
            Err(e) => {
                self.record_error(e.to_string());
                return None;
            }
        };

        let kind = self.table.symbol(id).kind;
        let datatype = self.table.symbol(id).datatype.clone();
        match kind {
            SymbolKind::Parameter => Some((format!("%{}", name), datatype)),
            SymbolKind::Function => {
                self.record_error(format!("'{}' is a function, not a value", name));
                None
            }
            _ => {
                let pointer = self.pointer_for(id);
                let register = self.table.symbol_mut(id).new_register(name);
                self.emit(IrInstruction::Load {
                    result: register.clone(),
                    irtype: datatype.to_llvm(),
                    pointer,
                });
                Some((format!("%{}", register), datatype))
            }
        }
    }

    /// The pointer operand naming a symbol's storage.
    fn pointer_for(&self, id: crate::symbols::SymbolId) -> String {
        let symbol = self.table.symbol(id);
        if symbol.kind == SymbolKind::Constant {
            format!("@{}", symbol.name)
        } else {
            format!("%{}", symbol.name)
        }
    }

    /// An arithmetic or comparison expression node.
    pub(super) fn compile_expression(&mut self, node: &ParseNode) -> Option<(String, SageType)> {
        let ParseNode::Binary(binary) = node else {
            self.record_error(format!("malformed expression: {}", node));
            return None;
        };

        let resolved = super::types::resolve_node_type(node).unwrap_or(SageType::I32);

        let (lhs, lhs_type) = self.visit_operand_branch(&binary.left)?;
        let (rhs, rhs_type) = self.visit_operand_branch(&binary.right)?;
        let float = resolved.is_float() || lhs_type.is_float() || rhs_type.is_float();
        let operand_type = if float { SageType::F32 } else { SageType::I32 };

        let lhs = render_numeric(lhs, float);
        let rhs = render_numeric(rhs, float);

        match binary.token.kind {
            TokenKind::Add | TokenKind::Sub | TokenKind::Mul | TokenKind::Div => {
                let op = match (binary.token.kind, float) {
                    (TokenKind::Add, _) => "add",
                    (TokenKind::Sub, _) => "sub",
                    (TokenKind::Mul, false) => "mul",
                    (TokenKind::Mul, true) => "fmul",
                    (TokenKind::Div, false) => "sdiv",
                    (TokenKind::Div, true) => "fdiv",
                    _ => unreachable!(),
                };
                let result = self.fresh_temp();
                self.emit(IrInstruction::Binary {
                    result: result.clone(),
                    op: op.to_string(),
                    irtype: operand_type.to_llvm(),
                    lhs,
                    rhs,
                });
                Some((format!("%{}", result), operand_type))
            }

            TokenKind::Equality
            | TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::Lte
            | TokenKind::Gte => {
                let op = comparison_op(binary.token.kind, float);
                let result = self.fresh_temp();
                self.emit(IrInstruction::Compare {
                    result: result.clone(),
                    op: op.to_string(),
                    irtype: operand_type.to_llvm(),
                    lhs,
                    rhs,
                });
                Some((format!("%{}", result), SageType::Bool))
            }

            TokenKind::Exp => {
                self.record_error(
                    "the '^' operator has no code generation support yet".to_string(),
                );
                None
            }

            other => {
                self.record_error(format!("unsupported operator '{}'", other));
                None
            }
        }
    }

    /// `x = expr` and `path.field = expr`.
    fn compile_assign(&mut self, node: &ParseNode) {
        let ParseNode::Binary(assign) = node else {
            return;
        };

        if assign.left.kind() == NodeKind::List {
            self.compile_field_write(&assign.left, &assign.right);
            return;
        }

        let name = assign.left.token().lexeme.clone();
        let id = match self.table.lookup(&name) {
            Ok(id) => id,
            Err(e) => {
                self.record_error(e.to_string());
                return;
            }
        };
        let datatype = self.table.symbol(id).datatype.clone();

        let Some((value, value_type)) = self.visit_operand_branch(&assign.right) else {
            return;
        };
        if !value_type.matches(&datatype) {
            self.record_error(format!(
                "cannot assign {} value to '{}' of type {}",
                value_type.to_llvm(),
                name,
                datatype.to_llvm()
            ));
            return;
        }

        let pointer = self.pointer_for(id);
        self.emit(IrInstruction::Store {
            irtype: datatype.to_llvm(),
            value,
            pointer,
        });
    }

    /// `x T = expr`: declare, allocate, initialise.
    fn compile_local_dec_init(&mut self, node: &ParseNode) {
        let ParseNode::Trinary(dec) = node else {
            return;
        };

        let name = dec.left.token().lexeme.clone();
        let datatype = match super::types::resolve_node_type(&dec.middle) {
            Ok(datatype) => datatype,
            Err(e) => {
                self.record_error(e);
                return;
            }
        };

        if let Err(e) = self
            .table
            .add(&name, SymbolKind::Variable, None, datatype.clone())
        {
            self.record_error(e.to_string());
            return;
        }

        self.emit(IrInstruction::Alloca {
            name: name.clone(),
            irtype: datatype.to_llvm(),
        });

        let Some((value, value_type)) = self.visit_operand_branch(&dec.right) else {
            return;
        };
        if !value_type.matches(&datatype) {
            self.record_error(format!(
                "cannot initialise '{}' of type {} with a {} value",
                name,
                datatype.to_llvm(),
                value_type.to_llvm()
            ));
            return;
        }

        self.emit(IrInstruction::Store {
            irtype: datatype.to_llvm(),
            value,
            pointer: format!("%{}", name),
        });
    }

    /// `x T` without an initialiser.
    fn compile_var_dec(&mut self, node: &ParseNode) {
        let ParseNode::Binary(dec) = node else {
            return;
        };

        let name = dec.left.token().lexeme.clone();
        let datatype = match super::types::resolve_node_type(&dec.right) {
            Ok(datatype) => datatype,
            Err(e) => {
                self.record_error(e);
                return;
            }
        };

        if let Err(e) = self
            .table
            .add(&name, SymbolKind::Variable, None, datatype.clone())
        {
            self.record_error(e.to_string());
            return;
        }

        self.emit(IrInstruction::Alloca {
            name,
            irtype: datatype.to_llvm(),
        });
    }

    /// `ret` and `ret expr`; the operand's type must equal the enclosing
    /// function's declared return type.
    fn compile_return(&mut self, node: &ParseNode) {
        if !node.token().lexeme.starts_with("ret") {
            self.record_error(format!("could not recognize statement: {}", node));
            return;
        }

        let Some(child) = node.first_child() else {
            self.emit(IrInstruction::RetVoid);
            return;
        };

        let Some((value, datatype)) = self.visit_operand_branch(child) else {
            return;
        };

        let expected = self.current_return_type.clone();
        match expected {
            Some(expected) if datatype.matches(&expected) => {
                self.emit(IrInstruction::Ret {
                    irtype: expected.to_llvm(),
                    value,
                });
            }
            Some(expected) => {
                self.record_error(format!(
                    "return value of type {} does not match declared return type {}",
                    datatype.to_llvm(),
                    expected.to_llvm()
                ));
            }
            None => {
                self.record_error("return statement outside of a function".to_string());
            }
        }
    }

    /// Walk a dotted path down struct scopes, emitting a `getelementptr`
    /// per hop. Returns the final element pointer and its type.
    fn compile_field_pointer(&mut self, node: &ParseNode) -> Option<(String, SageType)> {
        let ParseNode::List(path) = node else {
            self.record_error(format!("malformed field access: {}", node));
            return None;
        };
        let (first, rest) = path.lexemes.split_first()?;

        let base_id = match self.table.lookup(first) {
            Ok(id) => id,
            Err(e) => {
                self.record_error(e.to_string());
                return None;
            }
        };
        let mut pointer = self.pointer_for(base_id);
        let mut current = self.table.symbol(base_id).datatype.clone();

        for accessor in rest {
            let SageType::Struct(struct_name) = &current else {
                self.record_error(format!(
                    "cannot access field '{}' of non-struct type {}",
                    accessor,
                    current.to_llvm()
                ));
                return None;
            };

            let struct_id = match self.table.lookup(struct_name) {
                Ok(id) => id,
                Err(e) => {
                    self.record_error(e.to_string());
                    return None;
                }
            };
            let Some(fields) = self.table.symbol(struct_id).scope else {
                self.record_error(format!("'{}' has no field scope", struct_name));
                return None;
            };

            let index = match self.table.field_index(fields, accessor) {
                Ok(index) => index,
                Err(e) => {
                    self.record_error(e.to_string());
                    return None;
                }
            };
            let field_id = self.table.lookup_local(fields, accessor).ok()?;
            let field_type = self.table.symbol(field_id).datatype.clone();

            let result = self.fresh_temp();
            self.emit(IrInstruction::GetElementPtr {
                result: result.clone(),
                base_type: current.to_llvm(),
                pointer,
                indices: vec![
                    ("i32".to_string(), "0".to_string()),
                    ("i32".to_string(), index.to_string()),
                ],
            });

            pointer = format!("%{}", result);
            current = field_type;
        }

        Some((pointer, current))
    }

    fn compile_field_read(&mut self, node: &ParseNode) -> Option<(String, SageType)> {
        let (pointer, datatype) = self.compile_field_pointer(node)?;
        let result = self.fresh_temp();
        self.emit(IrInstruction::Load {
            result: result.clone(),
            irtype: datatype.to_llvm(),
            pointer,
        });
        Some((format!("%{}", result), datatype))
    }

    fn compile_field_write(&mut self, target: &ParseNode, value_node: &ParseNode) {
        let Some((value, value_type)) = self.visit_operand_branch(value_node) else {
            return;
        };
        let Some((pointer, datatype)) = self.compile_field_pointer(target) else {
            return;
        };

        if !value_type.matches(&datatype) {
            self.record_error(format!(
                "cannot assign {} value to field of type {}",
                value_type.to_llvm(),
                datatype.to_llvm()
            ));
            return;
        }

        self.emit(IrInstruction::Store {
            irtype: datatype.to_llvm(),
            value,
            pointer,
        });
    }

    /// A top-level `x T = literal` or `x T` becomes a module global.
    pub(super) fn compile_global(&mut self, node: &ParseNode) {
        let (name_node, type_node, initialiser) = match node {
            ParseNode::Trinary(dec) if dec.kind == NodeKind::Assign => {
                (&dec.left, &dec.middle, Some(&dec.right))
            }
            ParseNode::Binary(dec) if dec.kind == NodeKind::VarDec => {
                (&dec.left, &dec.right, None)
            }
            other => {
                self.record_error(format!(
                    "statement is not allowed at the top level: {}",
                    other
                ));
                return;
            }
        };

        let name = name_node.token().lexeme.clone();
        let datatype = match super::types::resolve_node_type(type_node) {
            Ok(datatype) => datatype,
            Err(e) => {
                self.record_error(e);
                return;
            }
        };

        let value = match initialiser {
            None => default_global_value(&datatype),
            Some(init) => match init.kind() {
                NodeKind::Number | NodeKind::Float => init.token().lexeme.clone(),
                _ => {
                    self.record_error(format!(
                        "global '{}' must be initialised with a literal",
                        name
                    ));
                    return;
                }
            },
        };

        if let Err(e) = self.table.add_in(
            self.table.root_scope(),
            &name,
            SymbolKind::Constant,
            None,
            datatype.clone(),
        ) {
            self.record_error(e.to_string());
            return;
        }

        self.module.globals.push(crate::ir::IrGlobal {
            name,
            keyword: "global",
            irtype: datatype.to_llvm(),
            value,
        });
    }
}

fn default_global_value(datatype: &SageType) -> String {
    match datatype {
        SageType::Array(..) | SageType::Struct(_) => "zeroinitializer".to_string(),
        SageType::F32 | SageType::F64 => "0.0".to_string(),
        SageType::Pointer(_) => "null".to_string(),
        _ => "0".to_string(),
    }
}

fn comparison_op(kind: TokenKind, float: bool) -> &'static str {
    match (kind, float) {
        (TokenKind::Equality, false) => "icmp eq",
        (TokenKind::Lt, false) => "icmp slt",
        (TokenKind::Gt, false) => "icmp sgt",
        (TokenKind::Lte, false) => "icmp sle",
        (TokenKind::Gte, false) => "icmp sge",
        (TokenKind::Equality, true) => "fcmp oeq",
        (TokenKind::Lt, true) => "fcmp olt",
        (TokenKind::Gt, true) => "fcmp ogt",
        (TokenKind::Lte, true) => "fcmp ole",
        (TokenKind::Gte, true) => "fcmp oge",
        _ => "icmp eq",
    }
}

/// Integer literals used in float context need a decimal point.
fn render_numeric(operand: String, float: bool) -> String {
    if float && operand.chars().all(|c| c.is_ascii_digit()) {
        format!("{}.0", operand)
    } else {
        operand
    }
}
