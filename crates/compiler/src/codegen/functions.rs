//! Function code generation
//!
//! Definitions open a child scope inheriting the enclosing table, compile
//! their parameters into PARAMETER symbols, and emit the body as a block
//! sequence starting at `entry`. Declarations share the parameter path but
//! emit no body. Calls check each argument against the callee's recorded
//! signature, coercing arrays to pointers by one level of address-of.

use super::CodeGen;
use crate::ast::{NodeKind, ParseNode};
use crate::ir::{IrFunc, IrInstruction};
use crate::symbols::{SageType, SymbolKind};

impl CodeGen {
    /// `name :: (params) -> type { body }`
    pub(super) fn compile_funcdef_construct(&mut self, node: &ParseNode) {
        let ParseNode::Binary(construct) = node else {
            self.record_error(format!("malformed function definition: {}", node));
            return;
        };
        let name = construct.left.token().lexeme.clone();
        let ParseNode::Trinary(function) = construct.right.as_ref() else {
            self.record_error(format!("malformed function definition: {}", node));
            return;
        };

        let return_type = match super::types::resolve_node_type(&function.middle) {
            Ok(datatype) => datatype,
            Err(e) => {
                self.record_error(e);
                return;
            }
        };

        let function_id = match self.table.add(
            &name,
            SymbolKind::Function,
            None,
            return_type.clone(),
        ) {
            Ok(id) => id,
            Err(e) => {
                self.record_error(e.to_string());
                return;
            }
        };

        // the child scope keeps the enclosing table reachable through its
        // parent index, which is what makes globals visible in bodies
        let scope = self.table.new_scope(self.table.current_scope());
        self.table.symbol_mut(function_id).scope = Some(scope);

        let saved = self.table.enter_scope(scope);
        let (parameters, parameter_types) = self.compile_parameters(&function.left);
        {
            let symbol = self.table.symbol_mut(function_id);
            symbol.parameter_count = parameter_types.len();
            symbol.parameter_types = parameter_types;
        }

        self.begin_function_body();
        self.current_return_type = Some(return_type.clone());

        if let ParseNode::Block(body) = function.right.as_ref() {
            for statement in &body.children {
                self.compile_statement(statement);
            }
        }

        if return_type.is_void() && !self.block_terminated() {
            self.emit(IrInstruction::RetVoid);
        }

        self.current_return_type = None;
        self.table.leave_scope(saved);

        let body = self.take_function_body();
        self.module.func_defs.push(IrFunc {
            name,
            return_type: return_type.to_llvm(),
            parameters,
            calling_conv: None,
            attribute: None,
            body,
        });
    }

    /// `name :: (params) -> type` with no body: emit `declare`.
    pub(super) fn compile_funcdec_construct(&mut self, node: &ParseNode) {
        let ParseNode::Binary(construct) = node else {
            self.record_error(format!("malformed function declaration: {}", node));
            return;
        };
        let name = construct.left.token().lexeme.clone();
        let ParseNode::Binary(signature) = construct.right.as_ref() else {
            self.record_error(format!("malformed function declaration: {}", node));
            return;
        };

        let return_type = match super::types::resolve_node_type(&signature.right) {
            Ok(datatype) => datatype,
            Err(e) => {
                self.record_error(e);
                return;
            }
        };

        let function_id = match self.table.add(
            &name,
            SymbolKind::Function,
            None,
            return_type.clone(),
        ) {
            Ok(id) => id,
            Err(e) => {
                self.record_error(e.to_string());
                return;
            }
        };

        let scope = self.table.new_scope(self.table.current_scope());
        self.table.symbol_mut(function_id).scope = Some(scope);

        let saved = self.table.enter_scope(scope);
        let (parameters, parameter_types) = self.compile_parameters(&signature.left);
        self.table.leave_scope(saved);

        {
            let symbol = self.table.symbol_mut(function_id);
            symbol.parameter_count = parameter_types.len();
            symbol.parameter_types = parameter_types;
        }

        self.module.func_decs.push(IrFunc {
            name,
            return_type: return_type.to_llvm(),
            parameters,
            calling_conv: None,
            attribute: None,
            body: Vec::new(),
        });
    }

    /// Turn a parameter list block into PARAMETER symbols plus signature
    /// fragments. A trailing vararg closes the signature with `...`.
    fn compile_parameters(&mut self, params: &ParseNode) -> (Vec<IrInstruction>, Vec<SageType>) {
        let mut fragments = Vec::new();
        let mut types = Vec::new();

        let ParseNode::Block(list) = params else {
            return (fragments, types);
        };

        for (index, param) in list.children.iter().enumerate() {
            if param.kind() == NodeKind::Vararg {
                fragments.push(IrInstruction::Vararg);
                types.push(SageType::Vararg);
                continue;
            }

            let ParseNode::Binary(dec) = param else {
                self.record_error(format!("malformed parameter: {}", param));
                continue;
            };
            let name = dec.left.token().lexeme.clone();
            let datatype = match super::types::resolve_node_type(&dec.right) {
                Ok(datatype) => datatype,
                Err(e) => {
                    self.record_error(e);
                    continue;
                }
            };

            match self
                .table
                .add(&name, SymbolKind::Parameter, None, datatype.clone())
            {
                Ok(id) => self.table.symbol_mut(id).parameter_index = index,
                Err(e) => {
                    self.record_error(e.to_string());
                    continue;
                }
            }

            fragments.push(IrInstruction::Param {
                name,
                irtype: datatype.to_llvm(),
            });
            types.push(datatype);
        }

        (fragments, types)
    }

    /// Lower a call. Returns the result operand and type for use in
    /// expressions; void calls return no operand.
    pub(super) fn compile_call(&mut self, node: &ParseNode) -> Option<(String, SageType)> {
        let name = node.token().lexeme.clone();
        let function_id = match self.table.lookup(&name) {
            Ok(id) => id,
            Err(e) => {
                self.record_error(e.to_string());
                return None;
            }
        };
        if self.table.symbol(function_id).kind != SymbolKind::Function {
            self.record_error(format!("'{}' is not a function", name));
            return None;
        }
        let return_type = self.table.symbol(function_id).datatype.clone();
        let parameter_types = self.table.symbol(function_id).parameter_types.clone();
        let variadic = matches!(parameter_types.last(), Some(SageType::Vararg));
        let fixed_count = if variadic {
            parameter_types.len() - 1
        } else {
            parameter_types.len()
        };

        let Some(ParseNode::Block(argument_list)) = node.first_child() else {
            self.record_error(format!("malformed call to '{}'", name));
            return None;
        };
        let arguments = argument_list.children.clone();

        if arguments.len() < fixed_count {
            self.record_error(format!(
                "not enough arguments in call to '{}': expected {}, found {}",
                name,
                fixed_count,
                arguments.len()
            ));
            return None;
        }
        if !variadic && arguments.len() > fixed_count {
            self.record_error(format!(
                "too many arguments in call to '{}': expected {}, found {}",
                name,
                fixed_count,
                arguments.len()
            ));
            return None;
        }

        let mut lowered = Vec::new();
        for (index, argument) in arguments.iter().enumerate() {
            let (value, datatype) = self.visit_operand_branch(argument)?;

            // variadic tail arguments pass through unchanged
            if index >= fixed_count {
                lowered.push((datatype.to_llvm(), value));
                continue;
            }

            let expected = &parameter_types[index];
            if datatype.matches(expected) {
                lowered.push((expected.to_llvm(), value));
                continue;
            }

            // one level of address-of: an array decays to a pointer when
            // dereferencing the parameter type matches the element
            if let (SageType::Pointer(inner), SageType::Array(element, _)) =
                (expected, &datatype)
            {
                if element.matches(inner) {
                    let coerced = format!(
                        "getelementptr ({}, {}* {}, i32 0, i32 0)",
                        datatype.to_llvm(),
                        datatype.to_llvm(),
                        value
                    );
                    lowered.push((expected.to_llvm(), coerced));
                    continue;
                }
            }

            self.record_error(format!(
                "type mismatch in argument {} of call to '{}': expected {}, found {}",
                index + 1,
                name,
                expected.to_llvm(),
                datatype.to_llvm()
            ));
            return None;
        }

        let result = if return_type.is_void() {
            None
        } else {
            Some(self.fresh_temp())
        };
        let operand = result
            .as_ref()
            .map(|r| format!("%{}", r))
            .unwrap_or_default();

        self.emit(IrInstruction::Call {
            result,
            return_type: return_type.to_llvm(),
            name,
            arguments: lowered,
        });

        Some((operand, return_type))
    }

    /// `Name :: struct { fields }`: record the field scope and emit the
    /// `%Name = type { ... }` declaration.
    pub(super) fn compile_struct_construct(&mut self, node: &ParseNode) {
        let ParseNode::Binary(construct) = node else {
            self.record_error(format!("malformed struct definition: {}", node));
            return;
        };
        let name = construct.left.token().lexeme.clone();
        let Some(ParseNode::Block(fields)) = construct.right.first_child() else {
            self.record_error(format!("malformed struct definition: {}", node));
            return;
        };

        let scope = self.table.new_scope(self.table.current_scope());
        let mut field_types = Vec::new();
        for (index, field) in fields.children.iter().enumerate() {
            let ParseNode::Binary(dec) = field else {
                self.record_error(format!("malformed struct field: {}", field));
                continue;
            };
            let field_name = dec.left.token().lexeme.clone();
            let datatype = match super::types::resolve_node_type(&dec.right) {
                Ok(datatype) => datatype,
                Err(e) => {
                    self.record_error(e);
                    continue;
                }
            };

            match self.table.add_in(
                scope,
                &field_name,
                SymbolKind::Variable,
                None,
                datatype.clone(),
            ) {
                Ok(id) => self.table.symbol_mut(id).parameter_index = index,
                Err(e) => {
                    self.record_error(e.to_string());
                    continue;
                }
            }
            field_types.push(datatype.to_llvm());
        }

        match self.table.add(
            &name,
            SymbolKind::Struct,
            None,
            SageType::Struct(name.clone()),
        ) {
            Ok(id) => self.table.symbol_mut(id).scope = Some(scope),
            Err(e) => {
                self.record_error(e.to_string());
                return;
            }
        }

        self.module.structs.push(crate::ir::IrStruct {
            name,
            field_types,
            packed: false,
        });
    }
}
