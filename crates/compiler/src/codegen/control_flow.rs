//! Control flow code generation
//!
//! Loops and conditionals lower to groups of labelled blocks:
//!
//! - `while`: condition, body, end; the condition block branches into the
//!   body or past it, the body branches back to the condition.
//! - `for i in a ... b`: the iterator is allocated and seeded in the
//!   current block, then condition (load, compare, branch), body,
//!   increment (`i = i + 1`), end.
//! - `if`/`else if`/`else`: one condition block per arm falling through to
//!   its body; every body jumps to a shared end block.

use super::CodeGen;
use crate::ast::{NodeKind, ParseNode};
use crate::ir::IrInstruction;
use crate::symbols::{SageType, SymbolKind};

impl CodeGen {
    /// Lower a condition expression to an i1 operand. Non-boolean values
    /// compare against zero.
    fn compile_condition(&mut self, node: &ParseNode) -> Option<String> {
        let (value, datatype) = self.visit_operand_branch(node)?;
        if datatype.matches(&SageType::Bool) {
            return Some(value);
        }

        let result = self.fresh_temp();
        self.emit(IrInstruction::Compare {
            result: result.clone(),
            op: "icmp ne".to_string(),
            irtype: datatype.to_llvm(),
            lhs: value,
            rhs: "0".to_string(),
        });
        Some(format!("%{}", result))
    }

    pub(super) fn compile_while(&mut self, node: &ParseNode) {
        let ParseNode::Binary(while_node) = node else {
            self.record_error(format!("malformed while statement: {}", node));
            return;
        };

        let group = self.next_label_group();
        let cond_label = format!("while{}.cond", group);
        let body_label = format!("while{}.body", group);
        let end_label = format!("while{}.end", group);

        self.emit(IrInstruction::Branch {
            label: cond_label.clone(),
        });

        self.new_block(cond_label.clone());
        let Some(condition) = self.compile_condition(&while_node.left) else {
            return;
        };
        self.emit(IrInstruction::CondBranch {
            condition,
            then_label: body_label.clone(),
            else_label: end_label.clone(),
        });

        self.new_block(body_label);
        let scope = self.table.new_scope(self.table.current_scope());
        let saved = self.table.enter_scope(scope);
        if let ParseNode::Block(body) = while_node.right.as_ref() {
            for statement in &body.children {
                self.compile_statement(statement);
            }
        }
        self.table.leave_scope(saved);
        if !self.block_terminated() {
            self.emit(IrInstruction::Branch { label: cond_label });
        }

        self.new_block(end_label);
    }

    pub(super) fn compile_for(&mut self, node: &ParseNode) {
        let ParseNode::Trinary(for_node) = node else {
            self.record_error(format!("malformed for statement: {}", node));
            return;
        };
        let ParseNode::Binary(range) = for_node.middle.as_ref() else {
            self.record_error(format!("malformed range in for statement: {}", node));
            return;
        };

        let group = self.next_label_group();
        let cond_label = format!("for{}.cond", group);
        let body_label = format!("for{}.body", group);
        let inc_label = format!("for{}.inc", group);
        let end_label = format!("for{}.end", group);

        // the iterator lives in its own scope spanning the loop
        let scope = self.table.new_scope(self.table.current_scope());
        let saved = self.table.enter_scope(scope);

        let iterator = for_node.left.token().lexeme.clone();
        let iterator_id = match self
            .table
            .add(&iterator, SymbolKind::Variable, None, SageType::I32)
        {
            Ok(id) => id,
            Err(e) => {
                self.record_error(e.to_string());
                self.table.leave_scope(saved);
                return;
            }
        };

        self.emit(IrInstruction::Alloca {
            name: iterator.clone(),
            irtype: "i32".to_string(),
        });
        let Some((start, _)) = self.visit_operand_branch(&range.left) else {
            self.table.leave_scope(saved);
            return;
        };
        self.emit(IrInstruction::Store {
            irtype: "i32".to_string(),
            value: start,
            pointer: format!("%{}", iterator),
        });
        self.emit(IrInstruction::Branch {
            label: cond_label.clone(),
        });

        self.new_block(cond_label.clone());
        let loaded = self.table.symbol_mut(iterator_id).new_register(&iterator);
        self.emit(IrInstruction::Load {
            result: loaded.clone(),
            irtype: "i32".to_string(),
            pointer: format!("%{}", iterator),
        });
        let Some((bound, _)) = self.visit_operand_branch(&range.right) else {
            self.table.leave_scope(saved);
            return;
        };
        let condition = self.fresh_temp();
        self.emit(IrInstruction::Compare {
            result: condition.clone(),
            op: "icmp slt".to_string(),
            irtype: "i32".to_string(),
            lhs: format!("%{}", loaded),
            rhs: bound,
        });
        self.emit(IrInstruction::CondBranch {
            condition: format!("%{}", condition),
            then_label: body_label.clone(),
            else_label: end_label.clone(),
        });

        self.new_block(body_label);
        if let ParseNode::Block(body) = for_node.right.as_ref() {
            for statement in &body.children {
                self.compile_statement(statement);
            }
        }
        if !self.block_terminated() {
            self.emit(IrInstruction::Branch {
                label: inc_label.clone(),
            });
        }

        self.new_block(inc_label);
        let loaded = self.table.symbol_mut(iterator_id).new_register(&iterator);
        self.emit(IrInstruction::Load {
            result: loaded.clone(),
            irtype: "i32".to_string(),
            pointer: format!("%{}", iterator),
        });
        let bumped = self.fresh_temp();
        self.emit(IrInstruction::Binary {
            result: bumped.clone(),
            op: "add".to_string(),
            irtype: "i32".to_string(),
            lhs: format!("%{}", loaded),
            rhs: "1".to_string(),
        });
        self.emit(IrInstruction::Store {
            irtype: "i32".to_string(),
            value: format!("%{}", bumped),
            pointer: format!("%{}", iterator),
        });
        self.emit(IrInstruction::Branch { label: cond_label });

        self.table.leave_scope(saved);
        self.new_block(end_label);
    }

    pub(super) fn compile_if(&mut self, node: &ParseNode) {
        let ParseNode::Block(chain) = node else {
            self.record_error(format!("malformed if statement: {}", node));
            return;
        };

        let group = self.next_label_group();
        let end_label = format!("if{}.end", group);

        // pre-compute the entry label of every arm so each condition knows
        // where to fall through when it fails
        let mut entry_labels = Vec::new();
        for (index, arm) in chain.children.iter().enumerate() {
            match arm.kind() {
                NodeKind::IfBranch => entry_labels.push(format!("if{}.cond{}", group, index)),
                NodeKind::ElseBranch => entry_labels.push(format!("if{}.else", group)),
                _ => {
                    self.record_error(format!("malformed if arm: {}", arm));
                    return;
                }
            }
        }

        if let Some(first) = entry_labels.first() {
            self.emit(IrInstruction::Branch {
                label: first.clone(),
            });
        }

        for (index, arm) in chain.children.iter().enumerate() {
            let fail_label = entry_labels
                .get(index + 1)
                .cloned()
                .unwrap_or_else(|| end_label.clone());

            match arm {
                ParseNode::Binary(branch) if branch.kind == NodeKind::IfBranch => {
                    let body_label = format!("if{}.body{}", group, index);

                    self.new_block(entry_labels[index].clone());
                    let Some(condition) = self.compile_condition(&branch.left) else {
                        return;
                    };
                    self.emit(IrInstruction::CondBranch {
                        condition,
                        then_label: body_label.clone(),
                        else_label: fail_label,
                    });

                    self.new_block(body_label);
                    self.compile_branch_body(&branch.right, &end_label);
                }

                ParseNode::Unary(branch) if branch.kind == NodeKind::ElseBranch => {
                    self.new_block(entry_labels[index].clone());
                    if let Some(body) = &branch.operand {
                        self.compile_branch_body(body, &end_label);
                    }
                }

                other => {
                    self.record_error(format!("malformed if arm: {}", other));
                    return;
                }
            }
        }

        self.new_block(end_label);
    }

    fn compile_branch_body(&mut self, body: &ParseNode, end_label: &str) {
        let scope = self.table.new_scope(self.table.current_scope());
        let saved = self.table.enter_scope(scope);
        if let ParseNode::Block(block) = body {
            for statement in &block.children {
                self.compile_statement(statement);
            }
        }
        self.table.leave_scope(saved);

        if !self.block_terminated() {
            self.emit(IrInstruction::Branch {
                label: end_label.to_string(),
            });
        }
    }
}
