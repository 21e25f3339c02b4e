//! LLVM IR code generation
//!
//! A single pass over the parse tree that emits SSA-form IR text while
//! simultaneously resolving types, naming registers, and running the
//! compile-time interpreter over `#run` blocks. Top-level nodes are
//! classified into function definitions, forward declarations, structs,
//! globals, includes, and compile-time blocks; anything else is rejected.
//!
//! Errors are collected, not thrown: generation continues to the next
//! top-level node so one bad definition does not hide later diagnostics,
//! and `finish` fails if anything was recorded.
//!
//! # Module Structure
//!
//! - `functions.rs`: definitions, declarations, parameters, calls
//! - `statements.rs`: assignments, declarations, returns, expressions
//! - `control_flow.rs`: if-chains, while, for-range
//! - `globals.rs`: string literal constants
//! - `types.rs`: `resolve_node_type` and type-node mapping
//! - `platform.rs`: target triple / datalayout table
//! - `error.rs`: error types

mod control_flow;
mod error;
mod functions;
mod globals;
mod platform;
mod statements;
pub(crate) mod types;

pub use error::CodeGenError;
pub use platform::target_layout;
pub use types::resolve_node_type;

use crate::ast::{NodeKind, ParseNode};
use crate::build_settings::BuildSettings;
use crate::interpreter::Interpreter;
use crate::ir::{IrBlock, IrInstruction, IrModule};
use crate::symbols::{SageType, SymbolTable};
use std::collections::HashMap;
use std::path::PathBuf;

pub struct CodeGen {
    pub(super) table: SymbolTable,
    pub(super) module: IrModule,
    settings: BuildSettings,
    errors: Vec<String>,
    /// Per-function counter for expression result registers.
    temp_counter: usize,
    string_counter: usize,
    /// Counter for control-flow label groups, per function.
    block_counter: usize,
    string_constants: HashMap<String, String>,
    /// Basic blocks of the function currently being compiled.
    blocks: Vec<IrBlock>,
    current_block: usize,
    current_return_type: Option<SageType>,
    is_module_file: bool,
    modules_dir: Option<PathBuf>,
}

impl CodeGen {
    pub fn new(source_filename: &str, settings: BuildSettings) -> Result<Self, String> {
        let mut table = SymbolTable::new();
        settings.seed_symbol_table(&mut table)?;

        Ok(CodeGen {
            table,
            module: IrModule::new(source_filename),
            settings,
            errors: Vec::new(),
            temp_counter: 0,
            string_counter: 0,
            block_counter: 0,
            string_constants: HashMap::new(),
            blocks: Vec::new(),
            current_block: 0,
            current_return_type: None,
            is_module_file: false,
            modules_dir: None,
        })
    }

    /// Directory searched for `include`d module files.
    pub fn set_modules_dir(&mut self, dir: PathBuf) {
        self.modules_dir = Some(dir);
    }

    /// Walk the program root, classifying each top-level node and appending
    /// the resulting fragments to the module buckets.
    pub fn generate(&mut self, root: &ParseNode) {
        let ParseNode::Block(program) = root else {
            self.record_error("expected a program root node".to_string());
            return;
        };

        for node in &program.children {
            match node.kind() {
                NodeKind::FuncDef => self.compile_funcdef_construct(node),
                NodeKind::FuncDec => self.compile_funcdec_construct(node),
                NodeKind::Struct => self.compile_struct_construct(node),
                NodeKind::Assign | NodeKind::VarDec => self.compile_global(node),
                NodeKind::Include => self.compile_include(node),
                NodeKind::CompileTimeExecute => self.run_compile_time(node),
                _ => self.record_error(format!(
                    "statement is not allowed at the top level: {}",
                    node
                )),
            }
        }
    }

    /// Read the (possibly mutated) build settings back, stamp the target
    /// header, and hand over the finished module.
    pub fn finish(mut self) -> Result<(IrModule, BuildSettings), String> {
        let settings = self.settings.clone().read_back(&self.table);
        match platform::target_layout(&settings) {
            Ok((triple, datalayout)) => {
                self.module.target_triple = triple.to_string();
                self.module.target_datalayout = datalayout.to_string();
            }
            Err(e) => self.errors.push(e),
        }

        if !self.errors.is_empty() {
            return Err(self.errors.join("\n"));
        }
        Ok((self.module, settings))
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    //// top-level constructs ////

    /// Execute the statements of a `#run { ... }` block against the symbol
    /// table. No IR is emitted.
    fn run_compile_time(&mut self, node: &ParseNode) {
        let Some(ParseNode::Block(body)) = node.first_child() else {
            self.record_error("malformed compile time execution block".to_string());
            return;
        };

        let mut interpreter = Interpreter::new(&mut self.table);
        for statement in &body.children {
            interpreter.interpret(statement);
        }
        let errors = interpreter.take_errors();
        self.errors.extend(errors);
    }

    /// Resolve an `include "NAME"` to `<modules_dir>/NAME.sage`, parse it,
    /// and compile its definitions into this module. Module files must not
    /// contain includes of their own.
    fn compile_include(&mut self, node: &ParseNode) {
        if self.is_module_file {
            self.record_error(
                "include statements are not allowed inside module files".to_string(),
            );
            return;
        }

        let name = node
            .token()
            .lexeme
            .trim_matches('"')
            .to_string();

        let Some(modules_dir) = self.modules_dir.clone() else {
            self.record_error(format!(
                "cannot include '{}': no modules directory is available",
                name
            ));
            return;
        };

        let path = modules_dir.join(format!("{}.sage", name));
        let contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(e) => {
                self.record_error(format!(
                    "cannot include '{}': {}: {}",
                    name,
                    path.display(),
                    e
                ));
                return;
            }
        };

        let mut parser = crate::parser::Parser::new(path.display().to_string(), &contents);
        let tree = match parser.parse() {
            Ok(tree) => tree,
            Err(e) => {
                self.record_error(e);
                return;
            }
        };

        self.is_module_file = true;
        self.generate(&tree);
        self.is_module_file = false;
    }

    //// function body plumbing ////

    /// Reset per-function state and open the entry block.
    pub(super) fn begin_function_body(&mut self) {
        self.temp_counter = 0;
        self.block_counter = 0;
        self.blocks = vec![IrBlock::new("entry")];
        self.current_block = 0;
    }

    pub(super) fn take_function_body(&mut self) -> Vec<IrBlock> {
        self.current_block = 0;
        std::mem::take(&mut self.blocks)
    }

    /// Append an instruction to the block currently being filled.
    pub(super) fn emit(&mut self, instruction: IrInstruction) {
        self.blocks[self.current_block].instructions.push(instruction);
    }

    /// Open a new labelled block and make it current.
    pub(super) fn new_block(&mut self, label: impl Into<String>) {
        self.blocks.push(IrBlock::new(label));
        self.current_block = self.blocks.len() - 1;
    }

    /// True when the current block already ends in a terminator.
    pub(super) fn block_terminated(&self) -> bool {
        matches!(
            self.blocks[self.current_block].instructions.last(),
            Some(
                IrInstruction::Ret { .. }
                    | IrInstruction::RetVoid
                    | IrInstruction::Branch { .. }
                    | IrInstruction::CondBranch { .. }
            )
        )
    }

    pub(super) fn fresh_temp(&mut self) -> String {
        let name = format!("t{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    pub(super) fn next_label_group(&mut self) -> usize {
        let group = self.block_counter;
        self.block_counter += 1;
        group
    }

    pub(super) fn record_error(&mut self, message: String) {
        self.errors.push(message);
    }
}
