//! LLVM-IR text fragments
//!
//! The module is assembled from four buckets (declarations, definitions,
//! globals, struct types), each appended in source order and serialised
//! once at the end. Every fragment knows how to print itself; instructions
//! additionally expose their result register and type so the code generator
//! can thread operands between them.
//!
//! Operand strings are stored fully rendered: literals as `3`, registers as
//! `%t0`, globals as `@.str.0`, constant expressions verbatim.

use std::fmt::Write as _;

/// What a single instruction does, in the taxonomy the code generator
/// dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrKind {
    Init,
    Ref,
    Param,
    Store,
    Ret,
    Expression,
    Compare,
    Call,
    GetElementPtr,
    Branch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrInstruction {
    Alloca {
        name: String,
        irtype: String,
    },
    Load {
        result: String,
        irtype: String,
        pointer: String,
    },
    Store {
        irtype: String,
        value: String,
        pointer: String,
    },
    /// A named parameter in a signature, `i32 %a`.
    Param {
        name: String,
        irtype: String,
    },
    /// The `...` tail of a variadic signature.
    Vararg,
    RetVoid,
    Ret {
        irtype: String,
        value: String,
    },
    /// An arithmetic instruction, `%r = add i32 a, b`.
    Binary {
        result: String,
        op: String,
        irtype: String,
        lhs: String,
        rhs: String,
    },
    /// A comparison, `%r = icmp slt i32 a, b`; the result is always i1.
    Compare {
        result: String,
        op: String,
        irtype: String,
        lhs: String,
        rhs: String,
    },
    Call {
        result: Option<String>,
        return_type: String,
        name: String,
        arguments: Vec<(String, String)>,
    },
    GetElementPtr {
        result: String,
        base_type: String,
        pointer: String,
        indices: Vec<(String, String)>,
    },
    Branch {
        label: String,
    },
    CondBranch {
        condition: String,
        then_label: String,
        else_label: String,
    },
}

impl IrInstruction {
    pub fn to_llvm(&self) -> String {
        match self {
            IrInstruction::Alloca { name, irtype } => {
                format!("%{} = alloca {}", name, irtype)
            }
            IrInstruction::Load {
                result,
                irtype,
                pointer,
            } => format!("%{} = load {}, {}* {}", result, irtype, irtype, pointer),
            IrInstruction::Store {
                irtype,
                value,
                pointer,
            } => format!("store {} {}, {}* {}", irtype, value, irtype, pointer),
            IrInstruction::Param { name, irtype } => format!("{} %{}", irtype, name),
            IrInstruction::Vararg => "...".to_string(),
            IrInstruction::RetVoid => "ret void".to_string(),
            IrInstruction::Ret { irtype, value } => format!("ret {} {}", irtype, value),
            IrInstruction::Binary {
                result,
                op,
                irtype,
                lhs,
                rhs,
            }
            | IrInstruction::Compare {
                result,
                op,
                irtype,
                lhs,
                rhs,
            } => format!("%{} = {} {} {}, {}", result, op, irtype, lhs, rhs),
            IrInstruction::Call {
                result,
                return_type,
                name,
                arguments,
            } => {
                let mut text = String::new();
                if let Some(result) = result {
                    let _ = write!(text, "%{} = ", result);
                }
                let _ = write!(text, "call {} @{}(", return_type, name);
                let rendered: Vec<String> = arguments
                    .iter()
                    .map(|(irtype, value)| format!("{} {}", irtype, value))
                    .collect();
                text.push_str(&rendered.join(", "));
                text.push(')');
                text
            }
            IrInstruction::GetElementPtr {
                result,
                base_type,
                pointer,
                indices,
            } => {
                let rendered: Vec<String> = indices
                    .iter()
                    .map(|(irtype, value)| format!("{} {}", irtype, value))
                    .collect();
                format!(
                    "%{} = getelementptr {}, {}* {}, {}",
                    result,
                    base_type,
                    base_type,
                    pointer,
                    rendered.join(", ")
                )
            }
            IrInstruction::Branch { label } => format!("br label %{}", label),
            IrInstruction::CondBranch {
                condition,
                then_label,
                else_label,
            } => format!(
                "br i1 {}, label %{}, label %{}",
                condition, then_label, else_label
            ),
        }
    }

    /// The register this instruction defines, rendered with its `%` sigil.
    pub fn result_register(&self) -> Option<String> {
        match self {
            IrInstruction::Alloca { name, .. } => Some(format!("%{}", name)),
            IrInstruction::Load { result, .. }
            | IrInstruction::Binary { result, .. }
            | IrInstruction::Compare { result, .. }
            | IrInstruction::GetElementPtr { result, .. } => Some(format!("%{}", result)),
            IrInstruction::Call { result, .. } => result.as_ref().map(|r| format!("%{}", r)),
            _ => None,
        }
    }

    pub fn type_info(&self) -> (&str, InstrKind) {
        match self {
            IrInstruction::Alloca { irtype, .. } => (irtype, InstrKind::Init),
            IrInstruction::Load { irtype, .. } => (irtype, InstrKind::Ref),
            IrInstruction::Store { irtype, .. } => (irtype, InstrKind::Store),
            IrInstruction::Param { irtype, .. } => (irtype, InstrKind::Param),
            IrInstruction::Vararg => ("...", InstrKind::Param),
            IrInstruction::RetVoid => ("void", InstrKind::Ret),
            IrInstruction::Ret { irtype, .. } => (irtype, InstrKind::Ret),
            IrInstruction::Binary { irtype, .. } => (irtype, InstrKind::Expression),
            IrInstruction::Compare { .. } => ("i1", InstrKind::Compare),
            IrInstruction::Call { return_type, .. } => (return_type, InstrKind::Call),
            IrInstruction::GetElementPtr { base_type, .. } => {
                (base_type, InstrKind::GetElementPtr)
            }
            IrInstruction::Branch { .. } | IrInstruction::CondBranch { .. } => {
                ("void", InstrKind::Branch)
            }
        }
    }
}

/// A labelled basic block.
#[derive(Debug, Clone, PartialEq)]
pub struct IrBlock {
    pub label: String,
    pub instructions: Vec<IrInstruction>,
}

impl IrBlock {
    pub fn new(label: impl Into<String>) -> Self {
        IrBlock {
            label: label.into(),
            instructions: Vec::new(),
        }
    }

    pub fn to_llvm(&self) -> String {
        let mut text = format!("{}:\n", self.label);
        for instruction in &self.instructions {
            let _ = writeln!(text, "\t{}", instruction.to_llvm());
        }
        text
    }
}

/// A function definition (with body blocks) or declaration (without).
#[derive(Debug, Clone, PartialEq)]
pub struct IrFunc {
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<IrInstruction>,
    pub calling_conv: Option<String>,
    pub attribute: Option<String>,
    pub body: Vec<IrBlock>,
}

impl IrFunc {
    pub fn to_llvm(&self) -> String {
        let mut text = String::new();
        let is_definition = !self.body.is_empty();
        text.push_str(if is_definition { "define " } else { "declare " });

        if let Some(conv) = &self.calling_conv {
            text.push_str(conv);
            text.push(' ');
        }

        let _ = write!(text, "{} @{}(", self.return_type, self.name);
        let rendered: Vec<String> = self.parameters.iter().map(|p| p.to_llvm()).collect();
        text.push_str(&rendered.join(", "));
        text.push(')');

        if let Some(attribute) = &self.attribute {
            let _ = write!(text, " {}", attribute);
        }

        if is_definition {
            text.push_str(" {\n");
            for block in &self.body {
                text.push_str(&block.to_llvm());
            }
            text.push('}');
        }

        text
    }
}

/// A module-level constant or variable.
#[derive(Debug, Clone, PartialEq)]
pub struct IrGlobal {
    pub name: String,
    /// `constant` for string literals, `global` for mutable globals.
    pub keyword: &'static str,
    pub irtype: String,
    pub value: String,
}

impl IrGlobal {
    pub fn to_llvm(&self) -> String {
        format!(
            "@{} = {} {} {}",
            self.name, self.keyword, self.irtype, self.value
        )
    }
}

/// A named struct type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct IrStruct {
    pub name: String,
    pub field_types: Vec<String>,
    pub packed: bool,
}

impl IrStruct {
    pub fn to_llvm(&self) -> String {
        let (open, close) = if self.packed { ("<{", "}>") } else { ("{", "}") };
        format!(
            "%{} = type {} {} {}",
            self.name,
            open,
            self.field_types.join(", "),
            close
        )
    }
}

/// A whole module: header plus the four ordered buckets.
#[derive(Debug, Clone, Default)]
pub struct IrModule {
    pub source_filename: String,
    pub target_datalayout: String,
    pub target_triple: String,
    pub func_decs: Vec<IrFunc>,
    pub func_defs: Vec<IrFunc>,
    pub globals: Vec<IrGlobal>,
    pub structs: Vec<IrStruct>,
}

impl IrModule {
    pub fn new(source_filename: impl Into<String>) -> Self {
        IrModule {
            source_filename: source_filename.into(),
            ..Default::default()
        }
    }

    pub fn to_llvm(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "source_filename = \"{}\"", self.source_filename);
        let _ = writeln!(text, "target datalayout = \"{}\"", self.target_datalayout);
        let _ = writeln!(text, "target triple = \"{}\"", self.target_triple);
        text.push('\n');

        for declaration in &self.func_decs {
            text.push_str(&declaration.to_llvm());
            text.push('\n');
        }
        if !self.func_decs.is_empty() {
            text.push('\n');
        }

        for definition in &self.func_defs {
            text.push_str(&definition.to_llvm());
            text.push_str("\n\n");
        }

        for global in &self.globals {
            text.push_str(&global.to_llvm());
            text.push('\n');
        }
        if !self.globals.is_empty() {
            text.push('\n');
        }

        for structure in &self.structs {
            text.push_str(&structure.to_llvm());
            text.push('\n');
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloca_load_store_shapes() {
        let alloca = IrInstruction::Alloca {
            name: "x".into(),
            irtype: "i32".into(),
        };
        assert_eq!(alloca.to_llvm(), "%x = alloca i32");
        assert_eq!(alloca.result_register(), Some("%x".into()));

        let load = IrInstruction::Load {
            result: "x.1".into(),
            irtype: "i32".into(),
            pointer: "%x".into(),
        };
        assert_eq!(load.to_llvm(), "%x.1 = load i32, i32* %x");

        let store = IrInstruction::Store {
            irtype: "i32".into(),
            value: "%t0".into(),
            pointer: "%x".into(),
        };
        assert_eq!(store.to_llvm(), "store i32 %t0, i32* %x");
        assert_eq!(store.result_register(), None);
    }

    #[test]
    fn test_binary_and_ret_shapes() {
        let add = IrInstruction::Binary {
            result: "t0".into(),
            op: "add".into(),
            irtype: "i32".into(),
            lhs: "3".into(),
            rhs: "4".into(),
        };
        assert_eq!(add.to_llvm(), "%t0 = add i32 3, 4");

        let ret = IrInstruction::Ret {
            irtype: "i32".into(),
            value: "%t0".into(),
        };
        assert_eq!(ret.to_llvm(), "ret i32 %t0");
        assert_eq!(IrInstruction::RetVoid.to_llvm(), "ret void");
    }

    #[test]
    fn test_call_shape() {
        let call = IrInstruction::Call {
            result: Some("t1".into()),
            return_type: "i32".into(),
            name: "add".into(),
            arguments: vec![("i32".into(), "%a".into()), ("i32".into(), "%b".into())],
        };
        assert_eq!(call.to_llvm(), "%t1 = call i32 @add(i32 %a, i32 %b)");

        let void_call = IrInstruction::Call {
            result: None,
            return_type: "void".into(),
            name: "tick".into(),
            arguments: vec![],
        };
        assert_eq!(void_call.to_llvm(), "call void @tick()");
    }

    #[test]
    fn test_function_definition_and_declaration() {
        let mut entry = IrBlock::new("entry");
        entry.instructions.push(IrInstruction::Ret {
            irtype: "i32".into(),
            value: "0".into(),
        });
        let define = IrFunc {
            name: "main".into(),
            return_type: "i32".into(),
            parameters: vec![],
            calling_conv: None,
            attribute: None,
            body: vec![entry],
        };
        assert_eq!(define.to_llvm(), "define i32 @main() {\nentry:\n\tret i32 0\n}");

        let declare = IrFunc {
            name: "puts".into(),
            return_type: "i32".into(),
            parameters: vec![IrInstruction::Param {
                name: "s".into(),
                irtype: "i8*".into(),
            }],
            calling_conv: None,
            attribute: None,
            body: vec![],
        };
        assert_eq!(declare.to_llvm(), "declare i32 @puts(i8* %s)");
    }

    #[test]
    fn test_variadic_signature_closes_with_dots() {
        let declare = IrFunc {
            name: "printf".into(),
            return_type: "i32".into(),
            parameters: vec![
                IrInstruction::Param {
                    name: "fmt".into(),
                    irtype: "i8*".into(),
                },
                IrInstruction::Vararg,
            ],
            calling_conv: None,
            attribute: None,
            body: vec![],
        };
        assert_eq!(declare.to_llvm(), "declare i32 @printf(i8* %fmt, ...)");
    }

    #[test]
    fn test_string_global_shape() {
        let global = IrGlobal {
            name: ".str.0".into(),
            keyword: "constant",
            irtype: "[ 3 x i8 ]".into(),
            value: "c\"hi\\00\"".into(),
        };
        assert_eq!(
            global.to_llvm(),
            "@.str.0 = constant [ 3 x i8 ] c\"hi\\00\""
        );
    }

    #[test]
    fn test_struct_type_shape() {
        let structure = IrStruct {
            name: "Point".into(),
            field_types: vec!["i32".into(), "i32".into()],
            packed: false,
        };
        assert_eq!(structure.to_llvm(), "%Point = type { i32, i32 }");
    }

    #[test]
    fn test_module_header_and_bucket_order() {
        let mut module = IrModule::new("demo.sage");
        module.target_datalayout = "e-m:e".into();
        module.target_triple = "x86_64-unknown-linux-gnu".into();
        module.globals.push(IrGlobal {
            name: ".str.0".into(),
            keyword: "constant",
            irtype: "[ 3 x i8 ]".into(),
            value: "c\"hi\\00\"".into(),
        });

        let text = module.to_llvm();
        assert!(text.starts_with("source_filename = \"demo.sage\"\n"));
        assert!(text.contains("target datalayout = \"e-m:e\"\n"));
        assert!(text.contains("target triple = \"x86_64-unknown-linux-gnu\"\n"));
        assert!(text.contains("@.str.0 = constant"));
    }
}
