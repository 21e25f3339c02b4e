//! Scoped symbol table
//!
//! Scopes form a tree held in one arena; each scope stores its parent index
//! so lookups can walk toward the root without self-referential borrows.
//! The code generator enters a child scope by swapping the current index and
//! restores the saved index on the way out. Function, struct, and the
//! program root each own a scope.

use std::collections::HashMap;
use std::fmt;

/// Closed set of datatypes the language knows about.
#[derive(Debug, Clone, PartialEq)]
pub enum SageType {
    Int,
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Char,
    Void,
    Vararg,
    Struct(String),
    Array(Box<SageType>, usize),
    Pointer(Box<SageType>),
}

impl SageType {
    /// Map a type keyword (or struct name) to a datatype.
    pub fn from_name(name: &str) -> SageType {
        match name {
            "int" => SageType::Int,
            "bool" => SageType::Bool,
            "i16" => SageType::I16,
            "i32" => SageType::I32,
            "i64" => SageType::I64,
            "f32" => SageType::F32,
            "f64" => SageType::F64,
            "char" => SageType::Char,
            "void" => SageType::Void,
            _ => SageType::Struct(name.to_string()),
        }
    }

    /// The LLVM spelling of this type. Total on everything the parser can
    /// produce; arrays carry their length in the printed form.
    pub fn to_llvm(&self) -> String {
        match self {
            SageType::Int | SageType::I32 => "i32".to_string(),
            SageType::Bool => "i1".to_string(),
            SageType::I16 => "i16".to_string(),
            SageType::I64 => "i64".to_string(),
            SageType::F32 => "float".to_string(),
            SageType::F64 => "double".to_string(),
            SageType::Char => "i8".to_string(),
            SageType::Void => "void".to_string(),
            SageType::Vararg => "...".to_string(),
            SageType::Struct(name) => format!("%{}", name),
            SageType::Array(element, length) => {
                format!("[ {} x {} ]", length, element.to_llvm())
            }
            SageType::Pointer(element) => format!("{}*", element.to_llvm()),
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, SageType::F32 | SageType::F64)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, SageType::Void)
    }

    /// Two datatypes are interchangeable when they lower to the same LLVM
    /// type; `int` is an alias of `i32` this way.
    pub fn matches(&self, other: &SageType) -> bool {
        self.to_llvm() == other.to_llvm()
    }
}

impl fmt::Display for SageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_llvm())
    }
}

/// A value computed at compile time by the `#run` interpreter.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicValue {
    pub datatype: SageType,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Constant,
    Function,
    Parameter,
    Struct,
    If,
    For,
    ProgramRoot,
    Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(usize);

#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub datatype: SageType,
    pub value: Option<AtomicValue>,
    /// Owned child scope: function bodies, struct fields.
    pub scope: Option<ScopeId>,
    pub parameter_count: usize,
    /// Position within a parameter list or struct field order.
    pub parameter_index: usize,
    /// Declared parameter types for function symbols; a trailing `Vararg`
    /// marks a variadic signature.
    pub parameter_types: Vec<SageType>,
    pub array_length: usize,
    /// SSA register names handed out for this symbol, with the source value
    /// each one was created for, in insertion order.
    pub registers: Vec<(String, String)>,
}

impl Symbol {
    fn new(name: String, kind: SymbolKind, datatype: SageType) -> Self {
        Symbol {
            name,
            kind,
            datatype,
            value: None,
            scope: None,
            parameter_count: 0,
            parameter_index: 0,
            parameter_types: Vec::new(),
            array_length: 0,
            registers: Vec::new(),
        }
    }

    /// Hand out a fresh SSA register name for this symbol and record what it
    /// was produced for. Names are `<symbol>.<n>`, which cannot collide with
    /// user identifiers because those never contain dots.
    pub fn new_register(&mut self, associated_value: &str) -> String {
        let register = format!("{}.{}", self.name, self.registers.len() + 1);
        self.registers
            .push((register.clone(), associated_value.to_string()));
        register
    }

    pub fn set_value(&mut self, datatype: SageType, value: Value) {
        self.value = Some(AtomicValue { datatype, value });
    }

    pub fn sage_datatype_to_llvm(&self) -> String {
        self.datatype.to_llvm()
    }

    /// Parameter signature as it appears in the emitted declaration.
    pub fn signature(&self) -> String {
        let rendered: Vec<String> = self.parameter_types.iter().map(|t| t.to_llvm()).collect();
        format!("({})", rendered.join(", "))
    }
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    /// Name -> symbol, plus the declaration order for struct field indices.
    names: HashMap<String, SymbolId>,
    ordered: Vec<SymbolId>,
}

/// Outcome of `add`: the original reports OK or COLLISION.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    Collision(String),
    Undefined(String),
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolError::Collision(name) => {
                write!(f, "name '{}' is already defined in this scope", name)
            }
            SymbolError::Undefined(name) => write!(f, "name '{}' is not defined", name),
        }
    }
}

pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    current: ScopeId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope {
                parent: None,
                names: HashMap::new(),
                ordered: Vec::new(),
            }],
            symbols: Vec::new(),
            current: ScopeId(0),
        }
    }

    pub fn root_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    /// Create a new scope whose lookups fall through to `parent`.
    pub fn new_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(parent),
            names: HashMap::new(),
            ordered: Vec::new(),
        });
        id
    }

    /// Swap the current scope, returning the previous one so the caller can
    /// restore it on exit.
    pub fn enter_scope(&mut self, scope: ScopeId) -> ScopeId {
        std::mem::replace(&mut self.current, scope)
    }

    pub fn leave_scope(&mut self, saved: ScopeId) {
        self.current = saved;
    }

    /// Declare a name in the current scope.
    pub fn add(
        &mut self,
        name: &str,
        kind: SymbolKind,
        value: Option<AtomicValue>,
        datatype: SageType,
    ) -> Result<SymbolId, SymbolError> {
        self.add_in(self.current, name, kind, value, datatype)
    }

    pub fn add_in(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: SymbolKind,
        value: Option<AtomicValue>,
        datatype: SageType,
    ) -> Result<SymbolId, SymbolError> {
        if self.scopes[scope.0].names.contains_key(name) {
            return Err(SymbolError::Collision(name.to_string()));
        }

        let id = SymbolId(self.symbols.len());
        let mut symbol = Symbol::new(name.to_string(), kind, datatype);
        symbol.value = value;
        self.symbols.push(symbol);
        self.scopes[scope.0].names.insert(name.to_string(), id);
        self.scopes[scope.0].ordered.push(id);
        Ok(id)
    }

    /// Resolve a name against the current scope chain, walking parent
    /// indices toward the root.
    pub fn lookup(&self, name: &str) -> Result<SymbolId, SymbolError> {
        self.lookup_from(self.current, name)
    }

    pub fn lookup_from(&self, scope: ScopeId, name: &str) -> Result<SymbolId, SymbolError> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            if let Some(&symbol) = self.scopes[id.0].names.get(name) {
                return Ok(symbol);
            }
            cursor = self.scopes[id.0].parent;
        }
        Err(SymbolError::Undefined(name.to_string()))
    }

    /// Resolve a name in exactly one scope, without walking parents. Field
    /// lookups use this so `point.x` cannot accidentally find an outer `x`.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Result<SymbolId, SymbolError> {
        self.scopes[scope.0]
            .names
            .get(name)
            .copied()
            .ok_or_else(|| SymbolError::Undefined(name.to_string()))
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0]
    }

    /// Declaration-ordered symbols of a scope; struct field indices come
    /// from positions in this list.
    pub fn ordered_symbols(&self, scope: ScopeId) -> &[SymbolId] {
        &self.scopes[scope.0].ordered
    }

    /// Static index of a field within a struct scope.
    pub fn field_index(&self, scope: ScopeId, name: &str) -> Result<usize, SymbolError> {
        let target = self.lookup_local(scope, name)?;
        Ok(self.scopes[scope.0]
            .ordered
            .iter()
            .position(|&id| id == target)
            .expect("field listed in names but not in order"))
    }
}
