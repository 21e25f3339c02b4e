//! Build settings
//!
//! The `build_settings` struct is visible to compile-time `#run` blocks as
//! an ordinary record in the program root scope. Defaults come from the
//! host (optionally overridden by a `sage.toml` next to the source file),
//! `#run` statements mutate the record through the interpreter, and code
//! generation reads the final state back out of the symbol table.

use crate::symbols::{AtomicValue, SageType, SymbolKind, SymbolTable, Value};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LINUX" => Ok(Platform::Linux),
            "DARWIN" => Ok(Platform::Darwin),
            "WINDOWS" => Ok(Platform::Windows),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Arm,
    X86,
    X64,
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ARM" => Ok(Architecture::Arm),
            "X86" => Ok(Architecture::X86),
            "X64" => Ok(Architecture::X64),
            other => Err(format!("unknown architecture '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptLevel {
    None,
    One,
    Two,
    Three,
}

impl OptLevel {
    pub fn from_index(index: i64) -> OptLevel {
        match index {
            1 => OptLevel::One,
            2 => OptLevel::Two,
            3 => OptLevel::Three,
            _ => OptLevel::None,
        }
    }

    /// The `-O<n>` flag passed through to the assembler.
    pub fn flag(self) -> &'static str {
        match self {
            OptLevel::None => "-O0",
            OptLevel::One => "-O1",
            OptLevel::Two => "-O2",
            OptLevel::Three => "-O3",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub targetfile: String,
    pub executable_name: String,
    pub platform: Platform,
    pub architecture: Architecture,
    pub bitsize: u32,
    pub optimization_level: OptLevel,
    pub program_arguments: String,
    pub argument_count: i64,
}

impl BuildSettings {
    pub fn defaults(targetfile: &str) -> Self {
        let platform = if cfg!(target_os = "macos") {
            Platform::Darwin
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        };
        let architecture = if cfg!(target_arch = "aarch64") {
            Architecture::Arm
        } else {
            Architecture::X64
        };

        BuildSettings {
            targetfile: targetfile.to_string(),
            executable_name: "a.out".to_string(),
            platform,
            architecture,
            bitsize: 64,
            optimization_level: OptLevel::None,
            program_arguments: String::new(),
            argument_count: 0,
        }
    }

    /// Apply overrides from an optional `sage.toml` in `dir`.
    pub fn with_project_config(mut self, dir: &Path) -> Self {
        let Some(config) = ProjectConfig::load(dir) else {
            return self;
        };
        let Some(build) = config.build else {
            return self;
        };

        if let Some(name) = build.executable_name {
            self.executable_name = name;
        }
        if let Some(platform) = build.platform.and_then(|p| p.parse().ok()) {
            self.platform = platform;
        }
        if let Some(arch) = build.architecture.and_then(|a| a.parse().ok()) {
            self.architecture = arch;
        }
        if let Some(bitsize) = build.bitsize {
            self.bitsize = bitsize;
        }
        if let Some(level) = build.optimization_level {
            self.optimization_level = OptLevel::from_index(level);
        }
        self
    }

    /// Install `build_settings` as a struct symbol in the program root so
    /// `#run` blocks can assign to its fields.
    pub fn seed_symbol_table(&self, table: &mut SymbolTable) -> Result<(), String> {
        let root = table.root_scope();
        let fields = table.new_scope(root);

        let entries: Vec<(&str, AtomicValue)> = vec![
            ("targetfile", string_value(&self.targetfile)),
            ("executable_name", string_value(&self.executable_name)),
            ("platform", string_value(platform_name(self.platform))),
            (
                "architecture",
                string_value(architecture_name(self.architecture)),
            ),
            ("bitsize", int_value(self.bitsize as i64)),
            (
                "optimization_level",
                int_value(opt_index(self.optimization_level)),
            ),
            ("program_arguments", string_value(&self.program_arguments)),
            ("argument_count", int_value(self.argument_count)),
        ];

        for (name, value) in entries {
            let datatype = value.datatype.clone();
            table
                .add_in(fields, name, SymbolKind::Variable, Some(value), datatype)
                .map_err(|e| e.to_string())?;
        }

        let id = table
            .add_in(
                root,
                "build_settings",
                SymbolKind::Struct,
                None,
                SageType::Struct("build_settings".to_string()),
            )
            .map_err(|e| e.to_string())?;
        table.symbol_mut(id).scope = Some(fields);
        Ok(())
    }

    /// Read the (possibly `#run`-mutated) record back out of the table.
    /// Fields that were never set keep their defaults.
    pub fn read_back(mut self, table: &SymbolTable) -> Self {
        let Ok(id) = table.lookup_from(table.root_scope(), "build_settings") else {
            return self;
        };
        let Some(fields) = table.symbol(id).scope else {
            return self;
        };

        for &field_id in table.ordered_symbols(fields) {
            let field = table.symbol(field_id);
            let Some(value) = &field.value else { continue };
            match (field.name.as_str(), &value.value) {
                ("targetfile", Value::Str(s)) => self.targetfile = s.clone(),
                ("executable_name", Value::Str(s)) => self.executable_name = s.clone(),
                ("platform", Value::Str(s)) => {
                    if let Ok(platform) = s.parse() {
                        self.platform = platform;
                    }
                }
                ("architecture", Value::Str(s)) => {
                    if let Ok(arch) = s.parse() {
                        self.architecture = arch;
                    }
                }
                ("bitsize", Value::Int(n)) => self.bitsize = *n as u32,
                ("optimization_level", Value::Int(n)) => {
                    self.optimization_level = OptLevel::from_index(*n)
                }
                ("program_arguments", Value::Str(s)) => self.program_arguments = s.clone(),
                ("argument_count", Value::Int(n)) => self.argument_count = *n,
                _ => {}
            }
        }
        self
    }
}

fn string_value(s: &str) -> AtomicValue {
    AtomicValue {
        datatype: SageType::Array(Box::new(SageType::Char), s.len() + 1),
        value: Value::Str(s.to_string()),
    }
}

fn int_value(n: i64) -> AtomicValue {
    AtomicValue {
        datatype: SageType::I32,
        value: Value::Int(n),
    }
}

fn platform_name(platform: Platform) -> &'static str {
    match platform {
        Platform::Linux => "LINUX",
        Platform::Darwin => "DARWIN",
        Platform::Windows => "WINDOWS",
    }
}

fn architecture_name(arch: Architecture) -> &'static str {
    match arch {
        Architecture::Arm => "ARM",
        Architecture::X86 => "X86",
        Architecture::X64 => "X64",
    }
}

fn opt_index(level: OptLevel) -> i64 {
    match level {
        OptLevel::None => 0,
        OptLevel::One => 1,
        OptLevel::Two => 2,
        OptLevel::Three => 3,
    }
}

/// Optional per-project configuration, `sage.toml` beside the source file.
#[derive(Debug, Deserialize)]
struct ProjectConfig {
    build: Option<BuildSection>,
}

#[derive(Debug, Deserialize)]
struct BuildSection {
    executable_name: Option<String>,
    platform: Option<String>,
    architecture: Option<String>,
    bitsize: Option<u32>,
    optimization_level: Option<i64>,
}

impl ProjectConfig {
    fn load(dir: &Path) -> Option<ProjectConfig> {
        let path = dir.join("sage.toml");
        let contents = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("warning: ignoring malformed sage.toml: {}", e);
                None
            }
        }
    }
}
