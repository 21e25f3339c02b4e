//! Sage Compiler Library
//!
//! Provides compilation from .sage source to LLVM IR and native executables.
//!
//! The pipeline is one-shot and synchronous: bytes -> lexer -> tokens ->
//! parser -> AST -> (`#run` blocks fold through the interpreter) -> IR
//! generation -> IR text -> `llc` -> `gcc`. Compile-time execution mutates
//! the `build_settings` record that code generation consults for the target
//! triple and the executable name.

pub mod ast;
pub mod build_settings;
pub mod codegen;
pub mod interpreter;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod queue;
pub mod symbols;
pub mod token;

pub use ast::{NodeKind, ParseNode};
pub use build_settings::{BuildSettings, OptLevel};
pub use codegen::{CodeGen, CodeGenError};
pub use ir::IrModule;
pub use lexer::Lexer;
pub use parser::Parser;
pub use symbols::{SageType, SymbolTable};
pub use token::{Token, TokenKind};

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

/// Accepted source file suffixes.
pub const SOURCE_SUFFIXES: &[&str] = &["g", "sage"];

/// Cache for the llc availability probe; it only runs once per process.
static LLC_CHECKED: OnceLock<Result<(), String>> = OnceLock::new();

/// Check that `llc` is on the path before trying to assemble anything.
fn check_llc() -> Result<(), String> {
    LLC_CHECKED
        .get_or_init(|| {
            let output = Command::new("llc")
                .arg("--version")
                .output()
                .map_err(|e| format!("failed to run llc: {}. Please install LLVM.", e))?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(format!(
                    "llc --version failed with exit code {:?}: {}",
                    output.status.code(),
                    stderr
                ));
            }
            Ok(())
        })
        .clone()
}

/// Locate the directory `include` statements resolve against: the
/// `SAGE_MODULES` environment variable, then `modules/` beside the
/// executable, then `modules/` in the working directory.
pub fn find_modules_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SAGE_MODULES") {
        let path = PathBuf::from(path);
        if path.is_dir() {
            return Some(path);
        }
        eprintln!(
            "warning: SAGE_MODULES is set to '{}' but that directory does not exist",
            path.display()
        );
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let modules = exe_dir.join("modules");
            if modules.is_dir() {
                return Some(modules);
            }
        }
    }

    let local = PathBuf::from("modules");
    if local.is_dir() {
        return Some(local.canonicalize().unwrap_or(local));
    }

    None
}

fn check_source_suffix(path: &Path) -> Result<(), String> {
    let suffix = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if SOURCE_SUFFIXES.contains(&suffix) {
        return Ok(());
    }
    Err(format!(
        "cannot compile '{}': source files must end in .g or .sage",
        path.display()
    ))
}

#[derive(Debug, Default, Clone)]
pub struct CompileOptions {
    /// Override for the output executable path; defaults to
    /// `build_settings.executable_name`.
    pub output: Option<PathBuf>,
    /// Keep the intermediate `.ll` file after a successful build.
    pub keep_ir: bool,
    /// Stop after writing the `.ll` file.
    pub emit_ir_only: bool,
    /// Dump the parse tree before generating code.
    pub show_ast: bool,
}

/// Compile a source file to a native executable. Returns the path of the
/// produced binary.
pub fn compile_file(source_path: &Path, options: &CompileOptions) -> Result<PathBuf, String> {
    check_source_suffix(source_path)?;

    let contents = std::fs::read(source_path)
        .map_err(|e| format!("failed to read '{}': {}", source_path.display(), e))?;

    let filename = source_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.sage");
    let source_dir = source_path.parent().unwrap_or(Path::new("."));
    let settings = BuildSettings::defaults(filename).with_project_config(source_dir);

    let mut parser = Parser::new(source_path.display().to_string(), &contents);
    let tree = parser.parse()?;

    if options.show_ast {
        let mut rendered = String::new();
        tree.show_tree(&mut rendered, 0);
        print!("{}", rendered);
    }

    let mut codegen = CodeGen::new(filename, settings)?;
    if let Some(modules_dir) = find_modules_dir() {
        codegen.set_modules_dir(modules_dir);
    }
    codegen.generate(&tree);
    let (module, settings) = codegen.finish()?;

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.executable_name));

    let ir_path = output.with_extension("ll");
    write_intermediate(&ir_path, module.to_llvm().as_bytes())?;

    if options.emit_ir_only {
        return Ok(output);
    }

    check_llc()?;

    let object_path = output.with_extension("o");
    run_tool(
        Command::new("llc")
            .arg(settings.optimization_level.flag())
            .arg("-filetype=obj")
            .arg(&ir_path)
            .arg("-o")
            .arg(&object_path),
        "llc",
    )?;

    run_tool(
        Command::new("gcc").arg(&object_path).arg("-o").arg(&output),
        "gcc",
    )?;

    // intermediates are removed only on success; failures above leave them
    // in place for inspection
    std::fs::remove_file(&object_path).ok();
    if !options.keep_ir {
        std::fs::remove_file(&ir_path).ok();
    }

    Ok(output)
}

/// Compile source text straight to LLVM IR text (for tests and `--emit-ir`
/// style tooling).
pub fn compile_to_ir(source: &str) -> Result<String, String> {
    compile_to_ir_named("main.sage", source)
}

pub fn compile_to_ir_named(filename: &str, source: &str) -> Result<String, String> {
    let mut parser = Parser::new(filename, source.as_bytes());
    let tree = parser.parse()?;

    let settings = BuildSettings::defaults(filename);
    let mut codegen = CodeGen::new(filename, settings)?;
    if let Some(modules_dir) = find_modules_dir() {
        codegen.set_modules_dir(modules_dir);
    }
    codegen.generate(&tree);
    let (module, _) = codegen.finish()?;
    Ok(module.to_llvm())
}

fn write_intermediate(path: &Path, contents: &[u8]) -> Result<(), String> {
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write '{}': {}", path.display(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| format!("failed to set permissions on '{}': {}", path.display(), e))?;
    }

    Ok(())
}

fn run_tool(command: &mut Command, name: &str) -> Result<(), String> {
    let output = command
        .output()
        .map_err(|e| format!("failed to run {}: {}", name, e))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} failed:\n{}", name, stderr));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_check_accepts_sage_and_g() {
        assert!(check_source_suffix(Path::new("demo.sage")).is_ok());
        assert!(check_source_suffix(Path::new("demo.g")).is_ok());
    }

    #[test]
    fn test_suffix_check_rejects_other_files() {
        assert!(check_source_suffix(Path::new("demo.txt")).is_err());
        assert!(check_source_suffix(Path::new("demo")).is_err());
    }

    #[test]
    fn test_compile_file_rejects_bad_suffix() {
        let err = compile_file(Path::new("demo.txt"), &CompileOptions::default()).unwrap_err();
        assert!(err.contains(".g or .sage"));
    }

    #[test]
    fn test_compile_to_ir_smoke() {
        let ir = compile_to_ir("main :: () -> int { ret 0 }").unwrap();
        assert!(ir.contains("define i32 @main() {\nentry:\n\tret i32 0\n}"));
        assert!(ir.contains("source_filename = \"main.sage\""));
        assert!(ir.contains("target triple = "));
    }

    #[test]
    fn test_parse_errors_abort_compilation() {
        let err = compile_to_ir("main :: ( -> int { ret 0 }").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn test_emit_ir_only_writes_ll_file() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("demo.sage");
        std::fs::write(&source_path, "main :: () -> int { ret 0 }").unwrap();

        let options = CompileOptions {
            output: Some(dir.path().join("demo")),
            emit_ir_only: true,
            ..Default::default()
        };
        compile_file(&source_path, &options).unwrap();

        let ir = std::fs::read_to_string(dir.path().join("demo.ll")).unwrap();
        assert!(ir.contains("define i32 @main()"));
    }

    #[test]
    fn test_project_config_names_executable() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("demo.sage");
        std::fs::write(&source_path, "main :: () -> int { ret 0 }").unwrap();
        std::fs::write(
            dir.path().join("sage.toml"),
            "[build]\nexecutable_name = \"tool\"\n",
        )
        .unwrap();

        // without an explicit output the executable name names the .ll too;
        // use the current dir of the test process for relative outputs
        let settings =
            BuildSettings::defaults("demo.sage").with_project_config(dir.path());
        assert_eq!(settings.executable_name, "tool");
    }

    /// Compiling a module standalone and compiling it as an include yield
    /// identical IR for the shared code, modulo the source_filename header.
    #[test]
    fn test_idempotent_include() {
        let module_source = "helper :: (a i32) -> i32 { ret a + 1 }\n";
        let standalone = compile_to_ir_named("util.sage", module_source).unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("util.sage"), module_source).unwrap();

        let mut parser = Parser::new(
            "main.sage",
            b"include \"util\"\nmain :: () -> void { }\n" as &[u8],
        );
        let tree = parser.parse().unwrap();
        let settings = BuildSettings::defaults("main.sage");
        let mut codegen = CodeGen::new("main.sage", settings).unwrap();
        codegen.set_modules_dir(dir.path().to_path_buf());
        codegen.generate(&tree);
        let (module, _) = codegen.finish().unwrap();
        let combined = module.to_llvm();

        let extract = |ir: &str| -> String {
            let start = ir.find("define i32 @helper").expect("helper not emitted");
            let end = ir[start..].find("\n}").expect("unterminated define") + start + 2;
            ir[start..end].to_string()
        };
        assert_eq!(extract(&standalone), extract(&combined));
    }

    #[test]
    fn test_include_inside_module_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("outer.sage"),
            "include \"inner\"\nhelper :: () -> void { }\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("inner.sage"), "noop :: () -> void { }\n").unwrap();

        let mut parser = Parser::new(
            "main.sage",
            b"include \"outer\"\nmain :: () -> void { }\n" as &[u8],
        );
        let tree = parser.parse().unwrap();
        let settings = BuildSettings::defaults("main.sage");
        let mut codegen = CodeGen::new("main.sage", settings).unwrap();
        codegen.set_modules_dir(dir.path().to_path_buf());
        codegen.generate(&tree);
        let err = codegen.finish().unwrap_err();
        assert!(err.contains("not allowed inside module files"), "{}", err);
    }

    #[test]
    fn test_missing_module_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut parser = Parser::new(
            "main.sage",
            b"include \"ghost\"\nmain :: () -> void { }\n" as &[u8],
        );
        let tree = parser.parse().unwrap();
        let settings = BuildSettings::defaults("main.sage");
        let mut codegen = CodeGen::new("main.sage", settings).unwrap();
        codegen.set_modules_dir(dir.path().to_path_buf());
        codegen.generate(&tree);
        assert!(codegen.finish().is_err());
    }
}
