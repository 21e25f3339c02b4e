//! Sage Compiler CLI
//!
//! Command-line interface for compiling .sage programs to native
//! executables, dumping lexer output, and generating shell completions.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use sagec::token::TokenKind;

#[derive(ClapParser)]
#[command(name = "sagec")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sage compiler - compile .sage programs to executables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .sage file to an executable
    Build {
        /// Input .sage (or .g) source file
        input: PathBuf,

        /// Output executable path (defaults to build_settings.executable_name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep the intermediate LLVM IR file (.ll)
        #[arg(long)]
        keep_ir: bool,

        /// Stop after writing the LLVM IR file
        #[arg(long)]
        emit_ir: bool,

        /// Print the parse tree before generating code
        #[arg(long)]
        show_ast: bool,
    },

    /// Dump the token stream of a source file
    Tokens {
        /// Input source file
        input: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            keep_ir,
            emit_ir,
            show_ast,
        } => run_build(&input, output, keep_ir, emit_ir, show_ast),
        Commands::Tokens { input } => run_tokens(&input),
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_build(
    input: &Path,
    output: Option<PathBuf>,
    keep_ir: bool,
    emit_ir: bool,
    show_ast: bool,
) {
    let options = sagec::CompileOptions {
        output,
        keep_ir,
        emit_ir_only: emit_ir,
        show_ast,
    };

    match sagec::compile_file(input, &options) {
        Ok(path) => {
            if emit_ir {
                println!("Wrote {}", path.with_extension("ll").display());
            } else {
                println!("Compiled {} -> {}", input.display(), path.display());
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn run_tokens(input: &Path) {
    let contents = match std::fs::read(input) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("error: failed to read '{}': {}", input.display(), e);
            process::exit(1);
        }
    };

    let mut lexer = sagec::Lexer::new(input.display().to_string(), &contents);
    let mut index = 0;
    loop {
        let token = lexer.next_token();
        println!("[{}] {}", index, token);
        if token.kind == TokenKind::Eof {
            break;
        }
        index += 1;
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "sagec", &mut io::stdout());
}
