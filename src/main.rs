use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser as ClapParser, Subcommand};

use regvm::logger::{self, LogLevel};
use regvm::vm::{Program, VmConfig, VM};

#[derive(ClapParser)]
#[command(name = "regvm", version, about = "Stack-based bytecode interpreter with named registers")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a program (the built-in demo when no file is given)
    Run {
        /// Path to a JSON program file
        file: Option<PathBuf>,
        /// Initial evaluation stack capacity
        #[arg(long, default_value_t = VmConfig::default().stack_capacity)]
        stack_capacity: usize,
        /// Abort once the stack would grow beyond this depth
        #[arg(long, default_value_t = VmConfig::default().max_stack_depth)]
        max_stack_depth: usize,
    },
    /// Print the decoded instruction listing
    Disasm {
        /// Path to a JSON program file
        file: PathBuf,
    },
    /// Print the program's SHA-256 fingerprint
    Fingerprint {
        /// Path to a JSON program file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    logger::init_with_level(LogLevel::from_verbosity(cli.verbose));

    let exit_code = match cli.command {
        Commands::Run {
            file,
            stack_capacity,
            max_stack_depth,
        } => cmd_run(
            file.as_ref(),
            VmConfig {
                stack_capacity,
                max_stack_depth,
            },
        ),
        Commands::Disasm { file } => cmd_disasm(&file),
        Commands::Fingerprint { file } => cmd_fingerprint(&file),
    };
    process::exit(exit_code);
}

const MAX_SOURCE_SIZE: u64 = 10 * 1024 * 1024; // 10 MB

fn load_program(path: &PathBuf) -> Result<Program, i32> {
    let filename = path.to_string_lossy().to_string();

    match std::fs::metadata(path) {
        Ok(meta) => {
            if meta.len() > MAX_SOURCE_SIZE {
                eprintln!(
                    "Error: file {} is too large ({} bytes, max {} bytes)",
                    filename,
                    meta.len(),
                    MAX_SOURCE_SIZE
                );
                return Err(1);
            }
        }
        Err(e) => {
            eprintln!("Error: cannot read file {}: {}", filename, e);
            return Err(1);
        }
    }

    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: cannot read file {}: {}", filename, e);
            return Err(1);
        }
    };

    match Program::from_json(&source) {
        Ok(program) => {
            tracing::info!(file = %filename, words = program.len(), "program loaded");
            Ok(program)
        }
        Err(e) => {
            eprintln!("Error: {}: {}", filename, e);
            Err(1)
        }
    }
}

fn cmd_run(path: Option<&PathBuf>, config: VmConfig) -> i32 {
    let program = match path {
        Some(path) => match load_program(path) {
            Ok(p) => p,
            Err(code) => return code,
        },
        None => Program::demo(),
    };
    tracing::info!(fingerprint = %program.fingerprint(), "running program");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match VM::new(&program, &mut out, config).run() {
        Ok(execution) => {
            tracing::info!(steps = execution.steps, "program completed");
            0
        }
        Err(e) => {
            let _ = out.flush();
            eprintln!("Runtime error: {}", e);
            1
        }
    }
}

fn cmd_disasm(path: &PathBuf) -> i32 {
    let program = match load_program(path) {
        Ok(p) => p,
        Err(code) => return code,
    };

    if let Err(e) = program.decode() {
        eprintln!("Decode error: {}", e);
        return 1;
    }

    print!("{}", program);
    0
}

fn cmd_fingerprint(path: &PathBuf) -> i32 {
    let program = match load_program(path) {
        Ok(p) => p,
        Err(code) => return code,
    };

    println!("{}", program.fingerprint());
    0
}
