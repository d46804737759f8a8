use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use riptide::diagnostic::render_diagnostics;
use riptide::dialect::Dialect;
use riptide::ir::Block;
use riptide::syntax::printer::print_program;
use riptide::{interp, optimize, parse_source};

#[derive(Parser)]
#[command(name = "riptide", version, about = "Dead-store elimination for a stack-machine IR")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a program and print its canonical form.
    Parse { file: PathBuf },
    /// Optimize a program and print the result.
    Opt {
        file: PathBuf,
        /// Maximum optimization rounds.
        #[arg(long, default_value_t = 2)]
        rounds: usize,
        /// Keep all memory stores; only storage stores are eliminated.
        #[arg(long)]
        no_memory_elim: bool,
        /// Treat memory as observable after the program halts.
        #[arg(long)]
        expose_memory: bool,
    },
    /// Execute a program in the reference interpreter and print its trace.
    Run {
        file: PathBuf,
        /// Calldata as a hex string.
        #[arg(long, default_value = "")]
        calldata: String,
        /// Optimize before running.
        #[arg(long)]
        optimize: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Parse { file } => {
            let Some((_, block)) = load(&file) else {
                return ExitCode::FAILURE;
            };
            print!("{}", print_program(&block));
            ExitCode::SUCCESS
        }
        Command::Opt {
            file,
            rounds,
            no_memory_elim,
            expose_memory,
        } => {
            let Some((_, mut block)) = load(&file) else {
                return ExitCode::FAILURE;
            };
            let dialect = if expose_memory {
                Dialect::with_observable_memory()
            } else {
                Dialect::new()
            };
            let settings = optimize::Settings {
                rounds,
                eliminate_memory_stores: !no_memory_elim,
            };
            match optimize::optimize(&dialect, &mut block, &settings) {
                Ok(outcome) => {
                    eprintln!(
                        "removed {} stores, {} assignments",
                        outcome.removed_stores, outcome.removed_assignments
                    );
                    print!("{}", print_program(&block));
                    ExitCode::SUCCESS
                }
                Err(error) => {
                    eprintln!("{error}");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Run {
            file,
            calldata,
            optimize: optimize_first,
        } => {
            let Some((_, mut block)) = load(&file) else {
                return ExitCode::FAILURE;
            };
            let Some(calldata) = parse_hex(&calldata) else {
                eprintln!("invalid hex calldata");
                return ExitCode::FAILURE;
            };
            if optimize_first {
                let dialect = Dialect::new();
                if let Err(error) =
                    optimize::optimize(&dialect, &mut block, &optimize::Settings::default())
                {
                    eprintln!("{error}");
                    return ExitCode::FAILURE;
                }
            }
            match interp::run(&block, &calldata, interp::DEFAULT_STEP_LIMIT) {
                Ok(trace) => {
                    print_trace(&trace);
                    ExitCode::SUCCESS
                }
                Err(error) => {
                    eprintln!("{error}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn load(file: &Path) -> Option<(String, Block)> {
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("cannot read {}: {}", file.display(), error);
            return None;
        }
    };
    match parse_source(&source) {
        Ok(block) => Some((source, block)),
        Err(diagnostics) => {
            render_diagnostics(&diagnostics, &file.display().to_string(), &source);
            None
        }
    }
}

fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let text = text.strip_prefix("0x").unwrap_or(text);
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}

fn print_trace(trace: &interp::Trace) {
    match &trace.outcome {
        interp::Outcome::Stop => println!("stop"),
        interp::Outcome::Return(data) => println!("return 0x{}", to_hex(data)),
        interp::Outcome::Revert(data) => println!("revert 0x{}", to_hex(data)),
    }
    for (key, value) in &trace.storage {
        println!("storage[{key:#x}] = {value:#x}");
    }
    for log in &trace.logs {
        let topics: Vec<String> = log.topics.iter().map(|t| format!("{t:#x}")).collect();
        println!("log [{}] 0x{}", topics.join(", "), to_hex(&log.data));
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
