//! Jolt CLI: execute files, evaluate snippets or run the REPL.

use std::env;
use std::fs;
use std::process;

use colored::Colorize;

use jolt::config::Config;
use jolt::error::JoltError;
use jolt::interpreter::Interpreter;
use jolt::reader::Reader;
use jolt::repl::Repl;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a script file
    Run { file: String },
    /// Evaluate a string
    Eval { code: String },
    /// Start the REPL
    Repl,
}

/// What to do with the source before (or instead of) running it.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Read,
    Parse,
    Disassemble,
    Run,
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    stage: Stage,
    no_vm: bool,
}

fn print_usage() {
    eprintln!("Jolt {} - a Clojure dialect with a bytecode VM", VERSION);
    eprintln!();
    eprintln!("Usage: jolt [options] [script.clj]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e <code>        Evaluate code and print the result");
    eprintln!("  --read           Print the forms read and stop");
    eprintln!("  --parse          Print the parsed expressions and stop");
    eprintln!("  --disassemble    Print the bytecode of each top-level form that compiles");
    eprintln!("  --no-vm          Disable compilation; tree-walk everything");
    eprintln!("  --help, -h       Show this help message");
    eprintln!("  --version, -v    Show the version");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  JOLT_VM=0             Same as --no-vm");
    eprintln!("  JOLT_VM_TRACE=1       Log compile and fallback decisions to stderr");
    eprintln!("  JOLT_VM_STACK_MAX     VM value-stack limit (default 16384)");
    eprintln!("  JOLT_VM_FRAMES_MAX    VM call-frame limit (default JOLT_MAX_DEPTH + 1)");
    eprintln!("  JOLT_VM_STEP_BUDGET   Instructions allowed per execution");
    eprintln!("  JOLT_MAX_DEPTH        Call-depth limit for both engines (default 512)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  jolt                          Start interactive REPL");
    eprintln!("  jolt script.clj               Run a script file");
    eprintln!("  jolt -e '(+ 1 2)'             Evaluate code directly");
    eprintln!("  jolt --disassemble fib.clj    Show the bytecode for fib.clj");
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    print_usage();
    process::exit(64);
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut options = Options {
        command: Command::Repl,
        stage: Stage::Run,
        no_vm: false,
    };

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "-e" => {
                i += 1;
                if i >= args.len() {
                    usage_error("-e requires code to evaluate");
                }
                options.command = Command::Eval {
                    code: args[i].clone(),
                };
            }
            "--read" => options.stage = Stage::Read,
            "--parse" => options.stage = Stage::Parse,
            "--disassemble" => options.stage = Stage::Disassemble,
            "--no-vm" => options.no_vm = true,
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--version" | "-v" => {
                println!("jolt {}", VERSION);
                process::exit(0);
            }
            _ if arg.starts_with('-') => usage_error(&format!("Unknown option: {}", arg)),
            _ => {
                if !matches!(options.command, Command::Repl) {
                    usage_error(&format!("Unexpected argument: {}", arg));
                }
                options.command = Command::Run { file: arg.clone() };
            }
        }
        i += 1;
    }

    options
}

fn main() {
    let options = parse_args();

    let mut config = Config::from_env();
    if options.no_vm {
        config.vm_enabled = false;
    }

    let source = match &options.command {
        Command::Run { file } => match fs::read_to_string(file) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("{} could not read {}: {}", "Error:".red().bold(), file, e);
                process::exit(JoltError::Io(e).exit_code());
            }
        },
        Command::Eval { code } => code.clone(),
        Command::Repl => {
            if options.stage != Stage::Run {
                usage_error("--read, --parse and --disassemble need a file or -e");
            }
            if let Err(e) = jolt::with_eval_stack(&config, move || Repl::new(config).run()) {
                let e = JoltError::Io(e);
                fail(&e.to_string(), e.exit_code());
            }
            return;
        }
    };

    let print_result = matches!(options.command, Command::Eval { .. });
    let stage = options.stage;
    let outcome = jolt::with_eval_stack(&config, move || {
        execute(&source, stage, config, print_result).map_err(|e| (e.to_string(), e.exit_code()))
    });
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err((message, code))) => fail(&message, code),
        Err(e) => {
            let e = JoltError::Io(e);
            fail(&e.to_string(), e.exit_code());
        }
    }
}

fn fail(message: &str, code: i32) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), message);
    process::exit(code);
}

fn execute(source: &str, stage: Stage, config: Config, print_result: bool) -> Result<(), JoltError> {
    match stage {
        Stage::Read => {
            for form in Reader::read_str(source)? {
                println!("{}", form);
            }
        }
        Stage::Parse => {
            let mut interp = Interpreter::with_config(config);
            for expr in interp.parse_str(source)? {
                println!("{}", expr);
            }
        }
        Stage::Disassemble => {
            print!("{}", jolt::disassemble(source, config)?);
        }
        Stage::Run => {
            let mut interp = Interpreter::with_config(config);
            let value = interp.eval_str(source)?;
            if print_result {
                println!("{}", value.to_readable_string());
            }
        }
    }
    Ok(())
}
