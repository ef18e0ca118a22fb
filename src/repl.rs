//! Interactive read-eval-print loop.

use std::io::{self, Write};
use std::path::PathBuf;

use colored::Colorize;

use crate::config::Config;
use crate::error::{JoltError, LexerError, ReaderError};
use crate::interpreter::Interpreter;
use crate::vm::{self, Compiler};
use crate::ExecutionMode;

const HISTORY_FILE: &str = ".jolt_history";

pub struct Repl {
    interpreter: Interpreter,
    history: Vec<String>,
    history_file: PathBuf,
    /// Lines of a form that is still open.
    pending: String,
}

impl Repl {
    pub fn new(config: Config) -> Self {
        let history_file = Self::get_history_path();
        let mut repl = Self {
            interpreter: Interpreter::with_config(config),
            history: Vec::new(),
            history_file,
            pending: String::new(),
        };
        repl.load_history();
        repl
    }

    fn get_history_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            home.join(HISTORY_FILE)
        } else {
            PathBuf::from(HISTORY_FILE)
        }
    }

    fn load_history(&mut self) {
        if let Ok(content) = std::fs::read_to_string(&self.history_file) {
            for line in content.lines() {
                if !line.trim().is_empty() {
                    self.history.push(line.to_string());
                }
            }
        }
    }

    fn save_history(&self) {
        if let Some(parent) = self.history_file.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let content = self.history.join("\n");
        let _ = std::fs::write(&self.history_file, content);
    }

    fn prompt(&self) -> String {
        if self.pending.is_empty() {
            format!("{}=> ", self.interpreter.globals.current_ns())
                .green()
                .to_string()
        } else {
            "   ".to_string()
        }
    }

    pub fn run(&mut self) {
        println!("Jolt {} REPL", env!("CARGO_PKG_VERSION"));
        println!("Type .help for available commands.\n");

        let stdin = io::stdin();
        loop {
            print!("{}", self.prompt());
            let _ = io::stdout().flush();

            let mut line = String::new();
            match stdin.read_line(&mut line) {
                Ok(0) => {
                    self.save_history();
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {
                    let line = line.trim_end();
                    if self.pending.is_empty() {
                        if line.trim().is_empty() {
                            continue;
                        }
                        self.history.push(line.to_string());
                        if line == ".exit" || line == ".quit" {
                            self.save_history();
                            println!("Goodbye!");
                            break;
                        }
                        if line.starts_with('.') {
                            self.handle_command(line);
                            continue;
                        }
                    } else {
                        self.history.push(line.to_string());
                    }
                    self.pending.push_str(line);
                    self.pending.push('\n');
                    self.submit();
                }
                Err(e) => {
                    self.save_history();
                    println!("{} {}", "Error:".red().bold(), e);
                    break;
                }
            }
        }
    }

    /// Evaluate the pending input unless its last form is still open.
    fn submit(&mut self) {
        let source = std::mem::take(&mut self.pending);
        match self.interpreter.eval_str(&source) {
            Ok(value) => {
                let _ = io::stdout().flush();
                println!("{}", value.to_readable_string().cyan());
            }
            Err(e) if is_incomplete(&e) => self.pending = source,
            Err(e) => println!("{} {}", "Error:".red().bold(), e),
        }
    }

    fn handle_command(&mut self, line: &str) {
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };
        match command {
            ".help" => self.cmd_help(),
            ".vm" => self.cmd_vm(arg),
            ".dis" => self.cmd_dis(arg),
            ".history" => self.cmd_history(),
            _ => println!(
                "Unknown command: {}. Type .help for available commands.",
                line
            ),
        }
    }

    fn cmd_help(&self) {
        println!();
        println!("Jolt REPL Commands");
        println!();
        println!(".help          - Show this help message");
        println!(".vm on|off     - Enable or disable bytecode compilation");
        println!(".dis <expr>    - Show the bytecode for an expression");
        println!(".history       - Show command history");
        println!(".exit / Ctrl+D - Exit the REPL");
    }

    fn cmd_vm(&mut self, arg: &str) {
        match arg {
            "on" => set_vm(&mut self.interpreter, true),
            "off" => set_vm(&mut self.interpreter, false),
            "" => {}
            _ => {
                println!("Usage: .vm on|off");
                return;
            }
        }
        let state = if self.interpreter.config.vm_enabled {
            "on".green()
        } else {
            "off".yellow()
        };
        println!("VM {}", state);
    }

    fn cmd_dis(&mut self, source: &str) {
        if source.is_empty() {
            println!("Usage: .dis <expr>");
            return;
        }
        match disassemble_expr(&mut self.interpreter, source) {
            Ok(listing) => print!("{}", listing),
            Err(e) => println!("{} {}", "Error:".red().bold(), e),
        }
    }

    fn cmd_history(&self) {
        println!("History:");
        for (i, entry) in self.history.iter().enumerate() {
            println!("{:4}  {}", i + 1, entry);
        }
    }
}

/// True when reading failed only because the input ends inside a form.
fn is_incomplete(err: &JoltError) -> bool {
    matches!(
        err,
        JoltError::Reader(ReaderError::UnexpectedEof(_))
            | JoltError::Reader(ReaderError::Lexer(LexerError::UnterminatedString(_)))
            | JoltError::Lexer(LexerError::UnterminatedString(_))
    )
}

fn set_vm(interp: &mut Interpreter, enabled: bool) {
    interp.config.vm_enabled = enabled;
    interp.mode = if enabled {
        ExecutionMode::Hybrid
    } else {
        ExecutionMode::TreeWalk
    };
}

/// Compile the first form of `source` as a top-level prototype and list it.
fn disassemble_expr(interp: &mut Interpreter, source: &str) -> Result<String, JoltError> {
    let mut exprs = interp.parse_str(source)?;
    if exprs.is_empty() {
        return Ok(String::new());
    }
    let proto = Compiler::compile_top_level(&exprs.remove(0), "repl")?;
    Ok(vm::disassemble(&proto))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_forms_are_incomplete() {
        let mut interp = Interpreter::new();
        assert!(is_incomplete(&interp.eval_str("(+ 1").unwrap_err()));
        assert!(is_incomplete(&interp.eval_str("(str \"abc").unwrap_err()));
        assert!(!is_incomplete(&interp.eval_str("(+ 1))").unwrap_err()));
        assert!(!is_incomplete(&interp.eval_str("(nope)").unwrap_err()));
    }

    #[test]
    fn test_vm_toggle() {
        let mut interp = Interpreter::new();
        set_vm(&mut interp, false);
        assert_eq!(interp.mode, ExecutionMode::TreeWalk);
        assert!(!interp.config.vm_enabled);
        set_vm(&mut interp, true);
        assert_eq!(interp.mode, ExecutionMode::Hybrid);
    }

    #[test]
    fn test_disassemble_expr() {
        let mut interp = Interpreter::new();
        let listing = disassemble_expr(&mut interp, "(+ 1 2)").unwrap();
        assert!(listing.starts_with("== repl (arity 0, upvalues 0) =="));
        assert!(listing.contains("ADD"));
        assert!(disassemble_expr(&mut interp, "(try 1)").is_err());
    }
}
