//! Jolt: a Clojure dialect with a tree-walking evaluator and a bytecode VM.
//!
//! This is the library root that exports all modules.
//!
//! # Execution Modes
//!
//! - **Tree-walk**: every form is interpreted directly.
//! - **Hybrid** (default): function literals that fit the compiled subset are
//!   compiled after parsing and run on the VM; everything else is interpreted.
//! - **Bytecode**: additionally compiles whole top-level forms when they fit.

// Allow some clippy lints that are stylistic and not critical
#![allow(clippy::module_inception)]
#![allow(clippy::result_large_err)]
#![allow(clippy::type_complexity)]
#![allow(clippy::new_without_default)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::unnecessary_cast)]
#![allow(clippy::len_zero)]
#![allow(clippy::too_many_arguments)]

pub mod ast;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod reader;
pub mod repl;
pub mod span;
pub mod vm;

use std::io;
use std::panic;
use std::thread;

use config::Config;
use error::JoltError;
use interpreter::value::Value;
use interpreter::Interpreter;
use reader::{Form, Reader};

/// Execution mode for running Jolt programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Tree-walking interpreter only
    TreeWalk,
    /// Compiled function literals, interpreted top level
    #[default]
    Hybrid,
    /// Compiled top-level forms where possible
    Bytecode,
}

/// Native stack reserved per unit of call depth. Unoptimized builds spend tens
/// of kilobytes on each nested call, more when compiled code re-enters the VM
/// through a native.
const STACK_PER_CALL: usize = 256 * 1024;
const MIN_EVAL_STACK: usize = 32 * 1024 * 1024;

/// Run `f` on a thread whose stack can hold `config.max_depth` nested calls,
/// so runaway recursion stops at the call-depth guard with a runtime error
/// rather than exhausting the native stack. A panic in `f` is resumed on the
/// caller's thread.
pub fn with_eval_stack<F, T>(config: &Config, f: F) -> io::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let size = config
        .max_depth
        .saturating_mul(STACK_PER_CALL)
        .max(MIN_EVAL_STACK);
    let handle = thread::Builder::new()
        .name("jolt-eval".into())
        .stack_size(size)
        .spawn(f)?;
    match handle.join() {
        Ok(value) => Ok(value),
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Run a Jolt program with the default configuration; returns the last value.
pub fn run(source: &str) -> Result<Value, JoltError> {
    run_with_config(source, Config::default())
}

/// Run a Jolt program with an explicit configuration.
pub fn run_with_config(source: &str, config: Config) -> Result<Value, JoltError> {
    Interpreter::with_config(config).eval_str(source)
}

/// Run a Jolt program from a file path.
pub fn run_file(path: &std::path::Path, config: Config) -> Result<Value, JoltError> {
    let source = std::fs::read_to_string(path)?;
    run_with_config(&source, config)
}

/// Read source code into forms without parsing.
pub fn read(source: &str) -> Result<Vec<Form>, JoltError> {
    Ok(Reader::read_str(source)?)
}

/// Disassemble every top-level form of `source` that compiles.
///
/// Forms are evaluated in order so that definitions are visible to the forms
/// after them; forms outside the compiled subset are listed as such.
pub fn disassemble(source: &str, config: Config) -> Result<String, JoltError> {
    let mut interp = Interpreter::with_config(config);
    let mut out = String::new();
    for form in Reader::read_str(source)? {
        let expr = parser::Parser::new(&mut interp).parse(&form)?;
        match vm::Compiler::compile_top_level(&expr, "top-level") {
            Ok(proto) => out.push_str(&vm::disassemble(&proto)),
            Err(err) => out.push_str(&format!("; {} not compiled: {}\n", form, err)),
        }
        interp.eval_top_level(&expr)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_run_returns_last_value() {
        assert_eq!(run("(def x 2) (* x 21)").unwrap(), Value::Int(42));
    }

    #[test]
    fn test_modes_from_config() {
        let interp = Interpreter::with_config(Config::default());
        assert_eq!(interp.mode, ExecutionMode::Hybrid);
        let interp = Interpreter::with_config(Config {
            vm_enabled: false,
            ..Config::default()
        });
        assert_eq!(interp.mode, ExecutionMode::TreeWalk);
    }

    #[test]
    fn test_disassemble_source() {
        let listing = disassemble("(defn sq [x] (* x x)) (try 1 (catch Error e 2))", Config::default())
            .unwrap();
        assert!(listing.contains("== top-level (arity 0, upvalues 0) =="));
        assert!(listing.contains("== sq (arity 1, upvalues 0) =="));
        assert!(listing.contains("MULTIPLY"));
        assert!(listing.contains("not compiled: try is not supported by the VM"));
    }

    #[test]
    fn test_eval_stack_reaches_the_depth_guard() {
        let config = Config::default();
        let source = "(defn d [n] (if (= n 0) 0 (+ 1 (d (- n 1))))) (d 2000)";
        let message = with_eval_stack(&config, move || match run_with_config(source, config) {
            Ok(value) => value.to_readable_string(),
            Err(err) => err.to_string(),
        })
        .unwrap();
        assert_eq!(message, "Runtime error: Stack overflow");
    }
}
