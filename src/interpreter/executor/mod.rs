//! Tree-walking interpreter for Jolt.

mod calls;
mod control;
mod expressions;

pub(crate) use calls::get_or;

use std::rc::Rc;

use crate::ast::Expr;
use crate::config::Config;
use crate::error::{JoltError, RuntimeError};
use crate::interpreter::builtins::register_builtins;
use crate::interpreter::namespace::GlobalEnv;
use crate::interpreter::value::Value;
use crate::parser::Parser;
use crate::reader::{Form, Reader};
use crate::span::Span;
use crate::vm::{self, Compiler, FunctionProto, Vm};
use crate::ExecutionMode;

pub(crate) type RuntimeResult<T> = Result<T, RuntimeError>;

/// Result of evaluating an expression in tail position: either a value or a
/// request to rebind the innermost loop/fn frame and run its body again.
pub(crate) enum Flow {
    Normal(Value),
    Recur(Vec<Value>),
}

/// The Jolt interpreter: global namespaces plus the evaluation state shared by
/// the tree-walker and the bytecode VM.
pub struct Interpreter {
    pub globals: GlobalEnv,
    pub config: Config,
    pub mode: ExecutionMode,
    /// The VM for this interpreter. Taken while bytecode runs, and holds the
    /// suspended VM while a compiled function calls back into the tree-walker.
    pub(crate) vm: Option<Vm>,
    /// Nested function calls, across both engines.
    pub(crate) depth: usize,
    gensym_counter: u64,
    /// When set, printing builtins append here instead of writing to stdout.
    pub(crate) output: Option<String>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let mut globals = GlobalEnv::new();
        register_builtins(&mut globals);
        let mode = if config.vm_enabled {
            ExecutionMode::Hybrid
        } else {
            ExecutionMode::TreeWalk
        };

        Self {
            globals,
            config,
            mode,
            vm: None,
            depth: 0,
            gensym_counter: 0,
            output: None,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// A fresh symbol name, unique within this interpreter: `prefix__N__auto`.
    pub fn gensym(&mut self, prefix: &str) -> String {
        self.gensym_counter += 1;
        format!("{}__{}__auto", prefix, self.gensym_counter)
    }

    /// Redirect printing builtins into a buffer.
    pub fn capture_output(&mut self) {
        self.output = Some(String::new());
    }

    /// Everything printed since [`capture_output`](Self::capture_output).
    pub fn take_output(&mut self) -> String {
        self.output.replace(String::new()).unwrap_or_default()
    }

    pub(crate) fn write_out(&mut self, text: &str) {
        match &mut self.output {
            Some(buffer) => buffer.push_str(text),
            None => print!("{}", text),
        }
    }

    /// Read, parse and evaluate every form in `source`; returns the last value.
    pub fn eval_str(&mut self, source: &str) -> Result<Value, JoltError> {
        let forms = Reader::read_str(source)?;
        let mut last = Value::Nil;
        for form in &forms {
            last = self.eval_form(form)?;
        }
        Ok(last)
    }

    /// Parse and evaluate one top-level form.
    ///
    /// Forms are handled one at a time so that a `def` or `defmacro` is visible
    /// to the forms after it.
    pub fn eval_form(&mut self, form: &Form) -> Result<Value, JoltError> {
        let expr = Parser::new(self).parse(form)?;
        Ok(self.eval_top_level(&expr)?)
    }

    /// Parse every form in `source` without evaluating anything.
    pub fn parse_str(&mut self, source: &str) -> Result<Vec<Expr>, JoltError> {
        let forms = Reader::read_str(source)?;
        let mut exprs = Vec::with_capacity(forms.len());
        for form in &forms {
            exprs.push(Parser::new(self).parse(form)?);
        }
        Ok(exprs)
    }

    /// Compile every form in `source` as a top-level prototype, without
    /// running anything. A form outside the compiled subset is an error.
    pub fn compile_top_level_str(&mut self, source: &str) -> Result<Vec<FunctionProto>, JoltError> {
        let mut protos = Vec::new();
        for expr in self.parse_str(source)? {
            protos.push(Compiler::compile_top_level(&expr, "top-level")?);
        }
        Ok(protos)
    }

    /// Evaluate a parsed top-level expression in the current mode.
    pub fn eval_top_level(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        match self.mode {
            ExecutionMode::TreeWalk => self.eval(expr, None),
            ExecutionMode::Hybrid => {
                vm::compile_tree(expr, &self.config);
                self.eval(expr, None)
            }
            ExecutionMode::Bytecode => {
                if vm::is_vm_compatible(expr) {
                    match Compiler::compile_top_level(expr, "top-level") {
                        Ok(proto) => return self.run_top_level(Rc::new(proto)),
                        Err(err) if self.config.vm_trace => {
                            eprintln!("[vm] fallback top-level: {}", err)
                        }
                        Err(_) => {}
                    }
                }
                vm::compile_tree(expr, &self.config);
                self.eval(expr, None)
            }
        }
    }

    /// Run a compiled top-level form on this interpreter's VM.
    pub fn run_top_level(&mut self, proto: Rc<FunctionProto>) -> RuntimeResult<Value> {
        let mut vm = self.take_vm();
        let result = vm.execute_top_level(self, proto);
        self.vm = Some(vm);
        result
    }

    pub(crate) fn take_vm(&mut self) -> Vm {
        self.vm.take().unwrap_or_else(|| Vm::new(self.config.vm))
    }

    /// Count one more nested call, failing past the configured depth.
    pub(crate) fn enter(&mut self, span: Span) -> RuntimeResult<()> {
        if self.depth >= self.config.max_depth {
            return Err(RuntimeError::StackOverflow(span));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> String {
        let mut interp = Interpreter::new().with_mode(ExecutionMode::TreeWalk);
        interp.eval_str(source).unwrap().to_readable_string()
    }

    fn eval_err(source: &str) -> String {
        let mut interp = Interpreter::new().with_mode(ExecutionMode::TreeWalk);
        match interp.eval_str(source) {
            Ok(v) => panic!("expected an error, got {}", v),
            Err(JoltError::Runtime(err)) => err.to_string(),
            Err(other) => other.to_string(),
        }
    }

    #[test]
    fn test_literals_and_collections() {
        assert_eq!(eval("42"), "42");
        assert_eq!(eval("[1 (+ 1 1) :k]"), "[1 2 :k]");
        assert_eq!(eval("{:a (+ 1 2)}"), "{:a 3}");
        assert_eq!(eval("'(a b)"), "(a b)");
        assert_eq!(eval("\"hi\""), "\"hi\"");
    }

    #[test]
    fn test_let_and_shadowing() {
        assert_eq!(eval("(let [x 1 y (+ x 1)] (* x y))"), "2");
        assert_eq!(eval("(let [x 1] (let [x 2] x))"), "2");
        assert_eq!(eval("(let [x 1 x (+ x 10)] x)"), "11");
    }

    #[test]
    fn test_def_and_functions() {
        assert_eq!(eval("(def x 5) x"), "5");
        assert_eq!(eval("(def x 5)"), "#'user/x");
        assert_eq!(eval("(defn sq [n] (* n n)) (sq 7)"), "49");
        assert_eq!(
            eval("(defn fact [n] (if (< n 2) 1 (* n (fact (- n 1))))) (fact 10)"),
            "3628800"
        );
    }

    #[test]
    fn test_closures_capture_environment() {
        assert_eq!(
            eval("(defn adder [n] (fn [x] (+ x n))) ((adder 3) 4)"),
            "7"
        );
        assert_eq!(
            eval("(let [counter (let [n 0] (fn [] (set! n (+ n 1)) n))] (counter) (counter))"),
            "2"
        );
    }

    #[test]
    fn test_loop_recur() {
        assert_eq!(
            eval("(loop [i 0 acc 0] (if (< i 100000) (recur (inc i) (+ acc i)) acc))"),
            "4999950000"
        );
        assert_eq!(
            eval("(defn count-down [n] (if (zero? n) :done (recur (dec n)))) (count-down 50000)"),
            ":done"
        );
    }

    #[test]
    fn test_variadic() {
        assert_eq!(eval("((fn [a & more] more) 1 2 3)"), "(2 3)");
        assert_eq!(eval("((fn [a & more] more) 1)"), "nil");
        assert_eq!(eval("((fn ([] 0) ([x] 1) ([x & r] 2)) 1 2)"), "2");
    }

    #[test]
    fn test_arity_error() {
        assert_eq!(
            eval_err("(defn f [a b] a) (f 1)"),
            "Wrong number of args (1) passed to f"
        );
    }

    #[test]
    fn test_try_catch_finally() {
        assert_eq!(
            eval("(try (throw (ex-info \"boom\" {:a 1})) (catch ExInfo e (ex-data e)))"),
            "{:a 1}"
        );
        assert_eq!(
            eval("(try (/ 1 0) (catch Error e (ex-message e)))"),
            "\"Division by zero\""
        );
        assert_eq!(
            eval("(def log nil) (try 1 (finally (set! log :ran))) log"),
            ":ran"
        );
        assert_eq!(eval_err("(try (/ 1 0) (catch ExInfo e 1))"), "Division by zero");
    }

    #[test]
    fn test_user_macro() {
        assert_eq!(
            eval("(defmacro unless [c x] (list 'if c nil x)) (unless false 9)"),
            "9"
        );
    }

    #[test]
    fn test_macro_used_in_same_form_as_definition() {
        assert_eq!(
            eval("(do (defmacro twice [x] (list 'do x x)) (twice 3))"),
            "3"
        );
    }

    #[test]
    fn test_depth_limit() {
        let mut config = Config::default();
        config.max_depth = 64;
        let mut interp = Interpreter::with_config(config).with_mode(ExecutionMode::TreeWalk);
        let err = interp.eval_str("(defn f [n] (+ 1 (f n))) (f 1)").unwrap_err();
        assert_eq!(err.to_string(), "Runtime error: Stack overflow");
        assert_eq!(interp.depth, 0);
    }

    #[test]
    fn test_output_capture() {
        let mut interp = Interpreter::new();
        interp.capture_output();
        interp.eval_str("(println \"a\" 1) (prn \"b\")").unwrap();
        assert_eq!(interp.take_output(), "a 1\n\"b\"\n");
    }

    #[test]
    fn test_gensym_is_unique() {
        let mut interp = Interpreter::new();
        let a = interp.gensym("x");
        let b = interp.gensym("x");
        assert_ne!(a, b);
        assert!(a.ends_with("__auto"));
    }
}
