//! Function call dispatch for the VM.

use std::mem;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::interpreter::value::Value;
use crate::interpreter::Interpreter;
use crate::span::Span;

use super::upvalue::VmClosure;
use super::vm::{CallFrame, Cursor, Vm};

impl Vm {
    /// Call the value sitting below `argc` arguments on the stack.
    ///
    /// A compiled closure gets a new frame in this VM. Anything else goes
    /// through [`Interpreter::apply`], the same path the tree-walker uses.
    pub(super) fn call_value(
        &mut self,
        interp: &mut Interpreter,
        cursor: &mut Cursor,
        argc: usize,
    ) -> Result<(), RuntimeError> {
        let callee_slot = self
            .stack
            .len()
            .checked_sub(argc + 1)
            .ok_or(RuntimeError::StackUnderflow(Span::default()))?;

        match &self.stack[callee_slot] {
            Value::VmClosure(closure) => {
                let closure = closure.clone();
                self.call_closure(interp, closure, callee_slot, argc, cursor)
            }
            _ => self.call_out(interp, argc),
        }
    }

    fn call_closure(
        &mut self,
        interp: &mut Interpreter,
        closure: Rc<VmClosure>,
        stack_base: usize,
        argc: usize,
        cursor: &mut Cursor,
    ) -> Result<(), RuntimeError> {
        if argc != closure.arity() {
            return Err(RuntimeError::wrong_arity(
                closure.proto.name.clone(),
                argc,
                Span::default(),
            ));
        }
        if let Some(caller) = self.frames.last_mut() {
            caller.ip = cursor.ip;
        }
        *cursor = self.push_frame(interp, closure, stack_base, true)?;
        Ok(())
    }

    /// Push a frame whose callee sits at `stack_base` and return a cursor at
    /// its first instruction. A counted frame takes one unit of the
    /// interpreter's call depth, released when the frame returns.
    pub(super) fn push_frame(
        &mut self,
        interp: &mut Interpreter,
        closure: Rc<VmClosure>,
        stack_base: usize,
        counted: bool,
    ) -> Result<Cursor, RuntimeError> {
        if counted {
            interp.enter(Span::default())?;
        }
        if self.frames.len() >= self.config.frames_max {
            if counted {
                interp.leave();
            }
            return Err(RuntimeError::FrameOverflow {
                limit: self.config.frames_max,
                span: Span::default(),
            });
        }
        self.frames.push(CallFrame {
            closure: closure.clone(),
            ip: 0,
            stack_base,
            counted,
        });
        self.peak_frames = self.peak_frames.max(self.frames.len());
        Ok(Cursor {
            closure,
            ip: 0,
            base: stack_base,
        })
    }

    /// A cursor at the saved position of the frame now on top.
    pub(super) fn resume(&self) -> Result<Cursor, RuntimeError> {
        let frame = self
            .frames
            .last()
            .ok_or(RuntimeError::StackUnderflow(Span::default()))?;
        Ok(Cursor {
            closure: frame.closure.clone(),
            ip: frame.ip,
            base: frame.stack_base,
        })
    }

    /// Hand a non-compiled callee to the interpreter.
    ///
    /// This VM is parked on the interpreter for the duration of the call, so
    /// a compiled function reached from there runs on the same stack and the
    /// open upvalues of the frames below stay valid.
    fn call_out(&mut self, interp: &mut Interpreter, argc: usize) -> Result<(), RuntimeError> {
        let args = self.pop_n(argc)?;
        let callee = self.pop()?;

        let config = self.config;
        let parked = mem::replace(self, Vm::detached(config));
        let previous = interp.vm.replace(parked);
        let result = interp.apply(&callee, args);
        match mem::replace(&mut interp.vm, previous) {
            Some(vm) => *self = vm,
            None => {
                return Err(RuntimeError::new(
                    "VM state lost during a call out of bytecode",
                    Span::default(),
                ))
            }
        }

        let value = result?;
        self.push(value)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::error::JoltError;
    use crate::interpreter::Interpreter;
    use crate::ExecutionMode;
    use pretty_assertions::assert_eq;

    fn hybrid() -> Interpreter {
        Interpreter::with_config(Config::default()).with_mode(ExecutionMode::Hybrid)
    }

    fn eval(interp: &mut Interpreter, source: &str) -> String {
        interp.eval_str(source).unwrap().to_readable_string()
    }

    #[test]
    fn test_compiled_calls_compiled() {
        let mut interp = hybrid();
        eval(&mut interp, "(defn sq [x] (* x x))");
        eval(&mut interp, "(defn sum-sq [a b] (+ (sq a) (sq b)))");
        assert_eq!(eval(&mut interp, "(sum-sq 3 4)"), "25");
        let vm = interp.vm.as_ref().unwrap();
        assert_eq!(vm.frame_depth(), 0);
        assert_eq!(vm.peak_frame_depth(), 2);
    }

    #[test]
    fn test_compiled_calls_natives_and_interpreted_fns() {
        let mut interp = hybrid();
        // `try` keeps `safe-div` interpreted.
        eval(
            &mut interp,
            "(defn safe-div [a b] (try (/ a b) (catch Error e :div0)))",
        );
        eval(&mut interp, "(defn ratio [a b] [(safe-div a b) (count [a b])])");
        assert_eq!(eval(&mut interp, "(ratio 1 0)"), "[:div0 2]");
        assert_eq!(eval(&mut interp, "(ratio 6 3)"), "[2 2]");
    }

    #[test]
    fn test_reentry_through_native_keeps_upvalues_open() {
        let mut interp = hybrid();
        eval(
            &mut interp,
            "(defn tally [xs] (let [n 0] (map (fn [x] (set! n (+ n x))) xs) n))",
        );
        // `map` is eager, so every callback has run before `n` is read.
        assert_eq!(eval(&mut interp, "(tally [1 2 3])"), "6");
        assert_eq!(interp.vm.as_ref().unwrap().frame_depth(), 0);
        assert!(interp.vm.as_ref().unwrap().stack.is_empty());
    }

    #[test]
    fn test_wrong_arity_between_compiled_fns() {
        let mut interp = hybrid();
        eval(&mut interp, "(defn one [x] x)");
        eval(&mut interp, "(defn caller [] (one 1 2))");
        match interp.eval_str("(caller)") {
            Err(JoltError::Runtime(err)) => {
                assert_eq!(err.to_string(), "Wrong number of args (2) passed to one")
            }
            other => panic!("expected an arity error, got {:?}", other.map(|v| v.to_string())),
        }
        assert!(interp.vm.as_ref().unwrap().stack.is_empty());
    }

    #[test]
    fn test_calling_non_callable() {
        let mut interp = hybrid();
        eval(&mut interp, "(defn bad [] (1 2))");
        let err = interp.eval_str("(bad)").unwrap_err();
        assert_eq!(err.to_string(), "Runtime error: Int cannot be called as a function");
    }

    #[test]
    fn test_keyword_and_map_callees() {
        let mut interp = hybrid();
        eval(&mut interp, "(defn pick [m] [(:a m) (m :b) (:c m 0)])");
        assert_eq!(eval(&mut interp, "(pick {:a 1 :b 2})"), "[1 2 0]");
        assert_eq!(eval(&mut interp, "(pick {})"), "[nil nil 0]");
    }

    #[test]
    fn test_reentry_through_apply_stops_at_depth_limit() {
        let limit = crate::config::DEFAULT_MAX_DEPTH;
        for mode in [ExecutionMode::TreeWalk, ExecutionMode::Hybrid] {
            let outcome = crate::with_eval_stack(&Config::default(), move || {
                let mut interp = Interpreter::with_config(Config::default()).with_mode(mode);
                interp
                    .eval_str("(defn d [n] (if (= n 0) 0 (+ 1 (apply d [(- n 1)]))))")
                    .unwrap();
                let mut run = |n: usize| match interp.eval_str(&format!("(d {})", n)) {
                    Ok(value) => value.to_readable_string(),
                    Err(err) => err.to_string(),
                };
                let results = (run(limit - 1), run(limit));
                let parked = interp.vm.as_ref().map_or(0, |vm| vm.frame_depth());
                (results, interp.depth, parked)
            })
            .unwrap();
            assert_eq!(
                outcome,
                (
                    (
                        (limit - 1).to_string(),
                        "Runtime error: Stack overflow".to_string()
                    ),
                    0,
                    0
                ),
                "{:?}",
                mode
            );
        }
    }
}
