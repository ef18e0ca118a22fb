//! The bytecode virtual machine: stack-based execution engine.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::VmConfig;
use crate::error::RuntimeError;
use crate::interpreter::namespace::Var;
use crate::interpreter::numbers;
use crate::interpreter::value::Value;
use crate::interpreter::Interpreter;
use crate::span::Span;

use super::chunk::{Chunk, FunctionProto};
use super::opcode::OpCode;
use super::upvalue::{Upvalue, VmClosure};

/// A call frame on the VM call stack.
#[derive(Clone)]
pub struct CallFrame {
    /// The closure being executed.
    pub closure: Rc<VmClosure>,
    /// Instruction pointer, saved while a callee runs.
    pub ip: usize,
    /// Stack index of slot 0 (the callee) for this frame.
    pub stack_base: usize,
    /// Holds one unit of the interpreter's call depth. False only for a
    /// compiled top-level form, which the tree-walker does not count either.
    pub counted: bool,
}

/// Decoding position in the running frame. Kept outside `frames` so the
/// dispatch loop reads bytes without re-indexing the frame stack.
pub(super) struct Cursor {
    pub closure: Rc<VmClosure>,
    pub ip: usize,
    pub base: usize,
}

impl Cursor {
    fn chunk(&self) -> &Chunk {
        &self.closure.proto.chunk
    }

    fn read_byte(&mut self) -> Result<u8, RuntimeError> {
        let byte = self.chunk().code.get(self.ip).copied().ok_or_else(|| {
            RuntimeError::new("Instruction pointer past the end of the chunk", Span::default())
        })?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16, RuntimeError> {
        Ok(u16::from_be_bytes([self.read_byte()?, self.read_byte()?]))
    }

    fn read_i16(&mut self) -> Result<i16, RuntimeError> {
        Ok(i16::from_be_bytes([self.read_byte()?, self.read_byte()?]))
    }

    fn constant(&self, idx: u16) -> Result<Value, RuntimeError> {
        self.chunk().constants.get(idx as usize).cloned().ok_or_else(|| {
            RuntimeError::new(format!("Constant {} out of range", idx), Span::default())
        })
    }

    fn upvalue(&self, idx: u8) -> Result<Rc<RefCell<Upvalue>>, RuntimeError> {
        self.closure.upvalues.get(idx as usize).cloned().ok_or_else(|| {
            RuntimeError::new(format!("Upvalue {} out of range", idx), Span::default())
        })
    }

    fn jump(&mut self, offset: isize) -> Result<(), RuntimeError> {
        self.ip = self
            .ip
            .checked_add_signed(offset)
            .ok_or_else(|| RuntimeError::new("Jump before start of chunk", Span::default()))?;
        Ok(())
    }

    fn line(&self, offset: usize) -> usize {
        self.chunk().lines.get(offset).copied().unwrap_or(0) as usize
    }
}

/// The bytecode VM. One instance per interpreter (and so per thread); it runs
/// one logical call stack at a time.
pub struct Vm {
    /// Value stack: slot 0 of every frame is its callee, then arguments,
    /// locals and temporaries.
    pub stack: Vec<Value>,
    /// Call frame stack.
    pub frames: Vec<CallFrame>,
    /// Open upvalues, ordered by the stack slot they alias.
    pub open_upvalues: Vec<Rc<RefCell<Upvalue>>>,
    pub(super) config: VmConfig,
    steps: u64,
    pub(super) peak_frames: usize,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Self {
            stack: Vec::with_capacity(config.stack_max),
            frames: Vec::with_capacity(config.frames_max),
            open_upvalues: Vec::new(),
            config,
            steps: 0,
            peak_frames: 0,
        }
    }

    /// An empty VM holding no allocations, left in place while the real one
    /// is parked on the interpreter.
    pub(super) fn detached(config: VmConfig) -> Self {
        Self {
            stack: Vec::new(),
            frames: Vec::new(),
            open_upvalues: Vec::new(),
            config,
            steps: 0,
            peak_frames: 0,
        }
    }

    /// Number of active call frames.
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Deepest frame stack seen since the outermost `execute` began.
    pub fn peak_frame_depth(&self) -> usize {
        self.peak_frames
    }

    /// Call a compiled closure. The argument count is checked before anything
    /// is pushed. Re-entrant: a nested call made while this VM is parked runs
    /// on top of the existing frames and returns when they are back to where
    /// they were.
    ///
    /// Every frame pushed counts against the interpreter's call depth, so both
    /// engines run out of nesting at the same call with the same error.
    pub fn execute(
        &mut self,
        interp: &mut Interpreter,
        closure: Rc<VmClosure>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        self.start(interp, closure, args, true)
    }

    /// Run a compiled top-level form.
    pub fn execute_top_level(
        &mut self,
        interp: &mut Interpreter,
        proto: Rc<FunctionProto>,
    ) -> Result<Value, RuntimeError> {
        let closure = Rc::new(VmClosure::new(proto, Vec::new()));
        self.start(interp, closure, Vec::new(), false)
    }

    fn start(
        &mut self,
        interp: &mut Interpreter,
        closure: Rc<VmClosure>,
        args: Vec<Value>,
        counted: bool,
    ) -> Result<Value, RuntimeError> {
        if args.len() != closure.arity() {
            return Err(RuntimeError::wrong_arity(
                closure.proto.name.clone(),
                args.len(),
                Span::default(),
            ));
        }

        let base = self.stack.len();
        let entry_depth = self.frames.len();
        let entry_calls = interp.depth;
        if entry_depth == 0 {
            self.steps = 0;
            self.peak_frames = 0;
        }

        let result = self
            .enter(interp, closure, args, base, counted)
            .and_then(|mut cursor| self.run(interp, &mut cursor, entry_depth));
        if result.is_err() {
            self.close_upvalues(base);
            self.stack.truncate(base);
            self.frames.truncate(entry_depth);
            interp.depth = entry_calls;
        }
        result
    }

    fn enter(
        &mut self,
        interp: &mut Interpreter,
        closure: Rc<VmClosure>,
        args: Vec<Value>,
        base: usize,
        counted: bool,
    ) -> Result<Cursor, RuntimeError> {
        self.push(Value::VmClosure(closure.clone()))?;
        for arg in args {
            self.push(arg)?;
        }
        self.push_frame(interp, closure, base, counted)
    }

    /// Run the dispatch loop until the frame at `entry_depth` returns.
    fn run(
        &mut self,
        interp: &mut Interpreter,
        cursor: &mut Cursor,
        entry_depth: usize,
    ) -> Result<Value, RuntimeError> {
        loop {
            let op_ip = cursor.ip;
            match self.step(interp, cursor, entry_depth) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(err) => return Err(err.with_span(Span::at_line(cursor.line(op_ip)))),
            }
        }
    }

    /// Execute one instruction. `Some` carries the value of the final return.
    fn step(
        &mut self,
        interp: &mut Interpreter,
        cursor: &mut Cursor,
        entry_depth: usize,
    ) -> Result<Option<Value>, RuntimeError> {
        self.tick()?;

        #[cfg(feature = "vm-trace")]
        if self.config.trace {
            self.trace(cursor);
        }

        let byte = cursor.read_byte()?;
        let op = OpCode::from_u8(byte).ok_or(RuntimeError::InvalidOpcode(byte, Span::default()))?;

        match op {
            OpCode::Const => {
                let idx = cursor.read_u16()?;
                let value = cursor.constant(idx)?;
                self.push(value)?;
            }
            OpCode::Nil => self.push(Value::Nil)?,
            OpCode::True => self.push(Value::Bool(true))?,
            OpCode::False => self.push(Value::Bool(false))?,
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::PopN => {
                let count = cursor.read_byte()? as usize;
                let top = self.pop()?;
                let len = self
                    .stack
                    .len()
                    .checked_sub(count)
                    .ok_or(RuntimeError::StackUnderflow(Span::default()))?;
                self.stack.truncate(len);
                self.push(top)?;
            }

            OpCode::GetLocal => {
                let slot = cursor.base + cursor.read_byte()? as usize;
                let value = self.slot(slot)?.clone();
                self.push(value)?;
            }
            OpCode::SetLocal => {
                let slot = cursor.base + cursor.read_byte()? as usize;
                let value = self.peek(0)?.clone();
                *self.slot_mut(slot)? = value;
            }
            OpCode::GetUpvalue => {
                let idx = cursor.read_byte()?;
                let upvalue = cursor.upvalue(idx)?;
                let value = match &*upvalue.borrow() {
                    Upvalue::Open(slot) => self.slot(*slot)?.clone(),
                    Upvalue::Closed(value) => value.clone(),
                };
                self.push(value)?;
            }
            OpCode::SetUpvalue => {
                let idx = cursor.read_byte()?;
                let upvalue = cursor.upvalue(idx)?;
                let value = self.peek(0)?.clone();
                let mut cell = upvalue.borrow_mut();
                match &mut *cell {
                    Upvalue::Open(slot) => *self.slot_mut(*slot)? = value,
                    Upvalue::Closed(closed) => *closed = value,
                }
            }
            OpCode::CloseUpvalue => {
                let slot = cursor.base + cursor.read_byte()? as usize;
                self.close_upvalues(slot);
            }
            OpCode::GetVar => {
                let idx = cursor.read_u16()?;
                let value = var_constant(cursor, idx)?.deref(Span::default())?;
                self.push(value)?;
            }
            OpCode::SetVar => {
                let idx = cursor.read_u16()?;
                let value = self.peek(0)?.clone();
                var_constant(cursor, idx)?.set(value);
            }

            OpCode::Add => self.binary(numbers::add)?,
            OpCode::Subtract => self.binary(numbers::sub)?,
            OpCode::Multiply => self.binary(numbers::mul)?,
            OpCode::Divide => self.binary(numbers::div)?,
            OpCode::Less => self.binary(numbers::lt)?,
            OpCode::Greater => self.binary(numbers::gt)?,
            OpCode::Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Bool(a == b))?;
            }
            OpCode::Negate => {
                let value = numbers::negate(&self.pop()?)?;
                self.push(value)?;
            }
            OpCode::Not => {
                let value = self.pop()?;
                self.push(Value::Bool(!value.is_truthy()))?;
            }

            OpCode::Jump => {
                let offset = cursor.read_i16()?;
                cursor.jump(offset as isize)?;
            }
            OpCode::JumpIfFalse => {
                let offset = cursor.read_i16()?;
                if !self.pop()?.is_truthy() {
                    cursor.jump(offset as isize)?;
                }
            }
            OpCode::Loop => {
                let offset = cursor.read_u16()?;
                cursor.jump(-(offset as isize))?;
            }

            OpCode::Call => {
                let argc = cursor.read_byte()? as usize;
                self.call_value(interp, cursor, argc)?;
            }
            OpCode::Closure => {
                let closure = self.make_closure(cursor)?;
                self.push(Value::VmClosure(Rc::new(closure)))?;
            }
            OpCode::Recur => {
                let argc = cursor.read_byte()? as usize;
                let first = cursor.base + cursor.read_byte()? as usize;
                self.close_upvalues(first);
                let args = self.pop_n(argc)?;
                self.stack.truncate(first);
                self.stack.extend(args);
            }
            OpCode::Return => {
                let result = self.pop()?;
                let frame = self
                    .frames
                    .pop()
                    .ok_or(RuntimeError::StackUnderflow(Span::default()))?;
                self.close_upvalues(frame.stack_base);
                self.stack.truncate(frame.stack_base);
                if frame.counted {
                    interp.leave();
                }
                if self.frames.len() <= entry_depth {
                    return Ok(Some(result));
                }
                self.push(result)?;
                *cursor = self.resume()?;
            }

            OpCode::Vector => {
                let count = cursor.read_u16()? as usize;
                let items = self.pop_n(count)?;
                self.push(Value::vector(items))?;
            }
            OpCode::Map => {
                let count = cursor.read_u16()? as usize;
                let flat = self.pop_n(count * 2)?;
                let mut pairs = Vec::with_capacity(count);
                let mut flat = flat.into_iter();
                while let (Some(key), Some(value)) = (flat.next(), flat.next()) {
                    pairs.push((key, value));
                }
                self.push(Value::map_from_pairs(pairs)?)?;
            }
            OpCode::Set => {
                let count = cursor.read_u16()? as usize;
                let items = self.pop_n(count)?;
                self.push(Value::set_from_items(items)?)?;
            }
        }
        Ok(None)
    }

    fn tick(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;
        match self.config.step_budget {
            Some(budget) if self.steps > budget => {
                Err(RuntimeError::StepBudgetExhausted(budget, Span::default()))
            }
            _ => Ok(()),
        }
    }

    #[cfg(feature = "vm-trace")]
    fn trace(&self, cursor: &Cursor) {
        let mut line = String::new();
        super::disassembler::disassemble_instruction(&cursor.closure.proto, cursor.ip, &mut line);
        eprint!("[vm] depth={} stack={} {}", self.frames.len(), self.stack.len(), line);
    }

    fn binary(
        &mut self,
        op: fn(&Value, &Value) -> Result<Value, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        let value = op(&a, &b)?;
        self.push(value)
    }

    /// Instantiate the sub-function named by the operand, wiring each upvalue
    /// to a live slot of this frame or to one of this closure's own upvalues.
    fn make_closure(&mut self, cursor: &mut Cursor) -> Result<VmClosure, RuntimeError> {
        let idx = cursor.read_u16()?;
        let proto = cursor
            .closure
            .proto
            .sub_functions
            .get(idx as usize)
            .cloned()
            .ok_or_else(|| {
                RuntimeError::new(format!("Sub-function {} out of range", idx), Span::default())
            })?;

        let mut upvalues = Vec::with_capacity(proto.upvalues.len());
        for _ in 0..proto.upvalues.len() {
            let is_local = cursor.read_byte()? != 0;
            let index = cursor.read_byte()?;
            if is_local {
                upvalues.push(self.capture_upvalue(cursor.base + index as usize));
            } else {
                upvalues.push(cursor.upvalue(index)?);
            }
        }
        Ok(VmClosure::new(proto, upvalues))
    }

    // --- Stack operations ---

    #[inline]
    pub fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= self.config.stack_max {
            return Err(RuntimeError::StackOverflow(Span::default()));
        }
        self.stack.push(value);
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or(RuntimeError::StackUnderflow(Span::default()))
    }

    #[inline]
    pub fn peek(&self, distance: usize) -> Result<&Value, RuntimeError> {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .and_then(|i| self.stack.get(i))
            .ok_or(RuntimeError::StackUnderflow(Span::default()))
    }

    /// The top `count` values, in push order.
    pub(super) fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        let start = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or(RuntimeError::StackUnderflow(Span::default()))?;
        Ok(self.stack.split_off(start))
    }

    fn slot(&self, index: usize) -> Result<&Value, RuntimeError> {
        self.stack
            .get(index)
            .ok_or(RuntimeError::StackUnderflow(Span::default()))
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Value, RuntimeError> {
        self.stack
            .get_mut(index)
            .ok_or(RuntimeError::StackUnderflow(Span::default()))
    }

    // --- Upvalues ---

    /// The open upvalue for `slot`, shared with every closure that already
    /// captured it.
    fn capture_upvalue(&mut self, slot: usize) -> Rc<RefCell<Upvalue>> {
        match self
            .open_upvalues
            .binary_search_by_key(&slot, |upvalue| open_slot(upvalue))
        {
            Ok(i) => self.open_upvalues[i].clone(),
            Err(i) => {
                let upvalue = Rc::new(RefCell::new(Upvalue::Open(slot)));
                self.open_upvalues.insert(i, upvalue.clone());
                upvalue
            }
        }
    }

    /// Close every open upvalue aliasing `from_slot` or above, moving the live
    /// value out of the stack into the upvalue.
    pub fn close_upvalues(&mut self, from_slot: usize) {
        while let Some(upvalue) = self.open_upvalues.pop() {
            let slot = open_slot(&upvalue);
            if slot < from_slot {
                self.open_upvalues.push(upvalue);
                break;
            }
            let value = self.stack.get(slot).cloned().unwrap_or(Value::Nil);
            *upvalue.borrow_mut() = Upvalue::Closed(value);
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

fn open_slot(upvalue: &Rc<RefCell<Upvalue>>) -> usize {
    match &*upvalue.borrow() {
        Upvalue::Open(slot) => *slot,
        Upvalue::Closed(_) => usize::MAX,
    }
}

fn var_constant(cursor: &Cursor, idx: u16) -> Result<Rc<Var>, RuntimeError> {
    match cursor.constant(idx)? {
        Value::Var(var) => Ok(var),
        other => Err(RuntimeError::new(
            format!("Expected a Var constant, found {}", other.type_name()),
            Span::default(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::JoltError;
    use crate::vm::Compiler;
    use crate::ExecutionMode;
    use pretty_assertions::assert_eq;

    fn interp(mode: ExecutionMode) -> Interpreter {
        Interpreter::with_config(Config::default()).with_mode(mode)
    }

    fn limited(vm: VmConfig) -> Interpreter {
        let config = Config {
            vm,
            ..Config::default()
        };
        Interpreter::with_config(config).with_mode(ExecutionMode::Hybrid)
    }

    fn eval(interp: &mut Interpreter, source: &str) -> String {
        interp.eval_str(source).unwrap().to_readable_string()
    }

    /// Evaluate on a thread with room for the full call depth. Returns the
    /// printed result or the error message; the depth counter must be back to
    /// zero either way.
    fn outcome_at_depth(mode: ExecutionMode, source: String) -> String {
        crate::with_eval_stack(&Config::default(), move || {
            let mut interp = interp(mode);
            let outcome = match interp.eval_str(&source) {
                Ok(value) => value.to_readable_string(),
                Err(err) => err.to_string(),
            };
            assert_eq!(interp.depth, 0);
            outcome
        })
        .unwrap()
    }

    /// Compile `source` as one top-level form and run it on a fresh VM.
    fn run(source: &str) -> (Value, Vm) {
        let mut interp = interp(ExecutionMode::Bytecode);
        let expr = interp.parse_str(source).unwrap().remove(0);
        let proto = Compiler::compile_top_level(&expr, "t").unwrap();
        let value = interp.run_top_level(Rc::new(proto)).unwrap();
        let vm = interp.vm.take().unwrap();
        (value, vm)
    }

    #[test]
    fn test_addition() {
        let (value, vm) = run("(+ 1 2)");
        assert_eq!(value, Value::Int(3));
        assert!(vm.stack.is_empty());
    }

    #[test]
    fn test_nested_if() {
        let (value, _) = run("(if (< 1 2) (if (> 3 2) 10 20) 30)");
        assert_eq!(value, Value::Int(10));
    }

    #[test]
    fn test_nested_let() {
        let (value, _) = run("(let [x 1] (let [y 2] (+ x y)))");
        assert_eq!(value, Value::Int(3));
    }

    #[test]
    fn test_loop_runs_in_one_frame() {
        let (value, vm) = run("(loop [n 10 acc 0] (if (= n 0) acc (recur (- n 1) (+ acc n))))");
        assert_eq!(value, Value::Int(55));
        assert_eq!(vm.frame_depth(), 0);
        assert_eq!(vm.peak_frame_depth(), 1);
    }

    #[test]
    fn test_recur_to_fn_head_runs_in_one_frame() {
        let mut interp = interp(ExecutionMode::Hybrid);
        eval(
            &mut interp,
            "(defn count-down [n acc] (if (= n 0) acc (recur (- n 1) (+ acc 1))))",
        );
        assert_eq!(eval(&mut interp, "(count-down 10000 0)"), "10000");
        assert_eq!(interp.vm.as_ref().unwrap().peak_frame_depth(), 1);
    }

    #[test]
    fn test_closures_share_a_captured_local() {
        let mut interp = interp(ExecutionMode::Hybrid);
        eval(
            &mut interp,
            "(defn counters []
               (let [n 0
                     bump (fn [] (set! n (+ n 1)))
                     jump (fn [] (set! n (+ n 10)))]
                 [(bump) (jump) n bump jump]))",
        );
        // While `counters` runs the upvalue is open; afterwards both closures
        // share the closed cell.
        assert_eq!(
            eval(
                &mut interp,
                "(let [cs (counters)] [(cs 0) (cs 1) (cs 2) ((cs 3)) ((cs 4))])"
            ),
            "[1 11 11 12 22]"
        );
        assert!(interp.vm.as_ref().unwrap().open_upvalues.is_empty());
    }

    #[test]
    fn test_loop_iterations_capture_their_own_binding() {
        let mut interp = interp(ExecutionMode::Hybrid);
        eval(
            &mut interp,
            "(defn thunks [] (loop [i 0 acc []] (if (= i 3) acc (recur (+ i 1) (conj acc (fn [] i))))))",
        );
        assert_eq!(
            eval(&mut interp, "(let [fs (thunks)] [((fs 0)) ((fs 1)) ((fs 2))])"),
            "[0 1 2]"
        );
    }

    #[test]
    fn test_let_binding_captured_inside_loop_body() {
        let mut interp = interp(ExecutionMode::Hybrid);
        eval(
            &mut interp,
            "(defn squares [] (loop [i 1 acc []] (if (> i 3) acc (let [sq (* i i)] (recur (+ i 1) (conj acc (fn [] sq)))))))",
        );
        assert_eq!(
            eval(&mut interp, "(let [fs (squares)] [((fs 0)) ((fs 1)) ((fs 2))])"),
            "[1 4 9]"
        );
    }

    #[test]
    fn test_wrong_arity_never_runs_body() {
        let mut interp = interp(ExecutionMode::Hybrid);
        eval(&mut interp, "(defn noisy [x] (println \"ran\") x)");
        interp.capture_output();
        let err = interp.eval_str("(noisy 1 2)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Runtime error: Wrong number of args (2) passed to noisy"
        );
        assert_eq!(interp.take_output(), "");
        assert!(interp.vm.as_ref().unwrap().stack.is_empty());
    }

    #[test]
    fn test_step_budget() {
        let mut interp = limited(VmConfig {
            step_budget: Some(100),
            ..VmConfig::default()
        });
        eval(
            &mut interp,
            "(defn spin [n] (loop [i 0] (if (= i n) i (recur (+ i 1)))))",
        );
        assert_eq!(eval(&mut interp, "(spin 3)"), "3");
        match interp.eval_str("(spin 1000)") {
            Err(JoltError::Runtime(RuntimeError::StepBudgetExhausted(100, _))) => {}
            other => panic!("expected budget error, got {:?}", other.map(|v| v.to_string())),
        }
        // The budget is per top-level execution.
        assert_eq!(eval(&mut interp, "(spin 3)"), "3");
    }

    #[test]
    fn test_frame_overflow() {
        let mut interp = limited(VmConfig {
            frames_max: 8,
            ..VmConfig::default()
        });
        eval(
            &mut interp,
            "(defn down [n] (if (= n 0) 0 (+ 1 (down (- n 1)))))",
        );
        assert_eq!(eval(&mut interp, "(down 5)"), "5");
        match interp.eval_str("(down 100)") {
            Err(JoltError::Runtime(RuntimeError::FrameOverflow { limit: 8, .. })) => {}
            other => panic!("expected frame overflow, got {:?}", other.map(|v| v.to_string())),
        }
        let vm = interp.vm.as_ref().unwrap();
        assert_eq!(vm.frame_depth(), 0);
        assert!(vm.stack.is_empty());
        assert_eq!(interp.depth, 0);
    }

    #[test]
    fn test_stack_overflow() {
        let mut interp = limited(VmConfig {
            stack_max: 4,
            ..VmConfig::default()
        });
        eval(&mut interp, "(defn big [] [1 2 3 4 5])");
        match interp.eval_str("(big)") {
            Err(JoltError::Runtime(RuntimeError::StackOverflow(_))) => {}
            other => panic!("expected stack overflow, got {:?}", other.map(|v| v.to_string())),
        }
        assert!(interp.vm.as_ref().unwrap().stack.is_empty());
    }

    #[test]
    fn test_invalid_opcode() {
        let mut proto = FunctionProto::new("corrupt");
        proto.chunk.write_byte(0xfe, 3);
        let mut interp = interp(ExecutionMode::Bytecode);
        match interp.run_top_level(Rc::new(proto)) {
            Err(RuntimeError::InvalidOpcode(0xfe, span)) => assert_eq!(span.line, 3),
            other => panic!("expected invalid opcode, got {:?}", other.map(|v| v.to_string())),
        }
    }

    #[test]
    fn test_unbound_var_from_bytecode() {
        let mut interp = interp(ExecutionMode::Hybrid);
        eval(&mut interp, "(def later)");
        eval(&mut interp, "(defn use-later [] later)");
        assert!(interp.eval_str("(use-later)").is_err());
        eval(&mut interp, "(def later 7)");
        assert_eq!(eval(&mut interp, "(use-later)"), "7");
    }

    #[test]
    fn test_engines_agree() {
        let programs = [
            "(+ 1 2)",
            "(- 7)",
            "(/ 1 2)",
            "(/ 1.0 4)",
            "(if nil 1 2)",
            "(if false 1)",
            "(not 0)",
            "(= [1 2] [1 2])",
            "(let [x 1 y (+ x 1)] [x y {:sum (+ x y)} #{x}])",
            "(loop [n 10 acc 0] (if (= n 0) acc (recur (- n 1) (+ acc n))))",
            "(defn fact [n] (if (< n 2) 1 (* n (fact (- n 1))))) (fact 10)",
            "(defn adder [n] (fn [x] (+ x n))) ((adder 3) 4)",
            "(defn compose [f g] (fn [x] (f (g x)))) ((compose inc inc) 1)",
            "(def counter 0) (defn tick! [] (set! counter (+ counter 1))) (tick!) (tick!) counter",
            "(defn pairs [xs] (loop [xs xs acc []] (if (empty? xs) acc (recur (rest xs) (conj acc [(first xs) (* 2 (first xs))]))))) (pairs [1 2 3])",
            "(defn outer [] (let [a 1] (fn [] (let [b 2] (fn [] (+ a b)))))) (((outer)))",
            "(defn fib [n] (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))) (fib 15)",
            "(defn f [] (do 1 2 3)) (f)",
            "(defn g [m] (:k m)) (g {:k 'sym})",
        ];
        for source in programs {
            let expected = eval(&mut interp(ExecutionMode::TreeWalk), source);
            for mode in [ExecutionMode::Hybrid, ExecutionMode::Bytecode] {
                assert_eq!(
                    eval(&mut interp(mode), source),
                    expected,
                    "{:?} on {}",
                    mode,
                    source
                );
            }
        }
    }

    #[test]
    fn test_engines_share_the_call_depth_limit() {
        let deep = "(defn d [n] (if (= n 0) 0 (+ 1 (d (- n 1)))))";
        let limit = crate::config::DEFAULT_MAX_DEPTH;
        for mode in [
            ExecutionMode::TreeWalk,
            ExecutionMode::Hybrid,
            ExecutionMode::Bytecode,
        ] {
            assert_eq!(
                outcome_at_depth(mode, format!("{} (d {})", deep, limit - 1)),
                (limit - 1).to_string(),
                "{:?}",
                mode
            );
            assert_eq!(
                outcome_at_depth(mode, format!("{} (d {})", deep, limit)),
                "Runtime error: Stack overflow",
                "{:?}",
                mode
            );
        }
    }
}
