//! Expression-tree-to-bytecode compiler.
//!
//! Single-pass compilation: walks the tree once, emitting bytecode into a `Chunk`.
//! Variable resolution happens at compile time: locals become stack slots,
//! free variables of nested functions become upvalues, globals become Var
//! constants.
//!
//! The compiler tracks the height of the value stack relative to the frame
//! base. Every compiled expression leaves exactly one value, so a local bound
//! while operands are still pending (`(+ a (let [b 2] b))`) lands on the right
//! slot.

use std::rc::Rc;

use crate::ast::{Expr, FnArity, FnExpr};
use crate::error::CompileError;
use crate::interpreter::value::Value;
use crate::span::Span;

use super::chunk::{FunctionProto, UpvalueInfo};
use super::opcode::OpCode;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;

/// A lexical binding tracked during compilation.
#[derive(Debug, Clone)]
pub struct Local {
    pub name: Rc<str>,
    pub depth: usize,
    /// Offset from the frame base.
    pub slot: usize,
    /// A nested function captured this local, so leaving its scope must close it.
    pub captured: bool,
}

/// Where `recur` jumps and which slots it rebinds.
#[derive(Debug, Clone, Copy)]
pub(super) struct RecurTarget {
    pub start: usize,
    pub first_slot: usize,
    pub arity: usize,
}

/// How a lexical name is reached at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Access {
    Local(u8),
    Upvalue(u8),
}

/// The compiler state for one function being built.
pub struct Compiler {
    pub(super) proto: FunctionProto,
    pub(super) locals: Vec<Local>,
    pub(super) upvalues: Vec<UpvalueInfo>,
    pub(super) scope_depth: usize,
    /// Values on the stack above the frame base, locals included.
    pub(super) height: usize,
    pub(super) recur_target: Option<RecurTarget>,
    /// Enclosing function, for upvalue resolution.
    pub(super) enclosing: Option<Box<Compiler>>,
}

impl Compiler {
    /// Slot 0 holds the callee; naming it after the function makes
    /// self-reference an ordinary local.
    pub(super) fn new(name: &str, self_name: Rc<str>, enclosing: Option<Box<Compiler>>) -> Self {
        Self {
            proto: FunctionProto::new(name),
            locals: vec![Local {
                name: self_name,
                depth: 0,
                slot: 0,
                captured: false,
            }],
            upvalues: Vec::new(),
            scope_depth: 0,
            height: 1,
            recur_target: None,
            enclosing,
        }
    }

    /// Compile a function literal as a standalone prototype with no enclosing
    /// function. Fails on any free lexical variable.
    pub fn compile_fn(func: &FnExpr) -> CompileResult<FunctionProto> {
        let mut compiler = Compiler::new(func.display_name(), self_name(func), None);
        compiler.compile_arity(func)?;
        Ok(compiler.finish())
    }

    /// Compile a top-level expression as a zero-argument prototype.
    pub fn compile_top_level(expr: &Expr, name: &str) -> CompileResult<FunctionProto> {
        let mut compiler = Compiler::new(name, Rc::from(""), None);
        compiler.compile_expr(expr)?;
        compiler.emit_op(OpCode::Return, expr.span);
        Ok(compiler.finish())
    }

    /// Declare the parameters of the only arity and compile its body. The body
    /// is a recur target whose slots are the parameters.
    pub(super) fn compile_arity(&mut self, func: &FnExpr) -> CompileResult<()> {
        let arity = single_arity(func)?;
        self.proto.arity = u8::try_from(arity.params.len())
            .map_err(|_| CompileError::TooManyLocals(func.span))?;
        for param in &arity.params {
            self.height += 1;
            self.declare_local(param.clone(), func.span)?;
        }
        self.recur_target = Some(RecurTarget {
            start: 0,
            first_slot: 1,
            arity: arity.params.len(),
        });
        self.compile_body(&arity.body, func.span)?;
        self.emit_op(OpCode::Return, func.span);
        Ok(())
    }

    pub(super) fn finish(mut self) -> FunctionProto {
        self.proto.upvalues = self.upvalues;
        self.proto
    }

    // --- Chunk helpers ---

    pub(super) fn emit_op(&mut self, op: OpCode, span: Span) -> usize {
        self.proto.chunk.write_op(op, line(span))
    }

    pub(super) fn emit_byte(&mut self, byte: u8, span: Span) {
        self.proto.chunk.write_byte(byte, line(span));
    }

    pub(super) fn emit_u16(&mut self, value: u16, span: Span) {
        self.proto.chunk.write_u16(value, line(span));
    }

    pub(super) fn emit_constant(&mut self, value: Value, span: Span) -> CompileResult<()> {
        self.proto.chunk.emit_constant(value, line(span))
    }

    pub(super) fn add_constant(&mut self, value: Value, span: Span) -> CompileResult<u16> {
        self.proto.chunk.add_constant(value, line(span))
    }

    pub(super) fn emit_jump(&mut self, op: OpCode, span: Span) -> usize {
        self.proto.chunk.emit_jump(op, line(span))
    }

    pub(super) fn patch_jump(&mut self, placeholder: usize) -> CompileResult<()> {
        self.proto.chunk.patch_jump(placeholder)
    }

    pub(super) fn emit_loop(&mut self, loop_start: usize, span: Span) -> CompileResult<()> {
        self.proto.chunk.emit_loop(loop_start, line(span))
    }

    pub(super) fn current_offset(&self) -> usize {
        self.proto.chunk.len()
    }

    // --- Scope management ---

    pub(super) fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Drop the locals of the innermost scope from under the scope's result.
    /// Captured locals are closed first so every closure keeps the binding it saw.
    pub(super) fn end_scope(&mut self, span: Span) -> CompileResult<()> {
        self.scope_depth -= 1;
        let keep = self
            .locals
            .iter()
            .rposition(|local| local.depth <= self.scope_depth)
            .map_or(0, |i| i + 1);
        let removed = self.locals.split_off(keep);
        if removed.is_empty() {
            return Ok(());
        }

        if let Some(slot) = removed.iter().filter(|l| l.captured).map(|l| l.slot).min() {
            self.emit_op(OpCode::CloseUpvalue, span);
            self.emit_byte(slot as u8, span);
        }
        let count = u8::try_from(removed.len()).map_err(|_| CompileError::TooManyLocals(span))?;
        self.emit_op(OpCode::PopN, span);
        self.emit_byte(count, span);
        self.height -= removed.len();
        Ok(())
    }

    /// Bind `name` to the value on top of the stack.
    pub(super) fn declare_local(&mut self, name: Rc<str>, span: Span) -> CompileResult<()> {
        let slot = self.height - 1;
        if self.locals.len() >= MAX_LOCALS || slot > u8::MAX as usize {
            return Err(CompileError::TooManyLocals(span));
        }
        self.locals.push(Local {
            name,
            depth: self.scope_depth,
            slot,
            captured: false,
        });
        Ok(())
    }

    // --- Resolution ---

    fn resolve_local(&self, name: &str) -> Option<usize> {
        self.locals.iter().rposition(|local| &*local.name == name)
    }

    /// Resolve `name` against the enclosing functions, recording the capture in
    /// each function between here and the one that owns the local.
    fn resolve_upvalue(&mut self, name: &str, span: Span) -> CompileResult<Option<u8>> {
        let Some(enclosing) = self.enclosing.as_mut() else {
            return Ok(None);
        };
        if let Some(idx) = enclosing.resolve_local(name) {
            let local = &mut enclosing.locals[idx];
            local.captured = true;
            let slot = local.slot as u8;
            return self.add_upvalue(slot, true, span).map(Some);
        }
        match enclosing.resolve_upvalue(name, span)? {
            Some(index) => self.add_upvalue(index, false, span).map(Some),
            None => Ok(None),
        }
    }

    fn add_upvalue(&mut self, index: u8, is_local: bool, span: Span) -> CompileResult<u8> {
        if let Some(i) = self
            .upvalues
            .iter()
            .position(|uv| uv.index == index && uv.is_local == is_local)
        {
            return Ok(i as u8);
        }
        if self.upvalues.len() >= MAX_UPVALUES {
            return Err(CompileError::TooManyUpvalues(span));
        }
        self.upvalues.push(UpvalueInfo { is_local, index });
        Ok((self.upvalues.len() - 1) as u8)
    }

    /// Locals first (most recent wins), then the upvalue chain.
    pub(super) fn resolve(&mut self, name: &str, span: Span) -> CompileResult<Access> {
        if let Some(idx) = self.resolve_local(name) {
            return Ok(Access::Local(self.locals[idx].slot as u8));
        }
        match self.resolve_upvalue(name, span)? {
            Some(index) => Ok(Access::Upvalue(index)),
            None => Err(CompileError::unresolved(name, span)),
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new("", Rc::from(""), None)
    }
}

fn line(span: Span) -> u32 {
    span.line as u32
}

fn self_name(func: &FnExpr) -> Rc<str> {
    func.name.clone().unwrap_or_else(|| Rc::from(""))
}

/// The VM runs single fixed-arity functions only.
pub(super) fn single_arity(func: &FnExpr) -> CompileResult<&FnArity> {
    match func.arities.as_slice() {
        [arity] if !arity.variadic => Ok(arity),
        [_] => Err(CompileError::unsupported("variadic fn", func.span)),
        _ => Err(CompileError::unsupported("multi-arity fn", func.span)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprKind;
    use crate::interpreter::Interpreter;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Expr {
        let mut interp = Interpreter::new();
        interp.parse_str(source).unwrap().remove(0)
    }

    fn fn_of(expr: &Expr) -> Rc<FnExpr> {
        match &expr.kind {
            ExprKind::Fn(func) => func.clone(),
            ExprKind::Let { body, .. } => fn_of(&body[0]),
            _ => panic!("no fn literal in {}", expr),
        }
    }

    fn op(op: OpCode) -> u8 {
        op.into()
    }

    #[test]
    fn test_binary_intrinsic_layout() {
        let proto = Compiler::compile_top_level(&parse("(+ 1 2)"), "t").unwrap();
        assert_eq!(
            proto.chunk.code,
            vec![
                op(OpCode::Const),
                0,
                0,
                op(OpCode::Const),
                0,
                1,
                op(OpCode::Add),
                op(OpCode::Return),
            ]
        );
        assert_eq!(proto.chunk.constants.len(), 2);
        assert!(proto.chunk.constants[0] == Value::Int(1));
        assert!(proto.chunk.constants[1] == Value::Int(2));
    }

    #[test]
    fn test_wrong_shape_intrinsic_is_a_call() {
        let proto = Compiler::compile_top_level(&parse("(+ 1 2 3)"), "t").unwrap();
        assert_eq!(proto.chunk.code[0], op(OpCode::GetVar));
        assert!(proto.chunk.code.contains(&op(OpCode::Call)));
    }

    #[test]
    fn test_intrinsic_set() {
        let single = |source: &str| {
            let proto = Compiler::compile_top_level(&parse(source), "t").unwrap();
            let code = proto.chunk.code;
            (code.len() == 8).then(|| OpCode::from_u8(code[6])).flatten()
        };
        assert_eq!(single("(- 1 2)"), Some(OpCode::Subtract));
        assert_eq!(single("(= 1 2)"), Some(OpCode::Equal));
        assert_eq!(single("(< 1 2)"), Some(OpCode::Less));
        assert_eq!(single("(> 1 2)"), Some(OpCode::Greater));
        for source in ["(<= 1 2)", "(>= 1 2)"] {
            let proto = Compiler::compile_top_level(&parse(source), "t").unwrap();
            assert_eq!(proto.chunk.code[0], op(OpCode::GetVar), "{}", source);
            assert_eq!(proto.chunk.code[proto.chunk.code.len() - 3], op(OpCode::Call), "{}", source);
        }
    }

    #[test]
    fn test_let_slots_follow_parameters() {
        let func = fn_of(&parse("(fn [a b] (let [c (+ a b)] c))"));
        let proto = Compiler::compile_fn(&func).unwrap();
        assert_eq!(proto.arity, 2);
        assert_eq!(
            proto.chunk.code,
            vec![
                op(OpCode::GetLocal),
                1,
                op(OpCode::GetLocal),
                2,
                op(OpCode::Add),
                op(OpCode::GetLocal),
                3,
                op(OpCode::PopN),
                1,
                op(OpCode::Return),
            ]
        );
    }

    #[test]
    fn test_local_above_pending_operand() {
        let func = fn_of(&parse("(fn [a] (+ a (let [b 2] b)))"));
        let proto = Compiler::compile_fn(&func).unwrap();
        assert_eq!(
            proto.chunk.code,
            vec![
                op(OpCode::GetLocal),
                1,
                op(OpCode::Const),
                0,
                0,
                op(OpCode::GetLocal),
                3,
                op(OpCode::PopN),
                1,
                op(OpCode::Add),
                op(OpCode::Return),
            ]
        );
    }

    #[test]
    fn test_upvalues_are_deduplicated() {
        let func = fn_of(&parse("(fn [x] (fn [] (+ x x)))"));
        let proto = Compiler::compile_fn(&func).unwrap();
        let inner = &proto.sub_functions[0];
        assert_eq!(
            inner.upvalues,
            vec![UpvalueInfo {
                is_local: true,
                index: 1
            }]
        );
    }

    #[test]
    fn test_upvalues_chain_through_enclosing_functions() {
        let func = fn_of(&parse("(fn [a] (fn [] (fn [] a)))"));
        let proto = Compiler::compile_fn(&func).unwrap();
        let middle = &proto.sub_functions[0];
        let inner = &middle.sub_functions[0];
        assert_eq!(
            middle.upvalues,
            vec![UpvalueInfo {
                is_local: true,
                index: 1
            }]
        );
        assert_eq!(
            inner.upvalues,
            vec![UpvalueInfo {
                is_local: false,
                index: 0
            }]
        );
    }

    #[test]
    fn test_captured_local_is_closed_at_scope_exit() {
        let proto =
            Compiler::compile_top_level(&parse("(let [x 1] (fn [] x))"), "t").unwrap();
        let code = &proto.chunk.code;
        let close = code
            .iter()
            .position(|&b| b == op(OpCode::CloseUpvalue))
            .unwrap();
        assert_eq!(code[close + 1], 1);
        assert_eq!(code[close + 2], op(OpCode::PopN));
    }

    #[test]
    fn test_self_reference_is_slot_zero() {
        let func = fn_of(&parse("(fn f [n] (f n))"));
        let proto = Compiler::compile_fn(&func).unwrap();
        assert_eq!(&proto.chunk.code[..2], &[op(OpCode::GetLocal), 0]);
    }

    #[test]
    fn test_free_variable_without_enclosing_function() {
        let func = fn_of(&parse("(let [y 1] (fn [x] (+ x y)))"));
        let err = Compiler::compile_fn(&func).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedBinding(ref name, _) if name == "y"));
    }

    #[test]
    fn test_recur_errors() {
        let span = Span::at_line(1);
        let stray = Expr::new(ExprKind::Recur(Vec::new()), span);
        assert!(matches!(
            Compiler::compile_top_level(&stray, "t"),
            Err(CompileError::RecurOutsideLoop(_))
        ));

        let mismatched = Expr::new(
            ExprKind::Loop {
                bindings: vec![(
                    Rc::from("n"),
                    Expr::new(ExprKind::Literal(Value::Int(0)), span),
                )],
                body: vec![Expr::new(ExprKind::Recur(Vec::new()), span)],
            },
            span,
        );
        assert!(matches!(
            Compiler::compile_top_level(&mismatched, "t"),
            Err(CompileError::RecurArity {
                expected: 1,
                got: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_unsupported_forms() {
        let err = Compiler::compile_top_level(&parse("(try 1 (catch Error e 2))"), "t")
            .unwrap_err();
        assert!(matches!(err, CompileError::Unsupported(..)));
        let func = fn_of(&parse("(fn [& xs] xs)"));
        assert!(Compiler::compile_fn(&func).is_err());
        let func = fn_of(&parse("(fn ([] 0) ([x] x))"));
        assert!(Compiler::compile_fn(&func).is_err());
    }

    #[test]
    fn test_too_many_locals() {
        let names: Vec<String> = (0..300).map(|i| format!("v{} {}", i, i)).collect();
        let source = format!("(let [{}] 0)", names.join(" "));
        let err = Compiler::compile_top_level(&parse(&source), "t").unwrap_err();
        assert!(matches!(err, CompileError::TooManyLocals(_)));
    }
}
