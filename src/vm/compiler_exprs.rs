//! Expression compilation: every `ExprKind` to bytecode.

use std::mem;
use std::rc::Rc;

use crate::ast::{Expr, ExprKind, FnExpr};
use crate::error::CompileError;
use crate::interpreter::namespace::{Var, CORE_NS};
use crate::interpreter::value::Value;
use crate::span::Span;

use super::compiler::{Access, CompileResult, Compiler, RecurTarget};
use super::opcode::OpCode;

impl Compiler {
    /// Compile an expression; exactly one value is left on the stack.
    pub(super) fn compile_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        let base = self.height;
        self.compile_kind(expr)?;
        self.height = base + 1;
        Ok(())
    }

    fn compile_kind(&mut self, expr: &Expr) -> CompileResult<()> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(value) | ExprKind::Quote(value) => {
                self.compile_literal(value, span)?;
            }
            ExprKind::Vector(items) => {
                self.compile_all(items)?;
                let count = collection_size(items.len(), span)?;
                self.emit_op(OpCode::Vector, span);
                self.emit_u16(count, span);
            }
            ExprKind::Set(items) => {
                self.compile_all(items)?;
                let count = collection_size(items.len(), span)?;
                self.emit_op(OpCode::Set, span);
                self.emit_u16(count, span);
            }
            ExprKind::Map(pairs) => {
                for (key, value) in pairs {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                let count = collection_size(pairs.len(), span)?;
                self.emit_op(OpCode::Map, span);
                self.emit_u16(count, span);
            }

            ExprKind::Local(binding) => match self.resolve(&binding.name, span)? {
                Access::Local(slot) => {
                    self.emit_op(OpCode::GetLocal, span);
                    self.emit_byte(slot, span);
                }
                Access::Upvalue(index) => {
                    self.emit_op(OpCode::GetUpvalue, span);
                    self.emit_byte(index, span);
                }
            },
            ExprKind::VarRef(var) => {
                self.emit_var_op(OpCode::GetVar, var, span)?;
            }
            ExprKind::TheVar(var) => {
                self.emit_constant(Value::Var(var.clone()), span)?;
            }

            ExprKind::If { cond, then, else_ } => {
                self.compile_if(cond, then, else_.as_deref(), span)?;
            }
            ExprKind::Do(body) => {
                self.compile_body(body, span)?;
            }
            ExprKind::Let { bindings, body } => {
                self.begin_scope();
                self.compile_bindings(bindings)?;
                self.compile_body(body, span)?;
                self.end_scope(span)?;
            }
            ExprKind::Loop { bindings, body } => {
                self.compile_loop(bindings, body, span)?;
            }
            ExprKind::Recur(args) => {
                self.compile_recur(args, span)?;
            }

            ExprKind::Fn(func) => {
                self.compile_closure(func, span)?;
            }
            ExprKind::Def { var, value } => {
                // `(def x)` declares the Var and leaves it unbound.
                if let Some(value) = value {
                    self.compile_expr(value)?;
                    self.emit_var_op(OpCode::SetVar, var, span)?;
                    self.emit_op(OpCode::Pop, span);
                    self.height -= 1;
                }
                self.emit_constant(Value::Var(var.clone()), span)?;
            }
            ExprKind::SetLocal { binding, value } => {
                self.compile_expr(value)?;
                match self.resolve(&binding.name, span)? {
                    Access::Local(slot) => {
                        self.emit_op(OpCode::SetLocal, span);
                        self.emit_byte(slot, span);
                    }
                    Access::Upvalue(index) => {
                        self.emit_op(OpCode::SetUpvalue, span);
                        self.emit_byte(index, span);
                    }
                }
            }
            ExprKind::SetVar { var, value } => {
                self.compile_expr(value)?;
                self.emit_var_op(OpCode::SetVar, var, span)?;
            }

            ExprKind::Call { callee, args } => {
                self.compile_call(callee, args, span)?;
            }

            ExprKind::Throw(_) => return Err(CompileError::unsupported("throw", span)),
            ExprKind::Try { .. } => return Err(CompileError::unsupported("try", span)),
            ExprKind::MacroCall { var, .. } => {
                return Err(CompileError::unsupported(
                    format!("late-bound macro {}", var.qualified_name()),
                    span,
                ))
            }
        }
        Ok(())
    }

    fn compile_literal(&mut self, value: &Value, span: Span) -> CompileResult<()> {
        match value {
            Value::Nil => {
                self.emit_op(OpCode::Nil, span);
            }
            Value::Bool(true) => {
                self.emit_op(OpCode::True, span);
            }
            Value::Bool(false) => {
                self.emit_op(OpCode::False, span);
            }
            other => self.emit_constant(other.clone(), span)?,
        }
        Ok(())
    }

    fn compile_all(&mut self, exprs: &[Expr]) -> CompileResult<()> {
        for expr in exprs {
            self.compile_expr(expr)?;
        }
        Ok(())
    }

    /// Compile a body for its last value, discarding the others. Empty is nil.
    pub(super) fn compile_body(&mut self, body: &[Expr], span: Span) -> CompileResult<()> {
        let Some((last, init)) = body.split_last() else {
            self.emit_op(OpCode::Nil, span);
            return Ok(());
        };
        for expr in init {
            self.compile_expr(expr)?;
            self.emit_op(OpCode::Pop, expr.span);
            self.height -= 1;
        }
        self.compile_expr(last)
    }

    /// Each initializer becomes a local as soon as it is computed, so later
    /// initializers see earlier bindings.
    fn compile_bindings(&mut self, bindings: &[(Rc<str>, Expr)]) -> CompileResult<()> {
        for (name, init) in bindings {
            self.compile_expr(init)?;
            self.declare_local(name.clone(), init.span)?;
        }
        Ok(())
    }

    fn compile_if(
        &mut self,
        cond: &Expr,
        then: &Expr,
        else_: Option<&Expr>,
        span: Span,
    ) -> CompileResult<()> {
        self.compile_expr(cond)?;
        let else_jump = self.emit_jump(OpCode::JumpIfFalse, span);
        self.height -= 1;

        self.compile_expr(then)?;
        let end_jump = self.emit_jump(OpCode::Jump, span);
        self.patch_jump(else_jump)?;
        self.height -= 1;

        match else_ {
            Some(else_) => self.compile_expr(else_)?,
            None => {
                self.emit_op(OpCode::Nil, span);
            }
        }
        self.patch_jump(end_jump)
    }

    fn compile_loop(
        &mut self,
        bindings: &[(Rc<str>, Expr)],
        body: &[Expr],
        span: Span,
    ) -> CompileResult<()> {
        self.begin_scope();
        let first_slot = self.height;
        self.compile_bindings(bindings)?;

        let target = RecurTarget {
            start: self.current_offset(),
            first_slot,
            arity: bindings.len(),
        };
        let enclosing = self.recur_target.replace(target);
        let compiled = self.compile_body(body, span);
        self.recur_target = enclosing;
        compiled?;

        self.end_scope(span)
    }

    /// Rebind the target's slots in place and jump back to its start.
    fn compile_recur(&mut self, args: &[Expr], span: Span) -> CompileResult<()> {
        let target = self
            .recur_target
            .ok_or(CompileError::RecurOutsideLoop(span))?;
        if args.len() != target.arity {
            return Err(CompileError::RecurArity {
                expected: target.arity,
                got: args.len(),
                span,
            });
        }
        let argc = u8::try_from(args.len()).map_err(|_| CompileError::TooManyLocals(span))?;
        let first_slot =
            u8::try_from(target.first_slot).map_err(|_| CompileError::TooManyLocals(span))?;

        self.compile_all(args)?;
        self.emit_op(OpCode::Recur, span);
        self.emit_byte(argc, span);
        self.emit_byte(first_slot, span);
        self.emit_loop(target.start, span)
    }

    fn compile_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> CompileResult<()> {
        if let Some(op) = intrinsic(callee, args.len()) {
            self.compile_all(args)?;
            self.emit_op(op, span);
            return Ok(());
        }

        self.compile_expr(callee)?;
        self.compile_all(args)?;
        let argc =
            u8::try_from(args.len()).map_err(|_| CompileError::TooManyArguments(args.len(), span))?;
        self.emit_op(OpCode::Call, span);
        self.emit_byte(argc, span);
        Ok(())
    }

    /// Compile a nested function literal and emit the `CLOSURE` that instantiates it.
    fn compile_closure(&mut self, func: &FnExpr, span: Span) -> CompileResult<()> {
        let parent = mem::take(self);
        let self_name = func.name.clone().unwrap_or_else(|| Rc::from(""));
        let mut child = Compiler::new(func.display_name(), self_name, Some(Box::new(parent)));
        let compiled = child.compile_arity(func);
        if let Some(parent) = child.enclosing.take() {
            *self = *parent;
        }
        compiled?;

        let proto = child.finish();
        let index = u16::try_from(self.proto.sub_functions.len())
            .map_err(|_| CompileError::TooManyConstants(span))?;
        let upvalues = proto.upvalues.clone();
        self.proto.sub_functions.push(Rc::new(proto));

        self.emit_op(OpCode::Closure, span);
        self.emit_u16(index, span);
        for upvalue in upvalues {
            self.emit_byte(upvalue.is_local as u8, span);
            self.emit_byte(upvalue.index, span);
        }
        Ok(())
    }

    fn emit_var_op(&mut self, op: OpCode, var: &Rc<Var>, span: Span) -> CompileResult<()> {
        let idx = self.add_constant(Value::Var(var.clone()), span)?;
        self.emit_op(op, span);
        self.emit_u16(idx, span);
        Ok(())
    }
}

/// A call to a core arithmetic or comparison function with the operator's
/// exact shape compiles to a single opcode.
fn intrinsic(callee: &Expr, argc: usize) -> Option<OpCode> {
    let ExprKind::VarRef(var) = &callee.kind else {
        return None;
    };
    if &*var.ns != CORE_NS {
        return None;
    }
    let op = match (&*var.name, argc) {
        ("+", 2) => OpCode::Add,
        ("-", 2) => OpCode::Subtract,
        ("*", 2) => OpCode::Multiply,
        ("/", 2) => OpCode::Divide,
        ("=", 2) => OpCode::Equal,
        ("<", 2) => OpCode::Less,
        (">", 2) => OpCode::Greater,
        ("-", 1) => OpCode::Negate,
        ("not", 1) => OpCode::Not,
        _ => return None,
    };
    Some(op)
}

fn collection_size(len: usize, span: Span) -> CompileResult<u16> {
    u16::try_from(len)
        .map_err(|_| CompileError::unsupported(format!("collection literal of {} items", len), span))
}
