//! Expression evaluation.

use std::rc::Rc;

use crate::ast::{Expr, ExprKind};
use crate::error::RuntimeError;
use crate::interpreter::environment::Environment;
use crate::interpreter::value::{Function, Value};
use crate::parser::{macros, Parser};
use crate::vm::{self, VmClosure};
use crate::ExecutionMode;

use super::{Flow, Interpreter, RuntimeResult};

impl Interpreter {
    /// Evaluate an expression in `env` (`None` at top level).
    pub fn eval(&mut self, expr: &Expr, env: Option<&Rc<Environment>>) -> RuntimeResult<Value> {
        match &expr.kind {
            ExprKind::Literal(value) | ExprKind::Quote(value) => Ok(value.clone()),

            ExprKind::Local(binding) => env.and_then(|e| e.get(binding)).ok_or_else(|| {
                RuntimeError::new(format!("Unbound local: {}", binding.name), expr.span)
            }),
            ExprKind::VarRef(var) => var.deref(expr.span),
            ExprKind::TheVar(var) => Ok(Value::Var(var.clone())),

            ExprKind::Vector(items) => Ok(Value::vector(self.eval_all(items, env)?)),
            ExprKind::Set(items) => {
                let items = self.eval_all(items, env)?;
                Value::set_from_items(items).map_err(|e| e.with_span(expr.span))
            }
            ExprKind::Map(pairs) => {
                let mut entries = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let k = self.eval(k, env)?;
                    let v = self.eval(v, env)?;
                    entries.push((k, v));
                }
                Value::map_from_pairs(entries).map_err(|e| e.with_span(expr.span))
            }

            ExprKind::If { .. } | ExprKind::Do(_) | ExprKind::Let { .. } | ExprKind::Recur(_) => {
                match self.eval_flow(expr, env)? {
                    Flow::Normal(value) => Ok(value),
                    Flow::Recur(_) => Err(RuntimeError::new(
                        "Can only recur from tail position",
                        expr.span,
                    )),
                }
            }
            ExprKind::Loop { bindings, body } => self.eval_loop(bindings, body, env),
            ExprKind::Try {
                body,
                catches,
                finally,
            } => self.eval_try(body, catches, finally.as_deref(), env),
            ExprKind::Throw(value) => self.eval_throw(value, env, expr.span),

            ExprKind::Fn(func) => Ok(match func.compiled.get() {
                Some(proto) => Value::VmClosure(Rc::new(VmClosure::new(proto.clone(), Vec::new()))),
                None => Value::Fn(Rc::new(Function {
                    expr: func.clone(),
                    env: env.cloned(),
                })),
            }),

            ExprKind::Def { var, value } => {
                if let Some(value) = value {
                    let value = self.eval(value, env)?;
                    var.set(value);
                }
                Ok(Value::Var(var.clone()))
            }
            ExprKind::SetLocal { binding, value } => {
                let value = self.eval(value, env)?;
                let updated = env.is_some_and(|e| e.set(binding, value.clone()));
                if !updated {
                    return Err(RuntimeError::new(
                        format!("Unbound local: {}", binding.name),
                        expr.span,
                    ));
                }
                Ok(value)
            }
            ExprKind::SetVar { var, value } => {
                let value = self.eval(value, env)?;
                var.set(value.clone());
                Ok(value)
            }

            ExprKind::Call { callee, args } => {
                let callee = self.eval(callee, env)?;
                let args = self.eval_all(args, env)?;
                self.apply(&callee, args).map_err(|e| e.with_span(expr.span))
            }

            ExprKind::MacroCall { var, args } => {
                let macro_fn = var.deref(expr.span)?;
                let expansion = macros::expand_user(self, &macro_fn, args, expr.span)?;
                let expanded = Parser::new(self)
                    .parse(&expansion)
                    .map_err(|e| RuntimeError::new(e.to_string(), expr.span))?;
                if self.mode != ExecutionMode::TreeWalk {
                    vm::compile_tree(&expanded, &self.config);
                }
                self.eval(&expanded, None)
            }
        }
    }

    pub(crate) fn eval_all(
        &mut self,
        exprs: &[Expr],
        env: Option<&Rc<Environment>>,
    ) -> RuntimeResult<Vec<Value>> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push(self.eval(expr, env)?);
        }
        Ok(values)
    }

    /// Evaluate a body for its last value; an empty body is nil.
    pub(crate) fn eval_body(
        &mut self,
        body: &[Expr],
        env: Option<&Rc<Environment>>,
    ) -> RuntimeResult<Value> {
        let mut last = Value::Nil;
        for expr in body {
            last = self.eval(expr, env)?;
        }
        Ok(last)
    }
}
