//! Control flow: conditionals, bodies, let/loop frames, recur and exceptions.

use std::rc::Rc;

use crate::ast::{CatchClass, CatchClause, Expr, ExprKind};
use crate::error::RuntimeError;
use crate::interpreter::environment::Environment;
use crate::interpreter::value::{ExInfo, Value};
use crate::span::Span;

use super::{Flow, Interpreter, RuntimeResult};

impl Interpreter {
    /// Evaluate `expr` where a `recur` may appear in tail position.
    pub(crate) fn eval_flow(
        &mut self,
        expr: &Expr,
        env: Option<&Rc<Environment>>,
    ) -> RuntimeResult<Flow> {
        match &expr.kind {
            ExprKind::If { cond, then, else_ } => {
                if self.eval(cond, env)?.is_truthy() {
                    self.eval_flow(then, env)
                } else {
                    match else_ {
                        Some(else_) => self.eval_flow(else_, env),
                        None => Ok(Flow::Normal(Value::Nil)),
                    }
                }
            }
            ExprKind::Do(body) => self.eval_body_flow(body, env),
            ExprKind::Let { bindings, body } => {
                let frame = Environment::new(env.cloned(), Vec::with_capacity(bindings.len()));
                for (_, init) in bindings {
                    let value = self.eval(init, Some(&frame))?;
                    frame.push(value);
                }
                self.eval_body_flow(body, Some(&frame))
            }
            ExprKind::Recur(args) => Ok(Flow::Recur(self.eval_all(args, env)?)),
            _ => self.eval(expr, env).map(Flow::Normal),
        }
    }

    pub(crate) fn eval_body_flow(
        &mut self,
        body: &[Expr],
        env: Option<&Rc<Environment>>,
    ) -> RuntimeResult<Flow> {
        match body.split_last() {
            None => Ok(Flow::Normal(Value::Nil)),
            Some((last, init)) => {
                for expr in init {
                    self.eval(expr, env)?;
                }
                self.eval_flow(last, env)
            }
        }
    }

    /// Every iteration runs in a fresh frame, so closures made in one
    /// iteration keep that iteration's bindings.
    pub(crate) fn eval_loop(
        &mut self,
        bindings: &[(Rc<str>, Expr)],
        body: &[Expr],
        env: Option<&Rc<Environment>>,
    ) -> RuntimeResult<Value> {
        let mut frame = Environment::new(env.cloned(), Vec::with_capacity(bindings.len()));
        for (_, init) in bindings {
            let value = self.eval(init, Some(&frame))?;
            frame.push(value);
        }
        loop {
            match self.eval_body_flow(body, Some(&frame))? {
                Flow::Normal(value) => return Ok(value),
                Flow::Recur(values) => frame = Environment::new(env.cloned(), values),
            }
        }
    }

    pub(crate) fn eval_throw(
        &mut self,
        value: &Expr,
        env: Option<&Rc<Environment>>,
        span: Span,
    ) -> RuntimeResult<Value> {
        let value = self.eval(value, env)?;
        match &value {
            Value::ExInfo(ex) => Err(RuntimeError::thrown(ex.message.clone(), value.clone(), span)),
            other => Err(RuntimeError::type_error(
                format!("Cannot throw {}: use ex-info", other.type_name()),
                span,
            )),
        }
    }

    pub(crate) fn eval_try(
        &mut self,
        body: &[Expr],
        catches: &[CatchClause],
        finally: Option<&[Expr]>,
        env: Option<&Rc<Environment>>,
    ) -> RuntimeResult<Value> {
        let result = match self.eval_body(body, env) {
            Err(err) => match catches.iter().find(|c| catches_error(c.class, &err)) {
                Some(clause) => {
                    let frame = Environment::new(env.cloned(), vec![error_value(err)]);
                    self.eval_body(&clause.body, Some(&frame))
                }
                None => Err(err),
            },
            ok => ok,
        };
        if let Some(finally) = finally {
            self.eval_body(finally, env)?;
        }
        result
    }
}

fn catches_error(class: CatchClass, err: &RuntimeError) -> bool {
    match class {
        CatchClass::Any => true,
        CatchClass::ExInfo => matches!(err, RuntimeError::Thrown { .. }),
    }
}

/// The value bound by `catch`: the thrown value, or an ex-info wrapping the message
/// of an error raised by the runtime.
fn error_value(err: RuntimeError) -> Value {
    match err {
        RuntimeError::Thrown { value, .. } => value,
        other => Value::ExInfo(Rc::new(ExInfo {
            message: other.to_string(),
            data: Value::Nil,
        })),
    }
}
