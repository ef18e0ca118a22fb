//! Function application for every callable value.

use std::rc::Rc;

use crate::error::RuntimeError;
use crate::interpreter::environment::Environment;
use crate::interpreter::value::{Function, Value};
use crate::span::Span;
use crate::vm::VmClosure;

use super::{Flow, Interpreter, RuntimeResult};

impl Interpreter {
    /// Call any callable value with already-evaluated arguments.
    pub fn apply(&mut self, callee: &Value, args: Vec<Value>) -> RuntimeResult<Value> {
        match callee {
            Value::Fn(func) => self.call_function(func, args),
            Value::VmClosure(closure) => self.run_compiled(closure.clone(), args),
            Value::NativeFunction(native) => {
                if let Some(arity) = native.arity {
                    if args.len() != arity {
                        return Err(RuntimeError::wrong_arity(
                            native.name.clone(),
                            args.len(),
                            Span::default(),
                        ));
                    }
                }
                (native.func)(self, args)
            }
            Value::Keyword(_) => {
                let (target, default) = lookup_args(callee, args)?;
                Ok(get_or(&target, callee, default))
            }
            Value::Map(_) => {
                let (key, default) = lookup_args(callee, args)?;
                Ok(get_or(callee, &key, default))
            }
            Value::Set(set) => {
                let item = single_arg(callee, args)?;
                Ok(if set.contains(&item) { item } else { Value::Nil })
            }
            Value::Vector(items) => match single_arg(callee, args)? {
                Value::Int(i) => usize::try_from(i)
                    .ok()
                    .and_then(|idx| items.get(idx).cloned())
                    .ok_or(RuntimeError::IndexOutOfBounds {
                        index: i,
                        length: items.len(),
                        span: Span::default(),
                    }),
                other => Err(RuntimeError::type_error(
                    format!("Key must be integer, got {}", other.type_name()),
                    Span::default(),
                )),
            },
            Value::Var(var) => {
                let value = var.deref(Span::default())?;
                self.apply(&value, args)
            }
            other => Err(RuntimeError::not_callable(other.type_name(), Span::default())),
        }
    }

    /// Run an interpreted function. `recur` to the function head rebinds a fresh
    /// frame and re-enters the body without growing the Rust stack.
    fn call_function(&mut self, func: &Rc<Function>, args: Vec<Value>) -> RuntimeResult<Value> {
        let expr = &func.expr;
        let arity = expr.arity_for(args.len()).ok_or_else(|| {
            RuntimeError::wrong_arity(func.name(), args.len(), Span::default())
        })?;

        self.enter(expr.span)?;
        let mut slots = bind_params(func, arity.required(), arity.variadic, args);
        let result = loop {
            let frame = Environment::new(func.env.clone(), slots);
            match self.eval_body_flow(&arity.body, Some(&frame)) {
                Ok(Flow::Normal(value)) => break Ok(value),
                Ok(Flow::Recur(values)) => {
                    let mut next = Vec::with_capacity(values.len() + 1);
                    next.push(Value::Fn(func.clone()));
                    next.extend(values);
                    slots = next;
                }
                Err(err) => break Err(err),
            }
        };
        self.leave();
        result
    }

    /// Run a bytecode closure on this interpreter's VM. Its frames count
    /// against the same call depth as interpreted calls.
    pub(crate) fn run_compiled(
        &mut self,
        closure: Rc<VmClosure>,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        let mut vm = self.take_vm();
        let result = vm.execute(self, closure, args);
        self.vm = Some(vm);
        result
    }
}

/// `[self, fixed..., rest]`: the frame layout the parser assigned to the arity.
fn bind_params(
    func: &Rc<Function>,
    required: usize,
    variadic: bool,
    mut args: Vec<Value>,
) -> Vec<Value> {
    let mut slots = Vec::with_capacity(required + 2);
    slots.push(Value::Fn(func.clone()));
    if variadic {
        let rest = args.split_off(required);
        slots.extend(args);
        slots.push(if rest.is_empty() {
            Value::Nil
        } else {
            Value::list(rest)
        });
    } else {
        slots.extend(args);
    }
    slots
}

fn lookup_args(callee: &Value, args: Vec<Value>) -> RuntimeResult<(Value, Value)> {
    let argc = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(first), default, None) => Ok((first, default.unwrap_or(Value::Nil))),
        _ => Err(RuntimeError::wrong_arity(
            callee.to_readable_string(),
            argc,
            Span::default(),
        )),
    }
}

fn single_arg(callee: &Value, args: Vec<Value>) -> RuntimeResult<Value> {
    let argc = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(only), None) => Ok(only),
        _ => Err(RuntimeError::wrong_arity(
            callee.to_readable_string(),
            argc,
            Span::default(),
        )),
    }
}

/// `(get target key default)` semantics for maps and sets; nil for anything else.
pub(crate) fn get_or(target: &Value, key: &Value, default: Value) -> Value {
    let found = match target {
        Value::Map(map) => map.get(key).cloned(),
        Value::Set(set) => set.get(key).cloned(),
        Value::Vector(items) => match key {
            Value::Int(i) => usize::try_from(*i).ok().and_then(|i| items.get(i).cloned()),
            _ => None,
        },
        _ => None,
    };
    found.unwrap_or(default)
}
