//! Built-in functions for Jolt, interned into the `core` namespace.

use std::rc::Rc;

use crate::error::RuntimeError;
use crate::interpreter::namespace::{GlobalEnv, CORE_NS};
use crate::interpreter::value::{NativeFn, NativeFunction, Value};
use crate::span::Span;

pub mod collections;
pub mod core;
pub mod math;
pub mod strings;

/// Register every built-in function.
pub fn register_builtins(globals: &mut GlobalEnv) {
    math::register_math_builtins(globals);
    collections::register_collection_builtins(globals);
    strings::register_string_builtins(globals);
    core::register_core_builtins(globals);
}

/// Bind `name` in `core` to a native function.
pub(crate) fn define(globals: &mut GlobalEnv, name: &str, arity: Option<usize>, func: NativeFn) {
    let native = NativeFunction::new(name, arity, func);
    globals
        .intern_in(CORE_NS, name)
        .set(Value::NativeFunction(Rc::new(native)));
}

/// Fail unless `min <= args.len() <= max` (`max` of `None` is unbounded).
pub(crate) fn expect_args(
    name: &str,
    args: &[Value],
    min: usize,
    max: Option<usize>,
) -> Result<(), RuntimeError> {
    if args.len() < min || max.is_some_and(|max| args.len() > max) {
        return Err(RuntimeError::wrong_arity(name, args.len(), Span::default()));
    }
    Ok(())
}

pub(crate) fn type_error(name: &str, expected: &str, got: &Value) -> RuntimeError {
    RuntimeError::type_error(
        format!("{} expects {}, got {}", name, expected, got.type_name()),
        Span::default(),
    )
}

/// Elements of a seqable argument.
pub(crate) fn seq_of(name: &str, value: &Value) -> Result<Vec<Value>, RuntimeError> {
    value.seq_items().ok_or_else(|| {
        RuntimeError::type_error(
            format!("{}: Don't know how to create ISeq from: {}", name, value.type_name()),
            Span::default(),
        )
    })
}

pub(crate) fn int_arg(name: &str, value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(type_error(name, "an integer", other)),
    }
}
