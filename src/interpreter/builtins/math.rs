//! Numeric built-in functions: arithmetic, comparison and number predicates.
//!
//! The two-argument cases of `+ - * / < > =` must agree exactly with the VM's
//! arithmetic opcodes, so both go through [`crate::interpreter::numbers`].

use crate::error::RuntimeError;
use crate::interpreter::namespace::GlobalEnv;
use crate::interpreter::numbers;
use crate::interpreter::value::Value;
use crate::span::Span;

use super::{define, expect_args, type_error};

type BinaryOp = fn(&Value, &Value) -> Result<Value, RuntimeError>;

/// Left fold starting from the first argument; a lone argument must be a number.
fn fold(name: &str, args: Vec<Value>, op: BinaryOp) -> Result<Value, RuntimeError> {
    let mut args = args.into_iter();
    let Some(first) = args.next() else {
        return Err(RuntimeError::wrong_arity(name, 0, Span::default()));
    };
    if !numbers::is_number(&first) {
        return Err(RuntimeError::type_error(
            format!("Cannot apply {} to {}", name, first.type_name()),
            Span::default(),
        ));
    }
    let mut acc = first;
    for arg in args {
        acc = op(&acc, &arg)?;
    }
    Ok(acc)
}

/// True when `op` holds for every adjacent pair.
fn chain(name: &str, args: &[Value], op: BinaryOp) -> Result<Value, RuntimeError> {
    expect_args(name, args, 1, None)?;
    if let [only] = args {
        if !numbers::is_number(only) {
            return Err(type_error(name, "a number", only));
        }
    }
    for pair in args.windows(2) {
        if !op(&pair[0], &pair[1])?.is_truthy() {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn number_arg(name: &str, value: &Value) -> Result<(), RuntimeError> {
    if numbers::is_number(value) {
        Ok(())
    } else {
        Err(type_error(name, "a number", value))
    }
}

/// Register all math built-in functions.
pub fn register_math_builtins(globals: &mut GlobalEnv) {
    // (+ & nums)
    define(globals, "+", None, |_, args| {
        if args.is_empty() {
            return Ok(Value::Int(0));
        }
        fold("+", args, numbers::add)
    });

    // (* & nums)
    define(globals, "*", None, |_, args| {
        if args.is_empty() {
            return Ok(Value::Int(1));
        }
        fold("*", args, numbers::mul)
    });

    // (- x & more) - a single argument is negated
    define(globals, "-", None, |_, args| {
        if let [only] = args.as_slice() {
            return numbers::negate(only);
        }
        fold("-", args, numbers::sub)
    });

    // (/ x & more) - a single argument is inverted
    define(globals, "/", None, |_, args| {
        if let [only] = args.as_slice() {
            return numbers::div(&Value::Int(1), only);
        }
        fold("/", args, numbers::div)
    });

    define(globals, "<", None, |_, args| chain("<", &args, numbers::lt));
    define(globals, ">", None, |_, args| chain(">", &args, numbers::gt));
    define(globals, "<=", None, |_, args| chain("<=", &args, numbers::lte));
    define(globals, ">=", None, |_, args| chain(">=", &args, numbers::gte));

    // (= x & more) - structural equality; numbers of different categories differ
    define(globals, "=", None, |_, args| {
        expect_args("=", &args, 1, None)?;
        Ok(Value::Bool(args.windows(2).all(|p| p[0] == p[1])))
    });

    define(globals, "not=", None, |_, args| {
        expect_args("not=", &args, 1, None)?;
        Ok(Value::Bool(!args.windows(2).all(|p| p[0] == p[1])))
    });

    define(globals, "inc", Some(1), |_, args| numbers::add(&args[0], &Value::Int(1)));
    define(globals, "dec", Some(1), |_, args| numbers::sub(&args[0], &Value::Int(1)));

    define(globals, "quot", Some(2), |_, args| numbers::quot(&args[0], &args[1]));
    define(globals, "rem", Some(2), |_, args| numbers::rem(&args[0], &args[1]));
    define(globals, "mod", Some(2), |_, args| numbers::modulo(&args[0], &args[1]));

    define(globals, "zero?", Some(1), |_, args| {
        numbers::is_zero(&args[0]).map(Value::Bool)
    });
    define(globals, "pos?", Some(1), |_, args| {
        number_arg("pos?", &args[0])?;
        numbers::gt(&args[0], &Value::Int(0))
    });
    define(globals, "neg?", Some(1), |_, args| {
        number_arg("neg?", &args[0])?;
        numbers::lt(&args[0], &Value::Int(0))
    });
    define(globals, "number?", Some(1), |_, args| {
        Ok(Value::Bool(numbers::is_number(&args[0])))
    });

    // (max x & more) / (min x & more)
    define(globals, "max", None, |_, args| {
        fold("max", args, |a, b| {
            Ok(if numbers::gt(b, a)?.is_truthy() { b.clone() } else { a.clone() })
        })
    });
    define(globals, "min", None, |_, args| {
        fold("min", args, |a, b| {
            Ok(if numbers::lt(b, a)?.is_truthy() { b.clone() } else { a.clone() })
        })
    });
}

#[cfg(test)]
mod tests {
    use crate::interpreter::Interpreter;
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> String {
        let mut interp = Interpreter::new();
        interp.eval_str(source).unwrap().to_readable_string()
    }

    #[test]
    fn test_variadic_arithmetic() {
        assert_eq!(eval("(+)"), "0");
        assert_eq!(eval("(+ 1 2 3)"), "6");
        assert_eq!(eval("(- 5)"), "-5");
        assert_eq!(eval("(- 10 1 2)"), "7");
        assert_eq!(eval("(* 2 3 4)"), "24");
        assert_eq!(eval("(/ 2)"), "1/2");
        assert_eq!(eval("(/ 12 2 3)"), "2");
        assert_eq!(eval("(+ 1 1.5)"), "2.5");
    }

    #[test]
    fn test_comparisons_chain() {
        assert_eq!(eval("(< 1 2 3)"), "true");
        assert_eq!(eval("(< 1 3 2)"), "false");
        assert_eq!(eval("(>= 3 3 1)"), "true");
        assert_eq!(eval("(= 1 1 1)"), "true");
        assert_eq!(eval("(= 1 1.0)"), "false");
        assert_eq!(eval("(not= 1 2)"), "true");
    }

    #[test]
    fn test_integer_division_helpers() {
        assert_eq!(eval("(quot -7 2)"), "-3");
        assert_eq!(eval("(rem -7 2)"), "-1");
        assert_eq!(eval("(mod -7 2)"), "1");
        assert_eq!(eval("(max 1 5 3)"), "5");
        assert_eq!(eval("(min 4 2 9)"), "2");
    }

    #[test]
    fn test_type_errors() {
        let mut interp = Interpreter::new();
        let err = interp.eval_str("(+ 1 \"a\")").unwrap_err();
        assert_eq!(err.to_string(), "Runtime error: Cannot apply + to String");
    }
}
