//! Core built-in functions: predicates, higher-order functions, exceptions,
//! namespaces and macro introspection.

use std::rc::Rc;

use crate::error::RuntimeError;
use crate::interpreter::namespace::GlobalEnv;
use crate::interpreter::value::{ExInfo, Value};
use crate::interpreter::Interpreter;
use crate::parser::macros::{expand_builtin, expand_user};
use crate::reader::Form;
use crate::span::Span;

use super::{define, expect_args, seq_of, type_error};

/// Call `f` on the i-th element of every collection, stopping at the shortest.
fn map_values(
    interp: &mut Interpreter,
    f: &Value,
    colls: &[Value],
) -> Result<Vec<Value>, RuntimeError> {
    let seqs = colls
        .iter()
        .map(|c| seq_of("map", c))
        .collect::<Result<Vec<_>, _>>()?;
    let len = seqs.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let args = seqs.iter().map(|s| s[i].clone()).collect();
        out.push(interp.apply(f, args)?);
    }
    Ok(out)
}

fn macroexpand_1(interp: &mut Interpreter, value: &Value) -> Result<Value, RuntimeError> {
    let span = Span::default();
    let form = Form::from_value(value, span)?;
    if let Some(expanded) = expand_builtin(interp, &form)
        .map_err(|e| RuntimeError::new(e.to_string(), span))?
    {
        return Ok(expanded.to_value());
    }
    let Value::List(items) = value else {
        return Ok(value.clone());
    };
    let head = match items.first() {
        Some(Value::Symbol(name)) => interp.globals.resolve(name),
        _ => None,
    };
    match head.filter(|var| var.is_macro()).and_then(|var| var.get()) {
        Some(macro_fn) => {
            let args = items[1..]
                .iter()
                .map(|v| Form::from_value(v, span))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(expand_user(interp, &macro_fn, &args, span)?.to_value())
        }
        None => Ok(value.clone()),
    }
}

/// Register the core built-in functions.
pub fn register_core_builtins(globals: &mut GlobalEnv) {
    define(globals, "not", Some(1), |_, args| Ok(Value::Bool(!args[0].is_truthy())));
    define(globals, "identity", Some(1), |_, mut args| Ok(args.remove(0)));

    define(globals, "nil?", Some(1), |_, args| Ok(Value::Bool(args[0].is_nil())));
    define(globals, "string?", Some(1), |_, args| {
        Ok(Value::Bool(matches!(args[0], Value::Str(_))))
    });
    define(globals, "keyword?", Some(1), |_, args| {
        Ok(Value::Bool(matches!(args[0], Value::Keyword(_))))
    });
    define(globals, "symbol?", Some(1), |_, args| {
        Ok(Value::Bool(matches!(args[0], Value::Symbol(_))))
    });
    define(globals, "fn?", Some(1), |_, args| Ok(Value::Bool(args[0].is_fn())));
    define(globals, "vector?", Some(1), |_, args| {
        Ok(Value::Bool(matches!(args[0], Value::Vector(_))))
    });
    define(globals, "map?", Some(1), |_, args| {
        Ok(Value::Bool(matches!(args[0], Value::Map(_))))
    });
    define(globals, "set?", Some(1), |_, args| {
        Ok(Value::Bool(matches!(args[0], Value::Set(_))))
    });
    define(globals, "list?", Some(1), |_, args| {
        Ok(Value::Bool(matches!(args[0], Value::List(_))))
    });

    // (apply f x y & [more]) - the last argument is spread
    define(globals, "apply", None, |interp, mut args| {
        expect_args("apply", &args, 2, None)?;
        let f = args.remove(0);
        let last = args.pop().unwrap_or(Value::Nil);
        args.extend(seq_of("apply", &last)?);
        interp.apply(&f, args)
    });

    // (map f coll & colls)
    define(globals, "map", None, |interp, args| {
        expect_args("map", &args, 2, None)?;
        Ok(Value::list(map_values(interp, &args[0], &args[1..])?))
    });

    define(globals, "filter", Some(2), |interp, args| {
        let mut out = Vec::new();
        for item in seq_of("filter", &args[1])? {
            if interp.apply(&args[0], vec![item.clone()])?.is_truthy() {
                out.push(item);
            }
        }
        Ok(Value::list(out))
    });

    // (reduce f coll) / (reduce f init coll)
    define(globals, "reduce", None, |interp, args| {
        expect_args("reduce", &args, 2, Some(3))?;
        let f = &args[0];
        let (init, items) = if args.len() == 3 {
            (Some(args[1].clone()), seq_of("reduce", &args[2])?)
        } else {
            (None, seq_of("reduce", &args[1])?)
        };
        let mut items = items.into_iter();
        let mut acc = match init.or_else(|| items.next()) {
            Some(acc) => acc,
            None => return interp.apply(f, Vec::new()),
        };
        for item in items {
            acc = interp.apply(f, vec![acc, item])?;
        }
        Ok(acc)
    });

    // (ex-info msg data)
    define(globals, "ex-info", Some(2), |_, mut args| {
        let data = args.pop().unwrap_or(Value::Nil);
        let message = match &args[0] {
            Value::Str(s) => s.to_string(),
            other => return Err(type_error("ex-info", "a message string", other)),
        };
        if !matches!(data, Value::Map(_) | Value::Nil) {
            return Err(type_error("ex-info", "a data map", &data));
        }
        Ok(Value::ExInfo(Rc::new(ExInfo { message, data })))
    });

    define(globals, "ex-message", Some(1), |_, args| match &args[0] {
        Value::ExInfo(ex) => Ok(Value::string(&ex.message)),
        _ => Ok(Value::Nil),
    });

    define(globals, "ex-data", Some(1), |_, args| match &args[0] {
        Value::ExInfo(ex) => Ok(ex.data.clone()),
        _ => Ok(Value::Nil),
    });

    define(globals, "in-ns", Some(1), |interp, args| match &args[0] {
        Value::Symbol(name) => {
            interp.globals.in_ns(name);
            Ok(args[0].clone())
        }
        other => Err(type_error("in-ns", "a symbol", other)),
    });

    // (gensym) / (gensym prefix)
    define(globals, "gensym", None, |interp, args| {
        expect_args("gensym", &args, 0, Some(1))?;
        let prefix = match args.first() {
            Some(Value::Str(s)) => s.to_string(),
            Some(other) => return Err(type_error("gensym", "a prefix string", other)),
            None => "G".to_string(),
        };
        Ok(Value::symbol(&interp.gensym(&prefix)))
    });

    define(globals, "deref", Some(1), |_, args| match &args[0] {
        Value::Var(var) => var.deref(Span::default()),
        other => Err(type_error("deref", "a var", other)),
    });

    define(globals, "macroexpand-1", Some(1), |interp, args| {
        macroexpand_1(interp, &args[0])
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
    fn test_higher_order() {
        assert_eq!(eval("(map inc [1 2 3])"), "(2 3 4)");
        assert_eq!(eval("(map + [1 2] [10 20 30])"), "(11 22)");
        assert_eq!(eval("(filter pos? [-1 2 -3 4])"), "(2 4)");
        assert_eq!(eval("(reduce + [1 2 3 4])"), "10");
        assert_eq!(eval("(reduce + 10 [])"), "10");
        assert_eq!(eval("(reduce + [])"), "0");
        assert_eq!(eval("(apply + 1 [2 3])"), "6");
    }

    #[test]
    fn test_compiled_functions_as_arguments() {
        assert_eq!(
            eval("(defn sq [x] (* x x)) (map sq (range 4))"),
            "(0 1 4 9)"
        );
        assert_eq!(
            eval("(reduce (fn [acc x] (+ acc x)) 0 (range 101))"),
            "5050"
        );
    }

    #[test]
    fn test_ex_info_accessors() {
        assert_eq!(eval("(ex-message (ex-info \"m\" {}))"), "\"m\"");
        assert_eq!(eval("(ex-data (ex-info \"m\" {:k 1}))"), "{:k 1}");
        assert_eq!(eval("(ex-data 5)"), "nil");
    }

    #[test]
    fn test_predicates() {
        assert_eq!(
            eval("[(nil? nil) (string? \"s\") (keyword? :k) (fn? inc) (map? {})]"),
            "[true true true true true]"
        );
        assert_eq!(eval("[(vector? '(1)) (set? #{}) (symbol? 'a)]"), "[false true true]");
    }

    #[test]
    fn test_vars_and_namespaces() {
        assert_eq!(eval("(def x 3) (deref (var x))"), "3");
        assert_eq!(eval("(def x 3) @(var x)"), "3");
        assert_eq!(eval("(in-ns 'other) (def y 1) other/y"), "1");
    }

    #[test]
    fn test_macroexpand_1() {
        assert_eq!(eval("(macroexpand-1 '(when a b))"), "(if a (do b))");
        assert_eq!(
            eval("(defmacro twice [x] (list 'do x x)) (macroexpand-1 '(twice y))"),
            "(do y y)"
        );
        assert_eq!(eval("(macroexpand-1 '(f x))"), "(f x)");
    }
}
