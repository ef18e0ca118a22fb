//! String building and printing built-in functions.

use crate::interpreter::namespace::GlobalEnv;
use crate::interpreter::value::Value;
use crate::interpreter::Interpreter;

use super::{define, expect_args, int_arg, type_error};

fn join(args: &[Value], readable: bool) -> String {
    args.iter()
        .map(|v| {
            if readable {
                v.to_readable_string()
            } else {
                v.to_display_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn emit(interp: &mut Interpreter, text: String) -> Value {
    interp.write_out(&text);
    Value::Nil
}

/// Register all string built-in functions.
pub fn register_string_builtins(globals: &mut GlobalEnv) {
    // (str & xs) - concatenation of display forms; nil contributes nothing
    define(globals, "str", None, |_, args| {
        let mut out = String::new();
        for arg in &args {
            if !arg.is_nil() {
                out.push_str(&arg.to_display_string());
            }
        }
        Ok(Value::string(&out))
    });

    define(globals, "pr-str", None, |_, args| Ok(Value::string(&join(&args, true))));

    define(globals, "print", None, |interp, args| Ok(emit(interp, join(&args, false))));

    define(globals, "println", None, |interp, args| {
        Ok(emit(interp, format!("{}\n", join(&args, false))))
    });

    define(globals, "prn", None, |interp, args| {
        Ok(emit(interp, format!("{}\n", join(&args, true))))
    });

    // (subs s start) / (subs s start end) - character offsets
    define(globals, "subs", None, |_, args| {
        expect_args("subs", &args, 2, Some(3))?;
        let Value::Str(s) = &args[0] else {
            return Err(type_error("subs", "a string", &args[0]));
        };
        let chars: Vec<char> = s.chars().collect();
        let start = int_arg("subs", &args[1])?;
        let end = match args.get(2) {
            Some(end) => int_arg("subs", end)?,
            None => chars.len() as i64,
        };
        if start < 0 || end < start || end as usize > chars.len() {
            return Err(crate::error::RuntimeError::IndexOutOfBounds {
                index: end,
                length: chars.len(),
                span: crate::span::Span::default(),
            });
        }
        let out: String = chars[start as usize..end as usize].iter().collect();
        Ok(Value::string(&out))
    });

    // (name x) - the unqualified text of a keyword, symbol or string
    define(globals, "name", Some(1), |_, args| match &args[0] {
        Value::Str(s) => Ok(Value::Str(s.clone())),
        Value::Keyword(k) | Value::Symbol(k) => {
            let name = k.rsplit_once('/').map_or(&**k, |(_, n)| n);
            Ok(Value::string(name))
        }
        other => Err(type_error("name", "a string, keyword or symbol", other)),
    });

    define(globals, "keyword", Some(1), |_, args| match &args[0] {
        Value::Str(s) | Value::Symbol(s) => Ok(Value::keyword(s)),
        Value::Keyword(_) => Ok(args[0].clone()),
        other => Err(type_error("keyword", "a string", other)),
    });

    define(globals, "symbol", Some(1), |_, args| match &args[0] {
        Value::Str(s) | Value::Keyword(s) => Ok(Value::symbol(s)),
        Value::Symbol(_) => Ok(args[0].clone()),
        other => Err(type_error("symbol", "a string", other)),
    });
}
