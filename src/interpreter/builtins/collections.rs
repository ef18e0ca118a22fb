//! Collection built-in functions.
//!
//! Collections are immutable: every update copies the shared structure (or
//! reuses it in place when this is the only reference).

use std::rc::Rc;

use crate::error::RuntimeError;
use crate::interpreter::executor::get_or;
use crate::interpreter::namespace::GlobalEnv;
use crate::interpreter::value::{MapImpl, SetImpl, Value};
use crate::span::Span;

use super::{define, expect_args, int_arg, seq_of, type_error};

fn count(value: &Value) -> Result<usize, RuntimeError> {
    match value {
        Value::Nil => Ok(0),
        Value::Str(s) => Ok(s.chars().count()),
        Value::List(items) | Value::Vector(items) => Ok(items.len()),
        Value::Map(map) => Ok(map.len()),
        Value::Set(set) => Ok(set.len()),
        other => Err(RuntimeError::type_error(
            format!("count not supported on this type: {}", other.type_name()),
            Span::default(),
        )),
    }
}

/// `(conj coll x)` for one element.
pub(crate) fn conj_one(coll: Value, item: Value) -> Result<Value, RuntimeError> {
    match coll {
        Value::Nil => Ok(Value::list(vec![item])),
        Value::List(mut items) => {
            Rc::make_mut(&mut items).insert(0, item);
            Ok(Value::List(items))
        }
        Value::Vector(mut items) => {
            Rc::make_mut(&mut items).push(item);
            Ok(Value::Vector(items))
        }
        Value::Set(mut set) => {
            Rc::make_mut(&mut set).insert(item);
            Ok(Value::Set(set))
        }
        Value::Map(mut map) => match &item {
            Value::Vector(pair) if pair.len() == 2 => {
                Rc::make_mut(&mut map).insert(pair[0].clone(), pair[1].clone());
                Ok(Value::Map(map))
            }
            Value::Map(other) => {
                let target = Rc::make_mut(&mut map);
                for (k, v) in other.iter() {
                    target.insert(k.clone(), v.clone());
                }
                Ok(Value::Map(map))
            }
            other => Err(type_error("conj on a map", "a [key value] vector", other)),
        },
        other => Err(type_error("conj", "a collection", &other)),
    }
}

fn assoc(coll: Value, key: Value, value: Value) -> Result<Value, RuntimeError> {
    match coll {
        Value::Nil => {
            let mut map = MapImpl::default();
            map.insert(key, value);
            Ok(Value::Map(Rc::new(map)))
        }
        Value::Map(mut map) => {
            Rc::make_mut(&mut map).insert(key, value);
            Ok(Value::Map(map))
        }
        Value::Vector(mut items) => {
            let index = int_arg("assoc", &key)?;
            let len = items.len();
            match usize::try_from(index) {
                Ok(i) if i < len => Rc::make_mut(&mut items)[i] = value,
                Ok(i) if i == len => Rc::make_mut(&mut items).push(value),
                _ => {
                    return Err(RuntimeError::IndexOutOfBounds {
                        index,
                        length: len,
                        span: Span::default(),
                    })
                }
            }
            Ok(Value::Vector(items))
        }
        other => Err(type_error("assoc", "a map or vector", &other)),
    }
}

fn nth(coll: &Value, index: i64, default: Option<Value>) -> Result<Value, RuntimeError> {
    let items = match coll {
        Value::Nil => return Ok(default.unwrap_or(Value::Nil)),
        Value::List(items) | Value::Vector(items) => items.as_ref().clone(),
        Value::Str(_) => seq_of("nth", coll)?,
        other => return Err(type_error("nth", "a sequential collection", other)),
    };
    match usize::try_from(index).ok().and_then(|i| items.get(i).cloned()) {
        Some(item) => Ok(item),
        None => default.ok_or(RuntimeError::IndexOutOfBounds {
            index,
            length: items.len(),
            span: Span::default(),
        }),
    }
}

fn seq_or_nil(items: Vec<Value>) -> Value {
    if items.is_empty() {
        Value::Nil
    } else {
        Value::list(items)
    }
}

/// Register all collection built-in functions.
pub fn register_collection_builtins(globals: &mut GlobalEnv) {
    define(globals, "list", None, |_, args| Ok(Value::list(args)));
    define(globals, "vector", None, |_, args| Ok(Value::vector(args)));

    // (hash-map & kvs) - later keys win
    define(globals, "hash-map", None, |_, args| {
        if args.len() % 2 != 0 {
            return Err(RuntimeError::new(
                "No value supplied for key",
                Span::default(),
            ));
        }
        let mut map = MapImpl::default();
        let mut args = args.into_iter();
        while let (Some(k), Some(v)) = (args.next(), args.next()) {
            map.insert(k, v);
        }
        Ok(Value::Map(Rc::new(map)))
    });

    define(globals, "hash-set", None, |_, args| {
        Ok(Value::Set(Rc::new(args.into_iter().collect::<SetImpl>())))
    });

    define(globals, "count", Some(1), |_, args| {
        Ok(Value::Int(count(&args[0])? as i64))
    });

    define(globals, "empty?", Some(1), |_, args| {
        Ok(Value::Bool(count(&args[0])? == 0))
    });

    define(globals, "first", Some(1), |_, args| {
        Ok(seq_of("first", &args[0])?.into_iter().next().unwrap_or(Value::Nil))
    });

    // (rest coll) - always a list, possibly empty
    define(globals, "rest", Some(1), |_, args| {
        let items = seq_of("rest", &args[0])?;
        Ok(Value::list(items.into_iter().skip(1).collect()))
    });

    // (next coll) - nil when nothing remains
    define(globals, "next", Some(1), |_, args| {
        let items = seq_of("next", &args[0])?;
        Ok(seq_or_nil(items.into_iter().skip(1).collect()))
    });

    define(globals, "seq", Some(1), |_, args| {
        Ok(seq_or_nil(seq_of("seq", &args[0])?))
    });

    define(globals, "vec", Some(1), |_, args| {
        Ok(Value::vector(seq_of("vec", &args[0])?))
    });

    // (nth coll index) / (nth coll index not-found)
    define(globals, "nth", None, |_, args| {
        expect_args("nth", &args, 2, Some(3))?;
        let index = int_arg("nth", &args[1])?;
        nth(&args[0], index, args.get(2).cloned())
    });

    // (get m k) / (get m k not-found)
    define(globals, "get", None, |_, args| {
        expect_args("get", &args, 2, Some(3))?;
        let default = args.get(2).cloned().unwrap_or(Value::Nil);
        Ok(get_or(&args[0], &args[1], default))
    });

    define(globals, "contains?", Some(2), |_, args| {
        let found = match (&args[0], &args[1]) {
            (Value::Map(map), key) => map.contains_key(key),
            (Value::Set(set), key) => set.contains(key),
            (Value::Vector(items), Value::Int(i)) => *i >= 0 && (*i as usize) < items.len(),
            (Value::Nil, _) => false,
            (other, _) => return Err(type_error("contains?", "a map, set or vector", other)),
        };
        Ok(Value::Bool(found))
    });

    // (conj coll & xs)
    define(globals, "conj", None, |_, args| {
        expect_args("conj", &args, 1, None)?;
        let mut args = args.into_iter();
        let mut coll = args.next().unwrap_or(Value::Nil);
        for item in args {
            coll = conj_one(coll, item)?;
        }
        Ok(coll)
    });

    // (assoc m k v & kvs)
    define(globals, "assoc", None, |_, args| {
        if args.len() < 3 || args.len() % 2 == 0 {
            return Err(RuntimeError::wrong_arity("assoc", args.len(), Span::default()));
        }
        let mut args = args.into_iter();
        let mut coll = args.next().unwrap_or(Value::Nil);
        while let (Some(k), Some(v)) = (args.next(), args.next()) {
            coll = assoc(coll, k, v)?;
        }
        Ok(coll)
    });

    // (dissoc m & ks)
    define(globals, "dissoc", None, |_, args| {
        expect_args("dissoc", &args, 1, None)?;
        let mut args = args.into_iter();
        match args.next() {
            Some(Value::Map(mut map)) => {
                let target = Rc::make_mut(&mut map);
                for key in args {
                    target.shift_remove(&key);
                }
                Ok(Value::Map(map))
            }
            Some(Value::Nil) | None => Ok(Value::Nil),
            Some(other) => Err(type_error("dissoc", "a map", &other)),
        }
    });

    define(globals, "cons", Some(2), |_, args| {
        let mut items = vec![args[0].clone()];
        items.extend(seq_of("cons", &args[1])?);
        Ok(Value::list(items))
    });

    define(globals, "concat", None, |_, args| {
        let mut items = Vec::new();
        for arg in &args {
            items.extend(seq_of("concat", arg)?);
        }
        Ok(Value::list(items))
    });

    // (into to from)
    define(globals, "into", Some(2), |_, args| {
        let mut args = args.into_iter();
        let mut coll = args.next().unwrap_or(Value::Nil);
        let from = args.next().unwrap_or(Value::Nil);
        for item in seq_of("into", &from)? {
            coll = conj_one(coll, item)?;
        }
        Ok(coll)
    });

    define(globals, "keys", Some(1), |_, args| match &args[0] {
        Value::Map(map) => Ok(seq_or_nil(map.keys().cloned().collect())),
        Value::Nil => Ok(Value::Nil),
        other => Err(type_error("keys", "a map", other)),
    });

    define(globals, "vals", Some(1), |_, args| match &args[0] {
        Value::Map(map) => Ok(seq_or_nil(map.values().cloned().collect())),
        Value::Nil => Ok(Value::Nil),
        other => Err(type_error("vals", "a map", other)),
    });

    // (range end) / (range start end) / (range start end step)
    define(globals, "range", None, |_, args| {
        expect_args("range", &args, 1, Some(3))?;
        let ints = args
            .iter()
            .map(|a| int_arg("range", a))
            .collect::<Result<Vec<_>, _>>()?;
        let (start, end, step) = match ints.as_slice() {
            [end] => (0, *end, 1),
            [start, end] => (*start, *end, 1),
            [start, end, step] => (*start, *end, *step),
            _ => (0, 0, 1),
        };
        if step == 0 {
            return Err(RuntimeError::new("range step must not be zero", Span::default()));
        }
        let mut items = Vec::new();
        let mut i = start;
        while (step > 0 && i < end) || (step < 0 && i > end) {
            items.push(Value::Int(i));
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(Value::list(items))
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
    fn test_sequence_access() {
        assert_eq!(eval("(first [1 2 3])"), "1");
        assert_eq!(eval("(rest [1 2 3])"), "(2 3)");
        assert_eq!(eval("(rest [])"), "()");
        assert_eq!(eval("(next [1])"), "nil");
        assert_eq!(eval("(nth [1 2 3] 1)"), "2");
        assert_eq!(eval("(nth [1 2 3] 5 :none)"), ":none");
        assert_eq!(eval("(count \"abc\")"), "3");
        assert_eq!(eval("(count nil)"), "0");
    }

    #[test]
    fn test_conj_depends_on_collection() {
        assert_eq!(eval("(conj [1 2] 3)"), "[1 2 3]");
        assert_eq!(eval("(conj '(1 2) 0)"), "(0 1 2)");
        assert_eq!(eval("(conj nil 1)"), "(1)");
        assert_eq!(eval("(conj {:a 1} [:b 2])"), "{:a 1, :b 2}");
    }

    #[test]
    fn test_maps() {
        assert_eq!(eval("(assoc {:a 1} :b 2 :a 3)"), "{:a 3, :b 2}");
        assert_eq!(eval("(dissoc {:a 1 :b 2} :a)"), "{:b 2}");
        assert_eq!(eval("(get {:a 1} :b 7)"), "7");
        assert_eq!(eval("(:a {:a 1})"), "1");
        assert_eq!(eval("({:a 1} :a)"), "1");
        assert_eq!(eval("(keys {:a 1 :b 2})"), "(:a :b)");
        assert_eq!(eval("(contains? #{1 2} 2)"), "true");
    }

    #[test]
    fn test_originals_are_untouched() {
        assert_eq!(eval("(let [v [1 2] w (conj v 3)] [v w])"), "[[1 2] [1 2 3]]");
        assert_eq!(eval("(let [m {:a 1} n (assoc m :a 2)] [m n])"), "[{:a 1} {:a 2}]");
    }

    #[test]
    fn test_range_and_into() {
        assert_eq!(eval("(range 4)"), "(0 1 2 3)");
        assert_eq!(eval("(range 5 0 -2)"), "(5 3 1)");
        assert_eq!(eval("(into [] '(1 2))"), "[1 2]");
        assert_eq!(eval("(concat [1] '(2) [3])"), "(1 2 3)");
        assert_eq!(eval("(cons 0 [1])"), "(0 1)");
    }
}
