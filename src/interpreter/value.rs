//! Runtime values for the Jolt interpreter and VM.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::AHasher;
use indexmap::{IndexMap, IndexSet};
use rust_decimal::Decimal;

use crate::ast::FnExpr;
use crate::error::RuntimeError;
use crate::interpreter::environment::Environment;
use crate::interpreter::namespace::Var;
use crate::interpreter::numbers::Ratio;
use crate::interpreter::Interpreter;
use crate::span::Span;
use crate::vm::upvalue::VmClosure;

/// Persistent map representation (insertion ordered).
pub type MapImpl = IndexMap<Value, Value, ahash::RandomState>;
/// Persistent set representation (insertion ordered).
pub type SetImpl = IndexSet<Value, ahash::RandomState>;

/// A runtime value.
///
/// Collections are shared behind `Rc` and never mutated in place: every update
/// builds a new collection.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Ratio(Ratio),
    Double(f64),
    Decimal(Decimal),
    Str(Rc<str>),
    Char(char),
    Keyword(Rc<str>),
    Symbol(Rc<str>),
    List(Rc<Vec<Value>>),
    Vector(Rc<Vec<Value>>),
    Map(Rc<MapImpl>),
    Set(Rc<SetImpl>),
    /// Interpreted function literal closed over its defining environment.
    Fn(Rc<Function>),
    /// Bytecode closure
    VmClosure(Rc<VmClosure>),
    NativeFunction(Rc<NativeFunction>),
    Var(Rc<Var>),
    ExInfo(Rc<ExInfo>),
}

/// An interpreted function: the literal plus the environment it was created in.
pub struct Function {
    pub expr: Rc<FnExpr>,
    pub env: Option<Rc<Environment>>,
}

impl Function {
    pub fn name(&self) -> &str {
        self.expr.name.as_deref().unwrap_or("fn")
    }
}

pub type NativeFn = fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>;

/// A native/builtin function.
pub struct NativeFunction {
    pub name: String,
    /// Exact argument count; `None` means the function checks its own arguments.
    pub arity: Option<usize>,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn new(name: impl Into<String>, arity: Option<usize>, func: NativeFn) -> Self {
        Self {
            name: name.into(),
            arity,
            func,
        }
    }
}

/// The value raised by `throw`, built with `ex-info`.
pub struct ExInfo {
    pub message: String,
    pub data: Value,
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn keyword(name: &str) -> Value {
        Value::Keyword(Rc::from(name))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Rc::from(name))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    pub fn vector(items: Vec<Value>) -> Value {
        Value::Vector(Rc::new(items))
    }

    /// Build a map literal; two equal keys are an error.
    pub fn map_from_pairs(pairs: Vec<(Value, Value)>) -> Result<Value, RuntimeError> {
        let mut map = MapImpl::with_capacity_and_hasher(pairs.len(), Default::default());
        for (key, value) in pairs {
            if map.contains_key(&key) {
                return Err(duplicate_key(&key));
            }
            map.insert(key, value);
        }
        Ok(Value::Map(Rc::new(map)))
    }

    /// Build a set literal; two equal elements are an error.
    pub fn set_from_items(items: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut set = SetImpl::with_capacity_and_hasher(items.len(), Default::default());
        for item in items {
            if set.contains(&item) {
                return Err(duplicate_key(&item));
            }
            set.insert(item);
        }
        Ok(Value::Set(Rc::new(set)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Int",
            Value::Ratio(_) => "Ratio",
            Value::Double(_) => "Double",
            Value::Decimal(_) => "BigDecimal",
            Value::Str(_) => "String",
            Value::Char(_) => "Char",
            Value::Keyword(_) => "Keyword",
            Value::Symbol(_) => "Symbol",
            Value::List(_) => "List",
            Value::Vector(_) => "Vector",
            Value::Map(_) => "Map",
            Value::Set(_) => "Set",
            Value::Fn(_) | Value::VmClosure(_) | Value::NativeFunction(_) => "Fn",
            Value::Var(_) => "Var",
            Value::ExInfo(_) => "ExInfo",
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_fn(&self) -> bool {
        matches!(
            self,
            Value::Fn(_) | Value::VmClosure(_) | Value::NativeFunction(_)
        )
    }

    /// Elements of a sequential value, `None` for non-sequences.
    pub fn seq_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::Nil => Some(Vec::new()),
            Value::List(items) | Value::Vector(items) => Some(items.as_ref().clone()),
            Value::Map(map) => Some(
                map.iter()
                    .map(|(k, v)| Value::vector(vec![k.clone(), v.clone()]))
                    .collect(),
            ),
            Value::Set(set) => Some(set.iter().cloned().collect()),
            Value::Str(s) => Some(s.chars().map(Value::Char).collect()),
            _ => None,
        }
    }

    /// Text produced by `str`/`print`: strings and characters unquoted.
    pub fn to_display_string(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write(&mut out, false);
        out
    }

    /// Text produced by `pr`/`prn`: readable back by the reader.
    pub fn to_readable_string(&self) -> String {
        self.to_string()
    }

    fn write(&self, f: &mut dyn fmt::Write, readable: bool) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Ratio(r) => write!(f, "{}", r),
            Value::Double(d) => write!(f, "{}", format_double(*d)),
            Value::Decimal(d) if readable => write!(f, "{}M", d),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Str(s) if readable => write!(f, "{:?}", s),
            Value::Str(s) => write!(f, "{}", s),
            Value::Char(c) if readable => write!(f, "{}", char_literal(*c)),
            Value::Char(c) => write!(f, "{}", c),
            Value::Keyword(k) => write!(f, ":{}", k),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::List(items) => write_seq(f, "(", ")", items.iter(), readable),
            Value::Vector(items) => write_seq(f, "[", "]", items.iter(), readable),
            Value::Set(set) => write_seq(f, "#{", "}", set.iter(), readable),
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, val)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    key.write(f, readable)?;
                    write!(f, " ")?;
                    val.write(f, readable)?;
                }
                write!(f, "}}")
            }
            Value::Fn(func) => write!(f, "#<fn {}>", func.name()),
            Value::VmClosure(c) => write!(f, "#<fn {}>", c.proto.name),
            Value::NativeFunction(func) => write!(f, "#<native {}>", func.name),
            Value::Var(var) => write!(f, "#'{}", var.qualified_name()),
            Value::ExInfo(ex) => {
                write!(f, "#error {{:message {:?}, :data ", ex.message)?;
                ex.data.write(f, true)?;
                write!(f, "}}")
            }
        }
    }
}

fn duplicate_key(key: &Value) -> RuntimeError {
    RuntimeError::new(format!("Duplicate key: {}", key), Span::default())
}

fn write_seq<'a>(
    f: &mut dyn fmt::Write,
    open: &str,
    close: &str,
    items: impl Iterator<Item = &'a Value>,
    readable: bool,
) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        item.write(f, readable)?;
    }
    write!(f, "{}", close)
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "##NaN".to_string()
    } else if d.is_infinite() {
        let text = if d > 0.0 { "##Inf" } else { "##-Inf" };
        text.to_string()
    } else if d.fract() == 0.0 && d.abs() < 1e16 {
        format!("{:.1}", d)
    } else {
        format!("{}", d)
    }
}

fn char_literal(c: char) -> String {
    match c {
        '\n' => "\\newline".to_string(),
        ' ' => "\\space".to_string(),
        '\t' => "\\tab".to_string(),
        '\r' => "\\return".to_string(),
        '\u{8}' => "\\backspace".to_string(),
        '\u{c}' => "\\formfeed".to_string(),
        c => format!("\\{}", c),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, true)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, true)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Ratio(a), Value::Ratio(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (
                Value::List(a) | Value::Vector(a),
                Value::List(b) | Value::Vector(b),
            ) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y),
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Set(a), Value::Set(b)) => a.len() == b.len() && a.iter().all(|v| b.contains(v)),
            (Value::Fn(a), Value::Fn(b)) => Rc::ptr_eq(a, b),
            (Value::VmClosure(a), Value::VmClosure(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Var(a), Value::Var(b)) => Rc::ptr_eq(a, b),
            (Value::ExInfo(a), Value::ExInfo(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Nil => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Int(n) => {
                2u8.hash(state);
                n.hash(state);
            }
            Value::Ratio(r) => {
                3u8.hash(state);
                r.hash(state);
            }
            Value::Double(d) => {
                4u8.hash(state);
                // 0.0 and -0.0 compare equal.
                let d = if *d == 0.0 { 0.0 } else { *d };
                d.to_bits().hash(state);
            }
            Value::Decimal(d) => {
                5u8.hash(state);
                d.hash(state);
            }
            Value::Str(s) => {
                6u8.hash(state);
                s.hash(state);
            }
            Value::Char(c) => {
                7u8.hash(state);
                c.hash(state);
            }
            Value::Keyword(k) => {
                8u8.hash(state);
                k.hash(state);
            }
            Value::Symbol(s) => {
                9u8.hash(state);
                s.hash(state);
            }
            // Lists and vectors with equal elements are equal, so they hash alike.
            Value::List(items) | Value::Vector(items) => {
                10u8.hash(state);
                items.len().hash(state);
                for item in items.iter() {
                    item.hash(state);
                }
            }
            Value::Map(map) => {
                11u8.hash(state);
                unordered_hash(map.iter()).hash(state);
            }
            Value::Set(set) => {
                12u8.hash(state);
                unordered_hash(set.iter()).hash(state);
            }
            Value::Fn(f) => (Rc::as_ptr(f) as *const u8 as usize).hash(state),
            Value::VmClosure(c) => (Rc::as_ptr(c) as *const u8 as usize).hash(state),
            Value::NativeFunction(n) => (Rc::as_ptr(n) as *const u8 as usize).hash(state),
            Value::Var(v) => (Rc::as_ptr(v) as *const u8 as usize).hash(state),
            Value::ExInfo(e) => (Rc::as_ptr(e) as *const u8 as usize).hash(state),
        }
    }
}

/// Order-independent combination of element hashes.
fn unordered_hash<T: Hash>(items: impl Iterator<Item = T>) -> u64 {
    items
        .map(|item| {
            let mut hasher = AHasher::default();
            item.hash(&mut hasher);
            hasher.finish()
        })
        .fold(0u64, |acc, h| acc.wrapping_add(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::string("").is_truthy());
    }

    #[test]
    fn test_list_equals_vector() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let vector = Value::vector(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list, vector);
    }

    #[test]
    fn test_numbers_equal_within_category_only() {
        assert_ne!(Value::Int(1), Value::Double(1.0));
        assert_eq!(Value::Double(0.0), Value::Double(-0.0));
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let a = Value::map_from_pairs(vec![
            (Value::keyword("a"), Value::Int(1)),
            (Value::keyword("b"), Value::Int(2)),
        ])
        .unwrap();
        let b = Value::map_from_pairs(vec![
            (Value::keyword("b"), Value::Int(2)),
            (Value::keyword("a"), Value::Int(1)),
        ])
        .unwrap();
        assert_eq!(a, b);
        let set = Value::set_from_items(vec![a]).unwrap();
        let Value::Set(set) = set else { panic!("expected set") };
        assert!(set.contains(&b));
    }

    #[test]
    fn test_duplicate_map_key_rejected() {
        let err = Value::map_from_pairs(vec![
            (Value::Int(1), Value::Nil),
            (Value::Int(1), Value::Nil),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "Duplicate key: 1");
    }

    #[test]
    fn test_printing() {
        let v = Value::vector(vec![
            Value::string("hi"),
            Value::Char('a'),
            Value::Double(2.0),
            Value::keyword("k"),
            Value::Nil,
        ]);
        assert_eq!(v.to_string(), "[\"hi\" \\a 2.0 :k nil]");
        assert_eq!(v.to_display_string(), "[hi a 2.0 :k nil]");
        assert_eq!(Value::Double(f64::INFINITY).to_string(), "##Inf");
    }
}
