//! Positioned, read-but-unparsed data.

use std::fmt;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::interpreter::value::Value;
use crate::span::Span;

/// A datum read from source, with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub kind: FormKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    /// Self-evaluating datum: nil, booleans, numbers, strings, characters, keywords.
    Atom(Value),
    Symbol(Rc<str>),
    List(Vec<Form>),
    Vector(Vec<Form>),
    /// Alternating keys and values.
    Map(Vec<Form>),
    Set(Vec<Form>),
}

impl Form {
    pub fn new(kind: FormKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn symbol(name: &str, span: Span) -> Self {
        Self::new(FormKind::Symbol(Rc::from(name)), span)
    }

    pub fn list(items: Vec<Form>, span: Span) -> Self {
        Self::new(FormKind::List(items), span)
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            FormKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        self.as_symbol() == Some(name)
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            FormKind::Atom(v) => v.type_name(),
            FormKind::Symbol(_) => "symbol",
            FormKind::List(_) => "list",
            FormKind::Vector(_) => "vector",
            FormKind::Map(_) => "map",
            FormKind::Set(_) => "set",
        }
    }

    /// The form as quoted data. Duplicate map keys resolve to the last value.
    pub fn to_value(&self) -> Value {
        match &self.kind {
            FormKind::Atom(v) => v.clone(),
            FormKind::Symbol(name) => Value::Symbol(name.clone()),
            FormKind::List(items) => Value::list(items.iter().map(Form::to_value).collect()),
            FormKind::Vector(items) => Value::vector(items.iter().map(Form::to_value).collect()),
            FormKind::Map(items) => {
                let mut map = crate::interpreter::value::MapImpl::default();
                for pair in items.chunks(2) {
                    if let [k, v] = pair {
                        map.insert(k.to_value(), v.to_value());
                    }
                }
                Value::Map(Rc::new(map))
            }
            FormKind::Set(items) => {
                let set = items.iter().map(Form::to_value).collect();
                Value::Set(Rc::new(set))
            }
        }
    }

    /// Convert data produced by a macro back into a form at `span`.
    pub fn from_value(value: &Value, span: Span) -> Result<Form, RuntimeError> {
        let kind = match value {
            Value::Symbol(name) => FormKind::Symbol(name.clone()),
            Value::List(items) => FormKind::List(Self::from_values(items, span)?),
            Value::Vector(items) => FormKind::Vector(Self::from_values(items, span)?),
            Value::Map(map) => {
                let mut items = Vec::with_capacity(map.len() * 2);
                for (k, v) in map.iter() {
                    items.push(Form::from_value(k, span)?);
                    items.push(Form::from_value(v, span)?);
                }
                FormKind::Map(items)
            }
            Value::Set(set) => FormKind::Set(
                set.iter()
                    .map(|v| Form::from_value(v, span))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Nil
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Ratio(_)
            | Value::Double(_)
            | Value::Decimal(_)
            | Value::Str(_)
            | Value::Char(_)
            | Value::Keyword(_) => FormKind::Atom(value.clone()),
            other => {
                return Err(RuntimeError::type_error(
                    format!("Cannot embed {} in code: {}", other.type_name(), other),
                    span,
                ))
            }
        };
        Ok(Form::new(kind, span))
    }

    fn from_values(items: &[Value], span: Span) -> Result<Vec<Form>, RuntimeError> {
        items.iter().map(|v| Form::from_value(v, span)).collect()
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Form]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }
        match &self.kind {
            FormKind::Atom(v) => write!(f, "{}", v),
            FormKind::Symbol(name) => write!(f, "{}", name),
            FormKind::List(items) => {
                write!(f, "(")?;
                join(f, items)?;
                write!(f, ")")
            }
            FormKind::Vector(items) => {
                write!(f, "[")?;
                join(f, items)?;
                write!(f, "]")
            }
            FormKind::Map(items) => {
                write!(f, "{{")?;
                join(f, items)?;
                write!(f, "}}")
            }
            FormKind::Set(items) => {
                write!(f, "#{{")?;
                join(f, items)?;
                write!(f, "}}")
            }
        }
    }
}
