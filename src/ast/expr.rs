//! Expression tree produced by the parser.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use crate::interpreter::namespace::Var;
use crate::interpreter::value::Value;
use crate::reader::Form;
use crate::span::Span;
use crate::vm::chunk::FunctionProto;

/// An expression with its source position.
#[derive(Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// A resolved lexical reference: slot `index` of the frame at `frame` depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: Rc<str>,
    pub frame: usize,
    pub index: usize,
}

/// All expression variants.
#[derive(Clone)]
pub enum ExprKind {
    /// Self-evaluating constant: nil, booleans, numbers, strings, characters, keywords.
    Literal(Value),
    /// `(quote x)`
    Quote(Value),
    Vector(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Set(Vec<Expr>),

    Local(Binding),
    /// Global reference through a Var.
    VarRef(Rc<Var>),
    /// `(var x)`
    TheVar(Rc<Var>),

    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        else_: Option<Box<Expr>>,
    },
    Do(Vec<Expr>),
    Let {
        bindings: Vec<(Rc<str>, Expr)>,
        body: Vec<Expr>,
    },
    Loop {
        bindings: Vec<(Rc<str>, Expr)>,
        body: Vec<Expr>,
    },
    Recur(Vec<Expr>),
    Fn(Rc<FnExpr>),
    Def {
        var: Rc<Var>,
        value: Option<Box<Expr>>,
    },
    SetLocal {
        binding: Binding,
        value: Box<Expr>,
    },
    SetVar {
        var: Rc<Var>,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Throw(Box<Expr>),
    Try {
        body: Vec<Expr>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Expr>>,
    },
    /// Call to a macro that was not yet defined when the form was parsed.
    /// Expanded and evaluated when reached.
    MacroCall {
        var: Rc<Var>,
        args: Vec<Form>,
    },
}

/// A function literal. Compiled bytecode, when the driver produced it, is cached here.
pub struct FnExpr {
    pub name: Option<Rc<str>>,
    pub arities: Vec<FnArity>,
    pub span: Span,
    pub compiled: OnceCell<Rc<FunctionProto>>,
}

impl FnExpr {
    pub fn new(name: Option<Rc<str>>, arities: Vec<FnArity>, span: Span) -> Self {
        Self {
            name,
            arities,
            span,
            compiled: OnceCell::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("fn")
    }

    /// The arity accepting `argc` arguments: an exact match first, then a variadic one.
    pub fn arity_for(&self, argc: usize) -> Option<&FnArity> {
        self.arities
            .iter()
            .find(|a| !a.variadic && a.params.len() == argc)
            .or_else(|| {
                self.arities
                    .iter()
                    .find(|a| a.variadic && argc + 1 >= a.params.len())
            })
    }
}

/// One arity of a function literal.
#[derive(Clone)]
pub struct FnArity {
    /// Parameter names; when `variadic`, the last one receives the rest list.
    pub params: Vec<Rc<str>>,
    pub variadic: bool,
    pub body: Vec<Expr>,
}

impl FnArity {
    /// Number of fixed parameters.
    pub fn required(&self) -> usize {
        if self.variadic {
            self.params.len() - 1
        } else {
            self.params.len()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchClass {
    /// `Error`, `Exception` or `Throwable`: every runtime error.
    Any,
    /// `ExInfo`: only values raised by `throw`.
    ExInfo,
}

#[derive(Clone)]
pub struct CatchClause {
    pub class: CatchClass,
    pub name: Rc<str>,
    pub body: Vec<Expr>,
}

fn write_body(f: &mut fmt::Formatter<'_>, body: &[Expr]) -> fmt::Result {
    for expr in body {
        write!(f, " {}", expr)?;
    }
    Ok(())
}

fn write_bindings(f: &mut fmt::Formatter<'_>, bindings: &[(Rc<str>, Expr)]) -> fmt::Result {
    write!(f, "[")?;
    for (i, (name, init)) in bindings.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{} {}", name, init)?;
    }
    write!(f, "]")
}

/// Renders the tree as s-expressions with resolved references spelled out
/// (`local:x@0.1`, `var:user/f`).
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(v) => write!(f, "{}", v),
            ExprKind::Quote(v) => write!(f, "(quote {})", v),
            ExprKind::Vector(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ExprKind::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                write!(f, "}}")
            }
            ExprKind::Set(items) => {
                write!(f, "#{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            ExprKind::Local(b) => write!(f, "local:{}@{}.{}", b.name, b.frame, b.index),
            ExprKind::VarRef(var) => write!(f, "var:{}", var.qualified_name()),
            ExprKind::TheVar(var) => write!(f, "(var {})", var.qualified_name()),
            ExprKind::If { cond, then, else_ } => {
                write!(f, "(if {} {}", cond, then)?;
                if let Some(e) = else_ {
                    write!(f, " {}", e)?;
                }
                write!(f, ")")
            }
            ExprKind::Do(body) => {
                write!(f, "(do")?;
                write_body(f, body)?;
                write!(f, ")")
            }
            ExprKind::Let { bindings, body } => {
                write!(f, "(let ")?;
                write_bindings(f, bindings)?;
                write_body(f, body)?;
                write!(f, ")")
            }
            ExprKind::Loop { bindings, body } => {
                write!(f, "(loop ")?;
                write_bindings(f, bindings)?;
                write_body(f, body)?;
                write!(f, ")")
            }
            ExprKind::Recur(args) => {
                write!(f, "(recur")?;
                write_body(f, args)?;
                write!(f, ")")
            }
            ExprKind::Fn(func) => {
                write!(f, "(fn {}", func.display_name())?;
                for arity in &func.arities {
                    write!(f, " ([")?;
                    for (i, p) in arity.params.iter().enumerate() {
                        if i > 0 {
                            write!(f, " ")?;
                        }
                        if arity.variadic && i + 1 == arity.params.len() {
                            write!(f, "& ")?;
                        }
                        write!(f, "{}", p)?;
                    }
                    write!(f, "]")?;
                    write_body(f, &arity.body)?;
                    write!(f, ")")?;
                }
                write!(f, ")")
            }
            ExprKind::Def { var, value } => {
                write!(f, "(def {}", var.qualified_name())?;
                if let Some(v) = value {
                    write!(f, " {}", v)?;
                }
                write!(f, ")")
            }
            ExprKind::SetLocal { binding, value } => {
                write!(f, "(set! local:{} {})", binding.name, value)
            }
            ExprKind::SetVar { var, value } => {
                write!(f, "(set! var:{} {})", var.qualified_name(), value)
            }
            ExprKind::Call { callee, args } => {
                write!(f, "({}", callee)?;
                write_body(f, args)?;
                write!(f, ")")
            }
            ExprKind::Throw(value) => write!(f, "(throw {})", value),
            ExprKind::Try {
                body,
                catches,
                finally,
            } => {
                write!(f, "(try")?;
                write_body(f, body)?;
                for clause in catches {
                    let class = match clause.class {
                        CatchClass::Any => "Error",
                        CatchClass::ExInfo => "ExInfo",
                    };
                    write!(f, " (catch {} {}", class, clause.name)?;
                    write_body(f, &clause.body)?;
                    write!(f, ")")?;
                }
                if let Some(body) = finally {
                    write!(f, " (finally")?;
                    write_body(f, body)?;
                    write!(f, ")")?;
                }
                write!(f, ")")
            }
            ExprKind::MacroCall { var, args } => {
                write!(f, "(macro-call {}", var.qualified_name())?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
