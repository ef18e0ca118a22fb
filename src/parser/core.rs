//! Core parser struct: form dispatch, lexical scopes and symbol resolution.

use std::rc::Rc;

use crate::ast::*;
use crate::error::ParserError;
use crate::interpreter::namespace::split_qualified;
use crate::interpreter::value::Value;
use crate::interpreter::Interpreter;
use crate::reader::{Form, FormKind};
use crate::span::Span;

pub type ParseResult<T> = Result<T, ParserError>;

/// Nested macro expansions allowed before giving up.
pub(crate) const MAX_EXPANSION_DEPTH: usize = 256;

/// Position information threaded through the recursive descent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ctx {
    /// The expression's value is the value of the enclosing loop/fn body.
    pub tail: bool,
    /// Argument count expected by `recur` here, if any target is active.
    pub recur_arity: Option<usize>,
}

impl Ctx {
    pub(crate) const TOP: Ctx = Ctx {
        tail: false,
        recur_arity: None,
    };

    pub(crate) fn non_tail(self) -> Ctx {
        Ctx {
            tail: false,
            ..self
        }
    }
}

/// Turns forms into expressions, resolving every symbol.
///
/// Each pushed scope corresponds one-to-one with a runtime frame of the
/// tree-walker, so a [`Binding`]'s frame number is the frame depth at runtime.
pub struct Parser<'a> {
    pub(crate) interp: &'a mut Interpreter,
    pub(crate) scopes: Vec<Vec<Rc<str>>>,
    pub(crate) expansion_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(interp: &'a mut Interpreter) -> Self {
        Self {
            interp,
            scopes: Vec::new(),
            expansion_depth: 0,
        }
    }

    /// Parse one top-level form.
    pub fn parse(&mut self, form: &Form) -> ParseResult<Expr> {
        self.parse_form(form, Ctx::TOP)
    }

    pub(crate) fn parse_form(&mut self, form: &Form, ctx: Ctx) -> ParseResult<Expr> {
        let span = form.span;
        match &form.kind {
            FormKind::Atom(value) => Ok(Expr::new(ExprKind::Literal(value.clone()), span)),
            FormKind::Symbol(name) => self.resolve_symbol(name, span),
            FormKind::Vector(items) => {
                let items = self.parse_all(items, ctx.non_tail())?;
                Ok(Expr::new(ExprKind::Vector(items), span))
            }
            FormKind::Set(items) => {
                let items = self.parse_all(items, ctx.non_tail())?;
                check_distinct_constants(items.iter(), span)?;
                Ok(Expr::new(ExprKind::Set(items), span))
            }
            FormKind::Map(items) => {
                let mut pairs = Vec::with_capacity(items.len() / 2);
                for pair in items.chunks(2) {
                    if let [k, v] = pair {
                        let k = self.parse_form(k, ctx.non_tail())?;
                        let v = self.parse_form(v, ctx.non_tail())?;
                        pairs.push((k, v));
                    }
                }
                check_distinct_constants(pairs.iter().map(|(k, _)| k), span)?;
                Ok(Expr::new(ExprKind::Map(pairs), span))
            }
            FormKind::List(items) if items.is_empty() => {
                Ok(Expr::new(ExprKind::Literal(Value::list(Vec::new())), span))
            }
            FormKind::List(items) => self.parse_list(form, items, ctx),
        }
    }

    pub(crate) fn parse_all(&mut self, forms: &[Form], ctx: Ctx) -> ParseResult<Vec<Expr>> {
        forms.iter().map(|f| self.parse_form(f, ctx)).collect()
    }

    /// Parse a body: every expression but the last is in non-tail position.
    pub(crate) fn parse_body(&mut self, forms: &[Form], ctx: Ctx) -> ParseResult<Vec<Expr>> {
        let mut body = Vec::with_capacity(forms.len());
        for (i, form) in forms.iter().enumerate() {
            let ctx = if i + 1 == forms.len() {
                ctx
            } else {
                ctx.non_tail()
            };
            body.push(self.parse_form(form, ctx)?);
        }
        Ok(body)
    }

    fn parse_list(&mut self, form: &Form, items: &[Form], ctx: Ctx) -> ParseResult<Expr> {
        let head = &items[0];
        let args = &items[1..];

        if let Some(name) = head.as_symbol() {
            if let Some(expr) = self.parse_special_form(name, form, args, ctx)? {
                return Ok(expr);
            }
            if self.lookup_local(name).is_none() {
                if let Some(expansion) = self.expand_builtin_macro(form)? {
                    return self.parse_expansion(&expansion, ctx);
                }
                if let Some(var) = self.interp.globals.resolve(name) {
                    if var.is_macro() {
                        return self.parse_macro_call(var, form, args, ctx);
                    }
                }
            }
        }

        let callee = self.parse_form(head, ctx.non_tail())?;
        let args = self.parse_all(args, ctx.non_tail())?;
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            form.span,
        ))
    }

    pub(crate) fn parse_expansion(&mut self, expansion: &Form, ctx: Ctx) -> ParseResult<Expr> {
        if self.expansion_depth >= MAX_EXPANSION_DEPTH {
            return Err(ParserError::general(
                "Macro expansion too deep",
                expansion.span,
            ));
        }
        self.expansion_depth += 1;
        let result = self.parse_form(expansion, ctx);
        self.expansion_depth -= 1;
        result
    }

    // ===== Scopes =====

    pub(crate) fn push_scope(&mut self, names: Vec<Rc<str>>) {
        self.scopes.push(names);
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Add a name to the innermost scope.
    pub(crate) fn declare(&mut self, name: Rc<str>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(name);
        }
    }

    /// Innermost, most recently declared binding named `name`.
    pub(crate) fn lookup_local(&self, name: &str) -> Option<Binding> {
        for (frame, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(index) = scope.iter().rposition(|n| &**n == name) {
                return Some(Binding {
                    name: scope[index].clone(),
                    frame,
                    index,
                });
            }
        }
        None
    }

    fn resolve_symbol(&mut self, name: &str, span: Span) -> ParseResult<Expr> {
        if split_qualified(name).is_none() {
            if let Some(binding) = self.lookup_local(name) {
                return Ok(Expr::new(ExprKind::Local(binding), span));
            }
        }
        match self.interp.globals.resolve(name) {
            Some(var) if var.is_macro() => Err(ParserError::general(
                format!("Can't take value of a macro: #'{}", var.qualified_name()),
                span,
            )),
            Some(var) => Ok(Expr::new(ExprKind::VarRef(var), span)),
            None => Err(ParserError::unresolved_symbol(name, span)),
        }
    }

    /// A symbol form or an error naming what was expected.
    pub(crate) fn expect_symbol<'f>(&self, form: &'f Form, expected: &str) -> ParseResult<&'f str> {
        form.as_symbol().ok_or_else(|| {
            ParserError::unexpected_form(expected, form.to_string(), form.span)
        })
    }
}

/// Reject literal collections whose constant keys repeat.
fn check_distinct_constants<'e>(
    exprs: impl Iterator<Item = &'e Expr>,
    span: Span,
) -> ParseResult<()> {
    let mut seen: Vec<&Value> = Vec::new();
    for expr in exprs {
        let value = match &expr.kind {
            ExprKind::Literal(v) | ExprKind::Quote(v) => v,
            _ => continue,
        };
        if seen.contains(&value) {
            return Err(ParserError::general(format!("Duplicate key: {}", value), span));
        }
        seen.push(value);
    }
    Ok(())
}
