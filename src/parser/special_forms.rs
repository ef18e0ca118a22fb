//! Special forms: quote, if, do, let, loop, recur, fn, def, set!, var, throw, try, defmacro.

use std::rc::Rc;

use crate::ast::*;
use crate::error::ParserError;
use crate::interpreter::namespace::{split_qualified, Var};
use crate::interpreter::value::Value;
use crate::reader::{Form, FormKind};
use crate::span::Span;

use super::core::{Ctx, ParseResult, Parser};

impl<'a> Parser<'a> {
    /// Parse `form` if its head names a special form.
    pub(crate) fn parse_special_form(
        &mut self,
        name: &str,
        form: &Form,
        args: &[Form],
        ctx: Ctx,
    ) -> ParseResult<Option<Expr>> {
        let span = form.span;
        let expr = match name {
            "quote" => {
                expect_count("quote", args, 1, 1, span)?;
                Expr::new(ExprKind::Quote(args[0].to_value()), span)
            }
            "if" => self.parse_if(args, ctx, span)?,
            "do" => Expr::new(ExprKind::Do(self.parse_body(args, ctx)?), span),
            "let" => self.parse_let(args, ctx, span, false)?,
            "loop" => self.parse_let(args, ctx, span, true)?,
            "recur" => self.parse_recur(args, ctx, span)?,
            "fn" => {
                let func = self.parse_fn(args, span)?;
                Expr::new(ExprKind::Fn(Rc::new(func)), span)
            }
            "def" => self.parse_def(args, ctx, span)?,
            "set!" => self.parse_set(args, ctx, span)?,
            "var" => {
                expect_count("var", args, 1, 1, span)?;
                let sym = self.expect_symbol(&args[0], "symbol")?;
                let var = self.interp.globals.resolve(sym).ok_or_else(|| {
                    ParserError::general(
                        format!("Unable to resolve var: {} in this context", sym),
                        span,
                    )
                })?;
                Expr::new(ExprKind::TheVar(var), span)
            }
            "throw" => {
                expect_count("throw", args, 1, 1, span)?;
                let value = self.parse_form(&args[0], ctx.non_tail())?;
                Expr::new(ExprKind::Throw(Box::new(value)), span)
            }
            "try" => self.parse_try(args, span)?,
            "defmacro" => self.parse_defmacro(args, span)?,
            _ => return Ok(None),
        };
        Ok(Some(expr))
    }

    fn parse_if(&mut self, args: &[Form], ctx: Ctx, span: Span) -> ParseResult<Expr> {
        expect_count("if", args, 2, 3, span)?;
        let cond = self.parse_form(&args[0], ctx.non_tail())?;
        let then = self.parse_form(&args[1], ctx)?;
        let else_ = match args.get(2) {
            Some(form) => Some(Box::new(self.parse_form(form, ctx)?)),
            None => None,
        };
        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then: Box::new(then),
                else_,
            },
            span,
        ))
    }

    /// `let` and `loop` share their binding syntax; a loop body is a recur target.
    fn parse_let(&mut self, args: &[Form], ctx: Ctx, span: Span, is_loop: bool) -> ParseResult<Expr> {
        let form_name = if is_loop { "loop" } else { "let" };
        let pairs = match args.first().map(|f| &f.kind) {
            Some(FormKind::Vector(pairs)) => pairs,
            _ => {
                return Err(ParserError::general(
                    format!("{} requires a vector for its binding", form_name),
                    span,
                ))
            }
        };
        if pairs.len() % 2 != 0 {
            return Err(ParserError::general(
                format!("{} requires an even number of forms in binding vector", form_name),
                span,
            ));
        }

        self.push_scope(Vec::new());
        let result = self.parse_let_scoped(pairs, &args[1..], ctx, span, is_loop);
        self.pop_scope();
        result
    }

    fn parse_let_scoped(
        &mut self,
        pairs: &[Form],
        body: &[Form],
        ctx: Ctx,
        span: Span,
        is_loop: bool,
    ) -> ParseResult<Expr> {
        let mut bindings = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            let name = self.expect_binding_name(&pair[0])?;
            let init = self.parse_form(&pair[1], ctx.non_tail())?;
            self.declare(name.clone());
            bindings.push((name, init));
        }

        let body_ctx = if is_loop {
            Ctx {
                tail: true,
                recur_arity: Some(bindings.len()),
            }
        } else {
            ctx
        };
        let body = self.parse_body(body, body_ctx)?;
        let kind = if is_loop {
            ExprKind::Loop { bindings, body }
        } else {
            ExprKind::Let { bindings, body }
        };
        Ok(Expr::new(kind, span))
    }

    fn parse_recur(&mut self, args: &[Form], ctx: Ctx, span: Span) -> ParseResult<Expr> {
        let expected = ctx
            .recur_arity
            .ok_or_else(|| ParserError::general("recur used outside of loop", span))?;
        if !ctx.tail {
            return Err(ParserError::general("Can only recur from tail position", span));
        }
        if args.len() != expected {
            return Err(ParserError::general(
                format!(
                    "Mismatched argument count to recur, expected: {} args, got: {}",
                    expected,
                    args.len()
                ),
                span,
            ));
        }
        let args = self.parse_all(args, ctx.non_tail())?;
        Ok(Expr::new(ExprKind::Recur(args), span))
    }

    /// `(fn name? [params] body...)` or `(fn name? ([params] body...)+)`.
    pub(crate) fn parse_fn(&mut self, args: &[Form], span: Span) -> ParseResult<FnExpr> {
        let (name, rest) = match args.first().and_then(Form::as_symbol) {
            Some(name) => (Some(Rc::<str>::from(name)), &args[1..]),
            None => (None, args),
        };

        let arity_forms: Vec<(&Form, &[Form])> = match rest.first().map(|f| &f.kind) {
            Some(FormKind::Vector(_)) => vec![(&rest[0], &rest[1..])],
            Some(FormKind::List(_)) => {
                let mut out = Vec::with_capacity(rest.len());
                for form in rest {
                    match &form.kind {
                        FormKind::List(items) if !items.is_empty() => {
                            out.push((&items[0], &items[1..]))
                        }
                        _ => {
                            return Err(ParserError::unexpected_form(
                                "([params] body...)",
                                form.to_string(),
                                form.span,
                            ))
                        }
                    }
                }
                out
            }
            _ => {
                return Err(ParserError::general(
                    "Parameter declaration missing",
                    span,
                ))
            }
        };

        let mut arities: Vec<FnArity> = Vec::with_capacity(arity_forms.len());
        for (params, body) in arity_forms {
            let arity = self.parse_arity(name.clone(), params, body)?;
            if arity.variadic && arities.iter().any(|a| a.variadic) {
                return Err(ParserError::general(
                    "Can't have more than 1 variadic overload",
                    span,
                ));
            }
            if !arity.variadic
                && arities
                    .iter()
                    .any(|a| !a.variadic && a.params.len() == arity.params.len())
            {
                return Err(ParserError::general(
                    "Can't have 2 overloads with same arity",
                    span,
                ));
            }
            arities.push(arity);
        }

        Ok(FnExpr::new(name, arities, span))
    }

    fn parse_arity(
        &mut self,
        name: Option<Rc<str>>,
        params_form: &Form,
        body: &[Form],
    ) -> ParseResult<FnArity> {
        let FormKind::Vector(items) = &params_form.kind else {
            return Err(ParserError::unexpected_form(
                "parameter vector",
                params_form.to_string(),
                params_form.span,
            ));
        };

        let mut params = Vec::with_capacity(items.len());
        let mut variadic = false;
        let mut i = 0;
        while i < items.len() {
            if items[i].is_symbol("&") {
                if i + 2 != items.len() {
                    return Err(ParserError::general(
                        "Invalid parameter list: & must be followed by exactly one name",
                        params_form.span,
                    ));
                }
                variadic = true;
                params.push(self.expect_binding_name(&items[i + 1])?);
                break;
            }
            params.push(self.expect_binding_name(&items[i])?);
            i += 1;
        }

        // Slot 0 of every call frame holds the function itself.
        let mut frame = Vec::with_capacity(params.len() + 1);
        frame.push(name.unwrap_or_else(|| Rc::from("")));
        frame.extend(params.iter().cloned());

        self.push_scope(frame);
        let ctx = Ctx {
            tail: true,
            recur_arity: Some(params.len()),
        };
        let body = self.parse_body(body, ctx);
        self.pop_scope();

        Ok(FnArity {
            params,
            variadic,
            body: body?,
        })
    }

    fn parse_def(&mut self, args: &[Form], ctx: Ctx, span: Span) -> ParseResult<Expr> {
        expect_count("def", args, 1, 3, span)?;
        let var = self.intern_def_name(&args[0])?;
        // `(def name "doc" value)`
        let value_form = match args.len() {
            3 => Some(&args[2]),
            2 => Some(&args[1]),
            _ => None,
        };
        let value = match value_form {
            Some(form) => Some(Box::new(self.parse_form(form, ctx.non_tail())?)),
            None => None,
        };
        Ok(Expr::new(ExprKind::Def { var, value }, span))
    }

    fn parse_defmacro(&mut self, args: &[Form], span: Span) -> ParseResult<Expr> {
        if args.len() < 2 {
            return Err(ParserError::wrong_arity("defmacro", args.len(), span));
        }
        let var = self.intern_def_name(&args[0])?;
        var.set_macro(true);

        let mut rest = &args[1..];
        if rest.len() > 1 && matches!(rest[0].kind, FormKind::Atom(Value::Str(_))) {
            rest = &rest[1..];
        }
        let mut fn_args = Vec::with_capacity(rest.len() + 1);
        fn_args.push(args[0].clone());
        fn_args.extend(rest.iter().cloned());
        let func = self.parse_fn(&fn_args, span)?;

        let value = Expr::new(ExprKind::Fn(Rc::new(func)), span);
        Ok(Expr::new(
            ExprKind::Def {
                var,
                value: Some(Box::new(value)),
            },
            span,
        ))
    }

    fn intern_def_name(&mut self, form: &Form) -> ParseResult<Rc<Var>> {
        let name = self.expect_symbol(form, "symbol")?;
        match split_qualified(name) {
            Some((ns, local)) => {
                if *ns != *self.interp.globals.current_ns() {
                    return Err(ParserError::general(
                        format!("Can't create defs outside of current ns: {}", name),
                        form.span,
                    ));
                }
                let local = local.to_string();
                Ok(self.interp.globals.intern(&local))
            }
            None => {
                let name = name.to_string();
                Ok(self.interp.globals.intern(&name))
            }
        }
    }

    fn parse_set(&mut self, args: &[Form], ctx: Ctx, span: Span) -> ParseResult<Expr> {
        expect_count("set!", args, 2, 2, span)?;
        let name = self.expect_symbol(&args[0], "symbol")?;
        let value = Box::new(self.parse_form(&args[1], ctx.non_tail())?);
        if split_qualified(name).is_none() {
            if let Some(binding) = self.lookup_local(name) {
                return Ok(Expr::new(ExprKind::SetLocal { binding, value }, span));
            }
        }
        match self.interp.globals.resolve(name) {
            Some(var) => Ok(Expr::new(ExprKind::SetVar { var, value }, span)),
            None => Err(ParserError::unresolved_symbol(name, args[0].span)),
        }
    }

    fn parse_try(&mut self, args: &[Form], span: Span) -> ParseResult<Expr> {
        // recur may not cross a try boundary.
        let inner = Ctx::TOP;

        let mut body_forms = Vec::new();
        let mut catches = Vec::new();
        let mut finally = None;

        for form in args {
            let clause = match &form.kind {
                FormKind::List(items) => items
                    .first()
                    .and_then(Form::as_symbol)
                    .map(|head| (head, items.as_slice())),
                _ => None,
            };
            match clause {
                Some(("catch", items)) => {
                    if finally.is_some() {
                        return Err(ParserError::general(
                            "finally clause must be last in try expression",
                            form.span,
                        ));
                    }
                    catches.push(self.parse_catch(items, form.span, inner)?);
                }
                Some(("finally", items)) => {
                    if finally.is_some() {
                        return Err(ParserError::general(
                            "Only one finally clause allowed in try expression",
                            form.span,
                        ));
                    }
                    finally = Some(self.parse_body(&items[1..], inner)?);
                }
                _ => {
                    if !catches.is_empty() || finally.is_some() {
                        return Err(ParserError::general(
                            "Only catch or finally clause can follow catch in try expression",
                            form.span,
                        ));
                    }
                    body_forms.push(form.clone());
                }
            }
        }

        let body = self.parse_body(&body_forms, inner)?;
        Ok(Expr::new(
            ExprKind::Try {
                body,
                catches,
                finally,
            },
            span,
        ))
    }

    fn parse_catch(&mut self, items: &[Form], span: Span, ctx: Ctx) -> ParseResult<CatchClause> {
        if items.len() < 3 {
            return Err(ParserError::wrong_arity("catch", items.len() - 1, span));
        }
        let class_name = self.expect_symbol(&items[1], "exception class")?;
        let class = match class_name {
            "Error" | "Exception" | "Throwable" => CatchClass::Any,
            "ExInfo" => CatchClass::ExInfo,
            other => {
                return Err(ParserError::general(
                    format!("Unknown exception class: {}", other),
                    items[1].span,
                ))
            }
        };
        let name = self.expect_binding_name(&items[2])?;

        self.push_scope(vec![name.clone()]);
        let body = self.parse_body(&items[3..], ctx);
        self.pop_scope();

        Ok(CatchClause {
            class,
            name,
            body: body?,
        })
    }

    /// A plain, unqualified symbol usable as a local name.
    fn expect_binding_name(&self, form: &Form) -> ParseResult<Rc<str>> {
        match form.as_symbol() {
            Some(name) if split_qualified(name).is_none() && name != "&" => Ok(Rc::from(name)),
            _ => Err(ParserError::general(
                format!("Unsupported binding form: {}", form),
                form.span,
            )),
        }
    }
}

fn expect_count(form: &str, args: &[Form], min: usize, max: usize, span: Span) -> ParseResult<()> {
    if args.len() < min || args.len() > max {
        return Err(ParserError::wrong_arity(form, args.len(), span));
    }
    Ok(())
}
