//! Macro expansion: the built-in macros and user macros defined with `defmacro`.

use std::rc::Rc;

use crate::ast::{Expr, ExprKind};
use crate::error::{ParserError, RuntimeError};
use crate::interpreter::namespace::Var;
use crate::interpreter::value::Value;
use crate::interpreter::Interpreter;
use crate::reader::{Form, FormKind};
use crate::span::Span;

use super::core::{Ctx, ParseResult, Parser};

impl<'a> Parser<'a> {
    pub(crate) fn expand_builtin_macro(&mut self, form: &Form) -> ParseResult<Option<Form>> {
        expand_builtin(self.interp, form)
    }

    /// Expand a call to a user macro now, or defer it when the macro has no value yet.
    pub(crate) fn parse_macro_call(
        &mut self,
        var: Rc<Var>,
        form: &Form,
        args: &[Form],
        ctx: Ctx,
    ) -> ParseResult<Expr> {
        match var.get() {
            Some(macro_fn) => {
                let expansion = expand_user(self.interp, &macro_fn, args, form.span)?;
                self.parse_expansion(&expansion, ctx)
            }
            None => Ok(Expr::new(
                ExprKind::MacroCall {
                    var,
                    args: args.to_vec(),
                },
                form.span,
            )),
        }
    }
}

/// Call a macro function on its unevaluated arguments and read the result back as code.
pub fn expand_user(
    interp: &mut Interpreter,
    macro_fn: &Value,
    args: &[Form],
    span: Span,
) -> Result<Form, RuntimeError> {
    let values = args.iter().map(Form::to_value).collect();
    let result = interp
        .apply(macro_fn, values)
        .map_err(|e| e.with_span(span))?;
    Form::from_value(&result, span)
}

fn sym(name: &str, span: Span) -> Form {
    Form::symbol(name, span)
}

fn list(items: Vec<Form>, span: Span) -> Form {
    Form::list(items, span)
}

fn nil(span: Span) -> Form {
    Form::new(FormKind::Atom(Value::Nil), span)
}

/// `(do body...)`
fn do_block(body: &[Form], span: Span) -> Form {
    let mut items = vec![sym("do", span)];
    items.extend(body.iter().cloned());
    list(items, span)
}

/// Expand `form` if its head names a built-in macro.
pub fn expand_builtin(interp: &mut Interpreter, form: &Form) -> ParseResult<Option<Form>> {
    let FormKind::List(items) = &form.kind else {
        return Ok(None);
    };
    let Some(head) = items.first().and_then(Form::as_symbol) else {
        return Ok(None);
    };
    let args = &items[1..];
    let span = form.span;

    let expansion = match head {
        "defn" => expand_defn(args, span)?,
        "when" => {
            require_args("when", args, 1, span)?;
            list(
                vec![sym("if", span), args[0].clone(), do_block(&args[1..], span)],
                span,
            )
        }
        "when-not" => {
            require_args("when-not", args, 1, span)?;
            list(
                vec![
                    sym("if", span),
                    args[0].clone(),
                    nil(span),
                    do_block(&args[1..], span),
                ],
                span,
            )
        }
        "if-not" => {
            if args.len() < 2 || args.len() > 3 {
                return Err(ParserError::wrong_arity("if-not", args.len(), span));
            }
            let otherwise = args.get(2).cloned().unwrap_or_else(|| nil(span));
            list(
                vec![sym("if", span), args[0].clone(), otherwise, args[1].clone()],
                span,
            )
        }
        "cond" => expand_cond(args, span)?,
        "and" => expand_logical(interp, true, args, span),
        "or" => expand_logical(interp, false, args, span),
        "->" => expand_thread(args, span, false)?,
        "->>" => expand_thread(args, span, true)?,
        "comment" => nil(span),
        _ => return Ok(None),
    };
    Ok(Some(expansion))
}

fn require_args(name: &str, args: &[Form], min: usize, span: Span) -> ParseResult<()> {
    if args.len() < min {
        return Err(ParserError::wrong_arity(name, args.len(), span));
    }
    Ok(())
}

/// `(defn name doc? attrs? & fn-tail)` => `(def name (fn name & fn-tail))`
fn expand_defn(args: &[Form], span: Span) -> ParseResult<Form> {
    require_args("defn", args, 2, span)?;
    let name = args[0]
        .as_symbol()
        .ok_or_else(|| ParserError::general("First argument to defn must be a symbol", span))?;

    let mut rest = &args[1..];
    if rest.len() > 1 && matches!(rest[0].kind, FormKind::Atom(Value::Str(_))) {
        rest = &rest[1..];
    }
    if rest.len() > 1 && matches!(rest[0].kind, FormKind::Map(_)) {
        rest = &rest[1..];
    }

    let mut fn_form = vec![sym("fn", span), sym(name, args[0].span)];
    fn_form.extend(rest.iter().cloned());
    Ok(list(
        vec![sym("def", span), args[0].clone(), list(fn_form, span)],
        span,
    ))
}

/// `(cond t1 e1 t2 e2 ...)` => `(if t1 e1 (cond t2 e2 ...))`
fn expand_cond(args: &[Form], span: Span) -> ParseResult<Form> {
    if args.len() % 2 != 0 {
        return Err(ParserError::general(
            "cond requires an even number of forms",
            span,
        ));
    }
    if args.is_empty() {
        return Ok(nil(span));
    }
    let mut rest = vec![sym("cond", span)];
    rest.extend(args[2..].iter().cloned());
    Ok(list(
        vec![
            sym("if", span),
            args[0].clone(),
            args[1].clone(),
            list(rest, span),
        ],
        span,
    ))
}

/// `and`/`or` bind the first operand once, then branch on it.
fn expand_logical(interp: &mut Interpreter, is_and: bool, args: &[Form], span: Span) -> Form {
    let name = if is_and { "and" } else { "or" };
    match args {
        [] => Form::new(
            FormKind::Atom(if is_and { Value::Bool(true) } else { Value::Nil }),
            span,
        ),
        [only] => only.clone(),
        [first, rest @ ..] => {
            let tmp = interp.gensym(name);
            let mut more = vec![sym(name, span)];
            more.extend(rest.iter().cloned());
            let more = list(more, span);
            let (then, otherwise) = if is_and {
                (more, sym(&tmp, span))
            } else {
                (sym(&tmp, span), more)
            };
            list(
                vec![
                    sym("let", span),
                    Form::new(FormKind::Vector(vec![sym(&tmp, span), first.clone()]), span),
                    list(vec![sym("if", span), sym(&tmp, span), then, otherwise], span),
                ],
                span,
            )
        }
    }
}

/// `->` threads each result as the first argument of the next step, `->>` as the last.
fn expand_thread(args: &[Form], span: Span, last: bool) -> ParseResult<Form> {
    let name = if last { "->>" } else { "->" };
    require_args(name, args, 1, span)?;
    let mut acc = args[0].clone();
    for step in &args[1..] {
        acc = match &step.kind {
            FormKind::List(items) if !items.is_empty() => {
                let mut call = items.clone();
                if last {
                    call.push(acc);
                } else {
                    call.insert(1, acc);
                }
                list(call, step.span)
            }
            _ => list(vec![step.clone(), acc], step.span),
        };
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;
    use pretty_assertions::assert_eq;

    fn expand(source: &str) -> String {
        let mut interp = Interpreter::new();
        let form = &Reader::read_str(source).unwrap()[0];
        expand_builtin(&mut interp, form)
            .unwrap()
            .map(|f| f.to_string())
            .unwrap_or_default()
    }

    #[test]
    fn test_defn() {
        assert_eq!(
            expand("(defn f \"doc\" [x] x)"),
            "(def f (fn f [x] x))"
        );
    }

    #[test]
    fn test_when_and_cond() {
        assert_eq!(expand("(when c a b)"), "(if c (do a b))");
        assert_eq!(expand("(cond a 1 :else 2)"), "(if a 1 (cond :else 2))");
        assert_eq!(expand("(cond)"), "nil");
    }

    #[test]
    fn test_threading() {
        assert_eq!(expand("(-> x (f 1) g)"), "(g (f x 1))");
        assert_eq!(expand("(->> x (f 1) g)"), "(g (f 1 x))");
    }

    #[test]
    fn test_logical_base_cases() {
        assert_eq!(expand("(and)"), "true");
        assert_eq!(expand("(or)"), "nil");
        assert_eq!(expand("(or x)"), "x");
    }

    #[test]
    fn test_not_a_macro() {
        assert_eq!(expand("(f 1)"), "");
    }
}
