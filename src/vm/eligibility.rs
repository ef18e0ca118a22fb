//! Which expressions the VM can run, and the pass that compiles them.
//!
//! After parsing, [`compile_tree`] walks a top-level form and compiles every
//! function literal that passes [`is_vm_compatible_fn`]. The prototype is
//! cached on the `FnExpr`; evaluating the literal then yields a VM closure.
//! Anything that fails to compile stays interpreted.

use std::rc::Rc;

use crate::ast::{Expr, ExprKind, FnExpr};
use crate::config::Config;

use super::compiler::Compiler;

/// True when every node of `expr` belongs to the compiled subset.
pub fn is_vm_compatible(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Quote(_)
        | ExprKind::Local(_)
        | ExprKind::VarRef(_)
        | ExprKind::TheVar(_) => true,

        ExprKind::Vector(items) | ExprKind::Set(items) | ExprKind::Do(items) => {
            items.iter().all(is_vm_compatible)
        }
        ExprKind::Recur(args) => args.iter().all(is_vm_compatible),
        ExprKind::Map(pairs) => pairs
            .iter()
            .all(|(k, v)| is_vm_compatible(k) && is_vm_compatible(v)),
        ExprKind::If { cond, then, else_ } => {
            is_vm_compatible(cond)
                && is_vm_compatible(then)
                && else_.as_deref().map_or(true, is_vm_compatible)
        }
        ExprKind::Let { bindings, body } | ExprKind::Loop { bindings, body } => {
            bindings.iter().all(|(_, init)| is_vm_compatible(init))
                && body.iter().all(is_vm_compatible)
        }
        ExprKind::Fn(func) => is_vm_compatible_fn(func),
        ExprKind::Def { value, .. } => value.as_deref().map_or(true, is_vm_compatible),
        ExprKind::SetLocal { value, .. } | ExprKind::SetVar { value, .. } => {
            is_vm_compatible(value)
        }
        ExprKind::Call { callee, args } => {
            is_vm_compatible(callee) && args.iter().all(is_vm_compatible)
        }

        ExprKind::Throw(_) | ExprKind::Try { .. } | ExprKind::MacroCall { .. } => false,
    }
}

/// A single fixed arity whose body is compatible.
pub fn is_vm_compatible_fn(func: &FnExpr) -> bool {
    match func.arities.as_slice() {
        [arity] => !arity.variadic && arity.body.iter().all(is_vm_compatible),
        _ => false,
    }
}

/// Compile every eligible function literal in `expr`, caching each prototype
/// on its `FnExpr`. Compiled functions are not descended into: their nested
/// literals are part of the prototype already.
pub fn compile_tree(expr: &Expr, config: &Config) {
    if config.vm_enabled {
        walk(expr, config.vm_trace);
    }
}

fn walk(expr: &Expr, trace: bool) {
    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Quote(_)
        | ExprKind::Local(_)
        | ExprKind::VarRef(_)
        | ExprKind::TheVar(_)
        | ExprKind::MacroCall { .. } => {}

        ExprKind::Vector(items)
        | ExprKind::Set(items)
        | ExprKind::Do(items)
        | ExprKind::Recur(items) => walk_all(items, trace),
        ExprKind::Map(pairs) => {
            for (k, v) in pairs {
                walk(k, trace);
                walk(v, trace);
            }
        }
        ExprKind::If { cond, then, else_ } => {
            walk(cond, trace);
            walk(then, trace);
            if let Some(else_) = else_ {
                walk(else_, trace);
            }
        }
        ExprKind::Let { bindings, body } | ExprKind::Loop { bindings, body } => {
            for (_, init) in bindings {
                walk(init, trace);
            }
            walk_all(body, trace);
        }
        ExprKind::Fn(func) => {
            if !try_compile(func, trace) {
                for arity in &func.arities {
                    walk_all(&arity.body, trace);
                }
            }
        }
        ExprKind::Def { value, .. } => {
            if let Some(value) = value {
                walk(value, trace);
            }
        }
        ExprKind::SetLocal { value, .. } | ExprKind::SetVar { value, .. } => walk(value, trace),
        ExprKind::Throw(value) => walk(value, trace),
        ExprKind::Call { callee, args } => {
            walk(callee, trace);
            walk_all(args, trace);
        }
        ExprKind::Try {
            body,
            catches,
            finally,
        } => {
            walk_all(body, trace);
            for clause in catches {
                walk_all(&clause.body, trace);
            }
            if let Some(finally) = finally {
                walk_all(finally, trace);
            }
        }
    }
}

fn walk_all(exprs: &[Expr], trace: bool) {
    for expr in exprs {
        walk(expr, trace);
    }
}

/// Compile `func` unless it is already compiled; true when a prototype is cached.
fn try_compile(func: &Rc<FnExpr>, trace: bool) -> bool {
    if func.compiled.get().is_some() {
        return true;
    }
    if !is_vm_compatible_fn(func) {
        if trace {
            eprintln!("[vm] fallback {}: not in the compiled subset", func.display_name());
        }
        return false;
    }
    match Compiler::compile_fn(func) {
        Ok(proto) => {
            if trace {
                eprintln!("[vm] compiled {}", func.display_name());
            }
            func.compiled.set(Rc::new(proto)).is_ok()
        }
        Err(err) => {
            if trace {
                eprintln!("[vm] fallback {}: {}", func.display_name(), err);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;

    fn parse(source: &str) -> Expr {
        let mut interp = Interpreter::new();
        interp.parse_str(source).unwrap().remove(0)
    }

    fn fn_of(expr: &Expr) -> Rc<FnExpr> {
        match &expr.kind {
            ExprKind::Fn(func) => func.clone(),
            ExprKind::Def { value: Some(v), .. } => fn_of(v),
            ExprKind::Let { body, .. } => fn_of(&body[0]),
            _ => panic!("no fn literal in {}", expr),
        }
    }

    #[test]
    fn test_predicate_accepts_core_forms() {
        assert!(is_vm_compatible(&parse(
            "(loop [n 10 acc 0] (if (= n 0) acc (recur (- n 1) (+ acc n))))"
        )));
        assert!(is_vm_compatible(&parse("(let [f (fn [x] x)] [(f 1) {:a #{2}}])")));
    }

    #[test]
    fn test_predicate_rejects_unsupported_nodes() {
        assert!(!is_vm_compatible(&parse("(try 1 (catch Error e 2))")));
        assert!(!is_vm_compatible(&parse("(fn [x] (throw (ex-info \"m\" {})))")));
        assert!(!is_vm_compatible(&parse("(fn [& xs] xs)")));
        assert!(!is_vm_compatible(&parse("(fn ([] 0) ([x] x))")));
    }

    #[test]
    fn test_compile_tree_caches_prototypes() {
        let expr = parse("(def sq (fn [x] (* x x)))");
        compile_tree(&expr, &Config::default());
        let func = fn_of(&expr);
        assert_eq!(func.compiled.get().map(|p| p.arity), Some(1));
    }

    #[test]
    fn test_free_variables_fall_back() {
        let expr = parse("(let [y 1] (fn [x] (+ x y)))");
        compile_tree(&expr, &Config::default());
        assert!(fn_of(&expr).compiled.get().is_none());
    }

    #[test]
    fn test_disabled_driver_compiles_nothing() {
        let expr = parse("(fn [x] x)");
        let config = Config {
            vm_enabled: false,
            ..Config::default()
        };
        compile_tree(&expr, &config);
        assert!(fn_of(&expr).compiled.get().is_none());
    }

    #[test]
    fn test_nested_literal_compiles_inside_fallback() {
        // The outer fn uses try, the inner one is self-contained.
        let expr = parse("(fn [] (try ((fn [x] x) 1) (catch Error e 0)))");
        compile_tree(&expr, &Config::default());
        let outer = fn_of(&expr);
        assert!(outer.compiled.get().is_none());
        let ExprKind::Try { body, .. } = &outer.arities[0].body[0].kind else {
            panic!("expected try");
        };
        let ExprKind::Call { callee, .. } = &body[0].kind else {
            panic!("expected call");
        };
        assert!(fn_of(callee).compiled.get().is_some());
    }
}
