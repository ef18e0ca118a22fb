//! Parser tests.

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::error::{JoltError, ParserError};
    use crate::interpreter::Interpreter;

    fn parse_expr(source: &str) -> Expr {
        let mut interp = Interpreter::new();
        interp.parse_str(source).unwrap().remove(0)
    }

    fn parse_err(source: &str) -> String {
        let mut interp = Interpreter::new();
        match interp.parse_str(source) {
            Err(JoltError::Parser(err)) => err.to_string(),
            Err(other) => panic!("Expected parser error, got {}", other),
            Ok(_) => panic!("Expected parser error for {}", source),
        }
    }

    fn only_fn(expr: &Expr) -> &FnExpr {
        match &expr.kind {
            ExprKind::Fn(func) => func,
            _ => panic!("Expected fn literal"),
        }
    }

    #[test]
    fn test_call() {
        let expr = parse_expr("(+ 1 2)");
        match expr.kind {
            ExprKind::Call { callee, args } => {
                assert!(matches!(callee.kind, ExprKind::VarRef(ref var) if &*var.name == "+"));
                assert_eq!(args.len(), 2);
            }
            _ => panic!("Expected call expression"),
        }
    }

    #[test]
    fn test_let_bindings_resolve_to_locals() {
        let expr = parse_expr("(let [x 1 y x] y)");
        match expr.kind {
            ExprKind::Let { bindings, body } => {
                assert_eq!(bindings.len(), 2);
                match &bindings[1].1.kind {
                    ExprKind::Local(binding) => assert_eq!(binding.index, 0),
                    _ => panic!("Expected local reference"),
                }
                match &body[0].kind {
                    ExprKind::Local(binding) => {
                        assert_eq!(&*binding.name, "y");
                        assert_eq!(binding.index, 1);
                    }
                    _ => panic!("Expected local reference"),
                }
            }
            _ => panic!("Expected let"),
        }
    }

    #[test]
    fn test_fn_frame_reserves_self_slot() {
        let expr = parse_expr("(fn f [a b] b)");
        let func = only_fn(&expr);
        assert_eq!(func.name.as_deref(), Some("f"));
        match &func.arities[0].body[0].kind {
            // Slot 0 is `f` itself.
            ExprKind::Local(binding) => assert_eq!(binding.index, 2),
            _ => panic!("Expected local reference"),
        }
    }

    #[test]
    fn test_captured_local_names_outer_frame() {
        let expr = parse_expr("(let [x 1] (fn [] x))");
        let ExprKind::Let { body, .. } = &expr.kind else {
            panic!("Expected let");
        };
        let func = only_fn(&body[0]);
        match &func.arities[0].body[0].kind {
            ExprKind::Local(binding) => {
                assert_eq!(binding.frame, 0);
                assert_eq!(binding.index, 0);
            }
            _ => panic!("Expected local reference"),
        }
    }

    #[test]
    fn test_multi_arity_and_variadic() {
        let expr = parse_expr("(fn ([] 0) ([x] x) ([x & more] more))");
        let func = only_fn(&expr);
        assert_eq!(func.arities.len(), 3);
        assert!(func.arities[2].variadic);
        assert_eq!(func.arities[2].required(), 1);
        assert_eq!(func.arity_for(1).map(|a| a.params.len()), Some(1));
        assert_eq!(func.arity_for(4).map(|a| a.variadic), Some(true));
    }

    #[test]
    fn test_recur_checks() {
        assert!(parse_err("(recur 1)").contains("recur used outside of loop"));
        assert!(parse_err("(loop [i 0] (+ 1 (recur i)))")
            .contains("Can only recur from tail position"));
        assert!(parse_err("(loop [i 0] (recur))")
            .contains("Mismatched argument count to recur, expected: 1 args, got: 0"));
        assert!(parse_err("(fn [a] (try (recur a) (catch Error e 0)))")
            .contains("recur used outside of loop"));
    }

    #[test]
    fn test_recur_in_tail_of_if_and_let() {
        let expr = parse_expr("(loop [i 3] (if (= i 0) i (let [j (- i 1)] (recur j))))");
        assert!(matches!(expr.kind, ExprKind::Loop { .. }));
    }

    #[test]
    fn test_unresolved_symbol() {
        let mut interp = Interpreter::new();
        match interp.parse_str("(foo 1)") {
            Err(JoltError::Parser(ParserError::UnresolvedSymbol(name, _))) => {
                assert_eq!(name, "foo")
            }
            _ => panic!("Expected unresolved symbol"),
        }
    }

    #[test]
    fn test_set_targets() {
        let expr = parse_expr("(let [x 1] (set! x 2))");
        let ExprKind::Let { body, .. } = &expr.kind else {
            panic!("Expected let");
        };
        assert!(matches!(body[0].kind, ExprKind::SetLocal { .. }));

        let mut interp = Interpreter::new();
        let exprs = interp.parse_str("(def g 1) (set! g 2)").unwrap();
        assert!(matches!(exprs[1].kind, ExprKind::SetVar { .. }));
    }

    #[test]
    fn test_def_forms() {
        match parse_expr("(def x)").kind {
            ExprKind::Def { var, value } => {
                assert_eq!(&*var.name, "x");
                assert!(value.is_none());
            }
            _ => panic!("Expected def"),
        }
        match parse_expr("(def y \"doc\" 3)").kind {
            ExprKind::Def { value: Some(v), .. } => {
                assert!(matches!(v.kind, ExprKind::Literal(_)))
            }
            _ => panic!("Expected def with value"),
        }
    }

    #[test]
    fn test_duplicate_literal_keys() {
        assert!(parse_err("{:a 1 :a 2}").contains("Duplicate key: :a"));
        assert!(parse_err("#{1 1}").contains("Duplicate key: 1"));
    }

    #[test]
    fn test_builtin_macro_expands() {
        let expr = parse_expr("(when true 1 2)");
        match expr.kind {
            ExprKind::If { then, else_, .. } => {
                assert!(matches!(then.kind, ExprKind::Do(_)));
                assert!(else_.is_none());
            }
            _ => panic!("Expected if"),
        }
    }

    #[test]
    fn test_late_macro_is_deferred() {
        let mut interp = Interpreter::new();
        let exprs = interp
            .parse_str("(defmacro later [x] x) (fn [] (later 1))")
            .unwrap();
        // The macro has no value until the first form is evaluated.
        let func = only_fn(&exprs[1]);
        assert!(matches!(
            func.arities[0].body[0].kind,
            ExprKind::MacroCall { .. }
        ));
    }

    #[test]
    fn test_malformed_forms() {
        assert!(parse_err("(if)").contains("Wrong number of args (0) passed to if"));
        assert!(parse_err("(let x 1)").contains("let requires a vector for its binding"));
        assert!(parse_err("(let [x] x)")
            .contains("let requires an even number of forms in binding vector"));
        assert!(parse_err("(fn)").contains("Parameter declaration missing"));
        assert!(parse_err("(fn ([x] 1) ([y] 2))")
            .contains("Can't have 2 overloads with same arity"));
    }
}
