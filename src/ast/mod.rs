//! Abstract syntax tree for Jolt.

pub mod expr;

pub use expr::{Binding, CatchClass, CatchClause, Expr, ExprKind, FnArity, FnExpr};
