//! Interpreter module for Jolt: runtime values, namespaces and the tree-walking evaluator.

pub mod builtins;
pub mod environment;
pub mod executor;
pub mod namespace;
pub mod numbers;
pub mod value;

pub use environment::Environment;
pub use executor::Interpreter;
pub use namespace::{GlobalEnv, Var};
pub use value::Value;
