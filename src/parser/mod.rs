//! Parser module for Jolt: forms to expressions.

mod core;
pub mod macros;
mod special_forms;

#[cfg(test)]
mod tests;

pub use self::core::{ParseResult, Parser};
