//! Bytecode VM for Jolt: compiles function literals to bytecode and runs them
//! on a stack-based VM.
//!
//! The tree-walking interpreter stays the reference engine. Functions outside
//! the compiled subset, or that fail to compile, keep running there, and the
//! two engines call each other freely.

pub mod chunk;
pub mod compiler;
pub mod compiler_exprs;
pub mod disassembler;
pub mod eligibility;
pub mod opcode;
pub mod upvalue;
#[allow(clippy::module_inception)]
pub mod vm;
pub mod vm_calls;

pub use chunk::{Chunk, FunctionProto, UpvalueInfo};
pub use compiler::Compiler;
pub use disassembler::disassemble;
pub use eligibility::{compile_tree, is_vm_compatible, is_vm_compatible_fn};
pub use opcode::OpCode;
pub use upvalue::VmClosure;
pub use vm::Vm;
