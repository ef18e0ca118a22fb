//! Bytecode chunk and function prototype types.

use std::rc::Rc;

use crate::error::CompileError;
use crate::interpreter::value::Value;
use crate::span::Span;

use super::opcode::OpCode;

/// Constant pool capacity; `CONST` addresses it with a u16.
pub const MAX_CONSTANTS: usize = u16::MAX as usize;

/// A chunk of bytecode: instruction bytes + constant pool + line info.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub constants: Vec<Value>,
    /// Source line of every byte in `code`.
    pub lines: Vec<u32>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Emit an opcode and return its offset.
    pub fn write_op(&mut self, op: OpCode, line: u32) -> usize {
        let offset = self.code.len();
        self.write_byte(op.into(), line);
        offset
    }

    pub fn write_u16(&mut self, value: u16, line: u32) {
        for byte in value.to_be_bytes() {
            self.write_byte(byte, line);
        }
    }

    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.code[offset], self.code[offset + 1]])
    }

    pub fn read_i16(&self, offset: usize) -> i16 {
        i16::from_be_bytes([self.code[offset], self.code[offset + 1]])
    }

    /// Add a constant to the pool and return its index. Constants are never
    /// deduplicated.
    pub fn add_constant(&mut self, value: Value, line: u32) -> Result<u16, CompileError> {
        if self.constants.len() >= MAX_CONSTANTS {
            return Err(CompileError::TooManyConstants(Span::at_line(line as usize)));
        }
        self.constants.push(value);
        Ok((self.constants.len() - 1) as u16)
    }

    /// Add a constant and emit `CONST` for it.
    pub fn emit_constant(&mut self, value: Value, line: u32) -> Result<(), CompileError> {
        let idx = self.add_constant(value, line)?;
        self.write_op(OpCode::Const, line);
        self.write_u16(idx, line);
        Ok(())
    }

    /// Emit a forward jump with a placeholder operand; returns the placeholder's offset.
    pub fn emit_jump(&mut self, op: OpCode, line: u32) -> usize {
        self.write_op(op, line);
        self.write_u16(0xffff, line);
        self.code.len() - 2
    }

    /// Point the jump whose operand lives at `placeholder` to the current end of code.
    pub fn patch_jump(&mut self, placeholder: usize) -> Result<(), CompileError> {
        let distance = self.code.len() - placeholder - 2;
        let offset = i16::try_from(distance).map_err(|_| {
            CompileError::JumpTooLarge(Span::at_line(self.lines[placeholder] as usize))
        })?;
        let [hi, lo] = offset.to_be_bytes();
        self.code[placeholder] = hi;
        self.code[placeholder + 1] = lo;
        Ok(())
    }

    /// Emit a backward jump to `loop_start`.
    pub fn emit_loop(&mut self, loop_start: usize, line: u32) -> Result<(), CompileError> {
        self.write_op(OpCode::Loop, line);
        let offset = u16::try_from(self.code.len() - loop_start + 2)
            .map_err(|_| CompileError::JumpTooLarge(Span::at_line(line as usize)))?;
        self.write_u16(offset, line);
        Ok(())
    }
}

/// How a closure captures one variable from its immediately enclosing function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueInfo {
    /// True for a local slot of the enclosing function, false for one of the
    /// enclosing function's own upvalues.
    pub is_local: bool,
    pub index: u8,
}

/// A compiled function arity. Immutable once built and shared by every
/// closure created from it.
#[derive(Debug, Clone)]
pub struct FunctionProto {
    pub name: String,
    /// Exact argument count; compiled functions are never variadic.
    pub arity: u8,
    pub chunk: Chunk,
    pub upvalues: Vec<UpvalueInfo>,
    /// Function literals in the body, addressed by `CLOSURE`.
    pub sub_functions: Vec<Rc<FunctionProto>>,
}

impl FunctionProto {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arity: 0,
            chunk: Chunk::new(),
            upvalues: Vec::new(),
            sub_functions: Vec::new(),
        }
    }
}
