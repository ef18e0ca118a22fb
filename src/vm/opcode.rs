//! Bytecode instruction set for the Jolt VM.
//!
//! Every instruction is one tag byte followed by a fixed number of operand
//! bytes, except `Closure`, which is followed by one `(is_local, index)` pair
//! per upvalue of the function it instantiates. Multi-byte operands are
//! big-endian.

/// Opcodes for the bytecode virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // ============ Constants & Stack ============
    /// Push a constant: CONST <index:u16>
    Const = 0,
    /// Push nil
    Nil,
    /// Push true
    True,
    /// Push false
    False,
    /// Discard the top value
    Pop,
    /// Discard N values below the top value: POP_N <count:u8>
    PopN,

    // ============ Variables ============
    /// Push a local of the current frame: GET_LOCAL <slot:u8>
    GetLocal,
    /// Store the top value into a local, leaving it on the stack: SET_LOCAL <slot:u8>
    SetLocal,
    /// Push a captured variable: GET_UPVALUE <index:u8>
    GetUpvalue,
    /// Store the top value into a captured variable: SET_UPVALUE <index:u8>
    SetUpvalue,
    /// Close every open upvalue at or above a slot: CLOSE_UPVALUE <slot:u8>
    CloseUpvalue,
    /// Push the value of a Var constant: GET_VAR <index:u16>
    GetVar,
    /// Bind a Var constant to the top value, leaving it on the stack: SET_VAR <index:u16>
    SetVar,

    // ============ Arithmetic & Comparison ============
    Add,
    Subtract,
    Multiply,
    Divide,
    Negate,
    Equal,
    Less,
    Greater,
    Not,

    // ============ Control Flow ============
    /// Unconditional forward jump: JUMP <offset:i16>
    Jump,
    /// Pop the condition, jump forward if falsey: JUMP_IF_FALSE <offset:i16>
    JumpIfFalse,
    /// Backward jump: LOOP <offset:u16>
    Loop,

    // ============ Functions ============
    /// Call the value below N arguments: CALL <argc:u8>
    Call,
    /// Instantiate a sub-function: CLOSURE <index:u16> (<is_local:u8> <index:u8>)*
    Closure,
    /// Rebind loop slots in place: RECUR <argc:u8> <first_slot:u8>
    Recur,
    Return,

    // ============ Collections ============
    /// Build a vector from N values: VECTOR <count:u16>
    Vector,
    /// Build a map from N key/value pairs: MAP <pairs:u16>
    Map,
    /// Build a set from N values: SET <count:u16>
    Set,
}

impl OpCode {
    /// Number of operand bytes after the tag. For `Closure` this excludes the
    /// upvalue pairs, whose count comes from the referenced sub-function.
    pub fn operand_size(self) -> usize {
        match self {
            OpCode::Nil
            | OpCode::True
            | OpCode::False
            | OpCode::Pop
            | OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Negate
            | OpCode::Equal
            | OpCode::Less
            | OpCode::Greater
            | OpCode::Not
            | OpCode::Return => 0,

            OpCode::PopN
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetUpvalue
            | OpCode::SetUpvalue
            | OpCode::CloseUpvalue
            | OpCode::Call => 1,

            OpCode::Const
            | OpCode::GetVar
            | OpCode::SetVar
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::Loop
            | OpCode::Closure
            | OpCode::Recur
            | OpCode::Vector
            | OpCode::Map
            | OpCode::Set => 2,
        }
    }

    /// Stable name used by the disassembler.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Const => "CONST",
            OpCode::Nil => "NIL",
            OpCode::True => "TRUE",
            OpCode::False => "FALSE",
            OpCode::Pop => "POP",
            OpCode::PopN => "POP_N",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::GetUpvalue => "GET_UPVALUE",
            OpCode::SetUpvalue => "SET_UPVALUE",
            OpCode::CloseUpvalue => "CLOSE_UPVALUE",
            OpCode::GetVar => "GET_VAR",
            OpCode::SetVar => "SET_VAR",
            OpCode::Add => "ADD",
            OpCode::Subtract => "SUBTRACT",
            OpCode::Multiply => "MULTIPLY",
            OpCode::Divide => "DIVIDE",
            OpCode::Negate => "NEGATE",
            OpCode::Equal => "EQUAL",
            OpCode::Less => "LESS",
            OpCode::Greater => "GREATER",
            OpCode::Not => "NOT",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::Loop => "LOOP",
            OpCode::Call => "CALL",
            OpCode::Closure => "CLOSURE",
            OpCode::Recur => "RECUR",
            OpCode::Return => "RETURN",
            OpCode::Vector => "VECTOR",
            OpCode::Map => "MAP",
            OpCode::Set => "SET",
        }
    }

    /// Decode a tag byte; `None` means the chunk is corrupt.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        if byte <= OpCode::Set as u8 {
            // SAFETY: `OpCode` is `repr(u8)` with contiguous discriminants 0..=Set.
            Some(unsafe { std::mem::transmute::<u8, OpCode>(byte) })
        } else {
            None
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for byte in 0..=OpCode::Set as u8 {
            let op = OpCode::from_u8(byte).unwrap();
            assert_eq!(u8::from(op), byte);
        }
    }

    #[test]
    fn test_out_of_range_byte_is_rejected() {
        assert_eq!(OpCode::from_u8(OpCode::Set as u8 + 1), None);
        assert_eq!(OpCode::from_u8(0xff), None);
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(OpCode::Return.operand_size(), 0);
        assert_eq!(OpCode::GetLocal.operand_size(), 1);
        assert_eq!(OpCode::Const.operand_size(), 2);
        assert_eq!(OpCode::Recur.operand_size(), 2);
        assert_eq!(OpCode::Closure.operand_size(), 2);
    }

    #[test]
    fn test_mnemonics_are_distinct() {
        let mut names: Vec<_> = (0..=OpCode::Set as u8)
            .filter_map(OpCode::from_u8)
            .map(OpCode::mnemonic)
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
