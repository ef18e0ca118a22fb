//! Bytecode disassembler for debug output.

use std::fmt::Write;

use super::chunk::FunctionProto;
use super::opcode::OpCode;

/// Disassemble a function prototype and its sub-functions to a
/// human-readable listing.
pub fn disassemble(proto: &FunctionProto) -> String {
    let mut out = String::new();
    let name = if proto.name.is_empty() {
        "<fn>"
    } else {
        &proto.name
    };
    let _ = writeln!(
        out,
        "== {} (arity {}, upvalues {}) ==",
        name,
        proto.arity,
        proto.upvalues.len()
    );

    let mut offset = 0;
    while offset < proto.chunk.len() {
        offset = disassemble_instruction(proto, offset, &mut out);
    }

    for nested in &proto.sub_functions {
        out.push('\n');
        out.push_str(&disassemble(nested));
    }
    out
}

/// Append the instruction at `offset` to `out` and return the offset of the
/// next one.
pub fn disassemble_instruction(proto: &FunctionProto, offset: usize, out: &mut String) -> usize {
    let chunk = &proto.chunk;
    let line = chunk.lines.get(offset).copied().unwrap_or(0);
    if offset > 0 && chunk.lines.get(offset - 1).copied() == Some(line) {
        let _ = write!(out, "{:04}    | ", offset);
    } else {
        let _ = write!(out, "{:04} {:4} ", offset, line);
    }

    let byte = chunk.code[offset];
    let Some(op) = OpCode::from_u8(byte) else {
        let _ = writeln!(out, "<invalid {:#04x}>", byte);
        return offset + 1;
    };
    let name = op.mnemonic();
    let next = offset + 1 + op.operand_size();
    if next > chunk.len() {
        let _ = writeln!(out, "{} <truncated>", name);
        return chunk.len();
    }

    match op {
        OpCode::Const | OpCode::GetVar | OpCode::SetVar => {
            let idx = chunk.read_u16(offset + 1);
            let _ = writeln!(out, "{:<14} {:>5} ({})", name, idx, constant_text(proto, idx));
        }
        OpCode::PopN
        | OpCode::GetLocal
        | OpCode::SetLocal
        | OpCode::GetUpvalue
        | OpCode::SetUpvalue
        | OpCode::CloseUpvalue
        | OpCode::Call => {
            let _ = writeln!(out, "{:<14} {:>5}", name, chunk.code[offset + 1]);
        }
        OpCode::Jump | OpCode::JumpIfFalse => {
            let jump = chunk.read_i16(offset + 1) as isize;
            let target = (next as isize) + jump;
            let _ = writeln!(out, "{:<14} {:>5} -> {:04}", name, jump, target);
        }
        OpCode::Loop => {
            let jump = chunk.read_u16(offset + 1) as isize;
            let target = (next as isize) - jump;
            let _ = writeln!(out, "{:<14} {:>5} -> {:04}", name, jump, target);
        }
        OpCode::Recur => {
            let _ = writeln!(
                out,
                "{:<14} {:>5} from {}",
                name,
                chunk.code[offset + 1],
                chunk.code[offset + 2]
            );
        }
        OpCode::Vector | OpCode::Map | OpCode::Set => {
            let _ = writeln!(out, "{:<14} {:>5}", name, chunk.read_u16(offset + 1));
        }
        OpCode::Closure => return disassemble_closure(proto, offset, out),
        _ => {
            let _ = writeln!(out, "{}", name);
        }
    }
    next
}

fn disassemble_closure(proto: &FunctionProto, offset: usize, out: &mut String) -> usize {
    let chunk = &proto.chunk;
    let idx = chunk.read_u16(offset + 1);
    let mut next = offset + 3;
    let Some(nested) = proto.sub_functions.get(idx as usize) else {
        let _ = writeln!(out, "{:<14} {:>5} (?)", OpCode::Closure.mnemonic(), idx);
        return next;
    };
    let _ = writeln!(
        out,
        "{:<14} {:>5} (<fn {}>)",
        OpCode::Closure.mnemonic(),
        idx,
        nested.name
    );
    for _ in 0..nested.upvalues.len() {
        let (Some(&is_local), Some(&index)) = (chunk.code.get(next), chunk.code.get(next + 1))
        else {
            return chunk.len();
        };
        let kind = if is_local != 0 { "local" } else { "upvalue" };
        let _ = writeln!(out, "{:04}    |   {:<14} {}", next, kind, index);
        next += 2;
    }
    next
}

fn constant_text(proto: &FunctionProto, idx: u16) -> String {
    match proto.chunk.constants.get(idx as usize) {
        Some(value) => value.to_readable_string(),
        None => "???".to_string(),
    }
}
