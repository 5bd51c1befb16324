//! Human-readable chunk listings.

use std::fmt::Write;

use super::chunk::{Chunk, OpCode};

/// Render every instruction of a chunk under a `== name ==` header.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", name);
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset, &mut out);
    }
    out
}

/// Append one instruction's listing to `out` and return the offset of the
/// next instruction. The line column prints `|` when the instruction comes
/// from the same source line as the previous one. Undecodable bytes are
/// listed and skipped one at a time so a listing is always produced.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let _ = write!(out, "{:04} ", offset);
    if offset > 0 && chunk.line(offset) == chunk.line(offset - 1) {
        let _ = write!(out, "   | ");
    } else {
        let _ = write!(out, "{:4} ", chunk.line(offset).unwrap_or(0));
    }

    let Some(byte) = chunk.byte(offset) else {
        let _ = writeln!(out, "<end>");
        return offset + 1;
    };
    let Some(op) = OpCode::from_byte(byte) else {
        let _ = writeln!(out, "unknown opcode {:#04x}", byte);
        return offset + 1;
    };

    match op {
        OpCode::Constant => {
            let index = chunk.byte(offset + 1).map(usize::from);
            constant_instruction(chunk, "CONSTANT", index, out);
        }
        OpCode::ConstantLong => {
            let index = chunk.read_u24(offset + 1);
            constant_instruction(chunk, "CONSTANT_LONG", index, out);
        }
        OpCode::Add => {
            let _ = writeln!(out, "ADD");
        }
        OpCode::Subtract => {
            let _ = writeln!(out, "SUBTRACT");
        }
        OpCode::Multiply => {
            let _ = writeln!(out, "MULTIPLY");
        }
        OpCode::Divide => {
            let _ = writeln!(out, "DIVIDE");
        }
        OpCode::Negate => {
            let _ = writeln!(out, "NEGATE");
        }
        OpCode::Return => {
            let _ = writeln!(out, "RETURN");
        }
    }
    offset + op.width()
}

fn constant_instruction(chunk: &Chunk, name: &str, index: Option<usize>, out: &mut String) {
    match index {
        Some(index) => match chunk.constant(index) {
            Some(value) => {
                let _ = writeln!(out, "{:<16} {:4} '{}'", name, index, value);
            }
            None => {
                let _ = writeln!(out, "{:<16} {:4} <bad index>", name, index);
            }
        },
        None => {
            let _ = writeln!(out, "{:<16} <truncated>", name);
        }
    }
}
