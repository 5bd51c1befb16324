//! Bytecode chunks: the compiled unit consumed by the VM.
//!
//! A chunk is an append-only triple of instruction bytes, a parallel
//! source-line table of the same length, and a constant pool. Constant
//! indices are stable for the chunk's lifetime.

use super::error::CompileError;
use super::value::Value;

/// Maximum number of constants addressable by the long-form load
/// (3 operand bytes).
pub const MAX_CONSTANTS: usize = 1 << 24;

/// A single-byte instruction tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Push a constant; operand is a 1-byte pool index.
    Constant = 0,
    /// Push a constant; operand is a 3-byte packed pool index, most
    /// significant byte first.
    ConstantLong = 1,
    Add = 2,
    Subtract = 3,
    Multiply = 4,
    Divide = 5,
    Negate = 6,
    Return = 7,
}

impl OpCode {
    /// Decode an instruction byte. Returns `None` for bytes outside the
    /// opcode set; execution reports those as `UnknownOpcode`.
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        match byte {
            0 => Some(OpCode::Constant),
            1 => Some(OpCode::ConstantLong),
            2 => Some(OpCode::Add),
            3 => Some(OpCode::Subtract),
            4 => Some(OpCode::Multiply),
            5 => Some(OpCode::Divide),
            6 => Some(OpCode::Negate),
            7 => Some(OpCode::Return),
            _ => None,
        }
    }

    /// Total instruction width in bytes, opcode included.
    pub fn width(self) -> usize {
        match self {
            OpCode::Constant => 2,
            OpCode::ConstantLong => 4,
            _ => 1,
        }
    }
}

/// A chunk of bytecode with its constant pool and line mapping.
///
/// `code` and `lines` always have the same length; both are appended to in
/// lockstep by [`Chunk::write`].
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    code: Vec<u8>,
    lines: Vec<u32>,
    constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one instruction byte and its originating source line.
    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Append an opcode byte.
    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write(op as u8, line);
    }

    /// Append a value to the constant pool and return its index. No
    /// deduplication; callers deduplicate if they need to.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Add a constant and emit the long-form load for it, packing the index
    /// into 3 bytes, most significant first. Returns the constant's index,
    /// or `None` if the pool is full (>= 2^24 entries).
    pub fn write_constant(&mut self, value: Value, line: u32) -> Option<usize> {
        if self.constants.len() >= MAX_CONSTANTS {
            return None;
        }
        let index = self.add_constant(value);
        self.write_op(OpCode::ConstantLong, line);
        self.write(((index >> 16) & 0xff) as u8, line);
        self.write(((index >> 8) & 0xff) as u8, line);
        self.write((index & 0xff) as u8, line);
        Some(index)
    }

    /// Decode the 3-byte packed index starting at `offset`. Exact inverse
    /// of the packing in [`Chunk::write_constant`].
    pub fn read_u24(&self, offset: usize) -> Option<usize> {
        let a = *self.code.get(offset)? as usize;
        let b = *self.code.get(offset + 1)? as usize;
        let c = *self.code.get(offset + 2)? as usize;
        Some(a << 16 | b << 8 | c)
    }

    pub fn byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    pub fn line(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    pub fn constant(&self, index: usize) -> Option<&Value> {
        self.constants.get(index)
    }

    /// Number of instruction bytes.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn constants_len(&self) -> usize {
        self.constants.len()
    }

    /// Release the instruction buffer, the line table, and the constant
    /// pool, resetting to the empty state. Idempotent.
    pub fn clear(&mut self) {
        self.code = Vec::new();
        self.lines = Vec::new();
        self.constants = Vec::new();
    }

    /// Check this chunk against the front end's output contract: every
    /// instruction's operand bytes present, every constant index in range,
    /// every opcode byte defined. Walks the stream with the same
    /// offset-advance rules the disassembler uses, so a valid chunk decodes
    /// every byte exactly once.
    pub fn validate(&self) -> Result<(), CompileError> {
        let mut offset = 0;
        while offset < self.code.len() {
            let byte = self.code[offset];
            let op = OpCode::from_byte(byte).ok_or_else(|| {
                CompileError::new(format!("unknown opcode {} at offset {}", byte, offset))
            })?;
            if offset + op.width() > self.code.len() {
                return Err(CompileError::new(format!(
                    "truncated operand for {:?} at offset {}",
                    op, offset
                )));
            }
            let constant = match op {
                OpCode::Constant => Some(self.code[offset + 1] as usize),
                OpCode::ConstantLong => self.read_u24(offset + 1),
                _ => None,
            };
            if let Some(index) = constant
                && index >= self.constants.len()
            {
                return Err(CompileError::new(format!(
                    "constant index {} out of range at offset {}",
                    index, offset
                )));
            }
            offset += op.width();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_and_lines_grow_together() {
        let mut chunk = Chunk::new();
        for i in 0..100u32 {
            chunk.write(OpCode::Return as u8, i);
            assert_eq!(chunk.len(), chunk.lines.len());
        }
        assert_eq!(chunk.line(42), Some(42));
    }

    #[test]
    fn test_constant_roundtrip() {
        let mut chunk = Chunk::new();
        let i0 = chunk.add_constant(Value::Number(1.5));
        let i1 = chunk.add_constant(Value::Bool(true));
        let i2 = chunk.add_constant(Value::Nil);
        assert_eq!(chunk.constant(i0), Some(&Value::Number(1.5)));
        assert_eq!(chunk.constant(i1), Some(&Value::Bool(true)));
        assert_eq!(chunk.constant(i2), Some(&Value::Nil));
        // Indices are stable as the pool grows.
        for _ in 0..50 {
            chunk.add_constant(Value::Nil);
        }
        assert_eq!(chunk.constant(i0), Some(&Value::Number(1.5)));
    }

    #[test]
    fn test_no_deduplication() {
        let mut chunk = Chunk::new();
        let a = chunk.add_constant(Value::Number(7.0));
        let b = chunk.add_constant(Value::Number(7.0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_packed_index_law() {
        // Unpacking the 3 bytes produced by write_constant reconstructs
        // the index exactly.
        for &index in &[0usize, 1, 255, 256, 0xffff, 0x010000] {
            let mut chunk = Chunk::new();
            chunk.constants = vec![Value::Nil; index];
            let got = chunk.write_constant(Value::Number(1.0), 1);
            assert_eq!(got, Some(index));
            assert_eq!(chunk.byte(0), Some(OpCode::ConstantLong as u8));
            assert_eq!(chunk.read_u24(1), Some(index));
        }
    }

    #[test]
    fn test_packed_layout_is_most_significant_first() {
        // The documented byte layout: byte0 = bits 16-23, byte1 = bits
        // 8-15, byte2 = bits 0-7, checked at the operand's upper edge.
        for &index in &[0usize, 0xabcdef, MAX_CONSTANTS - 1] {
            let mut chunk = Chunk::new();
            chunk.write(((index >> 16) & 0xff) as u8, 1);
            chunk.write(((index >> 8) & 0xff) as u8, 1);
            chunk.write((index & 0xff) as u8, 1);
            assert_eq!(chunk.read_u24(0), Some(index));
        }
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(2.0), 1);
        chunk.write_op(OpCode::Return, 1);
        chunk.clear();
        assert!(chunk.is_empty());
        assert_eq!(chunk.constants_len(), 0);
        chunk.clear();
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(3.0), 1);
        let idx = chunk.add_constant(Value::Number(4.0));
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(idx as u8, 1);
        chunk.write_op(OpCode::Add, 2);
        chunk.write_op(OpCode::Return, 2);
        assert!(chunk.validate().is_ok());
    }

    #[test]
    fn test_validate_visits_every_byte_once() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(1.0), 1);
        chunk.write_op(OpCode::Negate, 1);
        chunk.write_op(OpCode::Return, 1);
        // Sum of decoded instruction widths covers the stream exactly.
        let mut offset = 0;
        let mut visited = 0;
        while offset < chunk.len() {
            let op = OpCode::from_byte(chunk.byte(offset).unwrap()).unwrap();
            visited += op.width();
            offset += op.width();
        }
        assert_eq!(visited, chunk.len());
        assert!(chunk.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_opcode() {
        let mut chunk = Chunk::new();
        chunk.write(0xff, 1);
        let err = chunk.validate().unwrap_err();
        assert!(err.message.contains("unknown opcode"));
    }

    #[test]
    fn test_validate_rejects_truncated_operand() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::ConstantLong, 1);
        chunk.write(0, 1);
        assert!(chunk.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_constant_index() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(9, 1);
        assert!(chunk.validate().is_err());
    }
}
