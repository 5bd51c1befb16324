//! Error types for the virtual machine.

use std::fmt;

/// A fault raised while executing or servicing the VM.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    /// An operation received an operand of the wrong variant. Detected by
    /// checking the operand before it is consumed, never by reinterpreting
    /// it.
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
    /// An opcode tried to pop more values than the stack holds.
    StackUnderflow,
    /// A byte in the instruction stream matches no defined opcode.
    UnknownOpcode(u8),
    /// A constant-load operand indexed past the end of the pool.
    BadConstant(usize),
    /// An allocation would exceed the configured heap limit.
    OutOfMemory { requested: usize, limit: usize },
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {}, got {}", expected, got)
            }
            VmError::StackUnderflow => write!(f, "stack underflow"),
            VmError::UnknownOpcode(byte) => write!(f, "unknown opcode {}", byte),
            VmError::BadConstant(index) => {
                write!(f, "constant index {} out of range", index)
            }
            VmError::OutOfMemory { requested, limit } => write!(
                f,
                "heap limit exceeded (requested {} bytes, limit {} bytes)",
                requested, limit
            ),
        }
    }
}

impl std::error::Error for VmError {}

/// A runtime fault with the diagnostic context the execution loop had when
/// it aborted: the offset of the faulting opcode and its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub error: VmError,
    /// Byte offset of the faulting opcode in the chunk.
    pub offset: usize,
    /// Source line from the chunk's line table.
    pub line: u32,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[line {}] runtime error at offset {:04}: {}",
            self.line, self.offset, self.error
        )
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A front-end failure. The compiler itself lives outside this crate; its
/// output contract is enforced by [`Chunk::validate`](super::chunk::Chunk),
/// and violations are reported under this class.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compile error: {}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// The two user-visible failure classes of `interpret`.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpretError {
    Compile(CompileError),
    Runtime(RuntimeError),
}

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpretError::Compile(e) => write!(f, "{}", e),
            InterpretError::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for InterpretError {}

impl From<CompileError> for InterpretError {
    fn from(e: CompileError) -> Self {
        InterpretError::Compile(e)
    }
}

impl From<RuntimeError> for InterpretError {
    fn from(e: RuntimeError) -> Self {
        InterpretError::Runtime(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_type_mismatch() {
        let e = VmError::TypeMismatch {
            expected: "number",
            got: "bool",
        };
        assert_eq!(e.to_string(), "type mismatch: expected number, got bool");
    }

    #[test]
    fn test_runtime_error_carries_context() {
        let e = RuntimeError {
            error: VmError::StackUnderflow,
            offset: 7,
            line: 3,
        };
        let rendered = e.to_string();
        assert!(rendered.contains("line 3"));
        assert!(rendered.contains("0007"));
        assert!(rendered.contains("stack underflow"));
    }

    #[test]
    fn test_interpret_error_conversions() {
        let c: InterpretError = CompileError::new("bad chunk").into();
        assert!(matches!(c, InterpretError::Compile(_)));

        let r: InterpretError = RuntimeError {
            error: VmError::UnknownOpcode(0xff),
            offset: 0,
            line: 1,
        }
        .into();
        assert!(matches!(r, InterpretError::Runtime(_)));
    }
}
