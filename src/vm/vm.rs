//! The virtual machine: operand stack, dispatch loop, and GC orchestration.

use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::config::RuntimeConfig;

use super::chunk::{Chunk, MAX_CONSTANTS, OpCode};
use super::error::{InterpretError, RuntimeError, VmError};
use super::heap::{GcRef, Heap};
use super::table::Table;
use super::value::Value;

/// Collector counters, kept across a VM's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct VmGcStats {
    pub cycles: u64,
    pub total_pause: Duration,
    pub max_pause: Duration,
}

/// A virtual machine instance. Owns its heap, its string-intern table, and
/// its globals; chunks are borrowed for the duration of a run.
pub struct Vm {
    stack: Vec<Value>,
    heap: Heap,
    strings: Table,
    globals: Table,
    gc_stats: VmGcStats,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self {
            stack: Vec::new(),
            heap: Heap::with_config(config.heap_limit, config.gc_enabled, config.gc_threshold),
            strings: Table::new(),
            globals: Table::new(),
            gc_stats: VmGcStats::default(),
        }
    }

    /// Validate a chunk against the front end's output contract, then run
    /// it. The two failure classes are kept apart: malformed bytecode is a
    /// `Compile` error, a fault during execution is a `Runtime` error.
    pub fn interpret(&mut self, chunk: &Chunk) -> Result<Value, InterpretError> {
        chunk.validate()?;
        self.execute(chunk).map_err(InterpretError::from)
    }

    /// Run a chunk without validating it first. Malformed bytecode is still
    /// caught, but reported as a runtime fault at the offending offset.
    ///
    /// The stack is reset on entry. On a fault it is left exactly as it was
    /// when the faulting opcode was reached; no operand of a failed
    /// operation is consumed.
    pub fn execute(&mut self, chunk: &Chunk) -> Result<Value, RuntimeError> {
        self.stack.clear();
        let mut ip = 0;

        while ip < chunk.len() {
            let offset = ip;
            if self.heap.should_gc() {
                self.collect(Some(chunk));
            }

            let byte = chunk.byte(offset).unwrap_or(0);
            let op = OpCode::from_byte(byte)
                .ok_or_else(|| self.fault(chunk, offset, VmError::UnknownOpcode(byte)))?;
            trace!("{:04} {:?} stack={:?}", offset, op, self.stack);
            ip += op.width();

            match op {
                OpCode::Constant => {
                    // A truncated operand reads as an index past the pool
                    // and is reported as a bad constant.
                    let index = chunk
                        .byte(offset + 1)
                        .map(usize::from)
                        .unwrap_or(MAX_CONSTANTS);
                    self.push_constant(chunk, offset, index)?;
                }
                OpCode::ConstantLong => {
                    let index = chunk.read_u24(offset + 1).unwrap_or(MAX_CONSTANTS);
                    self.push_constant(chunk, offset, index)?;
                }
                OpCode::Add => self.binary(chunk, offset, |a, b| a + b)?,
                OpCode::Subtract => self.binary(chunk, offset, |a, b| a - b)?,
                OpCode::Multiply => self.binary(chunk, offset, |a, b| a * b)?,
                OpCode::Divide => self.binary(chunk, offset, |a, b| a / b)?,
                OpCode::Negate => {
                    let top = self
                        .stack
                        .last()
                        .ok_or_else(|| self.fault(chunk, offset, VmError::StackUnderflow))?;
                    let n = top.as_number().ok_or_else(|| {
                        self.fault(
                            chunk,
                            offset,
                            VmError::TypeMismatch {
                                expected: "number",
                                got: top.type_name(),
                            },
                        )
                    })?;
                    // Checked above, so the slot is present.
                    if let Some(slot) = self.stack.last_mut() {
                        *slot = Value::Number(-n);
                    }
                }
                OpCode::Return => {
                    return self
                        .stack
                        .pop()
                        .ok_or_else(|| self.fault(chunk, offset, VmError::StackUnderflow));
                }
            }
        }

        // Ran off the end without a return.
        Ok(Value::Nil)
    }

    fn push_constant(
        &mut self,
        chunk: &Chunk,
        offset: usize,
        index: usize,
    ) -> Result<(), RuntimeError> {
        let value = chunk
            .constant(index)
            .ok_or_else(|| self.fault(chunk, offset, VmError::BadConstant(index)))?;
        self.stack.push(*value);
        Ok(())
    }

    /// A binary numeric operation. Both operands are checked before either
    /// is popped, so a type fault leaves the stack untouched. The right
    /// operand is on top.
    fn binary(
        &mut self,
        chunk: &Chunk,
        offset: usize,
        f: fn(f64, f64) -> f64,
    ) -> Result<(), RuntimeError> {
        let len = self.stack.len();
        if len < 2 {
            return Err(self.fault(chunk, offset, VmError::StackUnderflow));
        }
        let left = self.stack[len - 2];
        let right = self.stack[len - 1];
        let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
            let got = if left.is_number() {
                right.type_name()
            } else {
                left.type_name()
            };
            return Err(self.fault(
                chunk,
                offset,
                VmError::TypeMismatch {
                    expected: "number",
                    got,
                },
            ));
        };
        self.stack.truncate(len - 2);
        self.stack.push(Value::Number(f(a, b)));
        Ok(())
    }

    fn fault(&self, chunk: &Chunk, offset: usize, error: VmError) -> RuntimeError {
        RuntimeError {
            error,
            offset,
            line: chunk.line(offset).unwrap_or(0),
        }
    }

    /// Run a full collection cycle. `chunk` is the chunk currently being
    /// executed, if any; its constants are roots for the duration of the
    /// run even though the VM does not own it.
    fn collect(&mut self, chunk: Option<&Chunk>) {
        let start = Instant::now();

        let mut roots = self.stack.clone();
        for (key, value) in self.globals.iter() {
            roots.push(Value::Obj(key));
            roots.push(value);
        }
        if let Some(chunk) = chunk {
            for i in 0..chunk.constants_len() {
                if let Some(value) = chunk.constant(i) {
                    roots.push(*value);
                }
            }
        }

        self.heap.mark(&roots);
        // The intern table holds weak references; sweep it while marks are
        // still set so it never retains a key the heap is about to free.
        self.strings.remove_unmarked(&self.heap);
        let freed = self.heap.sweep();

        let pause = start.elapsed();
        self.gc_stats.cycles += 1;
        self.gc_stats.total_pause += pause;
        if pause > self.gc_stats.max_pause {
            self.gc_stats.max_pause = pause;
        }
        debug!(
            "gc cycle {}: freed {} objects in {:?}",
            self.gc_stats.cycles, freed, pause
        );
    }

    /// Force a collection with the host-visible roots (stack and globals).
    pub fn collect_garbage(&mut self) {
        self.collect(None);
    }

    /// Intern a string and return its handle. Equal content always returns
    /// the same handle, so handle equality is content equality.
    pub fn intern(&mut self, text: &str) -> Result<GcRef, VmError> {
        self.heap.intern(&mut self.strings, text)
    }

    /// Bind a global by name. The name is interned.
    pub fn define_global(&mut self, name: &str, value: Value) -> Result<(), VmError> {
        let key = self.intern(name)?;
        self.globals.set(&self.heap, key, value);
        Ok(())
    }

    /// Look up a global by name, without interning the name.
    pub fn global(&self, name: &str) -> Option<Value> {
        let key = self
            .strings
            .find_interned(&self.heap, name, super::heap::hash_str(name))?;
        self.globals.get(&self.heap, key)
    }

    /// Push a value as a host-held root.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn gc_stats(&self) -> VmGcStats {
        self.gc_stats
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
