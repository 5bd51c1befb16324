mod chunk;
mod error;
mod heap;
mod table;
mod value;
mod vm;
pub mod debug;

pub use chunk::{Chunk, MAX_CONSTANTS, OpCode};
pub use error::{CompileError, InterpretError, RuntimeError, VmError};
pub use heap::{
    GcRef, Heap, NativeFn, Obj, ObjClosure, ObjFunction, ObjNative, ObjString, ObjUpvalue,
    hash_str,
};
pub use table::Table;
pub use value::Value;
pub use vm::{Vm, VmGcStats};
