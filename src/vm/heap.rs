//! The object heap and its mark-sweep garbage collector.
//!
//! All objects of a VM live in one arena that hands out stable [`GcRef`]
//! index handles. Identity is handle equality. The collector marks from a
//! root slice of values, then sweeps every unmarked slot back onto the free
//! list; the string-intern table is swept separately (it holds weak
//! references) between the two phases.

use log::debug;

use super::chunk::Chunk;
use super::error::VmError;
use super::table::Table;
use super::value::Value;

/// A handle to a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcRef {
    pub index: usize,
}

/// A host function callable from the language.
pub type NativeFn = fn(args: &[Value]) -> Value;

/// An interned string. Owns its buffer and caches its FNV-1a hash.
#[derive(Debug)]
pub struct ObjString {
    pub text: String,
    pub hash: u32,
}

/// A compiled function. Owns its chunk; the name is a non-owning reference
/// to an interned string, reclaimed by the collector.
#[derive(Debug)]
pub struct ObjFunction {
    pub arity: usize,
    pub upvalue_count: usize,
    pub chunk: Chunk,
    pub name: Option<GcRef>,
}

/// A closure: a non-owning reference to a function (which may be shared by
/// other closures) plus an owned array of upvalue references.
#[derive(Debug)]
pub struct ObjClosure {
    pub function: GcRef,
    pub upvalues: Vec<GcRef>,
}

/// A captured variable. While open it refers to an operand-stack slot and
/// owns nothing; once closed it holds its own copy of the value.
#[derive(Debug)]
pub enum ObjUpvalue {
    Open(usize),
    Closed(Value),
}

/// A native-function stub.
#[derive(Debug)]
pub struct ObjNative {
    pub arity: usize,
    pub function: NativeFn,
}

/// A heap object. The collector's mark and sweep logic matches exhaustively
/// on this, so adding a variant without updating tracing will not compile.
#[derive(Debug)]
pub enum Obj {
    String(ObjString),
    Function(ObjFunction),
    Closure(ObjClosure),
    Upvalue(ObjUpvalue),
    Native(ObjNative),
}

impl Obj {
    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::String(_) => "string",
            Obj::Function(_) => "function",
            Obj::Closure(_) => "closure",
            Obj::Upvalue(_) => "upvalue",
            Obj::Native(_) => "native",
        }
    }

    /// Estimated retained size in bytes, used for the GC trigger heuristic.
    fn size_estimate(&self) -> usize {
        let owned = match self {
            Obj::String(s) => s.text.capacity(),
            Obj::Function(f) => {
                f.chunk.len() * (1 + size_of::<u32>())
                    + f.chunk.constants_len() * size_of::<Value>()
            }
            Obj::Closure(c) => c.upvalues.len() * size_of::<GcRef>(),
            Obj::Upvalue(_) | Obj::Native(_) => 0,
        };
        size_of::<Obj>() + owned
    }
}

/// FNV-1a, the hash cached by every interned string.
pub fn hash_str(text: &str) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in text.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

struct Slot {
    marked: bool,
    obj: Obj,
}

/// The garbage-collected object heap of one VM.
pub struct Heap {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    bytes_allocated: usize,
    gc_threshold: usize,
    threshold_floor: usize,
    heap_limit: Option<usize>,
    gc_enabled: bool,
}

impl Heap {
    /// Initial collection threshold in bytes.
    pub const DEFAULT_GC_THRESHOLD: usize = 1024 * 1024;

    pub fn new() -> Self {
        Self::with_config(None, true, Self::DEFAULT_GC_THRESHOLD)
    }

    /// Create a heap with a hard size limit (`None` = unlimited), a GC
    /// enable flag, and the initial collection threshold.
    pub fn with_config(heap_limit: Option<usize>, gc_enabled: bool, gc_threshold: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            bytes_allocated: 0,
            gc_threshold,
            threshold_floor: gc_threshold,
            heap_limit,
            gc_enabled,
        }
    }

    /// Allocate an object. This is the single place object identity is
    /// established: the object lands in a slot, unmarked, and its handle is
    /// returned. Exceeding the configured heap limit is a reported
    /// `OutOfMemory`, never a process exit.
    pub fn alloc(&mut self, obj: Obj) -> Result<GcRef, VmError> {
        let size = obj.size_estimate();
        if let Some(limit) = self.heap_limit
            && self.bytes_allocated + size > limit
        {
            return Err(VmError::OutOfMemory {
                requested: size,
                limit,
            });
        }
        self.bytes_allocated += size;

        let slot = Slot { marked: false, obj };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        Ok(GcRef { index })
    }

    /// Intern a string: return the existing object for this content if the
    /// table already knows it, otherwise allocate one and record it. The
    /// table entry keeps a weak reference; it does not root the string.
    pub fn intern(&mut self, strings: &mut Table, text: &str) -> Result<GcRef, VmError> {
        let hash = hash_str(text);
        if let Some(existing) = strings.find_interned(self, text, hash) {
            return Ok(existing);
        }
        let r = self.alloc(Obj::String(ObjString {
            text: text.to_owned(),
            hash,
        }))?;
        strings.set(self, r, Value::Nil);
        Ok(r)
    }

    pub fn get(&self, r: GcRef) -> Option<&Obj> {
        self.slots.get(r.index)?.as_ref().map(|slot| &slot.obj)
    }

    pub fn get_mut(&mut self, r: GcRef) -> Option<&mut Obj> {
        self.slots
            .get_mut(r.index)?
            .as_mut()
            .map(|slot| &mut slot.obj)
    }

    /// The string behind a handle, if the handle refers to a live string.
    pub fn string(&self, r: GcRef) -> Option<&ObjString> {
        match self.get(r)? {
            Obj::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_marked(&self, r: GcRef) -> bool {
        self.slots
            .get(r.index)
            .and_then(|slot| slot.as_ref())
            .is_some_and(|slot| slot.marked)
    }

    /// Whether the allocation-threshold heuristic says to collect.
    pub fn should_gc(&self) -> bool {
        self.gc_enabled && self.bytes_allocated >= self.gc_threshold
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// Number of live objects in the arena.
    pub fn object_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Mark phase: mark everything reachable from `roots`, tracing each
    /// composite variant's referenced sub-objects.
    pub fn mark(&mut self, roots: &[Value]) {
        let mut worklist: Vec<GcRef> = roots.iter().filter_map(|v| v.as_obj()).collect();

        while let Some(r) = worklist.pop() {
            let Some(slot) = self.slots.get_mut(r.index).and_then(|slot| slot.as_mut()) else {
                continue;
            };
            if slot.marked {
                continue;
            }
            slot.marked = true;

            match &slot.obj {
                Obj::String(_) | Obj::Native(_) => {}
                Obj::Function(f) => {
                    if let Some(name) = f.name {
                        worklist.push(name);
                    }
                    for i in 0..f.chunk.constants_len() {
                        if let Some(c) = f.chunk.constant(i).and_then(|v| v.as_obj()) {
                            worklist.push(c);
                        }
                    }
                }
                Obj::Closure(c) => {
                    worklist.push(c.function);
                    worklist.extend(c.upvalues.iter().copied());
                }
                // An open upvalue refers to a stack slot; the stack is
                // already a root.
                Obj::Upvalue(ObjUpvalue::Open(_)) => {}
                Obj::Upvalue(ObjUpvalue::Closed(v)) => {
                    if let Some(c) = v.as_obj() {
                        worklist.push(c);
                    }
                }
            }
        }
    }

    /// Sweep phase: free every unmarked slot exactly once, clear marks on
    /// survivors, and recompute the allocation budget. Returns the number
    /// of objects freed.
    pub fn sweep(&mut self) -> usize {
        let mut freed = 0;
        let mut live_bytes = 0;

        for index in 0..self.slots.len() {
            let keep = match &mut self.slots[index] {
                Some(slot) if slot.marked => {
                    slot.marked = false;
                    live_bytes += slot.obj.size_estimate();
                    true
                }
                Some(_) => false,
                None => true,
            };
            if !keep {
                self.slots[index] = None;
                self.free.push(index);
                freed += 1;
            }
        }

        self.bytes_allocated = live_bytes;
        self.gc_threshold = (live_bytes * 2).max(self.threshold_floor);
        debug!("gc sweep: freed {}, live {} bytes", freed, live_bytes);
        freed
    }

    /// A full collection cycle over this heap alone. The VM runs the phases
    /// itself so it can sweep the weak intern table in between; this is the
    /// standalone form.
    pub fn collect(&mut self, roots: &[Value]) -> usize {
        self.mark(roots);
        self.sweep()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
