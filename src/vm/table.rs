//! Open-addressing hash table keyed by interned strings.
//!
//! Capacity is always a power of two so probing can mask instead of divide.
//! Deletion leaves a tombstone (no key, value `Bool(true)`) to keep probe
//! chains intact; `count` includes tombstones so the load-factor check
//! accounts for every slot that terminates a probe early. Tombstones are
//! dropped when the table grows.
//!
//! Keys are handles into a [`Heap`]; methods borrow the heap to read the
//! cached string hashes. Key comparison is handle identity, which is valid
//! only because string keys are interned.

use super::heap::{GcRef, Heap};
use super::value::Value;

const INITIAL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Entry {
    key: Option<GcRef>,
    value: Value,
}

impl Entry {
    const EMPTY: Entry = Entry {
        key: None,
        value: Value::Nil,
    };

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && !self.value.is_nil()
    }
}

fn key_hash(heap: &Heap, key: GcRef) -> u32 {
    heap.string(key).map(|s| s.hash).unwrap_or(0)
}

/// Probe for `key` starting at its hash slot. Returns the entry holding the
/// key, or the slot an insert should use: the first tombstone passed if any,
/// otherwise the empty slot that ended the probe. Termination needs at least
/// one truly empty slot, which the load-factor bound guarantees.
fn find_entry(entries: &[Entry], hash: u32, key: GcRef) -> usize {
    let mask = entries.len() - 1;
    let mut index = hash as usize & mask;
    let mut tombstone = None;
    loop {
        let entry = &entries[index];
        match entry.key {
            Some(k) if k == key => return index,
            Some(_) => {}
            None => {
                if entry.value.is_nil() {
                    return tombstone.unwrap_or(index);
                }
                if tombstone.is_none() {
                    tombstone = Some(index);
                }
            }
        }
        index = (index + 1) & mask;
    }
}

/// A string-keyed hash table. Used for globals and for the string-intern
/// set; the latter is swept weakly by [`Table::remove_unmarked`].
#[derive(Debug, Default)]
pub struct Table {
    entries: Vec<Entry>,
    // Live entries plus tombstones.
    count: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots in use, tombstones included.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of live key/value pairs.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.key.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, heap: &Heap, key: GcRef) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = &self.entries[find_entry(&self.entries, key_hash(heap, key), key)];
        entry.key.map(|_| entry.value)
    }

    /// Insert or overwrite. Returns true if the key was not present.
    /// Inserting into a tombstone does not change `count`; the slot was
    /// already accounted for.
    pub fn set(&mut self, heap: &Heap, key: GcRef, value: Value) -> bool {
        if (self.count + 1) * 4 > self.entries.len() * 3 {
            self.grow(heap);
        }
        let index = find_entry(&self.entries, key_hash(heap, key), key);
        let entry = &mut self.entries[index];
        let is_new = entry.key.is_none();
        if is_new && entry.value.is_nil() {
            self.count += 1;
        }
        entry.key = Some(key);
        entry.value = value;
        is_new
    }

    /// Remove a key, leaving a tombstone so later probes keep walking
    /// through this slot. Returns false if the key was not present.
    pub fn delete(&mut self, heap: &Heap, key: GcRef) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let index = find_entry(&self.entries, key_hash(heap, key), key);
        let entry = &mut self.entries[index];
        if entry.key.is_none() {
            return false;
        }
        entry.key = None;
        entry.value = Value::Bool(true);
        true
    }

    /// Copy every live entry of `from` into this table.
    pub fn add_all(&mut self, heap: &Heap, from: &Table) {
        for entry in &from.entries {
            if let Some(key) = entry.key {
                self.set(heap, key, entry.value);
            }
        }
    }

    /// Look up a string by content and hash rather than by handle. This is
    /// the one content-based probe: interning uses it to find an existing
    /// object before allocating a duplicate.
    pub fn find_interned(&self, heap: &Heap, text: &str, hash: u32) -> Option<GcRef> {
        if self.entries.is_empty() {
            return None;
        }
        let mask = self.entries.len() - 1;
        let mut index = hash as usize & mask;
        loop {
            let entry = &self.entries[index];
            match entry.key {
                None => {
                    if entry.value.is_nil() {
                        return None;
                    }
                }
                Some(key) => {
                    if let Some(s) = heap.string(key)
                        && s.hash == hash
                        && s.text == text
                    {
                        return Some(key);
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    /// Weak sweep: tombstone every entry whose key did not survive the mark
    /// phase. Run between mark and heap sweep so no entry ever holds a key
    /// about to be freed.
    pub fn remove_unmarked(&mut self, heap: &Heap) {
        for entry in &mut self.entries {
            if let Some(key) = entry.key
                && !heap.is_marked(key)
            {
                entry.key = None;
                entry.value = Value::Bool(true);
            }
        }
    }

    /// Iterate the live entries.
    pub fn iter(&self) -> impl Iterator<Item = (GcRef, Value)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.key.map(|k| (k, e.value)))
    }

    /// Double the capacity and reinsert every live entry. Tombstones are
    /// not carried over, so `count` drops back to the live count.
    fn grow(&mut self, heap: &Heap) {
        let new_capacity = if self.entries.is_empty() {
            INITIAL_CAPACITY
        } else {
            self.entries.len() * 2
        };
        let old = std::mem::replace(&mut self.entries, vec![Entry::EMPTY; new_capacity]);
        self.count = 0;
        for entry in old {
            if let Some(key) = entry.key {
                let index = find_entry(&self.entries, key_hash(heap, key), key);
                self.entries[index] = entry;
                self.count += 1;
            }
        }
    }
}
