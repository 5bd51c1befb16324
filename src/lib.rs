//! A bytecode virtual machine with a stack-based execution loop, an arena
//! heap with a mark-sweep collector, string interning, and string-keyed
//! hash tables.
//!
//! Chunks of bytecode come from an external front end; [`vm::Vm::interpret`]
//! validates and runs them. See [`vm::Chunk`] for the instruction encoding.

pub mod config;
pub mod vm;
