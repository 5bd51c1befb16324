//! End-to-end tests through the public API: build a chunk the way a front
//! end would, hand it to a VM, and check the observable outcome.

use std::io::Write;

use ember::config::RuntimeConfig;
use ember::vm::{Chunk, InterpretError, OpCode, Value, Vm, VmError};

#[test]
fn arithmetic_program_end_to_end() {
    // 3 + 4, negated: the program leaves exactly one value behind and
    // returns it.
    let mut chunk = Chunk::new();
    chunk.write_constant(Value::Number(3.0), 1);
    chunk.write_constant(Value::Number(4.0), 1);
    chunk.write_op(OpCode::Add, 1);
    chunk.write_op(OpCode::Negate, 1);
    chunk.write_op(OpCode::Return, 2);

    let mut vm = Vm::new();
    assert_eq!(vm.interpret(&chunk).unwrap(), Value::Number(-7.0));
    assert!(vm.stack().is_empty());
}

#[test]
fn three_hundred_constants_use_the_long_form() {
    let mut chunk = Chunk::new();
    for i in 0..300 {
        let index = chunk.write_constant(Value::Number(i as f64), 1).unwrap();
        assert_eq!(index, i);
    }
    chunk.write_op(OpCode::Return, 2);

    let mut vm = Vm::new();
    assert_eq!(vm.interpret(&chunk).unwrap(), Value::Number(299.0));
    for (i, value) in vm.stack().iter().enumerate() {
        assert_eq!(*value, Value::Number(i as f64));
    }
}

#[test]
fn type_mismatch_reports_context_and_preserves_stack() {
    let mut chunk = Chunk::new();
    let b = chunk.add_constant(Value::Bool(true));
    chunk.write_op(OpCode::Constant, 10);
    chunk.write(b as u8, 10);
    chunk.write_constant(Value::Number(1.0), 11);
    chunk.write_op(OpCode::Add, 12);

    let mut vm = Vm::new();
    let err = vm.interpret(&chunk).unwrap_err();
    let InterpretError::Runtime(e) = err else {
        panic!("expected a runtime error");
    };
    assert!(matches!(e.error, VmError::TypeMismatch { .. }));
    assert_eq!(e.line, 12);
    assert_eq!(e.offset, 6);
    // The report is human-readable and carries both coordinates.
    let rendered = e.to_string();
    assert!(rendered.contains("line 12"));
    assert!(rendered.contains("type mismatch"));
    // Neither operand was consumed by the failed add.
    assert_eq!(vm.stack().len(), 2);
}

#[test]
fn malformed_bytecode_is_rejected_before_running() {
    let mut chunk = Chunk::new();
    chunk.write_op(OpCode::Constant, 1);
    chunk.write(200, 1);

    let err = Vm::new().interpret(&chunk).unwrap_err();
    assert!(matches!(err, InterpretError::Compile(_)));
}

#[test]
fn thousand_interned_strings_survive_dropping_every_third() {
    let mut vm = Vm::new();
    let handles: Vec<_> = (0..1000)
        .map(|i| vm.intern(&format!("string-{}", i)).unwrap())
        .collect();

    // Root everything except every third string, then collect.
    for (i, &r) in handles.iter().enumerate() {
        if i % 3 != 0 {
            vm.push(Value::Obj(r));
        }
    }
    vm.collect_garbage();

    for (i, &r) in handles.iter().enumerate() {
        if i % 3 == 0 {
            assert!(vm.heap().get(r).is_none(), "string-{} should be freed", i);
        } else {
            assert_eq!(vm.heap().string(r).unwrap().text, format!("string-{}", i));
            // Survivors keep their interned identity.
            assert_eq!(vm.intern(&format!("string-{}", i)).unwrap(), r);
        }
    }
}

#[test]
fn config_file_drives_the_heap_limit() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "heap_limit = 256").unwrap();
    let config = RuntimeConfig::from_file(file.path()).unwrap();

    let mut vm = Vm::with_config(&config);
    let err = vm.intern(&"y".repeat(4096)).unwrap_err();
    assert!(matches!(err, VmError::OutOfMemory { .. }));
    // Recoverable: the same VM keeps working under the limit.
    assert!(vm.intern("fits").is_ok());
}

#[test]
fn globals_root_their_values_across_collections() {
    let mut vm = Vm::new();
    let s = vm.intern("held by a global").unwrap();
    vm.define_global("keeper", Value::Obj(s)).unwrap();

    vm.collect_garbage();
    vm.collect_garbage();

    assert_eq!(vm.global("keeper"), Some(Value::Obj(s)));
    assert_eq!(vm.heap().string(s).unwrap().text, "held by a global");
}
