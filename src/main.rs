use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ember::config::RuntimeConfig;
use ember::vm::{Chunk, InterpretError, OpCode, Value, Vm, debug};

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "A bytecode virtual machine", long_about = None)]
struct Cli {
    /// Load runtime configuration from a TOML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a disassembly of the chunk before running it
    #[arg(long)]
    disasm: bool,

    /// Print GC statistics after the run
    #[arg(long)]
    gc_stats: bool,

    /// Hard heap limit in bytes
    #[arg(long)]
    heap_limit: Option<usize>,

    /// Disable the garbage collector
    #[arg(long)]
    no_gc: bool,
}

/// The built-in demonstration program: -((1.2 + 3.4) / 5.6). The front end
/// that produces chunks lives outside this crate, so the binary runs a
/// fixed chunk exercising every opcode family.
fn demo_chunk() -> Chunk {
    let mut chunk = Chunk::new();
    chunk.write_constant(Value::Number(1.2), 1);
    chunk.write_constant(Value::Number(3.4), 1);
    chunk.write_op(OpCode::Add, 1);
    chunk.write_constant(Value::Number(5.6), 2);
    chunk.write_op(OpCode::Divide, 2);
    chunk.write_op(OpCode::Negate, 2);
    chunk.write_op(OpCode::Return, 3);
    chunk
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match RuntimeConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ember: {}", e);
                return ExitCode::from(2);
            }
        },
        None => RuntimeConfig::default(),
    };
    if let Some(limit) = cli.heap_limit {
        config.heap_limit = Some(limit);
    }
    if cli.no_gc {
        config.gc_enabled = false;
    }
    if cli.gc_stats {
        config.gc_stats = true;
    }

    let chunk = demo_chunk();
    if cli.disasm {
        print!("{}", debug::disassemble_chunk(&chunk, "demo"));
    }

    let mut vm = Vm::with_config(&config);
    match vm.interpret(&chunk) {
        Ok(value) => {
            println!("{}", value);
            if config.gc_stats {
                let stats = vm.gc_stats();
                eprintln!(
                    "gc: {} cycles, total pause {:?}, max pause {:?}",
                    stats.cycles, stats.total_pause, stats.max_pause
                );
            }
            ExitCode::SUCCESS
        }
        Err(InterpretError::Compile(e)) => {
            eprintln!("ember: {}", e);
            ExitCode::from(65)
        }
        Err(InterpretError::Runtime(e)) => {
            eprintln!("ember: {}", e);
            ExitCode::from(70)
        }
    }
}
