//! Several module instances sharing one in-memory bus.
//!
//! Run with:
//!   cargo run --example shared-bus
//!
//! Prints the raw words behind each register write, which shows bit-masked
//! registers sharing a word and the two-word layout of 64-bit registers.

use std::sync::{Arc, Mutex};

use rpregs::client::{MemoryMap, SharedBus};
use rpregs::registers::{seed_capabilities, Module, RegisterTables};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut map = MemoryMap::new();
    seed_capabilities(&mut map);
    let memory = Arc::new(Mutex::new(map));
    let bus: SharedBus = memory.clone();

    let tables = RegisterTables::builtin()?;
    let mut pid0 = Module::from_tables(&tables, "pid0", Arc::clone(&bus))?;
    let mut pid1 = Module::from_tables(&tables, "pid1", Arc::clone(&bus))?;
    let mut asg0 = Module::from_tables(&tables, "asg0", bus)?;

    pid0.set("input", "in1")?;
    pid0.set("setpoint", 0.1)?;
    pid0.set("p", 0.5)?;
    pid0.set("pause_gains", "pi")?;
    pid0.set("differential_mode_enabled", true)?;
    pid1.set("input", "pid0")?;
    pid1.set("setpoint", -0.1)?;
    asg0.set("trigger_source", "immediately")?;
    asg0.set("on", true)?;
    asg0.set("advanced_trigger_delay", 5_000_000_000u64)?;

    let memory = memory.lock().map_err(|_| "memory lock poisoned")?;
    for (addr, word) in memory.iter() {
        println!("{addr:#010x}: {word:#010x}");
    }
    Ok(())
}
