//! Run a simulated board and drive its iq0 module over the wire protocol.
//!
//! Run with:
//!   cargo run --example simulated-device
//!
//! The same calls work against a real board; replace the server with the
//! board's address.

use std::sync::{Arc, Mutex};
use std::thread;

use rpregs::client::{connect, shared, DeviceServer, MemoryMap, ServerConfig};
use rpregs::registers::{seed_capabilities, Module, RegisterTables};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut memory = MemoryMap::new();
    seed_capabilities(&mut memory);

    let server = DeviceServer::bind("127.0.0.1:0")?
        .with_memory(Arc::new(Mutex::new(memory)))
        .with_config(ServerConfig {
            max_sessions: Some(1),
            ..ServerConfig::default()
        });
    let port = server.port();
    let device = thread::spawn(move || server.serve_forever());
    eprintln!("Simulated device on port {port}");

    let tables = RegisterTables::builtin()?;
    let bus = shared(connect("127.0.0.1", port)?);
    let mut iq0 = Module::from_tables(&tables, "iq0", bus)?;

    iq0.set("frequency", 25e6)?;
    iq0.set("phase", 45.0)?;
    iq0.set("on", true)?;
    iq0.set("output_signal", "quadrature")?;
    let bandwidth = iq0.valid_frequencies("bandwidth")?;
    if let Some(widest) = bandwidth.last() {
        iq0.set("bandwidth", vec![*widest, *widest])?;
    }

    for name in ["frequency", "phase", "on", "output_signal", "bandwidth"] {
        println!("iq0.{name} = {}", iq0.get(name)?);
    }

    drop(iq0);
    let sessions = device.join().map_err(|_| "device thread panicked")??;
    eprintln!("Device served {sessions} session(s)");
    Ok(())
}
