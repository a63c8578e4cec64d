use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rpregs_client::{DeviceServer, MemoryMap, ServerConfig};
use rpregs_registers::seed_capabilities;
use tracing::{debug, info};

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_listening, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let read_timeout = args
        .idle_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;

    let mut memory = MemoryMap::new();
    seed_capabilities(&mut memory);

    let server = DeviceServer::bind(&args.bind)
        .map_err(|err| client_error("bind failed", err))?
        .with_memory(Arc::new(Mutex::new(memory)))
        .with_config(ServerConfig {
            read_timeout,
            max_sessions: args.sessions,
        });

    let addr = server.local_addr();
    install_ctrlc_handler(server.running_flag(), addr)?;
    info!(%addr, "simulated device listening");
    print_listening(addr, format);

    let sessions = server
        .serve_forever()
        .map_err(|err| client_error("serve failed", err))?;
    info!(sessions, "simulated device stopped");
    Ok(SUCCESS)
}

/// Clear the running flag, then connect once so a blocked accept returns.
fn install_ctrlc_handler(running: Arc<AtomicBool>, addr: SocketAddr) -> CliResult<()> {
    let wake = wake_address(addr);
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        let host = wake.ip().to_string();
        if let Err(err) = rpregs_transport::connect(&host, wake.port(), Duration::from_millis(500)) {
            debug!(error = %err, "wake-up connection failed");
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn wake_address(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        let loopback = match addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
        };
        SocketAddr::new(loopback, addr.port())
    } else {
        addr
    }
}
