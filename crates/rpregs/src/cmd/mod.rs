use std::time::Duration;

use clap::{Args, Subcommand};
use rpregs_client::{
    connect_with_config, shared, ClientConfig, PortRequest, RemoteMemoryClient, DEFAULT_PORT,
};
use rpregs_registers::{Module, RegisterTables};

use crate::exit::{client_error, codec_error, register_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod get;
pub mod read;
pub mod registers;
pub mod serve;
pub mod set;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read raw words from device memory.
    Read(ReadArgs),
    /// Write raw words to device memory.
    Write(WriteArgs),
    /// Read and decode a module register.
    Get(GetArgs),
    /// Encode and write a module register.
    Set(SetArgs),
    /// List the registers of a module.
    Registers(RegistersArgs),
    /// Run a simulated device serving an in-memory register space.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, device: &DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Read(args) => read::run(args, device, format),
        Command::Write(args) => write::run(args, device, format),
        Command::Get(args) => get::run(args, device, format),
        Command::Set(args) => set::run(args, device, format),
        Command::Registers(args) => registers::run(args, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where the device is and how long to wait for it.
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Device host name or address.
    #[arg(long, env = "RPREGS_HOST", default_value = "127.0.0.1", global = true)]
    pub host: String,
    /// Memory server port.
    #[arg(long, env = "RPREGS_PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,
    /// Deadline per request (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s", global = true)]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Start address (decimal or 0x hex).
    #[arg(value_parser = parse_u32)]
    pub address: u32,
    /// Number of consecutive words.
    #[arg(long, short = 'n', default_value_t = 1)]
    pub count: u32,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Start address (decimal or 0x hex).
    #[arg(value_parser = parse_u32)]
    pub address: u32,
    /// Words to write, in order.
    #[arg(required = true, num_args = 1.., value_parser = parse_u32)]
    pub words: Vec<u32>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Module instance (e.g. pid0, iq1, ams).
    pub module: String,
    /// Register name.
    pub register: String,
    /// Clock calibration for frequency registers (actual / nominal).
    #[arg(long, default_value_t = 1.0)]
    pub frequency_correction: f64,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Module instance (e.g. pid0, iq1, ams).
    pub module: String,
    /// Register name.
    pub register: String,
    /// New value: a number, true/false, an option name, or comma-separated
    /// filter cutoffs.
    #[arg(allow_hyphen_values = true)]
    pub value: String,
    /// Clock calibration for frequency registers (actual / nominal).
    #[arg(long, default_value_t = 1.0)]
    pub frequency_correction: f64,
}

#[derive(Args, Debug)]
pub struct RegistersArgs {
    /// Module instance (e.g. pid0, iq1, ams).
    pub module: String,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:2222")]
    pub bind: String,
    /// Stop after this many client sessions.
    #[arg(long)]
    pub sessions: Option<usize>,
    /// Close idle sessions after this long (e.g. 30s).
    #[arg(long)]
    pub idle_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open a client to the device named by the global flags.
pub(crate) fn open_client(device: &DeviceArgs) -> CliResult<RemoteMemoryClient> {
    let config = ClientConfig {
        timeout: parse_duration(&device.timeout)?,
        ..ClientConfig::default()
    };
    connect_with_config(&device.host, PortRequest::Fixed(device.port), config, None)
        .map_err(|err| client_error("connect failed", err))
}

/// Connect and build a named module on the device.
pub(crate) fn open_module(device: &DeviceArgs, name: &str) -> CliResult<Module> {
    let tables = RegisterTables::builtin().map_err(|err| codec_error("register tables", err))?;
    // Unknown names fail before connecting.
    if rpregs_registers::module_base(name).is_none() {
        return Err(register_error(
            "unknown module",
            rpregs_registers::RegisterError::UnknownModule(name.to_string()),
        ));
    }
    let client = open_client(device)?;
    Module::from_tables(&tables, name, shared(client))
        .map_err(|err| register_error("module setup failed", err))
}

pub(crate) fn parse_u32(input: &str) -> Result<u32, String> {
    let input = input.trim().replace('_', "");
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid 32-bit value '{input}': {err}"))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
