mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, DeviceArgs};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "rpregs", version, about = "DSP board register access CLI")]
struct Cli {
    #[command(flatten)]
    device: DeviceArgs,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, &cli.device, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_read_with_global_device_flags() {
        let cli = Cli::try_parse_from([
            "rpregs",
            "read",
            "0x40300104",
            "--count",
            "4",
            "--host",
            "rp-f0a235.local",
            "--port",
            "2223",
        ])
        .expect("read args should parse");

        assert_eq!(cli.device.host, "rp-f0a235.local");
        assert_eq!(cli.device.port, 2223);
        match cli.command {
            Command::Read(args) => {
                assert_eq!(args.address, 0x4030_0104);
                assert_eq!(args.count, 4);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn set_accepts_negative_values() {
        let cli = Cli::try_parse_from(["rpregs", "set", "pid0", "setpoint", "-0.25"])
            .expect("negative value should parse");
        assert!(matches!(cli.command, Command::Set(args) if args.value == "-0.25"));
    }

    #[test]
    fn write_requires_words() {
        let err = Cli::try_parse_from(["rpregs", "write", "0x100"])
            .expect_err("missing words should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_bad_address() {
        let err = Cli::try_parse_from(["rpregs", "read", "0xZZ"])
            .expect_err("bad address should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
