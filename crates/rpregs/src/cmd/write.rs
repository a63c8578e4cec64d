use crate::cmd::{open_client, DeviceArgs, WriteArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_written, OutputFormat};

pub fn run(args: WriteArgs, device: &DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = open_client(device)?;
    client
        .write_block(args.address, &args.words)
        .map_err(|err| client_error("write failed", err))?;
    client.close();

    print_written(args.address, args.words.len(), format);
    Ok(SUCCESS)
}
