use crate::cmd::{open_client, DeviceArgs, ReadArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_words, OutputFormat};

pub fn run(args: ReadArgs, device: &DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = open_client(device)?;
    let words = client
        .read_block(args.address, args.count as usize)
        .map_err(|err| client_error("read failed", err))?;
    client.close();

    print_words(args.address, &words, format);
    Ok(SUCCESS)
}
