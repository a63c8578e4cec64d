use crate::cmd::{open_module, DeviceArgs, GetArgs};
use crate::exit::{register_error, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

pub fn run(args: GetArgs, device: &DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let mut module = open_module(device, &args.module)?;
    module
        .set_frequency_correction(args.frequency_correction)
        .map_err(|err| register_error("invalid --frequency-correction", err))?;

    let address = module
        .binding(&args.register)
        .map_err(|err| register_error("get failed", err))?
        .absolute_address();
    let value = module
        .get(&args.register)
        .map_err(|err| register_error("get failed", err))?;

    print_value(&module, &args.register, address, &value, format);
    Ok(SUCCESS)
}
