use tracing::debug;

use crate::cmd::{open_module, DeviceArgs, SetArgs};
use crate::exit::{codec_error, register_error, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

/// Writes the register, then prints the value read back from the device,
/// which shows any quantization or saturation.
pub fn run(args: SetArgs, device: &DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let mut module = open_module(device, &args.module)?;
    module
        .set_frequency_correction(args.frequency_correction)
        .map_err(|err| register_error("invalid --frequency-correction", err))?;

    let binding = module
        .binding(&args.register)
        .map_err(|err| register_error("set failed", err))?;
    let address = binding.absolute_address();
    let value = binding
        .spec()
        .codec()
        .parse(&args.value)
        .map_err(|err| codec_error("invalid value", err))?;

    debug!(module = %args.module, register = %args.register, %value, "setting register");
    module
        .set(&args.register, value)
        .map_err(|err| register_error("set failed", err))?;
    let actual = module
        .get(&args.register)
        .map_err(|err| register_error("read-back failed", err))?;

    print_value(&module, &args.register, address, &actual, format);
    Ok(SUCCESS)
}
