use rpregs_client::{shared, MemoryMap};
use rpregs_registers::{Module, RegisterTables};

use crate::cmd::RegistersArgs;
use crate::exit::{codec_error, register_error, CliResult, SUCCESS};
use crate::output::{print_registers, OutputFormat};

/// Lists a module's register map. Needs no device: the module is bound to
/// an empty in-memory bus.
pub fn run(args: RegistersArgs, format: OutputFormat) -> CliResult<i32> {
    let tables = RegisterTables::builtin().map_err(|err| codec_error("register tables", err))?;
    let module = Module::from_tables(&tables, &args.module, shared(MemoryMap::new()))
        .map_err(|err| register_error("registers failed", err))?;

    print_registers(&module, format);
    Ok(SUCCESS)
}
