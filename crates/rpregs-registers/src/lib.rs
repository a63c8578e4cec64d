//! Typed registers of the DSP board.
//!
//! A [`RegisterSpec`] pairs an offset with a [`Codec`] that converts between
//! physical values (volts, degrees, Hz, option names) and raw words. Specs
//! are shared per module kind; a [`Module`] binds them to one instance's
//! base address and moves the words over a [`rpregs_client::SharedBus`].
//!
//! ```no_run
//! use rpregs_client::{connect, shared};
//! use rpregs_registers::{Module, RegisterTables};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = shared(connect("rp-f0a235.local", 2222)?);
//! let tables = RegisterTables::builtin()?;
//! let mut pid0 = Module::from_tables(&tables, "pid0", bus)?;
//! pid0.set("setpoint", 0.25)?;
//! println!("{}", pid0.get("setpoint")?);
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod codec;
pub mod error;
pub mod module;
pub mod register;
pub mod tables;
pub mod value;

pub use binding::AddressBinding;
pub use codec::{Codec, CodecContext};
pub use error::{CodecError, CodecResult, RegisterError, Result};
pub use module::Module;
pub use register::{merge_words, RegisterSpec};
pub use tables::{module_base, module_names, seed_capabilities, ModuleKind, ModuleLayout, RegisterTables};
pub use value::Value;
