//! TCP transport abstraction for talking to a networked DSP board.
//!
//! Provides a blocking stream type with per-operation deadlines and a
//! listener used by the simulated device server.
//!
//! This is the lowest layer of rpregs. Everything else builds on top of
//! the [`DeviceStream`] type provided here.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{connect, DeviceListener};
pub use traits::DeviceStream;
