//! Register access for networked DSP boards.
//!
//! rpregs moves raw 32-bit words to and from a board's memory-mapped
//! register space over a small binary TCP protocol, and converts them to
//! and from physical values (volts, degrees, Hz, filter cutoffs).
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP stream and listener with per-operation deadlines
//! - [`frame`]: 8-byte header codec, request encoding, framed reader/writer
//! - [`client`]: retrying memory client, memory bus, simulated device
//! - [`registers`]: codecs, register specs, module instances (behind the
//!   `registers` feature)

/// Re-export transport types.
pub mod transport {
    pub use rpregs_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rpregs_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use rpregs_client::*;
}

/// Re-export register types (requires `registers` feature).
#[cfg(feature = "registers")]
pub mod registers {
    pub use rpregs_registers::*;
}
