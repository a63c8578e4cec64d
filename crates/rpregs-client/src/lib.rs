//! Remote memory access for a networked DSP board.
//!
//! This is the session layer. [`RemoteMemoryClient`] speaks the binary
//! read/write protocol over TCP with per-operation deadlines, a bounded retry
//! budget, and reconnection through an injected [`Reconnector`]. Everything
//! that needs words from the device goes through the [`MemoryBus`] trait, so
//! register code runs unchanged against the real board, the in-memory
//! [`MemoryMap`], or the simulated [`DeviceServer`].

pub mod bus;
pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod reconnect;
pub mod server;

pub use bus::{shared, MemoryBus, MemoryMap, SharedBus};
pub use client::RemoteMemoryClient;
pub use config::{ClientConfig, DesyncRecovery, DEFAULT_PORT};
pub use connector::{connect, connect_with_config};
pub use error::{ClientError, Result};
pub use reconnect::{PortRequest, PortSequence, Reconnector};
pub use server::{DeviceServer, ServerConfig, SessionStats};
