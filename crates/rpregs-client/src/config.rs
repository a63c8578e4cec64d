use std::time::Duration;

/// Port the device's memory server listens on by default.
pub const DEFAULT_PORT: u16 = 2222;

/// What to do with the stream after a response header failed to echo the
/// request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DesyncRecovery {
    /// Close the socket and open a fresh one.
    #[default]
    Reconnect,
    /// Keep the socket, read and discard until it has been silent for
    /// `quiet` or `budget` bytes were dropped. Falls back to reconnecting if
    /// draining fails.
    Drain { budget: usize, quiet: Duration },
}

/// Configuration for [`RemoteMemoryClient`](crate::RemoteMemoryClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for each connect, send and receive.
    pub timeout: Duration,
    /// Attempts per read or write before giving up.
    pub max_attempts: u32,
    /// Connection attempts made while constructing the client.
    pub connect_attempts: u32,
    /// Desync handling policy.
    pub desync: DesyncRecovery,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            max_attempts: 5,
            connect_attempts: 5,
            desync: DesyncRecovery::default(),
        }
    }
}
