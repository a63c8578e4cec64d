//! Command bytes of the remote memory protocol.

/// Request kind, carried in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Read `len` words starting at `addr`.
    Read,
    /// Write `len` words starting at `addr`.
    Write,
    /// End the session. The device closes the connection.
    Close,
}

impl Command {
    /// Wire representation.
    pub const fn as_byte(self) -> u8 {
        match self {
            Command::Read => b'r',
            Command::Write => b'w',
            Command::Close => b'c',
        }
    }

    /// Parse a command byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'r' => Some(Command::Read),
            b'w' => Some(Command::Write),
            b'c' => Some(Command::Close),
            _ => None,
        }
    }

    /// Returns a human-readable name for the command.
    pub const fn name(self) -> &'static str {
        match self {
            Command::Read => "READ",
            Command::Write => "WRITE",
            Command::Close => "CLOSE",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
