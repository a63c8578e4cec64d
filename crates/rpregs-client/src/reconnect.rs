use std::collections::VecDeque;

/// Source of a fresh server port after a connection failed.
///
/// On the real board a failed session usually means the memory server was
/// restarted, possibly on another port; the implementor knows how to bring it
/// back (e.g. restart it over ssh) and reports where it now listens.
/// Returning `None` means no server can be provided, which aborts the
/// operation.
pub trait Reconnector: Send {
    fn get_port(&mut self) -> Option<u16>;
}

impl<F> Reconnector for F
where
    F: FnMut() -> Option<u16> + Send,
{
    fn get_port(&mut self) -> Option<u16> {
        self()
    }
}

/// Where the client should connect first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRequest {
    /// Use this port.
    Fixed(u16),
    /// Ask the reconnector before the first connection.
    New,
}

/// A reconnector that hands out ports from a fixed list, then gives up.
#[derive(Debug, Clone, Default)]
pub struct PortSequence {
    ports: VecDeque<u16>,
}

impl PortSequence {
    pub fn new(ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            ports: ports.into_iter().collect(),
        }
    }

    /// A reconnector that always returns `port`.
    pub fn repeat(port: u16) -> impl Reconnector {
        move || Some(port)
    }

    /// Ports not handed out yet.
    pub fn remaining(&self) -> usize {
        self.ports.len()
    }
}

impl Reconnector for PortSequence {
    fn get_port(&mut self) -> Option<u16> {
        self.ports.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_runs_dry() {
        let mut seq = PortSequence::new([10, 20]);
        assert_eq!(seq.get_port(), Some(10));
        assert_eq!(seq.remaining(), 1);
        assert_eq!(seq.get_port(), Some(20));
        assert_eq!(seq.get_port(), None);
    }

    #[test]
    fn closures_are_reconnectors() {
        let mut calls = 0;
        let mut recon = move || {
            calls += 1;
            (calls < 3).then_some(4000 + calls)
        };
        assert_eq!(Reconnector::get_port(&mut recon), Some(4001));
        assert_eq!(Reconnector::get_port(&mut recon), Some(4002));
        assert_eq!(Reconnector::get_port(&mut recon), None);

        let mut fixed = PortSequence::repeat(7);
        assert_eq!(fixed.get_port(), Some(7));
        assert_eq!(fixed.get_port(), Some(7));
    }
}
