use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rpregs_frame::{FrameConfig, FrameError, FrameReader, FrameWriter, Header, Request};
use rpregs_transport::{DeviceListener, DeviceStream};
use tracing::{debug, info, warn};

use crate::bus::{MemoryBus, MemoryMap};
use crate::error::{ClientError, Result};

/// Configuration for the simulated device.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Idle deadline per session; `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Stop after this many sessions; `None` serves until stopped.
    pub max_sessions: Option<usize>,
}

/// What one client session did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub reads: u64,
    pub writes: u64,
    /// The client ended the session with a close message (rather than EOF).
    pub closed_cleanly: bool,
}

/// Simulated device: serves the memory protocol against an in-memory word map.
///
/// One client is served at a time; further connections wait in the
/// listener's backlog.
pub struct DeviceServer {
    listener: DeviceListener,
    memory: Arc<Mutex<MemoryMap>>,
    config: ServerConfig,
    running: Arc<AtomicBool>,
}

impl DeviceServer {
    /// Bind to a TCP address (`"127.0.0.1:0"` picks a free port).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = DeviceListener::bind(addr)?;
        Ok(Self {
            listener,
            memory: Arc::new(Mutex::new(MemoryMap::new())),
            config: ServerConfig::default(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Serve an existing memory map instead of an empty one.
    pub fn with_memory(mut self, memory: Arc<Mutex<MemoryMap>>) -> Self {
        self.memory = memory;
        self
    }

    /// Override server config.
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle to the served memory.
    pub fn memory(&self) -> Arc<Mutex<MemoryMap>> {
        Arc::clone(&self.memory)
    }

    /// Flag that keeps [`DeviceServer::serve_forever`] running. Clearing it
    /// stops the server after the current session or the next accept.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn port(&self) -> u16 {
        self.listener.port()
    }

    /// Accept connections and serve them one after another until the running
    /// flag is cleared or the session limit is reached.
    pub fn serve_forever(&self) -> Result<usize> {
        let mut sessions = 0usize;
        while self.running.load(Ordering::SeqCst) {
            if self
                .config
                .max_sessions
                .is_some_and(|max| sessions >= max)
            {
                break;
            }

            let stream = self.listener.accept()?;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            sessions += 1;

            match self.serve_stream(stream) {
                Ok(stats) => debug!(?stats, "session finished"),
                Err(err) => warn!(error = %err, "session ended with error"),
            }
        }
        info!(sessions, "device server stopped");
        Ok(sessions)
    }

    /// Accept and serve exactly one session.
    pub fn serve_one(&self) -> Result<SessionStats> {
        let stream = self.listener.accept()?;
        self.serve_stream(stream)
    }

    fn serve_stream(&self, stream: DeviceStream) -> Result<SessionStats> {
        let peer = stream.peer_addr();
        let reader_stream = stream.try_clone()?;

        let frame_config = FrameConfig {
            read_timeout: self.config.read_timeout,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_device(reader_stream, frame_config.clone())?;
        let mut writer = FrameWriter::with_config_device(stream, frame_config)?;
        let mut stats = SessionStats::default();
        debug!(?peer, "serving session");

        loop {
            let request = match reader.read_request() {
                Ok(request) => request,
                Err(FrameError::ConnectionClosed) => break,
                Err(err) => return Err(err.into()),
            };

            match request {
                Request::Read { addr, len } => {
                    let words = self.lock_memory()?.read_words(addr, len)?;
                    writer.send_read_response(addr, &words)?;
                    stats.reads += 1;
                }
                Request::Write { addr, words } => {
                    self.lock_memory()?.write_words(addr, &words)?;
                    let header = Header::write(addr, rpregs_frame::word_count(words.len())?);
                    writer.send_ack(&header)?;
                    stats.writes += 1;
                }
                Request::Close => {
                    stats.closed_cleanly = true;
                    break;
                }
            }
        }

        writer.get_ref().shutdown();
        Ok(stats)
    }

    fn lock_memory(&self) -> Result<std::sync::MutexGuard<'_, MemoryMap>> {
        self.memory
            .lock()
            .map_err(|_| ClientError::Connection("device memory lock poisoned".to_string()))
    }
}
