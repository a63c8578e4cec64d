use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use rpregs_frame::WORD_SIZE;

use crate::client::RemoteMemoryClient;
use crate::error::{ClientError, Result};

/// Word-addressed access to a device's flat memory space.
///
/// Addresses are byte addresses; word `i` of a multi-word access lives at
/// `addr + 4 * i`.
pub trait MemoryBus {
    fn read_words(&mut self, addr: u32, count: u16) -> Result<Vec<u32>>;

    fn write_words(&mut self, addr: u32, words: &[u32]) -> Result<()>;

    fn read_word(&mut self, addr: u32) -> Result<u32> {
        let words = self.read_words(addr, 1)?;
        words
            .first()
            .copied()
            .ok_or(ClientError::ShortResponse {
                expected: 1,
                received: words.len(),
            })
    }

    fn write_word(&mut self, addr: u32, word: u32) -> Result<()> {
        self.write_words(addr, &[word])
    }
}

/// A bus shared between device instances. Every operation on a
/// module holds the lock for its full duration.
pub type SharedBus = Arc<Mutex<dyn MemoryBus + Send>>;

/// Wrap a bus for sharing.
pub fn shared(bus: impl MemoryBus + Send + 'static) -> SharedBus {
    Arc::new(Mutex::new(bus))
}

impl MemoryBus for RemoteMemoryClient {
    fn read_words(&mut self, addr: u32, count: u16) -> Result<Vec<u32>> {
        self.read(addr, count)
    }

    fn write_words(&mut self, addr: u32, words: &[u32]) -> Result<()> {
        self.write(addr, words)
    }
}

/// Sparse in-memory word space.
///
/// Words never written read back as the fill value (0 unless configured).
#[derive(Debug, Clone, Default)]
pub struct MemoryMap {
    words: BTreeMap<u32, u32>,
    fill: u32,
    reads: u64,
    writes: u64,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `fill` for words that were never written.
    pub fn with_fill(mut self, fill: u32) -> Self {
        self.fill = fill;
        self
    }

    /// Seed consecutive words starting at `addr`.
    pub fn with_words(mut self, addr: u32, words: &[u32]) -> Self {
        self.store(addr, words);
        self
    }

    /// Current value of the word at `addr`.
    pub fn get(&self, addr: u32) -> u32 {
        self.words.get(&addr).copied().unwrap_or(self.fill)
    }

    /// Store consecutive words starting at `addr` without counting a write.
    pub fn store(&mut self, addr: u32, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.words.insert(word_addr(addr, i), *word);
        }
    }

    /// Words explicitly written so far, in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.words.iter().map(|(addr, word)| (*addr, *word))
    }

    /// Number of distinct words written.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Read requests served.
    pub fn read_count(&self) -> u64 {
        self.reads
    }

    /// Write requests served.
    pub fn write_count(&self) -> u64 {
        self.writes
    }
}

impl MemoryBus for MemoryMap {
    fn read_words(&mut self, addr: u32, count: u16) -> Result<Vec<u32>> {
        self.reads += 1;
        Ok((0..usize::from(count))
            .map(|i| self.get(word_addr(addr, i)))
            .collect())
    }

    fn write_words(&mut self, addr: u32, words: &[u32]) -> Result<()> {
        self.writes += 1;
        self.store(addr, words);
        Ok(())
    }
}

impl<B: MemoryBus + ?Sized> MemoryBus for Box<B> {
    fn read_words(&mut self, addr: u32, count: u16) -> Result<Vec<u32>> {
        (**self).read_words(addr, count)
    }

    fn write_words(&mut self, addr: u32, words: &[u32]) -> Result<()> {
        (**self).write_words(addr, words)
    }
}

fn word_addr(base: u32, index: usize) -> u32 {
    base.wrapping_add((index * WORD_SIZE) as u32)
}
