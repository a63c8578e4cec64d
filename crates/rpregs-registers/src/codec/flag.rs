/// A single bit inside a word. Writes only touch that bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoolCodec {
    bit: u32,
    invert: bool,
}

impl BoolCodec {
    pub fn new(bit: u32) -> Self {
        Self {
            bit: bit.min(63),
            invert: false,
        }
    }

    /// Bit set means `false`.
    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }

    pub fn bit(&self) -> u32 {
        self.bit
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// The bit this codec owns.
    pub fn mask(&self) -> u64 {
        1u64 << self.bit
    }

    pub fn encode(&self, value: bool) -> u64 {
        u64::from(value != self.invert) << self.bit
    }

    pub fn decode(&self, raw: u64) -> bool {
        ((raw >> self.bit) & 1 == 1) != self.invert
    }
}
