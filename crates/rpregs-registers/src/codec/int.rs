use crate::error::{CodecError, CodecResult};

/// Unsigned integer of `bits` width, spanning `ceil(bits / 32)` words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntCodec {
    bits: u32,
}

impl IntCodec {
    pub fn new(bits: u32) -> CodecResult<Self> {
        if !(1..=64).contains(&bits) {
            return Err(CodecError::InvalidParameter(format!(
                "integer width must be 1..=64 bits, got {bits}"
            )));
        }
        Ok(Self { bits })
    }

    /// A full 32-bit word.
    pub const fn word() -> Self {
        Self { bits: 32 }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Largest representable value.
    pub fn max(&self) -> u64 {
        low_mask(self.bits)
    }

    /// Number of 32-bit words the value occupies.
    pub fn words(&self) -> usize {
        self.bits.div_ceil(32) as usize
    }

    /// Saturates at the largest representable value.
    pub fn encode(&self, value: u64) -> u64 {
        value.min(self.max())
    }

    pub fn decode(&self, raw: u64) -> u64 {
        raw & self.max()
    }
}

/// `2^bits - 1`, valid for 0..=64.
pub(crate) fn low_mask(bits: u32) -> u64 {
    match bits {
        0 => 0,
        64.. => u64::MAX,
        _ => (1u64 << bits) - 1,
    }
}

/// Split a raw value into little-endian 32-bit words.
pub fn split_words(raw: u64, count: usize) -> Vec<u32> {
    (0..count)
        .map(|i| {
            let shift = 32 * i as u32;
            if shift >= 64 {
                0
            } else {
                ((raw >> shift) & 0xFFFF_FFFF) as u32
            }
        })
        .collect()
}

/// Join little-endian 32-bit words; word `i` contributes `word << 32 * i`.
pub fn join_words(words: &[u32]) -> u64 {
    words
        .iter()
        .take(2)
        .enumerate()
        .fold(0u64, |acc, (i, word)| acc | (u64::from(*word) << (32 * i)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturates_at_width() {
        let codec = IntCodec::new(8).unwrap();
        assert_eq!(codec.encode(300), 255);
        assert_eq!(codec.encode(17), 17);
        assert_eq!(codec.decode(0x1_23), 0x23);
    }

    #[test]
    fn roundtrip_within_range() {
        for bits in [1, 13, 32, 33, 64] {
            let codec = IntCodec::new(bits).unwrap();
            for v in [0, 1, codec.max() / 3, codec.max()] {
                assert_eq!(codec.decode(codec.encode(v)), v, "bits={bits} v={v}");
            }
        }
    }

    #[test]
    fn word_counts() {
        assert_eq!(IntCodec::new(14).unwrap().words(), 1);
        assert_eq!(IntCodec::new(32).unwrap().words(), 1);
        assert_eq!(IntCodec::new(33).unwrap().words(), 2);
        assert_eq!(IntCodec::new(64).unwrap().words(), 2);
    }

    #[test]
    fn rejects_bad_widths() {
        assert!(IntCodec::new(0).is_err());
        assert!(IntCodec::new(65).is_err());
    }

    #[test]
    fn long_value_split_least_significant_first() {
        let raw = 0x1_0000_0005u64;
        assert_eq!(split_words(raw, 2), vec![0x5, 0x1]);
        assert_eq!(join_words(&[0x5, 0x1]), raw);
    }
}
