use crate::codec::{Codec, SelectTable};
use crate::error::{CodecError, CodecResult};

/// A typed field at a fixed offset in a module's address space.
///
/// Specs describe a register class and carry no per-device state. Modules of
/// the same kind share one spec through an `Arc`.
#[derive(Debug, Clone)]
pub struct RegisterSpec {
    name: String,
    address: u32,
    codec: Codec,
    bitmask: Option<u64>,
    doc: Option<String>,
}

impl RegisterSpec {
    pub fn new(name: impl Into<String>, address: u32, codec: Codec) -> Self {
        Self {
            name: name.into(),
            address,
            codec,
            bitmask: None,
            doc: None,
        }
    }

    /// Restrict reads and writes to the bits in `mask`.
    pub fn with_bitmask(mut self, mask: u64) -> Self {
        self.bitmask = Some(mask);
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset relative to the module base.
    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn bitmask(&self) -> Option<u64> {
        self.bitmask
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Explicit bitmask, else the mask the codec implies.
    pub fn effective_mask(&self) -> Option<u64> {
        self.bitmask.or_else(|| self.codec.implicit_mask())
    }

    pub fn words(&self) -> usize {
        self.codec.words()
    }

    /// Replace the option table of a select register.
    pub fn set_options(&self, table: SelectTable) -> CodecResult<()> {
        match &self.codec {
            Codec::Select(select) => {
                select.set_table(table);
                Ok(())
            }
            other => Err(CodecError::TypeMismatch {
                codec: other.kind(),
                value: "an option table".to_string(),
            }),
        }
    }
}

/// Combine the current register words with an encoded value under `mask`.
///
/// Word `i` keeps the bits outside `(mask >> 32 * i) & 0xFFFF_FFFF`.
pub fn merge_words(current: &[u32], encoded: u64, mask: u64) -> Vec<u32> {
    current
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let shift = 32 * i as u32;
            let (local_mask, local_value) = if shift >= 64 {
                (0, 0)
            } else {
                (
                    ((mask >> shift) & 0xFFFF_FFFF) as u32,
                    ((encoded >> shift) & 0xFFFF_FFFF) as u32,
                )
            };
            (word & !local_mask) | (local_value & local_mask)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BoolCodec, IntCodec, SelectCodec};

    #[test]
    fn merge_preserves_unmasked_bits() {
        assert_eq!(merge_words(&[0xFFFF_0000], 0x1234, 0xFFFF), vec![0xFFFF_1234]);
        assert_eq!(merge_words(&[0xFFFF_FFFF], 0, 0b100), vec![0xFFFF_FFFB]);
    }

    #[test]
    fn merge_applies_mask_per_word() {
        let merged = merge_words(&[0xAAAA_AAAA, 0xBBBB_BBBB], 0x0000_0001_0000_0002, 0xF_0000_000F);
        assert_eq!(merged, vec![0xAAAA_AAA2, 0xBBBB_BBB1]);
    }

    #[test]
    fn bool_register_masks_its_bit() {
        let spec = RegisterSpec::new("on", 0x100, Codec::Bool(BoolCodec::new(1)));
        assert_eq!(spec.effective_mask(), Some(0b10));

        let explicit = RegisterSpec::new("mode", 0x100, Codec::Int(IntCodec::word())).with_bitmask(0x7);
        assert_eq!(explicit.effective_mask(), Some(0x7));

        let plain = RegisterSpec::new("led", 0x30, Codec::Int(IntCodec::word()));
        assert_eq!(plain.effective_mask(), None);
    }

    #[test]
    fn set_options_only_on_select() {
        let select = RegisterSpec::new(
            "input",
            0,
            Codec::Select(SelectCodec::new(SelectTable::new([("a", 0)]).unwrap())),
        );
        select
            .set_options(SelectTable::new([("b", 1)]).unwrap())
            .unwrap();
        match select.codec() {
            Codec::Select(codec) => assert_eq!(codec.encode("b").unwrap(), 1),
            other => panic!("unexpected codec {other:?}"),
        }

        let int = RegisterSpec::new("led", 0x30, Codec::Int(IntCodec::word()));
        assert!(int.set_options(SelectTable::new([("b", 1)]).unwrap()).is_err());
    }
}
