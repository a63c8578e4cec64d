use std::sync::Arc;

use crate::register::RegisterSpec;

/// A register spec resolved against one module instance's base address.
#[derive(Debug, Clone)]
pub struct AddressBinding {
    base_address: u32,
    spec: Arc<RegisterSpec>,
}

impl AddressBinding {
    pub fn new(base_address: u32, spec: Arc<RegisterSpec>) -> Self {
        Self { base_address, spec }
    }

    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    pub fn spec(&self) -> &Arc<RegisterSpec> {
        &self.spec
    }

    /// `base + offset`, wrapping in the 32-bit address space.
    pub fn absolute_address(&self) -> u32 {
        self.base_address.wrapping_add(self.spec.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, IntCodec};

    #[test]
    fn instances_resolve_independently() {
        let spec = Arc::new(RegisterSpec::new("setpoint", 0x104, Codec::Int(IntCodec::word())));
        let pid0 = AddressBinding::new(0x4030_0000, Arc::clone(&spec));
        let pid1 = AddressBinding::new(0x4031_0000, spec);
        assert_eq!(pid0.absolute_address(), 0x4030_0104);
        assert_eq!(pid1.absolute_address(), 0x4031_0104);
    }

    #[test]
    fn wraps_at_top_of_address_space() {
        let spec = Arc::new(RegisterSpec::new("x", 0x10, Codec::Int(IntCodec::word())));
        assert_eq!(AddressBinding::new(0xFFFF_FFF8, spec).absolute_address(), 0x8);
    }
}
