use std::collections::HashMap;
use std::sync::{Arc, MutexGuard};

use rpregs_client::{MemoryBus, SharedBus};
use tracing::{debug, warn};

use crate::binding::AddressBinding;
use crate::codec::{join_words, split_words, Codec, CodecContext, FilterCodec, FilterGeometry};
use crate::error::{CodecError, RegisterError, Result};
use crate::register::{merge_words, RegisterSpec};
use crate::tables::{module_base, RegisterTables};
use crate::value::Value;

/// One device instance: a set of registers bound to a base address on a
/// shared memory bus.
///
/// Every operation holds the bus lock for its whole duration, so a
/// read-modify-write is not interleaved with other modules on the same bus.
/// It is still not atomic with respect to other writers of the device.
pub struct Module {
    name: String,
    base_address: u32,
    bindings: Vec<AddressBinding>,
    bus: SharedBus,
    frequency_correction: f64,
    /// Raw words of constant registers, by absolute address.
    constants: HashMap<u32, u64>,
}

impl Module {
    pub fn new(
        name: impl Into<String>,
        base_address: u32,
        registers: impl IntoIterator<Item = Arc<RegisterSpec>>,
        bus: SharedBus,
    ) -> Self {
        let bindings = registers
            .into_iter()
            .map(|spec| AddressBinding::new(base_address, spec))
            .collect();
        Self {
            name: name.into(),
            base_address,
            bindings,
            bus,
            frequency_correction: 1.0,
            constants: HashMap::new(),
        }
    }

    /// Build a named built-in module (`pid0`, `iq1`, `ams`, ...).
    pub fn from_tables(tables: &RegisterTables, name: &str, bus: SharedBus) -> Result<Self> {
        let (kind, base) =
            module_base(name).ok_or_else(|| RegisterError::UnknownModule(name.to_string()))?;
        let layout = tables
            .layout(kind)
            .ok_or_else(|| RegisterError::UnknownModule(name.to_string()))?;
        Ok(Self::new(name, base, layout.registers().iter().cloned(), bus))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    pub fn bindings(&self) -> &[AddressBinding] {
        &self.bindings
    }

    pub fn registers(&self) -> impl Iterator<Item = &RegisterSpec> {
        self.bindings.iter().map(|binding| binding.spec().as_ref())
    }

    pub fn binding(&self, name: &str) -> Result<&AddressBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.spec().name() == name)
            .ok_or_else(|| RegisterError::UnknownRegister {
                module: self.name.clone(),
                name: name.to_string(),
            })
    }

    pub fn frequency_correction(&self) -> f64 {
        self.frequency_correction
    }

    /// Calibrate frequency registers: actual clock / nominal clock.
    pub fn set_frequency_correction(&mut self, correction: f64) -> Result<()> {
        if !(correction.is_finite() && correction > 0.0) {
            return Err(CodecError::InvalidParameter(format!(
                "frequency correction must be positive, got {correction}"
            ))
            .into());
        }
        self.frequency_correction = correction;
        Ok(())
    }

    /// Forget cached constant registers; the next access reads the device.
    pub fn clear_constants(&mut self) {
        self.constants.clear();
    }

    pub fn read_word(&self, offset: u32) -> Result<u32> {
        Ok(self.lock()?.read_word(self.address(offset))?)
    }

    pub fn write_word(&self, offset: u32, word: u32) -> Result<()> {
        Ok(self.lock()?.write_word(self.address(offset), word)?)
    }

    pub fn read_words(&self, offset: u32, count: u16) -> Result<Vec<u32>> {
        Ok(self.lock()?.read_words(self.address(offset), count)?)
    }

    pub fn write_words(&self, offset: u32, words: &[u32]) -> Result<()> {
        Ok(self.lock()?.write_words(self.address(offset), words)?)
    }

    /// Read and decode a register.
    pub fn get(&mut self, name: &str) -> Result<Value> {
        let binding = self.binding(name)?.clone();
        let spec = binding.spec();
        let addr = binding.absolute_address();

        let bus = Arc::clone(&self.bus);
        let mut bus = lock(&bus)?;
        let ctx = self.context(&mut *bus, spec.codec())?;

        let constant = matches!(spec.codec(), Codec::Constant(_));
        let cached = if constant {
            self.constants.get(&addr).copied()
        } else {
            None
        };
        let raw = match cached {
            Some(raw) => raw,
            None => {
                let raw = read_raw(&mut *bus, addr, spec.words())?;
                if constant {
                    self.constants.insert(addr, raw);
                }
                raw
            }
        };
        let masked = spec.effective_mask().map_or(raw, |mask| raw & mask);
        Ok(spec.codec().decode(masked, &ctx)?)
    }

    /// Encode and write a register. Masked registers are read first and only
    /// their bits are replaced.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let binding = self.binding(name)?.clone();
        let spec = binding.spec();
        let addr = binding.absolute_address();

        let bus = Arc::clone(&self.bus);
        let mut bus = lock(&bus)?;
        let ctx = self.context(&mut *bus, spec.codec())?;

        let encoded = spec.codec().encode(&value, &ctx)?;
        if let Codec::Gain(gain) = spec.codec() {
            let report = gain.encode_report(value.as_f64().unwrap_or_default());
            if report.rounded_up {
                warn!(
                    module = %self.name,
                    register = spec.name(),
                    requested = %value,
                    actual = gain.decode(report.raw),
                    "gain would round to zero, using the smallest nonzero step"
                );
            }
            if report.saturated {
                warn!(
                    module = %self.name,
                    register = spec.name(),
                    requested = %value,
                    actual = gain.decode(report.raw),
                    "gain saturated at the register limit"
                );
            }
        }

        let words = match spec.effective_mask() {
            Some(mask) => {
                let current = bus.read_words(addr, word_count(spec))?;
                merge_words(&current, encoded, mask)
            }
            None => split_words(encoded, spec.words()),
        };
        bus.write_words(addr, &words)?;
        debug!(module = %self.name, register = spec.name(), addr, ?words, "register written");

        if matches!(spec.codec(), Codec::Constant(_)) {
            self.constants.remove(&addr);
        }
        Ok(())
    }

    /// All cutoffs a filter register can take on this device.
    pub fn valid_frequencies(&mut self, name: &str) -> Result<Vec<f64>> {
        let binding = self.binding(name)?.clone();
        let Codec::Filter(filter) = binding.spec().codec() else {
            return Err(CodecError::TypeMismatch {
                codec: binding.spec().codec().kind(),
                value: "a filter frequency query".to_string(),
            }
            .into());
        };
        let bus = Arc::clone(&self.bus);
        let mut bus = lock(&bus)?;
        let geometry = self.filter_geometry(&mut *bus, filter)?;
        Ok(filter.valid_frequencies(&geometry))
    }

    fn context(&mut self, bus: &mut (dyn MemoryBus + Send), codec: &Codec) -> Result<CodecContext> {
        let filter = match codec {
            Codec::Filter(filter) => Some(self.filter_geometry(bus, filter)?),
            _ => None,
        };
        Ok(CodecContext {
            frequency_correction: self.frequency_correction,
            filter,
        })
    }

    fn filter_geometry(
        &mut self,
        bus: &mut (dyn MemoryBus + Send),
        filter: &FilterCodec,
    ) -> Result<FilterGeometry> {
        let stages = self.constant_word(bus, filter.stages_offset)?;
        let shiftbits = self.constant_word(bus, filter.shiftbits_offset)?;
        let minbw = self.constant_word(bus, filter.minbw_offset)?;
        Ok(FilterGeometry::from_words(stages, shiftbits, minbw)?)
    }

    fn constant_word(&mut self, bus: &mut (dyn MemoryBus + Send), offset: u32) -> Result<u32> {
        let addr = self.address(offset);
        if let Some(raw) = self.constants.get(&addr) {
            return Ok(*raw as u32);
        }
        let word = bus.read_word(addr)?;
        self.constants.insert(addr, u64::from(word));
        Ok(word)
    }

    fn address(&self, offset: u32) -> u32 {
        self.base_address.wrapping_add(offset)
    }

    fn lock(&self) -> Result<MutexGuard<'_, dyn MemoryBus + Send + 'static>> {
        lock(&self.bus)
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("base_address", &format_args!("{:#010x}", self.base_address))
            .field("registers", &self.bindings.len())
            .field("frequency_correction", &self.frequency_correction)
            .finish()
    }
}

fn lock(bus: &SharedBus) -> Result<MutexGuard<'_, dyn MemoryBus + Send + 'static>> {
    bus.lock().map_err(|_| RegisterError::BusPoisoned)
}

fn read_raw(bus: &mut (dyn MemoryBus + Send), addr: u32, words: usize) -> Result<u64> {
    let count = u16::try_from(words).unwrap_or(u16::MAX);
    let words = bus.read_words(addr, count)?;
    Ok(join_words(&words))
}

fn word_count(spec: &RegisterSpec) -> u16 {
    u16::try_from(spec.words()).unwrap_or(u16::MAX)
}
