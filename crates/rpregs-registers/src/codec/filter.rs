use std::f64::consts::PI;

use super::frequency::CLOCK_FREQUENCY;
use crate::error::{CodecError, CodecResult};

/// Bits per stage in the packed word.
const STAGE_BITS: u32 = 8;
const STAGE_ON: u64 = 1 << 7;
const STAGE_HIGHPASS: u64 = 1 << 6;
const SHIFT_FIELD: u64 = 0x3F;
/// Stages that fit in one 32-bit register.
pub const MAX_STAGES: u32 = 4;

/// Cascade of first-order low/highpass filters packed into one word.
///
/// The stage count, shift width and minimum bandwidth are device
/// capabilities; the codec only records the register offsets (relative to
/// the module base) where the device reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterCodec {
    pub stages_offset: u32,
    pub shiftbits_offset: u32,
    pub minbw_offset: u32,
}

/// Device-reported shape of a filter cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterGeometry {
    stages: u32,
    shiftbits: u32,
    min_bandwidth: f64,
}

impl FilterGeometry {
    pub fn new(stages: u32, shiftbits: u32, min_bandwidth: f64) -> CodecResult<Self> {
        if !(min_bandwidth.is_finite() && min_bandwidth > 0.0) {
            return Err(CodecError::InvalidParameter(format!(
                "minimum filter bandwidth must be positive, got {min_bandwidth}"
            )));
        }
        if stages > MAX_STAGES {
            return Err(CodecError::InvalidParameter(format!(
                "device reports {stages} filter stages, at most {MAX_STAGES} fit one word"
            )));
        }
        if shiftbits > 6 {
            return Err(CodecError::InvalidParameter(format!(
                "device reports {shiftbits} shift bits, the stage layout has 6"
            )));
        }
        Ok(Self {
            stages,
            shiftbits,
            min_bandwidth,
        })
    }

    /// Build from the three raw capability words.
    pub fn from_words(stages: u32, shiftbits: u32, minbw: u32) -> CodecResult<Self> {
        Self::new(stages, shiftbits, f64::from(minbw))
    }

    pub fn stages(&self) -> u32 {
        self.stages
    }

    pub fn shiftbits(&self) -> u32 {
        self.shiftbits
    }

    pub fn min_bandwidth(&self) -> f64 {
        self.min_bandwidth
    }

    /// Fractional bits of the filter coefficient: `ceil(log2(clock / min_bw))`.
    pub fn alphabits(&self) -> u32 {
        (CLOCK_FREQUENCY / self.min_bandwidth).log2().ceil().max(0.0) as u32
    }

    /// Largest shift the device accepts.
    pub fn max_shift(&self) -> u32 {
        (1u32 << self.shiftbits) - 1
    }

    /// Cutoff of an enabled lowpass stage with the given shift.
    pub fn cutoff(&self, shift: u32) -> f64 {
        2f64.powi(shift as i32) / 2f64.powi(self.alphabits() as i32) * CLOCK_FREQUENCY / (2.0 * PI)
    }

    /// Nearest achievable shift for a cutoff magnitude.
    pub fn shift_for(&self, cutoff: f64) -> u32 {
        let exact =
            (cutoff.abs() * 2.0 * PI / CLOCK_FREQUENCY * 2f64.powi(self.alphabits() as i32)).log2();
        if exact.is_nan() {
            return 0;
        }
        exact.round().clamp(0.0, f64::from(self.max_shift())) as u32
    }
}

impl FilterCodec {
    pub fn new(stages_offset: u32, shiftbits_offset: u32, minbw_offset: u32) -> Self {
        Self {
            stages_offset,
            shiftbits_offset,
            minbw_offset,
        }
    }

    /// One cutoff per device stage; 0 for bypassed stages, negative for
    /// highpass.
    pub fn decode(&self, raw: u64, geometry: &FilterGeometry) -> Vec<f64> {
        (0..geometry.stages())
            .map(|i| {
                let stage = (raw >> (i * STAGE_BITS)) & 0xFF;
                if stage & STAGE_ON == 0 {
                    return 0.0;
                }
                let shift = (stage & SHIFT_FIELD & u64::from(geometry.max_shift())) as u32;
                let cutoff = geometry.cutoff(shift);
                if stage & STAGE_HIGHPASS != 0 {
                    -cutoff
                } else {
                    cutoff
                }
            })
            .collect()
    }

    /// Stages beyond the device's count are ignored; missing ones are
    /// bypassed.
    pub fn encode(&self, cutoffs: &[f64], geometry: &FilterGeometry) -> u64 {
        cutoffs
            .iter()
            .take(geometry.stages() as usize)
            .enumerate()
            .filter(|(_, cutoff)| **cutoff != 0.0 && !cutoff.is_nan())
            .fold(0u64, |raw, (i, cutoff)| {
                let mut stage = STAGE_ON | u64::from(geometry.shift_for(*cutoff));
                if *cutoff < 0.0 {
                    stage |= STAGE_HIGHPASS;
                }
                raw | (stage << (i as u32 * STAGE_BITS))
            })
    }

    /// Every achievable cutoff, sorted: highpass, bypass, lowpass.
    pub fn valid_frequencies(&self, geometry: &FilterGeometry) -> Vec<f64> {
        let positive: Vec<f64> = (0..=geometry.max_shift())
            .map(|shift| geometry.cutoff(shift))
            .collect();
        positive
            .iter()
            .rev()
            .map(|f| -f)
            .chain(std::iter::once(0.0))
            .chain(positive.iter().copied())
            .collect()
    }
}
