use super::int::low_mask;
use crate::error::{CodecError, CodecResult};

/// Dithered PWM output voltage.
///
/// The register holds a coarse duty cycle in the top `pwm_bits` bits and a
/// dither pattern in the low `cfg_bits - pwm_bits` bits. The output voltage
/// is `max * (coarse + ones(dither) / dither_bits) / 2^pwm_bits`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PwmCodec {
    cfg_bits: u32,
    pwm_bits: u32,
    max_voltage: f64,
}

impl Default for PwmCodec {
    fn default() -> Self {
        Self {
            cfg_bits: 24,
            pwm_bits: 8,
            max_voltage: 1.8,
        }
    }
}

impl PwmCodec {
    pub fn new(cfg_bits: u32, pwm_bits: u32, max_voltage: f64) -> CodecResult<Self> {
        if pwm_bits == 0 || cfg_bits <= pwm_bits || cfg_bits > 32 {
            return Err(CodecError::InvalidParameter(format!(
                "pwm layout needs 0 < pwm bits < config bits <= 32, got {pwm_bits}/{cfg_bits}"
            )));
        }
        if !(max_voltage.is_finite() && max_voltage > 0.0) {
            return Err(CodecError::InvalidParameter(format!(
                "pwm full-scale voltage must be positive, got {max_voltage}"
            )));
        }
        Ok(Self {
            cfg_bits,
            pwm_bits,
            max_voltage,
        })
    }

    pub fn max_voltage(&self) -> f64 {
        self.max_voltage
    }

    fn dither_bits(&self) -> u32 {
        self.cfg_bits - self.pwm_bits
    }

    /// Voltage of one dither bit.
    pub fn increment(&self) -> f64 {
        self.max_voltage / 2f64.powi(self.pwm_bits as i32) / f64::from(self.dither_bits())
    }

    pub fn decode(&self, raw: u64) -> f64 {
        let dither_bits = self.dither_bits();
        let coarse = (raw >> dither_bits) & low_mask(self.pwm_bits);
        let ones = (raw & low_mask(dither_bits)).count_ones();
        let duty = coarse as f64 + f64::from(ones) / f64::from(dither_bits);
        self.max_voltage * duty / 2f64.powi(self.pwm_bits as i32)
    }

    /// Negative voltages clamp to 0; the dither ones are spread evenly across
    /// the pattern.
    pub fn encode(&self, voltage: f64) -> u64 {
        let dither_bits = self.dither_bits();
        let voltage = if voltage.is_nan() { 0.0 } else { voltage.max(0.0) };
        let x = voltage / self.max_voltage * 2f64.powi(self.pwm_bits as i32);

        let high = x.floor().min(low_mask(self.pwm_bits) as f64);
        let low = ((x - high) * f64::from(dither_bits))
            .round()
            .clamp(0.0, f64::from(dither_bits)) as u32;

        let dither = (0..low).fold(0u64, |acc, k| acc | 1 << (k * dither_bits / low));
        ((high as u64) << dither_bits) | dither
    }
}
