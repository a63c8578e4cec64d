use super::int::low_mask;
use crate::error::{CodecError, CodecResult};

/// FPGA clock the frequency words are referenced to, in Hz.
pub const CLOCK_FREQUENCY: f64 = 125e6;

/// Frequency in Hz as a phase increment per clock cycle.
///
/// The calibration `correction` (actual clock / nominal clock) is supplied
/// per device at encode/decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyCodec {
    bits: u32,
}

impl FrequencyCodec {
    pub fn new(bits: u32) -> CodecResult<Self> {
        if !(1..=63).contains(&bits) {
            return Err(CodecError::InvalidParameter(format!(
                "frequency width must be 1..=63 bits, got {bits}"
            )));
        }
        Ok(Self { bits })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    fn steps(&self) -> f64 {
        (1u64 << self.bits) as f64
    }

    /// One quantization step in Hz at nominal clock.
    pub fn increment(&self) -> f64 {
        CLOCK_FREQUENCY / self.steps()
    }

    /// Highest meaningful frequency (Nyquist).
    pub fn max(&self) -> f64 {
        CLOCK_FREQUENCY / 2.0
    }

    pub fn encode(&self, hz: f64, correction: f64) -> u64 {
        let value = (hz / correction).abs();
        if !value.is_finite() {
            return if value.is_nan() { 0 } else { low_mask(self.bits) };
        }
        let raw = (value / CLOCK_FREQUENCY * self.steps()).round();
        if raw == 0.0 && value > 0.0 {
            return 1;
        }
        // Saturate at the register width.
        (raw as u64).min(low_mask(self.bits))
    }

    pub fn decode(&self, raw: u64, correction: f64) -> f64 {
        (raw & low_mask(self.bits)) as f64 * CLOCK_FREQUENCY / self.steps() * correction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_megahertz_roundtrip() {
        let codec = FrequencyCodec::new(32).unwrap();
        let back = codec.decode(codec.encode(1e6, 1.0), 1.0);
        assert!((back - 1e6).abs() < 0.1, "got {back}");
    }

    #[test]
    fn quantization_bound() {
        let codec = FrequencyCodec::new(30).unwrap();
        for hz in [0.5, 13.0, 1234.5, 2.5e6, 31.25e6, 60e6] {
            let back = codec.decode(codec.encode(hz, 1.0), 1.0);
            assert!(
                (back - hz).abs() <= codec.increment() / 2.0 + 1e-9,
                "hz={hz} back={back}"
            );
        }
    }

    #[test]
    fn sub_step_values_stay_nonzero() {
        let codec = FrequencyCodec::new(14).unwrap();
        assert_eq!(codec.encode(1.0, 1.0), 1);
        assert_eq!(codec.encode(0.0, 1.0), 0);
    }

    #[test]
    fn sign_is_ignored_and_width_saturates() {
        let codec = FrequencyCodec::new(14).unwrap();
        assert_eq!(codec.encode(-1e6, 1.0), codec.encode(1e6, 1.0));
        assert_eq!(codec.encode(1e12, 1.0), (1 << 14) - 1);
    }

    #[test]
    fn correction_scales_both_ways() {
        let codec = FrequencyCodec::new(32).unwrap();
        let raw = codec.encode(1e6, 1.01);
        assert!(raw < codec.encode(1e6, 1.0));
        let back = codec.decode(raw, 1.01);
        assert!((back - 1e6).abs() < 0.1);
    }
}
