use super::int::low_mask;
use crate::error::{CodecError, CodecResult};

/// Fixed-point number: `raw = round(value * norm)`, or `round(norm / value)`
/// when inverted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCodec {
    bits: u32,
    norm: f64,
    signed: bool,
    invert: bool,
}

/// Result of encoding with the adjustments that were applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedEncoding {
    pub raw: u64,
    /// The value would have rounded to zero; the smallest step was used.
    pub rounded_up: bool,
    /// The value was outside the representable range and got capped.
    pub saturated: bool,
}

impl FixedCodec {
    /// Signed two's-complement value of `bits` width.
    pub fn signed(bits: u32, norm: f64) -> CodecResult<Self> {
        Self::build(bits, norm, true)
    }

    /// Unsigned value of `bits` width; negative inputs lose their sign.
    pub fn unsigned(bits: u32, norm: f64) -> CodecResult<Self> {
        Self::build(bits, norm, false)
    }

    fn build(bits: u32, norm: f64, signed: bool) -> CodecResult<Self> {
        if !(1..=63).contains(&bits) {
            return Err(CodecError::InvalidParameter(format!(
                "fixed-point width must be 1..=63 bits, got {bits}"
            )));
        }
        if !norm.is_finite() || norm == 0.0 {
            return Err(CodecError::InvalidParameter(format!(
                "fixed-point norm must be finite and nonzero, got {norm}"
            )));
        }
        Ok(Self {
            bits,
            norm,
            signed,
            invert: false,
        })
    }

    /// Store the reciprocal: `raw = round(norm / value)`.
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// One quantization step on the physical side (non-inverted codecs).
    pub fn increment(&self) -> f64 {
        1.0 / self.norm
    }

    /// Smallest and largest raw integers before two's complement.
    fn raw_range(&self) -> (i64, i64) {
        if self.signed {
            let half = 1i64 << (self.bits - 1);
            (-half, half - 1)
        } else {
            (0, low_mask(self.bits) as i64)
        }
    }

    /// Largest representable physical value.
    pub fn max(&self) -> f64 {
        self.raw_range().1 as f64 / self.norm
    }

    /// Smallest representable physical value.
    pub fn min(&self) -> f64 {
        self.raw_range().0 as f64 / self.norm
    }

    pub fn encode(&self, value: f64) -> u64 {
        self.encode_report(value).raw
    }

    pub fn encode_report(&self, value: f64) -> FixedEncoding {
        let mut report = FixedEncoding {
            raw: 0,
            rounded_up: false,
            saturated: false,
        };
        if value.is_nan() || value == 0.0 {
            return report;
        }

        let scaled = if self.invert {
            self.norm / value
        } else {
            value * self.norm
        };
        let mut v = scaled.round();
        if v == 0.0 {
            v = value.signum();
            report.rounded_up = true;
        }
        if !self.signed {
            v = v.abs();
        }

        // Clamp as integers: past 53 bits the range ends are not exact in f64.
        // The float-to-int cast itself saturates at the i64 limits.
        let (lo, hi) = self.raw_range();
        let whole = v as i64;
        let clamped = whole.clamp(lo, hi);
        report.saturated = clamped != whole || whole as f64 != v;

        // Two's complement within the register width.
        report.raw = (clamped as u64) & low_mask(self.bits);
        report
    }

    pub fn decode(&self, raw: u64) -> f64 {
        let raw = raw & low_mask(self.bits);
        let v = if self.signed {
            let unused = 64 - self.bits;
            ((raw << unused) as i64) >> unused
        } else {
            raw as i64
        };

        if self.invert {
            if v == 0 {
                0.0
            } else {
                self.norm / v as f64
            }
        } else {
            v as f64 / self.norm
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voltage() -> FixedCodec {
        FixedCodec::signed(14, 8192.0).unwrap()
    }

    #[test]
    fn voltage_register_values() {
        let codec = voltage();
        assert_eq!(codec.encode(0.5), 4096);
        assert_eq!(codec.decode(4096), 0.5);
        assert_eq!(codec.encode(-1.0), (1 << 14) - 8192);
        assert_eq!(codec.decode(codec.encode(-1.0)), -1.0);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        let codec = voltage();
        let high = codec.encode_report(2.0);
        assert!(high.saturated);
        assert_eq!(high.raw, 8191);
        assert_eq!(codec.decode(high.raw), codec.max());

        let low = codec.encode_report(-5.0);
        assert!(low.saturated);
        assert_eq!(codec.decode(low.raw), -1.0);
    }

    #[test]
    fn quantization_bound() {
        let codec = voltage();
        let mut v = -0.999;
        while v < 0.999 {
            let back = codec.decode(codec.encode(v));
            assert!(
                (back - v).abs() <= codec.increment(),
                "v={v} decoded to {back}"
            );
            v += 0.0137;
        }
    }

    #[test]
    fn tiny_values_keep_their_sign() {
        let codec = FixedCodec::signed(24, 4096.0).unwrap();
        let up = codec.encode_report(1e-6);
        assert!(up.rounded_up);
        assert_eq!(up.raw, 1);

        let down = codec.encode_report(-1e-6);
        assert!(down.rounded_up);
        assert_eq!(codec.decode(down.raw), -1.0 / 4096.0);
    }

    #[test]
    fn unsigned_takes_absolute_value() {
        let codec = FixedCodec::unsigned(8, 10.0).unwrap();
        assert_eq!(codec.encode(-2.0), 20);
        assert_eq!(codec.encode(100.0), 255);
        assert_eq!(codec.decode(255), 25.5);
    }

    #[test]
    fn inverted_stores_reciprocal() {
        let codec = FixedCodec::unsigned(16, 1000.0).unwrap().inverted();
        assert_eq!(codec.encode(4.0), 250);
        assert_eq!(codec.decode(250), 4.0);
        assert_eq!(codec.encode(0.0), 0);
        assert_eq!(codec.decode(0), 0.0);
    }

    #[test]
    fn nan_encodes_to_zero() {
        assert_eq!(voltage().encode(f64::NAN), 0);
    }

    #[test]
    fn wide_signed_widths_saturate_to_their_own_ends() {
        for bits in [60, 63] {
            let codec = FixedCodec::signed(bits, 1.0).unwrap();
            let half = 1i64 << (bits - 1);

            let high = codec.encode_report(1e300);
            assert!(high.saturated, "bits={bits}");
            assert_eq!(high.raw, (half - 1) as u64, "bits={bits}");
            assert!(codec.decode(high.raw) > 0.0, "bits={bits}");

            let low = codec.encode_report(-1e300);
            assert!(low.saturated, "bits={bits}");
            assert_eq!(codec.decode(low.raw), -(half as f64), "bits={bits}");
        }
    }

    #[test]
    fn wide_signed_widths_decode_negative_words() {
        let codec = FixedCodec::signed(63, 1.0).unwrap();
        assert_eq!(codec.encode(-1.0), low_mask(63));
        assert_eq!(codec.decode(low_mask(63)), -1.0);
        assert_eq!(codec.decode(1 << 62), -(2f64.powi(62)));

        let unsigned = FixedCodec::unsigned(63, 1.0).unwrap();
        let top = unsigned.encode_report(1e300);
        assert!(top.saturated);
        assert_eq!(top.raw, low_mask(63));
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(FixedCodec::signed(0, 1.0).is_err());
        assert!(FixedCodec::signed(64, 1.0).is_err());
        assert!(FixedCodec::unsigned(8, 0.0).is_err());
    }
}
