use super::int::low_mask;
use crate::error::{CodecError, CodecResult};

/// Phase in degrees as a fraction of a full turn over `bits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCodec {
    bits: u32,
    invert: bool,
}

impl PhaseCodec {
    pub fn new(bits: u32) -> CodecResult<Self> {
        if !(1..=63).contains(&bits) {
            return Err(CodecError::InvalidParameter(format!(
                "phase width must be 1..=63 bits, got {bits}"
            )));
        }
        Ok(Self { bits, invert: false })
    }

    /// The register counts phase in the opposite direction.
    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    fn steps(&self) -> f64 {
        (1u64 << self.bits) as f64
    }

    /// One quantization step in degrees.
    pub fn increment(&self) -> f64 {
        360.0 / self.steps()
    }

    pub fn encode(&self, degrees: f64) -> u64 {
        if !degrees.is_finite() {
            return 0;
        }
        let degrees = if self.invert { -degrees } else { degrees };
        let turns = degrees.rem_euclid(360.0) / 360.0;
        // A value just below 360 rounds up to a full turn, which wraps to 0.
        ((turns * self.steps()).round() as u64) & low_mask(self.bits)
    }

    /// Decoded phases lie in `[0, 360)`.
    pub fn decode(&self, raw: u64) -> f64 {
        let phase = (raw & low_mask(self.bits)) as f64 / self.steps() * 360.0;
        if self.invert {
            (-phase).rem_euclid(360.0)
        } else {
            phase
        }
    }
}

/// Distance between two phases on the circle, in degrees.
pub fn phase_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_modulo_full_turn() {
        let codec = PhaseCodec::new(32).unwrap();
        let back = codec.decode(codec.encode(370.0));
        assert!((back - 10.0).abs() <= codec.increment() / 2.0, "got {back}");

        let back = codec.decode(codec.encode(-90.0));
        assert!((back - 270.0).abs() <= codec.increment() / 2.0, "got {back}");
    }

    #[test]
    fn quantization_bound() {
        for bits in [14, 30, 32] {
            let codec = PhaseCodec::new(bits).unwrap();
            let mut v = 0.0;
            while v < 720.0 {
                let back = codec.decode(codec.encode(v));
                assert!(
                    phase_distance(back, v) <= codec.increment() / 2.0 + 1e-9,
                    "bits={bits} v={v} back={back}"
                );
                v += 7.31;
            }
        }
    }

    #[test]
    fn quarter_turn_layout() {
        let codec = PhaseCodec::new(32).unwrap();
        assert_eq!(codec.encode(90.0), 1 << 30);
        assert_eq!(codec.decode(1 << 31), 180.0);
        assert_eq!(codec.encode(359.999_999_999_9), 0);
    }

    #[test]
    fn inverted_negates() {
        let codec = PhaseCodec::new(32).unwrap().inverted();
        assert_eq!(codec.encode(90.0), 3 << 30);
        let back = codec.decode(codec.encode(45.0));
        assert!(phase_distance(back, 45.0) < 1e-6);
    }
}
