//! Conversions between physical register values and raw words.
//!
//! Every codec is a pure function pair over a raw `u64` of known width.
//! Device-dependent inputs (frequency calibration, filter geometry) are
//! passed in through [`CodecContext`].

mod filter;
mod fixed;
mod flag;
mod frequency;
mod int;
mod phase;
mod pwm;
mod select;

pub use filter::{FilterCodec, FilterGeometry, MAX_STAGES};
pub use fixed::{FixedCodec, FixedEncoding};
pub use flag::BoolCodec;
pub use frequency::{FrequencyCodec, CLOCK_FREQUENCY};
pub use int::{join_words, split_words, IntCodec};
pub use phase::{phase_distance, PhaseCodec};
pub use pwm::PwmCodec;
pub use select::{SelectCodec, SelectTable};

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Device-instance inputs some codecs need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecContext {
    /// Actual clock / nominal clock.
    pub frequency_correction: f64,
    /// Geometry of the filter cascade being accessed, if any.
    pub filter: Option<FilterGeometry>,
}

impl Default for CodecContext {
    fn default() -> Self {
        Self {
            frequency_correction: 1.0,
            filter: None,
        }
    }
}

impl CodecContext {
    fn geometry(&self) -> CodecResult<&FilterGeometry> {
        self.filter.as_ref().ok_or_else(|| {
            CodecError::InvalidParameter("filter geometry has not been read from the device".into())
        })
    }
}

/// All register encodings.
#[derive(Debug, Clone)]
pub enum Codec {
    /// Unsigned integer in one word.
    Int(IntCodec),
    /// Unsigned integer spanning consecutive words.
    Long(IntCodec),
    /// Read-only integer, read once per device instance.
    Constant(IntCodec),
    Bool(BoolCodec),
    Select(SelectCodec),
    Float(FixedCodec),
    /// Fixed-point gain; setters warn about round-off and saturation.
    Gain(FixedCodec),
    Phase(PhaseCodec),
    Frequency(FrequencyCodec),
    Filter(FilterCodec),
    Pwm(PwmCodec),
}

impl Codec {
    /// Short name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Codec::Int(_) => "int",
            Codec::Long(_) => "long",
            Codec::Constant(_) => "constant",
            Codec::Bool(_) => "bool",
            Codec::Select(_) => "select",
            Codec::Float(_) => "float",
            Codec::Gain(_) => "gain",
            Codec::Phase(_) => "phase",
            Codec::Frequency(_) => "frequency",
            Codec::Filter(_) => "filter",
            Codec::Pwm(_) => "pwm",
        }
    }

    /// Number of 32-bit words the register spans.
    pub fn words(&self) -> usize {
        match self {
            Codec::Int(int) | Codec::Long(int) | Codec::Constant(int) => int.words(),
            _ => 1,
        }
    }

    /// Mask implied by the codec itself (a bool owns only its bit).
    pub fn implicit_mask(&self) -> Option<u64> {
        match self {
            Codec::Bool(flag) => Some(flag.mask()),
            _ => None,
        }
    }

    pub fn encode(&self, value: &Value, ctx: &CodecContext) -> CodecResult<u64> {
        let mismatch = || CodecError::TypeMismatch {
            codec: self.kind(),
            value: format!("{} {value}", value.kind()),
        };
        match self {
            Codec::Int(int) | Codec::Long(int) | Codec::Constant(int) => {
                value.as_u64().map(|v| int.encode(v)).ok_or_else(mismatch)
            }
            Codec::Bool(flag) => value.as_bool().map(|b| flag.encode(b)).ok_or_else(mismatch),
            Codec::Select(select) => select.encode(value.as_str().ok_or_else(mismatch)?),
            Codec::Float(fixed) | Codec::Gain(fixed) => {
                value.as_f64().map(|v| fixed.encode(v)).ok_or_else(mismatch)
            }
            Codec::Phase(phase) => value.as_f64().map(|v| phase.encode(v)).ok_or_else(mismatch),
            Codec::Frequency(freq) => value
                .as_f64()
                .map(|v| freq.encode(v, ctx.frequency_correction))
                .ok_or_else(mismatch),
            Codec::Filter(filter) => {
                let cutoffs = value.as_filter().ok_or_else(mismatch)?;
                Ok(filter.encode(&cutoffs, ctx.geometry()?))
            }
            Codec::Pwm(pwm) => value.as_f64().map(|v| pwm.encode(v)).ok_or_else(mismatch),
        }
    }

    pub fn decode(&self, raw: u64, ctx: &CodecContext) -> CodecResult<Value> {
        Ok(match self {
            Codec::Int(int) | Codec::Long(int) | Codec::Constant(int) => {
                Value::Int(int.decode(raw))
            }
            Codec::Bool(flag) => Value::Bool(flag.decode(raw)),
            Codec::Select(select) => Value::Select(select.decode(raw)?),
            Codec::Float(fixed) | Codec::Gain(fixed) => Value::Float(fixed.decode(raw)),
            Codec::Phase(phase) => Value::Float(phase.decode(raw)),
            Codec::Frequency(freq) => Value::Float(freq.decode(raw, ctx.frequency_correction)),
            Codec::Filter(filter) => Value::Filter(filter.decode(raw, ctx.geometry()?)),
            Codec::Pwm(pwm) => Value::Float(pwm.decode(raw)),
        })
    }

    /// Parse a textual value into the kind this codec accepts.
    ///
    /// Integers take decimal or `0x` hex; bools take `true/false`, `on/off`
    /// or `1/0`; filters take comma-separated cutoffs.
    pub fn parse(&self, text: &str) -> CodecResult<Value> {
        let text = text.trim();
        let mismatch = || CodecError::TypeMismatch {
            codec: self.kind(),
            value: format!("'{text}'"),
        };
        match self {
            Codec::Int(_) | Codec::Long(_) | Codec::Constant(_) => {
                parse_u64(text).map(Value::Int).ok_or_else(mismatch)
            }
            Codec::Bool(_) => match text.to_ascii_lowercase().as_str() {
                "true" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(mismatch()),
            },
            Codec::Select(_) => Ok(Value::Select(text.to_string())),
            Codec::Float(_)
            | Codec::Gain(_)
            | Codec::Phase(_)
            | Codec::Frequency(_)
            | Codec::Pwm(_) => text.parse().map(Value::Float).map_err(|_| mismatch()),
            Codec::Filter(_) => text
                .split(',')
                .map(|part| part.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Filter)
                .map_err(|_| mismatch()),
        }
    }

    /// Human-readable parameters, for register listings.
    pub fn describe(&self) -> String {
        match self {
            Codec::Int(int) | Codec::Long(int) | Codec::Constant(int) => {
                format!("{} bits", int.bits())
            }
            Codec::Bool(flag) if flag.is_inverted() => format!("bit {}, inverted", flag.bit()),
            Codec::Bool(flag) => format!("bit {}", flag.bit()),
            Codec::Select(select) => select.table().names().join("|"),
            Codec::Float(fixed) | Codec::Gain(fixed) => format!(
                "{} bits {}, step {:e}",
                fixed.bits(),
                if fixed.is_signed() { "signed" } else { "unsigned" },
                fixed.increment()
            ),
            Codec::Phase(phase) => format!("{} bits, step {:e} deg", phase.bits(), phase.increment()),
            Codec::Frequency(freq) => {
                format!("{} bits, step {:e} Hz", freq.bits(), freq.increment())
            }
            Codec::Filter(filter) => format!(
                "stages @{:#x}, shift @{:#x}, min bw @{:#x}",
                filter.stages_offset, filter.shiftbits_offset, filter.minbw_offset
            ),
            Codec::Pwm(pwm) => format!("0..{} V, step {:e} V", pwm.max_voltage(), pwm.increment()),
        }
    }
}

fn parse_u64(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16).ok(),
        None => text.replace('_', "").parse().ok(),
    }
}
