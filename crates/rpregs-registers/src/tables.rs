//! Built-in register maps of the DSP board's modules.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use rpregs_client::MemoryMap;

use crate::codec::{
    BoolCodec, Codec, FilterCodec, FixedCodec, FrequencyCodec, IntCodec, PhaseCodec, PwmCodec,
    SelectCodec, SelectTable,
};
use crate::error::CodecResult;
use crate::register::RegisterSpec;

/// Base of the first DSP module; module `n` sits `n * DSP_STRIDE` above.
pub const DSP_BASE: u32 = 0x4030_0000;
pub const DSP_STRIDE: u32 = 0x1_0000;
pub const HOUSEKEEPING_BASE: u32 = 0x4000_0000;
pub const ASG_BASE: u32 = 0x4020_0000;
pub const AMS_BASE: u32 = 0x4040_0000;

/// Filter capability registers of the pid input filter.
const PID_FILTER: FilterCodec = FilterCodec {
    stages_offset: 0x220,
    shiftbits_offset: 0x224,
    minbw_offset: 0x228,
};

/// Filter capability registers of the iq demodulator.
const IQ_FILTER: FilterCodec = FilterCodec {
    stages_offset: 0x230,
    shiftbits_offset: 0x234,
    minbw_offset: 0x238,
};

/// Routing codes of the DSP multiplexer, by source module.
const DSP_INPUTS: [(&str, u64); 16] = [
    ("pid0", 0),
    ("pid1", 1),
    ("pid2", 2),
    ("pid3", 3),
    ("iir", 4),
    ("iq0", 5),
    ("iq1", 6),
    ("iq2", 7),
    ("asg0", 8),
    ("asg1", 9),
    ("in1", 10),
    ("in2", 11),
    ("out1", 12),
    ("out2", 13),
    ("iq2_2", 14),
    ("off", 15),
];

/// Named module instances and where they live.
static MODULES: [(&str, ModuleKind, u32); 10] = [
    ("hk", ModuleKind::Housekeeping, HOUSEKEEPING_BASE),
    ("asg0", ModuleKind::Asg, ASG_BASE),
    ("pid0", ModuleKind::Pid, dsp_base(0)),
    ("pid1", ModuleKind::Pid, dsp_base(1)),
    ("pid2", ModuleKind::Pid, dsp_base(2)),
    ("pid3", ModuleKind::Pid, dsp_base(3)),
    ("iq0", ModuleKind::Iq, dsp_base(5)),
    ("iq1", ModuleKind::Iq, dsp_base(6)),
    ("iq2", ModuleKind::Iq, dsp_base(7)),
    ("ams", ModuleKind::Ams, AMS_BASE),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Housekeeping,
    Asg,
    Pid,
    Iq,
    Ams,
}

impl ModuleKind {
    pub fn name(self) -> &'static str {
        match self {
            ModuleKind::Housekeeping => "hk",
            ModuleKind::Asg => "asg",
            ModuleKind::Pid => "pid",
            ModuleKind::Iq => "iq",
            ModuleKind::Ams => "ams",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Base address of DSP module `index`.
pub const fn dsp_base(index: u32) -> u32 {
    DSP_BASE + index * DSP_STRIDE
}

/// Kind and base address of a named module instance.
pub fn module_base(name: &str) -> Option<(ModuleKind, u32)> {
    MODULES
        .iter()
        .find(|(candidate, _, _)| *candidate == name)
        .map(|(_, kind, base)| (*kind, *base))
}

/// Names of all built-in module instances.
pub fn module_names() -> impl Iterator<Item = &'static str> {
    MODULES.iter().map(|(name, _, _)| *name)
}

/// The registers of one module kind.
#[derive(Debug, Clone)]
pub struct ModuleLayout {
    kind: ModuleKind,
    registers: Vec<Arc<RegisterSpec>>,
}

impl ModuleLayout {
    pub fn new(kind: ModuleKind, registers: Vec<Arc<RegisterSpec>>) -> Self {
        Self { kind, registers }
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn registers(&self) -> &[Arc<RegisterSpec>] {
        &self.registers
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RegisterSpec>> {
        self.registers.iter().find(|spec| spec.name() == name)
    }
}

/// One shared layout per module kind.
///
/// Modules built from the same tables share register specs, so replacing
/// the options of a select register is seen by every instance.
#[derive(Debug, Clone)]
pub struct RegisterTables {
    layouts: Vec<ModuleLayout>,
}

impl RegisterTables {
    pub fn builtin() -> CodecResult<Self> {
        let dsp = dsp_registers()?;
        let with_dsp = |own: Vec<RegisterSpec>| -> Vec<Arc<RegisterSpec>> {
            dsp.iter()
                .cloned()
                .chain(own.into_iter().map(Arc::new))
                .collect()
        };

        let layouts = vec![
            ModuleLayout::new(ModuleKind::Housekeeping, shared(housekeeping_registers()?)),
            ModuleLayout::new(ModuleKind::Asg, shared(asg_registers()?)),
            ModuleLayout::new(ModuleKind::Pid, with_dsp(pid_registers()?)),
            ModuleLayout::new(ModuleKind::Iq, with_dsp(iq_registers()?)),
            ModuleLayout::new(ModuleKind::Ams, shared(ams_registers()?)),
        ];
        Ok(Self { layouts })
    }

    pub fn layout(&self, kind: ModuleKind) -> Option<&ModuleLayout> {
        self.layouts.iter().find(|layout| layout.kind == kind)
    }

    pub fn layouts(&self) -> &[ModuleLayout] {
        &self.layouts
    }
}

/// Seed the capability registers a real board reports, so simulated
/// devices can serve filter registers.
pub fn seed_capabilities(memory: &mut MemoryMap) {
    for &(_, kind, base) in MODULES.iter() {
        let filter = match kind {
            ModuleKind::Pid => (PID_FILTER, [4, 2, 1]),
            ModuleKind::Iq => (IQ_FILTER, [2, 2, 1]),
            _ => continue,
        };
        let (codec, [stages, shiftbits, minbw]) = filter;
        memory.store(base.wrapping_add(codec.stages_offset), &[stages]);
        memory.store(base.wrapping_add(codec.shiftbits_offset), &[shiftbits]);
        memory.store(base.wrapping_add(codec.minbw_offset), &[minbw]);
    }
}

fn shared(specs: Vec<RegisterSpec>) -> Vec<Arc<RegisterSpec>> {
    specs.into_iter().map(Arc::new).collect()
}

fn select(options: &[(&str, u64)]) -> CodecResult<Codec> {
    Ok(Codec::Select(SelectCodec::new(SelectTable::new(
        options.iter().copied(),
    )?)))
}

fn constant(name: &str, address: u32, doc: &str) -> RegisterSpec {
    RegisterSpec::new(name, address, Codec::Constant(IntCodec::word())).with_doc(doc)
}

fn filter_capabilities(filter: FilterCodec) -> [RegisterSpec; 3] {
    [
        constant("filter_stages", filter.stages_offset, "Number of filter stages"),
        constant("filter_shiftbits", filter.shiftbits_offset, "Width of the stage shift field"),
        constant("filter_minbw", filter.minbw_offset, "Smallest filter bandwidth in Hz"),
    ]
}

fn dsp_registers() -> CodecResult<Vec<Arc<RegisterSpec>>> {
    Ok(shared(vec![
        RegisterSpec::new("input", 0x0, select(&DSP_INPUTS)?).with_doc("Input signal source"),
        RegisterSpec::new(
            "output_direct",
            0x4,
            select(&[("off", 0), ("out1", 1), ("out2", 2), ("both", 3)])?,
        )
        .with_doc("Analog outputs the signal is added to"),
        RegisterSpec::new("out1_saturated", 0x8, Codec::Bool(BoolCodec::new(0)))
            .with_doc("Output 1 is saturated"),
        RegisterSpec::new("out2_saturated", 0x8, Codec::Bool(BoolCodec::new(1)))
            .with_doc("Output 2 is saturated"),
    ]))
}

fn pid_registers() -> CodecResult<Vec<RegisterSpec>> {
    let voltage = || FixedCodec::signed(14, 8192.0);
    let mut registers = vec![
        RegisterSpec::new("setpoint", 0x104, Codec::Float(voltage()?)).with_doc("Setpoint in V"),
        RegisterSpec::new("p", 0x108, Codec::Gain(FixedCodec::signed(24, 4096.0)?))
            .with_doc("Proportional gain"),
        RegisterSpec::new(
            "i",
            0x10C,
            Codec::Gain(FixedCodec::signed(24, 2f64.powi(32) * 2.0 * PI * 8e-9)?),
        )
        .with_doc("Integral unity-gain frequency in Hz"),
        RegisterSpec::new("min_voltage", 0x124, Codec::Float(voltage()?))
            .with_doc("Lower output limit in V"),
        RegisterSpec::new("max_voltage", 0x128, Codec::Float(voltage()?))
            .with_doc("Upper output limit in V"),
        RegisterSpec::new(
            "pause_gains",
            0x12C,
            select(&[
                ("off", 0),
                ("i", 1),
                ("p", 2),
                ("pi", 3),
                ("d", 4),
                ("id", 5),
                ("pd", 6),
                ("pid", 7),
            ])?,
        )
        .with_bitmask(0b111)
        .with_doc("Gains frozen while paused"),
        RegisterSpec::new(
            "differential_mode_enabled",
            0x12C,
            Codec::Bool(BoolCodec::new(3)),
        ),
        RegisterSpec::new("paused", 0xC, Codec::Bool(BoolCodec::new(0).inverted()))
            .with_doc("Integrator and gains are frozen"),
        RegisterSpec::new("inputfilter", 0x120, Codec::Filter(PID_FILTER))
            .with_doc("Input filter cutoffs in Hz, negative for highpass"),
    ];
    registers.extend(filter_capabilities(PID_FILTER));
    Ok(registers)
}

fn iq_registers() -> CodecResult<Vec<RegisterSpec>> {
    let mut registers = vec![
        RegisterSpec::new("on", 0x100, Codec::Bool(BoolCodec::new(0))),
        RegisterSpec::new("pfd_on", 0x100, Codec::Bool(BoolCodec::new(1)))
            .with_doc("Phase-frequency detector enabled"),
        RegisterSpec::new(
            "modulation_at_2f",
            0x100,
            select(&[("off", 0), ("on", 3 << 2)])?,
        )
        .with_bitmask(3 << 2),
        RegisterSpec::new(
            "demodulation_at_2f",
            0x100,
            select(&[("off", 0), ("on", 3 << 4)])?,
        )
        .with_bitmask(3 << 4),
        RegisterSpec::new("phase", 0x104, Codec::Phase(PhaseCodec::new(32)?.inverted()))
            .with_doc("Demodulation phase in degrees"),
        RegisterSpec::new("frequency", 0x108, Codec::Frequency(FrequencyCodec::new(32)?))
            .with_doc("Modulation frequency in Hz"),
        RegisterSpec::new(
            "output_signal",
            0x10C,
            select(&[
                ("quadrature", 0),
                ("output_direct", 1),
                ("pfd", 2),
                ("off", 3),
                ("quadrature_hf", 4),
            ])?,
        ),
        RegisterSpec::new("bandwidth", 0x124, Codec::Filter(IQ_FILTER))
            .with_doc("Demodulation filter cutoffs in Hz, negative for highpass"),
    ];
    registers.extend(filter_capabilities(IQ_FILTER));
    Ok(registers)
}

fn ams_registers() -> CodecResult<Vec<RegisterSpec>> {
    Ok((0..4u32)
        .map(|i| {
            RegisterSpec::new(format!("dac{i}"), 0x20 + 4 * i, Codec::Pwm(PwmCodec::default()))
                .with_doc("Slow analog output in V")
        })
        .collect())
}

fn housekeeping_registers() -> CodecResult<Vec<RegisterSpec>> {
    Ok(vec![
        RegisterSpec::new("id", 0x0, select(&[("prototype0", 0), ("release1", 1)])?)
            .with_doc("Board revision"),
        RegisterSpec::new("digital_loop", 0xC, Codec::Int(IntCodec::word())),
        RegisterSpec::new("led", 0x30, Codec::Int(IntCodec::new(8)?)).with_doc("LED bit pattern"),
    ])
}

fn asg_registers() -> CodecResult<Vec<RegisterSpec>> {
    Ok(vec![
        RegisterSpec::new("on", 0x0, Codec::Bool(BoolCodec::new(7).inverted()))
            .with_doc("Generator output enabled"),
        RegisterSpec::new(
            "trigger_source",
            0x0,
            select(&[
                ("off", 0),
                ("immediately", 1),
                ("ext_positive_edge", 2),
                ("ext_negative_edge", 3),
                ("ext_raw", 4),
                ("high", 5),
            ])?,
        )
        .with_bitmask(0x7),
        RegisterSpec::new("start_phase", 0xC, Codec::Phase(PhaseCodec::new(30)?))
            .with_doc("Phase at trigger in degrees"),
        RegisterSpec::new("frequency", 0x10, Codec::Frequency(FrequencyCodec::new(30)?))
            .with_doc("Output frequency in Hz"),
        RegisterSpec::new("cycles_per_burst", 0x18, Codec::Int(IntCodec::word())),
        RegisterSpec::new("advanced_trigger_delay", 0x118, Codec::Long(IntCodec::new(64)?))
            .with_doc("Trigger delay in clock cycles"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_bases() {
        assert_eq!(module_base("pid1"), Some((ModuleKind::Pid, 0x4031_0000)));
        assert_eq!(module_base("iq0"), Some((ModuleKind::Iq, 0x4035_0000)));
        assert_eq!(module_base("ams"), Some((ModuleKind::Ams, 0x4040_0000)));
        assert_eq!(module_base("nope"), None);
        assert_eq!(module_names().count(), 10);
    }

    #[test]
    fn every_kind_has_a_layout() {
        let tables = RegisterTables::builtin().unwrap();
        for &(_, kind, _) in MODULES.iter() {
            assert!(tables.layout(kind).is_some(), "missing layout for {kind}");
        }
    }

    #[test]
    fn dsp_registers_are_shared_between_kinds() {
        let tables = RegisterTables::builtin().unwrap();
        let pid = tables.layout(ModuleKind::Pid).unwrap().get("input").unwrap();
        let iq = tables.layout(ModuleKind::Iq).unwrap().get("input").unwrap();
        assert!(Arc::ptr_eq(pid, iq));
    }

    #[test]
    fn register_names_are_unique_per_layout() {
        let tables = RegisterTables::builtin().unwrap();
        for layout in tables.layouts() {
            let mut names: Vec<&str> = layout.registers().iter().map(|r| r.name()).collect();
            names.sort_unstable();
            let before = names.len();
            names.dedup();
            assert_eq!(names.len(), before, "duplicate names in {}", layout.kind());
        }
    }

    #[test]
    fn capabilities_are_seeded() {
        let mut memory = MemoryMap::new();
        seed_capabilities(&mut memory);
        assert_eq!(memory.get(dsp_base(0) + 0x220), 4);
        assert_eq!(memory.get(dsp_base(3) + 0x228), 1);
        assert_eq!(memory.get(dsp_base(7) + 0x230), 2);
        assert_eq!(memory.get(HOUSEKEEPING_BASE + 0x220), 0);
    }
}
