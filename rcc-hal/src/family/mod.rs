//! Register maps and clock-tree descriptions of the supported chip families.
//!
//! A [`Family`] is pure data: which oscillators and PLLs exist, where their
//! control bits live, what each divider can encode and what each voltage
//! scale allows. The algorithms in [`crate::rcc`] are written once against
//! this description.

use core::fmt::Debug;

use crate::rcc::bus::Field;
use crate::rcc::pll::PllInput;
use crate::rcc::state::Clocks;
use crate::rcc::voltage::{ScaleLimits, VoltageScale};
use crate::time::Hertz;

pub mod f1;
pub mod f1cl;
pub mod l1;

pub use f1::F1;
pub use f1cl::F1Cl;
pub use l1::L1;

/// Upper bound on PLLs per family.
pub const MAX_PLLS: usize = 3;
/// Upper bound on oscillators (PLL outputs included) per family.
pub const MAX_OSCILLATORS: usize = 16;

/// A chip family's clock tree.
pub trait Family: Copy + Eq + Debug + 'static {
    /// Every oscillator, PLL outputs included.
    type Osc: Copy + Eq + Debug + 'static;
    type Pll: Copy + Eq + Debug + 'static;
    type Scale: VoltageScale;

    const NAME: &'static str;

    const OSCILLATORS: &'static [Self::Osc];
    /// Ordered so that a PLL only ever takes input from an earlier entry.
    const PLLS: &'static [Self::Pll];
    /// Oscillators that can drive SYSCLK, with their selector code.
    const SYSCLK_SOURCES: &'static [(Self::Osc, u32)];

    /// System clock selector.
    const SW: Field;
    /// System clock selector status.
    const SWS: Field;
    const HPRE: Field;
    const PPRE1: Field;
    const PPRE2: Field;
    const CSS: Option<Field>;

    const REGULATOR: Option<RegulatorSpec>;
    const RTC: Option<RtcSpec<Self::Osc>>;
    /// Write protection of the backup domain.
    const BACKUP_DOMAIN: BackupDomainSpec;

    /// Internal oscillator the tree falls back to while a PLL is reprogrammed.
    const SAFE_SOURCE: Self::Osc;
    const RESET_SCALE: Self::Scale;
    /// Bus frequencies right after reset.
    const RESET_CLOCKS: Clocks;

    fn oscillator(osc: Self::Osc) -> &'static OscSpec;

    fn pll(pll: Self::Pll) -> &'static PllSpec<Self>;

    fn limits(scale: Self::Scale) -> ScaleLimits;
}

/// What an oscillator is and where its control bits live.
#[derive(Debug)]
pub struct OscSpec {
    pub name: &'static str,
    pub enable: Field,
    pub ready: Field,
    pub bypass: Option<Field>,
    pub kind: OscKind,
    /// Control bits sit in the write-protected backup domain.
    pub backup_domain: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OscKind {
    /// On-chip RC oscillator with a nominal frequency.
    Internal(Hertz),
    /// Crystal or external clock supplied by the board.
    External { slot: ExternalSlot, min: Hertz, max: Hertz },
    /// Output of a PLL.
    Pll,
}

/// Which board clock an external oscillator is wired to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExternalSlot {
    High,
    Low,
}

/// A multiplier or divider field with the set of values it can encode.
#[derive(Clone, Copy, Debug)]
pub struct Knob {
    pub name: &'static str,
    pub field: Field,
    pub encoding: Encoding,
}

#[derive(Clone, Copy, Debug)]
pub enum Encoding {
    /// `raw = value - offset` for `value` in `min..=max`.
    Linear { min: u8, max: u8, offset: u8 },
    /// Explicit `(value, raw)` pairs.
    Table(&'static [(u8, u32)]),
}

impl Encoding {
    /// `None` if the hardware cannot represent `value`.
    pub fn encode(&self, value: u8) -> Option<u32> {
        match *self {
            Encoding::Linear { min, max, offset } => {
                (min..=max).contains(&value).then(|| (value - offset) as u32)
            }
            Encoding::Table(table) => table.iter().find(|(v, _)| *v == value).map(|(_, raw)| *raw),
        }
    }

    pub fn decode(&self, raw: u32) -> Option<u8> {
        match *self {
            Encoding::Linear { min, max, offset } => {
                let value = raw.checked_add(offset as u32)?;
                (min as u32..=max as u32).contains(&value).then_some(value as u8)
            }
            Encoding::Table(table) => table.iter().find(|(_, r)| *r == raw).map(|(v, _)| *v),
        }
    }
}

impl Knob {
    pub fn encode(&self, value: u8) -> Option<u32> {
        self.encoding.encode(value)
    }
}

/// One way of feeding a PLL.
#[derive(Debug)]
pub struct PllInputSpec<F: Family> {
    pub input: PllInput<F>,
    /// Selector fields and the values that route this input.
    pub select: &'static [(Field, u32)],
    /// Hard-wired divider in front of the PLL; the programmable pre-divider
    /// is bypassed for this input.
    pub fixed_prediv: Option<u8>,
}

#[derive(Debug)]
pub struct PllSpec<F: Family> {
    /// The oscillator identity of this PLL's output.
    pub osc: F::Osc,
    pub inputs: &'static [PllInputSpec<F>],
    pub prediv: Option<Knob>,
    pub mul: Knob,
    pub postdiv: Option<Knob>,
    /// Allowed frequency after the pre-divider.
    pub input_range: (Hertz, Hertz),
    /// Allowed output frequency.
    pub output_range: (Hertz, Hertz),
}

/// Voltage regulator range selection.
#[derive(Clone, Copy, Debug)]
pub struct RegulatorSpec {
    pub select: Field,
    /// Reads 1 while the regulator is moving between ranges.
    pub busy: Field,
    /// Peripheral clock of the power controller, if it must be on first.
    pub interface_clock: Option<Field>,
}

#[derive(Clone, Copy, Debug)]
pub struct RtcSpec<O: 'static> {
    pub select: Field,
    pub sources: &'static [(O, u32)],
    pub enable: Field,
    /// Backup domain software reset.
    pub reset: Field,
}

#[derive(Clone, Copy, Debug)]
pub struct BackupDomainSpec {
    /// Disables write protection when set.
    pub unlock: Field,
    pub interface_clocks: &'static [Field],
}

/// Oscillator capability flags, derived from the family tables.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities {
    pub bypassable: bool,
    pub pll_input: bool,
    pub rtc_source: bool,
    pub system_clock: bool,
}

pub(crate) fn capabilities<F: Family>(osc: F::Osc) -> Capabilities {
    Capabilities {
        bypassable: F::oscillator(osc).bypass.is_some(),
        pll_input: F::PLLS
            .iter()
            .any(|&p| F::pll(p).inputs.iter().any(|i| i.input == PllInput::Osc(osc))),
        rtc_source: F::RTC.is_some_and(|rtc| rtc.sources.iter().any(|(o, _)| *o == osc)),
        system_clock: sysclk_code::<F>(osc).is_some(),
    }
}

pub(crate) fn sysclk_code<F: Family>(osc: F::Osc) -> Option<u32> {
    F::SYSCLK_SOURCES.iter().find(|(o, _)| *o == osc).map(|(_, code)| *code)
}

pub(crate) fn osc_index<F: Family>(osc: F::Osc) -> usize {
    F::OSCILLATORS.iter().position(|&o| o == osc).unwrap_or(0)
}

pub(crate) fn pll_index<F: Family>(pll: F::Pll) -> usize {
    F::PLLS.iter().position(|&p| p == pll).unwrap_or(0)
}

/// The PLL whose output is `osc`, if any.
pub(crate) fn pll_of<F: Family>(osc: F::Osc) -> Option<F::Pll> {
    F::PLLS.iter().copied().find(|&p| F::pll(p).osc == osc)
}

pub(crate) fn pll_name<F: Family>(pll: F::Pll) -> &'static str {
    F::oscillator(F::pll(pll).osc).name
}

/// The first external oscillator wired to `slot`.
pub(crate) fn external<F: Family>(slot: ExternalSlot) -> Option<F::Osc> {
    F::OSCILLATORS.iter().copied().find(|&o| {
        matches!(F::oscillator(o).kind, OscKind::External { slot: s, .. } if s == slot)
    })
}

/// Case-insensitive lookup by oscillator name.
pub fn osc_by_name<F: Family>(name: &str) -> Option<F::Osc> {
    F::OSCILLATORS
        .iter()
        .copied()
        .find(|&o| F::oscillator(o).name.eq_ignore_ascii_case(name))
}

/// Case-insensitive lookup by the name of the PLL's output.
pub fn pll_by_name<F: Family>(name: &str) -> Option<F::Pll> {
    F::PLLS.iter().copied().find(|&p| pll_name::<F>(p).eq_ignore_ascii_case(name))
}

/// Case-insensitive lookup by voltage scale name.
pub fn scale_by_name<F: Family>(name: &str) -> Option<F::Scale> {
    <F::Scale as VoltageScale>::ALL
        .iter()
        .copied()
        .find(|s| s.name().eq_ignore_ascii_case(name))
}
