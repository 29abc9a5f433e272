//! Core voltage regulator range selection.

use core::fmt::Debug;
use core::marker::PhantomData;

use super::bus::RegisterBus;
use super::error::{ClockFault, HardwareTimeout};
use super::wait::{poll_until, Timeout};
use crate::family::{Family, RegulatorSpec};
use crate::time::Hertz;

/// A regulator output range.
///
/// Ordered by capability: a greater scale allows higher frequencies and
/// draws more current.
pub trait VoltageScale: Copy + Ord + Debug + 'static {
    /// Every scale, lowest first.
    const ALL: &'static [Self];

    fn to_bits(self) -> u32;

    fn from_bits(bits: u32) -> Option<Self>;

    fn name(self) -> &'static str;
}

/// What a voltage scale allows.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ScaleLimits {
    pub sysclk: Hertz,
    pub ahb: Hertz,
    pub apb1: Hertz,
    pub apb2: Hertz,
    /// PLL VCO ceiling, if stricter than the PLL's own range.
    pub vco: Option<Hertz>,
    pub pll: bool,
}

/// The single scale of families with a fixed core voltage.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoScaling;

impl VoltageScale for NoScaling {
    const ALL: &'static [Self] = &[NoScaling];

    fn to_bits(self) -> u32 {
        0
    }

    fn from_bits(_bits: u32) -> Option<Self> {
        Some(NoScaling)
    }

    fn name(self) -> &'static str {
        "fixed"
    }
}

pub(crate) fn current_scale<F: Family, B: RegisterBus>(bus: &mut B) -> F::Scale {
    match F::REGULATOR {
        Some(reg) => F::Scale::from_bits(bus.read_field(reg.select)).unwrap_or(F::RESET_SCALE),
        None => F::RESET_SCALE,
    }
}

fn wait_idle<B: RegisterBus, T: Timeout + ?Sized>(bus: &mut B, reg: &RegulatorSpec, timeout: &mut T) -> Result<(), ClockFault> {
    poll_until(timeout, || !bus.is_set(reg.busy), HardwareTimeout::Voltage)
}

pub(crate) fn set_scale<F: Family, B: RegisterBus, T: Timeout + ?Sized>(
    bus: &mut B,
    scale: F::Scale,
    timeout: &mut T,
) -> Result<(), ClockFault> {
    let Some(reg) = F::REGULATOR else {
        return Ok(());
    };
    if current_scale::<F, B>(bus) == scale {
        return Ok(());
    }
    if let Some(gate) = reg.interface_clock {
        bus.set_flag(gate, true);
    }
    wait_idle(bus, &reg, timeout)?;
    debug!("rcc: voltage scale -> {}", scale.name());
    bus.write_field(reg.select, scale.to_bits());
    wait_idle(bus, &reg, timeout)
}

/// Regulator range control.
///
/// Changing the range while the clock tree runs faster than the new range
/// allows is unsafe for the silicon; [`Rcc::apply`](super::Rcc::apply) orders
/// range changes around frequency changes. Use this view directly only with
/// the clock tree parked at a frequency both ranges allow.
pub struct VoltageScaling<'a, F: Family, B: RegisterBus> {
    bus: &'a mut B,
    _family: PhantomData<F>,
}

impl<'a, F: Family, B: RegisterBus> VoltageScaling<'a, F, B> {
    pub(crate) fn new(bus: &'a mut B) -> Self {
        Self { bus, _family: PhantomData }
    }

    /// Waits for the regulator to be idle, selects `scale` and blocks until
    /// the output is stable. A no-op on families without a regulator.
    pub fn set_scale<T: Timeout + ?Sized>(&mut self, scale: F::Scale, timeout: &mut T) -> Result<(), ClockFault> {
        set_scale::<F, B, T>(self.bus, scale, timeout)
    }

    pub fn current_scale(&mut self) -> F::Scale {
        current_scale::<F, B>(self.bus)
    }

    pub fn limits(&self, scale: F::Scale) -> ScaleLimits {
        F::limits(scale)
    }
}
