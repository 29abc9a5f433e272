//! Peripheral clock enable and reset.

use critical_section::CriticalSection;

use super::bus::{Field, RegisterBus};
use crate::family::Family;

pub(crate) trait SealedClockGate<F: Family> {
    const ENABLE: Field;
    const RESET: Option<Field>;
}

/// A peripheral with a clock enable bit, and usually a reset bit.
#[allow(private_bounds)]
pub trait ClockGate<F: Family>: SealedClockGate<F> + 'static {}

pub(crate) fn enable_with_cs<F: Family, T: ClockGate<F>, B: RegisterBus>(bus: &mut B, _cs: CriticalSection) {
    bus.set_flag(T::ENABLE, true);
}

pub(crate) fn disable_with_cs<F: Family, T: ClockGate<F>, B: RegisterBus>(bus: &mut B, _cs: CriticalSection) {
    bus.set_flag(T::ENABLE, false);
}

pub(crate) fn reset_with_cs<F: Family, T: ClockGate<F>, B: RegisterBus>(bus: &mut B, _cs: CriticalSection) {
    if let Some(reset) = T::RESET {
        bus.set_flag(reset, true);
        bus.set_flag(reset, false);
    }
}
