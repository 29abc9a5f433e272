//! Oscillator lifecycle: enable, disable, ready polling and bypass.

use core::marker::PhantomData;

use super::bus::RegisterBus;
use super::error::{ClockFault, ConfigError, HardwareTimeout};
use super::pll::{self, PllInput};
use super::profile::Board;
use super::wait::{poll_until, Timeout};
use super::{backup, switch};
use crate::family::{self, Capabilities, ExternalSlot, Family, OscKind};
use crate::time::Hertz;

/// Observable lifecycle of an oscillator.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OscState {
    Off,
    /// Enabled, ready flag not yet set.
    Starting,
    Ready,
}

pub(crate) fn is_enabled<F: Family, B: RegisterBus>(bus: &mut B, osc: F::Osc) -> bool {
    bus.is_set(F::oscillator(osc).enable)
}

pub(crate) fn is_ready<F: Family, B: RegisterBus>(bus: &mut B, osc: F::Osc) -> bool {
    bus.is_set(F::oscillator(osc).ready)
}

pub(crate) fn state<F: Family, B: RegisterBus>(bus: &mut B, osc: F::Osc) -> OscState {
    match (is_enabled::<F, B>(bus, osc), is_ready::<F, B>(bus, osc)) {
        (_, true) => OscState::Ready,
        (true, false) => OscState::Starting,
        (false, false) => OscState::Off,
    }
}

pub(crate) fn enable<F: Family, B: RegisterBus>(bus: &mut B, osc: F::Osc) {
    let spec = F::oscillator(osc);
    if spec.backup_domain {
        backup::unlock::<F, B>(bus);
    }
    if bus.set_flag(spec.enable, true) {
        trace!("rcc: {} on", spec.name);
    }
}

pub(crate) fn disable_unchecked<F: Family, B: RegisterBus>(bus: &mut B, osc: F::Osc) {
    let spec = F::oscillator(osc);
    if spec.backup_domain {
        backup::unlock::<F, B>(bus);
    }
    if bus.set_flag(spec.enable, false) {
        trace!("rcc: {} off", spec.name);
    }
}

pub(crate) fn wait_ready<F: Family, B: RegisterBus, T: Timeout + ?Sized>(
    bus: &mut B,
    osc: F::Osc,
    timeout: &mut T,
) -> Result<(), ClockFault> {
    let spec = F::oscillator(osc);
    let expiry = match spec.kind {
        OscKind::Pll => HardwareTimeout::PllLock(spec.name),
        _ => HardwareTimeout::Oscillator(spec.name),
    };
    poll_until(timeout, || bus.is_set(spec.ready), expiry)
}

pub(crate) fn wait_stopped<F: Family, B: RegisterBus, T: Timeout + ?Sized>(
    bus: &mut B,
    osc: F::Osc,
    timeout: &mut T,
) -> Result<(), ClockFault> {
    let spec = F::oscillator(osc);
    poll_until(timeout, || !bus.is_set(spec.ready), HardwareTimeout::OscillatorStop(spec.name))
}

pub(crate) fn bypass<F: Family, B: RegisterBus>(bus: &mut B, osc: F::Osc) -> bool {
    match F::oscillator(osc).bypass {
        Some(field) => bus.is_set(field),
        None => false,
    }
}

pub(crate) fn set_bypass<F: Family, B: RegisterBus>(bus: &mut B, osc: F::Osc, on: bool) -> Result<(), ClockFault> {
    let spec = F::oscillator(osc);
    let Some(field) = spec.bypass else {
        return Err(ConfigError::NotBypassable(spec.name).into());
    };
    if bus.read_field(field) == on as u32 {
        return Ok(());
    }
    if is_enabled::<F, B>(bus, osc) {
        return Err(ClockFault::ConfigWhileEnabled(spec.name));
    }
    if spec.backup_domain {
        backup::unlock::<F, B>(bus);
    }
    bus.set_flag(field, on);
    Ok(())
}

/// Nominal frequency of a non-PLL oscillator on this board.
pub(crate) fn raw_freq<F: Family>(osc: F::Osc, board: &Board) -> Option<Hertz> {
    match F::oscillator(osc).kind {
        OscKind::Internal(freq) => Some(freq),
        OscKind::External { slot: ExternalSlot::High, .. } => board.hse.map(|c| c.freq),
        OscKind::External { slot: ExternalSlot::Low, .. } => board.lse.map(|c| c.freq),
        OscKind::Pll => None,
    }
}

/// Whether `osc` is the system clock source or feeds it through the PLL
/// chain currently programmed in hardware.
pub(crate) fn drives_sysclk<F: Family, B: RegisterBus>(bus: &mut B, osc: F::Osc) -> bool {
    let mut cur = switch::current_source::<F, B>(bus);
    for _ in 0..F::OSCILLATORS.len() {
        if cur == osc {
            return true;
        }
        let Some(p) = family::pll_of::<F>(cur) else {
            return false;
        };
        cur = match pll::read_input::<F, B>(bus, p) {
            Some(PllInput::Osc(o)) => o,
            Some(PllInput::Pll(up)) => F::pll(up).osc,
            None => return false,
        };
    }
    false
}

/// Oscillator registry.
pub struct Oscillators<'a, F: Family, B: RegisterBus> {
    bus: &'a mut B,
    _family: PhantomData<F>,
}

impl<'a, F: Family, B: RegisterBus> Oscillators<'a, F, B> {
    pub(crate) fn new(bus: &'a mut B) -> Self {
        Self { bus, _family: PhantomData }
    }

    /// Sets the enable bit. Returns immediately; use [`wait_ready`](Self::wait_ready).
    pub fn enable(&mut self, osc: F::Osc) {
        enable::<F, B>(self.bus, osc);
    }

    /// Clears the enable bit.
    ///
    /// Refused with [`ClockFault::SourceInUse`] while `osc` drives the system
    /// clock, directly or through a PLL.
    pub fn disable(&mut self, osc: F::Osc) -> Result<(), ClockFault> {
        if drives_sysclk::<F, B>(self.bus, osc) {
            return Err(ClockFault::SourceInUse(F::oscillator(osc).name));
        }
        disable_unchecked::<F, B>(self.bus, osc);
        Ok(())
    }

    pub fn is_enabled(&mut self, osc: F::Osc) -> bool {
        is_enabled::<F, B>(self.bus, osc)
    }

    pub fn is_ready(&mut self, osc: F::Osc) -> bool {
        is_ready::<F, B>(self.bus, osc)
    }

    pub fn state(&mut self, osc: F::Osc) -> OscState {
        state::<F, B>(self.bus, osc)
    }

    pub fn wait_ready<T: Timeout + ?Sized>(&mut self, osc: F::Osc, timeout: &mut T) -> Result<(), ClockFault> {
        wait_ready::<F, B, T>(self.bus, osc, timeout)
    }

    /// Selects an external clock signal instead of a crystal. Only while off.
    pub fn set_bypass(&mut self, osc: F::Osc, on: bool) -> Result<(), ClockFault> {
        set_bypass::<F, B>(self.bus, osc, on)
    }

    pub fn capabilities(&self, osc: F::Osc) -> Capabilities {
        family::capabilities::<F>(osc)
    }

    /// Turns on the clock security system, which needs a running HSE.
    pub fn enable_css(&mut self) -> Result<(), ClockFault> {
        let css = F::CSS.ok_or(ConfigError::NoClockSecurity)?;
        let hse = family::external::<F>(ExternalSlot::High).ok_or(ConfigError::NoClockSecurity)?;
        if !is_ready::<F, B>(self.bus, hse) {
            return Err(ClockFault::SourceNotReady(F::oscillator(hse).name));
        }
        self.bus.set_flag(css, true);
        Ok(())
    }

    pub fn disable_css(&mut self) -> Result<(), ClockFault> {
        let css = F::CSS.ok_or(ConfigError::NoClockSecurity)?;
        self.bus.set_flag(css, false);
        Ok(())
    }
}
