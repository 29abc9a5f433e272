//! Backup domain: write protection, RTC clock selection and reset.

use super::bus::RegisterBus;
use super::error::{ClockFault, ConfigError};
use super::osc;
use crate::family::Family;

/// Enables the power controller interface and lifts backup domain write
/// protection. Idempotent.
pub(crate) fn unlock<F: Family, B: RegisterBus>(bus: &mut B) {
    let spec = F::BACKUP_DOMAIN;
    for &gate in spec.interface_clocks {
        bus.set_flag(gate, true);
    }
    bus.set_flag(spec.unlock, true);
}

pub(crate) fn rtc_source<F: Family, B: RegisterBus>(bus: &mut B) -> Option<F::Osc> {
    let rtc = F::RTC?;
    let code = bus.read_field(rtc.select);
    rtc.sources.iter().find(|(_, c)| *c == code).map(|(o, _)| *o)
}

/// Routes `source` to the RTC and enables the RTC clock.
///
/// The selector can only be written once after a backup domain reset;
/// choosing a different source while one is set is refused.
pub(crate) fn set_rtc_source<F: Family, B: RegisterBus>(bus: &mut B, source: F::Osc) -> Result<(), ClockFault> {
    let rtc = F::RTC.ok_or(ConfigError::NoRtc)?;
    let name = F::oscillator(source).name;
    let code = rtc
        .sources
        .iter()
        .find(|(o, _)| *o == source)
        .map(|(_, c)| *c)
        .ok_or(ConfigError::NotRtcSource(name))?;
    if !osc::is_ready::<F, B>(bus, source) {
        return Err(ClockFault::SourceNotReady(name));
    }
    let current = bus.read_field(rtc.select);
    if current != 0 && current != code {
        return Err(ConfigError::RtcSourceLocked.into());
    }
    unlock::<F, B>(bus);
    if bus.write_field(rtc.select, code) {
        debug!("rcc: rtc clock <- {}", name);
    }
    bus.set_flag(rtc.enable, true);
    Ok(())
}

/// Pulses the backup domain reset, which clears the RTC source selection
/// and stops the low-speed external oscillator.
pub(crate) fn reset<F: Family, B: RegisterBus>(bus: &mut B) -> Result<(), ClockFault> {
    let rtc = F::RTC.ok_or(ConfigError::NoRtc)?;
    unlock::<F, B>(bus);
    bus.set_flag(rtc.reset, true);
    bus.set_flag(rtc.reset, false);
    Ok(())
}
